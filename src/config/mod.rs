//! Configuration layer: the allowed option set and its layered precedence
//! resolution (factory defaults → persisted settings → file/env overrides).

use std::{collections::BTreeMap, fmt, path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const CONFIG_BASENAME: &str = "levigo";
const ENV_PREFIX: &str = "LEVIGO";
const YES_MARKER: &str = "yes";
const NO_MARKER: &str = "no";

/// Errors raised when querying options by name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option `{name}`")]
    UnknownOption { name: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// The closed set of recognised option keys.
///
/// Toggle keys carry a yes/no marker; the remaining keys carry free-form
/// path or URL strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    Disable,
    Minify,
    MinifyCss,
    MinifyJs,
    MinifyHtml,
    CombineCss,
    CombineJs,
    CachePath,
    CacheUrl,
    BasePath,
    BaseUrl,
}

impl OptionKey {
    pub const ALL: [OptionKey; 11] = [
        OptionKey::Disable,
        OptionKey::Minify,
        OptionKey::MinifyCss,
        OptionKey::MinifyJs,
        OptionKey::MinifyHtml,
        OptionKey::CombineCss,
        OptionKey::CombineJs,
        OptionKey::CachePath,
        OptionKey::CacheUrl,
        OptionKey::BasePath,
        OptionKey::BaseUrl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptionKey::Disable => "disable",
            OptionKey::Minify => "minify",
            OptionKey::MinifyCss => "minify_css",
            OptionKey::MinifyJs => "minify_js",
            OptionKey::MinifyHtml => "minify_html",
            OptionKey::CombineCss => "combine_css",
            OptionKey::CombineJs => "combine_js",
            OptionKey::CachePath => "cache_path",
            OptionKey::CacheUrl => "cache_url",
            OptionKey::BasePath => "base_path",
            OptionKey::BaseUrl => "base_url",
        }
    }

    /// True for yes/no options; false for path/URL options.
    pub fn is_toggle(self) -> bool {
        !matches!(
            self,
            OptionKey::CachePath | OptionKey::CacheUrl | OptionKey::BasePath | OptionKey::BaseUrl
        )
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| OptionError::UnknownOption {
                name: s.to_string(),
            })
    }
}

/// A yes/no option value. Only the literal `yes` marker enables a toggle;
/// every other raw value coerces to `No`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Yes,
    No,
}

impl Toggle {
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim() == YES_MARKER {
            Toggle::Yes
        } else {
            Toggle::No
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Toggle::Yes => YES_MARKER,
            Toggle::No => NO_MARKER,
        }
    }

    pub fn is_yes(self) -> bool {
        matches!(self, Toggle::Yes)
    }

    pub fn is_no(self) -> bool {
        matches!(self, Toggle::No)
    }
}

/// Which layer an effective configuration was resolved from. Drives the
/// settings form's read-only behaviour: a file-backed configuration cannot
/// be edited from the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    File,
    Database,
}

/// A complete assignment of every recognised option. Completeness is
/// structural: there is no way to build a partial set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet {
    pub disable: Toggle,
    pub minify: Toggle,
    pub minify_css: Toggle,
    pub minify_js: Toggle,
    pub minify_html: Toggle,
    pub combine_css: Toggle,
    pub combine_js: Toggle,
    pub cache_path: String,
    pub cache_url: String,
    pub base_path: String,
    pub base_url: String,
}

impl OptionSet {
    /// Factory defaults: everything enabled except the master kill switch.
    pub fn factory() -> Self {
        Self {
            disable: Toggle::No,
            minify: Toggle::Yes,
            minify_css: Toggle::Yes,
            minify_js: Toggle::Yes,
            minify_html: Toggle::Yes,
            combine_css: Toggle::Yes,
            combine_js: Toggle::Yes,
            cache_path: String::new(),
            cache_url: String::new(),
            base_path: String::new(),
            base_url: String::new(),
        }
    }

    /// Raw string value for a key.
    pub fn value(&self, key: OptionKey) -> &str {
        match key {
            OptionKey::Disable => self.disable.as_str(),
            OptionKey::Minify => self.minify.as_str(),
            OptionKey::MinifyCss => self.minify_css.as_str(),
            OptionKey::MinifyJs => self.minify_js.as_str(),
            OptionKey::MinifyHtml => self.minify_html.as_str(),
            OptionKey::CombineCss => self.combine_css.as_str(),
            OptionKey::CombineJs => self.combine_js.as_str(),
            OptionKey::CachePath => self.cache_path.as_str(),
            OptionKey::CacheUrl => self.cache_url.as_str(),
            OptionKey::BasePath => self.base_path.as_str(),
            OptionKey::BaseUrl => self.base_url.as_str(),
        }
    }

    fn set_raw(&mut self, key: OptionKey, raw: &str) {
        match key {
            OptionKey::Disable => self.disable = Toggle::from_raw(raw),
            OptionKey::Minify => self.minify = Toggle::from_raw(raw),
            OptionKey::MinifyCss => self.minify_css = Toggle::from_raw(raw),
            OptionKey::MinifyJs => self.minify_js = Toggle::from_raw(raw),
            OptionKey::MinifyHtml => self.minify_html = Toggle::from_raw(raw),
            OptionKey::CombineCss => self.combine_css = Toggle::from_raw(raw),
            OptionKey::CombineJs => self.combine_js = Toggle::from_raw(raw),
            OptionKey::CachePath => self.cache_path = raw.trim().to_string(),
            OptionKey::CacheUrl => self.cache_url = raw.trim().to_string(),
            OptionKey::BasePath => self.base_path = raw.trim().to_string(),
            OptionKey::BaseUrl => self.base_url = raw.trim().to_string(),
        }
    }

    /// Key-level merge of a partial layer over this set. Keys the layer does
    /// not mention keep their current value.
    pub fn apply(&mut self, overrides: &OptionOverrides) {
        for key in OptionKey::ALL {
            if let Some(raw) = overrides.value(key) {
                self.set_raw(key, raw);
            }
        }
    }

    /// Validate an arbitrary submitted mapping into a complete set.
    ///
    /// Unknown keys are dropped. Toggles missing from the submission become
    /// `no`: an absent checkbox in a web form means unchecked, not
    /// unspecified. Missing string keys keep their factory default.
    pub fn sanitize(raw: &BTreeMap<String, String>) -> Self {
        let mut set = Self::factory();
        for key in OptionKey::ALL {
            match raw.get(key.as_str()) {
                Some(value) => set.set_raw(key, value),
                None if key.is_toggle() => set.set_raw(key, NO_MARKER),
                None => {}
            }
        }
        set
    }

    /// Flat string mapping of every option, the shape handed to the
    /// persistence collaborator.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        OptionKey::ALL
            .into_iter()
            .map(|key| (key.as_str().to_string(), self.value(key).to_string()))
            .collect()
    }
}

impl Default for OptionSet {
    fn default() -> Self {
        Self::factory()
    }
}

/// A partial option layer: one `Option` per recognised key. Both the
/// file/env override source and a persisted settings record take this shape
/// before merging.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OptionOverrides {
    pub disable: Option<String>,
    pub minify: Option<String>,
    pub minify_css: Option<String>,
    pub minify_js: Option<String>,
    pub minify_html: Option<String>,
    pub combine_css: Option<String>,
    pub combine_js: Option<String>,
    pub cache_path: Option<String>,
    pub cache_url: Option<String>,
    pub base_path: Option<String>,
    pub base_url: Option<String>,
}

impl OptionOverrides {
    /// Build a layer from a raw flat mapping, dropping unknown keys.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let mut overrides = Self::default();
        for (name, value) in map {
            if let Ok(key) = name.parse::<OptionKey>() {
                *overrides.slot_mut(key) = Some(value.clone());
            }
        }
        overrides
    }

    fn slot_mut(&mut self, key: OptionKey) -> &mut Option<String> {
        match key {
            OptionKey::Disable => &mut self.disable,
            OptionKey::Minify => &mut self.minify,
            OptionKey::MinifyCss => &mut self.minify_css,
            OptionKey::MinifyJs => &mut self.minify_js,
            OptionKey::MinifyHtml => &mut self.minify_html,
            OptionKey::CombineCss => &mut self.combine_css,
            OptionKey::CombineJs => &mut self.combine_js,
            OptionKey::CachePath => &mut self.cache_path,
            OptionKey::CacheUrl => &mut self.cache_url,
            OptionKey::BasePath => &mut self.base_path,
            OptionKey::BaseUrl => &mut self.base_url,
        }
    }

    pub fn value(&self, key: OptionKey) -> Option<&str> {
        match key {
            OptionKey::Disable => self.disable.as_deref(),
            OptionKey::Minify => self.minify.as_deref(),
            OptionKey::MinifyCss => self.minify_css.as_deref(),
            OptionKey::MinifyJs => self.minify_js.as_deref(),
            OptionKey::MinifyHtml => self.minify_html.as_deref(),
            OptionKey::CombineCss => self.combine_css.as_deref(),
            OptionKey::CombineJs => self.combine_js.as_deref(),
            OptionKey::CachePath => self.cache_path.as_deref(),
            OptionKey::CacheUrl => self.cache_url.as_deref(),
            OptionKey::BasePath => self.base_path.as_deref(),
            OptionKey::BaseUrl => self.base_url.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        OptionKey::ALL
            .into_iter()
            .all(|key| self.value(key).is_none())
    }
}

/// Fully-resolved configuration after precedence resolution: a complete
/// option set plus the layer it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    pub options: OptionSet,
    pub source: ConfigSource,
}

impl HookConfig {
    /// A fresh configuration built purely from factory defaults. Does not
    /// touch any persisted record; persistence is the store's job.
    pub fn factory() -> Self {
        Self {
            options: OptionSet::factory(),
            source: ConfigSource::Default,
        }
    }

    /// Raw value of a named option, `UnknownOption` for anything outside
    /// the allowed set.
    pub fn get(&self, name: &str) -> Result<&str, OptionError> {
        let key = name.parse::<OptionKey>()?;
        Ok(self.options.value(key))
    }

    /// True only when the named option holds the literal enabled marker.
    pub fn is_yes(&self, name: &str) -> Result<bool, OptionError> {
        Ok(self.get(name)? == YES_MARKER)
    }

    /// Complement of [`HookConfig::is_yes`].
    pub fn is_no(&self, name: &str) -> Result<bool, OptionError> {
        Ok(!self.is_yes(name)?)
    }
}

/// Merge the configuration layers key by key, highest precedence last:
/// factory defaults, then the persisted record, then file/env overrides.
///
/// A higher layer that mentions only some keys leaves the rest to fall
/// through, so a partial deployment override never erases persisted
/// settings wholesale.
pub fn resolve(
    file: Option<&OptionOverrides>,
    db: Option<&BTreeMap<String, String>>,
) -> HookConfig {
    let mut options = OptionSet::factory();
    let mut source = ConfigSource::Default;

    if let Some(record) = db {
        options.apply(&OptionOverrides::from_map(record));
        source = ConfigSource::Database;
    }

    if let Some(overrides) = file
        && !overrides.is_empty()
    {
        options.apply(overrides);
        source = ConfigSource::File;
    }

    HookConfig { options, source }
}

/// Log output format for the embedding host.
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

/// File/env configuration as loaded from disk: the option override layer
/// plus ambient logging settings.
#[derive(Debug, Clone)]
pub struct FileConfig {
    pub options: OptionOverrides,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFileConfig {
    options: OptionOverrides,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

/// Load the override layer using the configured precedence (base file →
/// explicit file → environment).
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig, LoadError> {
    let mut builder =
        Config::builder().add_source(File::with_name(CONFIG_BASENAME).required(false));

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let raw: RawFileConfig = builder.build()?.try_deserialize()?;

    Ok(FileConfig {
        options: raw.options,
        logging: build_logging_settings(raw.logging)?,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}
