//! HTML minification collaborator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinifyError {
    #[error("minified output was not valid UTF-8")]
    InvalidUtf8,
}

/// Boundary to the minifier. Implementations are expected to be total and
/// side-effect free; the hook treats any error as "leave the template
/// unminified".
pub trait MinifyService: Send + Sync {
    fn minify_html(&self, html: &str) -> Result<String, MinifyError>;
}

/// Default minifier backed by the `minify-html` crate.
///
/// Brace template syntax is preserved so a placeholder that survived replay
/// (for example after a failed invocation) passes through intact.
#[derive(Debug, Default)]
pub struct MinifyHtmlService;

impl MinifyHtmlService {
    pub fn new() -> Self {
        Self
    }
}

impl MinifyService for MinifyHtmlService {
    fn minify_html(&self, html: &str) -> Result<String, MinifyError> {
        let cfg = minify_html::Cfg {
            minify_css: true,
            minify_js: true,
            preserve_brace_template_syntax: true,
            ..minify_html::Cfg::default()
        };

        let minified = minify_html::minify(html.as_bytes(), &cfg);
        String::from_utf8(minified).map_err(|_| MinifyError::InvalidUtf8)
    }
}
