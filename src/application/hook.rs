//! The post-parse hook entry point.
//!
//! Called by the host pipeline once per template render. On the final
//! render it replays deferred invocations recorded during tag processing
//! and then applies the minification gate; on sub-template renders it does
//! nothing. Every failure path returns the best available template text, so
//! a fault in this hook can never blank a page.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use crate::application::dispatch::PostRenderRegistry;
use crate::application::minify::MinifyService;
use crate::cache::{DeferredCallCache, TEMPLATE_POST_PARSE};
use crate::config::HookConfig;

/// Placeholder delimiters embedded in the template text.
const TAG_OPEN: char = '{';
const TAG_CLOSE: char = '}';

/// Orchestrates deferred replay and gated minification for one render
/// cycle. Configuration, cache, handlers and minifier are all injected;
/// the hook itself keeps no hidden state.
pub struct PostParseHook {
    config: HookConfig,
    cache: Arc<DeferredCallCache>,
    registry: PostRenderRegistry,
    minifier: Arc<dyn MinifyService>,
}

impl PostParseHook {
    pub fn new(
        config: HookConfig,
        cache: Arc<DeferredCallCache>,
        registry: PostRenderRegistry,
        minifier: Arc<dyn MinifyService>,
    ) -> Self {
        Self {
            config,
            cache,
            registry,
            minifier,
        }
    }

    /// Hook entry point.
    ///
    /// `last_call` carries the output of an upstream participant in the
    /// same hook chain; when present and non-empty it supersedes `template`
    /// so chained hooks compose instead of clobbering each other. Sub-template renders
    /// are returned unchanged: replay and minification happen exactly once,
    /// on the final top-level render.
    pub fn on_final_template_ready(
        &self,
        template: &str,
        is_sub_template: bool,
        site_id: &str,
        last_call: Option<&str>,
    ) -> String {
        // An empty upstream result is treated as absent; superseding the
        // real template with it would blank the page.
        let template = match last_call.filter(|upstream| !upstream.is_empty()) {
            Some(upstream) => upstream.to_string(),
            None => template.to_string(),
        };

        if is_sub_template {
            return template;
        }

        let template = self.replay_deferred(template, site_id);
        self.apply_minify_gate(template, site_id)
    }

    fn replay_deferred(&self, mut template: String, site_id: &str) -> String {
        let invocations = self.cache.drain(TEMPLATE_POST_PARSE);
        if invocations.is_empty() {
            return template;
        }

        debug!(
            site_id,
            count = invocations.len(),
            "Replaying deferred invocations"
        );

        for invocation in invocations {
            debug!(
                site_id,
                operation = %invocation.operation,
                key = %invocation.key,
                "Calling post-render operation"
            );

            match self.registry.invoke(invocation.operation, &invocation.params) {
                Ok(output) => {
                    let needle = format!("{TAG_OPEN}{}{TAG_CLOSE}", invocation.key);
                    template = template.replace(&needle, &output);
                    counter!("levigo_deferred_replay_total").increment(1);
                }
                Err(err) => {
                    // Skip and keep going; the placeholder stays in the page
                    // and later invocations still run.
                    warn!(
                        site_id,
                        operation = %invocation.operation,
                        key = %invocation.key,
                        error = %err,
                        "Deferred invocation failed; leaving placeholder in place"
                    );
                    counter!("levigo_deferred_replay_error_total").increment(1);
                }
            }
        }

        template
    }

    fn apply_minify_gate(&self, template: String, site_id: &str) -> String {
        if self.config.options.minify.is_no() || self.config.options.minify_html.is_no() {
            debug!(site_id, "HTML minification is disabled");
            counter!("levigo_minify_skip_total").increment(1);
            return template;
        }

        if self.config.options.disable.is_yes() {
            debug!(site_id, "HTML minification aborted: hook is disabled");
            counter!("levigo_minify_skip_total").increment(1);
            return template;
        }

        debug!(site_id, "Running HTML minification");
        let started = Instant::now();

        match self.minifier.minify_html(&template) {
            Ok(minified) => {
                histogram!("levigo_minify_ms").record(started.elapsed().as_secs_f64() * 1000.0);
                counter!("levigo_minify_run_total").increment(1);
                minified
            }
            Err(err) => {
                // Fail closed: an unminified page is still a valid page.
                warn!(
                    site_id,
                    error = %err,
                    "HTML minification failed; returning template unminified"
                );
                template
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::application::dispatch::{OpError, PostRenderOp};
    use crate::application::minify::MinifyError;
    use crate::config::{OptionSet, Toggle};
    use crate::domain::tags::{DeferredInvocation, OperationName, TagParams};

    use super::*;

    struct RecordingMinifier {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingMinifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl MinifyService for RecordingMinifier {
        fn minify_html(&self, html: &str) -> Result<String, MinifyError> {
            self.calls.lock().expect("calls lock").push(html.to_string());
            Ok(format!("min:{html}"))
        }
    }

    struct FailingMinifier;

    impl MinifyService for FailingMinifier {
        fn minify_html(&self, _html: &str) -> Result<String, MinifyError> {
            Err(MinifyError::InvalidUtf8)
        }
    }

    fn constant(output: &str) -> Box<dyn PostRenderOp> {
        let output = output.to_string();
        Box::new(move |_: &TagParams| Ok::<String, OpError>(output.clone()))
    }

    fn config_with(options: OptionSet) -> HookConfig {
        HookConfig {
            options,
            source: crate::config::ConfigSource::Default,
        }
    }

    fn unminified_options() -> OptionSet {
        OptionSet {
            minify_html: Toggle::No,
            ..OptionSet::factory()
        }
    }

    #[test]
    fn sub_template_renders_pass_through_untouched() {
        let cache = Arc::new(DeferredCallCache::new());
        cache.record(
            TEMPLATE_POST_PARSE,
            DeferredInvocation::new("T", OperationName::Css, TagParams::new()),
        );

        let minifier = RecordingMinifier::new();
        let hook = PostParseHook::new(
            config_with(OptionSet::factory()),
            Arc::clone(&cache),
            PostRenderRegistry::new().with_handler(OperationName::Css, constant("X")),
            Arc::clone(&minifier) as Arc<dyn MinifyService>,
        );

        let out = hook.on_final_template_ready("<p>{T}</p>", true, "1", None);
        assert_eq!(out, "<p>{T}</p>");
        assert!(minifier.calls().is_empty());
        // The bucket was not consumed.
        assert_eq!(cache.pending(TEMPLATE_POST_PARSE), 1);
    }

    #[test]
    fn last_call_supersedes_the_passed_template() {
        let hook = PostParseHook::new(
            config_with(unminified_options()),
            Arc::new(DeferredCallCache::new()),
            PostRenderRegistry::new(),
            RecordingMinifier::new(),
        );

        let out =
            hook.on_final_template_ready("<p>original</p>", false, "1", Some("<p>upstream</p>"));
        assert_eq!(out, "<p>upstream</p>");
    }

    #[test]
    fn empty_last_call_is_ignored_in_favour_of_the_template() {
        let hook = PostParseHook::new(
            config_with(unminified_options()),
            Arc::new(DeferredCallCache::new()),
            PostRenderRegistry::new(),
            RecordingMinifier::new(),
        );

        let out = hook.on_final_template_ready("<p>original</p>", false, "1", Some(""));
        assert_eq!(out, "<p>original</p>");
    }

    #[test]
    fn failed_invocation_is_skipped_and_replay_continues() {
        let cache = Arc::new(DeferredCallCache::new());
        cache.record(
            TEMPLATE_POST_PARSE,
            DeferredInvocation::new("A", OperationName::Css, TagParams::new()),
        );
        cache.record(
            TEMPLATE_POST_PARSE,
            DeferredInvocation::new("B", OperationName::Js, TagParams::new()),
        );

        let registry = PostRenderRegistry::new()
            .with_handler(
                OperationName::Css,
                Box::new(|_: &TagParams| Err::<String, OpError>("boom".into())),
            )
            .with_handler(OperationName::Js, constant("scripts"));

        let hook = PostParseHook::new(
            config_with(unminified_options()),
            cache,
            registry,
            RecordingMinifier::new(),
        );

        let out = hook.on_final_template_ready("<p>{A}</p><p>{B}</p>", false, "1", None);
        assert_eq!(out, "<p>{A}</p><p>scripts</p>");
    }

    #[test]
    fn minifier_failure_fails_closed() {
        let hook = PostParseHook::new(
            config_with(OptionSet::factory()),
            Arc::new(DeferredCallCache::new()),
            PostRenderRegistry::new(),
            Arc::new(FailingMinifier),
        );

        let out = hook.on_final_template_ready("<p>  keep  </p>", false, "1", None);
        assert_eq!(out, "<p>  keep  </p>");
    }

    #[test]
    fn placeholder_substitution_is_global() {
        let cache = Arc::new(DeferredCallCache::new());
        cache.record(
            TEMPLATE_POST_PARSE,
            DeferredInvocation::new("T", OperationName::Display, TagParams::new()),
        );

        let hook = PostParseHook::new(
            config_with(unminified_options()),
            cache,
            PostRenderRegistry::new().with_handler(OperationName::Display, constant("X")),
            RecordingMinifier::new(),
        );

        let out = hook.on_final_template_ready("{T} and {T} and {T}", false, "1", None);
        assert_eq!(out, "X and X and X");
    }
}
