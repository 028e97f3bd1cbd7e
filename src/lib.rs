//! Levigo: a post-parse finishing hook for template rendering pipelines.
//!
//! After a host pipeline has fully assembled a page template, the hook
//! replays deferred tag invocations recorded earlier in the render cycle,
//! substitutes their output back into the page, and optionally runs the
//! result through an HTML minifier. Whether any of that happens is governed
//! by a layered configuration: config file and environment overrides win
//! over persisted settings, which win over factory defaults.
//!
//! The embedding host wires things up once per render cycle:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use levigo::{
//!     DeferredCallCache, InMemorySettingsStore, MinifyHtmlService, PostParseHook,
//!     PostRenderRegistry, SettingsService,
//! };
//!
//! let store = Arc::new(InMemorySettingsStore::new());
//! let settings = SettingsService::new(store, "levigo");
//! let config = settings.resolve(None).expect("settings storage");
//!
//! let cache = Arc::new(DeferredCallCache::new());
//! let hook = PostParseHook::new(
//!     config,
//!     Arc::clone(&cache),
//!     PostRenderRegistry::new(),
//!     Arc::new(MinifyHtmlService::new()),
//! );
//!
//! let page = hook.on_final_template_ready("<html>...</html>", false, "1", None);
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

pub use application::dispatch::{PostRenderOp, PostRenderRegistry};
pub use application::hook::PostParseHook;
pub use application::minify::{MinifyHtmlService, MinifyService};
pub use application::settings::SettingsService;
pub use cache::DeferredCallCache;
pub use config::{HookConfig, OptionSet, Toggle};
pub use infra::store::{InMemorySettingsStore, SettingsStore};
