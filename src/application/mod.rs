//! Application services layer scaffolding.

pub mod dispatch;
pub mod hook;
pub mod minify;
pub mod settings;
