//! Deferred tag invocations and their captured parameters.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// A post-render operation name outside the supported set.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown post-render operation `{0}`")]
pub struct UnknownOperationError(pub String);

/// The closed set of operations a deferred invocation may name.
///
/// Dispatch is by explicit mapping rather than by runtime method lookup, so
/// an unsupported name is rejected with a typed error at record time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationName {
    Css,
    Js,
    Display,
}

impl OperationName {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationName::Css => "css",
            OperationName::Js => "js",
            OperationName::Display => "display",
        }
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationName {
    type Err = UnknownOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "css" => Ok(OperationName::Css),
            "js" => Ok(OperationName::Js),
            "display" => Ok(OperationName::Display),
            other => Err(UnknownOperationError(other.to_string())),
        }
    }
}

/// Named tag parameters captured when an invocation was deferred, preserved
/// in capture order.
///
/// Parameters travel with the invocation and are handed to the handler
/// explicitly; there is no ambient parameter state to save and restore
/// around replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagParams {
    entries: Vec<(String, String)>,
}

impl TagParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier capture of the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for TagParams {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.set(name, value);
        }
        params
    }
}

/// A recorded request to run an operation once the full template is known.
///
/// `key` is the placeholder text embedded in the template; the replay loop
/// substitutes every delimited occurrence of it with the operation's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredInvocation {
    pub key: String,
    pub operation: OperationName,
    pub params: TagParams,
}

impl DeferredInvocation {
    pub fn new(key: impl Into<String>, operation: OperationName, params: TagParams) -> Self {
        Self {
            key: key.into(),
            operation,
            params,
        }
    }

    /// Build an invocation from a raw operation name, rejecting names
    /// outside the supported set.
    pub fn from_raw(
        key: impl Into<String>,
        operation: &str,
        params: TagParams,
    ) -> Result<Self, UnknownOperationError> {
        Ok(Self::new(key, operation.parse()?, params))
    }
}
