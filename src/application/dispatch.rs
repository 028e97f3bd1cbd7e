//! Post-render operation dispatch.
//!
//! Replay runs each deferred invocation through an explicit mapping from
//! operation name to handler. The mapping is populated by the embedding
//! host's tag runtime; an operation nothing registered for is a typed
//! error, not a runtime lookup failure.

use std::collections::HashMap;
use std::error::Error as StdError;

use thiserror::Error;

use crate::domain::tags::{OperationName, TagParams};

/// Handler-side error type. Handlers belong to the embedder, so the
/// boundary accepts any error and the registry folds it into
/// [`DispatchError::Failed`].
pub type OpError = Box<dyn StdError + Send + Sync>;

/// A post-render operation implemented by the embedding host.
pub trait PostRenderOp: Send + Sync {
    fn run(&self, params: &TagParams) -> Result<String, OpError>;
}

impl<F> PostRenderOp for F
where
    F: Fn(&TagParams) -> Result<String, OpError> + Send + Sync,
{
    fn run(&self, params: &TagParams) -> Result<String, OpError> {
        self(params)
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler registered for operation `{operation}`")]
    MissingHandler { operation: OperationName },
    #[error("operation `{operation}` failed: {message}")]
    Failed {
        operation: OperationName,
        message: String,
    },
}

/// Explicit operation-name to handler mapping.
#[derive(Default)]
pub struct PostRenderRegistry {
    handlers: HashMap<OperationName, Box<dyn PostRenderOp>>,
}

impl PostRenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any earlier registration for the same
    /// operation.
    pub fn register(&mut self, operation: OperationName, handler: Box<dyn PostRenderOp>) {
        self.handlers.insert(operation, handler);
    }

    pub fn with_handler(
        mut self,
        operation: OperationName,
        handler: Box<dyn PostRenderOp>,
    ) -> Self {
        self.register(operation, handler);
        self
    }

    /// Run the handler registered for an operation with the invocation's
    /// captured parameters.
    pub fn invoke(
        &self,
        operation: OperationName,
        params: &TagParams,
    ) -> Result<String, DispatchError> {
        let handler = self
            .handlers
            .get(&operation)
            .ok_or(DispatchError::MissingHandler { operation })?;

        handler
            .run(params)
            .map_err(|err| DispatchError::Failed {
                operation,
                message: err.to_string(),
            })
    }
}
