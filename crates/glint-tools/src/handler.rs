//! Function-based tool handlers

use glint_protocol::{Arguments, ToolResult};
use std::future::Future;
use std::pin::Pin;

use crate::ToolError;

/// Future returned by a tool handler
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + 'static>>;

/// Anything that turns arguments into a tool result.
///
/// Implemented for every `Fn(Arguments) -> impl Future<Output = Result<ToolResult, ToolError>>`,
/// so plain async closures can be registered directly.
pub trait ToolHandler: Send + Sync {
    fn call(&self, arguments: Arguments) -> ToolFuture;
}

impl<F, Fut> ToolHandler for F
where
    F: Fn(Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolResult, ToolError>> + Send + 'static,
{
    fn call(&self, arguments: Arguments) -> ToolFuture {
        Box::pin((self)(arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_handler() {
        let handler = |args: Arguments| async move {
            Ok(ToolResult::success().with("keys", args.len() as u64))
        };

        let mut args = Arguments::new();
        args.insert("ball".into(), 1.into());
        let result = handler.call(args).await.unwrap();
        assert_eq!(result.get("keys"), Some(&serde_json::json!(1)));
    }
}
