//! Model invocation collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::Result;
use crate::endpoint::HealthProbe;

/// A completed model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub payload: Value,
    /// Tokens consumed, counted against the model's per-minute window.
    #[serde(default)]
    pub tokens_used: u64,
}

/// Calls a hosted model with a family-shaped request body.
///
/// Heimdall decides *what* to call; implementations do the calling
/// (signing, transport, retries within `timeout_seconds`).
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Invoker name for logging/debugging.
    fn name(&self) -> &str;

    async fn invoke(&self, model_id: &str, body: &Value) -> Result<InvocationResponse>;
}

/// [`HealthProbe`] that sends a one-token request through a [`ModelInvoker`].
pub struct InvokerProbe {
    invoker: Arc<dyn ModelInvoker>,
}

impl InvokerProbe {
    pub fn new(invoker: Arc<dyn ModelInvoker>) -> Self {
        Self { invoker }
    }
}

#[async_trait]
impl HealthProbe for InvokerProbe {
    async fn probe(&self, model_id: &str) -> Result<()> {
        let body = json!({
            "max_tokens": 1,
            "messages": [{"role": "user", "content": "ping"}],
        });
        self.invoker.invoke(model_id, &body).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeimdallError;

    struct Failing;

    #[async_trait]
    impl ModelInvoker for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn invoke(&self, model_id: &str, _body: &Value) -> Result<InvocationResponse> {
            Err(HeimdallError::Invocation(format!("{model_id} throttled")))
        }
    }

    struct Echo;

    #[async_trait]
    impl ModelInvoker for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn invoke(&self, _model_id: &str, body: &Value) -> Result<InvocationResponse> {
            assert_eq!(body["max_tokens"], json!(1));
            Ok(InvocationResponse {
                payload: body.clone(),
                tokens_used: 1,
            })
        }
    }

    #[tokio::test]
    async fn probe_reflects_invoker_outcome() {
        assert!(InvokerProbe::new(Arc::new(Echo)).probe("m").await.is_ok());
        assert!(InvokerProbe::new(Arc::new(Failing)).probe("m").await.is_err());
    }
}
