use crate::backends::Backends;
use crate::config::Config;
use crate::envelope::{ActionRequest, ActionResponse, InvocationEvent, ResponseEnvelope};
use crate::error::{ActionError, Result};
use crate::handlers::{self, HandlerContext, HandlerKind, Operation};
use crate::spill::{ResponseSizer, SpillPolicy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Entry point for one invocation: resolve, run, size, wrap.
///
/// Every outcome, including failures, becomes a [`ResponseEnvelope`]; the
/// transport never sees an error.
pub struct ActionRouter {
    config: Arc<Config>,
    backends: Backends,
    sizer: ResponseSizer,
}

impl ActionRouter {
    pub fn new(config: Arc<Config>, backends: Backends) -> Self {
        let sizer = ResponseSizer::new(backends.store.clone(), SpillPolicy::from(&config.spill));
        Self {
            config,
            backends,
            sizer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn default_handler(&self) -> Option<HandlerKind> {
        self.config.handler
    }

    pub async fn invoke(&self, kind: HandlerKind, event: InvocationEvent) -> ResponseEnvelope {
        self.handle(kind, event.into_request()).await.into_envelope()
    }

    pub async fn handle(&self, kind: HandlerKind, request: ActionRequest) -> ActionResponse {
        let started = Instant::now();
        let operation = request.invocation.operation_name().to_string();
        info!(
            handler = %kind,
            operation = %operation,
            action_group = %request.action_group,
            "invocation received"
        );

        match self.execute(kind, &request).await {
            Ok(body) => {
                info!(
                    handler = %kind,
                    operation = %operation,
                    bytes = body.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "invocation succeeded"
                );
                ActionResponse::success(&request, body)
            }
            Err(err) => {
                match &err {
                    ActionError::UnknownOperation { .. } | ActionError::Configuration(_) => {
                        error!(handler = %kind, operation = %operation, error = %err, "invocation rejected")
                    }
                    e if e.is_reprompt() => {
                        warn!(handler = %kind, operation = %operation, error = %err, "invalid parameters")
                    }
                    _ => error!(handler = %kind, operation = %operation, error = %err, "invocation failed"),
                }
                ActionResponse::failure(&request, &err)
            }
        }
    }

    async fn execute(&self, kind: HandlerKind, request: &ActionRequest) -> Result<String> {
        let op = Operation::resolve(kind, &request.invocation)?;
        let ctx = HandlerContext {
            config: &self.config,
            backends: &self.backends,
        };
        let payload = handlers::run(op, &ctx, request).await?;
        let sized = self.sizer.size(&payload).await?;
        Ok(sized.into_body())
    }
}
