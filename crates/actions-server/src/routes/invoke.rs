use actions_core::envelope::{InvocationEvent, ResponseEnvelope};
use actions_core::handlers::HandlerKind;
use axum::extract::{Path, State};
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// POST /invoke: dispatch to the handler this deployment was configured for.
pub async fn invoke_default(
    State(app): State<AppState>,
    Json(event): Json<InvocationEvent>,
) -> Result<Json<ResponseEnvelope>, AppError> {
    let kind = app
        .router
        .default_handler()
        .ok_or_else(|| AppError::bad_request("no default handler configured; use /invoke/{handler}"))?;
    Ok(Json(app.router.invoke(kind, event).await))
}

/// POST /invoke/{handler}
///
/// Handler failures are part of the envelope, so any decoded event yields 200.
pub async fn invoke_handler(
    State(app): State<AppState>,
    Path(handler): Path<String>,
    Json(event): Json<InvocationEvent>,
) -> Result<Json<ResponseEnvelope>, AppError> {
    let kind: HandlerKind = handler
        .parse()
        .map_err(|_| AppError::not_found(format!("unknown handler '{handler}'")))?;
    Ok(Json(app.router.invoke(kind, event).await))
}
