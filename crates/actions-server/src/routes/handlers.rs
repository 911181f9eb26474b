use actions_core::handlers::HandlerKind;
use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/handlers: every handler with the operation names it accepts.
pub async fn list_handlers(State(app): State<AppState>) -> Json<serde_json::Value> {
    let handlers: Vec<serde_json::Value> = HandlerKind::all()
        .iter()
        .map(|kind| {
            serde_json::json!({
                "name": kind.as_str(),
                "operations": kind.operations(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "default": app.router.default_handler().map(|k| k.as_str()),
        "handlers": handlers,
    }))
}
