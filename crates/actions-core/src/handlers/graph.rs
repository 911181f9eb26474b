use super::{GraphOp, HandlerContext};
use crate::envelope::ActionRequest;
use crate::error::{ActionError, Result};
use crate::generation::{schema_prompt, GenerationRequest, SCHEMA_SYSTEM_PROMPT};
use crate::spill::Payload;
use tracing::info;

pub const GET_SCHEMA: &str = "/getschema";
pub const QUERY: &str = "/queryneptune";

pub async fn run(op: GraphOp, ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    match op {
        GraphOp::GetSchema => get_schema(ctx, request).await,
        GraphOp::Query => query(ctx, request).await,
    }
}

/// The part of the graph schema relevant to the user's question.
async fn get_schema(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let question = request
        .input_text
        .as_deref()
        .or_else(|| request.parameters.get("question"))
        .ok_or_else(|| ActionError::MissingParameter("inputText".into()))?;

    let schema = ctx.backends.graph.schema().await?;
    info!(
        nodes = schema.nodes.len(),
        triples = schema.triples.len(),
        "narrowing graph schema"
    );
    let generation = GenerationRequest::new(&ctx.config.generation, schema_prompt(question, &schema.to_string()))
        .with_system(SCHEMA_SYSTEM_PROMPT);
    let narrowed = ctx.backends.generator.generate(&generation).await?;

    Ok(Payload::Text(if narrowed.is_empty() {
        "No schema was returned".to_string()
    } else {
        narrowed
    }))
}

async fn query(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let query = request.parameters.require("query")?;
    let result = ctx.backends.graph.query(query).await?;
    Ok(Payload::Json(result))
}
