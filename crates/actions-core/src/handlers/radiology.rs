use super::{HandlerContext, RadiologyOp};
use crate::envelope::ActionRequest;
use crate::error::Result;
use crate::generation::{GenerationRequest, REPORT_VALIDATION_PROMPT};
use crate::spill::Payload;
use tracing::info;

pub const RUN_VALIDATOR: &str = "run_validator";

pub async fn run(op: RadiologyOp, ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    match op {
        RadiologyOp::RunValidator => run_validator(ctx, request).await,
    }
}

async fn run_validator(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let report = request.parameters.require("pat_report")?;
    info!(bytes = report.len(), "validating radiology report");

    let review = ctx
        .backends
        .generator
        .generate(
            &GenerationRequest::new(&ctx.config.generation, report)
                .with_system(REPORT_VALIDATION_PROMPT),
        )
        .await?;
    Ok(Payload::Text(if review.is_empty() {
        "The validator returned no review".to_string()
    } else {
        review
    }))
}
