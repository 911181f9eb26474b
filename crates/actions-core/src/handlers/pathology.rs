//! Pathology handler: report lookup and the two-stage WSI -> MSI batch
//! pipeline.
//!
//! Objects live in one bucket under fixed prefixes, keyed by patient id:
//!
//! ```text
//! REPORTS/<patient_id>...      pathology report documents
//! WSI/<patient_id>...          whole-slide images
//! FEATURES/<patient_id>...     features written by the extraction job
//! PREDICTIONS/<patient_id>...  MSI predictions written by the classifier job
//! ```
//!
//! Batch jobs are fire-and-forget; their progress is checked with
//! `check_on_aws_batch_job_status`.

use super::{HandlerContext, PathologyOp};
use crate::backends::JobSubmission;
use crate::envelope::ActionRequest;
use crate::error::{ActionError, Result};
use crate::generation::{report_extraction_prompt, GenerationRequest};
use crate::spill::Payload;
use serde_json::json;
use tracing::info;

pub const RETRIEVE_REPORT: &str = "retrieve_existing_pathology_report";
pub const FEATURE_EXTRACTION: &str = "wsi_feature_extraction";
pub const MSI_STATUS: &str = "retrieve_msi_status";
pub const BATCH_JOB_STATUS: &str = "check_on_aws_batch_job_status";
pub const EXECUTED_MODELS: &str = "check_on_executed_ml_models";

const REPORTS: &str = "REPORTS";
const WSI: &str = "WSI";
const FEATURES: &str = "FEATURES";
const PREDICTIONS: &str = "PREDICTIONS";

const LIST_PAGE: usize = 1000;

pub async fn run(op: PathologyOp, ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    match op {
        PathologyOp::RetrieveReport => retrieve_report(ctx, request).await,
        PathologyOp::FeatureExtraction => feature_extraction(ctx, request).await,
        PathologyOp::MsiStatus => msi_status(ctx, request).await,
        PathologyOp::BatchJobStatus => batch_job_status(ctx, request).await,
        PathologyOp::ExecutedModels => executed_models(ctx, request).await,
    }
}

async fn retrieve_report(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let patient_id = request.parameters.require("patient_id")?;
    require_bucket(ctx)?;

    let key = find(ctx, REPORTS, patient_id).await?.ok_or_else(|| {
        ActionError::NotFound(format!(
            "No pathology report found for patient_id: {patient_id}"
        ))
    })?;
    let uri = ctx.backends.store.uri(&key);
    let document = ctx.backends.store.get(&key).await?;
    info!(patient_id, %uri, bytes = document.len(), "extracting pathology report");

    let prompt = report_extraction_prompt(&String::from_utf8_lossy(&document));
    let extracted = ctx
        .backends
        .generator
        .generate(&GenerationRequest::new(&ctx.config.generation, prompt))
        .await?;
    let result = if extracted.is_empty() {
        "No output text".to_string()
    } else {
        extracted
    };

    let report = json!({ "s3_uri": uri.to_string(), "result": result });
    Ok(Payload::Text(format!(
        "Pathology report for patient {patient_id}: {report}"
    )))
}

async fn feature_extraction(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let patient_id = request.parameters.require("patient_id")?;
    require_bucket(ctx)?;
    let batch = &ctx.config.batch;
    let definition = required_setting(
        "batch.feature_extraction_definition",
        &batch.feature_extraction_definition,
    )?;
    let queue = required_setting("batch.job_queue", &batch.job_queue)?;

    let key = find(ctx, WSI, patient_id).await?.ok_or_else(|| {
        ActionError::NotFound(format!("No WSI file found for patient_id: {patient_id}"))
    })?;
    let bucket = ctx.backends.store.bucket().to_string();
    let job = JobSubmission {
        name: job_name("extract_features", patient_id),
        queue: queue.to_string(),
        definition: definition.to_string(),
        environment: vec![
            ("HF_HOME".into(), "/dev/shm".into()),
            ("TMP_DIR".into(), "/dev/shm".into()),
            ("FILE_NAME".into(), ctx.backends.store.uri(&key).to_string()),
            ("BUCKET_NAME".into(), bucket),
        ],
        resources: batch.resources,
    };
    let job_id = ctx.backends.batch.submit(&job).await?;
    info!(patient_id, job_name = %job.name, job_id = %job_id, "feature extraction job submitted");

    Ok(Payload::Text(format!(
        "Feature Extraction for patient {patient_id} started a Feature Extraction Job with job id: {job_id}"
    )))
}

async fn msi_status(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let patient_id = request.parameters.require("patient_id")?;
    require_bucket(ctx)?;
    let batch = &ctx.config.batch;
    let definition = required_setting("batch.classifier_definition", &batch.classifier_definition)?;
    let queue = required_setting("batch.job_queue", &batch.job_queue)?;

    let key = find(ctx, FEATURES, patient_id)
        .await?
        .ok_or_else(|| ActionError::NotFound(no_features(patient_id)))?;
    let job = JobSubmission {
        name: job_name("msi_classification", patient_id),
        queue: queue.to_string(),
        definition: definition.to_string(),
        environment: vec![
            ("FILE_NAME".into(), ctx.backends.store.uri(&key).to_string()),
            ("BUCKET_NAME".into(), ctx.backends.store.bucket().to_string()),
        ],
        resources: batch.resources,
    };
    let job_id = ctx.backends.batch.submit(&job).await?;
    info!(patient_id, job_name = %job.name, job_id = %job_id, "msi classification job submitted");

    Ok(Payload::Text(format!(
        "MSI Classification for patient {patient_id} started a MSI Classification Job with job id: {job_id}. Check back later"
    )))
}

async fn batch_job_status(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let job_id = request.parameters.require("jobId")?;
    let status = ctx.backends.batch.describe(job_id).await?;
    let summary = json!({
        "jobId": status.job_id,
        "status": status.status,
        "state": status.state.as_str(),
        "statusReason": status.reason,
    });
    Ok(Payload::Text(format!("Job status for job {job_id}: {summary}")))
}

async fn executed_models(ctx: &HandlerContext<'_>, request: &ActionRequest) -> Result<Payload> {
    let patient_id = request.parameters.require("patient_id")?;
    require_bucket(ctx)?;

    if let Some(key) = find(ctx, PREDICTIONS, patient_id).await? {
        let prediction = ctx.backends.store.get(&key).await?;
        return Ok(Payload::Text(format!(
            "Classification was executed in the past and result was: {}",
            String::from_utf8_lossy(&prediction)
        )));
    }
    if find(ctx, FEATURES, patient_id).await?.is_none() {
        return Ok(Payload::Text(no_features(patient_id)));
    }
    Ok(Payload::Text(format!(
        "Features were extracted for patient_id: {patient_id} but no MSI classification has been run yet"
    )))
}

/// First object under `<prefix>/<patient_id>` that belongs to exactly that
/// patient: the id must be followed by `/`, `.`, `_` or the end of the key,
/// so `P-1` never picks up `P-10`'s objects.
async fn find(ctx: &HandlerContext<'_>, prefix: &str, patient_id: &str) -> Result<Option<String>> {
    let stem = format!("{prefix}/{patient_id}");
    let keys = ctx.backends.store.list_keys(&stem, LIST_PAGE).await?;
    Ok(keys.into_iter().find(|key| belongs_to(key, &stem)))
}

fn belongs_to(key: &str, stem: &str) -> bool {
    match key.strip_prefix(stem) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '.', '_']),
        None => false,
    }
}

fn no_features(patient_id: &str) -> String {
    format!("No Features found for patient_id: {patient_id}, please extract features first !")
}

fn require_bucket(ctx: &HandlerContext<'_>) -> Result<()> {
    if ctx.backends.store.bucket().is_empty() {
        return Err(ActionError::Configuration(
            "storage.bucket is not configured".into(),
        ));
    }
    Ok(())
}

fn required_setting<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(ActionError::Configuration(format!("{name} is not configured")));
    }
    Ok(value)
}

/// `<stage>_<patient_id>_<YYYYmmddHHMMSS>`, restricted to the characters
/// batch job names allow.
fn job_name(stage: &str, patient_id: &str) -> String {
    let id: String = patient_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let name = format!(
        "{stage}_{id}_{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    );
    name.chars().take(128).collect()
}
