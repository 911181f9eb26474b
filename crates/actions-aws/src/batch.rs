use actions_core::backends::{BatchScheduler, JobStatus, JobSubmission};
use actions_core::error::{ActionError, Result};
use actions_core::poll::ExecutionState;
use async_trait::async_trait;
use aws_sdk_batch::error::DisplayErrorContext;
use aws_sdk_batch::types::{ContainerOverrides, KeyValuePair, ResourceRequirement, ResourceType};
use aws_sdk_batch::Client;
use tracing::info;

const SERVICE: &str = "batch";

fn backend_err(e: impl std::error::Error) -> ActionError {
    ActionError::backend(SERVICE, DisplayErrorContext(&e))
}

pub struct BatchClient {
    client: Client,
}

impl BatchClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map an AWS Batch job status onto the shared lifecycle.
pub fn job_state(status: &str, reason: Option<&str>) -> ExecutionState {
    match status {
        "SUCCEEDED" => ExecutionState::Succeeded,
        "FAILED" => ExecutionState::Failed {
            reason: reason.map(String::from),
        },
        "STARTING" | "RUNNING" => ExecutionState::Running,
        _ => ExecutionState::Submitted,
    }
}

fn container_overrides(job: &JobSubmission) -> ContainerOverrides {
    let requirement = |kind: ResourceType, value: u32| {
        ResourceRequirement::builder()
            .r#type(kind)
            .value(value.to_string())
            .build()
    };

    let mut overrides = ContainerOverrides::builder();
    for (name, value) in &job.environment {
        overrides = overrides.environment(KeyValuePair::builder().name(name).value(value).build());
    }
    overrides
        .resource_requirements(requirement(ResourceType::Vcpu, job.resources.vcpu))
        .resource_requirements(requirement(ResourceType::Memory, job.resources.memory_mib))
        .resource_requirements(requirement(ResourceType::Gpu, job.resources.gpu))
        .build()
}

#[async_trait]
impl BatchScheduler for BatchClient {
    async fn submit(&self, job: &JobSubmission) -> Result<String> {
        let output = self
            .client
            .submit_job()
            .job_name(&job.name)
            .job_queue(&job.queue)
            .job_definition(&job.definition)
            .container_overrides(container_overrides(job))
            .send()
            .await
            .map_err(backend_err)?;
        let job_id = output.job_id().to_string();
        info!(job_name = %job.name, job_id = %job_id, "batch job submitted");
        Ok(job_id)
    }

    async fn describe(&self, job_id: &str) -> Result<JobStatus> {
        let output = self
            .client
            .describe_jobs()
            .jobs(job_id)
            .send()
            .await
            .map_err(backend_err)?;
        let job = output
            .jobs()
            .first()
            .ok_or_else(|| ActionError::NotFound(format!("No batch job found with id: {job_id}")))?;

        let status = job.status().map(|s| s.as_str()).unwrap_or("UNKNOWN");
        let reason = job.status_reason();
        Ok(JobStatus {
            job_id: job_id.to_string(),
            status: status.to_string(),
            state: job_state(status, reason),
            reason: reason.map(String::from),
        })
    }
}
