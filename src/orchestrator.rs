use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;

use crate::agents::{AgentId, profile};
use crate::backend::ModelBackend;
use crate::config::RuntimeConfig;
use crate::error::redact_sensitive_text;
use crate::executor::{WorkflowRequest, WorkflowResult, execute};
use crate::history::{AgentStats, HistoryStore, WorkflowRecord};
use crate::router::select_agent;
use crate::selector::{AvailabilityCache, SelectionSource, select_model_with_source};
use crate::telemetry::{
    TelemetrySink, WORKFLOW_COMPLETED, WORKFLOW_FAILED, WorkflowEvent, unix_ms_now,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` up to `attempts` times, sleeping `delay_ms * attempt` between tries.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        "external call failed; retrying"
                    );
                    let backoff = self.delay_ms.saturating_mul(u64::from(attempt));
                    if backoff > 0 {
                        tokio::time::sleep(Duration::from_millis(backoff)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub history_capacity: usize,
    pub availability_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            availability_ttl: Duration::ZERO,
            retry: RetryPolicy::default(),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(cfg: &RuntimeConfig) -> Self {
        Self {
            history_capacity: cfg.history_capacity,
            availability_ttl: Duration::from_secs(cfg.availability_ttl_secs),
            retry: RetryPolicy {
                attempts: cfg.retry_attempts,
                delay_ms: cfg.retry_delay_ms,
            },
        }
    }
}

pub struct Orchestrator {
    backend: Arc<dyn ModelBackend>,
    history: std::sync::Mutex<HistoryStore>,
    availability: AvailabilityCache,
    retry: RetryPolicy,
    sequence: AtomicU64,
    telemetry: Option<TelemetrySink>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ModelBackend>, options: OrchestratorOptions) -> Self {
        Self {
            backend,
            history: std::sync::Mutex::new(HistoryStore::with_capacity(options.history_capacity)),
            availability: AvailabilityCache::new(options.availability_ttl),
            retry: options.retry,
            sequence: AtomicU64::new(0),
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn next_workflow_id(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("wf-{}-{seq}", unix_ms_now())
    }

    pub async fn select_model_for(&self, agent: AgentId) -> Result<(String, SelectionSource)> {
        let backend = self.backend.as_ref();
        let available = self
            .retry
            .run("available_models", move || self.availability.get_or_fetch(backend))
            .await?;
        Ok(select_model_with_source(profile(agent), &available))
    }

    pub async fn route_workflow(&self, request: &WorkflowRequest) -> Result<WorkflowResult> {
        let started = Instant::now();
        let workflow_id = self.next_workflow_id();
        let agent = select_agent(request.task, request.complexity);

        match self.run_workflow(agent, request, &workflow_id).await {
            Ok(result) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.record(request, &result, duration_ms);
                tracing::info!(
                    workflow_id = %result.workflow_id,
                    agent = agent.label(),
                    model = %result.model_used,
                    success = result.success,
                    duration_ms,
                    "workflow completed"
                );
                self.emit(
                    WORKFLOW_COMPLETED,
                    &WorkflowEvent {
                        workflow_id: &result.workflow_id,
                        agent,
                        task: request.task,
                        model: Some(result.model_used.as_str()),
                        success: Some(result.success),
                        error: None,
                        duration_ms,
                    },
                );
                Ok(result)
            }
            Err(err) => {
                self.emit(
                    WORKFLOW_FAILED,
                    &WorkflowEvent {
                        workflow_id: &workflow_id,
                        agent,
                        task: request.task,
                        model: None,
                        success: None,
                        error: Some(redact_sensitive_text(&format!("{err:#}"))),
                        duration_ms: started.elapsed().as_millis() as u64,
                    },
                );
                Err(err)
            }
        }
    }

    async fn run_workflow(
        &self,
        agent: AgentId,
        request: &WorkflowRequest,
        workflow_id: &str,
    ) -> Result<WorkflowResult> {
        let (model, source) = self.select_model_for(agent).await?;
        tracing::debug!(
            workflow_id,
            agent = agent.label(),
            model = %model,
            source = source.label(),
            "model selected"
        );

        let backend = self.backend.as_ref();
        let model_id = model.as_str();
        let outcome = self
            .retry
            .run("send_message", move || {
                execute(backend, agent, model_id, request, workflow_id)
            })
            .await;
        if outcome.is_err() {
            self.availability.invalidate().await;
        }
        outcome
    }

    fn record(&self, request: &WorkflowRequest, result: &WorkflowResult, duration_ms: u64) {
        let record = WorkflowRecord {
            workflow_id: result.workflow_id.clone(),
            agent: result.agent_used,
            model: result.model_used.clone(),
            task: request.task,
            created_at: Utc::now(),
            context: request.context.clone(),
            success: result.success,
            content_chars: result.content.chars().count(),
            duration_ms,
        };
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .append(record);
    }

    fn emit(&self, event: &str, payload: &WorkflowEvent<'_>) {
        if let Some(telemetry) = self.telemetry.as_ref() {
            telemetry.emit_workflow(event, payload);
        }
    }

    pub fn with_history<T>(&self, f: impl FnOnce(&HistoryStore) -> T) -> T {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        f(&history)
    }

    pub fn history_len(&self) -> usize {
        self.with_history(HistoryStore::len)
    }

    pub fn history(&self) -> Vec<WorkflowRecord> {
        self.with_history(|history| history.records().cloned().collect())
    }

    pub fn agent_stats(&self, agent: AgentId) -> AgentStats {
        self.with_history(|history| history.stats(agent))
    }
}
