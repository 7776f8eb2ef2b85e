use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::{AgentId, AgentProfile, profile};
use crate::backend::{MessageOptions, ModelBackend};
use crate::router::{Complexity, Priority, TaskKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub task: TaskKind,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub priority: Priority,
    pub user_input: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl WorkflowRequest {
    pub fn new(task: TaskKind, user_input: impl Into<String>) -> Self {
        Self {
            task,
            complexity: Complexity::default(),
            priority: Priority::default(),
            user_input: user_input.into(),
            context: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultMetadata {
    pub emoji: String,
    pub description: String,
    pub specialties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowResult {
    pub success: bool,
    pub content: String,
    pub agent_used: AgentId,
    pub model_used: String,
    pub workflow_id: String,
    pub metadata: ResultMetadata,
}

pub fn build_prompt(profile: &AgentProfile, request: &WorkflowRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(profile.persona);
    prompt.push_str("\n\nSpecialties: ");
    prompt.push_str(&profile.specialties.join(", "));
    prompt.push_str(&format!(
        "\n\nTask: {}\nPriority: {}\nComplexity: {}\n\nUser request:\n{}",
        request.task.label(),
        request.priority.label(),
        request.complexity.label(),
        request.user_input.trim()
    ));

    if !request.context.is_empty() {
        let rendered = serde_json::to_string_pretty(&request.context)
            .unwrap_or_else(|_| "{}".to_string());
        prompt.push_str("\n\nContext:\n");
        prompt.push_str(&rendered);
    }

    prompt
}

/// Sends one prompt for `agent` through `backend`. Backend failures are returned as-is.
pub async fn execute(
    backend: &dyn ModelBackend,
    agent: AgentId,
    model: &str,
    request: &WorkflowRequest,
    workflow_id: &str,
) -> Result<WorkflowResult> {
    let profile = profile(agent);
    let prompt = build_prompt(profile, request);
    let options = MessageOptions {
        agent_type: agent.label().to_string(),
        model_preference: model.to_string(),
        workflow_id: workflow_id.to_string(),
        specialties: profile.specialties.iter().map(|s| s.to_string()).collect(),
    };

    tracing::debug!(
        workflow_id,
        agent = agent.label(),
        model,
        prompt_chars = prompt.chars().count(),
        "sending workflow prompt"
    );
    let reply = backend
        .send_message(&prompt, &options)
        .await
        .with_context(|| format!("workflow '{workflow_id}' message send failed"))?;

    Ok(WorkflowResult {
        success: reply.success,
        content: reply.response,
        agent_used: agent,
        model_used: model.to_string(),
        workflow_id: workflow_id.to_string(),
        metadata: ResultMetadata {
            emoji: profile.emoji.to_string(),
            description: profile.description.to_string(),
            specialties: options.specialties,
        },
    })
}
