use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::agents::AgentId;
use crate::router::TaskKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowRecord {
    pub workflow_id: String,
    pub agent: AgentId,
    pub model: String,
    pub task: TaskKind,
    pub created_at: DateTime<Utc>,
    pub context: Map<String, Value>,
    pub success: bool,
    pub content_chars: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub workflows: usize,
    pub average_duration_ms: f64,
    pub success_rate: f64,
}

/// Append-only workflow log. Oldest records are evicted once `capacity` is reached; 0 is unbounded.
#[derive(Debug, Default)]
pub struct HistoryStore {
    capacity: usize,
    records: VecDeque<WorkflowRecord>,
    total_recorded: u64,
}

impl HistoryStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(1024)),
            total_recorded: 0,
        }
    }

    pub fn append(&mut self, record: WorkflowRecord) {
        if self.capacity > 0 && self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total_recorded += 1;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every append since creation, including evicted records.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn records(&self) -> impl Iterator<Item = &WorkflowRecord> {
        self.records.iter()
    }

    pub fn stats(&self, agent: AgentId) -> AgentStats {
        summarize(self.records.iter().filter(|record| record.agent == agent))
    }

    pub fn overall(&self) -> AgentStats {
        summarize(self.records.iter())
    }

    pub fn per_agent(&self) -> Vec<(AgentId, AgentStats)> {
        AgentId::ALL
            .iter()
            .map(|agent| (*agent, self.stats(*agent)))
            .filter(|(_, stats)| stats.workflows > 0)
            .collect()
    }
}

fn summarize<'a>(records: impl Iterator<Item = &'a WorkflowRecord>) -> AgentStats {
    let mut workflows = 0usize;
    let mut total_duration = 0u64;
    let mut successes = 0usize;
    for record in records {
        workflows += 1;
        total_duration = total_duration.saturating_add(record.duration_ms);
        if record.success {
            successes += 1;
        }
    }

    if workflows == 0 {
        return AgentStats::default();
    }

    AgentStats {
        workflows,
        average_duration_ms: total_duration as f64 / workflows as f64,
        success_rate: successes as f64 / workflows as f64,
    }
}
