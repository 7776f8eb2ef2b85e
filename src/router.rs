use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::agents::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    CodeGeneration,
    CodeReview,
    Debugging,
    Optimization,
    Refactoring,
    Documentation,
    Testing,
    Architecture,
    Security,
    Explanation,
}

impl TaskKind {
    pub const ALL: [TaskKind; 10] = [
        TaskKind::CodeGeneration,
        TaskKind::CodeReview,
        TaskKind::Debugging,
        TaskKind::Optimization,
        TaskKind::Refactoring,
        TaskKind::Documentation,
        TaskKind::Testing,
        TaskKind::Architecture,
        TaskKind::Security,
        TaskKind::Explanation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TaskKind::CodeGeneration => "code-generation",
            TaskKind::CodeReview => "code-review",
            TaskKind::Debugging => "debugging",
            TaskKind::Optimization => "optimization",
            TaskKind::Refactoring => "refactoring",
            TaskKind::Documentation => "documentation",
            TaskKind::Testing => "testing",
            TaskKind::Architecture => "architecture",
            TaskKind::Security => "security",
            TaskKind::Explanation => "explanation",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    pub const ALL: [Complexity; 4] = [
        Complexity::Simple,
        Complexity::Moderate,
        Complexity::Complex,
        Complexity::Expert,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::Expert => "expert",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

/// Static task routing. No wildcard arm: a new `TaskKind` must be routed here to compile.
pub fn select_agent(task: TaskKind, complexity: Complexity) -> AgentId {
    match task {
        TaskKind::CodeGeneration => match complexity {
            Complexity::Simple => AgentId::Speedster,
            Complexity::Moderate | Complexity::Complex | Complexity::Expert => AgentId::Precision,
        },
        TaskKind::Optimization => match complexity {
            Complexity::Expert => AgentId::DeepThinker,
            Complexity::Simple | Complexity::Moderate | Complexity::Complex => AgentId::Precision,
        },
        TaskKind::CodeReview => AgentId::Guardian,
        TaskKind::Debugging => AgentId::Precision,
        TaskKind::Refactoring => AgentId::Precision,
        TaskKind::Documentation => AgentId::Scribe,
        TaskKind::Testing => AgentId::Guardian,
        TaskKind::Architecture => AgentId::Architect,
        TaskKind::Security => AgentId::Guardian,
        TaskKind::Explanation => AgentId::Mentor,
    }
}

/// One row per task, one column per complexity level.
pub fn routing_table() -> Vec<(TaskKind, [AgentId; 4])> {
    TaskKind::ALL
        .iter()
        .map(|task| {
            let row = Complexity::ALL.map(|complexity| select_agent(*task, complexity));
            (*task, row)
        })
        .collect()
}

pub fn run_tasks_table() -> Result<()> {
    println!(
        "{:<16} {:<13} {:<13} {:<13} {:<13}",
        "task", "simple", "moderate", "complex", "expert"
    );
    for (task, row) in routing_table() {
        println!(
            "{:<16} {:<13} {:<13} {:<13} {:<13}",
            task.label(),
            row[0].label(),
            row[1].label(),
            row[2].label(),
            row[3].label()
        );
    }

    Ok(())
}
