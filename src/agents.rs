use std::sync::OnceLock;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Fixed set of agent personas. Each one owns a ranked model list and a prompt persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentId {
    Speedster,
    Precision,
    DeepThinker,
    Architect,
    Guardian,
    Scribe,
    Mentor,
}

impl AgentId {
    pub const ALL: [AgentId; 7] = [
        AgentId::Speedster,
        AgentId::Precision,
        AgentId::DeepThinker,
        AgentId::Architect,
        AgentId::Guardian,
        AgentId::Scribe,
        AgentId::Mentor,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgentId::Speedster => "speedster",
            AgentId::Precision => "precision",
            AgentId::DeepThinker => "deep-thinker",
            AgentId::Architect => "architect",
            AgentId::Guardian => "guardian",
            AgentId::Scribe => "scribe",
            AgentId::Mentor => "mentor",
        }
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub id: AgentId,
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
    pub persona: &'static str,
    pub specialties: &'static [&'static str],
    pub preferred_models: &'static [&'static str],
    pub fallback_models: &'static [&'static str],
}

fn build_registry() -> Vec<AgentProfile> {
    vec![
        AgentProfile {
            id: AgentId::Speedster,
            name: "Speedster",
            emoji: "⚡",
            description: "Fast responder for quick edits and small snippets",
            persona: "You are Speedster, a fast and pragmatic coding assistant. Answer directly, \
                      prefer the smallest working change, and skip long preambles.",
            specialties: &["quick-fixes", "snippets", "boilerplate", "fast-iteration"],
            preferred_models: &["gemini-2.0-flash", "gpt-4o-mini"],
            fallback_models: &["claude-3-5-haiku", "gpt-4o"],
        },
        AgentProfile {
            id: AgentId::Precision,
            name: "Precision",
            emoji: "🎯",
            description: "Careful implementer for production-grade code",
            persona: "You are Precision, a meticulous software engineer. Produce correct, \
                      well-structured code, handle edge cases explicitly, and state assumptions.",
            specialties: &["code-generation", "refactoring", "type-safety", "edge-cases"],
            preferred_models: &["claude-3-5-sonnet", "gpt-4o"],
            fallback_models: &["gemini-1.5-pro", "gpt-4o-mini"],
        },
        AgentProfile {
            id: AgentId::DeepThinker,
            name: "Deep Thinker",
            emoji: "🧠",
            description: "Deep reasoner for hard algorithmic and performance problems",
            persona: "You are Deep Thinker, an expert in algorithms and systems performance. \
                      Reason step by step, compare alternatives, and justify complexity bounds.",
            specialties: &["algorithms", "performance", "complexity-analysis", "reasoning"],
            preferred_models: &["o1", "deepseek-reasoner"],
            fallback_models: &["claude-3-5-sonnet", "gpt-4o"],
        },
        AgentProfile {
            id: AgentId::Architect,
            name: "Architect",
            emoji: "🏗️",
            description: "System designer for architecture and module boundaries",
            persona: "You are Architect, a senior system designer. Describe components, data \
                      flow, and trade-offs before proposing concrete interfaces.",
            specialties: &["system-design", "architecture", "scalability", "interfaces"],
            preferred_models: &["claude-3-5-sonnet", "gemini-1.5-pro"],
            fallback_models: &["gpt-4o", "deepseek-chat"],
        },
        AgentProfile {
            id: AgentId::Guardian,
            name: "Guardian",
            emoji: "🛡️",
            description: "Reviewer focused on security and correctness risks",
            persona: "You are Guardian, a security-minded code reviewer. Identify vulnerabilities, \
                      unsafe patterns, and correctness risks, ranked by severity.",
            specialties: &["security", "code-review", "vulnerability-analysis", "testing"],
            preferred_models: &["gpt-4o", "claude-3-5-sonnet"],
            fallback_models: &["gemini-1.5-pro", "gpt-4o-mini"],
        },
        AgentProfile {
            id: AgentId::Scribe,
            name: "Scribe",
            emoji: "📝",
            description: "Technical writer for documentation and comments",
            persona: "You are Scribe, a technical writer. Produce clear, accurate documentation \
                      with short examples and consistent terminology.",
            specialties: &["documentation", "api-docs", "readme", "comments"],
            preferred_models: &["gpt-4o-mini", "gemini-2.0-flash"],
            fallback_models: &["claude-3-5-haiku", "gpt-4o"],
        },
        AgentProfile {
            id: AgentId::Mentor,
            name: "Mentor",
            emoji: "🎓",
            description: "Patient teacher that explains code and concepts",
            persona: "You are Mentor, a patient programming teacher. Explain concepts from first \
                      principles, build intuition, and end with a short summary.",
            specialties: &["explanation", "teaching", "debugging-guidance", "best-practices"],
            preferred_models: &["gemini-2.0-flash", "claude-3-5-haiku"],
            fallback_models: &["gpt-4o-mini", "gpt-4o"],
        },
    ]
}

pub fn registry() -> &'static [AgentProfile] {
    static REGISTRY: OnceLock<Vec<AgentProfile>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

/// Registry lookup. The table holds one profile per variant in declaration order.
pub fn profile(agent: AgentId) -> &'static AgentProfile {
    &registry()[agent as usize]
}

pub fn parse_agent_name(value: &str) -> Result<AgentId> {
    AgentId::from_str(value.trim(), true).map_err(|_| {
        let names = AgentId::ALL
            .iter()
            .map(|agent| agent.label())
            .collect::<Vec<&str>>();
        anyhow::anyhow!(
            "agent '{}' not found. Available agents: {}",
            value.trim(),
            names.join(", ")
        )
    })
}

pub fn run_agents_list() -> Result<()> {
    println!("Available agents:");
    for profile in registry() {
        println!(
            "  {} {:<13} {}",
            profile.emoji,
            profile.id.label(),
            profile.description
        );
    }
    Ok(())
}

pub fn run_agents_show(name: &str) -> Result<()> {
    let agent = parse_agent_name(name)?;
    let profile = profile(agent);

    println!("Agent: {} {} ({})", profile.emoji, profile.name, profile.id);
    println!("Description: {}", profile.description);
    println!("Persona: {}", profile.persona);
    println!("Specialties: {}", profile.specialties.join(", "));
    println!("Preferred models: {}", profile.preferred_models.join(" > "));
    println!("Fallback models: {}", profile.fallback_models.join(" > "));
    Ok(())
}
