use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;

use crate::agents::AgentProfile;
use crate::backend::{AvailableModel, ModelBackend};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionSource {
    Preferred,
    Fallback,
    Default,
}

impl SelectionSource {
    pub fn label(self) -> &'static str {
        match self {
            SelectionSource::Preferred => "preferred",
            SelectionSource::Fallback => "fallback",
            SelectionSource::Default => "default",
        }
    }
}

fn first_available(candidates: &[&str], available: &[AvailableModel]) -> Option<String> {
    candidates
        .iter()
        .find(|candidate| available.iter().any(|model| model.matches(candidate)))
        .map(|candidate| candidate.to_string())
}

/// Ordered first-match: preferred list, then fallback list, then `DEFAULT_MODEL`.
pub fn select_model_with_source(
    profile: &AgentProfile,
    available: &[AvailableModel],
) -> (String, SelectionSource) {
    if let Some(model) = first_available(profile.preferred_models, available) {
        return (model, SelectionSource::Preferred);
    }
    if let Some(model) = first_available(profile.fallback_models, available) {
        return (model, SelectionSource::Fallback);
    }
    (DEFAULT_MODEL.to_string(), SelectionSource::Default)
}

pub fn select_model(profile: &AgentProfile, available: &[AvailableModel]) -> String {
    select_model_with_source(profile, available).0
}

/// Availability list kept for a short window. A zero TTL fetches on every call.
#[derive(Debug)]
pub struct AvailabilityCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Vec<AvailableModel>)>>,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub async fn get_or_fetch(&self, backend: &dyn ModelBackend) -> Result<Vec<AvailableModel>> {
        let mut entry = self.entry.lock().await;
        if !self.ttl.is_zero()
            && let Some((fetched_at, models)) = entry.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            tracing::debug!(count = models.len(), "using cached model availability");
            return Ok(models.clone());
        }

        let models = backend.available_models().await?;
        if !self.ttl.is_zero() {
            *entry = Some((Instant::now(), models.clone()));
        }
        Ok(models)
    }

    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}
