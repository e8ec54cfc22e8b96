//! Generation prompts - user-supplied inputs for each generation action
//!
//! Prompts become the JSON payload sent to the endpoint and the content the
//! response cache is keyed on, so two prompts that mean the same thing must
//! serialize identically. Normalization trims every string leaf; key order
//! is already canonical because `serde_json` maps are sorted.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CreditAction, ProjectId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryPrompt {
    pub project_id: ProjectId,
    pub premise: String,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotListPrompt {
    pub project_id: ProjectId,
    pub scene_heading: String,
    pub scene_summary: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoboardPrompt {
    pub project_id: ProjectId,
    pub shots: Vec<ShotSummary>,
    #[serde(default)]
    pub style: Option<String>,
}

/// One shot line carried into a photoboard prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotSummary {
    pub number: u32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePrompt {
    pub project_id: ProjectId,
    pub shot_number: u32,
    pub description: String,
    #[serde(default)]
    pub style: Option<String>,
    /// Image model seed. Left empty for first renders; regeneration stamps
    /// a fresh one so the new request cannot collide with a cached reply.
    #[serde(default)]
    pub seed: Option<i64>,
}

/// Any prompt, tagged by the action it asks for
#[derive(Debug, Clone)]
pub enum GenerationPrompt {
    Story(StoryPrompt),
    ShotList(ShotListPrompt),
    Photoboard(PhotoboardPrompt),
    Frame(FramePrompt),
    /// Same inputs as `Frame`, billed as a regeneration
    Regenerate(FramePrompt),
}

impl GenerationPrompt {
    pub fn action(&self) -> CreditAction {
        match self {
            GenerationPrompt::Story(_) => CreditAction::StoryGeneration,
            GenerationPrompt::ShotList(_) => CreditAction::ShotListGeneration,
            GenerationPrompt::Photoboard(_) => CreditAction::PhotoboardGeneration,
            GenerationPrompt::Frame(_) => CreditAction::PhotoboardFrame,
            GenerationPrompt::Regenerate(_) => CreditAction::PhotoboardRegeneration,
        }
    }

    pub fn project_id(&self) -> ProjectId {
        match self {
            GenerationPrompt::Story(p) => p.project_id,
            GenerationPrompt::ShotList(p) => p.project_id,
            GenerationPrompt::Photoboard(p) => p.project_id,
            GenerationPrompt::Frame(p) => p.project_id,
            GenerationPrompt::Regenerate(p) => p.project_id,
        }
    }

    /// Serialize to the endpoint payload, normalized for caching
    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = match self {
            GenerationPrompt::Story(p) => serde_json::to_value(p)?,
            GenerationPrompt::ShotList(p) => serde_json::to_value(p)?,
            GenerationPrompt::Photoboard(p) => serde_json::to_value(p)?,
            GenerationPrompt::Frame(p) => serde_json::to_value(p)?,
            GenerationPrompt::Regenerate(p) => serde_json::to_value(p)?,
        };
        normalize_payload(&mut value);
        Ok(value)
    }
}

/// Trim every string leaf in place, recursing through arrays and objects
pub fn normalize_payload(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.len() != s.len() {
                *s = trimmed.to_string();
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                normalize_payload(item);
            }
        }
        serde_json::Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                normalize_payload(item);
            }
        }
        _ => {}
    }
}
