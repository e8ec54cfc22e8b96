//! Generated artifacts - typed outputs of the AI generation endpoint
//!
//! Each credit action produces one artifact shape. The endpoint returns raw
//! JSON; parsing it into these types happens once, at the generation client,
//! so every later consumer works with structured data. A payload that does
//! not match the expected shape is a hard failure, never retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ArtifactId, CreditAction, ProjectId};

/// A story treatment for a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub title: String,
    pub logline: String,
    pub synopsis: String,
    #[serde(default)]
    pub scenes: Vec<StoryScene>,
}

/// One scene within a story treatment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryScene {
    pub heading: String,
    pub summary: String,
}

/// A shot breakdown for a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotList {
    pub shots: Vec<Shot>,
}

/// A single planned camera setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub number: u32,
    pub description: String,
    pub shot_type: String,
    #[serde(default)]
    pub camera_movement: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

/// A visual board of rendered frames, one per shot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photoboard {
    pub frames: Vec<PhotoboardFrame>,
}

/// One rendered frame of a photoboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoboardFrame {
    pub shot_number: u32,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    /// Seed the image model used; kept so a frame can be reproduced
    #[serde(default)]
    pub seed: Option<i64>,
}

/// Output of a generation action, tagged by shape
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GeneratedArtifact {
    Story(Story),
    ShotList(ShotList),
    Photoboard(Photoboard),
    Frame(PhotoboardFrame),
}

impl GeneratedArtifact {
    /// Parse the endpoint's `data` payload into the shape the action promises
    pub fn from_endpoint(
        action: CreditAction,
        data: &serde_json::Value,
    ) -> Result<Self, ArtifactParseError> {
        let parse_err = |e: serde_json::Error| ArtifactParseError {
            kind: Self::kind_for(action),
            reason: e.to_string(),
        };
        match action {
            CreditAction::StoryGeneration => {
                Ok(Self::Story(serde_json::from_value(data.clone()).map_err(parse_err)?))
            }
            CreditAction::ShotListGeneration => {
                Ok(Self::ShotList(serde_json::from_value(data.clone()).map_err(parse_err)?))
            }
            CreditAction::PhotoboardGeneration => {
                Ok(Self::Photoboard(serde_json::from_value(data.clone()).map_err(parse_err)?))
            }
            CreditAction::PhotoboardFrame | CreditAction::PhotoboardRegeneration => {
                Ok(Self::Frame(serde_json::from_value(data.clone()).map_err(parse_err)?))
            }
        }
    }

    /// Stable kind tag stored with the artifact row
    pub fn kind(&self) -> &'static str {
        match self {
            GeneratedArtifact::Story(_) => "story",
            GeneratedArtifact::ShotList(_) => "shot_list",
            GeneratedArtifact::Photoboard(_) => "photoboard",
            GeneratedArtifact::Frame(_) => "photoboard_frame",
        }
    }

    fn kind_for(action: CreditAction) -> &'static str {
        match action {
            CreditAction::StoryGeneration => "story",
            CreditAction::ShotListGeneration => "shot_list",
            CreditAction::PhotoboardGeneration => "photoboard",
            CreditAction::PhotoboardFrame | CreditAction::PhotoboardRegeneration => {
                "photoboard_frame"
            }
        }
    }
}

/// The endpoint answered, but not with the promised shape
#[derive(Debug, Clone, thiserror::Error)]
#[error("Malformed {kind} payload: {reason}")]
pub struct ArtifactParseError {
    pub kind: &'static str,
    pub reason: String,
}

/// Receipt for a persisted artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactRecord {
    pub id: ArtifactId,
    pub project_id: ProjectId,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_story_payload() {
        let data = serde_json::json!({
            "title": "The Long Rain",
            "logline": "A stranded crew waits out a storm that never ends.",
            "synopsis": "On a drowned world, four survivors walk toward the last sun dome.",
            "scenes": [
                {"heading": "EXT. JUNGLE - DAY", "summary": "The crew abandons the wreck."}
            ]
        });

        let artifact = GeneratedArtifact::from_endpoint(CreditAction::StoryGeneration, &data)
            .unwrap();
        match artifact {
            GeneratedArtifact::Story(story) => {
                assert_eq!(story.title, "The Long Rain");
                assert_eq!(story.scenes.len(), 1);
            }
            other => panic!("Expected a story, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_shot_list_payload() {
        let data = serde_json::json!({
            "shots": [
                {"number": 1, "description": "The wreck smolders", "shot_type": "wide"},
                {"number": 2, "description": "Rain on a visor", "shot_type": "close-up",
                 "camera_movement": "slow push-in", "duration_seconds": 4}
            ]
        });

        let artifact =
            GeneratedArtifact::from_endpoint(CreditAction::ShotListGeneration, &data).unwrap();
        match artifact {
            GeneratedArtifact::ShotList(list) => {
                assert_eq!(list.shots.len(), 2);
                assert_eq!(list.shots[1].camera_movement.as_deref(), Some("slow push-in"));
            }
            other => panic!("Expected a shot list, got {:?}", other),
        }
    }

    #[test]
    fn test_regeneration_parses_a_single_frame() {
        let data = serde_json::json!({
            "shot_number": 3,
            "image_url": "https://cdn.example.com/frames/3.png",
            "seed": 42
        });

        let artifact =
            GeneratedArtifact::from_endpoint(CreditAction::PhotoboardRegeneration, &data)
                .unwrap();
        assert_eq!(artifact.kind(), "photoboard_frame");
    }

    #[test]
    fn test_wrong_shape_is_a_parse_error() {
        // A frame payload handed to the story parser
        let data = serde_json::json!({"shot_number": 1, "image_url": "x"});

        let err = GeneratedArtifact::from_endpoint(CreditAction::StoryGeneration, &data)
            .unwrap_err();
        assert_eq!(err.kind, "story");
    }

    #[test]
    fn test_kind_tags() {
        let frame = GeneratedArtifact::Frame(PhotoboardFrame {
            shot_number: 1,
            image_url: "x".to_string(),
            caption: None,
            seed: None,
        });
        assert_eq!(frame.kind(), "photoboard_frame");

        let board = GeneratedArtifact::Photoboard(Photoboard { frames: vec![] });
        assert_eq!(board.kind(), "photoboard");
    }
}
