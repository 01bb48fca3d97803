//! Two-speaker dialogue scripts and their strict structured-output validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::completion::{CompletionService, ResponseShape};
use crate::error::{PodcastError, Result};
use crate::summarize::FactSummary;

/// The two voices of the show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    /// The host.
    Mark,
    /// The guest specialist.
    Anna,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Mark => "Mark",
            Speaker::Anna => "Anna",
        }
    }

    /// Exact, case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Mark" => Some(Speaker::Mark),
            "Anna" => Some(Speaker::Anna),
            _ => None,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker_name: Speaker,
    pub speaker_text: String,
}

impl DialogueLine {
    pub fn new(speaker_name: Speaker, speaker_text: impl Into<String>) -> Self {
        Self {
            speaker_name,
            speaker_text: speaker_text.into(),
        }
    }
}

/// Ordered lines; insertion order is speaking order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueScript {
    pub podcast_dialogues: Vec<DialogueLine>,
}

impl DialogueScript {
    pub fn new(lines: Vec<DialogueLine>) -> Self {
        Self {
            podcast_dialogues: lines,
        }
    }

    pub fn lines(&self) -> &[DialogueLine] {
        &self.podcast_dialogues
    }

    pub fn len(&self) -> usize {
        self.podcast_dialogues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.podcast_dialogues.is_empty()
    }

    /// The first `max_lines` lines only. Meant for quick test renders.
    pub fn truncated(&self, max_lines: usize) -> DialogueScript {
        DialogueScript::new(
            self.podcast_dialogues
                .iter()
                .take(max_lines)
                .cloned()
                .collect(),
        )
    }

    /// Validate a structured response against the dialogue shape.
    ///
    /// Nothing is coerced: a missing key, a wrongly typed field, a speaker
    /// other than the known two or an empty line list rejects the whole
    /// response.
    pub fn from_value(value: &Value) -> Result<DialogueScript> {
        let object = value.as_object().ok_or_else(|| {
            PodcastError::SchemaViolation("top level is not an object".to_string())
        })?;

        let entries = object
            .get("podcast_dialogues")
            .ok_or_else(|| {
                PodcastError::SchemaViolation("missing key 'podcast_dialogues'".to_string())
            })?
            .as_array()
            .ok_or_else(|| {
                PodcastError::SchemaViolation("'podcast_dialogues' is not an array".to_string())
            })?;
        if entries.is_empty() {
            return Err(PodcastError::SchemaViolation(
                "'podcast_dialogues' has no lines".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let name = string_field(entry, "speaker_name", i)?;
            let text = string_field(entry, "speaker_text", i)?;
            let speaker = Speaker::from_name(name).ok_or_else(|| {
                PodcastError::SchemaViolation(format!(
                    "entry {} has unknown speaker_name '{}'",
                    i, name
                ))
            })?;
            lines.push(DialogueLine::new(speaker, text));
        }

        Ok(DialogueScript::new(lines))
    }
}

fn string_field<'a>(entry: &'a Value, field: &str, index: usize) -> Result<&'a str> {
    entry
        .get(field)
        .ok_or_else(|| {
            PodcastError::SchemaViolation(format!("entry {} is missing '{}'", index, field))
        })?
        .as_str()
        .ok_or_else(|| {
            PodcastError::SchemaViolation(format!("entry {} field '{}' is not a string", index, field))
        })
}

/// JSON schema handed to the completion service.
pub fn dialogue_shape() -> ResponseShape {
    ResponseShape {
        name: "Dialogue".to_string(),
        description: Some("Creating a dialogue between two people.".to_string()),
        schema: json!({
            "type": "object",
            "properties": {
                "podcast_dialogues": {
                    "type": "array",
                    "description": "An array of podcast dialogues containing the speaker name and their dialogue or text",
                    "minItems": 1,
                    "items": {
                        "type": "object",
                        "properties": {
                            "speaker_name": {
                                "type": "string",
                                "enum": ["Mark", "Anna"],
                                "description": "The name of the person who is speaking in the podcast. Should be Mark, the host, or Anna, the specialist in birds."
                            },
                            "speaker_text": {
                                "type": "string",
                                "description": "The specific dialogue or text spoken by the person"
                            }
                        },
                        "required": ["speaker_name", "speaker_text"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["podcast_dialogues"],
            "additionalProperties": false
        }),
    }
}

/// Turn a fact summary into a validated script.
pub async fn generate_dialogue(
    service: &dyn CompletionService,
    summary: &FactSummary,
    system_prompt: &str,
    temperature: f32,
) -> Result<DialogueScript> {
    let value = service
        .complete_structured(system_prompt, summary.as_str(), temperature, &dialogue_shape())
        .await?;
    let script = DialogueScript::from_value(&value)?;
    info!(lines = script.len(), "dialogue script ready");
    Ok(script)
}
