//! Expert profiles, collected requirements and engine responses.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;

use super::questions::QUESTION_COUNT;

/// A generated expert profile. Ephemeral: produced per request, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpertProfile {
    pub name: String,
    pub role: String,
    #[serde(rename = "experience", deserialize_with = "years_from_number_or_text")]
    pub years_experience: u32,
    #[serde(deserialize_with = "list_from_array_or_text")]
    pub skills: Vec<String>,
    #[serde(rename = "companies", deserialize_with = "list_from_array_or_text")]
    pub past_companies: Vec<String>,
    pub location: String,
    pub availability: String,
}

/// Accepts `12`, `12.0`, `"12"` or `"12 years"`.
fn years_from_number_or_text<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("invalid experience value {n}"))),
        serde_json::Value::String(s) => {
            let digits: String = s
                .trim()
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits
                .parse()
                .map_err(|_| D::Error::custom(format!("experience '{s}' has no year count")))
        }
        other => Err(D::Error::custom(format!(
            "expected experience as number or text, got {other}"
        ))),
    }
}

/// Accepts a JSON array of strings or one comma-separated string. Entries are
/// trimmed and de-duplicated, first occurrence wins.
fn list_from_array_or_text<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrText {
        List(Vec<String>),
        Text(String),
    }

    let raw = match ListOrText::deserialize(deserializer)? {
        ListOrText::List(items) => items,
        ListOrText::Text(text) => text.split(',').map(str::to_string).collect(),
    };

    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for item in raw {
        let item = item.trim();
        if !item.is_empty() && !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    Ok(out)
}

/// The three accepted answers, in question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirements {
    pub sector: String,
    pub skills: String,
    pub location: String,
}

impl Requirements {
    /// Build from exactly `QUESTION_COUNT` answers ordered sector, skills, location.
    pub fn from_answers(answers: &[String]) -> Result<Self, EngineError> {
        match answers {
            [sector, skills, location] => Ok(Self {
                sector: sector.clone(),
                skills: skills.clone(),
                location: location.clone(),
            }),
            _ => Err(EngineError::InvalidState(format!(
                "synthesis needs {} answers, got {}",
                QUESTION_COUNT,
                answers.len()
            ))),
        }
    }
}

/// What the engine decided for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResponse {
    /// Ask (or re-ask) a question. `advanced` tells the caller whether the
    /// utterance was accepted and its step should move forward.
    Prompt { text: String, advanced: bool },
    /// All requirements collected; here are the matching experts.
    Result {
        summary_text: String,
        profiles: Vec<ExpertProfile>,
    },
}

impl EngineResponse {
    pub fn advanced(&self) -> bool {
        match self {
            Self::Prompt { advanced, .. } => *advanced,
            Self::Result { .. } => true,
        }
    }
}

/// Discriminator of the wire reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Question,
    Result,
}

/// Wire form of an `EngineResponse`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert: Option<Vec<ExpertProfile>>,
}

impl From<EngineResponse> for ChatReply {
    fn from(response: EngineResponse) -> Self {
        match response {
            EngineResponse::Prompt { text, advanced } => Self {
                kind: ReplyKind::Question,
                content: text,
                resolve: Some(advanced),
                expert: None,
            },
            EngineResponse::Result {
                summary_text,
                profiles,
            } => Self {
                kind: ReplyKind::Result,
                content: summary_text,
                resolve: Some(true),
                expert: Some(profiles),
            },
        }
    }
}
