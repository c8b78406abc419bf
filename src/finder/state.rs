//! Caller-held conversation state and the per-turn engine input.
//!
//! The server keeps nothing between requests. Every turn the caller sends the
//! transcript together with its step index and the answers accepted so far,
//! and applies the engine's `advanced` flag to its own copy afterwards.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EngineError;

use super::questions::QUESTION_COUNT;

/// Who authored a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "agent", alias = "ai")]
    Agent,
}

/// One transcript entry as the frontend sends it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub sender: Sender,
    /// Rendered agent replies (e.g. result tables) may arrive as non-string
    /// JSON; they are kept as empty text since only user text is read.
    #[serde(default, deserialize_with = "text_or_empty")]
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Agent,
            text: text.into(),
        }
    }
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

/// How far a conversation has progressed.
///
/// Invariant at the start of every turn: `answers.len() == step`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub step: usize,
    pub answers: Vec<String>,
}

impl ConversationState {
    pub fn new(step: usize, answers: Vec<String>) -> Self {
        Self { step, answers }
    }

    /// Fresh state: no answers, first question.
    pub fn is_fresh(&self) -> bool {
        self.step == 0 && self.answers.is_empty()
    }

    /// Check the preconditions the engine relies on.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.step >= QUESTION_COUNT {
            return Err(EngineError::InvalidState(format!(
                "step {} is out of range, expected 0..{}",
                self.step, QUESTION_COUNT
            )));
        }
        if self.answers.len() != self.step {
            return Err(EngineError::InvalidState(format!(
                "{} answers supplied for step {}, expected exactly {}",
                self.answers.len(),
                self.step,
                self.step
            )));
        }
        Ok(())
    }

    /// Apply an accepted answer. Callers mirror this after an `advanced` reply;
    /// after the final question the state wraps back to fresh.
    pub fn record(&mut self, answer: impl Into<String>) {
        self.answers.push(answer.into());
        self.step += 1;
        if self.step >= QUESTION_COUNT {
            *self = Self::default();
        }
    }
}

/// Everything the engine needs to decide one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Latest user-authored message.
    pub utterance: String,
    pub state: ConversationState,
    /// True for the very first user message of a fresh conversation. Nothing
    /// has been asked yet, so there is nothing to validate.
    pub opening: bool,
}

impl Turn {
    pub fn new(utterance: impl Into<String>, state: ConversationState, opening: bool) -> Self {
        Self {
            utterance: utterance.into(),
            state,
            opening,
        }
    }

    /// Build a turn from a transcript plus caller-held state.
    ///
    /// The transcript only supplies the latest user message and whether this
    /// is the opening one; the step always comes from `state`.
    pub fn from_transcript(
        messages: &[Message],
        state: ConversationState,
    ) -> Result<Self, EngineError> {
        let mut user_messages = messages.iter().filter(|m| m.sender == Sender::User);
        let user_count = user_messages.clone().count();
        let latest = user_messages
            .next_back()
            .ok_or_else(|| EngineError::InvalidState("transcript has no user message".into()))?;

        let opening = user_count == 1 && state.is_fresh();
        Ok(Self::new(latest.text.trim(), state, opening))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_accepts_matching_state() {
        assert!(ConversationState::default().check().is_ok());
        assert!(
            ConversationState::new(2, vec!["Fintech".into(), "Python".into()])
                .check()
                .is_ok()
        );
    }

    #[test]
    fn check_rejects_step_out_of_range() {
        let state = ConversationState::new(3, vec!["a".into(), "b".into(), "c".into()]);
        assert!(matches!(state.check(), Err(EngineError::InvalidState(_))));
    }

    #[test]
    fn check_rejects_answer_count_mismatch() {
        let state = ConversationState::new(1, vec![]);
        let err = state.check().unwrap_err();
        assert!(err.to_string().contains("0 answers supplied for step 1"));
    }

    #[test]
    fn record_walks_and_wraps() {
        let mut state = ConversationState::default();
        state.record("Fintech");
        assert_eq!(state, ConversationState::new(1, vec!["Fintech".into()]));
        state.record("Python");
        assert_eq!(state.step, 2);
        state.record("Germany");
        assert!(state.is_fresh(), "state resets after the final answer");
    }

    #[test]
    fn opening_turn_detected_on_single_user_message() {
        let messages = vec![Message::user("Healthcare AI")];
        let turn = Turn::from_transcript(&messages, ConversationState::default()).unwrap();
        assert!(turn.opening);
        assert_eq!(turn.utterance, "Healthcare AI");
    }

    #[test]
    fn later_turn_uses_latest_user_message() {
        let messages = vec![
            Message::user("I want to search expert"),
            Message::agent("Could you please tell me ..."),
            Message::user("  Fintech  "),
        ];
        let turn = Turn::from_transcript(&messages, ConversationState::default()).unwrap();
        assert!(!turn.opening);
        assert_eq!(turn.utterance, "Fintech");
    }

    #[test]
    fn single_message_with_progress_is_not_opening() {
        let messages = vec![Message::user("Python")];
        let state = ConversationState::new(1, vec!["Fintech".into()]);
        let turn = Turn::from_transcript(&messages, state).unwrap();
        assert!(!turn.opening);
    }

    #[test]
    fn transcript_without_user_message_is_rejected() {
        let messages = vec![Message::agent("hello")];
        let err = Turn::from_transcript(&messages, ConversationState::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn message_accepts_ai_alias_and_non_string_text() {
        let json = r#"[{"type":"user","text":"hi"},{"type":"ai","text":{"props":{}}}]"#;
        let messages: Vec<Message> = serde_json::from_str(json).unwrap();
        assert_eq!(messages[0], Message::user("hi"));
        assert_eq!(messages[1], Message::agent(""));
    }
}
