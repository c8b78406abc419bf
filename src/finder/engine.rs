//! ConversationEngine: decides, per turn, whether to ask, re-ask or finish.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::EngineError;

use super::model::{EngineResponse, Requirements};
use super::oracle::Oracle;
use super::questions::QuestionSet;
use super::state::Turn;

/// Prefix put in front of a question when its answer was rejected.
pub const REPROMPT_PREFIX: &str = "I couldn't understand your response clearly. ";

/// Introductory sentence of a result.
pub const RESULT_SUMMARY: &str = "Based on your requirements, I've found the following experts:";

/// Stateless decision logic over a fixed question set.
///
/// Holds no per-conversation data; one engine serves any number of
/// concurrent conversations.
pub struct ConversationEngine {
    questions: QuestionSet,
    oracle: Arc<dyn Oracle>,
}

impl ConversationEngine {
    pub fn new(questions: QuestionSet, oracle: Arc<dyn Oracle>) -> Self {
        Self { questions, oracle }
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    /// Decide one turn.
    ///
    /// 1. Reject broken caller state before touching the oracle.
    /// 2. On the opening turn, ask the current question without validating.
    /// 3. Otherwise validate the utterance against the current question:
    ///    re-ask on rejection, ask the next question on acceptance, or
    ///    synthesize profiles once the last question is answered.
    pub async fn advance(&self, turn: &Turn) -> Result<EngineResponse, EngineError> {
        let state = &turn.state;
        state.check()?;
        let step = state.step;
        let question = self.questions.get(step).ok_or_else(|| {
            EngineError::InvalidState(format!("no question configured for step {step}"))
        })?;

        if turn.opening {
            debug!(step, "Opening turn, asking first question");
            return Ok(EngineResponse::Prompt {
                text: question.prompt.clone(),
                advanced: false,
            });
        }

        if turn.utterance.trim().is_empty() {
            return Err(EngineError::InvalidState("utterance is empty".into()));
        }

        let valid = self
            .oracle
            .validate(&question.validation_rule, &turn.utterance)
            .await?;

        if !valid {
            info!(step, field = %question.field, "Answer rejected, re-asking");
            return Ok(EngineResponse::Prompt {
                text: format!("{REPROMPT_PREFIX}{}", question.prompt),
                advanced: false,
            });
        }

        if step < self.questions.last_step() {
            let next = self.questions.get(step + 1).ok_or_else(|| {
                EngineError::InvalidState(format!("no question configured for step {}", step + 1))
            })?;
            info!(step, field = %question.field, "Answer accepted");
            return Ok(EngineResponse::Prompt {
                text: next.prompt.clone(),
                advanced: true,
            });
        }

        let mut answers = state.answers.clone();
        answers.push(turn.utterance.clone());
        let requirements = Requirements::from_answers(&answers)?;

        info!(
            sector = %requirements.sector,
            skills = %requirements.skills,
            location = %requirements.location,
            "All requirements collected, synthesizing"
        );
        let profiles = self.oracle.synthesize(&requirements).await?;

        Ok(EngineResponse::Result {
            summary_text: RESULT_SUMMARY.to_string(),
            profiles,
        })
    }
}
