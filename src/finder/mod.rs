//! Expert finder: requirement-gathering conversation.
//!
//! The engine asks a fixed sequence of questions (sector, skills, location),
//! has an oracle judge each answer, and once every answer is accepted asks the
//! oracle for matching expert profiles. Conversation state lives with the
//! caller and is sent in full on every turn.

pub mod engine;
pub mod model;
pub mod oracle;
pub mod questions;
pub mod routes;
pub mod state;

pub use engine::{ConversationEngine, REPROMPT_PREFIX, RESULT_SUMMARY};
pub use model::{ChatReply, EngineResponse, ExpertProfile, ReplyKind, Requirements};
pub use oracle::{LlmOracle, Oracle, OracleConfig, PROFILE_COUNT, Verdict, parse_verdict};
pub use questions::{QUESTION_COUNT, Question, QuestionSet, RequirementField};
pub use routes::{ChatRouteState, app, chat_routes};
pub use state::{ConversationState, Message, Sender, Turn};
