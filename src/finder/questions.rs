//! The fixed question table driving the conversation.

use serde::{Deserialize, Serialize};

/// Number of questions a conversation must answer before synthesis.
pub const QUESTION_COUNT: usize = 3;

/// Which requirement a question collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementField {
    Sector,
    Skills,
    Location,
}

impl std::fmt::Display for RequirementField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sector => "sector",
            Self::Skills => "skills",
            Self::Location => "location",
        };
        write!(f, "{s}")
    }
}

/// One prompt shown to the user plus the rule the oracle judges the answer by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub field: RequirementField,
    pub prompt: String,
    pub validation_rule: String,
}

impl Question {
    pub fn new(
        field: RequirementField,
        prompt: impl Into<String>,
        validation_rule: impl Into<String>,
    ) -> Self {
        Self {
            field,
            prompt: prompt.into(),
            validation_rule: validation_rule.into(),
        }
    }
}

/// Ordered, immutable question table, indexed by conversation step.
///
/// Passed into the engine at construction so tests can run engines with
/// different wording side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    questions: [Question; QUESTION_COUNT],
}

impl QuestionSet {
    /// Build a set from three questions in sector, skills, location order.
    pub fn new(sector: Question, skills: Question, location: Question) -> Self {
        debug_assert_eq!(sector.field, RequirementField::Sector);
        debug_assert_eq!(skills.field, RequirementField::Skills);
        debug_assert_eq!(location.field, RequirementField::Location);
        Self {
            questions: [sector, skills, location],
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, step: usize) -> Option<&Question> {
        self.questions.get(step)
    }

    /// Index of the final question.
    pub fn last_step(&self) -> usize {
        QUESTION_COUNT - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

impl Default for QuestionSet {
    fn default() -> Self {
        Self::new(
            Question::new(
                RequirementField::Sector,
                "Could you please tell me what is the focus area or sector of your project?",
                "Is this a valid project sector? Answer only yes or no: ",
            ),
            Question::new(
                RequirementField::Skills,
                "What are the basic skills you are looking for?",
                "Is this a valid list of professional skills? Answer only yes or no: ",
            ),
            Question::new(
                RequirementField::Location,
                "Give the name of countries you're interested in.",
                "Are these valid country names or locations? Answer only yes or no: ",
            ),
        )
    }
}
