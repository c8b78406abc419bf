//! The judgment/generation oracle the engine consults.
//!
//! `Oracle` is the two-call capability the engine depends on. `LlmOracle` is
//! the production implementation over an `LlmProvider`; it owns prompt
//! wording, the per-call timeout and parsing of the model's replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::OracleError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, estimate_cost};

use super::model::{ExpertProfile, Requirements};

/// Number of profiles a synthesis asks for.
pub const PROFILE_COUNT: usize = 10;

/// Validation and synthesis, as seen by the engine.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Judge `answer` against `rule`. Only a clear "yes" is `true`.
    async fn validate(&self, rule: &str, answer: &str) -> Result<bool, OracleError>;

    /// Produce expert profiles matching the collected requirements.
    async fn synthesize(
        &self,
        requirements: &Requirements,
    ) -> Result<Vec<ExpertProfile>, OracleError>;
}

/// Interpretation of a validation reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    Ambiguous,
}

/// Strict yes/no extraction: trim, lowercase, drop one trailing `.` or `!`,
/// then require an exact match.
pub fn parse_verdict(reply: &str) -> Verdict {
    let normalized = reply.trim().to_lowercase();
    let normalized = normalized
        .strip_suffix(['.', '!'])
        .unwrap_or(&normalized)
        .trim_end();
    match normalized {
        "yes" => Verdict::Yes,
        "no" => Verdict::No,
        _ => Verdict::Ambiguous,
    }
}

/// Tunables for `LlmOracle`.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Upper bound on a single oracle call.
    pub timeout: Duration,
    /// Output cap for a yes/no verdict. OpenAI rejects caps below
    /// `MIN_OUTPUT_TOKENS`; Anthropic requires one to be set.
    pub validation_max_tokens: u32,
    /// Sampling temperature for profile generation.
    pub synthesis_temperature: f32,
    /// Max tokens for the profile list.
    pub synthesis_max_tokens: u32,
}

/// Smallest output cap every supported backend accepts.
pub const MIN_OUTPUT_TOKENS: u32 = 16;

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            validation_max_tokens: MIN_OUTPUT_TOKENS,
            synthesis_temperature: 0.5,
            synthesis_max_tokens: 4096,
        }
    }
}

/// `Oracle` backed by a text-generation model.
pub struct LlmOracle {
    llm: Arc<dyn LlmProvider>,
    config: OracleConfig,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmProvider>, config: OracleConfig) -> Self {
        Self { llm, config }
    }

    async fn call(
        &self,
        operation: &'static str,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, OracleError> {
        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| OracleError::Timeout {
                operation,
                timeout: self.config.timeout,
            })??;

        let cost = estimate_cost(
            self.llm.cost_per_token(),
            response.input_tokens,
            response.output_tokens,
        );
        info!(
            operation,
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            cost_usd = %cost,
            "Oracle call completed"
        );
        Ok(response)
    }
}

/// Whether a reply used its whole output budget and was likely cut short.
fn hit_token_limit(response: &CompletionResponse, max_tokens: u32) -> bool {
    response.output_tokens >= max_tokens
}

/// Prompt asking for `PROFILE_COUNT` profiles as a JSON array.
pub fn synthesis_prompt(requirements: &Requirements) -> String {
    format!(
        "Generate {count} expert profiles for the {sector} sector with skills in {skills} \
         located in {location}. Return a JSON array with name, role, experience, skills, \
         companies, location, availability.\n\n\
         - \"experience\" is the number of years of professional experience\n\
         - \"skills\" and \"companies\" are arrays of strings\n\n\
         ONLY output the JSON array. No other text.",
        count = PROFILE_COUNT,
        sector = requirements.sector,
        skills = requirements.skills,
        location = requirements.location,
    )
}

/// Parse a synthesis reply into profiles.
///
/// Only the first JSON value is read, so notes after the array are ignored.
/// Broken JSON and empty lists are errors: an empty result would tell the user
/// no experts exist. Extra entries beyond `PROFILE_COUNT` are dropped.
pub fn parse_profiles(reply: &str) -> Result<Vec<ExpertProfile>, OracleError> {
    let json = extract_json_array(reply);
    let mut stream = serde_json::Deserializer::from_str(json).into_iter::<Vec<ExpertProfile>>();
    let mut profiles = match stream.next() {
        Some(Ok(profiles)) => profiles,
        Some(Err(e)) => {
            return Err(OracleError::MalformedSynthesis {
                reason: e.to_string(),
            });
        }
        None => {
            return Err(OracleError::MalformedSynthesis {
                reason: "reply contained no JSON".to_string(),
            });
        }
    };

    if profiles.is_empty() {
        return Err(OracleError::MalformedSynthesis {
            reason: "no profiles returned".to_string(),
        });
    }
    if profiles.len() < PROFILE_COUNT {
        warn!(
            count = profiles.len(),
            expected = PROFILE_COUNT,
            "Synthesis returned fewer profiles than requested"
        );
    }
    profiles.truncate(PROFILE_COUNT);
    Ok(profiles)
}

/// Extract a JSON array from model output that might contain markdown or
/// extra text. Returns the trimmed input when no array bounds are found.
fn extract_json_array(text: &str) -> &str {
    let trimmed = text.trim();

    if !trimmed.starts_with('[') {
        if let Some(start) = trimmed.find("```") {
            let after = &trimmed[start + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            if let Some(end) = after.find("```") {
                let inner = after[..end].trim();
                if inner.starts_with('[') {
                    return inner;
                }
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) {
        if end > start {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn validate(&self, rule: &str, answer: &str) -> Result<bool, OracleError> {
        let request = CompletionRequest::new(vec![ChatMessage::user(format!("{rule}{answer}"))])
            .with_temperature(0.0)
            .with_max_tokens(self.config.validation_max_tokens.max(MIN_OUTPUT_TOKENS));
        let response = self.call("validate", request).await?;

        match parse_verdict(&response.content) {
            Verdict::Yes => Ok(true),
            Verdict::No => Ok(false),
            Verdict::Ambiguous => {
                // Re-asking keeps the conversation going; a crash would not.
                warn!(reply = %response.content, "Ambiguous validation verdict, treating as no");
                Ok(false)
            }
        }
    }

    async fn synthesize(
        &self,
        requirements: &Requirements,
    ) -> Result<Vec<ExpertProfile>, OracleError> {
        debug!(
            sector = %requirements.sector,
            skills = %requirements.skills,
            location = %requirements.location,
            "Synthesizing expert profiles"
        );
        let request = CompletionRequest::new(vec![ChatMessage::user(synthesis_prompt(
            requirements,
        ))])
        .with_temperature(self.config.synthesis_temperature)
        .with_max_tokens(self.config.synthesis_max_tokens);
        let response = self.call("synthesize", request).await?;

        parse_profiles(&response.content).inspect_err(|e| {
            let truncated = hit_token_limit(&response, self.config.synthesis_max_tokens);
            warn!(
                error = %e,
                truncated,
                output_tokens = response.output_tokens,
                reply = %response.content,
                "Failed to parse synthesized profiles"
            );
        })
    }
}
