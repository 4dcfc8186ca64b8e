//! Outcome prognosis: a discrete distribution over four scenarios.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use juriflow::error::{Error, Result};
use juriflow::gateway::{CompletionRequest, LlmGateway};
use juriflow_agents::AgentOutcome;

/// Tolerance on the probability sum, to absorb model rounding.
const SUM_TOLERANCE: f64 = 1.0;

const SYSTEM_PROMPT: &str = "You are a senior litigation strategist. Estimate the probable \
outcomes of the case. Respond with STRICT JSON and nothing else, in exactly this shape: \
{\"scenarios\": [{\"scenario\": \"VICTORY_TOTAL|VICTORY_PARTIAL|SETTLEMENT|DEFEAT\", \
\"probability\": <0-100>, \"value_range\": \"<optional>\", \"estimated_duration_months\": \
<optional integer>}], \"overall_recommendation\": \"<text>\", \"critical_factors\": \
[\"<factor>\"]}. Include all four scenarios exactly once; probabilities must sum to 100.";

/// The four outcome scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scenario {
    VictoryTotal,
    VictoryPartial,
    Settlement,
    Defeat,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Self::VictoryTotal,
        Self::VictoryPartial,
        Self::Settlement,
        Self::Defeat,
    ];
}

/// Probability and context for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutlook {
    pub scenario: Scenario,
    /// Probability in `[0, 100]`.
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_months: Option<u32>,
}

/// The full prognosis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prognosis {
    pub scenarios: Vec<ScenarioOutlook>,
    pub overall_recommendation: String,
    #[serde(default)]
    pub critical_factors: Vec<String>,
}

impl Prognosis {
    /// Enforce the distribution invariants: every scenario exactly once,
    /// probabilities finite and non-negative, sum within 100 +/- 1.
    pub fn validate(&self) -> Result<()> {
        for expected in Scenario::ALL {
            let count = self
                .scenarios
                .iter()
                .filter(|s| s.scenario == expected)
                .count();
            if count != 1 {
                return Err(Error::validation(format!(
                    "prognosis must contain scenario {expected:?} exactly once, found {count}"
                )));
            }
        }
        for outlook in &self.scenarios {
            if !outlook.probability.is_finite() || outlook.probability < 0.0 {
                return Err(Error::validation(format!(
                    "probability for {:?} must be a non-negative number",
                    outlook.scenario
                )));
            }
        }
        let sum: f64 = self.scenarios.iter().map(|s| s.probability).sum();
        if (sum - 100.0).abs() > SUM_TOLERANCE {
            return Err(Error::validation(format!(
                "scenario probabilities sum to {sum}, expected 100 +/- 1"
            )));
        }
        Ok(())
    }
}

/// Runs the prognosis LLM step.
pub struct PrognosisAnalyzer {
    gateway: Arc<LlmGateway>,
    model: String,
    temperature: f32,
}

impl PrognosisAnalyzer {
    pub fn new(gateway: Arc<LlmGateway>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            gateway,
            model: model.into(),
            temperature,
        }
    }

    /// Combine the compiled opinion, the specialist opinions and the case
    /// facts into a validated prognosis.
    pub async fn analyze(
        &self,
        compiled_opinion: &str,
        opinions: &[AgentOutcome],
        case_facts: &str,
    ) -> Result<Prognosis> {
        let opinions_block = opinions
            .iter()
            .filter_map(AgentOutcome::as_opinion)
            .map(|op| format!("## {}\n{}", op.agent_name, op.opinion))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "Compiled legal opinion:\n{compiled_opinion}\n\nSpecialist opinions:\n\
             {opinions_block}\n\nCase facts:\n{case_facts}\n\nReturn the JSON object now."
        );
        let request = CompletionRequest::new(prompt, self.model.clone(), self.temperature)
            .with_system(SYSTEM_PROMPT);
        let outcome = self.gateway.complete(request).await?;

        parse_prognosis(&outcome.text)
    }
}

pub(crate) fn parse_prognosis(raw: &str) -> Result<Prognosis> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(Error::parse_failure("response contains no JSON object", raw));
    };
    if end <= start {
        return Err(Error::parse_failure("response contains no JSON object", raw));
    }

    let prognosis: Prognosis = serde_json::from_str(&raw[start..=end])
        .map_err(|e| Error::parse_failure(format!("invalid prognosis JSON: {e}"), raw))?;
    prognosis.validate()?;
    Ok(prognosis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use juriflow::chat_models::{ChatModel, ChatRequest, ChatResponse};
    use juriflow::error::Result as CoreResult;
    use juriflow::opinions::AgentOpinion;
    use std::sync::Mutex;

    struct RecordingModel {
        prompts: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn complete(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
            self.prompts.lock().unwrap().push(request);
            Ok(ChatResponse {
                text: valid_json(25.0, 25.0, 25.0, 25.0),
                usage: None,
            })
        }
    }

    fn opinion(name: &str, text: &str) -> AgentOutcome {
        AgentOutcome::Opinion(AgentOpinion {
            agent_id: name.to_lowercase(),
            agent_name: name.to_string(),
            agent_kind: "expert".into(),
            specialty: None,
            opinion: text.to_string(),
            confidence: 0.8,
            referenced_documents: vec![],
            cited_legislation: vec![],
            created_at: chrono::Utc::now(),
        })
    }

    #[tokio::test]
    async fn analyzer_feeds_opinions_and_facts_into_the_prompt() {
        let model = Arc::new(RecordingModel {
            prompts: Mutex::new(Vec::new()),
        });
        let gateway = Arc::new(juriflow::gateway::LlmGateway::new(
            Arc::clone(&model) as Arc<dyn ChatModel>,
        ));
        let analyzer = PrognosisAnalyzer::new(gateway, "gpt-4", 0.3);

        let opinions = vec![
            opinion("Medical Expert", "nexus is supported"),
            opinion("Labor Attorney", "dismissal was irregular"),
        ];
        let prognosis = analyzer
            .analyze("compiled opinion text", &opinions, "case facts excerpt")
            .await
            .unwrap();
        prognosis.validate().unwrap();

        let prompts = model.prompts.lock().unwrap();
        let user = &prompts[0].messages.last().unwrap().content;
        assert!(user.contains("compiled opinion text"));
        assert!(user.contains("nexus is supported"));
        assert!(user.contains("dismissal was irregular"));
        assert!(user.contains("case facts excerpt"));
    }

    fn valid_json(p1: f64, p2: f64, p3: f64, p4: f64) -> String {
        format!(
            "{{\"scenarios\": [\
             {{\"scenario\": \"VICTORY_TOTAL\", \"probability\": {p1}}},\
             {{\"scenario\": \"VICTORY_PARTIAL\", \"probability\": {p2}, \
               \"value_range\": \"R$ 20k-60k\", \"estimated_duration_months\": 18}},\
             {{\"scenario\": \"SETTLEMENT\", \"probability\": {p3}}},\
             {{\"scenario\": \"DEFEAT\", \"probability\": {p4}}}],\
             \"overall_recommendation\": \"Pursue settlement first.\",\
             \"critical_factors\": [\"strength of the medical evidence\"]}}"
        )
    }

    #[test]
    fn valid_prognosis_parses_and_validates() {
        let prognosis = parse_prognosis(&valid_json(10.0, 40.0, 35.0, 15.0)).unwrap();
        assert_eq!(prognosis.scenarios.len(), 4);
        assert_eq!(
            prognosis.scenarios[1].value_range.as_deref(),
            Some("R$ 20k-60k")
        );
        assert_eq!(prognosis.scenarios[1].estimated_duration_months, Some(18));
        assert!(!prognosis.overall_recommendation.is_empty());
    }

    #[test]
    fn rounding_within_one_point_is_accepted() {
        assert!(parse_prognosis(&valid_json(10.4, 40.0, 35.0, 15.0)).is_ok());
    }

    #[test]
    fn sum_off_by_more_than_one_is_rejected() {
        let err = parse_prognosis(&valid_json(10.0, 40.0, 35.0, 30.0)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn negative_probability_is_rejected() {
        let err = parse_prognosis(&valid_json(-5.0, 50.0, 40.0, 15.0)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn missing_scenario_is_rejected() {
        let raw = "{\"scenarios\": [\
                   {\"scenario\": \"VICTORY_TOTAL\", \"probability\": 50},\
                   {\"scenario\": \"DEFEAT\", \"probability\": 50}],\
                   \"overall_recommendation\": \"x\", \"critical_factors\": []}";
        let err = parse_prognosis(raw).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn duplicated_scenario_is_rejected() {
        let raw = "{\"scenarios\": [\
                   {\"scenario\": \"SETTLEMENT\", \"probability\": 25},\
                   {\"scenario\": \"SETTLEMENT\", \"probability\": 25},\
                   {\"scenario\": \"VICTORY_TOTAL\", \"probability\": 25},\
                   {\"scenario\": \"DEFEAT\", \"probability\": 25}],\
                   \"overall_recommendation\": \"x\", \"critical_factors\": []}";
        assert!(parse_prognosis(raw).is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_failure() {
        let err = parse_prognosis("the case looks strong").unwrap_err();
        assert!(matches!(err, Error::ParseFailure { .. }));
    }

    #[test]
    fn fenced_json_is_accepted() {
        let raw = format!("```json\n{}\n```", valid_json(25.0, 25.0, 25.0, 25.0));
        assert!(parse_prognosis(&raw).is_ok());
    }
}
