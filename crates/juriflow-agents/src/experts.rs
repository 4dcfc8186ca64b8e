//! Technical expert agents.

use juriflow::opinions::ContextDocument;

use crate::agent::{
    format_context, format_extras, matched_triggers, Agent, AgentExtras, AgentIdentity, AgentKind,
};

const MEDICAL_TRIGGERS: &[&str] = &[
    "illness",
    "injury",
    "diagnosis",
    "treatment",
    "incapacity",
    "nexus",
    "occupational disease",
];

const SAFETY_TRIGGERS: &[&str] = &[
    "accident",
    "protective equipment",
    "ppe",
    "safety standard",
    "hazard",
    "unhealthy conditions",
    "risk exposure",
];

/// Shared shape of the expert prompt: specialty framing, case context,
/// question, detected focus points, caller extras.
fn expert_prompt(
    role_line: &str,
    guidance: &str,
    triggers: &[&str],
    context_docs: &[ContextDocument],
    question: &str,
    extras: &AgentExtras,
) -> String {
    let focus = matched_triggers(question, triggers);
    let focus_section = if focus.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nThe question touches on: {}. Address each point explicitly.",
            focus.join(", ")
        )
    };

    format!(
        "{role_line}\n\n{guidance}\n\nCase documents:\n{context}\n\nQuestion:\n{question}\
         {focus_section}{extras}\n\nGive a technical opinion grounded in the documents above. \
         State the limits of what can be concluded from the available evidence.",
        context = format_context(context_docs),
        extras = format_extras(extras),
    )
}

/// Occupational-medicine expert.
pub struct MedicalExpert {
    model: String,
    temperature: f32,
}

impl MedicalExpert {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }
}

impl Agent for MedicalExpert {
    fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            id: "medical",
            name: "Medical Expert",
            description: "Occupational-medicine assessment: diagnoses, causal nexus, incapacity",
            kind: AgentKind::Expert,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn system_prompt(&self) -> Option<String> {
        Some(
            "You are a physician specialized in occupational medicine writing technical \
             opinions for legal proceedings. Be precise, cite the evidence you rely on, and \
             separate established facts from clinical hypotheses."
                .to_string(),
        )
    }

    fn build_prompt(
        &self,
        context_docs: &[ContextDocument],
        question: &str,
        extras: &AgentExtras,
    ) -> String {
        expert_prompt(
            "Provide a medical-expert assessment of the case below.",
            "Evaluate the clinical evidence: diagnoses, treatment history, degree of \
             incapacity, and whether a causal nexus with the work activity can be sustained.",
            MEDICAL_TRIGGERS,
            context_docs,
            question,
            extras,
        )
    }
}

/// Workplace-safety engineering expert.
pub struct SafetyExpert {
    model: String,
    temperature: f32,
}

impl SafetyExpert {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }
}

impl Agent for SafetyExpert {
    fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            id: "workplace_safety",
            name: "Workplace Safety Expert",
            description: "Safety-engineering assessment: hazards, protective measures, compliance",
            kind: AgentKind::Expert,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn system_prompt(&self) -> Option<String> {
        Some(
            "You are a workplace safety engineer writing technical opinions for legal \
             proceedings. Assess working conditions against applicable safety standards and \
             say which protective measures were or were not in place."
                .to_string(),
        )
    }

    fn build_prompt(
        &self,
        context_docs: &[ContextDocument],
        question: &str,
        extras: &AgentExtras,
    ) -> String {
        expert_prompt(
            "Provide a workplace-safety assessment of the case below.",
            "Evaluate exposure to hazards, the adequacy of protective equipment and training, \
             and whether the employer met its safety obligations.",
            SAFETY_TRIGGERS,
            context_docs,
            question,
            extras,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn context() -> Vec<ContextDocument> {
        vec![
            ContextDocument::new(Some("doc-1".into()), "Medical report: tendinitis."),
            ContextDocument::new(Some("doc-2".into()), "Shift logs."),
        ]
    }

    #[test]
    fn medical_prompt_carries_context_and_question() {
        let expert = MedicalExpert::new("gpt-4", 0.2);
        let prompt = expert.build_prompt(&context(), "Is there a causal nexus?", &HashMap::new());
        assert!(prompt.contains("[Document 1]"));
        assert!(prompt.contains("Medical report: tendinitis."));
        assert!(prompt.contains("Is there a causal nexus?"));
    }

    #[test]
    fn triggers_surface_in_prompt() {
        let expert = MedicalExpert::new("gpt-4", 0.2);
        let prompt = expert.build_prompt(
            &context(),
            "Does the diagnosis support incapacity?",
            &HashMap::new(),
        );
        assert!(prompt.contains("diagnosis"));
        assert!(prompt.contains("incapacity"));
        assert!(prompt.contains("Address each point explicitly"));
    }

    #[test]
    fn extras_are_appended() {
        let expert = SafetyExpert::new("gpt-4", 0.2);
        let mut extras = HashMap::new();
        extras.insert("deadline".to_string(), "answer in two paragraphs".to_string());
        let prompt = expert.build_prompt(&context(), "Were PPE rules followed?", &extras);
        assert!(prompt.contains("Additional instructions:"));
        assert!(prompt.contains("deadline: answer in two paragraphs"));
    }

    #[test]
    fn identities_are_stable() {
        assert_eq!(MedicalExpert::new("m", 0.2).identity().id, "medical");
        assert_eq!(
            SafetyExpert::new("m", 0.2).identity().id,
            "workplace_safety"
        );
        assert_eq!(MedicalExpert::new("m", 0.2).identity().kind.tag(), "expert");
    }
}
