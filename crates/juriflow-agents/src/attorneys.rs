//! Specialist attorney agents.
//!
//! All four attorneys share one base prompt with a specialty-specific
//! section. The prompt demands a terminal `Cited legislation:` list; the
//! deterministic parser below extracts it into the opinion.

use juriflow::opinions::{AgentOpinion, ContextDocument};

use crate::agent::{
    format_context, format_extras, matched_triggers, Agent, AgentExtras, AgentIdentity, AgentKind,
};

/// Static description of one attorney specialty.
#[derive(Debug, Clone)]
pub(crate) struct AttorneyProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub specialty: &'static str,
    pub principal_legislation: &'static [&'static str],
    pub triggers: &'static [&'static str],
    pub focus_section: &'static str,
}

pub(crate) const LABOR: AttorneyProfile = AttorneyProfile {
    id: "labor",
    name: "Labor Attorney",
    description: "Employment relationships, dismissal, working conditions, labor claims",
    specialty: "Labor law",
    principal_legislation: &["CLT", "Constituicao Federal art. 7", "Sumulas do TST"],
    triggers: &["dismissal", "overtime", "employment", "severance", "working hours"],
    focus_section: "Analyze the employment relationship: contract terms, working conditions, \
        termination circumstances, and any employer liability under labor law.",
};

pub(crate) const SOCIAL_SECURITY: AttorneyProfile = AttorneyProfile {
    id: "social_security",
    name: "Social Security Attorney",
    description: "Benefits, disability claims, contribution history, pension rules",
    specialty: "Social security law",
    principal_legislation: &["Lei 8.213/1991", "Lei 8.212/1991", "Decreto 3.048/1999"],
    triggers: &["benefit", "disability", "retirement", "pension", "contribution"],
    focus_section: "Analyze benefit eligibility: qualifying condition, contribution history, \
        carencia requirements, and the adequacy of the administrative decision.",
};

pub(crate) const CIVIL: AttorneyProfile = AttorneyProfile {
    id: "civil",
    name: "Civil Attorney",
    description: "Civil liability, damages, contracts, consumer relations",
    specialty: "Civil law",
    principal_legislation: &["Codigo Civil", "Codigo de Defesa do Consumidor", "CPC"],
    triggers: &["damages", "liability", "contract", "compensation", "negligence"],
    focus_section: "Analyze civil liability: duty, breach, causation and damages, plus any \
        contractual or consumer-protection angle.",
};

pub(crate) const TAX: AttorneyProfile = AttorneyProfile {
    id: "tax",
    name: "Tax Attorney",
    description: "Tax assessments, exemptions, enforcement actions, fiscal liability",
    specialty: "Tax law",
    principal_legislation: &["CTN", "Constituicao Federal arts. 145-162", "Lei 6.830/1980"],
    triggers: &["tax", "assessment", "exemption", "fiscal", "levy"],
    focus_section: "Analyze the tax question: legality of the assessment, applicable \
        exemptions or immunities, limitation periods, and enforcement defenses.",
};

pub(crate) const ALL_PROFILES: [&AttorneyProfile; 4] = [&LABOR, &SOCIAL_SECURITY, &CIVIL, &TAX];

/// An attorney agent built from a static profile.
pub struct SpecialistAttorney {
    profile: &'static AttorneyProfile,
    model: String,
    temperature: f32,
}

impl SpecialistAttorney {
    pub(crate) fn from_profile(
        profile: &'static AttorneyProfile,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            profile,
            model: model.into(),
            temperature,
        }
    }

    pub fn labor(model: impl Into<String>, temperature: f32) -> Self {
        Self::from_profile(&LABOR, model, temperature)
    }

    pub fn social_security(model: impl Into<String>, temperature: f32) -> Self {
        Self::from_profile(&SOCIAL_SECURITY, model, temperature)
    }

    pub fn civil(model: impl Into<String>, temperature: f32) -> Self {
        Self::from_profile(&CIVIL, model, temperature)
    }

    pub fn tax(model: impl Into<String>, temperature: f32) -> Self {
        Self::from_profile(&TAX, model, temperature)
    }
}

impl Agent for SpecialistAttorney {
    fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            id: self.profile.id,
            name: self.profile.name,
            description: self.profile.description,
            kind: AgentKind::Attorney,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn system_prompt(&self) -> Option<String> {
        Some(format!(
            "You are an attorney specialized in {specialty}, writing a legal opinion for a \
             case under analysis. Ground every conclusion in the case documents and in the \
             legislation you cite.",
            specialty = self.profile.specialty.to_lowercase(),
        ))
    }

    fn build_prompt(
        &self,
        context_docs: &[ContextDocument],
        question: &str,
        extras: &AgentExtras,
    ) -> String {
        let focus = matched_triggers(question, self.profile.triggers);
        let focus_line = if focus.is_empty() {
            String::new()
        } else {
            format!("\n\nPoints raised by the question: {}.", focus.join(", "))
        };

        format!(
            "Write a legal opinion from the perspective of {specialty}.\n\n{section}\n\n\
             Principal legislation for this specialty: {legislation}.\n\n\
             Case documents:\n{context}\n\nQuestion:\n{question}{focus_line}{extras}\n\n\
             End your answer with a section titled \"Cited legislation:\" listing every \
             statute, article or precedent you relied on, one per line, each line starting \
             with \"- \".",
            specialty = self.profile.specialty.to_lowercase(),
            section = self.profile.focus_section,
            legislation = self.profile.principal_legislation.join(", "),
            context = format_context(context_docs),
            extras = format_extras(extras),
        )
    }

    fn annotate(&self, opinion: &mut AgentOpinion, response: &str) {
        opinion.specialty = Some(self.profile.specialty.to_string());
        opinion.cited_legislation = parse_cited_legislation(response);
    }
}

/// Extract the cited-legislation list from a response.
///
/// Rule: take the *last* line starting with `cited legislation:` (case
/// insensitive) and collect the contiguous run of `- ` bullets after it,
/// skipping blank lines before the first bullet.
pub fn parse_cited_legislation(response: &str) -> Vec<String> {
    let lines: Vec<&str> = response.lines().collect();
    let header = lines
        .iter()
        .rposition(|line| line.trim().to_lowercase().starts_with("cited legislation:"));
    let Some(start) = header else {
        return Vec::new();
    };

    let mut cited = Vec::new();
    for line in &lines[start + 1..] {
        let trimmed = line.trim();
        if let Some(entry) = trimmed.strip_prefix("- ") {
            let entry = entry.trim();
            if !entry.is_empty() {
                cited.push(entry.to_string());
            }
        } else if trimmed.is_empty() && cited.is_empty() {
            continue;
        } else {
            break;
        }
    }
    cited
}
