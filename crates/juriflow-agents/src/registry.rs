//! Registry of available agents, keyed by string id.
//!
//! The coordinator (and the HTTP catalog endpoints) depend on this interface
//! only; concrete agent types never leak upward.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use juriflow::config::Settings;
use juriflow::error::{Error, Result};

use crate::agent::Agent;
use crate::attorneys::{SpecialistAttorney, ALL_PROFILES};
use crate::experts::{MedicalExpert, SafetyExpert};

/// Model and temperatures handed to agent factories.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub expert_temperature: f32,
    pub attorney_temperature: f32,
}

impl AgentSettings {
    pub fn new(model: impl Into<String>, expert_temperature: f32, attorney_temperature: f32) -> Self {
        Self {
            model: model.into(),
            expert_temperature,
            attorney_temperature,
        }
    }
}

impl From<&Settings> for AgentSettings {
    fn from(settings: &Settings) -> Self {
        Self::new(
            settings.analysis_model.clone(),
            settings.expert_temperature,
            settings.analysis_temperature,
        )
    }
}

/// Display metadata for one catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCatalogEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub principal_legislation: Vec<String>,
}

type AgentFactory = Box<dyn Fn(&AgentSettings) -> Arc<dyn Agent> + Send + Sync>;

/// String id to factory map, split by agent class.
pub struct AgentRegistry {
    settings: AgentSettings,
    experts: BTreeMap<&'static str, AgentFactory>,
    attorneys: BTreeMap<&'static str, AgentFactory>,
}

impl AgentRegistry {
    /// Registry with the built-in specialists.
    pub fn with_defaults(settings: AgentSettings) -> Self {
        let mut experts: BTreeMap<&'static str, AgentFactory> = BTreeMap::new();
        experts.insert(
            "medical",
            Box::new(|s: &AgentSettings| {
                Arc::new(MedicalExpert::new(s.model.clone(), s.expert_temperature))
                    as Arc<dyn Agent>
            }),
        );
        experts.insert(
            "workplace_safety",
            Box::new(|s: &AgentSettings| {
                Arc::new(SafetyExpert::new(s.model.clone(), s.expert_temperature))
                    as Arc<dyn Agent>
            }),
        );

        let mut attorneys: BTreeMap<&'static str, AgentFactory> = BTreeMap::new();
        for profile in ALL_PROFILES {
            attorneys.insert(
                profile.id,
                Box::new(move |s: &AgentSettings| {
                    Arc::new(SpecialistAttorney::from_profile(
                        profile,
                        s.model.clone(),
                        s.attorney_temperature,
                    )) as Arc<dyn Agent>
                }),
            );
        }

        Self {
            settings,
            experts,
            attorneys,
        }
    }

    pub fn expert_ids(&self) -> Vec<&'static str> {
        self.experts.keys().copied().collect()
    }

    pub fn attorney_ids(&self) -> Vec<&'static str> {
        self.attorneys.keys().copied().collect()
    }

    pub fn create_expert(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.experts.get(id).map(|factory| factory(&self.settings))
    }

    pub fn create_attorney(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.attorneys.get(id).map(|factory| factory(&self.settings))
    }

    /// Reject unknown ids before any job is admitted.
    pub fn validate_selection(&self, experts: &[String], attorneys: &[String]) -> Result<()> {
        let unknown_experts: Vec<&str> = experts
            .iter()
            .filter(|id| !self.experts.contains_key(id.as_str()))
            .map(String::as_str)
            .collect();
        let unknown_attorneys: Vec<&str> = attorneys
            .iter()
            .filter(|id| !self.attorneys.contains_key(id.as_str()))
            .map(String::as_str)
            .collect();

        if unknown_experts.is_empty() && unknown_attorneys.is_empty() {
            return Ok(());
        }
        let mut unknown = unknown_experts;
        unknown.extend(unknown_attorneys);
        Err(Error::validation(format!(
            "unknown agent ids: {}",
            unknown.join(", ")
        )))
    }

    pub fn expert_catalog(&self) -> Vec<AgentCatalogEntry> {
        self.experts
            .keys()
            .filter_map(|id| self.create_expert(id))
            .map(|agent| {
                let identity = agent.identity();
                AgentCatalogEntry {
                    id: identity.id.to_string(),
                    name: identity.name.to_string(),
                    description: identity.description.to_string(),
                    specialty: None,
                    principal_legislation: Vec::new(),
                }
            })
            .collect()
    }

    pub fn attorney_catalog(&self) -> Vec<AgentCatalogEntry> {
        ALL_PROFILES
            .iter()
            .map(|profile| AgentCatalogEntry {
                id: profile.id.to_string(),
                name: profile.name.to_string(),
                description: profile.description.to_string(),
                specialty: Some(profile.specialty.to_string()),
                principal_legislation: profile
                    .principal_legislation
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            })
            .collect()
    }
}
