//! Analysis orchestration and the petition workflow for `JuriFlow`.
//!
//! The [`Orchestrator`] drives one multi-agent analysis end to end, either
//! synchronously or as an admitted background job tracked by the
//! [`AnalysisJobStore`]. The [`PetitionWorkflow`] layers a per-petition
//! state machine on top: ingest the petition, suggest complementary
//! documents, gate on the essential ones, then run analysis, prognosis and
//! the draft continuation document.

mod analysis_jobs;
mod draft;
mod orchestrator;
mod petition;
mod prognosis;
mod relevance;
mod workflow;

pub use analysis_jobs::{
    AnalysisJob, AnalysisJobStore, AnalysisRequest, AnalysisResult, AnalysisState, AnalysisStats,
};
pub use draft::DraftWriter;
pub use orchestrator::Orchestrator;
pub use petition::{Petition, PetitionAnalysis, PetitionState, PetitionStore};
pub use prognosis::{Prognosis, PrognosisAnalyzer, Scenario, ScenarioOutlook};
pub use relevance::{
    DocumentRelevanceAnalyzer, SuggestedDocument, SuggestedPriority, MAX_SUGGESTIONS,
    MIN_SUGGESTIONS,
};
pub use workflow::PetitionWorkflow;
