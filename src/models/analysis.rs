//! Structured LLM output types, one per analysis route.

use serde::{Deserialize, Serialize};

/// The analysis flavours the narrator knows how to run. Each maps to a
/// prompt, an output schema, and one of the typed analysis structs below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    StreetInfo,
    LandUse,
    CollaborativeStreetWorks,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::StreetInfo => "street-info",
            AnalysisKind::LandUse => "land-use",
            AnalysisKind::CollaborativeStreetWorks => "collaborative-street-works",
        }
    }
}

/// Access to the free-text summary of an analysis, used by the speech path.
pub trait Narrative {
    fn summary_text(&self) -> &str;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetAnalysis {
    pub location: Vec<String>,
    pub key_characteristics: Vec<String>,
    pub special_designations: Vec<String>,
    pub past_work_history: Vec<String>,
    pub potential_challenges: Vec<String>,
    pub summary: String,
}

impl Narrative for StreetAnalysis {
    fn summary_text(&self) -> &str {
        &self.summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandUseAnalysis {
    pub location: Vec<String>,
    pub property_numbers: Vec<String>,
    pub institutional_properties: Vec<String>,
    pub residential_properties: Vec<String>,
    pub commercial_properties: Vec<String>,
    pub recent_changes: Vec<String>,
    pub summary: String,
}

impl Narrative for LandUseAnalysis {
    fn summary_text(&self) -> &str {
        &self.summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeStreetWorksAnalysis {
    pub location: Vec<String>,
    pub key_characteristics: Vec<String>,
    pub special_designations: Vec<String>,
    pub past_work_history: Vec<String>,
    pub potential_challenges: Vec<String>,
    pub property_numbers: Vec<String>,
    pub institutional_properties: Vec<String>,
    pub residential_properties: Vec<String>,
    pub commercial_properties: Vec<String>,
    pub recent_changes: Vec<String>,
    pub summary: String,
}

impl Narrative for CollaborativeStreetWorksAnalysis {
    fn summary_text(&self) -> &str {
        &self.summary
    }
}
