//! Narration of summary objects through the LLM provider.
//!
//! Each analysis kind pairs a prompt with a JSON schema constraining the
//! model output, so the reply always parses into one of the typed analysis
//! structs.

use crate::error::AppError;
use crate::models::AnalysisKind;
use crate::services::providers::{GenerationParams, StructuredSchema, TextProvider};
use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Spoken-word delivery guidance for the narration audio path.
pub const SPEECH_INSTRUCTIONS: &str = "Speak in a clear, professional, informative tone. \
Use a steady, measured pace suitable for delivering detailed information. \
Be thorough and methodical, ensuring every detail is communicated clearly. \
This is comprehensive street information, not a conversation.";

/// An LLM narrative together with the summary it was produced from.
#[derive(Debug, Clone, Serialize)]
pub struct Narrated<A> {
    pub llm_summary: A,
    pub raw_data: Value,
}

#[derive(Clone)]
pub struct Narrator {
    provider: Arc<dyn TextProvider>,
    temperature: f32,
}

impl Narrator {
    pub fn new(provider: Arc<dyn TextProvider>, temperature: f32) -> Self {
        Self {
            provider,
            temperature,
        }
    }

    /// Narrate a summary object. The caller picks the analysis type matching
    /// the kind; a reply that does not satisfy the schema is a gateway error.
    pub async fn narrate<S, A>(&self, kind: AnalysisKind, summary: &S) -> Result<Narrated<A>, AppError>
    where
        S: Serialize,
        A: DeserializeOwned,
    {
        let raw_data = serde_json::to_value(summary)
            .map_err(|e| AppError::InternalError(anyhow!("failed to serialize summary: {}", e)))?;

        let context = serde_json::to_string_pretty(&raw_data)
            .map_err(|e| AppError::InternalError(anyhow!("failed to render context: {}", e)))?;
        let prompt = format!("{}\n{}\n{}", preamble(kind), context, focus(kind));

        let params = GenerationParams {
            temperature: Some(self.temperature),
            max_tokens: None,
            output_schema: Some(StructuredSchema {
                name: format!("{}-analysis", kind.as_str()),
                schema: output_schema(kind),
            }),
        };

        tracing::info!(analysis = kind.as_str(), "Requesting LLM narrative");

        let response = self.provider.generate(&prompt, &params).await?;
        let text = response.text.ok_or_else(|| {
            AppError::BadGateway("LLM returned an empty completion".to_string())
        })?;

        let llm_summary = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(analysis = kind.as_str(), error = %e, "Unparseable LLM reply");
            AppError::BadGateway(format!("LLM reply did not match the analysis schema: {}", e))
        })?;

        Ok(Narrated {
            llm_summary,
            raw_data,
        })
    }

    /// Readiness of the underlying text provider.
    pub async fn health_check(&self) -> Result<(), crate::services::providers::ProviderError> {
        self.provider.health_check().await
    }
}

fn preamble(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::StreetInfo => "You are a street works expert. Analyze the following data:",
        AnalysisKind::LandUse => {
            "You are an expert urban planning analyst. Analyze the following land use data:"
        }
        AnalysisKind::CollaborativeStreetWorks => {
            "You are a street works collaboration expert. Analyze the following data:"
        }
    }
}

fn focus(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::StreetInfo => {
            "Always focus on a summary of all the information you have found. \
             Make sure to include information about the street works statistics that are included."
        }
        AnalysisKind::LandUse => "Always focus on a summary of all the information you have found.",
        AnalysisKind::CollaborativeStreetWorks => {
            "Always focus on practical implications for street works planning and make a \
             judgement on the potential for collaborative street works."
        }
    }
}

fn string_array(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {"type": "string"},
        "description": description,
    })
}

/// JSON schema for the structured output of each analysis kind. Facets match
/// the corresponding struct in `models::analysis` field for field.
fn output_schema(kind: AnalysisKind) -> Value {
    let mut properties = serde_json::Map::new();

    let street_facets = [
        ("location", "Name of the street and where it is located"),
        (
            "key_characteristics",
            "Key characteristics of the road network, including who manages it",
        ),
        (
            "special_designations",
            "Special designations or restrictions present for this USRN",
        ),
        (
            "past_work_history",
            "Work history for this USRN: last month's works and the last 12 months of works, \
             noting clearly whether any collaborative street working took place",
        ),
        (
            "potential_challenges",
            "Potential challenges or hazards present for this USRN",
        ),
    ];

    let land_facets = [
        (
            "location",
            "Name and location details of the area, including any major landmarks nearby",
        ),
        (
            "property_numbers",
            "A high-level idea of the number of properties in the area",
        ),
        (
            "institutional_properties",
            "Educational, religious, and public institutions in the area",
        ),
        (
            "residential_properties",
            "Residential buildings, including private homes, student accommodation and communal living",
        ),
        (
            "commercial_properties",
            "Commercial and business properties in the area",
        ),
        (
            "recent_changes",
            "Recent modifications, updates, and changes to properties in the area",
        ),
    ];

    let summary_description = match kind {
        AnalysisKind::CollaborativeStreetWorks => {
            "Overall summary with a recommendation for collaborative street works on a scale \
             of 1 (no) to 10 (yes absolutely)"
        }
        _ => "Overall summary of the analysis and the information found",
    };

    match kind {
        AnalysisKind::StreetInfo => {
            for (name, description) in street_facets {
                properties.insert(name.to_string(), string_array(description));
            }
        }
        AnalysisKind::LandUse => {
            for (name, description) in land_facets {
                properties.insert(name.to_string(), string_array(description));
            }
        }
        AnalysisKind::CollaborativeStreetWorks => {
            for (name, description) in street_facets.iter().chain(land_facets.iter()) {
                // The combined analysis shares `location`; first write wins.
                properties
                    .entry(name.to_string())
                    .or_insert_with(|| string_array(description));
            }
        }
    }

    properties.insert(
        "summary".to_string(),
        json!({"type": "string", "description": summary_description}),
    );

    let required: Vec<&String> = properties.keys().collect();
    let required = json!(required);

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LandUseAnalysis, StreetAnalysis};
    use crate::services::providers::mock::MockTextProvider;

    fn street_analysis_json() -> String {
        serde_json::to_string(&json!({
            "location": ["High Street, Southampton"],
            "key_characteristics": ["Managed by Southampton City Council"],
            "special_designations": ["Traffic sensitive on weekday mornings"],
            "past_work_history": ["Two works completed last month"],
            "potential_challenges": ["Peak-hour congestion"],
            "summary": "A busy managed street with recent works."
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn narrate_parses_structured_reply() {
        let narrator = Narrator::new(Arc::new(MockTextProvider::new(street_analysis_json())), 0.3);

        let narrated: Narrated<StreetAnalysis> = narrator
            .narrate(AnalysisKind::StreetInfo, &json!({"street": "fixture"}))
            .await
            .unwrap();

        assert_eq!(
            narrated.llm_summary.summary,
            "A busy managed street with recent works."
        );
        assert_eq!(narrated.raw_data, json!({"street": "fixture"}));
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_gateway_error() {
        let narrator = Narrator::new(Arc::new(MockTextProvider::new("not json")), 0.3);

        let result: Result<Narrated<StreetAnalysis>, _> = narrator
            .narrate(AnalysisKind::StreetInfo, &json!({}))
            .await;

        assert!(matches!(result, Err(AppError::BadGateway(_))));
    }

    #[tokio::test]
    async fn provider_failure_is_a_gateway_error() {
        let narrator = Narrator::new(Arc::new(MockTextProvider::unavailable()), 0.3);

        let result: Result<Narrated<LandUseAnalysis>, _> =
            narrator.narrate(AnalysisKind::LandUse, &json!({})).await;

        assert!(matches!(result, Err(AppError::BadGateway(_))));
    }

    #[test]
    fn street_schema_requires_every_facet() {
        let schema = output_schema(AnalysisKind::StreetInfo);

        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 6);
        assert!(required.contains(&json!("past_work_history")));
        assert!(required.contains(&json!("summary")));
        assert_eq!(schema["additionalProperties"], json!(false));
    }

    #[test]
    fn collaborative_schema_combines_both_facet_sets() {
        let schema = output_schema(AnalysisKind::CollaborativeStreetWorks);

        let properties = schema["properties"].as_object().unwrap();
        assert!(properties.contains_key("special_designations"));
        assert!(properties.contains_key("commercial_properties"));
        // `location` appears once even though both facet sets declare it.
        assert_eq!(properties.keys().filter(|k| *k == "location").count(), 1);
        assert_eq!(properties.len(), 11);
    }
}
