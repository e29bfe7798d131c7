//! Request-scoped summary objects: the filtered, LLM-ready reshaping of the
//! raw feature payloads and warehouse statistics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Summary of network and RAMI data for one USRN, plus works statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetSummary {
    /// Absent when the NGD returned no features for the USRN.
    pub street: Option<StreetAttributes>,
    pub designations: Vec<Designation>,
    pub stats: StreetWorksStats,
    pub metadata: StreetMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetAttributes {
    pub usrn: Option<i64>,
    pub street_name: Option<String>,
    pub town: Option<String>,
    pub authority: Authority,
    pub geometry: StreetGeometry,
    pub operational_state: Option<String>,
    pub operational_state_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authority {
    pub name: Option<String>,
    pub area: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetGeometry {
    pub length: Option<f64>,
}

/// One special-designation record, with null fields omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Designation {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Value>,
}

/// Works statistics from the warehouse. Each list holds per-row objects with
/// stringified values, or a single `"NO DATA"` marker when the query matched
/// nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreetWorksStats {
    pub last_month_work_summary: Vec<Value>,
    #[serde(rename = "2024_work_summary")]
    pub annual_work_summary: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreetMetadata {
    pub timestamp: Option<String>,
    pub number_returned: u64,
}

/// Summary of land-use site features around one USRN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandUseSummary {
    pub features: Vec<SiteSummary>,
    pub statistics: LandUseStats,
    pub metadata: LandUseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSummary {
    pub property: SiteProperty,
    pub classification: SiteClassification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProperty {
    pub name: Option<String>,
    pub secondary_name: Option<String>,
    pub description: Option<String>,
    pub area: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteClassification {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Tier-B classifications; an empty list when the property is missing.
    pub subtypes: Value,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandUseStats {
    pub total_properties: u64,
    pub total_area: f64,
    pub residential_count: u64,
    pub commercial_count: u64,
    pub average_property_size: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandUseMetadata {
    pub count: u64,
    pub timestamp: Option<String>,
}

/// Input to the collaborative street works analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedSummary {
    pub land_use: LandUseSummary,
    pub street_info: StreetSummary,
}
