//! Pure aggregation: merging fanned-out collection results and reshaping
//! raw features into the summary objects. No I/O; deterministic for a given
//! input.

use crate::models::{
    Authority, Designation, FeatureCollection, LandUseMetadata, LandUseStats, LandUseSummary,
    SiteClassification, SiteProperty, SiteSummary, StreetAttributes, StreetGeometry,
    StreetMetadata, StreetSummary, StreetWorksStats,
};
use crate::services::ngd::NgdError;
use chrono::DateTime;
use serde_json::Value;

/// The record that carries the street attributes themselves rather than a
/// designation; it is folded into `street` and excluded from the list.
const BASE_STREET_DESCRIPTION: &str = "Designated Street Name";

/// Merge per-collection fetch results into a single collection. Failed or
/// malformed collections are logged and skipped; geometry members are
/// dropped from every feature (they dominate the LLM token budget and the
/// summaries never read them).
pub fn merge_collections(
    collection_ids: &[&str],
    results: Vec<Result<FeatureCollection, NgdError>>,
) -> FeatureCollection {
    let mut merged = FeatureCollection::empty();

    for (collection_id, result) in collection_ids.iter().zip(results) {
        let collection = match result {
            Ok(collection) => collection,
            Err(e) => {
                tracing::error!(collection = %collection_id, error = %e, "Failed to fetch collection");
                continue;
            }
        };

        for mut feature in collection.features {
            feature.geometry = None;
            merged.features.push(feature);
        }

        merged.time_stamp = later_timestamp(merged.time_stamp.take(), collection.time_stamp);
    }

    merged.number_returned = merged.features.len() as u64;

    if merged.features.is_empty() {
        tracing::warn!("No features returned by any collection");
    }

    merged
}

fn later_timestamp(current: Option<String>, candidate: Option<String>) -> Option<String> {
    let Some(candidate) = candidate else {
        return current;
    };
    let Some(current) = current else {
        return Some(candidate);
    };

    // NGD timestamps are RFC 3339; fall back to lexicographic order when a
    // collection returns something else.
    let candidate_is_later = match (
        DateTime::parse_from_rfc3339(&current),
        DateTime::parse_from_rfc3339(&candidate),
    ) {
        (Ok(cur), Ok(cand)) => cand > cur,
        _ => candidate > current,
    };

    Some(if candidate_is_later { candidate } else { current })
}

/// Reshape merged street/RAMI features and works statistics into the street
/// summary.
pub fn summarize_street_info(
    collection: &FeatureCollection,
    stats: StreetWorksStats,
) -> StreetSummary {
    let street = collection.features.first().map(|feature| StreetAttributes {
        usrn: feature.int_prop("usrn"),
        street_name: feature.str_prop("designatedname1_text"),
        town: feature.str_prop("townname1_text"),
        authority: Authority {
            name: feature.str_prop("responsibleauthority_name"),
            area: feature.str_prop("administrativearea1_text"),
        },
        geometry: StreetGeometry {
            length: feature.num_prop("geometry_length"),
        },
        operational_state: feature.str_prop("operationalstate"),
        operational_state_date: feature.str_prop("operationalstatedate"),
    });

    let designations = collection
        .features
        .iter()
        .filter(|feature| {
            feature.str_prop("description").as_deref() != Some(BASE_STREET_DESCRIPTION)
        })
        .map(|feature| Designation {
            kind: feature.str_prop("description"),
            designation: feature.raw_prop("designation"),
            timeframe: feature.raw_prop("timeinterval"),
            location: feature.raw_prop("locationdescription"),
            details: feature.raw_prop("designationdescription"),
            effective_date: feature.raw_prop("effectivestartdate"),
            end_date: feature.raw_prop("effectiveenddate"),
        })
        .collect();

    StreetSummary {
        street,
        designations,
        stats,
        metadata: StreetMetadata {
            timestamp: collection.time_stamp.clone(),
            number_returned: collection.number_returned,
        },
    }
}

/// Reshape merged land-use site features into the land-use summary with
/// aggregate statistics.
pub fn summarize_land_use(collection: &FeatureCollection) -> LandUseSummary {
    let mut sites = Vec::with_capacity(collection.features.len());
    let mut total_area = 0.0;
    let mut residential_count = 0;
    let mut commercial_count = 0;

    for feature in &collection.features {
        let site = SiteSummary {
            property: SiteProperty {
                name: feature.str_prop("name1_text"),
                secondary_name: feature.str_prop("name2_text"),
                description: feature.str_prop("description"),
                area: feature.num_prop("geometry_area"),
            },
            classification: SiteClassification {
                kind: feature.str_prop("oslandusetiera"),
                subtypes: feature
                    .raw_prop("oslandusetierb")
                    .unwrap_or_else(|| Value::Array(Vec::new())),
                status: feature.str_prop("changetype"),
            },
        };

        if let Some(area) = site.property.area {
            total_area += area;
        }

        let tier = site.classification.kind.as_deref().unwrap_or_default();
        if tier.contains("Residential") {
            residential_count += 1;
        } else if tier.contains("Commercial") {
            commercial_count += 1;
        }

        sites.push(site);
    }

    let total_properties = sites.len() as u64;
    let average_property_size = if sites.is_empty() {
        0.0
    } else {
        round2(total_area / sites.len() as f64)
    };

    LandUseSummary {
        features: sites,
        statistics: LandUseStats {
            total_properties,
            total_area: round2(total_area),
            residential_count,
            commercial_count,
            average_property_size,
        },
        metadata: LandUseMetadata {
            count: collection.number_returned,
            timestamp: collection.time_stamp.clone(),
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
