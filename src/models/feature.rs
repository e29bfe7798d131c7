//! Tolerant typed view over NGD OGC Features payloads.
//!
//! Only the members the aggregation reads are modelled; everything else is
//! carried opaquely so collection schemas stay external concerns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(rename = "timeStamp", default)]
    pub time_stamp: Option<String>,
    #[serde(rename = "numberReturned", default)]
    pub number_returned: u64,
    #[serde(default)]
    pub features: Vec<Feature>,
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

impl FeatureCollection {
    pub fn empty() -> Self {
        Self {
            kind: feature_collection_type(),
            time_stamp: None,
            number_returned: 0,
            features: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Remaining GeoJSON members (`type`, `id`, ...), passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    pub fn str_prop(&self, key: &str) -> Option<String> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn num_prop(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    pub fn int_prop(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(Value::as_i64)
    }

    /// Property value as-is, with JSON nulls folded into `None`.
    pub fn raw_prop(&self, key: &str) -> Option<Value> {
        self.properties
            .get(key)
            .filter(|value| !value.is_null())
            .cloned()
    }
}
