//! Client for the OS National Geographic Database (NGD) features API.
//!
//! Collection features are fetched either by USRN attribute filter (street
//! and RAMI collections) or by bounding box (land-use collections). All
//! coordinates are British National Grid (EPSG:27700).

use crate::models::FeatureCollection;
use crate::services::aggregate;
use futures::future;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const CRS_EPSG_27700: &str = "http://www.opengis.net/def/crs/EPSG/0/27700";

/// NGD feature collections queried per analysis type.
pub const STREET_INFO_COLLECTIONS: &[&str] = &[
    "trn-ntwk-street-1",
    "trn-rami-specialdesignationarea-1",
    "trn-rami-specialdesignationline-1",
    "trn-rami-specialdesignationpoint-1",
];
pub const LAND_USE_COLLECTIONS: &[&str] = &["lus-fts-site-1"];

#[derive(Debug, Error)]
pub enum NgdError {
    #[error("NGD network error: {0}")]
    Network(String),

    #[error("NGD API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("rate limited by the NGD API")]
    RateLimited,

    #[error("failed to decode NGD response: {0}")]
    Decode(String),
}

/// Integer bounding box in EPSG:27700, serialised as `minx,miny,maxx,maxy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// How a collection-items query is narrowed to the street in question.
#[derive(Debug, Clone)]
pub enum FeatureSelector {
    Usrn(String),
    Bbox(BoundingBox),
}

impl FeatureSelector {
    pub fn usrn(usrn: &str) -> Self {
        FeatureSelector::Usrn(usrn.to_string())
    }
}

#[derive(Clone)]
pub struct NgdClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NgdClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, NgdError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NgdError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn items_url(&self, collection_id: &str) -> String {
        format!("{}/collections/{}/items", self.base_url, collection_id)
    }

    /// Fetch the features of a single collection for the given selector.
    pub async fn collection_items(
        &self,
        collection_id: &str,
        selector: &FeatureSelector,
    ) -> Result<FeatureCollection, NgdError> {
        let mut request = self
            .client
            .get(self.items_url(collection_id))
            .header("key", &self.api_key);

        request = match selector {
            FeatureSelector::Usrn(usrn) => {
                request.query(&[("filter", format!("usrn={}", usrn))])
            }
            FeatureSelector::Bbox(bbox) => request.query(&[
                ("bbox", bbox.to_string()),
                ("bbox-crs", CRS_EPSG_27700.to_string()),
                ("crs", CRS_EPSG_27700.to_string()),
            ]),
        };

        tracing::debug!(collection = collection_id, ?selector, "Fetching NGD collection");

        let response = request
            .send()
            .await
            .map_err(|e| NgdError::Network(e.to_string()))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(NgdError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NgdError::Api { status, body });
        }

        response
            .json::<FeatureCollection>()
            .await
            .map_err(|e| NgdError::Decode(e.to_string()))
    }

    /// Fetch every collection concurrently and merge the results into one
    /// geometry-free collection. Individual collection failures are logged
    /// and skipped; the merge keeps whatever arrived.
    pub async fn collections_merged(
        &self,
        collection_ids: &[&str],
        selector: &FeatureSelector,
    ) -> FeatureCollection {
        let fetches = collection_ids
            .iter()
            .map(|id| self.collection_items(id, selector));
        let results = future::join_all(fetches).await;

        aggregate::merge_collections(collection_ids, results)
    }
}
