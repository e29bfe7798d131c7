pub mod analysis;
pub mod feature;
pub mod summary;

pub use analysis::{
    AnalysisKind, CollaborativeStreetWorksAnalysis, LandUseAnalysis, Narrative, StreetAnalysis,
};
pub use feature::{Feature, FeatureCollection};
pub use summary::{
    Authority, CombinedSummary, Designation, LandUseMetadata, LandUseStats, LandUseSummary,
    SiteClassification, SiteProperty, SiteSummary, StreetAttributes, StreetGeometry,
    StreetMetadata, StreetSummary, StreetWorksStats,
};
