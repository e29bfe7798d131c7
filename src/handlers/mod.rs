pub mod health;
pub mod metrics;
pub mod streets;

pub use health::{health_check, readiness_check};
pub use metrics::metrics;
pub use streets::{
    collaborative_street_works_llm, land_use_info, land_use_info_llm, street_info, street_info_llm,
};
