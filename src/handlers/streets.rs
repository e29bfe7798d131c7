//! The street analysis routes: raw summaries, LLM narratives, and the
//! combined collaborative street works recommendation.

use crate::dtos::{require_numeric_usrn, LlmQuery, UsrnQuery, Voice};
use crate::error::AppError;
use crate::models::{
    AnalysisKind, CollaborativeStreetWorksAnalysis, CombinedSummary, LandUseAnalysis,
    LandUseSummary, Narrative, StreetAnalysis, StreetSummary,
};
use crate::services::aggregate;
use crate::services::narrator::{Narrated, SPEECH_INSTRUCTIONS};
use crate::services::ngd::{FeatureSelector, LAND_USE_COLLECTIONS, STREET_INFO_COLLECTIONS};
use crate::startup::AppState;
use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use validator::Validate;

/// Summary of network and RAMI data plus street works statistics.
#[tracing::instrument(skip(state, params))]
pub async fn street_info(
    State(state): State<AppState>,
    Query(params): Query<UsrnQuery>,
) -> Result<Json<StreetSummary>, AppError> {
    params.validate()?;
    require_numeric_usrn(&params.usrn)?;

    tracing::info!(usrn = %params.usrn, "Street info request");

    let summary = build_street_summary(&state, &params.usrn).await?;
    Ok(Json(summary))
}

/// Street summary narrated by the LLM, optionally spoken.
#[tracing::instrument(skip(state, params))]
pub async fn street_info_llm(
    State(state): State<AppState>,
    Query(params): Query<LlmQuery>,
) -> Result<Response, AppError> {
    params.validate()?;
    require_numeric_usrn(&params.usrn)?;

    tracing::info!(usrn = %params.usrn, voice = ?params.voice, "Street info LLM request");

    let summary = build_street_summary(&state, &params.usrn).await?;
    let narrated: Narrated<StreetAnalysis> = state
        .narrator
        .narrate(AnalysisKind::StreetInfo, &summary)
        .await?;

    respond(&state, narrated, params.voice, "street-info", &params.usrn).await
}

/// Summary of land use and site information around the street.
#[tracing::instrument(skip(state, params))]
pub async fn land_use_info(
    State(state): State<AppState>,
    Query(params): Query<UsrnQuery>,
) -> Result<Json<LandUseSummary>, AppError> {
    params.validate()?;
    require_numeric_usrn(&params.usrn)?;

    tracing::info!(usrn = %params.usrn, "Land use request");

    let summary = build_land_use_summary(&state, &params.usrn).await?;
    Ok(Json(summary))
}

/// Land-use summary narrated by the LLM, optionally spoken.
#[tracing::instrument(skip(state, params))]
pub async fn land_use_info_llm(
    State(state): State<AppState>,
    Query(params): Query<LlmQuery>,
) -> Result<Response, AppError> {
    params.validate()?;
    require_numeric_usrn(&params.usrn)?;

    tracing::info!(usrn = %params.usrn, voice = ?params.voice, "Land use LLM request");

    let summary = build_land_use_summary(&state, &params.usrn).await?;
    let narrated: Narrated<LandUseAnalysis> = state
        .narrator
        .narrate(AnalysisKind::LandUse, &summary)
        .await?;

    respond(&state, narrated, params.voice, "land-use-info", &params.usrn).await
}

/// Combined land-use and street summary narrated with a collaborative street
/// works recommendation.
#[tracing::instrument(skip(state, params))]
pub async fn collaborative_street_works_llm(
    State(state): State<AppState>,
    Query(params): Query<LlmQuery>,
) -> Result<Response, AppError> {
    params.validate()?;
    require_numeric_usrn(&params.usrn)?;

    tracing::info!(usrn = %params.usrn, voice = ?params.voice, "Collaborative street works request");

    let combined = build_combined_summary(&state, &params.usrn).await?;
    let narrated: Narrated<CollaborativeStreetWorksAnalysis> = state
        .narrator
        .narrate(AnalysisKind::CollaborativeStreetWorks, &combined)
        .await?;

    respond(
        &state,
        narrated,
        params.voice,
        "collaborative-street-works",
        &params.usrn,
    )
    .await
}

async fn build_street_summary(state: &AppState, usrn: &str) -> Result<StreetSummary, AppError> {
    let selector = FeatureSelector::usrn(usrn);

    // The geometry lookup doubles as USRN existence validation; unknown
    // USRNs 404 here rather than producing an empty summary.
    let (known, stats, features) = tokio::join!(
        state.warehouse.bbox_for_usrn(usrn),
        state.warehouse.street_works_stats(usrn),
        state.ngd.collections_merged(STREET_INFO_COLLECTIONS, &selector),
    );
    known?;
    let stats = stats?;

    Ok(aggregate::summarize_street_info(&features, stats))
}

async fn build_land_use_summary(state: &AppState, usrn: &str) -> Result<LandUseSummary, AppError> {
    let bbox = state.warehouse.bbox_for_usrn(usrn).await?;
    let features = state
        .ngd
        .collections_merged(LAND_USE_COLLECTIONS, &FeatureSelector::Bbox(bbox))
        .await;

    Ok(aggregate::summarize_land_use(&features))
}

async fn build_combined_summary(state: &AppState, usrn: &str) -> Result<CombinedSummary, AppError> {
    let bbox = state.warehouse.bbox_for_usrn(usrn).await?;
    let street_selector = FeatureSelector::usrn(usrn);
    let land_selector = FeatureSelector::Bbox(bbox);

    let (land_features, street_features, stats) = tokio::join!(
        state
            .ngd
            .collections_merged(LAND_USE_COLLECTIONS, &land_selector),
        state
            .ngd
            .collections_merged(STREET_INFO_COLLECTIONS, &street_selector),
        state.warehouse.street_works_stats(usrn),
    );

    Ok(CombinedSummary {
        land_use: aggregate::summarize_land_use(&land_features),
        street_info: aggregate::summarize_street_info(&street_features, stats?),
    })
}

/// Either the narrated JSON payload or, when a voice was requested, the
/// narrative summary rendered to MP3.
async fn respond<A>(
    state: &AppState,
    narrated: Narrated<A>,
    voice: Option<Voice>,
    slug: &str,
    usrn: &str,
) -> Result<Response, AppError>
where
    A: Narrative + Serialize,
{
    let Some(voice) = voice else {
        return Ok(Json(narrated).into_response());
    };

    let text = narrated.llm_summary.summary_text();
    if text.is_empty() {
        return Err(AppError::BadGateway(
            "no summary text in LLM response".to_string(),
        ));
    }

    let audio = state
        .speech
        .synthesize(text, voice.as_str(), Some(SPEECH_INSTRUCTIONS))
        .await?;

    tracing::info!(usrn = %usrn, audio_bytes = audio.len(), "Narrative audio generated");

    audio_response(audio, &format!("{}-{}.mp3", slug, usrn))
}

fn audio_response(audio: Vec<u8>, filename: &str) -> Result<Response, AppError> {
    let disposition = HeaderValue::from_str(&format!("inline; filename={}", filename))
        .map_err(|e| AppError::InternalError(anyhow!("invalid content disposition: {}", e)))?;

    let mut response = (StatusCode::OK, audio).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    Ok(response)
}
