use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::error::{Result as WebResult, WebError};
use crate::game_logic::SessionSnapshot;
use crate::ranks::StoredRank;
use crate::state::AppState;

#[derive(Deserialize, Debug, Default)]
pub struct StartSessionQuery {
    pub id: Option<String>,
    pub n: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SelectOptionRequest {
    pub option: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct SubmitRequest {
    #[serde(default)]
    pub option: Option<String>,
}

pub async fn start_session_handler(
    State(app_state): State<AppState>,
    Query(query): Query<StartSessionQuery>,
) -> WebResult<(StatusCode, Json<SessionSnapshot>)> {
    tracing::info!("HTTP: Received start_session request: {:?}", query);

    let snapshot = app_state
        .session_manager
        .start_session(query.id, query.n)
        .await?;

    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn get_session_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> WebResult<Json<SessionSnapshot>> {
    let snapshot = app_state.session_manager.snapshot(session_id).await?;
    Ok(Json(snapshot))
}

pub async fn select_option_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SelectOptionRequest>,
) -> WebResult<Json<SessionSnapshot>> {
    let snapshot = app_state
        .session_manager
        .select_option(session_id, payload.option)
        .await?;
    Ok(Json(snapshot))
}

/// The body is optional; an empty body submits the pending selection.
pub async fn submit_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
    body: Bytes,
) -> WebResult<Json<SessionSnapshot>> {
    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        SubmitRequest::default()
    } else {
        serde_json::from_slice::<SubmitRequest>(&body)
            .map_err(|e| WebError::BadRequest(format!("Invalid submit body: {e}")))?
    };

    let snapshot = app_state
        .session_manager
        .submit(session_id, payload.option)
        .await?;
    Ok(Json(snapshot))
}

pub async fn advance_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> WebResult<Json<SessionSnapshot>> {
    let snapshot = app_state.session_manager.advance(session_id).await?;
    Ok(Json(snapshot))
}

pub async fn close_session_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> WebResult<StatusCode> {
    app_state.session_manager.close(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_ranks_handler(
    State(app_state): State<AppState>,
) -> WebResult<Json<Vec<StoredRank>>> {
    let ranks = app_state.rank_store.all_ranks().await?;
    Ok(Json(ranks))
}

pub async fn get_rank_handler(
    State(app_state): State<AppState>,
    Path(quiz_id): Path<String>,
) -> WebResult<Json<StoredRank>> {
    let rank = app_state
        .rank_store
        .load_rank(&quiz_id)
        .await?
        .ok_or_else(|| WebError::RankNotFound(quiz_id.clone()))?;

    Ok(Json(StoredRank { quiz_id, rank }))
}
