use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use service_core::error::AppError;
use service_core::extract::{QueryParams, ValidatedJson};

use crate::dtos::{
    BatchUpdateRequest, BatchUpdateResponse, CongestionLevelEntry, CongestionLevelsData,
    GetCongestionLevelsRequest, GetCongestionLevelsResponse, LevelQuery, MessageResponse,
};
use crate::middleware::AuthUser;
use crate::services::congestion::INVALID_LEVEL_MESSAGE;
use crate::startup::AppState;

/// `POST /congestion`: levels for a list of chargers.
///
/// A POST is used because the ID list travels in the body.
#[tracing::instrument(skip_all, fields(user_id = %user.0.sub))]
pub async fn get_congestion_levels(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<GetCongestionLevelsRequest>, JsonRejection>,
) -> Result<Json<GetCongestionLevelsResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected congestion lookup body");
        AppError::BadRequest(anyhow::anyhow!("Request parameter must be a string array"))
    })?;

    if request.station_ids.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Insufficient number of charger IDs given. Minimum is 1"
        )));
    }

    let levels = state.congestion.get_levels(&request.station_ids).await?;

    Ok(Json(GetCongestionLevelsResponse {
        message: "Successfully received congestion levels".to_string(),
        data: CongestionLevelsData {
            congestion_levels: levels.into_iter().map(CongestionLevelEntry::from).collect(),
        },
    }))
}

/// `PUT /congestion?id=..&level=..`: insert or replace one charger's level.
#[tracing::instrument(skip_all, fields(user_id = %user.0.sub))]
pub async fn put_congestion_level(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<LevelQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let id = required_id(query.id)?;
    let level = query
        .level
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!(INVALID_LEVEL_MESSAGE)))?;

    state.congestion.set_level(&id, &level).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Congestion level updated successfully")),
    ))
}

/// `DELETE /congestion?id=..`: afterwards the charger reads as `unknown`.
#[tracing::instrument(skip_all, fields(user_id = %user.0.sub))]
pub async fn delete_congestion_level(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(query): QueryParams<LevelQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let id = required_id(query.id)?;

    state.congestion.delete_level(&id).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Congestion level deleted successfully")),
    ))
}

/// `POST /congestion/batch`: bulk upload from the prediction pipeline.
#[tracing::instrument(skip_all, fields(user_id = %user.0.sub))]
pub async fn post_congestion_levels_batch(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(request): ValidatedJson<BatchUpdateRequest>,
) -> Result<(StatusCode, Json<BatchUpdateResponse>), AppError> {
    if let Some(reported) = &request.count {
        if reported.as_u64() != Some(request.predictions.len() as u64) {
            tracing::warn!(
                reported = %reported,
                received = request.predictions.len(),
                timestamp = ?request.timestamp,
                "Batch count does not match number of predictions"
            );
        }
    }

    let entries = request.predictions.into_iter().map(Into::into).collect();
    let count = state.congestion.set_levels_batch(entries).await?;

    Ok((
        StatusCode::CREATED,
        Json(BatchUpdateResponse {
            message: "Congestion levels updated successfully".to_string(),
            count,
        }),
    ))
}

fn required_id(id: Option<String>) -> Result<String, AppError> {
    id.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("ID parameter must be a string")))
}
