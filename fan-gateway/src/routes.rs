//! Route handlers

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use libfanpost::publisher::{PublishRequest, PublishResponse};
use libfanpost::TickReport;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::AppState;

fn now() -> i64 {
    Utc::now().timestamp()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /dispatch - one trigger tick; cron secret only
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<TickReport>, ApiError> {
    if caller != Caller::Service {
        return Err(ApiError::unauthorized());
    }

    let report = state.publisher.run_tick(now()).await.map_err(|e| {
        tracing::error!(error = %e, "Dispatch tick failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(report))
}

/// POST /publish - publish one of the caller's posts now
pub async fn publish(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<PublishResponse>, ApiError> {
    let user_id = caller.user_id().ok_or_else(ApiError::unauthorized)?;
    let request = body(payload)?;

    let response = state.publisher.publish_now(user_id, &request, now()).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    pub user_id: Option<String>,
}

/// GET /verify - connection check for the caller, or `?userId=` for services
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<Value>, ApiError> {
    let user_id = match (&caller, query.user_id) {
        (Caller::User(id), _) => id.clone(),
        (Caller::Service, Some(id)) if !id.trim().is_empty() => id,
        (Caller::Service, _) => return Err(ApiError::bad_request("userId is required")),
    };

    let credentials = state.publisher.db().get_credentials(&user_id).await?;
    let connected = state.verifier.verify(credentials.as_ref()).await;
    Ok(Json(json!({ "connected": connected })))
}

/// Unix seconds or an RFC 3339 timestamp
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ScheduleTime {
    Unix(i64),
    Text(String),
}

impl ScheduleTime {
    fn timestamp(&self) -> Result<i64, ApiError> {
        match self {
            ScheduleTime::Unix(secs) => Ok(*secs),
            ScheduleTime::Text(text) => DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.timestamp())
                .map_err(|e| ApiError::bad_request(format!("Invalid scheduledAt '{}': {}", text, e))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub post_id: String,
    pub scheduled_at: ScheduleTime,
}

/// POST /schedule - put one of the caller's posts on the schedule
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller.user_id().ok_or_else(ApiError::unauthorized)?;
    let request = body(payload)?;
    let at = request.scheduled_at.timestamp()?;

    state.publisher.schedule(user_id, &request.post_id, at).await?;
    Ok(Json(json!({ "success": true, "scheduledAt": at })))
}
