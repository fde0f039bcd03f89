use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admin::service::{AdminError, PoolAdmin, PoolStatus};

/// Body of `POST /backends` and `DELETE /backends`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackendRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendResponse {
    pub message: String,
    pub url: String,
}

impl AdminError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdminError::InvalidBody(_) | AdminError::Pool(_) => StatusCode::BAD_REQUEST,
            AdminError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

fn parse_body(body: &[u8]) -> Result<BackendRequest, AdminError> {
    serde_json::from_slice(body).map_err(|e| AdminError::InvalidBody(e.to_string()))
}

pub async fn get_status(State(admin): State<Arc<PoolAdmin>>) -> Json<PoolStatus> {
    Json(admin.status())
}

pub async fn post_backend(
    State(admin): State<Arc<PoolAdmin>>,
    body: Bytes,
) -> Result<(StatusCode, Json<BackendResponse>), AdminError> {
    let request = parse_body(&body)?;
    let target = admin.add_target(&request.url).await?;

    Ok((
        StatusCode::CREATED,
        Json(BackendResponse {
            message: "Backend added successfully".to_string(),
            url: target.url().to_string(),
        }),
    ))
}

pub async fn delete_backend(
    State(admin): State<Arc<PoolAdmin>>,
    body: Bytes,
) -> Result<Json<BackendResponse>, AdminError> {
    let request = parse_body(&body)?;
    let target = admin.remove_target(&request.url).await?;

    Ok(Json(BackendResponse {
        message: "Backend deleted successfully".to_string(),
        url: target.url().to_string(),
    }))
}
