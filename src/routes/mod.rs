use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{result::ApiResponse, utils::success_to_api_response};

pub mod auth;
pub mod message;
pub mod notification;
pub mod quiz;
pub mod room;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub time: DateTime<Utc>,
}

/// Acknowledgement body for operations with nothing else to return.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub async fn health() -> Json<ApiResponse<HealthStatus>> {
    success_to_api_response(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        time: Utc::now(),
    })
}
