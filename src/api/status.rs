//! Connectivity status endpoints. Neither ever fails the request;
//! problems are reported inside the payload.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::{AudienceStatus, StoreStatus};
use crate::AppState;

/// GET /api/database/status - Storage backend status with roster counts.
pub async fn database_status(State(state): State<AppState>) -> ApiResult<StoreStatus> {
    success(state.members.status().await)
}

/// GET /api/mailchimp/status - MailChimp audience connectivity.
pub async fn mailchimp_status(State(state): State<AppState>) -> ApiResult<AudienceStatus> {
    success(state.members.audience_status().await)
}
