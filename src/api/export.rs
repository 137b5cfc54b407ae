//! Roster export endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::errors::AppError;
use crate::models::Roster;
use crate::sheet;
use crate::AppState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// GET /api/database/export-2025 - Download the 2025 roster as xlsx.
pub async fn export_members_2025(State(state): State<AppState>) -> Result<Response, AppError> {
    export_roster(&state, Roster::Y2025).await
}

/// GET /api/database/export-2026 - Download the 2026 roster as xlsx.
pub async fn export_members_2026(State(state): State<AppState>) -> Result<Response, AppError> {
    export_roster(&state, Roster::Y2026).await
}

async fn export_roster(state: &AppState, roster: Roster) -> Result<Response, AppError> {
    let mut members = state.members.list(roster).await?;
    members.sort_by(|a, b| a.last_name.cmp(&b.last_name));

    let sheet_name = format!("Members {}", roster);
    let buffer = sheet::write_roster(&members, &sheet_name)?;

    let filename = format!("members_{}_{}.xlsx", roster, Utc::now().format("%Y-%m-%d"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        buffer,
    )
        .into_response())
}
