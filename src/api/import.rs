//! Spreadsheet upload endpoints.

use axum::extract::{Multipart, State};
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::ImportReport;
use crate::sheet::{self, SheetDiagnostics};
use crate::AppState;

/// Import outcome: counts, both error forms and the summary line.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub report: ImportReport,
    pub failed: usize,
    pub error_messages: Vec<String>,
    pub message: String,
}

/// Diagnostic payload for an upload the importer does not recognize.
#[derive(Debug, Serialize)]
pub struct DebugResponse {
    pub file_name: String,
    pub file_size: usize,
    #[serde(flatten)]
    pub sheet: SheetDiagnostics,
}

/// POST /api/database/import-excel - Bulk-import a spreadsheet into the
/// 2025 roster.
pub async fn import_excel(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<ImportResponse> {
    let upload = read_file_field(multipart).await?;
    let candidates = sheet::parse_members(&upload.data)?;
    if candidates.is_empty() {
        return Err(AppError::Validation(
            "No valid members found in Excel file".to_string(),
        ));
    }

    tracing::info!(
        "Importing {} members from {}",
        candidates.len(),
        upload.file_name
    );
    let report = state.members.import_members(candidates).await;

    let failed = report.failed();
    let error_messages = report.error_messages();
    let message = format!(
        "Successfully imported {} out of {} members",
        report.imported, report.total
    );
    success(ImportResponse {
        report,
        failed,
        error_messages,
        message,
    })
}

/// POST /api/debug-excel - Inspect an upload without importing it.
pub async fn debug_excel(multipart: Multipart) -> ApiResult<DebugResponse> {
    let upload = read_file_field(multipart).await?;
    let sheet = sheet::inspect(&upload.data)?;
    success(DebugResponse {
        file_name: upload.file_name,
        file_size: upload.data.len(),
        sheet,
    })
}

struct FileUpload {
    file_name: String,
    data: Vec<u8>,
}

/// Pull the `file` field out of a multipart form.
async fn read_file_field(mut multipart: Multipart) -> Result<FileUpload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart request: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
            .to_vec();
        return Ok(FileUpload { file_name, data });
    }

    Err(AppError::BadRequest("No file provided".to_string()))
}
