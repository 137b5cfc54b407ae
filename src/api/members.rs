//! Member roster endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{AddMemberRequest, Member, Roster, SearchCriteria, TransferRequest};
use crate::AppState;

/// A roster listing with its size.
#[derive(Debug, Serialize)]
pub struct MemberListResponse {
    pub members: Vec<Member>,
    pub count: usize,
}

/// Search results echoing the criteria they matched.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "searchCriteria")]
    pub search_criteria: SearchCriteria,
    pub members: Vec<Member>,
    pub count: usize,
}

/// A stored member plus the confirmation line the frontend displays.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub member: Member,
    pub message: String,
}

/// GET /api/database/members-2025 - List the 2025 roster.
pub async fn list_members_2025(State(state): State<AppState>) -> ApiResult<MemberListResponse> {
    list_roster(&state, Roster::Y2025).await
}

/// GET /api/database/members-2026 - List the 2026 roster.
pub async fn list_members_2026(State(state): State<AppState>) -> ApiResult<MemberListResponse> {
    list_roster(&state, Roster::Y2026).await
}

async fn list_roster(state: &AppState, roster: Roster) -> ApiResult<MemberListResponse> {
    let members = state.members.list(roster).await?;
    let count = members.len();
    success(MemberListResponse { members, count })
}

/// POST /api/database/search-member - Search the 2025 roster by member
/// number and/or email substring.
pub async fn search_member(
    State(state): State<AppState>,
    Json(criteria): Json<SearchCriteria>,
) -> ApiResult<SearchResponse> {
    if criteria.is_empty() {
        return Err(AppError::BadRequest(
            "Either member_number or email is required".to_string(),
        ));
    }

    let members = state.members.search(&criteria).await?;
    let count = members.len();
    success(SearchResponse {
        search_criteria: criteria,
        members,
        count,
    })
}

/// POST /api/database/add-member - Add a member to the selected roster.
pub async fn add_member(
    State(state): State<AppState>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<MutationResponse> {
    let Some(roster) = Roster::parse(&request.database) else {
        return Err(AppError::BadRequest(
            "Invalid database selection".to_string(),
        ));
    };

    let member = state
        .members
        .add(roster, request.into_new_member(roster))
        .await?;

    success(MutationResponse {
        message: format!(
            "Member successfully added to {} database and MailChimp",
            roster
        ),
        member,
    })
}

/// POST /api/database/transfer-member - Copy a 2025 member into 2026.
pub async fn transfer_member(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<MutationResponse> {
    let member = request.member;
    if member.member_number.trim().is_empty() || member.email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Invalid member data provided".to_string(),
        ));
    }

    let member = state.members.transfer(member).await?;
    success(MutationResponse {
        message: "Member successfully transferred to 2026".to_string(),
        member,
    })
}
