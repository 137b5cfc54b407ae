//! Connectivity status models for the two external resources.

use serde::Serialize;

/// Row counts for the two roster tables.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TableCounts {
    pub members_2025: i64,
    pub members_2026: i64,
}

/// Storage backend status. Connectivity failures fold into
/// `connected: false` instead of an error response.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub connected: bool,
    pub tables: TableCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreStatus {
    pub fn connected(tables: TableCounts) -> Self {
        Self {
            connected: true,
            tables,
            error: None,
        }
    }

    pub fn disconnected(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            tables: TableCounts::default(),
            error: Some(error.into()),
        }
    }
}

/// Basic facts about the configured MailChimp audience.
#[derive(Debug, Clone, Serialize)]
pub struct AudienceInfo {
    pub id: String,
    pub name: String,
    pub member_count: i64,
}

/// MailChimp connectivity status; never an error response either.
#[derive(Debug, Clone, Serialize)]
pub struct AudienceStatus {
    pub configured: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<AudienceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AudienceStatus {
    pub fn not_configured() -> Self {
        Self {
            configured: false,
            connected: false,
            audience: None,
            error: Some(
                "MailChimp not configured. Set MAILCHIMP_API_KEY, MAILCHIMP_SERVER_PREFIX and MAILCHIMP_AUDIENCE_ID."
                    .to_string(),
            ),
        }
    }
}
