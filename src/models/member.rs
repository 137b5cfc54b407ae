//! Member model matching the club's frontend contract.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Default membership fee applied when no amount is given.
pub const DEFAULT_AMOUNT_PAID: f64 = 35.0;

/// Where a member record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberSource {
    /// Entered manually through the signup form.
    #[serde(rename = "form")]
    Form,
    /// Migrated from the imported 2025 list.
    #[serde(rename = "2025_list")]
    List2025,
}

impl MemberSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberSource::Form => "form",
            MemberSource::List2025 => "2025_list",
        }
    }

    /// Parse a stored source value; unknown values fall back to `form`.
    pub fn parse(s: &str) -> Self {
        match s {
            "2025_list" => MemberSource::List2025,
            _ => MemberSource::Form,
        }
    }
}

/// One of the two yearly rosters. Each roster is an independent
/// uniqueness domain for `member_number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Roster {
    #[serde(rename = "2025")]
    Y2025,
    #[serde(rename = "2026")]
    Y2026,
}

impl Roster {
    /// Parse the roster selector used by the frontend ("2025"/"2026").
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2025" => Some(Roster::Y2025),
            "2026" => Some(Roster::Y2026),
            _ => None,
        }
    }

    /// Backing table for this roster.
    pub fn table(&self) -> &'static str {
        match self {
            Roster::Y2025 => "members_2025",
            Roster::Y2026 => "members_2026",
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            Roster::Y2025 => 2025,
            Roster::Y2026 => 2026,
        }
    }
}

impl std::fmt::Display for Roster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.year())
    }
}

/// A persisted club member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub member_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub amount_paid: f64,
    pub year: i32,
    pub is_active: bool,
    pub source: MemberSource,
    pub created_at: String,
    pub updated_at: String,
}

/// A member candidate ready for insertion: everything except the
/// store-assigned id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
    pub member_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_amount")]
    pub amount_paid: f64,
    pub year: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub source: MemberSource,
}

fn default_amount() -> f64 {
    DEFAULT_AMOUNT_PAID
}

fn default_active() -> bool {
    true
}

impl NewMember {
    /// Check the four required fields are non-empty after trimming.
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("member_number", &self.member_number),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("Missing required field: {}", field)));
            }
        }
        Ok(())
    }
}

/// Request body for POST /api/database/add-member.
///
/// `database` selects the target roster and is validated by the handler so
/// an invalid selector yields the frontend's expected 400, not a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct AddMemberRequest {
    #[serde(default)]
    pub member_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub amount_paid: Option<f64>,
    #[serde(default)]
    pub year: Option<i32>,
    pub database: String,
}

impl AddMemberRequest {
    /// Resolve defaults against the target roster. A direct add is a form
    /// submission, whichever roster it targets.
    pub fn into_new_member(self, roster: Roster) -> NewMember {
        NewMember {
            member_number: self.member_number,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            amount_paid: self.amount_paid.unwrap_or(DEFAULT_AMOUNT_PAID),
            year: self.year.unwrap_or_else(|| roster.year()),
            is_active: true,
            source: MemberSource::Form,
        }
    }
}

/// The member payload accepted by POST /api/database/transfer-member.
///
/// Comes straight from a 2025 search result; the id and timestamps are
/// ignored, the business key is `member_number`/`email`.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferMember {
    #[serde(default)]
    pub member_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub amount_paid: Option<f64>,
}

/// Request body for POST /api/database/transfer-member.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub member: TransferMember,
}

/// How multiple search criteria combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Every given criterion must match (the database implementations).
    #[default]
    All,
    /// Any given criterion may match (the legacy in-memory search).
    Any,
}

///// Search criteria against the 2025 roster: exact member number and/or
/// case-insensitive email substring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "is_default_mode")]
    pub mode: SearchMode,
}

fn is_default_mode(mode: &SearchMode) -> bool {
    *mode == SearchMode::All
}

impl SearchCriteria {
    /// True when no usable criterion was given.
    pub fn is_empty(&self) -> bool {
        self.number().is_none() && self.email_fragment().is_none()
    }

    /// The member-number criterion, trimmed, if non-empty.
    pub fn number(&self) -> Option<&str> {
        self.member_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The email-substring criterion, trimmed, if non-empty.
    pub fn email_fragment(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_parse_accepts_only_known_years() {
        assert_eq!(Roster::parse("2025"), Some(Roster::Y2025));
        assert_eq!(Roster::parse("2026"), Some(Roster::Y2026));
        assert_eq!(Roster::parse("2024"), None);
        assert_eq!(Roster::parse(""), None);
    }

    #[test]
    fn test_add_request_defaults() {
        let request = AddMemberRequest {
            member_number: "42".into(),
            first_name: "Ana".into(),
            last_name: "García".into(),
            email: "ana@example.com".into(),
            phone: String::new(),
            amount_paid: None,
            year: None,
            database: "2026".into(),
        };

        let member = request.clone().into_new_member(Roster::Y2026);
        assert_eq!(member.amount_paid, DEFAULT_AMOUNT_PAID);
        assert_eq!(member.year, 2026);
        assert_eq!(member.source, MemberSource::Form);
        assert!(member.is_active);

        // A 2025 add is still a form submission, not a list migration.
        let member = request.into_new_member(Roster::Y2025);
        assert_eq!(member.year, 2025);
        assert_eq!(member.source, MemberSource::Form);
    }

    #[test]
    fn test_validate_rejects_blank_required_fields() {
        let member = NewMember {
            member_number: "1001".into(),
            first_name: "   ".into(),
            last_name: "García".into(),
            email: "ana@example.com".into(),
            phone: String::new(),
            amount_paid: DEFAULT_AMOUNT_PAID,
            year: 2025,
            is_active: true,
            source: MemberSource::List2025,
        };

        let err = member.validate().unwrap_err();
        assert!(err.message().contains("first_name"));
    }

    #[test]
    fn test_criteria_empty_when_fields_blank() {
        let criteria = SearchCriteria {
            member_number: Some("  ".into()),
            email: None,
            mode: SearchMode::All,
        };
        assert!(criteria.is_empty());

        let criteria = SearchCriteria {
            member_number: None,
            email: Some("gmail".into()),
            mode: SearchMode::Any,
        };
        assert!(!criteria.is_empty());
        assert_eq!(criteria.email_fragment(), Some("gmail"));
    }

    #[test]
    fn test_search_mode_defaults_to_all() {
        let criteria: SearchCriteria =
            serde_json::from_str(r#"{"member_number":"B2","email":"gmail"}"#).unwrap();
        assert_eq!(criteria.mode, SearchMode::All);

        let criteria: SearchCriteria =
            serde_json::from_str(r#"{"email":"gmail","match":"any"}"#).unwrap();
        assert_eq!(criteria.mode, SearchMode::Any);
    }
}
