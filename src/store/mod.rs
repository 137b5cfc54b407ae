//! Storage backends for the member rosters.
//!
//! Exactly one backend is active per process, chosen from the configuration
//! at startup: managed Postgres, the Supabase REST API, or the embedded
//! SQLite fallback. All three implement the same capability trait.

mod postgres;
mod sqlite;
mod supabase;

pub use postgres::PgStore;
pub use sqlite::{init_database, SqliteStore};
pub use supabase::SupabaseStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StorageConfig;
use crate::errors::AppError;
use crate::models::{AudienceSync, Member, NewMember, Roster, SearchCriteria, SearchMode};

/// Operation contract shared by all storage backends.
///
/// The two rosters are independent uniqueness domains for `member_number`.
/// `insert` carries no duplicate pre-check of its own: concurrent inserts
/// race to the backend's uniqueness constraint and the loser surfaces
/// [`AppError::Duplicate`].
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// All members of a roster, ordered by member number.
    async fn list(&self, roster: Roster) -> Result<Vec<Member>, AppError>;

    /// Look up a member by exact member number.
    async fn find_by_number(
        &self,
        roster: Roster,
        member_number: &str,
    ) -> Result<Option<Member>, AppError>;

    /// Search a roster by exact member number and/or email substring,
    /// combined per the criteria's match mode.
    async fn search(
        &self,
        roster: Roster,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Member>, AppError>;

    /// Insert a member and return the stored row.
    async fn insert(&self, roster: Roster, member: &NewMember) -> Result<Member, AppError>;

    /// Number of members in a roster.
    async fn count(&self, roster: Roster) -> Result<i64, AppError>;

    /// Record a completed audience sync for a 2026 member.
    async fn record_sync(&self, member_id: &str, sync: &AudienceSync) -> Result<(), AppError>;
}

/// Open the backend the configuration selected.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn MemberStore>, AppError> {
    match config {
        StorageConfig::Postgres { url } => Ok(Arc::new(PgStore::connect(url).await?)),
        StorageConfig::Supabase { url, anon_key } => {
            Ok(Arc::new(SupabaseStore::new(url, anon_key)?))
        }
        StorageConfig::Sqlite { path } => {
            let pool = init_database(path).await?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
    }
}

/// SQL connective for combining both search criteria.
pub(crate) fn sql_connector(mode: SearchMode) -> &'static str {
    match mode {
        SearchMode::All => "AND",
        SearchMode::Any => "OR",
    }
}

/// Substring pattern for LIKE/ILIKE email matching.
pub(crate) fn like_pattern(fragment: &str) -> String {
    format!("%{}%", fragment)
}

/// Translate an insert failure, giving uniqueness violations a message that
/// names the member and roster.
pub(crate) fn map_insert_error(err: sqlx::Error, member_number: &str, roster: Roster) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::Duplicate(format!(
                "Member {} already exists in the {} list",
                member_number, roster
            ));
        }
    }
    AppError::from(err)
}
