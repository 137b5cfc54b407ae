//! Embedded SQLite backend, the fallback when no managed database is
//! configured.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::errors::AppError;
use crate::models::{AudienceSync, Member, MemberSource, NewMember, Roster, SearchCriteria};
use crate::store::{like_pattern, map_insert_error, sql_connector, MemberStore};

const MEMBER_COLUMNS: &str = "id, member_number, first_name, last_name, email, phone, \
     amount_paid, year, is_active, source, created_at, updated_at";

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for roster in [Roster::Y2025, Roster::Y2026] {
        let table = roster.table();

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                member_number TEXT NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL,
                phone TEXT NOT NULL DEFAULT '',
                amount_paid REAL NOT NULL DEFAULT 35,
                year INTEGER NOT NULL DEFAULT {year},
                is_active INTEGER NOT NULL DEFAULT 1,
                source TEXT NOT NULL DEFAULT 'form',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
            table = table,
            year = roster.year(),
        );
        sqlx::query(&sql).execute(pool).await?;

        // member_number is covered by its UNIQUE constraint; email gets its
        // own index for substring search.
        let index = format!("CREATE INDEX IF NOT EXISTS idx_{table}_email ON {table}(email)");
        sqlx::query(&index).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mailchimp_sync (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            mailchimp_id TEXT NOT NULL,
            audience_id TEXT NOT NULL,
            tags TEXT,
            synced_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// SQLite-backed member store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberStore for SqliteStore {
    async fn list(&self, roster: Roster) -> Result<Vec<Member>, AppError> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM {} ORDER BY member_number",
            roster.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    async fn find_by_number(
        &self,
        roster: Roster,
        member_number: &str,
    ) -> Result<Option<Member>, AppError> {
        let sql = format!(
            "SELECT {MEMBER_COLUMNS} FROM {} WHERE member_number = ?",
            roster.table()
        );
        let row = sqlx::query(&sql)
            .bind(member_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(member_from_row))
    }

    async fn search(
        &self,
        roster: Roster,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Member>, AppError> {
        let table = roster.table();
        let rows = match (criteria.number(), criteria.email_fragment()) {
            (None, None) => return Ok(Vec::new()),
            (Some(number), None) => {
                let sql = format!(
                    "SELECT {MEMBER_COLUMNS} FROM {table} WHERE member_number = ? ORDER BY member_number"
                );
                sqlx::query(&sql).bind(number).fetch_all(&self.pool).await?
            }
            (None, Some(email)) => {
                let sql = format!(
                    "SELECT {MEMBER_COLUMNS} FROM {table} WHERE email LIKE ? ORDER BY member_number"
                );
                sqlx::query(&sql)
                    .bind(like_pattern(email))
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(number), Some(email)) => {
                let sql = format!(
                    "SELECT {MEMBER_COLUMNS} FROM {table} WHERE member_number = ? {} email LIKE ? ORDER BY member_number",
                    sql_connector(criteria.mode)
                );
                sqlx::query(&sql)
                    .bind(number)
                    .bind(like_pattern(email))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.iter().map(member_from_row).collect())
    }

    async fn insert(&self, roster: Roster, member: &NewMember) -> Result<Member, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let sql = format!(
            "INSERT INTO {} (id, member_number, first_name, last_name, email, phone, \
             amount_paid, year, is_active, source, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            roster.table()
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(&member.member_number)
            .bind(&member.first_name)
            .bind(&member.last_name)
            .bind(&member.email)
            .bind(&member.phone)
            .bind(member.amount_paid)
            .bind(member.year)
            .bind(member.is_active as i32)
            .bind(member.source.as_str())
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|err| map_insert_error(err, &member.member_number, roster))?;

        Ok(Member {
            id,
            member_number: member.member_number.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            email: member.email.clone(),
            phone: member.phone.clone(),
            amount_paid: member.amount_paid,
            year: member.year,
            is_active: member.is_active,
            source: member.source,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn count(&self, roster: Roster) -> Result<i64, AppError> {
        let sql = format!("SELECT COUNT(*) AS count FROM {}", roster.table());
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;

        Ok(row.get("count"))
    }

    async fn record_sync(&self, member_id: &str, sync: &AudienceSync) -> Result<(), AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let tags_json = serde_json::to_string(&sync.tags).unwrap_or_default();

        sqlx::query(
            "INSERT INTO mailchimp_sync (id, member_id, mailchimp_id, audience_id, tags, synced_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(member_id)
        .bind(&sync.mailchimp_id)
        .bind(&sync.audience_id)
        .bind(&tags_json)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Helper for row conversion

fn member_from_row(row: &SqliteRow) -> Member {
    let is_active: i32 = row.get("is_active");
    let source: String = row.get("source");
    Member {
        id: row.get("id"),
        member_number: row.get("member_number"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        amount_paid: row.get("amount_paid"),
        year: row.get("year"),
        is_active: is_active != 0,
        source: MemberSource::parse(&source),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchMode, DEFAULT_AMOUNT_PAID};

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        (SqliteStore::new(pool), dir)
    }

    fn candidate(number: &str, email: &str) -> NewMember {
        NewMember {
            member_number: number.to_string(),
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            email: email.to_string(),
            phone: String::new(),
            amount_paid: DEFAULT_AMOUNT_PAID,
            year: 2025,
            is_active: true,
            source: MemberSource::List2025,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamps() {
        let (store, _dir) = test_store().await;

        let member = store
            .insert(Roster::Y2025, &candidate("1001", "ana@example.com"))
            .await
            .unwrap();

        assert!(!member.id.is_empty());
        assert!(!member.created_at.is_empty());
        assert_eq!(member.created_at, member.updated_at);

        let listed = store.list(Roster::Y2025).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].member_number, "1001");
        assert_eq!(listed[0].source, MemberSource::List2025);
    }

    #[tokio::test]
    async fn test_duplicate_number_races_to_constraint() {
        let (store, _dir) = test_store().await;

        store
            .insert(Roster::Y2025, &candidate("1001", "ana@example.com"))
            .await
            .unwrap();
        let err = store
            .insert(Roster::Y2025, &candidate("1001", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));

        // The same number in the other roster is not a duplicate.
        store
            .insert(Roster::Y2026, &candidate("1001", "ana@example.com"))
            .await
            .unwrap();
        assert_eq!(store.count(Roster::Y2025).await.unwrap(), 1);
        assert_eq!(store.count(Roster::Y2026).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_email_uniqueness_not_enforced() {
        let (store, _dir) = test_store().await;

        store
            .insert(Roster::Y2025, &candidate("1001", "shared@example.com"))
            .await
            .unwrap();
        store
            .insert(Roster::Y2025, &candidate("1002", "shared@example.com"))
            .await
            .unwrap();

        assert_eq!(store.count(Roster::Y2025).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_search_modes_combine_criteria() {
        let (store, _dir) = test_store().await;
        store
            .insert(Roster::Y2025, &candidate("A1", "x@gmail.com"))
            .await
            .unwrap();
        store
            .insert(Roster::Y2025, &candidate("B2", "y@yahoo.com"))
            .await
            .unwrap();

        let hits = store
            .search(
                Roster::Y2025,
                &SearchCriteria {
                    member_number: None,
                    email: Some("GMAIL".to_string()),
                    mode: SearchMode::All,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].member_number, "A1");

        // Both criteria under "all": the pair must match the same row.
        let hits = store
            .search(
                Roster::Y2025,
                &SearchCriteria {
                    member_number: Some("B2".to_string()),
                    email: Some("gmail".to_string()),
                    mode: SearchMode::All,
                },
            )
            .await
            .unwrap();
        assert!(hits.is_empty());

        // Under "any" the same pair matches both rows.
        let hits = store
            .search(
                Roster::Y2025,
                &SearchCriteria {
                    member_number: Some("B2".to_string()),
                    email: Some("gmail".to_string()),
                    mode: SearchMode::Any,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_list_orders_by_member_number() {
        let (store, _dir) = test_store().await;
        for number in ["30", "10", "20"] {
            store
                .insert(
                    Roster::Y2025,
                    &candidate(number, &format!("{}@example.com", number)),
                )
                .await
                .unwrap();
        }

        let listed = store.list(Roster::Y2025).await.unwrap();
        let numbers: Vec<&str> = listed.iter().map(|m| m.member_number.as_str()).collect();
        assert_eq!(numbers, ["10", "20", "30"]);
    }

    #[tokio::test]
    async fn test_sync_records_are_stored() {
        let (store, _dir) = test_store().await;
        let member = store
            .insert(Roster::Y2026, &candidate("1001", "ana@example.com"))
            .await
            .unwrap();

        store
            .record_sync(
                &member.id,
                &AudienceSync {
                    mailchimp_id: "abc123".to_string(),
                    audience_id: "aud1".to_string(),
                    tags: vec!["Activos 25-26".to_string()],
                },
            )
            .await
            .unwrap();

        let row = sqlx::query("SELECT member_id, tags FROM mailchimp_sync")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        let member_id: String = row.get("member_id");
        let tags: String = row.get("tags");
        assert_eq!(member_id, member.id);
        assert!(tags.contains("Activos 25-26"));
    }
}
