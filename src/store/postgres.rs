//! Managed Postgres backend, used when `DATABASE_URL` carries a postgres
//! connection string.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::errors::AppError;
use crate::models::{AudienceSync, Member, MemberSource, NewMember, Roster, SearchCriteria};
use crate::store::{like_pattern, map_insert_error, sql_connector, MemberStore};

const MEMBER_COLUMNS: &str = "id, member_number, first_name, last_name, email, phone, \
     amount_paid, year, is_active, source, created_at, updated_at";

/// Postgres-backed member store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run the idempotent migrations.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }
}

async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // The extended query protocol takes one statement per call.
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
                amount_paid DOUBLE PRECISION NOT NULL DEFAULT 35,
                year INTEGER NOT NULL DEFAULT {year},
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                source TEXT NOT NULL DEFAULT 'form',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            table = table,
            year = roster.year(),
        );
        sqlx::query(&sql).execute(pool).await?;

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
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl MemberStore for PgStore {
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
            "SELECT {MEMBER_COLUMNS} FROM {} WHERE member_number = $1",
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
                    "SELECT {MEMBER_COLUMNS} FROM {table} WHERE member_number = $1 ORDER BY member_number"
                );
                sqlx::query(&sql).bind(number).fetch_all(&self.pool).await?
            }
            (None, Some(email)) => {
                let sql = format!(
                    "SELECT {MEMBER_COLUMNS} FROM {table} WHERE email ILIKE $1 ORDER BY member_number"
                );
                sqlx::query(&sql)
                    .bind(like_pattern(email))
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(number), Some(email)) => {
                let sql = format!(
                    "SELECT {MEMBER_COLUMNS} FROM {table} WHERE member_number = $1 {} email ILIKE $2 ORDER BY member_number",
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
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
            .bind(member.is_active)
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
             VALUES ($1, $2, $3, $4, $5, $6)",
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

fn member_from_row(row: &PgRow) -> Member {
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
        is_active: row.get("is_active"),
        source: MemberSource::parse(&source),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
