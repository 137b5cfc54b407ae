//! Supabase backend driven over the PostgREST API.
//!
//! The club's legacy deployment keeps its tables in a Supabase project;
//! this backend talks to `/rest/v1` directly with the anon key.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{
    AudienceSync, Member, MemberSource, NewMember, Roster, SearchCriteria, SearchMode,
};
use crate::store::MemberStore;

/// Supabase-backed member store.
pub struct SupabaseStore {
    http: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseStore {
    pub fn new(url: &str, anon_key: &str) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AppError::Storage(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn fetch_members(
        &self,
        roster: Roster,
        filters: &[(&str, String)],
    ) -> Result<Vec<Member>, AppError> {
        let response = self
            .request(Method::GET, &self.table_url(roster.table()))
            .query(&[("select", "*"), ("order", "member_number.asc")])
            .query(filters)
            .send()
            .await
            .map_err(request_failed)?;
        let response = ensure_success(response).await?;

        let rows: Vec<SupabaseRow> = response.json().await.map_err(request_failed)?;
        Ok(rows.into_iter().map(SupabaseRow::into_member).collect())
    }
}

#[async_trait]
impl MemberStore for SupabaseStore {
    async fn list(&self, roster: Roster) -> Result<Vec<Member>, AppError> {
        self.fetch_members(roster, &[]).await
    }

    async fn find_by_number(
        &self,
        roster: Roster,
        member_number: &str,
    ) -> Result<Option<Member>, AppError> {
        let members = self
            .fetch_members(roster, &[("member_number", format!("eq.{}", member_number))])
            .await?;
        Ok(members.into_iter().next())
    }

    async fn search(
        &self,
        roster: Roster,
        criteria: &SearchCriteria,
    ) -> Result<Vec<Member>, AppError> {
        match search_filters(criteria) {
            Some(filters) => self.fetch_members(roster, &filters).await,
            None => Ok(Vec::new()),
        }
    }

    async fn insert(&self, roster: Roster, member: &NewMember) -> Result<Member, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let body = serde_json::json!([{
            "id": id,
            "member_number": member.member_number,
            "first_name": member.first_name,
            "last_name": member.last_name,
            "email": member.email,
            "phone": member.phone,
            "amount_paid": member.amount_paid,
            "year": member.year,
            "is_active": member.is_active,
            "source": member.source.as_str(),
            "created_at": now,
            "updated_at": now,
        }]);

        let response = self
            .request(Method::POST, &self.table_url(roster.table()))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        // PostgREST reports a uniqueness violation as 409.
        if response.status() == StatusCode::CONFLICT {
            return Err(AppError::Duplicate(format!(
                "Member {} already exists in the {} list",
                member.member_number, roster
            )));
        }
        let response = ensure_success(response).await?;

        let mut rows: Vec<SupabaseRow> = response.json().await.map_err(request_failed)?;
        rows.pop().map(SupabaseRow::into_member).ok_or_else(|| {
            AppError::Storage("Supabase returned no representation for insert".to_string())
        })
    }

    async fn count(&self, roster: Roster) -> Result<i64, AppError> {
        // Counting via the full list matches how small these rosters are.
        Ok(self.list(roster).await?.len() as i64)
    }

    async fn record_sync(&self, member_id: &str, sync: &AudienceSync) -> Result<(), AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let body = serde_json::json!([{
            "id": id,
            "member_id": member_id,
            "mailchimp_id": sync.mailchimp_id,
            "audience_id": sync.audience_id,
            "tags": serde_json::to_string(&sync.tags).unwrap_or_default(),
            "synced_at": now,
        }]);

        let response = self
            .request(Method::POST, &self.table_url("mailchimp_sync"))
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;
        ensure_success(response).await?;

        Ok(())
    }
}

/// PostgREST filter set for the given criteria; `None` when no criterion
/// was given.
fn search_filters(criteria: &SearchCriteria) -> Option<Vec<(&'static str, String)>> {
    let filters = match (criteria.number(), criteria.email_fragment()) {
        (None, None) => return None,
        (Some(number), None) => vec![("member_number", format!("eq.{}", number))],
        (None, Some(email)) => vec![("email", format!("ilike.*{}*", email))],
        (Some(number), Some(email)) => match criteria.mode {
            // Separate query parameters are ANDed by PostgREST.
            SearchMode::All => vec![
                ("member_number", format!("eq.{}", number)),
                ("email", format!("ilike.*{}*", email)),
            ],
            SearchMode::Any => vec![(
                "or",
                format!("(member_number.eq.{},email.ilike.*{}*)", number, email),
            )],
        },
    };
    Some(filters)
}

fn request_failed(err: reqwest::Error) -> AppError {
    AppError::Storage(format!("Supabase request failed: {}", err))
}

async fn ensure_success(response: Response) -> Result<Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Storage(format!(
        "Supabase returned {}: {}",
        status, body
    )))
}

/// Wire shape of a roster row as PostgREST returns it.
#[derive(Debug, Deserialize)]
struct SupabaseRow {
    id: String,
    member_number: String,
    first_name: String,
    last_name: String,
    email: String,
    #[serde(default)]
    phone: String,
    amount_paid: f64,
    year: i32,
    is_active: bool,
    source: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

impl SupabaseRow {
    fn into_member(self) -> Member {
        Member {
            id: self.id,
            member_number: self.member_number,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            amount_paid: self.amount_paid,
            year: self.year,
            is_active: self.is_active,
            source: MemberSource::parse(&self.source),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
