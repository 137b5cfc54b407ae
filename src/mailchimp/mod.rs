//! MailChimp audience client.
//!
//! Mirrors 2026 members into the club's marketing audience. Every call is
//! best-effort from the caller's perspective; failures are surfaced as
//! [`AppError::Sync`] and the member write they follow is never rolled back.

use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::MailchimpConfig;
use crate::errors::AppError;
use crate::models::{AudienceInfo, AudienceStatus, AudienceSync, Member};

/// Tag applied to every synced member.
pub const AUDIENCE_TAG: &str = "Activos 25-26";

/// Calls are bounded so a slow audience API cannot stall a member write.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MailchimpClient {
    http: Client,
    api_base: String,
    api_key: String,
    audience_id: String,
}

impl MailchimpClient {
    pub fn from_config(config: &MailchimpConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| AppError::Sync(format!("Failed to build HTTP client: {}", err)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            audience_id: config.audience_id.clone(),
        })
    }

    /// Upsert a member into the audience: re-tag an existing subscriber or
    /// create a new one. Returns the link data for the sync record.
    pub async fn upsert_member(&self, member: &Member) -> Result<AudienceSync, AppError> {
        let hash = subscriber_hash(&member.email);
        let lookup = format!(
            "{}/lists/{}/members/{}",
            self.api_base, self.audience_id, hash
        );

        let response = self
            .http
            .get(&lookup)
            .basic_auth("anystring", Some(&self.api_key))
            .send()
            .await
            .map_err(sync_failed)?;

        let mailchimp_id = if response.status() == StatusCode::NOT_FOUND {
            self.subscribe(member).await?
        } else {
            let subscriber: Subscriber = ensure_success(response)
                .await?
                .json()
                .await
                .map_err(sync_failed)?;
            self.tag_subscriber(&subscriber.id).await?;
            subscriber.id
        };

        Ok(AudienceSync {
            mailchimp_id,
            audience_id: self.audience_id.clone(),
            tags: vec![AUDIENCE_TAG.to_string()],
        })
    }

    async fn subscribe(&self, member: &Member) -> Result<String, AppError> {
        let url = format!("{}/lists/{}/members", self.api_base, self.audience_id);
        let body = json!({
            "email_address": member.email,
            "status": "subscribed",
            "merge_fields": {
                "FNAME": member.first_name,
                "LNAME": member.last_name,
                "PHONE": member.phone,
                "MEMBER_NUM": member.member_number,
                "AMOUNT_PAID": member.amount_paid.to_string(),
            },
            "tags": [AUDIENCE_TAG],
        });

        let response = self
            .http
            .post(&url)
            .basic_auth("anystring", Some(&self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(sync_failed)?;
        let subscriber: Subscriber = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(sync_failed)?;

        Ok(subscriber.id)
    }

    async fn tag_subscriber(&self, subscriber_id: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/lists/{}/members/{}/tags",
            self.api_base, self.audience_id, subscriber_id
        );
        let body = json!({
            "tags": [{ "name": AUDIENCE_TAG, "status": "active" }],
        });

        let response = self
            .http
            .post(&url)
            .basic_auth("anystring", Some(&self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(sync_failed)?;
        ensure_success(response).await?;

        Ok(())
    }

    /// Audience connectivity report; never an error.
    pub async fn status(&self) -> AudienceStatus {
        match self.audience_info().await {
            Ok(audience) => AudienceStatus {
                configured: true,
                connected: true,
                audience: Some(audience),
                error: None,
            },
            Err(err) => AudienceStatus {
                configured: true,
                connected: false,
                audience: None,
                error: Some(err.message().to_string()),
            },
        }
    }

    async fn audience_info(&self) -> Result<AudienceInfo, AppError> {
        let url = format!("{}/lists/{}", self.api_base, self.audience_id);
        let response = self
            .http
            .get(&url)
            .basic_auth("anystring", Some(&self.api_key))
            .send()
            .await
            .map_err(sync_failed)?;
        let list: AudienceList = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(sync_failed)?;

        Ok(AudienceInfo {
            id: list.id,
            name: list.name,
            member_count: list.stats.member_count,
        })
    }
}

/// MailChimp addresses subscribers by the MD5 of the lower-cased email.
fn subscriber_hash(email: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(email.to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

fn sync_failed(err: reqwest::Error) -> AppError {
    AppError::Sync(format!("MailChimp request failed: {}", err))
}

async fn ensure_success(response: Response) -> Result<Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Sync(format!(
        "MailChimp returned {}: {}",
        status, body
    )))
}

#[derive(Debug, Deserialize)]
struct Subscriber {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AudienceList {
    id: String,
    name: String,
    stats: AudienceStats,
}

#[derive(Debug, Deserialize)]
struct AudienceStats {
    member_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_hash_is_md5_of_lowercased_email() {
        assert_eq!(
            subscriber_hash("Ana@Example.COM"),
            subscriber_hash("ana@example.com")
        );
        // Known MD5 of the empty string.
        assert_eq!(subscriber_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn test_unreachable_api_surfaces_sync_error() {
        let client = MailchimpClient::from_config(&MailchimpConfig {
            api_key: "key".to_string(),
            audience_id: "aud1".to_string(),
            api_base: "http://127.0.0.1:1/3.0".to_string(),
        })
        .unwrap();

        let member = Member {
            id: "m1".to_string(),
            member_number: "1001".to_string(),
            first_name: "Ana".to_string(),
            last_name: "García".to_string(),
            email: "ana@example.com".to_string(),
            phone: String::new(),
            amount_paid: 35.0,
            year: 2026,
            is_active: true,
            source: crate::models::MemberSource::Form,
            created_at: String::new(),
            updated_at: String::new(),
        };

        let err = client.upsert_member(&member).await.unwrap_err();
        assert!(matches!(err, AppError::Sync(_)));

        let status = client.status().await;
        assert!(status.configured);
        assert!(!status.connected);
        assert!(status.error.is_some());
    }
}
