//! Member lifecycle orchestration.
//!
//! [`MemberService`] fronts the active storage backend and the optional
//! MailChimp client. Every handler goes through it. Audience sync is best
//! effort: a failure is logged and never fails the member write that
//! triggered it.

use std::sync::Arc;

use crate::errors::AppError;
use crate::mailchimp::MailchimpClient;
use crate::models::{
    AudienceStatus, ImportReport, Member, MemberSource, NewMember, Roster, SearchCriteria,
    StoreStatus, TableCounts, TransferMember, DEFAULT_AMOUNT_PAID,
};
use crate::store::MemberStore;

pub struct MemberService {
    store: Arc<dyn MemberStore>,
    audience: Option<MailchimpClient>,
}

impl MemberService {
    pub fn new(store: Arc<dyn MemberStore>, audience: Option<MailchimpClient>) -> Self {
        Self { store, audience }
    }

    /// Full roster, ordered by member number.
    pub async fn list(&self, roster: Roster) -> Result<Vec<Member>, AppError> {
        self.store.list(roster).await
    }

    /// Search the 2025 roster. No criteria means no results, not everything.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Member>, AppError> {
        if criteria.is_empty() {
            return Ok(Vec::new());
        }
        self.store.search(Roster::Y2025, criteria).await
    }

    /// Add a member to a roster. Concurrent adds race to the store's
    /// uniqueness constraint; the loser gets [`AppError::Duplicate`]. A 2026
    /// write is followed by an audience sync.
    pub async fn add(&self, roster: Roster, member: NewMember) -> Result<Member, AppError> {
        member.validate()?;
        let stored = self.store.insert(roster, &member).await?;
        if roster == Roster::Y2026 {
            self.sync_to_audience(&stored).await;
        }
        Ok(stored)
    }

    /// Copy a 2025 member into the 2026 roster. The 2025 row is left
    /// untouched; the new row is marked as coming from the 2025 list.
    pub async fn transfer(&self, member: TransferMember) -> Result<Member, AppError> {
        if self
            .store
            .find_by_number(Roster::Y2026, &member.member_number)
            .await?
            .is_some()
        {
            return Err(AppError::Duplicate(
                "Member already exists in 2026 list".to_string(),
            ));
        }

        let candidate = NewMember {
            member_number: member.member_number,
            first_name: member.first_name,
            last_name: member.last_name,
            email: member.email,
            phone: member.phone,
            amount_paid: member.amount_paid.unwrap_or(DEFAULT_AMOUNT_PAID),
            year: Roster::Y2026.year(),
            is_active: true,
            source: MemberSource::List2025,
        };

        let stored = self.store.insert(Roster::Y2026, &candidate).await?;
        self.sync_to_audience(&stored).await;
        Ok(stored)
    }

    /// Import spreadsheet candidates into the 2025 roster, one at a time.
    /// A failed row is reported and never aborts the batch. Bulk 2025
    /// imports do not sync to the audience.
    pub async fn import_members(&self, candidates: Vec<NewMember>) -> ImportReport {
        let mut report = ImportReport::new(candidates.len());

        for candidate in candidates {
            if let Err(err) = candidate.validate() {
                report.record_failure(
                    &candidate.member_number,
                    err.message(),
                    Some(failure_details(&candidate)),
                );
                continue;
            }

            match self
                .store
                .find_by_number(Roster::Y2025, &candidate.member_number)
                .await
            {
                Ok(Some(_)) => {
                    report.record_failure(
                        &candidate.member_number,
                        "Member already exists in database",
                        Some(failure_details(&candidate)),
                    );
                    continue;
                }
                Ok(None) => {}
                Err(err) => {
                    report.record_failure(
                        &candidate.member_number,
                        err.message(),
                        Some(failure_details(&candidate)),
                    );
                    continue;
                }
            }

            match self.store.insert(Roster::Y2025, &candidate).await {
                Ok(_) => report.record_success(&candidate.member_number),
                Err(err) => report.record_failure(
                    &candidate.member_number,
                    err.message(),
                    Some(failure_details(&candidate)),
                ),
            }
        }

        tracing::info!(
            "Imported {} of {} members into the 2025 roster",
            report.imported,
            report.total
        );
        report
    }

    /// Roster connectivity status. A count failure folds into
    /// `connected: false` instead of an error response.
    pub async fn status(&self) -> StoreStatus {
        match self.table_counts().await {
            Ok(tables) => StoreStatus::connected(tables),
            Err(err) => StoreStatus::disconnected(err.message()),
        }
    }

    /// MailChimp connectivity status, `configured: false` without a client.
    pub async fn audience_status(&self) -> AudienceStatus {
        match &self.audience {
            Some(client) => client.status().await,
            None => AudienceStatus::not_configured(),
        }
    }

    async fn table_counts(&self) -> Result<TableCounts, AppError> {
        Ok(TableCounts {
            members_2025: self.store.count(Roster::Y2025).await?,
            members_2026: self.store.count(Roster::Y2026).await?,
        })
    }

    /// Push a freshly written 2026 member to the audience and record the
    /// sync. The member write already succeeded, so nothing here propagates.
    async fn sync_to_audience(&self, member: &Member) {
        let Some(client) = &self.audience else {
            return;
        };

        match client.upsert_member(member).await {
            Ok(sync) => {
                tracing::info!(
                    "Member {} synced to MailChimp audience {}",
                    member.member_number,
                    sync.audience_id
                );
                if let Err(err) = self.store.record_sync(&member.id, &sync).await {
                    tracing::warn!(
                        "Failed to record MailChimp sync for member {}: {}",
                        member.member_number,
                        err
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    "MailChimp sync failed for member {}: {}",
                    member.member_number,
                    err
                );
            }
        }
    }
}

fn failure_details(candidate: &NewMember) -> serde_json::Value {
    serde_json::json!({
        "email": candidate.email,
        "name": format!("{} {}", candidate.first_name, candidate.last_name),
    })
}
