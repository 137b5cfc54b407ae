//! Audience-sync side record.

/// What a successful audience upsert reports back.
///
/// Persisted as a `mailchimp_sync` row linking the 2026 member to its
/// subscriber id. The row is written opportunistically; its absence never
/// invalidates the member record.
#[derive(Debug, Clone)]
pub struct AudienceSync {
    pub mailchimp_id: String,
    pub audience_id: String,
    pub tags: Vec<String>,
}
