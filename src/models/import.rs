//! Bulk-import result model.

use serde::Serialize;

/// Per-row failure in a bulk import.
///
/// The structured form; `ImportReport::error_messages` renders the legacy
/// string form older frontend builds still read.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRowError {
    pub member_number: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Aggregate outcome of importing a batch of candidates.
///
/// Row failures never abort the batch; every candidate is accounted for in
/// either `successful` or `errors`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub total: usize,
    pub successful: Vec<String>,
    pub errors: Vec<ImportRowError>,
}

impl ImportReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, member_number: &str) {
        self.imported += 1;
        self.successful.push(member_number.to_string());
    }

    pub fn record_failure(
        &mut self,
        member_number: &str,
        error: impl Into<String>,
        details: Option<serde_json::Value>,
    ) {
        self.errors.push(ImportRowError {
            member_number: member_number.to_string(),
            error: error.into(),
            details,
        });
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    /// Legacy error strings ("Member 1001 already exists"-style).
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("Member {}: {}", e.member_number, e.error))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tracks_both_forms() {
        let mut report = ImportReport::new(3);
        report.record_success("1001");
        report.record_success("1002");
        report.record_failure("1003", "Member already exists in database", None);

        assert_eq!(report.imported, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total, 3);
        assert_eq!(report.successful, vec!["1001", "1002"]);
        assert_eq!(
            report.error_messages(),
            vec!["Member 1003: Member already exists in database"]
        );
    }
}
