//! Rendering of history entries for terminals and JSON export.
//!
//! Pure formatting. Nothing here touches the history log itself; callers
//! hand in entries and get text or a serializable record back.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{HistoryEntry, Outcome};

/// A history entry flattened for display.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayRecord {
    pub timestamp: DateTime<Utc>,

    /// Machine id of the rail (e.g., `invalid-sql`).
    pub rail: String,

    /// Human label of the rail (e.g., `Invalid SQL`).
    pub label: String,

    pub outcome: Outcome,
    pub reason: String,
    pub prompt_summary: String,

    /// Evidence rendered as `pointer: excerpt` lines.
    pub evidence: Vec<String>,
}

impl From<&HistoryEntry> for DisplayRecord {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            rail: entry.rail.id().to_string(),
            label: entry.rail.label().to_string(),
            outcome: entry.verdict.outcome,
            reason: entry.verdict.reason.clone(),
            prompt_summary: entry.prompt_summary.clone(),
            evidence: entry
                .verdict
                .evidence
                .iter()
                .map(|e| format!("{}: {}", e.pointer, e.excerpt))
                .collect(),
        }
    }
}

impl fmt::Display for DisplayRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} — {} (prompt: \"{}\")",
            self.timestamp.format("%H:%M:%S"),
            self.label,
            self.outcome,
            self.reason,
            self.prompt_summary
        )
    }
}

/// One formatted log line for a history entry.
pub fn format_entry(entry: &HistoryEntry) -> String {
    DisplayRecord::from(entry).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Evidence;
    use crate::types::{Rail, Verdict};
    use chrono::TimeZone;

    fn entry() -> HistoryEntry {
        HistoryEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 8, 24, 14, 30, 5).unwrap(),
            rail: Rail::InvalidSql,
            prompt_summary: "Write a SQL query that returns all users".to_string(),
            verdict: Verdict::fail(
                Rail::InvalidSql,
                "statement verb DROP is not in the allowed set (SELECT, INSERT, UPDATE, DELETE)",
            ),
        }
    }

    #[test]
    fn test_single_line_format() {
        let line = format_entry(&entry());
        assert_eq!(
            line,
            "[14:30:05] Invalid SQL: FAIL — statement verb DROP is not in the allowed set \
             (SELECT, INSERT, UPDATE, DELETE) (prompt: \"Write a SQL query that returns all users\")"
        );
    }

    #[test]
    fn test_record_carries_both_rail_names() {
        let record = DisplayRecord::from(&entry());
        assert_eq!(record.rail, "invalid-sql");
        assert_eq!(record.label, "Invalid SQL");
    }

    #[test]
    fn test_record_serializes_with_lowercase_outcome() {
        let value = serde_json::to_value(DisplayRecord::from(&entry())).unwrap();
        assert_eq!(value["outcome"], "fail");
        assert_eq!(value["rail"], "invalid-sql");
    }

    #[test]
    fn test_evidence_rendered_as_pointer_lines() {
        let mut e = entry();
        e.verdict = e.verdict.with_evidence(vec![Evidence::from_field("\"30\"", "age")]);
        let record = DisplayRecord::from(&e);
        assert_eq!(record.evidence, vec!["response.age: \"30\"".to_string()]);
    }
}
