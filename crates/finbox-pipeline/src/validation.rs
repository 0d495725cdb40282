//! Consistency checks over extracted financial records.
//!
//! Validation accumulates human-readable issues and an overall
//! data-quality score. Records persist regardless; the issues travel
//! with them instead of blocking storage.

use finbox_core::{FinancialRecord, RecordCategory};
use serde::{Deserialize, Serialize};

/// Outcome of validating one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<String>,
    /// 0-100; starts at 100 and loses points per issue severity.
    pub data_quality: u8,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn metadata_has(record: &FinancialRecord, keys: &[&str]) -> bool {
    keys.iter().any(|key| {
        record
            .metadata
            .get(key)
            .is_some_and(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.is_empty()))
    })
}

/// Issue severities; majors cost more data-quality points.
const MAJOR_PENALTY: u8 = 15;
const MINOR_PENALTY: u8 = 5;

/// Run required-field and consistency checks over a record.
pub fn validate_record(record: &FinancialRecord) -> ValidationReport {
    let mut issues: Vec<(u8, String)> = Vec::new();

    if record.amount.is_none() {
        issues.push((MINOR_PENALTY, "no monetary amount extracted".to_string()));
    }
    if record.amount.is_some() && record.currency.is_none() {
        issues.push((
            MINOR_PENALTY,
            "amount present but currency missing".to_string(),
        ));
    }
    if record.transaction_date.is_none() {
        issues.push((MINOR_PENALTY, "no transaction date extracted".to_string()));
    }
    if record.counterparty.is_none() {
        issues.push((MINOR_PENALTY, "no counterparty identified".to_string()));
    }
    if record.summary.trim().is_empty() {
        issues.push((MINOR_PENALTY, "summary is empty".to_string()));
    }

    match record.category {
        RecordCategory::Liability => {
            if !metadata_has(record, &["outstanding_balance", "total_due"])
                && record.amount.is_none()
            {
                issues.push((
                    MAJOR_PENALTY,
                    "liability record missing outstanding balance".to_string(),
                ));
            }
            if record.record_type == "loan" && !metadata_has(record, &["emi", "interest_rate"]) {
                issues.push((
                    MINOR_PENALTY,
                    "loan record missing EMI and interest rate".to_string(),
                ));
            }
        }
        RecordCategory::Insurance => {
            if !metadata_has(record, &["policy_number"]) {
                issues.push((
                    MAJOR_PENALTY,
                    "insurance record missing policy number".to_string(),
                ));
            }
            if !metadata_has(record, &["coverage_amount", "sum_assured"]) {
                issues.push((
                    MINOR_PENALTY,
                    "insurance record missing coverage amount".to_string(),
                ));
            }
        }
        RecordCategory::Asset => {
            if record.record_type == "investment" && !metadata_has(record, &["folio_number"]) {
                issues.push((
                    MINOR_PENALTY,
                    "investment record missing folio number".to_string(),
                ));
            }
        }
    }

    let penalty: u8 = issues
        .iter()
        .fold(0u8, |acc, (p, _)| acc.saturating_add(*p));
    ValidationReport {
        data_quality: 100u8.saturating_sub(penalty),
        issues: issues.into_iter().map(|(_, msg)| msg).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finbox_core::RecordStatus;
    use serde_json::json;

    fn record(category: RecordCategory, metadata: serde_json::Value) -> FinancialRecord {
        FinancialRecord {
            category,
            record_type: "document".to_string(),
            sub_type: None,
            status: RecordStatus::Active,
            amount: Some(1000.0),
            currency: Some("INR".to_string()),
            counterparty: Some("Bank".to_string()),
            transaction_date: chrono::NaiveDate::from_ymd_opt(2024, 5, 14),
            confidence: 80,
            summary: "test".to_string(),
            key_points: Vec::new(),
            metadata,
        }
    }

    #[test]
    fn test_complete_record_is_clean() {
        let report = validate_record(&record(RecordCategory::Asset, json!({})));
        assert!(report.is_clean());
        assert_eq!(report.data_quality, 100);
    }

    #[test]
    fn test_insurance_missing_policy_number() {
        let report = validate_record(&record(RecordCategory::Insurance, json!({})));
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("policy number")));
        assert!(report.data_quality < 100);
    }

    #[test]
    fn test_insurance_with_policy_metadata() {
        let report = validate_record(&record(
            RecordCategory::Insurance,
            json!({"policy_number": "TL-001", "sum_assured": "10,00,000"}),
        ));
        assert!(report.is_clean());
    }

    #[test]
    fn test_liability_missing_balance_is_major() {
        let mut rec = record(RecordCategory::Liability, json!({}));
        rec.amount = None;
        rec.currency = None;
        let report = validate_record(&rec);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("outstanding balance")));
        assert!(report.data_quality <= 80);
    }

    #[test]
    fn test_issues_never_block() {
        let mut rec = record(RecordCategory::Insurance, json!({}));
        rec.amount = None;
        rec.currency = None;
        rec.counterparty = None;
        rec.transaction_date = None;
        rec.summary = String::new();
        let report = validate_record(&rec);
        // Heavily degraded, but still a report rather than an error.
        assert!(!report.issues.is_empty());
        assert!(report.data_quality <= 60);
    }

    #[test]
    fn test_empty_string_metadata_not_counted() {
        let report = validate_record(&record(
            RecordCategory::Insurance,
            json!({"policy_number": ""}),
        ));
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.contains("policy number")));
    }
}
