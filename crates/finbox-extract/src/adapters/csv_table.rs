//! CSV extraction adapter.
//!
//! Parses respecting quoted fields and embedded delimiters, then renders
//! a markdown table capped at a fixed number of data rows with a
//! row-count footer when truncated.

use async_trait::async_trait;
use serde_json::json;

use finbox_core::defaults::CSV_PREVIEW_ROWS;
use finbox_core::{DocumentFormat, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result};

use crate::adapters::placeholder_outcome;
use crate::quality::score_quality;

pub struct CsvAdapter;

#[async_trait]
impl FormatAdapter for CsvAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Csv
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        _passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record in reader.byte_records() {
            match record {
                Ok(record) => rows.push(
                    record
                        .iter()
                        .map(|f| String::from_utf8_lossy(f).trim().to_string())
                        .collect(),
                ),
                // A malformed row degrades to skipping it, not failing.
                Err(_) => continue,
            }
        }

        if rows.is_empty() {
            return Ok(placeholder_outcome(
                filename,
                data.len(),
                mime_type,
                "no parseable rows",
            ));
        }

        let headers = rows[0].clone();
        let data_rows = &rows[1..];
        let total = data_rows.len();
        let shown = total.min(CSV_PREVIEW_ROWS);

        let mut text = String::new();
        text.push_str(&format!("| {} |\n", headers.join(" | ")));
        text.push_str(&format!(
            "| {} |\n",
            headers.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
        ));
        for row in data_rows.iter().take(CSV_PREVIEW_ROWS) {
            text.push_str(&format!("| {} |\n", row.join(" | ")));
        }
        if total > shown {
            text.push_str(&format!("\n*Showing {} rows of {} total*\n", shown, total));
        }

        let score = score_quality(&text, data.len());
        Ok(
            ExtractionOutcome::new(true, text, ExtractionMethod::BufferFallback, score)
                .with_metadata(json!({
                    "row_count": total,
                    "column_count": headers.len(),
                    "truncated": total > shown,
                })),
        )
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "csv_table"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_lines(text: &str) -> Vec<&str> {
        text.lines().filter(|l| l.starts_with('|')).collect()
    }

    #[tokio::test]
    async fn test_caps_at_twenty_rows_with_footer() {
        let mut csv = String::from("Name,Amount\n");
        for i in 0..25 {
            csv.push_str(&format!("merchant-{},{}\n", i, i * 100));
        }
        let outcome = CsvAdapter
            .extract(csv.as_bytes(), "txns.csv", "text/csv", &[])
            .await
            .unwrap();

        assert!(outcome.success);
        // Header + separator + exactly 20 data rows.
        assert_eq!(table_lines(&outcome.text).len(), 22);
        assert!(outcome.text.contains("*Showing 20 rows of 25 total*"));
        assert_eq!(outcome.metadata["row_count"], 25);
        assert_eq!(outcome.metadata["truncated"], true);
    }

    #[tokio::test]
    async fn test_small_table_not_truncated() {
        let csv = "Name,Amount\nrent,15000\ngroceries,4200\n";
        let outcome = CsvAdapter
            .extract(csv.as_bytes(), "small.csv", "text/csv", &[])
            .await
            .unwrap();
        assert_eq!(table_lines(&outcome.text).len(), 4);
        assert!(!outcome.text.contains("Showing"));
        assert_eq!(outcome.metadata["truncated"], false);
    }

    #[tokio::test]
    async fn test_quoted_fields_with_embedded_commas() {
        let csv = "Merchant,Amount\n\"Sharma, Sons & Co\",\"1,200\"\n";
        let outcome = CsvAdapter
            .extract(csv.as_bytes(), "q.csv", "text/csv", &[])
            .await
            .unwrap();
        assert!(outcome.text.contains("Sharma, Sons & Co"));
        assert!(outcome.text.contains("1,200"));
        assert_eq!(outcome.metadata["column_count"], 2);
    }

    #[tokio::test]
    async fn test_empty_csv_is_placeholder() {
        let outcome = CsvAdapter
            .extract(b"", "empty.csv", "text/csv", &[])
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(!outcome.text.is_empty());
    }
}
