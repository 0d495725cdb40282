//! Spreadsheet extraction adapter.
//!
//! Workbook containers are zipped XML; a full parse is the decoder's job.
//! In-process the adapter harvests readable character runs from the
//! buffer, which recovers shared strings from uncompressed regions and
//! degrades to a placeholder otherwise.

use async_trait::async_trait;
use serde_json::json;

use finbox_core::{DocumentFormat, ExtractionMethod, ExtractionOutcome, FormatAdapter, Result};

use crate::adapters::{harvest_readable_runs, placeholder_outcome};
use crate::quality::score_quality;

/// Minimum readable-run length worth keeping from a binary workbook.
const MIN_RUN: usize = 5;

pub struct SpreadsheetAdapter;

#[async_trait]
impl FormatAdapter for SpreadsheetAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Spreadsheet
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        mime_type: &str,
        _passwords: &[String],
    ) -> Result<ExtractionOutcome> {
        let text = harvest_readable_runs(data, MIN_RUN);
        if text.trim().is_empty() {
            return Ok(placeholder_outcome(
                filename,
                data.len(),
                mime_type,
                "no readable runs in workbook",
            ));
        }

        let runs = text.lines().count();
        let score = score_quality(&text, data.len());
        Ok(
            ExtractionOutcome::new(true, text, ExtractionMethod::BufferFallback, score)
                .with_metadata(json!({"harvested_runs": runs})),
        )
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "spreadsheet"
    }
}
