//! Heuristic quality scoring for extracted text.
//!
//! Scores completeness of an extraction from length, text density relative
//! to the source size, and the presence of financial and date markers.
//! Pure function — a fixed `(text, byte_len)` pair always scores the same.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use finbox_core::defaults::{
    QUALITY_BASE, QUALITY_DENSITY_BONUS, QUALITY_DENSITY_RATIO, QUALITY_HIGH, QUALITY_LEN_BONUS,
    QUALITY_LEN_THRESHOLD, QUALITY_LONG_BONUS, QUALITY_LONG_THRESHOLD, QUALITY_MARKER_BONUS,
    QUALITY_MEDIUM,
};

/// Currency symbol or code followed by an amount.
static CURRENCY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(₹|\$|£|€|rs\.?\s|inr\s|usd\s|eur\s)\s*[\d,]+(\.\d+)?").expect("valid regex")
});

/// Numeric or written date forms commonly found in statements.
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \d{1,2}[/-]\d{1,2}[/-]\d{2,4}
        | \d{4}-\d{2}-\d{2}
        | \d{1,2}\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\s+\d{2,4}",
    )
    .expect("valid regex")
});

/// Label band for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    High,
    Medium,
    Low,
}

impl QualityBand {
    /// Band for a score: high > 80, medium > 60, low otherwise.
    pub fn from_score(score: u8) -> Self {
        if score > QUALITY_HIGH {
            Self::High
        } else if score > QUALITY_MEDIUM {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for QualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Score extracted text against its source size, 0-100.
///
/// Base 50; +20 when longer than 100 chars, +15 more past 500; +15 when
/// the text-to-source density exceeds 0.5; +10 for a currency/amount
/// marker; +10 for a date-like marker. Capped at 100.
pub fn score_quality(text: &str, source_byte_len: usize) -> u8 {
    let mut score = QUALITY_BASE as u32;
    let len = text.chars().count();

    if len > QUALITY_LEN_THRESHOLD {
        score += QUALITY_LEN_BONUS as u32;
    }
    if len > QUALITY_LONG_THRESHOLD {
        score += QUALITY_LONG_BONUS as u32;
    }
    if source_byte_len > 0 && (len as f64 / source_byte_len as f64) > QUALITY_DENSITY_RATIO {
        score += QUALITY_DENSITY_BONUS as u32;
    }
    if CURRENCY_RE.is_match(text) {
        score += QUALITY_MARKER_BONUS as u32;
    }
    if DATE_RE.is_match(text) {
        score += QUALITY_MARKER_BONUS as u32;
    }

    score.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_table() {
        // (text, byte_len, expected)
        let long_plain = "a".repeat(600);
        let cases: Vec<(String, usize, u8)> = vec![
            // Base only: short, dense ratio below threshold, no markers.
            ("short".to_string(), 1000, 50),
            // Dense short text: base + density.
            ("short".to_string(), 8, 65),
            // Long text, no markers, sparse: base + 20 + 15.
            (long_plain.clone(), 100_000, 85),
            // Long and dense: base + 20 + 15 + 15 = 100 cap.
            (long_plain, 700, 100),
        ];
        for (text, size, expected) in cases {
            assert_eq!(score_quality(&text, size), expected, "text len {}", text.len());
        }
    }

    #[test]
    fn test_markers_add_bonus() {
        let text = "Your statement dated 14/05/2024 shows a balance of ₹1,23,456.78";
        // base 50 + density (63 chars / 63 bytes... byte len passed larger)
        let score = score_quality(text, 100_000);
        // currency +10, date +10
        assert_eq!(score, 70);
    }

    #[test]
    fn test_idempotent() {
        let text = "Premium due: Rs. 5,000 on 2024-01-31";
        assert_eq!(score_quality(text, 5000), score_quality(text, 5000));
    }

    #[test]
    fn test_monotonic_in_length() {
        let base = "balance ₹1,000 on 01/02/2024 ".to_string();
        let short = base.repeat(2);
        let medium = base.repeat(8);
        let long = base.repeat(40);
        let size = 1_000_000; // density never triggers
        let s1 = score_quality(&short, size);
        let s2 = score_quality(&medium, size);
        let s3 = score_quality(&long, size);
        assert!(s1 <= s2 && s2 <= s3);
    }

    #[test]
    fn test_capped_at_100() {
        let text = "₹9,999 paid on 14/05/2024 ".repeat(50);
        assert_eq!(score_quality(&text, 10), 100);
    }

    #[test]
    fn test_band_labels() {
        assert_eq!(QualityBand::from_score(95), QualityBand::High);
        assert_eq!(QualityBand::from_score(81), QualityBand::High);
        assert_eq!(QualityBand::from_score(80), QualityBand::Medium);
        assert_eq!(QualityBand::from_score(61), QualityBand::Medium);
        assert_eq!(QualityBand::from_score(60), QualityBand::Low);
        assert_eq!(QualityBand::from_score(0), QualityBand::Low);
    }

    #[test]
    fn test_empty_source_no_density_panic() {
        assert_eq!(score_quality("text", 0), 50);
    }
}
