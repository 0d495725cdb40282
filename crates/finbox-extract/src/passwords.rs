//! Password candidate generation for protected financial documents.
//!
//! Banks mail statements locked with predictable passwords derived from
//! the customer's identity. Given an attachment filename and the user's
//! identity attributes, this module produces a deduplicated ordered list
//! of candidates: bank-specific deterministic formats first, then generic
//! fallbacks, then a short list of common weak passwords.
//!
//! Pure and deterministic — no I/O, same inputs always yield the same
//! ordered candidate list.

use finbox_core::IdentityProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity attribute a password format can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityField {
    Name,
    Phone,
    DateOfBirth,
    PanNumber,
    AccountNumber,
    CustomerId,
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Phone => write!(f, "phone"),
            Self::DateOfBirth => write!(f, "date_of_birth"),
            Self::PanNumber => write!(f, "pan_number"),
            Self::AccountNumber => write!(f, "account_number"),
            Self::CustomerId => write!(f, "customer_id"),
        }
    }
}

/// Every field the generator knows how to use. Reported when no candidate
/// can be derived at all.
pub const ALL_FIELDS: &[IdentityField] = &[
    IdentityField::Name,
    IdentityField::Phone,
    IdentityField::DateOfBirth,
    IdentityField::PanNumber,
    IdentityField::AccountNumber,
    IdentityField::CustomerId,
];

/// Result of candidate generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    /// False when no bank format was satisfiable or no identity-derived
    /// candidate exists. The common-password fallbacks are still returned.
    pub success: bool,
    /// Ordered, deduplicated candidates; bank-specific first.
    pub passwords: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_detected: Option<String>,
    /// Fields that would unblock generation, when `success` is false.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<IdentityField>,
}

/// One deterministic password format for a bank.
struct PasswordFormat {
    required: &'static [IdentityField],
    derive: fn(&IdentityProfile) -> Option<String>,
}

/// A bank's filename keywords and its known statement-password formats.
struct BankProfile {
    name: &'static str,
    keywords: &'static [&'static str],
    formats: &'static [PasswordFormat],
}

/// Common weak passwords appended after all derived candidates. The final
/// empty string is the explicit try-without-user-password fallback for
/// documents locked with an owner password only.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "123456",
    "12345678",
    "1234567890",
    "welcome123",
    "india@123",
    "",
];

// ---------------------------------------------------------------------------
// Derivation helpers
// ---------------------------------------------------------------------------

fn digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// First four alphabetic characters of the full name, e.g. "Abhishek
/// Kumar" -> "ABHI". None when the name has fewer than four letters.
fn name_prefix4(profile: &IdentityProfile) -> Option<String> {
    let name = profile.full_name.as_deref()?;
    let letters: String = name.chars().filter(|c| c.is_alphabetic()).take(4).collect();
    if letters.chars().count() == 4 {
        Some(letters.to_uppercase())
    } else {
        None
    }
}

fn account_last4(profile: &IdentityProfile) -> Option<String> {
    let acct = digits(profile.account_number.as_deref()?);
    if acct.len() >= 4 {
        Some(acct[acct.len() - 4..].to_string())
    } else {
        None
    }
}

fn derive_account_full(p: &IdentityProfile) -> Option<String> {
    let acct = digits(p.account_number.as_deref()?);
    if acct.is_empty() {
        None
    } else {
        Some(acct)
    }
}

fn derive_dob_ddmmyyyy(p: &IdentityProfile) -> Option<String> {
    p.date_of_birth.map(|d| d.format("%d%m%Y").to_string())
}

fn derive_dob_ddmmyy(p: &IdentityProfile) -> Option<String> {
    p.date_of_birth.map(|d| d.format("%d%m%y").to_string())
}

fn derive_customer_id(p: &IdentityProfile) -> Option<String> {
    p.customer_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn derive_name4_upper_account4(p: &IdentityProfile) -> Option<String> {
    Some(format!("{}{}", name_prefix4(p)?, account_last4(p)?))
}

fn derive_name4_lower_dob_ddmm(p: &IdentityProfile) -> Option<String> {
    let dob = p.date_of_birth?;
    Some(format!(
        "{}{}",
        name_prefix4(p)?.to_lowercase(),
        dob.format("%d%m")
    ))
}

fn derive_name4_upper_dob_ddmm(p: &IdentityProfile) -> Option<String> {
    let dob = p.date_of_birth?;
    Some(format!("{}{}", name_prefix4(p)?, dob.format("%d%m")))
}

fn derive_name4_lower_dob_ddmmyyyy(p: &IdentityProfile) -> Option<String> {
    let dob = p.date_of_birth?;
    Some(format!(
        "{}{}",
        name_prefix4(p)?.to_lowercase(),
        dob.format("%d%m%Y")
    ))
}

fn derive_account4_dob_ddmm(p: &IdentityProfile) -> Option<String> {
    let dob = p.date_of_birth?;
    Some(format!("{}{}", account_last4(p)?, dob.format("%d%m")))
}

// ---------------------------------------------------------------------------
// Bank table
// ---------------------------------------------------------------------------

/// Declarative bank table: keyword match on the filename selects a profile,
/// each format declares its required fields and a derivation function.
static BANKS: &[BankProfile] = &[
    BankProfile {
        name: "SBI",
        keywords: &["sbi", "state bank"],
        formats: &[
            PasswordFormat {
                required: &[IdentityField::AccountNumber],
                derive: derive_account_full,
            },
            PasswordFormat {
                required: &[IdentityField::DateOfBirth],
                derive: derive_dob_ddmmyyyy,
            },
        ],
    },
    BankProfile {
        name: "HDFC",
        keywords: &["hdfc"],
        formats: &[
            PasswordFormat {
                required: &[IdentityField::Name, IdentityField::AccountNumber],
                derive: derive_name4_upper_account4,
            },
            PasswordFormat {
                required: &[IdentityField::CustomerId],
                derive: derive_customer_id,
            },
        ],
    },
    BankProfile {
        name: "ICICI",
        keywords: &["icici"],
        formats: &[PasswordFormat {
            required: &[IdentityField::Name, IdentityField::DateOfBirth],
            derive: derive_name4_lower_dob_ddmm,
        }],
    },
    BankProfile {
        name: "Axis",
        keywords: &["axis"],
        formats: &[PasswordFormat {
            required: &[IdentityField::Name, IdentityField::DateOfBirth],
            derive: derive_name4_upper_dob_ddmm,
        }],
    },
    BankProfile {
        name: "Kotak",
        keywords: &["kotak"],
        formats: &[
            PasswordFormat {
                required: &[IdentityField::CustomerId],
                derive: derive_customer_id,
            },
            PasswordFormat {
                required: &[IdentityField::DateOfBirth],
                derive: derive_dob_ddmmyyyy,
            },
        ],
    },
    BankProfile {
        name: "PNB",
        keywords: &["pnb", "punjab national"],
        formats: &[PasswordFormat {
            required: &[IdentityField::AccountNumber, IdentityField::DateOfBirth],
            derive: derive_account4_dob_ddmm,
        }],
    },
    BankProfile {
        name: "Bank of Baroda",
        keywords: &["baroda", "bob statement"],
        formats: &[PasswordFormat {
            required: &[IdentityField::DateOfBirth],
            derive: derive_dob_ddmmyyyy,
        }],
    },
    BankProfile {
        name: "IDBI",
        keywords: &["idbi"],
        formats: &[PasswordFormat {
            required: &[IdentityField::Name, IdentityField::DateOfBirth],
            derive: derive_name4_lower_dob_ddmmyyyy,
        }],
    },
    BankProfile {
        name: "Canara",
        keywords: &["canara"],
        formats: &[PasswordFormat {
            required: &[IdentityField::AccountNumber],
            derive: derive_account_full,
        }],
    },
    BankProfile {
        name: "Union Bank",
        keywords: &["union bank", "unionbank"],
        formats: &[PasswordFormat {
            required: &[IdentityField::DateOfBirth],
            derive: derive_dob_ddmmyy,
        }],
    },
];

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

fn field_present(profile: &IdentityProfile, field: IdentityField) -> bool {
    match field {
        IdentityField::Name => profile.full_name.as_deref().is_some_and(|s| !s.is_empty()),
        IdentityField::Phone => profile.phone.as_deref().is_some_and(|s| !s.is_empty()),
        IdentityField::DateOfBirth => profile.date_of_birth.is_some(),
        IdentityField::PanNumber => profile.pan_number.as_deref().is_some_and(|s| !s.is_empty()),
        IdentityField::AccountNumber => profile
            .account_number
            .as_deref()
            .is_some_and(|s| !s.is_empty()),
        IdentityField::CustomerId => profile
            .customer_id
            .as_deref()
            .is_some_and(|s| !s.is_empty()),
    }
}

fn detect_bank(filename: &str) -> Option<&'static BankProfile> {
    let lower = filename.to_lowercase();
    BANKS
        .iter()
        .find(|bank| bank.keywords.iter().any(|kw| lower.contains(kw)))
}

/// Bank-agnostic candidates from whatever identity fields are present.
fn fallback_candidates(profile: &IdentityProfile) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(dob) = profile.date_of_birth {
        out.push(dob.format("%d%m%Y").to_string());
        out.push(dob.format("%d%m%y").to_string());
    }
    if let Some(acct) = derive_account_full(profile) {
        if let Some(last4) = account_last4(profile) {
            out.push(last4);
        }
        out.push(acct);
    }
    if let Some(phone) = profile.phone.as_deref() {
        let ds = digits(phone);
        if ds.len() >= 10 {
            out.push(ds[ds.len() - 10..].to_string());
        }
        if ds.len() >= 4 {
            out.push(ds[ds.len() - 4..].to_string());
        }
    }
    if let Some(cust) = derive_customer_id(profile) {
        out.push(cust);
    }
    if let Some(pan) = profile.pan_number.as_deref().map(str::trim) {
        if !pan.is_empty() {
            out.push(pan.to_uppercase());
            out.push(pan.to_lowercase());
        }
    }
    if let Some(name4) = name_prefix4(profile) {
        if let Some(dob) = profile.date_of_birth {
            out.push(format!("{}{}", name4, dob.format("%Y")));
        }
        out.push(name4.to_lowercase());
        out.push(name4);
    }
    out
}

/// Order-preserving dedup. Derivations never emit empty strings; the only
/// empty candidate is the explicit trailing fallback in the common list.
fn dedup(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Generate password candidates for an attachment.
///
/// Bank-specific candidates (filename keyword match) come first, then
/// generic identity-derived fallbacks, then [`COMMON_PASSWORDS`]. The
/// result is deterministic for fixed inputs.
///
/// `success` is false when a detected bank has no satisfiable format
/// (missing_fields lists the union of what its formats need) or when no
/// identity-derived candidate exists at all (missing_fields lists every
/// usable field). The common fallbacks are still returned so the caller
/// can attempt them.
pub fn generate_candidates(filename: &str, profile: &IdentityProfile) -> CandidateResult {
    let mut passwords: Vec<String> = Vec::new();
    let mut bank_detected = None;
    let mut missing_fields: Vec<IdentityField> = Vec::new();
    let mut bank_satisfied = false;

    if let Some(bank) = detect_bank(filename) {
        bank_detected = Some(bank.name.to_string());
        for format in bank.formats {
            if format.required.iter().all(|f| field_present(profile, *f)) {
                if let Some(candidate) = (format.derive)(profile) {
                    passwords.push(candidate);
                    bank_satisfied = true;
                }
            } else {
                for field in format.required {
                    if !field_present(profile, *field) && !missing_fields.contains(field) {
                        missing_fields.push(*field);
                    }
                }
            }
        }
    }

    let derived = fallback_candidates(profile);
    let derived_any = !derived.is_empty();
    passwords.extend(derived);
    passwords.extend(COMMON_PASSWORDS.iter().map(|s| s.to_string()));
    let passwords = dedup(passwords);

    // A detected bank with unmet field requirements fails fast with the
    // fields that would unblock it. A bank whose fields are present but
    // degenerate (e.g. a two-letter name) degrades to the generic path.
    let success = if bank_detected.is_some() {
        bank_satisfied || (missing_fields.is_empty() && derived_any)
    } else {
        derived_any
    };

    if !success {
        if bank_detected.is_some() && !bank_satisfied {
            // missing_fields already holds the bank's unmet requirements
        } else {
            missing_fields = ALL_FIELDS
                .iter()
                .copied()
                .filter(|f| !field_present(profile, *f))
                .collect();
        }
    } else {
        missing_fields.clear();
    }

    CandidateResult {
        success,
        passwords,
        bank_detected,
        missing_fields,
    }
}
