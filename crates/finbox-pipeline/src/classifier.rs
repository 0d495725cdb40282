//! Message classifier: filters a batch down to "major financial" messages.
//!
//! Two layers: a local keyword pre-filter drops obvious marketing and
//! casual-transfer mail before anything is spent on the reasoning service,
//! then one batched service call judges the remainder. The exclusion list
//! is re-applied to the service's answer, so platform noise stays out even
//! when the model flags it. Deliberately conservative.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use finbox_core::{GenerationBackend, InboundMessage};
use finbox_inference::CallGate;

/// Subjects matching these are never classified as financial, whatever
/// the reasoning service says.
const EXCLUDE_KEYWORDS: &[&str] = &[
    // marketing / promotional
    "unsubscribe",
    "newsletter",
    "sale ends",
    "% off",
    "discount",
    "promo code",
    "coupon",
    "webinar",
    "refer a friend",
    "limited time offer",
    "flash sale",
    "special offer",
    // small personal transfers / platform chatter
    "sent you money",
    "paid you",
    "requested money",
    "split the bill",
    "has joined",
    "friend request",
];

/// Subjects carrying these look financial enough for the local fallback
/// path when the reasoning service is unavailable.
const FINANCIAL_KEYWORDS: &[&str] = &[
    "statement",
    "account",
    "premium",
    "policy",
    "loan",
    "emi",
    "mutual fund",
    "portfolio",
    "fixed deposit",
    "credit card",
    "invoice",
    "folio",
    "maturity",
    "renewal notice",
    "interest credited",
    "dividend",
    "nav",
    "sip",
    "demat",
];

fn is_excluded(message: &InboundMessage) -> bool {
    let haystack = format!("{} {}", message.subject, message.snippet).to_lowercase();
    EXCLUDE_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

fn looks_financial(message: &InboundMessage) -> bool {
    let haystack = format!("{} {}", message.subject, message.snippet).to_lowercase();
    FINANCIAL_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// Scan a response for the first balanced JSON array and parse it as a
/// list of strings.
fn parse_id_array(response: &str) -> Option<Vec<String>> {
    let start = response.find('[')?;
    let mut depth = 0usize;
    for (offset, c) in response[start..].char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &response[start..=start + offset];
                    return serde_json::from_str::<Vec<String>>(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Two-layer batch classifier over inbound messages.
pub struct MessageClassifier {
    backend: Arc<dyn GenerationBackend>,
    gate: Arc<CallGate>,
}

impl MessageClassifier {
    pub fn new(backend: Arc<dyn GenerationBackend>, gate: Arc<CallGate>) -> Self {
        Self { backend, gate }
    }

    fn batch_prompt(candidates: &[&InboundMessage]) -> String {
        let mut prompt = String::from(
            "You screen a mailbox for messages carrying significant financial documents \
             (bank/card statements, loan and EMI notices, insurance policies and premiums, \
             investment statements). Exclude marketing, promotions, and small personal \
             transfers.\n\nMessages:\n",
        );
        for message in candidates {
            prompt.push_str(&format!(
                "- id={} | from={} | subject={} | preview={}\n",
                message.id, message.sender, message.subject, message.snippet
            ));
        }
        prompt.push_str(
            "\nReply with a JSON array of the ids that are major financial messages, \
             nothing else. Example: [\"id1\",\"id2\"]",
        );
        prompt
    }

    /// Classify a batch, returning the identifiers judged major financial.
    ///
    /// Never fails: a reasoning-service error degrades to the local
    /// keyword path.
    #[instrument(skip(self, messages), fields(subsystem = "pipeline", component = "classifier", op = "classify", batch = messages.len()))]
    pub async fn classify(&self, messages: &[InboundMessage]) -> Vec<String> {
        let candidates: Vec<&InboundMessage> =
            messages.iter().filter(|m| !is_excluded(m)).collect();
        if candidates.is_empty() {
            return Vec::new();
        }
        debug!(
            candidates = candidates.len(),
            excluded = messages.len() - candidates.len(),
            "pre-filter applied"
        );

        let prompt = Self::batch_prompt(&candidates);
        let backend = self.backend.clone();
        let response = self
            .gate
            .run(async move { backend.generate(&prompt).await })
            .await;

        let selected: Vec<String> = match response.ok().as_deref().and_then(parse_id_array) {
            Some(ids) => ids,
            None => {
                warn!("reasoning service unusable, falling back to keyword classification");
                candidates
                    .iter()
                    .filter(|m| looks_financial(m))
                    .map(|m| m.id.clone())
                    .collect()
            }
        };

        // Safety net: the service cannot introduce ids outside the batch,
        // and excluded content stays excluded.
        candidates
            .iter()
            .filter(|m| selected.contains(&m.id))
            .filter(|m| !is_excluded(m))
            .map(|m| m.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use finbox_inference::MockReasoningBackend;

    fn message(id: &str, subject: &str, snippet: &str) -> InboundMessage {
        InboundMessage {
            id: id.to_string(),
            subject: subject.to_string(),
            sender: "noreply@bank.example".to_string(),
            recipient: "user@example.com".to_string(),
            snippet: snippet.to_string(),
            body: String::new(),
            received_at: Utc::now(),
            attachments: Vec::new(),
        }
    }

    fn classifier(backend: MockReasoningBackend) -> MessageClassifier {
        MessageClassifier::new(
            Arc::new(backend),
            CallGate::new(2, std::time::Duration::from_millis(1), 100),
        )
    }

    #[tokio::test]
    async fn test_marketing_excluded_before_service_call() {
        let backend = MockReasoningBackend::new().with_fixed_response("[\"m1\",\"m2\"]");
        let clf = classifier(backend.clone());
        let messages = vec![
            message("m1", "Your account statement for May", "statement attached"),
            message("m2", "Flash sale! 50% discount inside", "unsubscribe anytime"),
        ];
        let ids = clf.classify(&messages).await;
        assert_eq!(ids, vec!["m1".to_string()]);
        // m2 never reached the service.
        assert!(!backend.calls()[0].prompt.contains("m2 |"));
    }

    #[tokio::test]
    async fn test_service_answer_filtered_to_batch() {
        let backend =
            MockReasoningBackend::new().with_fixed_response("[\"m1\",\"not-in-batch\"]");
        let clf = classifier(backend);
        let messages = vec![message("m1", "Loan EMI due", "EMI of 12,500")];
        let ids = clf.classify(&messages).await;
        assert_eq!(ids, vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn test_service_failure_falls_back_to_keywords() {
        let backend = MockReasoningBackend::new().with_failures();
        let clf = classifier(backend);
        let messages = vec![
            message("m1", "Your credit card statement", "total due"),
            message("m2", "Lunch tomorrow?", "see you then"),
        ];
        let ids = clf.classify(&messages).await;
        assert_eq!(ids, vec!["m1".to_string()]);
    }

    #[tokio::test]
    async fn test_prose_wrapped_array_parses() {
        assert_eq!(
            parse_id_array("Sure! The financial ones are: [\"a\", \"b\"] as requested."),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(parse_id_array("no array here"), None);
        assert_eq!(parse_id_array("[]"), Some(vec![]));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let backend = MockReasoningBackend::new();
        let clf = classifier(backend.clone());
        let ids = clf.classify(&[]).await;
        assert!(ids.is_empty());
        assert_eq!(backend.call_count(), 0);
    }
}
