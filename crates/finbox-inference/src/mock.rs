//! Mock reasoning backend for deterministic testing.
//!
//! Returns canned completions, records every call for assertion, and can
//! inject failures and latency to exercise fallback paths.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use finbox_core::{Error, GenerationBackend, Result};

/// One recorded call to the mock backend.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Default)]
struct MockConfig {
    default_response: String,
    /// (prompt substring, response) pairs checked in order.
    mappings: Vec<(String, String)>,
    fail_all: bool,
    latency: Option<Duration>,
}

/// Deterministic mock of the reasoning service.
#[derive(Clone, Default)]
pub struct MockReasoningBackend {
    config: Arc<MockConfig>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockReasoningBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response returned when no mapping matches.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        self.config_mut().default_response = response.into();
        self
    }

    /// Respond with `response` whenever the prompt contains `needle`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.config_mut().mappings.push((needle.into(), response.into()));
        self
    }

    /// Make every call fail, exercising caller fallback paths.
    pub fn with_failures(mut self) -> Self {
        self.config_mut().fail_all = true;
        self
    }

    /// Add simulated latency to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.config_mut().latency = Some(latency);
        self
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn config_mut(&mut self) -> &mut MockConfig {
        Arc::get_mut(&mut self.config).expect("configure before cloning")
    }
}

#[async_trait]
impl GenerationBackend for MockReasoningBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });

        if let Some(latency) = self.config.latency {
            tokio::time::sleep(latency).await;
        }
        if self.config.fail_all {
            return Err(Error::Inference("mock backend failure".to_string()));
        }
        for (needle, response) in &self.config.mappings {
            if prompt.contains(needle.as_str()) {
                return Ok(response.clone());
            }
        }
        Ok(self.config.default_response.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.config.fail_all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_response_and_call_log() {
        let backend = MockReasoningBackend::new().with_fixed_response("hello");
        assert_eq!(backend.generate("anything").await.unwrap(), "hello");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.calls()[0].prompt, "anything");
    }

    #[tokio::test]
    async fn test_mapping_takes_precedence() {
        let backend = MockReasoningBackend::new()
            .with_fixed_response("default")
            .with_response_mapping("classify", "[\"m1\"]");
        assert_eq!(backend.generate("please classify these").await.unwrap(), "[\"m1\"]");
        assert_eq!(backend.generate("other").await.unwrap(), "default");
    }

    #[tokio::test]
    async fn test_failures() {
        let backend = MockReasoningBackend::new().with_failures();
        assert!(backend.generate("x").await.is_err());
        assert!(!backend.health_check().await.unwrap());
        // The failed call is still logged.
        assert_eq!(backend.call_count(), 1);
    }
}
