//! Remote settings-document secret store
//!
//! Fetches one named settings document from a document store's REST interface
//! and reads an operator-configured field out of it. Firestore's REST shape
//! (`{"fields": {"name": {"stringValue": "..."}}}`) is understood, as is a
//! plain JSON object.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::traits::{SecretStore, SecretStoreError, SecretStoreResult};
use crate::logging::SharedLogger;
use crate::log_debug;

/// Lookup timeout used when none is configured
pub const DEFAULT_DOCUMENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Secret store backed by a single remote settings document
///
/// Every failure mode (document or field absent, non-string field, HTTP error,
/// timeout, malformed JSON) is reported as a miss. The store never guesses a
/// key and never writes to the document.
pub struct DocumentSecretStore {
    client: reqwest::Client,
    url: String,
    field: String,
    service_api_key: Option<String>,
    timeout: Duration,
    logger: SharedLogger,
}

impl DocumentSecretStore {
    /// Create a store for the document at `url`, reading `field`
    ///
    /// `field` may be a dotted path (`ai.groqApiKey`) to reach nested maps.
    pub fn new(url: impl Into<String>, field: impl Into<String>, logger: SharedLogger) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            field: field.into(),
            service_api_key: None,
            timeout: DEFAULT_DOCUMENT_TIMEOUT,
            logger,
        }
    }

    /// Reuse an existing HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Authenticate the read with a service API key (sent as `?key=`)
    pub fn with_service_api_key(mut self, key: impl Into<String>) -> Self {
        self.service_api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Fetch the document and extract the field, distinguishing failure causes
    pub async fn fetch(&self) -> SecretStoreResult<Option<String>> {
        if self.url.is_empty() {
            return Err(SecretStoreError::NotAvailable("no document URL".to_string()));
        }

        let mut request = self.client.get(&self.url);
        if let Some(key) = &self.service_api_key {
            request = request.query(&[("key", key)]);
        }

        let send = async {
            let response = request.send().await?;
            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !status.is_success() {
                return Err(SecretStoreError::Status(status.as_u16()));
            }
            let text = response.text().await?;
            Ok::<_, SecretStoreError>(Some(text))
        };

        let body = match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result?,
            Err(_) => return Err(SecretStoreError::Timeout),
        };

        let Some(body) = body else {
            return Ok(None);
        };

        let document: Value = serde_json::from_str(&body)
            .map_err(|e| SecretStoreError::Malformed(e.to_string()))?;

        Ok(extract_field(&document, &self.field))
    }
}

/// Read a string at a dotted path, Firestore-typed or plain JSON
pub fn extract_field(document: &Value, path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let (last, parents) = segments.split_last()?;

    let value = if let Some(fields) = document.get("fields") {
        let mut node = fields;
        for segment in parents {
            node = node.get(segment)?.get("mapValue")?.get("fields")?;
        }
        node.get(last)?.get("stringValue")?
    } else {
        let mut node = document;
        for segment in parents {
            node = node.get(segment)?;
        }
        node.get(last)?
    };

    value
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SecretStore for DocumentSecretStore {
    fn name(&self) -> &str {
        "document"
    }

    fn is_available(&self) -> bool {
        !self.url.is_empty() && !self.field.is_empty()
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.fetch().await {
            Ok(Some(value)) => {
                log_debug!(
                    self.logger,
                    "DocumentSecretStore: found '{}' for key '{}'",
                    self.field, key
                );
                Some(value)
            }
            Ok(None) => {
                log_debug!(
                    self.logger,
                    "DocumentSecretStore: document or field '{}' absent",
                    self.field
                );
                None
            }
            Err(e) => {
                self.logger
                    .warn(&format!("DocumentSecretStore: treating lookup failure as miss: {}", e));
                None
            }
        }
    }
}

impl std::fmt::Debug for DocumentSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSecretStore")
            .field("url", &self.url)
            .field("field", &self.field)
            .field("service_api_key", &self.service_api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer, field: &str) -> DocumentSecretStore {
        DocumentSecretStore::new(
            format!("{}/documents/settings/ai", server.uri()),
            field,
            Arc::new(NoOpLogger),
        )
    }

    #[test]
    fn test_extract_firestore_field() {
        let doc = json!({"fields": {"groqApiKey": {"stringValue": "gsk-doc"}}});
        assert_eq!(extract_field(&doc, "groqApiKey"), Some("gsk-doc".to_string()));
    }

    #[test]
    fn test_extract_nested_firestore_field() {
        let doc = json!({
            "fields": {
                "ai": {"mapValue": {"fields": {"groqApiKey": {"stringValue": "nested"}}}}
            }
        });
        assert_eq!(extract_field(&doc, "ai.groqApiKey"), Some("nested".to_string()));
    }

    #[test]
    fn test_extract_plain_json_field() {
        let doc = json!({"ai": {"key": "plain"}});
        assert_eq!(extract_field(&doc, "ai.key"), Some("plain".to_string()));
    }

    #[test]
    fn test_extract_non_string_or_empty_is_miss() {
        let doc = json!({"fields": {"groqApiKey": {"integerValue": "12"}}});
        assert_eq!(extract_field(&doc, "groqApiKey"), None);
        let doc = json!({"fields": {"groqApiKey": {"stringValue": ""}}});
        assert_eq!(extract_field(&doc, "groqApiKey"), None);
        assert_eq!(extract_field(&doc, ""), None);
    }

    #[tokio::test]
    async fn test_document_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/settings/ai"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"fields": {"groqApiKey": {"stringValue": "gsk-remote"}}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey");
        assert_eq!(store.get("groq").await, Some("gsk-remote".to_string()));
    }

    #[tokio::test]
    async fn test_service_api_key_sent_as_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/settings/ai"))
            .and(query_param("key", "svc-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"fields": {"groqApiKey": {"stringValue": "gsk-auth"}}}),
            ))
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey").with_service_api_key("svc-key");
        assert_eq!(store.get("groq").await, Some("gsk-auth".to_string()));
    }

    #[tokio::test]
    async fn test_missing_document_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey");
        assert!(matches!(store.fetch().await, Ok(None)));
        assert_eq!(store.get("groq").await, None);
    }

    #[tokio::test]
    async fn test_missing_field_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"fields": {"other": {"stringValue": "x"}}})),
            )
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey");
        assert_eq!(store.get("groq").await, None);
    }

    // Assumption: a malformed or slow settings document is a miss, never a guess.
    #[tokio::test]
    async fn test_malformed_json_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey");
        assert!(matches!(store.fetch().await, Err(SecretStoreError::Malformed(_))));
        assert_eq!(store.get("groq").await, None);
    }

    #[tokio::test]
    async fn test_timeout_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"fields": {"groqApiKey": {"stringValue": "late"}}}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey").with_timeout(Duration::from_millis(50));
        assert!(matches!(store.fetch().await, Err(SecretStoreError::Timeout)));
        assert_eq!(store.get("groq").await, None);
    }

    #[tokio::test]
    async fn test_server_error_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = store_for(&server, "groqApiKey");
        assert!(matches!(store.fetch().await, Err(SecretStoreError::Status(503))));
        assert_eq!(store.get("groq").await, None);
    }

    #[test]
    fn test_unconfigured_store_unavailable() {
        let store = DocumentSecretStore::new("", "groqApiKey", Arc::new(NoOpLogger));
        assert!(!store.is_available());
    }

    #[test]
    fn test_debug_redacts_service_key() {
        let store = DocumentSecretStore::new("http://x", "f", Arc::new(NoOpLogger))
            .with_service_api_key("super-secret");
        let debug = format!("{:?}", store);
        assert!(!debug.contains("super-secret"));
    }
}
