//! Backend gateway: stateless request wrappers for the DocBot API.
//!
//! Covers chat, health, document upload, and index listing/switching. HTTP
//! failures are translated into per-operation error enums; a transport-level
//! chat failure is kept distinct from an HTTP error so the offline fallback
//! (see `simulate`) only ever fires when the backend is unreachable.

use crate::auth::Credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Well-known identifier of the default corpus; all other indexes are
/// user-uploaded.
pub const DEFAULT_INDEX: &str = "langchain-integration-index";

/// Upload size cap, matching the backend's own limit.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Identifier string naming a retrieval corpus.
pub type DocumentIndex = String;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The backend answered with a non-2xx status; the message is its
    /// `detail` field.
    #[error("chat request failed: {0}")]
    Api(String),

    /// The backend could not be reached at all (no HTTP response).
    #[error("backend unreachable: {0}")]
    Transport(#[source] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Api(String),

    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No credential supplied; checked before any request is made.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("{0}")]
    Api(String),

    #[error("index request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// One source citation. The backend sends either a bare string or an excerpt
/// object with attribution metadata, so this deserializes untagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceRef {
    Attributed {
        #[serde(rename = "page_content")]
        excerpt: String,
        #[serde(default)]
        metadata: SourceMetadata,
    },
    Plain(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

impl SourceRef {
    /// One-line rendering: the excerpt, plus "(source, p. N)" when attributed.
    pub fn label(&self) -> String {
        match self {
            SourceRef::Plain(text) => text.clone(),
            SourceRef::Attributed { excerpt, metadata } => {
                match (&metadata.source, metadata.page) {
                    (Some(source), Some(page)) => format!("{} ({}, p. {})", excerpt, source, page),
                    (Some(source), None) => format!("{} ({})", excerpt, source),
                    (None, Some(page)) => format!("{} (p. {})", excerpt, page),
                    (None, None) => excerpt.clone(),
                }
            }
        }
    }
}

/// Answer to a chat query with its source citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(rename = "result")]
    pub answer: String,
    #[serde(default, rename = "source_documents")]
    pub sources: Vec<SourceRef>,
}

/// Outcome of a successful document upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResult {
    pub filename: String,
    pub text_chunks: u64,
    pub index_name: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    details: Option<UploadResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexListResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    indexes: Vec<DocumentIndex>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SwitchIndexResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: String,
}

/// Extract the backend's `detail` error field, or fall back to a generic
/// message when the body is unparsable.
pub(crate) async fn error_detail(res: reqwest::Response, fallback: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: String,
    }
    match res.json::<ErrorBody>().await {
        Ok(body) => body.detail,
        Err(_) => fallback.to_string(),
    }
}

/// Anything that can answer a chat query: the HTTP backend, the offline
/// simulator, or the fallback composition of the two.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn send_chat_message(&self, query: &str) -> Result<ChatReply, ChatError>;
}

/// Client for the DocBot backend HTTP API.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /api/chat — ask a question against the active index.
    pub async fn chat(&self, query: &str) -> Result<ChatReply, ChatError> {
        let url = format!("{}/api/chat", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(ChatError::Transport)?;
        if !res.status().is_success() {
            return Err(ChatError::Api(error_detail(res, "Unknown error").await));
        }
        res.json::<ChatReply>()
            .await
            .map_err(|e| ChatError::Api(format!("invalid chat response: {}", e)))
    }

    /// GET /api/health — true only for a 2xx response whose status field is
    /// "healthy". Never errors.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/health", self.base_url);
        let res = match self.client.get(&url).send().await {
            Ok(res) => res,
            Err(e) => {
                log::debug!("health check failed: {}", e);
                return false;
            }
        };
        if !res.status().is_success() {
            return false;
        }
        match res.json::<HealthResponse>().await {
            Ok(health) => health.status == "healthy",
            Err(_) => false,
        }
    }

    /// Validate a candidate upload before any bytes leave the client.
    pub fn validate_upload(filename: &str, size: u64) -> Result<(), UploadError> {
        if !filename.to_lowercase().ends_with(".pdf") {
            return Err(UploadError::Validation(
                "Please upload a PDF file only.".to_string(),
            ));
        }
        if size > MAX_UPLOAD_BYTES {
            return Err(UploadError::Validation(
                "File size too large. Maximum 10MB allowed.".to_string(),
            ));
        }
        Ok(())
    }

    /// POST /api/upload — multipart upload of a PDF. Validates name and size
    /// locally first; a validation failure issues zero network requests.
    pub async fn upload_document(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResult, UploadError> {
        Self::validate_upload(filename, bytes.len() as u64)?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let url = format!("{}/api/upload", self.base_url);
        let res = self.client.post(&url).multipart(form).send().await?;
        if !res.status().is_success() {
            return Err(UploadError::Api(
                error_detail(res, "Failed to upload file").await,
            ));
        }
        let body: UploadResponse = res.json().await?;
        if !body.success {
            return Err(UploadError::Api(
                body.error
                    .unwrap_or_else(|| "Failed to upload file".to_string()),
            ));
        }
        body.details
            .ok_or_else(|| UploadError::Api("upload response missing details".to_string()))
    }

    /// GET /api/indexes — list available document indexes. Requires a
    /// credential; fails locally when none is supplied.
    pub async fn list_indexes(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Vec<DocumentIndex>, IndexError> {
        let credential = credential.ok_or(IndexError::AuthenticationRequired)?;
        let url = format!("{}/api/indexes", self.base_url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(credential.as_str())
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(IndexError::Api(
                error_detail(res, "Failed to fetch indexes").await,
            ));
        }
        let body: IndexListResponse = res.json().await?;
        if !body.success {
            return Err(IndexError::Api(
                body.error
                    .unwrap_or_else(|| "Failed to fetch indexes".to_string()),
            ));
        }
        Ok(body.indexes)
    }

    /// POST /api/switch-index — ask the backend to serve chat from another
    /// index. Requires a credential; fails locally when none is supplied.
    pub async fn switch_index(
        &self,
        credential: Option<&Credential>,
        index_name: &str,
    ) -> Result<(), IndexError> {
        let credential = credential.ok_or(IndexError::AuthenticationRequired)?;
        let url = format!("{}/api/switch-index", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(credential.as_str())
            .json(&serde_json::json!({ "index_name": index_name }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(IndexError::Api(
                error_detail(res, "Failed to switch index").await,
            ));
        }
        let body: SwitchIndexResponse = res.json().await?;
        if !body.success {
            return Err(IndexError::Api(
                body.error
                    .unwrap_or_else(|| "Failed to switch index".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatResponder for BackendClient {
    async fn send_chat_message(&self, query: &str) -> Result<ChatReply, ChatError> {
        self.chat(query).await
    }
}

/// Human-readable name for an index identifier.
pub fn index_display_name(index: &str) -> String {
    if index == DEFAULT_INDEX {
        return "Medical Encyclopedia (Default)".to_string();
    }
    if let Some(rest) = index.strip_prefix("user-docs-") {
        if let Some(tail) = rest.rsplit('-').next() {
            return format!("User Document {}", tail);
        }
    }
    index.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_filename() {
        let err = BackendClient::validate_upload("report.txt", 10).unwrap_err();
        match err {
            UploadError::Validation(msg) => assert_eq!(msg, "Please upload a PDF file only."),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn pdf_extension_check_is_case_insensitive() {
        assert!(BackendClient::validate_upload("Report.PDF", 1024).is_ok());
    }

    #[test]
    fn exactly_ten_mib_is_accepted() {
        assert!(BackendClient::validate_upload("report.pdf", MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn one_byte_over_ten_mib_is_rejected() {
        let err = BackendClient::validate_upload("report.PDF", MAX_UPLOAD_BYTES + 1).unwrap_err();
        match err {
            UploadError::Validation(msg) => {
                assert_eq!(msg, "File size too large. Maximum 10MB allowed.")
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn type_check_comes_before_size_check() {
        // A huge .txt must report the type error, not the size error.
        let err = BackendClient::validate_upload("report.txt", MAX_UPLOAD_BYTES * 2).unwrap_err();
        match err {
            UploadError::Validation(msg) => assert_eq!(msg, "Please upload a PDF file only."),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn source_documents_deserialize_both_shapes() {
        let raw = serde_json::json!({
            "result": "X",
            "source_documents": [
                "Y",
                { "page_content": "excerpt...", "metadata": { "source": "report.pdf", "page": 3 } },
                { "page_content": "bare excerpt" }
            ]
        });
        let reply: ChatReply = serde_json::from_value(raw).expect("parse reply");
        assert_eq!(reply.answer, "X");
        assert_eq!(reply.sources.len(), 3);
        assert_eq!(reply.sources[0], SourceRef::Plain("Y".to_string()));
        assert_eq!(
            reply.sources[1],
            SourceRef::Attributed {
                excerpt: "excerpt...".to_string(),
                metadata: SourceMetadata {
                    source: Some("report.pdf".to_string()),
                    page: Some(3),
                },
            }
        );
        assert_eq!(
            reply.sources[2],
            SourceRef::Attributed {
                excerpt: "bare excerpt".to_string(),
                metadata: SourceMetadata::default(),
            }
        );
    }

    #[test]
    fn missing_source_documents_is_empty() {
        let reply: ChatReply =
            serde_json::from_value(serde_json::json!({ "result": "X" })).expect("parse reply");
        assert!(reply.sources.is_empty());
    }

    #[test]
    fn source_labels() {
        let plain = SourceRef::Plain("Chapter 7".to_string());
        assert_eq!(plain.label(), "Chapter 7");

        let attributed = SourceRef::Attributed {
            excerpt: "Fever is...".to_string(),
            metadata: SourceMetadata {
                source: Some("gale.pdf".to_string()),
                page: Some(12),
            },
        };
        assert_eq!(attributed.label(), "Fever is... (gale.pdf, p. 12)");
    }

    #[test]
    fn display_names() {
        assert_eq!(
            index_display_name(DEFAULT_INDEX),
            "Medical Encyclopedia (Default)"
        );
        assert_eq!(index_display_name("user-docs-42"), "User Document 42");
        assert_eq!(index_display_name("custom-index"), "custom-index");
    }

    #[tokio::test]
    async fn list_indexes_without_credential_is_local_failure() {
        // Unroutable port: if a request were attempted it would fail with a
        // transport error, not AuthenticationRequired.
        let client = BackendClient::new("http://127.0.0.1:1");
        let err = client.list_indexes(None).await.unwrap_err();
        assert!(matches!(err, IndexError::AuthenticationRequired));
        let err = client.switch_index(None, "user-docs-1").await.unwrap_err();
        assert!(matches!(err, IndexError::AuthenticationRequired));
    }
}
