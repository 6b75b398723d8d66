//! Document uploads: what may be sent, how it is sent, and the message that follows.
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info, instrument, warn};

use crate::errors::UploadError;
use crate::extract::ExtractorRegistry;
use crate::models::content::{base64_bytes, ContentPart, MessageContent};

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 6] = [
    "application/pdf",
    "image/jpeg",
    "image/png",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Files processed successfully";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DocumentType {
    PurchaseAgreement,
    Lease,
    Deed,
    Mortgage,
    Inspection,
    Hoa,
    Tax,
    Other,
}

impl DocumentType {
    pub fn name(&self) -> &'static str {
        match self {
            DocumentType::PurchaseAgreement => "Purchase Agreement",
            DocumentType::Lease => "Lease Agreement",
            DocumentType::Deed => "Property Deed",
            DocumentType::Mortgage => "Mortgage Documents",
            DocumentType::Inspection => "Inspection Report",
            DocumentType::Hoa => "HOA Documents",
            DocumentType::Tax => "Tax Documents",
            DocumentType::Other => "Other",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DocumentType::PurchaseAgreement => "Sales contracts and offers",
            DocumentType::Lease => "Rental and lease contracts",
            DocumentType::Deed => "Title and ownership documents",
            DocumentType::Mortgage => "Loan and financing papers",
            DocumentType::Inspection => "Property inspection documents",
            DocumentType::Hoa => "Homeowners association papers",
            DocumentType::Tax => "Property tax records",
            DocumentType::Other => "Other real estate documents",
        }
    }

    pub fn parse(value: &str) -> Result<Self, UploadError> {
        value
            .parse()
            .map_err(|_| UploadError::UnknownDocumentType(value.to_string()))
    }
}

pub fn is_allowed_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

/// Media type for a file name, by extension
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// A file the user picked, before filtering
#[derive(Debug, Clone, PartialEq)]
pub struct UploadCandidate {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub data: Vec<u8>,
}

impl UploadCandidate {
    pub fn new<N: Into<String>, M: Into<String>>(name: N, mime_type: M, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size: data.len() as u64,
            data,
        }
    }

    /// Read a file from disk. Oversized files are measured but not read; the
    /// filter drops them anyway.
    pub async fn from_path(path: &Path) -> Result<Self, UploadError> {
        let read_error = |source| UploadError::Read {
            path: path.display().to_string(),
            source,
        };
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = guess_mime_type(&name);
        let size = tokio::fs::metadata(path).await.map_err(read_error)?.len();
        let data = if size <= MAX_UPLOAD_BYTES {
            tokio::fs::read(path).await.map_err(read_error)?
        } else {
            Vec::new()
        };
        Ok(Self {
            name,
            mime_type,
            size,
            data,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    TooLarge,
    UnsupportedType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedUpload {
    pub name: String,
    pub reason: RejectReason,
}

/// Keep files within the size limit and the media type allow-list
pub fn filter_uploads(
    candidates: Vec<UploadCandidate>,
) -> (Vec<UploadCandidate>, Vec<RejectedUpload>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for candidate in candidates {
        let reason = if candidate.size > MAX_UPLOAD_BYTES {
            Some(RejectReason::TooLarge)
        } else if !is_allowed_type(&candidate.mime_type) {
            Some(RejectReason::UnsupportedType)
        } else {
            None
        };
        match reason {
            Some(reason) => rejected.push(RejectedUpload {
                name: candidate.name,
                reason,
            }),
            None => accepted.push(candidate),
        }
    }
    (accepted, rejected)
}

/// A processed file as returned by `/api/upload`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub document_type: DocumentType,
    #[serde(default)]
    pub text_content: Option<String>,
    pub has_text_content: bool,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn process(
        registry: &ExtractorRegistry,
        name: String,
        mime_type: String,
        data: Vec<u8>,
        document_type: DocumentType,
    ) -> Self {
        let extraction = registry.extract(&mime_type, &name, &data);
        Self {
            size: data.len() as u64,
            has_text_content: extraction.has_text(),
            text_content: extraction.text().map(String::from),
            name,
            mime_type,
            document_type,
            data,
        }
    }

    pub fn into_part(self) -> ContentPart {
        ContentPart::file(self.data, self.mime_type, Some(self.name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
    pub message: String,
}

/// The message sent on the user's behalf after an upload
pub fn follow_up_message(names: &[&str], document_type: DocumentType) -> String {
    format!(
        "I've uploaded {} document(s) ({}) of type \"{}\". Can you help me understand these documents?",
        names.len(),
        names.join(", "),
        document_type
    )
}

/// Follow-up text plus the uploaded files, ready to send as one message
pub fn follow_up_content(files: Vec<UploadedFile>, document_type: DocumentType) -> MessageContent {
    let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
    let mut parts = vec![ContentPart::text(follow_up_message(&names, document_type))];
    parts.extend(files.into_iter().map(UploadedFile::into_part));
    MessageContent::Parts(parts)
}

/// Client for a chat server's `/api/upload`
pub struct UploadClient {
    client: Client,
    base_url: String,
}

impl UploadClient {
    pub fn new<S: Into<String>>(base_url: S) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Filter and submit files. Nothing is sent when no file survives the filter.
    #[instrument(skip(self, candidates), fields(count = candidates.len()))]
    pub async fn upload(
        &self,
        candidates: Vec<UploadCandidate>,
        document_type: DocumentType,
    ) -> Result<UploadResponse, UploadError> {
        let (accepted, rejected) = filter_uploads(candidates);
        for skipped in &rejected {
            warn!(name = %skipped.name, reason = ?skipped.reason, "Skipping file");
        }
        if accepted.is_empty() {
            return Err(UploadError::NothingToUpload);
        }

        let mut form = Form::new().text("documentType", document_type.to_string());
        for candidate in accepted {
            let part = Part::bytes(candidate.data)
                .file_name(candidate.name)
                .mime_str(&candidate.mime_type)?;
            form = form.part("files", part);
        }

        let response = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(UploadError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response.json().await?;
        info!(files = body.files.len(), "Upload processed");
        debug!("{}", body.message);
        Ok(body)
    }
}
