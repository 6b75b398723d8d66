use anyhow::{bail, Context as _, Result};
use cliclack::{log, spinner};
use homestead::chat::SendOutcome;
use homestead::upload::{
    filter_uploads, follow_up_content, DocumentType, RejectReason, UploadCandidate, UploadClient,
};
use std::path::PathBuf;
use uuid::Uuid;

use super::chat::{ChatSession, SIGN_IN_HINT};
use super::Context;
use crate::prompt::cliclack::CliclackPrompt;

pub fn parse_document_type(value: &str) -> Result<DocumentType, String> {
    DocumentType::parse(value).map_err(|e| e.to_string())
}

/// Upload documents, then ask about them in the given conversation
pub async fn run(
    ctx: &Context,
    paths: Vec<PathBuf>,
    document_type: DocumentType,
    conversation: Option<Uuid>,
) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    if !ctx.restore_session(&orchestrator).await? {
        bail!(SIGN_IN_HINT);
    }
    if let Some(id) = conversation {
        orchestrator.load_messages(id).await;
        if orchestrator.snapshot().active_conversation != Some(id) {
            bail!("Conversation {} not found", id);
        }
    }

    let mut candidates = Vec::new();
    for path in &paths {
        candidates.push(UploadCandidate::from_path(path).await?);
    }
    let (accepted, rejected) = filter_uploads(candidates);
    for skipped in rejected {
        let reason = match skipped.reason {
            RejectReason::TooLarge => "larger than 10 MB",
            RejectReason::UnsupportedType => "unsupported file type",
        };
        log::warning(format!("Skipping {}: {}", skipped.name, reason))?;
    }
    if accepted.is_empty() {
        bail!("No files to upload");
    }

    let busy = spinner();
    busy.start(format!(
        "Uploading {} file(s) as {}",
        accepted.len(),
        document_type.name()
    ));
    let uploaded = UploadClient::new(ctx.api_url.as_str())?
        .upload(accepted, document_type)
        .await;
    busy.stop("");
    let uploaded = uploaded.context("Upload failed")?;
    log::success(&uploaded.message)?;

    let content = follow_up_content(uploaded.files, document_type);
    let mut session = ChatSession::new(orchestrator, CliclackPrompt::new());
    match session.send(content).await {
        SendOutcome::Completed { .. } => Ok(()),
        outcome => bail!("The documents were uploaded but not discussed: {:?}", outcome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_type() {
        assert_eq!(parse_document_type("hoa"), Ok(DocumentType::Hoa));
        assert_eq!(
            parse_document_type("purchase-agreement"),
            Ok(DocumentType::PurchaseAgreement)
        );
        assert_eq!(
            parse_document_type("will"),
            Err("Unknown document type: will".to_string())
        );
    }
}
