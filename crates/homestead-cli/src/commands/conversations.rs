use anyhow::{bail, Result};
use console::style;
use uuid::Uuid;

use super::chat::SIGN_IN_HINT;
use super::Context;

pub async fn list(ctx: &Context) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    if !ctx.restore_session(&orchestrator).await? {
        bail!(SIGN_IN_HINT);
    }

    let conversations = orchestrator.snapshot().conversations;
    if conversations.is_empty() {
        println!("No conversations yet");
    }
    for conversation in conversations {
        println!(
            "{}  {}  {}",
            style(conversation.updated_at.format("%Y-%m-%d %H:%M")).dim(),
            style(conversation.id).dim(),
            conversation.title
        );
    }
    Ok(())
}

pub async fn delete(ctx: &Context, id: Uuid) -> Result<()> {
    let orchestrator = ctx.orchestrator()?;
    if !ctx.restore_session(&orchestrator).await? {
        bail!(SIGN_IN_HINT);
    }
    if !orchestrator.delete_conversation(id).await {
        bail!("Could not delete conversation {}", id);
    }
    println!("Deleted {}", id);
    Ok(())
}
