mod commands;
mod prompt;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use homestead::upload::DocumentType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use commands::upload::parse_document_type;
use commands::Context;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Chat server url (can also be set via HOMESTEAD_API_URL environment variable)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with a code sent to your email
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Forget the saved session
    Logout,
    /// Chat with the assistant
    Chat {
        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<Uuid>,
        /// Open with a question about a topic (see `homestead topics`)
        #[arg(long)]
        topic: Option<String>,
    },
    /// List your conversations, most recent first
    Conversations,
    /// Delete a conversation and its messages
    Delete { id: Uuid },
    /// Upload documents and ask about them
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// purchase-agreement, lease, deed, mortgage, inspection, hoa, tax or other
        #[arg(long = "type", value_parser = parse_document_type, default_value = "other")]
        document_type: DocumentType,
        #[arg(long)]
        conversation: Option<Uuid>,
    },
    /// List the topics the assistant covers
    Topics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs would interleave with the prompt, so they are opt-in
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let ctx = Context::new(cli.api_url);

    match cli.command {
        Command::Login { email } => commands::auth::login(&ctx, email).await,
        Command::Logout => commands::auth::logout(),
        Command::Chat {
            conversation,
            topic,
        } => commands::chat::run(&ctx, conversation, topic).await,
        Command::Conversations => commands::conversations::list(&ctx).await,
        Command::Delete { id } => commands::conversations::delete(&ctx, id).await,
        Command::Upload {
            paths,
            document_type,
            conversation,
        } => commands::upload::run(&ctx, paths, document_type, conversation).await,
        Command::Topics => {
            commands::topics::list();
            Ok(())
        }
    }
}
