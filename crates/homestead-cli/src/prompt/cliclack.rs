use std::io::{self, Write};

use ::cliclack::{input, log, spinner, ProgressBar};
use anyhow::Result;
use bat::WrappingMode;
use console::{measure_text_width, style, Term};
use homestead::models::conversation::Conversation;
use homestead::models::message::Message;
use homestead::models::role::Role;
use uuid::Uuid;

use super::{parse_input, Input, Prompt};

pub struct CliclackPrompt {
    spinner: Option<ProgressBar>,
    theme: Theme,
    /// Raw text echoed for the answer being streamed
    streamed: String,
}

enum Theme {
    Light,
    Dark,
}

impl CliclackPrompt {
    pub fn new() -> Self {
        CliclackPrompt {
            spinner: None,
            theme: Theme::Dark,
            streamed: String::new(),
        }
    }

    fn theme_name(&self) -> &'static str {
        match self.theme {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

impl Default for CliclackPrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn print_markdown(content: &str, theme: &str) {
    let printed = bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(theme)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print();
    if let Err(e) = printed {
        tracing::debug!("markdown rendering failed: {}", e);
        println!("{}", content);
    }
}

/// Terminal rows taken by `text` at the given width
pub fn rows(text: &str, width: usize) -> usize {
    let width = width.max(1);
    text.split('\n')
        .map(|line| measure_text_width(line).div_ceil(width).max(1))
        .sum()
}

impl Prompt for CliclackPrompt {
    fn render(&mut self, message: &Message) {
        match message.role {
            Role::Assistant => print_markdown(&message.text(), self.theme_name()),
            _ => println!("{} {}", style(">").dim(), message.text()),
        }
        println!();
    }

    fn stream_delta(&mut self, delta: &str) {
        self.streamed.push_str(delta);
        print!("{}", style(delta).dim());
        let _ = io::stdout().flush();
    }

    fn end_stream(&mut self) {
        let streamed = std::mem::take(&mut self.streamed);
        if streamed.is_empty() {
            return;
        }
        println!();
        let term = Term::stdout();
        if term.is_term() {
            let (_, width) = term.size();
            let _ = term.clear_last_lines(rows(&streamed, width as usize));
        }
    }

    fn get_input(&mut self) -> Result<Input> {
        let text: String = input("Ask about real estate          [Help: /?]")
            .placeholder("")
            .interact()?;

        if text.trim().eq_ignore_ascii_case("/t") {
            self.theme = match self.theme {
                Theme::Light => Theme::Dark,
                Theme::Dark => Theme::Light,
            };
            return Ok(Input::AskAgain);
        }
        Ok(parse_input(&text))
    }

    fn show_busy(&mut self) {
        let busy = spinner();
        busy.start("awaiting reply");
        self.spinner = Some(busy);
    }

    fn hide_busy(&mut self) {
        if let Some(busy) = self.spinner.take() {
            busy.stop("");
        }
    }

    fn info(&mut self, message: &str) {
        let _ = log::info(message);
    }

    fn error(&mut self, message: &str) {
        let _ = log::error(message);
    }

    fn render_conversations(&mut self, conversations: &[Conversation], active: Option<Uuid>) {
        if conversations.is_empty() {
            let _ = log::info("No conversations yet");
            return;
        }
        for conversation in conversations {
            let marker = if Some(conversation.id) == active { "*" } else { " " };
            println!(
                "{} {}  {}  {}",
                marker,
                style(conversation.updated_at.format("%Y-%m-%d %H:%M")).dim(),
                style(&conversation.title).bold(),
                style(conversation.id).dim()
            );
        }
    }

    fn close(&mut self) {
        self.hide_busy();
    }
}
