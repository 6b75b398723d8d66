use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use tera::{Context, Error as TeraError, Tera};

use crate::topics::{Topic, TOPICS};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

/// Get the path to the prompts directory
fn prompts_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("src").join("prompts")
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    // relative names resolve against the bundled prompts directory
    let file_path = if !template_path.exists() {
        prompts_dir().join(template_path)
    } else {
        template_path
    };

    let template_content = fs::read_to_string(file_path)
        .map_err(|e| TeraError::chain("Failed to read template file", e))?;
    load_prompt(&template_content, context_data)
}

#[derive(Serialize)]
struct SystemContext<'a> {
    topics: &'a [Topic],
}

/// Default system instructions for every chat turn
pub fn system_prompt() -> &'static str {
    static PROMPT: OnceLock<String> = OnceLock::new();
    PROMPT.get_or_init(|| {
        load_prompt(SYSTEM_TEMPLATE, &SystemContext { topics: &TOPICS }).unwrap_or_else(|e| {
            tracing::error!("Failed to render system prompt: {}", e);
            SYSTEM_TEMPLATE.to_string()
        })
    })
}
