// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Google(GoogleProviderConfig),
}

// A missing api key is allowed here; the provider fails when it is first called.
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct GoogleProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Model used for requests carrying files
    pub multimodal_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl GoogleProviderConfig {
    pub fn multimodal_model(&self) -> &str {
        self.multimodal_model.as_deref().unwrap_or(&self.model)
    }
}
