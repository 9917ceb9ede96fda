//! A concrete `Generator`: OpenAI-compatible chat completion over HTTP.
//! Local/demo stand-in for whichever model backend a deployment actually
//! wires in; the core only ever sees the `Generator` trait (spec §6).

#![warn(missing_docs)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use vesper_core::{GenerateRequest, Generator, Result, VesperError};

/// Shared HTTP client for connection pooling, built once per process.
static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

fn http_client() -> reqwest::Client {
    HTTP_CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .pool_max_idle_per_host(8)
                .pool_idle_timeout(Duration::from_secs(90))
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .expect("failed to build the shared HTTP client")
        })
        .clone()
}

/// Prompt templates the provider renders `GenerateRequest`s against. The
/// core itself never builds prompt text (spec §6) — it only names a
/// `prompt_template_id` and supplies variables; rendering is entirely this
/// crate's concern.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: HashMap<String, String>,
}

impl TemplateStore {
    /// Register a template under `id`, containing `{{var}}` placeholders.
    pub fn with_template(mut self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(id.into(), body.into());
        self
    }

    /// Render the template named by `request.prompt_template_id`, substituting
    /// each `{{key}}` with its variable value. Unknown placeholders are left
    /// as-is; unknown template ids are a config error, not a generation
    /// failure, since it reflects a caller/template mismatch rather than an
    /// external collaborator problem.
    pub fn render(&self, request: &GenerateRequest) -> Result<String> {
        let body = self.templates.get(&request.prompt_template_id).ok_or_else(|| {
            VesperError::config(format!(
                "no prompt template registered for id '{}'",
                request.prompt_template_id
            ))
        })?;
        let mut rendered = body.clone();
        for (key, value) in &request.variables {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        Ok(rendered)
    }
}

/// Configuration for [`HttpGenerator`].
#[derive(Debug, Clone)]
pub struct HttpGeneratorConfig {
    /// Base URL of an OpenAI-compatible `/chat/completions` endpoint.
    pub base_url: String,
    /// Bearer token sent as `Authorization: Bearer <api_key>`.
    pub api_key: String,
    /// Model identifier passed through to the endpoint.
    pub model: String,
}

/// Calls an OpenAI-compatible chat completion endpoint, bounded by the
/// caller-supplied deadline.
pub struct HttpGenerator {
    client: reqwest::Client,
    config: HttpGeneratorConfig,
    templates: TemplateStore,
}

impl HttpGenerator {
    /// Build a generator against `config`, rendering prompts from `templates`.
    pub fn new(config: HttpGeneratorConfig, templates: TemplateStore) -> Self {
        Self {
            client: http_client(),
            config,
            templates,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: GenerateRequest, deadline: Duration) -> Result<String> {
        let prompt = self.templates.render(&request)?;
        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            temperature: None,
        };

        let call = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send();

        let response = match tokio::time::timeout(deadline, call).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(VesperError::external_timeout(format!(
                    "generate exceeded {:?} deadline",
                    deadline
                )))
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(VesperError::other(format!(
                "generator endpoint returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| VesperError::other("generator response had no choices"))
    }
}
