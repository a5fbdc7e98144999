//! OpenAI-compatible chat-completions client.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::GeneratorConfig;

use super::{Credential, GenerationError, Prompt, TextGenerator};

/// Longest error body kept in a [`GenerationError::Status`].
const ERROR_BODY_LIMIT: usize = 500;

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Unavailable`] if the HTTP client cannot be
    /// constructed (for example, no TLS backend).
    pub fn new(config: &GeneratorConfig) -> Result<Self, GenerationError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| {
                GenerationError::Unavailable(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint().to_string(),
            model: config.model().to_string(),
            temperature: config.temperature(),
        })
    }
}

impl TextGenerator for OpenAiClient {
    fn complete(
        &self,
        credential: Option<&Credential>,
        prompt: &Prompt,
    ) -> Result<String, GenerationError> {
        let credential = credential.ok_or(GenerationError::MissingCredential)?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: prompt.system(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.user(),
                },
            ],
            temperature: self.temperature,
        };

        info!(model = self.model.as_str(), prompt_chars = prompt.user().len(); "Calling text-generation service");
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .map_err(|err| {
                GenerationError::Unavailable(format!("failed to reach {}: {err}", self.endpoint))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let reply: ChatResponse = response.json().map_err(|err| {
            GenerationError::Unavailable(format!("service returned invalid JSON: {err}"))
        })?;

        let content = reply
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        debug!(response_chars = content.len(); "Received generation response");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_fails_before_network() {
        let config = GeneratorConfig::default().with_endpoint("http://127.0.0.1:9/never");
        let client = OpenAiClient::new(&config).unwrap();

        let err = client
            .complete(None, &Prompt::new("system", "user"))
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingCredential));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "be terse",
                },
                ChatMessage {
                    role: "user",
                    content: "draw",
                },
            ],
            temperature: 0.5,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["temperature"], 0.5);
    }

    #[test]
    fn test_response_without_content_is_empty() {
        let reply: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant"}}]}"#).unwrap();
        assert!(reply.choices[0].message.content.is_none());
    }
}
