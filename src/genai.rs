use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SabiaError};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Thin client over an OpenAI-style chat completion endpoint. One attempt
/// per call, no retries; transport and API failures come back as
/// `Generation` errors carrying the underlying message.
pub struct GenAiClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl GenAiClient {
    pub fn new(api_key: &str, model: impl Into<String>) -> Result<Self> {
        let api_key = validate_key(api_key)?;
        Ok(GenAiClient {
            http_client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Points the client somewhere other than the public endpoint.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Replaces the credential after validating it. In-flight calls keep the
    /// key they started with.
    pub fn configure(&mut self, api_key: &str) -> Result<()> {
        self.api_key = validate_key(api_key)?;
        Ok(())
    }

    pub fn rotate_key(&mut self, new_key: &str) -> Result<()> {
        self.configure(new_key)
    }

    /// Requests one completion for `prompt`. Input validation happens before
    /// any network activity.
    pub async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(SabiaError::Validation("empty prompt".to_string()));
        }
        if max_tokens == 0 {
            return Err(SabiaError::Validation(
                "max_tokens must be positive".to_string(),
            ));
        }

        let request = self.build_request(prompt, max_tokens);
        debug!(model = %self.model, max_tokens, "requesting completion");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| SabiaError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SabiaError::Generation(format!(
                "completion endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SabiaError::Generation(format!("invalid completion response: {}", e)))?;

        extract_completion(parsed)
    }

    fn build_request(&self, prompt: &str, max_tokens: u32) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens,
        }
    }
}

fn extract_completion(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| SabiaError::Generation("no choices in completion response".to_string()))?;

    let completion = content.trim();
    if completion.is_empty() {
        return Err(SabiaError::Generation(
            "empty completion returned".to_string(),
        ));
    }

    Ok(completion.to_string())
}

fn validate_key(api_key: &str) -> Result<String> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        return Err(SabiaError::Validation("empty API key".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> GenAiClient {
        GenAiClient::new("sk-test", "gpt-3.5-turbo")
            .unwrap()
            // nothing listens on the discard port, so transport fails fast
            .with_api_base("http://127.0.0.1:9")
    }

    #[test]
    fn empty_keys_are_rejected() {
        assert!(matches!(
            GenAiClient::new("", "gpt-3.5-turbo"),
            Err(SabiaError::Validation(_))
        ));
        assert!(matches!(
            GenAiClient::new("   ", "gpt-3.5-turbo"),
            Err(SabiaError::Validation(_))
        ));

        let mut client = test_client();
        assert!(matches!(
            client.rotate_key(""),
            Err(SabiaError::Validation(_))
        ));
        assert!(client.rotate_key("sk-new").is_ok());
    }

    #[tokio::test]
    async fn generate_validates_before_any_network_call() {
        let client = test_client();

        assert!(matches!(
            client.generate("", 150).await,
            Err(SabiaError::Validation(_))
        ));
        assert!(matches!(
            client.generate("  \n ", 150).await,
            Err(SabiaError::Validation(_))
        ));
        assert!(matches!(
            client.generate("Olá", 0).await,
            Err(SabiaError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn transport_failures_surface_as_generation_errors() {
        let client = test_client();

        match client.generate("Olá", 10).await {
            Err(SabiaError::Generation(message)) => assert!(!message.is_empty()),
            other => panic!("expected a generation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn request_body_matches_the_endpoint_format() {
        let client = test_client();
        let body = serde_json::to_value(client.build_request("Olá, tudo bem?", 150)).unwrap();

        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["max_tokens"], 150);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Olá, tudo bem?");
    }

    fn response_with(content: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![ChatChoice {
                message: ResponseMessage {
                    content: content.to_string(),
                },
            }],
        }
    }

    #[test]
    fn completions_are_trimmed() {
        let completion = extract_completion(response_with("  Olá!  \n")).unwrap();
        assert_eq!(completion, "Olá!");
    }

    #[test]
    fn empty_completions_are_generation_errors() {
        assert!(matches!(
            extract_completion(response_with("")),
            Err(SabiaError::Generation(_))
        ));
        assert!(matches!(
            extract_completion(response_with("   \n  ")),
            Err(SabiaError::Generation(_))
        ));
        assert!(matches!(
            extract_completion(ChatResponse { choices: vec![] }),
            Err(SabiaError::Generation(_))
        ));
    }
}
