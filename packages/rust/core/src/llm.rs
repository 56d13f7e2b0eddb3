//! OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use leadgen_shared::{
    GenerationRequest, LeadGenError, LlmConfig, Result, RetryPolicy, TextGenerationCapability,
    with_retry,
};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    content: Option<String>,
}

/// [`TextGenerationCapability`] backed by `POST {base_url}/chat/completions`.
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl ChatCompletionsClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("leadgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LeadGenError::Network(format!("failed to build LLM client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            retry,
        })
    }

    async fn complete_once(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadGenError::Generation {
                message: format!("request failed: {e}"),
                status: None,
            })?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(LeadGenError::Generation {
                message: format!("API returned {status}: {}", snippet(&detail)),
                status: Some(status.as_u16()),
            });
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| LeadGenError::parse(format!("invalid chat completions response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LeadGenError::Generation {
                message: "response contained no choices".into(),
                status: Some(status.as_u16()),
            })?
            .message
            .content
            .unwrap_or_default();

        debug!(model = %self.model, chars = content.len(), "completion received");
        Ok(content)
    }
}

#[async_trait]
impl TextGenerationCapability for ChatCompletionsClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        with_retry(&self.retry, "chat completion", || self.complete_once(request)).await
    }
}

fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(i, _)| i);
    body[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, retry: RetryPolicy) -> ChatCompletionsClient {
        let config = LlmConfig {
            base_url: format!("{}/v1/", server.uri()),
            timeout_secs: 5,
            ..LlmConfig::default()
        };
        ChatCompletionsClient::new(&config, "sk-test", retry).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "be brief".into(),
            prompt: "write to Pixel Post".into(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn posts_chat_request_and_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "write to Pixel Post"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi Pixel Post team,"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server, RetryPolicy::none())
            .generate(&request())
            .await
            .unwrap();
        assert_eq!(text, "Hi Pixel Post team,");
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, fast_retry())
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadGenError::Generation { status: Some(401), .. }));
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let text = client(&server, fast_retry())
            .generate(&request())
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn empty_choices_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, fast_retry())
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, LeadGenError::Generation { .. }));
    }
}
