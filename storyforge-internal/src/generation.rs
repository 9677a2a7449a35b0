use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, ErrorDetails};

/// Fixed system instruction, parameterized only by the requested tone.
pub fn system_instruction(tone: &str) -> String {
    format!(
        "You are StoryForge, an expert creative writing assistant specialized in {tone}-style storytelling. \
Create engaging, vivid prose that captures character emotions and maintains narrative momentum. \
Focus on showing rather than telling, with rich sensory details and compelling dialogue."
    )
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for the external generation backend (an OpenAI-compatible
/// chat-completions endpoint). No retries: a failed call surfaces
/// immediately and the user may resubmit manually.
#[derive(Clone, Debug)]
pub enum GenerationClient {
    Production {
        base_url: Url,
        api_key: SecretString,
        model_name: String,
    },
    Mock {
        response: String,
        healthy: bool,
    },
}

impl GenerationClient {
    /// Model identifier recorded in the usage log for this client.
    pub fn model_name(&self) -> &str {
        match self {
            GenerationClient::Production { model_name, .. } => model_name,
            GenerationClient::Mock { .. } => "mock-generation-model",
        }
    }

    /// Forward the prompt to the backend and return the generated text.
    ///
    /// The raw backend error body is captured into the (logged, internal)
    /// error message but is never surfaced to the gateway's own callers.
    pub async fn generate(
        &self,
        http_client: &Client,
        system: &str,
        prompt: &str,
    ) -> Result<String, Error> {
        match self {
            GenerationClient::Production {
                base_url,
                api_key,
                model_name,
            } => {
                let request_url = base_url.join("chat/completions").map_err(|e| {
                    Error::new(ErrorDetails::Config {
                        message: format!("Invalid generation base URL `{base_url}`: {e}"),
                    })
                })?;
                let request_body = ChatCompletionRequest {
                    model: model_name,
                    messages: [
                        ChatMessage {
                            role: "system",
                            content: system,
                        },
                        ChatMessage {
                            role: "user",
                            content: prompt,
                        },
                    ],
                };
                let res = http_client
                    .post(request_url)
                    .bearer_auth(api_key.expose_secret())
                    .json(&request_body)
                    .send()
                    .await
                    .map_err(|e| {
                        Error::new(ErrorDetails::Generation {
                            message: format!("Error sending request: {e}"),
                            status_code: e.status(),
                        })
                    })?;

                let status = res.status();
                if !status.is_success() {
                    let raw_response = res.text().await.unwrap_or_default();
                    return Err(Error::new(ErrorDetails::Generation {
                        message: format!("Backend returned an error: {raw_response}"),
                        status_code: Some(status),
                    }));
                }

                let response_body = res.json::<ChatCompletionResponse>().await.map_err(|e| {
                    Error::new(ErrorDetails::Generation {
                        message: format!("Error parsing response: {e}"),
                        status_code: None,
                    })
                })?;
                let text = response_body
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| {
                        Error::new(ErrorDetails::Generation {
                            message: "Backend response contained no generated text".to_string(),
                            status_code: None,
                        })
                    })?;
                Ok(text)
            }
            GenerationClient::Mock { response, healthy } => {
                if !healthy {
                    return Err(Error::new(ErrorDetails::Generation {
                        message: "Mock generation backend is not healthy".to_string(),
                        status_code: Some(axum::http::StatusCode::BAD_GATEWAY),
                    }));
                }
                Ok(response.clone())
            }
        }
    }
}
