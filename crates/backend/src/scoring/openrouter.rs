use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use super::{ScoringError, ScoringProvider, prompt};
use crate::domain::{config::ScoringConfig, word::WordRecord};

/// Scores words through an OpenAI-compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct OpenRouterScorer {
  client: reqwest::Client,
  api_key: String,
  model: String,
  endpoint: String,
  temperature: f32,
}

impl OpenRouterScorer {
  pub fn new(config: &ScoringConfig) -> Result<Self, ScoringError> {
    let api_key = if let Some(key) = &config.api_key {
      key.clone()
    } else if let Some(key) = Self::key_from_env() {
      key
    } else {
      return Err(ScoringError::NoApiKey);
    };

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()?;
    let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

    info!(model = %config.model, endpoint = %endpoint, "OpenRouter scorer initialized");

    Ok(Self {
      client,
      api_key,
      model: config.model.clone(),
      endpoint,
      temperature: config.temperature,
    })
  }

  fn key_from_env() -> Option<String> {
    match std::env::var("OPENROUTER_API_KEY") {
      Ok(key) => {
        debug!("OPENROUTER_API_KEY found in environment");
        Some(key)
      }
      Err(_) => {
        debug!("OPENROUTER_API_KEY not set");
        None
      }
    }
  }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: [ChatMessage<'a>; 2],
  temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
  role: &'a str,
  content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
  message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
  #[serde(default)]
  content: Option<String>,
}

#[async_trait]
impl ScoringProvider for OpenRouterScorer {
  fn name(&self) -> &str {
    "openrouter"
  }

  async fn score(&self, words: &[&str]) -> Result<Vec<WordRecord>, ScoringError> {
    if words.is_empty() {
      return Ok(Vec::new());
    }

    let user = prompt::format_words(words);
    let request = ChatRequest {
      model: &self.model,
      messages: [
        ChatMessage {
          role: "system",
          content: prompt::INSTRUCTION,
        },
        ChatMessage {
          role: "user",
          content: &user,
        },
      ],
      temperature: self.temperature,
    };

    trace!(batch_size = words.len(), model = %self.model, "Sending scoring request");
    let start = Instant::now();

    let response = match self
      .client
      .post(&self.endpoint)
      .header("Authorization", format!("Bearer {}", self.api_key))
      .json(&request)
      .send()
      .await
    {
      Ok(resp) => resp,
      Err(e) => {
        warn!(error = %e, batch_size = words.len(), "Network error sending scoring request");
        if e.is_timeout() {
          return Err(ScoringError::Timeout);
        }
        return Err(ScoringError::Network(e.to_string()));
      }
    };

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      if status.as_u16() == 401 || status.as_u16() == 403 {
        error!(status = %status, model = %self.model, "Scoring service authentication failed");
      } else {
        warn!(status = %status, batch_size = words.len(), model = %self.model, "Scoring request failed");
      }
      return Err(ScoringError::Status {
        status: status.as_u16(),
        body,
      });
    }

    let reply: ChatResponse = response.json().await?;
    let content = reply
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .ok_or_else(|| ScoringError::Malformed("response has no message content".to_string()))?;

    let records = prompt::parse_response(&content);
    debug!(
      batch_size = words.len(),
      records = records.len(),
      elapsed_ms = start.elapsed().as_millis(),
      "Scoring request complete"
    );
    Ok(records)
  }
}
