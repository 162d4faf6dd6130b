use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{CompanionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    Ollama,
    OpenAI,
}

impl std::fmt::Display for AIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AIProvider::Ollama => write!(f, "ollama"),
            AIProvider::OpenAI => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for AIProvider {
    type Err = CompanionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(AIProvider::Ollama),
            "openai" | "gpt" => Ok(AIProvider::OpenAI),
            _ => Err(CompanionError::Config(format!("Unknown AI provider: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    pub provider: AIProvider,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl Default for AIConfig {
    fn default() -> Self {
        AIConfig {
            provider: AIProvider::Ollama,
            model: "gemma:2b".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
            api_key: None,
            timeout_secs: 30,
            temperature: None,
        }
    }
}

impl AIConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Opaque prompt-to-text backend
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Run `generate` with a deadline. The call is dropped when the deadline passes.
pub async fn generate_with_timeout(
    generator: &dyn Generator,
    prompt: &str,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(timeout, generator.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(CompanionError::Timeout(timeout)),
    }
}

pub struct AIProviderClient {
    config: AIConfig,
    http_client: reqwest::Client,
}

impl AIProviderClient {
    pub fn new(config: AIConfig) -> Self {
        AIProviderClient {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    async fn generate_ollama(&self, prompt: &str) -> Result<String> {
        let mut request_body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false
        });
        if let Some(temperature) = self.config.temperature {
            request_body["options"] = serde_json::json!({ "temperature": temperature });
        }

        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(CompanionError::Generation(format!("Ollama API error: {}", error_text)));
        }

        let response_json: serde_json::Value = response.json().await?;
        let content = response_json["response"]
            .as_str()
            .ok_or_else(|| CompanionError::Generation("Invalid Ollama response format".to_string()))?
            .to_string();

        Ok(content)
    }

    async fn generate_openai(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| CompanionError::Config("OpenAI API key required".to_string()))?;

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
        });

        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(CompanionError::Generation(format!("OpenAI API error: {}", error_text)));
        }

        let response_json: serde_json::Value = response.json().await?;
        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CompanionError::Generation("Invalid OpenAI response format".to_string()))?
            .to_string();

        Ok(content)
    }
}

#[async_trait]
impl Generator for AIProviderClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(provider = %self.config.provider, model = %self.config.model, "Requesting generation");
        match self.config.provider {
            AIProvider::Ollama => self.generate_ollama(prompt).await,
            AIProvider::OpenAI => self.generate_openai(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl Generator for Slow {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_timeout_aborts() {
        let result = generate_with_timeout(&Slow, "hi", Duration::from_millis(20)).await;
        assert!(matches!(result, Err(CompanionError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_within_deadline() {
        let result = generate_with_timeout(&Echo, "hi", Duration::from_secs(1)).await;
        assert_eq!(result.unwrap(), "HI");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Ollama".parse::<AIProvider>().unwrap(), AIProvider::Ollama);
        assert_eq!("gpt".parse::<AIProvider>().unwrap(), AIProvider::OpenAI);
        assert!("claude".parse::<AIProvider>().is_err());
    }
}
