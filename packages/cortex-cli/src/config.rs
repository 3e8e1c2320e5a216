use anyhow::{Context, Result};
use dotenvy::dotenv;
use grounding::{Gemini, GroundingConfig};
use mcp_client::{McpClient, DEFAULT_MCP_URL, DEFAULT_TIMEOUT};
use std::env;
use std::time::Duration;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub mcp_url: String,
    pub mcp_api_key: Option<String>,
    pub mcp_timeout: Duration,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_embedding_model: Option<String>,
    pub max_sources: usize,
    pub rerank: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GroundingConfig::default();

        Ok(Self {
            mcp_url: lookup("CORTEX_MCP_URL").unwrap_or_else(|| DEFAULT_MCP_URL.to_string()),
            mcp_api_key: lookup("CORTEX_MCP_API_KEY").filter(|k| !k.is_empty()),
            mcp_timeout: match lookup("CORTEX_MCP_TIMEOUT_SECS") {
                Some(secs) => Duration::from_secs(
                    secs.parse()
                        .context("CORTEX_MCP_TIMEOUT_SECS must be a whole number of seconds")?,
                ),
                None => DEFAULT_TIMEOUT,
            },
            gemini_api_key: lookup("GEMINI_API_KEY").filter(|k| !k.is_empty()),
            gemini_model: lookup("GEMINI_MODEL"),
            gemini_embedding_model: lookup("GEMINI_EMBEDDING_MODEL"),
            max_sources: match lookup("CORTEX_MAX_SOURCES") {
                Some(n) => n.parse().context("CORTEX_MAX_SOURCES must be a valid number")?,
                None => defaults.max_sources,
            },
            rerank: match lookup("CORTEX_RERANK") {
                Some(flag) => parse_flag(&flag).context("CORTEX_RERANK must be true or false")?,
                None => defaults.rerank,
            },
        })
    }

    /// MCP client for retrieval and verification.
    pub fn mcp_client(&self) -> McpClient {
        let client = McpClient::new(&self.mcp_url).with_timeout(self.mcp_timeout);
        match &self.mcp_api_key {
            Some(key) => client.with_api_key(key),
            None => client,
        }
    }

    /// Gemini client, if an API key is configured.
    pub fn gemini(&self) -> Option<Gemini> {
        let key = self.gemini_api_key.as_ref()?;
        let mut gemini = Gemini::new(key);
        if let Some(model) = &self.gemini_model {
            gemini = gemini.with_model(model);
        }
        if let Some(model) = &self.gemini_embedding_model {
            gemini = gemini.with_embedding_model(model);
        }
        Some(gemini)
    }

    /// Gemini client, failing when no API key is configured.
    pub fn require_gemini(&self) -> Result<Gemini> {
        self.gemini()
            .context("GEMINI_API_KEY must be set for this command")
    }

    /// Pipeline configuration seeded from the environment.
    pub fn grounding_config(&self) -> GroundingConfig {
        GroundingConfig::new()
            .with_max_sources(self.max_sources)
            .with_rerank(self.rerank)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("invalid flag value '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mcp_url, "http://localhost:9000/mcp");
        assert_eq!(config.mcp_timeout, Duration::from_secs(30));
        assert_eq!(config.max_sources, 5);
        assert!(config.rerank);
        assert!(config.gemini().is_none());
        assert!(config.require_gemini().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CORTEX_MCP_URL", "http://mcp:9000/"),
            ("CORTEX_MCP_API_KEY", "secret"),
            ("CORTEX_MCP_TIMEOUT_SECS", "5"),
            ("CORTEX_MAX_SOURCES", "2"),
            ("CORTEX_RERANK", "off"),
            ("GEMINI_API_KEY", "key"),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
        ]))
        .unwrap();

        assert_eq!(config.mcp_client().base_url(), "http://mcp:9000");
        assert_eq!(config.mcp_client().timeout(), Duration::from_secs(5));
        assert_eq!(config.grounding_config().max_sources, 2);
        assert!(!config.grounding_config().rerank);
        assert_eq!(config.gemini().unwrap().model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("CORTEX_MAX_SOURCES", "many")])).is_err());
        assert!(Config::from_lookup(lookup(&[("CORTEX_RERANK", "maybe")])).is_err());
    }

    #[test]
    fn test_empty_keys_count_as_unset() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "")])).unwrap();
        assert!(config.gemini().is_none());
    }
}
