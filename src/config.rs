use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub model_path: PathBuf,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub explanations_enabled: bool,
    pub text_extraction_url: Option<String>, // Statement scoring is disabled when unset
    pub extraction_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub alt_data_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            model_path: PathBuf::from("model/credit_model.json"),
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3".to_string(),
            explanations_enabled: true,
            text_extraction_url: None,
            extraction_timeout_secs: 60,
            llm_timeout_secs: 120,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
            alt_data_seed: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T, hint: &str) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be {}", name, hint)),
        _ => Ok(default),
    }
}

fn http_url(name: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            port: parse_var("PORT", defaults.port, "a valid number between 1-65535")?,
            model_path: std::env::var("MODEL_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            ollama_base_url: http_url(
                "OLLAMA_BASE_URL",
                std::env::var("OLLAMA_BASE_URL").unwrap_or(defaults.ollama_base_url),
            )?,
            ollama_model: std::env::var("OLLAMA_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.ollama_model),
            explanations_enabled: parse_var(
                "EXPLANATIONS_ENABLED",
                defaults.explanations_enabled,
                "true or false",
            )?,
            text_extraction_url: std::env::var("TEXT_EXTRACTION_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| http_url("TEXT_EXTRACTION_URL", url))
                .transpose()?,
            extraction_timeout_secs: parse_var(
                "EXTRACTION_TIMEOUT_SECS",
                defaults.extraction_timeout_secs,
                "a number of seconds",
            )?,
            llm_timeout_secs: parse_var(
                "LLM_TIMEOUT_SECS",
                defaults.llm_timeout_secs,
                "a number of seconds",
            )?,
            max_upload_bytes: parse_var(
                "MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
                "a byte count",
            )?,
            rate_limit_per_second: parse_var(
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
                "a positive number",
            )?,
            rate_limit_burst: parse_var(
                "RATE_LIMIT_BURST",
                defaults.rate_limit_burst,
                "a positive number",
            )?,
            alt_data_seed: std::env::var("ALT_DATA_SEED")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim()
                        .parse()
                        .map_err(|_| anyhow::anyhow!("ALT_DATA_SEED must be an unsigned integer"))
                })
                .transpose()?,
        };

        if config.port == 0 {
            anyhow::bail!("PORT must be a valid number between 1-65535");
        }
        if config.rate_limit_per_second == 0 || config.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be positive");
        }
        if config.extraction_timeout_secs == 0 || config.llm_timeout_secs == 0 {
            anyhow::bail!("Collaborator timeouts must be at least 1 second");
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Model path: {}", config.model_path.display());
        tracing::debug!(
            "Ollama: {} (model {})",
            config.ollama_base_url,
            config.ollama_model
        );
        match config.text_extraction_url {
            Some(ref url) => tracing::info!("Text extraction service configured: {}", url),
            None => tracing::warn!("TEXT_EXTRACTION_URL not set, statement scoring disabled"),
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_url_validation() {
        assert_eq!(
            http_url("X", "http://ocr:9000/".to_string()).unwrap(),
            "http://ocr:9000"
        );
        assert!(http_url("X", "ftp://ocr".to_string()).is_err());
        assert!(http_url("X", "  ".to_string()).is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.ollama_model, "llama3");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert!(config.text_extraction_url.is_none());
    }
}
