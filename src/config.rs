use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 4 * 1024 * 1024;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub anthropic_base_url: String,
    pub description_max_tokens: u32,
    pub feedback_max_tokens: u32,
    pub max_image_bytes: u64,
    pub fetch_timeout: Duration,
    pub bind_addr: String,
    pub static_dir: String,
    pub description_prompt_file: Option<String>,
    pub feedback_prompt_file: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let anthropic_api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY must be set in .env file")?;

        Ok(Self {
            anthropic_api_key,
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-latest".to_string()),
            anthropic_base_url: env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            description_max_tokens: parse_var("DESCRIPTION_MAX_TOKENS", 480)?,
            feedback_max_tokens: parse_var("FEEDBACK_MAX_TOKENS", 1024)?,
            max_image_bytes: parse_var("MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?,
            fetch_timeout: Duration::from_secs(parse_var("FETCH_TIMEOUT_SECS", 30)?),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            description_prompt_file: env::var("DESCRIPTION_PROMPT_FILE").ok(),
            feedback_prompt_file: env::var("FEEDBACK_PROMPT_FILE").ok(),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u64 = parse_var("DIET_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_var_reads_value() {
        env::set_var("DIET_TEST_MAX_TOKENS", " 512 ");
        let value: u32 = parse_var("DIET_TEST_MAX_TOKENS", 1).unwrap();
        assert_eq!(value, 512);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        env::set_var("DIET_TEST_BAD_NUMBER", "four megabytes");
        let result: Result<u64> = parse_var("DIET_TEST_BAD_NUMBER", 1);
        assert!(result.is_err());
    }
}
