use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::retry::RetryPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Flash has higher rate limits than Pro and is fast enough for this workload.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Retry hint returned to clients on 429, independent of the internal backoff.
const DEFAULT_RATE_LIMIT_RETRY_AFTER_SECS: u64 = 5;

/// Default upload cap (10 MiB).
const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Instruction sent alongside every image.
pub const HAIRSTYLE_PROMPT: &str = r#"Analyze this image and identify the person's hairstyle. Please provide:
1. The current hairstyle name
2. A brief description of the current hairstyle
3. 3 suggested better hairstyles that would suit this person's face shape and features
4. Brief explanations for why each suggested hairstyle would work well

Please format your response as JSON with the following structure:
{
  "currentHairstyle": "name of current hairstyle",
  "description": "description of current hairstyle",
  "suggestions": [
    {
      "name": "suggested hairstyle name",
      "reason": "why this would work well"
    }
  ]
}"#;

#[derive(Debug, Clone)]
pub struct HairstyleConfig {
    pub common: core_config::Config,
    pub gemini: GeminiSettings,
    pub generation: GenerationSettings,
    pub retry: RetryPolicy,
    /// Hint surfaced to clients when the provider keeps rate limiting us.
    pub rate_limit_retry_after: Duration,
    pub upload: UploadSettings,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base: String,
    /// Per-call HTTP timeout.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: i32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_bytes: usize,
    /// Directory for per-request scratch copies of uploaded images.
    pub scratch_dir: PathBuf,
}

impl Default for HairstyleConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            gemini: GeminiSettings {
                api_key: Secret::new(String::new()),
                model: DEFAULT_GEMINI_MODEL.to_string(),
                api_base: DEFAULT_GEMINI_API_BASE.to_string(),
                timeout: Duration::from_secs(120),
            },
            generation: GenerationSettings::default(),
            retry: RetryPolicy::default(),
            rate_limit_retry_after: Duration::from_secs(DEFAULT_RATE_LIMIT_RETRY_AFTER_SECS),
            upload: UploadSettings {
                max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
                scratch_dir: env::temp_dir(),
            },
            prompt: HAIRSTYLE_PROMPT.to_string(),
        }
    }
}

impl HairstyleConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";
        let defaults = Self::default();

        let retry = RetryPolicy::new(
            parse_env("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts(), is_prod)?,
            Duration::from_millis(parse_env(
                "RETRY_BASE_DELAY_MS",
                defaults.retry.base_delay().as_millis() as u64,
                is_prod,
            )?),
            parse_env(
                "RETRY_BACKOFF_MULTIPLIER",
                defaults.retry.backoff_multiplier(),
                is_prod,
            )?,
        )
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid retry policy: {}", e)))?;

        Ok(HairstyleConfig {
            common: common_config,
            gemini: GeminiSettings {
                // An empty key is tolerated outside prod; startup warns about it.
                api_key: Secret::new(get_env("GEMINI_API_KEY", Some(""), is_prod)?),
                model: get_env("GEMINI_MODEL", Some(DEFAULT_GEMINI_MODEL), is_prod)?,
                api_base: get_env("GEMINI_API_BASE", Some(DEFAULT_GEMINI_API_BASE), is_prod)?,
                timeout: Duration::from_secs(parse_env(
                    "GEMINI_TIMEOUT_SECS",
                    defaults.gemini.timeout.as_secs(),
                    is_prod,
                )?),
            },
            generation: GenerationSettings {
                temperature: parse_env(
                    "GENERATION_TEMPERATURE",
                    defaults.generation.temperature,
                    is_prod,
                )?,
                top_k: parse_env("GENERATION_TOP_K", defaults.generation.top_k, is_prod)?,
                top_p: parse_env("GENERATION_TOP_P", defaults.generation.top_p, is_prod)?,
                max_output_tokens: parse_env(
                    "GENERATION_MAX_OUTPUT_TOKENS",
                    defaults.generation.max_output_tokens,
                    is_prod,
                )?,
            },
            retry,
            rate_limit_retry_after: Duration::from_secs(parse_env(
                "RATE_LIMIT_RETRY_AFTER_SECS",
                DEFAULT_RATE_LIMIT_RETRY_AFTER_SECS,
                is_prod,
            )?),
            upload: UploadSettings {
                max_bytes: parse_env("UPLOAD_MAX_BYTES", defaults.upload.max_bytes, is_prod)?,
                scratch_dir: match env::var("UPLOAD_SCRATCH_DIR") {
                    Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
                    _ => defaults.upload.scratch_dir,
                },
            },
            prompt: defaults.prompt,
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr + ToString,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(&default.to_string()), is_prod)?
        .trim()
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}
