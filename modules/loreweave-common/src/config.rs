use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Hard caps and floors for one import run. Constructed once at startup and
/// passed down by parameter; nothing in the pipeline reads the environment.
#[derive(Debug, Clone)]
pub struct ImportLimits {
    /// Language pages per import, counting the base page.
    pub max_languages: usize,
    /// Additional same-topic verification pages from the output language.
    pub max_verification_sources: usize,
    /// Minimum accepted length for a synthesized body.
    pub synthesis_min_chars: usize,
    /// Per-source content cap embedded into the synthesis prompt.
    pub per_source_char_cap: usize,
    /// Media candidates considered per import.
    pub max_media_candidates: usize,
    /// Per-file download ceiling.
    pub max_media_bytes: u64,
    /// Minimum gallery size the classifier tries to guarantee.
    pub gallery_min: usize,
    /// Images under this dimension are dropped unless wikitext places them.
    pub min_image_px: u32,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self {
            max_languages: 4,
            max_verification_sources: 2,
            synthesis_min_chars: 600,
            per_source_char_cap: 8_000,
            max_media_candidates: 12,
            max_media_bytes: 15 * 1024 * 1024,
            gallery_min: 3,
            min_image_px: 100,
        }
    }
}

impl ImportLimits {
    /// Candidate count below which the collector backfills from the shared
    /// media repository.
    pub fn coverage_threshold(&self) -> usize {
        (2 * self.gallery_min).max(6)
    }
}

/// Service configuration loaded from environment variables once at startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    // Web server
    pub bind_addr: String,
    pub port: u16,

    // Database + asset storage
    pub database_url: String,
    pub storage_root: PathBuf,

    // Generation providers
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub cli_binary: String,
    pub cli_timeout_secs: u64,
    pub cli_credential_file: Option<PathBuf>,

    // Import defaults
    pub fallback_langs: Vec<String>,
    pub limits: ImportLimits,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let limits = ImportLimits {
            max_languages: parse_env("MAX_LANGUAGES", 4)?,
            max_verification_sources: parse_env("MAX_VERIFICATION_SOURCES", 2)?,
            synthesis_min_chars: parse_env("SYNTHESIS_MIN_CHARS", 600)?,
            per_source_char_cap: parse_env("PER_SOURCE_CHAR_CAP", 8_000)?,
            max_media_candidates: parse_env("MAX_MEDIA_CANDIDATES", 12)?,
            max_media_bytes: parse_env("MAX_MEDIA_BYTES", 15 * 1024 * 1024)?,
            gallery_min: parse_env("GALLERY_MIN", 3)?,
            min_image_px: parse_env("MIN_IMAGE_PX", 100)?,
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8080)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
            storage_root: env::var("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/assets")),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            cli_binary: env::var("GEMINI_CLI_BIN").unwrap_or_else(|_| "gemini".to_string()),
            cli_timeout_secs: parse_env("GEMINI_CLI_TIMEOUT_SECS", 120)?,
            cli_credential_file: env::var("GEMINI_CLI_CREDENTIAL_FILE").ok().map(PathBuf::from),
            fallback_langs: env::var("FALLBACK_LANGS")
                .unwrap_or_else(|_| "en".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            limits,
        })
    }

    /// Log the loaded configuration with secrets reduced to a short preview.
    pub fn log_redacted(&self) {
        fn preview_opt(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.len().min(5);
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!("Config loaded:");
        tracing::info!("  bind: {}:{}", self.bind_addr, self.port);
        tracing::info!("  storage_root: {}", self.storage_root.display());
        tracing::info!("  GEMINI_API_KEY: {}", preview_opt(&self.gemini_api_key));
        tracing::info!("  GEMINI_MODEL: {}", self.gemini_model);
        tracing::info!("  cli: {} (timeout {}s)", self.cli_binary, self.cli_timeout_secs);
        tracing::info!("  fallback_langs: {}", self.fallback_langs.join(","));
        tracing::info!(
            "  limits: langs={} verify={} media={} gallery_min={}",
            self.limits.max_languages,
            self.limits.max_verification_sources,
            self.limits.max_media_candidates,
            self.limits.gallery_min
        );
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().with_context(|| format!("{key} must be a number")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_threshold_has_floor() {
        let mut limits = ImportLimits::default();
        limits.gallery_min = 1;
        assert_eq!(limits.coverage_threshold(), 6);
        limits.gallery_min = 5;
        assert_eq!(limits.coverage_threshold(), 10);
    }
}
