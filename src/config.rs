//! Configuration types for a document-to-text run.
//!
//! All run behaviour is controlled through [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The endpoint half ([`EndpointConfig`]) is read
//! once at process start from the environment and then passed down
//! explicitly; nothing in the library consults the environment afterwards.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use crate::prompts::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding a full base URL (overrides host + port).
pub const ENV_URL: &str = "DOTS_OCR_URL";
/// Environment variable holding the endpoint host.
pub const ENV_HOST: &str = "DOTS_OCR_HOST";
/// Environment variable holding the endpoint port.
pub const ENV_PORT: &str = "DOTS_OCR_PORT";
/// Environment variable holding the bearer token.
pub const ENV_TOKEN: &str = "DOTS_OCR_TOKEN";
/// Environment variable holding the served model name.
pub const ENV_MODEL: &str = "DOTS_OCR_MODEL";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8000;
/// vLLM accepts any token when started without `--api-key`.
pub const DEFAULT_TOKEN: &str = "EMPTY";

/// Where the inference service lives and how to talk to it.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Sent as `Authorization: Bearer {token}`.
    pub token: String,
    /// Value of the `model` field in every request.
    pub model: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: format!("http://{DEFAULT_HOST}:{DEFAULT_PORT}"),
            token: DEFAULT_TOKEN.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl EndpointConfig {
    /// Read the endpoint from `DOTS_OCR_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EndpointConfig::from_env`] but with an arbitrary key lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = match get(ENV_URL) {
            Some(url) => url,
            None => {
                let host = get(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
                let port = match get(ENV_PORT) {
                    Some(p) => p.trim().parse::<u16>().map_err(|_| {
                        PipelineError::InvalidConfig(format!("{ENV_PORT} must be a port number, got '{p}'"))
                    })?,
                    None => DEFAULT_PORT,
                };
                format!("http://{host}:{port}")
            }
        };

        Ok(Self {
            base_url: normalise_base_url(&base_url),
            token: get(ENV_TOKEN).unwrap_or_else(|| DEFAULT_TOKEN.to_string()),
            model: get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    /// `{base}/health`
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }

    /// `{base}/v1/chat/completions`
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

fn normalise_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Configuration for one document-to-text run.
///
/// # Example
/// ```rust
/// use dots_ocr::{PageSelection, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .pages(PageSelection::Single(2))
///     .concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Inference endpoint.
    pub endpoint: EndpointConfig,

    /// Rendering resolution for paginated input. Default: 150.
    pub dpi: u32,

    /// Output token budget per page. Default: 2048.
    pub max_tokens: usize,

    /// Per-page inference timeout. Default: 120 s.
    pub request_timeout_secs: u64,

    /// Health probe timeout. Default: 5 s.
    pub health_timeout_secs: u64,

    /// Inference calls in flight at once. Default: 1 (strictly sequential).
    ///
    /// Output order never depends on this value.
    pub concurrency: usize,

    /// Page selection. Default: all pages.
    pub pages: PageSelection,

    /// Parent directory for the temporary page workspace. Default: system temp.
    pub workspace_root: Option<PathBuf>,

    /// Explicit pdfium shared library to bind. Default: working dir, then system.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional per-page event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            dpi: 150,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout_secs: 120,
            health_timeout_secs: 5,
            concurrency: 1,
            pages: PageSelection::default(),
            workspace_root: None,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("endpoint", &self.endpoint)
            .field("dpi", &self.dpi)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("health_timeout_secs", &self.health_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("pages", &self.pages)
            .field("workspace_root", &self.workspace_root)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.config.endpoint = endpoint;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn health_timeout_secs(mut self, secs: u64) -> Self {
        self.config.health_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(PipelineError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.request_timeout_secs == 0 || c.health_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        if let PageSelection::Single(0) = c.pages {
            return Err(PipelineError::InvalidConfig(
                "Pages are 1-indexed, minimum is 1 (got 0)".into(),
            ));
        }
        if !c.endpoint.base_url.starts_with("http://") && !c.endpoint.base_url.starts_with("https://") {
            return Err(PipelineError::InvalidConfig(format!(
                "Endpoint URL must start with http:// or https://, got '{}'",
                c.endpoint.base_url
            )));
        }
        Ok(self.config)
    }
}

/// Which pages of a paginated document to recognise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
}

impl PageSelection {
    /// Expand against a document of `total_pages` into ascending 1-based page numbers.
    ///
    /// A single page outside `1..=total_pages` is an error, not an empty list.
    pub fn resolve(&self, total_pages: usize) -> Result<Vec<usize>, PipelineError> {
        match *self {
            PageSelection::All => Ok((1..=total_pages).collect()),
            PageSelection::Single(p) if p >= 1 && p <= total_pages => Ok(vec![p]),
            PageSelection::Single(p) => Err(PipelineError::InvalidPage {
                page: p,
                total: total_pages,
            }),
        }
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
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_endpoint_contract() {
        let c = PipelineConfig::default();
        assert_eq!(c.dpi, 150);
        assert_eq!(c.max_tokens, 2048);
        assert_eq!(c.request_timeout_secs, 120);
        assert_eq!(c.health_timeout_secs, 5);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn endpoint_falls_back_to_defaults() {
        let e = EndpointConfig::from_lookup(|_| None).unwrap();
        assert_eq!(e.base_url, "http://localhost:8000");
        assert_eq!(e.token, "EMPTY");
        assert_eq!(e.model, "dots-ocr");
        assert_eq!(e.health_url(), "http://localhost:8000/health");
        assert_eq!(e.completions_url(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn endpoint_reads_port_and_token() {
        let e = EndpointConfig::from_lookup(lookup(&[
            (ENV_PORT, "9123"),
            (ENV_TOKEN, "secret"),
            (ENV_HOST, "ocr.internal"),
        ]))
        .unwrap();
        assert_eq!(e.base_url, "http://ocr.internal:9123");
        assert_eq!(e.token, "secret");
    }

    #[test]
    fn url_override_wins_and_is_trimmed() {
        let e = EndpointConfig::from_lookup(lookup(&[
            (ENV_URL, "https://gpu-box:443/"),
            (ENV_PORT, "1"),
        ]))
        .unwrap();
        assert_eq!(e.base_url, "https://gpu-box:443");
    }

    #[test]
    fn bad_port_is_config_error() {
        let err = EndpointConfig::from_lookup(lookup(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let e = EndpointConfig::from_lookup(lookup(&[(ENV_TOKEN, "  ")])).unwrap();
        assert_eq!(e.token, DEFAULT_TOKEN);
    }

    #[test]
    fn debug_redacts_token() {
        let e = EndpointConfig {
            token: "hunter2".into(),
            ..Default::default()
        };
        assert!(!format!("{e:?}").contains("hunter2"));
    }

    #[test]
    fn builder_rejects_page_zero() {
        let err = PipelineConfig::builder()
            .pages(PageSelection::Single(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = PipelineConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn selection_resolves_to_one_based_pages() {
        assert_eq!(PageSelection::All.resolve(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(PageSelection::Single(2).resolve(3).unwrap(), vec![2]);
        assert!(matches!(
            PageSelection::Single(4).resolve(3),
            Err(PipelineError::InvalidPage { page: 4, total: 3 })
        ));
    }
}
