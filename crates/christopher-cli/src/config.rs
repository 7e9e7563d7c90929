//! Configuration loading.
//!
//! Settings come from a TOML file (every section optional) and are then
//! overridden by a handful of environment variables.  `.env` is loaded by
//! `main` before the environment is read.
//!
//! ```toml
//! [classifier]
//! provider = "ollama"
//! model = "llama3"
//! timeout_secs = 30
//!
//! [handlers]
//! enabled = ["weather", "math", "writing", "programming"]
//! expose_errors = false
//!
//! [providers.openai]
//! api_key = "sk-..."
//!
//! [server]
//! port = 8000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use christopher_handlers::{BuiltinOptions, DEFAULT_ENABLED};
use christopher_kernel::{DispatcherConfig, RouterConfig};
use christopher_llm::{LlmClientConfig, LlmProvider, validate_base_url};
use christopher_web::WebConfig;
use serde::Deserialize;

use crate::cli::LogFormat;

/// File read when `--config` is not given.  Its absence is not an error.
pub const DEFAULT_CONFIG_FILE: &str = "christopher.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub classifier: ClassifierSection,
    pub handlers: HandlersSection,
    pub providers: ProvidersSection,
    pub server: ServerSection,
    pub logging: LoggingSection,
}

/// Model used to pick a handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub provider: LlmProvider,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: "llama3".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HandlersSection {
    /// Optional handlers to register.  `default` is always registered.
    pub enabled: Vec<String>,
    pub default_provider: LlmProvider,
    pub default_model: String,
    pub writing_model: String,
    pub programming_model: String,
    /// Return raw handler error text to callers.
    pub expose_errors: bool,
}

impl Default for HandlersSection {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED.iter().map(|id| (*id).to_owned()).collect(),
            default_provider: LlmProvider::Ollama,
            default_model: "llama3".into(),
            writing_model: "gpt-4".into(),
            programming_model: "claude-3-opus-20240229".into(),
            expose_errors: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersSection {
    pub ollama: ProviderSection,
    pub openai: ProviderSection,
    pub anthropic: ProviderSection,
}

impl ProvidersSection {
    fn get(&self, provider: LlmProvider) -> &ProviderSection {
        match provider {
            LlmProvider::Ollama => &self.ollama,
            LlmProvider::OpenAI => &self.openai,
            LlmProvider::Anthropic => &self.anthropic,
        }
    }
}

/// Endpoint overrides for one provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        let web = WebConfig::default();
        Self {
            bind: web.bind_addr,
            port: web.port,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// The file [`Config::load`] reads for `path`: `path` itself, else
    /// [`DEFAULT_CONFIG_FILE`] when it exists, else none.
    pub fn resolve_path(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                fallback.exists().then(|| fallback.to_path_buf())
            }
        }
    }

    /// Load the file chosen by [`Config::resolve_path`], or defaults.
    ///
    /// An explicitly requested file that cannot be read is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = Self::resolve_path(path) else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides.  Blank values are ignored.
    ///
    /// | Variable | Overrides |
    /// |----------|-----------|
    /// | `OLLAMA_BASE_URL` | `providers.ollama.base_url` |
    /// | `OLLAMA_MODEL` | classifier and default-handler model, where they use Ollama |
    /// | `OPENAI_API_KEY` | `providers.openai.api_key` |
    /// | `OPENAI_BASE_URL` | `providers.openai.base_url` |
    /// | `ANTHROPIC_API_KEY` | `providers.anthropic.api_key` |
    /// | `CHRISTOPHER_LOG` | `logging.level` |
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("OLLAMA_BASE_URL") {
            self.providers.ollama.base_url = Some(v);
        }
        if let Some(v) = var("OLLAMA_MODEL") {
            if self.classifier.provider == LlmProvider::Ollama {
                self.classifier.model = v.clone();
            }
            if self.handlers.default_provider == LlmProvider::Ollama {
                self.handlers.default_model = v;
            }
        }
        if let Some(v) = var("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(v);
        }
        if let Some(v) = var("OPENAI_BASE_URL") {
            self.providers.openai.base_url = Some(v);
        }
        if let Some(v) = var("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(v);
        }
        if let Some(v) = var("CHRISTOPHER_LOG") {
            self.logging.level = v;
        }
    }

    /// Reject settings that would only fail later, at request time.
    pub fn validate(&self) -> Result<()> {
        for (name, section) in [
            ("ollama", &self.providers.ollama),
            ("openai", &self.providers.openai),
            ("anthropic", &self.providers.anthropic),
        ] {
            if let Some(url) = &section.base_url {
                validate_base_url(url)
                    .with_context(|| format!("providers.{name}.base_url is invalid"))?;
            }
        }
        if self.classifier.timeout_secs == 0 {
            bail!("classifier.timeout_secs must be greater than zero");
        }
        if self.classifier.model.trim().is_empty() {
            bail!("classifier.model must not be empty");
        }
        if self.server.bind.trim().is_empty() {
            bail!("server.bind must not be empty");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived component configs
    // -----------------------------------------------------------------------

    /// Client settings for `provider` and `model`, with any configured
    /// endpoint and key applied.
    pub fn llm_config(&self, provider: LlmProvider, model: &str) -> LlmClientConfig {
        let section = self.providers.get(provider);
        let api_key = section.api_key.clone().unwrap_or_default();
        let config = match provider {
            LlmProvider::Ollama => LlmClientConfig::ollama(model),
            LlmProvider::OpenAI => LlmClientConfig::openai(api_key, model),
            LlmProvider::Anthropic => LlmClientConfig::anthropic(api_key, model),
        };
        match &section.base_url {
            Some(url) => config.with_base_url(url.clone()),
            None => config,
        }
    }

    pub fn classifier_llm(&self) -> LlmClientConfig {
        self.llm_config(self.classifier.provider, &self.classifier.model)
            .with_timeout(self.classify_timeout())
    }

    pub fn builtin_options(&self) -> BuiltinOptions {
        let h = &self.handlers;
        BuiltinOptions {
            enabled: h.enabled.clone(),
            default_llm: self.llm_config(h.default_provider, &h.default_model),
            writing_llm: self.llm_config(LlmProvider::OpenAI, &h.writing_model),
            programming_llm: self.llm_config(LlmProvider::Anthropic, &h.programming_model),
        }
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            classify_timeout: self.classify_timeout(),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            expose_errors: self.handlers.expose_errors,
        }
    }

    /// Server settings, with command-line flags taking precedence.
    pub fn web_config(&self, bind: Option<String>, port: Option<u16>) -> WebConfig {
        WebConfig {
            bind_addr: bind.unwrap_or_else(|| self.server.bind.clone()),
            port: port.unwrap_or(self.server.port),
        }
    }

    fn classify_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier.timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write as _;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.classifier.provider, LlmProvider::Ollama);
        assert_eq!(config.classifier.model, "llama3");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.handlers.enabled, DEFAULT_ENABLED);
        assert!(!config.handlers.expose_errors);
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            [classifier]
            provider = "openai"
            model = "gpt-4o-mini"

            [handlers]
            enabled = ["math"]
            expose_errors = true

            [providers.openai]
            api_key = "sk-test"
            base_url = "http://localhost:9999/v1"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.provider, LlmProvider::OpenAI);
        assert_eq!(config.classifier.timeout_secs, 30);
        assert_eq!(config.handlers.enabled, vec!["math"]);
        assert_eq!(config.handlers.default_model, "llama3");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");

        let llm = config.classifier_llm();
        assert_eq!(llm.provider, LlmProvider::OpenAI);
        assert_eq!(llm.api_key, "sk-test");
        assert_eq!(llm.base_url, "http://localhost:9999/v1");
        assert_eq!(llm.default_model, "gpt-4o-mini");
        assert!(config.dispatcher_config().expose_errors);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = Config::from_toml_str("[classifier]\nprovider = \"gemini\"\n").unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "mistral"),
            ("OPENAI_API_KEY", "sk-env"),
            ("ANTHROPIC_API_KEY", "ak-env"),
            ("CHRISTOPHER_LOG", "debug"),
        ]));

        assert_eq!(config.classifier.model, "mistral");
        assert_eq!(config.handlers.default_model, "mistral");
        assert_eq!(config.logging.level, "debug");

        let options = config.builtin_options();
        assert_eq!(options.default_llm.base_url, "http://gpu-box:11434");
        assert_eq!(options.default_llm.default_model, "mistral");
        assert_eq!(options.writing_llm.api_key, "sk-env");
        assert_eq!(options.writing_llm.default_model, "gpt-4");
        assert_eq!(options.programming_llm.api_key, "ak-env");
        assert_eq!(options.programming_llm.provider, LlmProvider::Anthropic);
    }

    #[test]
    fn ollama_model_leaves_other_providers_alone() {
        let mut config =
            Config::from_toml_str("[classifier]\nprovider = \"anthropic\"\nmodel = \"claude\"\n")
                .unwrap();
        config.apply_env(env(&[("OLLAMA_MODEL", "mistral"), ("OPENAI_API_KEY", "  ")]));
        assert_eq!(config.classifier.model, "claude");
        assert_eq!(config.handlers.default_model, "mistral");
        assert_eq!(config.providers.openai.api_key, None);
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::default();
        config.providers.ollama.base_url = Some("localhost:11434".into());
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("providers.ollama.base_url"));

        let mut config = Config::default();
        config.classifier.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn flags_take_precedence_over_server_section() {
        let config = Config::from_toml_str("[server]\nbind = \"0.0.0.0\"\nport = 9000\n").unwrap();
        let web = config.web_config(None, Some(9100));
        assert_eq!(web.bind_addr, "0.0.0.0");
        assert_eq!(web.port, 9100);
        assert_eq!(
            config.router_config().classify_timeout,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn load_reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 8123").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn resolve_path_prefers_explicit_file() {
        let explicit = Path::new("elsewhere.toml");
        assert_eq!(
            Config::resolve_path(Some(explicit)),
            Some(PathBuf::from("elsewhere.toml"))
        );
        if !Path::new(DEFAULT_CONFIG_FILE).exists() {
            assert_eq!(Config::resolve_path(None), None);
            assert_eq!(Config::load(None).unwrap().server.port, 8000);
        }
    }

    #[test]
    fn load_reports_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn load_reports_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }
}
