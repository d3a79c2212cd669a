use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{ConfigError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "newsroom.toml";
pub const STREAMLIT_SECRETS_FILE: &str = ".streamlit/secrets.toml";
pub const MAX_WINDOW_DAYS: u32 = 3650;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub secrets: Secrets,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The four values the newsroom cannot run without. Each may come from the
/// config file, a `.streamlit/secrets.toml` left over from an older
/// deployment, or the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secrets {
    #[serde(default, alias = "GITHUB_TOKEN", skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,

    #[serde(default, alias = "REPO_NAME", skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,

    #[serde(default, alias = "GEMINI_API_KEY", skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,

    #[serde(default, alias = "ADMIN_PASSWORD", skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
}

/// Secrets after [`Secrets::require`] has confirmed every one is present.
#[derive(Clone)]
pub struct Credentials {
    pub github_token: String,
    pub repo_name: String,
    pub gemini_api_key: String,
    pub admin_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("repo_name", &self.repo_name)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn check_admin_password(&self, candidate: &str) -> bool {
        // blake3::Hash equality is constant time
        blake3::hash(candidate.as_bytes()) == blake3::hash(self.admin_password.as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    #[serde(default = "default_max_articles")]
    pub max_articles: usize,

    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,

    #[serde(default = "default_gemini_api_base")]
    pub gemini_api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::NotFound(path.as_ref().display().to_string()))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective configuration: an explicit path must exist,
    /// otherwise `newsroom.toml` in the working directory is used when
    /// present. Secrets missing from the file are filled from
    /// `.streamlit/secrets.toml`, and the environment overrides both.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::load(DEFAULT_CONFIG_FILE)?,
            None => Self::default(),
        };

        if Path::new(STREAMLIT_SECRETS_FILE).exists() {
            let legacy = Secrets::load_streamlit(STREAMLIT_SECRETS_FILE)?;
            config.secrets.fill_missing(legacy);
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.settings.window_days == 0 || self.settings.window_days > MAX_WINDOW_DAYS {
            return Err(ConfigError::Config(format!(
                "Window days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS, self.settings.window_days
            )));
        }

        if self.settings.max_articles == 0 {
            return Err(ConfigError::Config("Max articles must be greater than 0".to_string()));
        }

        if let Some(repo) = &self.secrets.repo_name {
            let mut parts = repo.split('/');
            let well_formed = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
            );
            if !well_formed {
                return Err(ConfigError::Config(format!(
                    "Repository must look like 'owner/name', got '{}'",
                    repo
                )));
            }
        }

        for base in [&self.settings.github_api_base, &self.settings.gemini_api_base] {
            url::Url::parse(base).map_err(|_| ConfigError::InvalidUrl(base.clone()))?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.secrets.apply_env();

        if let Ok(days) = std::env::var("NEWSROOM_WINDOW_DAYS") {
            if let Ok(val) = days.parse() {
                self.settings.window_days = val;
            }
        }

        if let Ok(level) = std::env::var("NEWSROOM_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(bind) = std::env::var("NEWSROOM_BIND") {
            self.server.bind = bind;
        }
    }

    /// Directory that holds the local copies of the JSON documents.
    pub fn data_root(&self) -> &Path {
        &self.settings.data_dir
    }
}

impl Secrets {
    /// Read a Streamlit secrets file, where keys are upper-case at top level.
    pub fn load_streamlit<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let secrets: Secrets = toml::from_str(&content)?;
        Ok(secrets)
    }

    pub fn fill_missing(&mut self, other: Secrets) {
        self.github_token = self.github_token.take().or(other.github_token);
        self.repo_name = self.repo_name.take().or(other.repo_name);
        self.gemini_api_key = self.gemini_api_key.take().or(other.gemini_api_key);
        self.admin_password = self.admin_password.take().or(other.admin_password);
    }

    fn apply_env(&mut self) {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        if let Some(v) = read("GITHUB_TOKEN") {
            self.github_token = Some(v);
        }
        if let Some(v) = read("REPO_NAME") {
            self.repo_name = Some(v);
        }
        if let Some(v) = read("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = read("ADMIN_PASSWORD") {
            self.admin_password = Some(v);
        }
    }

    /// Fails with a configuration error naming every missing secret.
    pub fn require(&self) -> Result<Credentials> {
        let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);

        let github_token = present(&self.github_token);
        let repo_name = present(&self.repo_name);
        let gemini_api_key = present(&self.gemini_api_key);
        let admin_password = present(&self.admin_password);

        let missing: Vec<&str> = [
            ("GITHUB_TOKEN", github_token.is_none()),
            ("REPO_NAME", repo_name.is_none()),
            ("GEMINI_API_KEY", gemini_api_key.is_none()),
            ("ADMIN_PASSWORD", admin_password.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(key, _)| key)
        .collect();

        match (github_token, repo_name, gemini_api_key, admin_password) {
            (Some(github_token), Some(repo_name), Some(gemini_api_key), Some(admin_password)) => {
                Ok(Credentials {
                    github_token,
                    repo_name,
                    gemini_api_key,
                    admin_password,
                })
            }
            _ => Err(ConfigError::Config(format!(
                "Secrets not found: {}. Configure them in [secrets] of {}, in {} or in the environment",
                missing.join(", "),
                DEFAULT_CONFIG_FILE,
                STREAMLIT_SECRETS_FILE
            ))),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            max_articles: default_max_articles(),
            summary_chars: default_summary_chars(),
            model: default_model(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            data_dir: default_data_dir(),
            branch: None,
            github_api_base: default_github_api_base(),
            gemini_api_base: default_gemini_api_base(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

fn default_window_days() -> u32 { 3 }
fn default_max_articles() -> usize { 50 }
fn default_summary_chars() -> usize { 200 }
fn default_model() -> String { "gemini-2.5-flash-lite".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_user_agent() -> String {
    format!("RSS-Newsroom/{}", env!("CARGO_PKG_VERSION"))
}
fn default_data_dir() -> PathBuf { PathBuf::from(".") }
fn default_github_api_base() -> String { "https://api.github.com".to_string() }
fn default_gemini_api_base() -> String { "https://generativelanguage.googleapis.com".to_string() }
fn default_bind() -> String { "127.0.0.1:8501".to_string() }
fn default_log_level() -> String { "info".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn full_secrets() -> Secrets {
        Secrets {
            github_token: Some("ghp_token".to_string()),
            repo_name: Some("octo/newsroom".to_string()),
            gemini_api_key: Some("gm-key".to_string()),
            admin_password: Some("hunter2".to_string()),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.settings.window_days, 3);
        assert_eq!(config.settings.max_articles, 50);
        assert_eq!(config.settings.summary_chars, 200);
        assert_eq!(config.server.bind, "127.0.0.1:8501");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_require_reports_every_missing_secret() {
        let secrets = Secrets {
            github_token: Some("ghp_token".to_string()),
            repo_name: None,
            gemini_api_key: Some("   ".to_string()),
            admin_password: None,
        };

        let err = secrets.require().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("REPO_NAME"));
        assert!(msg.contains("GEMINI_API_KEY"));
        assert!(msg.contains("ADMIN_PASSWORD"));
        assert!(!msg.contains("GITHUB_TOKEN"));
    }

    #[test]
    fn test_require_succeeds_with_all_secrets() {
        let creds = full_secrets().require().unwrap();
        assert_eq!(creds.repo_name, "octo/newsroom");
        assert!(creds.check_admin_password("hunter2"));
        assert!(!creds.check_admin_password("hunter3"));
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_load_toml_with_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("newsroom.toml");
        std::fs::write(&path, r#"
[secrets]
github_token = "t"
repo_name = "owner/repo"
gemini_api_key = "k"
admin_password = "p"

[settings]
window_days = 7
model = "gemini-2.0-flash"

[server]
bind = "0.0.0.0:9000"
"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.settings.window_days, 7);
        assert_eq!(config.settings.model, "gemini-2.0-flash");
        assert_eq!(config.settings.max_articles, 50);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert!(config.secrets.require().is_ok());
    }

    #[test]
    fn test_streamlit_secrets_are_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secrets.toml");
        std::fs::write(&path, r#"
GITHUB_TOKEN = "t"
REPO_NAME = "owner/repo"
GEMINI_API_KEY = "k"
ADMIN_PASSWORD = "p"
"#).unwrap();

        let legacy = Secrets::load_streamlit(&path).unwrap();
        let mut secrets = Secrets {
            admin_password: Some("override".to_string()),
            ..Secrets::default()
        };
        secrets.fill_missing(legacy);

        assert_eq!(secrets.repo_name.as_deref(), Some("owner/repo"));
        assert_eq!(secrets.admin_password.as_deref(), Some("override"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.settings.window_days = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.secrets.repo_name = Some("just-a-name".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.secrets.repo_name = Some("a/b/c".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_days_upper_bound() {
        let mut config = Config::default();
        config.settings.window_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        config.settings.window_days = 100_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("100000000"));
    }
}
