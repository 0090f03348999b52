use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use reqwest::{ClientBuilder, Proxy};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_DATASET_URL: &str =
    "https://huggingface.co/datasets/mmhshayer/books_data/resolve/main/data.csv";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: Option<String>,
    pub url: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: DEFAULT_DATASET_URL.to_string(),
        }
    }
}

/// Where the catalog is read from. A local path wins over the url.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    File(PathBuf),
    Remote(Url),
}

impl std::fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetSource::File(path) => write!(f, "{}", path.display()),
            DatasetSource::Remote(url) => write!(f, "{url}"),
        }
    }
}

impl DatasetConfig {
    pub fn source(&self) -> anyhow::Result<DatasetSource> {
        if let Some(path) = self.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(DatasetSource::File(PathBuf::from(path)));
        }

        let raw = self.url.trim();
        if raw.is_empty() {
            return Err(anyhow!(
                "dataset source missing; set DATASET_PATH or DATASET_URL env var, or dataset.path / dataset.url in config file"
            ));
        }

        let url = Url::parse(raw).with_context(|| format!("invalid dataset url: {raw}"))?;
        match url.scheme() {
            "http" | "https" => Ok(DatasetSource::Remote(url)),
            other => Err(anyhow!("unsupported dataset url scheme: {other}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "BookRecommender/0.1".to_string(),
            proxy: None,
        }
    }
}

impl HttpClientConfig {
    pub fn apply(&self, builder: ClientBuilder) -> anyhow::Result<ClientBuilder> {
        let mut builder = builder
            .user_agent(self.user_agent.clone())
            .timeout(Duration::from_secs(self.timeout_secs.max(1)));

        if let Some(proxy) = self.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy =
                Proxy::all(proxy).with_context(|| format!("invalid proxy url: {proxy}"))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: String,
    pub level: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "logs/book-recommender.log".to_string(),
            level: Some("info".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub dataset: DatasetConfig,
    pub http_client: HttpClientConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let explicit_path = std::env::var("CONFIG_FILE").ok();
        let config = if let Some(path) = explicit_path {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(anyhow!("config file {:?} not found", path));
            }
            Self::load_from_file(&path)?
        } else {
            let path = locate_default_config();
            if let Some(path) = path {
                Self::load_from_file(&path)?
            } else {
                AppConfig::default()
            }
        };

        Self::apply_overrides(config, |key| std::env::var(key).ok())
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        Ok(config)
    }

    fn apply_overrides<F>(mut config: AppConfig, lookup: F) -> anyhow::Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("SERVER_BIND") {
            config.server.bind = bind;
        }

        if let Some(path) = lookup("DATASET_PATH") {
            config.dataset.path = Some(path);
        }

        if let Some(url) = lookup("DATASET_URL") {
            config.dataset.url = url;
        }

        if let Some(timeout) = parse_optional(&lookup, "HTTP_TIMEOUT_SECS")? {
            config.http_client.timeout_secs = timeout;
        }

        if let Some(proxy) = lookup("HTTP_PROXY_URL") {
            config.http_client.proxy = Some(proxy);
        }

        if let Some(log_file) = lookup("LOG_FILE_PATH") {
            config.logging.file = log_file;
        }

        if let Some(log_level) = lookup("LOG_LEVEL") {
            config.logging.level = Some(log_level);
        }

        config.dataset.source()?;

        Ok(config)
    }
}

fn parse_optional<T, F>(lookup: &F, key: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(v) => Ok(Some(
            v.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a valid value"))?,
        )),
        None => Ok(None),
    }
}

fn locate_default_config() -> Option<PathBuf> {
    let candidates = [
        PathBuf::from("config/config.yaml"),
        PathBuf::from("../config/config.yaml"),
    ];

    candidates.into_iter().find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_published_dataset() {
        let config = AppConfig::apply_overrides(AppConfig::default(), overrides(&[])).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(
            config.dataset.source().unwrap(),
            DatasetSource::Remote(Url::parse(DEFAULT_DATASET_URL).unwrap())
        );
    }

    #[test]
    fn dataset_path_takes_precedence_over_url() {
        let config = AppConfig::apply_overrides(
            AppConfig::default(),
            overrides(&[("DATASET_PATH", "data/books.csv"), ("SERVER_BIND", "0.0.0.0:9000")]),
        )
        .unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(
            config.dataset.source().unwrap(),
            DatasetSource::File(PathBuf::from("data/books.csv"))
        );
    }

    #[test]
    fn rejects_non_http_dataset_url() {
        let err = AppConfig::apply_overrides(
            AppConfig::default(),
            overrides(&[("DATASET_URL", "ftp://example.com/data.csv")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported dataset url scheme"));
    }

    #[test]
    fn rejects_missing_dataset_source() {
        let err = AppConfig::apply_overrides(
            AppConfig::default(),
            overrides(&[("DATASET_URL", "  ")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("dataset source missing"));
    }

    #[test]
    fn rejects_malformed_timeout() {
        let err = AppConfig::apply_overrides(
            AppConfig::default(),
            overrides(&[("HTTP_TIMEOUT_SECS", "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn yaml_sections_fill_in_defaults() {
        let config: AppConfig = serde_yaml::from_str(
            "dataset:\n  path: ./data.csv\nlogging:\n  level: debug\n",
        )
        .unwrap();
        assert_eq!(config.dataset.path.as_deref(), Some("./data.csv"));
        assert_eq!(config.dataset.url, DEFAULT_DATASET_URL);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.file, "logs/book-recommender.log");
        assert_eq!(config.http_client.timeout_secs, 30);
    }
}
