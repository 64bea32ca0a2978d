use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use url::Url;

pub const ENV_PROTOCOL: &str = "GAIT_API_PROTOCOL";
pub const ENV_HOSTNAME: &str = "GAIT_API_HOSTNAME";
pub const ENV_PORT: &str = "GAIT_API_PORT";
pub const ENV_TOKEN_FILE: &str = "GAIT_TOKEN_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api: ApiOrigin,
    /// Where the session token is kept; the platform default when `None`.
    pub token_file: Option<PathBuf>,
}

/// Protocol, host and port of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiOrigin {
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
}

impl Default for ApiOrigin {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            hostname: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ApiOrigin {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = format!("{}://{}:{}/", self.protocol, self.hostname, self.port);
        Url::parse(&raw).map_err(|err| ConfigError::Invalid(format!("bad API origin {raw}: {err}")))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("configuration invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(detail) => format!("Client not configured: {detail}. Update gait.yaml."),
        }
    }
}

impl ClientConfig {
    /// Read `gait.yaml` if present, then apply `GAIT_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let raw = match locate_config_file() {
            Some(path) => {
                let contents = fs::read_to_string(&path).map_err(|err| {
                    ConfigError::Invalid(format!("failed to read {}: {err}", path.display()))
                })?;
                serde_yaml::from_str(&contents)
                    .map_err(|err| ConfigError::Invalid(format!("invalid gait.yaml: {err}")))?
            }
            None => RawConfig::default(),
        };
        resolve_config(raw, |key| std::env::var(key).ok())
    }
}

fn resolve_config(
    raw: RawConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    // Blank variables count as unset.
    let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let section = raw.api.unwrap_or_default();
    let defaults = ApiOrigin::default();

    let protocol = env(ENV_PROTOCOL)
        .or(section.protocol)
        .unwrap_or(defaults.protocol)
        .to_ascii_lowercase();
    if protocol != "http" && protocol != "https" {
        return Err(ConfigError::Invalid(format!(
            "unsupported API protocol `{protocol}`"
        )));
    }

    let hostname = env(ENV_HOSTNAME)
        .or(section.hostname)
        .unwrap_or(defaults.hostname)
        .trim()
        .to_string();
    if hostname.is_empty() {
        return Err(ConfigError::Invalid("missing API hostname".to_string()));
    }

    let port = match env(ENV_PORT) {
        Some(value) => value
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid(format!("{ENV_PORT} is not a port: {value}")))?,
        None => section.port.unwrap_or(defaults.port),
    };

    let token_file = env(ENV_TOKEN_FILE).map(PathBuf::from).or(raw.token_file);

    let config = ClientConfig {
        api: ApiOrigin {
            protocol,
            hostname,
            port,
        },
        token_file,
    };
    config.api.base_url()?;
    Ok(config)
}

fn locate_config_file() -> Option<PathBuf> {
    gait_yaml_candidates()
        .into_iter()
        .find(|path| path.exists())
}

fn gait_yaml_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(base) = BaseDirs::new() {
        let config_dir = base.config_dir().join("gait");
        paths.push(config_dir.join("gait.yaml"));
        paths.push(config_dir.join("gait.yml"));
        let home_dir = base.home_dir();
        paths.push(home_dir.join(".gait").join("gait.yaml"));
        paths.push(home_dir.join(".gait").join("gait.yml"));
    } else {
        paths.push(PathBuf::from("gait.yaml"));
        paths.push(PathBuf::from("gait.yml"));
    }
    paths
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    api: Option<ApiSection>,
    token_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSection {
    protocol: Option<String>,
    hostname: Option<String>,
    port: Option<u16>,
}
