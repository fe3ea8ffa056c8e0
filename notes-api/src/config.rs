use std::sync::OnceLock;

use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    // auth
    /// Shared HS256 secret of the identity provider.
    pub jwt_secret: Option<String>,
    /// Expected `aud` claim, not checked when unset.
    pub jwt_audience: Option<String>,

    /// Comma separated list, any origin when unset.
    pub cors_origins: Option<String>,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_project_name")]
    pub project_name: String,

    // build
    pub app_version: Option<String>,
    #[serde(default = "default_local")]
    pub source: String,
    #[serde(default = "default_local")]
    pub git_commit: String,
    #[serde(default = "default_local")]
    pub pipeline_id: String,
    #[serde(default = "default_local")]
    pub version: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite.db".into()
}

fn default_project_name() -> String {
    "Notes API".into()
}

fn default_local() -> String {
    "local".into()
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>()
    }

    fn defaults() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_url: default_database_url(),
            jwt_secret: None,
            jwt_audience: None,
            cors_origins: None,
            log_json: false,
            project_name: default_project_name(),
            app_version: None,
            source: default_local(),
            git_commit: default_local(),
            pipeline_id: default_local(),
            version: default_local(),
        }
    }

    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        self.cors_origins.as_ref().map(|origins| {
            origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect()
        })
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Loads the configuration on first use. Call [`init`] at startup so a broken
/// environment is reported instead of silently falling back to defaults.
pub fn config() -> &'static Config {
    CONFIG.get_or_init(|| Config::from_env().unwrap_or_else(|_| Config::defaults()))
}

pub fn init() -> Result<&'static Config, envy::Error> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
pub fn config_override<F>(override_config: F) -> &'static Config
where
    F: FnOnce(Config) -> Config,
{
    CONFIG.get_or_init(|| override_config(Config::defaults()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_cors_origins() {
        let config = Config {
            cors_origins: Some("http://a.test, http://b.test,,".into()),
            ..Config::defaults()
        };

        assert_eq!(
            config.allowed_origins(),
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
        assert_eq!(Config::defaults().allowed_origins(), None);
    }
}
