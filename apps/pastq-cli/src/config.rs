use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use pastq_client::ClientConfig;

/// Prefix of environment overrides, e.g. `PASTQ__BASE_URL` or
/// `PASTQ__HTTP__REQUEST_TIMEOUT`.
pub const ENV_PREFIX: &str = "PASTQ__";

/// Layered configuration: defaults, then the YAML file (if any), then
/// `PASTQ__*` environment variables.
///
/// When no session file is configured the session is kept in
/// `~/.pastq/session.json`.
pub fn load(path: Option<&Path>) -> Result<ClientConfig> {
    let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Yaml::file(path));
    }
    let mut config: ClientConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("invalid configuration")?;

    if config.session_file.is_none() {
        config.session_file = default_session_file();
    }
    Ok(config)
}

fn default_session_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pastq").join("session.json"))
}
