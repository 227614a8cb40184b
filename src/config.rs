use crate::error::{Error, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://api.fastmail.com";
pub const DEFAULT_DISPLAY_TZ: &str = "America/Chicago";

/// How requests authenticate against the JMAP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_timezone: Option<String>,
}

impl Config {
    fn config_dir() -> Result<PathBuf> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not find home directory".into()))?
            .join(".fastmail-mcp");
        Ok(dir)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Config file, then `.env` in the working directory, then the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(&Self::config_path()?)?;
        let dotenv = load_dotenv(Path::new(".env"))?;
        config.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()));
        Ok(config)
    }

    /// Only what is on disk, for rewriting the config file.
    pub fn saved() -> Result<Self> {
        Self::load_file(&Self::config_path()?)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Non-empty variables override whatever the file said.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("FASTMAIL_BASE_URL") {
            self.base_url = Some(v);
        }
        if let Some(v) = get("FASTMAIL_TOKEN") {
            self.api_token = Some(v);
        }
        if let Some(v) = get("FASTMAIL_USERNAME") {
            self.username = Some(v);
        }
        if let Some(v) = get("FASTMAIL_APP_PASSWORD") {
            self.app_password = Some(v);
        }
        if let Some(v) = get("FASTMAIL_DISPLAY_TZ") {
            self.display_timezone = Some(v);
        }
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dir, fs::Permissions::from_mode(0o700))?;
        }

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(&path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// A token wins over username/app-password.
    pub fn credentials(&self) -> Result<Credentials> {
        if let Some(token) = &self.api_token {
            return Ok(Credentials::Token(token.clone()));
        }
        match (&self.username, &self.app_password) {
            (Some(username), Some(password)) => Ok(Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => Err(Error::Config(
                "No credentials. Run `fastmail-mcp auth <token>` or set FASTMAIL_TOKEN \
                 (or FASTMAIL_USERNAME and FASTMAIL_APP_PASSWORD)."
                    .into(),
            )),
        }
    }

    pub fn display_zone(&self) -> Result<Tz> {
        let name = self
            .display_timezone
            .as_deref()
            .unwrap_or(DEFAULT_DISPLAY_TZ);
        name.parse::<Tz>()
            .map_err(|_| Error::Config(format!("Unknown display timezone: {}", name)))
    }

    pub fn set_token(&mut self, token: String) {
        self.api_token = Some(token);
    }
}

/// `KEY=VALUE` pairs from a dotenv file. Real environment variables win.
fn load_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(parse_dotenv(&content).into_iter().collect())
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            let v = v.trim();
            let v = v
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(v);
            (k.trim().to_string(), v.to_string())
        })
        .collect()
}
