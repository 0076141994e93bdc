use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const URL_ENV: &str = "SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub datastore: DatastoreConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatastoreConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub url: Url,
    pub anon_key: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("https://your-project.supabase.co")
                .expect("default datastore URL must be valid"),
            anon_key: "YOUR_SUPABASE_ANON_KEY".to_string(),
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SiteConfig {
    /// サイトマップの URL に使うベース URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// ログインセッションの保存先
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_file: default_session_file(),
        }
    }
}

fn default_base_url() -> String {
    "https://example.com".to_string()
}

fn default_session_file() -> PathBuf {
    PathBuf::from("session.json")
}

impl Config {
    /// 環境変数 `SUPABASE_URL` / `SUPABASE_ANON_KEY` があれば設定ファイルの値を上書きする。
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.is_empty()) {
            self.datastore.url =
                Url::parse(&url).with_context(|| format!("Invalid {URL_ENV}: {url}"))?;
        }
        if let Some(key) = lookup(ANON_KEY_ENV).filter(|v| !v.is_empty()) {
            self.datastore.anon_key = key;
        }
        Ok(())
    }
}

pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).context("Failed to read configuration file")?;
    let mut config: Config =
        toml::from_str(&content).context("Failed to parse configuration file")?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let content =
        toml::to_string_pretty(&Config::default()).context("Failed to serialize configuration")?;
    fs::write(path.as_ref(), content).context("Failed to write configuration file")?;
    Ok(())
}
