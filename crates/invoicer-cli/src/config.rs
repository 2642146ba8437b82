// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use invoicer_app::{DEFAULT_PAGE_SIZE, PAGE_SIZE_OPTIONS};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_CACHE_TTL_DAYS: i64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";
const DURATION_HINT: &str = "use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)";
pub const API_URL_ENV: &str = "INVOICER_API_URL";
pub const CONFIG_PATH_ENV: &str = "INVOICER_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub log: Log,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub page_size: Option<u32>,
    /// Command used to open downloaded PDFs, e.g. `xdg-open` or `open`.
    pub pdf_viewer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cache {
    pub ttl_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub file: Option<String>,
    pub level: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(invoicer_api::APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                version: CONFIG_VERSION,
                ..Self::default()
            });
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` at the top",
                    path.display()
                )
            })?;
        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!("api.base_url in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed.is_zero() {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.ui.page_size
            && !PAGE_SIZE_OPTIONS.contains(&page_size)
        {
            bail!(
                "ui.page_size in {} must be one of {:?}, got {}",
                path.display(),
                PAGE_SIZE_OPTIONS,
                page_size
            );
        }

        if let Some(ttl_days) = self.cache.ttl_days
            && ttl_days < 0
        {
            bail!(
                "cache.ttl_days in {} must be non-negative, got {}",
                path.display(),
                ttl_days
            );
        }

        Ok(())
    }

    /// Config file first, then `INVOICER_API_URL`, then the built-in default.
    pub fn api_base_url(&self) -> String {
        if let Some(base_url) = &self.api.base_url {
            return base_url.trim().to_owned();
        }
        match env::var(API_URL_ENV) {
            Ok(value) if !value.trim().is_empty() => value.trim().to_owned(),
            _ => invoicer_api::DEFAULT_BASE_URL.to_owned(),
        }
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn page_size(&self) -> u32 {
        self.ui.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn pdf_viewer(&self) -> Option<&str> {
        self.ui
            .pdf_viewer
            .as_deref()
            .map(str::trim)
            .filter(|viewer| !viewer.is_empty())
    }

    pub fn cache_ttl_days(&self) -> i64 {
        self.cache.ttl_days.unwrap_or(DEFAULT_CACHE_TTL_DAYS)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.log
            .file
            .as_deref()
            .filter(|file| !file.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# invoicer config\n# Place this file at: {}\n\nversion = 1\n\n[api]\n# Falls back to {API_URL_ENV}, then {}\nbase_url = \"{}\"\ntimeout = \"{DEFAULT_TIMEOUT}\"\n\n[ui]\n# One of {:?}\npage_size = {}\n# Optional. Command that opens downloaded PDFs\n# pdf_viewer = \"xdg-open\"\n\n[cache]\nttl_days = {DEFAULT_CACHE_TTL_DAYS}\n\n[log]\n# Optional. Nothing is logged without a file\n# file = \"/tmp/invoicer.log\"\nlevel = \"{DEFAULT_LOG_LEVEL}\"\n",
            path.display(),
            invoicer_api::DEFAULT_BASE_URL,
            invoicer_api::DEFAULT_BASE_URL,
            PAGE_SIZE_OPTIONS,
            DEFAULT_PAGE_SIZE,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let secs = mins
            .checked_mul(60)
            .ok_or_else(|| anyhow!("invalid duration {raw:?}; {DURATION_HINT}"))?;
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; {DURATION_HINT}")
}
