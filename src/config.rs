use std::{collections::BTreeMap, fs, path::PathBuf, sync::Arc, time::Duration};

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use crate::{
    consts::{
        cache_capacity_default, cache_idle_default, cache_max_age_default, host_ip_default,
        host_port_default, log_folder_default, log_level_default, server_info_default,
        timeout_default,
    },
    error::{Error, Result},
    http::{
        mime::Extensions,
        policy::{AlwaysModified, CacheTrusted, ModificationPolicy},
    },
};

/// When the pipeline rehashes a file before sending its `ETag`
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Rehash {
    /// Hash every response body again, a cached fingerprint is only used for
    /// `If-None-Match` comparison
    #[default]
    Always,
    /// Reuse the cached fingerprint while the file modification time is unchanged
    OnChange,
}

impl Rehash {
    pub fn policy(self) -> Arc<dyn ModificationPolicy> {
        match self {
            Rehash::Always => Arc::new(AlwaysModified),
            Rehash::OnChange => Arc::new(CacheTrusted),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct SettingHost {
    #[serde(default = "host_ip_default")]
    pub ip: String,
    #[serde(default = "host_port_default")]
    pub port: u16,
    /// The static assets root folder
    pub root: String,
    /// `Cache-Control: max-age` in seconds
    #[serde(default = "cache_max_age_default")]
    pub cache: u64,
    /// `Server` response header
    #[serde(default = "server_info_default")]
    pub server_info: String,
    /// Static headers added to every response, they override the defaults
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Content type overrides, `"application/font-woff" = ["woff"]`
    #[serde(default)]
    pub mime: BTreeMap<String, Extensions>,
    /// HTTP request timeout
    #[serde(default = "timeout_default")]
    pub timeout: u16,
    #[serde(default = "cache_capacity_default")]
    pub cache_capacity: usize,
    #[serde(default = "cache_idle_default")]
    pub cache_idle: u64,
    #[serde(default)]
    pub rehash: Rehash,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "log_folder_default")]
    pub log_folder: String,
    pub host: Vec<SettingHost>,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self> {
        let file = fs::read_to_string(path)?;
        Self::parse(&file)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        debug!("parsed settings with {} host(s)", settings.host.len());
        Ok(settings)
    }
}

/// Immutable per-server configuration consumed by the request pipeline
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub root: PathBuf,
    pub cache_seconds: u64,
    pub server_info: String,
    pub extra_headers: HeaderMap,
    pub cache_capacity: usize,
    pub cache_idle: Option<Duration>,
    pub rehash: Rehash,
}

impl ServerConfig {
    /// Build a config serving `root` with default settings
    ///
    /// The root must be an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        match fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(Error::RootNotFound(root.display().to_string())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::RootNotFound(root.display().to_string()));
            }
            Err(err) => return Err(err.into()),
        }
        let root = fs::canonicalize(&root)?;
        Ok(Self {
            root,
            cache_seconds: cache_max_age_default(),
            server_info: server_info_default(),
            extra_headers: HeaderMap::new(),
            cache_capacity: cache_capacity_default(),
            cache_idle: None,
            rehash: Rehash::default(),
        })
    }

    pub fn with_cache_seconds(mut self, seconds: u64) -> Self {
        self.cache_seconds = seconds;
        self
    }

    pub fn with_server_info(mut self, server_info: impl Into<String>) -> Self {
        self.server_info = server_info.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.extra_headers.insert(name, value);
        Ok(self)
    }

    pub fn with_rehash(mut self, rehash: Rehash) -> Self {
        self.rehash = rehash;
        self
    }
}

impl TryFrom<&SettingHost> for ServerConfig {
    type Error = Error;

    fn try_from(host: &SettingHost) -> Result<Self> {
        HeaderValue::from_str(&host.server_info)?;
        let mut config = ServerConfig::new(&host.root)?
            .with_cache_seconds(host.cache)
            .with_server_info(host.server_info.clone())
            .with_rehash(host.rehash);
        for (name, value) in &host.headers {
            config = config.with_header(name, value)?;
        }
        config.cache_capacity = host.cache_capacity;
        config.cache_idle = (host.cache_idle > 0).then(|| Duration::from_secs(host.cache_idle));
        Ok(config)
    }
}
