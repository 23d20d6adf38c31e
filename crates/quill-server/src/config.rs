use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::policy::AccessPolicy;

const REDACTED: &str = "********";

/// Server configuration.
///
/// Precedence, lowest first: built-in defaults, TOML file, `QUILL_*`
/// environment variables, command-line flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding `posts.json` for the JSON-file backend.
    pub data_dir: PathBuf,
    /// Directory uploaded images are written to and served from.
    pub upload_dir: PathBuf,
    /// Largest accepted request body, uploads included.
    pub max_upload_bytes: usize,
    pub storage: StorageBackend,
    /// Key material for session token derivation.
    pub session_secret: String,
    pub cors_allow_any: bool,
    pub admin: AdminCredentials,
    pub policy: AccessPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            data_dir: PathBuf::from("data"),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
            storage: StorageBackend::JsonFile,
            session_secret: random_secret(),
            cors_allow_any: true,
            admin: AdminCredentials::default(),
            policy: AccessPolicy::default(),
        }
    }
}

/// The single administrative credential pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: String::new(),
        }
    }
}

/// Where posts are kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    /// Process-lifetime only.
    Memory,
    /// `<data_dir>/posts.json`.
    JsonFile,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "json-file" | "json" | "file" => Ok(Self::JsonFile),
            other => Err(format!("unknown storage backend: {other}")),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Overlay `QUILL_*` variables from the process environment.
    pub fn with_env(self) -> ServerResult<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `QUILL_*` variables resolved through `lookup`.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        if let Some(v) = lookup("QUILL_BIND") {
            self.bind_addr = parse_var("QUILL_BIND", &v)?;
        }
        if let Some(v) = lookup("QUILL_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("QUILL_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("QUILL_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_var("QUILL_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("QUILL_STORAGE") {
            self.storage = parse_var("QUILL_STORAGE", &v)?;
        }
        if let Some(v) = lookup("QUILL_ADMIN_USER") {
            self.admin.username = v;
        }
        if let Some(v) = lookup("QUILL_ADMIN_PASSWORD") {
            self.admin.password = v;
        }
        if let Some(v) = lookup("QUILL_SESSION_SECRET") {
            self.session_secret = v;
        }
        if let Some(v) = lookup("QUILL_REQUIRE_AUTH") {
            self.policy = AccessPolicy::parse_list(&v)
                .map_err(|e| ServerError::Config(format!("QUILL_REQUIRE_AUTH: {e}")))?;
        }
        Ok(self)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> ServerResult<()> {
        if self.admin.username.trim().is_empty() {
            return Err(ServerError::Config("admin username must not be empty".into()));
        }
        if self.admin.password.is_empty() {
            return Err(ServerError::Config(
                "admin password is not set (QUILL_ADMIN_PASSWORD)".into(),
            ));
        }
        if self.session_secret.is_empty() {
            return Err(ServerError::Config("session secret must not be empty".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(ServerError::Config("max_upload_bytes must be positive".into()));
        }
        Ok(())
    }

    /// A copy safe to print: password and session secret masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.admin.password.is_empty() {
            copy.admin.password = REDACTED.into();
        }
        copy.session_secret = REDACTED.into();
        copy
    }
}

fn parse_var<T>(key: &str, value: &str) -> ServerResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::Config(format!("invalid {key} value {value:?}: {e}")))
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}
