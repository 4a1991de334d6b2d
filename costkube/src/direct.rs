use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Deserializer};
use serde_yaml::Value as YamlValue;

use crate::{Error, Result};

/// How long a freshly parsed document stays valid in the cache.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

// region: Context
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    pub namespace: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub name: String,
    pub context: ContextInfo,
}
// endregion

// region: Cluster
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterInfo {
    #[serde(default)]
    pub server: String,
    pub certificate_authority_data: Option<String>,
    pub certificate_authority: Option<PathBuf>,
    pub insecure_skip_tls_verify: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClusterEntry {
    pub name: String,
    pub cluster: ClusterInfo,
}
// endregion

// region: User
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct UserInfo {
    pub client_certificate_data: Option<String>,
    pub client_key_data: Option<String>,
    pub client_certificate: Option<PathBuf>,
    pub client_key: Option<PathBuf>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn redacted<T>(value: &Option<T>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("client_certificate_data", &redacted(&self.client_certificate_data))
            .field("client_key_data", &redacted(&self.client_key_data))
            .field("client_certificate", &self.client_certificate)
            .field("client_key", &self.client_key)
            .field("token", &redacted(&self.token))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub user: UserInfo,
}
// endregion

// region: Common

/// Last time a document was handed out by the cache, in nanoseconds since
/// the unix epoch. Writable through a shared reference so cache readers can
/// stamp it while only holding the read lock.
#[derive(Debug, Default)]
pub struct LastAccessed(AtomicU64);

impl LastAccessed {
    fn at(time: SystemTime) -> Self {
        Self(AtomicU64::new(epoch_nanos(time)))
    }

    pub fn get(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_nanos(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, time: SystemTime) {
        self.0.store(epoch_nanos(time), Ordering::Relaxed);
    }
}

impl Clone for LastAccessed {
    fn clone(&self) -> Self {
        Self(AtomicU64::new(self.0.load(Ordering::Relaxed)))
    }
}

fn epoch_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// kubectl writes `clusters: null` and friends for empty sections.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn now_plus_ttl() -> SystemTime {
    SystemTime::now() + DEFAULT_TTL
}

fn now_stamp() -> LastAccessed {
    LastAccessed::at(SystemTime::now())
}

/// A parsed kubeconfig. Referential integrity between contexts, clusters
/// and users is not checked here; see [`crate::extract_auth`].
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigDocument {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clusters: Vec<ClusterEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<UserEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<ContextEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_context: String,
    #[serde(default)]
    pub preferences: YamlValue,

    #[serde(skip, default = "now_stamp")]
    pub last_accessed: LastAccessed,
    /// Instant after which the cache stops handing this document out.
    #[serde(skip, default = "now_plus_ttl")]
    pub expires_at: SystemTime,
}

impl ConfigDocument {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Reads and parses the file at `path` without any location fallback.
    pub fn read_from(path: impl AsRef<Path>) -> Result<ConfigDocument> {
        let path = path.as_ref();
        let file = fs::OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => Error::ConfigNotFound {
                    path: Some(path.to_path_buf()),
                },
                _ => Error::ConfigUnreadable {
                    path: path.to_path_buf(),
                    source,
                },
            })?;
        // Read up front so io failures (a directory, say) are not reported
        // as YAML errors.
        let contents = io::read_to_string(file).map_err(|source| Error::ConfigUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents).map_err(|source| Error::ConfigParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn context(&self, name: &str) -> Option<&ContextEntry> {
        self.contexts.iter().find(|ctx| ctx.name == name)
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterEntry> {
        self.clusters.iter().find(|cls| cls.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&UserEntry> {
        self.users.iter().find(|usr| usr.name == name)
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}
// endregion
