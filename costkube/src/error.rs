use std::{io, path::PathBuf};

/// Everything that can go wrong between locating a kubeconfig and handing
/// back a configured client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no kubeconfig found{}", describe_path(.path))]
    ConfigNotFound { path: Option<PathBuf> },
    #[error("failed to read kubeconfig {}: {source}", .path.display())]
    ConfigUnreadable { path: PathBuf, source: io::Error },
    #[error("failed to parse kubeconfig {}: {source}", .path.display())]
    ConfigParseError {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("current context not found: {name}")]
    ContextMissing { name: String },
    #[error("cluster not found: {name}")]
    ClusterMissing { name: String },
    #[error("user not found: {name}")]
    UserMissing { name: String },
    #[error("failed to decode {field}: {source}")]
    CredentialDecodeError {
        field: &'static str,
        source: base64::DecodeError,
    },
    #[error("failed to read {field} file {}: {source}", .path.display())]
    CredentialReadError {
        field: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("{field} cannot be sent as an HTTP header")]
    InvalidCredential { field: &'static str },
    #[error("invalid TLS configuration: {reason}")]
    TlsConfigError { reason: String },
}

impl Error {
    pub(crate) fn tls(reason: &str, source: reqwest::Error) -> Self {
        Self::TlsConfigError {
            reason: format!("{reason}: {source}"),
        }
    }

    /// The kubeconfig field name a credential error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Error::CredentialDecodeError { field, .. } | Error::CredentialReadError { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }
}

fn describe_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" at {}", path.display()),
        None => " in default locations".to_string(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
