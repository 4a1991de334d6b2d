use std::{fmt, fs, path::Path};

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::{ConfigDocument, Error, Result};

/// Username and password for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to reach the API server for the current context.
///
/// The byte buffers hold PEM as found in the kubeconfig. They are secrets;
/// the `Debug` impl only reports their length.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthMaterial {
    pub server_url: String,
    pub ca_data: Option<Vec<u8>>,
    pub cert_data: Option<Vec<u8>>,
    pub key_data: Option<Vec<u8>>,
    pub insecure_skip: bool,
    pub token: Option<String>,
    pub basic: Option<BasicAuth>,
}

impl AuthMaterial {
    pub fn has_client_identity(&self) -> bool {
        self.cert_data.is_some() && self.key_data.is_some()
    }

    /// Overwrites and drops the credentials held by this value. Copies made
    /// elsewhere (by TLS backends, say) are not touched.
    pub fn secure_cleanup(&mut self) {
        for buf in [&mut self.ca_data, &mut self.cert_data, &mut self.key_data] {
            if let Some(bytes) = buf.as_mut() {
                bytes.fill(0);
            }
            *buf = None;
        }
        self.token = None;
        self.basic = None;
    }
}

impl fmt::Debug for AuthMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = |buf: &Option<Vec<u8>>| buf.as_ref().map(|b| format!("<{} bytes>", b.len()));
        f.debug_struct("AuthMaterial")
            .field("server_url", &self.server_url)
            .field("ca_data", &len(&self.ca_data))
            .field("cert_data", &len(&self.cert_data))
            .field("key_data", &len(&self.key_data))
            .field("insecure_skip", &self.insecure_skip)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("basic", &self.basic)
            .finish()
    }
}

/// A credential that may be given inline (base64) or as a file path.
struct Source<'a> {
    data_field: &'static str,
    data: Option<&'a str>,
    path_field: &'static str,
    path: Option<&'a Path>,
}

impl Source<'_> {
    /// Inline data wins; a decode failure is fatal rather than a reason to
    /// try the path.
    fn load(&self) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.data.filter(|d| !d.is_empty()) {
            return general_purpose::STANDARD
                .decode(data.trim())
                .map(Some)
                .map_err(|source| Error::CredentialDecodeError {
                    field: self.data_field,
                    source,
                });
        }

        match self.path.filter(|p| !p.as_os_str().is_empty()) {
            Some(path) => fs::read(path)
                .map(Some)
                .map_err(|source| Error::CredentialReadError {
                    field: self.path_field,
                    path: path.to_path_buf(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

/// Resolves the current context of `doc` and gathers its credentials.
pub fn extract_auth(doc: &ConfigDocument) -> Result<AuthMaterial> {
    let context = doc
        .context(&doc.current_context)
        .ok_or_else(|| Error::ContextMissing {
            name: doc.current_context.clone(),
        })?;

    let cluster_name = &context.context.cluster;
    let cluster = &doc
        .cluster(cluster_name)
        .ok_or_else(|| Error::ClusterMissing {
            name: cluster_name.clone(),
        })?
        .cluster;

    let user_name = &context.context.user;
    let user = &doc
        .user(user_name)
        .ok_or_else(|| Error::UserMissing {
            name: user_name.clone(),
        })?
        .user;

    let ca_data = Source {
        data_field: "certificate-authority-data",
        data: cluster.certificate_authority_data.as_deref(),
        path_field: "certificate-authority",
        path: cluster.certificate_authority.as_deref(),
    }
    .load()?;
    let cert_data = Source {
        data_field: "client-certificate-data",
        data: user.client_certificate_data.as_deref(),
        path_field: "client-certificate",
        path: user.client_certificate.as_deref(),
    }
    .load()?;
    let key_data = Source {
        data_field: "client-key-data",
        data: user.client_key_data.as_deref(),
        path_field: "client-key",
        path: user.client_key.as_deref(),
    }
    .load()?;

    let basic = match (&user.username, &user.password) {
        (Some(username), Some(password)) => Some(BasicAuth {
            username: username.clone(),
            password: password.clone(),
        }),
        _ => None,
    };

    let auth = AuthMaterial {
        server_url: cluster.server.clone(),
        ca_data,
        cert_data,
        key_data,
        insecure_skip: cluster.insecure_skip_tls_verify.unwrap_or(false),
        token: user.token.clone().filter(|t| !t.is_empty()),
        basic,
    };

    debug!(
        context = %doc.current_context,
        cluster = %cluster_name,
        user = %user_name,
        server = %auth.server_url,
        "resolved kubeconfig credentials"
    );

    Ok(auth)
}
