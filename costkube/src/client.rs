use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Certificate, Identity,
};
use tracing::{debug, warn};

use crate::{extract_auth, load_cached, AuthMaterial, ConfigDocument, Error, Result};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// How the server's certificate will be checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// `insecure-skip-tls-verify` was set; nothing is verified.
    Insecure,
    /// Only the kubeconfig's certificate authority is trusted.
    CustomCa { certificates: usize },
    /// No CA was configured; the bundled root store is used.
    BuiltInRoots,
}

/// A blocking HTTP client bound to `{server}{proxy path}`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    tls: TlsMode,
    client_identity: bool,
    inner: Client,
}

impl HttpClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tls(&self) -> TlsMode {
        self.tls
    }

    /// Whether a client certificate is presented for mutual TLS.
    pub fn has_client_identity(&self) -> bool {
        self.client_identity
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// Appends `path` to the base URL verbatim.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.inner.get(self.url(path))
    }
}

/// Builds a client from a kubeconfig (the default one when `path` is `None`),
/// addressing `proxy_path_suffix` on the API server. The suffix is used as
/// given; no slashes are added or removed.
pub fn new_client(path: Option<&Path>, proxy_path_suffix: Option<&str>) -> Result<HttpClient> {
    let doc = load_cached(path)?;
    client_from_document(&doc, proxy_path_suffix)
}

pub fn client_from_document(
    doc: &ConfigDocument,
    proxy_path_suffix: Option<&str>,
) -> Result<HttpClient> {
    let mut auth = extract_auth(doc)?;
    let client = client_from_auth(&auth, proxy_path_suffix);
    auth.secure_cleanup();
    client
}

pub fn client_from_auth(auth: &AuthMaterial, proxy_path_suffix: Option<&str>) -> Result<HttpClient> {
    let base_url = format!("{}{}", auth.server_url, proxy_path_suffix.unwrap_or_default());

    let mut builder = Client::builder().user_agent(USER_AGENT);

    let tls = if auth.insecure_skip {
        if auth.ca_data.is_some() {
            debug!("ignoring certificate-authority: insecure-skip-tls-verify is set");
        }
        warn!(server = %auth.server_url, "TLS certificate verification is disabled");
        builder = builder.danger_accept_invalid_certs(true);
        TlsMode::Insecure
    } else if let Some(ca) = &auth.ca_data {
        let certs = Certificate::from_pem_bundle(ca)
            .map_err(|e| Error::tls("invalid certificate authority", e))?;
        if certs.is_empty() {
            return Err(Error::TlsConfigError {
                reason: "certificate authority contains no PEM certificates".to_string(),
            });
        }
        let certificates = certs.len();
        builder = builder.tls_built_in_root_certs(false);
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
        TlsMode::CustomCa { certificates }
    } else {
        TlsMode::BuiltInRoots
    };

    let client_identity = match (&auth.cert_data, &auth.key_data) {
        (Some(cert), Some(key)) => {
            builder = builder.identity(identity(cert, key)?);
            true
        }
        _ => false,
    };

    if let Some(headers) = auth_headers(auth)? {
        builder = builder.default_headers(headers);
    }

    let inner = builder
        .build()
        .map_err(|e| Error::tls("failed to build HTTP client", e))?;

    debug!(%base_url, ?tls, client_identity, "built kubeconfig client");

    Ok(HttpClient {
        base_url,
        tls,
        client_identity,
        inner,
    })
}

fn identity(cert: &[u8], key: &[u8]) -> Result<Identity> {
    let mut pem = Vec::with_capacity(cert.len() + key.len() + 1);
    pem.extend_from_slice(cert);
    if !pem.ends_with(b"\n") {
        pem.push(b'\n');
    }
    pem.extend_from_slice(key);

    let identity = Identity::from_pem(&pem).map_err(|e| Error::tls("invalid client certificate or key", e));
    pem.fill(0);
    identity
}

/// A bearer token takes precedence over basic credentials.
fn auth_headers(auth: &AuthMaterial) -> Result<Option<HeaderMap>> {
    let value = match (&auth.token, &auth.basic) {
        (Some(token), _) => format!("Bearer {token}"),
        (None, Some(basic)) => {
            let pair = format!("{}:{}", basic.username, basic.password);
            format!("Basic {}", general_purpose::STANDARD.encode(pair))
        }
        (None, None) => return Ok(None),
    };

    let mut value = HeaderValue::from_str(&value).map_err(|_| Error::InvalidCredential {
        field: if auth.token.is_some() { "token" } else { "username" },
    })?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(Some(headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BasicAuth;

    const CA: &[u8] = include_bytes!("../tests/fixtures/ca.crt");
    const CERT: &[u8] = include_bytes!("../tests/fixtures/client.crt");
    const KEY: &[u8] = include_bytes!("../tests/fixtures/client.key");

    fn auth() -> AuthMaterial {
        AuthMaterial {
            server_url: "https://api.example:6443".into(),
            ca_data: None,
            cert_data: None,
            key_data: None,
            insecure_skip: false,
            token: None,
            basic: None,
        }
    }

    #[test]
    fn suffix_is_appended_verbatim() {
        let client = client_from_auth(&auth(), Some("proxy//x/")).unwrap();
        assert_eq!(client.base_url(), "https://api.example:6443proxy//x/");
        assert_eq!(client.url("/cost"), "https://api.example:6443proxy//x//cost");

        let client = client_from_auth(&auth(), None).unwrap();
        assert_eq!(client.base_url(), "https://api.example:6443");
        assert_eq!(client.tls(), TlsMode::BuiltInRoots);
        assert!(!client.has_client_identity());
    }

    #[test]
    fn custom_ca_replaces_the_root_store() {
        let client = client_from_auth(
            &AuthMaterial {
                ca_data: Some(CA.to_vec()),
                ..auth()
            },
            None,
        )
        .unwrap();
        assert_eq!(client.tls(), TlsMode::CustomCa { certificates: 1 });
    }

    #[test]
    fn ca_without_certificates_is_rejected() {
        let err = client_from_auth(
            &AuthMaterial {
                ca_data: Some(b"not a certificate".to_vec()),
                ..auth()
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::TlsConfigError { .. }));
    }

    #[test]
    fn insecure_skip_ignores_broken_ca() {
        let client = client_from_auth(
            &AuthMaterial {
                ca_data: Some(b"not a certificate".to_vec()),
                insecure_skip: true,
                ..auth()
            },
            None,
        )
        .unwrap();
        assert_eq!(client.tls(), TlsMode::Insecure);
    }

    #[test]
    fn identity_needs_both_halves() {
        let client = client_from_auth(
            &AuthMaterial {
                cert_data: Some(CERT.to_vec()),
                ..auth()
            },
            None,
        )
        .unwrap();
        assert!(!client.has_client_identity());

        let client = client_from_auth(
            &AuthMaterial {
                cert_data: Some(CERT.to_vec()),
                key_data: Some(KEY.to_vec()),
                ..auth()
            },
            None,
        )
        .unwrap();
        assert!(client.has_client_identity());
    }

    #[test]
    fn garbage_key_is_a_tls_error() {
        let err = client_from_auth(
            &AuthMaterial {
                cert_data: Some(CERT.to_vec()),
                key_data: Some(b"garbage".to_vec()),
                ..auth()
            },
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::TlsConfigError { .. }));
    }

    #[test]
    fn token_wins_over_basic_and_is_sensitive() {
        let headers = auth_headers(&AuthMaterial {
            token: Some("abc".into()),
            basic: Some(BasicAuth {
                username: "u".into(),
                password: "p".into(),
            }),
            ..auth()
        })
        .unwrap()
        .unwrap();
        let value = &headers[AUTHORIZATION];
        assert_eq!(value, "Bearer abc");
        assert!(value.is_sensitive());
    }

    #[test]
    fn basic_credentials_are_encoded() {
        let headers = auth_headers(&AuthMaterial {
            basic: Some(BasicAuth {
                username: "admin".into(),
                password: "secret".into(),
            }),
            ..auth()
        })
        .unwrap()
        .unwrap();
        assert_eq!(headers[AUTHORIZATION], "Basic YWRtaW46c2VjcmV0");
    }

    #[test]
    fn no_credentials_no_header() {
        assert!(auth_headers(&auth()).unwrap().is_none());
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = auth_headers(&AuthMaterial {
            token: Some("abc\ndef".into()),
            ..auth()
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCredential { field: "token" }));
    }
}
