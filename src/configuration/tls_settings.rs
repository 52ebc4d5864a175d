use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where the server certificate and key come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CertificateSource {
    /// The CA-signed `localhost` certificate shipped in `resources/tls`.
    Bundled,
    /// PEM files on disk.
    Files { cert_path: PathBuf, key_path: PathBuf },
    /// Generated in memory for `localhost` at startup.
    SelfSigned,
}

/// Whether the TLS handshake demands a client certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientAuth {
    None,
    /// Mutual TLS, client certificates must chain to the CA in `ca_path`.
    Required { ca_path: PathBuf },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    pub certificate: CertificateSource,
    pub client_auth: ClientAuth,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsSettings {
    pub fn new() -> Self {
        Self {
            certificate: CertificateSource::Bundled,
            client_auth: ClientAuth::None,
        }
    }

    /// Bundled server certificate, clients must present a certificate signed by the bundled CA.
    pub fn with_client_auth() -> Self {
        Self {
            certificate: CertificateSource::Bundled,
            client_auth: ClientAuth::Required { ca_path: bundled_tls_file(BUNDLED_CA_CERT) },
        }
    }

    pub fn needs_client_auth(&self) -> bool {
        matches!(self.client_auth, ClientAuth::Required { .. })
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let CertificateSource::Files { cert_path, key_path } = &self.certificate {
            if !cert_path.is_file() {
                errors.push(format!("TLS certificate file does not exist: {}", cert_path.display()));
            }
            if !key_path.is_file() {
                errors.push(format!("TLS key file does not exist: {}", key_path.display()));
            }
        }

        if let ClientAuth::Required { ca_path } = &self.client_auth {
            if !ca_path.is_file() {
                errors.push(format!("Client CA file does not exist: {}", ca_path.display()));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

pub const BUNDLED_SERVER_CERT: &str = "server.crt.pem";
pub const BUNDLED_SERVER_KEY: &str = "server.key.pem";
pub const BUNDLED_CA_CERT: &str = "ca.crt.pem";
pub const BUNDLED_CLIENT_CERT: &str = "client.crt.pem";
pub const BUNDLED_CLIENT_KEY: &str = "client.key.pem";

pub fn bundled_tls_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("resources").join("tls")
}

pub fn bundled_tls_file(name: &str) -> PathBuf {
    bundled_tls_dir().join(name)
}
