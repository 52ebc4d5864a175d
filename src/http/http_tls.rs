use log::debug;
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tls_listener::rustls as tokio_rustls;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig as RustlsServerConfig};

use crate::configuration::tls_settings::{BUNDLED_SERVER_CERT, BUNDLED_SERVER_KEY, CertificateSource, ClientAuth, TlsSettings, bundled_tls_file};
use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::TlsError;

pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(aws_lc_rs::default_provider())
}

/// Reads every certificate from a PEM file.
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, FixtureServerError> {
    let file = std::fs::File::open(path).map_err(|e| FixtureServerError::tls(TlsError::Io(e), format!("Failed to open TLS cert file {}", path.display())))?;
    let mut reader = BufReader::new(file);

    let certs: Result<Vec<CertificateDer<'static>>, _> = rustls_pemfile::certs(&mut reader).collect();
    let certs = certs.map_err(|e| FixtureServerError::tls(TlsError::Io(e), format!("Failed to parse TLS cert file {}", path.display())))?;
    if certs.is_empty() {
        return Err(FixtureServerError::tls(TlsError::NoCertificates, format!("No certificates found in {}", path.display())));
    }
    Ok(certs)
}

/// Reads the first private key (PKCS#8, PKCS#1 or SEC1) from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, FixtureServerError> {
    let file = std::fs::File::open(path).map_err(|e| FixtureServerError::tls(TlsError::Io(e), format!("Failed to open TLS key file {}", path.display())))?;
    let mut reader = BufReader::new(file);

    let key = rustls_pemfile::private_key(&mut reader).map_err(|e| FixtureServerError::tls(TlsError::Io(e), format!("Failed to parse TLS key file {}", path.display())))?;
    key.ok_or_else(|| FixtureServerError::tls(TlsError::NoPrivateKey, format!("No private key found in {}", path.display())))
}

fn load_key_material(source: &CertificateSource) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), FixtureServerError> {
    match source {
        CertificateSource::Bundled => Ok((load_certificates(&bundled_tls_file(BUNDLED_SERVER_CERT))?, load_private_key(&bundled_tls_file(BUNDLED_SERVER_KEY))?)),
        CertificateSource::Files { cert_path, key_path } => Ok((load_certificates(cert_path)?, load_private_key(key_path)?)),
        CertificateSource::SelfSigned => {
            debug!("Generating self-signed certificate for localhost");
            let rcgen::CertifiedKey { cert, signing_key } = rcgen::generate_simple_self_signed(vec!["localhost".to_string(), "127.0.0.1".to_string()])
                .map_err(|e| FixtureServerError::tls(TlsError::Generation, format!("Failed to generate self-signed cert: {}", e)))?;
            let cert_der = CertificateDer::from(cert.der().to_vec());
            let key_der = PrivateKeyDer::try_from(signing_key.serialize_der())
                .map_err(|e| FixtureServerError::tls(TlsError::Generation, format!("Invalid key DER: {}", e)))?;
            Ok((vec![cert_der], key_der))
        }
    }
}

// Build the TLS acceptor for the https variant of the server. Everything that
// can go wrong here is fatal for server construction.
pub fn build_tls_acceptor(settings: &TlsSettings) -> Result<TlsAcceptor, FixtureServerError> {
    let provider = crypto_provider();
    let (cert_chain, private_key) = load_key_material(&settings.certificate)?;

    let builder = RustlsServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| FixtureServerError::tls(TlsError::Rustls, format!("Protocol versions unavailable: {}", e)))?;

    let builder = match &settings.client_auth {
        ClientAuth::None => builder.with_no_client_auth(),
        ClientAuth::Required { ca_path } => {
            let mut roots = RootCertStore::empty();
            for ca_cert in load_certificates(ca_path)? {
                roots
                    .add(ca_cert)
                    .map_err(|e| FixtureServerError::tls(TlsError::Rustls, format!("Invalid client CA certificate in {}: {}", ca_path.display(), e)))?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .map_err(|e| FixtureServerError::tls(TlsError::Rustls, format!("Failed to build client certificate verifier: {}", e)))?;
            builder.with_client_cert_verifier(verifier)
        }
    };

    let mut server_config = builder
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| FixtureServerError::tls(TlsError::Rustls, format!("Certificate and key rejected: {}", e)))?;

    // No HTTP/2 on the fixture server
    server_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::fixture_error_enums::FixtureServerErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_bundled_acceptor_builds() {
        assert!(build_tls_acceptor(&TlsSettings::new()).is_ok());
    }

    #[test]
    fn test_client_auth_acceptor_builds() {
        assert!(build_tls_acceptor(&TlsSettings::with_client_auth()).is_ok());
    }

    #[test]
    fn test_self_signed_acceptor_builds() {
        let settings = TlsSettings {
            certificate: CertificateSource::SelfSigned,
            client_auth: ClientAuth::None,
        };
        assert!(build_tls_acceptor(&settings).is_ok());
    }

    #[test]
    fn test_missing_key_material_is_a_tls_error() {
        let settings = TlsSettings {
            certificate: CertificateSource::Files {
                cert_path: PathBuf::from("/nonexistent/server.crt.pem"),
                key_path: PathBuf::from("/nonexistent/server.key.pem"),
            },
            client_auth: ClientAuth::None,
        };
        let error = match build_tls_acceptor(&settings) {
            Ok(_) => panic!("expected a TLS error"),
            Err(e) => e,
        };
        assert!(matches!(error.kind, FixtureServerErrorKind::Tls(TlsError::Io(_))));
    }

    #[test]
    fn test_key_file_without_key_is_rejected() {
        // A certificate file contains no private key
        let error = load_private_key(&bundled_tls_file(BUNDLED_SERVER_CERT)).unwrap_err();
        assert!(matches!(error.kind, FixtureServerErrorKind::Tls(TlsError::NoPrivateKey)));
    }
}
