use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureServerErrorKind {
    #[error("failed to bind listener")]
    Bind(#[source] std::io::Error),
    #[error("TLS setup failed")]
    Tls(TlsError),
    #[error("invalid configuration")]
    Configuration(Vec<String>),
    #[error("request await was cancelled before a matching request arrived")]
    AwaitCancelled,
    #[error("multipart decoding failed")]
    Multipart(MultipartError),
    #[error("fixture resource could not be read")]
    Resource(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read key material")]
    Io(#[source] std::io::Error),
    #[error("no certificates found")]
    NoCertificates,
    #[error("no private key found")]
    NoPrivateKey,
    #[error("certificate generation failed")]
    Generation,
    #[error("rustls rejected the configuration")]
    Rustls,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultipartError {
    #[error("content type carries no boundary parameter")]
    MissingBoundary,
    #[error("part {0} has no blank line between headers and content")]
    MissingSeparator(usize),
}
