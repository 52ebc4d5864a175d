use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::configuration::tls_settings::TlsSettings;
use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::FixtureServerErrorKind;
use crate::file::static_resources::StaticResources;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub scheme: Scheme,
    #[serde(default = "StaticResources::bundled_root")]
    pub resource_root: PathBuf,
    #[serde(default)]
    pub tls: TlsSettings,
}

impl ServerConfig {
    pub fn http(port: u16) -> Self {
        Self {
            port,
            scheme: Scheme::Http,
            resource_root: StaticResources::bundled_root(),
            tls: TlsSettings::new(),
        }
    }

    pub fn https(port: u16, tls: TlsSettings) -> Self {
        Self {
            port,
            scheme: Scheme::Https,
            resource_root: StaticResources::bundled_root(),
            tls,
        }
    }

    pub fn with_resource_root(mut self, resource_root: impl Into<PathBuf>) -> Self {
        self.resource_root = resource_root.into();
        self
    }

    pub fn from_json(json: &str) -> Result<Self, FixtureServerError> {
        let mut config: ServerConfig = serde_json::from_str(json)
            .map_err(|e| FixtureServerError::new(FixtureServerErrorKind::Configuration(vec![e.to_string()]), "Failed to parse server configuration"))?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        // An empty root means "use the bundled fixtures"
        if self.resource_root.as_os_str().is_empty() {
            self.resource_root = StaticResources::bundled_root();
        }
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !self.resource_root.is_dir() {
            errors.push(format!("Resource root is not a directory: {}", self.resource_root.display()));
        }

        if self.scheme == Scheme::Https {
            if let Err(tls_errors) = self.tls.validate() {
                errors.extend(tls_errors);
            }
        } else if self.tls.needs_client_auth() {
            errors.push("Client certificate authentication requires the https scheme".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
