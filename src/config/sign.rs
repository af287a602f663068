//! Signing configuration
//!
//! The pipeline never looks inside these values; they are handed to the
//! toolkit as a `SigningIdentity`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use webstart_jar::{KeystoreRequest, SigningIdentity};

use super::ConfigError;

/// Distinguished-name fields used when generating a key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dname {
    pub cn: Option<String>,
    pub ou: Option<String>,
    pub o: Option<String>,
    pub l: Option<String>,
    pub st: Option<String>,
    pub c: Option<String>,
}

impl Dname {
    /// Render as an X.500 name, e.g. `CN=Example, O=Example Corp, C=US`
    pub fn to_dname_string(&self) -> String {
        let fields = [
            ("CN", &self.cn),
            ("OU", &self.ou),
            ("O", &self.o),
            ("L", &self.l),
            ("ST", &self.st),
            ("C", &self.c),
        ];
        fields
            .iter()
            .filter_map(|(tag, value)| {
                value
                    .as_deref()
                    .map(|v| format!("{tag}={}", v.replace(',', "\\,")))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_empty(&self) -> bool {
        self.to_dname_string().is_empty()
    }
}

/// Keystore generation switches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Generate a key pair before processing
    pub generate: bool,
    /// Remove an existing keystore before generating
    pub delete: bool,
}

fn default_key_alg() -> String {
    "RSA".to_string()
}

fn default_key_size() -> u32 {
    2048
}

fn default_validity() -> u32 {
    365
}

/// `[sign]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignConfig {
    pub keystore: PathBuf,
    pub alias: String,
    pub storepass: String,
    #[serde(default)]
    pub keypass: Option<String>,
    #[serde(default)]
    pub storetype: Option<String>,
    #[serde(default)]
    pub tsa_url: Option<String>,
    /// Verify each jar after signing
    #[serde(default)]
    pub verify: bool,
    #[serde(default)]
    pub dname: Dname,
    #[serde(default)]
    pub keystore_config: KeystoreConfig,
    #[serde(default = "default_key_alg")]
    pub key_alg: String,
    #[serde(default = "default_key_size")]
    pub key_size: u32,
    #[serde(default = "default_validity")]
    pub validity_days: u32,
}

impl SignConfig {
    /// Validate the section
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keystore.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "sign.keystore must not be empty".to_string(),
            ));
        }
        if self.alias.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sign.alias must not be empty".to_string(),
            ));
        }
        if self.keystore_config.generate && self.dname.is_empty() {
            return Err(ConfigError::ValidationError(
                "sign.dname is required to generate a keystore".to_string(),
            ));
        }
        Ok(())
    }

    /// Identity handed to the toolkit
    pub fn identity(&self) -> SigningIdentity {
        SigningIdentity {
            keystore: self.keystore.clone(),
            alias: self.alias.clone(),
            storepass: self.storepass.clone(),
            keypass: self.keypass.clone(),
            storetype: self.storetype.clone(),
            tsa_url: self.tsa_url.clone(),
        }
    }

    /// Key generation request, when generation is configured
    pub fn keystore_request(&self) -> Option<KeystoreRequest> {
        if !self.keystore_config.generate {
            return None;
        }
        Some(KeystoreRequest {
            identity: self.identity(),
            dname: self.dname.to_dname_string(),
            key_alg: self.key_alg.clone(),
            key_size: self.key_size,
            validity_days: self.validity_days,
            delete_existing: self.keystore_config.delete,
        })
    }
}
