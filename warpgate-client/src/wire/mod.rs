//! Flat wire records for the admin API and their domain conversions.
//!
//! Every polymorphic payload travels as a JSON object whose active shape is
//! selected by a `kind` discriminator, with the remaining fields mutually
//! exclusive. The records here keep all variant fields optional and serialize
//! only the populated ones; `TryFrom` projects a record onto the matching
//! domain enum and rejects records that do not satisfy the selected variant.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    HttpOptions, SshAuth, SshOptions, TargetOptions, Tls, TlsMode, UserCredential,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown {record} kind '{kind}'")]
    UnknownVariant { record: &'static str, kind: String },

    #[error("{record} of kind '{kind}' is missing field '{field}'")]
    MissingField {
        record: &'static str,
        kind: &'static str,
        field: &'static str,
    },

    #[error("{record} field '{field}' holds out-of-range value {value}")]
    OutOfRangeValue {
        record: &'static str,
        field: &'static str,
        value: String,
    },
}

fn require<T>(
    value: Option<T>,
    record: &'static str,
    kind: &'static str,
    field: &'static str,
) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField {
        record,
        kind,
        field,
    })
}

// ============================================================================
// Target options
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetOptionsRecord {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<SshAuthRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshAuthRecord {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsRecord {
    pub mode: String,
    pub verify: bool,
}

impl From<&TargetOptions> for TargetOptionsRecord {
    fn from(options: &TargetOptions) -> Self {
        match options {
            TargetOptions::Ssh(ssh) => Self {
                kind: "Ssh".to_string(),
                host: Some(ssh.host.clone()),
                port: Some(i64::from(ssh.port)),
                username: Some(ssh.username.clone()),
                auth: Some(SshAuthRecord::from(&ssh.auth)),
                ..Self::default()
            },
            TargetOptions::Http(http) => Self {
                kind: "Http".to_string(),
                url: Some(http.url.clone()),
                external_host: http.external_host.clone(),
                headers: http.headers.clone(),
                tls: Some(TlsRecord {
                    mode: http.tls.mode.as_str().to_string(),
                    verify: http.tls.verify,
                }),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<TargetOptionsRecord> for TargetOptions {
    type Error = DecodeError;

    fn try_from(record: TargetOptionsRecord) -> Result<Self, DecodeError> {
        const RECORD: &str = "target options";

        match record.kind.as_str() {
            "Ssh" => {
                let port = require(record.port, RECORD, "Ssh", "port")?;
                let port =
                    u16::try_from(port)
                        .ok()
                        .filter(|p| *p >= 1)
                        .ok_or(DecodeError::OutOfRangeValue {
                            record: RECORD,
                            field: "port",
                            value: port.to_string(),
                        })?;
                Ok(Self::Ssh(SshOptions {
                    host: require(record.host, RECORD, "Ssh", "host")?,
                    port,
                    username: require(record.username, RECORD, "Ssh", "username")?,
                    auth: SshAuth::try_from(require(record.auth, RECORD, "Ssh", "auth")?)?,
                }))
            }
            "Http" => {
                let tls = require(record.tls, RECORD, "Http", "tls")?;
                let mode =
                    TlsMode::from_str(&tls.mode).ok_or_else(|| DecodeError::UnknownVariant {
                        record: "tls mode",
                        kind: tls.mode.clone(),
                    })?;
                Ok(Self::Http(HttpOptions {
                    url: require(record.url, RECORD, "Http", "url")?,
                    external_host: record.external_host,
                    headers: record.headers,
                    tls: Tls {
                        mode,
                        verify: tls.verify,
                    },
                }))
            }
            other => Err(DecodeError::UnknownVariant {
                record: RECORD,
                kind: other.to_string(),
            }),
        }
    }
}

impl From<&SshAuth> for SshAuthRecord {
    fn from(auth: &SshAuth) -> Self {
        match auth {
            SshAuth::Password { password } => Self {
                kind: "Password".to_string(),
                password: Some(password.clone()),
            },
            // No password field, ever: a stale secret must not round-trip.
            SshAuth::PublicKey => Self {
                kind: "PublicKey".to_string(),
                password: None,
            },
        }
    }
}

impl TryFrom<SshAuthRecord> for SshAuth {
    type Error = DecodeError;

    fn try_from(record: SshAuthRecord) -> Result<Self, DecodeError> {
        const RECORD: &str = "ssh auth";

        match record.kind.as_str() {
            "Password" => Ok(Self::Password {
                password: require(record.password, RECORD, "Password", "password")?,
            }),
            "PublicKey" => Ok(Self::PublicKey),
            other => Err(DecodeError::UnknownVariant {
                record: RECORD,
                kind: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// User credentials
// ============================================================================

/// `key` carries a string for `PublicKey` and an array of byte values for
/// `Totp`, so it stays a raw JSON value until the discriminator is known.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCredentialRecord {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,
}

impl From<&UserCredential> for UserCredentialRecord {
    fn from(credential: &UserCredential) -> Self {
        match credential {
            UserCredential::Password { hash } => Self {
                kind: "Password".to_string(),
                hash: Some(hash.clone()),
                ..Self::default()
            },
            UserCredential::PublicKey { key } => Self {
                kind: "PublicKey".to_string(),
                key: Some(Value::String(key.clone())),
                ..Self::default()
            },
            UserCredential::Sso { email, provider } => Self {
                kind: "Sso".to_string(),
                email: Some(email.clone()),
                provider: provider.clone(),
                ..Self::default()
            },
            UserCredential::Totp { key } => Self {
                kind: "Totp".to_string(),
                key: Some(Value::Array(
                    key.iter().map(|byte| Value::from(*byte)).collect(),
                )),
                ..Self::default()
            },
        }
    }
}

impl TryFrom<UserCredentialRecord> for UserCredential {
    type Error = DecodeError;

    fn try_from(record: UserCredentialRecord) -> Result<Self, DecodeError> {
        const RECORD: &str = "user credential";

        match record.kind.as_str() {
            "Password" => Ok(Self::Password {
                hash: require(record.hash, RECORD, "Password", "hash")?,
            }),
            "PublicKey" => {
                let key = require(record.key, RECORD, "PublicKey", "key")?;
                let key = key
                    .as_str()
                    .ok_or(DecodeError::MissingField {
                        record: RECORD,
                        kind: "PublicKey",
                        field: "key",
                    })?
                    .to_string();
                Ok(Self::PublicKey { key })
            }
            "Sso" => Ok(Self::Sso {
                email: require(record.email, RECORD, "Sso", "email")?,
                provider: record.provider,
            }),
            "Totp" => {
                let key = require(record.key, RECORD, "Totp", "key")?;
                let elements = key.as_array().ok_or(DecodeError::MissingField {
                    record: RECORD,
                    kind: "Totp",
                    field: "key",
                })?;
                let mut bytes = Vec::with_capacity(elements.len());
                for element in elements {
                    let byte = element
                        .as_u64()
                        .filter(|v| *v <= u64::from(u8::MAX))
                        .ok_or_else(|| DecodeError::OutOfRangeValue {
                            record: RECORD,
                            field: "key",
                            value: element.to_string(),
                        })?;
                    bytes.push(byte as u8);
                }
                Ok(Self::Totp { key: bytes })
            }
            other => Err(DecodeError::UnknownVariant {
                record: RECORD,
                kind: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Entity records
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub allow_roles: Vec<String>,
    pub options: TargetOptionsRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDataRequest {
    pub name: String,
    pub options: TargetOptionsRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDataRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub credentials: Vec<UserCredentialRecord>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDataRequest {
    pub username: String,
    pub credentials: Vec<UserCredentialRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyRecord {
    pub kind: String,
    pub public_key_base64: String,
}
