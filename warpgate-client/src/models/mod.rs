//! Domain models for Warpgate administrative objects.
//!
//! The admin API transports its polymorphic payloads as flat tagged objects;
//! that shape is confined to [`crate::wire`]. The enums here make an invalid
//! "two active variants" state unrepresentable for the rest of the workspace.

#![allow(clippy::should_implement_trait)]

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{Validate, ValidationErrors};

/// IPv4 address or hostname, the same shape the gateway accepts.
static HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)(\.(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)){3})$|^((([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9]))$",
    )
    .expect("host pattern is a valid regex")
});

// ============================================================================
// Target Options
// ============================================================================

/// Connection options of a target, one variant per protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOptions {
    Ssh(SshOptions),
    Http(HttpOptions),
}

impl TargetOptions {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ssh(_) => "Ssh",
            Self::Http(_) => "Http",
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::Ssh(options) => options.validate(),
            Self::Http(options) => options.validate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct SshOptions {
    #[validate(regex(path = *HOST_PATTERN))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub username: String,
    pub auth: SshAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct HttpOptions {
    #[validate(url)]
    pub url: String,
    pub external_host: Option<String>,
    /// `None` means the headers attribute is absent on the wire; `Some` sends
    /// it explicitly, even when the map is empty. The two are not the same
    /// record remotely.
    pub headers: Option<HashMap<String, String>>,
    pub tls: Tls,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tls {
    pub mode: TlsMode,
    pub verify: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    Disabled,
    Preferred,
    Required,
}

impl TlsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Preferred => "Preferred",
            Self::Required => "Required",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Disabled" => Some(Self::Disabled),
            "Preferred" => Some(Self::Preferred),
            "Required" => Some(Self::Required),
            _ => None,
        }
    }
}

// ============================================================================
// SSH Authentication
// ============================================================================

/// How Warpgate authenticates against the target host.
#[derive(Clone, PartialEq, Eq)]
pub enum SshAuth {
    Password { password: String },
    PublicKey,
}

impl SshAuth {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "Password",
            Self::PublicKey => "PublicKey",
        }
    }
}

// The password must never reach logs, so Debug is written by hand.
impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { .. } => f
                .debug_struct("Password")
                .field("password", &"<redacted>")
                .finish(),
            Self::PublicKey => f.write_str("PublicKey"),
        }
    }
}

// ============================================================================
// User Credentials
// ============================================================================

/// A single credential attached to a user. A user may carry several at once.
#[derive(Clone, PartialEq, Eq)]
pub enum UserCredential {
    Password { hash: String },
    PublicKey { key: String },
    Sso { email: String, provider: Option<String> },
    Totp { key: Vec<u8> },
}

impl UserCredential {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Password { .. } => "Password",
            Self::PublicKey { .. } => "PublicKey",
            Self::Sso { .. } => "Sso",
            Self::Totp { .. } => "Totp",
        }
    }
}

impl fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { .. } => f
                .debug_struct("Password")
                .field("hash", &"<redacted>")
                .finish(),
            Self::PublicKey { key } => f.debug_struct("PublicKey").field("key", key).finish(),
            Self::Sso { email, provider } => f
                .debug_struct("Sso")
                .field("email", email)
                .field("provider", provider)
                .finish(),
            Self::Totp { key } => f
                .debug_struct("Totp")
                .field("key_len", &key.len())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_options(host: &str, port: u16) -> SshOptions {
        SshOptions {
            host: host.to_string(),
            port,
            username: "root".to_string(),
            auth: SshAuth::PublicKey,
        }
    }

    #[test]
    fn host_accepts_ipv4_and_hostnames() {
        assert!(ssh_options("10.10.10.10", 22).validate().is_ok());
        assert!(ssh_options("bastion.internal.example.com", 22).validate().is_ok());
    }

    #[test]
    fn host_rejects_malformed_names() {
        assert!(ssh_options("-leading.dash", 22).validate().is_err());
        assert!(ssh_options("under_score.host", 22).validate().is_err());
        assert!(ssh_options("spaces are bad", 22).validate().is_err());
    }

    #[test]
    fn port_zero_is_rejected() {
        assert!(ssh_options("10.10.10.10", 0).validate().is_err());
    }

    #[test]
    fn http_url_must_be_well_formed() {
        let options = HttpOptions {
            url: "not a url".to_string(),
            external_host: None,
            headers: None,
            tls: Tls {
                mode: TlsMode::Required,
                verify: true,
            },
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn debug_never_shows_secrets() {
        let auth = SshAuth::Password {
            password: "A12345678".to_string(),
        };
        let printed = format!("{auth:?}");
        assert!(!printed.contains("A12345678"));

        let credential = UserCredential::Totp {
            key: vec![1, 2, 3],
        };
        let printed = format!("{credential:?}");
        assert!(!printed.contains('['));
    }
}
