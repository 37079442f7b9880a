//! Configuration for the Warpgate admin connection.

use secrecy::Secret;
use std::env;

use crate::error::ClientError;

const DEFAULT_PORT: u16 = 8888;

/// Connection settings for a single Warpgate instance.
///
/// Built once and handed to [`crate::WarpgateGateway::connect`]; nothing in
/// the workspace reads the environment after this point.
#[derive(Debug, Clone)]
pub struct WarpgateConfig {
    /// Base URL of the instance, e.g. `https://warpgate.internal:8888`.
    pub url: String,
    pub username: String,
    pub password: Secret<String>,
    /// Accept self-signed certificates. Warpgate ships with one by default.
    pub insecure_skip_verify: bool,
}

impl WarpgateConfig {
    /// Load the connection settings from the environment.
    ///
    /// `WARPGATE_URL` wins when set; otherwise the URL is composed from
    /// `WARPGATE_HOST` and `WARPGATE_PORT` (default 8888) over https.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let url = match env::var("WARPGATE_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = env::var("WARPGATE_HOST").map_err(|_| {
                    ClientError::Configuration {
                        message: "WARPGATE_HOST or WARPGATE_URL is required".to_string(),
                    }
                })?;
                let port = match env::var("WARPGATE_PORT") {
                    Ok(raw) => raw.parse::<u16>().map_err(|_| ClientError::Configuration {
                        message: format!("WARPGATE_PORT is not a valid port: {raw}"),
                    })?,
                    Err(_) => DEFAULT_PORT,
                };
                format!("https://{host}:{port}")
            }
        };

        let username =
            env::var("WARPGATE_USERNAME").map_err(|_| ClientError::Configuration {
                message: "WARPGATE_USERNAME is required".to_string(),
            })?;

        let password =
            env::var("WARPGATE_PASSWORD").map_err(|_| ClientError::Configuration {
                message: "WARPGATE_PASSWORD is required".to_string(),
            })?;

        let insecure_skip_verify = env::var("WARPGATE_INSECURE_SKIP_VERIFY")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            url,
            username,
            password: Secret::new(password),
            insecure_skip_verify,
        })
    }
}
