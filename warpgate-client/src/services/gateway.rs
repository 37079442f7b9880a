//! Session-authenticated access to the Warpgate admin API.
//!
//! One gateway per configured instance; it is cheap to clone and safe to
//! share across entities. Callers serialize operations per declared entity
//! themselves. Every verb takes a cancellation token and aborts promptly
//! instead of finishing the call when the token fires.

use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::WarpgateConfig;
use crate::error::ClientError;
use crate::services::relations::{TargetRoleRelations, UserRoleRelations};
use crate::wire::{
    RoleDataRequest, RoleRecord, SshKeyRecord, TargetDataRequest, TargetRecord, UserDataRequest,
    UserRecord,
};

const LOGIN_PATH: &str = "/@warpgate/api/auth/login";
const ADMIN_API_PATH: &str = "/@warpgate/admin/api";

/// Outcome of an add-relation call. A 409 means the edge already existed,
/// which is the desired postcondition, so it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    Added,
    AlreadyPresent,
}

/// Outcome of a remove-relation call. A 409 means the removal raced with a
/// change on the other side of the edge; the caller decides how loud to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    Removed,
    Conflict,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Clone, Debug)]
pub struct WarpgateGateway {
    client: reqwest::Client,
    base_url: String,
}

impl WarpgateGateway {
    /// Build the HTTP client, log in, and keep the session cookie for every
    /// later call.
    pub async fn connect(
        config: &WarpgateConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, ClientError> {
        const OP: &str = "build http client";

        let mut builder = reqwest::Client::builder().cookie_store(true);
        if config.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|source| ClientError::Transport {
                operation: OP,
                source,
            })?;

        let gateway = Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        };
        gateway.login(config, cancel).await?;

        tracing::info!(url = %gateway.base_url, username = %config.username, "Authenticated against Warpgate admin API");

        Ok(gateway)
    }

    async fn login(
        &self,
        config: &WarpgateConfig,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        const OP: &str = "login";

        let request = LoginRequest {
            username: &config.username,
            password: config.password.expose_secret(),
        };
        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .post(format!("{}{}", self.base_url, LOGIN_PATH))
                    .json(&request),
            )
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, ADMIN_API_PATH, path)
    }

    async fn send(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<Response, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled { operation });
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled { operation }),
            result = request.send() => result.map_err(|source| ClientError::Transport {
                operation,
                source,
            }),
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        response: Response,
    ) -> Result<T, ClientError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Cancelled { operation }),
            result = response.json::<T>() => result.map_err(|source| ClientError::Transport {
                operation,
                source,
            }),
        }
    }

    // ========================================================================
    // Targets
    // ========================================================================

    pub async fn create_target(
        &self,
        cancel: &CancellationToken,
        request: &TargetDataRequest,
    ) -> Result<TargetRecord, ClientError> {
        const OP: &str = "create target";

        let response = self
            .send(
                OP,
                cancel,
                self.client.post(self.admin_url("/targets")).json(request),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn list_targets(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<TargetRecord>, ClientError> {
        const OP: &str = "list targets";

        let response = self
            .send(OP, cancel, self.client.get(self.admin_url("/targets")))
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    /// `Ok(None)` on 404: the target was deleted out-of-band, which is drift
    /// for the caller to absorb, not a failure.
    pub async fn get_target(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<Option<TargetRecord>, ClientError> {
        const OP: &str = "get target";

        let response = self
            .send(
                OP,
                cancel,
                self.client.get(self.admin_url(&format!("/targets/{id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(Some(self.read_json(OP, cancel, response).await?)),
            StatusCode::NOT_FOUND => {
                tracing::debug!(target_id = %id, "target not present on remote");
                Ok(None)
            }
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn update_target(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        request: &TargetDataRequest,
    ) -> Result<TargetRecord, ClientError> {
        const OP: &str = "update target";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .put(self.admin_url(&format!("/targets/{id}")))
                    .json(request),
            )
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn delete_target(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<(), ClientError> {
        const OP: &str = "delete target";

        let response = self
            .send(
                OP,
                cancel,
                self.client.delete(self.admin_url(&format!("/targets/{id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn list_target_roles(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<Vec<RoleRecord>, ClientError> {
        const OP: &str = "list target roles";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .get(self.admin_url(&format!("/targets/{id}/roles"))),
            )
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn add_target_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Attach, ClientError> {
        const OP: &str = "add target role";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .post(self.admin_url(&format!("/targets/{id}/roles/{role_id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(Attach::Added),
            StatusCode::CONFLICT => {
                tracing::debug!(target_id = %id, role_id = %role_id, "role already attached to target");
                Ok(Attach::AlreadyPresent)
            }
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn remove_target_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Detach, ClientError> {
        const OP: &str = "remove target role";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .delete(self.admin_url(&format!("/targets/{id}/roles/{role_id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(Detach::Removed),
            StatusCode::CONFLICT => Ok(Detach::Conflict),
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub fn target_roles(&self, target_id: Uuid) -> TargetRoleRelations<'_> {
        TargetRoleRelations::new(self, target_id)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub async fn create_role(
        &self,
        cancel: &CancellationToken,
        request: &RoleDataRequest,
    ) -> Result<RoleRecord, ClientError> {
        const OP: &str = "create role";

        let response = self
            .send(
                OP,
                cancel,
                self.client.post(self.admin_url("/roles")).json(request),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn list_roles(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RoleRecord>, ClientError> {
        const OP: &str = "list roles";

        let response = self
            .send(OP, cancel, self.client.get(self.admin_url("/roles")))
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn get_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<Option<RoleRecord>, ClientError> {
        const OP: &str = "get role";

        let response = self
            .send(
                OP,
                cancel,
                self.client.get(self.admin_url(&format!("/roles/{id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(Some(self.read_json(OP, cancel, response).await?)),
            StatusCode::NOT_FOUND => {
                tracing::debug!(role_id = %id, "role not present on remote");
                Ok(None)
            }
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn update_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        request: &RoleDataRequest,
    ) -> Result<RoleRecord, ClientError> {
        const OP: &str = "update role";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .put(self.admin_url(&format!("/roles/{id}")))
                    .json(request),
            )
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn delete_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<(), ClientError> {
        const OP: &str = "delete role";

        let response = self
            .send(
                OP,
                cancel,
                self.client.delete(self.admin_url(&format!("/roles/{id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn create_user(
        &self,
        cancel: &CancellationToken,
        request: &UserDataRequest,
    ) -> Result<UserRecord, ClientError> {
        const OP: &str = "create user";

        let response = self
            .send(
                OP,
                cancel,
                self.client.post(self.admin_url("/users")).json(request),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn get_user(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<Option<UserRecord>, ClientError> {
        const OP: &str = "get user";

        let response = self
            .send(
                OP,
                cancel,
                self.client.get(self.admin_url(&format!("/users/{id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::OK => Ok(Some(self.read_json(OP, cancel, response).await?)),
            StatusCode::NOT_FOUND => {
                tracing::debug!(user_id = %id, "user not present on remote");
                Ok(None)
            }
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn update_user(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        request: &UserDataRequest,
    ) -> Result<UserRecord, ClientError> {
        const OP: &str = "update user";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .put(self.admin_url(&format!("/users/{id}")))
                    .json(request),
            )
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn delete_user(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<(), ClientError> {
        const OP: &str = "delete user";

        let response = self
            .send(
                OP,
                cancel,
                self.client.delete(self.admin_url(&format!("/users/{id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn list_user_roles(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<Vec<RoleRecord>, ClientError> {
        const OP: &str = "list user roles";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .get(self.admin_url(&format!("/users/{id}/roles"))),
            )
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn add_user_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Attach, ClientError> {
        const OP: &str = "add user role";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .post(self.admin_url(&format!("/users/{id}/roles/{role_id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(Attach::Added),
            StatusCode::CONFLICT => {
                tracing::debug!(user_id = %id, role_id = %role_id, "role already attached to user");
                Ok(Attach::AlreadyPresent)
            }
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub async fn remove_user_role(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
        role_id: Uuid,
    ) -> Result<Detach, ClientError> {
        const OP: &str = "remove user role";

        let response = self
            .send(
                OP,
                cancel,
                self.client
                    .delete(self.admin_url(&format!("/users/{id}/roles/{role_id}"))),
            )
            .await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(Detach::Removed),
            StatusCode::CONFLICT => Ok(Detach::Conflict),
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }

    pub fn user_roles(&self, user_id: Uuid) -> UserRoleRelations<'_> {
        UserRoleRelations::new(self, user_id)
    }

    // ========================================================================
    // SSH keys
    // ========================================================================

    /// Keys Warpgate itself presents to targets when using public key auth.
    pub async fn list_ssh_keys(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<SshKeyRecord>, ClientError> {
        const OP: &str = "list ssh keys";

        let response = self
            .send(OP, cancel, self.client.get(self.admin_url("/ssh/own-keys")))
            .await?;
        match response.status() {
            StatusCode::OK => self.read_json(OP, cancel, response).await,
            status => Err(ClientError::UnexpectedStatus {
                operation: OP,
                status,
            }),
        }
    }
}
