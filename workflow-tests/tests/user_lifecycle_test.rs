//! User lifecycle with multi-credential sets.

mod common;

use std::collections::BTreeSet;

use warpgate_client::models::UserCredential;
use warpgate_provisioner::{UserController, UserSpec};

fn spec(username: &str, credentials: Vec<UserCredential>) -> UserSpec {
    UserSpec {
        id: None,
        username: username.to_string(),
        roles: BTreeSet::new(),
        credentials,
    }
}

#[tokio::test]
async fn credentials_round_trip_through_the_remote() {
    let ctx = common::setup().await;
    let controller = UserController::new(ctx.gateway.clone());

    let credentials = vec![
        UserCredential::Password {
            hash: "$argon2id$v=19$m=65536$abc".to_string(),
        },
        UserCredential::Totp {
            key: vec![8, 0, 255, 64],
        },
    ];
    let applied = controller
        .create(&ctx.cancel, &spec("alice", credentials.clone()))
        .await
        .unwrap();

    assert_eq!(applied.state.username, "alice");
    assert_eq!(applied.state.credentials, credentials);
}

/// Shrinking the declared credential set must shrink the remote one, since
/// the update is a full replace rather than a patch.
#[tokio::test]
async fn credential_set_shrinks_with_the_declaration() {
    let ctx = common::setup().await;
    let controller = UserController::new(ctx.gateway.clone());

    let initial = vec![
        UserCredential::Sso {
            email: "bob@example.com".to_string(),
            provider: Some("google".to_string()),
        },
        UserCredential::Sso {
            email: "bob@corp.example.com".to_string(),
            provider: Some("okta".to_string()),
        },
        UserCredential::PublicKey {
            key: "ssh-ed25519 AAAAC3-laptop".to_string(),
        },
        UserCredential::PublicKey {
            key: "ssh-ed25519 AAAAC3-desktop".to_string(),
        },
        UserCredential::Password {
            hash: "$argon2id$v=19$m=65536$old".to_string(),
        },
        UserCredential::Totp {
            key: vec![1, 2, 3, 4, 5, 6],
        },
    ];
    let created = controller
        .create(&ctx.cancel, &spec("bob", initial))
        .await
        .unwrap();
    assert_eq!(created.state.credentials.len(), 6);

    let desired = vec![
        UserCredential::Totp {
            key: vec![1, 2, 3, 4, 5, 6],
        },
        UserCredential::Sso {
            email: "bob@example.com".to_string(),
            provider: Some("google".to_string()),
        },
        UserCredential::PublicKey {
            key: "ssh-ed25519 AAAAC3-laptop".to_string(),
        },
        UserCredential::Password {
            hash: "$argon2id$v=19$m=65536$new".to_string(),
        },
    ];
    let mut updated_spec = spec("bob", desired.clone());
    updated_spec.id = Some(created.state.id.clone());

    let updated = controller.update(&ctx.cancel, &updated_spec).await.unwrap();
    assert_eq!(updated.state.credentials.len(), 4);
    assert_eq!(updated.state.credentials, desired);

    let read = controller
        .read(&ctx.cancel, &created.state.id)
        .await
        .unwrap()
        .into_live()
        .unwrap();
    assert_eq!(read.credentials, desired);
}

#[tokio::test]
async fn reading_a_deleted_user_reports_drift() {
    let ctx = common::setup().await;
    let controller = UserController::new(ctx.gateway.clone());

    let created = controller
        .create(&ctx.cancel, &spec("carol", Vec::new()))
        .await
        .unwrap();

    // Out-of-band deletion, behind the API's back.
    let id: uuid::Uuid = created.state.id.parse().unwrap();
    ctx.server.state.lock().unwrap().users.remove(&id);

    let outcome = controller.read(&ctx.cancel, &created.state.id).await.unwrap();
    assert!(outcome.is_drifted());
}
