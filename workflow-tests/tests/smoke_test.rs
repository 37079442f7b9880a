//! Session and gateway smoke checks.

mod common;

use secrecy::Secret;
use tokio_util::sync::CancellationToken;

use warpgate_client::{ClientError, WarpgateConfig, WarpgateGateway};
use workflow_tests::{spawn_admin_api, ADMIN_USERNAME};

#[tokio::test]
async fn login_and_key_listing_work_end_to_end() {
    let ctx = common::setup().await;

    let keys = ctx.gateway.list_ssh_keys(&ctx.cancel).await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].kind, "Ed25519");
    assert!(!keys[0].public_key_base64.is_empty());
}

#[tokio::test]
async fn wrong_credentials_fail_the_connect() {
    workflow_tests::init_tracing();
    let server = spawn_admin_api().await;

    let config = WarpgateConfig {
        url: server.url.clone(),
        username: ADMIN_USERNAME.to_string(),
        password: Secret::new("wrong".to_string()),
        insecure_skip_verify: false,
    };
    let err = WarpgateGateway::connect(&config, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ClientError::UnexpectedStatus { operation, status } => {
            assert_eq!(operation, "login");
            assert_eq!(status.as_u16(), 401);
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}
