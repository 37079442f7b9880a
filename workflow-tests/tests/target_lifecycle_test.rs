//! Target lifecycle: create, read, update, delete, and protocol-filtered
//! listing against the admin API stand-in.

mod common;

use std::collections::{BTreeSet, HashMap};

use serde_json::json;
use uuid::Uuid;

use warpgate_client::models::{
    HttpOptions, SshAuth, SshOptions, TargetOptions, Tls, TlsMode,
};
use warpgate_provisioner::{TargetController, TargetSpec};
use workflow_tests::StoredTarget;

fn ssh_spec(name: &str) -> TargetSpec {
    TargetSpec {
        id: None,
        name: name.to_string(),
        allow_roles: BTreeSet::new(),
        options: TargetOptions::Ssh(SshOptions {
            host: "10.10.10.10".to_string(),
            port: 11,
            username: "root".to_string(),
            auth: SshAuth::Password {
                password: "A12345678".to_string(),
            },
        }),
    }
}

#[tokio::test]
async fn create_ssh_target_returns_id_and_keeps_auth_kind() {
    let ctx = common::setup().await;
    let controller = TargetController::new(ctx.gateway.clone());

    let applied = controller.create(&ctx.cancel, &ssh_spec("one")).await.unwrap();

    assert!(!applied.state.id.is_empty());
    assert!(Uuid::parse_str(&applied.state.id).is_ok());
    assert!(applied.warnings.is_empty());
    match &applied.state.options {
        TargetOptions::Ssh(options) => {
            assert_eq!(options.auth.kind(), "Password");
            assert_eq!(options.host, "10.10.10.10");
            assert_eq!(options.port, 11);
        }
        other => panic!("expected ssh options, got {other:?}"),
    }

    let read = controller
        .read(&ctx.cancel, &applied.state.id)
        .await
        .unwrap()
        .into_live()
        .expect("target just created");
    assert_eq!(read.name, "one");
}

#[tokio::test]
async fn update_replaces_the_record_and_preserves_the_id() {
    let ctx = common::setup().await;
    let controller = TargetController::new(ctx.gateway.clone());

    let created = controller.create(&ctx.cancel, &ssh_spec("one")).await.unwrap();

    let mut spec = ssh_spec("one");
    spec.id = Some(created.state.id.clone());
    spec.options = TargetOptions::Ssh(SshOptions {
        host: "10.10.10.11".to_string(),
        port: 2222,
        username: "admin".to_string(),
        auth: SshAuth::PublicKey,
    });

    let updated = controller.update(&ctx.cancel, &spec).await.unwrap();
    assert_eq!(updated.state.id, created.state.id);
    assert!(updated.warnings.is_empty());
    match &updated.state.options {
        TargetOptions::Ssh(options) => {
            assert_eq!(options.port, 2222);
            assert_eq!(options.auth, SshAuth::PublicKey);
        }
        other => panic!("expected ssh options, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_removes_the_remote_record() {
    let ctx = common::setup().await;
    let controller = TargetController::new(ctx.gateway.clone());

    let created = controller.create(&ctx.cancel, &ssh_spec("one")).await.unwrap();
    controller.delete(&ctx.cancel, &created.state.id).await.unwrap();

    let outcome = controller.read(&ctx.cancel, &created.state.id).await.unwrap();
    assert!(outcome.is_drifted());
}

#[tokio::test]
async fn http_headers_distinguish_absent_from_empty() {
    let ctx = common::setup().await;
    let controller = TargetController::new(ctx.gateway.clone());

    let http_options = |headers| {
        TargetOptions::Http(HttpOptions {
            url: "https://app.internal:8443".to_string(),
            external_host: None,
            headers,
            tls: Tls {
                mode: TlsMode::Preferred,
                verify: false,
            },
        })
    };
    let spec = |name: &str, headers| TargetSpec {
        id: None,
        name: name.to_string(),
        allow_roles: BTreeSet::new(),
        options: http_options(headers),
    };

    let without = controller
        .create(&ctx.cancel, &spec("no-headers", None))
        .await
        .unwrap();
    let with_empty = controller
        .create(&ctx.cancel, &spec("empty-headers", Some(HashMap::new())))
        .await
        .unwrap();

    let read_without = controller
        .read(&ctx.cancel, &without.state.id)
        .await
        .unwrap()
        .into_live()
        .unwrap();
    let read_with_empty = controller
        .read(&ctx.cancel, &with_empty.state.id)
        .await
        .unwrap()
        .into_live()
        .unwrap();

    match (&read_without.options, &read_with_empty.options) {
        (TargetOptions::Http(a), TargetOptions::Http(b)) => {
            assert_eq!(a.headers, None);
            assert_eq!(b.headers, Some(HashMap::new()));
        }
        other => panic!("expected http options, got {other:?}"),
    }
}

#[tokio::test]
async fn listing_filters_by_protocol_and_skips_unmodeled_kinds() {
    let ctx = common::setup().await;
    let controller = TargetController::new(ctx.gateway.clone());

    controller.create(&ctx.cancel, &ssh_spec("ssh-one")).await.unwrap();
    controller
        .create(
            &ctx.cancel,
            &TargetSpec {
                id: None,
                name: "http-one".to_string(),
                allow_roles: BTreeSet::new(),
                options: TargetOptions::Http(HttpOptions {
                    url: "https://app.internal".to_string(),
                    external_host: Some("app.example.com".to_string()),
                    headers: None,
                    tls: Tls {
                        mode: TlsMode::Required,
                        verify: true,
                    },
                }),
            },
        )
        .await
        .unwrap();

    // A kind this client does not model, stored out-of-band. Listing must
    // skip it rather than fail.
    ctx.server.state.lock().unwrap().targets.insert(
        Uuid::new_v4(),
        StoredTarget {
            name: "db-one".to_string(),
            options: json!({ "kind": "MySql", "host": "10.0.0.5", "port": 3306 }),
            roles: BTreeSet::new(),
        },
    );

    let ssh_targets = controller.list_ssh(&ctx.cancel).await.unwrap();
    assert_eq!(ssh_targets.len(), 1);
    assert_eq!(ssh_targets[0].name, "ssh-one");

    let http_targets = controller.list_http(&ctx.cancel).await.unwrap();
    assert_eq!(http_targets.len(), 1);
    assert_eq!(http_targets[0].name, "http-one");
}
