//! Role-set reconciliation against the relation endpoints: minimal diffs,
//! idempotent re-runs, conflict downgrades, and fatal grant failures.

mod common;

use std::collections::BTreeSet;

use uuid::Uuid;

use warpgate_client::models::{SshAuth, SshOptions, TargetOptions};
use warpgate_client::ClientError;
use warpgate_provisioner::{
    ProvisionError, ProvisionWarning, RoleAssignmentController, RoleAssignmentSpec,
    RoleController, RoleSpec, TargetController, TargetSpec,
};
use workflow_tests::TestContext;

async fn create_target(ctx: &TestContext, name: &str) -> String {
    let controller = TargetController::new(ctx.gateway.clone());
    controller
        .create(
            &ctx.cancel,
            &TargetSpec {
                id: None,
                name: name.to_string(),
                allow_roles: BTreeSet::new(),
                options: TargetOptions::Ssh(SshOptions {
                    host: "10.0.0.1".to_string(),
                    port: 22,
                    username: "root".to_string(),
                    auth: SshAuth::PublicKey,
                }),
            },
        )
        .await
        .unwrap()
        .state
        .id
}

async fn create_role(ctx: &TestContext, name: &str) -> String {
    let controller = RoleController::new(ctx.gateway.clone());
    controller
        .create(
            &ctx.cancel,
            &RoleSpec {
                id: None,
                name: name.to_string(),
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn update_applies_only_the_symmetric_difference() {
    let ctx = common::setup().await;
    let controller = RoleAssignmentController::for_targets(ctx.gateway.clone());

    let target = create_target(&ctx, "bastion").await;
    let role_a = create_role(&ctx, "ops").await;
    let role_b = create_role(&ctx, "dev").await;
    let role_c = create_role(&ctx, "audit").await;

    controller
        .create(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target.clone(),
                role_ids: BTreeSet::from([role_a.clone(), role_b.clone()]),
            },
        )
        .await
        .unwrap();

    let updated = controller
        .update(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target.clone(),
                role_ids: BTreeSet::from([role_b.clone(), role_c.clone()]),
            },
        )
        .await
        .unwrap();

    assert!(updated.warnings.is_empty());
    assert_eq!(
        updated.state.role_ids,
        BTreeSet::from([role_b.clone(), role_c.clone()])
    );

    let read = controller.read(&ctx.cancel, &target).await.unwrap();
    assert_eq!(read.role_ids, BTreeSet::from([role_b, role_c]));
}

#[tokio::test]
async fn rerunning_the_same_declaration_changes_nothing() {
    let ctx = common::setup().await;
    let controller = RoleAssignmentController::for_users(ctx.gateway.clone());

    let user = {
        let users = warpgate_provisioner::UserController::new(ctx.gateway.clone());
        users
            .create(
                &ctx.cancel,
                &warpgate_provisioner::UserSpec {
                    id: None,
                    username: "dave".to_string(),
                    roles: BTreeSet::new(),
                    credentials: Vec::new(),
                },
            )
            .await
            .unwrap()
            .state
            .id
    };
    let role = create_role(&ctx, "ops").await;

    let spec = RoleAssignmentSpec {
        parent_id: user.clone(),
        role_ids: BTreeSet::from([role.clone()]),
    };
    controller.create(&ctx.cancel, &spec).await.unwrap();

    let again = controller.update(&ctx.cancel, &spec).await.unwrap();
    assert!(again.warnings.is_empty());
    assert_eq!(again.state.role_ids, BTreeSet::from([role]));
}

#[tokio::test]
async fn removal_conflict_is_a_warning_not_a_failure() {
    let ctx = common::setup().await;
    let controller = RoleAssignmentController::for_targets(ctx.gateway.clone());

    let target = create_target(&ctx, "bastion").await;
    let role_a = create_role(&ctx, "ops").await;
    let role_b = create_role(&ctx, "dev").await;

    controller
        .create(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target.clone(),
                role_ids: BTreeSet::from([role_a.clone(), role_b.clone()]),
            },
        )
        .await
        .unwrap();

    // Make the (target, role_a) edge refuse removal, as if it raced with a
    // concurrent change on the role.
    let target_id: Uuid = target.parse().unwrap();
    let role_a_id: Uuid = role_a.parse().unwrap();
    ctx.server
        .state
        .lock()
        .unwrap()
        .conflicting_edges
        .insert((target_id, role_a_id));

    let updated = controller
        .update(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target.clone(),
                role_ids: BTreeSet::from([role_b.clone()]),
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.warnings.len(), 1);
    assert!(matches!(
        updated.warnings[0],
        ProvisionWarning::RemovalConflict { role_id, .. } if role_id == role_a_id
    ));
    // The conflicted edge is still attached; re-running later converges.
    assert!(updated.state.role_ids.contains(&role_a));
    assert!(updated.state.role_ids.contains(&role_b));
}

#[tokio::test]
async fn granting_an_unknown_role_is_fatal() {
    let ctx = common::setup().await;
    let controller = RoleAssignmentController::for_targets(ctx.gateway.clone());

    let target = create_target(&ctx, "bastion").await;
    let missing_role = Uuid::new_v4().to_string();

    let err = controller
        .create(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target,
                role_ids: BTreeSet::from([missing_role]),
            },
        )
        .await
        .unwrap_err();

    match err {
        ProvisionError::Client(ClientError::UnexpectedStatus { status, .. }) => {
            assert_eq!(status.as_u16(), 404);
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_role_id_short_circuits_before_any_call() {
    let ctx = common::setup().await;
    let controller = RoleAssignmentController::for_targets(ctx.gateway.clone());

    let target = create_target(&ctx, "bastion").await;
    let role = create_role(&ctx, "ops").await;
    controller
        .create(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target.clone(),
                role_ids: BTreeSet::from([role.clone()]),
            },
        )
        .await
        .unwrap();

    let err = controller
        .update(
            &ctx.cancel,
            &RoleAssignmentSpec {
                parent_id: target.clone(),
                role_ids: BTreeSet::from(["definitely-not-a-uuid".to_string()]),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Client(ClientError::InvalidIdentifier { .. })
    ));

    // Nothing was detached by the failed run.
    let read = controller.read(&ctx.cancel, &target).await.unwrap();
    assert_eq!(read.role_ids, BTreeSet::from([role]));
}
