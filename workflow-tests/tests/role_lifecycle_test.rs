//! Role lifecycle and listing.

mod common;

use warpgate_provisioner::{RoleController, RoleSpec};

fn spec(name: &str) -> RoleSpec {
    RoleSpec {
        id: None,
        name: name.to_string(),
    }
}

#[tokio::test]
async fn create_update_and_list_roles() {
    let ctx = common::setup().await;
    let controller = RoleController::new(ctx.gateway.clone());

    let ops = controller.create(&ctx.cancel, &spec("ops")).await.unwrap();
    let dev = controller.create(&ctx.cancel, &spec("dev")).await.unwrap();

    let renamed = controller
        .update(
            &ctx.cancel,
            &RoleSpec {
                id: Some(ops.id.clone()),
                name: "operations".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(renamed.warnings.is_empty());
    assert_eq!(renamed.state.name, "operations");
    assert_eq!(renamed.state.id, ops.id);

    let mut names: Vec<String> = controller
        .list(&ctx.cancel)
        .await
        .unwrap()
        .into_iter()
        .map(|role| role.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["dev".to_string(), "operations".to_string()]);

    controller.delete(&ctx.cancel, &dev.id).await.unwrap();
    let remaining = controller.list(&ctx.cancel).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "operations");
}

#[tokio::test]
async fn empty_role_name_fails_validation() {
    let ctx = common::setup().await;
    let controller = RoleController::new(ctx.gateway.clone());

    let err = controller.create(&ctx.cancel, &spec("")).await.unwrap_err();
    assert!(matches!(
        err,
        warpgate_provisioner::ProvisionError::Validation(_)
    ));
    assert!(ctx.server.state.lock().unwrap().roles.is_empty());
}
