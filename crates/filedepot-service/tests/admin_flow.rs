//! Registration, credentials, activity log, preferences, and the
//! dashboard.

mod common;

use common::*;
use filedepot_core::types::Pagination;
use filedepot_core::ErrorKind;
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::user::UserRole;
use filedepot_service::user::RegisterRequest;

#[tokio::test]
async fn first_registered_user_becomes_admin() {
    let env = setup().await;
    // The harness registered "admin" first and "member" second.
    assert_eq!(env.admin.role, UserRole::Admin);
    assert_eq!(env.member.role, UserRole::Member);

    // Third registration is also a member.
    let third = env
        .services
        .users
        .register(RegisterRequest {
            username: "third".to_string(),
            password: "long enough".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(third.role, UserRole::Member);

    // Duplicate usernames conflict.
    let err = env
        .services
        .users
        .register(RegisterRequest {
            username: "member".to_string(),
            password: "whatever works".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn password_verification_is_the_auth_contract() {
    let env = setup().await;

    let user = env
        .services
        .users
        .verify_password("member", "battery staple")
        .await
        .unwrap();
    assert_eq!(user.id, env.member.id);

    let err = env
        .services
        .users
        .verify_password("member", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let err = env
        .services
        .users
        .verify_password("nobody", "irrelevant")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn activity_log_is_admin_only_append_only_with_audited_purge() {
    let env = setup().await;
    upload(&env, &env.member_ctx, "/", "a.pdf", b"x").await;

    let err = env
        .services
        .activity
        .recent(&env.member_ctx, Pagination::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let log = env
        .services
        .activity
        .recent(&env.admin_ctx, Pagination::default())
        .await
        .unwrap();
    // Registrations and the upload are all there, newest first.
    assert!(log.items.len() >= 3);
    assert!(log
        .items
        .iter()
        .any(|e| e.action == ActivityAction::Upload));

    let removed = env.services.activity.purge(&env.admin_ctx).await.unwrap();
    assert!(removed >= 3);

    // The purge itself is the one remaining, audited, entry.
    let log = env
        .services
        .activity
        .recent(&env.admin_ctx, Pagination::default())
        .await
        .unwrap();
    assert_eq!(log.items.len(), 1);
    assert_eq!(log.items[0].action, ActivityAction::PurgeLog);
}

#[tokio::test]
async fn preferences_default_then_round_trip() {
    let env = setup().await;

    let prefs = env
        .services
        .users
        .preferences(&env.member_ctx)
        .await
        .unwrap();
    assert_eq!(prefs.view_mode, "grid");
    assert_eq!(prefs.theme, "system");

    let mut updated = prefs.clone();
    updated.view_mode = "list".to_string();
    updated.theme = "dark".to_string();
    env.services
        .users
        .save_preferences(&env.member_ctx, updated)
        .await
        .unwrap();

    let reloaded = env
        .services
        .users
        .preferences(&env.member_ctx)
        .await
        .unwrap();
    assert_eq!(reloaded.view_mode, "list");
    assert_eq!(reloaded.theme, "dark");
}

#[tokio::test]
async fn dashboard_aggregates_for_admins_only() {
    let env = setup().await;
    env.services
        .files
        .create_directory(&env.admin_ctx, "Operation")
        .await
        .unwrap();
    upload(&env, &env.member_ctx, "Operation", "plan.pdf", b"plan body").await;
    upload(&env, &env.member_ctx, "/", "loose.docx", b"doc").await;

    let err = env
        .services
        .reports
        .dashboard(&env.member_ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let report = env
        .services
        .reports
        .dashboard(&env.admin_ctx)
        .await
        .unwrap();
    assert_eq!(report.total_users, 2);
    assert_eq!(report.total_files, 2);
    assert_eq!(report.file_types.get("PDF"), Some(&1));
    assert_eq!(report.file_types.get("DOCX"), Some(&1));

    let ops = report
        .folders
        .iter()
        .find(|f| f.name == "Operation")
        .unwrap();
    assert_eq!(ops.file_count, 1);
    assert_eq!(ops.size_bytes, "plan body".len() as u64);
    assert!(!report.recent_activity.is_empty());
    assert_eq!(report.users.len(), 2);
}

#[tokio::test]
async fn user_management_is_admin_gated() {
    let env = setup().await;

    let err = env
        .services
        .users
        .list(&env.member_ctx, None, Pagination::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let users = env
        .services
        .users
        .list(&env.admin_ctx, Some("mem"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(users.items.len(), 1);
    assert_eq!(users.items[0].username, "member");

    let promoted = env
        .services
        .users
        .update_role(&env.admin_ctx, env.member.id, UserRole::Admin)
        .await
        .unwrap();
    assert_eq!(promoted.role, UserRole::Admin);

    // Self-deletion is refused; deleting others works.
    let err = env
        .services
        .users
        .delete(&env.admin_ctx, env.admin.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    env.services
        .users
        .delete(&env.admin_ctx, env.member.id)
        .await
        .unwrap();
}
