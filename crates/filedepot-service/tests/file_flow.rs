//! End-to-end upload, download, overwrite, version, and folder behavior.

mod common;

use common::*;
use filedepot_core::ErrorKind;
use filedepot_entity::file::EntryOrigin;

#[tokio::test]
async fn upload_then_download_round_trips_bytes() {
    let env = setup().await;
    let body = b"quarterly report, final draft";

    let record = upload(&env, &env.member_ctx, "/Operation", "report.pdf", body).await;
    assert_eq!(record.folder, "Operation");
    assert_eq!(record.owner_id, env.member.id);
    assert_eq!(record.size_bytes, body.len() as i64);

    let bytes = download(&env, &env.member_ctx, record.id).await;
    assert_eq!(bytes, body);
}

#[tokio::test]
async fn unsupported_extensions_are_rejected() {
    let env = setup().await;
    for name in ["tool.exe", "report.pdf.exe", "notes.txt"] {
        let err = env
            .services
            .uploads
            .upload(&env.member_ctx, upload_req("/", name), content(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedFileType, "name: {name}");
    }
    // Case variants of allowed extensions pass.
    upload(&env, &env.member_ctx, "/", "REPORT.PDF", b"ok").await;
}

#[tokio::test]
async fn oversized_declared_upload_persists_nothing() {
    let env = setup().await;
    let mut req = upload_req("/", "huge.pdf");
    req.declared_size = Some(101 * 1024 * 1024);

    let err = env
        .services
        .uploads
        .upload(&env.member_ctx, req, content(b"irrelevant"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PayloadTooLarge);

    assert!(!env.content_path("huge.pdf").exists());
    let entries = env
        .services
        .files
        .list_folder(&env.member_ctx, "/")
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn upload_into_traversal_path_fails_closed() {
    let env = setup().await;
    let err = env
        .services
        .uploads
        .upload(
            &env.member_ctx,
            upload_req("/Operation/../../etc", "passwd.pdf"),
            content(b"x"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::PathTraversal);
}

#[tokio::test]
async fn duplicate_upload_needs_explicit_overwrite() {
    let env = setup().await;
    upload(&env, &env.member_ctx, "/", "a.pdf", b"one").await;

    let err = env
        .services
        .uploads
        .upload(&env.member_ctx, upload_req("/", "a.pdf"), content(b"two"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn overwrites_number_versions_densely_from_one() {
    let env = setup().await;
    let record = upload(&env, &env.member_ctx, "/", "doc.pdf", b"v1").await;

    overwrite(&env, &env.member_ctx, "/", "doc.pdf", b"v2").await;
    overwrite(&env, &env.member_ctx, "/", "doc.pdf", b"v3").await;

    // Two overwrites: versions 1 and 2, version 1 being the original.
    let versions = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap();
    let numbers: Vec<i64> = versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![2, 1]);
    assert_eq!(versions[1].size_bytes, 2);

    assert_eq!(download(&env, &env.member_ctx, record.id).await, b"v3");
}

#[tokio::test]
async fn restore_preserves_forward_history() {
    let env = setup().await;
    let record = upload(&env, &env.member_ctx, "/", "doc.pdf", b"v1 original").await;
    overwrite(&env, &env.member_ctx, "/", "doc.pdf", b"v2 revision").await;

    let versions = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap();
    let v1 = versions.iter().find(|v| v.version_number == 1).unwrap();

    // Restore the original; the pre-restore current must be preserved.
    let outcome = env
        .services
        .versions
        .restore(&env.member_ctx, record.id, v1.id)
        .await
        .unwrap();
    assert!(!outcome.noop);
    assert_eq!(outcome.preserved_as, Some(2));
    assert_eq!(download(&env, &env.member_ctx, record.id).await, b"v1 original");

    // Undo the undo: restore what was current before the first restore.
    let versions = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap();
    let preserved = versions.iter().find(|v| v.version_number == 2).unwrap();
    env.services
        .versions
        .restore(&env.member_ctx, record.id, preserved.id)
        .await
        .unwrap();
    assert_eq!(download(&env, &env.member_ctx, record.id).await, b"v2 revision");
}

#[tokio::test]
async fn restore_to_current_content_is_a_noop() {
    let env = setup().await;
    let record = upload(&env, &env.member_ctx, "/", "doc.pdf", b"same").await;
    overwrite(&env, &env.member_ctx, "/", "doc.pdf", b"same").await;

    let versions = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap();
    assert_eq!(versions.len(), 1);

    let outcome = env
        .services
        .versions
        .restore(&env.member_ctx, record.id, versions[0].id)
        .await
        .unwrap();
    assert!(outcome.noop);

    // No duplicate version entry was created.
    let after = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
}

#[tokio::test]
async fn restoring_foreign_version_is_not_found() {
    let env = setup().await;
    let a = upload(&env, &env.member_ctx, "/", "a.pdf", b"a1").await;
    overwrite(&env, &env.member_ctx, "/", "a.pdf", b"a2").await;
    let b = upload(&env, &env.member_ctx, "/", "b.pdf", b"b1").await;

    let a_versions = env
        .services
        .versions
        .list_versions(&env.member_ctx, a.id)
        .await
        .unwrap();
    let err = env
        .services
        .versions
        .restore(&env.member_ctx, b.id, a_versions[0].id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, filedepot_core::ErrorKind::NotFound);
}

#[tokio::test]
async fn concurrent_overwrites_serialize_without_losing_versions() {
    let env = setup().await;
    let record = upload(&env, &env.member_ctx, "/", "hot.pdf", b"base").await;

    let services_a = env.services.clone();
    let services_b = env.services.clone();
    let ctx_a = env.member_ctx.clone();
    let ctx_b = env.member_ctx.clone();

    let task_a = tokio::spawn(async move {
        let mut req = upload_req("/", "hot.pdf");
        req.overwrite = true;
        services_a
            .uploads
            .upload(&ctx_a, req, content(b"payload-A"))
            .await
    });
    let task_b = tokio::spawn(async move {
        let mut req = upload_req("/", "hot.pdf");
        req.overwrite = true;
        services_b
            .uploads
            .upload(&ctx_b, req, content(b"payload-B"))
            .await
    });

    task_a.await.unwrap().unwrap();
    task_b.await.unwrap().unwrap();

    // Exactly two sequential versions, no duplicates, no gaps.
    let versions = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap();
    let mut numbers: Vec<i64> = versions.iter().map(|v| v.version_number).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2]);

    // Neither payload vanished undetected: the loser of the race is
    // preserved as version 2 and the winner is the current content.
    let current = download(&env, &env.member_ctx, record.id).await;
    assert!(current == b"payload-A" || current == b"payload-B");
}

#[tokio::test]
async fn listing_reports_unindexed_and_missing_entries() {
    let env = setup().await;
    let tracked = upload(&env, &env.member_ctx, "/", "tracked.pdf", b"ok").await;
    let ghost = upload(&env, &env.member_ctx, "/", "ghost.pdf", b"gone soon").await;

    // A rogue file lands behind the service's back, and a tracked file's
    // bytes disappear.
    std::fs::write(env.content_path("rogue.pdf"), b"untracked").unwrap();
    std::fs::remove_file(env.content_path("ghost.pdf")).unwrap();

    let entries = env
        .services
        .files
        .list_folder(&env.member_ctx, "/")
        .await
        .unwrap();

    let find = |name: &str| entries.iter().find(|e| e.name == name).unwrap();
    assert_eq!(find("tracked.pdf").origin, EntryOrigin::Tracked);
    assert_eq!(
        find("tracked.pdf").record.as_ref().unwrap().id,
        tracked.id
    );
    assert_eq!(find("rogue.pdf").origin, EntryOrigin::Unindexed);
    assert!(find("rogue.pdf").record.is_none());
    assert_eq!(find("ghost.pdf").origin, EntryOrigin::Missing);
    assert_eq!(find("ghost.pdf").size_bytes, 0);
    assert_eq!(find("ghost.pdf").record.as_ref().unwrap().id, ghost.id);

    // Listing never mutated anything: the rogue file still has no record
    // until an admin syncs explicitly.
    let report = env
        .services
        .files
        .sync_filesystem(&env.admin_ctx)
        .await
        .unwrap();
    assert_eq!(report.added, 1);

    let entries = env
        .services
        .files
        .list_folder(&env.member_ctx, "/")
        .await
        .unwrap();
    assert_eq!(
        entries
            .iter()
            .find(|e| e.name == "rogue.pdf")
            .unwrap()
            .origin,
        EntryOrigin::Tracked
    );
}

#[tokio::test]
async fn delete_file_requires_owner_or_admin() {
    let env = setup().await;
    let admins_file = upload(&env, &env.admin_ctx, "/", "admin.pdf", b"x").await;
    let members_file = upload(&env, &env.member_ctx, "/", "member.pdf", b"y").await;

    let err = env
        .services
        .files
        .delete_file(&env.member_ctx, admins_file.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    env.services
        .files
        .delete_file(&env.member_ctx, members_file.id)
        .await
        .unwrap();
    assert!(!env.content_path("member.pdf").exists());

    // Admins can delete anyone's file.
    env.services
        .files
        .delete_file(&env.admin_ctx, admins_file.id)
        .await
        .unwrap();
}

#[tokio::test]
async fn deleting_a_file_removes_its_version_history() {
    let env = setup().await;
    let record = upload(&env, &env.member_ctx, "/", "doc.pdf", b"v1").await;
    overwrite(&env, &env.member_ctx, "/", "doc.pdf", b"v2").await;

    env.services
        .files
        .delete_file(&env.member_ctx, record.id)
        .await
        .unwrap();

    let err = env
        .services
        .versions
        .list_versions(&env.member_ctx, record.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(!env
        .dir
        .path()
        .join("data/versions")
        .join(record.id.to_string())
        .exists());
}

#[tokio::test]
async fn directory_lifecycle_is_admin_only_and_fail_safe() {
    let env = setup().await;

    let err = env
        .services
        .files
        .create_directory(&env.member_ctx, "Operation")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    env.services
        .files
        .create_directory(&env.admin_ctx, "Operation")
        .await
        .unwrap();
    let err = env
        .services
        .files
        .create_directory(&env.admin_ctx, "Operation")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyExists);

    let record = upload(&env, &env.member_ctx, "Operation", "plan.pdf", b"p").await;
    overwrite(&env, &env.member_ctx, "Operation", "plan.pdf", b"p2").await;

    // Non-empty without the recursive flag is refused.
    let err = env
        .services
        .files
        .delete_directory(&env.admin_ctx, "Operation", false)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotEmpty);

    // Recursive cascades records, versions, blobs, and the subtree.
    env.services
        .files
        .delete_directory(&env.admin_ctx, "Operation", true)
        .await
        .unwrap();
    assert!(!env.content_path("Operation").exists());
    assert!(env
        .services
        .files
        .list_folder(&env.member_ctx, "/")
        .await
        .unwrap()
        .is_empty());
    assert!(!env
        .dir
        .path()
        .join("data/versions")
        .join(record.id.to_string())
        .exists());
}
