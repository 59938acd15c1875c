//! Batch delete, zip download, move, and assign.

mod common;

use std::io::Read;

use common::*;
use filedepot_core::types::Pagination;
use filedepot_core::ErrorKind;
use filedepot_entity::activity::ActivityAction;
use uuid::Uuid;

#[tokio::test]
async fn batch_delete_reports_per_item_outcomes() {
    let env = setup().await;
    let mine = upload(&env, &env.member_ctx, "/", "mine.pdf", b"m").await;
    let admins = upload(&env, &env.admin_ctx, "/", "admins.pdf", b"a").await;
    let missing = Uuid::new_v4();

    let report = env
        .services
        .batches
        .batch_delete(&env.member_ctx, &[mine.id, missing, admins.id])
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec![mine.id]);
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().any(|f| f.id == missing));
    assert!(report.failed.iter().any(|f| f.id == admins.id));
    assert!(env.content_path("admins.pdf").exists());
    assert!(!env.content_path("mine.pdf").exists());

    // Exactly one aggregate activity entry for the whole batch.
    let log = env
        .services
        .activity
        .recent(&env.admin_ctx, Pagination::new(0, 100))
        .await
        .unwrap();
    let batch_entries: Vec<_> = log
        .items
        .iter()
        .filter(|e| e.action == ActivityAction::BatchDelete)
        .collect();
    assert_eq!(batch_entries.len(), 1);
}

#[tokio::test]
async fn batch_download_archives_readable_files_and_manifests_the_rest() {
    let env = setup().await;
    let one = upload(&env, &env.member_ctx, "/", "one.pdf", b"first body").await;
    let two = upload(&env, &env.member_ctx, "/Sub", "two.pdf", b"second body").await;
    let forbidden = upload(&env, &env.admin_ctx, "/", "private.pdf", b"secret").await;

    let archive = env
        .services
        .batches
        .batch_download(&env.member_ctx, &[one.id, two.id, forbidden.id])
        .await
        .unwrap();
    assert_eq!(archive.included, vec![one.id, two.id]);
    assert_eq!(archive.skipped.len(), 1);
    assert_eq!(archive.skipped[0].id, forbidden.id);

    let bytes = collect(archive.stream).await;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(zip.len(), 3); // two files + manifest

    let mut body = String::new();
    zip.by_name("one.pdf").unwrap().read_to_string(&mut body).unwrap();
    assert_eq!(body, "first body");

    body.clear();
    zip.by_name("MANIFEST.txt")
        .unwrap()
        .read_to_string(&mut body)
        .unwrap();
    assert!(body.contains(&forbidden.id.to_string()));
    assert!(body.contains("Not authorized"));
}

#[tokio::test]
async fn batch_download_disambiguates_duplicate_names() {
    let env = setup().await;
    let a = upload(&env, &env.member_ctx, "/Ops", "report.pdf", b"ops").await;
    let b = upload(&env, &env.member_ctx, "/Research", "report.pdf", b"research").await;

    let archive = env
        .services
        .batches
        .batch_download(&env.member_ctx, &[a.id, b.id])
        .await
        .unwrap();
    let bytes = collect(archive.stream).await;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();

    assert!(zip.by_name("report.pdf").is_ok());
    assert!(zip.by_name("report (2).pdf").is_ok());
}

#[tokio::test]
async fn directory_download_preserves_relative_paths() {
    let env = setup().await;
    upload(&env, &env.member_ctx, "/Ops", "top.pdf", b"t").await;
    upload(&env, &env.member_ctx, "/Ops/Sub", "deep.pdf", b"d").await;

    let archive = env
        .services
        .batches
        .download_directory(&env.member_ctx, "Ops")
        .await
        .unwrap();
    assert_eq!(archive.archive_name, "Ops.zip");

    let bytes = collect(archive.stream).await;
    let mut zip = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert!(zip.by_name("Ops/top.pdf").is_ok());
    assert!(zip.by_name("Ops/Sub/deep.pdf").is_ok());
}

#[tokio::test]
async fn batch_move_relocates_files_and_reports_collisions() {
    let env = setup().await;
    let movable = upload(&env, &env.member_ctx, "/", "move-me.pdf", b"m").await;
    let collider = upload(&env, &env.member_ctx, "/", "taken.pdf", b"c").await;
    upload(&env, &env.member_ctx, "/Archive", "taken.pdf", b"existing").await;

    let report = env
        .services
        .batches
        .batch_move(&env.member_ctx, &[movable.id, collider.id], "Archive")
        .await
        .unwrap();

    assert_eq!(report.succeeded, vec![movable.id]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, collider.id);

    assert!(env.content_path("Archive/move-me.pdf").exists());
    assert!(!env.content_path("move-me.pdf").exists());

    // The record followed the bytes.
    let entries = env
        .services
        .files
        .list_folder(&env.member_ctx, "Archive")
        .await
        .unwrap();
    assert!(entries
        .iter()
        .any(|e| e.name == "move-me.pdf" && e.record.is_some()));
}

#[tokio::test]
async fn batch_assign_is_admin_only_and_notifies_per_file() {
    let env = setup().await;
    let a = upload(&env, &env.admin_ctx, "/", "a.pdf", b"a").await;
    let b = upload(&env, &env.admin_ctx, "/", "b.pdf", b"b").await;

    let err = env
        .services
        .batches
        .batch_assign(&env.member_ctx, &[a.id], env.member.id, None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let report = env
        .services
        .batches
        .batch_assign(
            &env.admin_ctx,
            &[a.id, b.id, Uuid::new_v4()],
            env.member.id,
            Some("Process these"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert_eq!(report.failed.len(), 1);

    let unread = env
        .services
        .notifications
        .unread_count(&env.member_ctx)
        .await
        .unwrap();
    assert_eq!(unread, 2);
}
