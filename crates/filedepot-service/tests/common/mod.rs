//! Shared test harness: a temp storage root, a temp SQLite database with
//! migrations applied, fully wired services, and two registered users.

#![allow(dead_code)]

use bytes::Bytes;
use tempfile::TempDir;

use filedepot_core::config::{DatabaseConfig, StorageConfig};
use filedepot_core::types::ByteStream;
use filedepot_database::{migration, DatabasePool};
use filedepot_entity::file::FileRecord;
use filedepot_entity::user::User;
use filedepot_service::file::UploadRequest;
use filedepot_service::user::RegisterRequest;
use filedepot_service::{RequestContext, Services};

pub struct TestEnv {
    /// Keeps the temp tree alive for the test's duration.
    pub dir: TempDir,
    pub services: Services,
    pub admin: User,
    pub member: User,
    pub admin_ctx: RequestContext,
    pub member_ctx: RequestContext,
}

impl TestEnv {
    /// Absolute path of a file inside the content root, for tests that
    /// need to poke the filesystem behind the service's back.
    pub fn content_path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join("data/files").join(rel)
    }
}

pub async fn setup() -> TestEnv {
    let dir = tempfile::tempdir().expect("create temp dir");

    let db_config = DatabaseConfig {
        path: dir.path().join("filedepot.db").display().to_string(),
        ..DatabaseConfig::default()
    };
    let db = DatabasePool::connect(&db_config).await.expect("open db");
    migration::run_migrations(db.pool()).await.expect("migrate");

    let storage_config = StorageConfig {
        data_root: dir.path().join("data").display().to_string(),
        ..StorageConfig::default()
    };
    let services = Services::build(db, storage_config)
        .await
        .expect("build services");

    let admin = services
        .users
        .register(RegisterRequest {
            username: "admin".to_string(),
            password: "correct horse".to_string(),
        })
        .await
        .expect("register admin");
    let member = services
        .users
        .register(RegisterRequest {
            username: "member".to_string(),
            password: "battery staple".to_string(),
        })
        .await
        .expect("register member");

    let admin_ctx = RequestContext::for_user(&admin);
    let member_ctx = RequestContext::for_user(&member);

    TestEnv {
        dir,
        services,
        admin,
        member,
        admin_ctx,
        member_ctx,
    }
}

/// Wrap bytes as an upload content stream.
pub fn content(bytes: &[u8]) -> ByteStream {
    filedepot_storage::local::bytes_stream(Bytes::copy_from_slice(bytes))
}

/// A plain upload request for `folder/filename` with no assignment.
pub fn upload_req(folder: &str, filename: &str) -> UploadRequest {
    UploadRequest {
        folder: folder.to_string(),
        filename: filename.to_string(),
        declared_size: None,
        assigned_to_id: None,
        instruction: None,
        due_date: None,
        overwrite: false,
    }
}

/// Upload a file as the given context and return its record.
pub async fn upload(
    env: &TestEnv,
    ctx: &RequestContext,
    folder: &str,
    filename: &str,
    bytes: &[u8],
) -> FileRecord {
    env.services
        .uploads
        .upload(ctx, upload_req(folder, filename), content(bytes))
        .await
        .expect("upload")
}

/// Upload with overwrite set.
pub async fn overwrite(
    env: &TestEnv,
    ctx: &RequestContext,
    folder: &str,
    filename: &str,
    bytes: &[u8],
) -> FileRecord {
    let mut req = upload_req(folder, filename);
    req.overwrite = true;
    env.services
        .uploads
        .upload(ctx, req, content(bytes))
        .await
        .expect("overwrite upload")
}

/// Drain a byte stream into memory.
pub async fn collect(mut stream: ByteStream) -> Vec<u8> {
    use futures::StreamExt;
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.expect("stream chunk"));
    }
    out
}

/// Download a file's current content into memory.
pub async fn download(env: &TestEnv, ctx: &RequestContext, id: uuid::Uuid) -> Vec<u8> {
    let dl = env
        .services
        .downloads
        .download(ctx, id)
        .await
        .expect("download");
    collect(dl.stream).await
}
