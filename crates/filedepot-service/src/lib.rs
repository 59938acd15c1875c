//! # filedepot-service
//!
//! Business logic services for FileDepot. This crate is the boundary an
//! embedding transport (HTTP server, CLI, tests) wires to: each service
//! takes a [`context::RequestContext`] describing the authenticated actor
//! and returns typed results or a structured [`filedepot_core::AppError`].

pub mod activity;
pub mod batch;
pub mod context;
pub mod file;
pub mod notification;
pub mod report;
pub mod task;
pub mod user;

use std::sync::Arc;

use filedepot_core::config::StorageConfig;
use filedepot_core::AppResult;
use filedepot_database::repositories::{
    ActivityRepository, FileRepository, NotificationRepository, UserRepository, VersionRepository,
};
use filedepot_database::DatabasePool;
use filedepot_storage::{LocalStorage, PathLocks, VersionArea};

pub use activity::ActivityLogger;
pub use context::RequestContext;

/// Fully wired service set over one database and one storage root.
#[derive(Debug, Clone)]
pub struct Services {
    /// Folder listing, deletes, directories, sync.
    pub files: file::FileService,
    /// Uploads and versioned overwrites.
    pub uploads: file::UploadService,
    /// Content downloads.
    pub downloads: file::DownloadService,
    /// Version history and restore.
    pub versions: file::VersionService,
    /// Assignment, status, metrics.
    pub tasks: task::TaskService,
    /// Bulk delete/download/move/assign.
    pub batches: batch::BatchService,
    /// Notification lifecycle.
    pub notifications: notification::NotificationService,
    /// Accounts and preferences.
    pub users: user::UserService,
    /// Admin dashboard.
    pub reports: report::DashboardService,
    /// Activity log queries and the audited purge.
    pub activity: ActivityLogger,
}

impl Services {
    /// Wire every service over a connected database pool and the storage
    /// configuration. Creates the storage root and version area if they
    /// do not exist yet.
    pub async fn build(db: DatabasePool, config: StorageConfig) -> AppResult<Self> {
        let storage = Arc::new(LocalStorage::new(&config.files_root()).await?);
        let version_area = Arc::new(VersionArea::new(&config.versions_root()).await?);
        let locks = PathLocks::new();

        let files = Arc::new(FileRepository::new(db.pool().clone()));
        let versions = Arc::new(VersionRepository::new(db.pool().clone()));
        let users = Arc::new(UserRepository::new(db.pool().clone()));
        let notifications = Arc::new(NotificationRepository::new(db.pool().clone()));
        let activity_repo = Arc::new(ActivityRepository::new(db.pool().clone()));

        let activity = ActivityLogger::new(Arc::clone(&activity_repo));

        let tasks = task::TaskService::new(
            Arc::clone(&files),
            Arc::clone(&users),
            Arc::clone(&notifications),
            activity.clone(),
        );

        Ok(Self {
            files: file::FileService::new(
                Arc::clone(&files),
                Arc::clone(&storage),
                Arc::clone(&version_area),
                locks.clone(),
                activity.clone(),
                db.clone(),
            ),
            uploads: file::UploadService::new(
                Arc::clone(&files),
                Arc::clone(&users),
                Arc::clone(&notifications),
                Arc::clone(&storage),
                Arc::clone(&version_area),
                locks.clone(),
                activity.clone(),
                db.clone(),
                config.clone(),
            ),
            downloads: file::DownloadService::new(
                Arc::clone(&files),
                Arc::clone(&storage),
                activity.clone(),
            ),
            versions: file::VersionService::new(
                Arc::clone(&files),
                Arc::clone(&versions),
                Arc::clone(&storage),
                Arc::clone(&version_area),
                locks.clone(),
                activity.clone(),
                db.clone(),
            ),
            batches: batch::BatchService::new(
                Arc::clone(&files),
                Arc::clone(&users),
                Arc::clone(&notifications),
                Arc::clone(&storage),
                Arc::clone(&version_area),
                locks.clone(),
                activity.clone(),
            ),
            notifications: notification::NotificationService::new(
                Arc::clone(&notifications),
                Arc::clone(&files),
            ),
            users: user::UserService::new(Arc::clone(&users), activity.clone()),
            reports: report::DashboardService::new(
                Arc::clone(&users),
                Arc::clone(&files),
                Arc::clone(&activity_repo),
                Arc::clone(&storage),
                tasks.clone(),
            ),
            tasks,
            activity,
        })
    }
}
