//! Admin dashboard statistics.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use filedepot_core::{AppError, AppResult};
use filedepot_database::repositories::{ActivityRepository, FileRepository, UserRepository};
use filedepot_entity::activity::ActivityEntry;
use filedepot_entity::user::model::UserSummary;
use filedepot_storage::LocalStorage;

use crate::context::RequestContext;
use crate::task::{TaskMetrics, TaskService};

/// File count and storage usage of one top-level folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderUsage {
    /// Top-level folder name.
    pub name: String,
    /// Records in the folder and its subtree.
    pub file_count: i64,
    /// Bytes on disk under the folder.
    pub size_bytes: u64,
}

/// Everything the admin dashboard renders in one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardReport {
    /// Registered users.
    pub total_users: i64,
    /// Tracked files.
    pub total_files: i64,
    /// Per-top-level-folder counts and sizes.
    pub folders: Vec<FolderUsage>,
    /// Total bytes across all top-level folders.
    pub total_storage_bytes: u64,
    /// Task completion numbers.
    pub task_metrics: TaskMetrics,
    /// Uppercased extension → file count, with an `OTHER` bucket.
    pub file_types: HashMap<String, u64>,
    /// The ten most recent activity entries.
    pub recent_activity: Vec<ActivityEntry>,
    /// User roster for the assignment picker.
    pub users: Vec<UserSummary>,
}

/// Builds the admin dashboard.
#[derive(Debug, Clone)]
pub struct DashboardService {
    users: Arc<UserRepository>,
    files: Arc<FileRepository>,
    activity: Arc<ActivityRepository>,
    storage: Arc<LocalStorage>,
    tasks: TaskService,
}

impl DashboardService {
    /// Creates a new dashboard service.
    pub fn new(
        users: Arc<UserRepository>,
        files: Arc<FileRepository>,
        activity: Arc<ActivityRepository>,
        storage: Arc<LocalStorage>,
        tasks: TaskService,
    ) -> Self {
        Self {
            users,
            files,
            activity,
            storage,
            tasks,
        }
    }

    /// Compute the full dashboard. Admin only.
    pub async fn dashboard(&self, ctx: &RequestContext) -> AppResult<DashboardReport> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may view the dashboard"));
        }

        let total_users = self.users.count().await?;
        let total_files = self.files.count_all().await?;

        let mut folders = Vec::new();
        let mut total_storage_bytes = 0u64;
        for entry in self.storage.list("").await? {
            if !entry.is_dir {
                continue;
            }
            let size_bytes = self.storage.dir_size(&entry.name).await?;
            total_storage_bytes += size_bytes;
            folders.push(FolderUsage {
                file_count: self.files.count_in_subtree(&entry.name).await?,
                name: entry.name,
                size_bytes,
            });
        }

        let task_metrics = self.tasks.metrics(Utc::now()).await?;

        let mut file_types: HashMap<String, u64> = HashMap::new();
        for filename in self.files.list_filenames().await? {
            let bucket = filename
                .rsplit('.')
                .next()
                .filter(|ext| *ext != filename && !ext.is_empty())
                .map(|ext| ext.to_uppercase())
                .unwrap_or_else(|| "OTHER".to_string());
            *file_types.entry(bucket).or_insert(0) += 1;
        }

        let recent_activity = self.activity.latest(10).await?;
        let users = self
            .users
            .list(None, filedepot_core::types::Pagination::new(0, 100))
            .await?
            .items
            .iter()
            .map(UserSummary::from)
            .collect();

        Ok(DashboardReport {
            total_users,
            total_files,
            folders,
            total_storage_bytes,
            task_metrics,
            file_types,
            recent_activity,
            users,
        })
    }
}
