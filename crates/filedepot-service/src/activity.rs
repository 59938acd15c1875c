//! Best-effort activity logging.

use std::sync::Arc;

use chrono::Utc;
use tracing::error;
use uuid::Uuid;

use filedepot_core::types::{Page, Pagination};
use filedepot_core::{AppError, AppResult};
use filedepot_database::repositories::ActivityRepository;
use filedepot_entity::activity::{ActivityAction, ActivityEntry};

use crate::context::RequestContext;

/// Records every mutating action, and never gets in the way.
///
/// A failed log write is reported to the error channel and swallowed:
/// logging is observability, not a correctness mechanism, so it must not
/// roll back or block the operation it describes.
#[derive(Debug, Clone)]
pub struct ActivityLogger {
    /// Activity repository.
    repo: Arc<ActivityRepository>,
}

impl ActivityLogger {
    /// Creates a new activity logger.
    pub fn new(repo: Arc<ActivityRepository>) -> Self {
        Self { repo }
    }

    /// Append an entry, swallowing failures.
    pub async fn record(
        &self,
        actor: Option<Uuid>,
        action: ActivityAction,
        details: impl Into<String>,
    ) {
        let entry = ActivityEntry {
            id: Uuid::new_v4(),
            user_id: actor,
            action,
            details: details.into(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.repo.append(&entry).await {
            error!(error = %e, action = ?action, "Failed to write activity log entry");
        }
    }

    /// Query the log, newest first. Admin-only.
    pub async fn recent(
        &self,
        ctx: &RequestContext,
        page: Pagination,
    ) -> AppResult<Page<ActivityEntry>> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may read the activity log"));
        }
        self.repo.recent(page).await
    }

    /// Administrative purge: delete every entry, then append a `PurgeLog`
    /// entry recording the count, so the purge itself stays audited.
    pub async fn purge(&self, ctx: &RequestContext) -> AppResult<u64> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may purge the activity log"));
        }
        let removed = self.repo.purge_all().await?;
        self.record(
            Some(ctx.user_id),
            ActivityAction::PurgeLog,
            format!("Purged {removed} activity log entries"),
        )
        .await;
        Ok(removed)
    }
}
