//! Task/assignment engine: assigns files to users, tracks status, and
//! aggregates the dashboard task metrics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use filedepot_core::{AppError, AppResult};
use filedepot_database::repositories::{FileRepository, NotificationRepository, UserRepository};
use filedepot_entity::activity::ActivityAction;
use filedepot_entity::file::{FileRecord, TaskStatus};
use filedepot_entity::notification::Notification;

use crate::activity::ActivityLogger;
use crate::context::RequestContext;

/// Parameters for assigning a file as a task.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct AssignRequest {
    /// The file to assign.
    pub file_id: Uuid,
    /// The user who should work it.
    pub assignee_id: Uuid,
    /// Work instruction.
    #[validate(length(max = 2000))]
    pub instruction: Option<String>,
    /// Due date.
    pub due_date: Option<DateTime<Utc>>,
}

/// Aggregate task numbers for the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Files currently assigned to someone.
    pub total_assigned: i64,
    /// Assigned files marked done.
    pub completed: i64,
    /// Assigned files still pending.
    pub pending: i64,
    /// Assigned files in progress.
    pub in_progress: i64,
    /// Files overdue at the evaluation instant.
    pub overdue: i64,
    /// `completed / total_assigned * 100`, rounded; 0 when nothing is
    /// assigned.
    pub completion_rate: u32,
}

/// Assigns files, moves task status, and computes metrics.
#[derive(Debug, Clone)]
pub struct TaskService {
    files: Arc<FileRepository>,
    users: Arc<UserRepository>,
    notifications: Arc<NotificationRepository>,
    activity: ActivityLogger,
}

impl TaskService {
    /// Creates a new task service.
    pub fn new(
        files: Arc<FileRepository>,
        users: Arc<UserRepository>,
        notifications: Arc<NotificationRepository>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            files,
            users,
            notifications,
            activity,
        }
    }

    /// Assign a file to a user. Admin only.
    ///
    /// Status resets to `Pending` and the assignee gets a `task_assigned`
    /// notification (urgent when a due date is attached).
    pub async fn assign(&self, ctx: &RequestContext, req: AssignRequest) -> AppResult<FileRecord> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may assign tasks"));
        }
        req.validate()
            .map_err(|e| AppError::validation(e.to_string()))?;

        let assignee = self
            .users
            .find_by_id(req.assignee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {} not found", req.assignee_id)))?;

        let mut record = self.require_file(req.file_id).await?;
        record.assigned_to_id = Some(assignee.id);
        if req.instruction.is_some() {
            record.instruction = req.instruction.clone();
        }
        record.due_date = req.due_date;
        record.status = TaskStatus::Pending;
        record.updated_at = Utc::now();
        let record = self.files.update(&record).await?;

        if assignee.id != ctx.user_id {
            let notification = Notification::task_assigned(
                assignee.id,
                &record.filename,
                record.id,
                req.due_date.is_some(),
            );
            if let Err(e) = self.notifications.create(&notification).await {
                warn!(error = %e, "Failed to create assignment notification");
            }
        }

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::Assign,
                format!("Assigned {} to {}", record.filename, assignee.username),
            )
            .await;

        info!(file_id = %record.id, assignee = %assignee.username, "Assigned task");
        Ok(record)
    }

    /// Update a file's task status.
    ///
    /// Only the current assignee or an admin may move it; the raw status
    /// string is parsed first, so garbage fails with `InvalidTransition`
    /// before any authorization or lookup side effects are observable to
    /// the caller.
    pub async fn set_status(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        new_status: &str,
    ) -> AppResult<FileRecord> {
        let status: TaskStatus = new_status.parse()?;
        let mut record = self.require_file(file_id).await?;

        if !ctx.is_admin() && record.assigned_to_id != Some(ctx.user_id) {
            return Err(AppError::forbidden(
                "Only the assignee or an administrator may update status",
            ));
        }

        let previous = record.status;
        record.status = status;
        record.updated_at = Utc::now();
        let record = self.files.update(&record).await?;

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::StatusChange,
                format!(
                    "Changed status of {} from {previous} to {status}",
                    record.filename
                ),
            )
            .await;
        Ok(record)
    }

    /// Update the work instruction. Owner or admin.
    pub async fn update_instruction(
        &self,
        ctx: &RequestContext,
        file_id: Uuid,
        instruction: &str,
    ) -> AppResult<FileRecord> {
        let mut record = self.require_file(file_id).await?;
        if !ctx.can_modify(&record) {
            return Err(AppError::forbidden("Not authorized to update this file"));
        }

        record.instruction = Some(instruction.to_string());
        record.updated_at = Utc::now();
        let record = self.files.update(&record).await?;

        self.activity
            .record(
                Some(ctx.user_id),
                ActivityAction::UpdateInstruction,
                format!("Updated instruction for {}", record.filename),
            )
            .await;
        Ok(record)
    }

    /// Files assigned to the calling user.
    pub async fn assigned_to_me(&self, ctx: &RequestContext) -> AppResult<Vec<FileRecord>> {
        self.files.assigned_to(ctx.user_id).await
    }

    /// Every assigned file. Admin only.
    pub async fn all_assigned(&self, ctx: &RequestContext) -> AppResult<Vec<FileRecord>> {
        if !ctx.is_admin() {
            return Err(AppError::forbidden("Only administrators may list all assignments"));
        }
        self.files.all_assigned().await
    }

    /// Aggregate task metrics at `now`.
    ///
    /// Overdue is counted with the same pure predicate the entity exposes;
    /// nothing is read from a stored flag. Zero assignments yield a
    /// completion rate of 0, not an error.
    pub async fn metrics(&self, now: DateTime<Utc>) -> AppResult<TaskMetrics> {
        let total_assigned = self.files.count_assigned().await?;
        let completed = self
            .files
            .count_assigned_with_status(TaskStatus::Done)
            .await?;
        let pending = self
            .files
            .count_assigned_with_status(TaskStatus::Pending)
            .await?;
        let in_progress = self
            .files
            .count_assigned_with_status(TaskStatus::InProgress)
            .await?;
        let overdue = self.files.count_overdue(now).await?;

        let completion_rate = if total_assigned == 0 {
            0
        } else {
            ((completed as f64 / total_assigned as f64) * 100.0).round() as u32
        };

        Ok(TaskMetrics {
            total_assigned,
            completed,
            pending,
            in_progress,
            overdue,
            completion_rate,
        })
    }

    async fn require_file(&self, file_id: Uuid) -> AppResult<FileRecord> {
        self.files
            .find_by_id(file_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }
}
