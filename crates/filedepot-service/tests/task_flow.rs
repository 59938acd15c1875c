//! Assignment, status transitions, overdue computation, and metrics.

mod common;

use chrono::{Duration, Utc};
use common::*;
use filedepot_core::types::Pagination;
use filedepot_core::ErrorKind;
use filedepot_entity::file::TaskStatus;
use filedepot_service::task::AssignRequest;

#[tokio::test]
async fn assign_resets_status_and_notifies_the_assignee() {
    let env = setup().await;
    let record = upload(&env, &env.admin_ctx, "/", "task.pdf", b"work").await;

    // Members cannot assign.
    let err = env
        .services
        .tasks
        .assign(
            &env.member_ctx,
            AssignRequest {
                file_id: record.id,
                assignee_id: env.member.id,
                instruction: None,
                due_date: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    let due = Utc::now() + Duration::days(2);
    let assigned = env
        .services
        .tasks
        .assign(
            &env.admin_ctx,
            AssignRequest {
                file_id: record.id,
                assignee_id: env.member.id,
                instruction: Some("Review and sign".to_string()),
                due_date: Some(due),
            },
        )
        .await
        .unwrap();
    assert_eq!(assigned.assigned_to_id, Some(env.member.id));
    assert_eq!(assigned.status, TaskStatus::Pending);

    let inbox = env
        .services
        .notifications
        .list(&env.member_ctx, true, Pagination::default())
        .await
        .unwrap();
    assert_eq!(inbox.items.len(), 1);
    assert!(inbox.items[0].is_urgent);
    assert_eq!(inbox.items[0].related_file_id, Some(record.id));
}

#[tokio::test]
async fn status_updates_are_gated_and_validated() {
    let env = setup().await;
    let record = upload(&env, &env.admin_ctx, "/", "task.pdf", b"work").await;
    env.services
        .tasks
        .assign(
            &env.admin_ctx,
            AssignRequest {
                file_id: record.id,
                assignee_id: env.member.id,
                instruction: None,
                due_date: None,
            },
        )
        .await
        .unwrap();

    // Garbage input is rejected before anything else happens.
    let err = env
        .services
        .tasks
        .set_status(&env.member_ctx, record.id, "finished!!")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidTransition);

    // The assignee may move the status.
    let updated = env
        .services
        .tasks
        .set_status(&env.member_ctx, record.id, "in_progress")
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::InProgress);

    // A non-assignee non-admin may not.
    let unassigned = upload(&env, &env.admin_ctx, "/", "other.pdf", b"x").await;
    let err = env
        .services
        .tasks
        .set_status(&env.member_ctx, unassigned.id, "done")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);

    // Admins always may.
    env.services
        .tasks
        .set_status(&env.admin_ctx, record.id, "done")
        .await
        .unwrap();
}

#[tokio::test]
async fn completion_rate_divides_safely_and_rounds() {
    let env = setup().await;

    // Nothing assigned: rate is 0, not an error.
    let metrics = env.services.tasks.metrics(Utc::now()).await.unwrap();
    assert_eq!(metrics.total_assigned, 0);
    assert_eq!(metrics.completion_rate, 0);

    for i in 0..4 {
        let record = upload(&env, &env.admin_ctx, "/", &format!("t{i}.pdf"), b"x").await;
        env.services
            .tasks
            .assign(
                &env.admin_ctx,
                AssignRequest {
                    file_id: record.id,
                    assignee_id: env.member.id,
                    instruction: None,
                    due_date: None,
                },
            )
            .await
            .unwrap();
        if i < 3 {
            env.services
                .tasks
                .set_status(&env.member_ctx, record.id, "done")
                .await
                .unwrap();
        }
    }

    let metrics = env.services.tasks.metrics(Utc::now()).await.unwrap();
    assert_eq!(metrics.total_assigned, 4);
    assert_eq!(metrics.completed, 3);
    assert_eq!(metrics.pending, 1);
    assert_eq!(metrics.completion_rate, 75);
}

#[tokio::test]
async fn overdue_is_computed_never_stored() {
    let env = setup().await;
    let record = upload(&env, &env.admin_ctx, "/", "late.pdf", b"x").await;
    env.services
        .tasks
        .assign(
            &env.admin_ctx,
            AssignRequest {
                file_id: record.id,
                assignee_id: env.member.id,
                instruction: None,
                due_date: Some(Utc::now() - Duration::hours(1)),
            },
        )
        .await
        .unwrap();

    // Past due and pending: overdue, with no write in between.
    let metrics = env.services.tasks.metrics(Utc::now()).await.unwrap();
    assert_eq!(metrics.overdue, 1);

    // Done clears it even though the due date is still in the past.
    env.services
        .tasks
        .set_status(&env.member_ctx, record.id, "done")
        .await
        .unwrap();
    let metrics = env.services.tasks.metrics(Utc::now()).await.unwrap();
    assert_eq!(metrics.overdue, 0);

    // And the record-level predicate agrees when evaluated in the past,
    // before the due date: a pure function of its inputs.
    let fetched = env
        .services
        .tasks
        .assigned_to_me(&env.member_ctx)
        .await
        .unwrap();
    let late = fetched.iter().find(|r| r.id == record.id).unwrap();
    assert!(!late.is_overdue(Utc::now() - Duration::hours(2)));
}

#[tokio::test]
async fn instruction_update_is_owner_or_admin() {
    let env = setup().await;
    let record = upload(&env, &env.member_ctx, "/", "doc.pdf", b"x").await;

    let updated = env
        .services
        .tasks
        .update_instruction(&env.member_ctx, record.id, "Final review by Friday")
        .await
        .unwrap();
    assert_eq!(updated.instruction.as_deref(), Some("Final review by Friday"));

    let admins = upload(&env, &env.admin_ctx, "/", "admin.pdf", b"x").await;
    let err = env
        .services
        .tasks
        .update_instruction(&env.member_ctx, admins.id, "nope")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

#[tokio::test]
async fn due_reminders_fire_once_per_unread_window() {
    let env = setup().await;
    let record = upload(&env, &env.admin_ctx, "/", "soon.pdf", b"x").await;
    env.services
        .tasks
        .assign(
            &env.admin_ctx,
            AssignRequest {
                file_id: record.id,
                assignee_id: env.member.id,
                instruction: None,
                due_date: Some(Utc::now() + Duration::hours(12)),
            },
        )
        .await
        .unwrap();

    let now = Utc::now();
    let created = env
        .services
        .notifications
        .remind_due_tasks(now, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(created, 1);

    // A second scan with the reminder still unread creates nothing.
    let created = env
        .services
        .notifications
        .remind_due_tasks(now, Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(created, 0);
}
