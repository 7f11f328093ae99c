//! Repository behaviour against a real Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test --test live_repos -- --ignored`.

use registrar::application::repos::{
    CoursesRepo, EnrollmentsRepo, NewEnrollmentRequest, OccupancyOutcome, RepoError,
    RequestsRepo, StudentsRepo, UpdateRequestStatusParams,
};
use registrar::domain::entities::{CoursePatch, NewCourse, OccupancyChange, StudentDraft};
use registrar::domain::types::RequestStatus;
use registrar::infra::db::PostgresRepositories;
use sqlx::PgPool;
use time::OffsetDateTime;

fn draft(capacity: i32) -> NewCourse {
    NewCourse {
        name: "Web Systems".to_string(),
        code: "CS326".to_string(),
        capacity,
        enrolled: 0,
        prerequisites: vec!["CS220".to_string(), "CS240".to_string()],
    }
}

#[sqlx::test(migrations = "./migrations/courses")]
#[ignore = "requires DATABASE_URL"]
async fn course_prerequisites_keep_their_order(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let created = repos.create_course(draft(10)).await.expect("insert");
    let found = repos
        .find_course(created.id)
        .await
        .expect("select")
        .expect("present");
    assert_eq!(found.prerequisites, vec!["CS220", "CS240"]);

    let updated = repos
        .update_course(created.id, CoursePatch::enrolled(-1))
        .await
        .expect("update")
        .expect("present");
    assert_eq!(updated.enrolled, -1);
    assert!(repos.update_course(9_999, CoursePatch::default()).await.expect("update").is_none());
}

#[sqlx::test(migrations = "./migrations/courses")]
#[ignore = "requires DATABASE_URL"]
async fn conditional_occupancy_respects_capacity(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let course = repos.create_course(draft(1)).await.expect("insert");

    let first = repos
        .adjust_occupancy(course.id, OccupancyChange::claim_seat())
        .await
        .expect("claim");
    assert!(matches!(first, OccupancyOutcome::Applied(ref c) if c.enrolled == 1));

    let second = repos
        .adjust_occupancy(course.id, OccupancyChange::claim_seat())
        .await
        .expect("claim");
    assert!(matches!(second, OccupancyOutcome::Full(ref c) if c.enrolled == 1));

    let missing = repos
        .adjust_occupancy(9_999, OccupancyChange::release_seat())
        .await
        .expect("release");
    assert_eq!(missing, OccupancyOutcome::Missing);
}

#[sqlx::test(migrations = "./migrations/students")]
#[ignore = "requires DATABASE_URL"]
async fn student_replace_overwrites_completed_courses(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let student = repos
        .create_student(StudentDraft {
            name: "Ada".to_string(),
            completed_courses: vec!["CS101".to_string()],
        })
        .await
        .expect("insert");
    let replaced = repos
        .replace_student(
            student.id,
            StudentDraft {
                name: "Ada L.".to_string(),
                completed_courses: Vec::new(),
            },
        )
        .await
        .expect("replace")
        .expect("present");
    assert!(replaced.completed_courses.is_empty());
    assert!(repos.delete_student(student.id).await.expect("delete"));
    assert!(!repos.delete_student(student.id).await.expect("delete"));
}

#[sqlx::test(migrations = "./migrations/enrollment")]
#[ignore = "requires DATABASE_URL"]
async fn enrollment_persistence_is_idempotent_per_request(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);

    let first = repos
        .persist_enrollment("req-1", 1, 2)
        .await
        .expect("insert");
    assert!(first.created);
    assert!(!first.occupancy_applied);

    repos
        .mark_occupancy_applied(first.enrollment.id)
        .await
        .expect("flag");
    let again = repos
        .persist_enrollment("req-1", 1, 2)
        .await
        .expect("conflict returns existing row");
    assert!(!again.created);
    assert!(again.occupancy_applied);
    assert_eq!(again.enrollment, first.enrollment);

    let other = repos
        .persist_enrollment("req-2", 1, 2)
        .await
        .expect("same pair, new submission");
    assert_ne!(other.enrollment.id, first.enrollment.id);
    assert_eq!(repos.list_for_student(1).await.expect("list").len(), 2);

    assert_eq!(
        repos.discard_unapplied("req-1").await.expect("discard"),
        None,
        "applied rows are kept"
    );
    assert_eq!(
        repos.discard_unapplied("req-2").await.expect("discard"),
        Some(other.enrollment)
    );

    let removed = repos
        .delete_enrollment(first.enrollment.id)
        .await
        .expect("delete")
        .expect("present");
    assert_eq!(removed.enrollment, first.enrollment);
    assert!(removed.occupancy_applied);
    assert!(matches!(
        repos.mark_occupancy_applied(9_999).await,
        Err(RepoError::NotFound)
    ));
}

#[sqlx::test(migrations = "./migrations/enrollment")]
#[ignore = "requires DATABASE_URL"]
async fn request_ledger_tracks_status(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos
        .record_request(NewEnrollmentRequest {
            request_id: "req-9".to_string(),
            student_id: 3,
            course_id: 4,
            submitted_at: OffsetDateTime::now_utc(),
        })
        .await
        .expect("record");

    repos
        .update_request_status(UpdateRequestStatusParams {
            request_id: "req-9".to_string(),
            status: RequestStatus::Rejected,
            detail: Some("Course is full".to_string()),
            enrollment_id: None,
        })
        .await
        .expect("update");

    let record = repos
        .find_request("req-9")
        .await
        .expect("select")
        .expect("present");
    assert_eq!(record.status, RequestStatus::Rejected);
    assert_eq!(record.detail.as_deref(), Some("Course is full"));
    assert!(repos.find_request("missing").await.expect("select").is_none());
}
