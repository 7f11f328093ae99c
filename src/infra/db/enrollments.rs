use async_trait::async_trait;

use crate::{
    application::repos::{EnrollmentsRepo, RepoError},
    domain::entities::{Enrollment, PersistedEnrollment, RemovedEnrollment},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct EnrollmentRow {
    id: i64,
    student_id: i64,
    course_id: i64,
}

impl From<EnrollmentRow> for Enrollment {
    fn from(row: EnrollmentRow) -> Self {
        Self {
            id: row.id,
            student_id: row.student_id,
            course_id: row.course_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PersistedRow {
    id: i64,
    student_id: i64,
    course_id: i64,
    occupancy_applied: bool,
}

impl PersistedRow {
    fn into_persisted(self, created: bool) -> PersistedEnrollment {
        PersistedEnrollment {
            enrollment: Enrollment {
                id: self.id,
                student_id: self.student_id,
                course_id: self.course_id,
            },
            created,
            occupancy_applied: self.occupancy_applied,
        }
    }
}

#[async_trait]
impl EnrollmentsRepo for PostgresRepositories {
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, RepoError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            "SELECT id, student_id, course_id FROM enrollments ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Enrollment::from).collect())
    }

    async fn list_for_student(&self, student_id: i64) -> Result<Vec<Enrollment>, RepoError> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            "SELECT id, student_id, course_id FROM enrollments WHERE student_id = $1 ORDER BY id",
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Enrollment::from).collect())
    }

    async fn persist_enrollment(
        &self,
        request_id: &str,
        student_id: i64,
        course_id: i64,
    ) -> Result<PersistedEnrollment, RepoError> {
        let inserted = sqlx::query_as::<_, PersistedRow>(
            r#"
            INSERT INTO enrollments (request_id, student_id, course_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id) DO NOTHING
            RETURNING id, student_id, course_id, occupancy_applied
            "#,
        )
        .bind(request_id)
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok(row.into_persisted(true));
        }

        let existing = sqlx::query_as::<_, PersistedRow>(
            r#"
            SELECT id, student_id, course_id, occupancy_applied
            FROM enrollments
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(existing.into_persisted(false))
    }

    async fn mark_occupancy_applied(&self, enrollment_id: i64) -> Result<(), RepoError> {
        let result =
            sqlx::query("UPDATE enrollments SET occupancy_applied = TRUE WHERE id = $1")
                .bind(enrollment_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_enrollment(&self, id: i64) -> Result<Option<RemovedEnrollment>, RepoError> {
        let row = sqlx::query_as::<_, PersistedRow>(
            r#"
            DELETE FROM enrollments
            WHERE id = $1
            RETURNING id, student_id, course_id, occupancy_applied
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| {
            let persisted = row.into_persisted(false);
            RemovedEnrollment {
                enrollment: persisted.enrollment,
                occupancy_applied: persisted.occupancy_applied,
            }
        }))
    }

    async fn discard_unapplied(&self, request_id: &str) -> Result<Option<Enrollment>, RepoError> {
        let row = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            DELETE FROM enrollments
            WHERE request_id = $1 AND NOT occupancy_applied
            RETURNING id, student_id, course_id
            "#,
        )
        .bind(request_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Enrollment::from))
    }
}
