use std::convert::TryFrom;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{
        NewDeadLetter, NewEnrollmentRequest, RepoError, RequestsRepo, UpdateRequestStatusParams,
    },
    domain::{
        entities::{DeadLetterRecord, EnrollmentRequestRecord},
        types::RequestStatus,
    },
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct RequestRow {
    request_id: String,
    student_id: i64,
    course_id: i64,
    status: String,
    detail: Option<String>,
    enrollment_id: Option<i64>,
    submitted_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<RequestRow> for EnrollmentRequestRecord {
    type Error = RepoError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = RequestStatus::try_from(row.status.as_str()).map_err(|_| {
            RepoError::from_persistence(format!("unknown request status `{}`", row.status))
        })?;

        Ok(Self {
            request_id: row.request_id,
            student_id: row.student_id,
            course_id: row.course_id,
            status,
            detail: row.detail,
            enrollment_id: row.enrollment_id,
            submitted_at: row.submitted_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeadLetterRow {
    id: i64,
    request_id: String,
    student_id: i64,
    course_id: i64,
    attempts: i32,
    last_error: String,
    failed_at: OffsetDateTime,
}

impl From<DeadLetterRow> for DeadLetterRecord {
    fn from(row: DeadLetterRow) -> Self {
        Self {
            id: row.id,
            request_id: row.request_id,
            student_id: row.student_id,
            course_id: row.course_id,
            attempts: row.attempts,
            last_error: row.last_error,
            failed_at: row.failed_at,
        }
    }
}

#[async_trait]
impl RequestsRepo for PostgresRepositories {
    async fn record_request(&self, request: NewEnrollmentRequest) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO enrollment_requests
                (request_id, student_id, course_id, status, submitted_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            "#,
        )
        .bind(&request.request_id)
        .bind(request.student_id)
        .bind(request.course_id)
        .bind(RequestStatus::Pending.as_str())
        .bind(request.submitted_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update_request_status(
        &self,
        params: UpdateRequestStatusParams,
    ) -> Result<(), RepoError> {
        let UpdateRequestStatusParams {
            request_id,
            status,
            detail,
            enrollment_id,
        } = params;

        let result = sqlx::query(
            r#"
            UPDATE enrollment_requests
               SET status = $2,
                   detail = $3,
                   enrollment_id = $4,
                   updated_at = now()
             WHERE request_id = $1
            "#,
        )
        .bind(&request_id)
        .bind(status.as_str())
        .bind(detail)
        .bind(enrollment_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_request(
        &self,
        request_id: &str,
    ) -> Result<Option<EnrollmentRequestRecord>, RepoError> {
        let row = sqlx::query_as::<_, RequestRow>(
            r#"
            SELECT request_id, student_id, course_id, status, detail, enrollment_id,
                   submitted_at, updated_at
            FROM enrollment_requests
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(EnrollmentRequestRecord::try_from).transpose()
    }

    async fn record_dead_letter(
        &self,
        letter: NewDeadLetter,
    ) -> Result<DeadLetterRecord, RepoError> {
        let row = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            INSERT INTO enrollment_dead_letters
                (request_id, student_id, course_id, attempts, last_error)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, request_id, student_id, course_id, attempts, last_error, failed_at
            "#,
        )
        .bind(&letter.request_id)
        .bind(letter.student_id)
        .bind(letter.course_id)
        .bind(letter.attempts)
        .bind(&letter.last_error)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetterRecord>, RepoError> {
        let rows = sqlx::query_as::<_, DeadLetterRow>(
            r#"
            SELECT id, request_id, student_id, course_id, attempts, last_error, failed_at
            FROM enrollment_dead_letters
            ORDER BY failed_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(DeadLetterRecord::from).collect())
    }
}
