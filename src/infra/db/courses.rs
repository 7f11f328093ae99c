use async_trait::async_trait;
use sqlx::types::Json;

use crate::{
    application::repos::{CoursesRepo, OccupancyOutcome, RepoError},
    domain::entities::{Course, CoursePatch, NewCourse, OccupancyChange},
};

use super::{PostgresRepositories, map_sqlx_error};

const COURSE_COLUMNS: &str = "id, name, code, capacity, enrolled, prerequisites";

#[derive(sqlx::FromRow)]
struct CourseRow {
    id: i64,
    name: String,
    code: String,
    capacity: i32,
    enrolled: i32,
    prerequisites: Json<Vec<String>>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            capacity: row.capacity,
            enrolled: row.enrolled,
            prerequisites: row.prerequisites.0,
        }
    }
}

#[async_trait]
impl CoursesRepo for PostgresRepositories {
    async fn list_courses(&self) -> Result<Vec<Course>, RepoError> {
        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY id"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Course::from).collect())
    }

    async fn find_course(&self, id: i64) -> Result<Option<Course>, RepoError> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Course::from))
    }

    async fn create_course(&self, draft: NewCourse) -> Result<Course, RepoError> {
        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "INSERT INTO courses (name, code, capacity, enrolled, prerequisites) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(&draft.code)
        .bind(draft.capacity)
        .bind(draft.enrolled)
        .bind(Json(&draft.prerequisites))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_course(
        &self,
        id: i64,
        patch: CoursePatch,
    ) -> Result<Option<Course>, RepoError> {
        let CoursePatch {
            name,
            code,
            capacity,
            enrolled,
            prerequisites,
        } = patch;

        let row = sqlx::query_as::<_, CourseRow>(&format!(
            "UPDATE courses \
                SET name = COALESCE($2, name), \
                    code = COALESCE($3, code), \
                    capacity = COALESCE($4, capacity), \
                    enrolled = COALESCE($5, enrolled), \
                    prerequisites = COALESCE($6, prerequisites), \
                    updated_at = now() \
              WHERE id = $1 \
              RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(name)
        .bind(code)
        .bind(capacity)
        .bind(enrolled)
        .bind(prerequisites.map(Json))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Course::from))
    }

    async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<OccupancyOutcome, RepoError> {
        // Single statement so concurrent claims serialize on the row lock.
        let applied = sqlx::query_as::<_, CourseRow>(&format!(
            "UPDATE courses \
                SET enrolled = enrolled + $2, \
                    updated_at = now() \
              WHERE id = $1 \
                AND (NOT $3 OR enrolled + $2 <= capacity) \
              RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(change.delta)
        .bind(change.enforce_capacity)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = applied {
            return Ok(OccupancyOutcome::Applied(row.into()));
        }

        Ok(match self.find_course(id).await? {
            Some(course) => OccupancyOutcome::Full(course),
            None => OccupancyOutcome::Missing,
        })
    }

    async fn delete_course(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
