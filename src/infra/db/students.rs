use async_trait::async_trait;
use sqlx::types::Json;

use crate::{
    application::repos::{RepoError, StudentsRepo},
    domain::entities::{Student, StudentDraft},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct StudentRow {
    id: i64,
    name: String,
    completed_courses: Json<Vec<String>>,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            completed_courses: row.completed_courses.0,
        }
    }
}

#[async_trait]
impl StudentsRepo for PostgresRepositories {
    async fn list_students(&self) -> Result<Vec<Student>, RepoError> {
        let rows = sqlx::query_as::<_, StudentRow>(
            "SELECT id, name, completed_courses FROM students ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Student::from).collect())
    }

    async fn find_student(&self, id: i64) -> Result<Option<Student>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(
            "SELECT id, name, completed_courses FROM students WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Student::from))
    }

    async fn create_student(&self, draft: StudentDraft) -> Result<Student, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            INSERT INTO students (name, completed_courses)
            VALUES ($1, $2)
            RETURNING id, name, completed_courses
            "#,
        )
        .bind(&draft.name)
        .bind(Json(&draft.completed_courses))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn replace_student(
        &self,
        id: i64,
        draft: StudentDraft,
    ) -> Result<Option<Student>, RepoError> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            UPDATE students
               SET name = $2,
                   completed_courses = $3,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, completed_courses
            "#,
        )
        .bind(id)
        .bind(&draft.name)
        .bind(Json(&draft.completed_courses))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Student::from))
    }

    async fn delete_student(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
