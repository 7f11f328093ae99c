use std::sync::Arc;

use thiserror::Error;

use crate::application::peers::Freshness;
use crate::application::repos::{RepoError, StudentsRepo};
use crate::cache::{CacheAside, CacheKey};
use crate::domain::entities::{Student, StudentDraft};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum StudentError {
    #[error("student not found")]
    NotFound,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct StudentService {
    repo: Arc<dyn StudentsRepo>,
    cache: Arc<CacheAside>,
}

impl StudentService {
    pub fn new(repo: Arc<dyn StudentsRepo>, cache: Arc<CacheAside>) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    pub async fn list(&self) -> Result<Vec<Student>, StudentError> {
        self.repo.list_students().await.map_err(StudentError::from)
    }

    pub async fn get(&self, id: i64, freshness: Freshness) -> Result<Student, StudentError> {
        let found = match freshness {
            Freshness::Cached => {
                let repo = Arc::clone(&self.repo);
                self.cache
                    .read(CacheKey::student(id), || async move {
                        repo.find_student(id).await
                    })
                    .await?
            }
            Freshness::Fresh => self.repo.find_student(id).await?,
        };
        found.ok_or(StudentError::NotFound)
    }

    pub async fn create(&self, draft: StudentDraft) -> Result<Student, StudentError> {
        draft.validate()?;
        let student = self.repo.create_student(draft).await?;
        self.cache.invalidate(CacheKey::student(student.id)).await;
        Ok(student)
    }

    /// Full replacement of name and completed courses.
    pub async fn replace(&self, id: i64, draft: StudentDraft) -> Result<Student, StudentError> {
        draft.validate()?;
        let replaced = self.repo.replace_student(id, draft).await?;
        self.cache.invalidate(CacheKey::student(id)).await;
        replaced.ok_or(StudentError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StudentError> {
        let removed = self.repo.delete_student(id).await?;
        self.cache.invalidate(CacheKey::student(id)).await;
        if removed {
            Ok(())
        } else {
            Err(StudentError::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cache::{CacheConfig, MemoryCacheStore};
    use crate::test_support::InMemoryStudents;

    fn service() -> (StudentService, Arc<InMemoryStudents>) {
        let repo = Arc::new(InMemoryStudents::default());
        let cache = Arc::new(CacheAside::new(
            Arc::new(MemoryCacheStore::new(&CacheConfig::default())),
            Duration::from_secs(300),
        ));
        (StudentService::new(repo.clone(), cache), repo)
    }

    fn draft(completed: &[&str]) -> StudentDraft {
        StudentDraft {
            name: "Grace".to_string(),
            completed_courses: completed.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn replace_invalidates_cached_snapshot() {
        let (service, _) = service();
        let student = service.create(draft(&["CS101"])).await.expect("create");
        let cached = service
            .get(student.id, Freshness::Cached)
            .await
            .expect("get");
        assert_eq!(cached.completed_courses, vec!["CS101".to_string()]);

        service
            .replace(student.id, draft(&["CS101", "CS220"]))
            .await
            .expect("replace");
        let reread = service
            .get(student.id, Freshness::Cached)
            .await
            .expect("get");
        assert_eq!(reread.completed_courses.len(), 2);
        assert_eq!(service.cache().stats().hits, 0);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found_without_caching_absence() {
        let (service, repo) = service();
        let student = service.create(draft(&[])).await.expect("create");
        service.delete(student.id).await.expect("delete");

        for _ in 0..2 {
            assert!(matches!(
                service.get(student.id, Freshness::Cached).await,
                Err(StudentError::NotFound)
            ));
        }
        assert_eq!(repo.find_calls(), 2);
    }
}
