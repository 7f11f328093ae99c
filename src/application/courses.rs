use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::application::peers::Freshness;
use crate::application::repos::{CoursesRepo, OccupancyOutcome, RepoError};
use crate::cache::{CacheAside, CacheKey};
use crate::domain::entities::{Course, CoursePatch, NewCourse, OccupancyChange};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("course not found")]
    NotFound,
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("course {} is full ({} of {})", .0.id, .0.enrolled, .0.capacity)]
    Full(Course),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Course store operations with cache-aside reads and write-through invalidation.
#[derive(Clone)]
pub struct CourseService {
    repo: Arc<dyn CoursesRepo>,
    cache: Arc<CacheAside>,
}

impl CourseService {
    pub fn new(repo: Arc<dyn CoursesRepo>, cache: Arc<CacheAside>) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    pub async fn list(&self) -> Result<Vec<Course>, CourseError> {
        self.repo.list_courses().await.map_err(CourseError::from)
    }

    pub async fn get(&self, id: i64, freshness: Freshness) -> Result<Course, CourseError> {
        let found = match freshness {
            Freshness::Cached => {
                let repo = Arc::clone(&self.repo);
                self.cache
                    .read(CacheKey::course(id), || async move {
                        repo.find_course(id).await
                    })
                    .await?
            }
            Freshness::Fresh => self.repo.find_course(id).await?,
        };
        found.ok_or(CourseError::NotFound)
    }

    pub async fn create(&self, draft: NewCourse) -> Result<Course, CourseError> {
        draft.validate()?;
        let course = self.repo.create_course(draft).await?;
        self.cache.invalidate(CacheKey::course(course.id)).await;

        info!(
            target = "application::courses::create",
            course_id = course.id,
            code = %course.code,
            "course created"
        );
        Ok(course)
    }

    pub async fn update(&self, id: i64, patch: CoursePatch) -> Result<Course, CourseError> {
        patch.validate()?;
        let updated = self.repo.update_course(id, patch).await?;
        self.cache.invalidate(CacheKey::course(id)).await;
        updated.ok_or(CourseError::NotFound)
    }

    pub async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<Course, CourseError> {
        let outcome = self.repo.adjust_occupancy(id, change).await?;
        match outcome {
            OccupancyOutcome::Applied(course) => {
                self.cache.invalidate(CacheKey::course(id)).await;
                Ok(course)
            }
            OccupancyOutcome::Full(course) => Err(CourseError::Full(course)),
            OccupancyOutcome::Missing => Err(CourseError::NotFound),
        }
    }

    pub async fn delete(&self, id: i64) -> Result<(), CourseError> {
        let removed = self.repo.delete_course(id).await?;
        self.cache.invalidate(CacheKey::course(id)).await;
        if removed {
            Ok(())
        } else {
            Err(CourseError::NotFound)
        }
    }
}
