//! In-memory ports for unit and integration tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::application::courses::{CourseError, CourseService};
use crate::application::jobs::WorkItem;
use crate::application::peers::{CourseDirectory, Freshness, PeerError, StudentDirectory};
use crate::application::repos::{
    CoursesRepo, EnrollmentQueue, EnrollmentsRepo, NewDeadLetter, NewEnrollmentRequest,
    OccupancyOutcome, RepoError, RequestsRepo, StudentsRepo, UpdateRequestStatusParams,
};
use crate::application::students::{StudentError, StudentService};
use crate::cache::{CacheAside, CacheConfig, MemoryCacheStore};
use crate::domain::entities::{
    Course, CoursePatch, DeadLetterRecord, Enrollment, EnrollmentRequestRecord, NewCourse,
    OccupancyChange, PersistedEnrollment, RemovedEnrollment, Student, StudentDraft,
};
use crate::domain::types::RequestStatus;

/// Memory-backed cache with the production TTL.
pub fn memory_cache() -> Arc<CacheAside> {
    Arc::new(CacheAside::new(
        Arc::new(MemoryCacheStore::new(&CacheConfig::default())),
        Duration::from_secs(300),
    ))
}

#[derive(Default)]
pub struct InMemoryCourses {
    rows: Mutex<BTreeMap<i64, Course>>,
    next_id: AtomicUsize,
    finds: AtomicUsize,
}

impl InMemoryCourses {
    /// Number of point lookups that reached the store.
    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<Course> {
        self.rows.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl CoursesRepo for InMemoryCourses {
    async fn list_courses(&self) -> Result<Vec<Course>, RepoError> {
        Ok(self.snapshot().await)
    }

    async fn find_course(&self, id: i64) -> Result<Option<Course>, RepoError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn create_course(&self, draft: NewCourse) -> Result<Course, RepoError> {
        let id = next_id(&self.next_id);
        let course = Course {
            id,
            name: draft.name,
            code: draft.code,
            capacity: draft.capacity,
            enrolled: draft.enrolled,
            prerequisites: draft.prerequisites,
        };
        self.rows.lock().await.insert(id, course.clone());
        Ok(course)
    }

    async fn update_course(
        &self,
        id: i64,
        patch: CoursePatch,
    ) -> Result<Option<Course>, RepoError> {
        let mut rows = self.rows.lock().await;
        Ok(rows.get_mut(&id).map(|course| {
            patch.apply(course);
            course.clone()
        }))
    }

    async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<OccupancyOutcome, RepoError> {
        let mut rows = self.rows.lock().await;
        let Some(course) = rows.get_mut(&id) else {
            return Ok(OccupancyOutcome::Missing);
        };
        if change.enforce_capacity && course.enrolled + change.delta > course.capacity {
            return Ok(OccupancyOutcome::Full(course.clone()));
        }
        course.enrolled += change.delta;
        Ok(OccupancyOutcome::Applied(course.clone()))
    }

    async fn delete_course(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryStudents {
    rows: Mutex<BTreeMap<i64, Student>>,
    next_id: AtomicUsize,
    finds: AtomicUsize,
}

impl InMemoryStudents {
    pub fn find_calls(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StudentsRepo for InMemoryStudents {
    async fn list_students(&self) -> Result<Vec<Student>, RepoError> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }

    async fn find_student(&self, id: i64) -> Result<Option<Student>, RepoError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().await.get(&id).cloned())
    }

    async fn create_student(&self, draft: StudentDraft) -> Result<Student, RepoError> {
        let id = next_id(&self.next_id);
        let student = Student {
            id,
            name: draft.name,
            completed_courses: draft.completed_courses,
        };
        self.rows.lock().await.insert(id, student.clone());
        Ok(student)
    }

    async fn replace_student(
        &self,
        id: i64,
        draft: StudentDraft,
    ) -> Result<Option<Student>, RepoError> {
        let mut rows = self.rows.lock().await;
        Ok(rows.get_mut(&id).map(|student| {
            student.name = draft.name;
            student.completed_courses = draft.completed_courses;
            student.clone()
        }))
    }

    async fn delete_student(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.rows.lock().await.remove(&id).is_some())
    }
}

#[derive(Debug, Clone)]
struct EnrollmentRow {
    enrollment: Enrollment,
    request_id: String,
    occupancy_applied: bool,
}

#[derive(Default)]
pub struct InMemoryEnrollments {
    rows: Mutex<BTreeMap<i64, EnrollmentRow>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryEnrollments {
    /// While set, every write fails with a persistence error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn insert(&self, student_id: i64, course_id: i64) -> Enrollment {
        let id = next_id(&self.next_id);
        let enrollment = Enrollment {
            id,
            student_id,
            course_id,
        };
        self.rows.lock().await.insert(
            id,
            EnrollmentRow {
                enrollment: enrollment.clone(),
                request_id: format!("seed-{id}"),
                occupancy_applied: true,
            },
        );
        enrollment
    }

    fn check_writable(&self) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(RepoError::Persistence("enrollments store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EnrollmentsRepo for InMemoryEnrollments {
    async fn list_enrollments(&self) -> Result<Vec<Enrollment>, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .map(|row| row.enrollment.clone())
            .collect())
    }

    async fn list_for_student(&self, student_id: i64) -> Result<Vec<Enrollment>, RepoError> {
        Ok(self
            .rows
            .lock()
            .await
            .values()
            .filter(|row| row.enrollment.student_id == student_id)
            .map(|row| row.enrollment.clone())
            .collect())
    }

    async fn persist_enrollment(
        &self,
        request_id: &str,
        student_id: i64,
        course_id: i64,
    ) -> Result<PersistedEnrollment, RepoError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.values().find(|row| row.request_id == request_id) {
            return Ok(PersistedEnrollment {
                enrollment: row.enrollment.clone(),
                created: false,
                occupancy_applied: row.occupancy_applied,
            });
        }

        let id = next_id(&self.next_id);
        let enrollment = Enrollment {
            id,
            student_id,
            course_id,
        };
        rows.insert(
            id,
            EnrollmentRow {
                enrollment: enrollment.clone(),
                request_id: request_id.to_string(),
                occupancy_applied: false,
            },
        );
        Ok(PersistedEnrollment {
            enrollment,
            created: true,
            occupancy_applied: false,
        })
    }

    async fn mark_occupancy_applied(&self, enrollment_id: i64) -> Result<(), RepoError> {
        self.check_writable()?;
        match self.rows.lock().await.get_mut(&enrollment_id) {
            Some(row) => {
                row.occupancy_applied = true;
                Ok(())
            }
            None => Err(RepoError::NotFound),
        }
    }

    async fn delete_enrollment(&self, id: i64) -> Result<Option<RemovedEnrollment>, RepoError> {
        self.check_writable()?;
        Ok(self
            .rows
            .lock()
            .await
            .remove(&id)
            .map(|row| RemovedEnrollment {
                enrollment: row.enrollment,
                occupancy_applied: row.occupancy_applied,
            }))
    }

    async fn discard_unapplied(&self, request_id: &str) -> Result<Option<Enrollment>, RepoError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().await;
        let id = rows
            .values()
            .find(|row| row.request_id == request_id && !row.occupancy_applied)
            .map(|row| row.enrollment.id);
        Ok(id.and_then(|id| rows.remove(&id)).map(|row| row.enrollment))
    }
}

#[derive(Default)]
pub struct InMemoryRequests {
    rows: Mutex<BTreeMap<String, EnrollmentRequestRecord>>,
    dead_letters: Mutex<Vec<DeadLetterRecord>>,
}

#[async_trait]
impl RequestsRepo for InMemoryRequests {
    async fn record_request(&self, request: NewEnrollmentRequest) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(&request.request_id) {
            return Err(RepoError::Duplicate {
                constraint: "enrollment_requests_pkey".to_string(),
            });
        }
        let record = EnrollmentRequestRecord {
            request_id: request.request_id.clone(),
            student_id: request.student_id,
            course_id: request.course_id,
            status: RequestStatus::Pending,
            detail: None,
            enrollment_id: None,
            submitted_at: request.submitted_at,
            updated_at: request.submitted_at,
        };
        rows.insert(request.request_id, record);
        Ok(())
    }

    async fn update_request_status(
        &self,
        params: UpdateRequestStatusParams,
    ) -> Result<(), RepoError> {
        let mut rows = self.rows.lock().await;
        let record = rows.get_mut(&params.request_id).ok_or(RepoError::NotFound)?;
        record.status = params.status;
        record.detail = params.detail;
        record.enrollment_id = params.enrollment_id;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn find_request(
        &self,
        request_id: &str,
    ) -> Result<Option<EnrollmentRequestRecord>, RepoError> {
        Ok(self.rows.lock().await.get(request_id).cloned())
    }

    async fn record_dead_letter(
        &self,
        letter: NewDeadLetter,
    ) -> Result<DeadLetterRecord, RepoError> {
        let mut letters = self.dead_letters.lock().await;
        let record = DeadLetterRecord {
            id: letters.len() as i64 + 1,
            request_id: letter.request_id,
            student_id: letter.student_id,
            course_id: letter.course_id,
            attempts: letter.attempts,
            last_error: letter.last_error,
            failed_at: OffsetDateTime::now_utc(),
        };
        letters.push(record.clone());
        Ok(record)
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetterRecord>, RepoError> {
        Ok(self.dead_letters.lock().await.clone())
    }
}

/// FIFO stand-in for the durable queue.
#[derive(Default)]
pub struct InMemoryQueue {
    items: Mutex<VecDeque<WorkItem>>,
    unavailable: AtomicBool,
}

impl InMemoryQueue {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Remove and return everything queued so far, oldest first.
    pub async fn drain(&self) -> Vec<WorkItem> {
        self.items.lock().await.drain(..).collect()
    }
}

#[async_trait]
impl EnrollmentQueue for InMemoryQueue {
    async fn enqueue(&self, item: &WorkItem) -> Result<String, RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        let mut items = self.items.lock().await;
        items.push_back(item.clone());
        Ok(items.len().to_string())
    }
}

/// Course directory answered directly by a [`CourseService`].
pub struct LocalCourseDirectory {
    service: CourseService,
}

impl LocalCourseDirectory {
    pub fn new(service: CourseService) -> Self {
        Self { service }
    }
}

fn course_peer_error(err: CourseError) -> PeerError {
    match err {
        CourseError::NotFound => PeerError::NotFound { entity: "course" },
        CourseError::Full(_) => PeerError::CourseFull,
        other => PeerError::Unexpected {
            status: 500,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl CourseDirectory for LocalCourseDirectory {
    async fn course(&self, id: i64, freshness: Freshness) -> Result<Course, PeerError> {
        self.service
            .get(id, freshness)
            .await
            .map_err(course_peer_error)
    }

    async fn update_course(&self, id: i64, patch: CoursePatch) -> Result<Course, PeerError> {
        self.service
            .update(id, patch)
            .await
            .map_err(course_peer_error)
    }

    async fn adjust_occupancy(
        &self,
        id: i64,
        change: OccupancyChange,
    ) -> Result<Course, PeerError> {
        self.service
            .adjust_occupancy(id, change)
            .await
            .map_err(course_peer_error)
    }
}

pub struct LocalStudentDirectory {
    service: StudentService,
}

impl LocalStudentDirectory {
    pub fn new(service: StudentService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StudentDirectory for LocalStudentDirectory {
    async fn student(&self, id: i64, freshness: Freshness) -> Result<Student, PeerError> {
        self.service
            .get(id, freshness)
            .await
            .map_err(|err| match err {
                StudentError::NotFound => PeerError::NotFound { entity: "student" },
                other => PeerError::Unexpected {
                    status: 500,
                    message: other.to_string(),
                },
            })
    }
}

/// Directory whose peer never answers.
#[derive(Default)]
pub struct OfflineDirectory;

#[async_trait]
impl CourseDirectory for OfflineDirectory {
    async fn course(&self, _id: i64, _freshness: Freshness) -> Result<Course, PeerError> {
        Err(PeerError::unavailable("connection refused"))
    }

    async fn update_course(&self, _id: i64, _patch: CoursePatch) -> Result<Course, PeerError> {
        Err(PeerError::unavailable("connection refused"))
    }

    async fn adjust_occupancy(
        &self,
        _id: i64,
        _change: OccupancyChange,
    ) -> Result<Course, PeerError> {
        Err(PeerError::unavailable("connection refused"))
    }
}

#[async_trait]
impl StudentDirectory for OfflineDirectory {
    async fn student(&self, _id: i64, _freshness: Freshness) -> Result<Student, PeerError> {
        Err(PeerError::unavailable("connection refused"))
    }
}

fn next_id(counter: &AtomicUsize) -> i64 {
    counter.fetch_add(1, Ordering::SeqCst) as i64 + 1
}
