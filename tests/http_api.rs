use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use registrar::application::courses::CourseService;
use registrar::application::enrollment::{DropPipeline, EnrollmentIntake};
use registrar::application::peers::{CourseDirectory, Freshness, StudentDirectory};
use registrar::application::students::StudentService;
use registrar::domain::entities::{NewCourse, StudentDraft};
use registrar::domain::types::OccupancyMode;
use registrar::infra::http::{
    CoursesState, EnrollmentState, StudentsState, build_courses_router, build_enrollment_router,
    build_students_router,
};
use registrar::infra::worker::WorkerHealth;
use registrar::test_support::{
    InMemoryCourses, InMemoryEnrollments, InMemoryQueue, InMemoryRequests, InMemoryStudents,
    LocalCourseDirectory, LocalStudentDirectory, memory_cache,
};

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_with(router, method, uri, body, None).await
}

async fn send_with(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    cache_control: Option<&'static str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(directive) = cache_control {
        builder = builder.header(header::CACHE_CONTROL, directive);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request builds");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn courses_router() -> (Router, Arc<InMemoryCourses>) {
    let repo = Arc::new(InMemoryCourses::default());
    let router = build_courses_router(CoursesState {
        courses: Arc::new(CourseService::new(repo.clone(), memory_cache())),
    });
    (router, repo)
}

fn students_router() -> (Router, Arc<InMemoryStudents>) {
    let repo = Arc::new(InMemoryStudents::default());
    let router = build_students_router(StudentsState {
        students: Arc::new(StudentService::new(repo.clone(), memory_cache())),
    });
    (router, repo)
}

struct EnrollmentFixture {
    router: Router,
    courses: CourseService,
    students: StudentService,
    enrollments: Arc<InMemoryEnrollments>,
    queue: Arc<InMemoryQueue>,
}

fn enrollment_fixture() -> EnrollmentFixture {
    let course_repo = Arc::new(InMemoryCourses::default());
    let student_repo = Arc::new(InMemoryStudents::default());
    let course_cache = memory_cache();
    let student_cache = memory_cache();

    let courses: Arc<dyn CourseDirectory> = Arc::new(LocalCourseDirectory::new(
        CourseService::new(course_repo.clone(), course_cache.clone()),
    ));
    let students: Arc<dyn StudentDirectory> = Arc::new(LocalStudentDirectory::new(
        StudentService::new(student_repo.clone(), student_cache.clone()),
    ));
    let enrollments = Arc::new(InMemoryEnrollments::default());
    let requests = Arc::new(InMemoryRequests::default());
    let queue = Arc::new(InMemoryQueue::default());

    let router = build_enrollment_router(EnrollmentState {
        intake: Arc::new(EnrollmentIntake::new(
            students,
            courses.clone(),
            requests.clone(),
            queue.clone(),
        )),
        drops: Arc::new(DropPipeline::new(
            enrollments.clone(),
            courses,
            OccupancyMode::FetchThenWrite,
        )),
        enrollments: enrollments.clone(),
        requests,
        worker: WorkerHealth::new(),
    });

    EnrollmentFixture {
        router,
        courses: CourseService::new(course_repo, course_cache),
        students: StudentService::new(student_repo, student_cache),
        enrollments,
        queue,
    }
}

#[tokio::test]
async fn health_reports_the_service_name() {
    let (router, _) = courses_router();
    let (status, body) = send(&router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "courses"}));
}

#[tokio::test]
async fn course_lifecycle_round_trips_through_the_api() {
    let (router, _) = courses_router();

    let (status, created) = send(
        &router,
        Method::POST,
        "/courses",
        Some(json!({"name": "Web Systems", "code": "CS326", "capacity": 40})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().expect("assigned id");
    assert_eq!(created["enrolled"], 0);
    assert_eq!(created["prerequisites"], json!([]));

    let (status, updated) = send(
        &router,
        Method::PUT,
        &format!("/courses/{id}"),
        Some(json!({"capacity": 45})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["capacity"], 45);
    assert_eq!(updated["code"], "CS326");

    let (status, listed) = send(&router, Method::GET, "/courses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));

    let (status, body) = send(&router, Method::DELETE, &format!("/courses/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&router, Method::GET, &format!("/courses/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    insta::assert_snapshot!(
        body.to_string(),
        @r#"{"error":{"code":"not_found","message":"Course not found"}}"#
    );
}

#[tokio::test]
async fn course_reads_are_cached_until_written() {
    let (router, repo) = courses_router();
    let (_, created) = send(
        &router,
        Method::POST,
        "/courses",
        Some(json!({"name": "Compilers", "code": "CS430", "capacity": 20})),
    )
    .await;
    let uri = format!("/courses/{}", created["id"]);

    send(&router, Method::GET, &uri, None).await;
    let (status, _) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo.find_calls(), 1);

    let (status, _) = send_with(&router, Method::GET, &uri, None, Some("no-cache")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo.find_calls(), 2);

    send(&router, Method::PUT, &uri, Some(json!({"enrolled": 7}))).await;
    let (_, fresh) = send(&router, Method::GET, &uri, None).await;
    assert_eq!(fresh["enrolled"], 7);
    assert_eq!(repo.find_calls(), 3);
}

#[tokio::test]
async fn invalid_course_payloads_are_rejected() {
    let (router, _) = courses_router();
    let (status, body) = send(
        &router,
        Method::POST,
        "/courses",
        Some(json!({"name": "", "code": "CS101", "capacity": 10})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_input");
}

#[tokio::test]
async fn occupancy_guard_reports_full_courses() {
    let (router, _) = courses_router();
    let (_, created) = send(
        &router,
        Method::POST,
        "/courses",
        Some(json!({"name": "Seminar", "code": "CS499", "capacity": 1})),
    )
    .await;
    let uri = format!("/courses/{}/occupancy", created["id"]);

    let (status, course) = send(
        &router,
        Method::POST,
        &uri,
        Some(json!({"delta": 1, "enforce_capacity": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(course["enrolled"], 1);

    let (status, body) = send(
        &router,
        Method::POST,
        &uri,
        Some(json!({"delta": 1, "enforce_capacity": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "course_full");
    assert_eq!(body["error"]["message"], "Course is full");

    let (status, course) = send(&router, Method::POST, &uri, Some(json!({"delta": -1}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(course["enrolled"], 0);
}

#[tokio::test]
async fn student_put_replaces_the_whole_record() {
    let (router, _) = students_router();
    let (status, created) = send(
        &router,
        Method::POST,
        "/students",
        Some(json!({"name": "Ada", "completed_courses": ["CS101", "CS220"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/students/{}", created["id"]);

    let (status, replaced) =
        send(&router, Method::PUT, &uri, Some(json!({"name": "Ada L."}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["name"], "Ada L.");
    assert_eq!(replaced["completed_courses"], json!([]));

    let (status, body) = send(
        &router,
        Method::PUT,
        "/students/999",
        Some(json!({"name": "Nobody"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Student not found");
}

#[tokio::test]
async fn deleting_a_missing_student_is_not_found() {
    let (router, _) = students_router();
    let (status, _) = send(&router, Method::DELETE, "/students/5", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enroll_is_accepted_and_pollable() {
    let fixture = enrollment_fixture();
    let course = fixture
        .courses
        .create(NewCourse {
            name: "Web Systems".to_string(),
            code: "CS326".to_string(),
            capacity: 10,
            enrolled: 0,
            prerequisites: vec!["CS220".to_string()],
        })
        .await
        .expect("course");
    let student = fixture
        .students
        .create(StudentDraft {
            name: "Ada".to_string(),
            completed_courses: vec!["CS220".to_string()],
        })
        .await
        .expect("student");

    let (status, accepted) = send(
        &fixture.router,
        Method::POST,
        "/enroll",
        Some(json!({"student_id": student.id, "course_id": course.id})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "pending");
    assert_eq!(accepted["message"], "Enrollment queued for processing");
    assert_eq!(fixture.queue.len().await, 1);

    let request_id = accepted["request_id"].as_str().expect("request id");
    let (status, record) = send(
        &fixture.router,
        Method::GET,
        &format!("/enrollments/requests/{request_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "pending");
    assert_eq!(record["student_id"], student.id);

    let (status, _) = send(
        &fixture.router,
        Method::GET,
        "/enrollments/requests/unknown",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn enroll_maps_admission_failures() {
    let fixture = enrollment_fixture();
    let course = fixture
        .courses
        .create(NewCourse {
            name: "Web Systems".to_string(),
            code: "CS326".to_string(),
            capacity: 10,
            enrolled: 0,
            prerequisites: vec!["CS220".to_string()],
        })
        .await
        .expect("course");
    let student = fixture
        .students
        .create(StudentDraft {
            name: "Ada".to_string(),
            completed_courses: Vec::new(),
        })
        .await
        .expect("student");

    let (status, body) = send(
        &fixture.router,
        Method::POST,
        "/enroll",
        Some(json!({"student_id": 999, "course_id": course.id})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Student not found");

    let (status, body) = send(
        &fixture.router,
        Method::POST,
        "/enroll",
        Some(json!({"student_id": student.id, "course_id": course.id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "prerequisites_not_met");
    assert_eq!(body["error"]["message"], "Prerequisites not met");
    assert_eq!(body["error"]["hint"], "missing prerequisites: CS220");
    assert!(fixture.queue.is_empty().await);
}

#[tokio::test]
async fn enrollment_surface_lists_and_drops() {
    let fixture = enrollment_fixture();

    let (status, body) = send(&fixture.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "healthy", "service": "enrollment", "worker": "starting"})
    );

    let (status, body) = send(&fixture.router, Method::GET, "/enrollments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) =
        send(&fixture.router, Method::GET, "/enrollments/student/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(
        &fixture.router,
        Method::GET,
        "/enrollments/dead-letters",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&fixture.router, Method::DELETE, "/enrollments/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Enrollment not found");
}

#[tokio::test]
async fn dropping_an_enrollment_over_http_frees_the_seat() {
    let fixture = enrollment_fixture();
    let course = fixture
        .courses
        .create(NewCourse {
            name: "Compilers".to_string(),
            code: "CS536".to_string(),
            capacity: 10,
            enrolled: 1,
            prerequisites: Vec::new(),
        })
        .await
        .expect("course");
    let seeded = fixture.enrollments.insert(7, course.id).await;

    let (status, body) = send(
        &fixture.router,
        Method::DELETE,
        &format!("/enrollments/{}", seeded.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let course = fixture
        .courses
        .get(course.id, Freshness::Fresh)
        .await
        .expect("course");
    assert_eq!(course.enrolled, 0);

    let (status, body) = send(&fixture.router, Method::GET, "/enrollments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}
