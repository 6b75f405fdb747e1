#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use milestone_tracker::{
    build_router,
    config::Config,
    services::{
        auth::{AuthUser, Role},
        store::MemoryStorage,
    },
    state::AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const STUDENT: &str = "stu-1";
pub const OTHER_STUDENT: &str = "stu-2";
pub const ADVISOR: &str = "adv-1";
pub const OTHER_ADVISOR: &str = "adv-2";
pub const ADMIN: &str = "admin-1";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

impl TestApp {
    /// 内存存储 + 两名学生：STUDENT 由 ADVISOR 指导，OTHER_STUDENT 由 OTHER_ADVISOR 指导
    pub async fn new() -> Self {
        let state = Arc::new(AppState::new(Config::default(), Arc::new(MemoryStorage::new())));
        let app = Self {
            router: build_router(state.clone()),
            state,
        };

        for (student, advisor) in [(STUDENT, ADVISOR), (OTHER_STUDENT, OTHER_ADVISOR)] {
            let (status, _) = app
                .request(
                    Method::PUT,
                    &format!("/students/{}", student),
                    Some(&app.token(ADMIN, Role::Admin)),
                    Some(json!({
                        "name": format!("Student {}", student),
                        "email": format!("{}@example.edu", student),
                        "advisorId": advisor,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        app
    }

    pub fn token(&self, id: &str, role: Role) -> String {
        self.state
            .auth_service
            .issue_token(&AuthUser::new(id, role))
            .unwrap()
    }

    pub fn student(&self) -> String {
        self.token(STUDENT, Role::Student)
    }

    pub fn advisor(&self) -> String {
        self.token(ADVISOR, Role::Advisor)
    }

    pub fn admin(&self) -> String {
        self.token(ADMIN, Role::Admin)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    /// 以 STUDENT 身份创建里程碑，返回 data
    pub async fn create_milestone(&self, title: &str, extra: Value) -> Value {
        let mut body = json!({
            "title": title,
            "description": "Chapter draft",
            "dueDate": "2025-06-01",
            "studentId": STUDENT,
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                body.insert(key.clone(), value.clone());
            }
        }

        let (status, value) = self
            .request(Method::POST, "/milestones", Some(&self.student()), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", value);
        value["data"].clone()
    }

    /// 通知标题，按字母序排列
    pub async fn notification_titles(&self, token: &str) -> Vec<String> {
        let (status, value) = self.request(Method::GET, "/notifications", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        let mut titles: Vec<String> = value["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap().to_string())
            .collect();
        titles.sort();
        titles
    }
}
