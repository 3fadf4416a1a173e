//! Common test utilities for integration tests
//!
//! Builds the full router over an in-memory store seeded with two houses,
//! one student per house, two teachers and an admin. Every account shares
//! [`PASSWORD`], hashed once.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use housepoints_api::app::{build_router, AppState};
use housepoints_api::config::Config;
use housepoints_shared::auth::password::hash_password;
use housepoints_shared::auth::token::TokenService;
use housepoints_shared::models::house_spirit::{CreateHouseSpirit, HouseSpirit};
use housepoints_shared::models::student::{CreateStudent, Student};
use housepoints_shared::models::teacher::CreateTeacherProfile;
use housepoints_shared::models::user::{CreateUser, Role, User};
use housepoints_shared::store::memory::MemoryStore;
use housepoints_shared::store::SchoolStore;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";
pub const PASSWORD: &str = "correct horse battery staple";

/// Test context containing the app and its seeded data
pub struct TestContext {
    pub store: MemoryStore,
    pub app: Router,
    pub tokens: TokenService,
    pub phoenix: HouseSpirit,
    pub dragon: HouseSpirit,
    pub alice_user: User,
    pub alice: Student,
    pub bram: Student,
    pub teacher: User,
    pub other_teacher: User,
    pub admin: User,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgresql://unused/housepoints".to_string()),
            "JWT_SECRET" => Some(SECRET.to_string()),
            _ => None,
        })?;

        let store = MemoryStore::new();
        let password_hash = hash_password(PASSWORD)?;

        let user = |username: &str, role: Role| CreateUser {
            username: username.to_string(),
            password_hash: password_hash.clone(),
            role,
        };

        let phoenix = store
            .create_house_spirit(CreateHouseSpirit {
                name: "Phoenix".to_string(),
            })
            .await?;
        let dragon = store
            .create_house_spirit(CreateHouseSpirit {
                name: "Dragon".to_string(),
            })
            .await?;

        let alice_user = store.create_user(user("alice", Role::Student)).await?;
        let bram_user = store.create_user(user("bram", Role::Student)).await?;
        let teacher = store.create_user(user("mcgonagall", Role::Teacher)).await?;
        let other_teacher = store.create_user(user("snape", Role::Teacher)).await?;
        let admin = store.create_user(user("dumbledore", Role::Admin)).await?;

        let alice = store
            .create_student(CreateStudent {
                user_id: Some(alice_user.id),
                first_name: "Alice".to_string(),
                last_name: "Archer".to_string(),
                student_id_number: "S-001".to_string(),
                house_spirit_id: Some(phoenix.id),
            })
            .await?;
        let bram = store
            .create_student(CreateStudent {
                user_id: Some(bram_user.id),
                first_name: "Bram".to_string(),
                last_name: "Baker".to_string(),
                student_id_number: "S-002".to_string(),
                house_spirit_id: Some(dragon.id),
            })
            .await?;

        store
            .create_teacher_profile(CreateTeacherProfile {
                user_id: teacher.id,
                first_name: "Minerva".to_string(),
                last_name: "McGonagall".to_string(),
            })
            .await?;

        let state = AppState::new(Arc::new(store.clone()), config);
        let app = build_router(state);

        Ok(TestContext {
            store,
            app,
            tokens: TokenService::new(SECRET),
            phoenix,
            dragon,
            alice_user,
            alice,
            bram,
            teacher,
            other_teacher,
            admin,
        })
    }

    /// Signs a session token for `user` without going through login
    pub fn token_for(&self, user: &User) -> String {
        self.tokens.issue(user).unwrap().token
    }

    /// Sends a request through the router and returns status and JSON body
    ///
    /// Empty bodies come back as `Value::Null`.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    /// Current points of a house as stored
    pub async fn house_points(&self, house: &HouseSpirit) -> i64 {
        self.store
            .find_house_spirit(house.id)
            .await
            .unwrap()
            .unwrap()
            .points
    }
}
