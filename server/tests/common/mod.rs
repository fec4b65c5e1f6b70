#![allow(dead_code)]

use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use platform_authz::{GuardMode, Role};
use platform_db::connect_url;
use platform_db::seed::{SeededDirectory, seed_demo};
use server::auth::{AuthConfig, issue_token};
use server::config::AppConfig;
use server::graphql::build_schema;
use server::http::AppState;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret-integration-secret";

pub struct TestApp {
    pub state: AppState,
    pub seeded: SeededDirectory,
}

impl TestApp {
    pub async fn new(guard_mode: GuardMode) -> Self {
        let db = connect_url("sqlite::memory:", 1, false).await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        let seeded = seed_demo(&db).await.unwrap();
        let db = Arc::new(db);
        let config = AppConfig {
            database_url: "sqlite::memory:".into(),
            bind: "127.0.0.1:0".parse().unwrap(),
            auth: auth_config(),
            cors_allowed_origins: vec!["http://localhost:5173".into()],
            guard_mode,
            otlp_endpoint: None,
        };
        let state = AppState {
            schema: build_schema(db.clone(), guard_mode),
            db,
            config: Arc::new(config),
        };
        Self { state, seeded }
    }

    pub fn token(&self, user_id: Uuid) -> String {
        // The role claim is informational; the server reads the store.
        issue_token(user_id, Role::Viewer, &auth_config()).unwrap()
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: SECRET.into(),
        token_ttl_minutes: 30,
    }
}
