//! Postgres fixtures. Every context gets a throwaway database created under
//! `TEST_DATABASE_URL`; without that variable the tests skip themselves,
//! and with it any setup failure fails the test.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use url::Url;
use uuid::Uuid;

pub struct PgTestContext {
    pub db: DatabaseConnection,
    admin_url: String,
    db_name: String,
}

impl PgTestContext {
    /// `Ok(None)` only when `TEST_DATABASE_URL` is unset. Once it is set,
    /// any setup failure is an error.
    pub async fn new() -> Result<Option<Self>> {
        let Ok(base) = std::env::var("TEST_DATABASE_URL") else {
            return Ok(None);
        };
        let (admin_url, db_name, test_url) = build_urls(&base)?;
        let admin = Database::connect(&admin_url)
            .await
            .context("connect to the admin database")?;
        admin
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{db_name}\";"),
            ))
            .await
            .with_context(|| format!("create database {db_name}"))?;
        let db = Database::connect(&test_url)
            .await
            .with_context(|| format!("connect to {db_name}"))?;
        Migrator::up(&db, None).await.context("apply migrations")?;
        Ok(Some(Self {
            db,
            admin_url,
            db_name,
        }))
    }

    pub async fn cleanup(self) {
        let Self {
            db,
            admin_url,
            db_name,
        } = self;
        drop(db);
        if let Ok(admin) = Database::connect(&admin_url).await {
            let drop_sql = format!("DROP DATABASE IF EXISTS \"{db_name}\" WITH (FORCE);");
            let _ = admin
                .execute(Statement::from_string(DatabaseBackend::Postgres, drop_sql))
                .await;
        }
    }
}

fn build_urls(base: &str) -> Result<(String, String, String)> {
    let url = Url::parse(base).context("TEST_DATABASE_URL is not a valid url")?;
    let db_path = url.path().trim_start_matches('/').to_string();
    let base_name = if db_path.is_empty() {
        "pharmachain_test".to_string()
    } else {
        db_path
    };
    let db_name = format!("{}_{}", base_name, Uuid::new_v4().simple());
    let mut admin_url = url.clone();
    admin_url.set_path("/postgres");
    let mut test_url = url;
    test_url.set_path(&format!("/{db_name}"));
    Ok((admin_url.to_string(), db_name, test_url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_gets_a_unique_name() {
        let (admin, name, test) = build_urls("postgres://app:pw@db:5432/pharmachain").unwrap();
        assert_eq!(admin, "postgres://app:pw@db:5432/postgres");
        assert!(name.starts_with("pharmachain_"));
        assert!(test.ends_with(&format!("/{name}")));
    }

    #[test]
    fn malformed_url_is_an_error() {
        assert!(build_urls("not a url").is_err());
    }
}
