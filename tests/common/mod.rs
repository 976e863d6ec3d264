#![allow(dead_code)]

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sql_repository::prelude::*;
use sql_repository::test_utils::TestDatabase;
use tracing_subscriber::EnvFilter;

pub const USERS_SCHEMA: &str = "
    DROP TABLE IF EXISTS users;
    CREATE TABLE users (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT UNIQUE,
        age INT4,
        score FLOAT4,
        active BOOLEAN NOT NULL DEFAULT true,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub score: Option<f32>,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub age: Option<i32>,
}

impl NewUser {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.replace(' ', ".").to_lowercase())),
            age: None,
        }
    }
}

/// Partial update payload; `None` leaves the column alone.
#[derive(Debug, Default, Serialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Start a database, connect a session to it and create a fresh `users` table.
pub async fn connected_session(
    database: &str,
) -> Result<(TestDatabase, SessionManager), SqlRepositoryError> {
    init_tracing();
    let db = TestDatabase::start(database).await?;
    let session = SessionManager::new();
    session.connect(&db.config.clone().with_pool_size(4)).await?;
    session.execute_batch(USERS_SCHEMA).await?;
    Ok((db, session))
}

/// Seed `User 1`, `User 2`, `User 3` in that order.
pub async fn seed_three_users(users: &Repository<User>) -> Result<Vec<User>, SqlRepositoryError> {
    let mut created = Vec::new();
    for n in 1..=3 {
        created.push(users.create(&NewUser::named(&format!("User {n}"))).await?);
    }
    Ok(created)
}
