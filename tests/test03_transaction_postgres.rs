#![cfg(feature = "test-utils")]

mod common;

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sql_repository::prelude::*;
use tokio::runtime::Runtime;

use common::{NewUser, User, connected_session};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("business rule violated: {0}")]
    Rule(String),
    #[error(transparent)]
    Db(#[from] SqlRepositoryError),
}

#[test]
fn test03_transaction_postgres() -> TestResult {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let (db, session) = connected_session("transaction_tests").await?;
        let users: Repository<User> = Repository::new(session.clone(), "users");

        commit_makes_writes_visible(&users).await?;
        failing_callback_leaves_no_trace(&users).await?;
        failing_statement_rolls_back(&users).await?;
        scope_is_invalid_after_resolution(&users).await?;
        uncommitted_writes_stay_private(&users).await?;
        cancelled_transaction_is_rolled_back(&session, &users).await?;
        failed_rollback_keeps_callback_error(&session, &users).await?;
        failed_commit_is_a_query_error(&session).await?;

        session.disconnect().await;
        db.stop().await;
        Ok(())
    })
}

async fn commit_makes_writes_visible(users: &Repository<User>) -> TestResult {
    let created = users
        .with_transaction(|tx| async move {
            let first = tx.create(&NewUser::named("Tx A")).await?;
            let second = tx.create(&NewUser::named("Tx B")).await?;
            // statements in the scope see each other's uncommitted rows
            assert_eq!(tx.count(&QueryDescriptor::new().filter("name", "Tx A")).await?, 1);
            Ok::<_, SqlRepositoryError>(vec![first, second])
        })
        .await?;
    assert_eq!(created.len(), 2);

    let visible = users
        .find_many(&QueryDescriptor::new().order_by("name", SortOrder::Ascending))
        .await?;
    assert_eq!(visible, created);
    Ok(())
}

async fn failing_callback_leaves_no_trace(users: &Repository<User>) -> TestResult {
    let err = users
        .with_transaction(|tx| async move {
            tx.create(&NewUser::named("Ghost")).await?;
            Err::<(), _>(AppError::Rule("ghosts are not allowed".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Rule(_)), "{err}");

    let ghosts = users
        .find_many(&QueryDescriptor::new().filter("name", "Ghost"))
        .await?;
    assert!(ghosts.is_empty());
    Ok(())
}

async fn failing_statement_rolls_back(users: &Repository<User>) -> TestResult {
    let err = users
        .with_transaction(|tx| async move {
            tx.create(&NewUser::named("Half")).await?;
            // same email twice violates the unique constraint
            tx.create(&NewUser::named("Half")).await?;
            Ok::<_, SqlRepositoryError>(())
        })
        .await
        .unwrap_err();
    assert!(err.is_query(), "{err}");

    assert_eq!(
        users
            .count(&QueryDescriptor::new().filter("name", "Half"))
            .await?,
        0
    );
    Ok(())
}

async fn scope_is_invalid_after_resolution(users: &Repository<User>) -> TestResult {
    let leaked = users
        .with_transaction(|tx| async move { Ok::<_, SqlRepositoryError>(tx.clone()) })
        .await?;

    let err = leaked.find_by_id(1).await.unwrap_err();
    assert!(err.is_connection(), "{err}");
    assert!(!leaked.executor().is_active().await);
    Ok(())
}

async fn uncommitted_writes_stay_private(users: &Repository<User>) -> TestResult {
    let outside = users.clone();
    users
        .with_transaction(|tx| async move {
            tx.create(&NewUser::named("Pending")).await?;
            let seen_outside = outside
                .count(&QueryDescriptor::new().filter("name", "Pending"))
                .await?;
            assert_eq!(seen_outside, 0);
            Ok::<_, SqlRepositoryError>(())
        })
        .await?;

    assert_eq!(
        users
            .count(&QueryDescriptor::new().filter("name", "Pending"))
            .await?,
        1
    );
    Ok(())
}

async fn cancelled_transaction_is_rolled_back(
    session: &SessionManager,
    users: &Repository<User>,
) -> TestResult {
    let repo = users.clone();
    let work = tokio::spawn(async move {
        repo.with_transaction(|tx| async move {
            tx.create(&NewUser::named("Abandoned")).await?;
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, SqlRepositoryError>(())
        })
        .await
    });
    // give the insert time to land, then cancel mid-transaction
    tokio::time::sleep(Duration::from_millis(300)).await;
    work.abort();
    let _ = work.await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        users
            .count(&QueryDescriptor::new().filter("name", "Abandoned"))
            .await?,
        0
    );
    // the pool still hands out connections
    session.execute("SELECT 1", &[]).await?;
    Ok(())
}

async fn failed_rollback_keeps_callback_error(
    session: &SessionManager,
    users: &Repository<User>,
) -> TestResult {
    let err = users
        .with_transaction(|tx| async move {
            tx.create(&NewUser::named("Severed")).await?;
            // kill our own backend so the ROLLBACK that follows cannot be sent
            let _ = tx
                .query_rows("SELECT pg_terminate_backend(pg_backend_pid())", &[])
                .await;
            Err::<(), _>(AppError::Rule("callback failed first".into()))
        })
        .await
        .unwrap_err();
    match err {
        AppError::Rule(message) => assert_eq!(message, "callback failed first"),
        AppError::Db(e) => panic!("callback error was replaced by {e}"),
    }

    // the severed connection is not handed out again
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.execute("SELECT 1", &[]).await?;
    assert_eq!(
        users
            .count(&QueryDescriptor::new().filter("name", "Severed"))
            .await?,
        0
    );
    Ok(())
}

async fn failed_commit_is_a_query_error(session: &SessionManager) -> TestResult {
    #[derive(Debug, Deserialize)]
    struct Entry {
        #[allow(dead_code)]
        id: i32,
        #[allow(dead_code)]
        reference: String,
    }

    session
        .execute_batch(
            "DROP TABLE IF EXISTS ledger;
             CREATE TABLE ledger (
                 id SERIAL PRIMARY KEY,
                 reference TEXT NOT NULL,
                 CONSTRAINT ledger_reference_unique UNIQUE (reference)
                     DEFERRABLE INITIALLY DEFERRED
             );",
        )
        .await?;
    let ledger: Repository<Entry> = Repository::new(session.clone(), "ledger");

    // both inserts succeed; the deferred check only fires at COMMIT
    let err = ledger
        .with_transaction(|tx| async move {
            tx.create(&json!({ "reference": "INV-1" })).await?;
            tx.create(&json!({ "reference": "INV-1" })).await?;
            Ok::<_, SqlRepositoryError>(())
        })
        .await
        .unwrap_err();
    assert!(err.is_query(), "{err}");

    assert_eq!(ledger.count(&QueryDescriptor::new()).await?, 0);
    // the connection went back to the pool in a usable state
    for _ in 0..8 {
        session.execute("SELECT 1", &[]).await?;
    }
    ledger.create(&json!({ "reference": "INV-2" })).await?;
    assert_eq!(ledger.count(&QueryDescriptor::new()).await?, 1);
    Ok(())
}
