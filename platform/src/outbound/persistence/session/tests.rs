//! Session lifecycle coverage against the in-memory connection manager.

use std::time::Duration;

use futures_util::FutureExt;
use rstest::{fixture, rstest};

use super::*;
use crate::domain::ErrorCode;
use crate::outbound::persistence::PoolConfig;
use crate::test_support::memory::{Event, MemoryManager};

#[derive(Debug, PartialEq)]
enum ScopeError {
    Domain(Error),
    Boom,
}

impl From<Error> for ScopeError {
    fn from(value: Error) -> Self {
        Self::Domain(value)
    }
}

#[fixture]
fn single_connection() -> PoolConfig {
    PoolConfig::new("memory://")
        .with_pool_size(1)
        .with_max_overflow(0)
        .with_connection_timeout(Duration::from_millis(100))
}

async fn manager_with(config: &PoolConfig) -> (SessionManager<MemoryManager>, MemoryManager) {
    let driver = MemoryManager::default();
    let pool = DbPool::build(config, driver.clone())
        .await
        .expect("memory pool builds");
    (SessionManager::new(pool), driver)
}

#[rstest]
#[tokio::test]
async fn failed_scope_rolls_back_before_release(single_connection: PoolConfig) {
    let (manager, driver) = manager_with(&single_connection).await;

    let outcome: Result<(), ScopeError> = manager
        .with_session(|session| {
            async move {
                session.connection().write("pending", "dirty");
                Err(ScopeError::Boom)
            }
            .boxed()
        })
        .await;
    assert_eq!(outcome, Err(ScopeError::Boom));

    let seen = manager
        .with_session(|session| {
            async move { Ok::<_, ScopeError>(session.connection().read("pending")) }.boxed()
        })
        .await
        .expect("second scope succeeds");
    assert_eq!(seen, None);

    let events = driver.events();
    let rollback = events
        .iter()
        .position(|event| *event == Event::Rollback(0))
        .expect("rollback recorded");
    let release = events
        .iter()
        .position(|event| *event == Event::Release(0))
        .expect("release recorded");
    assert!(rollback < release, "rollback must precede release: {events:?}");
}

#[rstest]
#[tokio::test]
async fn successful_scope_discards_uncommitted_work(single_connection: PoolConfig) {
    let (manager, driver) = manager_with(&single_connection).await;

    let value = manager
        .with_session(|session| {
            async move {
                session.connection().write("draft", "unsaved");
                Ok::<_, ScopeError>(42)
            }
            .boxed()
        })
        .await
        .expect("scope succeeds");

    assert_eq!(value, 42);
    assert!(driver.committed().is_empty());
}

#[rstest]
#[tokio::test]
async fn commit_persists_and_reopens_transaction(single_connection: PoolConfig) {
    let (manager, driver) = manager_with(&single_connection).await;

    manager
        .with_session(|session| {
            async move {
                session.connection().write("saved", "yes");
                session.commit().await?;
                assert!(session.connection().in_transaction());
                session.connection().write("after", "dropped");
                Ok::<_, ScopeError>(())
            }
            .boxed()
        })
        .await
        .expect("scope succeeds");

    let committed = driver.committed();
    assert_eq!(committed.get("saved").map(String::as_str), Some("yes"));
    assert!(!committed.contains_key("after"));
}

#[rstest]
#[tokio::test]
async fn close_is_idempotent_and_refuses_new_scopes(single_connection: PoolConfig) {
    let (manager, _driver) = manager_with(&single_connection).await;
    let clone = manager.clone();

    manager.close();
    manager.close();
    assert!(clone.is_closed());
    assert!(clone.state().is_none());

    let outcome: Result<(), ScopeError> = clone
        .with_session(|_session| async move { Ok(()) }.boxed())
        .await;
    match outcome {
        Err(ScopeError::Domain(error)) => assert_eq!(error.code(), ErrorCode::DatabaseError),
        other => panic!("expected database error, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn exhausted_pool_surfaces_database_error(single_connection: PoolConfig) {
    let (manager, _driver) = manager_with(&single_connection).await;
    let inner = manager.clone();

    let outcome: Result<Result<(), ScopeError>, ScopeError> = manager
        .with_session(|_outer| {
            async move {
                let nested = inner
                    .with_session(|_session| async move { Ok::<_, ScopeError>(()) }.boxed())
                    .await;
                Ok(nested)
            }
            .boxed()
        })
        .await;

    let nested = outcome.expect("outer scope succeeds");
    match nested {
        Err(ScopeError::Domain(error)) => {
            assert_eq!(error.code(), ErrorCode::DatabaseError);
            assert_eq!(error.message(), "Database error");
        }
        other => panic!("expected checkout failure, got {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn failed_rollback_discards_the_connection(single_connection: PoolConfig) {
    let (manager, driver) = manager_with(&single_connection).await;
    driver.reject_rollbacks();

    let outcome: Result<(), ScopeError> = manager
        .with_session(|session| {
            async move {
                session.connection().write("pending", "dirty");
                Err(ScopeError::Boom)
            }
            .boxed()
        })
        .await;
    assert_eq!(outcome, Err(ScopeError::Boom));

    let seen = manager
        .with_session(|session| {
            async move {
                let conn = session.connection();
                Ok::<_, ScopeError>((conn.id(), conn.read("pending")))
            }
            .boxed()
        })
        .await
        .expect("replacement connection serves the scope");
    assert_ne!(seen.0, 0, "broken connection must not be reused");
    assert_eq!(seen.1, None);
}

#[rstest]
#[tokio::test]
async fn failed_commit_skips_rollback_and_keeps_the_connection(single_connection: PoolConfig) {
    let (manager, driver) = manager_with(&single_connection).await;
    driver.reject_commits();

    let outcome: Result<(), ScopeError> = manager
        .with_session(|session| {
            async move {
                session.connection().write("pending", "lost");
                session.commit().await?;
                Ok(())
            }
            .boxed()
        })
        .await;
    match outcome {
        Err(ScopeError::Domain(error)) => assert_eq!(error.code(), ErrorCode::DatabaseError),
        other => panic!("expected database error, got {other:?}"),
    }

    let events = driver.events();
    assert!(
        !events.contains(&Event::Rollback(0)),
        "no transaction was open to roll back: {events:?}"
    );
    assert!(driver.committed().is_empty());

    let reused = manager
        .with_session(|session| async move { Ok::<_, ScopeError>(session.connection().id()) }.boxed())
        .await
        .expect("connection is still usable");
    assert_eq!(reused, 0);
}
