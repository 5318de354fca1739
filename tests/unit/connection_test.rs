use bienestar::connection::{ConnectionManager, RetryPolicy, verify_credentials};
use bienestar::driver::{CellValue, ProcedureDriver, ResultSet, Scalar};
use bienestar::error::{CallError, CallErrorKind};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Driver that replays a scripted sequence of outcomes; once the script
/// runs out every call succeeds with no result sets.
struct ScriptedDriver {
    outcomes: VecDeque<Result<Vec<ResultSet>, CallError>>,
}

impl ProcedureDriver for ScriptedDriver {
    fn call(&mut self, _procedure: &str, _args: &[Scalar]) -> Result<Vec<ResultSet>, CallError> {
        self.outcomes.pop_front().unwrap_or_else(|| Ok(vec![]))
    }
}

fn one_row(column: &str, value: &str) -> Vec<ResultSet> {
    vec![ResultSet {
        columns: vec![column.to_string()],
        rows: vec![vec![CellValue::Text(value.to_string())]],
    }]
}

async fn manager_with(
    outcomes: Vec<Result<Vec<ResultSet>, CallError>>,
) -> ConnectionManager {
    let script = std::sync::Mutex::new(Some(VecDeque::from(outcomes)));
    ConnectionManager::connect(
        move || {
            Ok(ScriptedDriver {
                outcomes: script.lock().unwrap().take().unwrap_or_default(),
            })
        },
        RetryPolicy::Bounded {
            attempts: 1,
            delay: Duration::from_millis(1),
        },
    )
    .await
    .expect("scripted driver connects on the first attempt")
}

#[tokio::test]
async fn test_unbounded_retry_succeeds_on_third_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let factory = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 {
            Err(CallError::connection("database unreachable"))
        } else {
            Ok(ScriptedDriver {
                outcomes: VecDeque::new(),
            })
        }
    };

    let manager = ConnectionManager::connect(
        factory,
        RetryPolicy::Unbounded {
            delay: Duration::from_millis(10),
        },
    )
    .await
    .expect("third attempt should succeed");

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_bounded_retry_gives_up_after_three_attempts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let factory = move || -> Result<ScriptedDriver, CallError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(CallError::auth("access denied for user 'intruso'"))
    };

    let result = ConnectionManager::connect(
        factory,
        RetryPolicy::Bounded {
            attempts: 3,
            delay: Duration::from_millis(1),
        },
    )
    .await;

    let error = result.err().expect("bounded policy must give up");
    assert_eq!(error.kind, CallErrorKind::Auth);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_call_returns_flattened_records() {
    let manager = manager_with(vec![Ok(one_row("Fecha", "2026-03-01"))]).await;

    let records = manager
        .call("pas_citas_disponibles", vec![])
        .await
        .expect("scripted success");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Key"], json!(0));
    assert_eq!(records[0]["Fecha"], json!("2026-03-01"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_connection_usable_after_failed_call() {
    let manager = manager_with(vec![
        Err(CallError::database("Deadlock found when trying to get lock")),
        Ok(one_row("Total", "1")),
    ])
    .await;

    let error = manager
        .call("pas_agendar_cita", vec![Scalar::Int(4)])
        .await
        .err()
        .expect("first call fails");
    assert_eq!(error.kind, CallErrorKind::Database);

    let records = manager
        .call("pas_agendar_cita", vec![Scalar::Int(4)])
        .await
        .expect("second call succeeds on the same connection");
    assert_eq!(records[0]["Total"], json!("1"));

    manager.shutdown().await;
}

#[tokio::test]
async fn test_empty_procedure_name_rejected() {
    let manager = manager_with(vec![]).await;
    let error = manager.call("", vec![]).await.err().expect("rejected");
    assert_eq!(error.kind, CallErrorKind::InvalidCall);
    manager.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_rejects_later_calls() {
    let manager = manager_with(vec![]).await;
    manager.shutdown().await;
    // Releasing an already-released connection is a no-op.
    manager.shutdown().await;

    let error = manager
        .call("pas_citas_disponibles", vec![])
        .await
        .err()
        .expect("calls after shutdown fail");
    assert_eq!(error.kind, CallErrorKind::Connection);
}

#[tokio::test]
async fn test_verify_credentials_reports_auth_failure() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let factory = move || -> Result<ScriptedDriver, CallError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(CallError::auth("access denied"))
    };

    let error = verify_credentials(
        factory,
        RetryPolicy::Bounded {
            attempts: 2,
            delay: Duration::from_millis(1),
        },
    )
    .await
    .err()
    .expect("wrong credentials surface as an error");
    assert_eq!(error.kind, CallErrorKind::Auth);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_verify_credentials_accepts_valid_login() {
    let factory = || {
        Ok(ScriptedDriver {
            outcomes: VecDeque::new(),
        })
    };
    verify_credentials(
        factory,
        RetryPolicy::Bounded {
            attempts: 3,
            delay: Duration::from_millis(1),
        },
    )
    .await
    .expect("valid credentials connect");
}
