use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wallet_radar::breaker::{BreakerState, CircuitBreaker};
use wallet_radar::config::BreakerConfig;
use wallet_radar::errors::BreakerError;

fn config(failures: u32, successes: u32, recovery_ms: u64) -> BreakerConfig {
    BreakerConfig {
        failure_threshold: failures,
        success_threshold: successes,
        recovery_timeout_ms: recovery_ms,
    }
}

#[test]
fn trips_after_consecutive_failures() {
    let breaker = CircuitBreaker::new(&config(3, 2, 1000));
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.on_failure_at(1);
    breaker.on_failure_at(2);
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.on_failure_at(3);
    assert_eq!(breaker.state(), BreakerState::Open);
    assert_eq!(breaker.check_at(500), Err(1000 - (500 - 3)));
}

#[test]
fn closed_success_resets_the_failure_count() {
    let breaker = CircuitBreaker::new(&config(3, 1, 1000));
    breaker.on_failure_at(1);
    breaker.on_failure_at(2);
    breaker.on_success();
    breaker.on_failure_at(3);
    breaker.on_failure_at(4);
    assert_eq!(breaker.state(), BreakerState::Closed);
    breaker.on_failure_at(5);
    assert_eq!(breaker.state(), BreakerState::Open);
}

#[test]
fn half_open_allows_one_trial_at_a_time() {
    let breaker = CircuitBreaker::new(&config(1, 2, 1000));
    breaker.on_failure_at(0);
    assert_eq!(breaker.state(), BreakerState::Open);
    assert!(breaker.check_at(500).is_err());

    assert_eq!(breaker.check_at(1001), Ok(()));
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    // the first trial is still in flight
    assert!(breaker.check_at(1002).is_err());

    breaker.on_success();
    assert_eq!(breaker.state(), BreakerState::HalfOpen);
    assert_eq!(breaker.check_at(1003), Ok(()));
    breaker.on_success();
    assert_eq!(breaker.state(), BreakerState::Closed);
}

#[test]
fn half_open_failure_restarts_the_recovery_timer() {
    let breaker = CircuitBreaker::new(&config(1, 2, 1000));
    breaker.on_failure_at(0);
    assert_eq!(breaker.check_at(1100), Ok(()));
    breaker.on_failure_at(1100);
    assert_eq!(breaker.state(), BreakerState::Open);
    assert_eq!(breaker.check_at(2000), Err(100));
    assert_eq!(breaker.check_at(2101), Ok(()));
}

#[tokio::test]
async fn open_breaker_rejects_without_invoking_the_call() {
    let breaker = CircuitBreaker::new(&config(1, 1, 60_000));
    let calls = Arc::new(AtomicUsize::new(0));

    let attempted = calls.clone();
    let result = breaker
        .execute(|| async move {
            attempted.fetch_add(1, Ordering::SeqCst);
            Err::<(), String>("boom".to_string())
        })
        .await;
    assert!(matches!(result, Err(BreakerError::Upstream(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let attempted = calls.clone();
    let rejected = breaker
        .execute(|| async move {
            attempted.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await;
    assert!(matches!(rejected, Err(BreakerError::Open { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn recovery_timeout_permits_a_trial_call() {
    let breaker = CircuitBreaker::new(&config(3, 1, 100));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let attempted = calls.clone();
        let result = breaker
            .execute(|| async move {
                attempted.fetch_add(1, Ordering::SeqCst);
                Err::<(), String>("boom".to_string())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Upstream(_))));
    }
    assert_eq!(breaker.state(), BreakerState::Open);

    // the 4th call is rejected without being attempted
    let attempted = calls.clone();
    let rejected = breaker
        .execute(|| async move {
            attempted.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await;
    assert!(matches!(rejected, Err(BreakerError::Open { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    // after the recovery timeout the 5th call is attempted as a trial
    tokio::time::sleep(Duration::from_millis(150)).await;
    let attempted = calls.clone();
    let trial = breaker
        .execute(|| async move {
            attempted.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await;
    assert!(trial.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(breaker.state(), BreakerState::Closed);
}
