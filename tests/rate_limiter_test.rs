use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wallet_radar::config::RateLimiterConfig;
use wallet_radar::rate_limiter::RateLimiter;

fn config(rate: u32, burst: u32, burst_window_ms: u64) -> RateLimiterConfig {
    RateLimiterConfig {
        rate_per_second: rate,
        burst_cap: burst,
        burst_window_ms,
        call_weight: 1,
    }
}

#[test]
fn window_capacity_is_enforced() {
    let limiter = RateLimiter::new(&config(2, 10, 5000));
    assert!(limiter.try_admit_at(0, 1).is_some());
    assert!(limiter.try_admit_at(0, 1).is_some());
    assert!(limiter.try_admit_at(999, 1).is_none()); // full
    assert!(limiter.try_admit_at(1000, 1).is_some()); // window moved on
}

#[test]
fn weights_count_against_the_window() {
    let limiter = RateLimiter::new(&config(5, 20, 5000));
    assert!(limiter.try_admit_at(0, 3).is_some());
    assert!(limiter.try_admit_at(100, 2).is_some());
    assert!(limiter.try_admit_at(200, 1).is_none()); // 3 + 2 + 1 > 5
    assert!(limiter.try_admit_at(1050, 3).is_some()); // first sample aged out
}

#[test]
fn failed_call_weight_is_not_counted() {
    let limiter = RateLimiter::new(&config(2, 10, 5000));
    let first = limiter.try_admit_at(0, 1).expect("admit first");
    assert!(limiter.try_admit_at(0, 1).is_some());
    assert!(limiter.try_admit_at(0, 1).is_none());
    limiter.settle_failure(first);
    assert!(limiter.try_admit_at(0, 1).is_some());
}

#[test]
fn burst_cap_limits_retained_weight_beyond_the_window() {
    let limiter = RateLimiter::new(&config(5, 3, 5000));
    assert!(limiter.try_admit_at(0, 1).is_some());
    assert!(limiter.try_admit_at(1100, 1).is_some());
    assert!(limiter.try_admit_at(2200, 1).is_some());
    // each second's window has room, but the burst horizon is saturated
    assert!(limiter.try_admit_at(3300, 1).is_none());
    // the oldest sample leaves the horizon
    assert!(limiter.try_admit_at(5001, 1).is_some());
}

#[tokio::test]
async fn execute_passes_the_result_through() {
    let limiter = RateLimiter::new(&config(5, 10, 5000));
    let result = limiter.execute(1, || async { Ok::<u32, String>(7) }).await;
    assert_eq!(result, Ok(7));
}

#[tokio::test]
async fn failed_execution_does_not_consume_capacity() {
    let limiter = RateLimiter::new(&config(1, 1, 5000));
    let failed = limiter
        .execute(1, || async { Err::<u32, String>("boom".to_string()) })
        .await;
    assert!(failed.is_err());
    // the failed call's slot was released, so this must not wait a window
    let started = Instant::now();
    let ok = limiter.execute(1, || async { Ok::<u32, String>(7) }).await;
    assert_eq!(ok, Ok(7));
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn waiters_are_admitted_in_arrival_order() {
    let limiter = Arc::new(RateLimiter::new(&config(1, 10, 5000)));
    let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
    let started = Instant::now();

    let mut handles = Vec::new();
    for tag in 1..=3u32 {
        let limiter = limiter.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            limiter
                .execute(1, || async {
                    order.lock().unwrap().push(tag);
                    Ok::<(), String>(())
                })
                .await
        }));
        // fix the arrival order before spawning the next caller
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    for handle in handles {
        handle.await.expect("join").expect("execute");
    }

    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    // one admission per second: the third caller waited two windows
    assert!(started.elapsed() >= Duration::from_millis(1900));
}
