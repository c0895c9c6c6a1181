use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use notification_service::{
    error::NotificationError, models::retry::RetryConfig, utils::retry_with_backoff,
};
use tokio::time::Instant;

fn config(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms,
        max_delay_ms,
        backoff_multiplier: 2,
    }
}

/// Test: Successful operations complete without retry
#[tokio::test]
async fn test_successful_operation_no_retry() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&config(3, 100, 1000), || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, NotificationError>("token")
        }
    })
    .await
    .unwrap();

    assert_eq!(result, "token");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

/// Test: Transient failures are retried until success
#[tokio::test]
async fn test_transient_failures_are_retried() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&config(5, 20, 200), || {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err("Configuration service returned status 503".to_string())
            } else {
                Ok(())
            }
        }
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// Test: Permanent failures exhaust retries and surface the last error
#[tokio::test]
async fn test_permanent_failure_exhausts_retries() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);

    let result = retry_with_backoff(&config(4, 10, 100), || {
        let counter = Arc::clone(&counter);
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Err::<(), _>(NotificationError::Tenant(format!("attempt {}", attempt)))
        }
    })
    .await;

    assert!(matches!(result, Err(NotificationError::Tenant(message)) if message == "attempt 4"));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

/// Test: Retry delays follow exponential backoff
#[tokio::test]
async fn test_exponential_backoff_timing() {
    let config = config(4, 100, 1000);
    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = retry_with_backoff(&config, || {
        let times = Arc::clone(&times);
        async move {
            times.lock().await.push(start.elapsed().as_millis());
            Err::<(), _>("unavailable")
        }
    })
    .await;

    let times = attempt_times.lock().await;
    assert_eq!(times.len(), 4);
    assert!(times[0] < 50, "First attempt should be immediate");

    for i in 1..times.len() {
        let delay = times[i] - times[i - 1];
        let base = config.initial_delay_ms * config.backoff_multiplier.pow(i as u32 - 1);

        assert!(
            delay >= (base * 8 / 10) as u128 && delay <= (base * 13 / 10) as u128,
            "Delay {} of {}ms outside expected range around {}ms",
            i,
            delay,
            base
        );
    }
}

/// Test: Max delay cap is respected
#[tokio::test]
async fn test_max_delay_cap_respected() {
    let config = config(6, 100, 300);
    let start = Instant::now();
    let attempt_times = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let times = Arc::clone(&attempt_times);

    let _ = retry_with_backoff(&config, || {
        let times = Arc::clone(&times);
        async move {
            times.lock().await.push(start.elapsed().as_millis());
            Err::<(), _>("unavailable")
        }
    })
    .await;

    let times = attempt_times.lock().await;
    for i in 3..times.len() {
        let delay = times[i] - times[i - 1];
        assert!(
            delay <= (config.max_delay_ms * 13 / 10) as u128,
            "Delay should not exceed max_delay_ms cap"
        );
    }
}

/// Test: Concurrent retries keep independent state
#[tokio::test]
async fn test_retry_state_independence() {
    let config = Arc::new(config(5, 20, 200));

    let failing_config = Arc::clone(&config);
    let failing = tokio::spawn(async move {
        retry_with_backoff(&failing_config, || async { Err::<(), _>("always") }).await
    });

    let attempts = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&attempts);
    let recovering_config = Arc::clone(&config);
    let recovering = tokio::spawn(async move {
        retry_with_backoff(&recovering_config, || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("not yet")
                } else {
                    Ok("done")
                }
            }
        })
        .await
    });

    let (failing, recovering) = tokio::join!(failing, recovering);

    assert!(failing.unwrap().is_err());
    assert_eq!(recovering.unwrap(), Ok("done"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}
