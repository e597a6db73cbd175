use super::*;

#[tokio::test(start_paused = true)]
async fn accumulates_only_while_running() {
    let mut stopwatch = Stopwatch::new();
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(stopwatch.elapsed(), Duration::ZERO);

    stopwatch.start();
    tokio::time::advance(Duration::from_secs(10)).await;
    stopwatch.pause();
    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(stopwatch.elapsed(), Duration::from_secs(10));

    stopwatch.start();
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(stopwatch.elapsed(), Duration::from_secs(12));
    assert!(stopwatch.is_running());
}

#[tokio::test(start_paused = true)]
async fn reset_restarts_from_zero() {
    let mut stopwatch = Stopwatch::new();
    stopwatch.start();
    tokio::time::advance(Duration::from_secs(40)).await;
    stopwatch.reset();
    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(stopwatch.elapsed(), Duration::from_secs(3));

    stopwatch.pause();
    stopwatch.reset();
    assert_eq!(stopwatch.elapsed(), Duration::ZERO);
    assert!(!stopwatch.is_running());
}
