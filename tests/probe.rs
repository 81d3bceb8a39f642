use std::time::Duration;

use futures_util::StreamExt;
use marathon_resolver::{ConnectivityState, Probe};
use tokio::net::TcpListener;
use tokio::time;

#[tokio::test]
async fn test_probe_reachable_then_stopped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let probe = Probe::new(&addr, Duration::from_secs(5)).unwrap();
    let mut states = probe.exec();

    assert_eq!(states.next().await, Some(ConnectivityState::Idle));
    assert_eq!(states.next().await, Some(ConnectivityState::Connecting));
    assert_eq!(states.next().await, Some(ConnectivityState::Ready));

    // Stop the endpoint: accept the pending connection and close it.
    let (conn, _) = listener.accept().await.unwrap();
    drop(conn);
    drop(listener);

    assert_eq!(
        states.next().await,
        Some(ConnectivityState::TransientFailure)
    );
    assert_eq!(states.next().await, None);

    probe.close();
}

#[tokio::test]
async fn test_probe_close_while_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let probe = Probe::new(&addr, Duration::from_secs(60)).unwrap();
    let mut states = probe.exec();
    let (_conn, _) = listener.accept().await.unwrap();

    let mut seen = Vec::new();
    while let Some(state) = states.next().await {
        seen.push(state);
        if state == ConnectivityState::Ready {
            break;
        }
    }
    assert_eq!(
        seen,
        vec![
            ConnectivityState::Idle,
            ConnectivityState::Connecting,
            ConnectivityState::Ready
        ]
    );

    let waiting = tokio::spawn(async move { states.next().await });
    time::sleep(Duration::from_millis(20)).await;
    probe.close();

    let end = time::timeout(Duration::from_secs(1), waiting)
        .await
        .expect("close should release the consumer")
        .unwrap();
    assert_eq!(end, None);
}
