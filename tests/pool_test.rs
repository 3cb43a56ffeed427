//! Connection pool integration tests
//!
//! Affinity (one connection per source key, also under concurrent callers)
//! and per-source ordering over real loopback sockets.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use tsdb_link::{ConnectionConfig, ConnectionPool, ConnectionState};

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> ConnectionConfig {
    ConnectionConfig::default()
        .with_connect_delay(Duration::from_millis(20))
        .with_write_deadline(Duration::from_secs(1))
}

async fn accept(listener: &TcpListener) -> TcpStream {
    let (socket, _) = timeout(WAIT, listener.accept())
        .await
        .expect("no connection within timeout")
        .unwrap();
    socket
}

async fn read_exactly(socket: &mut TcpStream, len: usize) -> String {
    let mut buf = vec![0u8; len];
    timeout(WAIT, socket.read_exact(&mut buf))
        .await
        .expect("data did not arrive within timeout")
        .unwrap();
    String::from_utf8(buf).unwrap()
}

// =============================================================================
// Affinity
// =============================================================================

#[tokio::test]
async fn test_concurrent_callers_share_one_connection() {
    let config = fast_config().with_connect_delay(Duration::from_secs(60));
    let pool = Arc::new(ConnectionPool::new("127.0.0.1:1", config).unwrap());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move { pool.connection("shared") }));
    }

    let mut connections = Vec::new();
    for handle in handles {
        connections.push(handle.await.unwrap());
    }

    assert_eq!(pool.len(), 1);
    for conn in &connections[1..] {
        assert!(Arc::ptr_eq(&connections[0], conn));
    }

    pool.shutdown().await;
}

#[tokio::test]
async fn test_distinct_keys_get_distinct_connections() {
    let config = fast_config().with_connect_delay(Duration::from_secs(60));
    let pool = ConnectionPool::new("127.0.0.1:1", config).unwrap();

    let keys: Vec<String> = (0..8).map(|i| format!("source-{}", i)).collect();
    let connections: Vec<_> = keys.iter().map(|k| pool.connection(k)).collect();

    for (i, a) in connections.iter().enumerate() {
        for b in &connections[i + 1..] {
            assert!(!Arc::ptr_eq(a, b));
        }
    }
    let registered: HashSet<String> = pool.source_keys().into_iter().collect();
    assert_eq!(registered, keys.into_iter().collect::<HashSet<_>>());

    pool.shutdown().await;
}

// =============================================================================
// Per-source ordering
// =============================================================================

#[tokio::test]
async fn test_each_source_ordered_on_its_own_socket() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let pool = Arc::new(ConnectionPool::new(addr, fast_config()).unwrap());

    let mut producers = Vec::new();
    for source in ["a", "b"] {
        let pool = Arc::clone(&pool);
        producers.push(tokio::spawn(async move {
            for i in 0..20 {
                pool.write(source, format!("{}-{:02}\n", source, i)).await;
            }
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..2 {
        let mut socket = accept(&listener).await;
        let received = read_exactly(&mut socket, 20 * 5).await;
        let source = &received[..1];
        let expected: String = (0..20).map(|i| format!("{}-{:02}\n", source, i)).collect();
        assert_eq!(received, expected);
        seen.insert(source.to_string());
    }
    assert_eq!(seen, HashSet::from(["a".to_string(), "b".to_string()]));

    timeout(WAIT, async {
        while pool.connected_count() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("both sources should be connected");

    let statuses = pool.statuses();
    assert_eq!(statuses.len(), 2);
    for status in statuses {
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.pending, 0);
    }

    pool.shutdown().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_pool_shutdown_closes_every_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let pool = ConnectionPool::new(addr, fast_config()).unwrap();

    pool.connection("a");
    pool.connection("b");
    let mut sockets = vec![accept(&listener).await, accept(&listener).await];

    timeout(WAIT, pool.shutdown())
        .await
        .expect("pool shutdown did not finish");

    for socket in &mut sockets {
        let mut buf = [0u8; 8];
        let n = timeout(WAIT, socket.read(&mut buf)).await.unwrap().unwrap();
        assert_eq!(n, 0);
    }
    for status in pool.statuses() {
        assert_eq!(status.state, ConnectionState::Closed);
    }
}
