//! Many concurrent clients: id assignment and registry bookkeeping.

use std::collections::BTreeSet;
use std::time::Duration;

use connhub::EchoHandler;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients_get_ids_one_to_n() {
    let running = common::start_tcp(common::tcp_config(), EchoHandler).await;
    let registry = running.server.registry().clone();
    let concurrency = 50;

    let mut tasks = Vec::new();
    for i in 0..concurrency {
        let addr = running.addr;
        tasks.push(tokio::spawn(async move {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let payload = format!("client-{i:03}");
            client.write_all(payload.as_bytes()).await.unwrap();
            let mut echoed = vec![0u8; payload.len()];
            client.read_exact(&mut echoed).await.unwrap();
            assert_eq!(echoed, payload.as_bytes());
            client
        }));
    }

    let mut clients = Vec::new();
    for task in tasks {
        clients.push(task.await.unwrap());
    }

    assert!(common::wait_until(Duration::from_secs(2), || registry.len() == concurrency).await);
    let ids: BTreeSet<u64> = registry.snapshot().iter().map(|info| info.id().as_u64()).collect();
    let expected: BTreeSet<u64> = (1..=concurrency as u64).collect();
    assert_eq!(ids, expected, "ids must be 1..=N with no gaps or duplicates");

    // Closing everything empties the registry; ids are never reused.
    drop(clients);
    assert!(running.server.drain(Duration::from_secs(5)).await);

    let _late = common::connect_registered(&running, 1).await;
    let late_id = registry.snapshot()[0].id().as_u64();
    assert_eq!(late_id, concurrency as u64 + 1);

    running.server.stop();
    assert!(running.task.await.unwrap().is_ok());
}
