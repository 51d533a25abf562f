//! End-to-end streaming over a loopback TCP peer.

use pose_link::domain::models::{AppEvent, ConnectionStatus, PoseSample};
use pose_link::infrastructure::link::connection::{ConnectOptions, TcpConnector};
use pose_link::infrastructure::link::discovery::AllowListGate;
use pose_link::infrastructure::tracking::PoseDispatcher;
use pose_link::{ByteOrder, ConnectionManager, CoordinateFramePair, Frame, FrameEncoder, StreamingBridge, FRAME_LEN};
use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn tcp_manager() -> Arc<ConnectionManager> {
    Arc::new(ConnectionManager::new(
        Arc::new(TcpConnector::default()),
        Arc::new(AllowListGate::default()),
    ))
}

fn read_frames(bytes: &[u8], order: ByteOrder) -> Vec<[f32; 3]> {
    assert_eq!(bytes.len() % FRAME_LEN, 0, "partial frame on the wire");
    bytes
        .chunks_exact(FRAME_LEN)
        .map(|chunk| Frame::from_bytes(chunk).unwrap().position(order))
        .collect()
}

#[tokio::test]
async fn test_poses_stream_to_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let manager = tcp_manager();
    let dispatcher = PoseDispatcher::new();

    let mut bridge = StreamingBridge::new(manager.clone(), FrameEncoder::default());
    bridge.subscribe(&dispatcher, CoordinateFramePair::default()).unwrap();

    // Nothing is connected yet: dropped, not queued
    dispatcher.dispatch(PoseSample::at([9.0, 9.0, 9.0]));

    manager.connect(&addr, &ConnectOptions::default()).await.unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    dispatcher.dispatch(PoseSample::at([1.5, -2.25, 100.0]));
    dispatcher.dispatch(PoseSample::at([0.25, 0.5, 0.75]));
    manager.close();
    dispatcher.dispatch(PoseSample::at([7.0, 7.0, 7.0]));

    let mut received = Vec::new();
    peer.read_to_end(&mut received).unwrap();

    assert_eq!(
        read_frames(&received, ByteOrder::Little),
        vec![[1.5, -2.25, 100.0], [0.25, 0.5, 0.75]]
    );
    let stats = bridge.stats();
    assert_eq!(stats.frames_sent, 2);
    assert_eq!(stats.frames_dropped, 2);
    assert_eq!(stats.write_failures, 0);
}

#[tokio::test]
async fn test_big_endian_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let manager = tcp_manager();
    let dispatcher = PoseDispatcher::new();

    let mut bridge = StreamingBridge::new(manager.clone(), FrameEncoder::new(ByteOrder::Big));
    bridge.subscribe(&dispatcher, CoordinateFramePair::default()).unwrap();

    manager.connect(&addr, &ConnectOptions::default()).await.unwrap();
    let (mut peer, _) = listener.accept().unwrap();
    dispatcher.dispatch(PoseSample::at([1.5, -2.25, 100.0]));
    manager.close();

    let mut received = Vec::new();
    peer.read_to_end(&mut received).unwrap();
    assert_eq!(
        received,
        vec![0x3F, 0xC0, 0x00, 0x00, 0xC0, 0x10, 0x00, 0x00, 0x42, 0xC8, 0x00, 0x00]
    );
}

#[tokio::test]
async fn test_peer_loss_then_explicit_reconnect() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let manager = Arc::new(
        ConnectionManager::new(
            Arc::new(TcpConnector::default()),
            Arc::new(AllowListGate::default()),
        )
        .with_event_sender(tx),
    );
    let dispatcher = PoseDispatcher::new();
    let mut bridge = StreamingBridge::new(manager.clone(), FrameEncoder::default());
    bridge.subscribe(&dispatcher, CoordinateFramePair::default()).unwrap();

    manager.connect(&addr, &ConnectOptions::default()).await.unwrap();
    let (peer, _) = listener.accept().unwrap();
    drop(peer);

    // The kernel needs a write or two to notice the peer is gone
    let deadline = Instant::now() + Duration::from_secs(5);
    while bridge.stats().write_failures == 0 && Instant::now() < deadline {
        dispatcher.dispatch(PoseSample::at([1.0, 2.0, 3.0]));
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(bridge.stats().write_failures > 0);
    assert!(bridge.is_receiving());
    assert!(manager.is_faulted());
    assert_eq!(manager.status(), ConnectionStatus::Error);

    // Reconnection is the control context's call
    let (new_peer, sent_before) = {
        let conn = manager.reconnect().await.unwrap();
        assert!(conn.is_ready());
        let (peer, _) = listener.accept().unwrap();
        (peer, bridge.stats().frames_sent)
    };
    dispatcher.dispatch(PoseSample::at([4.0, 5.0, 6.0]));
    assert_eq!(bridge.stats().frames_sent, sent_before + 1);
    manager.close();

    let mut received = Vec::new();
    let mut new_peer = new_peer;
    new_peer.read_to_end(&mut received).unwrap();
    assert_eq!(read_frames(&received, ByteOrder::Little), vec![[4.0, 5.0, 6.0]]);

    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let AppEvent::ConnectionStatus(status) = event {
            statuses.push(status);
        }
    }
    assert_eq!(
        statuses,
        vec![
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
        ]
    );
}

#[tokio::test]
async fn test_connect_failure_is_typed_and_leaves_bridge_running() {
    let port = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let manager = tcp_manager();
    let dispatcher = PoseDispatcher::new();
    let mut bridge = StreamingBridge::new(manager.clone(), FrameEncoder::default());
    bridge.subscribe(&dispatcher, CoordinateFramePair::default()).unwrap();

    let result = manager
        .connect(&format!("127.0.0.1:{port}"), &ConnectOptions::default())
        .await;
    assert!(matches!(result, Err(pose_link::ConnectionError::Unreachable(_))));

    assert_eq!(dispatcher.dispatch(PoseSample::at([1.0, 1.0, 1.0])), 1);
    assert!(bridge.is_receiving());
    assert_eq!(bridge.stats().frames_dropped, 1);
}
