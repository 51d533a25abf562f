use anyhow::Context;
use pose_link::domain::models::{AppEvent, ConnectionStatus, MessageSeverity};
use pose_link::domain::settings::SettingsService;
use pose_link::infrastructure::bridge::{BridgeState, StreamingBridge};
use pose_link::infrastructure::link::connection::{connector_for, ConnectOptions};
use pose_link::infrastructure::link::discovery::AllowListGate;
use pose_link::infrastructure::link::protocol::FrameEncoder;
use pose_link::infrastructure::link::ConnectionManager;
use pose_link::infrastructure::logging::init_logger;
use pose_link::infrastructure::tracking::SimulatedTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = match std::env::args().nth(1) {
        Some(path) => SettingsService::load_from(path),
        None => SettingsService::new().context("Failed to load settings")?,
    };
    let settings = settings_service.get().clone();

    let _logging_guard = init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!(
        "Starting Pose Link (settings: {})",
        settings_service.path().display()
    );

    let link = &settings.link;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let connector = connector_for(
        link.transport,
        Duration::from_millis(link.connect_timeout_ms),
        link.write_timeout_ms.map(Duration::from_millis),
    );
    let manager = Arc::new(
        ConnectionManager::new(
            Arc::from(connector),
            Arc::new(AllowListGate::new(link.known_peers.iter().cloned())),
        )
        .with_event_sender(event_tx.clone()),
    );

    let mut tracker = SimulatedTracker::new(settings.tracking.rate_hz);
    let mut bridge = StreamingBridge::new(manager.clone(), FrameEncoder::new(link.byte_order))
        .with_event_sender(event_tx);
    bridge.subscribe(&tracker, settings.tracking.frame_pair())?;
    tracker.start()?;

    // Failure is reported through the event channel; no retry unless configured
    let options = ConnectOptions::from(link);
    let _ = manager.connect(&link.peer_address, &options).await;

    let mut reconnect_tick =
        tokio::time::interval(Duration::from_millis(link.reconnect_interval_ms.max(100)));
    reconnect_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => match event {
                AppEvent::ConnectionStatus(status) => info!("Link status: {:?}", status),
                AppEvent::LogMessage(msg) => match msg.severity {
                    MessageSeverity::Error => error!("{}", msg.message),
                    MessageSeverity::Warning => warn!("{}", msg.message),
                    _ => info!("{}", msg.message),
                },
            },
            _ = reconnect_tick.tick(), if link.auto_reconnect => {
                let status = manager.status();
                if status != ConnectionStatus::Connected {
                    info!("Link {:?}, reconnecting to {}", status, link.peer_address);
                    let _ = manager.connect(&link.peer_address, &options).await;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }

        if !bridge.is_receiving() && bridge.state() == BridgeState::Subscribed {
            error!("Tracking service dropped the pose subscription");
            break;
        }
    }

    info!("Shutting down");
    bridge.unsubscribe();
    tracker.stop();
    manager.close();

    let stats = bridge.stats();
    info!(
        "Frames sent: {}, dropped: {}, failed: {}",
        stats.frames_sent, stats.frames_dropped, stats.write_failures
    );

    Ok(())
}
