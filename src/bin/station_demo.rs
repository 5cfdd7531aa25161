//! Station demo against a simulated track unit.
//!
//! Runs a [`StationRunner`] on one task and a fake device on another. The
//! device answers the connect request, declares two tracks, pings once a
//! second, grants every acquire/release, and reports state after each speed
//! command. The demo then acquires a track, ramps its speed and releases it.
//!
//! ```bash
//! cargo run --features runtime --bin station_demo
//! RUST_LOG=train_station=debug cargo run --features runtime --bin station_demo
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use train_station::services::{
    StationCommand, StationHandle, StationRunner, StdClock, TransportEvent, TransportRequest,
};
use train_station::traits::DeviceInfo;
use train_station::{
    Capabilities, DeviceAddress, Direction, Frame, Position, StationConfig, TrackDefinition,
    TrackKey, TrackState,
};

const DEVICE: &str = "24:6F:28:00:00:01";
const DEVICE_NAME: &str = "ESP train";
const MAX_SPEED: u32 = 4096;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (runner, handle) = StationRunner::new(StationConfig::default(), StdClock::new());
    let StationHandle {
        events,
        commands,
        requests,
        mut snapshots,
    } = handle;

    let station = tokio::spawn(runner.run());
    let device = tokio::spawn(simulated_device(DEVICE.into(), requests, events.clone()));

    events.send(TransportEvent::Discovered(DeviceInfo::new(DEVICE, DEVICE_NAME)))?;
    snapshots.wait_for(|s| !s.tracks.is_empty()).await?;

    let key = TrackKey::new(DEVICE, 1);
    commands.send(StationCommand::Acquire(key.clone()))?;
    snapshots
        .wait_for(|s| s.tracks.iter().any(|t| t.key == key && t.linked))
        .await?;
    info!(track = %key, "track acquired");

    for step in 1..=5 {
        let speed = step as f32 / 5.0;
        commands.send(StationCommand::Speed {
            key: key.clone(),
            speed,
        })?;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let snapshot = snapshots.borrow().clone();
        for track in &snapshot.tracks {
            info!(
                track = %track.key,
                label = %track.label,
                speed = track.speed,
                direction = ?track.direction,
                position = ?track.position,
                count = track.count,
                "track state"
            );
        }
    }

    commands.send(StationCommand::Release(key.clone()))?;
    snapshots
        .wait_for(|s| s.tracks.iter().any(|t| t.key == key && !t.linked))
        .await?;
    info!(track = %key, "track released");

    drop(events);
    device.abort();
    station.await??;
    Ok(())
}

/// Fake track unit speaking the wire protocol over the runner's channels.
async fn simulated_device(
    address: DeviceAddress,
    mut requests: mpsc::UnboundedReceiver<TransportRequest>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let send = |frame: Frame| {
        let _ = events.send(TransportEvent::Bytes {
            address: address.clone(),
            bytes: frame.encode().to_vec(),
        });
    };

    let mut connected = false;
    let mut pings = 0u64;
    let mut count = 0u32;
    let mut ping_timer = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else { return };
                match request {
                    TransportRequest::Connect(_) => {
                        connected = true;
                        let _ = events.send(TransportEvent::Connected {
                            address: address.clone(),
                            name: DEVICE_NAME.into(),
                        });
                        let features = Capabilities::SPEED_CONTROL | Capabilities::POSITIONING;
                        send(Frame::Capabilities {
                            definitions: vec![
                                TrackDefinition::new(1, "Loco1")
                                    .with_max_speed(MAX_SPEED)
                                    .with_capabilities(features),
                                TrackDefinition::new(2, "Loco2")
                                    .with_max_speed(MAX_SPEED)
                                    .with_capabilities(features),
                            ],
                        });
                    }
                    TransportRequest::Disconnect(_) => {
                        connected = false;
                        let _ = events.send(TransportEvent::Disconnected {
                            address: address.clone(),
                            name: DEVICE_NAME.into(),
                        });
                    }
                    TransportRequest::Write { bytes, .. } => match Frame::decode_command(&bytes) {
                        Ok(Frame::AcquireTrack { track_id }) => {
                            send(Frame::AcquireAck { track_id, granted: true })
                        }
                        Ok(Frame::ReleaseTrack { track_id }) => {
                            send(Frame::ReleaseAck { track_id, granted: true })
                        }
                        Ok(Frame::SpeedCommand { track_id, raw_speed }) => {
                            count += 1;
                            let position = if raw_speed == 0 {
                                Position::InStation
                            } else {
                                Position::from_code((count % 6) as i32)
                            };
                            send(Frame::TrackState {
                                track_id,
                                state: TrackState {
                                    direction: if raw_speed > 0 {
                                        Direction::Forward
                                    } else {
                                        Direction::Idle
                                    },
                                    speed: raw_speed,
                                    count,
                                    position,
                                },
                            });
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "device received garbage"),
                    },
                }
            }
            _ = ping_timer.tick() => {
                if connected {
                    pings += 1;
                    send(Frame::Ping { count: pings });
                }
            }
        }
    }
}
