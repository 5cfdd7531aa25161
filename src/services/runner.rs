//! Single-task async driver.
//!
//! [`StationRunner`] owns the [`ConnectionManager`] and is the only code that
//! touches it. Transport notifications, presentation commands and the timer
//! tick are all serialized through one `tokio::select!` loop, so the manager
//! itself needs no locking.
//!
//! # Example
//!
//! ```ignore
//! use train_station::services::{StationRunner, StdClock, TransportEvent};
//! use train_station::StationConfig;
//!
//! let (runner, mut handle) = StationRunner::new(StationConfig::default(), StdClock::new());
//! tokio::spawn(runner.run());
//!
//! // Feed transport notifications...
//! handle.events.send(TransportEvent::Connected { address: "AA:BB".into(), name: "ESP train".into() })?;
//! // ...forward handle.requests to the real stack, and watch handle.snapshots.
//! ```

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::address::{DeviceAddress, TrackKey};
use crate::config::StationConfig;
use crate::connection::{ConnectionManager, StationSnapshot};
use crate::traits::{Clock, DeviceInfo};

use super::channel::{ChannelTransport, TransportRequest};

// ============================================================================
// Messages
// ============================================================================

/// Notification from the transport side.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// A device appeared in discovery.
    Discovered(DeviceInfo),
    /// A stream opened.
    Connected {
        /// Device address.
        address: DeviceAddress,
        /// Name to publish.
        name: String,
    },
    /// A stream closed.
    Disconnected {
        /// Device address.
        address: DeviceAddress,
        /// Published name.
        name: String,
    },
    /// The device is gone from the adapter.
    Removed(DeviceAddress),
    /// One frame's worth of bytes arrived.
    Bytes {
        /// Sender.
        address: DeviceAddress,
        /// Raw frame.
        bytes: Vec<u8>,
    },
}

/// Request from the presentation side.
#[derive(Clone, Debug, PartialEq)]
pub enum StationCommand {
    /// Request command authority.
    Acquire(TrackKey),
    /// Give command authority back.
    Release(TrackKey),
    /// Request a normalized speed.
    Speed {
        /// Target track.
        key: TrackKey,
        /// Speed in `[0, 1]`.
        speed: f32,
    },
}

/// The outside ends of a runner's channels.
pub struct StationHandle {
    /// Transport notifications in. Dropping every sender stops the runner.
    pub events: mpsc::UnboundedSender<TransportEvent>,
    /// Presentation commands in.
    pub commands: mpsc::UnboundedSender<StationCommand>,
    /// Transport requests out.
    pub requests: mpsc::UnboundedReceiver<TransportRequest>,
    /// Latest devices and tracks, republished whenever something changes.
    pub snapshots: watch::Receiver<StationSnapshot>,
}

// ============================================================================
// Runner
// ============================================================================

/// Event loop around a [`ConnectionManager`].
pub struct StationRunner<C: Clock> {
    manager: ConnectionManager<ChannelTransport>,
    clock: C,
    poll_interval: Duration,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<StationCommand>,
    snapshots: watch::Sender<StationSnapshot>,
}

impl<C: Clock> StationRunner<C> {
    /// Build a runner and the handle used to talk to it.
    pub fn new(config: StationConfig, clock: C) -> (Self, StationHandle) {
        let (transport, requests) = ChannelTransport::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (snapshots, snapshots_rx) = watch::channel(StationSnapshot::default());

        let runner = Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            manager: ConnectionManager::new(transport, config),
            clock,
            events,
            commands,
            snapshots,
        };
        let handle = StationHandle {
            events: events_tx,
            commands: commands_tx,
            requests,
            snapshots: snapshots_rx,
        };
        (runner, handle)
    }

    /// The managed core.
    pub fn manager(&self) -> &ConnectionManager<ChannelTransport> {
        &self.manager
    }

    /// Run until every [`TransportEvent`] sender is dropped.
    pub async fn run(mut self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.poll_interval.is_zero(),
            "poll interval must be non-zero"
        );
        anyhow::ensure!(
            self.manager.config().sweep_interval_ms > 0,
            "sweep interval must be non-zero"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            sweep_ms = self.manager.config().sweep_interval_ms,
            "station runner started"
        );

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(command) = self.commands.recv() => self.handle_command(command),
                _ = ticker.tick() => {
                    self.manager.tick(self.clock.now_ms());
                }
            }
            self.publish();
        }

        info!("transport event channel closed, station runner stopped");
        Ok(())
    }

    fn handle_event(&mut self, event: TransportEvent) {
        let now_ms = self.clock.now_ms();
        match event {
            TransportEvent::Discovered(info) => self.manager.on_discovered(&info),
            TransportEvent::Connected { address, name } => self.manager.on_connected(address, name),
            TransportEvent::Disconnected { address, name } => {
                self.manager.on_disconnected(&address, &name)
            }
            TransportEvent::Removed(address) => self.manager.on_removed(&address),
            TransportEvent::Bytes { address, bytes } => {
                self.manager.on_bytes_received(&address, &bytes, now_ms)
            }
        }
    }

    fn handle_command(&mut self, command: StationCommand) {
        let now_ms = self.clock.now_ms();
        let result = match &command {
            StationCommand::Acquire(key) => self.manager.acquire(key),
            StationCommand::Release(key) => self.manager.release(key),
            StationCommand::Speed { key, speed } => self
                .manager
                .request_speed(key, *speed, now_ms)
                .map(|_| ()),
        };
        if let Err(e) = result {
            warn!(error = %e, ?command, "command failed");
        }
    }

    fn publish(&mut self) {
        let events = self.manager.drain_events();
        if events.is_empty() {
            return;
        }
        debug!(count = events.len(), "publishing snapshot");
        self.snapshots.send_replace(self.manager.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::services::StdClock;
    use crate::track::TrackDefinition;

    async fn next_write(requests: &mut mpsc::UnboundedReceiver<TransportRequest>) -> Frame {
        loop {
            match requests.recv().await {
                Some(TransportRequest::Write { bytes, .. }) => {
                    return Frame::decode_command(&bytes).unwrap()
                }
                Some(_) => continue,
                None => panic!("request channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn runner_publishes_tracks_and_forwards_commands() {
        let (runner, mut handle) = StationRunner::new(StationConfig::default(), StdClock::new());
        let task = tokio::spawn(runner.run());
        let addr: DeviceAddress = "AA:BB".into();

        handle
            .events
            .send(TransportEvent::Connected {
                address: addr.clone(),
                name: "ESP train".into(),
            })
            .unwrap();
        let caps = Frame::Capabilities {
            definitions: vec![TrackDefinition::new(1, "Loco1")],
        };
        handle
            .events
            .send(TransportEvent::Bytes {
                address: addr.clone(),
                bytes: caps.encode().to_vec(),
            })
            .unwrap();

        let snapshot = handle
            .snapshots
            .wait_for(|s| !s.tracks.is_empty())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.devices, vec!["ESP train".to_string()]);
        assert_eq!(snapshot.tracks[0].label, "Loco1");

        handle
            .commands
            .send(StationCommand::Acquire(TrackKey::new(addr.clone(), 1)))
            .unwrap();
        assert_eq!(
            next_write(&mut handle.requests).await,
            Frame::AcquireTrack { track_id: 1 }
        );

        drop(handle.events);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn zero_poll_interval_is_rejected() {
        let mut config = StationConfig::default();
        config.poll_interval_ms = 0;
        let (runner, _handle) = StationRunner::new(config, StdClock::new());
        assert!(runner.run().await.is_err());
    }
}
