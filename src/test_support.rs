// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory gateway for unit tests.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::gateway::{CommandStatus, Device, DeviceCommand, Gateway, StreamEvent};

/// A command as the gateway received it.
#[derive(Debug, Clone)]
pub(crate) struct SentCommand {
    pub command: DeviceCommand,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Default)]
struct Script {
    devices: Vec<Device>,
    failing: HashSet<String>,
    fail_transport: bool,
    fail_discovery: bool,
    truncate: bool,
    delay: Duration,
    streams: VecDeque<Vec<StreamEvent>>,
    subscribe_calls: usize,
}

/// Records every command and answers from a script.
///
/// Commands succeed unless their id was marked failing. Each `subscribe`
/// call replays the next queued stream, then closes it; with no stream
/// queued, subscribing fails.
#[derive(Debug, Default)]
pub(crate) struct RecordingGateway {
    script: Mutex<Script>,
    sent: Mutex<Vec<SentCommand>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        let gateway = Self::new();
        gateway.set_devices(devices);
        gateway
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        self.script.lock().devices = devices;
    }

    /// Answers 500 for every command with this id.
    pub fn fail_command(&self, command_id: &str) {
        self.script.lock().failing.insert(command_id.to_string());
    }

    pub fn fail_transport(&self, fail: bool) {
        self.script.lock().fail_transport = fail;
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.script.lock().fail_discovery = fail;
    }

    /// Answers with an empty status list.
    pub fn truncate_answers(&self, truncate: bool) {
        self.script.lock().truncate = truncate;
    }

    /// Time each `send_commands` call takes.
    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = delay;
    }

    pub fn push_stream(&self, events: Vec<StreamEvent>) {
        self.script.lock().streams.push_back(events);
    }

    pub fn subscribe_calls(&self) -> usize {
        self.script.lock().subscribe_calls
    }

    pub fn sent(&self) -> Vec<SentCommand> {
        self.sent.lock().clone()
    }

    pub fn command_ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .map(|s| s.command.command_id.clone())
            .collect()
    }
}

impl Gateway for RecordingGateway {
    async fn discover_devices(&self) -> Result<Vec<Device>, GatewayError> {
        let script = self.script.lock();
        if script.fail_discovery {
            return Err(GatewayError::RequestFailed("profiles unavailable".to_string()));
        }
        Ok(script.devices.clone())
    }

    async fn send_commands(
        &self,
        commands: Vec<DeviceCommand>,
    ) -> Result<Vec<CommandStatus>, GatewayError> {
        let started = Instant::now();
        let delay = self.script.lock().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let finished = Instant::now();

        let (fail_transport, truncate, failing) = {
            let script = self.script.lock();
            (script.fail_transport, script.truncate, script.failing.clone())
        };

        let mut statuses: Vec<CommandStatus> = commands
            .iter()
            .map(|c| {
                if failing.contains(&c.command_id) {
                    CommandStatus { status_code: 500 }
                } else {
                    CommandStatus::OK
                }
            })
            .collect();

        self.sent.lock().extend(commands.into_iter().map(|command| SentCommand {
            command,
            started,
            finished,
        }));

        if fail_transport {
            return Err(GatewayError::ConnectionFailed("gateway unreachable".to_string()));
        }
        if truncate {
            statuses.clear();
        }
        Ok(statuses)
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<StreamEvent>, GatewayError> {
        let events = {
            let mut script = self.script.lock();
            script.subscribe_calls += 1;
            script.streams.pop_front()
        };
        let Some(events) = events else {
            return Err(GatewayError::SubscriptionClosed);
        };

        let (tx, rx) = mpsc::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event.
            let _ = tx.try_send(event);
        }
        Ok(rx)
    }
}
