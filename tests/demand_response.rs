// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end tests driving a device manager through a fake gateway.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{DIMMER, FakeGateway, SWITCH, THERMOSTAT, VEN, drain, settle};
use demand_optimizer::clock::ManualClock;
use demand_optimizer::gateway::{GatewayMessage, StreamEvent};
use demand_optimizer::{
    ComfortLevel, DeviceKind, DeviceManager, GridState, OptimizerConfig, OptimizerEvent,
    ResubscribePolicy, SettingsStore,
};
use tokio::task::JoinHandle;

struct Harness {
    gateway: Arc<FakeGateway>,
    clock: Arc<ManualClock>,
    events: tokio::sync::broadcast::Receiver<OptimizerEvent>,
    kill_switch: Arc<std::sync::atomic::AtomicBool>,
    task: JoinHandle<demand_optimizer::Result<()>>,
}

impl Harness {
    async fn start(settings: SettingsStore) -> Self {
        let gateway = Arc::new(FakeGateway::building());
        let clock = Arc::new(ManualClock::new());
        let config = OptimizerConfig::testing().with_clock(clock.clone());

        let mut manager = DeviceManager::new(Arc::clone(&gateway), Arc::new(settings))
            .with_config(config)
            .with_resubscribe_policy(ResubscribePolicy::forever());
        let events = manager.subscribe();
        let kill_switch = manager.disable_handle();
        manager.update_profiles().await.unwrap();

        let task = tokio::spawn(async move { manager.run().await });
        settle().await;
        gateway.emit(StreamEvent::Connected).await;

        // Observed state before any grid event.
        gateway.telemetry(THERMOSTAT, "CLISPC", "74").await;
        gateway.telemetry(THERMOSTAT, "CLISPH", "68").await;
        gateway.telemetry(DIMMER, "ST", "100").await;
        gateway.telemetry(SWITCH, "ST", "100").await;
        settle().await;

        Self {
            gateway,
            clock,
            events,
            kill_switch,
            task,
        }
    }
}

// ============================================================================
// Grid state fan-out
// ============================================================================

mod fan_out {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emergency_then_normal_round_trip() {
        let mut h = Harness::start(SettingsStore::in_memory()).await;

        h.gateway.grid_status(3).await;
        settle().await;

        assert_eq!(
            h.gateway.sent_to(THERMOSTAT),
            vec![
                ("CLISPC".to_string(), Some(78.0)),
                ("CLISPH".to_string(), Some(64.0)),
            ]
        );
        assert_eq!(h.gateway.sent_to(DIMMER), vec![("DON".to_string(), Some(50.0))]);
        assert_eq!(h.gateway.sent_to(SWITCH), vec![("DOF".to_string(), None)]);

        // Repeated signal is a no-op.
        h.gateway.clear_sent();
        h.gateway.grid_status(3).await;
        settle().await;
        assert!(h.gateway.sent().is_empty());

        h.gateway.grid_status(0).await;
        settle().await;
        assert_eq!(
            h.gateway.sent_to(THERMOSTAT),
            vec![
                ("CLISPC".to_string(), Some(74.0)),
                ("CLISPH".to_string(), Some(68.0)),
            ]
        );
        assert_eq!(h.gateway.sent_to(DIMMER), vec![("DON".to_string(), Some(100.0))]);
        assert_eq!(h.gateway.sent_to(SWITCH), vec![("DON".to_string(), None)]);

        let events = drain(&mut h.events);
        assert!(events.contains(&OptimizerEvent::SubscriptionChanged { connected: true }));
        assert!(events.contains(&OptimizerEvent::DutyCycleStarted {
            address: SWITCH.into(),
            percent: 50,
        }));
        assert!(events.contains(&OptimizerEvent::DutyCycleStopped {
            address: SWITCH.into(),
            restored: true,
        }));
        h.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn comfort_level_scales_targets() {
        let settings = SettingsStore::in_memory();
        settings.set_comfort_level(ComfortLevel::MaxSavings);
        let h = Harness::start(settings).await;

        h.gateway.grid_status(1).await;
        settle().await;

        // Offsets widen by two units at max savings: moderate becomes 3.
        assert_eq!(
            h.gateway.sent_to(THERMOSTAT),
            vec![
                ("CLISPC".to_string(), Some(77.0)),
                ("CLISPH".to_string(), Some(65.0)),
            ]
        );
        h.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn kill_switch_stops_fan_out() {
        let mut h = Harness::start(SettingsStore::in_memory()).await;

        h.kill_switch.store(true, Ordering::Relaxed);
        h.gateway.grid_status(2).await;
        settle().await;
        assert!(h.gateway.sent().is_empty());
        assert!(drain(&mut h.events).contains(&OptimizerEvent::GridStateChanged {
            state: GridState::High
        }));

        h.kill_switch.store(false, Ordering::Relaxed);
        h.gateway.grid_status(1).await;
        settle().await;
        assert!(!h.gateway.sent_to(THERMOSTAT).is_empty());
        h.task.abort();
    }
}

// ============================================================================
// User override and opt-out
// ============================================================================

mod override_handling {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn manual_setpoint_change_opts_out_until_expiry() {
        let mut h = Harness::start(SettingsStore::in_memory()).await;

        h.gateway.grid_status(2).await;
        settle().await;

        // Someone turns the cooling setpoint back down.
        h.gateway.telemetry(THERMOSTAT, "CLISPC", "72").await;
        h.clock.advance(Duration::from_secs(31));
        h.gateway.clear_sent();

        h.gateway.grid_status(3).await;
        settle().await;
        assert!(h.gateway.sent_to(THERMOSTAT).is_empty());

        let events = drain(&mut h.events);
        assert!(events.iter().any(|e| matches!(
            e,
            OptimizerEvent::UserOverride { address, observed, .. }
                if address.as_str() == THERMOSTAT && *observed == 72.0
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            OptimizerEvent::OptedOut { address, .. } if address.as_str() == THERMOSTAT
        )));

        // Ten minute opt-out in the testing configuration.
        h.clock.advance(Duration::from_secs(10 * 60));
        h.gateway.grid_status(1).await;
        settle().await;

        assert_eq!(
            h.gateway.sent_to(THERMOSTAT),
            vec![
                ("CLISPC".to_string(), Some(75.0)),
                ("CLISPH".to_string(), Some(67.0)),
            ]
        );
        assert!(drain(&mut h.events).contains(&OptimizerEvent::OptOutExpired {
            address: THERMOSTAT.into()
        }));
        h.task.abort();
    }
}

// ============================================================================
// Topology changes and the event stream
// ============================================================================

mod topology {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn removed_switch_is_restored_and_forgotten() {
        let mut h = Harness::start(SettingsStore::in_memory()).await;

        h.gateway.grid_status(1).await;
        settle().await;
        h.gateway.clear_sent();

        h.gateway
            .emit(StreamEvent::Message(GatewayMessage::node_update(SWITCH, "NR", None)))
            .await;
        settle().await;
        assert_eq!(h.gateway.sent_to(SWITCH), vec![("DON".to_string(), None)]);
        assert!(drain(&mut h.events).contains(&OptimizerEvent::DeviceEvicted {
            address: SWITCH.into(),
            kind: DeviceKind::Switch,
        }));

        // Later telemetry for the evicted switch goes nowhere.
        h.gateway.clear_sent();
        h.gateway.telemetry(SWITCH, "ST", "0").await;
        h.gateway.grid_status(3).await;
        settle().await;
        assert!(h.gateway.sent_to(SWITCH).is_empty());
        h.task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn lost_stream_is_reopened() {
        let mut h = Harness::start(SettingsStore::in_memory()).await;

        h.gateway.hang_up();
        // Backoff starts at one second.
        tokio::time::sleep(Duration::from_secs(2)).await;
        h.gateway.emit(StreamEvent::Connected).await;
        h.gateway.grid_status(2).await;
        settle().await;

        let events = drain(&mut h.events);
        let changes: Vec<bool> = events
            .iter()
            .filter_map(|e| match e {
                OptimizerEvent::SubscriptionChanged { connected } => Some(*connected),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![true, false, true]);
        assert!(!h.gateway.sent_to(THERMOSTAT).is_empty());
        h.task.abort();
    }

    #[tokio::test]
    async fn ven_setting_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        {
            let settings = SettingsStore::try_open(&path).unwrap();
            let h = Harness::start(settings).await;
            h.gateway.telemetry(VEN, "CL", "1").await;
            settle().await;
            h.task.abort();
        }

        let reopened = SettingsStore::try_open(&path).unwrap();
        assert_eq!(reopened.comfort_level(), ComfortLevel::Balanced);
    }
}
