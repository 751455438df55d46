//! Generic select entity for a device operating mode.
//!
//! Holds the last mode reported by the device and turns user choices into
//! device commands. The displayed mode only ever changes through sensor
//! updates; a sent command is confirmed (or not) by a later update.

use super::{SelectEntity, SelectMode};
use crate::config::BridgeConfig;
use crate::device::{DeviceLink, SensorId};
use crate::error::{BridgeError, Result};
use crate::updates::{RenderNotifier, Subscription, UpdateChannel};
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Select entity driving one [`SelectMode`].
///
/// Shared between the update delivery task (writes the mode) and the host
/// (reads it, sends selections), so the state sits behind a lock. Updates
/// for one entity are delivered one at a time.
pub struct ModeEntity<M: SelectMode> {
    link: Arc<dyn DeviceLink>,
    name: String,
    unique_id: String,
    current: RwLock<Option<M>>,
    /// Number of accepted updates
    version: AtomicU32,
    notifier: RwLock<Option<RenderNotifier>>,
    subscription: Mutex<Option<Subscription>>,
    activated: AtomicBool,
}

impl<M: SelectMode> ModeEntity<M> {
    pub fn new(
        link: Arc<dyn DeviceLink>,
        name: impl Into<String>,
        unique_id: impl Into<String>,
    ) -> Self {
        Self {
            link,
            name: name.into(),
            unique_id: unique_id.into(),
            current: RwLock::new(None),
            version: AtomicU32::new(0),
            notifier: RwLock::new(None),
            subscription: Mutex::new(None),
            activated: AtomicBool::new(false),
        }
    }

    /// Create the entity for a bridge, deriving name and unique id from it.
    pub fn for_bridge(link: Arc<dyn DeviceLink>, bridge: &BridgeConfig) -> Self {
        Self::new(
            link,
            format!("{} {}", bridge.name, M::NAME_SUFFIX),
            format!("{}_{}", bridge.unique_id, M::UNIQUE_ID_SUFFIX),
        )
    }

    /// Last mode reported by the device.
    pub fn current(&self) -> Option<M> {
        *self.current.read()
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.activated.load(Ordering::SeqCst)
    }

    /// Apply a state code pushed by the device.
    ///
    /// Codes outside the mode's table are rejected and the previous mode is
    /// kept. Every accepted code requests a re-render, even when the mode
    /// did not change.
    pub fn on_update(&self, code: i64) -> Result<M> {
        let mode = M::from_state_code(code).ok_or(BridgeError::UnknownStateCode {
            sensor: M::SENSOR,
            code,
        })?;

        *self.current.write() = Some(mode);
        self.version.fetch_add(1, Ordering::SeqCst);
        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.notify();
        }
        Ok(mode)
    }

    /// Callback run by the update channel. Never fails.
    fn handle_update(&self, code: i64) {
        debug!(
            "[Select] Handle update for {} (sensor {}): {}",
            self.name,
            M::SENSOR,
            code
        );
        if let Err(e) = self.on_update(code) {
            warn!("[Select] {}: {}, keeping previous mode", self.name, e);
        }
    }

    /// Send the command for `mode`.
    pub async fn select(&self, mode: M) -> Result<()> {
        info!("[Select] Changing {} to {}", self.name, mode);
        self.link.send_command(mode.command()).await
    }
}

#[async_trait]
impl<M: SelectMode> SelectEntity for ModeEntity<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn icon(&self) -> &'static str {
        M::ICON
    }

    fn sensor(&self) -> SensorId {
        M::SENSOR
    }

    fn options(&self) -> &'static [&'static str] {
        M::options()
    }

    fn current_option(&self) -> Option<&'static str> {
        self.current().map(M::option)
    }

    fn set_render_notifier(&self, notifier: RenderNotifier) {
        *self.notifier.write() = Some(notifier);
    }

    async fn activate(self: Arc<Self>, channel: &UpdateChannel) -> Result<()> {
        if self.activated.swap(true, Ordering::SeqCst) {
            debug!("[Select] {} already active", self.name);
            return Ok(());
        }

        info!(
            "[Select] Registering {} for sensor {}",
            self.name,
            M::SENSOR
        );
        let entity = Arc::downgrade(&self);
        let subscription = channel.subscribe(M::SENSOR, move |code| {
            if let Some(entity) = entity.upgrade() {
                entity.handle_update(code);
            }
        });
        *self.subscription.lock() = Some(subscription);

        self.link.register_sensor(M::SENSOR).await
    }

    async fn select_option(&self, choice: &str) -> Result<()> {
        let mode = M::from_option(choice).ok_or_else(|| BridgeError::InvalidSelection {
            entity: self.name.clone(),
            choice: choice.to_string(),
            options: M::options(),
        })?;
        self.select(mode).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::RecordingLink;
    use crate::device::{
        CMD_BYPASS_AUTO, CMD_BYPASS_OFF, CMD_BYPASS_ON, CMD_TEMPPROF_NORMAL,
        SENSOR_BYPASS_ACTIVATIONSTATE, SENSOR_PROFILE_TEMPERATURE,
    };
    use crate::select::{BypassMode, TemperatureProfile};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn bypass(link: &Arc<RecordingLink>) -> Arc<ModeEntity<BypassMode>> {
        Arc::new(ModeEntity::new(
            link.clone(),
            "ComfoAirQ bypass",
            "comfoairq_bypass",
        ))
    }

    fn profile(link: &Arc<RecordingLink>) -> Arc<ModeEntity<TemperatureProfile>> {
        Arc::new(ModeEntity::new(
            link.clone(),
            "ComfoAirQ temperature profile",
            "comfoairq_temperature_profile",
        ))
    }

    async fn wait_for_version<M: SelectMode>(entity: &ModeEntity<M>, version: u32) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while entity.version() < version {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("update was not delivered");
    }

    #[test]
    fn test_initial_state_unknown() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);
        assert_eq!(entity.current(), None);
        assert_eq!(entity.current_option(), None);
        assert_eq!(entity.version(), 0);
        assert!(!entity.is_active());
        assert_eq!(entity.options(), &["auto", "on", "off"]);
    }

    #[test]
    fn test_for_bridge_names() {
        let link: Arc<dyn DeviceLink> = Arc::new(RecordingLink::default());
        let bridge = BridgeConfig {
            name: "ComfoAirQ".to_string(),
            unique_id: "comfoairq".to_string(),
            topic_prefix: "comfoconnect".to_string(),
        };

        let bypass = ModeEntity::<BypassMode>::for_bridge(link.clone(), &bridge);
        let profile = ModeEntity::<TemperatureProfile>::for_bridge(link, &bridge);
        assert_eq!(bypass.name(), "ComfoAirQ bypass");
        assert_eq!(bypass.unique_id(), "comfoairq_bypass");
        assert_eq!(profile.name(), "ComfoAirQ temperature profile");
        assert_eq!(profile.unique_id(), "comfoairq_temperature_profile");
    }

    #[test]
    fn test_valid_codes_set_mode_regardless_of_prior_state() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);
        for prior in [None, Some(0), Some(1), Some(2)] {
            for code in 0..3 {
                if let Some(prior) = prior {
                    assert_ok!(entity.on_update(prior));
                }
                assert_ok!(entity.on_update(code));
                assert_eq!(
                    entity.current_option(),
                    Some(BypassMode::options()[code as usize])
                );
            }
        }
    }

    #[test]
    fn test_invalid_code_keeps_previous_mode() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);

        assert_err!(entity.on_update(7));
        assert_eq!(entity.current(), None);

        assert_ok!(entity.on_update(1));
        for code in [3, -1, 255, i64::MAX] {
            let err = entity.on_update(code).unwrap_err();
            assert!(matches!(
                err,
                BridgeError::UnknownStateCode { sensor, code: c }
                    if sensor == SENSOR_BYPASS_ACTIVATIONSTATE && c == code
            ));
            assert_eq!(entity.current(), Some(BypassMode::On));
        }
        assert_eq!(entity.version(), 1);
    }

    #[test]
    fn test_bypass_round_trip() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);

        assert_ok!(entity.on_update(1));
        assert_eq!(entity.current_option(), Some("on"));
        assert_ok!(entity.on_update(2));
        assert_eq!(entity.current_option(), Some("off"));
    }

    #[tokio::test]
    async fn test_accepted_update_requests_render() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);
        let notifier = RenderNotifier::new(entity.unique_id().to_string());
        entity.set_render_notifier(notifier.clone());

        assert_err!(entity.on_update(9));
        let rendered = tokio::time::timeout(Duration::from_millis(50), notifier.notified()).await;
        assert!(rendered.is_err());

        assert_ok!(entity.on_update(0));
        tokio::time::timeout(Duration::from_secs(1), notifier.notified())
            .await
            .expect("render was not requested");
    }

    #[tokio::test]
    async fn test_select_option_sends_command_without_changing_state() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);
        assert_ok!(entity.on_update(0));

        for (option, command) in [
            ("auto", CMD_BYPASS_AUTO),
            ("on", CMD_BYPASS_ON),
            ("off", CMD_BYPASS_OFF),
        ] {
            assert_ok!(entity.select_option(option).await);
            assert_eq!(link.commands().last(), Some(&command));
            assert_eq!(entity.current_option(), Some("auto"));
        }
        assert_eq!(link.commands().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_selection_sends_nothing() {
        let link = Arc::new(RecordingLink::default());
        let entity = bypass(&link);

        for choice in ["warm", "", "Auto", "unknown"] {
            let err = entity.select_option(choice).await.unwrap_err();
            assert!(matches!(err, BridgeError::InvalidSelection { .. }));
        }
        assert!(link.commands().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_propagates_and_keeps_state() {
        let link = Arc::new(RecordingLink::failing());
        let entity = bypass(&link);
        assert_ok!(entity.on_update(2));

        let err = entity.select_option("on").await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(entity.current_option(), Some("off"));
    }

    #[tokio::test]
    async fn test_temperature_profile_scenario() {
        let link = Arc::new(RecordingLink::default());
        let entity = profile(&link);

        assert_ok!(entity.on_update(2));
        assert_eq!(entity.current_option(), Some("warm"));

        assert_ok!(entity.select_option("normal").await);
        assert_eq!(link.commands(), vec![CMD_TEMPPROF_NORMAL]);
        assert_eq!(entity.current_option(), Some("warm"));

        assert_ok!(entity.on_update(0));
        assert_eq!(entity.current_option(), Some("normal"));
    }

    #[tokio::test]
    async fn test_activate_registers_once() {
        let link = Arc::new(RecordingLink::default());
        let channel = UpdateChannel::new();
        let entity = profile(&link);

        assert_ok!(entity.clone().activate(&channel).await);
        assert_ok!(entity.clone().activate(&channel).await);

        assert!(entity.is_active());
        assert_eq!(link.registered(), vec![SENSOR_PROFILE_TEMPERATURE]);
        assert_eq!(channel.subscriber_count(SENSOR_PROFILE_TEMPERATURE), 1);
    }

    #[tokio::test]
    async fn test_activated_entity_follows_channel() {
        let link = Arc::new(RecordingLink::default());
        let channel = UpdateChannel::new();
        let bypass = bypass(&link);
        let profile = profile(&link);
        assert_ok!(bypass.clone().activate(&channel).await);
        assert_ok!(profile.clone().activate(&channel).await);

        channel.publish(SENSOR_BYPASS_ACTIVATIONSTATE, 1);
        wait_for_version(&bypass, 1).await;
        assert_eq!(bypass.current_option(), Some("on"));
        assert_eq!(profile.current_option(), None);

        channel.publish(SENSOR_PROFILE_TEMPERATURE, 9);
        channel.publish(SENSOR_PROFILE_TEMPERATURE, 1);
        wait_for_version(&profile, 1).await;
        assert_eq!(profile.current_option(), Some("cold"));
        assert_eq!(profile.version(), 1);
    }

    #[tokio::test]
    async fn test_activation_failure_leaves_state_unknown() {
        let link = Arc::new(RecordingLink::failing());
        let channel = UpdateChannel::new();
        let entity = bypass(&link);

        let err = entity.clone().activate(&channel).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(entity.current_option(), None);
        assert_eq!(channel.subscriber_count(SENSOR_BYPASS_ACTIVATIONSTATE), 1);
    }
}
