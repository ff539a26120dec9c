//! Cooldown-gated geofence alerts

use crate::notify::{dispatch, DispatchOutcome, Notifier};
use crate::settings::RuntimeSettings;
use aqua_core::config::AlertConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Allows at most one notification per cooldown interval.
///
/// The cooldown is measured from the previous attempt, whether or not the
/// transport delivered it, so a failing transport cannot cause a storm.
pub struct AlertThrottle {
    settings: Arc<RuntimeSettings>,
    notifier: Arc<dyn Notifier>,
    cooldown: Duration,
    notify_timeout: Duration,
    message: String,
    last_fire: Option<Instant>,
}

impl AlertThrottle {
    pub fn new(
        settings: Arc<RuntimeSettings>,
        notifier: Arc<dyn Notifier>,
        cooldown: Duration,
    ) -> Self {
        let defaults = AlertConfig::default();
        Self {
            settings,
            notifier,
            cooldown,
            notify_timeout: defaults.notify_timeout(),
            message: defaults.message,
            last_fire: None,
        }
    }

    pub fn from_config(
        config: &AlertConfig,
        settings: Arc<RuntimeSettings>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            notifier,
            cooldown: config.cooldown(),
            notify_timeout: config.notify_timeout(),
            message: config.message.clone(),
            last_fire: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Whether a crossing at `now` would fire, without consuming the cooldown
    pub fn should_fire(&self, crossed: bool, now: Instant) -> bool {
        if !self.settings.alert_enabled() || !crossed {
            return false;
        }
        match self.last_fire {
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
            None => true,
        }
    }

    /// Gate check that also starts a new cooldown when it passes
    pub fn try_acquire(&mut self, crossed: bool, now: Instant) -> bool {
        if !self.should_fire(crossed, now) {
            return false;
        }
        self.last_fire = Some(now);
        true
    }

    /// Dispatch the alert if the gate passes. Returns true iff a dispatch was
    /// attempted; transport failures are logged inside [`dispatch`].
    pub async fn maybe_fire(&mut self, crossed: bool, now: Instant) -> bool {
        if !self.try_acquire(crossed, now) {
            return false;
        }

        info!("{}", self.message);
        let outcome = dispatch(
            self.notifier.as_ref(),
            &self.settings,
            &self.message,
            self.notify_timeout,
        )
        .await;
        if let DispatchOutcome::Failed(_) = outcome {
            debug!("Alert cooldown of {:?} started despite failed delivery", self.cooldown);
        }
        true
    }

    pub fn last_fire(&self) -> Option<Instant> {
        self.last_fire
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;
    use crate::notify::{MockNotifier, NotificationReceipt};
    use proptest::prelude::*;

    fn receipt() -> NotificationReceipt {
        NotificationReceipt { transport: "mock", transport_id: None }
    }

    fn throttle(alert_enabled: bool, notifier: MockNotifier, cooldown_secs: u64) -> AlertThrottle {
        AlertThrottle::new(
            Arc::new(RuntimeSettings::new(alert_enabled, true)),
            Arc::new(notifier),
            Duration::from_secs(cooldown_secs),
        )
    }

    #[tokio::test]
    async fn test_hourly_cooldown_scenario() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(2).returning(|_| Ok(receipt()));
        let mut throttle = throttle(true, notifier, 3600);

        let t0 = Instant::now();
        assert!(throttle.maybe_fire(true, t0).await);
        assert!(!throttle.maybe_fire(true, t0 + Duration::from_secs(1800)).await);
        assert!(throttle.maybe_fire(true, t0 + Duration::from_secs(3601)).await);
    }

    #[tokio::test]
    async fn test_exact_cooldown_does_not_fire() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_| Ok(receipt()));
        let mut throttle = throttle(true, notifier, 60);

        let t0 = Instant::now();
        assert!(throttle.maybe_fire(true, t0).await);
        assert!(!throttle.maybe_fire(true, t0 + Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_disabled_alerts_never_fire() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        let mut throttle = throttle(false, notifier, 1);

        assert!(!throttle.maybe_fire(true, Instant::now()).await);
        assert!(throttle.last_fire().is_none());
    }

    #[tokio::test]
    async fn test_no_crossing_never_fires() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        let mut throttle = throttle(true, notifier, 1);

        assert!(!throttle.maybe_fire(false, Instant::now()).await);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_starts_cooldown() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(VisionError::Notification("carrier down".to_string())));
        notifier.expect_name().return_const("mock");
        let mut throttle = throttle(true, notifier, 3600);

        let t0 = Instant::now();
        assert!(throttle.maybe_fire(true, t0).await);
        assert_eq!(throttle.last_fire(), Some(t0));
        assert!(!throttle.maybe_fire(true, t0 + Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_sms_disabled_consumes_cooldown() {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        let settings = Arc::new(RuntimeSettings::new(true, false));
        let mut throttle = AlertThrottle::new(settings, Arc::new(notifier), Duration::from_secs(3600))
            .with_message("crossed");

        let t0 = Instant::now();
        assert!(throttle.maybe_fire(true, t0).await);
        assert!(!throttle.should_fire(true, t0 + Duration::from_secs(1)));
    }

    proptest! {
        #[test]
        fn prop_fire_count_bounded(duration_secs in 1u64..20_000, cooldown_secs in 1u64..5_000, step_secs in 1u64..120) {
            let mut notifier = MockNotifier::new();
            notifier.expect_notify().never();
            let mut throttle = throttle(true, notifier, cooldown_secs);

            let t0 = Instant::now();
            let mut fires = 0u64;
            let mut elapsed = 0u64;
            while elapsed <= duration_secs {
                if throttle.try_acquire(true, t0 + Duration::from_secs(elapsed)) {
                    fires += 1;
                }
                elapsed += step_secs;
            }
            prop_assert!(fires <= duration_secs / cooldown_secs + 1);
        }
    }
}
