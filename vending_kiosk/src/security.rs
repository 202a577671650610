//! Background tamper detection.
//!
//! The monitor samples the door proximity sensor, the IR sensor and the accelerometer. An alert is raised once per
//! episode: it fires when a threat first appears and re-arms only after the sensors have been quiet for a sample.
//! Nothing is raised while an admin is logged in, since servicing the machine trips every sensor.
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use tokio::task::JoinHandle;

use crate::{
    hal::{Hardware, IntrusionSensors, SensorSample},
    notifications::Notifier,
};

/// A hand closer than this to the door sensor, with the IR beam broken, means the door is being held.
pub const DOOR_HELD_DISTANCE_CM: f64 = 5.0;
/// A change larger than this on any axis between two samples means the machine is being moved.
pub const MOVEMENT_THRESHOLD: f64 = 0.07;
pub const SAMPLE_PERIOD: Duration = Duration::from_millis(500);

/// State shared between the kiosk loop and the security monitor.
#[derive(Clone, Default)]
pub struct SecurityFlags {
    admin_logged_in: Arc<AtomicBool>,
    intrusion: Arc<AtomicBool>,
}

impl SecurityFlags {
    pub fn admin_logged_in(&self) -> bool {
        self.admin_logged_in.load(Ordering::SeqCst)
    }

    pub fn set_admin_logged_in(&self, value: bool) {
        self.admin_logged_in.store(value, Ordering::SeqCst);
    }

    /// True while a tamper episode is in progress.
    pub fn intrusion(&self) -> bool {
        self.intrusion.load(Ordering::SeqCst)
    }

    pub fn set_intrusion(&self, value: bool) {
        self.intrusion.store(value, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threat {
    DoorHeld,
    Movement,
}

impl Threat {
    pub fn message(&self) -> &'static str {
        match self {
            Threat::DoorHeld => "Someone is holding the door!",
            Threat::Movement => "Machine movement detected! Possible tampering!",
        }
    }
}

#[derive(Debug, Default)]
pub struct SecurityMonitor {
    last_acceleration: Option<[f64; 3]>,
    alerted: bool,
}

impl SecurityMonitor {
    /// Classifies a sample, without regard for episodes or the admin flag.
    pub fn detect(&mut self, sample: &SensorSample) -> Option<Threat> {
        let moved = self
            .last_acceleration
            .map(|last| last.iter().zip(sample.acceleration.iter()).any(|(a, b)| (a - b).abs() > MOVEMENT_THRESHOLD))
            .unwrap_or(false);
        self.last_acceleration = Some(sample.acceleration);
        if sample.distance_cm < DOOR_HELD_DISTANCE_CM && sample.ir_triggered {
            Some(Threat::DoorHeld)
        } else if moved {
            Some(Threat::Movement)
        } else {
            None
        }
    }

    /// Processes a sample and returns the threat to raise an alert for, if this sample starts a new episode.
    pub fn assess(&mut self, sample: &SensorSample, admin_logged_in: bool) -> Option<Threat> {
        match self.detect(sample) {
            Some(_) if admin_logged_in => {
                self.alerted = false;
                None
            },
            Some(threat) if !self.alerted => {
                self.alerted = true;
                Some(threat)
            },
            Some(_) => None,
            None => {
                self.alerted = false;
                None
            },
        }
    }

    /// Whether an unacknowledged episode is in progress.
    pub fn in_episode(&self) -> bool {
        self.alerted
    }
}

/// Starts the security monitor. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_security_monitor(
    sensors: Arc<dyn IntrusionSensors>,
    hardware: Hardware,
    notifier: Notifier,
    flags: SecurityFlags,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut monitor = SecurityMonitor::default();
        info!("🛡️ Security monitor started");
        loop {
            timer.tick().await;
            let sample = match sensors.sample() {
                Ok(s) => s,
                Err(e) => {
                    warn!("🛡️ Could not read the security sensors. {e}");
                    continue;
                },
            };
            trace!("🛡️ {sample:?}");
            if let Some(threat) = monitor.assess(&sample, flags.admin_logged_in()) {
                warn!("🛡️ {}", threat.message());
                notifier.admin(format!("Security alert: {}", threat.message()));
                let (on, off, repeat) = match threat {
                    Threat::DoorHeld => (Duration::from_millis(200), Duration::from_millis(300), 5),
                    Threat::Movement => (Duration::from_millis(300), Duration::from_millis(200), 2),
                };
                hardware.beep(on, off, repeat).await;
            }
            let in_episode = monitor.in_episode();
            if in_episode != flags.intrusion() {
                if in_episode {
                    info!("🛡️ Kiosk paused until the sensors are quiet");
                } else {
                    info!("🛡️ Sensors are quiet again");
                }
                flags.set_intrusion(in_episode);
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn calm() -> SensorSample {
        SensorSample { distance_cm: 100.0, ir_triggered: false, acceleration: [0.0, 0.0, 1.0] }
    }

    fn door_held() -> SensorSample {
        SensorSample { distance_cm: 2.0, ir_triggered: true, ..calm() }
    }

    fn shaken() -> SensorSample {
        SensorSample { acceleration: [0.2, 0.0, 1.0], ..calm() }
    }

    #[test]
    fn door_held_alerts_once_per_episode() {
        let mut monitor = SecurityMonitor::default();
        assert_eq!(monitor.assess(&calm(), false), None);
        assert_eq!(monitor.assess(&door_held(), false), Some(Threat::DoorHeld));
        assert_eq!(monitor.assess(&door_held(), false), None);
        assert!(monitor.in_episode());
        assert_eq!(monitor.assess(&calm(), false), None);
        assert!(!monitor.in_episode());
        assert_eq!(monitor.assess(&door_held(), false), Some(Threat::DoorHeld));
    }

    #[test]
    fn close_object_without_ir_is_not_a_threat() {
        let mut monitor = SecurityMonitor::default();
        let sample = SensorSample { distance_cm: 2.0, ..calm() };
        assert_eq!(monitor.assess(&sample, false), None);
    }

    #[test]
    fn movement_is_measured_between_samples() {
        let mut monitor = SecurityMonitor::default();
        // The first sample has nothing to compare against
        assert_eq!(monitor.assess(&shaken(), false), None);
        assert_eq!(monitor.assess(&calm(), false), Some(Threat::Movement));
        assert_eq!(monitor.assess(&calm(), false), None);
        let nudge = SensorSample { acceleration: [0.05, 0.0, 1.0], ..calm() };
        assert_eq!(monitor.assess(&nudge, false), None);
    }

    #[test]
    fn admin_suppresses_alerts() {
        let mut monitor = SecurityMonitor::default();
        assert_eq!(monitor.assess(&door_held(), true), None);
        assert!(!monitor.in_episode());
        assert_eq!(monitor.assess(&door_held(), false), Some(Threat::DoorHeld));
    }

    #[test]
    fn shared_flags() {
        let flags = SecurityFlags::default();
        let other = flags.clone();
        other.set_admin_logged_in(true);
        other.set_intrusion(true);
        assert!(flags.admin_logged_in());
        assert!(flags.intrusion());
    }
}
