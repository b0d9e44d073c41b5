//! Stick-gesture arming and the throttle-high fault latch.
//!
//! With throttle at idle, holding full right yaw for `arm_hold_frames`
//! consecutive frames arms; full left yaw disarms. Completing the arm
//! gesture with throttle above idle, or powering up with throttle above
//! idle, latches [`StatusFlags::THROTTLE_HIGH_ERROR`] until the throttle is
//! back at idle.

use tracing::{info, warn};

use super::{ArmState, StatusFlags};
use crate::rc::{Axis, RcSnapshot};

/// Arming thresholds, derived from `[safety]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetySettings {
    /// Consecutive frames a gesture must be held
    pub arm_hold_frames: u16,
    /// Throttle at or below this counts as idle
    pub arm_idle_threshold: u16,
    /// Yaw deflection that counts as a full-stick gesture
    pub stick_threshold: i16,
    /// Idle frames while armed before disarming automatically; 0 disables
    pub auto_disarm_frames: u32,
    /// Start in camera-stabilization mode
    pub camstab: bool,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            arm_hold_frames: 50,
            arm_idle_threshold: 50,
            stick_threshold: 400,
            auto_disarm_frames: 0,
            camstab: false,
        }
    }
}

/// Owns the [`StatusFlags`] word and drives it from RC snapshots.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    settings: SafetySettings,
    flags: StatusFlags,
    arm_count: u16,
    disarm_count: u16,
    idle_frames: u32,
    seen_first: bool,
}

impl SafetyGate {
    #[must_use]
    pub fn new(settings: SafetySettings) -> Self {
        let mut flags = StatusFlags::empty();
        flags.set(StatusFlags::CAMSTAB, settings.camstab);
        Self {
            settings,
            flags,
            arm_count: 0,
            disarm_count: 0,
            idle_frames: 0,
            seen_first: false,
        }
    }

    #[must_use]
    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    #[must_use]
    pub fn state(&self) -> ArmState {
        ArmState::from(self.flags)
    }

    #[must_use]
    pub fn settings(&self) -> &SafetySettings {
        &self.settings
    }

    /// Advances the arming state machine by one RC frame.
    pub fn update(&mut self, snapshot: &RcSnapshot) -> StatusFlags {
        let throttle = snapshot.throttle();
        let idle = throttle <= self.settings.arm_idle_threshold;

        if !self.seen_first {
            self.seen_first = true;
            if !idle {
                warn!("Throttle high at startup ({}), outputs blocked until idle", throttle);
                self.flags.insert(StatusFlags::THROTTLE_HIGH_ERROR);
            }
        }

        if self.flags.fault() && idle {
            info!("Throttle back at idle, fault cleared");
            self.flags.remove(StatusFlags::THROTTLE_HIGH_ERROR);
        }

        self.update_failsafe(snapshot.failsafe);
        if self.flags.failsafe() || self.flags.fault() {
            self.arm_count = 0;
            self.disarm_count = 0;
            return self.flags;
        }

        let yaw = snapshot.get(Axis::Yaw);
        let threshold = self.settings.stick_threshold;
        let hold = self.settings.arm_hold_frames.max(1);

        if yaw >= threshold {
            self.disarm_count = 0;
            self.arm_count = self.arm_count.saturating_add(1);
            if self.arm_count == hold && !self.flags.armed() {
                if idle {
                    self.arm();
                } else {
                    warn!("Arm gesture with throttle at {}, latching throttle-high error", throttle);
                    self.flags.insert(StatusFlags::THROTTLE_HIGH_ERROR);
                }
            }
        } else if yaw <= -threshold {
            self.arm_count = 0;
            self.disarm_count = self.disarm_count.saturating_add(1);
            if self.disarm_count == hold && self.flags.armed() {
                self.disarm();
            }
        } else {
            self.arm_count = 0;
            self.disarm_count = 0;
        }

        self.update_auto_disarm(idle);
        self.flags
    }

    fn update_failsafe(&mut self, failsafe: bool) {
        if failsafe && !self.flags.failsafe() {
            if self.flags.armed() {
                warn!("RX failsafe while armed, disarming");
            }
            self.flags.insert(StatusFlags::FAILSAFE);
            self.flags.remove(StatusFlags::ARMED);
        } else if !failsafe && self.flags.failsafe() {
            info!("RX signal restored, staying disarmed");
            self.flags.remove(StatusFlags::FAILSAFE);
        }
    }

    fn update_auto_disarm(&mut self, idle: bool) {
        let limit = self.settings.auto_disarm_frames;
        if limit == 0 || !self.flags.armed() || !idle {
            self.idle_frames = 0;
            return;
        }
        self.idle_frames += 1;
        if self.idle_frames >= limit {
            info!("Throttle idle for {} frames, auto-disarming", self.idle_frames);
            self.disarm();
        }
    }

    /// Arms immediately, bypassing the gesture.
    pub fn arm(&mut self) {
        if self.flags.fault() || self.flags.failsafe() {
            warn!("Arm refused in state {}", self.state());
            return;
        }
        info!("Armed");
        self.flags.insert(StatusFlags::ARMED);
        self.idle_frames = 0;
    }

    /// Disarms immediately.
    pub fn disarm(&mut self) {
        if self.flags.armed() {
            info!("Disarmed");
        }
        self.flags.remove(StatusFlags::ARMED);
        self.idle_frames = 0;
    }

    /// Switches camera-stabilization mode.
    pub fn set_camstab(&mut self, on: bool) {
        self.flags.set(StatusFlags::CAMSTAB, on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rc::AXIS_COUNT;

    fn settings() -> SafetySettings {
        SafetySettings {
            arm_hold_frames: 3,
            arm_idle_threshold: 50,
            stick_threshold: 400,
            auto_disarm_frames: 0,
            camstab: false,
        }
    }

    fn snapshot(throttle: i16, yaw: i16) -> RcSnapshot {
        let mut values = [0i16; AXIS_COUNT];
        values[Axis::Throttle as usize] = throttle;
        values[Axis::Yaw as usize] = yaw;
        RcSnapshot {
            values,
            ..RcSnapshot::default()
        }
    }

    fn hold(gate: &mut SafetyGate, snap: &RcSnapshot, frames: u16) -> StatusFlags {
        let mut flags = gate.flags();
        for _ in 0..frames {
            flags = gate.update(snap);
        }
        flags
    }

    // ==================== Gesture Tests ====================

    #[test]
    fn test_starts_disarmed() {
        let gate = SafetyGate::new(settings());
        assert_eq!(gate.state(), ArmState::Disarmed);
    }

    #[test]
    fn test_arm_gesture_needs_full_hold() {
        let mut gate = SafetyGate::new(settings());
        assert!(!hold(&mut gate, &snapshot(0, 500), 2).armed());
        assert!(gate.update(&snapshot(0, 500)).armed());
        assert_eq!(gate.state(), ArmState::Armed);
    }

    #[test]
    fn test_interrupted_gesture_restarts() {
        let mut gate = SafetyGate::new(settings());
        hold(&mut gate, &snapshot(0, 500), 2);
        gate.update(&snapshot(0, 0));
        assert!(!hold(&mut gate, &snapshot(0, 500), 2).armed());
    }

    #[test]
    fn test_disarm_gesture() {
        let mut gate = SafetyGate::new(settings());
        hold(&mut gate, &snapshot(0, 500), 3);
        assert!(gate.flags().armed());

        assert!(!hold(&mut gate, &snapshot(0, -500), 3).armed());
    }

    // ==================== Fault Latch Tests ====================

    #[test]
    fn test_throttle_high_at_startup_latches() {
        let mut gate = SafetyGate::new(settings());
        let flags = gate.update(&snapshot(600, 0));
        assert!(flags.fault());
        assert_eq!(gate.state(), ArmState::FaultBlocked);

        // Gesture ignored while blocked
        assert!(!hold(&mut gate, &snapshot(600, 500), 5).armed());

        assert!(!gate.update(&snapshot(0, 0)).fault());
    }

    #[test]
    fn test_arm_with_throttle_high_latches() {
        let mut gate = SafetyGate::new(settings());
        gate.update(&snapshot(0, 0));
        let flags = hold(&mut gate, &snapshot(200, 500), 3);
        assert!(flags.fault());
        assert!(!flags.armed());

        // Clears at idle, still disarmed
        let flags = gate.update(&snapshot(0, 0));
        assert!(!flags.fault());
        assert!(!flags.armed());
    }

    // ==================== Failsafe Tests ====================

    #[test]
    fn test_failsafe_disarms() {
        let mut gate = SafetyGate::new(settings());
        hold(&mut gate, &snapshot(0, 500), 3);

        let mut lost = snapshot(0, 0);
        lost.failsafe = true;
        let flags = gate.update(&lost);
        assert!(flags.failsafe());
        assert!(!flags.armed());
        assert_eq!(gate.state(), ArmState::Failsafe);

        let flags = gate.update(&snapshot(0, 0));
        assert!(!flags.failsafe());
        assert!(!flags.armed());
    }

    #[test]
    fn test_manual_arm_refused_in_failsafe() {
        let mut gate = SafetyGate::new(settings());
        let mut lost = snapshot(0, 0);
        lost.failsafe = true;
        gate.update(&lost);
        gate.arm();
        assert!(!gate.flags().armed());
    }

    // ==================== Auto Disarm Tests ====================

    #[test]
    fn test_auto_disarm_after_idle() {
        let mut gate = SafetyGate::new(SafetySettings {
            auto_disarm_frames: 4,
            ..settings()
        });
        gate.arm();
        assert!(hold(&mut gate, &snapshot(0, 0), 3).armed());
        assert!(!gate.update(&snapshot(0, 0)).armed());
    }

    #[test]
    fn test_auto_disarm_resets_on_throttle() {
        let mut gate = SafetyGate::new(SafetySettings {
            auto_disarm_frames: 4,
            ..settings()
        });
        gate.update(&snapshot(0, 0));
        gate.arm();
        hold(&mut gate, &snapshot(0, 0), 3);
        gate.update(&snapshot(300, 0));
        assert!(hold(&mut gate, &snapshot(0, 0), 3).armed());
    }

    #[test]
    fn test_camstab_flag() {
        let mut gate = SafetyGate::new(SafetySettings {
            camstab: true,
            ..settings()
        });
        assert!(gate.flags().contains(StatusFlags::CAMSTAB));
        gate.set_camstab(false);
        assert!(!gate.flags().contains(StatusFlags::CAMSTAB));
    }
}
