//! Anti-glitch muting and fade-in.
//!
//! [`MuteGate`] lives on the audio task and holds the amplifier in
//! shutdown from every (re)connect or pause until the buffer is primed.
//! [`VolumeRamp`] lives on the UI task and brings the volume up in
//! fractional steps once the gate has opened.

use tracing::debug;

use crate::hal::Amplifier;

#[derive(Debug)]
pub struct MuteGate {
    engaged: bool,
}

impl MuteGate {
    /// A new gate starts engaged; nothing is audible before priming.
    pub fn new() -> Self {
        Self { engaged: true }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn engage(&mut self, amp: &dyn Amplifier) {
        if !self.engaged {
            debug!("mute gate engaged");
        }
        self.engaged = true;
        amp.set_shutdown(true);
    }

    pub fn release(&mut self, amp: &dyn Amplifier) {
        if self.engaged {
            debug!("mute gate released");
        }
        self.engaged = false;
        amp.set_shutdown(false);
    }
}

impl Default for MuteGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Fractional volume accumulator.  The integer part is what the decoder
/// gets; it never exceeds `normal`.
#[derive(Debug, Clone)]
pub struct VolumeRamp {
    current: u8,
    fractional: f32,
    normal: u8,
    step: f32,
}

impl VolumeRamp {
    pub fn new(normal: u8, step: f32) -> Self {
        Self {
            current: 0,
            fractional: 0.0,
            normal,
            step,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn is_at_normal(&self) -> bool {
        self.current >= self.normal
    }

    /// Drop straight to silence.
    pub fn reset(&mut self) {
        self.current = 0;
        self.fractional = 0.0;
    }

    /// Advance one UI cycle.  Returns the new integer volume when it
    /// changed, `None` when it stayed put or is already at normal.
    pub fn advance(&mut self) -> Option<u8> {
        if self.is_at_normal() {
            return None;
        }
        self.fractional = (self.fractional + self.step).min(f32::from(self.normal));
        let next = (self.fractional as u8).min(self.normal);
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Pin(AtomicBool);

    impl Amplifier for Pin {
        fn set_shutdown(&self, shutdown: bool) {
            self.0.store(shutdown, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_gate_drives_amplifier() {
        let pin = Pin::default();
        let mut gate = MuteGate::new();
        assert!(gate.is_engaged());
        gate.release(&pin);
        assert!(!pin.0.load(Ordering::SeqCst));
        gate.engage(&pin);
        assert!(gate.is_engaged());
        assert!(pin.0.load(Ordering::SeqCst));
    }

    #[test]
    fn test_ramp_quarter_steps_truncate() {
        let mut ramp = VolumeRamp::new(21, 0.25);
        let mut seen = Vec::new();
        for _ in 0..8 {
            ramp.advance();
            seen.push(ramp.current());
        }
        assert_eq!(seen, vec![0, 0, 0, 1, 1, 1, 1, 2]);
    }

    #[test]
    fn test_ramp_monotonic_and_caps_exactly() {
        let mut ramp = VolumeRamp::new(21, 0.25);
        let mut last = 0;
        for _ in 0..200 {
            ramp.advance();
            assert!(ramp.current() >= last);
            assert!(ramp.current() <= 21);
            last = ramp.current();
        }
        assert_eq!(ramp.current(), 21);
        assert!(ramp.is_at_normal());
        assert_eq!(ramp.advance(), None);
    }

    #[test]
    fn test_ramp_reaches_normal_in_expected_cycles() {
        let mut ramp = VolumeRamp::new(3, 0.25);
        let cycles = std::iter::from_fn(|| {
            ramp.advance();
            Some(ramp.is_at_normal())
        })
        .take_while(|done| !done)
        .count();
        // 12 quarter steps reach 3.0; the 12th is the one that lands
        assert_eq!(cycles, 11);
    }

    #[test]
    fn test_ramp_step_not_dividing_normal_does_not_overshoot() {
        let mut ramp = VolumeRamp::new(5, 0.4);
        for _ in 0..100 {
            ramp.advance();
        }
        assert_eq!(ramp.current(), 5);
    }

    #[test]
    fn test_reset_returns_to_silence() {
        let mut ramp = VolumeRamp::new(21, 0.25);
        for _ in 0..40 {
            ramp.advance();
        }
        ramp.reset();
        assert_eq!(ramp.current(), 0);
        assert_eq!(ramp.advance(), None);
    }
}
