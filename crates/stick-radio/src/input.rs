//! Debounced button edges and power-key filtering, sampled once per UI
//! cycle.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::hal::{InputPanel, PowerKeySample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonState {
    Idle,
    Held,
}

/// idle → pressed → released state machine.  A level change is accepted
/// only after `required` consecutive identical samples.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    state: ButtonState,
    candidate: bool,
    stable: u8,
    required: u8,
}

impl EdgeDetector {
    pub fn new(required: u8) -> Self {
        Self {
            state: ButtonState::Idle,
            candidate: false,
            stable: 0,
            required: required.max(1),
        }
    }

    pub fn update(&mut self, level: bool) -> Option<Edge> {
        if level == self.candidate {
            self.stable = self.stable.saturating_add(1);
        } else {
            self.candidate = level;
            self.stable = 1;
        }
        if self.stable < self.required {
            return None;
        }
        match (self.state, self.candidate) {
            (ButtonState::Idle, true) => {
                self.state = ButtonState::Held;
                Some(Edge::Pressed)
            }
            (ButtonState::Held, false) => {
                self.state = ButtonState::Idle;
                Some(Edge::Released)
            }
            _ => None,
        }
    }
}

/// Rate-limits power-key polling and rejects press+long-press glitches.
#[derive(Debug, Clone)]
pub struct PowerKeyFilter {
    interval: Duration,
    last_poll: Option<Instant>,
}

impl PowerKeyFilter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_poll: None,
        }
    }

    /// True if this poll reports a genuine press.  `sample` is only
    /// invoked when the poll interval has elapsed.
    pub fn poll(&mut self, now: Instant, sample: impl FnOnce() -> PowerKeySample) -> bool {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_poll = Some(now);
        let sample = sample();
        match (sample.pressed, sample.long_pressed) {
            (true, false) | (false, true) => true,
            (true, true) => {
                debug!("power key: press and long press together, ignoring");
                false
            }
            (false, false) => false,
        }
    }
}

/// Edges seen in one UI cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEvents {
    pub primary_pressed: bool,
    pub secondary_pressed: bool,
    pub mode_released: bool,
    pub power_pressed: bool,
}

pub struct Inputs {
    primary: EdgeDetector,
    secondary: EdgeDetector,
    mode: EdgeDetector,
    power: PowerKeyFilter,
}

impl Inputs {
    pub fn new(debounce_samples: u8, power_poll: Duration) -> Self {
        Self {
            primary: EdgeDetector::new(debounce_samples),
            secondary: EdgeDetector::new(debounce_samples),
            mode: EdgeDetector::new(debounce_samples),
            power: PowerKeyFilter::new(power_poll),
        }
    }

    pub fn sample(&mut self, panel: &mut dyn InputPanel, now: Instant) -> InputEvents {
        let levels = panel.buttons();
        InputEvents {
            primary_pressed: self.primary.update(levels.primary) == Some(Edge::Pressed),
            secondary_pressed: self.secondary.update(levels.secondary) == Some(Edge::Pressed),
            mode_released: self.mode.update(levels.mode) == Some(Edge::Released),
            power_pressed: self.power.poll(now, || panel.power_key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release_edges() {
        let mut d = EdgeDetector::new(1);
        assert_eq!(d.update(true), Some(Edge::Pressed));
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(false), Some(Edge::Released));
        assert_eq!(d.update(false), None);
    }

    #[test]
    fn test_bounce_is_filtered() {
        let mut d = EdgeDetector::new(2);
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(false), None);
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(true), Some(Edge::Pressed));
        assert_eq!(d.update(false), None);
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(true), None);
    }

    #[test]
    fn test_power_key_xor() {
        let t0 = Instant::now();
        let mut f = PowerKeyFilter::new(Duration::from_millis(200));
        let both = PowerKeySample {
            pressed: true,
            long_pressed: true,
        };
        assert!(!f.poll(t0, || both));
        let long = PowerKeySample {
            pressed: false,
            long_pressed: true,
        };
        assert!(f.poll(t0 + Duration::from_millis(200), || long));
    }

    #[test]
    fn test_power_key_rate_limited() {
        let t0 = Instant::now();
        let mut f = PowerKeyFilter::new(Duration::from_millis(200));
        let press = PowerKeySample {
            pressed: true,
            long_pressed: false,
        };
        assert!(f.poll(t0, || press));
        assert!(!f.poll(t0 + Duration::from_millis(20), || panic!("sampled too early")));
        assert!(f.poll(t0 + Duration::from_millis(220), || press));
    }
}
