//! Amplitude automation scheduled against the device clock
//!
//! A `Param` holds a timeline of value events in device-clock seconds and is
//! evaluated per frame by the audio callback. Control threads append events
//! (anchor the current value, then ramp); the callback only reads. Linear
//! ramps interpolate from the previous event's settled value, so fades are
//! glitch-free no matter when the scheduling call actually ran.

#[derive(Debug, Clone, Copy)]
enum EventKind {
    /// Jump to the value at the event time and hold.
    SetValue(f32),
    /// Reach the value at the event time, moving linearly from the
    /// previous event's settled value.
    LinearRamp(f32),
}

#[derive(Debug, Clone, Copy)]
struct ParamEvent {
    time: f64,
    kind: EventKind,
}

impl ParamEvent {
    fn target(&self) -> f32 {
        match self.kind {
            EventKind::SetValue(v) | EventKind::LinearRamp(v) => v,
        }
    }
}

/// A scheduled scalar parameter (amplitude stage).
#[derive(Debug, Clone)]
pub struct Param {
    /// Settled value before the first remaining event.
    anchor_value: f32,
    /// Time the anchor value was established.
    anchor_time: f64,
    /// Pending and recently-passed events, sorted by time.
    events: Vec<ParamEvent>,
}

impl Param {
    pub fn new(initial: f32) -> Self {
        Self {
            anchor_value: initial,
            anchor_time: 0.0,
            events: Vec::new(),
        }
    }

    /// Schedule an instantaneous value change at `time`.
    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent {
            time,
            kind: EventKind::SetValue(value),
        });
    }

    /// Schedule a linear ramp ending at `end_time` with the given value.
    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64) {
        self.insert(ParamEvent {
            time: end_time,
            kind: EventKind::LinearRamp(value),
        });
    }

    /// Drop every event scheduled at or after `time`.
    pub fn cancel_after(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Evaluate the parameter at device-clock time `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut last_time = self.anchor_time;
        let mut last_value = self.anchor_value;

        for event in &self.events {
            if event.time <= time {
                last_time = event.time;
                last_value = event.target();
                continue;
            }
            // First event in the future decides the shape.
            return match event.kind {
                EventKind::SetValue(_) => last_value,
                EventKind::LinearRamp(v) => {
                    let span = event.time - last_time;
                    if span <= 0.0 {
                        v
                    } else {
                        let frac = ((time - last_time) / span).clamp(0.0, 1.0) as f32;
                        last_value + (v - last_value) * frac
                    }
                }
            };
        }

        last_value
    }

    /// Fold events that have fully elapsed into the anchor.
    ///
    /// Called from the render path so long-running timelines (isochronic
    /// pulsing reschedules every cycle) stay bounded. Keeps the most recent
    /// elapsed event so in-flight ramps still have their start anchor.
    pub fn prune_before(&mut self, time: f64) {
        while self.events.len() >= 2 && self.events[1].time <= time {
            let e = self.events.remove(0);
            self.anchor_time = e.time;
            self.anchor_value = e.target();
        }
    }

    fn insert(&mut self, event: ParamEvent) {
        let idx = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(idx, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_value_holds() {
        let p = Param::new(0.5);
        assert_eq!(p.value_at(0.0), 0.5);
        assert_eq!(p.value_at(10.0), 0.5);
    }

    #[test]
    fn test_set_then_ramp() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 1.0);
        p.linear_ramp_to(1.0, 1.1);

        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 0.0);
        let mid = p.value_at(1.05);
        assert!((mid - 0.5).abs() < 1e-6, "midpoint was {}", mid);
        assert_eq!(p.value_at(1.1), 1.0);
        // Holds after the ramp completes
        assert_eq!(p.value_at(2.0), 1.0);
    }

    #[test]
    fn test_cancel_removes_only_future_events() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 0.0);
        p.linear_ramp_to(1.0, 0.1);
        p.set_value_at(1.0, 0.2);
        p.linear_ramp_to(0.0, 0.3);

        p.cancel_after(0.15);

        // The first ramp survives, everything at/after 0.15 is gone.
        assert_eq!(p.value_at(0.1), 1.0);
        assert_eq!(p.value_at(0.5), 1.0);
    }

    #[test]
    fn test_pulse_cycle_shape() {
        // The schedule the isochronic modulator emits each cycle.
        let (e, on, vol) = (0.005, 0.07833, 0.8);
        let mut p = Param::new(0.0);
        let now = 2.0;
        p.set_value_at(0.0, now);
        p.linear_ramp_to(vol, now + e);
        p.set_value_at(vol, now + e + on);
        p.linear_ramp_to(0.0, now + e + on + e);

        assert_eq!(p.value_at(now), 0.0);
        assert!((p.value_at(now + e) - vol).abs() < 1e-6);
        assert!((p.value_at(now + e + on / 2.0) - vol).abs() < 1e-6);
        assert_eq!(p.value_at(now + e + on + e), 0.0);
        assert_eq!(p.value_at(now + 1.0), 0.0);
    }

    #[test]
    fn test_anchor_at_current_value_mid_ramp() {
        // stop() anchors whatever value the fade-in reached, then fades out.
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 0.0);
        p.linear_ramp_to(1.0, 0.1);

        let mid = p.value_at(0.05);
        assert!((mid - 0.5).abs() < 1e-6);
        p.cancel_after(0.05);
        p.set_value_at(mid, 0.05);
        p.linear_ramp_to(0.0, 0.15);

        assert!((p.value_at(0.1) - 0.25).abs() < 1e-6);
        assert_eq!(p.value_at(0.15), 0.0);
    }

    #[test]
    fn test_prune_keeps_inflight_ramp_anchor() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.2, 1.0);
        p.linear_ramp_to(1.0, 2.0);
        p.set_value_at(1.0, 3.0);
        p.linear_ramp_to(0.0, 4.0);

        p.prune_before(3.5);
        // Anchor folded up to the set at t=3.0; the final ramp still
        // interpolates correctly.
        assert!((p.value_at(3.5) - 0.5).abs() < 1e-6);
        assert_eq!(p.value_at(4.0), 0.0);

        p.prune_before(10.0);
        assert_eq!(p.value_at(10.0), 0.0);
    }
}
