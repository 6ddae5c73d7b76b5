use crate::{SHAKE_COOLDOWN_MS, SHAKE_THRESHOLD};

/// Threshold-and-cooldown filter that reduces raw accelerometer samples to
/// discrete shake signals.
///
/// The detector is clock-free: callers pass the sample timestamp in, which
/// keeps the filter deterministic and testable. The shell owns the sensor;
/// this type only decides whether a given sample counts as a shake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShakeDetector {
    armed: bool,
    last_trigger_ms: Option<u64>,
}

impl ShakeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the detector. Starting while already armed performs an implicit
    /// stop first, so at most one logical sampling subscription exists.
    pub fn start(&mut self) {
        if self.armed {
            self.stop();
        }
        self.armed = true;
    }

    /// Disarms the detector and resets the last-trigger timestamp to "never".
    /// Calling this while already stopped is a no-op.
    pub fn stop(&mut self) {
        self.armed = false;
        self.last_trigger_ms = None;
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Feeds one acceleration sample, returning `true` iff it fires a shake
    /// signal.
    ///
    /// A sample with any missing axis is discarded. A signal fires iff the
    /// Euclidean norm of the three axes exceeds the threshold AND at least
    /// the cooldown interval has elapsed since the previous fired signal.
    pub fn on_sample(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
        now_ms: u64,
    ) -> bool {
        if !self.armed {
            return false;
        }

        let (Some(x), Some(y), Some(z)) = (x, y, z) else {
            return false;
        };

        if let Some(last) = self.last_trigger_ms {
            if now_ms.saturating_sub(last) < SHAKE_COOLDOWN_MS {
                return false;
            }
        }

        let magnitude = (x * x + y * y + z * z).sqrt();
        if magnitude > SHAKE_THRESHOLD {
            self.last_trigger_ms = Some(now_ms);
            tracing::debug!(magnitude, now_ms, "shake signal fired");
            return true;
        }

        false
    }
}
