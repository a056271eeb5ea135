//! Voice activity gate for the local speaking flag.

/// Mean frequency magnitude (0-255 scale) above which the mic counts as speaking.
pub const SPEAKING_THRESHOLD: f64 = 25.0;

/// Turns raw audio frequency frames into speaking transitions.
#[derive(Debug, Clone, Default)]
pub struct SpeakingGate {
    speaking: bool,
}

impl SpeakingGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Forget the current state, e.g. after the mic is muted.
    pub fn reset(&mut self) {
        self.speaking = false;
    }

    /// Feed one frame of frequency magnitudes. Returns the new flag only
    /// when it changed. A muted mic never speaks.
    pub fn sample(&mut self, magnitudes: &[u8], muted: bool) -> Option<bool> {
        let speaking = !muted && mean(magnitudes) > SPEAKING_THRESHOLD;
        if speaking == self.speaking {
            return None;
        }
        self.speaking = speaking;
        Some(speaking)
    }
}

fn mean(magnitudes: &[u8]) -> f64 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let sum: u64 = magnitudes.iter().map(|&m| u64::from(m)).sum();
    #[allow(clippy::cast_precision_loss)]
    let avg = sum as f64 / magnitudes.len() as f64;
    avg
}
