//! Frame index ↔ wall-clock time.
//!
//! Frame → seconds is exact (`i · hop / sr`). Seconds → frame rounds down, so
//! a round trip may move a boundary back by at most one frame duration.

use crate::error::{Result, VeditError};

/// Maps envelope frame indices to seconds for one sample rate / hop pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    sample_rate: u32,
    hop_length: usize,
}

impl FrameClock {
    /// # Errors
    /// `InvalidConfiguration` when `sample_rate` or `hop_length` is zero.
    pub fn new(sample_rate: u32, hop_length: usize) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VeditError::config("sample rate must be positive"));
        }
        if hop_length == 0 {
            return Err(VeditError::config("hop_length must be positive"));
        }
        Ok(Self {
            sample_rate,
            hop_length,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Frames per second of envelope time.
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_length as f64
    }

    /// Duration of one hop in seconds.
    pub fn frame_duration(&self) -> f64 {
        self.hop_length as f64 / self.sample_rate as f64
    }

    pub fn frames_to_seconds(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_length as f64 / self.sample_rate as f64
    }

    /// Inverse of [`frames_to_seconds`](Self::frames_to_seconds), rounding down.
    /// Negative or non-finite input maps to frame 0.
    pub fn seconds_to_frame(&self, seconds: f64) -> usize {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        // Nudge absorbs representation error so exact multiples stay put.
        (seconds * self.frame_rate() + 1e-9).floor() as usize
    }

    /// Frame count for a tolerance length: `round(seconds · sr / hop)`.
    ///
    /// # Errors
    /// `InvalidConfiguration` for negative or non-finite lengths.
    pub fn frames_for_duration(&self, seconds: f64) -> Result<usize> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(VeditError::config(format!(
                "duration must be a non-negative number of seconds (got {seconds})"
            )));
        }
        Ok((seconds * self.frame_rate()).round() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_or_hop_rejected() {
        assert!(FrameClock::new(0, 64).unwrap_err().is_invalid_configuration());
        assert!(FrameClock::new(44_100, 0).unwrap_err().is_invalid_configuration());
    }

    #[test]
    fn frames_to_seconds_is_linear() {
        let clock = FrameClock::new(44_100, 441).unwrap();
        assert_eq!(clock.frames_to_seconds(0), 0.0);
        assert!((clock.frames_to_seconds(100) - 1.0).abs() < 1e-12);
        assert!((clock.frame_duration() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn round_trip_within_one_frame() {
        for (sr, hop) in [(44_100u32, 64usize), (44_100, 256), (48_000, 512), (22_050, 333)] {
            let clock = FrameClock::new(sr, hop).unwrap();
            let tolerance = clock.frame_duration();
            for frame in (0..20_000).step_by(37) {
                let secs = clock.frames_to_seconds(frame);
                let back = clock.seconds_to_frame(secs);
                let drift = (clock.frames_to_seconds(back) - secs).abs();
                assert!(drift <= tolerance, "sr={sr} hop={hop} frame={frame} back={back}");
                assert!(back <= frame);
            }
        }
    }

    #[test]
    fn negative_seconds_clamp_to_first_frame() {
        let clock = FrameClock::new(44_100, 64).unwrap();
        assert_eq!(clock.seconds_to_frame(-3.0), 0);
        assert_eq!(clock.seconds_to_frame(f64::NAN), 0);
    }

    #[test]
    fn tolerance_lengths_round_to_frames() {
        let clock = FrameClock::new(44_100, 64).unwrap();
        // 0.05 · 44100 / 64 = 34.45 → 34
        assert_eq!(clock.frames_for_duration(0.05).unwrap(), 34);
        // 0.1 · 44100 / 64 = 68.9 → 69
        assert_eq!(clock.frames_for_duration(0.1).unwrap(), 69);
        assert!(clock.frames_for_duration(-0.1).is_err());
        assert!(clock.frames_for_duration(f64::INFINITY).is_err());
    }
}
