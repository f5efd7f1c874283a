//! Frame activity classification.
//!
//! A frame is *active* when its envelope value lies inside the inclusive
//! [`DecibelBand`]. The resulting [`ActivityMask`] feeds the run segmenter in
//! [`runs`].

pub mod runs;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeditError};

/// Inclusive decibel window editors keep: `min_db ≤ db ≤ max_db`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawBand")]
pub struct DecibelBand {
    min_db: f32,
    max_db: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBand {
    min_db: f32,
    max_db: f32,
}

impl TryFrom<RawBand> for DecibelBand {
    type Error = VeditError;

    fn try_from(raw: RawBand) -> Result<Self> {
        DecibelBand::new(raw.min_db, raw.max_db)
    }
}

impl DecibelBand {
    /// # Errors
    /// `InvalidConfiguration` when a bound is not finite or `min_db > max_db`.
    pub fn new(min_db: f32, max_db: f32) -> Result<Self> {
        if !min_db.is_finite() || !max_db.is_finite() {
            return Err(VeditError::config(format!(
                "decibel band bounds must be finite (got {min_db}..{max_db})"
            )));
        }
        if min_db > max_db {
            return Err(VeditError::config(format!(
                "min_db ({min_db}) must not exceed max_db ({max_db})"
            )));
        }
        Ok(Self { min_db, max_db })
    }

    pub fn min_db(&self) -> f32 {
        self.min_db
    }

    pub fn max_db(&self) -> f32 {
        self.max_db
    }

    #[inline]
    pub fn contains(&self, db: f32) -> bool {
        self.min_db <= db && db <= self.max_db
    }
}

/// One flag per envelope frame: `true` when the frame is inside the band.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActivityMask(Vec<bool>);

impl ActivityMask {
    /// Classify every envelope value against `band`.
    pub fn classify(values: &[f32], band: &DecibelBand) -> Self {
        Self(values.iter().map(|&db| band.contains(db)).collect())
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.0.iter().filter(|&&a| a).count()
    }

    /// Fraction of active frames; `0.0` for an empty mask.
    pub fn active_ratio(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.active_count() as f64 / self.0.len() as f64
    }
}

impl From<Vec<bool>> for ActivityMask {
    fn from(flags: Vec<bool>) -> Self {
        Self(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_is_inclusive_on_both_ends() {
        let band = DecibelBand::new(-40.0, -10.0).unwrap();
        let mask = ActivityMask::classify(&[-41.0, -40.0, -25.0, -10.0, -9.9], &band);
        assert_eq!(mask.as_slice(), &[false, true, true, true, false]);
        assert_eq!(mask.active_count(), 3);
    }

    #[test]
    fn inverted_band_rejected() {
        let err = DecibelBand::new(5.0, -5.0).unwrap_err();
        assert!(err.is_invalid_configuration());
    }

    #[test]
    fn non_finite_band_rejected() {
        assert!(DecibelBand::new(f32::NAN, 0.0).is_err());
        assert!(DecibelBand::new(-20.0, f32::INFINITY).is_err());
    }

    #[test]
    fn degenerate_band_matches_exact_value() {
        let band = DecibelBand::new(-30.0, -30.0).unwrap();
        assert!(band.contains(-30.0));
        assert!(!band.contains(-30.01));
    }

    #[test]
    fn empty_envelope_gives_empty_mask() {
        let band = DecibelBand::new(-20.0, 0.0).unwrap();
        let mask = ActivityMask::classify(&[], &band);
        assert!(mask.is_empty());
        assert_eq!(mask.active_ratio(), 0.0);
    }

    #[test]
    fn band_deserialization_validates() {
        let ok: DecibelBand = serde_json::from_str(r#"{"minDb":-35.0,"maxDb":-5.0}"#).unwrap();
        assert_eq!(ok.min_db(), -35.0);
        let bad = serde_json::from_str::<DecibelBand>(r#"{"minDb":5.0,"maxDb":-5.0}"#);
        assert!(bad.is_err());
    }
}
