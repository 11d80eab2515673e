use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Empty,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Tier {
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Empty     => "EMPTY",
            Tier::Poor      => "POOR",
            Tier::Fair      => "FAIR",
            Tier::Good      => "GOOD",
            Tier::Excellent => "EXCELLENT",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "empty"     => Ok(Tier::Empty),
            "poor"      => Ok(Tier::Poor),
            "fair"      => Ok(Tier::Fair),
            "good"      => Ok(Tier::Good),
            "excellent" => Ok(Tier::Excellent),
            _           => Err(Error::InvalidArgument("unknown tier")),
        }
    }
}

/// Data-density summary of one response buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Classification {
    pub non_zero_ratio: f64,
    pub distinct_value_count: u16,
    pub tier: Tier,
}

impl Classification {
    /// Distinct byte values as a fraction of the 256 possible.
    pub fn distinct_ratio(&self) -> f64 {
        f64::from(self.distinct_value_count) / 256.0
    }
}

/// Lower bounds a buffer must strictly exceed to reach a tier.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct TierRule {
    pub non_zero_ratio: f64,
    #[serde(default)]
    pub distinct_ratio: f64,
}

impl TierRule {
    pub const fn new(non_zero_ratio: f64, distinct_ratio: f64) -> Self {
        Self { non_zero_ratio, distinct_ratio }
    }

    fn admits(&self, non_zero_ratio: f64, distinct_ratio: f64) -> bool {
        non_zero_ratio > self.non_zero_ratio && distinct_ratio > self.distinct_ratio
    }

    fn dominates(&self, lower: &TierRule) -> bool {
        self.non_zero_ratio >= lower.non_zero_ratio && self.distinct_ratio >= lower.distinct_ratio
    }

    fn in_range(&self) -> bool {
        (0.0..=1.0).contains(&self.non_zero_ratio) && (0.0..=1.0).contains(&self.distinct_ratio)
    }
}

/// Tier cut points. Anything with non-zero data that clears no rule is
/// `Poor`; empty and all-zero buffers are always `Empty`.
///
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawThresholds")]
pub struct Thresholds {
    excellent: TierRule,
    good: TierRule,
    fair: TierRule,
}

#[derive(Deserialize)]
struct RawThresholds {
    excellent: TierRule,
    good: TierRule,
    fair: TierRule,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = Error;

    fn try_from(raw: RawThresholds) -> Result<Self> {
        Self::new(raw.excellent, raw.good, raw.fair)
    }
}

impl Thresholds {
    pub fn new(excellent: TierRule, good: TierRule, fair: TierRule) -> Result<Self> {
        if ![excellent, good, fair].iter().all(TierRule::in_range) {
            return Err(Error::InvalidThresholds("ratios must lie in [0, 1]"));
        }
        if !excellent.dominates(&good) || !good.dominates(&fair) {
            return Err(Error::InvalidThresholds("tiers must not decrease"));
        }
        Ok(Self { excellent, good, fair })
    }

    /// Cut points of the full EH575 calibration run.
    pub const fn standard() -> Self {
        Self {
            excellent: TierRule::new(0.50, 0.30),
            good:      TierRule::new(0.20, 0.10),
            fair:      TierRule::new(0.05, 0.00),
        }
    }

    /// Looser density, stricter variety: the adaptive calibration variant.
    pub const fn adaptive() -> Self {
        Self {
            excellent: TierRule::new(0.30, 0.40),
            good:      TierRule::new(0.15, 0.20),
            fair:      TierRule::new(0.05, 0.10),
        }
    }

    pub fn rule(&self, tier: Tier) -> Option<&TierRule> {
        match tier {
            Tier::Excellent          => Some(&self.excellent),
            Tier::Good               => Some(&self.good),
            Tier::Fair               => Some(&self.fair),
            Tier::Poor | Tier::Empty => None,
        }
    }

    pub fn classify(&self, buffer: &[u8]) -> Classification {
        let mut seen = [false; 256];
        let mut non_zero = 0usize;
        for &b in buffer {
            seen[usize::from(b)] = true;
            if b != 0 {
                non_zero += 1;
            }
        }

        let distinct_value_count = seen.iter().filter(|&&s| s).count() as u16;
        let non_zero_ratio = if buffer.is_empty() {
            0.0
        } else {
            non_zero as f64 / buffer.len() as f64
        };

        let tier = if non_zero == 0 {
            Tier::Empty
        } else {
            let distinct_ratio = f64::from(distinct_value_count) / 256.0;
            [Tier::Excellent, Tier::Good, Tier::Fair]
                .into_iter()
                .find(|&t| self.rule(t).map_or(false, |r| r.admits(non_zero_ratio, distinct_ratio)))
                .unwrap_or(Tier::Poor)
        };

        Classification { non_zero_ratio, distinct_value_count, tier }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classify with the standard thresholds.
pub fn classify(buffer: &[u8]) -> Classification {
    Thresholds::standard().classify(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let c = classify(&[]);
        assert_eq!(c, Classification { non_zero_ratio: 0.0, distinct_value_count: 0, tier: Tier::Empty });
    }

    #[test]
    fn all_zero_buffer() {
        let c = classify(&[0u8; 100]);
        assert_eq!(c, Classification { non_zero_ratio: 0.0, distinct_value_count: 1, tier: Tier::Empty });
    }

    #[test]
    fn repeating_pattern_is_above_empty() {
        let buffer: Vec<u8> = [1u8, 2, 3, 4].repeat(25);
        assert_eq!(buffer.len(), 100);

        for thresholds in [Thresholds::standard(), Thresholds::adaptive()] {
            let c = thresholds.classify(&buffer);
            assert_eq!(c.non_zero_ratio, 1.0);
            assert_eq!(c.distinct_value_count, 4);
            assert!(c.tier > Tier::Empty);
        }
    }

    #[test]
    fn single_non_zero_byte_is_poor() {
        let mut buffer = vec![0u8; 1000];
        buffer[500] = 0x7f;
        let c = classify(&buffer);
        assert_eq!(c.tier, Tier::Poor);
        assert!(c.non_zero_ratio > 0.0);
    }

    #[test]
    fn full_range_is_excellent() {
        let buffer: Vec<u8> = (0..=255u8).cycle().take(5356).collect();
        let c = classify(&buffer);
        assert_eq!(c.distinct_value_count, 256);
        assert_eq!(c.tier, Tier::Excellent);
    }

    #[test]
    fn ratio_bounds_and_zero_iff() {
        let buffers: [&[u8]; 6] = [&[], &[0], &[0, 0, 0], &[0, 1], &[255], &[0, 0, 0, 9]];
        for b in buffers {
            let c = classify(b);
            assert!((0.0..=1.0).contains(&c.non_zero_ratio));
            assert_eq!(c.non_zero_ratio == 0.0, b.iter().all(|&x| x == 0));
        }
    }

    #[test]
    fn classify_is_repeatable() {
        let buffer: Vec<u8> = (0..200u32).map(|i| (i * 37 % 251) as u8).collect();
        assert_eq!(classify(&buffer), classify(&buffer));
    }

    #[test]
    fn cut_points_are_strict() {
        // Exactly 5% non-zero does not clear FAIR.
        let mut buffer = vec![0u8; 100];
        buffer[..5].fill(1);
        assert_eq!(classify(&buffer).tier, Tier::Poor);
        buffer[5] = 1;
        assert_eq!(classify(&buffer).tier, Tier::Fair);
    }

    #[test]
    fn custom_thresholds() {
        let thresholds = Thresholds::new(
            TierRule::new(0.9, 0.0),
            TierRule::new(0.5, 0.0),
            TierRule::new(0.0, 0.0),
        ).unwrap();
        assert_eq!(thresholds.classify(&[0, 0, 0, 1]).tier, Tier::Fair);
        assert_eq!(thresholds.classify(&[0, 1, 1, 1]).tier, Tier::Good);
        assert_eq!(thresholds.classify(&[1, 1, 1, 1]).tier, Tier::Excellent);
    }

    #[test]
    fn rejects_out_of_range() {
        let result = Thresholds::new(TierRule::new(1.5, 0.0), TierRule::new(0.2, 0.0), TierRule::new(0.1, 0.0));
        assert!(matches!(result, Err(Error::InvalidThresholds(_))));
    }

    #[test]
    fn rejects_inverted_tiers() {
        let result = Thresholds::new(TierRule::new(0.2, 0.0), TierRule::new(0.5, 0.0), TierRule::new(0.1, 0.0));
        assert!(matches!(result, Err(Error::InvalidThresholds(_))));
    }

    #[test]
    fn tier_order_and_parse() {
        assert!(Tier::Empty < Tier::Poor && Tier::Poor < Tier::Fair);
        assert!(Tier::Fair < Tier::Good && Tier::Good < Tier::Excellent);
        assert_eq!("GOOD".parse::<Tier>().unwrap(), Tier::Good);
        assert!("great".parse::<Tier>().is_err());
    }
}
