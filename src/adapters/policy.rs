//! Safety-margin memory policy.

use crate::error::PolicyError;
use crate::memory::MemorySize;
use crate::ports::MemoryPolicy;

/// Default fraction of available memory withheld from operations.
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.1;

/// Admits an operation when its estimate fits into available memory minus a
/// fixed safety margin.
///
/// `safe_available = floor(available * (1 - margin))`, truncated rather than
/// rounded and clamped to `available` for figures beyond `f64` precision.
/// A margin of zero means an estimate may use all available memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyMarginPolicy {
    margin: f64,
}

impl SafetyMarginPolicy {
    /// Create a policy withholding `margin` of available memory.
    ///
    /// `margin` must be a finite fraction in `[0, 1)`.
    pub fn new(margin: f64) -> Result<Self, PolicyError> {
        if !margin.is_finite() || !(0.0..1.0).contains(&margin) {
            return Err(PolicyError::InvalidMargin(margin));
        }
        Ok(Self { margin })
    }

    /// The configured safety margin.
    pub fn margin(&self) -> f64 {
        self.margin
    }
}

impl Default for SafetyMarginPolicy {
    fn default() -> Self {
        Self {
            margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl MemoryPolicy for SafetyMarginPolicy {
    fn safe_available(&self, total_available: u64) -> u64 {
        // f64 loses integer precision above 2^53.
        if self.margin == 0.0 {
            return total_available;
        }
        MemorySize::from_bytes(total_available)
            .scale(1.0 - self.margin)
            .as_bytes()
            .min(total_available)
    }

    fn should_execute(&self, estimated: u64, available: u64) -> bool {
        estimated <= self.safe_available(available)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// The verdict is exactly "estimate fits into the truncated safe share".
        #[test]
        fn should_execute_matches_threshold(
            estimated in any::<u64>(),
            available in 0u64..(1u64 << 50),
            margin in 0.0f64..1.0,
        ) {
            let policy = SafetyMarginPolicy::new(margin).unwrap();
            let threshold = (available as f64 * (1.0 - margin)).floor() as u64;
            prop_assert_eq!(policy.should_execute(estimated, available), estimated <= threshold);
        }

        /// The safe share never exceeds what is available.
        #[test]
        fn safe_available_never_exceeds_available(
            available in any::<u64>(),
            margin in 0.0f64..1.0,
        ) {
            let policy = SafetyMarginPolicy::new(margin).unwrap();
            prop_assert!(policy.safe_available(available) <= available);
        }
    }
}
