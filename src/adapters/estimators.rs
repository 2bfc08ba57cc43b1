//! Reference memory estimators.
//!
//! All of these are permissive: when an estimate cannot be computed they
//! return zero, which admits the call. That keeps a missing file from
//! blocking work, but it also disables the gate for that call. Compose a
//! stricter estimator where that matters.

use crate::error::EstimationError;
use crate::memory::MemorySize;
use crate::ports::MemoryEstimator;
use std::fs;
use std::path::Path;

/// Estimates a file-processing operation as a multiple of the file's size.
///
/// The multiplier covers decoding, string overhead and buffers.
#[derive(Debug, Clone, Copy)]
pub struct FileSizeEstimator {
    multiplier: f64,
}

impl FileSizeEstimator {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl Default for FileSizeEstimator {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl<P: AsRef<Path>> MemoryEstimator<P> for FileSizeEstimator {
    fn estimate(&self, path: &P) -> Result<u64, EstimationError> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(meta) => Ok(MemorySize::from_bytes(meta.len())
                .scale(self.multiplier)
                .as_bytes()),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Cannot stat file, estimating zero"
                );
                Ok(0)
            }
        }
    }
}

/// Estimates a data-processing operation from its input size in bytes.
#[derive(Debug, Clone, Copy)]
pub struct DataSizeEstimator {
    multiplier: f64,
}

impl DataSizeEstimator {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl Default for DataSizeEstimator {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl MemoryEstimator<u64> for DataSizeEstimator {
    fn estimate(&self, data_size: &u64) -> Result<u64, EstimationError> {
        Ok(MemorySize::from_bytes(*data_size)
            .scale(self.multiplier)
            .as_bytes())
    }
}

impl MemoryEstimator<MemorySize> for DataSizeEstimator {
    fn estimate(&self, data_size: &MemorySize) -> Result<u64, EstimationError> {
        MemoryEstimator::<u64>::estimate(self, &data_size.as_bytes())
    }
}

/// Estimates a list-processing operation from its item count.
#[derive(Debug, Clone, Copy)]
pub struct ListSizeEstimator {
    bytes_per_item: u64,
}

impl ListSizeEstimator {
    pub fn new(bytes_per_item: u64) -> Self {
        Self { bytes_per_item }
    }
}

impl Default for ListSizeEstimator {
    fn default() -> Self {
        Self::new(100)
    }
}

impl MemoryEstimator<usize> for ListSizeEstimator {
    fn estimate(&self, item_count: &usize) -> Result<u64, EstimationError> {
        Ok((*item_count as u64).saturating_mul(self.bytes_per_item))
    }
}

/// Returns the same estimate for any arguments.
#[derive(Debug, Clone, Copy)]
pub struct FixedEstimator(pub u64);

impl<A> MemoryEstimator<A> for FixedEstimator {
    fn estimate(&self, _args: &A) -> Result<u64, EstimationError> {
        Ok(self.0)
    }
}

/// Adapts a closure into an estimator.
///
/// ```
/// use memgate::adapters::FnEstimator;
/// use memgate::MemoryEstimator;
///
/// let per_row = FnEstimator::new(|rows: &usize| *rows as u64 * 64);
/// assert_eq!(per_row.estimate(&10).unwrap(), 640);
/// ```
pub struct FnEstimator<F> {
    func: F,
}

impl<F> FnEstimator<F> {
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<A, F> MemoryEstimator<A> for FnEstimator<F>
where
    F: Fn(&A) -> u64 + Send + Sync,
{
    fn estimate(&self, args: &A) -> Result<u64, EstimationError> {
        Ok((self.func)(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_file_size_estimator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, vec![b'x'; 1000]).unwrap();

        let estimator = FileSizeEstimator::default();
        assert_eq!(estimator.estimate(&path).unwrap(), 2000);
        assert_eq!(FileSizeEstimator::new(1.25).estimate(&path).unwrap(), 1250);
    }

    #[test]
    fn test_file_size_estimator_missing_file_is_zero() {
        let estimator = FileSizeEstimator::default();
        let missing = PathBuf::from("/definitely/not/here.txt");
        assert_eq!(estimator.estimate(&missing).unwrap(), 0);
        assert_eq!(estimator.estimate(&"/nor/here").unwrap(), 0);
    }

    #[test]
    fn test_data_size_estimator() {
        let estimator = DataSizeEstimator::default();
        assert_eq!(estimator.estimate(&1000u64).unwrap(), 1500);
        assert_eq!(
            estimator.estimate(&MemorySize::from_mib(2)).unwrap(),
            3 * 1024 * 1024
        );
        assert_eq!(DataSizeEstimator::new(0.5).estimate(&3u64).unwrap(), 1);
    }

    #[test]
    fn test_list_size_estimator() {
        let estimator = ListSizeEstimator::default();
        assert_eq!(estimator.estimate(&1000usize).unwrap(), 100_000);
        assert_eq!(ListSizeEstimator::new(8).estimate(&0usize).unwrap(), 0);
        assert_eq!(
            ListSizeEstimator::new(u64::MAX).estimate(&2usize).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn test_fixed_estimator_ignores_args() {
        let estimator = FixedEstimator(42);
        assert_eq!(estimator.estimate(&"anything").unwrap(), 42);
        assert_eq!(estimator.estimate(&(1, 2, 3)).unwrap(), 42);
    }

    #[test]
    fn test_fn_estimator() {
        let estimator = FnEstimator::new(|(a, b): &(u64, u64)| a * b);
        assert_eq!(estimator.estimate(&(6, 7)).unwrap(), 42);
    }
}
