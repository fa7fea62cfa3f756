//! Shared test utilities for the SST regridding workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic SST grid generators
//! - In-memory file stores, grid sources, climatologies and writers
//! - LUT and configuration fixtures
//! - Tracing setup for tests
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{init_tracing, MemoryInputs, fixtures::date};
//! ```

pub mod fixtures;
pub mod generators;
pub mod memory;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use memory::*;

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once per test binary.
///
/// The filter comes from `RUST_LOG` and defaults to `sst_regrid=debug`.
/// Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sst_regrid=debug,sst_grid=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(282.0001_f64, 282.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(f64::NAN, 1.0, 0.001);              // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_rejects_nan() {
        assert_approx_eq!(f64::NAN, 1.0, 0.001);
    }

    #[test]
    fn test_init_tracing_twice() {
        super::init_tracing();
        super::init_tracing();
    }
}
