//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
///
/// If the source range is degenerate (both ends equal) the start of the
/// target range is returned.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    let source_span = source_range.1 - source_range.0;

    if source_span == T::zero() {
        return target_range.0;
    }

    target_range.0 + ((value - source_range.0) * (target_range.1 - target_range.0) / source_span)
}

/// Clamp a value between the given bounds.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    value.max(min).min(max)
}

/// Returns `true` if the value lies within the inclusive range `[min, max]`.
pub fn in_range<T>(value: T, min: T, max: T) -> bool
where
    T: Float,
{
    value >= min && value <= max
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 10f64), (0f64, 1f64), 5f64), 0.5);
        assert_eq!(lin_map((2f64, 4f64), (10f64, 20f64), 3f64), 15.0);
        assert_eq!(lin_map((1f64, 1f64), (0f64, 1f64), 7f64), 0.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(1.5f64, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-0.5f64, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.25f64, 0.0, 1.0), 0.25);
    }

    #[test]
    fn test_in_range() {
        assert!(in_range(0.3f64, 0.0, 0.3));
        assert!(!in_range(0.31f64, 0.0, 0.3));
        assert!(!in_range(f64::NAN, 0.0, 0.3));
    }
}
