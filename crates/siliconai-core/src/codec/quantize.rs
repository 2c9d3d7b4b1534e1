use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const GRID: f64 = 100.0;

/// How a value is snapped onto the 0.01 fixed-point grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationScheme {
    /// Round to two decimals (ties to even), then truncate `100 * x` toward
    /// zero.
    #[default]
    RoundThenTruncate,
    /// Floor of `100 * x` for positive values, ceil otherwise.
    TruncateTowardZero,
}

impl QuantizationScheme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoundThenTruncate => "round_then_truncate",
            Self::TruncateTowardZero => "truncate_toward_zero",
        }
    }
}

impl Display for QuantizationScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum QuantizationError {
    #[error("value {value} does not fit the 0.01 fixed-point range")]
    OutOfRange { value: f64 },
    #[error("value {value} is not finite")]
    Infinite { value: f64 },
}

/// Snap `value` onto the hundredths grid in floating point, exactly as the
/// exported datasets were produced.
///
/// `RoundThenTruncate` computes `trunc(round(x, 2) * 100) / 100` and
/// `TruncateTowardZero` computes `floor(x * 100) / 100` for positive values
/// and `ceil(x * 100) / 100` otherwise. Neither is plain rounding: a product
/// such as `0.57 * 100 = 56.999...` truncates one step toward zero, so a
/// quantized value may move by one more step when quantized again.
pub fn quantize(value: f64, scheme: QuantizationScheme) -> Result<f64, QuantizationError> {
    if value.is_nan() {
        return Ok(value);
    }
    if value.is_infinite() {
        return Err(QuantizationError::Infinite { value });
    }
    if (value * GRID).abs() > i32::MAX as f64 {
        return Err(QuantizationError::OutOfRange { value });
    }

    let steps = match scheme {
        QuantizationScheme::RoundThenTruncate => {
            let rounded = (value * GRID).round_ties_even() / GRID;
            (rounded * GRID).trunc()
        }
        QuantizationScheme::TruncateTowardZero if value > 0.0 => (value * GRID).floor(),
        QuantizationScheme::TruncateTowardZero => (value * GRID).ceil(),
    };
    Ok(steps / GRID)
}

#[cfg(test)]
mod tests {
    use super::{QuantizationError, QuantizationScheme, quantize};

    const ROUND: QuantizationScheme = QuantizationScheme::RoundThenTruncate;
    const TRUNCATE: QuantizationScheme = QuantizationScheme::TruncateTowardZero;

    #[test]
    fn rounding_scheme_truncates_after_rounding() {
        let cases = [
            (0.29, 0.28),
            (0.57, 0.56),
            (0.58, 0.57),
            (1.15, 1.14),
            (-0.29, -0.28),
            (1.234, 1.23),
            (1.236, 1.24),
            (-1.236, -1.24),
            (12.345, 12.34),
            (2.5, 2.5),
            (-3.75, -3.75),
        ];
        for (value, expected) in cases {
            assert_eq!(quantize(value, ROUND), Ok(expected), "quantizing {value}");
        }
    }

    #[test]
    fn truncating_scheme_floors_positive_and_ceils_negative() {
        let cases = [
            (0.29, 0.28),
            (0.57, 0.56),
            (1.239, 1.23),
            (-1.239, -1.23),
            (-0.57, -0.56),
            (0.129, 0.12),
            (-0.129, -0.12),
            (2.5, 2.5),
        ];
        for (value, expected) in cases {
            assert_eq!(quantize(value, TRUNCATE), Ok(expected), "quantizing {value}");
        }
    }

    #[test]
    fn zero_keeps_the_sign_of_small_values() {
        let positive = quantize(0.004, ROUND).expect("in range");
        assert_eq!(positive, 0.0);
        assert!(positive.is_sign_positive());

        let negative = quantize(-0.004, ROUND).expect("in range");
        assert_eq!(negative, 0.0);
        assert!(negative.is_sign_negative());

        assert!(quantize(-0.009, TRUNCATE).expect("in range").is_sign_negative());
        assert!(quantize(0.0, TRUNCATE).expect("in range").is_sign_positive());
    }

    #[test]
    fn grid_values_move_at_most_one_step_toward_zero() {
        for scheme in [ROUND, TRUNCATE] {
            for step in -100_000_i64..100_000 {
                let value = step as f64 / 100.0;
                let once = quantize(value, scheme).expect("in range");
                let once_steps = (once * 100.0).round() as i64;
                assert_eq!(once_steps as f64 / 100.0, once, "{scheme} left the grid at {value}");
                assert!(
                    once_steps == step || once_steps == step - step.signum(),
                    "{scheme} moved {value} to {once}"
                );

                let twice = quantize(once, scheme).expect("in range");
                let twice_steps = (twice * 100.0).round() as i64;
                assert!(
                    twice_steps == once_steps || twice_steps == once_steps - once_steps.signum(),
                    "{scheme} moved {once} to {twice}"
                );
            }
        }
    }

    #[test]
    fn nan_passes_through_and_overflow_is_rejected() {
        assert!(quantize(f64::NAN, ROUND).expect("nan is allowed").is_nan());
        assert_eq!(
            quantize(f64::INFINITY, ROUND),
            Err(QuantizationError::Infinite {
                value: f64::INFINITY
            })
        );
        assert!(matches!(
            quantize(3.0e7, TRUNCATE),
            Err(QuantizationError::OutOfRange { .. })
        ));
        assert!(quantize(2.0e7, TRUNCATE).is_ok());
    }
}
