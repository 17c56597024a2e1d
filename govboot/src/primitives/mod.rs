use std::{fmt::Display, str::FromStr};

use alloy::primitives::{Address, U256};

/// Network and build configuration.
pub mod config;

/// HTTP transport used by the explorer verification client.
pub mod http_client;

/// Context-aware logging on top of the `log` facade.
pub mod logger;

/// Scale of a whole percentage point in 18-decimal fixed point (1% = 1e16).
const PERCENT_SCALE: u64 = 10_u64.pow(16);

/// A percentage expressed as an 18-decimal fixed-point number, as governance contracts expect.
///
/// `Percentage::new(50)` is `50 * 10^16`, i.e. `0.5e18`.
///
/// # Examples
/// ```
/// use alloy::primitives::U256;
/// use govboot::primitives::Percentage;
///
/// let quorum = Percentage::new(50).unwrap();
/// assert_eq!(quorum.to_fixed_point(), U256::from(500_000_000_000_000_000_u64));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Percentage(u8);

impl Percentage {
    /// 50%, the default quorum.
    pub const HALF: Self = Self(50);

    /// 5%, the default minimum participation.
    pub const FIVE: Self = Self(5);

    /// Creates a percentage from whole percentage points.
    ///
    /// # Errors
    /// - `PrimitiveError::InvalidInput` if `percent` is above 100.
    pub fn new(percent: u8) -> Result<Self, PrimitiveError> {
        if percent > 100 {
            return Err(PrimitiveError::InvalidInput {
                attribute: "percentage",
                message: format!("{percent} is above 100"),
            });
        }
        Ok(Self(percent))
    }

    /// Whole percentage points.
    #[must_use]
    pub const fn points(self) -> u8 {
        self.0
    }

    /// The value scaled to 18 decimals.
    #[must_use]
    pub fn to_fixed_point(self) -> U256 {
        U256::from(self.0) * U256::from(PERCENT_SCALE)
    }
}

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Percentage {
    type Err = PrimitiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%');
        let points = s.parse::<u8>().map_err(|e| PrimitiveError::InvalidInput {
            attribute: "percentage",
            message: e.to_string(),
        })?;
        Self::new(points)
    }
}

/// Parses user-supplied strings (CLI flags) into typed values.
pub trait ParseFromInput: Sized {
    /// Parses `s`, naming `attribute` in the error if it is invalid.
    ///
    /// # Errors
    /// - `PrimitiveError::InvalidInput` if `s` cannot be parsed.
    fn parse_from_input(s: &str, attribute: &'static str) -> Result<Self, PrimitiveError>;
}

impl ParseFromInput for Address {
    fn parse_from_input(s: &str, attribute: &'static str) -> Result<Self, PrimitiveError> {
        Self::from_str(s.trim()).map_err(|e| PrimitiveError::InvalidInput {
            attribute,
            message: e.to_string(),
        })
    }
}

/// Represents primitive parsing errors.
#[crate::error::govboot_error]
pub enum PrimitiveError {
    /// A provided raw input could not be parsed or is out of range.
    #[error("invalid input on {attribute}: {message}")]
    InvalidInput {
        /// The name of the attribute that was invalid.
        attribute: &'static str,
        /// Explicit failure message for the attribute validation.
        message: String,
    },
}
