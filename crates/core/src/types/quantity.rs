//! Cart line quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// A positive line-item quantity.
///
/// A quantity is never zero: values at or below zero are coerced to one.
/// Removing a line is a separate operation, never a quantity of zero.
///
/// ```
/// use clickcart_core::Quantity;
///
/// assert_eq!(Quantity::clamped(0).get(), 1);
/// assert_eq!(Quantity::clamped(-3).get(), 1);
/// assert_eq!(Quantity::clamped(4).get(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Build a quantity from any integer, applying `max(1, n)`.
    ///
    /// Values larger than `u32::MAX` saturate.
    #[must_use]
    pub fn clamped(n: i64) -> Self {
        let n = u32::try_from(n.max(1)).unwrap_or(u32::MAX);
        NonZeroU32::new(n).map_or(Self::ONE, Self)
    }

    /// The quantity as a plain integer (always >= 1).
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Add two quantities, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0.get()))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl From<NonZeroU32> for Quantity {
    fn from(n: NonZeroU32) -> Self {
        Self(n)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
