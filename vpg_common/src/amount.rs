use std::{
    fmt::Display,
    iter::Sum,
    ops::Add,
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::op;

/// The token id of the native Vite coin. Used as the default asset when a payment request does not name one.
pub const VITE_TOKEN_ID: &str = "tti_5649544520544f4b454e6e40";
/// Number of decimal places between one VITE and the smallest on-ledger unit.
pub const VITE_DECIMALS: u32 = 18;

const ATTO_PER_VITE: u128 = 10u128.pow(VITE_DECIMALS);

//--------------------------------------     AttoVite       ----------------------------------------------------------
/// An amount expressed in the ledger's smallest unit.
///
/// All arithmetic and comparisons happen on integers. Floating point is only ever used for log-friendly display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Ord, PartialOrd, Hash)]
pub struct AttoVite(u128);

op!(binary AttoVite, Add, add);

impl Sum for AttoVite {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in atto-vite: {0}")]
pub struct AmountConversionError(pub String);

impl From<u128> for AttoVite {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl AttoVite {
    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn from_vite(vite: u64) -> Self {
        Self(u128::from(vite) * ATTO_PER_VITE)
    }

    /// Converts a decimal VITE amount (as supplied by merchants) into smallest units. Sub-atto dust is truncated.
    pub fn from_vite_decimal(amount: Decimal) -> Result<Self, AmountConversionError> {
        if amount.is_sign_negative() {
            return Err(AmountConversionError(format!("{amount} is negative")));
        }
        let scaled = amount
            .checked_mul(Decimal::from(ATTO_PER_VITE))
            .ok_or_else(|| AmountConversionError(format!("{amount} VITE overflows the amount range")))?;
        let atto = scaled
            .trunc()
            .to_u128()
            .ok_or_else(|| AmountConversionError(format!("{amount} VITE overflows the amount range")))?;
        Ok(Self(atto))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl FromStr for AttoVite {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(Self).map_err(|e| AmountConversionError(format!("'{s}' is not an integer amount: {e}")))
    }
}

impl Display for AttoVite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            // display only, so the precision loss is acceptable
            let vite = self.0 as f64 / ATTO_PER_VITE as f64;
            write!(f, "{vite:0.6} VITE")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// Amounts travel as strings on the wire. The ledger node does the same, and it keeps u128 out of JSON numbers.
impl Serialize for AttoVite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for AttoVite {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
