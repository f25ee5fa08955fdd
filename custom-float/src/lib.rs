use core::fmt::{self, Display};
use std::num::NonZeroU64;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as DeError};

/// A positive, non-zero f64.
///
/// Stored as the float's bit pattern in a `NonZeroU64` for niche
/// optimization, so `Option<PositiveNonZeroF64>` is the same size as `f64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositiveNonZeroF64(NonZeroU64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    Zero,
    Negative(f64),
    NaN,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Zero => write!(f, "expected a non-zero float"),
            Error::Negative(v) => write!(f, "expected a positive float, got {}", v),
            Error::NaN => write!(f, "expected a real number, got NaN"),
        }
    }
}

impl std::error::Error for Error {}

impl PositiveNonZeroF64 {
    pub fn try_new(value: f64) -> Result<Self, Error> {
        if value.is_nan() {
            return Err(Error::NaN);
        }
        if value == 0.0 {
            return Err(Error::Zero);
        }
        if value < 0.0 {
            return Err(Error::Negative(value));
        }
        // A positive float never has an all-zero bit pattern
        Ok(Self(NonZeroU64::new(value.to_bits()).unwrap()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.get())
    }
}

impl Display for PositiveNonZeroF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl Serialize for PositiveNonZeroF64 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(self.get())
    }
}

impl<'de> Deserialize<'de> for PositiveNonZeroF64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Self::try_new(value).map_err(D::Error::custom)
    }
}
