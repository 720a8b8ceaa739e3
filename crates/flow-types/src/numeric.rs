//! Bounds-checked 256-bit integers.
//!
//! `U256` covers `[0, 2^256)`, `I256` covers `[-2^255, 2^255)`. Arithmetic
//! returns `None` on overflow or division by zero; the VM maps that to its
//! arithmetic error. Both serialize as fixed 32-byte big-endian words
//! (two's complement for `I256`).

use crate::codec::{Codec, CodecError, CodecResult, Reader};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use std::cmp::Ordering;
use std::fmt;

fn u256_modulus() -> BigUint {
    BigUint::one() << 256
}

fn i256_max() -> BigInt {
    (BigInt::one() << 255) - 1
}

fn i256_min() -> BigInt {
    let base: BigInt = BigInt::one() << 255;
    -base
}

/// Unsigned 256-bit integer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct U256(BigUint);

impl U256 {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Largest representable value, `2^256 - 1`.
    pub fn max_value() -> Self {
        Self(u256_modulus() - BigUint::one())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(BigUint::from(value))
    }

    /// Build from a big value; `None` when out of range.
    pub fn from_biguint(value: BigUint) -> Option<Self> {
        (value < u256_modulus()).then_some(Self(value))
    }

    /// Parse a decimal string.
    pub fn from_decimal(text: &str) -> Option<Self> {
        let value = text.parse::<BigUint>().ok()?;
        Self::from_biguint(value)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.0).ok()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        Self::from_biguint(&self.0 + &other.0)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        (self.0 >= other.0).then(|| Self(&self.0 - &other.0))
    }

    pub fn checked_mul(&self, other: &Self) -> Option<Self> {
        Self::from_biguint(&self.0 * &other.0)
    }

    pub fn checked_div(&self, other: &Self) -> Option<Self> {
        (!other.0.is_zero()).then(|| Self(&self.0 / &other.0))
    }

    pub fn checked_rem(&self, other: &Self) -> Option<Self> {
        (!other.0.is_zero()).then(|| Self(&self.0 % &other.0))
    }

    /// Multiply by a small ratio `num / den`, saturating at the maximum.
    /// Used by the difficulty retargeter.
    pub fn scale(&self, num: u64, den: u64) -> Self {
        if den == 0 {
            return Self::max_value();
        }
        let scaled = &self.0 * BigUint::from(num) / BigUint::from(den);
        Self::from_biguint(scaled).unwrap_or_else(Self::max_value)
    }

    /// Fixed 32-byte big-endian encoding.
    pub fn to_bytes_be(&self) -> [u8; 32] {
        let raw = self.0.to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - raw.len()..].copy_from_slice(&raw);
        out
    }

    /// Parse a fixed 32-byte big-endian word.
    pub fn from_bytes_be(bytes: &[u8; 32]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self.0)
    }
}

impl Codec for U256 {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes_be());
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes: [u8; 32] = reader.take(32)?.try_into().unwrap();
        Ok(Self::from_bytes_be(&bytes))
    }
}

/// Signed 256-bit integer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct I256(BigInt);

impl I256 {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn from_i64(value: i64) -> Self {
        Self(BigInt::from(value))
    }

    /// Build from a big value; `None` when out of range.
    pub fn from_bigint(value: BigInt) -> Option<Self> {
        (value >= i256_min() && value <= i256_max()).then_some(Self(value))
    }

    /// Parse a decimal string, with optional leading minus.
    pub fn from_decimal(text: &str) -> Option<Self> {
        let value = text.parse::<BigInt>().ok()?;
        Self::from_bigint(value)
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn to_i64(&self) -> Option<i64> {
        i64::try_from(&self.0).ok()
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        Self::from_bigint(&self.0 + &other.0)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        Self::from_bigint(&self.0 - &other.0)
    }

    pub fn checked_mul(&self, other: &Self) -> Option<Self> {
        Self::from_bigint(&self.0 * &other.0)
    }

    pub fn checked_div(&self, other: &Self) -> Option<Self> {
        if other.0.is_zero() {
            return None;
        }
        Self::from_bigint(&self.0 / &other.0)
    }

    pub fn checked_rem(&self, other: &Self) -> Option<Self> {
        if other.0.is_zero() {
            return None;
        }
        Self::from_bigint(&self.0 % &other.0)
    }

    pub fn checked_neg(&self) -> Option<Self> {
        Self::from_bigint(-&self.0)
    }

    /// Fixed 32-byte big-endian two's-complement encoding.
    pub fn to_bytes_be(&self) -> [u8; 32] {
        let unsigned = match self.0.sign() {
            Sign::Minus => {
                let magnitude = (-&self.0).to_biguint().expect("negated is positive");
                u256_modulus() - magnitude
            }
            _ => self.0.to_biguint().expect("non-negative"),
        };
        let raw = unsigned.to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - raw.len()..].copy_from_slice(&raw);
        out
    }

    /// Parse a fixed 32-byte big-endian two's-complement word.
    pub fn from_bytes_be(bytes: &[u8; 32]) -> Self {
        let unsigned = BigUint::from_bytes_be(bytes);
        let value = if bytes[0] & 0x80 != 0 {
            BigInt::from(unsigned) - BigInt::from(u256_modulus())
        } else {
            BigInt::from(unsigned)
        };
        Self(value)
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for I256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I256({})", self.0)
    }
}

impl Codec for I256 {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_bytes_be());
    }

    fn decode(reader: &mut Reader<'_>) -> CodecResult<Self> {
        let bytes: [u8; 32] = reader.take(32)?.try_into().unwrap();
        Ok(Self::from_bytes_be(&bytes))
    }
}
