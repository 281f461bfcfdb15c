use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Number of digits in an unchecked EAN-13 body.
pub const BASE_CODE_LEN: usize = 12;

/// Largest value a 12-digit base code can hold.
pub const MAX_BASE_VALUE: u64 = 999_999_999_999;

/// The 12-digit body of an EAN-13 code.
///
/// Can only be built from exactly twelve ASCII digits, so everything that
/// accepts a `BaseCode` may assume a well-formed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BaseCode(u64);

impl BaseCode {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.len() != BASE_CODE_LEN || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidBaseCode(input.to_string()));
        }
        // Twelve digits always fit in a u64.
        input
            .parse::<u64>()
            .map(BaseCode)
            .map_err(|_| ValidationError::InvalidBaseCode(input.to_string()))
    }

    pub fn from_value(value: u64) -> Result<Self, ValidationError> {
        if value > MAX_BASE_VALUE {
            return Err(ValidationError::Overflow {
                limit: MAX_BASE_VALUE,
            });
        }
        Ok(BaseCode(value))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn digits(&self) -> [u8; BASE_CODE_LEN] {
        let mut digits = [0u8; BASE_CODE_LEN];
        let mut rest = self.0;
        for slot in digits.iter_mut().rev() {
            *slot = (rest % 10) as u8;
            rest /= 10;
        }
        digits
    }

    pub fn check_digit(&self) -> u8 {
        compute_check_digit(self)
    }

    /// Base code followed by its check digit.
    pub fn full_code(&self) -> String {
        format!("{}{}", self, self.check_digit())
    }
}

impl fmt::Display for BaseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:012}", self.0)
    }
}

impl FromStr for BaseCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseCode::parse(s)
    }
}

impl TryFrom<String> for BaseCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BaseCode::parse(&value)
    }
}

impl From<BaseCode> for String {
    fn from(code: BaseCode) -> Self {
        code.to_string()
    }
}

/// Standard EAN-13 check digit: weight 1 on even positions, 3 on odd ones
/// (0-indexed, left to right).
pub fn compute_check_digit(base: &BaseCode) -> u8 {
    let sum: u32 = base
        .digits()
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * if i % 2 == 1 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Whether `code` is thirteen digits whose weighted sum is a multiple of ten.
pub fn is_valid_ean13(code: &str) -> bool {
    if code.len() != BASE_CODE_LEN + 1 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = code
        .bytes()
        .enumerate()
        .map(|(i, b)| u32::from(b - b'0') * if i % 2 == 1 { 3 } else { 1 })
        .sum();
    sum % 10 == 0
}
