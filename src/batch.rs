use serde::Serialize;

use crate::ean::{BaseCode, MAX_BASE_VALUE};
use crate::error::ValidationError;

pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 1000;

/// One issued code: the 13-digit value and the body it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCode {
    pub full_code: String,
    pub base_code: BaseCode,
}

/// A contiguous run of codes plus the cursor value that continues it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub codes: Vec<GeneratedCode>,
    pub next_base: BaseCode,
}

pub fn validate_quantity(quantity: u32) -> Result<(), ValidationError> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(ValidationError::QuantityOutOfRange {
            quantity,
            min: MIN_QUANTITY,
            max: MAX_QUANTITY,
        });
    }
    Ok(())
}

/// Produces `quantity` consecutive codes starting at `start`.
///
/// Rejects the whole batch when `next_base` would not fit in twelve digits,
/// so a successful batch can always be continued.
pub fn generate_batch(start: BaseCode, quantity: u32) -> Result<Batch, ValidationError> {
    validate_quantity(quantity)?;

    let next_value = start
        .value()
        .checked_add(u64::from(quantity))
        .filter(|v| *v <= MAX_BASE_VALUE)
        .ok_or(ValidationError::Overflow {
            limit: MAX_BASE_VALUE,
        })?;

    let codes = (start.value()..next_value)
        .map(|value| -> Result<GeneratedCode, ValidationError> {
            let base_code = BaseCode::from_value(value)?;
            Ok(GeneratedCode {
                full_code: base_code.full_code(),
                base_code,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Batch {
        codes,
        next_base: BaseCode::from_value(next_value)?,
    })
}
