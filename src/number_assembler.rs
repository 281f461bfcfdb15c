use crate::ean::BaseCode;
use crate::error::ValidationError;
use crate::prefix_rule::{PrefixRule, MAX_TAIL};

/// Builds base codes for the prefixed identifier mode:
/// `prefix(3) + identifier(5) + tail(4)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberAssembler {}

impl NumberAssembler {
    pub fn new() -> Self {
        NumberAssembler {}
    }

    pub fn assemble(&self, rule: &PrefixRule, tail: u16) -> Result<BaseCode, ValidationError> {
        rule.validate()?;
        if tail > MAX_TAIL {
            return Err(ValidationError::InvalidTail(u32::from(tail)));
        }
        BaseCode::parse(&format!("{}{:04}", rule.head(), tail))
    }

    /// Picks where the next batch under `rule` starts.
    ///
    /// A cursor is only continued when it was issued under the same prefix and
    /// identifier; a cursor left over from another identifier restarts the
    /// tail at 0000, and a missing cursor starts at the rule's initial tail.
    /// A cursor sitting one past tail 9999 means the head is used up.
    pub fn resolve_start(
        &self,
        rule: &PrefixRule,
        cursor: Option<&BaseCode>,
    ) -> Result<BaseCode, ValidationError> {
        let first = self.assemble(rule, 0)?;
        match cursor {
            Some(cursor) if cursor.to_string().starts_with(&rule.head()) => Ok(*cursor),
            Some(cursor) if cursor.value() == first.value() + u64::from(MAX_TAIL) + 1 => {
                Err(ValidationError::TailExhausted(rule.head()))
            }
            Some(_) => Ok(first),
            None => self.assemble(rule, rule.initial_tail),
        }
    }

    /// Rejects a batch that would carry the tail past 9999 into the identifier.
    ///
    /// Only the tail is checked here. Under head `99999999` the batch must
    /// also leave room for a 12-digit `next_base`, so tail 9999 of that head
    /// is refused later by `generate_batch` with `Overflow`.
    pub fn check_tail_capacity(&self, start: &BaseCode, quantity: u32) -> Result<(), ValidationError> {
        let tail = tail_of(start);
        if u32::from(tail) + quantity > u32::from(MAX_TAIL) + 1 {
            return Err(ValidationError::TailOverflow {
                start: tail,
                quantity,
            });
        }
        Ok(())
    }
}

/// Last four digits of a base code.
pub fn tail_of(code: &BaseCode) -> u16 {
    (code.value() % 10_000) as u16
}
