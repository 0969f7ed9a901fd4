use serde_json::Value;
use tracing::trace;

use super::{Decoder, Decoding};
use crate::descriptor::TypeDescriptor;
use crate::error::{MapperError, Result};

impl Decoder<'_> {
    /// Try every alternative on the same raw value. Exactly one may succeed;
    /// a second success is an ambiguity, not a priority question.
    pub(super) fn union(&self, raw: &Value, arms: &[TypeDescriptor]) -> Result<Decoding> {
        let mut found: Option<Decoding> = None;
        for arm in arms {
            match self.decode(raw, arm) {
                Ok(decoding) if arm.accepts(&decoding.inferred, self.registry) => {
                    if found.is_some() {
                        trace!(alternative = %arm, "second union alternative matched");
                        return Err(MapperError::InvalidValue(raw.clone()));
                    }
                    found = Some(decoding);
                }
                Ok(decoding) => {
                    trace!(alternative = %arm, inferred = %decoding.inferred, "alternative does not accept value");
                }
                Err(err) if err.is_structural() => {
                    trace!(alternative = %arm, error = %err, "discarding alternative");
                }
                Err(err) => return Err(err),
            }
        }
        found.ok_or_else(|| MapperError::InvalidValue(raw.clone()))
    }
}
