//! # Field Tag Grammar
//!
//! Parses the per-field directive string attached to a structure field.
//!
//! ## Grammar
//! ```text
//! tag   := ""  |  token ("," token)*
//! token := "bits=" uint | "lengthField=" name | "switchField=" name | "switchValue=" int
//! ```
//!
//! Tokens are applied left to right, so a repeated key keeps its last value.
//! Sibling names are taken literally here and only looked up by the codec.

use crate::error::{ProtocolError, Result};
use std::str::FromStr;

const BITS_PREFIX: &str = "bits=";
const LENGTH_FIELD_PREFIX: &str = "lengthField=";
const SWITCH_FIELD_PREFIX: &str = "switchField=";
const SWITCH_VALUE_PREFIX: &str = "switchValue=";

/// Non-default directive values parsed from one field's tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldTag {
    /// Width in bits, 0 for whole-value encoding
    pub bit_size: u8,
    /// Value the switch sibling must hold for this field to be present
    pub switch_value: i64,
    /// Sibling gating this field, empty when always present
    pub switch_field: String,
    /// Sibling holding the element count, empty when not length-linked
    pub length_field: String,
}

impl FieldTag {
    /// True when the tag carries no directive at all
    pub fn is_default(&self) -> bool {
        *self == FieldTag::default()
    }

    fn apply(&mut self, token: &str) -> Result<()> {
        if let Some(value) = token.strip_prefix(BITS_PREFIX) {
            self.bit_size = value.parse().map_err(|_| ProtocolError::InvalidTag)?;
        } else if let Some(value) = token.strip_prefix(LENGTH_FIELD_PREFIX) {
            self.length_field = value.to_string();
        } else if let Some(value) = token.strip_prefix(SWITCH_FIELD_PREFIX) {
            self.switch_field = value.to_string();
        } else if let Some(value) = token.strip_prefix(SWITCH_VALUE_PREFIX) {
            self.switch_value = value.parse().map_err(|_| ProtocolError::InvalidTag)?;
        } else {
            return Err(ProtocolError::InvalidTag);
        }
        Ok(())
    }
}

impl FromStr for FieldTag {
    type Err = ProtocolError;

    fn from_str(tag: &str) -> Result<Self> {
        parse_tag(tag)
    }
}

/// Parse a directive string. The empty string yields all defaults.
pub fn parse_tag(tag: &str) -> Result<FieldTag> {
    let mut parsed = FieldTag::default();
    if tag.is_empty() {
        return Ok(parsed);
    }

    for token in tag.split(',') {
        parsed.apply(token)?;
    }
    Ok(parsed)
}
