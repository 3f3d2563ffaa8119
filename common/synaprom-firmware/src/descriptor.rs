// Licensed under the Apache-2.0 license

//! Declarative firmware descriptions.
//!
//! A container can be built from a small TOML document instead of a binary
//! blob:
//!
//! ```toml
//! product_id = "0x41"
//! ```

use crate::error::{FirmwareError, FirmwareResult};
use serde::Deserialize;

/// A structured description queried for individual properties.
pub trait DescriptorSource {
    /// Returns the value of `key` as an unsigned integer, or `None` if the key
    /// is missing or does not hold an unsigned integer.
    fn query_u64(&self, key: &str) -> Option<u64>;
}

/// Properties settable from a descriptor.
///
/// Values are kept as raw TOML so that one of the wrong type reads as absent
/// instead of failing the whole document.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FirmwareDescriptor {
    pub product_id: Option<toml::Value>,
}

impl FirmwareDescriptor {
    pub fn from_toml(contents: &str) -> FirmwareResult<Self> {
        toml::from_str(contents).map_err(|e| FirmwareError::Descriptor(e.to_string()))
    }
}

impl DescriptorSource for FirmwareDescriptor {
    fn query_u64(&self, key: &str) -> Option<u64> {
        match key {
            "product_id" => self.product_id.as_ref().and_then(value_as_u64),
            _ => None,
        }
    }
}

impl DescriptorSource for toml::Table {
    fn query_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(value_as_u64)
    }
}

/// Reads an unsigned integer from a TOML integer or from integer text.
fn value_as_u64(value: &toml::Value) -> Option<u64> {
    match value {
        toml::Value::Integer(v) => u64::try_from(*v).ok(),
        toml::Value::String(s) => parse_uint(s),
        _ => None,
    }
}

/// Parses decimal or `0x`-prefixed hexadecimal text.
pub fn parse_uint(text: &str) -> Option<u64> {
    let text = text.trim();
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}
