// Licensed under the Apache-2.0 license

//! Fixed-layout little-endian records.
//!
//! Every structure on the wire is a `#[repr(C)]` zerocopy type made of
//! unaligned little-endian integers, and also publishes a constant field
//! table describing the same layout. The typed struct is used for the hot
//! decode/encode path; the table drives name-based field access, default
//! filling and diagnostics.

use crate::error::{FirmwareError, FirmwareResult};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// Storage class of a single record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16Le,
    U32Le,
    /// A raw run of bytes, such as reserved padding.
    Bytes(usize),
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16Le => 2,
            FieldKind::U32Le => 4,
            FieldKind::Bytes(len) => len,
        }
    }

    pub const fn is_scalar(self) -> bool {
        !matches!(self, FieldKind::Bytes(_))
    }
}

/// One entry of a record layout table. Offsets are implied by declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Value used when the field is not otherwise set. For byte runs this is
    /// the fill value of every byte.
    pub default: u64,
}

impl Field {
    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, FieldKind::U8)
    }

    pub const fn u16le(name: &'static str) -> Self {
        Self::new(name, FieldKind::U16Le)
    }

    pub const fn u32le(name: &'static str) -> Self {
        Self::new(name, FieldKind::U32Le)
    }

    pub const fn bytes(name: &'static str, len: usize) -> Self {
        Self::new(name, FieldKind::Bytes(len))
    }

    const fn new(name: &'static str, kind: FieldKind) -> Self {
        Field {
            name,
            kind,
            default: 0,
        }
    }

    pub const fn with_default(self, default: u64) -> Self {
        Field { default, ..self }
    }
}

/// Total width in bytes of a layout table.
pub const fn layout_size(fields: &[Field]) -> usize {
    let mut size = 0;
    let mut i = 0;
    while i < fields.len() {
        size += fields[i].kind.width();
        i += 1;
    }
    size
}

/// Looks up a field by name, returning its byte offset within the record.
pub fn field_offset(fields: &[Field], name: &str) -> Option<(usize, Field)> {
    let mut offset = 0;
    for field in fields {
        if field.name == name {
            return Some((offset, *field));
        }
        offset += field.kind.width();
    }
    None
}

/// Encodes a record that consists only of the declared field defaults.
pub fn layout_defaults(fields: &[Field]) -> FirmwareResult<Vec<u8>> {
    let mut out = Vec::with_capacity(layout_size(fields));
    let mut offset = 0;
    for field in fields {
        match field.kind {
            FieldKind::Bytes(len) => out.resize(offset + len, field.default as u8),
            kind => write_uint_le(&mut out, offset, kind.width(), field.default)?,
        }
        offset += field.kind.width();
    }
    Ok(out)
}

/// Returns `buf[offset..offset + size]`, refusing to read at or beyond
/// `limit` (clamped to the buffer length).
pub(crate) fn bounded_slice<'a>(
    buf: &'a [u8],
    limit: usize,
    offset: usize,
    size: usize,
    what: &'static str,
) -> FirmwareResult<&'a [u8]> {
    let limit = limit.min(buf.len());
    offset
        .checked_add(size)
        .filter(|end| *end <= limit)
        .and_then(|end| buf.get(offset..end))
        .ok_or(FirmwareError::OutOfBounds {
            what,
            offset,
            size,
            limit,
        })
}

/// Reads a little-endian unsigned integer of `width` bytes (at most 8).
pub fn read_uint_le(buf: &[u8], limit: usize, offset: usize, width: usize) -> FirmwareResult<u64> {
    let bytes = bounded_slice(buf, limit, offset, width.min(8), "integer")?;
    Ok(bytes
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

/// Writes the low `width` bytes of `value` in little-endian order, growing
/// `out` with zeroes if it is too short.
pub fn write_uint_le(
    out: &mut Vec<u8>,
    offset: usize,
    width: usize,
    value: u64,
) -> FirmwareResult<()> {
    let end = offset
        .checked_add(width)
        .ok_or(FirmwareError::OutOfBounds {
            what: "integer",
            offset,
            size: width,
            limit: out.len(),
        })?;
    if out.len() < end {
        out.resize(end, 0);
    }
    put_uint_le(&mut out[offset..end], value);
    Ok(())
}

fn put_uint_le(dst: &mut [u8], value: u64) {
    for (i, byte) in dst.iter_mut().enumerate() {
        *byte = value.checked_shr(8 * i as u32).unwrap_or(0) as u8;
    }
}

/// A fixed-size wire record with a published layout table.
///
/// Implementers must keep `FIELDS` in step with the struct definition, and
/// should implement `Default` with [`FixedRecord::from_layout_defaults`].
pub trait FixedRecord: FromBytes + IntoBytes + Immutable + KnownLayout + Default + Sized {
    /// Name used in error messages.
    const NAME: &'static str;
    const FIELDS: &'static [Field];
    const SIZE: usize = core::mem::size_of::<Self>();

    /// Builds a record from the defaults declared in `FIELDS`.
    ///
    /// A table that does not match the struct size yields an all-zero record.
    fn from_layout_defaults() -> Self {
        layout_defaults(Self::FIELDS)
            .ok()
            .and_then(|bytes| Self::read_from_bytes(&bytes).ok())
            .unwrap_or_else(Self::new_zeroed)
    }

    /// Decodes a record at `offset`, never reading at or past `limit`.
    fn decode_at(buf: &[u8], limit: usize, offset: usize) -> FirmwareResult<Self> {
        let bytes = bounded_slice(buf, limit, offset, Self::SIZE, Self::NAME)?;
        Self::read_from_bytes(bytes).map_err(|_| FirmwareError::OutOfBounds {
            what: Self::NAME,
            offset,
            size: Self::SIZE,
            limit,
        })
    }

    /// Appends exactly `SIZE` bytes to `out`.
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    /// Reads a scalar field by name.
    fn field(&self, name: &str) -> Option<u64> {
        let (offset, field) = field_offset(Self::FIELDS, name)?;
        if !field.kind.is_scalar() {
            return None;
        }
        read_uint_le(self.as_bytes(), Self::SIZE, offset, field.kind.width()).ok()
    }

    /// Writes a scalar field by name, truncating `value` to the field width.
    /// Returns false if there is no such scalar field.
    fn set_field(&mut self, name: &str, value: u64) -> bool {
        match field_offset(Self::FIELDS, name) {
            Some((offset, field)) if field.kind.is_scalar() => {
                let width = field.kind.width();
                match self.as_mut_bytes().get_mut(offset..offset + width) {
                    Some(dst) => {
                        put_uint_le(dst, value);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}
