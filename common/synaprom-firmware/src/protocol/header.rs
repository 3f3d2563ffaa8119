// Licensed under the Apache-2.0 license

use crate::codec::{Field, FixedRecord};
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Firmware (MFW) update header, carries an [`MfwHeader`].
pub const TAG_MFW_HEADER: u16 = 0x0001;
/// Firmware (MFW) update payload.
pub const TAG_MFW_PAYLOAD: u16 = 0x0002;
/// Configuration update header.
pub const TAG_CFG_HEADER: u16 = 0x0003;
/// Configuration update payload.
pub const TAG_CFG_PAYLOAD: u16 = 0x0004;

/// Only the low 12 bits of a tag are used; tags at or above this are reserved.
pub const TAG_MAX: u16 = 0xfff0;

/// Size of the signature region at the end of every container.
pub const SIGNATURE_SIZE: usize = 0x100;

/// Filler written in place of the signature.
pub const SIGNATURE_FILL: u8 = 0xff;

/// Upper bound on the number of chunks in one container.
pub const MAX_CHUNKS: usize = 64;

/// Human-readable name of a well-known tag.
pub fn tag_to_id(tag: u16) -> Option<&'static str> {
    match tag {
        TAG_MFW_HEADER => Some("mfw-update-header"),
        TAG_MFW_PAYLOAD => Some("mfw-update-payload"),
        TAG_CFG_HEADER => Some("cfg-update-header"),
        TAG_CFG_PAYLOAD => Some("cfg-update-payload"),
        _ => None,
    }
}

/// Header preceding every chunk in the container.
///
/// Layout:
/// - Bytes 0:1 - tag (u16 LE)
/// - Bytes 2:5 - length of the body that follows (u32 LE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct ChunkHeader {
    pub tag: U16,
    pub length: U32,
}

impl ChunkHeader {
    pub fn new(tag: u16, length: u32) -> Self {
        ChunkHeader {
            tag: U16::new(tag),
            length: U32::new(length),
        }
    }

    pub fn tag(&self) -> u16 {
        self.tag.get()
    }

    pub fn length(&self) -> u32 {
        self.length.get()
    }
}

impl Default for ChunkHeader {
    fn default() -> Self {
        Self::from_layout_defaults()
    }
}

impl FixedRecord for ChunkHeader {
    const NAME: &'static str = "chunk header";
    const FIELDS: &'static [Field] = &[Field::u16le("tag"), Field::u32le("bufsz")];
}

/// Metadata stored in the body of the [`TAG_MFW_HEADER`] chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct MfwHeader {
    pub product: U32,
    /// Unique id used for compatibility verification.
    pub id: U32,
    /// Unix time of the build.
    pub build_time: U32,
    pub build_number: U32,
    pub version_major: u8,
    pub version_minor: u8,
    pub reserved: [u8; 6],
}

impl MfwHeader {
    pub fn new(product: u32) -> Self {
        MfwHeader {
            product: U32::new(product),
            ..Default::default()
        }
    }

    pub fn product(&self) -> u32 {
        self.product.get()
    }

    /// The `major.minor` version string.
    pub fn version(&self) -> String {
        format!("{}.{}", self.version_major, self.version_minor)
    }
}

impl Default for MfwHeader {
    fn default() -> Self {
        Self::from_layout_defaults()
    }
}

impl FixedRecord for MfwHeader {
    const NAME: &'static str = "mfw header";
    const FIELDS: &'static [Field] = &[
        Field::u32le("product"),
        Field::u32le("id").with_default(0xff),
        Field::u32le("buildtime").with_default(0xff),
        Field::u32le("buildnum").with_default(0xff),
        Field::u8("vmajor").with_default(10),
        Field::u8("vminor").with_default(1),
        Field::bytes("unused", 6),
    ];
}
