// Licensed under the Apache-2.0 license

//! Sub-images and the collaborator traits a container is built on.

use crate::error::{FirmwareError, FirmwareResult};
use crate::protocol::tag_to_id;
use std::collections::BTreeMap;

/// The body of one chunk, keyed by its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubImage {
    pub tag: u16,
    /// Name of a well-known tag, `None` for anything else.
    pub id: Option<&'static str>,
    /// Offset of the body within the parsed blob.
    pub offset: usize,
    pub bytes: Vec<u8>,
}

impl SubImage {
    pub fn new(tag: u16, bytes: Vec<u8>) -> Self {
        SubImage {
            tag,
            id: tag_to_id(tag),
            offset: 0,
            bytes,
        }
    }

    pub fn with_offset(self, offset: usize) -> Self {
        SubImage { offset, ..self }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Bytes overwritten in the payload when it is written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

/// Storage of sub-images and the payload they are written from.
pub trait ImageRepository {
    /// Adds an image. Tags are unique within a repository.
    fn add_image(&mut self, image: SubImage) -> FirmwareResult<()>;

    fn image_by_tag(&self, tag: u16) -> Option<&SubImage>;

    /// The payload with every registered patch applied.
    fn patched_bytes(&self) -> FirmwareResult<Vec<u8>>;
}

/// Applies `patches` in order to a copy of `payload`.
pub fn apply_patches(payload: &[u8], patches: &[Patch]) -> FirmwareResult<Vec<u8>> {
    let mut out = payload.to_vec();
    for patch in patches {
        let dst = patch
            .offset
            .checked_add(patch.bytes.len())
            .and_then(|end| out.get_mut(patch.offset..end))
            .ok_or_else(|| {
                FirmwareError::PayloadUnavailable(format!(
                    "patch of 0x{:x} bytes @0x{:x} larger than payload of 0x{:x} bytes",
                    patch.bytes.len(),
                    patch.offset,
                    payload.len()
                ))
            })?;
        dst.copy_from_slice(&patch.bytes);
    }
    Ok(out)
}

/// Write-only destination for diagnostic key/value output.
pub trait ExportSink {
    fn insert_hex(&mut self, key: &str, value: u64);
}

impl ExportSink for BTreeMap<String, String> {
    fn insert_hex(&mut self, key: &str, value: u64) {
        self.insert(key.to_string(), format!("0x{:x}", value));
    }
}
