// Licensed under the Apache-2.0 license

//! The Prometheus update container.
//!
//! ```text
//! ContainerFile := Chunk* Signature
//! Chunk         := tag:u16le length:u32le body:u8[length]
//! Signature     := u8[256]
//! ```

use crate::codec::{bounded_slice, FixedRecord};
use crate::descriptor::DescriptorSource;
use crate::error::{FirmwareError, FirmwareResult};
use crate::image::{apply_patches, ExportSink, ImageRepository, Patch, SubImage};
use crate::protocol::{
    tag_to_id, ChunkHeader, MfwHeader, MAX_CHUNKS, SIGNATURE_FILL, SIGNATURE_SIZE, TAG_MAX,
    TAG_MFW_HEADER, TAG_MFW_PAYLOAD,
};
use log::{debug, trace};

/// Options controlling how strictly a blob is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseFlags {
    /// Reject chunks whose body runs into the signature region. By default a
    /// chunk body is only bounded by the end of the blob.
    pub strict_footer: bool,
}

/// A decoded Prometheus firmware container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynapromFirmware {
    product_id: u32,
    version: Option<String>,
    metadata: MfwHeader,
    images: Vec<SubImage>,
    payload: Option<Vec<u8>>,
    patches: Vec<Patch>,
}

impl SynapromFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a container starting at `offset`, with the default flags.
    pub fn parse(buf: &[u8], offset: usize) -> FirmwareResult<Self> {
        Self::parse_with(buf, offset, ParseFlags::default())
    }

    pub fn parse_with(buf: &[u8], offset: usize, flags: ParseFlags) -> FirmwareResult<Self> {
        let mut firmware = Self::new();
        firmware.parse_chunks(buf, offset, flags)?;
        Ok(firmware)
    }

    fn parse_chunks(
        &mut self,
        buf: &[u8],
        mut offset: usize,
        flags: ParseFlags,
    ) -> FirmwareResult<()> {
        // 256 byte signature as footer
        let min = SIGNATURE_SIZE + ChunkHeader::SIZE;
        if buf.len() < min {
            return Err(FirmwareError::TooSmall {
                size: buf.len(),
                min,
            });
        }
        let limit = buf.len() - SIGNATURE_SIZE;

        let mut count = 0;
        while offset < limit {
            let hdr = ChunkHeader::decode_at(buf, limit, offset)?;
            let tag = hdr.tag();
            if tag >= TAG_MAX {
                return Err(FirmwareError::TagTooLarge(tag));
            }
            if self.image_by_tag(tag).is_some() {
                return Err(FirmwareError::DuplicateTag(tag));
            }
            let length = hdr.length() as usize;
            if length == 0 {
                return Err(FirmwareError::EmptyChunk(tag));
            }

            // decode_at guarantees the header ends before limit
            offset += ChunkHeader::SIZE;
            let body = bounded_slice(buf, buf.len(), offset, length, "chunk body")?;
            let end = offset + length;
            if flags.strict_footer && end > limit {
                return Err(FirmwareError::ChunkOverlapsFooter { tag, end, limit });
            }

            debug!(
                "adding 0x{:04x} ({}) with size 0x{:04x}",
                tag,
                tag_to_id(tag).unwrap_or("unknown"),
                length
            );
            self.add_image(SubImage::new(tag, body.to_vec()).with_offset(offset))?;

            if tag == TAG_MFW_HEADER {
                let metadata = MfwHeader::decode_at(buf, limit, offset)?;
                trace!("mfw header: {:?}", metadata);
                self.product_id = metadata.product();
                self.version = Some(metadata.version());
                self.metadata = metadata;
            }

            count += 1;
            if count > MAX_CHUNKS {
                return Err(FirmwareError::TooManyChunks(MAX_CHUNKS));
            }

            offset = end;
        }
        Ok(())
    }

    /// Serializes the firmware header, the payload and a placeholder signature.
    ///
    /// Only the header/payload pair is emitted; other parsed sub-images are not.
    pub fn write(&self) -> FirmwareResult<Vec<u8>> {
        let payload = self.patched_bytes()?;
        let payload_len = u32::try_from(payload.len()).map_err(|_| {
            FirmwareError::PayloadUnavailable(format!(
                "payload of 0x{:x} bytes does not fit in a chunk",
                payload.len()
            ))
        })?;

        let mut buf = Vec::with_capacity(
            2 * ChunkHeader::SIZE + MfwHeader::SIZE + payload.len() + SIGNATURE_SIZE,
        );

        // add header
        let mut metadata = self.metadata;
        metadata.product.set(self.product_id);
        ChunkHeader::new(TAG_MFW_HEADER, MfwHeader::SIZE as u32).encode_into(&mut buf);
        metadata.encode_into(&mut buf);

        // add payload
        ChunkHeader::new(TAG_MFW_PAYLOAD, payload_len).encode_into(&mut buf);
        buf.extend_from_slice(&payload);

        // add signature
        buf.resize(buf.len() + SIGNATURE_SIZE, SIGNATURE_FILL);
        Ok(buf)
    }

    /// Sets properties from a declarative description.
    ///
    /// A `product_id` that does not fit in 32 bits is ignored.
    pub fn build(&mut self, source: &impl DescriptorSource) {
        if let Some(product_id) = source
            .query_u64("product_id")
            .and_then(|v| u32::try_from(v).ok())
        {
            self.product_id = product_id;
        }
    }

    /// Emits the diagnostic properties of this container.
    pub fn export(&self, sink: &mut impl ExportSink) {
        if self.product_id != 0 {
            sink.insert_hex("product_id", u64::from(self.product_id));
        }
    }

    pub fn product_id(&self) -> u32 {
        self.product_id
    }

    pub fn set_product_id(&mut self, product_id: u32) {
        self.product_id = product_id;
    }

    /// The `major.minor` version, once a firmware header has been parsed.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Sets the version written to the firmware header from `major.minor`
    /// text, each part being a decimal number up to 255.
    pub fn set_version(&mut self, version: &str) -> FirmwareResult<()> {
        let invalid = || FirmwareError::InvalidVersion(version.to_string());
        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;
        let major: u8 = major.parse().map_err(|_| invalid())?;
        let minor: u8 = minor.parse().map_err(|_| invalid())?;

        self.metadata.set_field("vmajor", u64::from(major));
        self.metadata.set_field("vminor", u64::from(minor));
        self.version = Some(self.metadata.version());
        Ok(())
    }

    /// The firmware header as last parsed, or its defaults.
    pub fn metadata(&self) -> &MfwHeader {
        &self.metadata
    }

    /// Sub-images in stream order.
    pub fn images(&self) -> &[SubImage] {
        &self.images
    }

    pub fn image_by_id(&self, id: &str) -> Option<&SubImage> {
        self.images.iter().find(|img| img.id == Some(id))
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = Some(payload);
    }

    /// Registers bytes to overwrite in the payload when writing.
    pub fn add_patch(&mut self, offset: usize, bytes: Vec<u8>) {
        self.patches.push(Patch { offset, bytes });
    }
}

impl ImageRepository for SynapromFirmware {
    fn add_image(&mut self, image: SubImage) -> FirmwareResult<()> {
        if image.tag >= TAG_MAX {
            return Err(FirmwareError::TagTooLarge(image.tag));
        }
        if self.image_by_tag(image.tag).is_some() {
            return Err(FirmwareError::DuplicateTag(image.tag));
        }
        self.images.push(image);
        Ok(())
    }

    fn image_by_tag(&self, tag: u16) -> Option<&SubImage> {
        self.images.iter().find(|img| img.tag == tag)
    }

    fn patched_bytes(&self) -> FirmwareResult<Vec<u8>> {
        let payload = self
            .payload
            .as_deref()
            .ok_or_else(|| FirmwareError::PayloadUnavailable("no payload set".to_string()))?;
        apply_patches(payload, &self.patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{TAG_CFG_HEADER, TAG_CFG_PAYLOAD};
    use std::collections::BTreeMap;
    use zerocopy::IntoBytes;

    fn chunk(buf: &mut Vec<u8>, tag: u16, body: &[u8]) {
        ChunkHeader::new(tag, body.len() as u32).encode_into(buf);
        buf.extend_from_slice(body);
    }

    fn footer(buf: &mut Vec<u8>) {
        buf.extend_from_slice(&[SIGNATURE_FILL; SIGNATURE_SIZE]);
    }

    fn mfw_body(product: u32, major: u8, minor: u8) -> Vec<u8> {
        let mut hdr = MfwHeader::new(product);
        hdr.version_major = major;
        hdr.version_minor = minor;
        hdr.as_bytes().to_vec()
    }

    #[test]
    fn test_parse_all_known_tags() {
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_MFW_HEADER, &mfw_body(0x41, 10, 2));
        chunk(&mut buf, TAG_MFW_PAYLOAD, b"mfw payload");
        chunk(&mut buf, TAG_CFG_HEADER, &[0x11; 8]);
        chunk(&mut buf, TAG_CFG_PAYLOAD, b"cfg");
        footer(&mut buf);

        let fw = SynapromFirmware::parse(&buf, 0).unwrap();
        assert_eq!(fw.product_id(), 0x41);
        assert_eq!(fw.version(), Some("10.2"));

        let tags: Vec<u16> = fw.images().iter().map(|img| img.tag).collect();
        assert_eq!(
            tags,
            vec![TAG_MFW_HEADER, TAG_MFW_PAYLOAD, TAG_CFG_HEADER, TAG_CFG_PAYLOAD]
        );

        let payload = fw.image_by_tag(TAG_MFW_PAYLOAD).unwrap();
        assert_eq!(payload.bytes, b"mfw payload");
        assert_eq!(payload.offset, 6 + 24 + 6);
        assert_eq!(fw.image_by_id("cfg-update-payload").unwrap().bytes, b"cfg");
        assert!(fw.payload().is_none());
    }

    #[test]
    fn test_parse_start_offset() {
        let mut buf = vec![0xEE; 5];
        chunk(&mut buf, TAG_CFG_PAYLOAD, &[1, 2, 3]);
        footer(&mut buf);

        let fw = SynapromFirmware::parse(&buf, 5).unwrap();
        assert_eq!(fw.images().len(), 1);
        assert_eq!(fw.images()[0].offset, 11);
    }

    #[test]
    fn test_parse_without_header_chunk() {
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_MFW_PAYLOAD, &[0xAB; 16]);
        footer(&mut buf);

        let fw = SynapromFirmware::parse(&buf, 0).unwrap();
        assert_eq!(fw.product_id(), 0);
        assert_eq!(fw.version(), None);
    }

    #[test]
    fn test_parse_unknown_tag_has_no_id() {
        let mut buf = Vec::new();
        chunk(&mut buf, 0x0123, &[0xAB]);
        footer(&mut buf);

        let fw = SynapromFirmware::parse(&buf, 0).unwrap();
        assert_eq!(fw.images()[0].id, None);
    }

    #[test]
    fn test_parse_too_small() {
        let buf = vec![0u8; SIGNATURE_SIZE + ChunkHeader::SIZE - 1];
        assert_eq!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::TooSmall {
                size: 261,
                min: 262
            })
        );
    }

    #[test]
    fn test_parse_tag_too_large() {
        let mut buf = Vec::new();
        chunk(&mut buf, 0xfff0, &[0]);
        footer(&mut buf);
        assert_eq!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::TagTooLarge(0xfff0))
        );
    }

    #[test]
    fn test_parse_duplicate_tag() {
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_CFG_HEADER, &[0]);
        chunk(&mut buf, TAG_CFG_HEADER, &[1]);
        footer(&mut buf);
        assert_eq!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::DuplicateTag(TAG_CFG_HEADER))
        );
    }

    #[test]
    fn test_parse_empty_chunk() {
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_MFW_PAYLOAD, &[]);
        chunk(&mut buf, TAG_CFG_PAYLOAD, &[0; 32]);
        footer(&mut buf);
        assert_eq!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::EmptyChunk(TAG_MFW_PAYLOAD))
        );
    }

    #[test]
    fn test_parse_truncated_header_before_footer() {
        // three bytes left before the footer, not enough for a chunk header
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_CFG_PAYLOAD, &[0]);
        buf.extend_from_slice(&[0x02, 0x00, 0x01]);
        footer(&mut buf);
        assert!(matches!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::OutOfBounds {
                what: "chunk header",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_body_past_end_of_blob() {
        let mut buf = Vec::new();
        ChunkHeader::new(TAG_MFW_PAYLOAD, 0xFFFF_FFFF).encode_into(&mut buf);
        footer(&mut buf);
        assert!(matches!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::OutOfBounds {
                what: "chunk body",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_body_into_footer() {
        let mut buf = Vec::new();
        ChunkHeader::new(TAG_MFW_PAYLOAD, 16).encode_into(&mut buf);
        buf.extend_from_slice(&[0xAB; 8]);
        footer(&mut buf);

        // compatible mode accepts a body that swallows part of the signature
        let fw = SynapromFirmware::parse(&buf, 0).unwrap();
        assert_eq!(fw.images()[0].bytes.len(), 16);
        assert_eq!(fw.images()[0].bytes[8..], [SIGNATURE_FILL; 8]);

        let flags = ParseFlags {
            strict_footer: true,
        };
        assert_eq!(
            SynapromFirmware::parse_with(&buf, 0, flags),
            Err(FirmwareError::ChunkOverlapsFooter {
                tag: TAG_MFW_PAYLOAD,
                end: 22,
                limit: 14
            })
        );
    }

    #[test]
    fn test_parse_short_mfw_header() {
        // header chunk declares fewer bytes than the record and runs into the footer
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_MFW_HEADER, &[0x01, 0x02, 0x03, 0x04]);
        footer(&mut buf);
        assert!(matches!(
            SynapromFirmware::parse(&buf, 0),
            Err(FirmwareError::OutOfBounds {
                what: "mfw header",
                ..
            })
        ));
    }

    #[test]
    fn test_write_layout() {
        let mut fw = SynapromFirmware::new();
        fw.set_product_id(0x0102_0304);
        fw.set_payload(vec![0xCA, 0xFE]);

        let buf = fw.write().unwrap();
        assert_eq!(buf.len(), 6 + 24 + 6 + 2 + SIGNATURE_SIZE);
        assert_eq!(&buf[..6], &[0x01, 0x00, 24, 0, 0, 0]);
        assert_eq!(&buf[6..10], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[10..22], &[0xFF, 0, 0, 0, 0xFF, 0, 0, 0, 0xFF, 0, 0, 0]);
        assert_eq!(&buf[22..30], &[10, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&buf[30..36], &[0x02, 0x00, 2, 0, 0, 0]);
        assert_eq!(&buf[36..38], &[0xCA, 0xFE]);
        assert!(buf[38..].iter().all(|b| *b == SIGNATURE_FILL));
    }

    #[test]
    fn test_write_applies_patches() {
        let mut fw = SynapromFirmware::new();
        fw.set_payload(vec![0; 4]);
        fw.add_patch(2, vec![0x55]);

        let buf = fw.write().unwrap();
        assert_eq!(&buf[36..40], &[0, 0, 0x55, 0]);
    }

    #[test]
    fn test_write_without_payload() {
        let fw = SynapromFirmware::new();
        assert!(matches!(
            fw.write(),
            Err(FirmwareError::PayloadUnavailable(_))
        ));
    }

    #[test]
    fn test_write_does_not_echo_other_images() {
        let mut buf = Vec::new();
        chunk(&mut buf, TAG_MFW_HEADER, &mfw_body(7, 1, 2));
        chunk(&mut buf, TAG_CFG_HEADER, &[0x33; 4]);
        footer(&mut buf);

        let mut fw = SynapromFirmware::parse(&buf, 0).unwrap();
        fw.set_payload(vec![0x99]);
        let out = SynapromFirmware::parse(&fw.write().unwrap(), 0).unwrap();
        assert!(out.image_by_tag(TAG_CFG_HEADER).is_none());
        assert_eq!(out.image_by_tag(TAG_MFW_PAYLOAD).unwrap().bytes, vec![0x99]);
        // parsed header fields other than the product are written back
        assert_eq!(out.version(), Some("1.2"));
        assert_eq!(out.product_id(), 7);
    }

    #[test]
    fn test_set_version_is_written() {
        let mut fw = SynapromFirmware::new();
        fw.set_version("3.7").unwrap();
        assert_eq!(fw.version(), Some("3.7"));
        fw.set_payload(vec![1]);

        let buf = fw.write().unwrap();
        assert_eq!(&buf[22..24], &[3, 7]);
        let out = SynapromFirmware::parse(&buf, 0).unwrap();
        assert_eq!(out.version(), Some("3.7"));
        assert_eq!(out.metadata().version_major, 3);
        assert_eq!(out.metadata().version_minor, 7);
    }

    #[test]
    fn test_set_version_rejects_malformed() {
        let mut fw = SynapromFirmware::new();
        for text in ["", "3", "3.", ".7", "3.7.1", "256.0", "a.b", "-1.2"] {
            assert_eq!(
                fw.set_version(text),
                Err(FirmwareError::InvalidVersion(text.to_string())),
                "{text}"
            );
        }
        // the header is left untouched
        assert_eq!(fw.version(), None);
        assert_eq!(fw.metadata().version(), "10.1");
    }

    #[test]
    fn test_add_image_rejects_duplicates() {
        let mut fw = SynapromFirmware::new();
        fw.add_image(SubImage::new(TAG_CFG_PAYLOAD, vec![1])).unwrap();
        assert_eq!(
            fw.add_image(SubImage::new(TAG_CFG_PAYLOAD, vec![2])),
            Err(FirmwareError::DuplicateTag(TAG_CFG_PAYLOAD))
        );
        assert_eq!(
            fw.add_image(SubImage::new(0xffff, vec![2])),
            Err(FirmwareError::TagTooLarge(0xffff))
        );
    }

    #[test]
    fn test_export() {
        let mut map = BTreeMap::new();
        SynapromFirmware::new().export(&mut map);
        assert!(map.is_empty());

        let mut fw = SynapromFirmware::new();
        fw.set_product_id(0x41);
        fw.export(&mut map);
        assert_eq!(map.get("product_id").map(String::as_str), Some("0x41"));
    }
}
