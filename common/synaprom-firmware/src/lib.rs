// Licensed under the Apache-2.0 license

//! Codec for the update container used by Synaptics Prometheus fingerprint
//! sensors.
//!
//! A container is a sequence of tagged chunks followed by a 256 byte
//! signature. The firmware header chunk carries the product id and version of
//! the firmware; the payload chunk carries the image that is flashed.
//!
//! Parsing treats its input as untrusted: every read is bounds checked and
//! malformed input is rejected with a [`FirmwareError`]. The signature is
//! never verified and is written as filler.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod firmware;
pub mod image;
pub mod protocol;

pub use descriptor::{DescriptorSource, FirmwareDescriptor};
pub use error::{FirmwareError, FirmwareResult};
pub use firmware::{ParseFlags, SynapromFirmware};
pub use image::{ExportSink, ImageRepository, SubImage};
