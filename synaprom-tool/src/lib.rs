// Licensed under the Apache-2.0 license

//! Host-side tooling for Synaptics Prometheus firmware containers.
//!
//! The tool can display the chunks of an existing container, pull a single
//! chunk out of it, and build a flashable container from a payload and a TOML
//! descriptor.

pub mod args;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::info;
use synaprom_firmware::{FirmwareDescriptor, ImageRepository, ParseFlags, SynapromFirmware};

use crate::args::{Commands, Input};

pub fn execute(cmd: Commands, out: &mut impl Write) -> Result<()> {
    match cmd {
        Commands::Parse { input } => parse(&input, out),
        Commands::Extract {
            input,
            tag,
            output,
        } => extract(&input, tag, &output, out),
        Commands::Build {
            descriptor,
            payload,
            output,
        } => build(descriptor.as_deref(), &payload, &output, out),
        Commands::Export { input } => export(&input, out),
    }
}

fn load(input: &Input) -> Result<SynapromFirmware> {
    let data = std::fs::read(&input.file)
        .with_context(|| format!("Failed to read {}", input.file.display()))?;
    info!("Loaded {} ({} bytes)", input.file.display(), data.len());

    let flags = ParseFlags {
        strict_footer: input.strict,
    };
    SynapromFirmware::parse_with(&data, input.offset, flags)
        .with_context(|| format!("Failed to parse {}", input.file.display()))
}

fn parse(input: &Input, out: &mut impl Write) -> Result<()> {
    let fw = load(input)?;

    writeln!(out, "=== Prometheus Firmware ===")?;
    writeln!(out)?;
    writeln!(out, "Product ID: 0x{:08X}", fw.product_id())?;
    writeln!(out, "Version:    {}", fw.version().unwrap_or("unknown"))?;
    writeln!(out)?;
    writeln!(out, "Images ({} entries):", fw.images().len())?;
    for img in fw.images() {
        writeln!(
            out,
            "  [0x{:04X}] {:<20} offset 0x{:06X} size 0x{:06X}",
            img.tag,
            img.id.unwrap_or("-"),
            img.offset,
            img.len()
        )?;
    }
    Ok(())
}

fn extract(input: &Input, tag: u16, output: &Path, out: &mut impl Write) -> Result<()> {
    let fw = load(input)?;
    let img = fw
        .image_by_tag(tag)
        .ok_or_else(|| anyhow!("No image with tag 0x{:04X} in {}", tag, input.file.display()))?;
    std::fs::write(output, &img.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    writeln!(
        out,
        "Extracted 0x{:04X} ({} bytes) to {}",
        tag,
        img.len(),
        output.display()
    )?;
    Ok(())
}

fn build(
    descriptor: Option<&Path>,
    payload: &Path,
    output: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let mut fw = SynapromFirmware::new();
    if let Some(path) = descriptor {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        fw.build(&FirmwareDescriptor::from_toml(&contents)?);
    }

    let payload = std::fs::read(payload)
        .with_context(|| format!("Failed to read {}", payload.display()))?;
    fw.set_payload(payload);

    let data = fw.write()?;
    std::fs::write(output, &data)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    writeln!(
        out,
        "Firmware for product 0x{:08X} written to {} ({} bytes)",
        fw.product_id(),
        output.display(),
        data.len()
    )?;
    Ok(())
}

fn export(input: &Input, out: &mut impl Write) -> Result<()> {
    let fw = load(input)?;
    let mut props = BTreeMap::new();
    fw.export(&mut props);
    for (key, value) in &props {
        writeln!(out, "{key} = {value}")?;
    }
    Ok(())
}
