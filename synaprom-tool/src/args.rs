// Licensed under the Apache-2.0 license

//! The arguments for the operations synaprom-tool supports.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use clap_num::maybe_hex;

/// A container file to read.
#[derive(Args, Debug, Clone)]
pub struct Input {
    /// The firmware container.
    pub file: PathBuf,

    /// Offset of the first chunk within the file.
    #[arg(long, value_parser = maybe_hex::<usize>, default_value_t = 0)]
    pub offset: usize,

    /// Reject chunks that run into the signature region.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse a container and display its contents
    Parse {
        #[command(flatten)]
        input: Input,
    },

    /// Write the body of one chunk to a file
    Extract {
        #[command(flatten)]
        input: Input,

        /// Tag of the chunk to extract, e.g. 0x0002 for the firmware payload
        #[arg(long, value_parser = maybe_hex::<u16>)]
        tag: u16,

        /// Output file path
        #[arg(long, value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Build a container from a descriptor and a payload
    Build {
        /// TOML descriptor, e.g. `product_id = "0x41"`
        #[arg(long, value_name = "DESCRIPTOR")]
        descriptor: Option<PathBuf>,

        /// Firmware payload to embed
        #[arg(long, value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Output file path
        #[arg(long, value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Display the diagnostic properties of a container
    Export {
        #[command(flatten)]
        input: Input,
    },
}
