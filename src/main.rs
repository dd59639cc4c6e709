//! # mzspeclib
//!
//! Command-line tool for mzSpecLib spectral libraries.
//!
//! ## Supported Input Formats
//!
//! - **mzSpecLib text and JSON**
//! - **MSP**: NIST-style flat text, optionally gzipped
//! - **BiblioSpec** (`.blib`) and **EncyclopeDIA** (`.dlib`, `.elib`)
//! - **DIA-NN** and **Spectronaut** TSV libraries
//!
//! ## Usage
//!
//! ```bash
//! # Convert an MSP library to mzSpecLib text
//! mzspeclib convert library.msp library.mzlib.txt
//!
//! # Validate against the peptide profile
//! mzspeclib validate library.mzlib.txt --profile peptide
//!
//! # Build the side index and fetch one spectrum through it
//! mzspeclib index library.mzlib.txt
//! mzspeclib describe library.mzlib.txt --key 42
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::{dispatch, init_logging, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbosity());
    dispatch(cli)
}
