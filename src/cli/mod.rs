use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod config;
mod convert;
mod describe;
mod index;
mod validate;

pub use config::Config;

/// mzspeclib - read, convert, index and validate spectral libraries
#[derive(Parser)]
#[command(name = "mzspeclib")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Output serialization for `convert`
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// mzSpecLib text
    Text,
    /// mzSpecLib JSON
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert any readable library to mzSpecLib text or JSON
    Convert {
        /// Input library (text, JSON, MSP, BiblioSpec, EncyclopeDIA, DIA-NN or Spectronaut)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Output format (inferred from the output extension when omitted)
        #[arg(short = 'f', long, value_enum)]
        format: Option<OutputFormat>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Validate a library against a rule profile
    Validate {
        /// Input library
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Profile name (base, peptide, silver, gold or one from --profiles)
        #[arg(short = 'p', long)]
        profile: Option<String>,

        /// JSON term table merged over the built-in terms
        #[arg(long, value_name = "FILE")]
        ontology: Option<PathBuf>,

        /// TOML file with extra profile definitions
        #[arg(long = "profiles", value_name = "FILE")]
        profiles_file: Option<PathBuf>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Build or refresh the random-access index of a text or JSON library
    Index {
        /// Input library
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Rebuild even when the saved index is current
        #[arg(long)]
        force: bool,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Summarize a library, or print one spectrum
    Describe {
        /// Input library
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Print the spectrum with this key, read through the index
        #[arg(short = 'k', long)]
        key: Option<u64>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Convert {
            input,
            output,
            format,
            config,
        } => convert::run(input, output, format, Config::load(config.as_deref())?),
        Commands::Validate {
            input,
            profile,
            ontology,
            profiles_file,
            config,
        } => validate::run(
            input,
            profile,
            ontology,
            profiles_file,
            Config::load(config.as_deref())?,
        ),
        Commands::Index {
            input,
            force,
            config,
        } => index::run(input, force, Config::load(config.as_deref())?),
        Commands::Describe { input, key, config } => {
            describe::run(input, key, Config::load(config.as_deref())?)
        }
    }
}
