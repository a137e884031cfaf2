use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use ectss_deploy::CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

/// How `addresses` prints a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "ectss")]
#[command(
    author,
    version,
    about = "Deploy and wire the threshold ECDSA verification contracts"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "ECTSS_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the configuration file, or to a directory containing Deploy.toml.
    ///
    /// When the default file does not exist, the built-in network profiles are used.
    #[arg(short, long, global = true, alias = "conf", env = "ECTSS_CONFIG", default_value = CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Deploy every artifact to one or more networks and record their addresses.
    ///
    /// Several networks are deployed concurrently, each with its own address book.
    Deploy {
        /// Target network, as named in the configuration. Repeat for several networks.
        #[arg(short, long = "network", required = true)]
        networks: Vec<String>,

        /// Apply the initialization rules after a successful deployment.
        #[arg(long, env = "ECTSS_INITIALIZE")]
        initialize: bool,
    },

    /// Apply the initialization rules to the contracts recorded for a network.
    Initialize {
        /// Target network.
        #[arg(short, long)]
        network: String,
    },

    /// Print the address book recorded for a network.
    Addresses {
        /// Target network.
        #[arg(short, long)]
        network: String,

        /// Output format.
        #[arg(long, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Write the default configuration.
    InitConfig {
        /// Destination file.
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}
