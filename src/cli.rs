use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::profile::OutputKind;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Inspect the effective configuration of tuned profiles without applying it",
    propagate_version = true
)]
pub struct Cli {
    /// Profile directories to search, highest precedence first
    #[arg(long, global = true, num_args = 1..)]
    pub directories: Vec<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List available profiles
    List(ListArgs),
    /// Show the merged profile configuration
    Show(ShowArgs),
    /// Show the include hierarchy of a profile
    Hierarchy(HierarchyArgs),
    /// Validate the include hierarchy of a profile
    Validate(ValidateArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = ListFormat::Text)]
    pub format: ListFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub name: String,
    /// Defaults to the configured output format
    #[arg(long, value_enum)]
    pub format: Option<OutputKind>,
}

#[derive(Debug, Args)]
pub struct HierarchyArgs {
    pub name: String,
    #[arg(long, value_enum, default_value_t = OutputKind::Summary)]
    pub format: OutputKind,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    pub name: String,
    #[arg(long, value_enum, default_value_t = OutputKind::Summary)]
    pub format: OutputKind,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Show,
    Paths,
    Reset,
}
