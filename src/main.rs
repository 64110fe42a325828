use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use tuned_viewer::cli::{Cli, Commands};
use tuned_viewer::config::{self, ConfigManager};
use tuned_viewer::profile::{self, ProfileManager, SearchRoots};

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_manager = ConfigManager::new()?;
    let mut config = config_manager.load()?;

    if let Commands::Config(args) = cli.command {
        config::handle_config(args.command, &config_manager, &mut config, &cli.directories)?;
        return Ok(ExitCode::SUCCESS);
    }

    let roots = SearchRoots::new(config.search_roots(&cli.directories));
    let manager = ProfileManager::new(&roots);

    match cli.command {
        Commands::List(args) => profile::handle_list(args, &manager, &config)?,
        Commands::Show(args) => profile::handle_show(args, &manager, &config)?,
        Commands::Hierarchy(args) => profile::handle_hierarchy(args, &manager)?,
        Commands::Validate(args) => {
            if !profile::handle_validate(args, &manager)? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Config(_) => {}
    }
    Ok(ExitCode::SUCCESS)
}
