use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use tip_common::config::AppConfig;
use tip_telemetry::telemetry::{init_telemetry, shutdown_telemetry};

use crate::pipeline::run_pipeline;

#[derive(Parser)]
#[command(version, name = "tip", about = "Train and evaluate taxi tip regression models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Run the pipeline and write the report")]
    Run {
        #[arg(long, short, help = "A TOML file that overrides the default configuration")]
        config: Option<PathBuf>,
    },
    #[command(about = "Print the effective configuration as JSON")]
    Config {
        #[arg(long, short, help = "A TOML file that overrides the default configuration")]
        config: Option<PathBuf>,
    },
}

pub fn main(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(args);

    match cli.command {
        Command::Run { config } => {
            let config = AppConfig::load_with_file(config.as_deref())?;
            init_telemetry(&config.telemetry)?;
            let output = run_pipeline(&config);
            if let Ok(output) = &output {
                info!("report written to {}", output.path.display());
            }
            shutdown_telemetry();
            println!("{}", output?.report.to_markdown());
        }
        Command::Config { config } => {
            let config = AppConfig::load_with_file(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
