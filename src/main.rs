use anyhow::Result;
use clap::Parser;

use cli_interface::{format_cache_table, format_predictions, CacheCommand, Cli, Command};
use config::ConfigManager;
use opinionlens::OpinionLens;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port } => {
            let app = OpinionLens::new(cli.config).await?;
            app.serve(host, port).await?;
            app.shutdown();
        }
        Command::Cache {
            command: CacheCommand::List,
        } => {
            let config_manager = ConfigManager::new(cli.config)?;
            let rows = OpinionLens::cache_rows(config_manager.settings())?;
            print!("{}", format_cache_table(&rows));
        }
        Command::Predict { text } => {
            let app = OpinionLens::new(cli.config).await?;
            let sentiments = app.predict(&text).await?;
            print!("{}", format_predictions(&text, &sentiments));
            app.shutdown();
        }
    }

    Ok(())
}
