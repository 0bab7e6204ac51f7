mod cli;
mod commands;
mod rpc;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = format!("kiln_cli={log_level},kiln_store={log_level},kiln_watch={log_level}");
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(env_filter))
        .init();

    let config = kiln_config::Config::load(cli.config.as_deref())?;
    let repo = commands::open_repository(&config)?;

    match cli.command {
        Commands::Ingest { path } => commands::ingest(&config, &repo, &path)?,
        Commands::Watch {
            mode,
            iterations,
            duration_secs,
        } => commands::watch(&config, &repo, mode, iterations, duration_secs)?,
        Commands::Search { query, limit } => commands::search(&repo, &query, limit)?,
        Commands::Semantic { query, limit } => commands::semantic(&repo, &query, limit)?,
        Commands::GetDoc {
            id,
            content,
            max_tokens,
            section,
        } => commands::get_doc(&repo, id, content, max_tokens, section.as_deref())?,
        Commands::Stats => commands::stats(&repo)?,
        Commands::CheckLinks {
            document_id,
            external,
        } => commands::check_links(&repo, document_id, external).await?,
        Commands::Serve => rpc::serve(config, repo).await?,
    }

    Ok(())
}
