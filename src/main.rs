use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

mod classify;
mod cli;
mod config;
mod errors;
mod extract;
mod extractors;
mod http;
mod media;
mod normalize;
mod security;
#[cfg(test)]
mod tests;
mod web;

use config::Config;
use extract::MediaExtractor;

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("medialink=info,tower_http=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_extractor(config: &Config) -> anyhow::Result<MediaExtractor> {
    let client = http::ReqwestClient::new(config).context("failed to build http client")?;
    Ok(MediaExtractor::new(Arc::new(client), config))
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    init_logging();

    match args.command {
        cli::Command::Classify { url } => {
            println!("{}", classify::classify(&url));
            Ok(())
        }

        cli::Command::Daemon {} => {
            let config = Config::load_with(&args.config_dir)?;
            web::start_daemon(config)
        }

        cli::Command::Extract { url } => {
            let config = Config::load_with(&args.config_dir)?;
            let extractor = build_extractor(&config)?;

            let extraction = runtime()?.block_on(extractor.extract(&url));
            let response = web::ExtractResponse::from(extraction);

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }

        cli::Command::Batch { urls } => {
            let config = Config::load_with(&args.config_dir)?;
            let extractor = build_extractor(&config)?;

            let result = runtime()?.block_on(extractor.extract_batch(urls));
            let response = web::BatchResponse::from(result);

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}
