use std::env::var;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, EnvFilter};

use repofill::cli::Args;
use repofill::net::DirNetwork;
use repofill::Driver;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup(&args)?;

    let network = DirNetwork::new(&args.network, &args.repo);
    let driver = Driver::new(network, args.config());
    let report = driver.run(&args.names).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for failed in report.failures.iter() {
            println!("{}", failed);
        }
    }

    Ok(())
}

fn setup(args: &Args) -> Result<()> {
    let directives = match var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => args.log_directives().to_owned(),
    };

    registry()
        .with(EnvFilter::builder().parse(directives)?)
        .with(layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
