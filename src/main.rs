use anyhow::Result;
use clap::{crate_version, App, Arg};
use posthaste::build::build_site;
use posthaste::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let matches = App::new("posthaste")
        .version(crate_version!())
        .about("Builds page sources, static assets and an RSS feed for a Markdown blog")
        .arg(
            Arg::with_name("project")
                .short("p")
                .long("project")
                .value_name("DIR")
                .help("The project directory (defaults to the current directory)")
                .takes_value(true),
        )
        .get_matches();

    let project = match matches.value_of("project") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let config = Config::from_directory(&project)?;
    build_site(&config)?;
    Ok(())
}
