mod cli;

use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use rawnet::error::RawNetError;
use rawnet::http::url::Url;
use rawnet::{http, Config, HostContext};

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn run(args: cli::Cli) -> Result<(), RawNetError> {
    let url = Url::parse(&args.url)?;
    let host = HostContext::discover(args.interface.as_deref())?;
    let config = Config::default();

    let body = http::fetch(&url, &host, &config)?;

    let output_path = args.output.unwrap_or_else(|| url.output_filename().into());
    std::fs::write(&output_path, &body)?;
    log::info!("wrote {} bytes to {}", body.len(), output_path.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = cli::Cli::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            e.exit_code()
        }
    }
}
