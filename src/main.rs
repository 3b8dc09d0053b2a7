use clap::Parser;
use log::{error, LevelFilter};
use snafu::ErrorCompat;

mod args;
mod ballotbox;

fn main() {
    let args = args::Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let res = ballotbox::run(&args);

    if let Err(e) = res {
        error!("ballotbox: {:?}", e);
        eprintln!("An error occurred: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
