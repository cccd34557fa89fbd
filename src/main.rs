use clap::Parser;
use snafu::ErrorCompat;

mod args;
mod tally;

fn main() {
    let args = args::Args::parse();
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    if let Err(e) = tally::run_tally(args.config, args.out, args.reference) {
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
