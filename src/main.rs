use clap::Parser;
use pattern_miner::config::Cli;

fn main() {
    let cli = Cli::parse();
    pattern_miner::init_logging(cli.debug);

    if let Err(err) = pattern_miner::run(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
