use clap::Parser;
use ram_forecast::api::{Cli, run_cli};

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    match run_cli(&cli) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Forecast error: {e}");
            std::process::exit(1);
        }
    }
}
