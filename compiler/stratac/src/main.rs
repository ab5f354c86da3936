//! Strata CLI

use stratac::{init_tracing, parse_args, run, CliError, USAGE};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    if options.help {
        println!("{USAGE}");
        return;
    }

    init_tracing();
    match run(&options) {
        Ok(()) => {}
        Err(CliError::Parse(report)) => {
            eprint!("{report}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
