use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if let Err(err) = pgnbook::cli::run(&args) {
        eprintln!("{}", err);
        process::exit(1);
    }
}
