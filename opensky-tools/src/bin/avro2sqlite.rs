//! avro2sqlite: OpenSky Avro archives to a SQLite research database.

use clap::Parser;

use opensky_tools::convert::{self, ConvertArgs};
use opensky_tools::{fail, logging, resolve_config};

fn main() {
    logging::init();

    let args = match ConvertArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = resolve_config(args.config.as_deref()).unwrap_or_else(|e| fail(e));
    if let Err(e) = convert::main_with(&args, &config) {
        fail(e);
    }
}
