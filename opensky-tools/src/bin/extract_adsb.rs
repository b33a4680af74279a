//! extract-adsb: keep only the ADS-B records of OpenSky Avro archives.

use clap::Parser;

use opensky_tools::extract::{self, ExtractArgs};
use opensky_tools::{fail, logging, resolve_config};

fn main() {
    logging::init();

    let args = match ExtractArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = resolve_config(args.config.as_deref()).unwrap_or_else(|e| fail(e));
    if let Err(e) = extract::main_with(&args, &config) {
        fail(e);
    }
}
