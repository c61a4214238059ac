// SPDX-FileCopyrightText: 2025 The vita49-rs Authors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Example program that listens for a radio's discovery advertisement and
prints its address.
*/

use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

#[derive(Parser, Debug)]
struct Args {
    /// How long to listen for a discovery advertisement before giving up.
    #[arg(short, long, default_value_t = 5)]
    timeout_secs: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("listening on port {} for {}s...", waveform_rt::DISCOVERY_PORT, args.timeout_secs);
    match waveform_rt::discover(Duration::from_secs(args.timeout_secs)) {
        Ok(addr) => {
            println!("{addr}");
            Ok(())
        }
        Err(e) => {
            error!("no radio discovered: {e}");
            Err(e.into())
        }
    }
}
