//! Remove configured watermarks from a single scan.
//!
//! Usage:
//! ```sh
//! cargo run --example remove_watermark -- local.env.yaml input.jpg output.jpg
//! ```

use std::env;
use std::path::Path;
use std::process;

use scan_watermark_removal::{AppConfig, ProcessOptions, WatermarkEngine};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <config> <input> <output>", args[0]);
        process::exit(1);
    }

    let config = AppConfig::from_file(Path::new(&args[1])).expect("failed to load config");
    let engine = WatermarkEngine::from_config(&config).expect("failed to load templates");
    let result = engine.process_file(
        args[2].as_ref(),
        args[3].as_ref(),
        &ProcessOptions::default(),
    );

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
