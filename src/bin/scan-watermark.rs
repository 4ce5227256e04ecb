use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use scan_watermark_removal::{
    default_output_path, AppConfig, Error, ProcessOptions, ProcessResult, WatermarkEngine,
};

#[derive(Parser)]
#[command(
    name = "scan-watermark",
    about = "Remove stamped watermarks from scanned documents",
    version,
    after_help = "Templates and their gravity come from the YAML config:\n\n\
                  masks:\n  - file: masks/footer.png\n    gravity: south\n    foreground: true"
)]
struct Cli {
    /// Input image file or directory
    #[arg(long)]
    src: String,

    /// Output file or directory (default: {name}_cleaned.{ext})
    #[arg(long)]
    dst: Option<String>,

    /// Config file
    #[arg(short, long, default_value = "local.env.yaml")]
    config: PathBuf,

    /// Debug logging level
    #[arg(long)]
    debug: bool,

    /// Write diagnostic images (per-template crop, binary, foreground, mask)
    #[arg(long)]
    visual: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

/// 2 for configuration problems, 1 for everything else.
fn exit_code(err: &Error) -> i32 {
    if err.is_configuration() {
        2
    } else {
        1
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.human {
        builder.init();
    } else {
        builder.json().init();
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = match AppConfig::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Fatal: {}: {e}", cli.config.display());
            process::exit(exit_code(&e));
        }
    };
    config.debug |= cli.debug;
    config.visual |= cli.visual;

    init_logging(&config);

    let engine = match WatermarkEngine::from_config(&config) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Fatal: Failed to initialize engine: {e}");
            process::exit(exit_code(&e));
        }
    };

    let input_path = Path::new(&cli.src);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.src);
        process::exit(1);
    }

    let opts = ProcessOptions {
        diagnostics_dir: config.diagnostics_dir.clone(),
    };

    if !cli.quiet {
        eprintln!(
            "Loaded {} template(s) from {}",
            engine.templates().len(),
            cli.config.display()
        );
    }

    let results = if input_path.is_dir() {
        let output_dir = if let Some(o) = &cli.dst {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: scan-watermark --src <input_dir> --dst <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir, &opts)
    } else {
        let output_path = match &cli.dst {
            Some(o) => PathBuf::from(o),
            None => default_output_path(input_path),
        };
        vec![engine.process_file(input_path, &output_path, &opts)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.quiet);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, quiet: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        match &result.metrics {
            Some(m) => eprintln!(
                "[OK] {filename} (threshold {:.1}{}{}, {} ms)",
                m.threshold,
                if m.has_color { ", color" } else { "" },
                if m.inverted { ", inverted" } else { "" },
                m.total().as_millis()
            ),
            None => eprintln!("[OK] {filename}"),
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}
