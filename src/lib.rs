//! Remove stamped watermarks from scanned documents.
//!
//! Each configured template describes one stamp at a gravity-anchored
//! position. For every scan the crate normalizes polarity, picks an adaptive
//! binarization threshold, builds one mask per template (optionally sparing
//! pixels that look like text), unions the masks and inpaints the result.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use scan_watermark_removal::{AppConfig, WatermarkEngine};
//!
//! let config = AppConfig::from_file(Path::new("local.env.yaml")).expect("bad config");
//! let engine = WatermarkEngine::from_config(&config).expect("failed to load templates");
//! let img = image::open("scan.jpg").unwrap().to_rgb8();
//! let out = engine.run(&img).expect("pipeline failed");
//! out.image.save("cleaned.jpg").unwrap();
//! ```
//!
//! # Masks only
//!
//! ```no_run
//! use std::path::PathBuf;
//! use scan_watermark_removal::{Gravity, MaskSpec, PipelineOptions, Template, WatermarkEngine};
//!
//! let spec = MaskSpec {
//!     file: PathBuf::from("masks/footer.png"),
//!     gravity: Gravity::South,
//!     foreground: true,
//! };
//! let engine = WatermarkEngine::new(vec![Template::load(&spec).unwrap()], PipelineOptions::default());
//! let img = image::open("scan.jpg").unwrap().to_rgb8();
//! let masked = engine.compute_mask(&img).unwrap();
//! println!("threshold {:.1}", masked.metrics.threshold);
//! ```

#![deny(missing_docs)]

pub mod color;
pub mod config;
mod engine;
pub mod error;
pub mod foreground;
pub mod gravity;
pub mod inpaint;
pub mod mask;
pub mod polarity;
pub mod stats;
pub mod threshold;

pub use config::{AppConfig, MaskSpec};
pub use engine::{
    default_output_path, is_supported_image, save_image, write_diagnostics, MaskedImage,
    PipelineOptions, ProcessOptions, ProcessResult, RunMetrics, RunOutput, Template,
    WatermarkEngine,
};
pub use error::{Error, Result};
pub use gravity::{GeometryClamp, Gravity};
pub use crate::inpaint::{Inpaint, Telea};
pub use mask::MaskLayers;
pub use stats::ChannelMetrics;
