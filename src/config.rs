//! YAML configuration.
//!
//! ```yaml
//! info: true
//! human: true
//! masks:
//!   - file: masks/footer.png
//!     gravity: south
//!     foreground: true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::gravity::Gravity;
use crate::inpaint::DEFAULT_INPAINT_RADIUS;
use crate::polarity::CARBON_COPY_THRESHOLD;

fn default_carbon_copy_threshold() -> f32 {
    CARBON_COPY_THRESHOLD
}

fn default_inpaint_radius() -> u32 {
    DEFAULT_INPAINT_RADIUS
}

/// One watermark candidate to test against each image.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskSpec {
    /// Grayscale template file.
    pub file: PathBuf,
    /// Where the stamp sits on the page.
    pub gravity: Gravity,
    /// Drop probable text from this template's mask.
    pub foreground: bool,
}

/// A mask entry as written in YAML, before the gravity name is checked.
#[derive(Debug, Clone, Deserialize)]
struct MaskEntry {
    file: PathBuf,
    gravity: String,
    #[serde(default)]
    foreground: bool,
}

impl TryFrom<MaskEntry> for MaskSpec {
    type Error = Error;

    fn try_from(entry: MaskEntry) -> Result<Self> {
        Ok(Self {
            gravity: entry.gravity.parse()?,
            file: entry.file,
            foreground: entry.foreground,
        })
    }
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppConfig {
    /// Debug-level logging.
    #[serde(default)]
    pub debug: bool,
    /// Info-level logging.
    #[serde(default)]
    pub info: bool,
    /// Human-readable log lines instead of JSON.
    #[serde(default)]
    pub human: bool,
    /// Write diagnostic images for every template.
    #[serde(default)]
    pub visual: bool,
    /// Where diagnostic images go (default: next to the output).
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
    /// Brightness below which a scan is treated as a carbon copy.
    #[serde(default = "default_carbon_copy_threshold")]
    pub carbon_copy_threshold: f32,
    /// Inpainting neighbourhood radius.
    #[serde(default = "default_inpaint_radius")]
    pub inpaint_radius: u32,
    /// Watermark candidates, in any order.
    #[serde(skip)]
    pub masks: Vec<MaskSpec>,
    #[serde(default, rename = "masks")]
    mask_entries: Vec<MaskEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            info: false,
            human: false,
            visual: false,
            diagnostics_dir: None,
            carbon_copy_threshold: CARBON_COPY_THRESHOLD,
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
            masks: Vec::new(),
            mask_entries: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigParse`] for malformed YAML and
    /// [`Error::InvalidConfiguration`] for an unknown gravity or out-of-range
    /// values.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.masks = std::mem::take(&mut config.mask_entries)
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                MaskSpec::try_from(entry).map_err(|e| match e {
                    Error::InvalidConfiguration(msg) => {
                        Error::InvalidConfiguration(format!("masks[{i}]: {msg}"))
                    }
                    other => other,
                })
            })
            .collect::<Result<_>>()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. Relative template paths are resolved against the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, plus everything
    /// [`AppConfig::from_yaml`] returns.
    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&yaml)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make relative template and diagnostics paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for mask in &mut self.masks {
            if mask.file.is_relative() {
                mask.file = base.join(&mask.file);
            }
        }
        if let Some(dir) = &mut self.diagnostics_dir {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=255.0).contains(&self.carbon_copy_threshold) {
            return Err(Error::InvalidConfiguration(format!(
                "carbon_copy_threshold must be within 0-255, got {}",
                self.carbon_copy_threshold
            )));
        }
        if self.inpaint_radius == 0 {
            return Err(Error::InvalidConfiguration(
                "inpaint_radius must be at least 1".to_string(),
            ));
        }
        for (i, mask) in self.masks.iter().enumerate() {
            if mask.file.as_os_str().is_empty() {
                return Err(Error::InvalidConfiguration(format!(
                    "masks[{i}] has an empty file path"
                )));
            }
        }
        Ok(())
    }

    /// Log filter directive implied by the flags.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.info {
            "info"
        } else {
            "error"
        }
    }
}
