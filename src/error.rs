//! Error types for the scan-watermark-removal crate.

use std::path::PathBuf;

/// Errors that abort a watermark removal run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A zero-area or malformed image reached a stage that needs real geometry.
    #[error("invalid image in {stage}: {reason}")]
    InvalidImage {
        /// Pipeline stage that rejected the image.
        stage: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The configuration names something the pipeline cannot use.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A mask template listed in the configuration could not be loaded.
    ///
    /// Counts as a configuration error, see [`Error::is_configuration`].
    #[error("failed to load mask template {}: {source}", path.display())]
    TemplateLoad {
        /// Path of the template file.
        path: PathBuf,
        /// Underlying decode or I/O failure.
        source: image::ImageError,
    },

    /// The configuration file is not valid YAML for the expected schema.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred during image processing (load, save, encode).
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// The inpainting backend rejected its input.
    #[error("inpainting failed: {0}")]
    Inpaint(#[from] ::inpaint::Error),
}

impl Error {
    /// Whether this error comes from the configuration rather than a scan.
    ///
    /// Configuration errors stop the whole run; the others only fail the
    /// image being processed.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::TemplateLoad { .. } | Self::ConfigParse(_)
        )
    }

    pub(crate) fn invalid_image(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            stage,
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("tga".to_string());
        assert!(unsupported.to_string().contains("tga"));

        let invalid = Error::invalid_image("statistics", "image has zero area (0x12)");
        let msg = invalid.to_string();
        assert!(msg.contains("statistics"));
        assert!(msg.contains("0x12"));

        let config = Error::InvalidConfiguration("unknown gravity \"up\"".to_string());
        assert!(config.to_string().contains("unknown gravity"));
    }

    #[test]
    fn template_load_names_the_file() {
        let source = image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = Error::TemplateLoad {
            path: PathBuf::from("masks/footer.png"),
            source,
        };
        assert!(err.to_string().contains("masks/footer.png"));
        assert!(err.is_configuration());
    }

    #[test]
    fn configuration_class() {
        assert!(Error::InvalidConfiguration("x".to_string()).is_configuration());
        assert!(!Error::invalid_image("inpaint", "size mismatch").is_configuration());
        assert!(!Error::UnsupportedFormat("gif".to_string()).is_configuration());
        assert!(!Error::Inpaint(::inpaint::Error::DimensionMismatch).is_configuration());
    }
}
