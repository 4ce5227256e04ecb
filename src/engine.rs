//! Pipeline orchestration and file drivers.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat, RgbImage};

use crate::color::{has_color, remove_colors};
use crate::config::{AppConfig, MaskSpec};
use crate::error::{Error, Result};
use crate::inpaint::{Inpaint, Telea, DEFAULT_INPAINT_RADIUS};
use crate::mask::{aggregate_masks, compute_watermark_mask, MaskLayers};
use crate::polarity::{normalize_polarity, CARBON_COPY_THRESHOLD};
use crate::stats::{channel_metrics, ChannelMetrics};
use crate::threshold::threshold_for;

/// Knobs for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Brightness below which the scan is inverted first.
    pub carbon_copy_threshold: f32,
    /// Inpainting neighbourhood radius.
    pub inpaint_radius: u32,
    /// Keep every template's intermediate layers in the output.
    pub keep_layers: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            carbon_copy_threshold: CARBON_COPY_THRESHOLD,
            inpaint_radius: DEFAULT_INPAINT_RADIUS,
            keep_layers: false,
        }
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            carbon_copy_threshold: cfg.carbon_copy_threshold,
            inpaint_radius: cfg.inpaint_radius,
            keep_layers: cfg.visual,
        }
    }
}

/// A loaded watermark template and the spec it came from.
#[derive(Debug, Clone)]
pub struct Template {
    /// Config entry.
    pub spec: MaskSpec,
    /// Grayscale template pixels.
    pub mask: GrayImage,
}

impl Template {
    /// Load the template named by `spec` as grayscale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateLoad`] if the file cannot be decoded, or
    /// [`Error::InvalidImage`] if it has zero area.
    pub fn load(spec: &MaskSpec) -> Result<Self> {
        let mask = image::open(&spec.file)
            .map_err(|source| Error::TemplateLoad {
                path: spec.file.clone(),
                source,
            })?
            .to_luma8();
        if mask.width() == 0 || mask.height() == 0 {
            return Err(Error::invalid_image(
                "template load",
                format!("{} has zero area", spec.file.display()),
            ));
        }
        Ok(Self {
            spec: spec.clone(),
            mask,
        })
    }
}

/// Scalars computed during a run, for an external logger.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Mean sample value of the source image.
    pub brightness: f32,
    /// Mean of channel means of the normalized image.
    pub mean_of_means: f32,
    /// Mean of channel spreads of the normalized image.
    pub mean_of_spreads: f32,
    /// Binarization threshold chosen.
    pub threshold: f32,
    /// Whether the normalized image carries color.
    pub has_color: bool,
    /// Whether the source was inverted as a carbon copy.
    pub inverted: bool,
    /// Number of templates applied.
    pub templates: usize,
    /// Number of crops that had to be clamped.
    pub clamps: usize,
    /// Wall time per stage, in pipeline order.
    pub stages: Vec<(&'static str, Duration)>,
}

impl RunMetrics {
    /// Flat key/value view.
    #[must_use]
    pub fn fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("brightness".to_string(), format!("{:.2}", self.brightness)),
            ("mean".to_string(), format!("{:.2}", self.mean_of_means)),
            ("std_dev".to_string(), format!("{:.2}", self.mean_of_spreads)),
            ("threshold".to_string(), format!("{:.2}", self.threshold)),
            ("color".to_string(), self.has_color.to_string()),
            ("inverted".to_string(), self.inverted.to_string()),
            ("templates".to_string(), self.templates.to_string()),
            ("clamps".to_string(), self.clamps.to_string()),
        ];
        for (stage, elapsed) in &self.stages {
            fields.push((format!("{stage}_ms"), elapsed.as_millis().to_string()));
        }
        fields.push(("total_ms".to_string(), self.total().as_millis().to_string()));
        fields
    }

    /// Sum of all stage durations.
    #[must_use]
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|(_, d)| *d).sum()
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Inpainted image.
    pub image: RgbImage,
    /// Aggregated removal mask.
    pub mask: GrayImage,
    /// Scalars for logging.
    pub metrics: RunMetrics,
    /// Per-template layers, when requested.
    pub layers: Vec<MaskLayers>,
}

/// The normalized image and its removal mask, before inpainting.
#[derive(Debug, Clone)]
pub struct MaskedImage {
    /// Polarity-normalized grayscale image (three equal channels).
    pub image: RgbImage,
    /// Aggregated removal mask.
    pub mask: GrayImage,
    /// Scalars for logging.
    pub metrics: RunMetrics,
    /// Per-template layers, when requested.
    pub layers: Vec<MaskLayers>,
}

/// Options controlling file processing.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Write diagnostic images into this directory.
    pub diagnostics_dir: Option<PathBuf>,
}

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
    /// Run scalars, when the pipeline completed.
    pub metrics: Option<RunMetrics>,
}

impl ProcessResult {
    fn failed(path: &Path, message: String) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            message,
            metrics: None,
        }
    }
}

/// Times each stage into the run metrics.
struct Stopwatch {
    stages: Vec<(&'static str, Duration)>,
}

impl Stopwatch {
    fn new() -> Self {
        Self { stages: Vec::new() }
    }

    fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.stages.push((stage, start.elapsed()));
        out
    }
}

/// The removal engine holding the loaded templates.
///
/// Create once and reuse for multiple images; templates are decoded at
/// construction.
pub struct WatermarkEngine<I = Telea> {
    templates: Vec<Template>,
    options: PipelineOptions,
    inpainter: I,
}

impl WatermarkEngine<Telea> {
    /// Create an engine with the bundled Telea inpainter.
    #[must_use]
    pub fn new(templates: Vec<Template>, options: PipelineOptions) -> Self {
        Self::with_inpainter(templates, options, Telea)
    }

    /// Load every template named by `config`.
    ///
    /// # Errors
    ///
    /// Fails on the first template that cannot be loaded; none are skipped.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let templates = config
            .masks
            .iter()
            .map(Template::load)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(templates, PipelineOptions::from(config)))
    }
}

impl<I: Inpaint + Sync> WatermarkEngine<I> {
    /// Create an engine with a custom inpainting backend.
    #[must_use]
    pub fn with_inpainter(
        templates: Vec<Template>,
        options: PipelineOptions,
        inpainter: I,
    ) -> Self {
        Self {
            templates,
            options,
            inpainter,
        }
    }

    /// Loaded templates, in config order.
    #[must_use]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Pipeline options in effect.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    fn template_layers(&self, gray: &RgbImage, threshold: f32) -> Result<Vec<MaskLayers>> {
        let build = |tpl: &Template| -> Result<MaskLayers> {
            let start = Instant::now();
            let layers = compute_watermark_mask(
                gray,
                &tpl.mask,
                tpl.spec.gravity,
                threshold,
                tpl.spec.foreground,
            )?;
            tracing::debug!(
                mask = %tpl.spec.file.display(),
                gravity = %tpl.spec.gravity,
                duration_ms = start.elapsed().as_millis(),
                "template mask computed"
            );
            Ok(layers)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            self.templates.par_iter().map(build).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            self.templates.iter().map(build).collect()
        }
    }

    /// Compute the aggregated removal mask without inpainting.
    ///
    /// Returns the normalized grayscale image the mask applies to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImage`] for a zero-area image.
    pub fn compute_mask(&self, image: &RgbImage) -> Result<MaskedImage> {
        let mut clock = Stopwatch::new();

        let source = clock.time("statistics", || channel_metrics(image))?;
        let (normalized, inverted) = clock.time("polarity", || {
            normalize_polarity(image, source.brightness, self.options.carbon_copy_threshold)
        });
        if inverted {
            tracing::debug!(brightness = source.brightness, "carbon copy inverted");
        }

        // Threshold statistics come from the image actually being masked.
        let normalized_metrics: ChannelMetrics = if inverted {
            clock.time("statistics_normalized", || channel_metrics(&normalized))?
        } else {
            source
        };

        let color = clock.time("color", || has_color(&normalized));
        let gray = clock.time("grayscale", || remove_colors(&normalized));
        drop(normalized);
        let threshold = threshold_for(&normalized_metrics, color);

        let (w, h) = gray.dimensions();
        let layers = clock.time("masks", || self.template_layers(&gray, threshold))?;
        let mask = clock.time("aggregate", || {
            aggregate_masks(w, h, layers.iter().map(|l| &l.final_mask))
        })?;

        let metrics = RunMetrics {
            brightness: source.brightness,
            mean_of_means: normalized_metrics.mean_of_means,
            mean_of_spreads: normalized_metrics.mean_of_spreads,
            threshold,
            has_color: color,
            inverted,
            templates: layers.len(),
            clamps: layers.iter().map(|l| l.clamps.len()).sum(),
            stages: clock.stages,
        };

        let layers = if self.options.keep_layers {
            layers
        } else {
            Vec::new()
        };

        Ok(MaskedImage {
            image: gray,
            mask,
            metrics,
            layers,
        })
    }

    /// Run the whole pipeline on one image.
    ///
    /// # Errors
    ///
    /// Any stage failure aborts the run; nothing partial is returned.
    pub fn run(&self, image: &RgbImage) -> Result<RunOutput> {
        let MaskedImage {
            image: gray,
            mask,
            mut metrics,
            layers,
        } = self.compute_mask(image)?;

        let start = Instant::now();
        let filled = self
            .inpainter
            .inpaint(&gray, &mask, self.options.inpaint_radius)?;
        drop(gray);
        metrics.stages.push(("inpaint", start.elapsed()));

        Ok(RunOutput {
            image: filled,
            mask,
            metrics,
            layers,
        })
    }

    /// Process a single image file: load, run, save.
    ///
    /// The output file is only written after the whole pipeline succeeds.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, opts: &ProcessOptions) -> ProcessResult {
        match self.try_process_file(input, output, opts) {
            Ok(metrics) => ProcessResult {
                path: input.to_path_buf(),
                success: true,
                message: format!("Watermark removed -> {}", output.display()),
                metrics: Some(metrics),
            },
            Err(e) => {
                tracing::error!(image = %input.display(), error = %e, "processing failed");
                ProcessResult::failed(input, e.to_string())
            }
        }
    }

    fn try_process_file(
        &self,
        input: &Path,
        output: &Path,
        opts: &ProcessOptions,
    ) -> Result<RunMetrics> {
        let src = image::open(input)?.to_rgb8();
        let out = self.run(&src)?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        save_image(&out.image, output)?;

        // Diagnostics never change the outcome of a run.
        if self.options.keep_layers {
            let dir = match &opts.diagnostics_dir {
                Some(dir) => dir.clone(),
                None => output.parent().unwrap_or(Path::new(".")).to_path_buf(),
            };
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            if let Err(e) = write_diagnostics(&dir, &stem, &out) {
                tracing::warn!(dir = %dir.display(), error = %e, "diagnostics not written");
            }
        }

        let base = input.file_name().unwrap_or_default().to_string_lossy();
        let fields = out.metrics.fields();
        tracing::info!(image = %base, dst = %output.display(), metrics = ?fields, "watermark removed");

        Ok(out.metrics)
    }

    /// Process all supported images in a directory.
    ///
    /// Each file succeeds or fails on its own; one bad scan does not stop the
    /// batch. Uses parallel iteration when the `cli` feature is enabled.
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };

        if !output_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(output_dir) {
                return vec![ProcessResult::failed(
                    output_dir,
                    format!("Failed to create output directory: {e}"),
                )];
            }
        }

        let process = |input_path: &PathBuf| {
            let output_path = match input_path.file_name() {
                Some(name) => output_dir.join(name),
                None => output_dir.join(input_path),
            };
            self.process_file(input_path, &output_path, opts)
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(process).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(process).collect()
        }
    }
}

/// Write the aggregate mask and every template's layers as PNGs.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or a file written.
pub fn write_diagnostics(dir: &Path, stem: &str, out: &RunOutput) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    out.mask.save(dir.join(format!("{stem}.mask.png")))?;
    for (i, layers) in out.layers.iter().enumerate() {
        layers
            .cropped_template
            .save(dir.join(format!("{stem}.{i}.crop.png")))?;
        layers.binarized.save(dir.join(format!("{stem}.{i}.bin.png")))?;
        layers.foreground.save(dir.join(format!("{stem}.{i}.fg.png")))?;
        layers
            .final_mask
            .save(dir.join(format!("{stem}.{i}.mask.png")))?;
    }
    Ok(())
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff"
        ),
        None => false,
    }
}

/// Save an RGB image with format-specific quality settings.
///
/// The image is encoded in memory and written to a staging file next to
/// `path`, then renamed into place, so a failed save leaves no partial file.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let mut encoded = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut encoded, 100);
            encoder.encode_image(img)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp | ImageFormat::Tiff => {
            img.write_to(&mut encoded, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    let staging = staging_path(path);
    let written = std::fs::write(&staging, encoded.get_ref())
        .and_then(|()| std::fs::rename(&staging, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&staging);
        return Err(e.into());
    }

    Ok(())
}

/// Hidden sibling of `path` used while an output is being written.
fn staging_path(path: &Path) -> PathBuf {
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!(".{name}.partial"))
}

/// Generate a default output path from an input path.
///
/// Example: `"scan.jpg"` becomes `"scan_cleaned.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_cleaned.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gravity::Gravity;
    use image::{Luma, Rgb};

    fn template(mask: GrayImage, gravity: Gravity, foreground: bool) -> Template {
        Template {
            spec: MaskSpec {
                file: PathBuf::from("inline.png"),
                gravity,
                foreground,
            },
            mask,
        }
    }

    #[test]
    fn uniform_page_with_empty_template_is_unchanged() {
        let img = RgbImage::from_pixel(100, 100, Rgb([150, 150, 150]));
        let engine = WatermarkEngine::new(
            vec![template(GrayImage::new(100, 100), Gravity::South, false)],
            PipelineOptions::default(),
        );
        let out = engine.run(&img).unwrap();
        assert!(out.mask.pixels().all(|p| p[0] == 0));
        assert_eq!(out.image, img);
        assert!(!out.metrics.inverted);
        assert_eq!(out.metrics.templates, 1);
    }

    #[test]
    fn no_templates_is_a_no_op_mask() {
        let img = RgbImage::from_pixel(10, 10, Rgb([200, 200, 200]));
        let engine = WatermarkEngine::new(Vec::new(), PipelineOptions::default());
        let masked = engine.compute_mask(&img).unwrap();
        assert!(masked.mask.pixels().all(|p| p[0] == 0));
        assert_eq!(masked.metrics.templates, 0);
        assert!(masked.layers.is_empty());
    }

    #[test]
    fn layers_are_kept_only_on_request() {
        let img = RgbImage::from_pixel(10, 10, Rgb([200, 200, 200]));
        let tpl = template(GrayImage::from_pixel(10, 10, Luma([255])), Gravity::Center, true);

        let engine = WatermarkEngine::new(vec![tpl.clone()], PipelineOptions::default());
        assert!(engine.compute_mask(&img).unwrap().layers.is_empty());

        let options = PipelineOptions {
            keep_layers: true,
            ..PipelineOptions::default()
        };
        let engine = WatermarkEngine::new(vec![tpl], options);
        let layers = engine.compute_mask(&img).unwrap().layers;
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].final_mask.dimensions(), (10, 10));
    }

    #[test]
    fn zero_area_image_fails_fast() {
        let engine = WatermarkEngine::new(Vec::new(), PipelineOptions::default());
        let err = engine.run(&RgbImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidImage { stage: "statistics", .. }));
    }

    #[test]
    fn metrics_fields_are_flat() {
        let metrics = RunMetrics {
            brightness: 50.0,
            threshold: 70.0,
            has_color: true,
            stages: vec![("masks", Duration::from_millis(12))],
            ..RunMetrics::default()
        };
        let fields = metrics.fields();
        assert!(fields.contains(&("brightness".to_string(), "50.00".to_string())));
        assert!(fields.contains(&("threshold".to_string(), "70.00".to_string())));
        assert!(fields.contains(&("color".to_string(), "true".to_string())));
        assert!(fields.contains(&("masks_ms".to_string(), "12".to_string())));
        assert!(fields.contains(&("total_ms".to_string(), "12".to_string())));
    }

    #[test]
    fn default_output_path_appends_cleaned_suffix() {
        let p = default_output_path(Path::new("/tmp/scan.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/scan_cleaned.jpg"));

        let p = default_output_path(Path::new("page.png"));
        assert_eq!(p.file_name().unwrap().to_str().unwrap(), "page_cleaned.png");
    }

    #[test]
    fn save_image_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(6, 4, Rgb([120, 130, 140]));
        for name in ["page.jpg", "page.png", "page.tif"] {
            let path = dir.path().join(name);
            save_image(&img, &path).unwrap();
            let written = image::open(&path).unwrap();
            assert_eq!((written.width(), written.height()), (6, 4));
            assert!(!staging_path(&path).exists());
        }
    }

    #[test]
    fn failed_save_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbImage::from_pixel(6, 4, Rgb([120, 130, 140]));

        let gif = dir.path().join("page.gif");
        assert!(matches!(save_image(&img, &gif), Err(Error::UnsupportedFormat(_))));

        let missing_parent = dir.path().join("nope").join("page.png");
        assert!(matches!(save_image(&img, &missing_parent), Err(Error::Io(_))));

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn is_supported_image_accepts_scan_formats() {
        assert!(is_supported_image(Path::new("scan.jpg")));
        assert!(is_supported_image(Path::new("scan.JPEG")));
        assert!(is_supported_image(Path::new("scan.png")));
        assert!(is_supported_image(Path::new("scan.tif")));
        assert!(is_supported_image(Path::new("scan.TIFF")));
        assert!(!is_supported_image(Path::new("scan.gif")));
        assert!(!is_supported_image(Path::new("scan")));
    }
}
