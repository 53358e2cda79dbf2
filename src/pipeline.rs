//! The layout analysis pipeline: detection, recognition, assembly, rendering and the
//! persist/reload round trip.

use std::io::Cursor;
use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, ImageFormat, RgbImage};
use serde::Serialize;

use crate::config::StructureConfig;
use crate::models::{Detectron2Model, RegionDetector};
use crate::ocr::{normalize_lines, TextLine, TextRecognizer};
use crate::persist::ResultPersister;
use crate::reconcile::attach_text;
use crate::region::{regions_to_json, Region, RegionCandidate};
use crate::visualize::Visualizer;
use crate::{Error, Result};

/// Name of the per-image folder inside the temporary workspace.
const IMAGE_NAME: &str = "image";

/// Seconds spent per phase of one pipeline call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingStats {
    pub layout: f64,
    pub det: f64,
    pub rec: f64,
    pub table_match: f64,
    pub all: f64,
}

/// In-memory output of [`StructureSystem::run`].
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// Regions in detector emission order.
    pub regions: Vec<Region>,
    pub timing: TimingStats,
    /// Normalized recognizer output for the full page.
    pub text_lines: Vec<TextLine>,
}

impl PipelineResult {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Result of [`StructureSystem::analyze`], normalized through the on-disk format.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub regions: Vec<Region>,
    pub timing: TimingStats,
    /// Annotated page; `None` when nothing was detected.
    pub image: Option<DynamicImage>,
}

/// Caller-facing output of [`StructureSystem::analyze_bytes`].
#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    /// JSON array of `{"type", "bbox", "score"}` objects.
    pub result_json: String,
    /// Annotated image encoded in the input content type.
    pub image: Option<Vec<u8>>,
    pub content_type: String,
    pub timing: TimingStats,
}

/// Orchestrates layout detection and text recognition over a page image.
pub struct StructureSystem {
    config: StructureConfig,
    detector: Option<Box<dyn RegionDetector>>,
    recognizer: Option<Box<dyn TextRecognizer>>,
    visualizer: Visualizer,
    span: tracing::Span,
}

impl StructureSystem {
    /// Builds a pipeline from explicit backends.
    ///
    /// Labels are drawn with a system font when one is found; see [`Self::with_visualizer`].
    ///
    /// The configuration gates the backends: without `layout` neither is used, and the
    /// recognizer only runs when `ocr` or `table` is enabled.
    pub fn new(
        config: StructureConfig,
        detector: Option<Box<dyn RegionDetector>>,
        recognizer: Option<Box<dyn TextRecognizer>>,
    ) -> Self {
        let config = config.resolved();
        let span = tracing::info_span!("structure", mode = %config.mode);

        let detector = detector.filter(|_| config.layout);
        let recognizer = recognizer.filter(|_| config.recognition_enabled());

        Self {
            config,
            detector,
            recognizer,
            visualizer: Visualizer::with_system_font(),
            span,
        }
    }

    /// Builds the backends described by `config`.
    pub fn from_config(config: StructureConfig) -> Result<Self> {
        let config = config.resolved();

        let detector: Option<Box<dyn RegionDetector>> =
            match (&config.layout_model_dir, &config.layout_dict_path) {
                (Some(model_dir), Some(dict_path)) if config.layout => {
                    Some(Box::new(Detectron2Model::from_model_dir(
                        model_dir,
                        dict_path,
                        config.layout_score_threshold,
                        config.use_gpu,
                    )?))
                }
                _ => {
                    if config.layout {
                        tracing::warn!(
                            "layout_model_dir or layout_dict_path missing, treating the whole page as one region"
                        );
                    }
                    None
                }
            };

        let recognizer = if config.recognition_enabled() {
            Self::default_recognizer(&config)?
        } else {
            None
        };

        let visualizer = config
            .vis_font_path
            .as_ref()
            .map(Visualizer::with_font_path)
            .transpose()?;

        let system = Self::new(config, detector, recognizer);
        Ok(match visualizer {
            Some(visualizer) => system.with_visualizer(visualizer),
            None => system,
        })
    }

    #[cfg(feature = "ocr")]
    fn default_recognizer(config: &StructureConfig) -> Result<Option<Box<dyn TextRecognizer>>> {
        let agent = crate::ocr::tesseract::TesseractAgent::new()?
            .with_word_boxes(config.return_word_box);
        Ok(Some(Box::new(agent)))
    }

    #[cfg(not(feature = "ocr"))]
    fn default_recognizer(_config: &StructureConfig) -> Result<Option<Box<dyn TextRecognizer>>> {
        tracing::warn!("text recognition requested but built without the `ocr` feature");
        Ok(None)
    }

    pub fn with_visualizer(mut self, visualizer: Visualizer) -> Self {
        self.visualizer = visualizer;
        self
    }

    pub fn config(&self) -> &StructureConfig {
        &self.config
    }

    pub fn has_detector(&self) -> bool {
        self.detector.is_some()
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Detects and assembles the regions of `img` in memory.
    pub fn run(&mut self, img: &DynamicImage, img_idx: usize) -> Result<PipelineResult> {
        let _enter = self.span.enter();
        let start = Instant::now();
        let mut timing = TimingStats::default();

        let candidates = match &self.detector {
            Some(detector) => {
                let layout_start = Instant::now();
                let candidates = detector
                    .detect(img)
                    .map_err(|err| Error::Detection(Box::new(err)))?;
                timing.layout += layout_start.elapsed().as_secs_f64();
                candidates
            }
            None => vec![RegionCandidate::whole_image("table", 0.0)],
        };

        let mut text_lines = vec![];
        if let Some(recognizer) = self.recognizer.as_mut() {
            let recognition = recognizer
                .recognize(img)
                .map_err(|err| Error::Recognition(Box::new(err)))?;
            timing.det += recognition.det.as_secs_f64();
            timing.rec += recognition.rec.as_secs_f64();
            text_lines = recognition.lines;
            normalize_lines(&mut text_lines);
        }

        let (width, height) = (img.width(), img.height());
        let mut regions: Vec<Region> = candidates
            .iter()
            .map(|candidate| {
                let bbox = candidate.resolve_bbox(width, height);
                let mut region = Region::new(&candidate.label, bbox, candidate.score, img_idx);
                region.img = Some(match candidate.bbox {
                    Some(_) => region.crop_from_image(img),
                    None => img.clone(),
                });
                region
            })
            .collect();

        if self.config.attach_text && !text_lines.is_empty() {
            let match_start = Instant::now();
            attach_text(&mut regions, &text_lines);
            timing.table_match += match_start.elapsed().as_secs_f64();
        }

        timing.all = start.elapsed().as_secs_f64();
        tracing::debug!(regions = regions.len(), lines = text_lines.len(), "assembled regions");

        Ok(PipelineResult {
            regions,
            timing,
            text_lines,
        })
    }

    /// Annotated page for `result`, `None` when it has no regions.
    pub fn render(&self, img: &DynamicImage, result: &PipelineResult) -> Option<RgbImage> {
        self.visualizer.render(img, &result.regions)
    }

    /// Writes regions and the annotated page under `<root>/<mode>/<image_name>/`.
    pub fn persist(
        &self,
        root: &Path,
        image_name: &str,
        result: &PipelineResult,
        annotated: &RgbImage,
        img_idx: usize,
    ) -> Result<()> {
        let persister = self.persister(root);
        persister
            .save(&result.regions, image_name, img_idx)
            .and_then(|_| persister.save_image(annotated, image_name, img_idx))
            .map(|_| ())
            .map_err(|err| Error::Persist(Box::new(err)))
    }

    /// Reads back what [`persist`](Self::persist) wrote.
    pub fn reload(
        &self,
        root: &Path,
        image_name: &str,
        img_idx: usize,
    ) -> Result<(Vec<Region>, Option<DynamicImage>)> {
        self.persister(root)
            .load(image_name, img_idx)
            .map_err(|err| Error::Load(Box::new(err)))
    }

    fn persister(&self, root: &Path) -> ResultPersister {
        ResultPersister::new(root.join(&self.config.mode))
    }

    /// Runs the full pipeline on one page and returns the result as read back from disk.
    ///
    /// The artifacts live in a temporary workspace that is removed before returning, on
    /// success and on failure. An empty detection returns an empty analysis without
    /// rendering or touching storage.
    pub fn analyze(&mut self, img: &DynamicImage) -> Result<Analysis> {
        let img_idx = 0;
        let result = self.run(img, img_idx)?;

        let _enter = self.span.enter();
        tracing::info!("Predict time : {:.3}s", result.timing.all);

        let Some(annotated) = self.render(img, &result) else {
            tracing::warn!("no regions detected, skipping visualization and persistence");
            return Ok(Analysis {
                regions: vec![],
                timing: result.timing,
                image: None,
            });
        };

        if let Some(output) = &self.config.output {
            self.persist(output, IMAGE_NAME, &result, &annotated, img_idx)?;
        }

        let workspace = match &self.config.image_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|err| Error::Persist(Box::new(err.into())))?;
                tempfile::Builder::new().prefix("structure-").tempdir_in(dir)
            }
            None => tempfile::Builder::new().prefix("structure-").tempdir(),
        }
        .map_err(|err| Error::Persist(Box::new(err.into())))?;

        self.persist(workspace.path(), IMAGE_NAME, &result, &annotated, img_idx)?;
        let (regions, image) = self.reload(workspace.path(), IMAGE_NAME, img_idx)?;

        if let Err(err) = workspace.close() {
            tracing::warn!("failed to remove temporary workspace: {err}");
        }

        Ok(Analysis {
            regions,
            timing: result.timing,
            image,
        })
    }

    /// Decodes an encoded page, analyzes it and encodes the outputs.
    pub fn analyze_bytes(&mut self, bytes: &[u8], content_type: &str) -> Result<AnalysisOutput> {
        let format = ImageFormat::from_mime_type(content_type)
            .filter(|f| matches!(f, ImageFormat::Jpeg | ImageFormat::Png))
            .ok_or_else(|| Error::UnsupportedContentType(content_type.to_string()))?;

        let img = image::load_from_memory_with_format(bytes, format).map_err(Error::InvalidInput)?;

        let analysis = self.analyze(&img)?;
        let image = analysis
            .image
            .as_ref()
            .map(|img| encode_image(img, format))
            .transpose()
            .map_err(|err| Error::Render(Box::new(err)))?;

        Ok(AnalysisOutput {
            result_json: regions_to_json(&analysis.regions)?,
            image,
            content_type: content_type.to_string(),
            timing: analysis.timing,
        })
    }
}

fn encode_image(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut Cursor::new(&mut buf), format)?;
    Ok(buf)
}
