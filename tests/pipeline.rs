use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use layout_structure::image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use layout_structure::models::RegionDetector;
use layout_structure::ocr::{quad, Recognition, TextLine, TextRecognizer};
use layout_structure::{
    Error, Phase, RegionCandidate, Result, StructureConfig, StructureSystem,
};

struct StubDetector {
    candidates: Vec<RegionCandidate>,
    calls: Arc<AtomicUsize>,
}

impl StubDetector {
    fn boxed(candidates: Vec<RegionCandidate>) -> (Box<dyn RegionDetector>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = Self {
            candidates,
            calls: calls.clone(),
        };
        (Box::new(detector), calls)
    }
}

impl RegionDetector for StubDetector {
    fn detect(&self, _img: &DynamicImage) -> Result<Vec<RegionCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.candidates.clone())
    }
}

struct FailingDetector;

impl RegionDetector for FailingDetector {
    fn detect(&self, _img: &DynamicImage) -> Result<Vec<RegionCandidate>> {
        Err(Error::Model("inference backend unavailable".to_string()))
    }
}

struct StubRecognizer {
    lines: Vec<TextLine>,
    calls: Arc<AtomicUsize>,
}

impl StubRecognizer {
    fn boxed(lines: Vec<TextLine>) -> (Box<dyn TextRecognizer>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let recognizer = Self {
            lines,
            calls: calls.clone(),
        };
        (Box::new(recognizer), calls)
    }
}

impl TextRecognizer for StubRecognizer {
    fn recognize(&mut self, _img: &DynamicImage) -> Result<Recognition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Recognition {
            lines: self.lines.clone(),
            det: Duration::from_millis(1),
            rec: Duration::from_millis(2),
        })
    }
}

struct FailingRecognizer;

impl TextRecognizer for FailingRecognizer {
    fn recognize(&mut self, _img: &DynamicImage) -> Result<Recognition> {
        Err(Error::Model("recognizer crashed".to_string()))
    }
}

fn page(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([240, 240, 240])))
}

fn text_candidate() -> RegionCandidate {
    RegionCandidate::new(10.0, 10.0, 50.0, 50.0, "Text", 0.9)
}

fn scratch_config(dir: &std::path::Path) -> StructureConfig {
    StructureConfig {
        image_dir: Some(dir.to_path_buf()),
        ..Default::default()
    }
}

fn entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[test]
fn test_single_region_scenario() {
    let (detector, calls) = StubDetector::boxed(vec![text_candidate()]);
    let mut system = StructureSystem::new(StructureConfig::default(), Some(detector), None);

    let result = system.run(&page(100, 100), 0).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.regions.len(), 1);
    let region = &result.regions[0];
    assert_eq!(region.region_type, "text");
    assert_eq!(region.bbox, [10, 10, 50, 50]);
    assert!((region.score - 0.9).abs() < 1e-6);
    assert_eq!(region.img_idx, 0);
    assert!(region.text.is_empty());

    let crop = region.img.as_ref().unwrap();
    assert_eq!((crop.width(), crop.height()), (40, 40));
}

#[test]
fn test_single_region_scenario_round_trip() {
    let scratch = tempfile::tempdir().unwrap();
    let (detector, _) = StubDetector::boxed(vec![text_candidate()]);
    let mut system = StructureSystem::new(scratch_config(scratch.path()), Some(detector), None);

    let analysis = system.analyze(&page(100, 100)).unwrap();

    assert_eq!(analysis.regions.len(), 1);
    let region = &analysis.regions[0];
    assert_eq!(region.region_type, "text");
    assert_eq!(region.bbox, [10, 10, 50, 50]);
    assert!((region.score - 0.9).abs() < 1e-6);
    assert_eq!(region.img_idx, 0);
    assert!(region.text.is_empty());
    assert!(region.img.is_none());

    let image = analysis.image.unwrap();
    assert_eq!((image.width(), image.height()), (100, 100));

    // the temporary workspace is gone
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_fallback_region_without_detector() {
    let mut system = StructureSystem::new(StructureConfig::default(), None, None);

    let result = system.run(&page(320, 240), 0).unwrap();

    assert_eq!(result.regions.len(), 1);
    let region = &result.regions[0];
    assert_eq!(region.region_type, "table");
    assert_eq!(region.bbox, [0, 0, 320, 240]);
    assert_eq!(region.score, 0.0);
    assert_eq!(result.timing.layout, 0.0);

    let crop = region.img.as_ref().unwrap();
    assert_eq!((crop.width(), crop.height()), (320, 240));
}

#[test]
fn test_regions_keep_detector_order() {
    let (detector, _) = StubDetector::boxed(vec![
        RegionCandidate::new(0.0, 80.0, 100.0, 100.0, "Footer", 0.5),
        RegionCandidate::new(0.0, 0.0, 100.0, 20.0, "Title", 0.7),
        RegionCandidate::new(0.0, 30.0, 100.0, 70.0, "Table", 0.95),
    ]);
    let mut system = StructureSystem::new(StructureConfig::default(), Some(detector), None);

    let result = system.run(&page(100, 100), 2).unwrap();

    let types: Vec<_> = result.regions.iter().map(|r| r.region_type.as_str()).collect();
    assert_eq!(types, ["footer", "title", "table"]);
    assert!(result.regions.iter().all(|r| r.img_idx == 2));
}

#[test]
fn test_ocr_without_layout_is_disabled() {
    let config = StructureConfig {
        layout: false,
        ocr: true,
        ..Default::default()
    };
    let (detector, detector_calls) = StubDetector::boxed(vec![text_candidate()]);
    let (recognizer, recognizer_calls) = StubRecognizer::boxed(vec![]);
    let mut system = StructureSystem::new(config, Some(detector), Some(recognizer));

    assert!(!system.config().ocr);
    assert!(!system.has_recognizer());

    let result = system.run(&page(60, 40), 0).unwrap();

    assert_eq!(recognizer_calls.load(Ordering::SeqCst), 0);
    assert_eq!(detector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.regions[0].bbox, [0, 0, 60, 40]);
}

#[test]
fn test_recognizer_output_is_normalized_but_not_attached() {
    let config = StructureConfig {
        ocr: true,
        ..Default::default()
    };
    let (detector, _) = StubDetector::boxed(vec![text_candidate()]);
    let (recognizer, calls) =
        StubRecognizer::boxed(vec![TextLine::new("<b>Hello</b>", 0.98, quad(12.0, 12.0, 40.0, 20.0))]);
    let mut system = StructureSystem::new(config, Some(detector), Some(recognizer));

    let result = system.run(&page(100, 100), 0).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.text_lines[0].text, "Hello");
    assert!(result.regions[0].text.is_empty());
    assert!((result.timing.det - 0.001).abs() < 1e-9);
    assert!((result.timing.rec - 0.002).abs() < 1e-9);
}

#[test]
fn test_attach_text_fills_regions() {
    let config = StructureConfig {
        ocr: true,
        attach_text: true,
        ..Default::default()
    };
    let (detector, _) = StubDetector::boxed(vec![
        text_candidate(),
        RegionCandidate::new(60.0, 60.0, 90.0, 90.0, "Figure", 0.8),
    ]);
    let (recognizer, _) = StubRecognizer::boxed(vec![
        TextLine::new("<b>Hello</b>", 0.98, quad(12.0, 12.0, 40.0, 20.0)),
        TextLine::new("world", 0.91, quad(12.0, 25.0, 40.0, 33.0)),
    ]);
    let mut system = StructureSystem::new(config, Some(detector), Some(recognizer));

    let result = system.run(&page(100, 100), 0).unwrap();

    assert_eq!(result.regions[0].text, "Hello\nworld");
    assert_eq!(result.regions[0].ocr.len(), 2);
    assert!(result.regions[1].text.is_empty());
}

#[test]
fn test_detector_failure_is_fatal() {
    let scratch = tempfile::tempdir().unwrap();
    let mut system =
        StructureSystem::new(scratch_config(scratch.path()), Some(Box::new(FailingDetector)), None);

    let err = system.analyze(&page(50, 50)).unwrap_err();

    assert_eq!(err.phase(), Phase::Detect);
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_recognizer_failure_is_fatal() {
    let config = StructureConfig {
        ocr: true,
        ..Default::default()
    };
    let (detector, _) = StubDetector::boxed(vec![text_candidate()]);
    let mut system =
        StructureSystem::new(config, Some(detector), Some(Box::new(FailingRecognizer)));

    let err = system.run(&page(50, 50), 0).unwrap_err();
    assert_eq!(err.phase(), Phase::Recognize);
}

#[test]
fn test_empty_detection_returns_empty_analysis() {
    let scratch = tempfile::tempdir().unwrap();
    let (detector, _) = StubDetector::boxed(vec![]);
    let mut system = StructureSystem::new(scratch_config(scratch.path()), Some(detector), None);

    let analysis = system.analyze(&page(80, 80)).unwrap();

    assert!(analysis.regions.is_empty());
    assert!(analysis.image.is_none());
    // storage is never touched
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (detector, _) = StubDetector::boxed(vec![
        text_candidate(),
        RegionCandidate::new(5.5, 60.2, 95.9, 98.7, "Table", 0.123_456),
    ]);
    let mut system = StructureSystem::new(StructureConfig::default(), Some(detector), None);
    let img = page(100, 100);

    let result = system.run(&img, 0).unwrap();
    let annotated = system.render(&img, &result).unwrap();
    system
        .persist(dir.path(), "scan", &result, &annotated, 0)
        .unwrap();

    assert!(dir.path().join("structure/scan/res_0.txt").exists());
    assert!(dir.path().join("structure/scan/show_0.jpg").exists());

    let (regions, image) = system.reload(dir.path(), "scan", 0).unwrap();
    assert_eq!(regions.len(), 2);
    assert_eq!(regions[1].region_type, "table");
    assert_eq!(regions[1].bbox, [5, 60, 95, 98]);
    assert!((regions[1].score - 0.123_456).abs() < 1e-6);
    assert!(image.is_some());
}

#[test]
fn test_reload_without_save_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let system = StructureSystem::new(StructureConfig::default(), None, None);

    let err = system.reload(dir.path(), "image", 0).unwrap_err();

    assert_eq!(err.phase(), Phase::Load);
    assert!(err.is_not_found());
}

#[test]
fn test_output_directory_retains_artifacts() {
    let scratch = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = StructureConfig {
        output: Some(output.path().to_path_buf()),
        ..scratch_config(scratch.path())
    };
    let (detector, _) = StubDetector::boxed(vec![text_candidate()]);
    let mut system = StructureSystem::new(config, Some(detector), None);

    system.analyze(&page(100, 100)).unwrap();

    assert!(output.path().join("structure/image/res_0.txt").exists());
    assert!(output.path().join("structure/image/show_0.jpg").exists());
    assert_eq!(entries(scratch.path()), 0);
}

#[test]
fn test_analyze_bytes_png() {
    let scratch = tempfile::tempdir().unwrap();
    let (detector, _) = StubDetector::boxed(vec![text_candidate()]);
    let mut system = StructureSystem::new(scratch_config(scratch.path()), Some(detector), None);

    let mut bytes = Vec::new();
    page(100, 100)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    let output = system.analyze_bytes(&bytes, "image/png").unwrap();

    assert_eq!(
        output.result_json,
        r#"[{"type":"text","bbox":[10,10,50,50],"score":0.9}]"#
    );
    assert_eq!(output.content_type, "image/png");
    let encoded = output.image.unwrap();
    let decoded =
        layout_structure::image::load_from_memory_with_format(&encoded, ImageFormat::Png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 100));
}

#[test]
fn test_analyze_bytes_empty_detection() {
    let scratch = tempfile::tempdir().unwrap();
    let (detector, _) = StubDetector::boxed(vec![]);
    let mut system = StructureSystem::new(scratch_config(scratch.path()), Some(detector), None);

    let mut bytes = Vec::new();
    page(30, 30)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();

    let output = system.analyze_bytes(&bytes, "image/jpeg").unwrap();
    assert_eq!(output.result_json, "[]");
    assert!(output.image.is_none());
}

#[test]
fn test_analyze_bytes_rejects_garbage() {
    let mut system = StructureSystem::new(StructureConfig::default(), None, None);

    let err = system.analyze_bytes(b"not an image", "image/png").unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(err.phase(), Phase::Decode);

    let err = system.analyze_bytes(b"GIF89a", "image/gif").unwrap_err();
    assert!(matches!(err, Error::UnsupportedContentType(_)));
}

#[test]
fn test_persist_failure_removes_workspace() {
    let scratch = tempfile::tempdir().unwrap();
    let config = StructureConfig {
        // interior NUL makes directory creation fail inside the workspace
        mode: "bad\0mode".to_string(),
        ..scratch_config(scratch.path())
    };
    let (detector, _) = StubDetector::boxed(vec![text_candidate()]);
    let mut system = StructureSystem::new(config, Some(detector), None);

    let err = system.analyze(&page(100, 100)).unwrap_err();

    assert_eq!(err.phase(), Phase::Persist);
    assert_eq!(entries(scratch.path()), 0);
}

fn assert_send<T: Send>() {}

fn assert_sync<T: Sync>() {}

#[test]
fn test_system_can_move_to_worker() {
    assert_send::<StructureSystem>();
    assert_sync::<std::sync::Mutex<StructureSystem>>();

    let (detector, calls) = StubDetector::boxed(vec![text_candidate()]);
    let system = StructureSystem::new(StructureConfig::default(), Some(detector), None);
    let shared = Arc::new(std::sync::Mutex::new(system));

    let workers: Vec<_> = (0..2)
        .map(|idx| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                let mut system = shared.lock().unwrap();
                system.run(&page(100, 100), idx).unwrap()
            })
        })
        .collect();

    for (idx, worker) in workers.into_iter().enumerate() {
        let result = worker.join().unwrap();
        assert_eq!(result.regions[0].img_idx, idx);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_default_pipeline_draws_labels() {
    if !layout_structure::visualize::Visualizer::with_system_font().has_font() {
        return;
    }
    let (detector, _) = StubDetector::boxed(vec![RegionCandidate::new(10.0, 40.0, 80.0, 90.0, "Text", 0.9)]);
    let mut system = StructureSystem::new(StructureConfig::default(), Some(detector), None);

    let img = page(100, 100);
    let result = system.run(&img, 0).unwrap();
    let annotated = system.render(&img, &result).unwrap();

    // the label sits above the box, where the page is otherwise untouched
    let background = Rgb([240, 240, 240]);
    assert!((0..38).any(|y| annotated.get_pixel(10, y) != &background));
}
