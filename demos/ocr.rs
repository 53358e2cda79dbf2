use layout_structure::{
    models::{Detectron2Model, Detectron2PretrainedModel},
    ocr::tesseract::TesseractAgent,
    Result, StructureConfig, StructureSystem,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let img = layout_structure::image::open("demos/data/paper-example.png")?;

    let model = Detectron2Model::pretrained(Detectron2PretrainedModel::FASTER_RCNN_R_50_FPN_3X, false)?;
    let agent = TesseractAgent::new()?.with_word_boxes(true);

    let config = StructureConfig {
        ocr: true,
        attach_text: true,
        ..Default::default()
    };
    let mut system = StructureSystem::new(config, Some(Box::new(model)), Some(Box::new(agent)));

    let result = system.run(&img, 0)?;
    for region in result.regions.iter().filter(|r| r.region_type == "text") {
        println!("{:?} {:?}", region.bbox, region.text);
    }

    Ok(())
}
