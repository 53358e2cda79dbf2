use std::path::PathBuf;

use clap::Parser;
use layout_structure::{Result, StructureConfig, StructureSystem};

/// Analyze the layout of a document image.
#[derive(Parser)]
struct Args {
    /// Page image (JPEG or PNG).
    image: PathBuf,
    /// TOML file with pipeline options.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Where to write the annotated image.
    #[arg(long, default_value = "annotated.jpg")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => StructureConfig::from_toml_file(path)?,
        None => StructureConfig::default(),
    };

    let content_type = match args.image.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };
    let bytes = std::fs::read(&args.image)?;

    let mut system = StructureSystem::from_config(config)?;
    let output = system.analyze_bytes(&bytes, content_type)?;

    println!("{}", output.result_json);
    println!("{:?}", output.timing);

    if let Some(image) = output.image {
        std::fs::write(&args.out, image)?;
    }

    Ok(())
}
