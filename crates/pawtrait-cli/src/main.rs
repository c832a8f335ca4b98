use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::ImageFormat;
use pawtrait_contracts::entities::SourceImage;
use pawtrait_contracts::events::EventLog;
use pawtrait_contracts::styles::StyleRegistry;
use pawtrait_engine::{
    download_image, EngineConfig, GenerationClient, Pipeline, PipelineError, StylizeOptions,
    VisionClient, VisionService,
};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "pawtrait", version, about = "Pet photo stylization pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stylize a pet photo end to end.
    Stylize(StylizeArgs),
    /// Describe a pet photo without generating anything.
    Describe(DescribeArgs),
    /// List the built-in styles.
    Styles(StylesArgs),
}

#[derive(Debug, Parser)]
struct StylizeArgs {
    /// Source pet photo.
    #[arg(long)]
    image: PathBuf,
    /// Style key; see `pawtrait styles`.
    #[arg(long)]
    style: Option<String>,
    /// Extra guidance image uploaded as a style reference.
    #[arg(long)]
    style_ref: Option<PathBuf>,
    /// Owner-provided context passed to the vision service.
    #[arg(long)]
    hint: Option<String>,
    /// Use the fast model instead of the quality one.
    #[arg(long)]
    fast: bool,
    /// Init strength override, clamped into [0.1, 0.9].
    #[arg(long)]
    strength: Option<f64>,
    #[arg(long, default_value = "pawtrait-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    /// Leave the result on the provider CDN instead of downloading it.
    #[arg(long)]
    skip_download: bool,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct DescribeArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    hint: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct StylesArgs {
    #[arg(long)]
    json: bool,
}

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("pawtrait error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Stylize(args) => run_stylize(args),
        Command::Describe(args) => {
            run_describe(args)?;
            Ok(0)
        }
        Command::Styles(args) => {
            run_styles(args)?;
            Ok(0)
        }
    }
}

fn run_stylize(args: StylizeArgs) -> Result<i32> {
    let config = EngineConfig::from_env();
    let image = load_source_image(&args.image)?;

    let registry = StyleRegistry::default();
    let style = match args.style.as_deref() {
        Some(key) => Some(registry.get(key).cloned().with_context(|| {
            format!("unknown style '{key}'; run `pawtrait styles` to list styles")
        })?),
        None => None,
    };
    let style_reference = match args.style_ref.as_deref() {
        Some(path) => Some(load_source_image(path)?),
        None => None,
    };

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create output directory {}", args.out.display()))?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let run_id = Uuid::new_v4().to_string();

    let pipeline = Pipeline::new(
        Arc::new(VisionClient::new(config.vision.clone())),
        Arc::new(GenerationClient::new(config.generation.clone())),
        EventLog::new(&events_path, run_id.as_str()),
        &config.generation,
    );

    let options = StylizeOptions {
        style,
        hint: args.hint.clone(),
        fast_mode: args.fast,
        init_strength: args.strength,
        style_reference,
    };
    let result = pipeline.run(&image, &options);

    let mut artifact_path: Option<PathBuf> = None;
    if result.success && !args.skip_download {
        if let Some(url) = result.image_url.as_deref() {
            match download_image(url, DOWNLOAD_TIMEOUT) {
                Ok(downloaded) => {
                    let ext = extension_for_download(downloaded.mime_type.as_deref(), url);
                    let path = args
                        .out
                        .join(format!("artifact-{}.{ext}", compact_timestamp()));
                    fs::write(&path, &downloaded.bytes)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    artifact_path = Some(path);
                }
                Err(err) => {
                    eprintln!("pawtrait: result download failed: {err}; the image URL is still usable");
                }
            }
        }
    }

    if args.json {
        let payload = json!({
            "success": result.success,
            "image_url": result.image_url,
            "error": result.error,
            "warnings": result.warnings,
            "artifact": artifact_path.as_ref().map(|path| path.display().to_string()),
            "run_id": run_id,
            "events": events_path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for warning in &result.warnings {
            eprintln!("pawtrait warning: {warning}");
        }
        if result.success {
            if let Some(path) = &artifact_path {
                println!("Saved {}", path.display());
            } else if let Some(url) = result.image_url.as_deref() {
                println!("Generated {url}");
            }
        } else {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string());
            eprintln!("pawtrait: run failed: {message}");
        }
    }

    Ok(if result.success { 0 } else { 1 })
}

fn run_describe(args: DescribeArgs) -> Result<()> {
    let config = EngineConfig::from_env();
    let image = load_source_image(&args.image)?;
    let client = VisionClient::new(config.vision);

    let mut warnings = Vec::new();
    let description = client
        .describe(&image, args.hint.as_deref(), &mut warnings)
        .context("vision describe failed")?;

    if args.json {
        let payload = json!({
            "chinese": description.chinese_text,
            "english": description.english_text,
            "raw": description.raw_text,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for warning in &warnings {
            eprintln!("pawtrait warning: {warning}");
        }
        if !description.chinese_text.is_empty() {
            println!("中文: {}", description.chinese_text);
        }
        if !description.english_text.is_empty() {
            println!("English: {}", description.english_text);
        }
    }
    Ok(())
}

fn run_styles(args: StylesArgs) -> Result<()> {
    let registry = StyleRegistry::default();
    if args.json {
        let styles: Vec<Value> = registry
            .list()
            .map(|style| {
                json!({
                    "key": style.key,
                    "label": style.label,
                    "init_strength": style.init_strength,
                    "elements": style.elements.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&Value::Array(styles))?);
    } else {
        for style in registry.list() {
            println!("{:<14} {}", style.key, style.label);
        }
    }
    Ok(())
}

/// Reads a photo and derives its MIME type, preferring content sniffing
/// over the file extension.
fn load_source_image(path: &Path) -> Result<SourceImage> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime = image::guess_format(&bytes)
        .ok()
        .and_then(mime_for_format)
        .or_else(|| mime_from_extension(path));
    let Some(mime) = mime else {
        return Err(PipelineError::InvalidImage(format!(
            "unsupported image type at {}",
            path.display()
        ))
        .into());
    };
    Ok(SourceImage::new(bytes, mime))
}

fn mime_for_format(format: ImageFormat) -> Option<String> {
    let mime = match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        _ => return None,
    };
    Some(mime.to_string())
}

fn mime_from_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        _ => return None,
    };
    Some(mime.to_string())
}

fn extension_for_download(mime: Option<&str>, url: &str) -> &'static str {
    if let Some(mime) = mime {
        let lowered = mime.to_ascii_lowercase();
        if lowered.contains("png") {
            return "png";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
    }
    let lowered = url.to_ascii_lowercase();
    let path_part = lowered.split(['?', '#']).next().unwrap_or("");
    if path_part.ends_with(".png") {
        return "png";
    }
    if path_part.ends_with(".webp") {
        return "webp";
    }
    "jpg"
}

fn compact_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_from_extension_covers_common_photo_types() {
        assert_eq!(
            mime_from_extension(Path::new("a.png")).as_deref(),
            Some("image/png")
        );
        assert_eq!(
            mime_from_extension(Path::new("a.JPG")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            mime_from_extension(Path::new("a.jpeg")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            mime_from_extension(Path::new("a.webp")).as_deref(),
            Some("image/webp")
        );
        assert_eq!(mime_from_extension(Path::new("a.txt")), None);
        assert_eq!(mime_from_extension(Path::new("noext")), None);
    }

    #[test]
    fn extension_for_download_prefers_mime_over_url() {
        assert_eq!(
            extension_for_download(Some("image/png"), "https://cdn.example/x.jpg"),
            "png"
        );
        assert_eq!(
            extension_for_download(Some("IMAGE/JPEG"), "https://cdn.example/x.png"),
            "jpg"
        );
        assert_eq!(
            extension_for_download(None, "https://cdn.example/pet.webp?sig=abc"),
            "webp"
        );
        assert_eq!(extension_for_download(None, "https://cdn.example/pet.PNG"), "png");
        assert_eq!(extension_for_download(None, "https://cdn.example/pet"), "jpg");
    }

    #[test]
    fn load_source_image_sniffs_content_over_extension() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("photo.dat");
        let mut buffer = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(2, 2))
            .write_to(&mut buffer, ImageFormat::Png)?;
        fs::write(&path, buffer.into_inner())?;

        let loaded = load_source_image(&path)?;
        assert_eq!(loaded.mime_type, "image/png");
        assert_eq!(loaded.extension(), "png");
        Ok(())
    }

    #[test]
    fn load_source_image_rejects_unknown_bytes() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        fs::write(&path, b"plain text")?;

        let err = load_source_image(&path).expect_err("txt must not load");
        assert!(err.to_string().contains("unreadable source image"));
        Ok(())
    }

    #[test]
    fn compact_timestamp_is_numeric() {
        let stamp = compact_timestamp();
        assert!(!stamp.is_empty());
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }
}
