//! Headless replay of canvas input scripts.
//!
//! Usage: `hvat-canvas-replay <script.json> [--config <config.json>]`
//!
//! The script lists the image, labels, starting annotations and a sequence
//! of input events. After replaying them the resulting annotations, the
//! selection and the committed viewport are printed as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::Instant;

use hvat_canvas::config::ConfigError;
use hvat_canvas::input::{InputEvent, PointerEvent};
use hvat_canvas::{
    Annotation, AnnotationId, AnnotationStore, CanvasEngine, EngineConfig, EngineEvent, ImageSize, Label, LabelId,
    LabelSet, MemoryStore, Point, RecordingScene, Viewport,
};

/// How long to idle after the last event so every debounce window fires.
const SETTLE: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("{0}")]
    Usage(String),

    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read image dimensions: {0}")]
    Image(#[from] image::ImageError),

    #[error("Script has no image size and no image path")]
    NoImage,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct CanvasSize {
    width: f64,
    height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayScript {
    #[serde(default)]
    canvas: CanvasSize,
    /// Explicit image dimensions.
    #[serde(default)]
    image: Option<ImageSize>,
    /// Image file to read dimensions from, relative to the script.
    #[serde(default)]
    image_path: Option<PathBuf>,
    #[serde(default = "default_image_id")]
    image_id: u64,
    #[serde(default)]
    labels: Vec<Label>,
    #[serde(default)]
    annotations: Vec<Annotation>,
    #[serde(default)]
    active_label: Option<LabelId>,
    events: Vec<InputEvent>,
}

fn default_image_id() -> u64 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayResult {
    annotations: Vec<Annotation>,
    selection: Vec<AnnotationId>,
    viewport: Viewport,
    rejections: Vec<String>,
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG overrides the configured level
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    match run(&args, config) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &[String]) -> Result<EngineConfig, ReplayError> {
    match flag_value(args, "--config") {
        Some(path) => Ok(EngineConfig::load(Path::new(path))?),
        None => Ok(EngineConfig::load_from_default_path().unwrap_or_default()),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn script_path(args: &[String]) -> Result<&Path, ReplayError> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
        } else if arg == "--config" {
            skip_next = true;
        } else {
            return Ok(Path::new(arg));
        }
    }
    Err(ReplayError::Usage(
        "Usage: hvat-canvas-replay <script.json> [--config <config.json>]".to_string(),
    ))
}

fn image_size(script: &ReplayScript, script_path: &Path) -> Result<ImageSize, ReplayError> {
    if let Some(size) = script.image {
        return Ok(size);
    }
    let Some(path) = &script.image_path else {
        return Err(ReplayError::NoImage);
    };
    let path = match script_path.parent() {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.clone(),
    };
    let (width, height) = image::image_dimensions(&path)?;
    log::info!("🖼️ Read {}x{} from {:?}", width, height, path);
    Ok(ImageSize::new(width, height))
}

fn run(args: &[String], config: EngineConfig) -> Result<String, ReplayError> {
    let path = script_path(args)?;
    let json = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let script: ReplayScript = serde_json::from_str(&json)?;
    let size = image_size(&script, path)?;

    log::info!(
        "Replaying {} event(s) over {} annotation(s)",
        script.events.len(),
        script.annotations.len()
    );

    let store = MemoryStore::with_annotations(script.annotations);
    let labels = LabelSet::new(script.labels);
    let mut engine = CanvasEngine::new(store, labels, RecordingScene::new(), config);
    engine.set_canvas_size(script.canvas.width, script.canvas.height);
    engine.load_image(script.image_id, &size);
    engine.set_active_label(script.active_label);

    let mut now = Instant::now();
    engine.frame(now);

    let mut rejections = Vec::new();
    for event in script.events {
        replay_event(&mut engine, event, &mut now);
        collect(&mut engine, &mut rejections);
    }

    now += SETTLE;
    engine.frame(now);
    engine.tick(now);
    collect(&mut engine, &mut rejections);

    let result = ReplayResult {
        selection: engine.selection().iter().copied().collect(),
        viewport: engine.committed_viewport(),
        annotations: engine.store().list().to_vec(),
        rejections,
    };
    Ok(serde_json::to_string_pretty(&result)?)
}

type ReplayEngine = CanvasEngine<MemoryStore, LabelSet, RecordingScene>;

fn replay_event(engine: &mut ReplayEngine, event: InputEvent, now: &mut Instant) {
    log::trace!("Replay: {:?}", event);
    match event {
        InputEvent::PointerDown {
            x,
            y,
            button,
            modifiers,
        } => engine.pointer_down(
            PointerEvent::at(x, y)
                .with_button(button)
                .with_modifiers(modifiers),
            *now,
        ),
        InputEvent::PointerMove { x, y } => {
            engine.pointer_move(Point::new(x, y));
        }
        InputEvent::PointerUp {
            x,
            y,
            button,
            modifiers,
        } => engine.pointer_up(
            PointerEvent::at(x, y)
                .with_button(button)
                .with_modifiers(modifiers),
            *now,
        ),
        InputEvent::Click { x, y, modifiers } => {
            let event = PointerEvent::at(x, y).with_modifiers(modifiers);
            engine.pointer_down(event, *now);
            engine.pointer_up(event, *now);
        }
        InputEvent::DoubleClick { x, y } => engine.double_click(Point::new(x, y), *now),
        InputEvent::Wheel { delta, x, y } => {
            engine.wheel(delta, Point::new(x, y));
        }
        InputEvent::KeyDown { key } => engine.key_down(key),
        InputEvent::KeyUp { key } => engine.key_up(key),
        InputEvent::SetTool { tool } => engine.set_tool(tool),
        InputEvent::SetActiveLabel { label } => engine.set_active_label(label),
        InputEvent::TooltipHover { hovered } => engine.tooltip_hovered(hovered, *now),
        InputEvent::ZoomIn => engine.zoom_in(*now),
        InputEvent::ZoomOut => engine.zoom_out(*now),
        InputEvent::ResetView => engine.reset_view(*now),
        InputEvent::Frame => engine.frame(*now),
        InputEvent::Wait { ms } => {
            *now += Duration::from_millis(ms);
            engine.tick(*now);
        }
    }
}

fn collect(engine: &mut ReplayEngine, rejections: &mut Vec<String>) {
    for event in engine.drain_events() {
        match event {
            EngineEvent::Rejected(rejection) => {
                rejections.push(rejection.to_string());
            }
            EngineEvent::AnnotationCreated(annotation) => {
                log::info!("Created annotation {}", annotation.id);
            }
            other => log::debug!("{:?}", other),
        }
    }
}
