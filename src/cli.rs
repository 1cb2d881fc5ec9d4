// ============================================================================
// Astra CLI: headless mask building by replaying a recorded edit session
// ============================================================================
//
// Usage examples:
//   astra --input photo.png --session edits.json --output mask.png
//   astra -i photo.png -s edits.json -o mask.png --preview preview.png
//   astra -i photo.png -s edits.json -o mask.png --instruction "add a door" --submit
//
// No GUI is opened in CLI mode.  Events are replayed synchronously through
// the same state machine the desktop editor uses.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use egui::Rect;
use serde::Deserialize;

use crate::components::editor::{EditSession, EditorEvent, StateKind};
use crate::components::references::ReferenceTray;
use crate::components::tools::EditTool;
use crate::error::EditorError;
use crate::ops::compositor::{PreviewStyle, flatten_preview};
use crate::ops::submit::{EditBackend, FileDropBackend};
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Astra headless mask builder.
#[derive(Parser, Debug)]
#[command(
    name = "astra",
    about = "Build an edit mask from a recorded editor session",
    long_about = "Replay a JSON list of editor events (pointer, keyboard, tool changes)\n\
                  against a base image and write the resulting black/white mask.\n\n\
                  Example:\n  \
                  astra --input photo.png --session edits.json --output mask.png"
)]
pub struct CliArgs {
    /// Base image the mask is drawn over.
    #[arg(short, long, value_name = "IMAGE")]
    pub input: PathBuf,

    /// Session file: a JSON array of events, or an object with
    /// `events` plus optional `viewport`, `tool` and `brush_size`.
    #[arg(short, long, value_name = "SESSION.json")]
    pub session: PathBuf,

    /// Where to write the mask PNG (white = edit, black = keep).
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Also write the live-preview composite over the base image.
    #[arg(long, value_name = "FILE")]
    pub preview: Option<PathBuf>,

    /// Free-text edit instruction sent with --submit.
    #[arg(long, default_value = "")]
    pub instruction: String,

    /// Reference image(s) sent with --submit (at most 5 are kept).
    #[arg(short, long = "reference", value_name = "IMAGE", num_args = 1..)]
    pub references: Vec<PathBuf>,

    /// Hand the request to the file-drop backend (spends one credit).
    #[arg(long)]
    pub submit: bool,

    /// Print replay statistics and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

// ============================================================================
// Session file
// ============================================================================

/// A recorded editing session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionScript {
    /// Unzoomed on-screen image rect the pointer positions refer to.
    /// Defaults to the image's own pixel grid (client == canvas).
    #[serde(default)]
    pub viewport: Option<Rect>,
    #[serde(default)]
    pub tool: Option<EditTool>,
    #[serde(default)]
    pub brush_size: Option<f32>,
    pub events: Vec<EditorEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionFile {
    Events(Vec<EditorEvent>),
    Script(SessionScript),
}

/// Parse a session file's JSON text.
pub fn parse_session(text: &str) -> Result<SessionScript, EditorError> {
    let file: SessionFile =
        serde_json::from_str(text).map_err(|e| EditorError::Session(e.to_string()))?;
    Ok(match file {
        SessionFile::Events(events) => SessionScript { events, ..SessionScript::default() },
        SessionFile::Script(script) => script,
    })
}

/// Counts gathered while replaying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub model_changes: usize,
    pub gestures: usize,
}

/// Apply a script's setup and events to a session whose base is loaded.
pub fn replay(session: &mut EditSession, script: &SessionScript) -> ReplayStats {
    if let Some(viewport) = script.viewport {
        session.set_fit_rect(viewport);
    }
    if let Some(tool) = script.tool {
        session.handle(&EditorEvent::SelectTool { tool });
    }
    if let Some(size) = script.brush_size {
        session.handle(&EditorEvent::SetBrushSize { size });
    }

    let mut stats = ReplayStats::default();
    for event in &script.events {
        let t = session.handle(event);
        stats.events += 1;
        if t.model_changed {
            stats.model_changes += 1;
        }
        if t.from == StateKind::Idle && t.to != StateKind::Idle {
            stats.gestures += 1;
        }
    }
    // A recording that stops mid-gesture still finishes cleanly.
    if session.state().kind() != StateKind::Idle {
        session.handle(&EditorEvent::PointerUp);
    }
    stats
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match run_inner(&args) {
        Ok(stats) => {
            if args.verbose {
                println!(
                    "{} event(s), {} gesture(s), {} model change(s) ({:.0}ms)",
                    stats.events,
                    stats.gestures,
                    stats.model_changes,
                    start.elapsed().as_secs_f64() * 1000.0
                );
                println!("  → {}", args.output.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<ReplayStats, EditorError> {
    let base = crate::io::load_image(&args.input).map_err(EditorError::Io)?;
    let text = std::fs::read_to_string(&args.session)
        .map_err(|e| EditorError::Io(format!("{}: {}", args.session.display(), e)))?;
    let script = parse_session(&text)?;

    let mut settings = EditorSettings::load();
    let backend = FileDropBackend::new(settings.output_dir.clone(), settings.credits);
    let mut session = if args.submit {
        EditSession::open(&backend, &settings)?
    } else {
        EditSession::new(&settings)
    };
    session.load_base(base.width(), base.height());

    let stats = replay(&mut session, &script);

    let mask = session.export_mask()?;
    crate::io::save_mask_png(&mask, &args.output).map_err(EditorError::Io)?;

    if let Some(preview_path) = &args.preview {
        write_preview(&session, &base, preview_path)?;
    }

    if args.submit {
        let mut tray = ReferenceTray::new(settings.max_reference_images);
        tray.add_files(&args.references);
        let request = session.prepare_submission(base, &args.instruction, tray.take())?;
        backend.submit_edit(&request)?;
        settings.credits = backend.credits();
        settings.save();
        if args.verbose {
            println!(
                "  submitted to {} ({} credit(s) left)",
                backend.output_dir().display(),
                settings.credits
            );
        }
    }

    session.close();
    Ok(stats)
}

fn write_preview(session: &EditSession, base: &image::RgbaImage, path: &Path) -> Result<(), EditorError> {
    let overlay = session
        .render_preview(&PreviewStyle::default())
        .ok_or(EditorError::CanvasNotReady)?;
    let flat = flatten_preview(base, &overlay);
    crate::io::save_png(&flat, path).map_err(EditorError::Io)
}
