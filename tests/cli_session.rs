use std::ffi::OsString;
use std::process::ExitCode;

use astra::cli::{self, CliArgs};
use astra::components::editor::EditSession;
use astra::settings::EditorSettings;
use clap::Parser;
use image::RgbaImage;

const SESSION: &str = r#"{
    "tool": "Rectangle",
    "events": [
        {"type": "pointer_down", "pos": {"x": 10, "y": 10}},
        {"type": "pointer_move", "pos": {"x": 30, "y": 20}},
        {"type": "pointer_move", "pos": {"x": 40, "y": 30}},
        {"type": "pointer_up"},
        {"type": "select_tool", "tool": "Brush"},
        {"type": "set_brush_size", "size": 6},
        {"type": "pointer_down", "pos": {"x": 50, "y": 50}},
        {"type": "pointer_move", "pos": {"x": 70, "y": 50}}
    ]
}"#;

#[test]
fn replay_counts_gestures_and_finishes_open_ones() {
    let script = cli::parse_session(SESSION).unwrap();
    let mut session = EditSession::new(&EditorSettings::default());
    session.load_base(100, 100);
    let stats = cli::replay(&mut session, &script);
    assert_eq!(stats.events, 8);
    assert_eq!(stats.gestures, 2);
    assert!(!session.paint().unwrap().is_stroking());

    let mask = session.export_mask().unwrap();
    assert_eq!(mask.get_pixel(25, 20).0[0], 255);
    assert_eq!(mask.get_pixel(60, 50).0[0], 255);
    assert_eq!(mask.get_pixel(60, 40).0[0], 0);
}

#[test]
fn viewport_in_session_scales_pointer_positions() {
    let script = cli::parse_session(
        r#"{"viewport": {"min": {"x": 0, "y": 0}, "max": {"x": 50, "y": 50}},
            "tool": "Rectangle",
            "events": [
                {"type": "pointer_down", "pos": {"x": 5, "y": 5}},
                {"type": "pointer_move", "pos": {"x": 10, "y": 10}},
                {"type": "pointer_up"}
            ]}"#,
    )
    .unwrap();
    let mut session = EditSession::new(&EditorSettings::default());
    session.load_base(100, 100);
    cli::replay(&mut session, &script);
    let shape = session.shapes().selected().unwrap();
    assert_eq!((shape.x, shape.y, shape.width, shape.height), (10.0, 10.0, 10.0, 10.0));
}

#[test]
fn cli_writes_mask_and_preview() {
    let dir = std::env::temp_dir().join(format!("astra_cli_{}", uuid::Uuid::new_v4().simple()));
    std::fs::create_dir_all(&dir).unwrap();
    let input = dir.join("base.png");
    RgbaImage::from_pixel(100, 100, image::Rgba([40, 80, 120, 255]))
        .save(&input)
        .unwrap();
    let session = dir.join("session.json");
    std::fs::write(&session, SESSION).unwrap();
    let output = dir.join("mask.png");
    let preview = dir.join("preview.png");

    let args = CliArgs::try_parse_from([
        OsString::from("astra"),
        "--input".into(),
        input.clone().into_os_string(),
        "--session".into(),
        session.clone().into_os_string(),
        "--output".into(),
        output.clone().into_os_string(),
        "--preview".into(),
        preview.clone().into_os_string(),
    ])
    .unwrap();
    assert_eq!(cli::run(args), ExitCode::SUCCESS);

    let mask = image::open(&output).unwrap().to_rgba8();
    assert_eq!(mask.get_pixel(25, 20).0, [255, 255, 255, 255]);
    assert_eq!(mask.get_pixel(90, 90).0, [0, 0, 0, 255]);
    let flat = image::open(&preview).unwrap().to_rgba8();
    assert_eq!(flat.get_pixel(90, 90).0, [40, 80, 120, 255]);

    let _ = std::fs::remove_dir_all(&dir);
}
