use std::path::PathBuf;

use astra::app::AstraApp;
use astra::{cli, logger};
use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // `astra photo.png` opens the image straight away
    let startup_file = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .filter(|p| p.is_file());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("Astra"),
        ..Default::default()
    };

    eframe::run_native(
        "Astra",
        options,
        Box::new(move |cc| Box::new(AstraApp::new(cc, startup_file))),
    )
}
