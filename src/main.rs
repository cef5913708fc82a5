mod domain;
mod infrastructure;
mod presentation;

use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 800.0])
            .with_title("Motor Pad"),
        ..Default::default()
    };

    eframe::run_native(
        "Motor Pad",
        options,
        Box::new(|cc| Ok(Box::new(presentation::app::MotorPadApp::new(cc)))),
    )
}
