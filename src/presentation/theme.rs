use crate::domain::models::MessageSeverity;
use eframe::egui;

/// Fixed dark palette for the control deck.
pub struct DeckPalette {
    pub surface_bg: egui::Color32,
    pub grid: egui::Color32,
    pub lever: egui::Color32,
}

impl DeckPalette {
    pub fn new() -> Self {
        Self {
            surface_bg: egui::Color32::from_rgb(10, 10, 12),
            grid: egui::Color32::from_rgb(235, 235, 235),
            lever: egui::Color32::WHITE,
        }
    }
}

impl Default for DeckPalette {
    fn default() -> Self {
        Self::new()
    }
}

pub fn severity_color(severity: MessageSeverity) -> egui::Color32 {
    match severity {
        MessageSeverity::Info => egui::Color32::from_rgb(180, 180, 180),
        MessageSeverity::Success => egui::Color32::from_rgb(0, 255, 127),
        MessageSeverity::Warning => egui::Color32::from_rgb(255, 200, 0),
        MessageSeverity::Error => egui::Color32::from_rgb(255, 80, 80),
    }
}

pub fn configure_deck(ctx: &egui::Context) {
    let mut style = (*ctx.style()).clone();
    style.visuals = egui::Visuals::dark();
    style.visuals.panel_fill = egui::Color32::from_rgb(18, 18, 20);
    style.visuals.override_text_color = Some(egui::Color32::from_rgb(235, 235, 235));

    style
        .text_styles
        .iter_mut()
        .for_each(|(text_style, font_id)| {
            font_id.size = match text_style {
                egui::TextStyle::Heading => 20.0,
                egui::TextStyle::Body => 15.0,
                egui::TextStyle::Button => 15.0,
                _ => font_id.size,
            };
        });

    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.button_padding = egui::vec2(10.0, 6.0);

    ctx.set_style(style);
}
