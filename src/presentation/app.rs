use crate::domain::codec;
use crate::domain::lever::{LeverController, SurfaceGeometry};
use crate::domain::models::{AppEvent, CommandFrame, LinkState, MessageSeverity, Peer, StatusMessage};
use crate::domain::settings::SettingsService;
use crate::infrastructure::link::{self, LinkHandle};
use crate::infrastructure::logging::LoggingGuard;
use crate::presentation::surface::ControlSurface;
use crate::presentation::theme::{self, DeckPalette};
use eframe::egui;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct MotorPadApp {
    settings: SettingsService,
    link: LinkHandle,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,

    lever: LeverController,
    surface: ControlSurface,
    palette: DeckPalette,

    // State mirrored from link events
    link_state: LinkState,
    peer: Option<Peer>,
    status_message: Option<StatusMessage>,
    last_inbound: Option<String>,

    // UI State
    peer_input: String,

    // Logging guard
    _logging_guard: Option<LoggingGuard>,
}

impl MotorPadApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        theme::configure_deck(&cc.egui_ctx);

        let settings = SettingsService::new().expect("Failed to load settings");

        let logging_guard =
            crate::infrastructure::logging::init_logger(&settings.get().log_settings)
                .map_err(|e| eprintln!("Failed to initialize logging: {e}"))
                .ok();

        tracing::info!("Starting Motor Pad");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let link = link::spawn(event_tx, settings.get().listen_addr.clone());
        if settings.get().auto_listen {
            link.start();
        }

        let peer_input = settings.get().last_peer.clone().unwrap_or_default();

        Self {
            settings,
            link,
            event_rx,
            lever: LeverController::new(SurfaceGeometry {
                width: 0.0,
                height: 0.0,
            }),
            surface: ControlSurface::new(),
            palette: DeckPalette::new(),
            link_state: LinkState::Idle,
            peer: None,
            status_message: None,
            last_inbound: None,
            peer_input,
            _logging_guard: logging_guard,
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                AppEvent::LinkState { state, peer } => {
                    if state == LinkState::Connected {
                        if let Some(peer) = &peer {
                            if let Err(err) = self.settings.add_known_peer(&peer.address) {
                                tracing::warn!(%err, "failed to persist peer");
                            }
                        }
                    }
                    self.link_state = state;
                    self.peer = peer;
                }
                AppEvent::DataReceived(bytes) => {
                    self.last_inbound = Some(String::from_utf8_lossy(&bytes).into_owned());
                }
                AppEvent::LogMessage(message) => self.status_message = Some(message),
            }
        }
    }

    fn send_frame(&mut self, frame: CommandFrame) {
        let command = codec::encode(frame);
        tracing::debug!(%command, "dispatching");
        if let Err(err) = self.link.write(command.into_bytes()) {
            self.status_message = Some(StatusMessage {
                message: err.to_string(),
                severity: MessageSeverity::Warning,
            });
        }
    }

    fn connection_controls(&mut self, ui: &mut egui::Ui) {
        match self.link_state {
            LinkState::Connected | LinkState::Connecting => {
                if ui.button("Disconnect").clicked() {
                    self.link.stop();
                }
            }
            LinkState::Idle | LinkState::Listening => {
                if ui.button("Connect").clicked() && !self.peer_input.trim().is_empty() {
                    self.link.request_connect(Peer::new(self.peer_input.trim()));
                }
                ui.add(
                    egui::TextEdit::singleline(&mut self.peer_input)
                        .hint_text("peer address")
                        .desired_width(150.0),
                );
                if self.link_state == LinkState::Idle && ui.button("Listen").clicked() {
                    self.link.start();
                }
            }
        }
    }
}

impl eframe::App for MotorPadApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        egui::TopBottomPanel::top("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Motor Pad");
                ui.separator();
                ui.label(self.link_state.label(self.peer.as_ref()));

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    self.connection_controls(ui);
                });
            });
        });

        egui::TopBottomPanel::bottom("message_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if let Some(message) = &self.status_message {
                    ui.colored_label(theme::severity_color(message.severity), &message.message);
                }
                if let Some(inbound) = &self.last_inbound {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.monospace(format!("rx: {inbound}"));
                    });
                }
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let frames = self.surface.show(ui, &mut self.lever, &self.palette);
                for frame in frames {
                    self.send_frame(frame);
                }
            });

        // Link events arrive between frames; keep draining them even while
        // the user is not interacting.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}
