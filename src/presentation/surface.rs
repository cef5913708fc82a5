//! The two-lever control surface.
//!
//! Draws a three-column grid: the outer columns are the left and right
//! throttle levers split into 21 cells, the middle column is the dead zone.
//! A filled cell per lever column marks the current value. Raw egui
//! touch/pointer events are translated into [`TouchSample`]s for the lever
//! controller; on touchless desktops a mouse drag acts as a single
//! synthetic contact.

use crate::domain::lever::{
    Contact, LeverController, SurfaceGeometry, TouchId, TouchSample, LEVER_LIMIT, ROW_COUNT,
};
use crate::domain::models::CommandFrame;
use crate::presentation::theme::DeckPalette;
use eframe::egui;
use std::collections::HashSet;
use std::time::Instant;

/// Contact id for the synthetic mouse pointer.
const MOUSE_CONTACT: TouchId = TouchId(u64::MAX);

pub struct ControlSurface {
    /// Ids of touch contacts that started on the surface.
    active_touches: HashSet<u64>,
    /// Once real touch events appear, egui's mirrored pointer events must
    /// be ignored or every contact would be processed twice.
    saw_touch: bool,
    mouse_down: bool,
}

impl ControlSurface {
    pub fn new() -> Self {
        Self {
            active_touches: HashSet::new(),
            saw_touch: false,
            mouse_down: false,
        }
    }

    /// Render the surface and run this frame's input through the lever
    /// controller. Returns the frames that passed its dispatch gates.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        lever: &mut LeverController,
        palette: &DeckPalette,
    ) -> Vec<CommandFrame> {
        let size = ui.available_size();
        let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
        let rect = response.rect;
        lever.set_geometry(SurfaceGeometry {
            width: rect.width(),
            height: rect.height(),
        });

        let samples = self.collect_samples(ui, &response, rect);
        let now = Instant::now();
        let mut frames = Vec::new();
        for sample in &samples {
            let outcome = lever.handle_sample(sample, now);
            if let Some(frame) = outcome.frame {
                frames.push(frame);
            }
        }

        self.paint(&painter, rect, lever, palette);
        frames
    }

    fn collect_samples(
        &mut self,
        ui: &egui::Ui,
        response: &egui::Response,
        rect: egui::Rect,
    ) -> Vec<TouchSample> {
        let mut samples = Vec::new();

        ui.input(|input| {
            for event in &input.events {
                let egui::Event::Touch { id, phase, pos, .. } = event else {
                    continue;
                };
                self.saw_touch = true;
                let contact = Contact {
                    id: TouchId(id.0),
                    x: pos.x - rect.left(),
                    y: pos.y - rect.top(),
                };
                match phase {
                    egui::TouchPhase::Start => {
                        // Contacts landing on the surrounding chrome stay
                        // out of the lever gesture entirely.
                        if !rect.contains(*pos) {
                            continue;
                        }
                        self.active_touches.insert(id.0);
                        samples.push(TouchSample::Press(vec![contact]));
                    }
                    egui::TouchPhase::Move => {
                        if self.active_touches.contains(&id.0) {
                            samples.push(TouchSample::Move(vec![contact]));
                        }
                    }
                    egui::TouchPhase::End | egui::TouchPhase::Cancel => {
                        if self.active_touches.remove(&id.0) {
                            samples.push(if self.active_touches.is_empty() {
                                TouchSample::LiftAll
                            } else {
                                TouchSample::LiftOne(TouchId(id.0))
                            });
                        }
                    }
                }
            }
        });

        if self.saw_touch {
            return samples;
        }

        let down = response.dragged() || response.is_pointer_button_down_on();
        if down {
            if let Some(pos) = response.interact_pointer_pos() {
                let contact = Contact {
                    id: MOUSE_CONTACT,
                    x: pos.x - rect.left(),
                    y: pos.y - rect.top(),
                };
                samples.push(if self.mouse_down {
                    TouchSample::Move(vec![contact])
                } else {
                    TouchSample::Press(vec![contact])
                });
                self.mouse_down = true;
            }
        } else if self.mouse_down {
            self.mouse_down = false;
            samples.push(TouchSample::LiftAll);
        }

        samples
    }

    fn paint(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        lever: &LeverController,
        palette: &DeckPalette,
    ) {
        painter.rect_filled(rect, 0.0, palette.surface_bg);

        let column = rect.width() / 3.0;
        let cell = rect.height() / f32::from(ROW_COUNT);
        let stroke = egui::Stroke::new(1.0, palette.grid);

        // Column separators around the dead zone.
        for i in 1..=2 {
            let x = rect.left() + column * i as f32;
            painter.line_segment(
                [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
                stroke,
            );
        }

        // Cell rows across both lever columns.
        for row in 0..=ROW_COUNT {
            let y = rect.top() + cell * f32::from(row);
            painter.line_segment(
                [egui::pos2(rect.left(), y), egui::pos2(rect.left() + column, y)],
                stroke,
            );
            painter.line_segment(
                [egui::pos2(rect.right() - column, y), egui::pos2(rect.right(), y)],
                stroke,
            );
        }

        // One filled cell per lever at row (value + LIMIT).
        let (left, right) = lever.values();
        let left_rect = egui::Rect::from_min_size(
            egui::pos2(rect.left(), rect.top() + cell * f32::from(left + LEVER_LIMIT)),
            egui::vec2(column, cell),
        );
        painter.rect_filled(left_rect, 0.0, palette.lever);

        let right_rect = egui::Rect::from_min_size(
            egui::pos2(
                rect.right() - column,
                rect.top() + cell * f32::from(right + LEVER_LIMIT),
            ),
            egui::vec2(column, cell),
        );
        painter.rect_filled(right_rect, 0.0, palette.lever);
    }
}
