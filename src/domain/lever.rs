//! Lever input processing.
//!
//! The control surface is split into three vertical columns: the outer two
//! are throttle levers for the left and right motor, the middle one is a
//! dead zone separating them. Touch contacts landing in a lever column bind
//! to that axis and set its value from the quantized vertical position;
//! releases reset the bound axis to zero. The controller deduplicates and
//! rate-limits the resulting command stream so a drag does not flood the
//! link.

use crate::domain::models::{Axis, CommandFrame};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Highest magnitude a lever value can take.
pub const LEVER_LIMIT: i16 = 10;

/// Vertical cells per column: one per lever step plus the zero row.
pub const ROW_COUNT: i16 = 2 * LEVER_LIMIT + 1;

/// Minimum time between transmissions triggered by continuous drag motion.
/// Presses and releases bypass this gate.
pub const DRAG_DEBOUNCE: Duration = Duration::from_millis(20);

/// Stable identifier for one touch contact, valid from press to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TouchId(pub u64);

/// One active contact as reported by the input layer, in surface-local
/// pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Contact {
    pub id: TouchId,
    pub x: f32,
    pub y: f32,
}

/// A single input report from the touch surface.
#[derive(Debug, Clone)]
pub enum TouchSample {
    /// A new contact landed; carries every currently active contact.
    Press(Vec<Contact>),
    /// Active contacts moved; carries every currently active contact.
    Move(Vec<Contact>),
    /// One contact lifted while others may remain.
    LiftOne(TouchId),
    /// Every contact lifted, or the gesture was cancelled.
    LiftAll,
}

/// Pixel geometry of the control surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub width: f32,
    pub height: f32,
}

impl SurfaceGeometry {
    /// Which axis a horizontal position belongs to. `None` is the dead zone;
    /// positions outside the surface are inert as well.
    pub fn column(&self, x: f32) -> Option<Axis> {
        let third = self.width / 3.0;
        if x > 0.0 && x < third {
            Some(Axis::Left)
        } else if x > third * 2.0 && x < self.width {
            Some(Axis::Right)
        } else {
            None
        }
    }

    /// Quantize a vertical position into a lever value.
    ///
    /// The column is divided into [`ROW_COUNT`] cells with zero at the
    /// middle row; the result is clamped into `[-LEVER_LIMIT, LEVER_LIMIT]`.
    pub fn quantize(&self, y: f32) -> i16 {
        if self.height <= 0.0 {
            return 0;
        }
        let cell = self.height / f32::from(ROW_COUNT);
        let raw = (y / cell).floor() as i16 - LEVER_LIMIT;
        raw.clamp(-LEVER_LIMIT, LEVER_LIMIT)
    }
}

/// What the view should do after a processed sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Axis values (may have) changed; repaint the indicators.
    pub redraw: bool,
    /// A frame that passed the debounce and dedup gates and must be
    /// encoded and written to the link.
    pub frame: Option<CommandFrame>,
}

/// Converts touch samples into deduplicated, rate-limited motor commands.
pub struct LeverController {
    geometry: SurfaceGeometry,
    left: i16,
    right: i16,
    /// Active contact → claimed axis. At most one entry per axis.
    bindings: HashMap<TouchId, Axis>,
    /// Last dispatched pair; `None` until the first transmission.
    last_sent: Option<(i16, i16)>,
    last_drag_attempt: Option<Instant>,
}

impl LeverController {
    pub fn new(geometry: SurfaceGeometry) -> Self {
        Self {
            geometry,
            left: 0,
            right: 0,
            bindings: HashMap::new(),
            last_sent: None,
            last_drag_attempt: None,
        }
    }

    /// Current (left, right) lever values.
    pub fn values(&self) -> (i16, i16) {
        (self.left, self.right)
    }

    /// Track the rendered surface size; the window is resizable.
    pub fn set_geometry(&mut self, geometry: SurfaceGeometry) {
        self.geometry = geometry;
    }

    /// Process one input report and decide whether a command goes out.
    pub fn handle_sample(&mut self, sample: &TouchSample, now: Instant) -> SampleOutcome {
        let mut redraw = false;
        match sample {
            TouchSample::LiftAll => {
                self.left = 0;
                self.right = 0;
                self.bindings.clear();
                redraw = true;
            }
            TouchSample::LiftOne(id) => match self.bindings.remove(id) {
                Some(Axis::Left) => {
                    self.left = 0;
                    redraw = true;
                }
                Some(Axis::Right) => {
                    self.right = 0;
                    redraw = true;
                }
                None => {}
            },
            TouchSample::Press(contacts) | TouchSample::Move(contacts) => {
                for contact in contacts {
                    let Some(axis) = self.geometry.column(contact.x) else {
                        continue;
                    };
                    let value = self.geometry.quantize(contact.y);
                    self.bind(contact.id, axis);
                    match axis {
                        Axis::Left => self.left = value,
                        Axis::Right => self.right = value,
                    }
                }
                redraw = true;
            }
        }

        let frame = self.dispatch(matches!(sample, TouchSample::Move(_)), now);
        SampleOutcome { redraw, frame }
    }

    /// Claim an axis for a contact. Last writer wins: any earlier binding
    /// for the same axis is displaced without a conflict signal.
    fn bind(&mut self, id: TouchId, axis: Axis) {
        self.bindings.retain(|_, bound| *bound != axis);
        self.bindings.insert(id, axis);
    }

    fn dispatch(&mut self, is_drag: bool, now: Instant) -> Option<CommandFrame> {
        if is_drag {
            let gated = self
                .last_drag_attempt
                .is_some_and(|at| now.duration_since(at) <= DRAG_DEBOUNCE);
            if gated {
                return None;
            }
            self.last_drag_attempt = Some(now);
        }

        let pair = (self.left, self.right);
        if self.last_sent == Some(pair) {
            return None;
        }
        self.last_sent = Some(pair);
        Some(CommandFrame {
            left: pair.0,
            right: pair.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::codec;

    // 100 px columns, 10 px cells.
    fn geometry() -> SurfaceGeometry {
        SurfaceGeometry {
            width: 300.0,
            height: 210.0,
        }
    }

    fn contact(id: u64, x: f32, y: f32) -> Contact {
        Contact {
            id: TouchId(id),
            x,
            y,
        }
    }

    fn controller() -> LeverController {
        LeverController::new(geometry())
    }

    #[test]
    fn test_column_classification() {
        let g = geometry();
        assert_eq!(g.column(50.0), Some(Axis::Left));
        assert_eq!(g.column(150.0), None);
        assert_eq!(g.column(250.0), Some(Axis::Right));
        assert_eq!(g.column(100.0), None); // boundary is inert
        assert_eq!(g.column(310.0), None); // off-surface
    }

    #[test]
    fn test_quantize_centers_zero_at_middle_row() {
        let g = geometry();
        assert_eq!(g.quantize(105.0), 0);
        assert_eq!(g.quantize(0.0), -LEVER_LIMIT);
        assert_eq!(g.quantize(209.0), LEVER_LIMIT);
        assert_eq!(g.quantize(65.0), -4);
    }

    #[test]
    fn test_quantize_clamps_out_of_range_positions() {
        let g = geometry();
        // Raw row 47 - 10 = +37 must clamp to the ceiling, never escape it.
        assert_eq!(g.quantize(470.0), LEVER_LIMIT);
        assert_eq!(g.quantize(-500.0), -LEVER_LIMIT);
    }

    #[test]
    fn test_press_dispatches_quantized_value() {
        let mut lever = controller();
        let sample = TouchSample::Press(vec![contact(1, 50.0, 65.0)]);
        let outcome = lever.handle_sample(&sample, Instant::now());
        assert!(outcome.redraw);
        let frame = outcome.frame.expect("press must dispatch");
        assert_eq!((frame.left, frame.right), (-4, 0));
        assert_eq!(codec::encode(frame), "m+04+00");
    }

    #[test]
    fn test_lift_all_resets_and_bypasses_debounce() {
        let mut lever = controller();
        let t0 = Instant::now();
        lever.handle_sample(&TouchSample::Press(vec![contact(1, 50.0, 65.0)]), t0);

        // Release arrives well inside the debounce window and must still
        // go out immediately.
        let outcome = lever.handle_sample(&TouchSample::LiftAll, t0 + Duration::from_millis(1));
        assert_eq!(lever.values(), (0, 0));
        let frame = outcome.frame.expect("lift-all must dispatch");
        assert_eq!(codec::encode(frame), "m+00+00");
    }

    #[test]
    fn test_identical_moves_are_suppressed() {
        let mut lever = controller();
        let t0 = Instant::now();
        let sample = TouchSample::Move(vec![contact(1, 50.0, 65.0)]);
        let first = lever.handle_sample(&sample, t0);
        assert!(first.frame.is_some());

        let second = lever.handle_sample(&sample, t0 + Duration::from_millis(25));
        assert_eq!(second.frame, None);
    }

    #[test]
    fn test_drag_debounce_limits_rate() {
        let mut lever = controller();
        let t0 = Instant::now();
        let first = lever.handle_sample(&TouchSample::Move(vec![contact(1, 50.0, 65.0)]), t0);
        assert!(first.frame.is_some());

        // Different value, but inside the 20ms window.
        let second = lever.handle_sample(
            &TouchSample::Move(vec![contact(1, 50.0, 85.0)]),
            t0 + Duration::from_millis(5),
        );
        assert_eq!(second.frame, None);

        // Past the window the pending value goes out.
        let third = lever.handle_sample(
            &TouchSample::Move(vec![contact(1, 50.0, 85.0)]),
            t0 + Duration::from_millis(30),
        );
        let frame = third.frame.expect("debounce window elapsed");
        assert_eq!((frame.left, frame.right), (-2, 0));
    }

    #[test]
    fn test_press_bypasses_drag_debounce() {
        let mut lever = controller();
        let t0 = Instant::now();
        lever.handle_sample(&TouchSample::Move(vec![contact(1, 50.0, 65.0)]), t0);

        let press = lever.handle_sample(
            &TouchSample::Press(vec![contact(2, 250.0, 180.0)]),
            t0 + Duration::from_millis(2),
        );
        let frame = press.frame.expect("press must not be debounced");
        assert_eq!((frame.left, frame.right), (-4, 8));
    }

    #[test]
    fn test_lift_one_resets_only_bound_axis() {
        let mut lever = controller();
        let t0 = Instant::now();
        lever.handle_sample(
            &TouchSample::Press(vec![contact(1, 50.0, 65.0), contact(2, 250.0, 180.0)]),
            t0,
        );
        assert_eq!(lever.values(), (-4, 8));

        let outcome =
            lever.handle_sample(&TouchSample::LiftOne(TouchId(2)), t0 + Duration::from_millis(1));
        assert_eq!(lever.values(), (-4, 0));
        assert!(outcome.frame.is_some());

        // Unknown ids are ignored.
        let outcome =
            lever.handle_sample(&TouchSample::LiftOne(TouchId(9)), t0 + Duration::from_millis(2));
        assert!(!outcome.redraw);
        assert_eq!(outcome.frame, None);
        assert_eq!(lever.values(), (-4, 0));
    }

    #[test]
    fn test_axis_claim_is_last_writer_wins() {
        let mut lever = controller();
        let t0 = Instant::now();
        lever.handle_sample(&TouchSample::Press(vec![contact(1, 50.0, 65.0)]), t0);
        lever.handle_sample(
            &TouchSample::Press(vec![contact(2, 50.0, 25.0)]),
            t0 + Duration::from_millis(1),
        );
        assert_eq!(lever.values(), (-8, 0));

        // The displaced contact no longer owns the axis.
        lever.handle_sample(&TouchSample::LiftOne(TouchId(1)), t0 + Duration::from_millis(2));
        assert_eq!(lever.values(), (-8, 0));

        lever.handle_sample(&TouchSample::LiftOne(TouchId(2)), t0 + Duration::from_millis(3));
        assert_eq!(lever.values(), (0, 0));
    }

    #[test]
    fn test_dead_zone_contact_changes_nothing() {
        let mut lever = controller();
        let t0 = Instant::now();
        lever.handle_sample(&TouchSample::Press(vec![contact(1, 50.0, 65.0)]), t0);

        let outcome = lever.handle_sample(
            &TouchSample::Press(vec![contact(2, 150.0, 10.0)]),
            t0 + Duration::from_millis(1),
        );
        assert_eq!(lever.values(), (-4, 0));
        // Values unchanged, so the dedup gate suppresses transmission.
        assert_eq!(outcome.frame, None);
    }

    #[test]
    fn test_first_dispatch_sends_even_at_rest() {
        let mut lever = controller();
        // A press in the dead zone leaves (0, 0), but nothing was ever
        // sent, so the frame still goes out.
        let outcome = lever.handle_sample(
            &TouchSample::Press(vec![contact(1, 150.0, 10.0)]),
            Instant::now(),
        );
        let frame = outcome.frame.expect("sentinel means never sent");
        assert_eq!((frame.left, frame.right), (0, 0));
    }
}
