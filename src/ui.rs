//! The egui window: start screen, countdown, chord display and the on-screen piano.

use std::time::{Duration, Instant};

use eframe::{App, CreationContext};
use egui::{
    Align, Align2, Button, CentralPanel, Color32, ComboBox, Context, FontId, Frame, Key, Layout,
    Pos2, Rect, RichText, Rounding, Sense, Ui, Vec2,
};
use tracing::error;

use crate::keyboard::VirtualKeyboard;
use crate::midi::{self, MidiListener, MidiStatus};
use crate::session::format_elapsed;
use crate::state::{Phase, Round};
use crate::theory::Note;
use crate::trainer::Trainer;

const BACKGROUND: Color32 = Color32::from_rgb(0x29, 0x1F, 0x1E);
const SUCCESS: Color32 = Color32::from_rgb(0x59, 0xCD, 0x90);
const ERROR: Color32 = Color32::from_rgb(0xFE, 0x5F, 0x55);
const WHITE_KEY: Color32 = Color32::from_rgb(0xFA, 0xFA, 0xFA);

const WHITE_KEY_SIZE: Vec2 = Vec2::new(50.0, 180.0);
const BLACK_KEY_SIZE: Vec2 = Vec2::new(36.0, 120.0);
const KEY_GAP: f32 = 4.0;
const PROGRESS_HEIGHT: f32 = 10.0;

/// Refresh rate of the running timer.
const TIMER_POLL: Duration = Duration::from_millis(10);
/// MIDI events wake nothing on their own, so poll while a device is connected.
const MIDI_POLL: Duration = Duration::from_millis(16);

/// The trainer window.
pub struct TrainerApp {
    trainer: Trainer,
    keyboard: VirtualKeyboard,
    midi: MidiStatus,
    selected_input: Option<usize>,
    listener: Option<MidiListener>,
}

impl TrainerApp {
    pub fn new(trainer: Trainer, keys: Vec<Note>, midi: MidiStatus, midi_input: Option<usize>) -> Self {
        let keyboard = VirtualKeyboard::new(keys, trainer.input_sender());
        let mut app = Self {
            trainer,
            keyboard,
            midi,
            selected_input: None,
            listener: None,
        };
        app.select_input(midi_input);
        app
    }

    fn select_input(&mut self, index: Option<usize>) {
        if let Some(listener) = self.listener.take() {
            listener.close();
        }
        self.selected_input = None;

        let Some(index) = index else {
            return;
        };
        match midi::connect(index, self.trainer.input_sender()) {
            Ok(listener) => {
                self.listener = Some(listener);
                self.selected_input = Some(index);
            }
            Err(e) => error!("{}", e),
        }
    }

    fn handle_shortcuts(&mut self, ctx: &Context) {
        let keys: Vec<(Key, bool)> = ctx.input(|i| {
            i.events
                .iter()
                .filter_map(|event| match event {
                    egui::Event::Key {
                        key,
                        pressed,
                        repeat: false,
                        ..
                    } => Some((*key, *pressed)),
                    _ => None,
                })
                .collect()
        });

        for (key, pressed) in keys {
            let Some(shortcut) = key.name().chars().next().filter(|_| key.name().len() == 1) else {
                continue;
            };
            if pressed {
                self.keyboard.shortcut_pressed(shortcut);
            } else {
                self.keyboard.shortcut_released(shortcut);
            }
        }
    }

    fn config_screen(&mut self, ui: &mut Ui, now: Instant) {
        ui.label(RichText::new("CHORD TRAINER").size(48.0).strong());
        ui.add_space(24.0);

        match &self.midi {
            MidiStatus::Available(ports) => {
                let selected_name = self
                    .selected_input
                    .and_then(|index| ports.iter().find(|p| p.index == index))
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "None".to_string());

                let mut selection = self.selected_input;
                ComboBox::from_label("Use MIDI Input")
                    .selected_text(selected_name)
                    .show_ui(ui, |ui| {
                        ui.selectable_value(&mut selection, None, "None");
                        for port in ports {
                            ui.selectable_value(&mut selection, Some(port.index), &port.name);
                        }
                    });
                if selection != self.selected_input {
                    self.select_input(selection);
                }
            }
            MidiStatus::Unavailable(_) => {
                ui.label(RichText::new("Connect a MIDI keyboard and restart!").size(24.0));
            }
        }

        ui.add_space(24.0);
        let start = Button::new(RichText::new("START").size(28.0).strong()).min_size(Vec2::new(180.0, 72.0));
        if ui.add(start).clicked() {
            self.trainer.press_start(now);
        }
    }

    fn finished_screen(&mut self, ui: &mut Ui, now: Instant) {
        ui.label(RichText::new("FINISHED!").size(64.0).strong());
        if let Some(elapsed) = self.trainer.session().elapsed(now) {
            ui.label(RichText::new(format_elapsed(elapsed)).size(64.0).strong());
        }
        ui.add_space(24.0);
        let replay = Button::new(RichText::new("REPLAY").size(28.0).strong()).min_size(Vec2::new(180.0, 72.0));
        if ui.add(replay).clicked() {
            self.trainer.replay(now);
        }
    }

    fn piano(&mut self, ui: &mut Ui) {
        let layout = key_layout(self.keyboard.keys());
        let whites = layout.iter().filter(|(note, _)| !note.pitch_class().is_accidental()).count();
        let size = Vec2::new(
            whites as f32 * (WHITE_KEY_SIZE.x + KEY_GAP),
            WHITE_KEY_SIZE.y + PROGRESS_HEIGHT,
        );
        let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
        let origin = response.rect.min;

        let progress_width = size.x * self.trainer.session().progress();
        painter.rect_filled(
            Rect::from_min_size(origin, Vec2::new(size.x, PROGRESS_HEIGHT)),
            Rounding::ZERO,
            Color32::from_gray(0x44),
        );
        painter.rect_filled(
            Rect::from_min_size(origin, Vec2::new(progress_width, PROGRESS_HEIGHT)),
            Rounding::ZERO,
            SUCCESS,
        );

        let keys_origin = origin + Vec2::new(0.0, PROGRESS_HEIGHT);
        for (note, rect) in layout.iter().map(|(n, r)| (*n, r.translate(keys_origin.to_vec2()))) {
            let black = note.pitch_class().is_accidental();
            let state = self.trainer.key_state(note);
            painter.rect_filled(
                rect,
                Rounding { nw: 0.0, ne: 0.0, sw: 3.0, se: 3.0 },
                if black { Color32::BLACK } else { WHITE_KEY },
            );
            if let Some(shortcut) = self.keyboard.shortcut_for(note) {
                painter.text(
                    rect.center_bottom() - Vec2::new(0.0, 40.0),
                    Align2::CENTER_BOTTOM,
                    shortcut.to_ascii_uppercase(),
                    FontId::proportional(16.0),
                    if black { Color32::from_gray(0xDB) } else { Color32::BLACK },
                );
            }
            if state.held {
                painter.circle_filled(
                    rect.center_bottom() - Vec2::new(0.0, 24.0),
                    8.0,
                    if state.correct { SUCCESS } else { ERROR },
                );
            }
        }

        let (pressed, down, position) =
            ui.input(|i| (i.pointer.primary_pressed(), i.pointer.primary_down(), i.pointer.interact_pos()));
        let key = position.and_then(|pos| key_at(&layout, pos - keys_origin.to_vec2()));
        let held = self.trainer.aggregator().snapshot();
        if pressed {
            self.keyboard.pointer_pressed(key.filter(|_| response.hovered()), &held);
        } else if down {
            self.keyboard.pointer_entered(key, &held);
        } else {
            self.keyboard.pointer_released();
        }
    }
}

/// Key rectangles relative to the top-left corner of the keyboard, white keys first
/// so black keys paint on top.
fn key_layout(keys: &[Note]) -> Vec<(Note, Rect)> {
    let mut whites = Vec::new();
    let mut blacks = Vec::new();
    let mut white_index = 0usize;

    for &note in keys {
        let x = white_index as f32 * (WHITE_KEY_SIZE.x + KEY_GAP);
        if note.pitch_class().is_accidental() {
            let center = x - KEY_GAP / 2.0;
            let rect = Rect::from_min_size(Pos2::new(center - BLACK_KEY_SIZE.x / 2.0, 0.0), BLACK_KEY_SIZE);
            blacks.push((note, rect));
        } else {
            whites.push((note, Rect::from_min_size(Pos2::new(x, 0.0), WHITE_KEY_SIZE)));
            white_index += 1;
        }
    }

    whites.extend(blacks);
    whites
}

/// Topmost key under `pos`: black keys win over the white keys they cover.
fn key_at(layout: &[(Note, Rect)], pos: Pos2) -> Option<Note> {
    layout
        .iter()
        .rev()
        .find(|(_, rect)| rect.contains(pos))
        .map(|(note, _)| *note)
}

impl App for TrainerApp {
    fn update(&mut self, ctx: &Context, _: &mut eframe::Frame) {
        let now = Instant::now();
        self.handle_shortcuts(ctx);
        self.trainer.pump(now);

        let phase = self.trainer.session().phase();
        let background = if phase == Phase::Playing(Round::Correct) {
            SUCCESS
        } else {
            BACKGROUND
        };

        CentralPanel::default()
            .frame(Frame::default().fill(background).inner_margin(24.0))
            .show(ctx, |ui| {
                ui.visuals_mut().override_text_color = Some(Color32::WHITE);

                if phase.is_playing() {
                    if let Some(elapsed) = self.trainer.session().elapsed(now) {
                        ui.with_layout(Layout::right_to_left(Align::Min), |ui| {
                            ui.label(RichText::new(format_elapsed(elapsed)).size(32.0).strong());
                        });
                    }
                }

                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() * 0.15);
                    match phase {
                        Phase::Config => self.config_screen(ui, now),
                        Phase::Starting(step) => {
                            ui.label(RichText::new(step.digit().to_string()).size(100.0).strong());
                        }
                        Phase::Playing(_) => {
                            if let Some(chord) = &self.trainer.session().context().current_chord {
                                ui.label(RichText::new(chord.name()).size(120.0).strong());
                            }
                        }
                        Phase::Finished => self.finished_screen(ui, now),
                    }
                    ui.add_space(48.0);
                    self.piano(ui);
                });
            });

        // Apply whatever this frame's gestures queued.
        self.trainer.pump(Instant::now());

        if let Some(deadline) = self.trainer.session().next_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
        }
        if self.trainer.session().is_clock_running() {
            ctx.request_repaint_after(TIMER_POLL);
        }
        if self.listener.is_some() {
            ctx.request_repaint_after(MIDI_POLL);
        }
    }
}

/// Opens the trainer window and blocks until it is closed.
pub fn run_ui(trainer: Trainer, keys: Vec<Note>, midi: MidiStatus, midi_input: Option<usize>) -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Chord Trainer",
        options,
        Box::new(move |_cc: &CreationContext| Ok(Box::new(TrainerApp::new(trainer, keys, midi, midi_input)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_keys_sit_between_white_keys_and_win_hit_tests() {
        let keys = Note::range("C4".parse().unwrap(), "E4".parse().unwrap());
        let layout = key_layout(&keys);
        assert_eq!(layout.len(), 5);

        let c_sharp: Note = "C#4".parse().unwrap();
        let boundary = WHITE_KEY_SIZE.x + KEY_GAP / 2.0;
        assert_eq!(key_at(&layout, Pos2::new(boundary, 10.0)), Some(c_sharp));
        assert_eq!(
            key_at(&layout, Pos2::new(boundary - 10.0, WHITE_KEY_SIZE.y - 10.0)),
            Some("C4".parse::<Note>().unwrap())
        );
        assert_eq!(key_at(&layout, Pos2::new(-5.0, 10.0)), None);
    }
}
