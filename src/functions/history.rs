//! Functions that remember previous frames.

use super::{ArgumentValidation, Function, frame_count};
use crate::expression::Expression;
use crate::runtime::InputRuntime;
use crate::{ControlState, is_pressed};
use std::collections::VecDeque;

/// Longest delay or window any history function keeps.
const MAX_HISTORY_FRAMES: usize = 1 << 16;

/// Longest recording `record` keeps; frames past this are dropped.
const MAX_RECORDING_FRAMES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Average,
    Sum,
}

/// `average(input, frames)` and `sum(input, frames)` over the trailing window.
///
/// The window only covers frames actually seen, so the first outputs are not
/// diluted by zeros.
#[derive(Debug)]
pub(crate) struct Window {
    reduction: Reduction,
    values: VecDeque<ControlState>,
}

impl Window {
    pub(crate) fn average() -> Self {
        Self { reduction: Reduction::Average, values: VecDeque::new() }
    }

    pub(crate) fn sum() -> Self {
        Self { reduction: Reduction::Sum, values: VecDeque::new() }
    }
}

impl Function for Window {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=2, "input, frames")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let window = frame_count(args[1].get_value()).min(MAX_HISTORY_FRAMES);

        self.values.push_back(value);
        while self.values.len() > window {
            self.values.pop_front();
        }

        let total: ControlState = self.values.iter().sum();
        match self.reduction {
            Reduction::Sum => total,
            Reduction::Average => total / self.values.len() as ControlState,
        }
    }
}

/// `lag(input, frames)`: the input as it was `frames` frames ago, 0 until that
/// much history exists.
#[derive(Debug, Default)]
pub(crate) struct Lag {
    history: VecDeque<ControlState>,
}

impl Function for Lag {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2..=2, "input, frames")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let frames = args[1].get_value();
        let frames = if frames.is_finite() && frames > 0.0 {
            (frames.round() as usize).min(MAX_HISTORY_FRAMES)
        } else {
            0
        };

        self.history.push_back(value);
        while self.history.len() > frames + 1 {
            self.history.pop_front();
        }
        if self.history.len() > frames { self.history.pop_front().unwrap_or_default() } else { 0.0 }
    }
}

/// `record(input, record, play)`.
///
/// While `record` is held the input is captured (a new press starts a new
/// recording). Each press of `play` replays the capture once. Otherwise the
/// input passes through unchanged.
#[derive(Debug, Default)]
pub(crate) struct Record {
    recording: Vec<ControlState>,
    was_recording: bool,
    was_playing: bool,
    cursor: Option<usize>,
}

impl Function for Record {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 3..=3, "input, record_input, play_input")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let value = args[0].get_value();
        let recording = is_pressed(args[1].get_value());
        let playing = is_pressed(args[2].get_value());

        let record_pressed = recording && !self.was_recording;
        let play_pressed = playing && !self.was_playing;
        self.was_recording = recording;
        self.was_playing = playing;

        if recording {
            if record_pressed {
                self.recording.clear();
                self.cursor = None;
            }
            if self.recording.len() < MAX_RECORDING_FRAMES {
                self.recording.push(value);
            }
            return value;
        }

        if play_pressed && !self.recording.is_empty() {
            self.cursor = Some(0);
        }

        match self.cursor {
            Some(index) if index < self.recording.len() => {
                self.cursor = Some(index + 1);
                self.recording[index]
            }
            _ => {
                self.cursor = None;
                value
            }
        }
    }
}

/// `sequence(trigger, v1, v2, ...)`: outputs `v1`, `v2`, ... on consecutive
/// frames after each press of `trigger`, then 0.
#[derive(Debug, Default)]
pub(crate) struct Sequence {
    was_pressed: bool,
    position: Option<usize>,
}

impl Function for Sequence {
    fn validate(&self, args: &[Expression]) -> ArgumentValidation {
        arity!(args, 2.., "trigger, value, [value...]")
    }

    fn get_value(&mut self, args: &mut [Expression], _: &InputRuntime) -> ControlState {
        let pressed = is_pressed(args[0].get_value());
        let values: Vec<ControlState> = args[1..].iter_mut().map(Expression::get_value).collect();

        if pressed && !self.was_pressed {
            self.position = Some(0);
        }
        self.was_pressed = pressed;

        match self.position {
            Some(index) if index < values.len() => {
                self.position = Some(index + 1);
                values[index]
            }
            _ => {
                self.position = None;
                0.0
            }
        }
    }
}
