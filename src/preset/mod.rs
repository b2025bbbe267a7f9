//! Saved effect state and preset banks

pub mod bank;
pub mod state;

pub use bank::{load_bank, parse_bank, Bank, Preset};
pub use state::{State, StateSlider};
