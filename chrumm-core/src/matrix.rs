//! Key matrix scanning.
//!
//! ```text
//!                          Pullup
//!               Switch  .--[ R ]-- V+
//!        Diode  __|__   |
//!  Row ---|<|---O   O---+--------- Column
//! ```
//!
//! Columns are pulled up and read high by default. All rows idle high;
//! during the scan one row at a time is driven low, and a pressed switch
//! on that row grounds its column.

use crate::config::{COLS, COL_PINS, KEYS, PIN_SETTLE_TIME_US, ROWS, ROW_PINS};
use crate::debounce::Debouncer;
use crate::hal::{Direction, Gpio, Pull};
use crate::keymap;

pub struct Matrix {
    switches: [Debouncer; KEYS],
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

impl Matrix {
    pub const fn new() -> Self {
        Self {
            switches: [Debouncer::new(); KEYS],
        }
    }

    /// Rows as outputs driven high, columns as pulled-up inputs.
    pub fn init(&self, gpio: &mut impl Gpio) {
        for &pin in &ROW_PINS {
            gpio.configure_pin(pin, Direction::Output, Pull::None);
            gpio.write_pin(pin, true);
        }

        for &pin in &COL_PINS {
            gpio.configure_pin(pin, Direction::Input, Pull::Up);
        }
    }

    /// Debounced state of the switch at linear index `key`.
    pub fn is_pressed(&self, key: usize) -> bool {
        self.switches[key].is_pressed()
    }

    /// Sample every switch once and report debounced edges as
    /// `on_edge(key, pressed)`, in scan order.
    pub fn scan(&mut self, gpio: &mut impl Gpio, mut on_edge: impl FnMut(usize, bool)) {
        for (row, &row_pin) in ROW_PINS.iter().enumerate() {
            gpio.write_pin(row_pin, false);
            gpio.delay_us(PIN_SETTLE_TIME_US);

            for (col, &col_pin) in COL_PINS.iter().enumerate() {
                let key = keymap::index(row, col);
                let pressed = !gpio.read_pin(col_pin);
                if let Some(pressed) = self.switches[key].update(pressed) {
                    on_edge(key, pressed);
                }
            }

            gpio.write_pin(row_pin, true);
        }
    }
}

const _: () = assert!(KEYS == ROWS * COLS && ROW_PINS.len() == ROWS && COL_PINS.len() == COLS);
