//! Board dimensions, pin assignments and timing constants.

use crate::usage::{self, Usage};

/// Number of rows in the matrix.
pub const ROWS: usize = 5;
/// Number of columns in the matrix.
pub const COLS: usize = 13;
/// Total number of switches.
pub const KEYS: usize = ROWS * COLS;

// Pins are numbered `port * 8 + bit` with ports B, C, D, E, F = 0..=4.

/// Row drive pins (outputs, active low): PB0-PB3, PB7.
pub const ROW_PINS: [u8; ROWS] = [0, 1, 2, 3, 7];
/// Column read pins (inputs with pull-ups): PF0, PF1, PF4-PF7, PB4-PB6, PC6, PC7, PD2, PD3.
pub const COL_PINS: [u8; COLS] = [32, 33, 36, 37, 38, 39, 4, 5, 6, 14, 15, 18, 19];

/// Encoder phase A (PD0).
pub const ENCODER_A_PIN: u8 = 16;
/// Encoder phase B (PD1).
pub const ENCODER_B_PIN: u8 = 17;

/// Status LED (Teensy 2.0 on-board LED, PD6).
pub const LED_PIN: u8 = 22;

/// Main loop period.
pub const TICK_INTERVAL_US: u32 = 500;
/// Time a freshly driven row needs before the columns can be read.
pub const PIN_SETTLE_TIME_US: u32 = 10;
/// Hang detection. Must be well above one tick.
pub const WATCHDOG_TIMEOUT_MS: u32 = 100;

/// Consecutive agreeing samples before a switch flips (8 ticks = 4ms).
pub const MATRIX_DEBOUNCE_TICKS: u8 = 8;
/// How long one encoder detent holds its usage.
pub const ENCODER_KEYPRESS_TICKS: u16 = 30;
/// Duration of one of the eight blink phases.
pub const LED_BLINK_TICKS: u16 = 500;

/// Taps on the FN key that lock the FN layer.
pub const FN_KEY_TAPS: u8 = 2;
/// Taps on the boot key that reset into the bootloader.
pub const BOOT_KEY_TAPS: u8 = 3;

pub const ENCODER_CW_USAGE: Usage = usage::C_VOLUP;
pub const ENCODER_CCW_USAGE: Usage = usage::C_VOLDN;
