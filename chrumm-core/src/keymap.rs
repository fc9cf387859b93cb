//! Keymap definitions for the Chrumm.
//!
//! The matrix has 5 rows of 13 columns. Every position carries a usage in
//! both layers; there is no transparency, the FN layer spells out the keys
//! it shares with the base layer.

use crate::config::{COLS, KEYS};
use crate::layer::Layer;
use crate::usage::{self as u, Usage};

/// Number of layers.
pub const NUM_LAYERS: usize = 2;

/// One usage per linear matrix index (`row * COLS + col`), per layer.
pub type Keymap = [[Usage; KEYS]; NUM_LAYERS];

/// Shorthand aliases for readability.
const ___: Usage = u::NONE;
const FN_: Usage = u::FN;
const BSP: Usage = u::BKSP;
const ENT: Usage = u::ENTER;
const SPC: Usage = u::SPACE;
const LSF: Usage = u::LSHFT;
const RSF: Usage = u::RSHFT;
const LCT: Usage = u::LCTRL;
const LGU: Usage = u::LGUI;
const LAL: Usage = u::LALT;
const RAL: Usage = u::RALT;

/// Keymap layers.
///
/// Layer 0: QWERTY, arrows bottom right, FN on the caps lock position.
/// Layer 1: F-keys, keypad, media and the boot key.
#[rustfmt::skip]
pub static LAYERS: Keymap = [
    // Layer 0: Base
    [
        u::ESC, u::N1,  u::N2,  u::N3,  u::N4,  u::N5,  u::N6,  u::N7,  u::N8,    u::N9,  u::N0,    u::MINUS, u::EQUAL,
        u::TAB, u::Q,   u::W,   u::E,   u::R,   u::T,   u::Y,   u::U,   u::I,     u::O,   u::P,     u::LBRAC, u::RBRAC,
        FN_,    u::A,   u::S,   u::D,   u::F,   u::G,   u::H,   u::J,   u::K,     u::L,   u::COLON, u::QUOTE, u::BKSL,
        LSF,    u::Z,   u::X,   u::C,   u::V,   u::B,   u::N,   u::M,   u::COMMA, u::DOT, u::SLASH, u::UP,    RSF,
        LCT,    ___,    LGU,    LAL,    SPC,    BSP,    ENT,    SPC,    RAL,      u::DEL, u::LEFT,  u::DOWN,  u::RIGHT,
    ],

    // Layer 1: Fn
    [
        u::TILDE, u::F7,     u::F8,     u::F9,      u::F10,    u::F11,     u::F12,    u::KP_7, u::KP_8,   u::KP_9,   u::KP_SUB, u::BKSP,    u::ESC,
        u::CAPLK, u::F1,     u::F2,     u::F3,      u::F4,     u::F5,      u::F6,     u::KP_4, u::KP_5,   u::KP_6,   u::KP_ADD, u::KP_LPAR, u::KP_RPAR,
        FN_,      u::C_PLAY, u::C_PREV, u::C_PAUSE, u::C_NEXT, u::C_STOP,  ___,       u::KP_1, u::KP_2,   u::KP_3,   u::KP_DIV, ___,         ___,
        LSF,      u::BOOT,   ___,       u::C_CALC,  ___,       u::MUTE,    u::NUMLK,  u::KP_0, u::KP_DOT, u::KP_ENT, u::KP_MUL, u::PGUP,    RSF,
        LCT,      ___,       LGU,       LAL,        SPC,       BSP,        ENT,       SPC,     RAL,       u::INS,    u::HOME,   u::PGDN,    u::END,
    ],
];

/// Linear matrix index of a switch.
pub const fn index(row: usize, col: usize) -> usize {
    row * COLS + col
}

/// Look up the usage at a linear matrix index.
pub fn lookup(keymap: &Keymap, layer: Layer, key: usize) -> Usage {
    keymap[layer as usize][key]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_is_top_left() {
        assert_eq!(lookup(&LAYERS, Layer::Base, index(0, 0)), u::ESC);
        assert_eq!(lookup(&LAYERS, Layer::Fn, index(0, 0)), u::TILDE);
    }

    #[test]
    fn fn_key_sits_in_both_layers() {
        let key = index(2, 0);
        assert_eq!(lookup(&LAYERS, Layer::Base, key), u::FN);
        assert_eq!(lookup(&LAYERS, Layer::Fn, key), u::FN);
    }

    #[test]
    fn boot_key_is_only_reachable_from_fn() {
        let boot: usize = (0..KEYS).filter(|&k| LAYERS[1][k] == u::BOOT).count();
        assert_eq!(boot, 1);
        assert!(!LAYERS[0].contains(&u::BOOT));
    }
}
