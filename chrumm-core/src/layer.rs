//! Layer selection and tap sequences.
//!
//! The FN key is momentary: holding it selects the FN layer, releasing it
//! returns to the base layer. Tapping it twice locks the FN layer until it
//! is tapped once more. The boot key resets into the bootloader after
//! three consecutive taps. Any ordinary key press cancels pending taps.

use log::{debug, info};

use crate::config::{BOOT_KEY_TAPS, FN_KEY_TAPS};
use crate::hal::UsbTransport;
use crate::hid::HidReports;
use crate::keymap::{self, Keymap};
use crate::usage::{self, Usage};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Layer {
    #[default]
    Base = 0,
    Fn = 1,
}

impl Layer {
    pub const fn other(self) -> Self {
        match self {
            Layer::Base => Layer::Fn,
            Layer::Fn => Layer::Base,
        }
    }
}

/// What the caller has to do after a key edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum Action {
    Continue,
    EnterBootloader,
}

pub struct LayerState {
    keymap: &'static Keymap,
    layer: Layer,
    fn_held: bool,
    fn_taps: u8,
    boot_taps: u8,
}

impl LayerState {
    pub const fn new(keymap: &'static Keymap) -> Self {
        Self {
            keymap,
            layer: Layer::Base,
            fn_held: false,
            fn_taps: 0,
            boot_taps: 0,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// FN layer selected with no FN key held, i.e. locked by a double tap.
    pub fn is_locked(&self) -> bool {
        self.layer == Layer::Fn && !self.fn_held
    }

    /// Handle a debounced edge of the switch at linear index `key`.
    pub fn on_key(
        &mut self,
        key: usize,
        pressed: bool,
        hid: &mut HidReports,
        usb: &mut impl UsbTransport,
    ) -> Action {
        let active = keymap::lookup(self.keymap, self.layer, key);
        let inactive = keymap::lookup(self.keymap, self.layer.other(), key);

        if active == usage::FN || inactive == usage::FN {
            self.on_fn_key(pressed);
        } else if !pressed {
            // The layer may have changed since the press, so clear both.
            hid.release(active);
            hid.release(inactive);
        } else if active == Usage::Boot {
            self.boot_taps += 1;
            debug!("boot tap {}/{}", self.boot_taps, BOOT_KEY_TAPS);
            if self.boot_taps >= BOOT_KEY_TAPS {
                info!("entering bootloader");
                return Action::EnterBootloader;
            }
        } else {
            debug!("key {} -> {:?}", key, active);
            hid.assert(active, usb);
            self.fn_taps = 0;
            self.boot_taps = 0;
        }

        Action::Continue
    }

    fn on_fn_key(&mut self, pressed: bool) {
        self.fn_held = pressed;
        if pressed {
            self.fn_taps = self.fn_taps.saturating_add(1);
            self.set_layer(Layer::Fn);
            return;
        }

        if self.fn_taps != FN_KEY_TAPS {
            self.set_layer(Layer::Base);
        } else {
            info!("fn layer locked");
        }
        if self.fn_taps > FN_KEY_TAPS {
            self.fn_taps = 0;
        }
    }

    fn set_layer(&mut self, layer: Layer) {
        if layer != self.layer {
            debug!("layer {:?} -> {:?}", self.layer, layer);
            self.layer = layer;
        }
    }
}
