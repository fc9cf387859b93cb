//! The per-tick control loop.

use log::{debug, info};

use crate::config::{TICK_INTERVAL_US, WATCHDOG_TIMEOUT_MS};
use crate::encoder::Encoder;
use crate::hal::{Gpio, System, UsbTransport};
use crate::hid::HidReports;
use crate::keymap::{Keymap, LAYERS};
use crate::layer::{Action, LayerState};
use crate::led::{self, Blink};
use crate::matrix::Matrix;

/// Everything the firmware owns, wired to one board.
pub struct Keyboard<G, U, S> {
    gpio: G,
    usb: U,
    system: S,
    matrix: Matrix,
    encoder: Encoder,
    layers: LayerState,
    hid: HidReports,
    led: Blink,
    suspended: bool,
}

impl<G: Gpio, U: UsbTransport, S: System> Keyboard<G, U, S> {
    pub fn new(gpio: G, usb: U, system: S) -> Self {
        Self::with_keymap(gpio, usb, system, &LAYERS)
    }

    pub fn with_keymap(gpio: G, usb: U, system: S, keymap: &'static Keymap) -> Self {
        Self {
            gpio,
            usb,
            system,
            matrix: Matrix::new(),
            encoder: Encoder::new(),
            layers: LayerState::new(keymap),
            hid: HidReports::new(),
            led: Blink::new(),
            suspended: false,
        }
    }

    /// Configure the pins, arm the watchdog and start the tick timer.
    pub fn init(&mut self) {
        self.matrix.init(&mut self.gpio);
        self.encoder.init(&mut self.gpio);
        self.led.init(&mut self.gpio);
        self.system.arm_watchdog(WATCHDOG_TIMEOUT_MS);
        self.system.start_ticks(TICK_INTERVAL_US);
        info!("keyboard ready, tick {}us", TICK_INTERVAL_US);
    }

    /// One pass over every subsystem. Does not wait.
    pub fn tick(&mut self) {
        let Self {
            gpio,
            usb,
            system,
            matrix,
            layers,
            hid,
            ..
        } = self;

        matrix.scan(gpio, |key, pressed| {
            if layers.on_key(key, pressed, hid, usb) == Action::EnterBootloader {
                system.enter_bootloader();
            }
        });

        self.encoder.tick(&self.gpio, &mut self.hid, &mut self.usb);
        self.hid.flush(&mut self.usb);
        self.update_led();
        self.usb.task();
        self.system.pet_watchdog();
    }

    /// Run forever, one tick per interval.
    pub fn run(mut self) -> ! {
        self.init();
        loop {
            self.tick();
            self.system.wait_for_tick();
        }
    }

    fn update_led(&mut self) {
        if let Some(leds) = self.usb.take_led_report() {
            debug!("host leds {:#04X}", leds);
            self.led.set_pattern(led::pattern_for(leds));
        }

        let suspended = self.usb.is_suspended();
        if suspended && !self.suspended {
            debug!("bus suspended");
            self.led.set_pattern(0);
        }
        self.suspended = suspended;

        self.led.tick(&mut self.gpio);
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    pub fn gpio_mut(&mut self) -> &mut G {
        &mut self.gpio
    }

    pub fn usb(&self) -> &U {
        &self.usb
    }

    pub fn usb_mut(&mut self) -> &mut U {
        &mut self.usb
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn hid(&self) -> &HidReports {
        &self.hid
    }

    pub fn layers(&self) -> &LayerState {
        &self.layers
    }

    pub fn led(&self) -> &Blink {
        &self.led
    }
}
