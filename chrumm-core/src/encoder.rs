//! Rotary encoder (EC11) decoding.
//!
//! The two phase lines are decoded with a small state machine driven by a
//! lookup table. A rotation is only reported when the signal walks through
//! the complete sequence from one detent to the next, which filters out
//! contact bounce without extra hardware.
//!
//! ```text
//! EC11 quadrature signal
//!
//! _|_  |   |  _|___ A pin
//!  | \_|___|_/ |
//! _|___|_  |   |  _ B pin
//!  |   | \_|___|_/
//! 11  01  00  10    AB
//!
//! Signal state machine
//!
//! .---. <-01.---. <-00.---. <-10.---.01-> .---.00-> .---.10-> .---.
//! |001|     |000|     |010|     |   |     |101|     |100|     |110|
//! '---'00-> '---'10-> '---'11-> |011| <-11'---' <-01'---' <-00'---'
//! 11                            |   |                            11
//! '-------------CCW EVENT-----> '---' <-----CW EVENT--------------'
//! ```

use log::debug;

use crate::config::{ENCODER_A_PIN, ENCODER_B_PIN, ENCODER_CCW_USAGE, ENCODER_CW_USAGE, ENCODER_KEYPRESS_TICKS};
use crate::hal::{Direction, Gpio, Pull, UsbTransport};
use crate::hid::HidReports;
use crate::usage::Usage;

/// Next state, indexed by `state << 2 | A << 1 | B`.
#[rustfmt::skip]
const NEXT: [u8; 28] = [
    0b000, 0b001, 0b010, 0b000, // 000AB
    0b000, 0b001, 0b001, 0b011, // 001AB
    0b000, 0b010, 0b010, 0b011, // 010AB
    0b011, 0b101, 0b010, 0b011, // 011AB
    0b100, 0b101, 0b110, 0b100, // 100AB
    0b100, 0b101, 0b101, 0b011, // 101AB
    0b100, 0b110, 0b110, 0b011, // 110AB
];

/// Detent, both lines high.
const REST: u8 = 0b011;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Quadrature state machine, independent of any pins.
#[derive(Debug)]
pub struct Quadrature {
    state: u8,
}

impl Default for Quadrature {
    fn default() -> Self {
        Self::new()
    }
}

impl Quadrature {
    pub const fn new() -> Self {
        Self { state: REST }
    }

    /// Feed one sample of the raw line levels.
    pub fn update(&mut self, a: bool, b: bool) -> Option<Rotation> {
        let index = self.state << 2 | (a as u8) << 1 | b as u8;
        self.state = NEXT[index as usize];

        match index {
            0b00111 => Some(Rotation::CounterClockwise),
            0b11011 => Some(Rotation::Clockwise),
            _ => None,
        }
    }
}

/// Turns detents into short key presses.
///
/// Each detent holds its usage for a fixed number of ticks so the host
/// sees a distinct press, then releases it. A detent that arrives while a
/// press is still held waits in a single pending slot and is pressed on the
/// tick after the release; the newest detent wins that slot.
#[derive(Debug)]
pub struct Pulse {
    held: Usage,
    pending: Usage,
    remaining: u16,
}

impl Default for Pulse {
    fn default() -> Self {
        Self::new()
    }
}

impl Pulse {
    pub const fn new() -> Self {
        Self {
            held: Usage::None,
            pending: Usage::None,
            remaining: 0,
        }
    }

    pub fn held(&self) -> Usage {
        self.held
    }

    /// Advance one tick. `usage` is the usage of this tick's detent, or
    /// `Usage::None` if there was none.
    pub fn update(&mut self, usage: Usage, hid: &mut HidReports, usb: &mut impl UsbTransport) {
        if usage != Usage::None {
            self.pending = usage;
        }

        if self.remaining > 0 {
            self.remaining -= 1;
        } else if self.held != Usage::None {
            // Release on a tick of its own so a repeat of the same usage
            // reaches the host as a second press.
            hid.release(self.held);
            self.held = Usage::None;
        } else if self.pending != Usage::None {
            hid.assert(self.pending, usb);
            self.held = self.pending;
            self.pending = Usage::None;
            self.remaining = ENCODER_KEYPRESS_TICKS;
        }
    }
}

/// Rotary encoder wired to two pulled-up input pins.
#[derive(Debug, Default)]
pub struct Encoder {
    quadrature: Quadrature,
    pulse: Pulse,
}

impl Encoder {
    pub const fn new() -> Self {
        Self {
            quadrature: Quadrature::new(),
            pulse: Pulse::new(),
        }
    }

    pub fn init(&mut self, gpio: &mut impl Gpio) {
        gpio.configure_pin(ENCODER_A_PIN, Direction::Input, Pull::Up);
        gpio.configure_pin(ENCODER_B_PIN, Direction::Input, Pull::Up);
    }

    /// Sample both lines and update the held usage.
    pub fn tick(&mut self, gpio: &impl Gpio, hid: &mut HidReports, usb: &mut impl UsbTransport) {
        let a = gpio.read_pin(ENCODER_A_PIN);
        let b = gpio.read_pin(ENCODER_B_PIN);

        let usage = match self.quadrature.update(a, b) {
            Some(Rotation::Clockwise) => {
                debug!("encoder cw");
                ENCODER_CW_USAGE
            }
            Some(Rotation::CounterClockwise) => {
                debug!("encoder ccw");
                ENCODER_CCW_USAGE
            }
            None => Usage::None,
        };

        self.pulse.update(usage, hid, usb);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Endpoint;
    use crate::hid::{ConsumerReport, KeyboardReport};

    const CW: [(bool, bool); 4] = [(false, true), (false, false), (true, false), (true, true)];
    const CCW: [(bool, bool); 4] = [(true, false), (false, false), (false, true), (true, true)];

    fn run(q: &mut Quadrature, samples: &[(bool, bool)]) -> [usize; 2] {
        // [cw, ccw]
        let mut counts = [0; 2];
        for &(a, b) in samples {
            match q.update(a, b) {
                Some(Rotation::Clockwise) => counts[0] += 1,
                Some(Rotation::CounterClockwise) => counts[1] += 1,
                None => {}
            }
        }
        counts
    }

    #[test]
    fn one_event_per_clockwise_detent() {
        let mut q = Quadrature::new();
        for _ in 0..5 {
            assert_eq!(run(&mut q, &CW), [1, 0]);
        }
    }

    #[test]
    fn one_event_per_counter_clockwise_detent() {
        let mut q = Quadrature::new();
        for _ in 0..5 {
            assert_eq!(run(&mut q, &CCW), [0, 1]);
        }
    }

    #[test]
    fn event_fires_on_arrival_at_the_detent() {
        let mut q = Quadrature::new();
        assert_eq!(q.update(false, true), None);
        assert_eq!(q.update(false, false), None);
        assert_eq!(q.update(true, false), None);
        assert_eq!(q.update(true, true), Some(Rotation::Clockwise));
    }

    #[test]
    fn repeated_samples_do_not_advance() {
        let mut q = Quadrature::new();
        let slow: [(bool, bool); 12] = core::array::from_fn(|i| CW[i / 3]);
        assert_eq!(run(&mut q, &slow), [1, 0]);
    }

    #[test]
    fn bounce_back_to_the_detent_is_absorbed() {
        let mut q = Quadrature::new();
        // Leaves the detent and falls back, twice, before a real turn.
        let samples = [(false, true), (true, true), (true, false), (true, true)];
        assert_eq!(run(&mut q, &samples), [0, 0]);
        assert_eq!(run(&mut q, &CW), [1, 0]);
    }

    #[test]
    fn single_bit_glitches_produce_no_events() {
        let mut q = Quadrature::new();
        // Half a clockwise turn, a glitch on each line, then back home.
        let samples = [
            (false, true),
            (false, false),
            (false, true),
            (false, false),
            (true, false),
            (false, false),
            (false, true),
            (true, true),
        ];
        assert_eq!(run(&mut q, &samples), [0, 0]);
    }

    struct Host;

    impl UsbTransport for Host {
        fn is_suspended(&self) -> bool {
            false
        }
        fn request_remote_wakeup(&mut self) {}
        fn endpoint_ready(&self, _: Endpoint) -> bool {
            true
        }
        fn send_keyboard_report(&mut self, _: &KeyboardReport) -> bool {
            true
        }
        fn send_consumer_report(&mut self, _: &ConsumerReport) -> bool {
            true
        }
        fn take_led_report(&mut self) -> Option<u8> {
            None
        }
        fn task(&mut self) {}
    }

    #[test]
    fn pulse_holds_for_the_keypress_time() {
        let (mut pulse, mut hid, mut usb) = (Pulse::new(), HidReports::new(), Host);
        pulse.update(ENCODER_CW_USAGE, &mut hid, &mut usb);
        assert_eq!(pulse.held(), ENCODER_CW_USAGE);
        assert_eq!(hid.consumer().usage, 0x00E9);

        for _ in 0..ENCODER_KEYPRESS_TICKS {
            pulse.update(Usage::None, &mut hid, &mut usb);
        }
        assert_eq!(pulse.held(), ENCODER_CW_USAGE);

        pulse.update(Usage::None, &mut hid, &mut usb);
        assert_eq!(pulse.held(), Usage::None);
        assert_eq!(hid.consumer().usage, 0);
    }

    #[test]
    fn detent_during_a_hold_waits_for_the_release() {
        let (mut pulse, mut hid, mut usb) = (Pulse::new(), HidReports::new(), Host);
        pulse.update(ENCODER_CW_USAGE, &mut hid, &mut usb);
        pulse.update(ENCODER_CCW_USAGE, &mut hid, &mut usb);
        assert_eq!(pulse.held(), ENCODER_CW_USAGE);

        for _ in 1..ENCODER_KEYPRESS_TICKS {
            pulse.update(Usage::None, &mut hid, &mut usb);
        }
        // Release tick.
        pulse.update(Usage::None, &mut hid, &mut usb);
        assert_eq!(pulse.held(), Usage::None);
        assert_eq!(hid.consumer().usage, 0);

        pulse.update(Usage::None, &mut hid, &mut usb);
        assert_eq!(pulse.held(), ENCODER_CCW_USAGE);
        assert_eq!(hid.consumer().usage, 0x00EA);
    }

    #[test]
    fn reversal_mid_step_emits_the_completed_direction_only() {
        let mut q = Quadrature::new();
        // Start clockwise, reverse after two phases.
        let samples = [(false, true), (false, false), (false, true), (true, true)];
        assert_eq!(run(&mut q, &samples), [0, 0]);
        assert_eq!(run(&mut q, &CCW), [0, 1]);
        assert_eq!(run(&mut q, &CW), [1, 0]);
    }
}
