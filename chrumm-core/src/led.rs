//! Status LED blinking.
//!
//! The LED shows the host's lock keys as one of four blink patterns. A
//! pattern is one byte, each bit one eighth of the blink cycle.

use crate::config::{LED_BLINK_TICKS, LED_PIN};
use crate::hal::{Direction, Gpio, Pull};

/// NumLock bit in the host's LED output report.
pub const NUM_LOCK: u8 = 1 << 0;
/// CapsLock bit in the host's LED output report.
pub const CAPS_LOCK: u8 = 1 << 1;

/// Pattern for the lock-key state reported by the host.
///
/// NumLock on, CapsLock off is the normal state and keeps the LED dark.
pub fn pattern_for(leds: u8) -> u8 {
    match leds & (NUM_LOCK | CAPS_LOCK) {
        0b00 => 0b0000_0001,
        0b01 => 0b0000_0000,
        0b10 => 0b1111_1110,
        _ => 0b1111_1111,
    }
}

#[derive(Debug)]
pub struct Blink {
    pattern: u8,
    index: u8,
    ticks: u16,
    lit: bool,
}

impl Default for Blink {
    fn default() -> Self {
        Self::new()
    }
}

impl Blink {
    pub const fn new() -> Self {
        Self {
            pattern: 0,
            index: 0,
            ticks: LED_BLINK_TICKS,
            lit: false,
        }
    }

    pub fn init(&self, gpio: &mut impl Gpio) {
        gpio.configure_pin(LED_PIN, Direction::Output, Pull::None);
        gpio.write_pin(LED_PIN, false);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Switch to a new pattern. The first phase shows on the next tick.
    pub fn set_pattern(&mut self, pattern: u8) {
        if pattern == self.pattern {
            return;
        }

        self.pattern = pattern;
        self.ticks = LED_BLINK_TICKS;
        self.index = 7;
    }

    /// Advance one tick and drive the LED pin on phase changes.
    pub fn tick(&mut self, gpio: &mut impl Gpio) {
        if self.pattern == 0 && !self.lit {
            return;
        }

        self.ticks += 1;
        if self.ticks < LED_BLINK_TICKS {
            return;
        }

        self.ticks = 0;
        self.index = (self.index + 1) & 0b111;
        self.lit = self.pattern & (1 << self.index) != 0;
        gpio.write_pin(LED_PIN, self.lit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Pin {
        high: bool,
        writes: usize,
    }

    impl Gpio for Pin {
        fn configure_pin(&mut self, _: u8, _: Direction, _: Pull) {}
        fn read_pin(&self, _: u8) -> bool {
            self.high
        }
        fn write_pin(&mut self, pin: u8, high: bool) {
            assert_eq!(pin, LED_PIN);
            self.high = high;
            self.writes += 1;
        }
        fn delay_us(&mut self, _: u32) {}
    }

    fn run(blink: &mut Blink, pin: &mut Pin, ticks: u16) {
        for _ in 0..ticks {
            blink.tick(pin);
        }
    }

    #[test]
    fn lock_keys_select_patterns() {
        assert_eq!(pattern_for(0), 0b0000_0001);
        assert_eq!(pattern_for(NUM_LOCK), 0);
        assert_eq!(pattern_for(CAPS_LOCK), 0b1111_1110);
        assert_eq!(pattern_for(NUM_LOCK | CAPS_LOCK), 0xFF);
        // Scroll lock and friends are ignored.
        assert_eq!(pattern_for(NUM_LOCK | 0b100), 0);
    }

    #[test]
    fn idle_without_pattern() {
        let mut blink = Blink::new();
        let mut pin = Pin::default();
        run(&mut blink, &mut pin, 5000);
        assert_eq!(pin.writes, 0);
    }

    #[test]
    fn new_pattern_shows_on_next_tick() {
        let mut blink = Blink::new();
        let mut pin = Pin::default();
        blink.set_pattern(0b0000_0001);
        run(&mut blink, &mut pin, 1);
        assert!(pin.high);
        assert!(blink.is_lit());
    }

    #[test]
    fn each_phase_lasts_blink_ticks() {
        let mut blink = Blink::new();
        let mut pin = Pin::default();
        blink.set_pattern(0b0000_0001);
        run(&mut blink, &mut pin, 1);
        run(&mut blink, &mut pin, LED_BLINK_TICKS - 1);
        assert!(pin.high);
        run(&mut blink, &mut pin, 1);
        assert!(!pin.high);

        // Seven dark phases, then lit again.
        run(&mut blink, &mut pin, LED_BLINK_TICKS * 7 - 1);
        assert!(!pin.high);
        run(&mut blink, &mut pin, 1);
        assert!(pin.high);
    }

    #[test]
    fn clearing_the_pattern_turns_the_led_off() {
        let mut blink = Blink::new();
        let mut pin = Pin::default();
        blink.set_pattern(0xFF);
        run(&mut blink, &mut pin, 1);
        assert!(pin.high);

        blink.set_pattern(0);
        run(&mut blink, &mut pin, 1);
        assert!(!pin.high);
        let writes = pin.writes;
        run(&mut blink, &mut pin, 5000);
        assert_eq!(pin.writes, writes);
    }
}
