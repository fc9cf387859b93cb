//! Pin access on the Teensy 2.0.
//!
//! Pins are numbered `port * 8 + bit` with ports B, C, D, E, F = 0..=4,
//! the numbering `chrumm_core::config` uses.

use avr_device::atmega32u4::{PORTB, PORTC, PORTD, PORTE, PORTF};
use chrumm_core::hal::{Direction, Gpio, Pull};

/// Clock cycles per microsecond at 16MHz.
const CYCLES_PER_US: u32 = 16;

pub struct Pins {
    portb: PORTB,
    portc: PORTC,
    portd: PORTD,
    porte: PORTE,
    portf: PORTF,
}

impl Pins {
    pub fn new(portb: PORTB, portc: PORTC, portd: PORTD, porte: PORTE, portf: PORTF) -> Self {
        Self {
            portb,
            portc,
            portd,
            porte,
            portf,
        }
    }

    fn modify_ddr(&self, port: u8, f: impl Fn(u8) -> u8) {
        match port {
            0 => self.portb.ddrb.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            1 => self.portc.ddrc.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            2 => self.portd.ddrd.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            3 => self.porte.ddre.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            4 => self.portf.ddrf.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            _ => {}
        }
    }

    fn modify_port(&self, port: u8, f: impl Fn(u8) -> u8) {
        match port {
            0 => self.portb.portb.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            1 => self.portc.portc.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            2 => self.portd.portd.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            3 => self.porte.porte.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            4 => self.portf.portf.modify(|r, w| unsafe { w.bits(f(r.bits())) }),
            _ => {}
        }
    }

    fn input(&self, port: u8) -> u8 {
        match port {
            0 => self.portb.pinb.read().bits(),
            1 => self.portc.pinc.read().bits(),
            2 => self.portd.pind.read().bits(),
            3 => self.porte.pine.read().bits(),
            4 => self.portf.pinf.read().bits(),
            _ => 0xFF,
        }
    }
}

impl Gpio for Pins {
    fn configure_pin(&mut self, pin: u8, direction: Direction, pull: Pull) {
        let (port, mask) = (pin / 8, 1 << (pin % 8));
        match direction {
            Direction::Output => self.modify_ddr(port, |ddr| ddr | mask),
            Direction::Input => {
                self.modify_ddr(port, |ddr| ddr & !mask);
                // PORTx selects the pull-up on inputs.
                match pull {
                    Pull::Up => self.modify_port(port, |out| out | mask),
                    Pull::None => self.modify_port(port, |out| out & !mask),
                }
            }
        }
    }

    fn read_pin(&self, pin: u8) -> bool {
        self.input(pin / 8) & (1 << (pin % 8)) != 0
    }

    fn write_pin(&mut self, pin: u8, high: bool) {
        let mask = 1 << (pin % 8);
        if high {
            self.modify_port(pin / 8, |out| out | mask);
        } else {
            self.modify_port(pin / 8, |out| out & !mask);
        }
    }

    fn delay_us(&mut self, us: u32) {
        // Four cycles per iteration, loop overhead included.
        for _ in 0..us * CYCLES_PER_US / 4 {
            unsafe { core::arch::asm!("nop") };
        }
    }
}
