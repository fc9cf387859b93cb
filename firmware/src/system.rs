//! Tick timer, watchdog and the jump into the HalfKay bootloader.

use avr_device::atmega32u4::{Peripherals, CPU, TC1, WDT};
use chrumm_core::hal::System;

/// Timer1 runs at F_CPU / 8 = 2MHz.
const TIMER_TICKS_PER_US: u32 = 2;

/// Supported watchdog periods in ms, indexed by the WDP3..0 value.
const WATCHDOG_PERIODS_MS: [u32; 10] = [16, 32, 64, 125, 250, 500, 1000, 2000, 4000, 8000];

// WDTCSR bits.
const WDP3: u8 = 1 << 5;
const WDCE: u8 = 1 << 4;
const WDE: u8 = 1 << 3;

// MCUSR bits.
const WDRF: u8 = 1 << 3;

// TCCR1B bits.
const WGM12: u8 = 1 << 3;
const CS11: u8 = 1 << 1;

// TIFR1 bits.
const OCF1A: u8 = 1 << 1;

pub struct Board {
    cpu: CPU,
    timer: TC1,
    watchdog: WDT,
}

impl Board {
    pub fn new(cpu: CPU, timer: TC1, watchdog: WDT) -> Self {
        Self {
            cpu,
            timer,
            watchdog,
        }
    }

    /// Run the CPU at the full 16MHz. The fuses leave the prescaler at /8.
    pub fn init_clock(&self) {
        self.cpu.clkpr.write(|w| w.clkpce().set_bit());
        self.cpu.clkpr.write(|w| unsafe { w.bits(0) });
    }

    fn write_watchdog(&self, value: u8) {
        avr_device::interrupt::free(|_| {
            avr_device::asm::wdr();
            self.cpu.mcusr.modify(|r, w| unsafe { w.bits(r.bits() & !WDRF) });
            // Timed sequence: the second write must follow within four cycles.
            self.watchdog.wdtcsr.write(|w| unsafe { w.bits(WDCE | WDE) });
            self.watchdog.wdtcsr.write(|w| unsafe { w.bits(value) });
        });
    }
}

/// WDP3..0 for the shortest period of at least `timeout_ms`.
fn watchdog_prescaler(timeout_ms: u32) -> u8 {
    let index = WATCHDOG_PERIODS_MS
        .iter()
        .position(|&period| period >= timeout_ms)
        .unwrap_or(WATCHDOG_PERIODS_MS.len() - 1) as u8;
    let wdp3 = if index & 0b1000 != 0 { WDP3 } else { 0 };
    wdp3 | (index & 0b0111)
}

impl System for Board {
    fn arm_watchdog(&mut self, timeout_ms: u32) {
        self.write_watchdog(WDE | watchdog_prescaler(timeout_ms));
    }

    fn pet_watchdog(&mut self) {
        avr_device::asm::wdr();
    }

    fn start_ticks(&mut self, interval_us: u32) {
        let top = (interval_us * TIMER_TICKS_PER_US).clamp(1, 0x1_0000) - 1;
        self.timer.tccr1a.write(|w| unsafe { w.bits(0) });
        self.timer.tcnt1.write(|w| unsafe { w.bits(0) });
        self.timer.ocr1a.write(|w| unsafe { w.bits(top as u16) });
        self.timer.tifr1.write(|w| unsafe { w.bits(OCF1A) });
        // CTC on OCR1A, clk/8.
        self.timer.tccr1b.write(|w| unsafe { w.bits(WGM12 | CS11) });
    }

    fn wait_for_tick(&mut self) {
        // The timer keeps counting while we work, so a late tick finds the
        // flag already set and returns at once.
        while self.timer.tifr1.read().bits() & OCF1A == 0 {}
        self.timer.tifr1.write(|w| unsafe { w.bits(OCF1A) });
    }

    fn enter_bootloader(&mut self) -> ! {
        avr_device::interrupt::disable();
        self.write_watchdog(0);

        // The USB driver owns these registers, but it never runs again.
        let dp = unsafe { Peripherals::steal() };

        // Disconnect so the host notices the device going away.
        dp.USB_DEVICE.udcon.write(|w| w.detach().set_bit());
        dp.USB_DEVICE.usbcon.write(|w| w.frzclk().set_bit());
        for _ in 0..20000u16 {
            unsafe { core::arch::asm!("nop") };
        }

        // HalfKay expects the peripherals it uses in their reset state.
        dp.EXINT.eimsk.write(|w| unsafe { w.bits(0) });
        dp.SPI.spcr.write(|w| unsafe { w.bits(0) });
        dp.AC.acsr.write(|w| unsafe { w.bits(0) });
        dp.EEPROM.eecr.write(|w| unsafe { w.bits(0) });
        dp.ADC.adcsra.write(|w| unsafe { w.bits(0) });
        dp.TC0.timsk0.write(|w| unsafe { w.bits(0) });
        self.timer.timsk1.write(|w| unsafe { w.bits(0) });
        self.timer.tccr1b.write(|w| unsafe { w.bits(0) });
        dp.TC3.timsk3.write(|w| unsafe { w.bits(0) });
        dp.TC4.timsk4.write(|w| unsafe { w.bits(0) });
        dp.USART1.ucsr1b.write(|w| unsafe { w.bits(0) });
        dp.TWI.twcr.write(|w| unsafe { w.bits(0) });
        dp.PORTB.ddrb.write(|w| unsafe { w.bits(0) });
        dp.PORTB.portb.write(|w| unsafe { w.bits(0) });
        dp.PORTC.ddrc.write(|w| unsafe { w.bits(0) });
        dp.PORTC.portc.write(|w| unsafe { w.bits(0) });
        dp.PORTD.ddrd.write(|w| unsafe { w.bits(0) });
        dp.PORTD.portd.write(|w| unsafe { w.bits(0) });
        dp.PORTE.ddre.write(|w| unsafe { w.bits(0) });
        dp.PORTE.porte.write(|w| unsafe { w.bits(0) });
        dp.PORTF.ddrf.write(|w| unsafe { w.bits(0) });
        dp.PORTF.portf.write(|w| unsafe { w.bits(0) });

        // HalfKay entry point on the Teensy 2.0.
        unsafe { core::arch::asm!("jmp 0x7E00", options(noreturn)) }
    }
}
