//! Chrumm keyboard firmware for the ATmega32U4 (Teensy 2.0).
//!
//! All input handling lives in `chrumm_core`; this crate only binds its
//! hardware traits to the chip's registers.

#![no_std]
#![no_main]
#![feature(asm_experimental_arch)]

mod gpio;
mod system;
mod usb;

use avr_device::atmega32u4::Peripherals;
use chrumm_core::Keyboard;

use gpio::Pins;
use system::Board;
use usb::UsbHid;

/// Panic handler. Once armed, the watchdog resets the chip.
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

#[no_mangle]
pub extern "C" fn main() -> ! {
    let Some(dp) = Peripherals::take() else {
        loop {}
    };

    let board = Board::new(dp.CPU, dp.TC1, dp.WDT);
    board.init_clock();

    let pins = Pins::new(dp.PORTB, dp.PORTC, dp.PORTD, dp.PORTE, dp.PORTF);

    let mut usb = UsbHid::new(dp.USB_DEVICE, dp.PLL);
    usb.init();

    Keyboard::new(pins, usb, board).run()
}
