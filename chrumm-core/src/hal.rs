//! Interfaces to the hardware the core runs on.
//!
//! The firmware implements these on top of the ATmega32U4 registers, the
//! host simulator and the tests implement them in memory.

use crate::hid::{ConsumerReport, KeyboardReport};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
}

/// Pin-level access. Pins are plain numbers, the implementor decides the
/// numbering scheme.
pub trait Gpio {
    fn configure_pin(&mut self, pin: u8, direction: Direction, pull: Pull);

    /// Logic level of an input pin (`true` = high).
    fn read_pin(&self, pin: u8) -> bool;

    fn write_pin(&mut self, pin: u8, high: bool);

    /// Busy-wait.
    fn delay_us(&mut self, us: u32);
}

/// HID interfaces of the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Keyboard,
    Consumer,
}

/// The USB device stack as seen from the report logic.
///
/// Sending never blocks: an implementation that cannot take a report right
/// now returns `false` and gets the same (or a newer) report next tick.
pub trait UsbTransport {
    fn is_suspended(&self) -> bool;

    fn request_remote_wakeup(&mut self);

    fn endpoint_ready(&self, endpoint: Endpoint) -> bool;

    /// Returns `true` if the report was accepted for transmission.
    fn send_keyboard_report(&mut self, report: &KeyboardReport) -> bool;

    /// Returns `true` if the report was accepted for transmission.
    fn send_consumer_report(&mut self, report: &ConsumerReport) -> bool;

    /// Lock-key state from the latest host output report, if one arrived
    /// since the last call. Bit 0 = NumLock, bit 1 = CapsLock.
    fn take_led_report(&mut self) -> Option<u8>;

    /// Protocol housekeeping, called once per tick.
    fn task(&mut self);
}

/// Timer, watchdog and reset control.
pub trait System {
    fn arm_watchdog(&mut self, timeout_ms: u32);

    fn pet_watchdog(&mut self);

    /// Start the periodic tick.
    fn start_ticks(&mut self, interval_us: u32);

    /// Sleep until the next tick boundary. Boundaries are absolute, a long
    /// tick shortens the following wait instead of shifting the schedule.
    fn wait_for_tick(&mut self);

    /// Leave the firmware and reset into the USB bootloader.
    fn enter_bootloader(&mut self) -> !;
}
