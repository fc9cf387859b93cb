//! HID report state.
//!
//! Holds what the host should currently see on the keyboard and consumer
//! interfaces and hands it to the transport whenever it changed. Reports
//! are coalesced: if the state changes several times while an endpoint is
//! busy, only the latest snapshot is sent.

use log::{debug, trace};

use crate::hal::{Endpoint, UsbTransport};
use crate::usage::Usage;

/// Number of simultaneous non-modifier keys in a boot keyboard report.
pub const ROLLOVER: usize = 6;

/// Standard USB HID keyboard report (8 bytes).
/// Byte 0: modifier keys bitmask
/// Byte 1: reserved (0x00)
/// Bytes 2-7: up to 6 simultaneous keycodes, 0 = empty slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyboardReport {
    pub modifiers: u8,
    pub reserved: u8,
    pub keys: [u8; ROLLOVER],
}

impl KeyboardReport {
    pub const fn empty() -> Self {
        Self {
            modifiers: 0,
            reserved: 0,
            keys: [0; ROLLOVER],
        }
    }

    pub fn as_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[0] = self.modifiers;
        bytes[1] = self.reserved;
        bytes[2..].copy_from_slice(&self.keys);
        bytes
    }

    pub fn contains(&self, code: u8) -> bool {
        code != 0 && self.keys.contains(&code)
    }
}

/// Consumer control report: a single 16-bit usage, 0 = nothing pressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub usage: u16,
}

impl ConsumerReport {
    pub fn as_bytes(&self) -> [u8; 2] {
        self.usage.to_le_bytes()
    }
}

/// Authoritative report state plus "needs sending" flags.
#[derive(Debug)]
pub struct HidReports {
    keyboard: KeyboardReport,
    consumer: ConsumerReport,
    keyboard_dirty: bool,
    consumer_dirty: bool,
}

impl Default for HidReports {
    fn default() -> Self {
        Self::new()
    }
}

impl HidReports {
    pub const fn new() -> Self {
        Self {
            keyboard: KeyboardReport::empty(),
            consumer: ConsumerReport { usage: 0 },
            keyboard_dirty: false,
            consumer_dirty: false,
        }
    }

    pub fn keyboard(&self) -> &KeyboardReport {
        &self.keyboard
    }

    pub fn consumer(&self) -> &ConsumerReport {
        &self.consumer
    }

    /// Whether the state changed since the last accepted report.
    pub fn is_dirty(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Keyboard => self.keyboard_dirty,
            Endpoint::Consumer => self.consumer_dirty,
        }
    }

    /// Report `usage` as pressed.
    ///
    /// While the host has the bus suspended the press only requests a
    /// remote wake-up and is otherwise dropped.
    pub fn assert(&mut self, usage: Usage, usb: &mut impl UsbTransport) {
        if usb.is_suspended() {
            debug!("suspended, requesting wake-up instead of {:?}", usage);
            usb.request_remote_wakeup();
            return;
        }

        match usage {
            Usage::Keyboard(code) => self.add_keycode(code),
            Usage::Consumer(code) => self.set_consumer(code),
            Usage::None | Usage::Boot => {}
        }
    }

    /// Report `usage` as released.
    ///
    /// There is only one consumer slot, so releasing any consumer usage
    /// clears whatever consumer usage is active.
    pub fn release(&mut self, usage: Usage) {
        match usage {
            Usage::Keyboard(code) => self.remove_keycode(code),
            Usage::Consumer(_) => self.set_consumer(0),
            Usage::None | Usage::Boot => {}
        }
    }

    /// Hand changed reports to the transport. Called once per tick.
    pub fn flush(&mut self, usb: &mut impl UsbTransport) {
        if self.keyboard_dirty {
            if !usb.endpoint_ready(Endpoint::Keyboard) {
                trace!("keyboard endpoint busy");
            } else if usb.send_keyboard_report(&self.keyboard) {
                debug!("keyboard report {:02X?}", self.keyboard.as_bytes());
                self.keyboard_dirty = false;
            }
        }

        if self.consumer_dirty {
            if !usb.endpoint_ready(Endpoint::Consumer) {
                trace!("consumer endpoint busy");
            } else if usb.send_consumer_report(&self.consumer) {
                debug!("consumer report {:#06X}", self.consumer.usage);
                self.consumer_dirty = false;
            }
        }
    }

    fn add_keycode(&mut self, code: u8) {
        if code == 0 {
            return;
        }

        if let Some(bit) = Usage::Keyboard(code).modifier_bit() {
            self.set_modifiers(self.keyboard.modifiers | bit);
            return;
        }

        if self.keyboard.contains(code) {
            return;
        }

        // A seventh key finds no free slot and is dropped.
        if let Some(slot) = self.keyboard.keys.iter_mut().find(|slot| **slot == 0) {
            *slot = code;
            self.keyboard_dirty = true;
        }
    }

    fn remove_keycode(&mut self, code: u8) {
        if code == 0 {
            return;
        }

        if let Some(bit) = Usage::Keyboard(code).modifier_bit() {
            self.set_modifiers(self.keyboard.modifiers & !bit);
            return;
        }

        if let Some(slot) = self.keyboard.keys.iter_mut().find(|slot| **slot == code) {
            *slot = 0;
            self.keyboard_dirty = true;
        }
    }

    fn set_modifiers(&mut self, modifiers: u8) {
        if modifiers != self.keyboard.modifiers {
            self.keyboard.modifiers = modifiers;
            self.keyboard_dirty = true;
        }
    }

    fn set_consumer(&mut self, code: u16) {
        if code != self.consumer.usage {
            self.consumer.usage = code;
            self.consumer_dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::*;

    /// Transport that accepts everything while `ready`.
    #[derive(Default)]
    struct Recorder {
        suspended: bool,
        busy: bool,
        wakeups: usize,
        keyboard: [Option<KeyboardReport>; 8],
        keyboard_sent: usize,
        consumer_sent: usize,
        last_consumer: Option<ConsumerReport>,
    }

    impl UsbTransport for Recorder {
        fn is_suspended(&self) -> bool {
            self.suspended
        }
        fn request_remote_wakeup(&mut self) {
            self.wakeups += 1;
        }
        fn endpoint_ready(&self, _: Endpoint) -> bool {
            !self.busy
        }
        fn send_keyboard_report(&mut self, report: &KeyboardReport) -> bool {
            self.keyboard[self.keyboard_sent % 8] = Some(*report);
            self.keyboard_sent += 1;
            true
        }
        fn send_consumer_report(&mut self, report: &ConsumerReport) -> bool {
            self.last_consumer = Some(*report);
            self.consumer_sent += 1;
            true
        }
        fn take_led_report(&mut self) -> Option<u8> {
            None
        }
        fn task(&mut self) {}
    }

    fn keys(hid: &HidReports) -> [u8; ROLLOVER] {
        hid.keyboard().keys
    }

    #[test]
    fn keycodes_fill_free_slots() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        hid.assert(ESC, &mut usb);
        hid.assert(A, &mut usb);
        assert_eq!(keys(&hid), [0x29, 0x04, 0, 0, 0, 0]);

        hid.release(ESC);
        assert_eq!(keys(&hid), [0, 0x04, 0, 0, 0, 0]);

        hid.assert(B, &mut usb);
        assert_eq!(keys(&hid), [0x05, 0x04, 0, 0, 0, 0]);
    }

    #[test]
    fn duplicates_are_ignored() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        hid.assert(ESC, &mut usb);
        hid.assert(ESC, &mut usb);
        assert_eq!(keys(&hid), [0x29, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn seventh_key_is_dropped() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        for usage in [A, B, C, D, E, F, G] {
            hid.assert(usage, &mut usb);
        }
        assert_eq!(keys(&hid), [0x04, 0x05, 0x06, 0x07, 0x08, 0x09]);
        assert!(!hid.keyboard().contains(0x0A));
    }

    #[test]
    fn modifiers_use_the_bitmask() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        hid.assert(LSHFT, &mut usb);
        hid.assert(RALT, &mut usb);
        assert_eq!(hid.keyboard().modifiers, 0b0100_0010);
        assert_eq!(keys(&hid), [0; ROLLOVER]);

        hid.release(LSHFT);
        assert_eq!(hid.keyboard().modifiers, 0b0100_0000);
    }

    #[test]
    fn none_and_boot_are_no_ops() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        hid.assert(NONE, &mut usb);
        hid.assert(BOOT, &mut usb);
        hid.release(NONE);
        assert!(!hid.is_dirty(Endpoint::Keyboard));
        assert!(!hid.is_dirty(Endpoint::Consumer));
    }

    #[test]
    fn consumer_slot_holds_one_usage() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        hid.assert(C_PLAY, &mut usb);
        hid.assert(C_NEXT, &mut usb);
        assert_eq!(hid.consumer().usage, 0x00B5);

        // Releasing a different consumer usage still clears the slot.
        hid.release(C_PLAY);
        assert_eq!(hid.consumer().usage, 0);
    }

    #[test]
    fn suspended_press_requests_wakeup_only() {
        let mut usb = Recorder {
            suspended: true,
            ..Default::default()
        };
        let mut hid = HidReports::new();
        hid.assert(ESC, &mut usb);
        assert_eq!(usb.wakeups, 1);
        assert_eq!(keys(&hid), [0; ROLLOVER]);
        assert!(!hid.is_dirty(Endpoint::Keyboard));
    }

    #[test]
    fn flush_sends_only_changed_reports() {
        let mut usb = Recorder::default();
        let mut hid = HidReports::new();
        hid.flush(&mut usb);
        assert_eq!(usb.keyboard_sent, 0);
        assert_eq!(usb.consumer_sent, 0);

        hid.assert(ESC, &mut usb);
        hid.flush(&mut usb);
        hid.flush(&mut usb);
        assert_eq!(usb.keyboard_sent, 1);
        assert_eq!(usb.consumer_sent, 0);
    }

    #[test]
    fn busy_endpoint_coalesces_changes() {
        let mut usb = Recorder {
            busy: true,
            ..Default::default()
        };
        let mut hid = HidReports::new();
        hid.assert(A, &mut usb);
        hid.flush(&mut usb);
        hid.assert(B, &mut usb);
        hid.release(A);
        hid.flush(&mut usb);
        hid.assert(C_MUTE, &mut usb);
        hid.flush(&mut usb);
        assert_eq!(usb.keyboard_sent, 0);
        assert_eq!(usb.consumer_sent, 0);

        usb.busy = false;
        hid.flush(&mut usb);
        assert_eq!(usb.keyboard_sent, 1);
        assert_eq!(usb.keyboard[0].map(|r| r.keys), Some([0, 0x05, 0, 0, 0, 0]));
        assert_eq!(usb.last_consumer, Some(ConsumerReport { usage: 0x00E2 }));
    }

    #[test]
    fn unchanged_modifier_keeps_pending_report() {
        let mut usb = Recorder {
            busy: true,
            ..Default::default()
        };
        let mut hid = HidReports::new();
        hid.assert(LCTRL, &mut usb);
        hid.assert(A, &mut usb);
        hid.assert(LCTRL, &mut usb);
        assert!(hid.is_dirty(Endpoint::Keyboard));
    }

    #[test]
    fn report_bytes() {
        let report = KeyboardReport {
            modifiers: 0x02,
            reserved: 0,
            keys: [0x04, 0, 0, 0, 0, 0],
        };
        assert_eq!(report.as_bytes(), [0x02, 0, 0x04, 0, 0, 0, 0, 0]);
        assert_eq!(ConsumerReport { usage: 0x00E9 }.as_bytes(), [0xE9, 0x00]);
    }
}
