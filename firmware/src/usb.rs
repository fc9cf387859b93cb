//! USB device stack for the ATmega32U4.
//!
//! Two HID interfaces: a boot keyboard on EP1 and a consumer control on
//! EP2. Control requests are handled on EP0 from `task()`, reports are
//! written without waiting; a busy bank just means "try next tick".

use avr_device::atmega32u4::{PLL, USB_DEVICE};
use chrumm_core::hal::{Endpoint, UsbTransport};
use chrumm_core::hid::{ConsumerReport, KeyboardReport};

const EP0_SIZE: u8 = 64;
const EP_REPORT_SIZE: u8 = 8;

const INTERFACE_KEYBOARD: u8 = 0;
const INTERFACE_CONSUMER: u8 = 1;

// Registered on pid.codes for this keyboard.
const VENDOR_ID: u16 = 0x1209;
const PRODUCT_ID: u16 = 0x5E7C;

/// Boot keyboard with an LED output report.
static KEYBOARD_REPORT_DESCRIPTOR: [u8; 65] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0xE0, //   Usage Minimum (224)
    0x29, 0xE7, //   Usage Maximum (231)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, // Logical Maximum (255)
    0x05, 0x07, //   Usage Page (Key Codes)
    0x19, 0x00, //   Usage Minimum (0)
    0x2A, 0xFF, 0x00, // Usage Maximum (255)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
];

/// One 16-bit consumer usage.
static CONSUMER_REPORT_DESCRIPTOR: [u8; 23] = [
    0x05, 0x0C, // Usage Page (Consumer)
    0x09, 0x01, // Usage (Consumer Control)
    0xA1, 0x01, // Collection (Application)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x03, // Logical Maximum (1023)
    0x19, 0x00, //   Usage Minimum (0)
    0x2A, 0xFF, 0x03, // Usage Maximum (1023)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x10, //   Report Size (16)
    0x81, 0x00, //   Input (Data, Array)
    0xC0, // End Collection
];

static DEVICE_DESCRIPTOR: [u8; 18] = [
    18,   // bLength
    1,    // bDescriptorType (Device)
    0x00, 0x02, // bcdUSB (2.0)
    0,    // bDeviceClass (defined at interface level)
    0,    // bDeviceSubClass
    0,    // bDeviceProtocol
    EP0_SIZE, // bMaxPacketSize0
    VENDOR_ID as u8, (VENDOR_ID >> 8) as u8,
    PRODUCT_ID as u8, (PRODUCT_ID >> 8) as u8,
    0x00, 0x01, // bcdDevice (1.0)
    1,    // iManufacturer
    2,    // iProduct
    0,    // iSerialNumber
    1,    // bNumConfigurations
];

static CONFIG_DESCRIPTOR: [u8; 59] = [
    9,    // bLength
    2,    // bDescriptorType (Configuration)
    59, 0, // wTotalLength
    2,    // bNumInterfaces
    1,    // bConfigurationValue
    0,    // iConfiguration
    0xA0, // bmAttributes (bus powered, remote wake-up)
    50,   // bMaxPower (100mA)

    // Keyboard interface
    9, 4, INTERFACE_KEYBOARD, 0, 1,
    3,    // bInterfaceClass (HID)
    1,    // bInterfaceSubClass (Boot)
    1,    // bInterfaceProtocol (Keyboard)
    0,
    9, 0x21, 0x11, 0x01, 0, 1, 0x22, KEYBOARD_REPORT_DESCRIPTOR.len() as u8, 0,
    7, 5, 0x81, 0x03, EP_REPORT_SIZE, 0,
    1,    // bInterval (1ms)

    // Consumer control interface
    9, 4, INTERFACE_CONSUMER, 0, 1,
    3,    // bInterfaceClass (HID)
    0,    // bInterfaceSubClass (None)
    0,    // bInterfaceProtocol (None)
    0,
    9, 0x21, 0x11, 0x01, 0, 1, 0x22, CONSUMER_REPORT_DESCRIPTOR.len() as u8, 0,
    7, 5, 0x82, 0x03, EP_REPORT_SIZE, 0,
    10,   // bInterval (10ms)
];

/// ASCII text as a UTF-16 string descriptor of total length `N`.
const fn string_descriptor<const N: usize>(text: &[u8]) -> [u8; N] {
    let mut desc = [0u8; N];
    desc[0] = N as u8;
    desc[1] = 3;
    let mut i = 0;
    while i < text.len() {
        desc[2 + 2 * i] = text[i];
        i += 1;
    }
    desc
}

static LANGUAGES: [u8; 4] = [4, 3, 0x09, 0x04]; // English (US)
static MANUFACTURER: [u8; 16] = string_descriptor(b"sev.dev");
static PRODUCT: [u8; 32] = string_descriptor(b"Chrumm keyboard");

// Standard and HID class requests, as (bmRequestType, bRequest).
const GET_STATUS: u8 = 0x00;
const CLEAR_FEATURE: u8 = 0x01;
const SET_FEATURE: u8 = 0x03;
const SET_ADDRESS: u8 = 0x05;
const GET_DESCRIPTOR: u8 = 0x06;
const GET_CONFIGURATION: u8 = 0x08;
const SET_CONFIGURATION: u8 = 0x09;
const HID_GET_REPORT: u8 = 0x01;
const HID_GET_IDLE: u8 = 0x02;
const HID_GET_PROTOCOL: u8 = 0x03;
const HID_SET_REPORT: u8 = 0x09;
const HID_SET_IDLE: u8 = 0x0A;
const HID_SET_PROTOCOL: u8 = 0x0B;

const FEATURE_REMOTE_WAKEUP: u8 = 1;

pub struct UsbHid {
    usb: USB_DEVICE,
    pll: PLL,
    configured: bool,
    suspended: bool,
    remote_wakeup: bool,
    idle: u8,
    protocol: u8,
    leds: Option<u8>,
    keyboard: [u8; 8],
    consumer: [u8; 2],
}

impl UsbHid {
    pub fn new(usb: USB_DEVICE, pll: PLL) -> Self {
        Self {
            usb,
            pll,
            configured: false,
            suspended: false,
            remote_wakeup: false,
            idle: 0,
            protocol: 1,
            leds: None,
            keyboard: [0; 8],
            consumer: [0; 2],
        }
    }

    /// Bring up the controller and attach to the bus.
    pub fn init(&mut self) {
        let usb = &self.usb;

        usb.uhwcon.write(|w| w.uvrege().set_bit());
        usb.usbcon.write(|w| w.usbe().set_bit().otgpade().set_bit());

        // 16MHz crystal -> 96MHz PLL -> 48MHz USB clock
        self.pll.pllcsr.write(|w| w.pindiv().set_bit().plle().set_bit());
        while self.pll.pllcsr.read().plock().bit_is_clear() {}

        usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        usb.udcon.modify(|_, w| w.detach().clear_bit());

        self.configured = false;
        self.suspended = false;
    }

    fn select_endpoint(&self, ep: u8) {
        self.usb.uenum.write(|w| w.bits(ep & 0x07));
    }

    fn configure_ep0(&self) {
        let usb = &self.usb;
        self.select_endpoint(0);
        usb.ueconx.write(|w| w.epen().set_bit());
        usb.uecfg0x.write(|w| w.eptype().bits(0b00));
        usb.uecfg1x.write(|w| w.epsize().bits(0b011).alloc().set_bit());
    }

    fn configure_report_endpoint(&self, ep: u8) {
        let usb = &self.usb;
        self.select_endpoint(ep);
        usb.ueconx.write(|w| w.epen().set_bit());
        // Interrupt IN, 8 bytes, double bank.
        usb.uecfg0x.write(|w| w.eptype().bits(0b11).epdir().set_bit());
        usb.uecfg1x
            .write(|w| w.epsize().bits(0b000).epbk().bits(0b01).alloc().set_bit());
    }

    fn write_report(&mut self, ep: u8, bytes: &[u8]) -> bool {
        if !self.endpoint_writable(ep) {
            return false;
        }

        let usb = &self.usb;
        for &byte in bytes {
            usb.uedatx.write(|w| w.bits(byte));
        }
        usb.ueintx
            .modify(|_, w| w.fifocon().clear_bit().txini().clear_bit());
        true
    }

    fn endpoint_writable(&self, ep: u8) -> bool {
        if !self.configured || self.suspended {
            return false;
        }
        self.select_endpoint(ep);
        self.usb.ueintx.read().rwal().bit_is_set()
    }

    fn handle_bus_events(&mut self) {
        let usb = &self.usb;
        let udint = usb.udint.read();

        if udint.eorsti().bit_is_set() {
            usb.udint.modify(|_, w| w.eorsti().clear_bit());
            self.configure_ep0();
            self.configured = false;
            self.remote_wakeup = false;
            self.protocol = 1;
        }

        if udint.suspi().bit_is_set() {
            usb.udint.modify(|_, w| w.suspi().clear_bit());
            self.suspended = true;
        }

        if udint.wakeupi().bit_is_set() || udint.eorsmi().bit_is_set() {
            usb.udint
                .modify(|_, w| w.wakeupi().clear_bit().eorsmi().clear_bit());
            self.suspended = false;
        }
    }

    fn handle_setup(&mut self) {
        let usb = &self.usb;

        let request_type = usb.uedatx.read().bits();
        let request = usb.uedatx.read().bits();
        let value_l = usb.uedatx.read().bits();
        let value_h = usb.uedatx.read().bits();
        let index_l = usb.uedatx.read().bits();
        let _index_h = usb.uedatx.read().bits();
        let length_l = usb.uedatx.read().bits();
        let length_h = usb.uedatx.read().bits();
        let length = (length_h as u16) << 8 | length_l as u16;

        usb.ueintx.modify(|_, w| w.rxstpi().clear_bit());

        match (request_type, request) {
            (0x80, GET_DESCRIPTOR) => match (value_h, value_l) {
                (1, _) => self.send_control(&DEVICE_DESCRIPTOR, length),
                (2, _) => self.send_control(&CONFIG_DESCRIPTOR, length),
                (3, 0) => self.send_control(&LANGUAGES, length),
                (3, 1) => self.send_control(&MANUFACTURER, length),
                (3, 2) => self.send_control(&PRODUCT, length),
                _ => self.stall(),
            },

            (0x81, GET_DESCRIPTOR) => match (value_h, index_l) {
                (0x22, INTERFACE_KEYBOARD) => self.send_control(&KEYBOARD_REPORT_DESCRIPTOR, length),
                (0x22, INTERFACE_CONSUMER) => self.send_control(&CONSUMER_REPORT_DESCRIPTOR, length),
                (0x21, INTERFACE_KEYBOARD) => self.send_control(&CONFIG_DESCRIPTOR[18..27], length),
                (0x21, INTERFACE_CONSUMER) => self.send_control(&CONFIG_DESCRIPTOR[43..52], length),
                _ => self.stall(),
            },

            (0x00, SET_ADDRESS) => {
                self.send_zlp();
                while usb.ueintx.read().txini().bit_is_clear() {}
                usb.udaddr
                    .write(|w| w.uadd().bits(value_l & 0x7F).adden().set_bit());
            }

            (0x00, SET_CONFIGURATION) => {
                self.send_zlp();
                self.configure_report_endpoint(1);
                self.configure_report_endpoint(2);
                // Reset the data toggles of EP1 and EP2.
                usb.uerst.write(|w| unsafe { w.bits(0b110) });
                usb.uerst.write(|w| unsafe { w.bits(0) });
                self.configured = value_l != 0;
            }

            (0x80, GET_CONFIGURATION) => self.send_control(&[self.configured as u8], length),

            (0x80, GET_STATUS) => {
                let status = (self.remote_wakeup as u8) << 1;
                self.send_control(&[status, 0], length);
            }
            (0x81 | 0x82, GET_STATUS) => self.send_control(&[0, 0], length),

            (0x00, SET_FEATURE) if value_l == FEATURE_REMOTE_WAKEUP => {
                self.remote_wakeup = true;
                self.send_zlp();
            }
            (0x00, CLEAR_FEATURE) if value_l == FEATURE_REMOTE_WAKEUP => {
                self.remote_wakeup = false;
                self.send_zlp();
            }
            (0x02, SET_FEATURE | CLEAR_FEATURE) => self.send_zlp(),

            (0xA1, HID_GET_REPORT) => match index_l {
                INTERFACE_KEYBOARD => self.send_control(&self.keyboard, length),
                INTERFACE_CONSUMER => self.send_control(&self.consumer, length),
                _ => self.stall(),
            },

            (0x21, HID_SET_REPORT) if index_l == INTERFACE_KEYBOARD => {
                while usb.ueintx.read().rxouti().bit_is_clear() {}
                let leds = usb.uedatx.read().bits();
                usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
                self.leds = Some(leds);
                self.send_zlp();
            }

            (0xA1, HID_GET_IDLE) => self.send_control(&[self.idle], length),
            (0x21, HID_SET_IDLE) => {
                self.idle = value_h;
                self.send_zlp();
            }

            (0xA1, HID_GET_PROTOCOL) => self.send_control(&[self.protocol], length),
            (0x21, HID_SET_PROTOCOL) => {
                self.protocol = value_l;
                self.send_zlp();
            }

            _ => self.stall(),
        }
    }

    fn send_zlp(&self) {
        self.usb.ueintx.modify(|_, w| w.txini().clear_bit());
    }

    fn send_control(&self, data: &[u8], max_length: u16) {
        let usb = &self.usb;
        let len = core::cmp::min(data.len(), max_length as usize);
        let mut sent = 0;

        loop {
            while usb.ueintx.read().txini().bit_is_clear() {}

            let chunk_end = core::cmp::min(sent + EP0_SIZE as usize, len);
            for &byte in &data[sent..chunk_end] {
                usb.uedatx.write(|w| w.bits(byte));
            }
            usb.ueintx.modify(|_, w| w.txini().clear_bit());

            // A full final packet needs a zero-length packet after it.
            let full = chunk_end - sent == EP0_SIZE as usize;
            sent = chunk_end;
            if sent == len && !full {
                break;
            }
        }

        // Status stage
        while usb.ueintx.read().rxouti().bit_is_clear() {}
        usb.ueintx.modify(|_, w| w.rxouti().clear_bit());
    }

    fn stall(&self) {
        self.usb.ueconx.modify(|_, w| w.stallrq().set_bit());
    }
}

impl UsbTransport for UsbHid {
    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn request_remote_wakeup(&mut self) {
        if !self.remote_wakeup {
            return;
        }
        self.usb.usbcon.modify(|_, w| w.frzclk().clear_bit());
        self.usb.udcon.modify(|_, w| w.rmwkup().set_bit());
    }

    fn endpoint_ready(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Keyboard => self.endpoint_writable(1),
            Endpoint::Consumer => self.endpoint_writable(2),
        }
    }

    fn send_keyboard_report(&mut self, report: &KeyboardReport) -> bool {
        let bytes = report.as_bytes();
        let accepted = self.write_report(1, &bytes);
        if accepted {
            self.keyboard = bytes;
        }
        accepted
    }

    fn send_consumer_report(&mut self, report: &ConsumerReport) -> bool {
        let bytes = report.as_bytes();
        let accepted = self.write_report(2, &bytes);
        if accepted {
            self.consumer = bytes;
        }
        accepted
    }

    fn take_led_report(&mut self) -> Option<u8> {
        self.leds.take()
    }

    fn task(&mut self) {
        self.handle_bus_events();

        self.select_endpoint(0);
        if self.usb.ueintx.read().rxstpi().bit_is_set() {
            self.handle_setup();
        }
    }
}
