//! HID usages for the keyboard and consumer pages.
//!
//! See USB HID Usage Tables 1.4, sections 10 (Keyboard/Keypad, page 0x07)
//! and 15 (Consumer, page 0x0C).

/// Keyboard/Keypad usage page.
pub const PAGE_KEYBOARD: u8 = 0x07;
/// Consumer usage page.
pub const PAGE_CONSUMER: u8 = 0x0C;

/// A key or control the firmware can report.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Usage {
    /// No-op. Pressing it does nothing.
    None,
    /// Reset into the bootloader. Never sent to the host.
    Boot,
    /// Keyboard page usage, including the eight modifiers.
    Keyboard(u8),
    /// Consumer page usage.
    Consumer(u16),
}

impl Usage {
    /// Decode the packed `page << 16 | id` form.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        let page = (raw >> 16) as u8;
        let id = (raw & 0xFFFF) as u16;
        match (raw >> 24, page, id) {
            (0, 0x00, 0) => Some(Usage::Boot),
            (0, PAGE_KEYBOARD, 0) => Some(Usage::None),
            (0, PAGE_KEYBOARD, id) if id <= 0xFF => Some(Usage::Keyboard(id as u8)),
            (0, PAGE_CONSUMER, id) => Some(Usage::Consumer(id)),
            _ => None,
        }
    }

    /// Packed `page << 16 | id` form.
    pub const fn raw(self) -> u32 {
        match self {
            Usage::None => (PAGE_KEYBOARD as u32) << 16,
            Usage::Boot => 0,
            Usage::Keyboard(id) => (PAGE_KEYBOARD as u32) << 16 | id as u32,
            Usage::Consumer(id) => (PAGE_CONSUMER as u32) << 16 | id as u32,
        }
    }

    /// Check if this is one of LCtrl..RGui.
    pub const fn is_modifier(self) -> bool {
        matches!(self, Usage::Keyboard(0xE0..=0xE7))
    }

    /// Bit in the modifier byte (bit 0 = LCtrl, bit 7 = RGui).
    pub const fn modifier_bit(self) -> Option<u8> {
        match self {
            Usage::Keyboard(code @ 0xE0..=0xE7) => Some(1 << (code - 0xE0)),
            _ => None,
        }
    }

    /// Short label for layout renderings. Unnamed usages get an empty string.
    pub fn label(self) -> &'static str {
        NAMED
            .iter()
            .find(|(usage, _)| *usage == self)
            .map_or("", |&(_, label)| label)
    }
}

macro_rules! usages {
    ($( $name:ident = $usage:expr, $label:literal; )*) => {
        $( pub const $name: Usage = $usage; )*

        /// Every named usage with its short label.
        pub static NAMED: &[(Usage, &str)] = &[ $( ($name, $label), )* ];
    };
}

use Usage::{Consumer as Cp, Keyboard as Kb};

usages! {
    NONE = Usage::None, "";
    BOOT = Usage::Boot, "Boot";

    A = Kb(0x04), "A";
    B = Kb(0x05), "B";
    C = Kb(0x06), "C";
    D = Kb(0x07), "D";
    E = Kb(0x08), "E";
    F = Kb(0x09), "F";
    G = Kb(0x0A), "G";
    H = Kb(0x0B), "H";
    I = Kb(0x0C), "I";
    J = Kb(0x0D), "J";
    K = Kb(0x0E), "K";
    L = Kb(0x0F), "L";
    M = Kb(0x10), "M";
    N = Kb(0x11), "N";
    O = Kb(0x12), "O";
    P = Kb(0x13), "P";
    Q = Kb(0x14), "Q";
    R = Kb(0x15), "R";
    S = Kb(0x16), "S";
    T = Kb(0x17), "T";
    U = Kb(0x18), "U";
    V = Kb(0x19), "V";
    W = Kb(0x1A), "W";
    X = Kb(0x1B), "X";
    Y = Kb(0x1C), "Y";
    Z = Kb(0x1D), "Z";
    N1 = Kb(0x1E), "1";
    N2 = Kb(0x1F), "2";
    N3 = Kb(0x20), "3";
    N4 = Kb(0x21), "4";
    N5 = Kb(0x22), "5";
    N6 = Kb(0x23), "6";
    N7 = Kb(0x24), "7";
    N8 = Kb(0x25), "8";
    N9 = Kb(0x26), "9";
    N0 = Kb(0x27), "0";

    ENTER = Kb(0x28), "Ent";
    ESC = Kb(0x29), "Esc";
    BKSP = Kb(0x2A), "Bksp";
    TAB = Kb(0x2B), "Tab";
    SPACE = Kb(0x2C), "Spc";
    MINUS = Kb(0x2D), "-";
    EQUAL = Kb(0x2E), "=";
    LBRAC = Kb(0x2F), "[";
    RBRAC = Kb(0x30), "]";
    BKSL = Kb(0x31), "\\";
    RISO = Kb(0x32), "#";
    COLON = Kb(0x33), ";";
    QUOTE = Kb(0x34), "'";
    TILDE = Kb(0x35), "`";
    COMMA = Kb(0x36), ",";
    DOT = Kb(0x37), ".";
    SLASH = Kb(0x38), "/";
    CAPLK = Kb(0x39), "Caps";

    F1 = Kb(0x3A), "F1";
    F2 = Kb(0x3B), "F2";
    F3 = Kb(0x3C), "F3";
    F4 = Kb(0x3D), "F4";
    F5 = Kb(0x3E), "F5";
    F6 = Kb(0x3F), "F6";
    F7 = Kb(0x40), "F7";
    F8 = Kb(0x41), "F8";
    F9 = Kb(0x42), "F9";
    F10 = Kb(0x43), "F10";
    F11 = Kb(0x44), "F11";
    F12 = Kb(0x45), "F12";

    PRINT = Kb(0x46), "PScr";
    SCRLK = Kb(0x47), "ScrL";
    PAUSE = Kb(0x48), "Paus";
    INS = Kb(0x49), "Ins";
    HOME = Kb(0x4A), "Home";
    PGUP = Kb(0x4B), "PgUp";
    DEL = Kb(0x4C), "Del";
    END = Kb(0x4D), "End";
    PGDN = Kb(0x4E), "PgDn";
    RIGHT = Kb(0x4F), "\u{2192}";
    LEFT = Kb(0x50), "\u{2190}";
    DOWN = Kb(0x51), "\u{2193}";
    UP = Kb(0x52), "\u{2191}";

    NUMLK = Kb(0x53), "Num";
    KP_DIV = Kb(0x54), "/";
    KP_MUL = Kb(0x55), "*";
    KP_SUB = Kb(0x56), "-";
    KP_ADD = Kb(0x57), "+";
    KP_ENT = Kb(0x58), "Ent";
    KP_1 = Kb(0x59), "1";
    KP_2 = Kb(0x5A), "2";
    KP_3 = Kb(0x5B), "3";
    KP_4 = Kb(0x5C), "4";
    KP_5 = Kb(0x5D), "5";
    KP_6 = Kb(0x5E), "6";
    KP_7 = Kb(0x5F), "7";
    KP_8 = Kb(0x60), "8";
    KP_9 = Kb(0x61), "9";
    KP_0 = Kb(0x62), "0";
    KP_DOT = Kb(0x63), ".";

    LISO = Kb(0x64), "<>";
    APP = Kb(0x65), "App";
    POWER = Kb(0x66), "Pwr";
    KP_EQ = Kb(0x67), "=";

    F13 = Kb(0x68), "F13";
    F14 = Kb(0x69), "F14";
    F15 = Kb(0x6A), "F15";
    F16 = Kb(0x6B), "F16";
    F17 = Kb(0x6C), "F17";
    F18 = Kb(0x6D), "F18";
    F19 = Kb(0x6E), "F19";
    F20 = Kb(0x6F), "F20";
    F21 = Kb(0x70), "F21";
    F22 = Kb(0x71), "F22";
    F23 = Kb(0x72), "F23";
    F24 = Kb(0x73), "F24";

    EXEC = Kb(0x74), "Exec";
    HELP = Kb(0x75), "Help";
    MENU = Kb(0x76), "Menu";
    SEL = Kb(0x77), "Sel";
    STOP = Kb(0x78), "Stop";
    AGAIN = Kb(0x79), "Agn";
    UNDO = Kb(0x7A), "Undo";
    CUT = Kb(0x7B), "Cut";
    COPY = Kb(0x7C), "Copy";
    PASTE = Kb(0x7D), "Pst";
    FIND = Kb(0x7E), "Find";
    MUTE = Kb(0x7F), "Mute";
    VOLUP = Kb(0x80), "Vol+";
    VOLDN = Kb(0x81), "Vol-";

    INT1 = Kb(0x87), "Int1";
    INT2 = Kb(0x88), "Int2";
    INT3 = Kb(0x89), "Int3";
    INT4 = Kb(0x8A), "Int4";
    INT5 = Kb(0x8B), "Int5";
    INT6 = Kb(0x8C), "Int6";
    INT7 = Kb(0x8D), "Int7";
    INT8 = Kb(0x8E), "Int8";
    INT9 = Kb(0x8F), "Int9";

    LANG1 = Kb(0x90), "Lng1";
    LANG2 = Kb(0x91), "Lng2";
    LANG3 = Kb(0x92), "Lng3";
    LANG4 = Kb(0x93), "Lng4";
    LANG5 = Kb(0x94), "Lng5";
    LANG6 = Kb(0x95), "Lng6";
    LANG7 = Kb(0x96), "Lng7";
    LANG8 = Kb(0x97), "Lng8";
    LANG9 = Kb(0x98), "Lng9";

    KP_LPAR = Kb(0xB6), "(";
    KP_RPAR = Kb(0xB7), ")";

    LCTRL = Kb(0xE0), "Ctrl";
    LSHFT = Kb(0xE1), "Shft";
    LALT = Kb(0xE2), "Alt";
    LGUI = Kb(0xE3), "Gui";
    RCTRL = Kb(0xE4), "RCtl";
    RSHFT = Kb(0xE5), "RSft";
    RALT = Kb(0xE6), "RAlt";
    RGUI = Kb(0xE7), "RGui";

    // Layer toggle. Never reaches the host, the layer logic consumes it.
    FN = Cp(0x0097), "Fn";

    C_PLAY = Cp(0x00B0), "Play";
    C_PAUSE = Cp(0x00B1), "Paus";
    C_REC = Cp(0x00B2), "Rec";
    C_FFWD = Cp(0x00B3), "FFwd";
    C_RWND = Cp(0x00B4), "Rwnd";
    C_NEXT = Cp(0x00B5), "Next";
    C_PREV = Cp(0x00B6), "Prev";
    C_STOP = Cp(0x00B7), "Stop";
    C_EJECT = Cp(0x00B8), "Ejct";
    C_RANDM = Cp(0x00B9), "Rand";
    C_RPEAT = Cp(0x00BC), "Rpt";
    C_MUTE = Cp(0x00E2), "Mute";
    C_VOLUP = Cp(0x00E9), "Vol+";
    C_VOLDN = Cp(0x00EA), "Vol-";

    C_WORD = Cp(0x0184), "Word";
    C_TEXT = Cp(0x0185), "Text";
    C_SHEET = Cp(0x0186), "Sht";
    C_GRAPH = Cp(0x0187), "Grph";
    C_PRES = Cp(0x0188), "Pres";
    C_DATAB = Cp(0x0189), "DB";
    C_EMAIL = Cp(0x018A), "Mail";
    C_NEWS = Cp(0x018B), "News";
    C_VOICE = Cp(0x018C), "Voic";
    C_ADDR = Cp(0x018D), "Addr";
    C_CALEN = Cp(0x018E), "Cal";
    C_TASK = Cp(0x018F), "Task";
    C_LOG = Cp(0x0190), "Log";
    C_FIN = Cp(0x0191), "Fin";
    C_CALC = Cp(0x0192), "Calc";
    C_FILE = Cp(0x0194), "File";
    C_WWW = Cp(0x0196), "WWW";
    C_CHAT = Cp(0x0199), "Chat";
    C_LOGOF = Cp(0x019C), "LgOf";
    C_LOCK = Cp(0x019E), "Lock";
    C_CTRL = Cp(0x019F), "Ctrl";
    C_HELP = Cp(0x01A6), "Help";
    C_DOCS = Cp(0x01A7), "Docs";
    C_SPELL = Cp(0x01AB), "Spel";
    C_SCRSV = Cp(0x01B1), "ScSv";
    C_IMG = Cp(0x01B6), "Img";
    C_AUDIO = Cp(0x01B7), "Audo";
    C_VIDEO = Cp(0x01B8), "Vid";
    C_MSNGR = Cp(0x01BC), "Msg";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_form_matches_page_and_id() {
        assert_eq!(ESC.raw(), 0x07_0029);
        assert_eq!(C_PLAY.raw(), 0x0C_00B0);
        assert_eq!(NONE.raw(), 0x07_0000);
        assert_eq!(BOOT.raw(), 0);
    }

    #[test]
    fn from_raw_recognises_sentinels() {
        assert_eq!(Usage::from_raw(0x07_0000), Some(NONE));
        assert_eq!(Usage::from_raw(0), Some(BOOT));
        assert_eq!(Usage::from_raw(0x07_00E1), Some(LSHFT));
        assert_eq!(Usage::from_raw(0x0C_0192), Some(C_CALC));
        assert_eq!(Usage::from_raw(0x07_0100), None);
        assert_eq!(Usage::from_raw(0x01_0001), None);
    }

    #[test]
    fn modifier_bits() {
        assert_eq!(LCTRL.modifier_bit(), Some(0b0000_0001));
        assert_eq!(RGUI.modifier_bit(), Some(0b1000_0000));
        assert!(LALT.is_modifier());
        assert!(!ESC.is_modifier());
        assert!(!C_VOLUP.is_modifier());
        assert_eq!(A.modifier_bit(), None);
    }

    #[test]
    fn labels() {
        assert_eq!(ESC.label(), "Esc");
        assert_eq!(FN.label(), "Fn");
        assert_eq!(NONE.label(), "");
        assert_eq!(Kb(0xA5).label(), "");
    }
}
