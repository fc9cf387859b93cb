//! Replay scripted input through the keyboard core on a simulated board.
//!
//! A trace is a text file with one command per line, `#` starts a comment:
//!
//! ```text
//! tap Fn            # key by label, base layer first
//! tap 0x0C00B0      # or by packed usage, page << 16 | id
//! press 2 1         # or by row and column
//! wait 20           # ticks
//! release 2 1
//! turn cw 3         # encoder detents
//! glitch a          # one-tick pulse on an encoder line
//! suspend on
//! busy off
//! leds 0b10         # host lock-key report
//! ```

use std::fmt;

use anyhow::{bail, Context, Result};
use chrumm_core::config::{
    COLS, COL_PINS, ENCODER_A_PIN, ENCODER_B_PIN, ENCODER_KEYPRESS_TICKS, ROWS, ROW_PINS,
    TICK_INTERVAL_US,
};
use chrumm_core::encoder::Rotation;
use chrumm_core::hal::{Direction, Endpoint, Gpio, Pull, System, UsbTransport};
use chrumm_core::hid::{ConsumerReport, KeyboardReport};
use chrumm_core::keymap::LAYERS;
use chrumm_core::{Keyboard, Usage};
use log::{debug, info};

/// How long `tap` holds and then rests a key.
const HOLD_TICKS: u32 = 20;

/// Encoder line levels (A, B) from one detent to the next.
const CW_PHASES: [(bool, bool); 4] = [(false, true), (false, false), (true, false), (true, true)];
const CCW_PHASES: [(bool, bool); 4] = [(true, false), (false, false), (false, true), (true, true)];

pub type Position = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Press(Position),
    Release(Position),
    Tap(Position),
    Turn(Rotation, u32),
    Glitch(Line),
    Wait(u32),
    Suspend(bool),
    Busy(bool),
    Leds(u8),
}

pub fn parse_trace(input: &str) -> Result<Vec<Step>> {
    input
        .lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then_some((n, line))
        })
        .map(|(n, line)| parse_step(line).with_context(|| format!("line {}: {}", n + 1, line)))
        .collect()
}

fn parse_step(line: &str) -> Result<Step> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    let step = match (command, args.as_slice()) {
        ("press", key) => Step::Press(parse_key(key)?),
        ("release", key) => Step::Release(parse_key(key)?),
        ("tap", key) => Step::Tap(parse_key(key)?),
        ("turn", [direction]) => Step::Turn(parse_rotation(direction)?, 1),
        ("turn", [direction, count]) => {
            Step::Turn(parse_rotation(direction)?, count.parse().context("detent count")?)
        }
        ("glitch", ["a"]) => Step::Glitch(Line::A),
        ("glitch", ["b"]) => Step::Glitch(Line::B),
        ("wait", [ticks]) => Step::Wait(ticks.parse().context("tick count")?),
        ("suspend", [flag]) => Step::Suspend(parse_flag(flag)?),
        ("busy", [flag]) => Step::Busy(parse_flag(flag)?),
        ("leds", [bits]) => Step::Leds(parse_byte(bits)?),
        _ => bail!("unknown command"),
    };
    Ok(step)
}

fn parse_key(args: &[&str]) -> Result<Position> {
    match args {
        [row, col] => {
            let row: usize = row.parse().context("row")?;
            let col: usize = col.parse().context("column")?;
            if row >= ROWS || col >= COLS {
                bail!("no key at {} {}, the matrix is {}x{}", row, col, ROWS, COLS);
            }
            Ok((row, col))
        }
        [word] => {
            let found = match word.strip_prefix("0x") {
                Some(hex) => u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(Usage::from_raw)
                    .and_then(locate_usage),
                None => locate(word),
            };
            found.with_context(|| format!("no key for {:?}", word))
        }
        _ => bail!("expected a key label or `row col`"),
    }
}

/// First position whose label matches, searching the base layer first.
fn locate(label: &str) -> Option<Position> {
    find_key(|usage| usage.label().eq_ignore_ascii_case(label))
}

fn locate_usage(wanted: Usage) -> Option<Position> {
    find_key(|usage| usage == wanted)
}

fn find_key(matches: impl Fn(Usage) -> bool) -> Option<Position> {
    LAYERS.iter().find_map(|layer| {
        (0..ROWS * COLS)
            .find(|&key| matches(layer[key]))
            .map(|key| (key / COLS, key % COLS))
    })
}

fn parse_rotation(word: &str) -> Result<Rotation> {
    match word {
        "cw" => Ok(Rotation::Clockwise),
        "ccw" => Ok(Rotation::CounterClockwise),
        _ => bail!("expected `cw` or `ccw`"),
    }
}

fn parse_flag(word: &str) -> Result<bool> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => bail!("expected `on` or `off`"),
    }
}

fn parse_byte(word: &str) -> Result<u8> {
    let parsed = if let Some(bin) = word.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else if let Some(hex) = word.strip_prefix("0x") {
        u8::from_str_radix(hex, 16)
    } else {
        word.parse()
    };
    parsed.with_context(|| format!("invalid byte {:?}", word))
}

/// Something the simulated host observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Keyboard(KeyboardReport),
    Consumer(ConsumerReport),
    Wakeup,
    Led(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub tick: u64,
    pub event: Event,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = (self.tick * TICK_INTERVAL_US as u64) as f64 / 1000.0;
        write!(f, "{:>9.1}ms  ", ms)?;

        match self.event {
            Event::Keyboard(report) => {
                write!(f, "keyboard  mods={:08b} keys=[", report.modifiers)?;
                let pressed = report.keys.iter().filter(|&&code| code != 0);
                for (i, &code) in pressed.enumerate() {
                    let sep = if i == 0 { "" } else { " " };
                    let usage = Usage::Keyboard(code);
                    match usage.label() {
                        "" => write!(f, "{}{:#08X}", sep, usage.raw())?,
                        label => write!(f, "{}{}", sep, label)?,
                    }
                }
                write!(f, "]")
            }
            Event::Consumer(report) => match (report.usage, Usage::Consumer(report.usage).label()) {
                (0, _) => write!(f, "consumer  -"),
                (usage, "") => write!(f, "consumer  {:#08X}", Usage::Consumer(usage).raw()),
                (_, label) => write!(f, "consumer  {}", label),
            },
            Event::Wakeup => write!(f, "remote wake-up"),
            Event::Led(lit) => write!(f, "led       {}", if lit { "on" } else { "off" }),
        }
    }
}

/// Electrical model of the matrix and the encoder.
struct SimPins {
    closed: [[bool; COLS]; ROWS],
    levels: [bool; 40],
    encoder: (bool, bool),
}

impl SimPins {
    fn new() -> Self {
        Self {
            closed: [[false; COLS]; ROWS],
            levels: [true; 40],
            encoder: (true, true),
        }
    }
}

impl Gpio for SimPins {
    fn configure_pin(&mut self, pin: u8, direction: Direction, pull: Pull) {
        debug!("pin {} {:?} {:?}", pin, direction, pull);
    }

    fn read_pin(&self, pin: u8) -> bool {
        match pin {
            ENCODER_A_PIN => self.encoder.0,
            ENCODER_B_PIN => self.encoder.1,
            _ => match COL_PINS.iter().position(|&p| p == pin) {
                // A closed switch on a driven row pulls its column low.
                Some(col) => !ROW_PINS
                    .iter()
                    .enumerate()
                    .any(|(row, &rp)| !self.levels[rp as usize] && self.closed[row][col]),
                None => self.levels[pin as usize],
            },
        }
    }

    fn write_pin(&mut self, pin: u8, high: bool) {
        self.levels[pin as usize] = high;
    }

    fn delay_us(&mut self, _: u32) {}
}

/// A host that accepts every report unless told to be busy.
#[derive(Default)]
struct SimHost {
    suspended: bool,
    busy: bool,
    leds: Option<u8>,
    events: Vec<Event>,
}

impl UsbTransport for SimHost {
    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn request_remote_wakeup(&mut self) {
        self.events.push(Event::Wakeup);
        self.suspended = false;
    }

    fn endpoint_ready(&self, _: Endpoint) -> bool {
        !self.busy
    }

    fn send_keyboard_report(&mut self, report: &KeyboardReport) -> bool {
        self.events.push(Event::Keyboard(*report));
        true
    }

    fn send_consumer_report(&mut self, report: &ConsumerReport) -> bool {
        self.events.push(Event::Consumer(*report));
        true
    }

    fn take_led_report(&mut self) -> Option<u8> {
        self.leds.take()
    }

    fn task(&mut self) {}
}

struct SimClock;

impl System for SimClock {
    fn arm_watchdog(&mut self, timeout_ms: u32) {
        debug!("watchdog armed, {}ms", timeout_ms);
    }

    fn pet_watchdog(&mut self) {}

    fn start_ticks(&mut self, interval_us: u32) {
        debug!("ticking every {}us", interval_us);
    }

    fn wait_for_tick(&mut self) {}

    fn enter_bootloader(&mut self) -> ! {
        println!("bootloader requested, simulation ends");
        std::process::exit(0);
    }
}

pub struct Simulator {
    keyboard: Keyboard<SimPins, SimHost, SimClock>,
    tick: u64,
    lit: bool,
    echo: bool,
    records: Vec<Record>,
}

impl Simulator {
    /// With `echo` set, every record is printed as soon as it happens.
    pub fn new(echo: bool) -> Self {
        let mut keyboard = Keyboard::new(SimPins::new(), SimHost::default(), SimClock);
        keyboard.init();
        Self {
            keyboard,
            tick: 0,
            lit: false,
            echo,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn run(&mut self, steps: &[Step]) {
        for &step in steps {
            self.step(step);
        }
        info!("simulated {} ticks", self.tick);
    }

    fn step(&mut self, step: Step) {
        debug!("{:?}", step);
        match step {
            Step::Press((row, col)) => self.keyboard.gpio_mut().closed[row][col] = true,
            Step::Release((row, col)) => self.keyboard.gpio_mut().closed[row][col] = false,
            Step::Tap(key) => {
                self.step(Step::Press(key));
                self.advance(HOLD_TICKS);
                self.step(Step::Release(key));
                self.advance(HOLD_TICKS);
            }
            Step::Turn(rotation, detents) => {
                let phases = match rotation {
                    Rotation::Clockwise => CW_PHASES,
                    Rotation::CounterClockwise => CCW_PHASES,
                };
                for _ in 0..detents {
                    for phase in phases {
                        self.keyboard.gpio_mut().encoder = phase;
                        self.advance(1);
                    }
                    // Let the pulse expire so every detent is its own press.
                    self.advance(ENCODER_KEYPRESS_TICKS as u32 + 1);
                }
            }
            Step::Glitch(line) => {
                let toggle = |pins: &mut SimPins| match line {
                    Line::A => pins.encoder.0 = !pins.encoder.0,
                    Line::B => pins.encoder.1 = !pins.encoder.1,
                };
                toggle(self.keyboard.gpio_mut());
                self.advance(1);
                toggle(self.keyboard.gpio_mut());
            }
            Step::Wait(ticks) => self.advance(ticks),
            Step::Suspend(on) => self.keyboard.usb_mut().suspended = on,
            Step::Busy(on) => self.keyboard.usb_mut().busy = on,
            Step::Leds(bits) => self.keyboard.usb_mut().leds = Some(bits),
        }
    }

    fn advance(&mut self, ticks: u32) {
        for _ in 0..ticks {
            self.keyboard.tick();
            self.tick += 1;

            let events: Vec<Event> = self.keyboard.usb_mut().events.drain(..).collect();
            for event in events {
                self.record(event);
            }

            let lit = self.keyboard.led().is_lit();
            if lit != self.lit {
                self.lit = lit;
                self.record(Event::Led(lit));
            }
        }
    }

    fn record(&mut self, event: Event) {
        let record = Record {
            tick: self.tick,
            event,
        };
        if self.echo {
            println!("{}", record);
        }
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulate(trace: &str) -> Vec<Event> {
        let steps = parse_trace(trace).unwrap();
        let mut sim = Simulator::new(false);
        sim.run(&steps);
        sim.records().iter().map(|r| r.event).collect()
    }

    fn keys(event: &Event) -> Option<[u8; 6]> {
        match event {
            Event::Keyboard(report) => Some(report.keys),
            _ => None,
        }
    }

    #[test]
    fn parses_commands_and_comments() {
        let trace = "# warm up\n\
                     tap Esc\n\
                     press 2 1   # A\n\
                     wait 20\n\
                     release 2 1\n\
                     turn ccw 2\n\
                     glitch b\n\
                     suspend on\n\
                     busy off\n\
                     leds 0b10\n\
                     \n";
        let steps = parse_trace(trace).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Tap((0, 0)),
                Step::Press((2, 1)),
                Step::Wait(20),
                Step::Release((2, 1)),
                Step::Turn(Rotation::CounterClockwise, 2),
                Step::Glitch(Line::B),
                Step::Suspend(true),
                Step::Busy(false),
                Step::Leds(2),
            ]
        );
    }

    #[test]
    fn labels_resolve_through_both_layers() {
        assert_eq!(locate("fn"), Some((2, 0)));
        assert_eq!(locate("Boot"), Some((3, 1)));
        assert_eq!(locate("nope"), None);
    }

    #[test]
    fn packed_usages_resolve_to_keys() {
        assert_eq!(
            parse_trace("tap 0x070029\npress 0x0C00B0\n").unwrap(),
            vec![Step::Tap((0, 0)), Step::Press((2, 1))]
        );
        assert!(parse_trace("tap 0x070100").is_err());
        assert!(parse_trace("tap 0xZZ").is_err());
    }

    #[test]
    fn reports_bad_lines() {
        let err = parse_trace("tap Esc\nhop 1\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
        assert!(parse_trace("press 5 0").is_err());
        assert!(parse_trace("turn sideways").is_err());
        assert!(parse_trace("leds 0x1FF").is_err());
    }

    #[test]
    fn tap_sends_press_and_release() {
        let events = simulate("tap Esc");
        assert_eq!(events.len(), 2);
        assert_eq!(keys(&events[0]), Some([0x29, 0, 0, 0, 0, 0]));
        assert_eq!(keys(&events[1]), Some([0; 6]));
    }

    #[test]
    fn held_keys_accumulate() {
        let events = simulate("press Q\nwait 10\npress W\nwait 10");
        assert_eq!(keys(&events[1]), Some([0x14, 0x1A, 0, 0, 0, 0]));
    }

    #[test]
    fn encoder_turns_become_volume_pulses() {
        let events = simulate("turn cw 2");
        let volume: Vec<u16> = events
            .iter()
            .filter_map(|e| match e {
                Event::Consumer(report) => Some(report.usage),
                _ => None,
            })
            .collect();
        assert_eq!(volume, [0xE9, 0, 0xE9, 0]);
    }

    #[test]
    fn glitches_are_ignored() {
        assert!(simulate("glitch a\nwait 5\nglitch b\nwait 50").is_empty());
    }

    #[test]
    fn suspended_press_wakes_the_host() {
        let events = simulate("suspend on\ntap Esc");
        assert_eq!(events[0], Event::Wakeup);
        // The waking press itself is not reported, the release finds nothing.
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn caps_lock_lights_the_led() {
        let events = simulate("leds 0b10\nwait 600");
        assert_eq!(events, [Event::Led(true)]);
    }

    #[test]
    fn record_formatting() {
        let record = Record {
            tick: 24,
            event: Event::Keyboard(KeyboardReport {
                modifiers: 0b10,
                reserved: 0,
                keys: [0x04, 0, 0xA5, 0, 0, 0],
            }),
        };
        assert_eq!(record.to_string(), "     12.0ms  keyboard  mods=00000010 keys=[A 0x0700A5]");
    }
}
