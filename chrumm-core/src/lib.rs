//! Input processing and HID report generation for the Chrumm keyboard.
//!
//! This crate is `no_std` so the same code runs in the AVR firmware and in
//! the host-side simulator. Hardware is reached only through the traits in
//! [`hal`]; everything else is plain state owned by [`Keyboard`].

#![no_std]

pub mod config;
pub mod debounce;
pub mod encoder;
pub mod hal;
pub mod hid;
pub mod keyboard;
pub mod keymap;
pub mod layer;
pub mod led;
pub mod matrix;
pub mod usage;

pub use keyboard::Keyboard;
pub use usage::Usage;
