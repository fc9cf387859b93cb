//! Flashing through the Teensy 2.0 HalfKay bootloader.
//!
//! HalfKay takes one 128-byte flash page per HID SET_REPORT, prefixed with
//! the little-endian page address. Writing to address 0xFFFF reboots into
//! the new firmware.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use rusb::{DeviceHandle, GlobalContext};

use crate::hex::Image;

const HALFKAY_VID: u16 = 0x16C0;
const HALFKAY_PID: u16 = 0x0478;

/// ATmega32U4 flash page size.
pub const PAGE_SIZE: usize = 128;

/// HalfKay lives in the top 512 bytes of the 32KB flash.
pub const BOOTLOADER_START: u32 = 0x7E00;

const USB_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Page writes after the first need time to erase and program.
const PAGE_WRITE_DELAY: Duration = Duration::from_millis(5);

/// One SET_REPORT payload: page address plus page contents.
pub type Block = [u8; 2 + PAGE_SIZE];

/// Split an image into page blocks, skipping pages that stay erased.
pub fn blocks(image: &Image) -> Result<Vec<(u32, Block)>> {
    if image.end() > BOOTLOADER_START {
        bail!(
            "firmware ends at 0x{:04X}, past the bootloader at 0x{:04X}",
            image.end(),
            BOOTLOADER_START
        );
    }

    let page = PAGE_SIZE as u32;
    let first = image.base / page * page;
    let mut blocks = Vec::new();

    for address in (first..image.end()).step_by(PAGE_SIZE) {
        let mut block: Block = [0xFF; 2 + PAGE_SIZE];
        block[..2].copy_from_slice(&(address as u16).to_le_bytes());

        let from = address.max(image.base);
        let to = (address + page).min(image.end());
        let src = &image.data[(from - image.base) as usize..(to - image.base) as usize];
        let dst = 2 + (from - address) as usize;
        block[dst..dst + src.len()].copy_from_slice(src);

        if block[2..].iter().any(|&b| b != 0xFF) {
            blocks.push((address, block));
        }
    }

    Ok(blocks)
}

pub fn is_present() -> Result<bool> {
    Ok(find_device()?.is_some())
}

fn find_device() -> Result<Option<rusb::Device<GlobalContext>>> {
    let devices = rusb::devices().context("failed to enumerate USB devices")?;
    for device in devices.iter() {
        let desc = device
            .device_descriptor()
            .context("failed to read device descriptor")?;
        if desc.vendor_id() == HALFKAY_VID && desc.product_id() == HALFKAY_PID {
            return Ok(Some(device));
        }
    }
    Ok(None)
}

pub struct HalfKay {
    handle: DeviceHandle<GlobalContext>,
}

impl HalfKay {
    /// Wait up to `timeout` for the bootloader to show up.
    pub fn wait(timeout: Duration) -> Result<Self> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Waiting for the bootloader: double-tap Fn, then tap Boot three times");
        spinner.enable_steady_tick(POLL_INTERVAL);

        let deadline = Instant::now() + timeout;
        let device = loop {
            if let Some(device) = find_device()? {
                break device;
            }
            if Instant::now() >= deadline {
                spinner.finish_and_clear();
                bail!("bootloader not found within {}s", timeout.as_secs());
            }
            thread::sleep(POLL_INTERVAL);
        };
        spinner.finish_and_clear();

        let handle = device
            .open()
            .context("failed to open the bootloader (may need root or udev rules)")?;
        info!("bootloader found");
        Ok(Self { handle })
    }

    pub fn flash(&self, image: &Image) -> Result<()> {
        let blocks = blocks(image)?;

        let bar = ProgressBar::new(blocks.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} pages")?
                .progress_chars("=> "),
        );
        bar.set_message("Flashing");

        for (i, (address, block)) in blocks.iter().enumerate() {
            debug!("page 0x{:04X}", address);
            self.write(block)
                .with_context(|| format!("failed to write page at 0x{:04X}", address))?;
            if i == 0 {
                // The first write erases the whole chip.
                thread::sleep(Duration::from_secs(1));
            } else {
                thread::sleep(PAGE_WRITE_DELAY);
            }
            bar.inc(1);
        }

        bar.finish_with_message("Flashed");
        Ok(())
    }

    /// Leave the bootloader and start the application.
    pub fn reboot(&self) {
        let mut block: Block = [0; 2 + PAGE_SIZE];
        block[0] = 0xFF;
        block[1] = 0xFF;
        // The device drops off the bus before it can acknowledge.
        if let Err(err) = self.write(&block) {
            debug!("reboot request: {}", err);
        }
    }

    fn write(&self, block: &Block) -> Result<()> {
        // SET_REPORT, output report 0, interface 0
        self.handle
            .write_control(0x21, 0x09, 0x0200, 0, block, USB_TIMEOUT)
            .context("USB control transfer failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(base: u32, data: Vec<u8>) -> Image {
        Image { base, data }
    }

    #[test]
    fn pages_carry_their_address() {
        let data: Vec<u8> = (0..200).map(|i| i as u8).collect();
        let blocks = blocks(&image(0, data)).unwrap();
        assert_eq!(blocks.len(), 2);

        let (address, block) = &blocks[1];
        assert_eq!(*address, 0x80);
        assert_eq!(block[..2], [0x80, 0x00]);
        assert_eq!(block[2], 128);
        // Past the end of the image the page stays erased.
        assert_eq!(block[2 + 72], 0xFF);
    }

    #[test]
    fn unaligned_image_starts_mid_page() {
        let blocks = blocks(&image(0x104, vec![0x11, 0x22])).unwrap();
        assert_eq!(blocks.len(), 1);
        let (address, block) = &blocks[0];
        assert_eq!(*address, 0x100);
        assert_eq!(block[2..8], [0xFF, 0xFF, 0xFF, 0xFF, 0x11, 0x22]);
    }

    #[test]
    fn erased_pages_are_skipped() {
        let mut data = vec![0xFF; 3 * PAGE_SIZE];
        data[2 * PAGE_SIZE] = 0;
        let blocks = blocks(&image(0, data)).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].0, 0x100);
    }

    #[test]
    fn refuses_to_overwrite_the_bootloader() {
        let data = vec![0; PAGE_SIZE + 1];
        assert!(blocks(&image(BOOTLOADER_START - PAGE_SIZE as u32, data)).is_err());
        assert!(blocks(&image(0, vec![0; BOOTLOADER_START as usize])).is_ok());
    }
}
