//! Intel HEX firmware images.

use std::str::FromStr;

use anyhow::{bail, ensure, Context, Error, Result};

/// ATmega32U4 flash size. No image may span more than this.
pub const FLASH_SIZE: u32 = 0x8000;

/// Contiguous firmware image. Gaps between records read as erased flash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub base: u32,
    pub data: Vec<u8>,
}

impl Image {
    pub fn end(&self) -> u32 {
        self.base + self.data.len() as u32
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Record {
    Data { offset: u16, bytes: Vec<u8> },
    EndOfFile,
    /// Type 02, bits 4..20 of the address.
    SegmentBase(u32),
    /// Type 04, bits 16..32 of the address.
    LinearBase(u32),
    /// Types 03 and 05 only matter to x86 loaders.
    StartAddress,
}

impl FromStr for Record {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let hex = line.strip_prefix(':').context("missing start code ':'")?;
        ensure!(hex.is_ascii(), "non-ASCII characters");
        ensure!(hex.len() % 2 == 0, "odd number of hex digits");

        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .with_context(|| format!("invalid hex at column {}", i + 2))
            })
            .collect::<Result<Vec<u8>>>()?;

        ensure!(bytes.len() >= 5, "record too short");
        let count = bytes[0] as usize;
        ensure!(
            bytes.len() == count + 5,
            "expected {} data bytes, got {}",
            count,
            bytes.len() - 5
        );
        ensure!(
            bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0,
            "checksum mismatch"
        );

        let offset = u16::from_be_bytes([bytes[1], bytes[2]]);
        let data = &bytes[4..4 + count];
        let word = || -> Result<u32> {
            ensure!(count == 2, "address record must carry 2 bytes");
            Ok(u16::from_be_bytes([data[0], data[1]]) as u32)
        };

        match bytes[3] {
            0x00 => Ok(Record::Data {
                offset,
                bytes: data.to_vec(),
            }),
            0x01 => Ok(Record::EndOfFile),
            0x02 => Ok(Record::SegmentBase(word()? << 4)),
            0x03 | 0x05 => Ok(Record::StartAddress),
            0x04 => Ok(Record::LinearBase(word()? << 16)),
            other => bail!("unsupported record type 0x{:02X}", other),
        }
    }
}

/// Parse an Intel HEX file into one flat image.
pub fn parse(input: &str) -> Result<Image> {
    let mut base = 0u32;
    let mut chunks: Vec<(u32, Vec<u8>)> = Vec::new();

    for (n, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: Record = line.parse().with_context(|| format!("line {}", n + 1))?;
        match record {
            Record::Data { offset, bytes } => {
                let address = base + offset as u32;
                address
                    .checked_add(bytes.len() as u32)
                    .with_context(|| format!("line {}: data runs past the 4GB address space", n + 1))?;
                chunks.push((address, bytes));
            }
            Record::EndOfFile => break,
            Record::SegmentBase(address) | Record::LinearBase(address) => base = address,
            Record::StartAddress => {}
        }
    }

    let (Some(start), Some(end)) = (
        chunks.iter().map(|(address, _)| *address).min(),
        chunks.iter().map(|(address, bytes)| address + bytes.len() as u32).max(),
    ) else {
        bail!("no data records");
    };
    ensure!(
        end - start <= FLASH_SIZE,
        "image spans 0x{:X}..0x{:X}, more than the {}KB flash",
        start,
        end,
        FLASH_SIZE / 1024
    );

    let mut data = vec![0xFF; (end - start) as usize];
    for (address, bytes) in chunks {
        let at = (address - start) as usize;
        data[at..at + bytes.len()].copy_from_slice(&bytes);
    }

    Ok(Image { base: start, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_data_record() {
        let image = parse(
            ":10000000000102030405060708090A0B0C0D0E0F78\n\
             :00000001FF\n",
        )
        .unwrap();
        assert_eq!(image.base, 0);
        assert_eq!(image.data, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn segment_base_shifts_by_four() {
        let image = parse(
            ":020000020100FB\n\
             :10000000112233445566778899AABBCCDDEEFF00F8\n\
             :00000001FF\n",
        )
        .unwrap();
        assert_eq!(image.base, 0x1000);
        assert_eq!(image.end(), 0x1010);
    }

    #[test]
    fn linear_base_shifts_by_sixteen() {
        let image = parse(
            ":020000040001F9\n\
             :0400000001020304F2\n\
             :0400000500000000F7\n\
             :00000001FF\n",
        )
        .unwrap();
        assert_eq!(image.base, 0x1_0000);
        assert_eq!(image.data, [1, 2, 3, 4]);
    }

    #[test]
    fn adjacent_records_join_and_gaps_read_erased() {
        let image = parse(
            ":04000000AABBCCDDEE\n\
             :04000400112233444E\n\
             :02001000CCDD45\n\
             :00000001FF\n",
        )
        .unwrap();
        assert_eq!(image.data.len(), 0x12);
        assert_eq!(image.data[..8], [0xAA, 0xBB, 0xCC, 0xDD, 0x11, 0x22, 0x33, 0x44]);
        assert!(image.data[8..0x10].iter().all(|&b| b == 0xFF));
        assert_eq!(image.data[0x10..], [0xCC, 0xDD]);
    }

    #[test]
    fn records_after_end_of_file_are_ignored() {
        let image = parse(":0100000042BD\n:00000001FF\n:01000100FFFF\n").unwrap();
        assert_eq!(image.data, [0x42]);
    }

    #[test]
    fn rejects_malformed_lines() {
        let bad_checksum = ":10000000000102030405060708090A0B0C0D0E0F00\n";
        let err = parse(bad_checksum).unwrap_err();
        assert!(format!("{:#}", err).contains("checksum"));

        assert!(parse("10000000\n").is_err());
        assert!(parse(":0100000042\n").is_err());
        assert!(parse(":00000001FF\n").is_err());
        assert!(parse(":00000006FA\n").is_err());

        // Valid checksums, but the data would end past 0xFFFFFFFF.
        let err = parse(":02000004FFFFFC\n:02FFFF00AABB9B\n:00000001FF\n").unwrap_err();
        assert!(format!("{:#}", err).contains("address space"));
    }

    #[test]
    fn rejects_images_larger_than_flash() {
        let err = parse(":0100000042BD\n:020000040001F9\n:0100000042BD\n:00000001FF\n").unwrap_err();
        assert!(format!("{:#}", err).contains("flash"));
    }
}
