mod halfkay;
mod hex;
mod layout;
mod sim;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

#[derive(Parser)]
#[command(name = "chrumm-cli")]
#[command(about = "Chrumm keyboard firmware tools")]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an input trace through the keyboard core and print the reports
    Simulate {
        /// Trace file, one command per line
        trace: PathBuf,
    },
    /// Render the keymap as an HTML page
    Layout {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Flash a .hex firmware file to the Teensy via the HalfKay bootloader
    Flash {
        /// Path to the Intel HEX firmware file
        firmware: PathBuf,
        /// Seconds to wait for the bootloader
        #[arg(long, default_value_t = 30)]
        wait: u64,
    },
    /// Detect if a Teensy is connected in bootloader mode
    Detect,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Simulate { trace } => {
            let contents = fs::read_to_string(&trace)
                .with_context(|| format!("reading {}", trace.display()))?;
            let steps = sim::parse_trace(&contents)
                .with_context(|| format!("parsing {}", trace.display()))?;
            let mut simulator = sim::Simulator::new(true);
            simulator.run(&steps);
            info!("{} host events", simulator.records().len());
        }
        Command::Layout { output } => {
            let html = layout::generate_html();
            match output {
                Some(path) => {
                    fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
                    info!("layout written to {}", path.display());
                }
                None => print!("{}", html),
            }
        }
        Command::Flash { firmware, wait } => {
            let contents = fs::read_to_string(&firmware)
                .with_context(|| format!("reading {}", firmware.display()))?;
            let image = hex::parse(&contents).context("parsing Intel HEX file")?;

            println!(
                "Firmware: {} bytes at base address 0x{:04X}",
                image.data.len(),
                image.base
            );

            let bootloader = halfkay::HalfKay::wait(Duration::from_secs(wait))?;
            bootloader.flash(&image)?;
            bootloader.reboot();
            println!("Done, the keyboard restarts with the new firmware.");
        }
        Command::Detect => {
            if halfkay::is_present()? {
                println!("Teensy bootloader detected (HalfKay mode).");
            } else {
                println!("Teensy bootloader not detected.");
                println!("Double-tap Fn, then tap Boot three times to enter it.");
            }
        }
    }

    Ok(())
}
