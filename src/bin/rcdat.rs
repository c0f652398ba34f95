//! Command line tool to set the attenuation of a Mini-Circuits RCDAT over
//! USB.
//!
//! The requested attenuation is checked before the device is opened.  The
//! device is then identified, the attenuation set, and read back.
//!
//! Exit codes:
//! * 0 - attenuation set and read back
//! * 1 - invalid attenuation, device not found, or a USB failure
//! * 2 - the device didn't acknowledge the new attenuation
//!
//! All logging is to stderr and can be controlled via the `RUST_LOG`
//! environment variable.
use rcdat::constants::{MAX_ATTENUATION_DB, MIN_ATTENUATION_DB, RCDAT_PID, RCDAT_VID};
use rcdat::{Attenuation, AttenuatorBuilder, Error, RunReport};

use clap::Parser;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use std::time::Duration;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_NOT_ACKNOWLEDGED: i32 = 2;

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Mini-Circuits RCDAT USB configuration tool",
    after_help = help_text()
)]
struct Args {
    /// Attenuation in dB, 0.25 dB resolution
    #[arg(allow_hyphen_values = true)]
    atten: String,

    /// USB vendor ID, decimal or 0x prefixed hex
    #[arg(long, value_parser = parse_usb_id, default_value_t = RCDAT_VID)]
    vid: u16,

    /// USB product ID, decimal or 0x prefixed hex
    #[arg(long, value_parser = parse_usb_id, default_value_t = RCDAT_PID)]
    pid: u16,

    /// Maximum time to wait for each USB transfer, in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Print the device's serial number, model and firmware version
    #[arg(long)]
    info: bool,
}

fn help_text() -> String {
    format!(
        "This tool is used to set the attenuation of a Mini-Circuits RCDAT, using the USB interface.\n\
         Attenuation value must be a decimal number between {MIN_ATTENUATION_DB} and {MAX_ATTENUATION_DB}\n\
         \n\
         Default VID=0x{RCDAT_VID:04X}\n\
         Default PID=0x{RCDAT_PID:04X}"
    )
}

fn parse_usb_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("{s:?} is not a valid USB ID: {e}"))
}

fn execute(args: &Args) -> Result<RunReport, Error> {
    // Check before going anywhere near the device
    let attenuation: Attenuation = args.atten.parse()?;

    info!("Open RCDAT {:04x}:{:04x}", args.vid, args.pid);
    let mut attenuator = AttenuatorBuilder::new()
        .vendor_id(args.vid)
        .product_id(args.pid)
        .timeout(Duration::from_millis(args.timeout_ms))
        .build()?;

    let report = attenuator.run(attenuation.db(), &mut std::io::stdout())?;
    if args.info {
        println!("RCDAT information:");
        println!("{}", report.info);
    }

    info!("All done - exiting");
    Ok(report)
}

fn exit_code(result: &Result<RunReport, Error>) -> i32 {
    match result {
        Ok(report) if report.is_success() => EXIT_SUCCESS,
        Ok(_) => EXIT_NOT_ACKNOWLEDGED,
        Err(_) => EXIT_FAILURE,
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    println!("Mini-Circuits RCDAT USB configuration tool");
    println!("Attenuation: {}", args.atten);

    let result = execute(&args);
    match &result {
        Ok(RunReport {
            set_failure: Some(e),
            ..
        }) => error!("{e}"),
        Ok(_) => (),
        Err(e) => {
            // Use our own eprintln so our Error display is used
            eprintln!("{e}");
            if let Error::InvalidAttenuation { .. } = e {
                eprintln!("{}", help_text());
            }
        }
    }
    std::process::exit(exit_code(&result));
}
