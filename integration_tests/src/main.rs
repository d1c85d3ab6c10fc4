//! Integration tests for the torque sensor firmware.
//!
//! Run after flashing the firmware to check the notification stream over BLE.

mod ble_client;
mod protocol;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::SampleClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the torque sensor firmware")]
struct Args {
    /// BLE device name to scan for
    #[arg(long, default_value = protocol::DEVICE_NAME)]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// Number of notifications to collect for the stream checks
    #[arg(long, default_value = "5")]
    samples: usize,

    /// Values above this are flagged in the sample listing (Ncm)
    #[arg(long, default_value = "100")]
    threshold: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "Torque Sensor Integration Tests".bold());
    println!("Device: BLE (scanning for \"{}\")", args.name);
    println!();

    println!("Scanning...");
    let mut client =
        SampleClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&mut client, args.samples.max(2), args.threshold).await;
    print_results(&results);

    let _ = client.disconnect().await;

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
