use dali::drivers::driver::{DaliBusEvent, DaliBusEventType, OpenError};
use hasseb_dali as dali;
use std::time::Instant;

extern crate clap;
use clap::{Arg, Command};

/// The adapter only reports other traffic when sniffing is on
fn with_sniffing(device: &str) -> String {
    if device.contains("sniff=") {
        device.to_string()
    } else if device.contains(':') {
        format!("{},sniff=1", device)
    } else {
        format!("{}:sniff=1", device)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = dali::drivers::init() {
        println!("Failed to initialize DALI drivers: {}", e);
    }
    let matches = Command::new("dali_monitor")
        .about("Print DALI bus traffic.")
        .arg(
            Arg::new("DEVICE")
                .short('d')
                .long("device")
                .default_value("default")
                .help("Select DALI-device, NAME[:key=value,...]"),
        )
        .get_matches();

    let device_name = with_sniffing(matches.get_one::<String>("DEVICE").unwrap());
    let mut driver = match dali::drivers::open(&device_name) {
        Ok(d) => d,
        Err(e) => {
            println!("Failed to open DALI device: {}", e);
            if let OpenError::NotFound = e {
                println!("Available drivers:");
                for name in dali::drivers::driver_names() {
                    println!("  {}", name);
                }
            }
            return;
        }
    };
    let mut last_ts = Instant::now();
    loop {
        let DaliBusEvent {
            timestamp,
            event_type,
        } = match driver.next_bus_event().await {
            Ok(e) => e,
            Err(e) => {
                println!("Monitoring stopped: {}", e);
                break;
            }
        };
        print!("{:5}:", timestamp.duration_since(last_ts).as_millis());
        last_ts = timestamp;
        match event_type {
            DaliBusEventType::Frame8(b) => println!(" {:02x}", b),
            DaliBusEventType::Frame16(ref pkt) => {
                for b in pkt {
                    print!(" {:02x}", b);
                }
                println!();
            }
            DaliBusEventType::Frame24(ref pkt) => {
                for b in pkt {
                    print!(" {:02x}", b);
                }
                println!();
            }
            DaliBusEventType::FramingError => println!(" Framing error"),
        }
    }
    driver.close().await;
}
