use dali::drivers::driver::OpenError;
use dali::gear::address::Address;
use dali::gear::commands::GearCommands;
use hasseb_dali as dali;
extern crate clap;
use clap::{value_parser, Arg, ArgAction, Command};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    if let Err(e) = dali::drivers::init() {
        println!("Failed to initialize DALI drivers: {}", e);
    }
    let matches = Command::new("query_gear")
        .about("Query a DALI gear for group membership, version and presence.")
        .arg(
            Arg::new("DEVICE")
                .short('d')
                .long("device")
                .default_value("default")
                .help("Select DALI-device, NAME[:key=value,...]"),
        )
        .arg(
            Arg::new("ADDR")
                .required(true)
                .value_parser(value_parser!(String))
                .help("Address: 1-64, G1-G16 or *"),
        )
        .arg(
            Arg::new("groups")
                .short('g')
                .long("groups")
                .action(ArgAction::SetTrue)
                .help("Query group membership"),
        )
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Query version number"),
        )
        .arg(
            Arg::new("present")
                .short('p')
                .long("present")
                .action(ArgAction::SetTrue)
                .help("Query if control gear is present"),
        )
        .get_matches();

    let addr: Address = match matches.get_one::<String>("ADDR").unwrap().parse() {
        Ok(a) => a,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };
    let mut groups = matches.get_flag("groups");
    let mut version = matches.get_flag("version");
    let mut present = matches.get_flag("present");
    if !(groups || version || present) {
        groups = true;
        version = true;
        present = true;
    }
    let device_name = matches.get_one::<String>("DEVICE").unwrap();
    let mut gear = match GearCommands::open(device_name) {
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

    if present {
        match gear.query_control_gear_present(addr).await {
            Ok(p) => println!("Present: {}", if p { "yes" } else { "no" }),
            Err(e) => println!("Presence query failed: {}", e),
        }
    }
    if version {
        match gear.query_version(addr).await {
            Ok(Some(v)) => println!("Version: {}.{}", v >> 2, v & 0x03),
            Ok(None) => println!("Version: no answer"),
            Err(e) => println!("Version query failed: {}", e),
        }
    }
    if groups {
        match gear.query_groups(addr).await {
            Ok(Some(groups)) => {
                let names: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
                println!("Groups: {}", names.join(" "));
            }
            Ok(None) => println!("Groups: no answer"),
            Err(e) => println!("Group query failed: {}", e),
        }
    }
    gear.close().await;
}
