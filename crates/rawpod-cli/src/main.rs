//! rawpod CLI - find an iPod, show its partition table, make room for Linux
//!
//! Without `--device` every command first scans disks 0-7 for an iPod layout.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rawpod_core::{format_sectors, DeviceId, SECTOR_SIZE};
use rawpod_devices::{find_ipod, DeviceConfig, DeviceFacade, SplitRequest};
use rawpod_zones::{IpodLayout, PartitionTable, PartitionType};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rawpod")]
#[command(about = "Inspect and split the MBR partition table of an iPod")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Disk number to operate on (default: first iPod found)
    #[arg(short, long, global = true)]
    device: Option<u8>,

    /// Use this image file instead of real disks
    #[arg(long = "override", env = "RAWPOD_OVERRIDE", global = true)]
    override_path: Option<PathBuf>,

    /// Number of disks to probe when scanning
    #[arg(long, default_value_t = DeviceConfig::DEFAULT_SCAN_LIMIT, global = true)]
    scan_limit: u8,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level
    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Probe disks for an iPod partition layout
    Scan,

    /// Show the MBR and partition table
    Show {
        /// Include legacy CHS addresses
        #[arg(long)]
        chs: bool,
    },

    /// Print the iPod layout of the disk
    Classify,

    /// Print the size of the disk
    Size,

    /// Shrink a partition and create a new one in the freed space
    Split {
        /// Partition to shrink (1-4)
        #[arg(long, default_value_t = 2)]
        from: u32,

        /// Empty slot for the new partition (1-4)
        #[arg(long, default_value_t = 3)]
        to: u32,

        /// Type of the new partition: 0xNN, decimal, or linux/swap/fat32/hfs
        #[arg(long = "type", default_value = "linux")]
        partition_type: PartitionType,

        /// Size of the new partition: sectors, or bytes with a K/M/G suffix
        #[arg(long, value_parser = parse_sectors)]
        size: u32,

        /// Show the resulting table without writing it
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = DeviceConfig {
        override_path: cli.override_path.clone(),
        scan_limit: cli.scan_limit,
    };
    if let Some(path) = &config.override_path {
        tracing::info!("using override image {}", path.display());
    }
    let facade = DeviceFacade::new(config);

    match &cli.command {
        Command::Scan => cmd_scan(&cli, &facade),
        Command::Show { chs } => cmd_show(&cli, &facade, *chs),
        Command::Classify => cmd_classify(&cli, &facade),
        Command::Size => cmd_size(&cli, &facade),
        Command::Split {
            from,
            to,
            partition_type,
            size,
            dry_run,
        } => {
            let request = SplitRequest {
                source: *from,
                dest: *to,
                partition_type: *partition_type,
                sectors: *size,
                dry_run: *dry_run,
            };
            cmd_split(&cli, &facade, &request)
        }
    }
}

/// The disk given with `--device`, or the first iPod found
fn target_device(cli: &Cli, facade: &DeviceFacade) -> Result<DeviceId> {
    if let Some(n) = cli.device {
        return Ok(DeviceId::new(n));
    }

    let report = find_ipod(facade, cli.scan_limit);
    match report.found {
        Some((device, _)) => Ok(device),
        None => bail!(
            "no iPod found on disks 0-{}; use --device to pick one",
            cli.scan_limit.saturating_sub(1)
        ),
    }
}

fn cmd_scan(cli: &Cli, facade: &DeviceFacade) -> Result<()> {
    let report = find_ipod(facade, cli.scan_limit);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if facade.is_substituted() {
        println!("Pretending override image is an iPod");
    }
    for probe in &report.probes {
        println!("Disk {}: {}", probe.device.number(), probe.outcome);
    }

    match report.found {
        Some((device, layout)) => println!("iPod is disk {} ({})", device.number(), layout),
        None => println!("No iPod found."),
    }
    Ok(())
}

fn cmd_show(cli: &Cli, facade: &DeviceFacade, chs: bool) -> Result<()> {
    let device = target_device(cli, facade)?;
    let (image, table) = facade
        .read_table(device)
        .with_context(|| format!("{}: could not read partition table", device))?;
    let layout = IpodLayout::classify(&table, &image);

    if cli.json {
        let output = serde_json::json!({
            "device": device.number(),
            "disk_signature": image.disk_signature(),
            "layout": layout,
            "partitions": table,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("=== Partition Table ===");
    println!("Device:      {}", device);
    println!("Disk Sig:    0x{:08X}", image.disk_signature());
    println!("Boot Sig:    0x{:04X}", image.boot_signature());
    println!("Layout:      {}", layout);
    println!();
    print_table(&table, chs);
    Ok(())
}

fn print_table(table: &PartitionTable, chs: bool) {
    println!(
        "{:<4} {:<4} {:<20} {:>10} {:>10} {:>12}",
        "Slot", "Boot", "Type", "Start", "Sectors", "Size"
    );
    println!("{}", "-".repeat(65));

    for (i, entry) in table.iter().enumerate() {
        println!(
            "{:<4} {:<4} {:<20} {:>10} {:>10} {:>12}",
            i + 1,
            if entry.is_bootable() { "*" } else { "" },
            entry.partition_type.to_string(),
            entry.start_sector,
            entry.sector_count,
            format_sectors(entry.sector_count as u64)
        );
        if chs {
            println!("{:<9} {} - {}", "", entry.chs_first(), entry.chs_last());
        }
    }
}

fn cmd_classify(cli: &Cli, facade: &DeviceFacade) -> Result<()> {
    let device = target_device(cli, facade)?;
    let image = facade
        .read_mbr(device)
        .with_context(|| format!("{}: could not read MBR", device))?;
    let (_, layout) = IpodLayout::detect(&image)
        .with_context(|| format!("{}: invalid partition table", device))?;

    if cli.json {
        let output = serde_json::json!({ "device": device.number(), "layout": layout });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}: {}", device, layout);
    }
    Ok(())
}

fn cmd_size(cli: &Cli, facade: &DeviceFacade) -> Result<()> {
    let device = target_device(cli, facade)?;
    let sectors = facade
        .device_size_sectors(device)
        .with_context(|| format!("{}: could not get size", device))?;

    if cli.json {
        let output = serde_json::json!({ "device": device.number(), "sectors": sectors });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}: {} sectors ({})", device, sectors, format_sectors(sectors));
    }
    Ok(())
}

fn cmd_split(cli: &Cli, facade: &DeviceFacade, request: &SplitRequest) -> Result<()> {
    let device = target_device(cli, facade)?;
    let outcome = facade
        .split_partition(device, request)
        .with_context(|| format!("{}: could not split partition {}", device, request.source))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("=== Before ===");
    print_table(&outcome.before, false);
    println!();
    println!("=== After ===");
    print_table(&outcome.after, false);
    println!();
    if outcome.written {
        println!("Partition table of {} updated.", device);
    } else {
        println!("Dry run: nothing written.");
    }
    Ok(())
}

/// Parse a partition size into sectors
///
/// A bare number is a sector count; `K`, `M` and `G` suffixes are binary byte units.
fn parse_sectors(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1u64 << 10),
        Some((i, 'm' | 'M')) => (&s[..i], 1u64 << 20),
        Some((i, 'g' | 'G')) => (&s[..i], 1u64 << 30),
        _ => (s, SECTOR_SIZE as u64),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size: {}", s))?;
    let sectors = value
        .checked_mul(multiplier)
        .map(|bytes| bytes / SECTOR_SIZE as u64)
        .ok_or_else(|| format!("size too large: {}", s))?;

    u32::try_from(sectors).map_err(|_| format!("size too large: {}", s))
}
