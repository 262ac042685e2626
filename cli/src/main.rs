//! z80flow command line front end

use std::{fs, io, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use z80flow_analyzer::Analyzer;
use z80flow_spec::{Address, DisassemblerConfig};

#[derive(Parser)]
#[command(version, about = "Reconstruct and label the control flow of a Z80 binary", long_about = None)]
struct Args {
    /// Raw binary image
    image: PathBuf,

    /// Load address of the image
    #[arg(long, value_parser = parse_address, default_value = "0")]
    origin: Address,

    /// Entry address (repeatable, defaults to the origin)
    #[arg(long = "entry", value_parser = parse_address)]
    entries: Vec<Address>,

    /// Known label as ADDR=NAME (repeatable)
    #[arg(long = "label", value_parser = parse_label)]
    labels: Vec<(Address, String)>,

    /// Inline data after a call as ADDR=COUNT, ADDR being the return address
    #[arg(long = "skip", value_parser = parse_skip)]
    skips: Vec<(Address, u16)>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decode ZX Spectrum Next opcodes
    #[arg(long)]
    z80n: bool,

    /// Lowercase mnemonics
    #[arg(long)]
    lowercase: bool,

    /// Write the analyzed graph as JSON
    #[arg(long)]
    graph_json: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

/// Parse `0x8000`, `$8000`, `8000h` or decimal.
fn parse_address(s: &str) -> Result<Address, String> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x").or_else(|| lower.strip_prefix('$')) {
        u32::from_str_radix(hex, 16)
    } else if let Some(hex) = lower.strip_suffix('h') {
        u32::from_str_radix(hex, 16)
    } else {
        lower.parse::<u32>()
    };
    match parsed {
        Ok(value) if value <= Address::MAX as u32 => Ok(value as Address),
        Ok(_) => Err(format!("address '{}' is outside 0..FFFFh", s)),
        Err(_) => Err(format!("invalid address '{}'", s)),
    }
}

fn parse_label(s: &str) -> Result<(Address, String), String> {
    let (address, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=NAME, got '{}'", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty label name in '{}'", s));
    }
    Ok((parse_address(address)?, name.to_string()))
}

fn parse_skip(s: &str) -> Result<(Address, u16), String> {
    let (address, count) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=COUNT, got '{}'", s))?;
    Ok((parse_address(address)?, parse_address(count)?))
}

fn load_config(args: &Args) -> Result<DisassemblerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DisassemblerConfig::default(),
    };
    config.z80n |= args.z80n;
    config.lowercase_mnemonics |= args.lowercase;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let image = fs::read(&args.image)
        .with_context(|| format!("reading image {}", args.image.display()))?;
    if image.is_empty() {
        bail!("image {} is empty", args.image.display());
    }

    let config = load_config(&args)?;
    tracing::debug!("{}", config);
    let mut analyzer = Analyzer::new(config).context("invalid configuration")?;
    analyzer
        .set_memory(args.origin, &image)
        .with_context(|| format!("loading {} bytes at {:04X}h", image.len(), args.origin))?;

    for (address, name) in &args.labels {
        analyzer.set_label(*address, name.clone());
    }
    for &(address, count) in &args.skips {
        analyzer.set_skip(address, count)?;
    }

    let entries = if args.entries.is_empty() {
        vec![args.origin]
    } else {
        args.entries.clone()
    };
    let nodes = analyzer.get_flow_graph(&entries).len();
    tracing::info!(
        "{} nodes, {} blocks from {} entries",
        nodes,
        analyzer.blocks().len(),
        entries.len()
    );

    for line in analyzer.listing() {
        println!("{}", line);
    }

    if !analyzer.diagnostics().is_empty() {
        println!();
        for diagnostic in analyzer.diagnostics().to_sorted_vec() {
            println!("; {}", diagnostic);
        }
    }

    if let Some(path) = &args.graph_json {
        let json = serde_json::to_string_pretty(&analyzer.snapshot())?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(())
}
