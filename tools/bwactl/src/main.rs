mod cli;

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use log::info;
use log::warn;
use serde::Serialize;

use cli::Opts;
use hmem_utils::misc;
use hmem_utils::ratio;
use hmem_utils::IwSysfs;
use hmem_utils::Topology;
use hmem_utils::BandwidthMatrix;
use hmem_utils::WeightVector;

/// Copy of the live benchmark output, kept for later reference.
const MLC_SAVE_FILE: &str = "mlc.out";

/// Generated-configuration payload for --output.
#[derive(Serialize)]
struct WeightConfig<'a> {
    soft_max_ratio: u64,
    nodes: &'a [WeightVector],
}

fn run_mlc() -> Result<String> {
    info!("Measuring bandwidth... this takes a few minutes");
    let output = Command::new("mlc")
        .args(["--bandwidth_matrix", "-W2"])
        .output()
        .context("failed to run mlc")?;
    if !output.status.success() {
        bail!("mlc exited with {}", output.status);
    }
    let report = String::from_utf8_lossy(&output.stdout).into_owned();

    fs::write(MLC_SAVE_FILE, &report)
        .with_context(|| format!("failed to save {MLC_SAVE_FILE}"))?;
    Ok(report)
}

fn run_lstopo() -> Result<String> {
    let output = Command::new("lstopo-no-graphics")
        .arg("-p")
        .output()
        .context("failed to run lstopo-no-graphics")?;
    if !output.status.success() {
        bail!("lstopo-no-graphics exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn read_input_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Resolve the node-to-package mapping from, in order of precedence: the
/// literal --topology override, an lstopo report file, or live lstopo
/// execution. A missing lstopo binary is not fatal; the full bandwidth rows
/// are used instead.
fn resolve_topology(
    opts: &Opts,
    nr_nodes: usize,
    possible: &std::collections::BTreeSet<usize>,
) -> Result<Option<Topology>> {
    if let Some(literal) = &opts.topology {
        return Ok(Some(Topology::from_literal(literal, nr_nodes, possible)?));
    }

    let report = match &opts.lstopo_file {
        Some(path) => read_input_file(path)?,
        None => match run_lstopo() {
            Ok(report) => report,
            Err(e) => {
                warn!("{e:#}, using full bandwidth rows");
                return Ok(None);
            }
        },
    };
    Ok(Some(Topology::from_report(&report, nr_nodes)?))
}

fn write_config(path: &Path, soft_max: u64, nodes: &[WeightVector]) -> Result<()> {
    let config = WeightConfig {
        soft_max_ratio: soft_max,
        nodes,
    };
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(path, json + "\n").with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let llv = match opts.verbose {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_time_level(simplelog::LevelFilter::Error)
        .set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    simplelog::TermLogger::init(
        llv,
        lcfg.build(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let sysfs = IwSysfs::new();
    sysfs.verify_supported()?;
    misc::check_root_permission()?;

    let nr_nodes = sysfs.nr_system_nodes()?;

    let report = match &opts.mlc_file {
        Some(path) => read_input_file(path)?,
        None => run_mlc()?,
    };
    let matrix = BandwidthMatrix::parse(&report, nr_nodes)?;

    let possible = sysfs.possible_nodes()?;
    if let Some(&max) = possible.iter().next_back() {
        if max >= nr_nodes {
            bail!("possible node {max} out of range, system has {nr_nodes} nodes");
        }
    }

    let topology = resolve_topology(&opts, nr_nodes, &possible)?;

    println!("Bandwidth ratio for all NUMA nodes");

    let mut vectors = Vec::with_capacity(possible.len());
    for &nid in &possible {
        let wv = ratio::weights_for_node(&matrix, topology.as_ref(), nid, opts.soft_max);
        println!("node{}: {}", nid, wv.ratio_string());
        wv.validate(&possible)?;
        vectors.push(wv);
    }

    if let Some(path) = &opts.output {
        write_config(path, opts.soft_max, &vectors)?;
        println!("\nBandwidth ratio config written to {}", path.display());
    } else {
        let updated = sysfs.apply(&vectors)?;
        println!("\nBandwidth ratio is successfully updated at");
        for path in updated {
            println!("  {}", path.display());
        }
    }

    Ok(())
}
