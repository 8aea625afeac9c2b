// ============ Avvy Bundle Inspector ============
// Offline tooling for the bundle store written by the SDK.
//
// Usage:
//   avvy-inspect list   --store bundles.json
//   avvy-inspect verify --store bundles.json [--key 0x...]
//   avvy-inspect phase  --boundaries 100,200,300,400 [--now 150]
//   avvy-inspect check  avvy.avax ab.avax
//   avvy-inspect export --store bundles.json --out backup.json
//
// `verify` recomputes every commitment from its recorded items and salt.
// A bundle that fails here cannot be revealed as stored.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use avvy_commitment::build_commitment_hash;
use avvy_phase::{current_phase, PhaseBoundaries};
use avvy_sdk::store::{read_bundle_file, write_bundle_file};
use avvy_types::{Bundle, Hash32, Name};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "avvy-inspect")]
#[command(about = "Inspect and verify persisted .avax commitment bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every bundle with its state
    List {
        #[arg(long)]
        store: PathBuf,
    },

    /// Recompute commitments and report bundles that no longer open
    Verify {
        #[arg(long)]
        store: PathBuf,

        /// Only check this bundle
        #[arg(long)]
        key: Option<String>,
    },

    /// Resolve the auction phase for a set of boundaries
    Phase {
        /// bid_start,reveal_start,claim_start,claim_end
        #[arg(long, value_delimiter = ',')]
        boundaries: Vec<u64>,

        /// Seconds since the epoch; defaults to now
        #[arg(long)]
        now: Option<u64>,
    },

    /// Validate candidate names
    Check { names: Vec<String> },

    /// Write a backup copy of the store
    Export {
        #[arg(long)]
        store: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
}

// ============ Verification ============

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Opens,
    Mismatch(Hash32),
    Malformed(String),
}

fn verify_bundle(bundle: &Bundle) -> Verdict {
    match build_commitment_hash(bundle.kind, &bundle.items, &bundle.proofs, &bundle.salt) {
        Ok(actual) if actual == bundle.key => Verdict::Opens,
        Ok(actual) => Verdict::Mismatch(actual),
        Err(e) => Verdict::Malformed(e.to_string()),
    }
}

fn load(store: &Path) -> anyhow::Result<Vec<Bundle>> {
    if !store.exists() {
        bail!("store {} does not exist", store.display());
    }
    let bundles = read_bundle_file(store).with_context(|| format!("reading {}", store.display()))?;
    debug!(count = bundles.len(), "loaded bundles");
    Ok(bundles)
}

fn names_of(bundle: &Bundle) -> String {
    bundle
        .names()
        .iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ============ Commands ============

fn list(store: &Path) -> anyhow::Result<()> {
    let bundles = load(store)?;
    println!("{} bundle(s) in {}", bundles.len(), store.display());
    for b in &bundles {
        println!(
            "  {}  {:<12} {:<11} created {}  [{}]",
            b.key,
            format!("{:?}", b.kind),
            format!("{:?}", b.state),
            b.created_at,
            names_of(b)
        );
    }
    Ok(())
}

fn verify(store: &Path, key: Option<&str>) -> anyhow::Result<()> {
    let mut bundles = load(store)?;
    if let Some(key) = key {
        let key = Hash32::from_hex(key).context("parsing --key")?;
        bundles.retain(|b| b.key == key);
        if bundles.is_empty() {
            bail!("bundle {} not found", key);
        }
    }

    let mut failures = 0;
    for b in &bundles {
        match verify_bundle(b) {
            Verdict::Opens => println!("  OK        {}", b.key),
            Verdict::Mismatch(actual) => {
                failures += 1;
                println!("  MISMATCH  {} (inputs hash to {})  [{}]", b.key, actual, names_of(b));
            }
            Verdict::Malformed(reason) => {
                failures += 1;
                println!("  MALFORMED {} ({})", b.key, reason);
            }
        }
    }

    info!(checked = bundles.len(), failures, "verification finished");
    if failures > 0 {
        bail!("{} of {} bundle(s) do not open", failures, bundles.len());
    }
    println!("All {} bundle(s) open to their recorded commitment.", bundles.len());
    Ok(())
}

fn phase(boundaries: &[u64], now: Option<u64>) -> anyhow::Result<()> {
    let raw: [u64; 4] = boundaries
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected 4 boundaries, got {}", boundaries.len()))?;
    let boundaries = PhaseBoundaries::new(raw)?;
    let now = match now {
        Some(now) => now,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
    };

    match current_phase(&boundaries, now) {
        Some(phase) => println!("{phase}"),
        None => println!("not started"),
    }
    if let Some(next) = boundaries.next_boundary(now) {
        println!("next boundary in {next}s");
    }
    Ok(())
}

fn check(names: &[String]) -> anyhow::Result<()> {
    let mut rejected = 0;
    for input in names {
        match Name::parse(&input.to_lowercase()) {
            Ok(name) => println!("  {:<30} supported  {}", name, name.hash()),
            Err(e) => {
                rejected += 1;
                println!("  {:<30} rejected   {}", input, e);
            }
        }
    }
    if rejected > 0 {
        bail!("{} name(s) rejected", rejected);
    }
    Ok(())
}

fn export(store: &Path, out: &Path) -> anyhow::Result<()> {
    let bundles = load(store)?;
    write_bundle_file(out, &bundles).with_context(|| format!("writing {}", out.display()))?;
    println!("Exported {} bundle(s) to {}", bundles.len(), out.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "avvy_inspect=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::List { store } => list(&store),
        Commands::Verify { store, key } => verify(&store, key.as_deref()),
        Commands::Phase { boundaries, now } => phase(&boundaries, now),
        Commands::Check { names } => check(&names),
        Commands::Export { store, out } => export(&store, &out),
    }
}
