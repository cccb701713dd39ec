//! Demo runner for the transaction airlock core: wires the orchestrator to
//! in-memory adapters (mock scorer/executor plus the in-process guardian
//! network), a file-backed blacklist/pause source, and a persisted-or-freshly-
//! bootstrapped threshold key, then drives one synthetic intent through it end
//! to end. Grounded on `bleep-cli`'s `clap`-derive command layout and
//! `tokio::main` + `tracing_subscriber::fmt::init()` boot sequence.

mod persistence;

use airlock_common::adapters::mock::{FixedScorer, RecordingExecutor};
use airlock_common::adapters::GuardianNetwork;
use airlock_common::config::Config;
use airlock_common::types::{AirlockOutcome, Intent, Vote};
use airlock_orchestrator::guardian::{provision_guardian_identities, LocalGuardianNetwork};
use airlock_orchestrator::Airlock;
use airlock_vdf::VdfEngine;
use airlock_voting::commit;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use persistence::{load_or_bootstrap_threshold, FileBlacklistSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "airlock-node")]
#[command(about = "Demo runner for the transaction airlock core", long_about = None)]
struct Cli {
    /// Path to a TOML config file; falls back to built-in defaults if absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the two items spec §6 requires to survive restarts:
    /// the DKG key material (`guardian-keys.bin`) and the blacklist/pause
    /// snapshot source (`blacklist.toml`). Created on first run.
    #[arg(long, global = true, default_value = "./airlock-state")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the resolved configuration.
    PrintConfig,

    /// Run one synthetic intent through the airlock and print the outcome.
    Demo {
        /// Risk score the mock scorer should return for this intent.
        #[arg(long, default_value_t = 20.0)]
        score: f64,

        /// Transaction value carried by the synthetic intent.
        #[arg(long, default_value_t = 10)]
        value: u128,

        /// Guardian slots that vote "approve" shortly after the demo starts.
        #[arg(long, value_delimiter = ',', default_value = "0,1,2,3,4,5,6")]
        approve_slots: Vec<u8>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::PrintConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Demo {
            score,
            value,
            approve_slots,
        } => run_demo(config, cli.state_dir, score, value, approve_slots).await?,
    }

    Ok(())
}

async fn run_demo(
    config: Config,
    state_dir: PathBuf,
    score: f64,
    value: u128,
    approve_slots: Vec<u8>,
) -> Result<()> {
    info!(?config, ?state_dir, "booting demo airlock");

    let identities = provision_guardian_identities(config.guardian_count);
    let pubkeys = identities.iter().map(|g| g.pubkey).collect();
    let guardians = Arc::new(LocalGuardianNetwork::new(
        pubkeys,
        config.approval_threshold,
        config.rejection_threshold(),
        Duration::from_secs(config.proposal_deadline_seconds),
    ));
    let threshold = Arc::new(load_or_bootstrap_threshold(
        &state_dir.join("guardian-keys.bin"),
        config.guardian_count,
        config.approval_threshold,
    )?);
    let blacklist = Arc::new(
        FileBlacklistSource::load(state_dir.join("blacklist.toml"))
            .context("loading blacklist/pause snapshot source")?,
    );
    let vdf = Arc::new(VdfEngine::new(config.checkpoint_every));

    let airlock = Airlock::new(
        config.clone(),
        Arc::new(FixedScorer { score }),
        Arc::new(RecordingExecutor::default()),
        guardians.clone(),
        blacklist,
        vdf,
        threshold,
    );

    let intent = Intent {
        caller: "demo-caller".into(),
        destination: "0xdemo".into(),
        value,
        payload: Vec::new(),
        source_chain: "eth".into(),
        destination_chain: None,
        nonce: 0,
    };
    let fingerprint = intent.fingerprint();

    let voting_guardians = guardians.clone();
    let voting_identities = identities.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        for &slot in &approve_slots {
            let nonce = [slot; 32];
            let commitment = commit(slot, Vote::Approve, &nonce, fingerprint);
            if let Err(err) = voting_guardians.submit_commit(fingerprint, slot, commitment).await {
                tracing::warn!(%err, slot, "demo guardian commit failed");
            }
        }
        for &slot in &approve_slots {
            let nonce = [slot; 32];
            let proof = bincode::serialize(&(voting_identities[slot as usize].secret, nonce))
                .expect("tuple of fixed-size byte arrays always serializes");
            if let Err(err) = voting_guardians.submit_reveal(fingerprint, slot, Vote::Approve, proof).await {
                tracing::warn!(%err, slot, "demo guardian reveal failed");
            }
        }
    });

    let outcome = airlock.process(intent).await;
    match outcome {
        AirlockOutcome::Envelope(envelope) => println!(
            "envelope: fingerprint={fp} outcome={tag:?} vdf_iterations={iters}",
            fp = envelope.fingerprint,
            tag = envelope.outcome_tag,
            iters = envelope.vdf_proof.iterations
        ),
        AirlockOutcome::Blocked(reason) => println!("blocked: {reason}"),
        AirlockOutcome::Expired => println!("expired"),
        AirlockOutcome::Failed(reason) => println!("failed: {reason}"),
    }

    Ok(())
}
