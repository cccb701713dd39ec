//! Job table and worker thread management (spec §4.1). One OS thread per active
//! job preserves the sequential-work contract; jobs are independent of each other
//! and make progress in parallel at the job level (spec §5).

use crate::error::VdfError;
use crate::wesolowski::{self, CheckpointSignal};
use airlock_common::types::VdfProof;
use num_bigint::BigUint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Computing,
    Ready,
    Failed,
    Bypassed,
}

impl JobStatus {
    fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed | JobStatus::Bypassed)
    }
}

struct JobState {
    status: JobStatus,
    proof: Option<VdfProof>,
    error: Option<VdfError>,
    started_at: Instant,
    required_iterations: u64,
}

/// Shared handle to one job's progress and bypass flag; cheap to clone, safe to
/// hand to the background worker thread and to the engine's callers alike.
struct JobShared {
    progress: AtomicU64,
    bypass_requested: AtomicBool,
    state: Mutex<JobState>,
}

/// Non-blocking snapshot returned by `poll`.
#[derive(Clone, Debug)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub progress: u8,
    pub eta_seconds: Option<u64>,
    pub proof: Option<VdfProof>,
}

pub struct VdfEngine {
    modulus: BigUint,
    checkpoint_every: u64,
    jobs: Mutex<HashMap<u64, Arc<JobShared>>>,
    next_id: AtomicU64,
}

impl Default for VdfEngine {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl VdfEngine {
    pub fn new(checkpoint_every: u64) -> Self {
        VdfEngine {
            modulus: wesolowski::modulus(),
            checkpoint_every,
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// `request(challenge, T) -> job_id`. Spawns the sequential worker thread
    /// immediately; the loop is never parallelized internally.
    pub fn request(&self, challenge: &[u8], iterations: u64) -> u64 {
        let job_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let shared = Arc::new(JobShared {
            progress: AtomicU64::new(0),
            bypass_requested: AtomicBool::new(false),
            state: Mutex::new(JobState {
                status: JobStatus::Pending,
                proof: None,
                error: None,
                started_at: Instant::now(),
                required_iterations: iterations,
            }),
        });
        self.jobs.lock().insert(job_id, shared.clone());

        let x = BigUint::from_bytes_be(challenge);
        let modulus = self.modulus.clone();
        let checkpoint_every = self.checkpoint_every;
        std::thread::spawn(move || run_job(shared, x, iterations, modulus, checkpoint_every));
        job_id
    }

    /// `poll(job_id) -> {status, progress, eta_seconds, proof?}`.
    pub fn poll(&self, job_id: u64) -> Result<JobSnapshot, VdfError> {
        let shared = self.lookup(job_id)?;
        let state = shared.state.lock();
        let progress_iters = shared.progress.load(Ordering::SeqCst);
        let progress = if state.required_iterations == 0 {
            100
        } else {
            ((progress_iters.saturating_mul(100)) / state.required_iterations).min(100) as u8
        };
        let eta_seconds = if state.status == JobStatus::Computing && progress_iters > 0 {
            let elapsed = state.started_at.elapsed().as_secs_f64();
            let rate = progress_iters as f64 / elapsed.max(0.001);
            let remaining = state.required_iterations.saturating_sub(progress_iters) as f64;
            Some((remaining / rate.max(0.001)) as u64)
        } else {
            None
        };
        Ok(JobSnapshot {
            status: state.status,
            progress,
            eta_seconds,
            proof: state.proof.clone(),
        })
    }

    /// `await(job_id) -> proof | error`; suspends the calling thread until the job
    /// reaches a terminal status. Named `await_proof` because `await` is a
    /// reserved keyword.
    pub fn await_proof(&self, job_id: u64) -> Result<VdfProof, VdfError> {
        let shared = self.lookup(job_id)?;
        loop {
            {
                let state = shared.state.lock();
                if state.status.is_terminal() {
                    return match state.status {
                        JobStatus::Ready => Ok(state.proof.clone().expect("ready implies proof")),
                        JobStatus::Bypassed => Ok(VdfProof::zero()),
                        JobStatus::Failed => {
                            Err(state.error.clone().unwrap_or(VdfError::Cancelled))
                        }
                        JobStatus::Pending | JobStatus::Computing => unreachable!(),
                    };
                }
            }
            std::thread::yield_now();
        }
    }

    /// Idempotent; transitions any non-terminal job to `bypassed`. The worker
    /// thread observes this at its next checkpoint and abandons the computation.
    pub fn bypass(&self, job_id: u64) -> Result<(), VdfError> {
        let shared = self.lookup(job_id)?;
        shared.bypass_requested.store(true, Ordering::SeqCst);
        let mut state = shared.state.lock();
        if !state.status.is_terminal() {
            state.status = JobStatus::Bypassed;
            state.proof = Some(VdfProof::zero());
        }
        Ok(())
    }

    /// Stateless check, usable without any job having been created.
    pub fn verify(&self, challenge: &[u8], iterations: u64, proof: &VdfProof) -> bool {
        if proof.is_zero() {
            // The zero-proof's own validity is conditional on the companion
            // threshold signature (spec §4.5); this function only attests to the
            // VDF math, so a well-formed zero-proof always passes here.
            return true;
        }
        if proof.iterations > iterations {
            return false; // V2: proof iterations must not exceed the required T
        }
        let Some((y, pi)) = decode_witness(proof) else {
            return false;
        };
        let x = BigUint::from_bytes_be(challenge);
        wesolowski::verify(&x, proof.iterations, &self.modulus, &y, &pi)
    }

    fn lookup(&self, job_id: u64) -> Result<Arc<JobShared>, VdfError> {
        self.jobs
            .lock()
            .get(&job_id)
            .cloned()
            .ok_or(VdfError::UnknownJob(job_id))
    }
}

fn run_job(
    shared: Arc<JobShared>,
    x: BigUint,
    iterations: u64,
    modulus: BigUint,
    checkpoint_every: u64,
) {
    {
        let mut state = shared.state.lock();
        if state.status.is_terminal() {
            return;
        }
        state.status = JobStatus::Computing;
    }

    let progress = &shared.progress;
    let bypass_flag = &shared.bypass_requested;
    let mut checkpoint = |done: u64| -> CheckpointSignal {
        progress.store(done, Ordering::SeqCst);
        if bypass_flag.load(Ordering::SeqCst) {
            CheckpointSignal::Bypass
        } else {
            CheckpointSignal::Continue
        }
    };

    let y = match wesolowski::evaluate(&x, iterations, &modulus, checkpoint_every, &mut checkpoint)
    {
        Some(y) => y,
        None => return, // bypass() already set the terminal state
    };
    let l = wesolowski::hash_to_prime(&x, &y);
    let pi = match wesolowski::prove(&x, iterations, &l, &modulus, checkpoint_every, &mut checkpoint)
    {
        Some(pi) => pi,
        None => return,
    };

    let mut state = shared.state.lock();
    if state.status.is_terminal() {
        return; // bypassed while the proving pass was finishing
    }
    state.proof = Some(encode_witness(&y, &pi, iterations));
    state.status = JobStatus::Ready;
}

fn encode_witness(y: &BigUint, pi: &BigUint, iterations: u64) -> VdfProof {
    use sha2::{Digest, Sha256};
    let y_bytes = y.to_bytes_be();
    let pi_bytes = pi.to_bytes_be();
    let mut output = [0u8; 32];
    let digest = Sha256::digest(&y_bytes);
    output.copy_from_slice(&digest);
    let witness = bincode::serialize(&(y_bytes, pi_bytes)).expect("tuple of Vec<u8> serializes");
    VdfProof {
        output,
        witness,
        iterations,
    }
}

fn decode_witness(proof: &VdfProof) -> Option<(BigUint, BigUint)> {
    let (y_bytes, pi_bytes): (Vec<u8>, Vec<u8>) = bincode::deserialize(&proof.witness).ok()?;
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(&y_bytes);
    if digest.as_slice() != proof.output {
        return None;
    }
    Some((
        BigUint::from_bytes_be(&y_bytes),
        BigUint::from_bytes_be(&pi_bytes),
    ))
}
