//! Run control for the execution engine: options, termination status,
//! cancellation and tracing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::cpu::{Cycle, Fault, Flags};
use crate::decoder::Op;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// The program executed HALT.
    Halted,
    /// The engine stopped on a fault; the state is left as it was before the
    /// faulting cycle.
    Faulted(Fault),
    /// The caller's instruction budget ran out.
    StepLimitExceeded,
    /// A cancellation request was honoured between cycles.
    Cancelled,
}

impl ExecStatus {
    pub fn is_halted(&self) -> bool {
        matches!(self, ExecStatus::Halted)
    }

    pub fn fault(&self) -> Option<Fault> {
        match self {
            ExecStatus::Faulted(fault) => Some(*fault),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecStatus::Halted => write!(f, "halted"),
            ExecStatus::Faulted(fault) => write!(f, "faulted: {fault}"),
            ExecStatus::StepLimitExceeded => write!(f, "step limit exceeded"),
            ExecStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub status: ExecStatus,
    /// Completed cycles, counting the halting cycle but not a faulting one.
    pub steps: u64,
}

/// Cooperative stop request shared between a running engine and its host.
///
/// Clones share the same flag, so one clone can be handed to the engine and
/// another kept by whoever wants to stop it, possibly on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    requested: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the run to stop before its next cycle.
    pub fn cancel(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Polled before every cycle, so relaxed ordering is enough.
    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.requested.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the token can be reused.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Emit a trace record after every completed cycle.
    pub debug: bool,
    /// Stop with `StepLimitExceeded` once this many cycles have completed.
    pub max_steps: Option<u64>,
    pub cancel: Option<CancelToken>,
}

/// One executed cycle as seen by a tracer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceRecord {
    /// Program counter before the cycle.
    pub pc: u16,
    pub ir: u32,
    pub op: Op,
    /// Flags after the cycle.
    pub flags: Flags,
}

impl TraceRecord {
    pub fn new(cycle: &Cycle, flags: Flags) -> Self {
        Self {
            pc: cycle.pc,
            ir: cycle.ir,
            op: cycle.op,
            flags,
        }
    }
}

impl std::fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#06x}: {:08x}  {:<24} [{}]",
            self.pc,
            self.ir,
            self.op.to_string(),
            self.flags
        )
    }
}

/// Receiver for per-cycle trace records in debug mode.
pub trait Tracer {
    fn record(&mut self, record: &TraceRecord);
}

/// Forwards trace records to the `log` facade at debug level.
#[derive(Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn record(&mut self, record: &TraceRecord) {
        log::debug!(target: "risc_vm::trace", "{record}");
    }
}

impl Tracer for Vec<TraceRecord> {
    fn record(&mut self, record: &TraceRecord) {
        self.push(*record);
    }
}
