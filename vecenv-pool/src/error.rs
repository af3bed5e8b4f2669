//! Errors of the environment pool.
use thiserror::Error;

/// Error of the environment pool.
///
/// Configuration errors are raised at construction, before any worker is
/// spawned. Usage errors indicate an illegal call sequence on the facade.
/// The remaining variants surface a broken worker or a protocol mismatch;
/// neither is recovered from.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// No environment configurations were given.
    #[error("no environment configurations were given")]
    NoEnvs,

    /// `in_series` must be at least 1.
    #[error("in_series must be at least 1")]
    ZeroInSeries,

    /// The number of logical slots is not divisible by the side count.
    #[error("number of environments ({n_envs}) is not divisible by the number of sides ({sides})")]
    SidesDivision {
        /// Number of logical environment slots.
        n_envs: usize,
        /// Probed side count.
        sides: usize,
    },

    /// The physical instances cannot be split into equal in-series groups.
    #[error("{n_insts} environment instance(s) cannot be split into groups of {in_series}")]
    SeriesDivision {
        /// Number of physical environment instances.
        n_insts: usize,
        /// Environments run in series per worker.
        in_series: usize,
    },

    /// The facade was used after `close`.
    #[error("operation on a closed environment pool")]
    Closed,

    /// `step_wait` was called without a pending `step_async`.
    #[error("step_wait called without a pending step_async")]
    NoPendingDispatch,

    /// A batched dispatch was started while another one is in flight.
    #[error("a batched dispatch is already in flight")]
    DispatchInFlight,

    /// The action batch does not match the number of physical instances.
    #[error("expected {expected} action(s), got {got}")]
    ActionCount {
        /// Number of actions the pool expects, one per physical instance.
        expected: usize,
        /// Number of actions received.
        got: usize,
    },

    /// A step command carried the wrong number of payloads for its worker.
    #[error("step command carried {got} payload(s) for {expected} environment(s)")]
    PayloadCount {
        /// Environments owned by the worker.
        expected: usize,
        /// Payloads received.
        got: usize,
    },

    /// A worker hung up before replying, i.e. its thread died.
    #[error("worker {worker} disconnected")]
    WorkerDisconnected {
        /// Index of the worker.
        worker: usize,
    },

    /// A worker replied with a message that does not match the pending
    /// command, indicating a protocol mismatch.
    #[error("worker {worker} sent a reply that does not match the pending command")]
    UnexpectedReply {
        /// Index of the worker.
        worker: usize,
    },

    /// An environment returned per-side vectors of the wrong length.
    #[error("environment returned {got} per-side value(s), expected {expected}")]
    SideCount {
        /// Probed side count.
        expected: usize,
        /// Length of the returned per-side vector.
        got: usize,
    },
}
