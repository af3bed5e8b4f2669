//! Command protocol between the facade and its workers.
//!
//! One command is answered by exactly one reply; there is no pipelining.
//! The protocol is internal to this crate and not a stable interface.
use vecenv_core::{Env, RgbFrame, SpacesSpec, Step, StepParams};

/// One element of a step command: the action of one environment plus the
/// parameters broadcast to every environment of the dispatch.
pub(crate) struct StepPayload<A> {
    /// Joint action of the environment.
    pub action: A,

    /// Broadcast auxiliary parameters.
    pub params: StepParams,
}

/// Commands a worker receives.
pub(crate) enum WorkerCommand<E: Env> {
    /// Step every environment of the group, one payload per environment in
    /// group order.
    Step(Vec<StepPayload<E::Act>>),

    /// Reset every environment of the group.
    Reset,

    /// Render every environment of the group.
    Render,

    /// Report the spaces and spec of the group's first environment.
    GetSpacesSpec,

    /// Close every environment and terminate the worker loop.
    Close,
}

/// Replies a worker sends.
pub(crate) enum WorkerReply<E: Env> {
    /// One step result per environment in group order.
    Step(Vec<Step<E>>),

    /// One initial observation per environment in group order.
    Reset(Vec<E::Obs>),

    /// Per-side frames of every environment in group order.
    Render(Vec<Vec<RgbFrame>>),

    /// Reply to [`WorkerCommand::GetSpacesSpec`].
    SpacesSpec(SpacesSpec),
}
