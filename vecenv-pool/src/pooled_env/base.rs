use super::PooledVecEnvConfig;
use crate::{
    messages::{StepPayload, WorkerCommand, WorkerReply},
    remap, worker, PoolError,
};
use anyhow::{ensure, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, trace};
use std::thread::{self, JoinHandle};
use vecenv_core::{Env, EnvSpec, Obs, RgbFrame, Space, SpacesSpec, StepParams};

/// Dispatch state of the facade; at most one batched request is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DispatchState {
    Idle,
    Pending,
}

/// Executes a batch of environments on a pool of worker threads.
///
/// The pool addresses `n` logical slots. When the environment multiplexes
/// `s` sides per instance, only `n / s` physical instances exist, spread
/// over `n / s / in_series` workers; each worker exclusively owns its
/// environment group and is reached over its own channel. Batched calls
/// block until every worker has replied, reorder multi-side results into
/// logical slot order (slot `i` holds side `i % s` of instance `i / s`) and
/// return batches whose leading dimension is `n`.
pub struct PooledVecEnv<E: Env> {
    senders: Vec<Sender<WorkerCommand<E>>>,
    receivers: Vec<Receiver<WorkerReply<E>>>,
    handles: Vec<JoinHandle<()>>,
    n_envs: usize,
    n_insts: usize,
    sides: usize,
    in_series: usize,
    state: DispatchState,
    closed: bool,
    spaces: SpacesSpec,
}

impl<E: Env> std::fmt::Debug for PooledVecEnv<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledVecEnv")
            .field("n_envs", &self.n_envs)
            .field("n_insts", &self.n_insts)
            .field("sides", &self.sides)
            .field("in_series", &self.in_series)
            .field("state", &self.state)
            .field("closed", &self.closed)
            .field("spaces", &self.spaces)
            .finish_non_exhaustive()
    }
}

impl<E: Env + 'static> PooledVecEnv<E> {
    /// Builds the pool: probes the side capability, spawns the workers and
    /// performs the spaces probe against worker 0.
    ///
    /// Fails before any worker is spawned if the slot count is not
    /// divisible by the probed side count, or the instance count is not
    /// divisible by `in_series`.
    pub fn build(config: &PooledVecEnvConfig<E>) -> Result<Self> {
        let n_envs = config.env_configs.len();
        if n_envs == 0 {
            return Err(PoolError::NoEnvs.into());
        }
        if config.in_series == 0 {
            return Err(PoolError::ZeroInSeries.into());
        }

        // Probe the side capability on a throwaway instance.
        let sides = {
            let mut probe = E::build(&config.env_configs[0], config.base_seed)?;
            let sides = probe.sides();
            probe.close();
            sides
        };
        ensure!(sides >= 1, "environment reported zero sides");

        if n_envs % sides != 0 {
            return Err(PoolError::SidesDivision { n_envs, sides }.into());
        }
        // One physical instance serves all sides of a slot, so only the
        // first n / sides configurations are constructed.
        let n_insts = n_envs / sides;
        if n_insts % config.in_series != 0 {
            return Err(PoolError::SeriesDivision {
                n_insts,
                in_series: config.in_series,
            }
            .into());
        }

        let groups = config.env_configs[..n_insts].chunks(config.in_series);
        let mut senders = Vec::with_capacity(groups.len());
        let mut receivers = Vec::with_capacity(groups.len());
        let mut handles = Vec::with_capacity(groups.len());
        for (w, group) in groups.enumerate() {
            let (cmd_tx, cmd_rx) = bounded(1);
            let (reply_tx, reply_rx) = bounded(1);
            let configs = group.to_vec();
            let seed0 = config.base_seed + (w * config.in_series) as i64;
            let handle = thread::Builder::new()
                .name(format!("env-worker-{}", w))
                .spawn(move || {
                    if let Err(e) = worker::run_worker::<E>(w, configs, seed0, cmd_rx, reply_tx) {
                        error!("Worker {} died: {:#}", w, e);
                    }
                })?;
            senders.push(cmd_tx);
            receivers.push(reply_rx);
            handles.push(handle);
        }
        info!(
            "Spawned {} worker(s) for {} slot(s) ({} side(s), {} in series)",
            handles.len(),
            n_envs,
            sides,
            config.in_series
        );

        // Spaces are assumed homogeneous across workers and probed once.
        senders[0]
            .send(WorkerCommand::GetSpacesSpec)
            .map_err(|_| PoolError::WorkerDisconnected { worker: 0 })?;
        let spaces = match receivers[0].recv() {
            Ok(WorkerReply::SpacesSpec(spaces)) => spaces,
            Ok(_) => return Err(PoolError::UnexpectedReply { worker: 0 }.into()),
            Err(_) => return Err(PoolError::WorkerDisconnected { worker: 0 }.into()),
        };

        Ok(Self {
            senders,
            receivers,
            handles,
            n_envs,
            n_insts,
            sides,
            in_series: config.in_series,
            state: DispatchState::Idle,
            closed: false,
            spaces,
        })
    }

    /// Number of logical environment slots.
    pub fn n_envs(&self) -> usize {
        self.n_envs
    }

    /// Number of worker threads.
    pub fn n_workers(&self) -> usize {
        self.handles.len()
    }

    /// Number of sides multiplexed per physical instance.
    pub fn sides(&self) -> usize {
        self.sides
    }

    /// Number of environments run in series within one worker.
    pub fn in_series(&self) -> usize {
        self.in_series
    }

    /// Observation space shared by all environments.
    pub fn observation_space(&self) -> &Space {
        &self.spaces.observation_space
    }

    /// Action space shared by all environments.
    pub fn action_space(&self) -> &Space {
        &self.spaces.action_space
    }

    /// Metadata shared by all environments.
    pub fn spec(&self) -> &EnvSpec {
        &self.spaces.spec
    }

    /// Resets every environment and returns the stacked observations of all
    /// logical slots.
    pub fn reset(&mut self) -> Result<E::Obs> {
        trace!("PooledVecEnv::reset()");
        self.ensure_idle()?;

        for (w, sender) in self.senders.iter().enumerate() {
            sender
                .send(WorkerCommand::Reset)
                .map_err(|_| PoolError::WorkerDisconnected { worker: w })?;
        }
        let mut flat = Vec::with_capacity(self.n_insts);
        for w in 0..self.senders.len() {
            match self.recv_reply(w)? {
                WorkerReply::Reset(obs) => flat.extend(obs),
                _ => return Err(PoolError::UnexpectedReply { worker: w }.into()),
            }
        }

        let slots = remap::expand_obs(flat, self.sides);
        Ok(E::Obs::stack(slots))
    }

    /// Dispatches one step command per worker without waiting for replies.
    ///
    /// `actions` holds one joint action per physical instance, i.e.
    /// `n_envs / sides` entries; `params` is broadcast to every step call.
    /// A second dispatch before [`step_wait`](Self::step_wait) is rejected.
    pub fn step_async(&mut self, actions: &[E::Act], params: &StepParams) -> Result<()> {
        trace!("PooledVecEnv::step_async()");
        self.ensure_idle()?;
        if actions.len() != self.n_insts {
            return Err(PoolError::ActionCount {
                expected: self.n_insts,
                got: actions.len(),
            }
            .into());
        }

        for (w, group) in actions.chunks(self.in_series).enumerate() {
            let payloads = group
                .iter()
                .map(|action| StepPayload {
                    action: action.clone(),
                    params: params.clone(),
                })
                .collect();
            self.senders[w]
                .send(WorkerCommand::Step(payloads))
                .map_err(|_| PoolError::WorkerDisconnected { worker: w })?;
        }
        self.state = DispatchState::Pending;
        Ok(())
    }

    /// Collects the replies of a pending dispatch.
    ///
    /// Blocks until every worker has replied, then returns the stacked
    /// observations, rewards, done flags and infos of all logical slots in
    /// slot order.
    #[allow(clippy::type_complexity)]
    pub fn step_wait(&mut self) -> Result<(E::Obs, Vec<f32>, Vec<bool>, Vec<E::Info>)> {
        trace!("PooledVecEnv::step_wait()");
        self.ensure_open()?;
        if self.state != DispatchState::Pending {
            return Err(PoolError::NoPendingDispatch.into());
        }

        let mut flat = Vec::with_capacity(self.n_insts);
        for w in 0..self.senders.len() {
            match self.recv_reply(w) {
                Ok(WorkerReply::Step(results)) => flat.extend(results),
                Ok(_) => return Err(PoolError::UnexpectedReply { worker: w }.into()),
                Err(e) => return Err(e),
            }
        }
        self.state = DispatchState::Idle;

        let slots = remap::expand_steps(flat, self.sides)?;
        let mut obs = Vec::with_capacity(slots.len());
        let mut rewards = Vec::with_capacity(slots.len());
        let mut dones = Vec::with_capacity(slots.len());
        let mut infos = Vec::with_capacity(slots.len());
        for (o, r, d, i) in slots {
            obs.push(o);
            rewards.push(r);
            dones.push(d);
            infos.push(i);
        }
        Ok((E::Obs::stack(obs), rewards, dones, infos))
    }

    /// Renders every environment and returns one frame per logical slot.
    pub fn get_images(&mut self) -> Result<Vec<RgbFrame>> {
        trace!("PooledVecEnv::get_images()");
        self.ensure_idle()?;

        for (w, sender) in self.senders.iter().enumerate() {
            sender
                .send(WorkerCommand::Render)
                .map_err(|_| PoolError::WorkerDisconnected { worker: w })?;
        }
        let mut flat = Vec::with_capacity(self.n_insts);
        for w in 0..self.senders.len() {
            match self.recv_reply(w)? {
                WorkerReply::Render(frames) => flat.extend(frames),
                _ => return Err(PoolError::UnexpectedReply { worker: w }.into()),
            }
        }

        remap::expand_frames(flat, self.sides)
    }

    /// Shuts the pool down: drains a pending dispatch, closes every worker
    /// and joins their threads.
    ///
    /// Calling `close` on an already closed pool is a usage error; the
    /// cleanup on drop is guarded and never runs twice.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.shutdown();
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(PoolError::Closed.into());
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        self.ensure_open()?;
        if self.state == DispatchState::Pending {
            return Err(PoolError::DispatchInFlight.into());
        }
        Ok(())
    }

    fn recv_reply(&self, worker: usize) -> Result<WorkerReply<E>> {
        self.receivers[worker]
            .recv()
            .map_err(|_| PoolError::WorkerDisconnected { worker }.into())
    }
}

impl<E: Env> PooledVecEnv<E> {
    fn shutdown(&mut self) {
        self.closed = true;

        // A worker blocked on sending a reply must be drained before it can
        // see the close command.
        if self.state == DispatchState::Pending {
            for receiver in self.receivers.iter() {
                let _ = receiver.recv();
            }
            self.state = DispatchState::Idle;
        }

        for sender in self.senders.iter() {
            let _ = sender.send(WorkerCommand::Close);
        }
        self.senders.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("A worker thread panicked during shutdown");
            }
        }
        info!("Closed the environment pool");
    }
}

impl<E: Env> Drop for PooledVecEnv<E> {
    fn drop(&mut self) {
        if !self.closed {
            self.shutdown();
        }
    }
}
