//! Worker loop owning a group of environments.
use crate::{
    messages::{StepPayload, WorkerCommand, WorkerReply},
    PoolError,
};
use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use log::{info, trace};
use vecenv_core::{Env, SpacesSpec, Step};

/// Builds the worker's environment group and serves commands until a close
/// command arrives or the facade hangs up.
///
/// Environment `i` of the group is seeded with `seed0 + i`, continuing the
/// global seed sequence of the pool. Environments are closed on every exit
/// path, including errors.
pub(crate) fn run_worker<E: Env>(
    id: usize,
    configs: Vec<E::Config>,
    seed0: i64,
    receiver: Receiver<WorkerCommand<E>>,
    sender: Sender<WorkerReply<E>>,
) -> Result<()> {
    let mut envs: Vec<E> = Vec::with_capacity(configs.len());
    for (i, config) in configs.iter().enumerate() {
        match E::build(config, seed0 + i as i64) {
            Ok(env) => envs.push(env),
            // A failed constructor must not leak the group members that
            // were already built.
            Err(e) => {
                for env in envs.iter_mut() {
                    env.close();
                }
                return Err(e);
            }
        }
    }
    info!("Worker {} built {} environment(s)", id, envs.len());

    let result = serve(id, &mut envs, &receiver, &sender);
    for env in envs.iter_mut() {
        env.close();
    }
    info!("Worker {} terminated", id);
    result
}

fn serve<E: Env>(
    id: usize,
    envs: &mut [E],
    receiver: &Receiver<WorkerCommand<E>>,
    sender: &Sender<WorkerReply<E>>,
) -> Result<()> {
    loop {
        let cmd = match receiver.recv() {
            Ok(cmd) => cmd,
            // The facade dropped its endpoint; drain so cleanup still runs.
            Err(_) => {
                trace!("Worker {} drains on a disconnected channel", id);
                return Ok(());
            }
        };

        let reply = match cmd {
            WorkerCommand::Step(payloads) => {
                if payloads.len() != envs.len() {
                    return Err(PoolError::PayloadCount {
                        expected: envs.len(),
                        got: payloads.len(),
                    }
                    .into());
                }
                let mut results = Vec::with_capacity(envs.len());
                for (env, payload) in envs.iter_mut().zip(payloads.iter()) {
                    results.push(step_env(env, payload)?);
                }
                WorkerReply::Step(results)
            }
            WorkerCommand::Reset => {
                let mut obs = Vec::with_capacity(envs.len());
                for env in envs.iter_mut() {
                    obs.push(env.reset()?);
                }
                WorkerReply::Reset(obs)
            }
            WorkerCommand::Render => {
                let mut frames = Vec::with_capacity(envs.len());
                for env in envs.iter_mut() {
                    frames.push(env.render()?);
                }
                WorkerReply::Render(frames)
            }
            WorkerCommand::GetSpacesSpec => WorkerReply::SpacesSpec(SpacesSpec {
                observation_space: envs[0].observation_space(),
                action_space: envs[0].action_space(),
                spec: envs[0].spec(),
            }),
            WorkerCommand::Close => return Ok(()),
        };

        if sender.send(reply).is_err() {
            trace!("Worker {} drains on a disconnected channel", id);
            return Ok(());
        }
    }
}

/// Steps one environment, resetting it immediately when the episode ends.
///
/// On termination the reply carries the first observation of the next
/// episode together with the terminal reward and done flags, so the caller
/// never observes a state that still needs a reset.
fn step_env<E: Env>(env: &mut E, payload: &StepPayload<E::Act>) -> Result<Step<E>> {
    let mut step = env.step(&payload.action, &payload.params)?;
    if step.is_done() {
        step.obs = env.reset()?;
    }
    Ok(step)
}
