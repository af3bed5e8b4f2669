//! Environment.
use super::{Act, Info, Obs, RgbFrame, Step, StepParams};
use crate::spaces::{EnvSpec, Space};
use anyhow::Result;

/// Represents an environment, typically an MDP.
///
/// An environment is built from a self-contained configuration value and a
/// seed, which makes construction repeatable inside a worker without any
/// reference to the caller's state.
pub trait Env {
    /// Configuration from which the environment is built.
    type Config: Clone + Send + 'static;

    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Number of interleaved agents multiplexed within this instance.
    ///
    /// Single-agent environments keep the default of 1.
    fn sides(&self) -> usize {
        1
    }

    /// Performs an environment step.
    ///
    /// `params` carries auxiliary scalar parameters broadcast uniformly to
    /// every step call of a batched dispatch. The returned [`Step`] holds
    /// one reward and one done flag per side.
    fn step(&mut self, act: &Self::Act, params: &StepParams) -> Result<Step<Self>>
    where
        Self: Sized;

    /// Resets the environment and returns the initial observation.
    fn reset(&mut self) -> Result<Self::Obs>;

    /// Renders the environment, one RGB frame per side.
    fn render(&mut self) -> Result<Vec<RgbFrame>>;

    /// Description of the observation space.
    fn observation_space(&self) -> Space;

    /// Description of the action space.
    fn action_space(&self) -> Space;

    /// Static metadata of the environment.
    fn spec(&self) -> EnvSpec {
        EnvSpec::default()
    }

    /// Releases resources held by the environment.
    fn close(&mut self) {}
}
