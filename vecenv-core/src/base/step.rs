//! Environment step.
use super::Env;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug};

/// Additional information to `Obs` and `Act`.
pub trait Info: Clone + Debug + Send + 'static {
    /// Returns the view of this info for one side.
    ///
    /// The default implementation returns a clone, which is correct for
    /// single-sided environments.
    fn pick_side(&self, _side: usize) -> Self {
        self.clone()
    }
}

impl Info for () {}

/// Represents an observation, reward and done tuple with some additional
/// information, emitted by an environment at every interaction step.
///
/// `reward` and `done` hold one entry per side; single-agent environments
/// return vectors of length 1.
pub struct Step<E: Env> {
    /// Observation.
    pub obs: E::Obs,

    /// Reward, one per side.
    pub reward: Vec<f32>,

    /// Flag denoting if the episode is terminated, one per side.
    pub done: Vec<bool>,

    /// Information defined by the environment.
    pub info: E::Info,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: E::Obs, reward: Vec<f32>, done: Vec<bool>, info: E::Info) -> Self {
        Step {
            obs,
            reward,
            done,
            info,
        }
    }

    /// The episode ended at this step.
    ///
    /// Multi-side environments terminate jointly, so the first side's flag
    /// decides.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done[0]
    }
}

/// Auxiliary scalar parameters forwarded uniformly to every step call of a
/// batched dispatch, e.g. a difficulty-blend rate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepParams(HashMap<String, f64>);

impl StepParams {
    /// Constructs an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter.
    pub fn set(mut self, key: impl Into<String>, value: f64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Gets a parameter.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }
}
