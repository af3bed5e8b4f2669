//! Space and environment descriptors.
use serde::{Deserialize, Serialize};

/// Description of an observation or action space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Space {
    /// A fixed number of discrete choices.
    Discrete {
        /// Number of choices.
        n: usize,
    },

    /// A continuous box with uniform bounds.
    Box {
        /// Shape of a single element.
        shape: Vec<usize>,

        /// Lower bound of every dimension.
        low: f32,

        /// Upper bound of every dimension.
        high: f32,
    },
}

/// Static metadata of an environment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
    /// Identifier of the environment.
    pub id: String,

    /// Upper bound on episode length, if any.
    pub max_episode_steps: Option<usize>,
}

/// Observation space, action space and spec of an environment, as reported
/// by the spaces probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpacesSpec {
    /// Observation space.
    pub observation_space: Space,

    /// Action space.
    pub action_space: Space,

    /// Environment metadata.
    pub spec: EnvSpec,
}
