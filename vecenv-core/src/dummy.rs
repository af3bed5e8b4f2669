//! Deterministic environments used for tests.
use crate::{
    obs::ArrayObs, Act, Env, EnvSpec, Info, Obs, RgbFrame, Space, Step, StepParams,
};
use anyhow::Result;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

/// Scalar action.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarAct(pub f32);

impl Act for ScalarAct {}

/// Info of [`CountEnv`], carrying the episode step counter.
#[derive(Clone, Debug, PartialEq)]
pub struct CountInfo {
    /// Steps taken in the current episode.
    pub t: usize,
}

impl Info for CountInfo {}

/// Configuration of [`CountEnv`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountEnvConfig {
    /// Episode length.
    pub horizon: usize,
}

/// Single-agent counting environment.
///
/// Observations are `[seed * 100 + t]`, so both the instance and its episode
/// progress can be read off a batched reply. The reward of a step is the
/// action value plus the broadcast `"bonus"` parameter, and episodes
/// terminate after `horizon` steps.
pub struct CountEnv {
    seed: i64,
    horizon: usize,
    t: usize,
}

impl Env for CountEnv {
    type Config = CountEnvConfig;
    type Obs = ArrayObs;
    type Act = ScalarAct;
    type Info = CountInfo;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            seed,
            horizon: config.horizon,
            t: 0,
        })
    }

    fn step(&mut self, act: &Self::Act, params: &StepParams) -> Result<Step<Self>> {
        self.t += 1;
        let bonus = params.get("bonus").unwrap_or(0.0) as f32;
        let obs = self.observe();
        Ok(Step::new(
            obs,
            vec![act.0 + bonus],
            vec![self.t >= self.horizon],
            CountInfo { t: self.t },
        ))
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.t = 0;
        Ok(self.observe())
    }

    fn render(&mut self) -> Result<Vec<RgbFrame>> {
        Ok(vec![RgbFrame::from_elem((1, 1, 3), self.seed as u8)])
    }

    fn observation_space(&self) -> Space {
        Space::Box {
            shape: vec![1],
            low: f32::NEG_INFINITY,
            high: f32::INFINITY,
        }
    }

    fn action_space(&self) -> Space {
        Space::Box {
            shape: vec![1],
            low: -1.0,
            high: 1.0,
        }
    }

    fn spec(&self) -> EnvSpec {
        EnvSpec {
            id: "count-v0".to_string(),
            max_episode_steps: Some(self.horizon),
        }
    }
}

impl CountEnv {
    fn observe(&self) -> ArrayObs {
        let value = (self.seed * 100) as f32 + self.t as f32;
        ArrayObs(ArrayD::from_elem(IxDyn(&[1]), value))
    }
}

/// Per-side observation of [`SelfPlayEnv`]; element `k` belongs to side `k`.
#[derive(Clone, Debug, PartialEq)]
pub struct SidedObs(pub Vec<f32>);

impl Obs for SidedObs {
    fn stack(items: Vec<Self>) -> Self {
        assert!(!items.is_empty());
        Self(items.into_iter().flat_map(|o| o.0).collect())
    }

    fn pick_side(&self, side: usize) -> Self {
        Self(vec![self.0[side]])
    }
}

/// Configuration of [`SelfPlayEnv`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelfPlayEnvConfig {
    /// Number of interleaved agents.
    pub sides: usize,

    /// Episode length.
    pub horizon: usize,
}

/// Multi-side environment with distinguishable per-side markers.
///
/// Side `k` of the instance seeded with `s` is rewarded with the marker
/// `s * 100 + k` and observes `s * 100 + k + 1000 * t`, so an observation
/// reveals both its slot and the episode progress of its instance; render
/// frames are filled with `s * 10 + k`. All sides terminate jointly after
/// `horizon` steps.
pub struct SelfPlayEnv {
    seed: i64,
    sides: usize,
    horizon: usize,
    t: usize,
}

impl SelfPlayEnv {
    fn marker(&self, side: usize) -> f32 {
        (self.seed * 100) as f32 + side as f32
    }

    fn observe(&self) -> SidedObs {
        SidedObs(
            (0..self.sides)
                .map(|k| self.marker(k) + (self.t * 1000) as f32)
                .collect(),
        )
    }
}

impl Env for SelfPlayEnv {
    type Config = SelfPlayEnvConfig;
    type Obs = SidedObs;
    type Act = ScalarAct;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            seed,
            sides: config.sides,
            horizon: config.horizon,
            t: 0,
        })
    }

    fn sides(&self) -> usize {
        self.sides
    }

    fn step(&mut self, _act: &Self::Act, _params: &StepParams) -> Result<Step<Self>> {
        self.t += 1;
        let done = self.t >= self.horizon;
        Ok(Step::new(
            self.observe(),
            (0..self.sides).map(|k| self.marker(k)).collect(),
            vec![done; self.sides],
            (),
        ))
    }

    fn reset(&mut self) -> Result<Self::Obs> {
        self.t = 0;
        Ok(self.observe())
    }

    fn render(&mut self) -> Result<Vec<RgbFrame>> {
        Ok((0..self.sides)
            .map(|k| RgbFrame::from_elem((1, 1, 3), (self.seed * 10) as u8 + k as u8))
            .collect())
    }

    fn observation_space(&self) -> Space {
        Space::Box {
            shape: vec![1],
            low: f32::NEG_INFINITY,
            high: f32::INFINITY,
        }
    }

    fn action_space(&self) -> Space {
        Space::Discrete { n: 2 }
    }

    fn spec(&self) -> EnvSpec {
        EnvSpec {
            id: "self-play-v0".to_string(),
            max_episode_steps: Some(self.horizon),
        }
    }
}
