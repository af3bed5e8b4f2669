//! Configuration of [`PooledVecEnv`](super::PooledVecEnv).
use anyhow::Result;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};
use vecenv_core::Env;

/// Configuration of [`PooledVecEnv`](super::PooledVecEnv).
#[derive(Serialize, Deserialize)]
#[serde(bound(
    serialize = "E::Config: Serialize",
    deserialize = "E::Config: DeserializeOwned"
))]
pub struct PooledVecEnvConfig<E: Env> {
    /// Environment configurations, one per logical slot.
    ///
    /// For multi-side environments only the first `n / sides` entries are
    /// constructed; one physical instance produces the results of all its
    /// sides.
    pub env_configs: Vec<E::Config>,

    /// Number of environments run in series within one worker.
    pub in_series: usize,

    /// Seed of the first environment instance; instance `i` is seeded with
    /// `base_seed + i`.
    pub base_seed: i64,
}

impl<E: Env> Clone for PooledVecEnvConfig<E> {
    fn clone(&self) -> Self {
        Self {
            env_configs: self.env_configs.clone(),
            in_series: self.in_series,
            base_seed: self.base_seed,
        }
    }
}

impl<E: Env> Default for PooledVecEnvConfig<E> {
    fn default() -> Self {
        Self {
            env_configs: vec![],
            in_series: 1,
            base_seed: 0,
        }
    }
}

impl<E: Env> PooledVecEnvConfig<E> {
    /// Sets the environment configurations.
    pub fn env_configs(mut self, env_configs: Vec<E::Config>) -> Self {
        self.env_configs = env_configs;
        self
    }

    /// Sets the number of environments run in series within one worker.
    pub fn in_series(mut self, in_series: usize) -> Self {
        self.in_series = in_series;
        self
    }

    /// Sets the seed of the first environment instance.
    pub fn base_seed(mut self, base_seed: i64) -> Self {
        self.base_seed = base_seed;
        self
    }
}

impl<E: Env> PooledVecEnvConfig<E>
where
    E::Config: Serialize + DeserializeOwned,
{
    /// Constructs [`PooledVecEnvConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Ok(config)
    }

    /// Saves [`PooledVecEnvConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
