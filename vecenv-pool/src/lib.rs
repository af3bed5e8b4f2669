#![warn(missing_docs)]
//! Parallel execution of a batch of environments over a pool of workers.
//!
//! A [`PooledVecEnv`] owns a set of worker threads. Each worker exclusively
//! owns a group of environments, built inside the worker from configuration
//! values, and answers commands over its own channel; no state is shared
//! between the facade and its workers. Batched calls fan one command out to
//! every worker, block until all replies arrived and return stacked batches
//! covering every logical slot.
//!
//! For self-play environments that multiplex several sides per physical
//! instance, worker replies are reordered into logical slot order: slot `i`
//! holds side `i % sides` of physical instance `i / sides`. Environments
//! that finish an episode are reset inside the worker within the same step
//! command, so a step reply always carries the first observation of the
//! next episode alongside the terminal reward and done flag.
mod error;
mod messages;
mod pooled_env;
mod remap;
mod worker;
pub use error::PoolError;
pub use pooled_env::{PooledVecEnv, PooledVecEnvConfig};

#[cfg(test)]
mod test {
    use crate::{PoolError, PooledVecEnv, PooledVecEnvConfig};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use test_log::test;
    use vecenv_core::{
        dummy::{CountEnv, CountEnvConfig, ScalarAct, SelfPlayEnv, SelfPlayEnvConfig},
        obs::ArrayObs,
        Env, RgbFrame, Space, Step, StepParams,
    };

    /// Counts close calls and refuses to build for one seed.
    #[derive(Clone)]
    struct FlakyEnvConfig {
        fail_seed: i64,
        closes: Arc<AtomicUsize>,
    }

    struct FlakyEnv {
        closes: Arc<AtomicUsize>,
    }

    impl Env for FlakyEnv {
        type Config = FlakyEnvConfig;
        type Obs = ArrayObs;
        type Act = ScalarAct;
        type Info = ();

        fn build(config: &Self::Config, seed: i64) -> anyhow::Result<Self> {
            if seed == config.fail_seed {
                anyhow::bail!("broken constructor for seed {}", seed);
            }
            Ok(Self {
                closes: config.closes.clone(),
            })
        }

        fn step(&mut self, _act: &Self::Act, _params: &StepParams) -> anyhow::Result<Step<Self>> {
            unimplemented!();
        }

        fn reset(&mut self) -> anyhow::Result<Self::Obs> {
            unimplemented!();
        }

        fn render(&mut self) -> anyhow::Result<Vec<RgbFrame>> {
            unimplemented!();
        }

        fn observation_space(&self) -> Space {
            Space::Discrete { n: 1 }
        }

        fn action_space(&self) -> Space {
            Space::Discrete { n: 1 }
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn count_config(n: usize, in_series: usize) -> PooledVecEnvConfig<CountEnv> {
        PooledVecEnvConfig::default()
            .env_configs(vec![CountEnvConfig { horizon: 3 }; n])
            .in_series(in_series)
    }

    fn self_play_config(n: usize, sides: usize) -> PooledVecEnvConfig<SelfPlayEnv> {
        PooledVecEnvConfig::default().env_configs(vec![SelfPlayEnvConfig { sides, horizon: 5 }; n])
    }

    fn acts(n: usize, value: f32) -> Vec<ScalarAct> {
        vec![ScalarAct(value); n]
    }

    fn downcast(err: anyhow::Error) -> PoolError {
        err.downcast::<PoolError>().expect("should be a PoolError")
    }

    #[test]
    fn test_partitions_constructors_across_workers() {
        let mut env = PooledVecEnv::build(&count_config(12, 3)).unwrap();
        assert_eq!(env.n_envs(), 12);
        assert_eq!(env.n_workers(), 4);
        assert_eq!(env.sides(), 1);
        assert_eq!(env.in_series(), 3);
        env.close().unwrap();

        let mut env = PooledVecEnv::build(&self_play_config(4, 2)).unwrap();
        assert_eq!(env.n_envs(), 4);
        assert_eq!(env.n_workers(), 2);
        assert_eq!(env.sides(), 2);
        env.close().unwrap();
    }

    #[test]
    fn test_spaces_probe() {
        let mut env = PooledVecEnv::build(&count_config(2, 1)).unwrap();
        assert_eq!(
            env.observation_space(),
            &Space::Box {
                shape: vec![1],
                low: f32::NEG_INFINITY,
                high: f32::INFINITY,
            }
        );
        assert_eq!(env.spec().id, "count-v0");
        assert_eq!(env.spec().max_episode_steps, Some(3));
        env.close().unwrap();
    }

    #[test]
    fn test_step_batches_cover_every_slot() {
        let mut env = PooledVecEnv::build(&count_config(4, 1)).unwrap();

        let obs = env.reset().unwrap();
        assert_eq!(obs.0.shape(), &[4, 1]);
        let values: Vec<f32> = obs.0.iter().copied().collect();
        assert_eq!(values, vec![0.0, 100.0, 200.0, 300.0]);

        env.step_async(&acts(4, 1.0), &StepParams::new()).unwrap();
        let (obs, rewards, dones, infos) = env.step_wait().unwrap();
        assert_eq!(obs.0.shape(), &[4, 1]);
        let values: Vec<f32> = obs.0.iter().copied().collect();
        assert_eq!(values, vec![1.0, 101.0, 201.0, 301.0]);
        assert_eq!(rewards, vec![1.0; 4]);
        assert_eq!(dones, vec![false; 4]);
        assert_eq!(infos.len(), 4);
        assert!(infos.iter().all(|i| i.t == 1));

        env.close().unwrap();
    }

    #[test]
    fn test_side_remapping_slot_order() {
        // Two physical instances (seeds 0 and 1), two sides each. Side k of
        // instance s carries the marker s * 100 + k, and must land on
        // logical slot s * 2 + k.
        let mut env = PooledVecEnv::build(&self_play_config(4, 2)).unwrap();

        let obs = env.reset().unwrap();
        assert_eq!(obs.0, vec![0.0, 1.0, 100.0, 101.0]);

        env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap();
        let (obs, rewards, dones, _) = env.step_wait().unwrap();
        assert_eq!(obs.0, vec![1000.0, 1001.0, 1100.0, 1101.0]);
        assert_eq!(rewards, vec![0.0, 1.0, 100.0, 101.0]);
        assert_eq!(dones.len(), 4);

        env.close().unwrap();
    }

    #[test]
    fn test_in_series_groups_combined_with_sides() {
        // 8 slots over 2 sides give 4 physical instances, grouped in series
        // of 2 onto 2 workers.
        let config: PooledVecEnvConfig<SelfPlayEnv> = PooledVecEnvConfig::default()
            .env_configs(vec![SelfPlayEnvConfig { sides: 2, horizon: 5 }; 8])
            .in_series(2);
        let mut env = PooledVecEnv::build(&config).unwrap();
        assert_eq!(env.n_envs(), 8);
        assert_eq!(env.n_workers(), 2);
        assert_eq!(env.sides(), 2);
        assert_eq!(env.in_series(), 2);

        let obs = env.reset().unwrap();
        assert_eq!(
            obs.0,
            vec![0.0, 1.0, 100.0, 101.0, 200.0, 201.0, 300.0, 301.0]
        );

        env.step_async(&acts(4, 0.0), &StepParams::new()).unwrap();
        let (obs, rewards, dones, _) = env.step_wait().unwrap();
        assert_eq!(
            obs.0,
            vec![1000.0, 1001.0, 1100.0, 1101.0, 1200.0, 1201.0, 1300.0, 1301.0]
        );
        assert_eq!(
            rewards,
            vec![0.0, 1.0, 100.0, 101.0, 200.0, 201.0, 300.0, 301.0]
        );
        assert_eq!(dones, vec![false; 8]);

        env.close().unwrap();
    }

    #[test]
    fn test_auto_reset_on_done() {
        let mut env = PooledVecEnv::build(&count_config(1, 1)).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.0[[0, 0]], 0.0);

        for expected_t in 1..=2 {
            env.step_async(&acts(1, 0.5), &StepParams::new()).unwrap();
            let (obs, _, dones, _) = env.step_wait().unwrap();
            assert_eq!(obs.0[[0, 0]], expected_t as f32);
            assert_eq!(dones, vec![false]);
        }

        // The terminal step still delivers the episode's reward and done
        // flag, but the observation is already the next episode's first.
        env.step_async(&acts(1, 0.5), &StepParams::new()).unwrap();
        let (obs, rewards, dones, infos) = env.step_wait().unwrap();
        assert_eq!(dones, vec![true]);
        assert_eq!(rewards, vec![0.5]);
        assert_eq!(infos[0].t, 3);
        assert_eq!(obs.0[[0, 0]], 0.0);

        // The episode restarts transparently.
        env.step_async(&acts(1, 0.5), &StepParams::new()).unwrap();
        let (obs, _, dones, _) = env.step_wait().unwrap();
        assert_eq!(obs.0[[0, 0]], 1.0);
        assert_eq!(dones, vec![false]);

        env.close().unwrap();
    }

    #[test]
    fn test_auto_reset_on_done_multi_side() {
        let config: PooledVecEnvConfig<SelfPlayEnv> = PooledVecEnvConfig::default()
            .env_configs(vec![SelfPlayEnvConfig { sides: 2, horizon: 2 }; 4]);
        let mut env = PooledVecEnv::build(&config).unwrap();
        let obs = env.reset().unwrap();
        assert_eq!(obs.0, vec![0.0, 1.0, 100.0, 101.0]);

        env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap();
        let (obs, _, dones, _) = env.step_wait().unwrap();
        assert_eq!(obs.0, vec![1000.0, 1001.0, 1100.0, 1101.0]);
        assert_eq!(dones, vec![false; 4]);

        // Terminal step: every side still reports the episode's reward and
        // done flag, while each side's observation is already the first of
        // the next episode (t back at 0).
        env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap();
        let (obs, rewards, dones, _) = env.step_wait().unwrap();
        assert_eq!(dones, vec![true; 4]);
        assert_eq!(rewards, vec![0.0, 1.0, 100.0, 101.0]);
        assert_eq!(obs.0, vec![0.0, 1.0, 100.0, 101.0]);

        // The episodes restart transparently for every side.
        env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap();
        let (obs, _, dones, _) = env.step_wait().unwrap();
        assert_eq!(obs.0, vec![1000.0, 1001.0, 1100.0, 1101.0]);
        assert_eq!(dones, vec![false; 4]);

        env.close().unwrap();
    }

    #[test]
    fn test_params_broadcast_to_every_environment() {
        let mut env = PooledVecEnv::build(&count_config(4, 2)).unwrap();
        env.reset().unwrap();
        let params = StepParams::new().set("bonus", 2.5);
        env.step_async(&acts(4, 1.0), &params).unwrap();
        let (_, rewards, _, _) = env.step_wait().unwrap();
        assert_eq!(rewards, vec![3.5; 4]);
        env.close().unwrap();
    }

    #[test]
    fn test_images_cover_every_slot() {
        let mut env = PooledVecEnv::build(&count_config(2, 1)).unwrap();
        let frames = env.get_images().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][[0, 0, 0]], 0);
        assert_eq!(frames[1][[0, 0, 0]], 1);
        env.close().unwrap();

        let mut env = PooledVecEnv::build(&self_play_config(4, 2)).unwrap();
        let frames = env.get_images().unwrap();
        let values: Vec<u8> = frames.iter().map(|f| f[[0, 0, 0]]).collect();
        assert_eq!(values, vec![0, 1, 10, 11]);
        env.close().unwrap();
    }

    #[test]
    fn test_rejects_invalid_divisibility() {
        let err = PooledVecEnv::build(&self_play_config(3, 2)).unwrap_err();
        assert_eq!(
            downcast(err),
            PoolError::SidesDivision { n_envs: 3, sides: 2 }
        );

        let err = PooledVecEnv::build(&count_config(4, 3)).unwrap_err();
        assert_eq!(
            downcast(err),
            PoolError::SeriesDivision {
                n_insts: 4,
                in_series: 3
            }
        );

        let err = PooledVecEnv::build(&count_config(4, 0)).unwrap_err();
        assert_eq!(downcast(err), PoolError::ZeroInSeries);

        let err = PooledVecEnv::build(&count_config(0, 1)).unwrap_err();
        assert_eq!(downcast(err), PoolError::NoEnvs);
    }

    #[test]
    fn test_rejects_illegal_call_sequences() {
        let mut env = PooledVecEnv::build(&count_config(2, 1)).unwrap();

        let err = env.step_wait().unwrap_err();
        assert_eq!(downcast(err), PoolError::NoPendingDispatch);

        let err = env.step_async(&acts(3, 0.0), &StepParams::new()).unwrap_err();
        assert_eq!(
            downcast(err),
            PoolError::ActionCount { expected: 2, got: 3 }
        );

        env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap();
        let err = env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap_err();
        assert_eq!(downcast(err), PoolError::DispatchInFlight);
        let err = env.reset().unwrap_err();
        assert_eq!(downcast(err), PoolError::DispatchInFlight);
        env.step_wait().unwrap();

        env.close().unwrap();
        let err = env.reset().unwrap_err();
        assert_eq!(downcast(err), PoolError::Closed);
        let err = env.close().unwrap_err();
        assert_eq!(downcast(err), PoolError::Closed);
    }

    #[test]
    fn test_close_drains_a_pending_dispatch() {
        let mut env = PooledVecEnv::build(&count_config(2, 1)).unwrap();
        env.step_async(&acts(2, 0.0), &StepParams::new()).unwrap();
        // Workers may still be blocked handing over their replies; close
        // must drain them before shutting down.
        env.close().unwrap();
    }

    #[test]
    fn test_build_failure_closes_earlier_group_members() {
        let closes = Arc::new(AtomicUsize::new(0));
        let config = PooledVecEnvConfig::default()
            .env_configs(vec![
                FlakyEnvConfig {
                    fail_seed: 1,
                    closes: closes.clone(),
                };
                2
            ])
            .in_series(2);

        let err = PooledVecEnv::<FlakyEnv>::build(&config).unwrap_err();
        assert_eq!(downcast(err), PoolError::WorkerDisconnected { worker: 0 });
        // The sides probe (seed 0) and the worker's first group member were
        // both closed before the worker hung up.
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_without_explicit_close() {
        let env = PooledVecEnv::build(&count_config(2, 1)).unwrap();
        drop(env);
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = count_config(4, 2).base_seed(7);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let config_: PooledVecEnvConfig<CountEnv> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config_.env_configs, config.env_configs);
        assert_eq!(config_.in_series, 2);
        assert_eq!(config_.base_seed, 7);
    }
}
