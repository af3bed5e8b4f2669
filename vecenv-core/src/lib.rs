#![warn(missing_docs)]
//! Environment abstraction for vectorized reinforcement learning.
//!
//! This crate defines the small capability set an environment exposes to a
//! batched execution layer: [`Env`] (step, reset, render, close, spaces),
//! the traits of the values flowing through it ([`Obs`], [`Act`], [`Info`])
//! and the per-step record [`Step`].
//!
//! Environments may multiplex several logical agents ("sides") within one
//! physical instance for self-play training. Such environments report their
//! side count via [`Env::sides`] and return per-side rewards and done flags
//! in [`Step`]; per-side views of observations and infos are extracted with
//! [`Obs::pick_side`] and [`Info::pick_side`].
pub mod dummy;
pub mod obs;

mod base;
pub use base::{Act, Env, Info, Obs, RgbFrame, Step, StepParams};

mod spaces;
pub use spaces::{EnvSpec, Space, SpacesSpec};
