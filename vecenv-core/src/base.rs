//! Core traits.
mod env;
mod step;
pub use env::Env;
pub use step::{Info, Step, StepParams};

use std::fmt::Debug;

/// An RGB frame produced by [`Env::render`], shaped `(height, width, 3)`.
pub type RgbFrame = ndarray::Array3<u8>;

/// A single observation of an environment.
///
/// For a multi-side environment this is the joint observation of one
/// physical instance; the view of an individual side is obtained with
/// [`Obs::pick_side`].
pub trait Obs: Clone + Debug + Send + 'static {
    /// Stacks observations along a new leading batch axis.
    ///
    /// `items` must not be empty and all elements must share a shape.
    fn stack(items: Vec<Self>) -> Self;

    /// Returns the view of this observation for one side.
    ///
    /// The default implementation returns a clone, which is correct for
    /// single-sided environments. Multi-side environments must override it.
    fn pick_side(&self, _side: usize) -> Self {
        self.clone()
    }
}

/// An action applied to an environment.
///
/// For a multi-side environment this is the joint action of all sides,
/// merged by the caller before dispatch.
pub trait Act: Clone + Debug + Send + 'static {}
