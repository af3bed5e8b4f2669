//! Ready-made observation types backed by [`ndarray`].
use crate::Obs;
use ndarray::{ArrayD, Axis};
use std::collections::HashMap;

/// Observation holding a single array.
///
/// Stacking `n` observations of shape `d` yields shape `(n, d...)`, so a
/// batched reply exposes the batch size as its leading dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayObs(pub ArrayD<f32>);

impl Obs for ArrayObs {
    fn stack(items: Vec<Self>) -> Self {
        assert!(!items.is_empty());
        let views: Vec<_> = items.iter().map(|o| o.0.view()).collect();
        Self(ndarray::stack(Axis(0), &views).expect("observations must share a shape"))
    }
}

/// Structured observation holding named arrays, stacked key-wise.
#[derive(Clone, Debug, PartialEq)]
pub struct DictObs(pub HashMap<String, ArrayD<f32>>);

impl Obs for DictObs {
    fn stack(items: Vec<Self>) -> Self {
        assert!(!items.is_empty());
        let keys: Vec<String> = items[0].0.keys().cloned().collect();
        let mut stacked = HashMap::with_capacity(keys.len());
        for key in keys {
            let views: Vec<_> = items
                .iter()
                .map(|o| o.0.get(&key).expect("observations must share keys").view())
                .collect();
            let batch =
                ndarray::stack(Axis(0), &views).expect("observations must share a shape");
            stacked.insert(key, batch);
        }
        Self(stacked)
    }
}
