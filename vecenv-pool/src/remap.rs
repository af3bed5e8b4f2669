//! Reorders flat per-worker results into logical slot order.
//!
//! A worker reply carries one entry per physical environment instance. When
//! an instance multiplexes `S` sides, its entry encodes the results of all
//! `S` logical slots and must be expanded. The convention, pinned by the
//! tests below, is that logical slot `i` holds side `i % S` of physical
//! instance `i / S`: scanning the slots, the side index varies fastest, so
//! side `k` occupies slots `{k, k + S, k + 2S, ...}`.
//!
//! Expansion is a pure function from `n` entries to `n * S` slots; every
//! per-side value appears in exactly one slot.
use crate::PoolError;
use anyhow::Result;
use vecenv_core::{Env, Info, Obs, RgbFrame, Step};

/// Result of one logical slot: observation, reward, done flag and info.
pub(crate) type SlotResult<E> = (
    <E as Env>::Obs,
    f32,
    bool,
    <E as Env>::Info,
);

/// Expands step results into one `(obs, reward, done, info)` per slot.
pub(crate) fn expand_steps<E: Env>(
    flat: Vec<Step<E>>,
    sides: usize,
) -> Result<Vec<SlotResult<E>>> {
    let mut slots = Vec::with_capacity(flat.len() * sides);
    for i in 0..flat.len() * sides {
        let src = &flat[i / sides];
        if src.reward.len() != sides || src.done.len() != sides {
            return Err(PoolError::SideCount {
                expected: sides,
                got: src.reward.len(),
            }
            .into());
        }
        let k = i % sides;
        slots.push((
            src.obs.pick_side(k),
            src.reward[k],
            src.done[k],
            src.info.pick_side(k),
        ));
    }
    debug_assert_eq!(slots.len(), flat.len() * sides);
    Ok(slots)
}

/// Expands reset observations into one observation per slot.
pub(crate) fn expand_obs<O: Obs>(flat: Vec<O>, sides: usize) -> Vec<O> {
    (0..flat.len() * sides)
        .map(|i| flat[i / sides].pick_side(i % sides))
        .collect()
}

/// Expands per-environment frame sequences into one frame per slot.
pub(crate) fn expand_frames(flat: Vec<Vec<RgbFrame>>, sides: usize) -> Result<Vec<RgbFrame>> {
    let mut frames = Vec::with_capacity(flat.len() * sides);
    for i in 0..flat.len() * sides {
        let src = &flat[i / sides];
        if src.len() != sides {
            return Err(PoolError::SideCount {
                expected: sides,
                got: src.len(),
            }
            .into());
        }
        frames.push(src[i % sides].clone());
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vecenv_core::dummy::{SelfPlayEnv, SidedObs};

    fn step(marker: f32, sides: usize) -> Step<SelfPlayEnv> {
        Step::new(
            SidedObs((0..sides).map(|k| marker + k as f32).collect()),
            (0..sides).map(|k| marker + k as f32).collect(),
            vec![false; sides],
            (),
        )
    }

    #[test]
    fn test_expand_steps_is_identity_for_one_side() {
        let flat = vec![step(0.0, 1), step(100.0, 1), step(200.0, 1)];
        let slots = expand_steps::<SelfPlayEnv>(flat, 1).unwrap();
        let rewards: Vec<f32> = slots.iter().map(|s| s.1).collect();
        assert_eq!(rewards, vec![0.0, 100.0, 200.0]);
    }

    #[test]
    fn test_expand_steps_places_side_k_at_slots_k_mod_sides() {
        // Two workers, two sides: markers 0 and 100, side k adds k.
        let flat = vec![step(0.0, 2), step(100.0, 2)];
        let slots = expand_steps::<SelfPlayEnv>(flat, 2).unwrap();
        assert_eq!(slots.len(), 4);
        let rewards: Vec<f32> = slots.iter().map(|s| s.1).collect();
        assert_eq!(rewards, vec![0.0, 1.0, 100.0, 101.0]);
        let obs: Vec<f32> = slots.iter().map(|s| s.0 .0[0]).collect();
        assert_eq!(obs, vec![0.0, 1.0, 100.0, 101.0]);
    }

    #[test]
    fn test_expand_steps_rejects_wrong_side_count() {
        let flat = vec![step(0.0, 2)];
        assert!(expand_steps::<SelfPlayEnv>(flat, 3).is_err());
    }

    #[test]
    fn test_expand_obs() {
        let flat = vec![SidedObs(vec![0.0, 1.0]), SidedObs(vec![100.0, 101.0])];
        let slots = expand_obs(flat, 2);
        let values: Vec<f32> = slots.iter().map(|o| o.0[0]).collect();
        assert_eq!(values, vec![0.0, 1.0, 100.0, 101.0]);
    }

    #[test]
    fn test_expand_frames() {
        let frame = |v: u8| RgbFrame::from_elem((1, 1, 3), v);
        let flat = vec![vec![frame(0), frame(1)], vec![frame(10), frame(11)]];
        let frames = expand_frames(flat, 2).unwrap();
        let values: Vec<u8> = frames.iter().map(|f| f[[0, 0, 0]]).collect();
        assert_eq!(values, vec![0, 1, 10, 11]);
    }
}
