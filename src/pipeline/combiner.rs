//! How modifiers combine with a pipeline's source value.

use crate::error::{Error, Result};

/// Combination strategy of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combiner {
    /// Each modifier receives the current value and its output replaces it,
    /// so the last registered modifier has the final word
    Replace,
    /// The source yields a list of fractions, each modifier appends one more,
    /// and the list is collapsed with [`joint_union`]
    ListUnion,
}

/// Joint effect of independent fractions: `1 - prod(1 - p_i)`
///
/// Accumulated as `j + p - j * p`, which is the same union but keeps a single
/// fraction exact. An empty list has no effect and yields zero.
#[must_use]
pub fn joint_union(fractions: &[f64]) -> f64 {
    fractions.iter().fold(0.0, |joint, p| union_step(joint, *p))
}

#[inline]
fn union_step(joint: f64, p: f64) -> f64 {
    joint + p - joint * p
}

/// Collapse per-contribution vectors into one joint value per simulant
pub fn union_post_processor(contributions: &[Vec<f64>], size: usize) -> Result<Vec<f64>> {
    if let Some(bad) = contributions.iter().find(|c| c.len() != size) {
        return Err(Error::validation(format!(
            "Union contribution has {} values for {size} simulants",
            bad.len()
        )));
    }
    let mut joint = vec![0.0; size];
    for contribution in contributions {
        for (j, p) in joint.iter_mut().zip(contribution) {
            *j = union_step(*j, *p);
        }
    }
    Ok(joint)
}
