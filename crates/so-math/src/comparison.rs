//! Tie-breaking helpers.

use so_core::Real;

/// Index of the smallest value, the first one on ties. `None` when empty
/// or when every value is NaN.
pub fn argmin_first<I>(values: I) -> Option<(usize, Real)>
where
    I: IntoIterator<Item = Real>,
{
    let mut best: Option<(usize, Real)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best
}
