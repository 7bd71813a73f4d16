//! Slot-preserving map over independent work items.
//!
//! Output slot i always holds the result for input i, whether the items run
//! on the rayon pool or sequentially.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "parallel")]
pub(crate) fn map_slots<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync + Send,
{
    items
        .par_iter()
        .enumerate()
        .map(|(index, item)| f(index, item))
        .collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_slots<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync + Send,
{
    items
        .iter()
        .enumerate()
        .map(|(index, item)| f(index, item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::map_slots;

    #[test]
    fn results_stay_aligned_with_inputs() {
        let items: Vec<u64> = (0..1000).collect();
        let out = map_slots(&items, |index, &value| (index, value * value));
        for (i, (index, square)) in out.into_iter().enumerate() {
            assert_eq!(index, i);
            assert_eq!(square, (i as u64) * (i as u64));
        }
    }
}
