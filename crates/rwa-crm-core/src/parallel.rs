//! Rayon-based fan-out for per-exposure stage work.
//!
//! Small batches stay on the calling thread; results always come back in
//! input order.

use rayon::prelude::*;

/// Maps each item, in parallel once the batch reaches `threshold`.
pub fn parallel_map<T, R, F>(items: &[T], threshold: usize, mapper: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if should_parallelize(items.len(), threshold) {
        items.par_iter().map(mapper).collect()
    } else {
        items.iter().map(mapper).collect()
    }
}

/// Returns whether to use parallel processing for the given item count.
#[inline]
pub fn should_parallelize(n_items: usize, threshold: usize) -> bool {
    n_items >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_map_preserves_order() {
        let items: Vec<i32> = (0..1000).collect();
        let doubled = parallel_map(&items, 10, |&x| x * 2);
        assert_eq!(doubled.len(), 1000);
        assert_eq!(doubled[500], 1000);
        assert!(doubled.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sequential_below_threshold() {
        let items = vec![1, 2, 3];
        assert_eq!(parallel_map(&items, 100, |&x| x + 1), vec![2, 3, 4]);
        assert!(!should_parallelize(3, 100));
    }
}
