//! Order-statistic multiset over a fixed value universe.
//!
//! A Fenwick tree of counts indexed by the sorted distinct values a series
//! can take. Insertions, removals, rank counts and k-th selection are all
//! `O(log n)`, so a percentile rank over an expanding (or rolling) history
//! costs `O(n log n)` for the whole series instead of a re-scan per date.

use std::cmp::Ordering;

/// Collapse `-0.0` onto `0.0` so keys compare the same way under
/// `total_cmp` as they do under `==`.
fn canonical(value: f64) -> f64 {
    value + 0.0
}

/// Multiset of `f64` values drawn from a fixed universe.
#[derive(Debug, Clone)]
pub struct RankTree {
    keys: Vec<f64>,
    tree: Vec<usize>,
    counts: Vec<usize>,
    len: usize,
}

impl RankTree {
    /// Create an empty tree able to hold any value in `universe`.
    ///
    /// Non-finite values are ignored.
    pub fn with_universe(universe: impl IntoIterator<Item = f64>) -> Self {
        let mut keys: Vec<f64> = universe
            .into_iter()
            .filter(|v| v.is_finite())
            .map(canonical)
            .collect();
        keys.sort_by(f64::total_cmp);
        keys.dedup();
        let n = keys.len();
        Self {
            keys,
            tree: vec![0; n + 1],
            counts: vec![0; n],
            len: 0,
        }
    }

    /// Number of values currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn position(&self, value: f64) -> Option<usize> {
        let value = canonical(value);
        self.keys
            .binary_search_by(|k| k.total_cmp(&value))
            .ok()
    }

    fn add(&mut self, pos: usize, delta: isize) {
        let mut i = pos + 1;
        while i < self.tree.len() {
            self.tree[i] = (self.tree[i] as isize + delta) as usize;
            i += i & i.wrapping_neg();
        }
    }

    /// Sum of counts for the first `n` keys.
    fn prefix(&self, n: usize) -> usize {
        let mut i = n;
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Insert a value; returns false when it is outside the universe.
    pub fn insert(&mut self, value: f64) -> bool {
        match self.position(value) {
            Some(pos) => {
                self.counts[pos] += 1;
                self.add(pos, 1);
                self.len += 1;
                true
            }
            None => false,
        }
    }

    /// Remove one occurrence of a value; returns false when absent.
    pub fn remove(&mut self, value: f64) -> bool {
        match self.position(value) {
            Some(pos) if self.counts[pos] > 0 => {
                self.counts[pos] -= 1;
                self.add(pos, -1);
                self.len -= 1;
                true
            }
            _ => false,
        }
    }

    /// Number of held values strictly below `value`.
    pub fn count_less(&self, value: f64) -> usize {
        let value = canonical(value);
        let n = self
            .keys
            .partition_point(|k| k.total_cmp(&value) == Ordering::Less);
        self.prefix(n)
    }

    /// Number of held values at or below `value`.
    pub fn count_less_equal(&self, value: f64) -> usize {
        let value = canonical(value);
        let n = self
            .keys
            .partition_point(|k| k.total_cmp(&value) != Ordering::Greater);
        self.prefix(n)
    }

    /// Number of held values equal to `value`.
    pub fn count_equal(&self, value: f64) -> usize {
        self.position(value).map_or(0, |pos| self.counts[pos])
    }

    /// The `k`-th smallest held value (0-based).
    pub fn select(&self, k: usize) -> Option<f64> {
        if k >= self.len {
            return None;
        }
        let mut pos = 0;
        let mut remaining = k;
        let mut step = self.tree.len().next_power_of_two() >> 1;
        while step > 0 {
            let next = pos + step;
            if next < self.tree.len() && self.tree[next] <= remaining {
                pos = next;
                remaining -= self.tree[next];
            }
            step >>= 1;
        }
        // `pos` is the count of keys whose prefix sum is <= k.
        self.keys.get(pos).copied()
    }

    /// Quantile with linear interpolation between closest ranks.
    pub fn quantile(&self, q: f64) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let q = q.clamp(0.0, 1.0);
        let pos = q * (self.len - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let lo_value = self.select(lo)?;
        let hi_value = self.select(hi)?;
        Some(lo_value + (hi_value - lo_value) * (pos - lo as f64))
    }

    /// Average-rank percentile (midrank / n) of a held value.
    pub fn midrank_pct(&self, value: f64) -> Option<f64> {
        let equal = self.count_equal(value);
        if equal == 0 {
            return None;
        }
        let less = self.count_less(value);
        Some((less as f64 + (equal as f64 + 1.0) / 2.0) / self.len as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[f64]) -> RankTree {
        let mut tree = RankTree::with_universe(values.iter().copied());
        for v in values {
            assert!(tree.insert(*v));
        }
        tree
    }

    #[test]
    fn test_signed_zeros_share_a_key() {
        let tree = filled(&[1.0, -0.0, 2.0, 0.0, 3.0]);
        assert_eq!(tree.count_equal(0.0), 2);
        assert_eq!(tree.count_equal(-0.0), 2);
        assert_eq!(tree.count_less(0.0), 0);
        assert_eq!(tree.count_less_equal(-0.0), 2);
        assert_eq!(tree.midrank_pct(0.0), Some(0.3));
    }

    #[test]
    fn test_counts() {
        let tree = filled(&[3.0, 1.0, 2.0, 2.0, 5.0]);
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.count_less(2.0), 1);
        assert_eq!(tree.count_less_equal(2.0), 3);
        assert_eq!(tree.count_equal(2.0), 2);
        assert_eq!(tree.count_less(4.0), 4);
        assert_eq!(tree.count_less_equal(0.0), 0);
        assert_eq!(tree.count_equal(4.0), 0);
    }

    #[test]
    fn test_select_and_remove() {
        let mut tree = filled(&[3.0, 1.0, 2.0, 2.0, 5.0]);
        let sorted: Vec<f64> = (0..5).map(|k| tree.select(k).unwrap()).collect();
        assert_eq!(sorted, vec![1.0, 2.0, 2.0, 3.0, 5.0]);
        assert_eq!(tree.select(5), None);

        assert!(tree.remove(2.0));
        assert!(!tree.remove(4.0));
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.select(1), Some(2.0));
        assert_eq!(tree.select(2), Some(3.0));
    }

    #[test]
    fn test_insert_outside_universe() {
        let mut tree = RankTree::with_universe([1.0, 2.0]);
        assert!(!tree.insert(7.0));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_quantile_interpolates() {
        let tree = filled(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(tree.quantile(0.0), Some(1.0));
        assert_eq!(tree.quantile(1.0), Some(5.0));
        assert!((tree.quantile(0.5).unwrap() - 3.0).abs() < 1e-12);
        // pos = 0.1 * 4 = 0.4 -> 1.4
        assert!((tree.quantile(0.1).unwrap() - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_midrank_pct() {
        let tree = filled(&[1.0, 2.0, 2.0, 4.0]);
        // 2.0 occupies ranks 2 and 3 -> 2.5 / 4
        assert!((tree.midrank_pct(2.0).unwrap() - 0.625).abs() < 1e-12);
        assert!((tree.midrank_pct(4.0).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(tree.midrank_pct(3.0), None);
    }

    #[test]
    fn test_matches_brute_force() {
        // Deterministic pseudo-random sequence with repeats.
        let mut state: u64 = 42;
        let values: Vec<f64> = (0..300)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) % 50) as f64
            })
            .collect();

        let mut tree = RankTree::with_universe(values.iter().copied());
        for (i, v) in values.iter().enumerate() {
            tree.insert(*v);
            let history = &values[..=i];
            let less = history.iter().filter(|x| *x < v).count();
            let le = history.iter().filter(|x| *x <= v).count();
            assert_eq!(tree.count_less(*v), less);
            assert_eq!(tree.count_less_equal(*v), le);

            let mut sorted = history.to_vec();
            sorted.sort_by(f64::total_cmp);
            let k = i / 2;
            assert_eq!(tree.select(k), Some(sorted[k]));
        }
    }
}
