//! Self-hit exclusion over one ranked candidate list.

/// Walk `ranked` in order, drop every entry `is_excluded` flags, and keep the
/// first `topk` survivors in their original order.
///
/// May return fewer than `topk` entries; the caller decides whether that is
/// an error.
pub fn select_candidates<T, F>(ranked: &[T], is_excluded: F, topk: usize) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    ranked
        .iter()
        .filter(|c| !is_excluded(c))
        .take(topk)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_rank_order() {
        assert_eq!(select_candidates(&[4, 2, 9, 1], |_| false, 3), vec![4, 2, 9]);
    }

    #[test]
    fn backfills_after_exclusion() {
        assert_eq!(select_candidates(&[0, 1, 2], |&id| id == 0, 2), vec![1, 2]);
    }

    #[test]
    fn excluded_tail_is_ignored() {
        assert_eq!(select_candidates(&[0, 1, 2], |&id| id == 2, 2), vec![0, 1]);
    }

    #[test]
    fn underfill_is_reported_by_length() {
        assert_eq!(select_candidates(&[5, 5, 6], |&id| id == 5, 2), vec![6]);
    }

    #[test]
    fn works_on_pairs() {
        let ranked = [(3usize, 0.9f32), (7, 0.5), (8, 0.1)];
        let kept = select_candidates(&ranked, |(id, _)| *id == 7, 2);
        assert_eq!(kept, vec![(3, 0.9), (8, 0.1)]);
    }
}
