//! Chronological partitioning: the train/test split and the
//! expanding-window cross-validation folds.

use std::ops::Range;

/// Share of rows assigned to the training partition.
pub const TRAIN_FRACTION: f64 = 0.8;

/// Minimum number of rows kept for the test partition.
pub const MIN_TEST_ROWS: usize = 2;

/// Index at which a time-ordered table of `n_rows` is split.
///
/// Rows `[0, split)` train and `[split, n_rows)` test. The split never
/// leaves fewer than [`MIN_TEST_ROWS`] test rows when the table has at
/// least that many rows.
pub fn chronological_split(n_rows: usize) -> usize {
    // ---
    let by_fraction = (n_rows as f64 * TRAIN_FRACTION).floor() as usize;
    by_fraction.min(n_rows.saturating_sub(MIN_TEST_ROWS))
}

/// One expanding-window fold: train on everything before `validation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Range<usize>,
    pub validation: Range<usize>,
}

/// Expanding-window folds over `n_samples` rows.
///
/// The rows are cut into `n_splits + 1` equal blocks (remainder goes to
/// the first training block); fold `k` validates on block `k + 1` and
/// trains on all rows before it. Returns no folds when a block would be
/// empty.
pub fn time_series_folds(n_samples: usize, n_splits: usize) -> Vec<Fold> {
    // ---
    if n_splits == 0 {
        return Vec::new();
    }
    let test_size = n_samples / (n_splits + 1);
    if test_size == 0 {
        return Vec::new();
    }

    let first_test = n_samples - n_splits * test_size;
    (0..n_splits)
        .map(|k| {
            let start = first_test + k * test_size;
            Fold {
                train: 0..start,
                validation: start..start + test_size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_split_is_eighty_percent_for_large_tables() {
        assert_eq!(chronological_split(100), 80);
        assert_eq!(chronological_split(11), 8);
    }

    #[test]
    fn test_split_keeps_two_test_rows_for_small_tables() {
        // ---
        assert_eq!(chronological_split(5), 3);
        assert_eq!(chronological_split(7), 5);
        assert_eq!(chronological_split(9), 7);
    }

    #[test]
    fn test_no_test_row_precedes_a_train_row() {
        // ---
        for n in 5..200 {
            let split = chronological_split(n);
            let train: Vec<usize> = (0..split).collect();
            let test: Vec<usize> = (split..n).collect();
            assert!(test.len() >= MIN_TEST_ROWS);
            assert!(!train.is_empty());
            let last_train = *train.last().unwrap();
            assert!(test.iter().all(|&t| t > last_train));
        }
    }

    #[test]
    fn test_folds_match_expanding_window_layout() {
        // ---
        let folds = time_series_folds(12, 5);
        assert_eq!(folds.len(), 5);
        assert_eq!(folds[0], Fold { train: 0..2, validation: 2..4 });
        assert_eq!(folds[4], Fold { train: 0..10, validation: 10..12 });
        for pair in folds.windows(2) {
            assert!(pair[1].train.end > pair[0].train.end);
            assert_eq!(pair[0].validation.end, pair[1].validation.start);
        }
    }

    #[test]
    fn test_folds_skipped_when_too_few_rows() {
        assert!(time_series_folds(5, 5).is_empty());
        assert!(time_series_folds(10, 0).is_empty());
    }
}
