use itertools::Itertools;
use nalgebra::DMatrix;
use serde::Serialize;

/// Default number of pairs reported.
pub const TOP_PAIRS: usize = 100;

/// A position pair with `i < j`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairRecord {
    pub i: usize,
    pub j: usize,
    pub score: f64,
}

/// Which upper-triangle cells are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairFilter {
    /// Only cells with a score above zero
    #[default]
    Positive,
    All,
}

/// The `k` highest-scoring pairs of the upper triangle, best first.
///
/// Ties keep row-major order.
///
/// ```
/// use nalgebra::DMatrix;
/// use rnaec::libs::pairs::{extract, PairFilter};
///
/// let m = DMatrix::from_row_slice(3, 3, &[0.0, 0.2, 0.0, 0.2, 0.0, 0.9, 0.0, 0.9, 0.0]);
/// let top = extract(&m, 10, PairFilter::Positive);
/// assert_eq!(top.len(), 2);
/// assert_eq!((top[0].i, top[0].j), (1, 2));
/// assert_eq!(extract(&m, 10, PairFilter::All).len(), 3);
/// ```
pub fn extract(matrix: &DMatrix<f64>, k: usize, filter: PairFilter) -> Vec<PairRecord> {
    let n = matrix.nrows().min(matrix.ncols());
    let mut pairs: Vec<PairRecord> = (0..n)
        .tuple_combinations()
        .map(|(i, j)| PairRecord {
            i,
            j,
            score: matrix[(i, j)],
        })
        .filter(|p| match filter {
            PairFilter::Positive => p.score > 0.0,
            PairFilter::All => !p.score.is_nan(),
        })
        .collect();

    // sort_by is stable
    pairs.sort_by(|a, b| b.score.total_cmp(&a.score));
    pairs.truncate(k);
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_order() {
        let mut m = DMatrix::zeros(5, 5);
        for (i, j, v) in [(0, 4, 0.5), (1, 3, 0.9), (2, 4, 0.5), (0, 1, 0.1)] {
            m[(i, j)] = v;
            m[(j, i)] = v;
        }
        let top = extract(&m, TOP_PAIRS, PairFilter::Positive);
        let got: Vec<(usize, usize)> = top.iter().map(|p| (p.i, p.j)).collect();
        // (0, 4) precedes (2, 4) on the tie
        assert_eq!(got, vec![(1, 3), (0, 4), (2, 4), (0, 1)]);
    }

    #[test]
    fn test_extract_bound() {
        let n = 20;
        let m = DMatrix::from_fn(n, n, |i, j| if i == j { 0.0 } else { 1.0 / (1 + i + j) as f64 });
        let top = extract(&m, TOP_PAIRS, PairFilter::All);
        assert_eq!(top.len(), TOP_PAIRS.min(n * (n - 1) / 2));
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(top.iter().all(|p| p.i < p.j));

        let small = DMatrix::from_element(4, 4, 1.0);
        assert_eq!(extract(&small, TOP_PAIRS, PairFilter::All).len(), 6);
        assert_eq!(extract(&small, 2, PairFilter::All).len(), 2);
    }

    #[test]
    fn test_extract_zero_matrix() {
        let m = DMatrix::zeros(6, 6);
        assert!(extract(&m, TOP_PAIRS, PairFilter::Positive).is_empty());
        assert_eq!(extract(&m, TOP_PAIRS, PairFilter::All).len(), 15);
        assert!(extract(&DMatrix::zeros(1, 1), TOP_PAIRS, PairFilter::All).is_empty());
    }
}
