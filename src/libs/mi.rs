//! Pairwise positional mutual information.
//!
//! For columns `i` and `j` of an alignment
//!
//! ```text
//! MI(i, j) = Σ p(a, b) · log2( p(a, b) / (p(a) · p(b)) )
//! ```
//!
//! over symbol pairs with positive joint probability. Probabilities come from
//! weighted counts, optionally smoothed with a pseudocount spread evenly over
//! the alphabet (`pc / K` per marginal cell, `pc / K²` per joint cell).

use crate::libs::error::MiError;
use crate::libs::msa::{Alignment, RNA_SYMBOLS};
use crate::libs::pool::WorkerPool;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Probabilities at or below this are treated as zero.
pub const PROB_FLOOR: f64 = 1e-12;

const NOT_IN_ALPHABET: u8 = u8::MAX;

/// The symbols counted by the estimator.
#[derive(Debug, Clone)]
pub struct Alphabet {
    symbols: Vec<u8>,
    index: [u8; 256],
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::rna()
    }
}

impl Alphabet {
    /// `A C G U T N -`
    pub fn rna() -> Self {
        Self::build(RNA_SYMBOLS)
    }

    /// A custom alphabet; symbols are upper-cased and must be unique.
    pub fn new(symbols: &[u8]) -> Result<Self, MiError> {
        let upper: Vec<u8> = symbols.iter().map(|b| b.to_ascii_uppercase()).collect();
        if upper.is_empty() || upper.len() >= NOT_IN_ALPHABET as usize {
            return Err(MiError::InvalidParams(format!(
                "alphabet size must be in 1..255, got {}",
                upper.len()
            )));
        }
        for (k, b) in upper.iter().enumerate() {
            if upper[..k].contains(b) {
                return Err(MiError::InvalidParams(format!(
                    "duplicate symbol '{}' in alphabet",
                    *b as char
                )));
            }
        }
        Ok(Self::build(&upper))
    }

    fn build(symbols: &[u8]) -> Self {
        let mut index = [NOT_IN_ALPHABET; 256];
        for (k, &b) in symbols.iter().enumerate() {
            index[b as usize] = k as u8;
        }
        Alphabet {
            symbols: symbols.to_vec(),
            index,
        }
    }

    pub fn size(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn index_of(&self, b: u8) -> Option<usize> {
        match self.index[b as usize] {
            NOT_IN_ALPHABET => None,
            k => Some(k as usize),
        }
    }

    /// Column-major symbol codes; bytes outside the alphabet get a sentinel.
    fn encode_columns(&self, aln: &Alignment) -> Vec<Vec<u8>> {
        (0..aln.seq_len())
            .map(|j| aln.seqs().iter().map(|s| self.index[s[j] as usize]).collect())
            .collect()
    }
}

/// How the pseudocount is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Pseudocount {
    /// Sized from the number of sequences, see [`adaptive_pseudocount`]
    #[default]
    Adaptive,
    /// Used as given
    Fixed(f64),
}

impl Pseudocount {
    /// `None` means adaptive.
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) => Pseudocount::Fixed(v),
            None => Pseudocount::Adaptive,
        }
    }

    pub fn resolve(&self, n_seqs: usize) -> f64 {
        match *self {
            Pseudocount::Adaptive => adaptive_pseudocount(n_seqs),
            Pseudocount::Fixed(v) => v,
        }
    }

    pub fn is_adaptive(&self) -> bool {
        matches!(self, Pseudocount::Adaptive)
    }

    pub fn validate(&self) -> Result<(), MiError> {
        match *self {
            Pseudocount::Fixed(v) if !(v.is_finite() && v >= 0.0) => Err(
                MiError::InvalidParams(format!("pseudocount must be non-negative, got {}", v)),
            ),
            _ => Ok(()),
        }
    }
}

/// Small alignments get more smoothing.
///
/// ```
/// use rnaec::libs::mi::adaptive_pseudocount;
/// assert_eq!(adaptive_pseudocount(20), 0.5);
/// assert_eq!(adaptive_pseudocount(25), 0.5);
/// assert_eq!(adaptive_pseudocount(100), 0.2);
/// assert_eq!(adaptive_pseudocount(101), 0.0);
/// ```
pub fn adaptive_pseudocount(n_seqs: usize) -> f64 {
    if n_seqs <= 25 {
        0.5
    } else if n_seqs <= 100 {
        0.2
    } else {
        0.0
    }
}

/// Which per-row weights enter the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Weighting {
    /// The redundancy weights computed by the filter
    #[default]
    Sequence,
    /// Every row weighs `1/n`
    Uniform,
}

/// Raw MI matrix, symmetric with a zero diagonal.
#[derive(Debug, Clone)]
pub struct MiMatrix {
    pub matrix: DMatrix<f64>,
    /// The alignment had a single distinct sequence, `matrix` is all zero
    pub single_sequence: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MiEstimator {
    alphabet: Alphabet,
    weighting: Weighting,
}

impl MiEstimator {
    pub fn new(alphabet: Alphabet, weighting: Weighting) -> Self {
        MiEstimator {
            alphabet,
            weighting,
        }
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// MI for every column pair of `aln`.
    ///
    /// `weights` holds one entry per row. Rows with a symbol outside the
    /// alphabet at `i` or `j` are left out of that pair.
    pub fn estimate(
        &self,
        aln: &Alignment,
        weights: &[f64],
        pseudocount: f64,
        pool: &WorkerPool,
    ) -> Result<MiMatrix, MiError> {
        Pseudocount::Fixed(pseudocount).validate()?;
        if aln.is_empty() {
            return Err(MiError::EmptyAlignment);
        }
        if self.weighting == Weighting::Sequence && weights.len() != aln.len() {
            return Err(MiError::InvalidParams(format!(
                "{} weights for {} sequences",
                weights.len(),
                aln.len()
            )));
        }

        let len = aln.seq_len();
        if aln.distinct_rows() <= 1 {
            log::warn!(
                "Only one distinct sequence among {}, returning a zero matrix",
                aln.len()
            );
            return Ok(MiMatrix {
                matrix: DMatrix::zeros(len, len),
                single_sequence: true,
            });
        }

        let row_weights: Vec<f64> = match self.weighting {
            Weighting::Sequence => weights.to_vec(),
            Weighting::Uniform => vec![1.0 / aln.len() as f64; aln.len()],
        };
        let columns = self.alphabet.encode_columns(aln);
        let k = self.alphabet.size();

        log::debug!(
            "Estimating MI for {} position pairs ({} sequences, pseudocount {})",
            len * len.saturating_sub(1) / 2,
            aln.len(),
            pseudocount
        );

        // One job per row i, each owning cells (i, i+1..len)
        let rows: Vec<Vec<f64>> = pool.install(|| {
            (0..len)
                .into_par_iter()
                .map(|i| {
                    (i + 1..len)
                        .map(|j| pair_mi(&columns[i], &columns[j], &row_weights, k, pseudocount))
                        .collect()
                })
                .collect()
        });

        let mut matrix = DMatrix::zeros(len, len);
        for (i, row) in rows.iter().enumerate() {
            for (offset, &mi) in row.iter().enumerate() {
                let j = i + 1 + offset;
                matrix[(i, j)] = mi;
                matrix[(j, i)] = mi;
            }
        }

        Ok(MiMatrix {
            matrix,
            single_sequence: false,
        })
    }
}

/// MI of two encoded columns over an alphabet of `k` symbols.
fn pair_mi(col_i: &[u8], col_j: &[u8], weights: &[f64], k: usize, pseudocount: f64) -> f64 {
    let mut joint = vec![0.0f64; k * k];
    let mut marg_i = vec![0.0f64; k];
    let mut marg_j = vec![0.0f64; k];
    let mut total = 0.0;

    for ((&a, &b), &w) in col_i.iter().zip(col_j.iter()).zip(weights.iter()) {
        if a == NOT_IN_ALPHABET || b == NOT_IN_ALPHABET {
            continue;
        }
        let (a, b) = (a as usize, b as usize);
        joint[a * k + b] += w;
        marg_i[a] += w;
        marg_j[b] += w;
        total += w;
    }

    if total <= 0.0 {
        return 0.0;
    }

    let norm = total + pseudocount;
    let pc_marg = pseudocount / k as f64;
    let pc_joint = pseudocount / (k * k) as f64;

    let mut mi = 0.0;
    for a in 0..k {
        let p_a = (marg_i[a] + pc_marg) / norm;
        if p_a <= PROB_FLOOR {
            continue;
        }
        for b in 0..k {
            let p_b = (marg_j[b] + pc_marg) / norm;
            let p_ab = (joint[a * k + b] + pc_joint) / norm;
            if p_b <= PROB_FLOOR || p_ab <= PROB_FLOOR {
                continue;
            }
            mi += p_ab * (p_ab / (p_a * p_b)).log2();
        }
    }

    mi
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pool() -> WorkerPool {
        WorkerPool::new(Some(2)).unwrap()
    }

    fn uniform(n: usize) -> Vec<f64> {
        vec![1.0 / n as f64; n]
    }

    #[test]
    fn test_alphabet() {
        let alphabet = Alphabet::rna();
        assert_eq!(alphabet.size(), 7);
        assert_eq!(alphabet.index_of(b'A'), Some(0));
        assert_eq!(alphabet.index_of(b'-'), Some(6));
        assert_eq!(alphabet.index_of(b'X'), None);

        let acgu = Alphabet::new(b"acgu").unwrap();
        assert_eq!(acgu.symbols(), b"ACGU");
        assert_eq!(acgu.index_of(b'N'), None);

        assert!(Alphabet::new(b"AA").is_err());
        assert!(Alphabet::new(b"").is_err());
    }

    #[test]
    fn test_pseudocount_rule() {
        assert_eq!(Pseudocount::Adaptive.resolve(20), 0.5);
        assert_eq!(Pseudocount::Adaptive.resolve(60), 0.2);
        assert_eq!(Pseudocount::Adaptive.resolve(5000), 0.0);
        assert_eq!(Pseudocount::Fixed(0.5).resolve(20), 0.5);
        assert_eq!(Pseudocount::Fixed(0.0).resolve(20), 0.0);
        assert_eq!(Pseudocount::from_option(None), Pseudocount::Adaptive);
        assert!(Pseudocount::Fixed(-0.1).validate().is_err());
        assert!(Pseudocount::Fixed(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_perfect_correlation() {
        // Columns 0 and 1 carry the same four symbols, column 2 is constant
        let aln = Alignment::from_seqs(&["AAC", "CCC", "GGC", "UUC"]).unwrap();
        let est = MiEstimator::default();
        let mi = est.estimate(&aln, &uniform(4), 0.0, &pool()).unwrap();

        assert!(!mi.single_sequence);
        assert_relative_eq!(mi.matrix[(0, 1)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(mi.matrix[(0, 2)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(mi.matrix[(1, 2)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_independent_columns() {
        let aln = Alignment::from_seqs(&["AA", "AC", "CA", "CC"]).unwrap();
        let mi = MiEstimator::default()
            .estimate(&aln, &uniform(4), 0.0, &pool())
            .unwrap();
        assert_relative_eq!(mi.matrix[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_symmetry_and_diagonal() {
        let aln = Alignment::from_seqs(&[
            "ACGU-ACGUN",
            "AGGUUACCUA",
            "UCGA-ACGAC",
            "ACCUUGCGUA",
            "GCGUAACG-A",
        ])
        .unwrap();
        let weights = vec![0.1, 0.2, 0.3, 0.25, 0.15];
        for pc in [0.0, 0.5] {
            let mi = MiEstimator::default()
                .estimate(&aln, &weights, pc, &pool())
                .unwrap();
            let m = &mi.matrix;
            for i in 0..m.nrows() {
                assert_eq!(m[(i, i)], 0.0);
                for j in 0..m.ncols() {
                    assert_eq!(m[(i, j)], m[(j, i)]);
                    assert!(m[(i, j)].is_finite());
                    assert!(m[(i, j)] > -1e-12);
                }
            }
        }
    }

    #[test]
    fn test_single_sequence() {
        let aln = Alignment::from_seqs(&["ACGUACGU"; 5]).unwrap();
        let mi = MiEstimator::default()
            .estimate(&aln, &uniform(5), 0.5, &pool())
            .unwrap();

        assert!(mi.single_sequence);
        assert_eq!(mi.matrix.nrows(), 8);
        assert!(mi.matrix.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_pseudocount_shrinks() {
        let aln = Alignment::from_seqs(&["AAC", "CCC", "GGC", "UUC"]).unwrap();
        let est = MiEstimator::default();
        let raw = est.estimate(&aln, &uniform(4), 0.0, &pool()).unwrap();
        let smooth = est.estimate(&aln, &uniform(4), 0.5, &pool()).unwrap();

        assert!(smooth.matrix[(0, 1)] > 0.0);
        assert!(smooth.matrix[(0, 1)] < raw.matrix[(0, 1)]);
    }

    #[test]
    fn test_subset_alphabet_skips_rows() {
        // Row 4 has N at column 0 and is ignored under ACGU
        let aln = Alignment::from_seqs(&["AA", "CC", "GG", "UU", "NA"]).unwrap();
        let est = MiEstimator::new(Alphabet::new(b"ACGU").unwrap(), Weighting::Uniform);
        let mi = est.estimate(&aln, &[], 0.0, &pool()).unwrap();
        assert_relative_eq!(mi.matrix[(0, 1)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_weights_matter() {
        let aln = Alignment::from_seqs(&["AA", "AA", "AA", "CC", "CA"]).unwrap();
        let est = MiEstimator::default();
        let flat = est.estimate(&aln, &uniform(5), 0.0, &pool()).unwrap();
        let skewed = est
            .estimate(&aln, &[0.1, 0.1, 0.1, 0.35, 0.35], 0.0, &pool())
            .unwrap();
        assert!((flat.matrix[(0, 1)] - skewed.matrix[(0, 1)]).abs() > 1e-6);

        let uniform_est = MiEstimator::new(Alphabet::rna(), Weighting::Uniform);
        let ignored = uniform_est
            .estimate(&aln, &[0.1, 0.1, 0.1, 0.35, 0.35], 0.0, &pool())
            .unwrap();
        assert_relative_eq!(ignored.matrix[(0, 1)], flat.matrix[(0, 1)], epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_input() {
        let aln = Alignment::from_seqs(&["AC", "CA"]).unwrap();
        let est = MiEstimator::default();
        assert!(est.estimate(&aln, &[1.0], 0.0, &pool()).is_err());
        assert!(est.estimate(&aln, &uniform(2), -1.0, &pool()).is_err());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let aln = Alignment::from_seqs(&[
            "ACGUACGUACGU",
            "AGGUACCUACGA",
            "ACGAACGUUCGU",
            "UCGUACGAACGC",
            "GCGUUCGAACGU",
        ])
        .unwrap();
        let est = MiEstimator::default();
        let a = est
            .estimate(&aln, &uniform(5), 0.2, &WorkerPool::serial().unwrap())
            .unwrap();
        let b = est
            .estimate(&aln, &uniform(5), 0.2, &WorkerPool::new(Some(4)).unwrap())
            .unwrap();
        assert_eq!(a.matrix, b.matrix);
    }
}
