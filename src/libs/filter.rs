use crate::libs::error::MiError;
use crate::libs::msa::{Alignment, GAP};
use crate::libs::pool::WorkerPool;
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Maximum gap fraction allowed for a sequence and for a column
    pub gap_threshold: f64,
    /// Pairwise identity above which two sequences count as redundant
    pub identity_threshold: f64,
    /// Sequences kept after weighting, most unique first
    pub max_sequences: usize,
    /// Rows compared against the whole alignment at once
    pub batch_size: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            gap_threshold: 0.5,
            identity_threshold: 0.8,
            max_sequences: 5000,
            batch_size: 500,
        }
    }
}

impl FilterParams {
    pub fn validate(&self) -> Result<(), MiError> {
        if !(0.0..=1.0).contains(&self.gap_threshold) {
            return Err(MiError::InvalidParams(format!(
                "gap_threshold must be in [0, 1], got {}",
                self.gap_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.identity_threshold) {
            return Err(MiError::InvalidParams(format!(
                "identity_threshold must be in [0, 1], got {}",
                self.identity_threshold
            )));
        }
        if self.max_sequences == 0 {
            return Err(MiError::InvalidParams(
                "max_sequences must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(MiError::InvalidParams(
                "batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A gap-filtered, weighted alignment.
#[derive(Debug, Clone)]
pub struct FilteredAlignment {
    pub alignment: Alignment,
    /// One weight per row of `alignment`, summing to 1
    pub weights: Vec<f64>,
    /// Row indices into the input alignment, in output order
    pub kept_rows: Vec<usize>,
    /// Column indices into the input alignment
    pub kept_columns: Vec<usize>,
    /// Weights fell back to `1/n`
    pub uniform_weights: bool,
}

impl FilteredAlignment {
    /// Wraps an alignment without filtering, with uniform weights.
    pub fn unfiltered(alignment: Alignment) -> Self {
        let n = alignment.len();
        FilteredAlignment {
            kept_rows: (0..n).collect(),
            kept_columns: (0..alignment.seq_len()).collect(),
            weights: vec![1.0 / n.max(1) as f64; n],
            alignment,
            uniform_weights: true,
        }
    }

    pub fn effective_sequences(&self) -> f64 {
        effective_sequences(&self.weights)
    }
}

/// Drops gappy rows and columns, weights the rest by redundancy and keeps
/// the `max_sequences` most unique sequences.
pub fn filter_alignment(
    aln: &Alignment,
    params: &FilterParams,
    pool: &WorkerPool,
) -> Result<FilteredAlignment, MiError> {
    params.validate()?;
    if aln.is_empty() {
        return Err(MiError::EmptyAlignment);
    }
    log::info!("Starting MSA filtering with {} sequences", aln.len());

    // Step 1: rows
    let rows: Vec<usize> = (0..aln.len())
        .filter(|&i| aln.row_gap_fraction(i) <= params.gap_threshold)
        .collect();
    log::info!(
        "After sequence gap filtering: {}/{} sequences",
        rows.len(),
        aln.len()
    );
    if rows.is_empty() {
        return Err(MiError::NoSequences {
            gap_threshold: params.gap_threshold,
        });
    }
    let row_filtered = aln.select_rows(&rows);

    // Step 2: columns, over surviving rows
    let columns: Vec<usize> = (0..row_filtered.seq_len())
        .filter(|&j| row_filtered.column_gap_fraction(j) <= params.gap_threshold)
        .collect();
    log::info!(
        "After column filtering: {}/{} positions retained",
        columns.len(),
        row_filtered.seq_len()
    );
    if columns.is_empty() {
        return Err(MiError::NoColumns {
            gap_threshold: params.gap_threshold,
        });
    }
    let col_filtered = row_filtered.select_columns(&columns);

    // Step 3: redundancy weights
    let (weights, uniform) = sequence_weights(
        col_filtered.seqs(),
        params.identity_threshold,
        params.batch_size,
        pool,
    );

    // Step 4: most unique first; the sort is stable so ties keep input order
    let mut order: Vec<usize> = (0..col_filtered.len()).collect();
    order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));
    order.truncate(params.max_sequences);

    let alignment = col_filtered.select_rows(&order);
    let mut kept_weights: Vec<f64> = order.iter().map(|&i| weights[i]).collect();
    let uniform_weights = normalize(&mut kept_weights) || uniform;
    let kept_rows = order.iter().map(|&i| rows[i]).collect();

    log::info!(
        "After diversity filtering: {} sequences (effective {:.1})",
        alignment.len(),
        effective_sequences(&kept_weights)
    );

    Ok(FilteredAlignment {
        alignment,
        weights: kept_weights,
        kept_rows,
        kept_columns: columns,
        uniform_weights,
    })
}

/// Identity over positions where neither sequence has a gap.
///
/// Returns `None` when the two sequences share no such position.
///
/// ```
/// use rnaec::libs::filter::pairwise_identity;
/// assert_eq!(pairwise_identity(b"ACGU", b"ACGA"), Some(0.75));
/// assert_eq!(pairwise_identity(b"AC--", b"ACGU"), Some(1.0));
/// assert_eq!(pairwise_identity(b"--", b"AC"), None);
/// ```
pub fn pairwise_identity(a: &[u8], b: &[u8]) -> Option<f64> {
    let mut matches = 0usize;
    let mut non_gaps = 0usize;
    for (&x, &y) in a.iter().zip(b.iter()) {
        if x != GAP && y != GAP {
            non_gaps += 1;
            if x == y {
                matches += 1;
            }
        }
    }

    if non_gaps == 0 {
        None
    } else {
        Some(matches as f64 / non_gaps as f64)
    }
}

/// Weights each sequence by `1 / (similar + 1)`, where `similar` counts the
/// other sequences above `identity_threshold`, then normalises to sum 1.
///
/// Rows are processed `batch_size` at a time, each row of a batch compared
/// against the whole alignment, so at most one batch of counts is in flight.
/// The returned flag is set when the uniform fallback was used.
pub fn sequence_weights(
    seqs: &[Vec<u8>],
    identity_threshold: f64,
    batch_size: usize,
    pool: &WorkerPool,
) -> (Vec<f64>, bool) {
    let n = seqs.len();
    if n == 0 {
        return (vec![], false);
    }

    let mut weights = vec![1.0; n];
    let batch_size = batch_size.max(1);
    for start in (0..n).step_by(batch_size) {
        let end = (start + batch_size).min(n);
        let counts: Vec<usize> = pool.install(|| {
            (start..end)
                .into_par_iter()
                .map(|i| similar_count(seqs, i, identity_threshold))
                .collect()
        });
        for (offset, count) in counts.into_iter().enumerate() {
            weights[start + offset] = 1.0 / (count as f64 + 1.0);
        }
    }

    let uniform = normalize(&mut weights);
    log::info!(
        "Calculated sequence weights (effective number of sequences: {:.1})",
        effective_sequences(&weights)
    );
    (weights, uniform)
}

fn similar_count(seqs: &[Vec<u8>], i: usize, identity_threshold: f64) -> usize {
    seqs.iter()
        .enumerate()
        .filter(|&(j, other)| {
            j != i
                && pairwise_identity(&seqs[i], other)
                    .map(|id| id > identity_threshold)
                    .unwrap_or(false)
        })
        .count()
}

/// Scales to sum 1. Falls back to uniform weights, returning `true`, when
/// the sum is not positive.
fn normalize(weights: &mut [f64]) -> bool {
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        weights.iter_mut().for_each(|w| *w /= total);
        false
    } else {
        if !weights.is_empty() {
            log::warn!("All sequence weights are zero, using uniform weights");
            let uniform = 1.0 / weights.len() as f64;
            weights.iter_mut().for_each(|w| *w = uniform);
        }
        true
    }
}

/// `1 / Σw²` for normalised weights.
pub fn effective_sequences(weights: &[f64]) -> f64 {
    let sq: f64 = weights.iter().map(|w| w * w).sum();
    if sq > 0.0 {
        1.0 / sq
    } else {
        0.0
    }
}

/// Weighted frequency of the most common symbol in each column.
pub fn column_conservation(aln: &Alignment, weights: &[f64]) -> Vec<f64> {
    (0..aln.seq_len())
        .map(|j| {
            let mut freq = [0.0f64; 256];
            for (seq, w) in aln.seqs().iter().zip(weights.iter()) {
                freq[seq[j] as usize] += w;
            }
            freq.iter().cloned().fold(0.0, f64::max)
        })
        .collect()
}

/// Positions whose conservation lies inside the inclusive `range`.
pub fn conserved_positions(conservation: &[f64], range: (f64, f64)) -> usize {
    conservation
        .iter()
        .filter(|&&c| c >= range.0 && c <= range.1)
        .count()
}
