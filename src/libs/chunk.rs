use crate::libs::apc::{ApcCorrector, Corrected};
use crate::libs::error::MiError;
use crate::libs::mi::{MiEstimator, MiMatrix};
use crate::libs::msa::Alignment;
use crate::libs::pool::WorkerPool;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// A half-open column window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkParams {
    /// Longest alignment processed in one piece
    pub max_length: usize,
    pub chunk_size: usize,
    /// Columns shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        ChunkParams {
            max_length: 750,
            chunk_size: 600,
            overlap: 200,
        }
    }
}

impl ChunkParams {
    pub fn validate(&self) -> Result<(), MiError> {
        if self.chunk_size == 0 {
            return Err(MiError::InvalidParams(
                "chunk_size must be positive".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(MiError::InvalidParams(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Windows of `chunk_size` columns stepping by `chunk_size - overlap`; the
/// last window ends at `seq_len`.
///
/// ```
/// use rnaec::libs::chunk::{plan_chunks, Chunk};
/// let chunks = plan_chunks(1000, 600, 200);
/// assert_eq!(chunks, vec![Chunk { start: 0, end: 600 }, Chunk { start: 400, end: 1000 }]);
/// ```
pub fn plan_chunks(seq_len: usize, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = vec![];
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(seq_len);
        chunks.push(Chunk { start, end });
        if end >= seq_len {
            break;
        }
        start += step;
    }
    chunks
}

/// Blend weight of local position `local` in a window of `width` columns.
///
/// Ramps linearly from 0 to 1 over the first and last `overlap` columns. The
/// left edge of the first window and the right edge of the last window have
/// no neighbour to blend with and keep weight 1.
pub fn edge_weight(local: usize, width: usize, overlap: usize, is_first: bool, is_last: bool) -> f64 {
    if overlap == 0 {
        return 1.0;
    }
    if !is_first && local < overlap {
        local as f64 / overlap as f64
    } else if !is_last && local + overlap >= width {
        (width - local) as f64 / overlap as f64
    } else {
        1.0
    }
}

/// Result of the orchestrator: either one pass over the whole alignment, or
/// blended windows.
#[derive(Debug, Clone)]
pub enum Coupling {
    Direct {
        mi: MiMatrix,
        corrected: Corrected,
    },
    Chunked {
        /// Weighted average of the window matrices
        blended: DMatrix<f64>,
        /// `blended` after the full correction over all columns
        matrix: DMatrix<f64>,
        chunks: Vec<Chunk>,
        /// Windows whose rows were all identical
        single_sequence_chunks: usize,
        apc_skipped: bool,
    },
}

impl Coupling {
    /// The final coupling matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        match self {
            Coupling::Direct { corrected, .. } => &corrected.matrix,
            Coupling::Chunked { matrix, .. } => matrix,
        }
    }

    pub fn into_matrix(self) -> DMatrix<f64> {
        match self {
            Coupling::Direct { corrected, .. } => corrected.matrix,
            Coupling::Chunked { matrix, .. } => matrix,
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, Coupling::Chunked { .. })
    }

    pub fn chunks(&self) -> Option<&[Chunk]> {
        match self {
            Coupling::Direct { .. } => None,
            Coupling::Chunked { chunks, .. } => Some(chunks),
        }
    }

    /// Every window (or the whole alignment) held a single distinct sequence.
    pub fn single_sequence(&self) -> bool {
        match self {
            Coupling::Direct { mi, .. } => mi.single_sequence,
            Coupling::Chunked {
                chunks,
                single_sequence_chunks,
                ..
            } => *single_sequence_chunks == chunks.len(),
        }
    }

    pub fn apc_skipped(&self) -> bool {
        match self {
            Coupling::Direct { corrected, .. } => corrected.apc_skipped,
            Coupling::Chunked { apc_skipped, .. } => *apc_skipped,
        }
    }
}

/// Chooses between the direct and the chunked path and runs the estimator
/// and the corrector on each piece.
#[derive(Debug, Clone, Default)]
pub struct ChunkingOrchestrator {
    params: ChunkParams,
    estimator: MiEstimator,
    corrector: ApcCorrector,
}

struct ChunkResult {
    chunk: Chunk,
    matrix: DMatrix<f64>,
    single_sequence: bool,
}

impl ChunkingOrchestrator {
    pub fn new(
        params: ChunkParams,
        estimator: MiEstimator,
        corrector: ApcCorrector,
    ) -> Result<Self, MiError> {
        params.validate()?;
        Ok(ChunkingOrchestrator {
            params,
            estimator,
            corrector,
        })
    }

    pub fn params(&self) -> &ChunkParams {
        &self.params
    }

    pub fn process(
        &self,
        aln: &Alignment,
        weights: &[f64],
        pseudocount: f64,
        pool: &WorkerPool,
    ) -> Result<Coupling, MiError> {
        if aln.seq_len() <= self.params.max_length {
            log::info!(
                "Sequence length {} <= {}, no chunking needed",
                aln.seq_len(),
                self.params.max_length
            );
            self.process_direct(aln, weights, pseudocount, pool)
        } else {
            self.process_chunked(aln, weights, pseudocount, pool)
        }
    }

    pub fn process_direct(
        &self,
        aln: &Alignment,
        weights: &[f64],
        pseudocount: f64,
        pool: &WorkerPool,
    ) -> Result<Coupling, MiError> {
        let mi = self.estimator.estimate(aln, weights, pseudocount, pool)?;
        let corrected = self.corrector.correct(&mi.matrix);
        Ok(Coupling::Direct { mi, corrected })
    }

    /// Runs every window regardless of `max_length`.
    pub fn process_chunked(
        &self,
        aln: &Alignment,
        weights: &[f64],
        pseudocount: f64,
        pool: &WorkerPool,
    ) -> Result<Coupling, MiError> {
        let seq_len = aln.seq_len();
        let chunks = plan_chunks(seq_len, self.params.chunk_size, self.params.overlap);
        log::info!(
            "Created {} chunks for sequence length {}",
            chunks.len(),
            seq_len
        );

        let results: Vec<ChunkResult> = pool.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(idx, chunk)| {
                    log::debug!(
                        "Processing chunk {}/{} (positions {}-{})",
                        idx + 1,
                        chunks.len(),
                        chunk.start,
                        chunk.end
                    );
                    let sub = aln.slice_columns(chunk.start, chunk.end);
                    let mi = self.estimator.estimate(&sub, weights, pseudocount, pool)?;
                    let corrected = self.corrector.correct(&mi.matrix);
                    Ok(ChunkResult {
                        chunk: *chunk,
                        matrix: corrected.matrix,
                        single_sequence: mi.single_sequence,
                    })
                })
                .collect::<Result<Vec<_>, MiError>>()
        })?;

        // Window corrections only saw window-local means
        let blended = recombine(&results, seq_len, self.params.overlap);
        let Corrected {
            matrix,
            apc_skipped,
        } = self.corrector.correct(&blended);
        let single_sequence_chunks = results.iter().filter(|r| r.single_sequence).count();

        Ok(Coupling::Chunked {
            blended,
            matrix,
            chunks,
            single_sequence_chunks,
            apc_skipped,
        })
    }
}

/// Weighted average of window matrices projected onto global coordinates.
///
/// Cells no window covers stay zero.
fn recombine(results: &[ChunkResult], seq_len: usize, overlap: usize) -> DMatrix<f64> {
    let mut sum = DMatrix::<f64>::zeros(seq_len, seq_len);
    let mut weight = DMatrix::<f64>::zeros(seq_len, seq_len);

    let n_chunks = results.len();
    for (idx, result) in results.iter().enumerate() {
        let chunk = result.chunk;
        let width = chunk.width();
        let edge: Vec<f64> = (0..width)
            .map(|local| edge_weight(local, width, overlap, idx == 0, idx + 1 == n_chunks))
            .collect();

        for i in 0..width {
            for j in 0..width {
                let w = edge[i] * edge[j];
                if w > 0.0 {
                    let (gi, gj) = (chunk.start + i, chunk.start + j);
                    sum[(gi, gj)] += result.matrix[(i, j)] * w;
                    weight[(gi, gj)] += w;
                }
            }
        }
    }

    sum.zip_map(&weight, |s: f64, w: f64| if w > 0.0 { s / w } else { 0.0 })
}
