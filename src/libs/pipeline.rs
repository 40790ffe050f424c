use crate::libs::apc::ApcCorrector;
use crate::libs::chunk::{ChunkingOrchestrator, Coupling};
use crate::libs::config::MiConfig;
use crate::libs::error::MiError;
use crate::libs::features::*;
use crate::libs::filter::{
    column_conservation, conserved_positions, filter_alignment, FilteredAlignment,
};
use crate::libs::mi::{Alphabet, MiEstimator, Weighting};
use crate::libs::msa::{load_path, Alignment, LoadOptions};
use crate::libs::pairs::{extract, PairFilter, TOP_PAIRS};
use crate::libs::pool::WorkerPool;
use std::time::{Duration, Instant};

/// Time budget of one alignment, checked between stages.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    limit: Duration,
}

impl Deadline {
    /// Starts counting now.
    pub fn new(limit: Duration) -> Self {
        Deadline {
            start: Instant::now(),
            limit,
        }
    }

    /// Time left for the loader.
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.start.elapsed())
    }

    pub fn check(&self, stage: &'static str) -> Result<(), MiError> {
        let elapsed = self.start.elapsed();
        if elapsed >= self.limit {
            return Err(MiError::Timeout {
                stage,
                seconds: elapsed.as_secs_f64(),
            });
        }
        Ok(())
    }
}

/// Filter, estimate, correct and rank one alignment at a time.
///
/// A `Pipeline` owns its worker pool and can be shared between threads.
pub struct Pipeline {
    config: MiConfig,
    pool: WorkerPool,
    orchestrator: ChunkingOrchestrator,
}

impl Pipeline {
    pub fn new(config: MiConfig) -> Result<Self, MiError> {
        config.validate()?;
        let pool = WorkerPool::new(config.n_jobs)?;
        let estimator = MiEstimator::new(Alphabet::rna(), config.weighting);
        let orchestrator =
            ChunkingOrchestrator::new(config.chunk_params(), estimator, ApcCorrector::default())?;

        Ok(Pipeline {
            config,
            pool,
            orchestrator,
        })
    }

    pub fn config(&self) -> &MiConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Gap filtering and redundancy weighting only.
    pub fn filter(&self, aln: &Alignment) -> Result<FilteredAlignment, MiError> {
        filter_alignment(aln, &self.config.filter_params(), &self.pool)
    }

    pub fn run(&self, aln: &Alignment) -> Result<CouplingFeatures, MiError> {
        self.run_with_deadline(aln, None)
    }

    /// [`Pipeline::run`] that gives up with [`MiError::Timeout`] once
    /// `deadline` has passed after filtering or after coupling.
    pub fn run_with_deadline(
        &self,
        aln: &Alignment,
        deadline: Option<&Deadline>,
    ) -> Result<CouplingFeatures, MiError> {
        let filtered = self.filter(aln)?;
        if let Some(deadline) = deadline {
            deadline.check("filtering")?;
        }

        let rule = self.config.pseudocount_rule();
        let pseudocount = rule.resolve(filtered.alignment.len());
        log::info!(
            "Using pseudocount {} ({})",
            pseudocount,
            if rule.is_adaptive() {
                "adaptive"
            } else {
                "fixed"
            }
        );

        let coupling = self.orchestrator.process(
            &filtered.alignment,
            &filtered.weights,
            pseudocount,
            &self.pool,
        )?;
        if let Some(deadline) = deadline {
            deadline.check("coupling")?;
        }

        let top_pairs = extract(coupling.matrix(), TOP_PAIRS, PairFilter::Positive);
        let conservation = column_conservation(&filtered.alignment, &filtered.weights);

        let chunking = match &coupling {
            Coupling::Direct { .. } => None,
            Coupling::Chunked {
                chunks,
                single_sequence_chunks,
                ..
            } => Some(ChunkingInfo {
                num_chunks: chunks.len(),
                chunk_size: self.config.chunk_size,
                overlap: self.config.overlap,
                windows: chunks.iter().map(|c| (c.start, c.end)).collect(),
                single_sequence_chunks: *single_sequence_chunks,
            }),
        };

        let params = EffectiveParams {
            pseudocount,
            gap_threshold: self.config.gap_threshold,
            identity_threshold: self.config.identity_threshold,
            max_sequences: self.config.max_sequences,
            max_length: self.config.max_length,
            conservation_range: self.config.conservation_range,
            alphabet_size: Alphabet::rna().size(),
            weighting: match self.config.weighting {
                Weighting::Sequence => "sequence".to_string(),
                Weighting::Uniform => "uniform".to_string(),
            },
        };

        Ok(CouplingFeatures {
            method: if coupling.is_chunked() {
                Method::Chunked
            } else {
                Method::Direct
            },
            pseudocount_source: if rule.is_adaptive() {
                PseudocountSource::Adaptive
            } else {
                PseudocountSource::Fixed
            },
            single_sequence: coupling.single_sequence(),
            apc_skipped: coupling.apc_skipped(),
            top_pairs,
            params,
            chunking,
            source: None,
            sequence_count: filtered.alignment.len(),
            sequence_length: filtered.alignment.seq_len(),
            effective_sequences: filtered.effective_sequences(),
            conserved_positions: conserved_positions(
                &conservation,
                self.config.conservation_range,
            ),
            uniform_weights: filtered.uniform_weights,
            coupling_matrix: coupling.into_matrix(),
        })
    }

    /// Loads `input` (path, `.gz` or `stdin`) and runs it. The configured
    /// timeout covers loading and every later stage.
    pub fn run_path(&self, input: &str) -> Result<CouplingFeatures, MiError> {
        let deadline = self.config.timeout.map(Deadline::new);
        let opt = LoadOptions {
            max_sequences: self.config.max_input,
            timeout: deadline.as_ref().map(|d| d.remaining()),
        };
        let (aln, _) = load_path(input, &opt)?;
        let mut features = self.run_with_deadline(&aln, deadline.as_ref())?;
        features.source = Some(input.to_string());
        Ok(features)
    }
}
