use crate::libs::chunk::ChunkParams;
use crate::libs::error::MiError;
use crate::libs::filter::FilterParams;
use crate::libs::mi::{Pseudocount, Weighting};
use std::str::FromStr;
use std::time::Duration;

/// Every tunable of the coupling pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct MiConfig {
    // chunking
    pub max_length: usize,
    pub chunk_size: usize,
    pub overlap: usize,

    // filtering
    pub gap_threshold: f64,
    pub identity_threshold: f64,
    pub max_sequences: usize,
    /// Conservation window reported in the features; positions are not dropped
    pub conservation_range: (f64, f64),

    // estimation
    /// `None` picks a value from the sequence count
    pub pseudocount: Option<f64>,
    pub weighting: Weighting,

    // execution
    /// Worker threads, `None` for cores - 1
    pub n_jobs: Option<usize>,
    /// Rows per identity-weighting batch
    pub batch_size: usize,
    /// Records read from the input file at most
    pub max_input: usize,
    pub timeout: Option<Duration>,
}

impl Default for MiConfig {
    fn default() -> Self {
        MiConfig {
            max_length: 750,
            chunk_size: 600,
            overlap: 200,
            gap_threshold: 0.5,
            identity_threshold: 0.8,
            max_sequences: 5000,
            conservation_range: (0.2, 0.95),
            pseudocount: None,
            weighting: Weighting::Sequence,
            n_jobs: None,
            batch_size: 500,
            max_input: 10000,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareProfile {
    /// 8-16 cores, 32-64GB RAM
    #[default]
    Standard,
    /// 4 cores, 16GB RAM
    Limited,
    /// 32+ cores, 128GB+ RAM
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthProfile {
    /// Below 300 nt
    Short,
    /// 300-750 nt
    #[default]
    Medium,
    /// 750-1500 nt
    Long,
    /// Above 1500 nt
    VeryLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityProfile {
    /// Many diverse sequences
    High,
    #[default]
    Medium,
    /// Few or highly similar sequences
    Low,
}

impl FromStr for HardwareProfile {
    type Err = MiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(HardwareProfile::Standard),
            "limited" => Ok(HardwareProfile::Limited),
            "high" => Ok(HardwareProfile::High),
            _ => Err(MiError::InvalidParams(format!(
                "unknown hardware profile: {}",
                s
            ))),
        }
    }
}

impl FromStr for LengthProfile {
    type Err = MiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(LengthProfile::Short),
            "medium" => Ok(LengthProfile::Medium),
            "long" => Ok(LengthProfile::Long),
            "very-long" | "very_long" => Ok(LengthProfile::VeryLong),
            _ => Err(MiError::InvalidParams(format!(
                "unknown length profile: {}",
                s
            ))),
        }
    }
}

impl FromStr for QualityProfile {
    type Err = MiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(QualityProfile::High),
            "medium" => Ok(QualityProfile::Medium),
            "low" => Ok(QualityProfile::Low),
            _ => Err(MiError::InvalidParams(format!(
                "unknown quality profile: {}",
                s
            ))),
        }
    }
}

impl LengthProfile {
    /// Profile matching an alignment length.
    pub fn for_length(seq_len: usize) -> Self {
        match seq_len {
            0..=299 => LengthProfile::Short,
            300..=750 => LengthProfile::Medium,
            751..=1500 => LengthProfile::Long,
            _ => LengthProfile::VeryLong,
        }
    }
}

impl MiConfig {
    /// Applies the three profiles over the defaults, in order. Later profiles
    /// win where they overlap (`max_sequences`).
    pub fn from_profiles(hw: HardwareProfile, len: LengthProfile, quality: QualityProfile) -> Self {
        let mut cfg = MiConfig::default();

        match hw {
            HardwareProfile::Standard => {
                cfg.n_jobs = Some(8);
                cfg.batch_size = 5000;
                cfg.max_sequences = 10000;
            }
            HardwareProfile::Limited => {
                cfg.n_jobs = Some(3);
                cfg.batch_size = 1000;
                cfg.max_sequences = 3000;
                cfg.chunk_size = 500;
            }
            HardwareProfile::High => {
                cfg.n_jobs = Some(24);
                cfg.batch_size = 10000;
                cfg.max_sequences = 20000;
            }
        }

        // Short keeps the chunk settings of the earlier layers
        match len {
            LengthProfile::Short => {
                cfg.max_length = 300;
            }
            LengthProfile::Medium => {
                cfg.max_length = 750;
                cfg.chunk_size = 600;
                cfg.overlap = 150;
            }
            LengthProfile::Long => {
                cfg.max_length = 750;
                cfg.chunk_size = 600;
                cfg.overlap = 200;
            }
            LengthProfile::VeryLong => {
                cfg.max_length = 750;
                cfg.chunk_size = 500;
                cfg.overlap = 250;
            }
        }

        match quality {
            QualityProfile::High => {
                cfg.gap_threshold = 0.4;
                cfg.identity_threshold = 0.85;
                cfg.max_sequences = 10000;
                cfg.conservation_range = (0.3, 0.9);
                cfg.pseudocount = Some(0.2);
            }
            QualityProfile::Medium => {
                cfg.gap_threshold = 0.5;
                cfg.identity_threshold = 0.8;
                cfg.max_sequences = 5000;
                cfg.conservation_range = (0.2, 0.95);
                cfg.pseudocount = Some(0.5);
            }
            QualityProfile::Low => {
                cfg.gap_threshold = 0.6;
                cfg.identity_threshold = 0.7;
                cfg.max_sequences = 1000;
                cfg.conservation_range = (0.1, 0.99);
                cfg.pseudocount = Some(0.8);
            }
        }

        cfg
    }

    /// Starts from the limited-hardware profile and shrinks `max_sequences`,
    /// `batch_size` and the chunk size to fit `available_gb`.
    ///
    /// The estimate is `3 × (8·L² + L·N)` bytes.
    pub fn memory_optimized(available_gb: f64, seq_len: usize, n_seqs: usize) -> Self {
        let mut cfg = MiConfig::from_profiles(
            HardwareProfile::Limited,
            LengthProfile::Medium,
            QualityProfile::Medium,
        );

        let mb = 1024.0 * 1024.0;
        let matrix_mb = 8.0 * (seq_len as f64).powi(2) / mb;
        let seq_mb = (seq_len * n_seqs) as f64 / mb;
        let estimated_mb = (matrix_mb + seq_mb) * 3.0;
        let available_mb = available_gb * 1024.0;

        if estimated_mb > available_mb * 0.8 {
            let safe = (n_seqs as f64 * available_mb * 0.8 / estimated_mb) as usize;
            cfg.max_sequences = cfg.max_sequences.min(safe.max(1000));
        }

        let memory_factor = (available_mb / 16384.0).min(1.0);
        cfg.batch_size = ((cfg.batch_size as f64 * memory_factor) as usize).max(1000);

        if seq_len > 1000 {
            let chunk_factor = (available_mb / 32768.0).min(1.0);
            cfg.chunk_size = ((cfg.chunk_size as f64 * chunk_factor) as usize).max(400);
            cfg.overlap = ((cfg.chunk_size as f64 * 0.33) as usize).max(150);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), MiError> {
        self.filter_params().validate()?;
        self.chunk_params().validate()?;
        self.pseudocount_rule().validate()?;

        let (lo, hi) = self.conservation_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(MiError::InvalidParams(format!(
                "conservation_range must satisfy 0 <= min <= max <= 1, got ({}, {})",
                lo, hi
            )));
        }
        if self.n_jobs == Some(0) {
            return Err(MiError::InvalidParams(
                "n_jobs must be positive".to_string(),
            ));
        }
        if self.max_input == 0 {
            return Err(MiError::InvalidParams(
                "max_input must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            gap_threshold: self.gap_threshold,
            identity_threshold: self.identity_threshold,
            max_sequences: self.max_sequences,
            batch_size: self.batch_size,
        }
    }

    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            max_length: self.max_length,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }

    pub fn pseudocount_rule(&self) -> Pseudocount {
        Pseudocount::from_option(self.pseudocount)
    }
}
