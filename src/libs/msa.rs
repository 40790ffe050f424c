use crate::libs::error::MiError;
use std::collections::HashSet;
use std::io::BufRead;
use std::time::{Duration, Instant};

/// Gap symbol after normalisation.
pub const GAP: u8 = b'-';

/// Symbols an alignment may hold after loading.
pub const RNA_SYMBOLS: &[u8] = b"ACGUTN-";

/// Maps a raw byte onto the alignment alphabet.
///
/// Letters are upper-cased, `.` becomes a gap and any other byte (IUPAC
/// ambiguity codes, `*`, digits) becomes `N`.
///
/// ```
/// use rnaec::libs::msa::normalize_symbol;
/// assert_eq!(normalize_symbol(b'a'), b'A');
/// assert_eq!(normalize_symbol(b'u'), b'U');
/// assert_eq!(normalize_symbol(b'.'), b'-');
/// assert_eq!(normalize_symbol(b'R'), b'N');
/// ```
pub fn normalize_symbol(b: u8) -> u8 {
    match b.to_ascii_uppercase() {
        b @ (b'A' | b'C' | b'G' | b'U' | b'T' | b'N' | b'-') => b,
        b'.' => GAP,
        _ => b'N',
    }
}

/// An ordered set of equal-length aligned sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    names: Vec<String>,
    seqs: Vec<Vec<u8>>,
}

/// What happened while loading; the alignment itself carries no history.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Records seen, including dropped ones
    pub read: usize,
    /// Records kept in the alignment
    pub kept: usize,
    /// Records dropped because their length differed from the first one
    pub length_mismatch: usize,
    /// Records dropped because they were empty
    pub empty: usize,
    /// Input stopped early at `max_sequences`
    pub truncated: bool,
    /// Input stopped early at the deadline
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub max_sequences: usize,
    pub timeout: Option<Duration>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            max_sequences: 10_000,
            timeout: None,
        }
    }
}

impl Alignment {
    /// Builds an alignment from `(name, sequence)` records.
    ///
    /// * Symbols are normalised with [`normalize_symbol`]; whitespace is removed.
    /// * At most `max_sequences` records are read.
    /// * The first non-empty record fixes the length; records of any other
    ///   length are dropped.
    pub fn from_records<I, N, S>(
        records: I,
        max_sequences: usize,
    ) -> Result<(Alignment, LoadReport), MiError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<[u8]>,
    {
        let mut builder = Builder::new(max_sequences);
        for (name, seq) in records {
            if !builder.push(name.into(), seq.as_ref()) {
                break;
            }
        }
        builder.finish()
    }

    /// Convenience constructor with generated names `seq_0`, `seq_1`, ...
    pub fn from_seqs<S: AsRef<[u8]>>(seqs: &[S]) -> Result<Alignment, MiError> {
        let records = seqs
            .iter()
            .enumerate()
            .map(|(i, s)| (format!("seq_{}", i), s.as_ref()));
        let (aln, _) = Self::from_records(records, usize::MAX)?;
        Ok(aln)
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    /// Number of columns.
    pub fn seq_len(&self) -> usize {
        self.seqs.first().map(|s| s.len()).unwrap_or(0)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn seqs(&self) -> &[Vec<u8>] {
        &self.seqs
    }

    pub fn seq(&self, idx: usize) -> &[u8] {
        &self.seqs[idx]
    }

    pub fn column(&self, col: usize) -> Vec<u8> {
        self.seqs.iter().map(|s| s[col]).collect()
    }

    /// Column-major copy of the symbols, `columns()[j][k]` is row `k` of column `j`.
    pub fn columns(&self) -> Vec<Vec<u8>> {
        (0..self.seq_len()).map(|j| self.column(j)).collect()
    }

    /// Number of distinct rows.
    pub fn distinct_rows(&self) -> usize {
        self.seqs.iter().collect::<HashSet<_>>().len()
    }

    /// Rows in the given order. Indices must be in range.
    pub fn select_rows(&self, rows: &[usize]) -> Alignment {
        Alignment {
            names: rows.iter().map(|&i| self.names[i].clone()).collect(),
            seqs: rows.iter().map(|&i| self.seqs[i].clone()).collect(),
        }
    }

    /// Columns in the given order. Indices must be in range.
    pub fn select_columns(&self, cols: &[usize]) -> Alignment {
        Alignment {
            names: self.names.clone(),
            seqs: self
                .seqs
                .iter()
                .map(|s| cols.iter().map(|&j| s[j]).collect())
                .collect(),
        }
    }

    /// The half-open column window `[start, end)`.
    pub fn slice_columns(&self, start: usize, end: usize) -> Alignment {
        Alignment {
            names: self.names.clone(),
            seqs: self.seqs.iter().map(|s| s[start..end].to_vec()).collect(),
        }
    }

    /// Fraction of gaps in row `idx`.
    pub fn row_gap_fraction(&self, idx: usize) -> f64 {
        let seq = &self.seqs[idx];
        if seq.is_empty() {
            return 0.0;
        }
        seq.iter().filter(|&&b| b == GAP).count() as f64 / seq.len() as f64
    }

    /// Fraction of gaps in column `col`.
    pub fn column_gap_fraction(&self, col: usize) -> f64 {
        if self.seqs.is_empty() {
            return 0.0;
        }
        self.seqs.iter().filter(|s| s[col] == GAP).count() as f64 / self.seqs.len() as f64
    }
}

struct Builder {
    names: Vec<String>,
    seqs: Vec<Vec<u8>>,
    report: LoadReport,
    max_sequences: usize,
    ref_len: Option<usize>,
}

impl Builder {
    fn new(max_sequences: usize) -> Self {
        Builder {
            names: vec![],
            seqs: vec![],
            report: LoadReport::default(),
            max_sequences,
            ref_len: None,
        }
    }

    /// Returns `false` once no more records are accepted.
    fn push(&mut self, name: String, raw: &[u8]) -> bool {
        if self.report.read >= self.max_sequences {
            self.report.truncated = true;
            return false;
        }
        self.report.read += 1;

        let seq: Vec<u8> = raw
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|&b| normalize_symbol(b))
            .collect();

        if seq.is_empty() {
            self.report.empty += 1;
            return true;
        }

        let ref_len = *self.ref_len.get_or_insert(seq.len());
        if seq.len() != ref_len {
            self.report.length_mismatch += 1;
            return true;
        }

        self.names.push(name);
        self.seqs.push(seq);
        true
    }

    fn finish(mut self) -> Result<(Alignment, LoadReport), MiError> {
        if self.report.truncated {
            log::info!(
                "Reached maximum sequence limit ({})",
                self.max_sequences
            );
        }
        if self.report.length_mismatch > 0 {
            log::warn!(
                "Dropped {} sequences whose length differs from the first one ({})",
                self.report.length_mismatch,
                self.ref_len.unwrap_or(0)
            );
        }
        if self.report.empty > 0 {
            log::warn!("Dropped {} empty sequences", self.report.empty);
        }

        if self.seqs.is_empty() {
            return Err(MiError::EmptyAlignment);
        }
        self.report.kept = self.seqs.len();

        Ok((
            Alignment {
                names: self.names,
                seqs: self.seqs,
            },
            self.report,
        ))
    }
}

/// Reads a FASTA alignment.
///
/// A deadline that passes after at least one record keeps what was read;
/// a deadline that passes before any record is a [`MiError::Timeout`].
pub fn read_fasta<R: BufRead>(
    reader: R,
    opt: &LoadOptions,
) -> Result<(Alignment, LoadReport), MiError> {
    let start = Instant::now();
    let mut fa_in = noodles_fasta::io::Reader::new(reader);
    let mut builder = Builder::new(opt.max_sequences);

    let mut timed_out = false;
    for (idx, result) in fa_in.records().enumerate() {
        if let Some(limit) = opt.timeout {
            if start.elapsed() > limit {
                timed_out = true;
                break;
            }
        }

        let record = result.map_err(|e| MiError::Record {
            record: idx + 1,
            message: e.to_string(),
        })?;
        let name: Vec<u8> = record.name().into();
        let name = String::from_utf8_lossy(&name).into_owned();
        let seq: &[u8] = record.sequence().as_ref();

        if !builder.push(name, seq) {
            break;
        }

        if builder.report.read % 1000 == 0 {
            log::debug!("Loaded {} sequences...", builder.report.read);
        }
    }

    if timed_out {
        let seconds = start.elapsed().as_secs_f64();
        if builder.seqs.is_empty() {
            return Err(MiError::Timeout {
                stage: "loading",
                seconds,
            });
        }
        log::warn!(
            "Loading timed out after {:.1}s, keeping {} sequences read so far",
            seconds,
            builder.seqs.len()
        );
    }

    let (aln, mut report) = builder.finish()?;
    report.timed_out = timed_out;
    log::info!(
        "Loaded {} sequences of length {} in {:.2}s",
        aln.len(),
        aln.seq_len(),
        start.elapsed().as_secs_f64()
    );

    Ok((aln, report))
}

/// Reads a FASTA alignment from a path, `stdin`, or a `.gz` file.
pub fn load_path(input: &str, opt: &LoadOptions) -> Result<(Alignment, LoadReport), MiError> {
    let reader = crate::reader(input)?;
    read_fasta(reader, opt)
}
