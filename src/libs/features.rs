use crate::libs::error::MiError;
use crate::libs::pairs::PairRecord;
use nalgebra::DMatrix;
use serde::Serialize;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Direct,
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PseudocountSource {
    Adaptive,
    Fixed,
}

/// Parameters actually used for one alignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveParams {
    pub pseudocount: f64,
    pub gap_threshold: f64,
    pub identity_threshold: f64,
    pub max_sequences: usize,
    pub max_length: usize,
    pub conservation_range: (f64, f64),
    pub alphabet_size: usize,
    pub weighting: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkingInfo {
    pub num_chunks: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    /// `[start, end)` of each window
    pub windows: Vec<(usize, usize)>,
    pub single_sequence_chunks: usize,
}

/// Evolutionary-coupling features of one alignment.
#[derive(Debug, Clone)]
pub struct CouplingFeatures {
    /// Symmetric, one row per retained column
    pub coupling_matrix: DMatrix<f64>,
    pub method: Method,
    pub pseudocount_source: PseudocountSource,
    pub top_pairs: Vec<PairRecord>,
    pub params: EffectiveParams,
    pub chunking: Option<ChunkingInfo>,
    pub source: Option<String>,
    pub sequence_count: usize,
    pub sequence_length: usize,
    pub effective_sequences: f64,
    /// Positions inside `params.conservation_range`
    pub conserved_positions: usize,
    pub single_sequence: bool,
    pub uniform_weights: bool,
    pub apc_skipped: bool,
}

/// ```
/// use rnaec::libs::features::{method_tag, Method, PseudocountSource};
/// assert_eq!(
///     method_tag(Method::Chunked, PseudocountSource::Adaptive),
///     "mutual_information_chunked+adaptive_pc"
/// );
/// ```
pub fn method_tag(method: Method, source: PseudocountSource) -> String {
    let base = match method {
        Method::Direct => "mutual_information_enhanced",
        Method::Chunked => "mutual_information_chunked",
    };
    let pc = match source {
        PseudocountSource::Adaptive => "adaptive_pc",
        PseudocountSource::Fixed => "fixed_pc",
    };
    format!("{}+{}", base, pc)
}

impl CouplingFeatures {
    pub fn method_tag(&self) -> String {
        method_tag(self.method, self.pseudocount_source)
    }

    pub fn num_chunks(&self) -> Option<usize> {
        self.chunking.as_ref().map(|c| c.num_chunks)
    }
}

/// Maps the features onto a JSON object; the matrix becomes nested rows.
pub fn to_json(features: &CouplingFeatures) -> serde_json::Value {
    let m = &features.coupling_matrix;
    let rows: Vec<Vec<f64>> = (0..m.nrows())
        .map(|i| m.row(i).iter().cloned().collect())
        .collect();

    let mut value = serde_json::json!({
        "method": features.method_tag(),
        "sequence_count": features.sequence_count,
        "sequence_length": features.sequence_length,
        "effective_sequences": features.effective_sequences,
        "conserved_positions": features.conserved_positions,
        "single_sequence": features.single_sequence,
        "uniform_weights": features.uniform_weights,
        "apc_skipped": features.apc_skipped,
        "params": features.params,
        "top_pairs": features.top_pairs,
        "coupling_matrix": rows,
    });
    if let Some(map) = value.as_object_mut() {
        if let Some(chunking) = &features.chunking {
            map.insert("chunking".to_string(), serde_json::json!(chunking));
        }
        if let Some(source) = &features.source {
            map.insert("msa_file".to_string(), serde_json::json!(source));
        }
    }
    value
}

/// One matrix row per line, tab separated.
pub fn write_matrix_tsv<W: Write>(writer: &mut W, matrix: &DMatrix<f64>) -> std::io::Result<()> {
    for i in 0..matrix.nrows() {
        let line = matrix.row(i).iter().map(|v| v.to_string()).collect::<Vec<_>>();
        writer.write_fmt(format_args!("{}\n", line.join("\t")))?;
    }
    Ok(())
}

/// Reads a square TSV matrix; blank lines and `#` lines are skipped.
pub fn read_matrix_tsv<R: BufRead>(reader: R) -> Result<DMatrix<f64>, MiError> {
    // (line number, values)
    let mut rows: Vec<(usize, Vec<f64>)> = vec![];
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split('\t')
            .map(|f| f.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MiError::Parse {
                line: idx + 1,
                message: e.to_string(),
            })?;
        rows.push((idx + 1, row));
    }

    let n = rows.len();
    if let Some((line, row)) = rows.iter().find(|(_, r)| r.len() != n) {
        return Err(MiError::Parse {
            line: *line,
            message: format!("expected {} columns, found {}", n, row.len()),
        });
    }
    Ok(DMatrix::from_fn(n, n, |i, j| rows[i].1[j]))
}

/// `i\tj\tscore`, 0-based positions.
pub fn write_pairs_tsv<W: Write>(writer: &mut W, pairs: &[PairRecord]) -> std::io::Result<()> {
    for p in pairs {
        writer.write_fmt(format_args!("{}\t{}\t{}\n", p.i, p.j, p.score))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> CouplingFeatures {
        let mut m = DMatrix::zeros(3, 3);
        m[(0, 2)] = 0.5;
        m[(2, 0)] = 0.5;
        CouplingFeatures {
            coupling_matrix: m,
            method: Method::Direct,
            pseudocount_source: PseudocountSource::Fixed,
            top_pairs: vec![PairRecord {
                i: 0,
                j: 2,
                score: 0.5,
            }],
            params: EffectiveParams {
                pseudocount: 0.5,
                gap_threshold: 0.5,
                identity_threshold: 0.8,
                max_sequences: 5000,
                max_length: 750,
                conservation_range: (0.2, 0.95),
                alphabet_size: 7,
                weighting: "sequence".to_string(),
            },
            chunking: None,
            source: None,
            sequence_count: 4,
            sequence_length: 3,
            effective_sequences: 3.2,
            conserved_positions: 1,
            single_sequence: false,
            uniform_weights: false,
            apc_skipped: false,
        }
    }

    #[test]
    fn test_method_tag() {
        assert_eq!(
            method_tag(Method::Direct, PseudocountSource::Fixed),
            "mutual_information_enhanced+fixed_pc"
        );
        assert_eq!(features().method_tag(), "mutual_information_enhanced+fixed_pc");
    }

    #[test]
    fn test_to_json() {
        let mut f = features();
        let json = to_json(&f);
        assert_eq!(json["method"], "mutual_information_enhanced+fixed_pc");
        assert_eq!(json["params"]["pseudocount"], 0.5);
        assert_eq!(json["coupling_matrix"][0][2], 0.5);
        assert_eq!(json["top_pairs"][0]["j"], 2);
        assert!(json.get("chunking").is_none());

        f.chunking = Some(ChunkingInfo {
            num_chunks: 2,
            chunk_size: 600,
            overlap: 200,
            windows: vec![(0, 600), (400, 1000)],
            single_sequence_chunks: 0,
        });
        let json = to_json(&f);
        assert_eq!(json["chunking"]["num_chunks"], 2);
        assert_eq!(json["chunking"]["windows"][1][0], 400);
    }

    #[test]
    fn test_matrix_tsv() {
        let m = DMatrix::from_row_slice(2, 2, &[0.0, 0.125, 0.125, 0.0]);
        let mut buf: Vec<u8> = vec![];
        write_matrix_tsv(&mut buf, &m).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "0\t0.125\n0.125\t0\n");

        let back = read_matrix_tsv(&buf[..]).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_read_matrix_errors() {
        let err = read_matrix_tsv("0\t1\n1\tx\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MiError::Parse { line: 2, .. }));

        let err = read_matrix_tsv("0\t1\t2\n1\t0\t3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MiError::Parse { line: 1, .. }));

        // comments and blank lines still count as lines
        let err = read_matrix_tsv("# header\n\n0\t1\n1\tx\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MiError::Parse { line: 4, .. }));
        let err = read_matrix_tsv("# header\n0\t1\n\n1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MiError::Parse { line: 4, .. }));
    }

    #[test]
    fn test_pairs_tsv() {
        let mut buf: Vec<u8> = vec![];
        write_pairs_tsv(&mut buf, &features().top_pairs).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "0\t2\t0.5\n");
    }
}
