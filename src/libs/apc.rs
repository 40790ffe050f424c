use nalgebra::DMatrix;

/// Kernel radius in units of sigma.
const TRUNCATE: f64 = 4.0;

/// Average product correction tuned for RNA.
///
/// 1. `max(0, mi[i,j] - mean_i · mean_j / mean)` over the upper triangle,
///    mirrored; skipped when the overall mean is zero.
/// 2. Pairs `min_distance..=max_distance` apart in sequence are scaled by a
///    factor rising logarithmically from `floor` to 1.
/// 3. A Gaussian blur with `sigma` removes isolated spikes.
#[derive(Debug, Clone)]
pub struct ApcCorrector {
    pub sigma: f64,
    pub floor: f64,
    pub min_distance: usize,
    pub max_distance: usize,
}

impl Default for ApcCorrector {
    fn default() -> Self {
        ApcCorrector {
            sigma: 0.6,
            floor: 0.7,
            min_distance: 2,
            max_distance: 8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Corrected {
    pub matrix: DMatrix<f64>,
    /// Overall mean was zero, APC left the values untouched
    pub apc_skipped: bool,
}

impl ApcCorrector {
    pub fn correct(&self, mi: &DMatrix<f64>) -> Corrected {
        let (mut matrix, apc_skipped) = average_product_correction(mi);
        if apc_skipped {
            log::warn!("Overall MI mean is zero, APC skipped");
        }

        let n = matrix.nrows();
        for i in 0..n {
            for j in i + 1..n {
                let factor = self.distance_factor(j - i);
                if factor != 1.0 {
                    matrix[(i, j)] *= factor;
                    matrix[(j, i)] *= factor;
                }
            }
        }

        Corrected {
            matrix: gaussian_smooth(&matrix, self.sigma),
            apc_skipped,
        }
    }

    /// Scale applied to a pair `distance` columns apart.
    pub fn distance_factor(&self, distance: usize) -> f64 {
        if distance < self.min_distance || distance > self.max_distance {
            return 1.0;
        }
        if self.max_distance == self.min_distance {
            return self.floor;
        }
        let span = (self.max_distance as f64 / self.min_distance as f64).ln();
        let pos = (distance as f64 / self.min_distance as f64).ln();
        self.floor + (1.0 - self.floor) * pos / span
    }
}

/// Steps 1-2 only: returns the corrected matrix and whether the correction
/// was skipped because the overall mean is zero.
///
/// Row means and the overall mean include the diagonal.
pub fn average_product_correction(mi: &DMatrix<f64>) -> (DMatrix<f64>, bool) {
    let n = mi.nrows();
    let mut out = DMatrix::zeros(n, n);
    if n == 0 {
        return (out, true);
    }

    let row_means: Vec<f64> = (0..n).map(|i| mi.row(i).sum() / n as f64).collect();
    let overall = mi.sum() / (n * n) as f64;
    let skipped = !(overall > 0.0);

    for i in 0..n {
        for j in i + 1..n {
            let value = if skipped {
                mi[(i, j)]
            } else {
                (mi[(i, j)] - row_means[i] * row_means[j] / overall).max(0.0)
            };
            out[(i, j)] = value;
            out[(j, i)] = value;
        }
    }

    (out, skipped)
}

/// Normalised 1-D Gaussian kernel truncated at `4σ`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as usize;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|k| {
            let x = k as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= total);
    kernel
}

/// Mirror index: `d c b a | a b c d | d c b a`.
fn reflect(idx: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = idx.rem_euclid(period);
    if m >= n {
        (period - 1 - m) as usize
    } else {
        m as usize
    }
}

/// Separable Gaussian blur with mirrored borders.
///
/// The result is re-symmetrised so that a symmetric input gives an exactly
/// symmetric output.
pub fn gaussian_smooth(m: &DMatrix<f64>, sigma: f64) -> DMatrix<f64> {
    let (rows, cols) = m.shape();
    if sigma <= 0.0 || rows == 0 || cols == 0 {
        return m.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;

    // along each row
    let mut tmp = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let jj = reflect(j as isize + k as isize - radius, cols);
                acc += w * m[(i, jj)];
            }
            tmp[(i, j)] = acc;
        }
    }

    // along each column
    let mut out = DMatrix::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let ii = reflect(i as isize + k as isize - radius, rows);
                acc += w * tmp[(ii, j)];
            }
            out[(i, j)] = acc;
        }
    }

    if rows == cols {
        let transposed = out.transpose();
        out = (out + transposed) * 0.5;
    }
    out
}
