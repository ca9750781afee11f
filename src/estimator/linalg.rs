use ndarray::{Array1, Array2, ArrayView1, Axis};

const MAX_SWEEPS: usize = 100;

/// Eigen-decomposition of a symmetric matrix using cyclic Jacobi rotations.
///
/// Returns the eigenvalues and the matrix whose columns are the matching
/// eigenvectors. The input is assumed symmetric; only that case converges.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.clone();
    let mut v = Array2::<f64>::eye(n);

    let scale: f64 = a.iter().map(|x| x * x).sum();
    if scale == 0.0 {
        return (a.diag().to_owned(), v);
    }

    for _ in 0..MAX_SWEEPS {
        let mut off = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off += a[[p, q]] * a[[p, q]];
            }
        }
        if off <= scale * 1e-30 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

/// Apply the (pseudo-)inverse of a symmetric positive semi-definite matrix to `b`.
///
/// Eigenvalues below a relative cutoff are treated as zero, which yields the
/// minimum-norm solution for rank-deficient systems.
pub fn pinv_solve(matrix: &Array2<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    let (values, vectors) = symmetric_eigen(matrix);
    let largest = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let cutoff = largest * 1e-12 * values.len().max(1) as f64;

    let projected = vectors.t().dot(&b);
    let scaled: Array1<f64> = projected
        .iter()
        .zip(values.iter())
        .map(|(p, lambda)| if lambda.abs() > cutoff { p / lambda } else { 0.0 })
        .collect();
    vectors.dot(&scaled)
}

/// Regularized least squares: minimizes `|Xw - y|² + alpha·|w|²`.
///
/// With `alpha == 0` this is the minimum-norm ordinary least squares solution.
/// The system is solved in the primal (`XᵀX`) or dual (`XXᵀ`) form, whichever
/// is smaller, so wide spectra with few samples stay cheap.
pub fn least_squares(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Array1<f64> {
    let (n_samples, n_features) = x.dim();
    if n_features <= n_samples {
        let mut gram = x.t().dot(x);
        gram.diag_mut().mapv_inplace(|d| d + alpha);
        let rhs = x.t().dot(y);
        pinv_solve(&gram, rhs.view())
    } else {
        let mut kernel = x.dot(&x.t());
        kernel.diag_mut().mapv_inplace(|d| d + alpha);
        let dual = pinv_solve(&kernel, y.view());
        x.t().dot(&dual)
    }
}

/// Column means of a matrix (zero-width safe).
pub fn column_means(x: &Array2<f64>) -> Array1<f64> {
    x.mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(x.ncols()))
}

/// Copy row vectors into a dense matrix. Rows must share the same width.
pub fn to_matrix(rows: &[Vec<f64>], width: usize) -> Array2<f64> {
    let mut m = Array2::<f64>::zeros((rows.len(), width));
    for (mut target, row) in m.rows_mut().into_iter().zip(rows) {
        for (dst, src) in target.iter_mut().zip(row) {
            *dst = *src;
        }
    }
    m
}
