//! B-spline basis function evaluation on flat knot sequences.

/// Index of the knot span containing `t` in a flat knot vector over
/// `n + 1` poles: the `i` with `knots[i] <= t < knots[i+1]`, except
/// that parameters at or past the domain ends land in the outermost
/// non-empty spans.
pub fn find_span(degree: usize, knots: &[f64], n: usize, t: f64) -> usize {
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }

    // Bisect the interior spans
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;

    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }

    mid
}

/// The `degree + 1` basis functions that do not vanish on `span`,
/// evaluated at `t`: N_{span-degree,degree}(t) through
/// N_{span,degree}(t), by the Cox-de Boor recursion.
pub fn basis_functions(degree: usize, knots: &[f64], span: usize, t: f64) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];

    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;

        for r in 0..j {
            let temp = n[r] / (right[r + 1] + left[j - r]);
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }

        n[j] = saved;
    }

    n
}

/// Compute the non-vanishing basis functions and their derivatives up to
/// order `d` at parameter `t`.
///
/// Returns `ders` with `d + 1` rows of `degree + 1` entries each:
/// `ders[k][j]` is the k-th derivative of N_{span-degree+j,degree}(t).
/// Rows past the degree are zero.
pub fn ders_basis_functions(
    degree: usize,
    knots: &[f64],
    span: usize,
    t: f64,
    d: usize,
) -> Vec<Vec<f64>> {
    let p = degree;
    let du = d.min(p);
    let mut ders = vec![vec![0.0; p + 1]; d + 1];

    let mut ndu = vec![vec![1.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];

    ndu[0][0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // Knot differences below the diagonal, basis values above
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let mut s1 = 0usize;
        let mut s2 = 1usize;
        a[0][0] = 1.0;

        for k in 1..=du {
            let mut dv = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;

            if r >= k {
                a[s2][0] = a[s1][0] / ndu[pk + 1][rk as usize];
                dv = a[s2][0] * ndu[rk as usize][pk];
            }

            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r as isize - 1 <= pk as isize {
                k - 1
            } else {
                p - r
            };

            for j in j1..=j2 {
                a[s2][j] =
                    (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][(rk + j as isize) as usize];
                dv += a[s2][j] * ndu[(rk + j as isize) as usize][pk];
            }

            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                dv += a[s2][k] * ndu[r][pk];
            }

            ders[k][r] = dv;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    // Row k carries the factor p! / (p - k)!
    let mut r = p as f64;
    for k in 1..=du {
        for j in 0..=p {
            ders[k][j] *= r;
        }
        r *= (p - k) as f64;
    }

    ders
}

/// Evaluate one row of the collocation matrix: the `d`-th derivative of
/// every basis function over `nb_poles` control points at parameter `t`.
pub fn basis_row(degree: usize, knots: &[f64], nb_poles: usize, t: f64, d: usize) -> Vec<f64> {
    let mut row = vec![0.0; nb_poles];
    let span = find_span(degree, knots, nb_poles - 1, t);
    let ders = ders_basis_functions(degree, knots, span, t, d);
    for (j, &val) in ders[d].iter().enumerate() {
        row[span - degree + j] = val;
    }
    row
}
