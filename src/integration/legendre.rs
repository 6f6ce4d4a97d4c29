/// Legendre polynomials `P_0 ... P_max_n` and their first derivatives sampled over a set of points
#[derive(Clone, Debug)]
pub struct LegendrePoly {
    pub l: Vec<Vec<f64>>,
    pub d1: Vec<Vec<f64>>,
}

impl LegendrePoly {
    pub fn with(max_n: u8, points: &[f64]) -> Self {
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(max_n as usize + 1);
        let mut primes: Vec<Vec<f64>> = Vec::with_capacity(max_n as usize + 1);

        for i in 0..=(max_n as usize) {
            values.push(Vec::with_capacity(points.len()));
            primes.push(Vec::with_capacity(points.len()));

            let i_f = i as f64;
            for (p, &point) in points.iter().enumerate() {
                match i {
                    0 => {
                        values[i].push(1.0);
                        primes[i].push(0.0);
                    }
                    1 => {
                        values[i].push(point);
                        primes[i].push(1.0);
                    }
                    _ => {
                        let v = ((2.0 * i_f - 1.0) * point * values[i - 1][p]
                            - (i_f - 1.0) * values[i - 2][p])
                            / i_f;
                        values[i].push(v);

                        let d = i_f * values[i - 1][p] + point * primes[i - 1][p];
                        primes[i].push(d)
                    }
                }
            }
        }

        Self {
            l: values,
            d1: primes,
        }
    }

    /// `∫ P_n(x)² dx` over `[-1, 1]`
    pub fn norm_squared(n: u8) -> f64 {
        2.0 / (2.0 * n as f64 + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let points = [-1.0, -0.5, 0.0, 0.3, 1.0];
        let table = LegendrePoly::with(3, &points);

        for (p, x) in points.iter().enumerate() {
            let p2 = 0.5 * (3.0 * x * x - 1.0);
            let p3 = 0.5 * (5.0 * x * x * x - 3.0 * x);
            assert!((table.l[2][p] - p2).abs() < 1e-14);
            assert!((table.l[3][p] - p3).abs() < 1e-14);

            assert!((table.d1[2][p] - 3.0 * x).abs() < 1e-14);
            assert!((table.d1[3][p] - 0.5 * (15.0 * x * x - 3.0)).abs() < 1e-14);
        }
    }

    #[test]
    fn orthogonality() {
        use crate::integration::glq::gauss_quadrature_points;

        let (points, weights) = gauss_quadrature_points(8);
        let table = LegendrePoly::with(5, &points);

        for i in 0..=5 {
            for j in 0..=5 {
                let inner: f64 = (0..points.len())
                    .map(|p| table.l[i][p] * table.l[j][p] * weights[p])
                    .sum();
                let expected = if i == j {
                    LegendrePoly::norm_squared(i as u8)
                } else {
                    0.0
                };
                assert!((inner - expected).abs() < 1e-12);
            }
        }
    }
}
