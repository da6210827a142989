//! Trailing-window primitives over aligned columns.
//!
//! Inputs are aligned columns (`None` = no value yet); outputs keep the same
//! length and are `None` wherever the window is not fully populated.

/// Simple moving average requiring `window` values in the trailing window.
pub fn moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, v) in values.iter().enumerate() {
        if let Some(v) = v {
            sum += v;
            count += 1;
        }
        if i >= window {
            if let Some(old) = values[i - window] {
                sum -= old;
                count -= 1;
            }
        }
        if count == window {
            out[i] = Some(sum / window as f64);
        }
    }
    out
}

/// `(level - avg) / avg`, undefined where either side is missing or the
/// average is zero.
pub fn relative_deviation(level: &[Option<f64>], average: &[Option<f64>]) -> Vec<Option<f64>> {
    level
        .iter()
        .zip(average)
        .map(|(l, a)| match (l, a) {
            (Some(l), Some(a)) if *a != 0.0 => Some((l - a) / a),
            _ => None,
        })
        .collect()
}

/// Level deviation from its own `window`-day moving average.
pub fn deviation_from_average(level: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    relative_deviation(level, &moving_average(level, window))
}

/// `level[t] / level[t - n] - 1` using an exact `n`-position offset.
pub fn trailing_return(values: &[Option<f64>], n: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if n == 0 || i < n {
                return None;
            }
            match (values[i], values[i - n]) {
                (Some(now), Some(base)) if base != 0.0 => Some(now / base - 1.0),
                _ => None,
            }
        })
        .collect()
}

/// Pointwise `a - b` where both sides are defined.
pub fn difference(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<f64>> {
    a.iter()
        .zip(b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(x - y),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_moving_average_needs_full_window() {
        let ma = moving_average(&col(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert_eq!(ma[0], None);
        assert_eq!(ma[1], None);
        assert!((ma[2].unwrap() - 2.0).abs() < 1e-12);
        assert!((ma[3].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_moving_average_leading_missing() {
        let values = vec![None, None, Some(2.0), Some(4.0)];
        let ma = moving_average(&values, 2);
        assert_eq!(ma[2], None);
        assert!((ma[3].unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_deviation_from_average() {
        let dev = deviation_from_average(&col(&[10.0, 10.0, 13.0]), 3);
        // avg = 11, (13 - 11) / 11
        assert!((dev[2].unwrap() - 2.0 / 11.0).abs() < 1e-12);
        assert_eq!(dev[1], None);
    }

    #[test]
    fn test_trailing_return() {
        let r = trailing_return(&col(&[100.0, 105.0, 110.0]), 2);
        assert_eq!(r[1], None);
        assert!((r[2].unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_return_zero_base() {
        let r = trailing_return(&col(&[0.0, 1.0]), 1);
        assert_eq!(r[1], None);
    }

    #[test]
    fn test_difference() {
        let d = difference(&[Some(3.0), None], &[Some(1.0), Some(1.0)]);
        assert_eq!(d, vec![Some(2.0), None]);
    }
}
