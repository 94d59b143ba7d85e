use ndarray::ArrayViewMut1;
use serde::Serialize;

/// Tolerance for small negative values.
const NEGATIVE_TOLERANCE: f32 = 1e-5;

/// Add a small value, to prevent returning Inf on underflow.
#[inline]
pub fn safe_ln(v: f32) -> f32 {
    (v + NEGATIVE_TOLERANCE).ln()
}

/// Softmax of `logits` in place.
///
/// The maximum logit is subtracted before exponentiation, so large
/// logits do not overflow.
pub fn softmax(mut logits: ArrayViewMut1<f32>) {
    let max = logits.fold(f32::NEG_INFINITY, |max, &v| max.max(v));
    logits.mapv_inplace(|v| (v - max).exp());
    let sum = logits.sum();
    logits.mapv_inplace(|v| v / sum);
}

/// Version of the crate and the git revision it was built from.
#[derive(Clone, Debug, Serialize)]
pub struct VersionInfo {
    rcconll_version: &'static str,
    git_desc: Option<&'static str>,
}

impl VersionInfo {
    pub fn new() -> Self {
        VersionInfo {
            rcconll_version: env!("CARGO_PKG_VERSION"),
            git_desc: option_env!("MAYBE_RCCONLL_GIT_DESC"),
        }
    }
}

#[cfg(test)]
pub use self::test::*;

#[cfg(test)]
mod test {
    use ndarray::arr1;

    use super::softmax;

    pub fn close(a: f32, b: f32, eps: f32) -> bool {
        let diff = (a - b).abs();
        if diff > eps {
            return false;
        }

        true
    }

    pub fn all_close(a: &[f32], b: &[f32], eps: f32) -> bool {
        for (&av, &bv) in a.iter().zip(b) {
            if !close(av, bv, eps) {
                return false;
            }
        }

        true
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut logits = arr1(&[1f32, 2., 3.]);
        softmax(logits.view_mut());
        assert!(close(logits.sum(), 1.0, 1e-5));
        assert!(all_close(
            logits.as_slice().unwrap(),
            &[0.090031, 0.244728, 0.665241],
            1e-5
        ));
    }

    #[test]
    fn softmax_large_logits() {
        let mut logits = arr1(&[1000f32, 1000.]);
        softmax(logits.view_mut());
        assert!(all_close(logits.as_slice().unwrap(), &[0.5, 0.5], 1e-5));
    }
}
