/// Indices of local maxima of `x`.
///
/// A sample is a peak when it is strictly larger than its left neighbour and
/// the first different sample to its right is smaller. Flat tops resolve to
/// the (floored) midpoint of the plateau. The first and last samples are
/// never peaks. With `min_height`, only peaks whose value is at least that
/// height are kept.
pub fn find_peaks(x: &[f64], min_height: Option<f64>) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let peak = (i + ahead - 1) / 2;
                if min_height.map_or(true, |h| x[peak] >= h) {
                    peaks.push(peak);
                }
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Values of `x` at the given indices.
pub fn heights(x: &[f64], idx: &[usize]) -> Vec<f64> {
    idx.iter().map(|&i| x[i]).collect()
}

/// Percentile with linear interpolation between order statistics.
/// `q` is in percent and clamped to [0, 100]. Returns NaN for empty input.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q = q.clamp(0.0, 100.0);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Mean of `x` sampled at `idx`; `None` when `idx` is empty.
pub fn mean_at(x: &[f64], idx: &[usize]) -> Option<f64> {
    if idx.is_empty() {
        return None;
    }
    Some(idx.iter().map(|&i| x[i]).sum::<f64>() / idx.len() as f64)
}

/// Noise level from the negative lobe: `sqrt(mean(x^2))` over samples below zero.
/// Returns 0 when no sample is negative.
pub fn negative_lobe_std(x: &[f64]) -> f64 {
    let (sum, count) = x
        .iter()
        .filter(|&&v| v < 0.0)
        .fold((0.0, 0usize), |(s, c), &v| (s + v * v, c + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}

/// Subtract the median in place.
pub fn center_on_median(x: &mut [f64]) {
    let m = median(x);
    for v in x.iter_mut() {
        *v -= m;
    }
}

/// 'Same'-mode convolution for an odd-length kernel: the output
/// has the signal's length and the kernel is centred on each sample.
pub fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let m = kernel.len();
    let mut out = vec![0.0; n];
    if n == 0 || m == 0 {
        return out;
    }
    let offset = (m - 1) / 2;
    for (i, o) in out.iter_mut().enumerate() {
        let full = i + offset;
        let k_lo = full.saturating_sub(n - 1);
        let k_hi = full.min(m - 1);
        let mut acc = 0.0;
        for k in k_lo..=k_hi {
            acc += signal[full - k] * kernel[k];
        }
        *o = acc;
    }
    out
}
