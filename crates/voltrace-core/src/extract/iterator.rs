use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info, warn};

use crate::consts::{
    LOCALITY_BLUR_KERNEL, LOCALITY_BLUR_SIGMA, PHOTOBLEACH_FILTER_ORDER, SPATIAL_RIDGE_FRACTION,
    SUBTHRESHOLD_FILTER_ORDER, TEMPLATE_HALF_WIDTH_SECONDS,
};
use crate::error::{Result, VoltraceError};
use crate::filters::{filter_columns, gaussian_blur_array, signal_filter, BlurKernel, FilterMode};
use crate::linalg::{leading_left_singular_vectors, Ridge};
use crate::movie::Movie;
use crate::roi::ContextWindow;
use crate::spikes::peaks::{center_on_median, mean_at, negative_lobe_std};
use crate::spikes::{denoise_spikes, DenoiseOutput, DenoiseParams};

use super::config::ExtractionConfig;
use super::result::{CellResult, RawRoiResult};
use super::weights::DesignMatrix;

/// Extract the spike train, trace and spatial filter of one cell.
///
/// `roi_mask` and `prior_weights` (if given) have the frame shape. Prior
/// weights replace the ROI average when building the initial trace.
pub fn extract_cell(
    movie: &Movie,
    roi_mask: &Array2<bool>,
    frame_rate: f64,
    cell_id: usize,
    prior_weights: Option<&Array2<f64>>,
    config: &ExtractionConfig,
) -> Result<CellResult> {
    config.validate()?;
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(VoltraceError::InvalidConfig(format!(
            "frame rate must be positive, got {frame_rate}"
        )));
    }
    movie.check_mask(roi_mask)?;
    if let Some(prior) = prior_weights {
        if prior.dim() != movie.frame_dim() {
            return Err(VoltraceError::dimension_mismatch(
                movie.frame_dim(),
                prior.dim(),
            ));
        }
    }

    let window = ((TEMPLATE_HALF_WIDTH_SECONDS * frame_rate).round() as usize).max(1);
    let ctx = ContextWindow::from_roi(roi_mask, config.context_size, config.censor_size)?;
    let (h, w) = ctx.dim();
    let n_frames = movie.frames();
    let roi_idx = ctx.roi_indices();
    let bg_idx = ctx.background_indices();

    info!(
        cell = cell_id,
        frames = n_frames,
        context = ?ctx.bbox.corners(),
        roi_pixels = roi_idx.len(),
        background_pixels = bg_idx.len(),
        "Processing cell"
    );

    // Context pixels as [time, pixel], row-major within a frame.
    let patch = movie.patch(&ctx.bbox);
    let sign = if config.flip_signal { -1.0 } else { 1.0 };
    let mut data = Array2::from_shape_fn((n_frames, h * w), |(t, i)| {
        sign * f64::from(patch[[t, i / w, i % w]])
    });

    let mean_flat = data
        .mean_axis(Axis(0))
        .ok_or_else(|| VoltraceError::InvalidConfig("movie has no frames".into()))?;
    let mean_im = Array2::from_shape_fn((h, w), |(r, c)| mean_flat[r * w + c]);
    for _ in 0..2 {
        if let Some(mean) = data.mean_axis(Axis(0)) {
            data -= &mean;
        }
    }
    let data_hp = filter_columns(
        &data,
        config.hp_freq_pb,
        frame_rate,
        PHOTOBLEACH_FILTER_ORDER,
        FilterMode::High,
    )?;
    let data_lp = &data - &data_hp;

    let mut t0: Vec<f64> = match prior_weights {
        None => data_hp
            .rows()
            .into_iter()
            .map(|row| roi_idx.iter().map(|&i| row[i]).sum::<f64>() / roi_idx.len() as f64)
            .collect(),
        Some(prior) => {
            let local = ctx.bbox.crop(prior);
            let flat = Array1::from_iter(local.iter().copied());
            data_hp.dot(&flat).to_vec()
        }
    };
    subtract_mean(&mut t0);

    let background = BackgroundModel::fit(&data_hp, &bg_idx, config.n_pc_bg, config.ridge_bg)?;
    if let Some(bg) = &background {
        t0 = bg.remove(&t0)?;
    }

    let params = config.denoise_params(window, frame_rate);
    let first = denoise_or_empty(&t0, &params)?;
    let mut num_spikes = vec![first.spikes.len()];
    debug!(cell = cell_id, spikes = first.spikes.len(), "Initial ROI trace");

    let pred = DesignMatrix::blurred(
        &data_hp,
        (h, w),
        &BlurKernel::new(LOCALITY_BLUR_KERNEL, LOCALITY_BLUR_SIGMA),
    );
    let kernel = BlurKernel::for_sigma(config.spatial_sigma());
    let recon = DesignMatrix::blurred(&data_hp, (h, w), &kernel);
    let update = config
        .weight_update
        .policy(SPATIAL_RIDGE_FRACTION * recon.frobenius_sq());

    let roi_image = ctx.roi.mapv(|v| if v { 1.0 } else { 0.0 });
    let mut spatial_filter = gaussian_blur_array(roi_image.view(), &kernel);
    let mut weights = Array1::<f64>::zeros(h * w + 1);
    let mut t = t0.clone();
    let mut current = first.clone();
    let mut low_spikes = first.low_spikes;

    for iteration in 0..config.n_iter {
        weights = update.fit(&recon, &current.reconstructed)?;
        let weight_image = Array2::from_shape_fn((h, w), |(r, c)| weights[1 + r * w + c]);
        spatial_filter = gaussian_blur_array(weight_image.view(), &kernel);

        let mut trace = recon.predict(&weights).to_vec();
        subtract_mean(&mut trace);
        if let Some(bg) = &background {
            trace = bg.remove(&trace)?;
        }
        let shrink_failed = match correct_shrinkage(&mut trace, &t0, &current.spikes) {
            Ok(()) => false,
            Err(VoltraceError::InsufficientPeaks(reason)) => {
                warn!(cell = cell_id, iteration, %reason, "Trace left unscaled");
                true
            }
            Err(e) => return Err(e),
        };

        current = denoise_or_empty(&trace, &params)?;
        low_spikes = current.low_spikes || shrink_failed;
        num_spikes.push(current.spikes.len());
        t = trace;
        debug!(
            cell = cell_id,
            iteration,
            spikes = current.spikes.len(),
            threshold = current.threshold,
            "Spatial update"
        );
    }

    let snr = snr(&t, &current.spikes);
    let locality = locality_test(&pred, &current.reconstructed, &ctx.roi, &ctx.background);
    if !locality {
        warn!(cell = cell_id, "Spatial filter peaks outside the ROI");
    }

    let fov = movie.frame_dim();
    let weight_image = Array2::from_shape_fn((h, w), |(r, c)| weights[1 + r * w + c]);

    let residual: Vec<f64> = t
        .iter()
        .zip(&current.reconstructed)
        .map(|(a, b)| a - b)
        .collect();
    let t_sub = signal_filter(
        &residual,
        config.sub_freq,
        frame_rate,
        SUBTHRESHOLD_FILTER_ORDER,
        FilterMode::Low,
    )?;

    let f0: Vec<f64> = data_lp
        .rows()
        .into_iter()
        .map(|row| {
            let sum: f64 = roi_idx.iter().map(|&i| row[i] + mean_flat[i]).sum();
            (sum / roi_idx.len() as f64).abs()
        })
        .collect();
    let dff = divide(&t, &f0);

    info!(
        cell = cell_id,
        spikes = current.spikes.len(),
        snr,
        locality,
        low_spikes,
        "Cell done"
    );

    Ok(CellResult {
        cell_id,
        ts: current.filtered,
        t_rec: current.reconstructed,
        t_sub,
        spikes: current.spikes,
        num_spikes,
        low_spikes,
        template: current.template,
        snr,
        threshold: current.threshold,
        spatial_filter: ctx.bbox.embed(&spatial_filter, fov),
        weights: ctx.bbox.embed(&weight_image, fov),
        locality,
        context: ctx.bbox,
        mean_im,
        dff,
        false_positive_rate: current.false_positive_rate,
        detection_rate: current.detection_rate,
        raw_roi: RawRoiResult {
            dff: divide(&t0, &f0),
            t: t0,
            ts: first.filtered,
            spikes: first.spikes,
            spatial_filter: ctx.roi,
            template: first.template,
        },
        t,
        f0,
    })
}

/// Signal-to-noise ratio of a trace at its spikes: mean spike height over the
/// negative-lobe noise of the median-centred trace. 0 without spikes.
pub fn snr(trace: &[f64], spikes: &[usize]) -> f64 {
    let mut centred = trace.to_vec();
    center_on_median(&mut centred);
    let Some(signal) = mean_at(&centred, spikes) else {
        return 0.0;
    };
    let noise = negative_lobe_std(&centred);
    if noise > 0.0 {
        signal / noise
    } else {
        0.0
    }
}

/// True unless some background pixel of `design` correlates with
/// `reconstructed` more than every ROI pixel does.
pub fn locality_test(
    design: &DesignMatrix,
    reconstructed: &[f64],
    roi: &Array2<bool>,
    background: &Array2<bool>,
) -> bool {
    let corr = design.correlations(reconstructed);
    let max_in_roi = corr
        .iter()
        .zip(roi.iter())
        .filter(|(_, &inside)| inside)
        .map(|(&c, _)| c)
        .fold(f64::NEG_INFINITY, f64::max);
    !corr
        .iter()
        .zip(background.iter())
        .any(|(&c, &outside)| outside && c > max_in_roi)
}

/// Scale `trace` so its mean at `spikes` equals that of `reference`.
pub fn correct_shrinkage(trace: &mut [f64], reference: &[f64], spikes: &[usize]) -> Result<()> {
    let (Some(target), Some(current)) = (mean_at(reference, spikes), mean_at(trace, spikes)) else {
        return Err(VoltraceError::InsufficientPeaks(
            "no spikes to rescale against".into(),
        ));
    };
    if current == 0.0 {
        return Err(VoltraceError::InsufficientPeaks(
            "trace is zero on average at the spikes".into(),
        ));
    }
    let factor = target / current;
    for v in trace.iter_mut() {
        *v *= factor;
    }
    Ok(())
}

/// Leading principal components of the background pixels.
struct BackgroundModel {
    basis: Array2<f64>,
    alpha: f64,
}

impl BackgroundModel {
    fn fit(
        data_hp: &Array2<f64>,
        bg_idx: &[usize],
        n_pc: usize,
        ridge_bg: f64,
    ) -> Result<Option<Self>> {
        let k = n_pc.min(data_hp.nrows()).min(bg_idx.len());
        if k == 0 {
            warn!(
                background_pixels = bg_idx.len(),
                n_pc_bg = n_pc,
                "Skipping background removal"
            );
            return Ok(None);
        }
        let bg = data_hp.select(Axis(1), bg_idx);
        let basis = leading_left_singular_vectors(bg.view(), k)?;
        if basis.ncols() == 0 {
            warn!("Background is flat, skipping background removal");
            return Ok(None);
        }
        debug!(components = basis.ncols(), "Background basis");
        // Unit-norm components: alpha scales with their count.
        let alpha = basis.ncols() as f64 * ridge_bg;
        Ok(Some(Self { basis, alpha }))
    }

    fn remove(&self, trace: &[f64]) -> Result<Vec<f64>> {
        let y = Array1::from(trace.to_vec());
        let fit = Ridge::new(self.alpha, false).fit(self.basis.view(), y.view())?;
        let projection = self.basis.dot(&fit.coef);
        Ok((&y - &projection).to_vec())
    }
}

fn denoise_or_empty(trace: &[f64], params: &DenoiseParams) -> Result<DenoiseOutput> {
    match denoise_spikes(trace, params) {
        Ok(out) => Ok(out),
        Err(VoltraceError::InsufficientPeaks(reason)) => {
            warn!(%reason, "No usable peaks, pass yields no spikes");
            Ok(DenoiseOutput::empty(trace.len(), params.window))
        }
        Err(e) => Err(e),
    }
}

fn subtract_mean(x: &mut [f64]) {
    if x.is_empty() {
        return;
    }
    let mean = x.iter().sum::<f64>() / x.len() as f64;
    for v in x.iter_mut() {
        *v -= mean;
    }
}

fn divide(num: &[f64], den: &[f64]) -> Vec<f64> {
    num.iter().zip(den).map(|(n, d)| n / d).collect()
}
