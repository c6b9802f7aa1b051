use super::{IntegratorOptions, OdeSystem};
use crate::error::IntegrationError;
use nalgebra::SVector;

// Dormand-Prince 5(4) tableau
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// Difference between the 5th and embedded 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

type Result<T> = std::result::Result<T, IntegrationError>;

/// Integrate `system` from `times[0]` and report the state at every entry of `times`.
///
/// `times` must be non-decreasing. Steps are shortened so that every output
/// time is hit exactly, so no interpolation error enters the samples.
pub fn integrate_at<S, const N: usize>(
    system: &S,
    y0: SVector<f64, N>,
    times: &[f64],
    opts: &IntegratorOptions,
) -> Result<Vec<SVector<f64, N>>>
where
    S: OdeSystem<N>,
{
    let mut out = Vec::with_capacity(times.len());
    let Some(&t0) = times.first() else {
        return Ok(out);
    };

    let mut t = t0;
    let mut y = y0;
    let mut k1 = system.derivative(t, &y);
    if !is_finite(&y) || !is_finite(&k1) {
        return Err(IntegrationError::NonFinite { t });
    }
    out.push(y);

    let span = times.last().map_or(0.0, |&t_end| t_end - t0);
    if span <= 0.0 {
        out.extend(std::iter::repeat_n(y, times.len() - 1));
        return Ok(out);
    }

    let mut h = opts
        .first_step
        .unwrap_or_else(|| initial_step(system, t, &y, &k1, opts))
        .min(span);
    let mut steps = 0usize;
    let mut accepted = 0usize;

    for &target in &times[1..] {
        while t < target {
            let remaining = target - t;
            let resolution = 10.0 * f64::EPSILON * t.abs().max(1.0);
            if remaining <= resolution {
                // Closer than the time resolution: the target is reached
                t = target;
                break;
            }
            if steps >= opts.max_steps {
                return Err(IntegrationError::TooManySteps(steps));
            }
            steps += 1;

            let clamped = h >= remaining;
            let h_try = if clamped { remaining } else { h };
            if h_try <= resolution {
                return Err(IntegrationError::StepSizeUnderflow { t, h: h_try });
            }

            let (y_new, k7, err_vec) = step(system, t, &y, &k1, h_try);
            let err = error_norm(&err_vec, &y, &y_new, opts);

            if err <= 1.0 && is_finite(&y_new) {
                t = if clamped { target } else { t + h_try };
                y = y_new;
                k1 = k7;
                accepted += 1;

                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                let proposed = h_try * factor;
                h = if clamped { proposed.max(h) } else { proposed };
            } else {
                let factor = if err.is_finite() {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, 1.0)
                } else {
                    MIN_FACTOR
                };
                h = h_try * factor;
            }
        }
        out.push(y);
    }

    tracing::debug!(steps, accepted, "dopri5 integration finished");
    Ok(out)
}

fn step<S, const N: usize>(
    system: &S,
    t: f64,
    y: &SVector<f64, N>,
    k1: &SVector<f64, N>,
    h: f64,
) -> (SVector<f64, N>, SVector<f64, N>, SVector<f64, N>)
where
    S: OdeSystem<N>,
{
    let k2 = system.derivative(t + C2 * h, &(y + k1 * (h * A21)));
    let k3 = system.derivative(t + C3 * h, &(y + (k1 * A31 + k2 * A32) * h));
    let k4 = system.derivative(t + C4 * h, &(y + (k1 * A41 + k2 * A42 + k3 * A43) * h));
    let k5 = system.derivative(
        t + C5 * h,
        &(y + (k1 * A51 + k2 * A52 + k3 * A53 + k4 * A54) * h),
    );
    let k6 = system.derivative(
        t + h,
        &(y + (k1 * A61 + k2 * A62 + k3 * A63 + k4 * A64 + k5 * A65) * h),
    );
    let y_new = y + (k1 * A71 + k3 * A73 + k4 * A74 + k5 * A75 + k6 * A76) * h;
    let k7 = system.derivative(t + h, &y_new);

    let err = (k1 * E1 + k3 * E3 + k4 * E4 + k5 * E5 + k6 * E6 + k7 * E7) * h;
    (y_new, k7, err)
}

fn error_norm<const N: usize>(
    err: &SVector<f64, N>,
    y: &SVector<f64, N>,
    y_new: &SVector<f64, N>,
    opts: &IntegratorOptions,
) -> f64 {
    let sum: f64 = (0..N)
        .map(|i| {
            let scale = opts.atol + opts.rtol * y[i].abs().max(y_new[i].abs());
            (err[i] / scale).powi(2)
        })
        .sum();
    (sum / N as f64).sqrt()
}

/// Starting step heuristic from Hairer, Norsett & Wanner (II.4).
fn initial_step<S, const N: usize>(
    system: &S,
    t: f64,
    y: &SVector<f64, N>,
    f0: &SVector<f64, N>,
    opts: &IntegratorOptions,
) -> f64
where
    S: OdeSystem<N>,
{
    let scaled_norm = |v: &SVector<f64, N>| -> f64 {
        let sum: f64 = (0..N)
            .map(|i| (v[i] / (opts.atol + opts.rtol * y[i].abs())).powi(2))
            .sum();
        (sum / N as f64).sqrt()
    };

    let d0 = scaled_norm(y);
    let d1 = scaled_norm(f0);
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    };

    let y1 = y + f0 * h0;
    let f1 = system.derivative(t + h0, &y1);
    let d2 = scaled_norm(&(f1 - f0)) / h0;

    let h1 = if d1.max(d2) <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(0.2)
    };

    (100.0 * h0).min(h1)
}

fn is_finite<const N: usize>(v: &SVector<f64, N>) -> bool {
    v.iter().all(|x| x.is_finite())
}
