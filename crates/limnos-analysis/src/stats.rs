//! Small numeric helpers shared by the detectors

/// Values below this magnitude are treated as zero in denominators
pub const EPSILON: f64 = 1e-9;

/// Arithmetic mean; `None` for empty or non-finite input
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    m.is_finite().then_some(m)
}

/// Population standard deviation; `None` for fewer than two values or non-finite input
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    let sd = variance.sqrt();
    sd.is_finite().then_some(sd)
}
