//! Estimation-efficiency calculator
//!
//! `efficiency = estimated / actual * 100`, rounded to two decimals. Values
//! above 100 mean the task took less time than estimated; below 100 means it
//! overran. A missing input or zero actual hours yields `None` ("unknown")
//! rather than propagating infinity.

/// Computes the estimation-accuracy percentage
pub fn efficiency(estimated_hours: Option<f64>, actual_hours: Option<f64>) -> Option<f64> {
    let estimated = estimated_hours?;
    let actual = actual_hours?;
    if actual == 0.0 {
        return None;
    }
    Some(round2(estimated / actual * 100.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
