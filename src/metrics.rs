//! Power-quality metrics derived from a single measurement record.
//!
//! Every derived value is an `Option`: `None` marks an undefined cell
//! (missing input, division by zero) and flows downstream as missing.

use crate::loader::{MeasurementRecord, SourceKind};
use serde::Serialize;

const WATTS_PER_KW: f64 = 1000.0;

/// Metrics for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    /// Overall cos φ, active over apparent power.
    pub power_factor: Option<f64>,
    /// Per-phase cos φ, active over total current. Only outlet exports
    /// carry the active current needed for this.
    pub phase_power_factor: [Option<f64>; 3],
    pub active_power_kw: Option<f64>,
    pub apparent_power_kw: Option<f64>,
    /// Never negative; see [`reactive_power`].
    pub reactive_power_kw: Option<f64>,
}

/// Derives the metrics for a record. Pure: the same record always yields
/// bit-identical output.
pub fn derive(record: &MeasurementRecord) -> DerivedMetrics {
    match record.source {
        SourceKind::SummedPower => from_summed_power(record),
        SourceKind::ActiveCurrent => from_active_current(record),
    }
}

pub fn derive_all(records: &[MeasurementRecord]) -> Vec<DerivedMetrics> {
    records.iter().map(derive).collect()
}

/// `√max(S² − P², 0)`. Measurement noise can push P slightly above S; that
/// clamps to zero instead of producing NaN.
pub fn reactive_power(apparent: f64, active: f64) -> f64 {
    (apparent * apparent - active * active).max(0.0).sqrt()
}

/// `num / den`, undefined when either side is missing or `den` is zero.
fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let (num, den) = (num?, den?);
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}

/// Σ U·I over the three phases, missing if any phase is.
fn phase_volt_amperes(record: &MeasurementRecord) -> Option<f64> {
    record
        .voltage
        .iter()
        .zip(&record.current)
        .map(|(u, i)| Some((*u)? * (*i)?))
        .sum()
}

fn from_summed_power(record: &MeasurementRecord) -> DerivedMetrics {
    let power_factor = ratio(record.active_power_sum, record.apparent_power_sum);
    let volt_amperes = phase_volt_amperes(record);

    let apparent_power_kw = volt_amperes
        .or(record.apparent_power_sum)
        .map(|va| va / WATTS_PER_KW);

    let active_power_kw = match (volt_amperes, power_factor) {
        (Some(va), Some(pf)) => Some(va * pf / WATTS_PER_KW),
        // S was measured but cos φ is undefined (S = 0 or P missing)
        (Some(_), None) if record.apparent_power_sum.is_some() => None,
        _ => record.active_power_sum.map(|w| w / WATTS_PER_KW),
    };

    DerivedMetrics {
        power_factor,
        phase_power_factor: [None; 3],
        active_power_kw,
        apparent_power_kw,
        reactive_power_kw: apparent_power_kw
            .zip(active_power_kw)
            .map(|(s, p)| reactive_power(s, p)),
    }
}

fn from_active_current(record: &MeasurementRecord) -> DerivedMetrics {
    let mut phase_power_factor = [None; 3];
    let mut active_w = Some(0.0);
    let mut apparent_w = Some(0.0);

    for phase in 0..3 {
        let current = record.current[phase];
        let pf = ratio(record.active_current[phase], current);
        phase_power_factor[phase] = pf;

        let volt_amperes = record.voltage[phase].zip(current).map(|(u, i)| u * i);
        // A phase without current draws no power even though its cos φ is undefined.
        let watts = match (volt_amperes, pf) {
            (Some(_), _) if current == Some(0.0) => Some(0.0),
            (Some(va), Some(pf)) => Some(va * pf),
            _ => None,
        };

        apparent_w = apparent_w.zip(volt_amperes).map(|(sum, va)| sum + va);
        active_w = active_w.zip(watts).map(|(sum, w)| sum + w);
    }

    let active_power_kw = active_w.map(|w| w / WATTS_PER_KW);
    let apparent_power_kw = apparent_w.map(|va| va / WATTS_PER_KW);

    DerivedMetrics {
        power_factor: ratio(active_power_kw, apparent_power_kw),
        phase_power_factor,
        active_power_kw,
        apparent_power_kw,
        reactive_power_kw: apparent_power_kw
            .zip(active_power_kw)
            .map(|(s, p)| reactive_power(s, p)),
    }
}
