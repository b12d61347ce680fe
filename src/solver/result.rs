//! Recorded output of a transient run.

use serde::Serialize;

use super::IntegrationMethod;

/// Time series of every recorded signal.
///
/// Signals are named `v(<net>)` for node voltages and `i(<element>)` for
/// element currents. `rows[k][j]` is signal `j` at `times[k]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    /// Signal names, one per column
    pub signals: Vec<String>,
    /// Recorded time points (s)
    pub times: Vec<f64>,
    /// One row of signal values per time point
    pub rows: Vec<Vec<f64>>,
    /// Steps simulated, recorded or not
    pub steps: usize,
    /// Integration scheme of the run
    pub method: IntegrationMethod,
    /// Time step (s)
    pub step: f64,
}

impl SimulationResult {
    /// An empty result for the given columns.
    pub fn new(signals: Vec<String>, method: IntegrationMethod, step: f64) -> Self {
        Self {
            signals,
            times: Vec::new(),
            rows: Vec::new(),
            steps: 0,
            method,
            step,
        }
    }

    /// Append one time point.
    pub(crate) fn push(&mut self, time: f64, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.signals.len());
        self.times.push(time);
        self.rows.push(row);
    }

    /// Number of recorded time points.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Column of `name`, case-insensitive.
    pub fn signal_index(&self, name: &str) -> Option<usize> {
        self.signals.iter().position(|s| s.eq_ignore_ascii_case(name))
    }

    /// Every recorded value of signal `name`.
    pub fn signal(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.signal_index(name)?;
        Some(self.rows.iter().map(|row| row[j]).collect())
    }

    /// `(time, value)` pairs of signal `name`.
    pub fn waveform(&self, name: &str) -> Option<Vec<(f64, f64)>> {
        let j = self.signal_index(name)?;
        Some(
            self.times
                .iter()
                .zip(&self.rows)
                .map(|(&t, row)| (t, row[j]))
                .collect(),
        )
    }

    /// Last recorded value of signal `name`.
    pub fn final_value(&self, name: &str) -> Option<f64> {
        let j = self.signal_index(name)?;
        self.rows.last().map(|row| row[j])
    }

    /// Time of the last recorded point.
    pub fn final_time(&self) -> Option<f64> {
        self.times.last().copied()
    }
}
