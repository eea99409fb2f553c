use serde::{Deserialize, Serialize};

/// Non-fatal conditions surfaced alongside a successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Warning {
    /// An iterative optimiser stopped at its iteration cap.
    MaxIterations { cap: usize },
    /// An approximation finished above the requested tolerance.
    ToleranceNotReached { achieved: f64, requested: f64 },
}

/// A value with its warning side band.
///
/// Operations never silently degrade: anything non-nominal on a success
/// path is recorded here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warned<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Warned<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Map the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Warned<U> {
        Warned {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warned_map_keeps_warnings() {
        let w = Warned::with(2, vec![Warning::MaxIterations { cap: 10 }]);
        let w2 = w.map(|v| v * 3);
        assert_eq!(w2.value, 6);
        assert_eq!(w2.warnings.len(), 1);
    }
}
