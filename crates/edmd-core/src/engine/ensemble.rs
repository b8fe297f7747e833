use super::error::EngineError;

/// Thermodynamic ensemble a simulation samples, with its conserved or imposed values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ensemble {
    Nve { n: usize, volume: f64, energy: f64 },
    Nvt { n: usize, volume: f64, temperature: f64 },
}

impl Default for Ensemble {
    fn default() -> Self {
        Self::Nve {
            n: 0,
            volume: 0.0,
            energy: 0.0,
        }
    }
}

impl Ensemble {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Nve { .. } => "NVE",
            Self::Nvt { .. } => "NVT",
        }
    }

    pub fn values(&self) -> [f64; 3] {
        match *self {
            Self::Nve { n, volume, energy } => [n as f64, volume, energy],
            Self::Nvt {
                n,
                volume,
                temperature,
            } => [n as f64, volume, temperature],
        }
    }

    pub fn temperature(&self) -> Option<f64> {
        match self {
            Self::Nvt { temperature, .. } => Some(*temperature),
            Self::Nve { .. } => None,
        }
    }

    /// Exchanges the imposed values of two ensembles of the same kind.
    pub fn swap(&mut self, other: &mut Self) -> Result<(), EngineError> {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return Err(EngineError::ReplicaExchange(format!(
                "cannot swap a {} ensemble with a {} ensemble",
                self.name(),
                other.name()
            )));
        }
        std::mem::swap(self, other);
        Ok(())
    }
}
