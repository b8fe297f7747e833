/// Scale factors between file units and internal simulation units.
///
/// Each field is the number of internal units in one file unit. Loading multiplies by the
/// factor, saving divides by it. Compression restores a grown system by rescaling `length`
/// and `time`, which shrinks the saved box while keeping saved diameters fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    pub length: f64,
    pub time: f64,
    pub mass: f64,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            length: 1.0,
            time: 1.0,
            mass: 1.0,
        }
    }
}

impl Units {
    pub fn velocity(&self) -> f64 {
        self.length / self.time
    }

    pub fn acceleration(&self) -> f64 {
        self.length / (self.time * self.time)
    }

    pub fn energy(&self) -> f64 {
        self.mass * self.velocity() * self.velocity()
    }

    pub fn rescale_length(&mut self, factor: f64) {
        self.length *= factor;
    }

    pub fn rescale_time(&mut self, factor: f64) {
        self.time *= factor;
    }
}
