/// Maps values above a threshold to `1.0` and everything else, NaN included, to `0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binarizer {
    threshold: f64,
}

impl Binarizer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn transform(&self, value: f64) -> f64 {
        if value > self.threshold {
            1.0
        } else {
            0.0
        }
    }
}
