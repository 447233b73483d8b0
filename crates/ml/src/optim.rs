/// Momentum state for the three controller weights.
///
/// Two flavours are offered because the controller and the batch trainer
/// smooth their updates differently: [`Momentum::accelerate`] is classic
/// heavy-ball momentum (the new step plus a fraction of the last one) and
/// [`Momentum::smooth`] is an exponential moving average of raw gradients.
#[derive(Clone, Debug, PartialEq)]
pub struct Momentum {
    factor: f32,
    velocity: [f32; 3],
}

impl Momentum {
    #[must_use]
    pub fn new(factor: f32) -> Self {
        Self {
            factor,
            velocity: [0.0; 3],
        }
    }

    #[must_use]
    pub fn factor(&self) -> f32 {
        self.factor
    }

    #[must_use]
    pub fn velocity(&self) -> [f32; 3] {
        self.velocity
    }

    /// `v = step + factor * v`, returning the new `v`.
    pub fn accelerate(&mut self, step: [f32; 3]) -> [f32; 3] {
        for (v, s) in self.velocity.iter_mut().zip(step) {
            *v = s + self.factor * *v;
        }
        self.velocity
    }

    /// `v = factor * v + (1 - factor) * grad`, returning the new `v`.
    pub fn smooth(&mut self, grad: [f32; 3]) -> [f32; 3] {
        for (v, g) in self.velocity.iter_mut().zip(grad) {
            *v = self.factor * *v + (1.0 - self.factor) * g;
        }
        self.velocity
    }

    pub fn reset(&mut self) {
        self.velocity = [0.0; 3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accelerate_carries_previous_step() {
        let mut m = Momentum::new(0.5);
        assert_eq!(m.accelerate([1.0, 0.0, -2.0]), [1.0, 0.0, -2.0]);
        assert_eq!(m.accelerate([1.0, 1.0, 0.0]), [1.5, 1.0, -1.0]);
    }

    #[test]
    fn smooth_is_a_moving_average() {
        let mut m = Momentum::new(0.75);
        assert_eq!(m.smooth([4.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
        assert_eq!(m.smooth([4.0, 0.0, 0.0]), [1.75, 0.0, 0.0]);
        m.reset();
        assert_eq!(m.velocity(), [0.0; 3]);
    }
}
