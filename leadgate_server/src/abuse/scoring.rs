//! Heuristic fraud scoring for affiliate clicks

/// Maps a click count to a fraud probability in `[0, 1]`
pub trait FraudScorer: Send + Sync {
    fn score(&self, click_count: u32) -> f64;
}

/// `min(clicks / scale, 1) + signal * weight`, capped at 1.0.
///
/// `signal` is clamped into `[0, 1]`.
pub fn linear_score(click_count: u32, scale: f64, signal: f64, weight: f64) -> f64 {
    let base = if scale > 0.0 {
        (f64::from(click_count) / scale).min(1.0)
    } else {
        1.0
    };
    (base + signal.clamp(0.0, 1.0) * weight).clamp(0.0, 1.0)
}

type SignalSource = Box<dyn Fn() -> f64 + Send + Sync>;

/// Linear click-volume score plus a weighted random signal.
///
/// This is a placeholder; the random signal carries no information about
/// the client.
pub struct LinearScorer {
    scale: f64,
    weight: f64,
    signal: SignalSource,
}

impl LinearScorer {
    pub fn new(scale: f64, weight: f64) -> Self {
        Self {
            scale,
            weight,
            signal: Box::new(rand::random::<f64>),
        }
    }

    /// Replace the random signal source
    pub fn with_signal(mut self, signal: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.signal = Box::new(signal);
        self
    }
}

impl FraudScorer for LinearScorer {
    fn score(&self, click_count: u32) -> f64 {
        linear_score(click_count, self.scale, (self.signal)(), self.weight)
    }
}
