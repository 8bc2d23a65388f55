use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

/// Piecewise linear response curve. Keys are kept sorted by time; sampling
/// before the first key or after the last holds the end value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    keys: Vec<CurveKey>,
}

impl ResponseCurve {
    pub fn new(keys: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let mut keys: Vec<CurveKey> = keys.into_iter().map(|(time, value)| CurveKey { time, value }).collect();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn keys(&self) -> &[CurveKey] { &self.keys }

    pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    pub fn last_key_time(&self) -> Option<f32> { self.keys.last().map(|k| k.time) }

    pub fn eval(&self, time: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };

        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let next = self.keys.partition_point(|k| k.time <= time);
        let (a, b) = (self.keys[next - 1], self.keys[next]);
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }

        a.value + (b.value - a.value) * ((time - a.time) / span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_keys() {
        let curve = ResponseCurve::new([(0.0, 0.0), (1.0, 1.0), (2.0, 0.5)]);
        assert_eq!(curve.eval(0.5), 0.5);
        assert_eq!(curve.eval(1.5), 0.75);
    }

    #[test]
    fn holds_end_values() {
        let curve = ResponseCurve::new([(1.0, 0.25), (0.5, 0.0)]);
        assert_eq!(curve.keys()[0].time, 0.5);
        assert_eq!(curve.eval(-3.0), 0.0);
        assert_eq!(curve.eval(10.0), 0.25);
        assert_eq!(curve.last_key_time(), Some(1.0));
    }

    #[test]
    fn empty_curve_is_zero() {
        let curve = ResponseCurve::default();
        assert!(curve.is_empty());
        assert_eq!(curve.eval(0.3), 0.0);
        assert_eq!(curve.last_key_time(), None);
    }

    #[test]
    fn nan_time_reads_first_key() {
        let curve = ResponseCurve::new([(0.0, 0.2), (1.0, 1.0)]);
        assert_eq!(curve.eval(f32::NAN), 0.2);
        assert_eq!(curve.eval(f32::INFINITY), 1.0);
        assert_eq!(curve.eval(f32::NEG_INFINITY), 0.2);
    }
}
