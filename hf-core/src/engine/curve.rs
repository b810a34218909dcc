//! Pure curve evaluation: temperature in, duty percent out.
//!
//! No state lives here - hysteresis, smoothing, and dead-banding are properties of a tick,
//! not of a curve, and are applied by [`crate::engine::Engine::tick`] around a call to
//! [`interpolate`].

use crate::constants::curve as curve_const;

/// Piecewise-linear interpolation over temperature-sorted points, clamped at both ends.
/// A single-point curve returns that point's duty for every temperature.
pub fn interpolate(points: &[crate::data::CurvePoint], temp: f32) -> f32 {
    if points.is_empty() {
        return curve_const::FALLBACK_FAN_PERCENT;
    }
    let first = &points[0];
    let last = points.last().unwrap();

    if temp <= first.temperature {
        return first.fan_percent;
    }
    if temp >= last.temperature {
        return last.fan_percent;
    }

    for window in points.windows(2) {
        let lo = &window[0];
        let hi = &window[1];
        if temp >= lo.temperature && temp <= hi.temperature {
            let span = hi.temperature - lo.temperature;
            if span.abs() < curve_const::FLOAT_EPSILON {
                return lo.fan_percent;
            }
            let ratio = (temp - lo.temperature) / span;
            return lo.fan_percent + ratio * (hi.fan_percent - lo.fan_percent);
        }
    }
    curve_const::FALLBACK_FAN_PERCENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CurvePoint;

    fn pts(v: &[(f32, f32)]) -> Vec<CurvePoint> {
        v.iter()
            .map(|&(t, p)| CurvePoint { temperature: t, fan_percent: p })
            .collect()
    }

    #[test]
    fn single_point_is_constant() {
        let points = pts(&[(50.0, 42.0)]);
        assert_eq!(interpolate(&points, 0.0), 42.0);
        assert_eq!(interpolate(&points, 100.0), 42.0);
    }

    #[test]
    fn clamps_below_and_above() {
        let points = pts(&[(20.0, 20.0), (80.0, 80.0)]);
        assert_eq!(interpolate(&points, 10.0), 20.0);
        assert_eq!(interpolate(&points, 90.0), 80.0);
        assert_eq!(interpolate(&points, 50.0), 50.0);
    }
}
