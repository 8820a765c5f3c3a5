//! Sample conversion between normalized float and 16-bit fixed point

/// Largest magnitude produced by [`float_to_fixed`].
///
/// The scale is symmetric, so `i16::MIN` is never produced.
pub const FIXED_MAX: i16 = 32767;

const SCALE: f32 = FIXED_MAX as f32;

/// Convert a normalized amplitude to fixed point.
///
/// Input is clamped to [-1.0, 1.0] before scaling and the result truncates
/// toward zero, so out-of-range sums saturate instead of wrapping.
#[inline]
pub fn float_to_fixed(f: f32) -> i16 {
    if f.is_nan() {
        return 0;
    }
    (f.clamp(-1.0, 1.0) * SCALE) as i16
}

/// Convert a fixed-point sample to a normalized amplitude.
#[inline]
pub fn fixed_to_float(v: i16) -> f32 {
    v as f32 / SCALE
}

/// Encode a float slice into `out`, stopping at the shorter of the two.
pub fn encode_slice(input: &[f32], out: &mut [i16]) -> usize {
    let n = input.len().min(out.len());
    for (dst, &src) in out[..n].iter_mut().zip(input) {
        *dst = float_to_fixed(src);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_bound() {
        let step = 1.0 / 4096.0;
        let mut f = -1.0f32;
        while f <= 1.0 {
            let back = fixed_to_float(float_to_fixed(f));
            assert!(
                (back - f).abs() <= 1.0 / 32767.0 + f32::EPSILON,
                "round trip of {} gave {}",
                f,
                back
            );
            f += step;
        }
    }

    #[test]
    fn test_saturation() {
        assert_eq!(float_to_fixed(2.0), 32767);
        assert_eq!(float_to_fixed(1.0), 32767);
        assert_eq!(float_to_fixed(-5.0), -32767);
        assert_eq!(float_to_fixed(-1.0), -32767);
        assert_eq!(float_to_fixed(f32::INFINITY), 32767);
        assert_eq!(float_to_fixed(f32::NEG_INFINITY), -32767);
    }

    #[test]
    fn test_truncates_toward_zero() {
        // 0.5 * 32767 = 16383.5
        assert_eq!(float_to_fixed(0.5), 16383);
        assert_eq!(float_to_fixed(-0.5), -16383);
        assert_eq!(float_to_fixed(0.0), 0);
    }

    #[test]
    fn test_nan_is_silence() {
        assert_eq!(float_to_fixed(f32::NAN), 0);
    }

    #[test]
    fn test_fixed_to_float_scale() {
        assert_eq!(fixed_to_float(0), 0.0);
        assert_eq!(fixed_to_float(32767), 1.0);
        assert_eq!(fixed_to_float(-32767), -1.0);
        assert!(fixed_to_float(i16::MIN) < -1.0);
    }

    #[test]
    fn test_encode_slice_stops_at_shorter() {
        let mut fixed = [0i16; 2];
        assert_eq!(encode_slice(&[1.0, -1.0, 0.5], &mut fixed), 2);
        assert_eq!(fixed, [32767, -32767]);

        let mut long = [7i16; 4];
        assert_eq!(encode_slice(&[0.5], &mut long), 1);
        assert_eq!(long, [16383, 7, 7, 7]);
    }
}
