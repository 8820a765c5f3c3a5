//! Sine generators for test tones and demo scenes
//!
//! Each fill overwrites the whole buffer. "Left" is channel 0 and "right" is
//! channel 1; extra channels are left silent and mono buffers only receive
//! the left signal.

use std::f64::consts::TAU;

use super::AudioBuffer;
use crate::codec::float_to_fixed;

/// Middle C
const C4: f64 = 261.6;
const E4: f64 = 329.63;
const G4: f64 = 392.0;
/// Three octaves above C3
const LOW_DRONE: f64 = 3.0 * 130.81;

/// Frames between left/right swaps in [`fill_sine_stereo_alternating`]
const SWAP_INTERVAL: usize = 10_000;

#[inline]
fn sine(amplitude: f64, freq: f64, index: usize, sample_rate: u32) -> i16 {
    let t = index as f64 / sample_rate as f64;
    float_to_fixed((amplitude * (TAU * freq * t).sin()) as f32)
}

/// Write `(left, right)` for every frame, produced by `f(frame)`
fn fill_frames(buffer: &mut AudioBuffer, mut f: impl FnMut(usize) -> (i16, i16)) {
    let channels = buffer.channels() as usize;
    for (frame, chunk) in buffer.samples_mut().chunks_exact_mut(channels).enumerate() {
        let (left, right) = f(frame);
        chunk.fill(0);
        chunk[0] = left;
        if channels > 1 {
            chunk[1] = right;
        }
    }
}

/// Same half-amplitude low drone on both channels
pub fn fill_sine_stereo_low(buffer: &mut AudioBuffer, sample_rate: u32) {
    fill_frames(buffer, |i| {
        let s = sine(0.5, LOW_DRONE, i, sample_rate);
        (s, s)
    });
}

/// Tone that hops between ears every 10000 frames
///
/// Starts on the left at middle C, then the right an octave higher.
pub fn fill_sine_stereo_alternating(buffer: &mut AudioBuffer, sample_rate: u32) {
    let mut left = true;
    fill_frames(buffer, |i| {
        if i > 0 && i % SWAP_INTERVAL == 0 {
            left = !left;
        }
        if left {
            (sine(0.33333, C4, i, sample_rate), 0)
        } else {
            (0, sine(0.33333, 2.0 * C4, i, sample_rate))
        }
    });
}

/// Building C major chord in the first half, full-scale octave tone in the second
///
/// Works on the flat sample array regardless of channel layout.
pub fn fill_sine_mono_chord(buffer: &mut AudioBuffer, sample_rate: u32) {
    let samples = buffer.samples_mut();
    let half = samples.len() / 2;

    for (i, sample) in samples[..half].iter_mut().enumerate() {
        let mut s = sine(0.33333, C4, i, sample_rate);
        if i >= 10_000 {
            s = s.wrapping_add(sine(0.33333, E4, i, sample_rate));
        }
        if i >= 20_000 {
            s = s.wrapping_add(sine(0.33333, G4, i, sample_rate));
        }
        *sample = s;
    }

    for (i, sample) in samples[half..2 * half].iter_mut().enumerate() {
        *sample = sine(1.0, 2.0 * C4, i, sample_rate);
    }
}

/// Independent sine per ear: `(frequency, amplitude)` for left and right
pub fn fill_two_tone(
    buffer: &mut AudioBuffer,
    sample_rate: u32,
    left: (f64, f64),
    right: (f64, f64),
) {
    fill_frames(buffer, |i| {
        (
            sine(left.1, left.0, i, sample_rate),
            sine(right.1, right.0, i, sample_rate),
        )
    });
}

/// Constant value on every channel, mostly useful in tests
pub fn fill_constant(buffer: &mut AudioBuffer, value: f32) {
    buffer.samples_mut().fill(float_to_fixed(value));
}
