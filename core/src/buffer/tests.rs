//! Buffer, pool and waveform tests

use super::waveform::{
    fill_constant, fill_sine_mono_chord, fill_sine_stereo_alternating, fill_sine_stereo_low,
    fill_two_tone,
};
use super::*;
use crate::codec::{FIXED_MAX, float_to_fixed};

const RATE: u32 = 44_100;

fn stereo(frames: usize) -> AudioBuffer {
    AudioBuffer::new(frames * 2, 2, Some(DeviceHandle::next())).unwrap()
}

#[test]
fn test_new_buffer_is_silent_and_stopped() {
    let buffer = stereo(100);
    assert_eq!(buffer.sample_count(), 200);
    assert_eq!(buffer.frame_count(), 100);
    assert_eq!(buffer.cursor(), 0);
    assert!(!buffer.is_playing());
    assert!(buffer.samples().iter().all(|&s| s == 0));
}

#[test]
fn test_zero_channels_rejected() {
    let result = AudioBuffer::new(10, 0, Some(DeviceHandle::next()));
    assert!(matches!(result, Err(AudioError::InvalidConfig(_))));
}

#[test]
fn test_sample_at_reads_interleaved_channels() {
    let mut buffer = stereo(4);
    buffer.samples_mut()[6] = float_to_fixed(0.5);
    buffer.samples_mut()[7] = float_to_fixed(-0.25);

    assert!((buffer.left_at(3) - 0.5).abs() < 1e-4);
    assert!((buffer.right_at(3) + 0.25).abs() < 1e-4);
    assert_eq!(buffer.left_at(2), 0.0);
}

#[test]
fn test_sample_at_past_end_is_silence() {
    let mut buffer = stereo(4);
    fill_constant(&mut buffer, 0.5);

    assert!(buffer.left_at(3) > 0.0);
    assert_eq!(buffer.left_at(4), 0.0);
    assert_eq!(buffer.right_at(1_000_000), 0.0);
    assert_eq!(buffer.sample_at(0, usize::MAX), 0.0);
}

#[test]
fn test_sample_at_unknown_channel_is_silence() {
    let mut buffer = stereo(4);
    fill_constant(&mut buffer, 0.5);
    assert_eq!(buffer.sample_at(2, 0), 0.0);

    let mut mono = AudioBuffer::new(4, 1, Some(DeviceHandle::next())).unwrap();
    fill_constant(&mut mono, 0.5);
    assert!(mono.left_at(0) > 0.0);
    assert_eq!(mono.right_at(0), 0.0);
}

#[test]
fn test_play_and_pause_without_device() {
    let mut buffer = AudioBuffer::new(10, 2, None).unwrap();
    assert_eq!(buffer.play(), Err(AudioError::NoDevice));
    assert!(!buffer.is_playing());
    assert_eq!(buffer.pause(), Err(AudioError::NoDevice));
}

#[test]
fn test_play_pause_toggle() {
    let mut buffer = stereo(10);
    buffer.play().unwrap();
    assert!(buffer.is_playing());
    buffer.play().unwrap();
    assert!(buffer.is_playing());
    buffer.pause().unwrap();
    assert!(!buffer.is_playing());
}

#[test]
fn test_seek_is_not_validated() {
    let mut buffer = stereo(10);
    buffer.seek(500);
    assert_eq!(buffer.cursor(), 500);
    assert_eq!(buffer.remaining_frames(), 0);
    assert!(buffer.is_finished());

    buffer.seek_to_start();
    assert_eq!(buffer.cursor(), 0);
    assert_eq!(buffer.remaining_frames(), 10);
}

#[test]
fn test_next_chunk_truncates_at_end() {
    let mut buffer = stereo(10);
    buffer.play().unwrap();

    assert_eq!(buffer.next_chunk(4).map(<[i16]>::len), Some(8));
    buffer.advance(8);
    assert_eq!(buffer.next_chunk(4).map(<[i16]>::len), Some(4));
    buffer.advance(2);
    assert!(buffer.next_chunk(4).is_none());
}

#[test]
fn test_next_chunk_none_when_paused() {
    let mut buffer = stereo(10);
    assert!(buffer.next_chunk(4).is_none());
    buffer.play().unwrap();
    buffer.pause().unwrap();
    assert!(buffer.next_chunk(4).is_none());
}

#[test]
fn test_odd_trailing_sample_is_not_a_frame() {
    let mut buffer = AudioBuffer::new(7, 2, Some(DeviceHandle::next())).unwrap();
    buffer.play().unwrap();
    assert_eq!(buffer.frame_count(), 3);
    assert_eq!(buffer.next_chunk(10).map(<[i16]>::len), Some(6));
}

#[test]
fn test_advance_saturates() {
    let mut buffer = stereo(1);
    buffer.seek(usize::MAX - 1);
    buffer.advance(10);
    assert_eq!(buffer.cursor(), usize::MAX);
}

// ------------------------------------------------------------------
// Pool
// ------------------------------------------------------------------

#[test]
fn test_pool_insert_and_get() {
    let mut pool = BufferPool::new();
    assert!(pool.is_empty());

    let a = pool.insert(stereo(1));
    let b = pool.insert(stereo(2));
    assert_ne!(a, b);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.get(a).unwrap().frame_count(), 1);
    assert_eq!(pool.get(b).unwrap().frame_count(), 2);
}

#[test]
fn test_pool_stale_id_never_resolves() {
    let mut pool = BufferPool::new();
    let old = pool.insert(stereo(1));
    assert!(pool.remove(old).is_some());
    assert!(!pool.contains(old));
    assert!(pool.remove(old).is_none());

    // Reuses the slot under a new generation
    let new = pool.insert(stereo(3));
    assert_eq!(new.index(), old.index());
    assert_ne!(new, old);
    assert!(pool.get(old).is_none());
    assert!(pool.get_mut(old).is_none());
    assert_eq!(pool.get(new).unwrap().frame_count(), 3);
    assert_eq!(pool.len(), 1);
}

// ------------------------------------------------------------------
// Waveforms
// ------------------------------------------------------------------

#[test]
fn test_stereo_low_is_identical_on_both_ears() {
    let mut buffer = stereo(2_000);
    fill_sine_stereo_low(&mut buffer, RATE);

    let half = (0.5 * FIXED_MAX as f32) as i16;
    for frame in buffer.samples().chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
        assert!(frame[0].abs() <= half);
    }
    assert_eq!(buffer.samples()[0], 0);
    assert!(buffer.samples().iter().any(|&s| s != 0));
}

#[test]
fn test_stereo_alternating_swaps_every_ten_thousand_frames() {
    let mut buffer = stereo(25_000);
    fill_sine_stereo_alternating(&mut buffer, RATE);
    let s = buffer.samples();

    // Left only
    assert!((0..10_000).all(|f| s[f * 2 + 1] == 0));
    assert!((0..10_000).any(|f| s[f * 2] != 0));
    // Right only
    assert!((10_000..20_000).all(|f| s[f * 2] == 0));
    assert!((10_000..20_000).any(|f| s[f * 2 + 1] != 0));
    // Back to the left
    assert!((20_000..25_000).all(|f| s[f * 2 + 1] == 0));
}

#[test]
fn test_mono_chord_second_half_is_full_scale() {
    let mut buffer = AudioBuffer::new(2 * RATE as usize, 1, Some(DeviceHandle::next())).unwrap();
    fill_sine_mono_chord(&mut buffer, RATE);
    let s = buffer.samples();
    let half = s.len() / 2;

    let single = (0.33333 * FIXED_MAX as f32) as i16 + 1;
    assert!(s[..10_000].iter().all(|v| v.abs() <= single));

    let peak = s[half..].iter().map(|v| v.unsigned_abs()).max().unwrap();
    assert!(peak > 32_000);
}

#[test]
fn test_two_tone_fills_each_ear_independently() {
    let mut buffer = stereo(4_410);
    fill_two_tone(&mut buffer, RATE, (440.0, 0.5), (0.0, 0.0));

    let s = buffer.samples();
    assert!(s.iter().skip(1).step_by(2).all(|&v| v == 0));
    let peak = s.iter().step_by(2).map(|v| v.unsigned_abs()).max().unwrap();
    assert!(peak > 16_000 && peak <= 16_384);
}

#[test]
fn test_fill_constant_sets_every_sample() {
    let mut buffer = stereo(8);
    fill_constant(&mut buffer, 2.0);
    assert!(buffer.samples().iter().all(|&v| v == FIXED_MAX));
}
