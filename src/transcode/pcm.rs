//! Per-layout sample conversion
//!
//! Every function converts whole raw frames from `raw` into interleaved
//! stereo frames in `out`. Frames are processed until either side runs out,
//! so a zero-filled tail in `raw` becomes silence in `out`.

/// Sign bit of a 24-bit sample
const S24_SIGN_BIT: i32 = 0x0080_0000;
/// Bits OR-ed in to sign-extend a negative 24-bit sample into 32 bits
const S24_SIGN_EXTENSION: u32 = 0xFF80_0000;
/// Magnitude bits of a positive 24-bit sample
const S24_MAGNITUDE_MASK: i32 = 0x007F_FFFF;

/// Assemble a little-endian 24-bit sample into a sign-extended i32
#[inline]
pub fn decode_s24(b0: u8, b1: u8, b2: u8) -> i32 {
    let raw = i32::from(b0) | (i32::from(b1) << 8) | (i32::from(b2) << 16);
    if raw & S24_SIGN_BIT != 0 {
        (raw as u32 | S24_SIGN_EXTENSION) as i32
    } else {
        raw & S24_MAGNITUDE_MASK
    }
}

#[inline]
fn decode_s16(b0: u8, b1: u8) -> i16 {
    i16::from_le_bytes([b0, b1])
}

/// 16-bit mono: one sample per 2 bytes, duplicated to both channels
pub fn mono16(raw: &[u8], out: &mut [i16]) {
    for (bytes, frame) in raw.chunks_exact(2).zip(out.chunks_exact_mut(2)) {
        let sample = decode_s16(bytes[0], bytes[1]);
        frame[0] = sample;
        frame[1] = sample;
    }
}

/// 16-bit stereo: already interleaved, passed through unchanged
pub fn stereo16(raw: &[u8], out: &mut [i16]) {
    for (bytes, sample) in raw.chunks_exact(2).zip(out.iter_mut()) {
        *sample = decode_s16(bytes[0], bytes[1]);
    }
}

/// 24-bit mono: one sample per 3 bytes, sign-extended and duplicated
pub fn mono24(raw: &[u8], out: &mut [i32]) {
    for (bytes, frame) in raw.chunks_exact(3).zip(out.chunks_exact_mut(2)) {
        let sample = decode_s24(bytes[0], bytes[1], bytes[2]);
        frame[0] = sample;
        frame[1] = sample;
    }
}

/// 24-bit stereo: L(3) + R(3) bytes, each channel sign-extended into 24-in-32
pub fn stereo24(raw: &[u8], out: &mut [i32]) {
    for (bytes, frame) in raw.chunks_exact(6).zip(out.chunks_exact_mut(2)) {
        frame[0] = decode_s24(bytes[0], bytes[1], bytes[2]);
        frame[1] = decode_s24(bytes[3], bytes[4], bytes[5]);
    }
}
