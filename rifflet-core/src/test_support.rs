//! In-memory AVI builders for tests.

use crate::riff::{FourCC, AVIH, AUDS, HDRL, JUNK, MOVI, STRF, STRH, STRL, VIDS};

/// Plain chunk, word padded.
pub fn chunk(fourcc: FourCC, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 9);
    data.extend_from_slice(fourcc.as_bytes());
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        data.push(0);
    }
    data
}

/// LIST of already-encoded children.
pub fn list(list_type: FourCC, children: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = children.iter().map(Vec::len).sum();
    let mut data = Vec::with_capacity(body + 12);
    data.extend_from_slice(b"LIST");
    data.extend_from_slice(&((body + 4) as u32).to_le_bytes());
    data.extend_from_slice(list_type.as_bytes());
    for child in children {
        data.extend_from_slice(child);
    }
    data
}

/// Append a JUNK chunk to an encoded LIST, as muxers do to reserve room
/// for an index.
pub fn with_trailing_junk(mut list: Vec<u8>, junk_len: usize) -> Vec<u8> {
    list.extend(chunk(JUNK, &vec![0u8; junk_len]));
    let size = (list.len() - 8) as u32;
    list[4..8].copy_from_slice(&size.to_le_bytes());
    list
}

/// RIFF 'AVI ' wrapper with a correct size field.
pub fn riff_avi(children: &[Vec<u8>]) -> Vec<u8> {
    let body: usize = children.iter().map(Vec::len).sum();
    let mut data = Vec::with_capacity(body + 12);
    data.extend_from_slice(b"RIFF");
    data.extend_from_slice(&((body + 4) as u32).to_le_bytes());
    data.extend_from_slice(b"AVI ");
    for child in children {
        data.extend_from_slice(child);
    }
    data
}

pub fn avih(num_frames: u32, num_streams: u32, width: u32, height: u32) -> Vec<u8> {
    let mut p = Vec::with_capacity(56);
    p.extend_from_slice(&33_333u32.to_le_bytes()); // microseconds per frame
    p.extend_from_slice(&0u32.to_le_bytes()); // max bytes per sec
    p.extend_from_slice(&0u32.to_le_bytes()); // padding granularity
    p.extend_from_slice(&0x10u32.to_le_bytes()); // flags
    p.extend_from_slice(&num_frames.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes()); // initial frames
    p.extend_from_slice(&num_streams.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes()); // suggested buffer
    p.extend_from_slice(&width.to_le_bytes());
    p.extend_from_slice(&height.to_le_bytes());
    p.extend_from_slice(&[0u8; 16]);
    chunk(AVIH, &p)
}

#[derive(Debug, Clone)]
pub struct VideoSpec {
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub rate: u32,
    pub length: u32,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub suggested_buffer_size: u32,
    pub rect: [i16; 4],
}

impl Default for VideoSpec {
    fn default() -> Self {
        Self {
            width: 4,
            height: 2,
            scale: 1,
            rate: 30,
            length: 10,
            bits_per_pixel: 24,
            compression: 0,
            suggested_buffer_size: 24,
            rect: [0, 0, 4, 2],
        }
    }
}

impl VideoSpec {
    pub fn frame_size(&self) -> usize {
        let stride = (self.width as usize * 3 + 3) & !3;
        stride * self.height as usize
    }
}

pub fn strh(
    kind: FourCC,
    scale: u32,
    rate: u32,
    length: u32,
    suggested_buffer_size: u32,
    rect: [i16; 4],
) -> Vec<u8> {
    let mut p = Vec::with_capacity(56);
    p.extend_from_slice(kind.as_bytes());
    p.extend_from_slice(b"\0\0\0\0"); // handler
    p.extend_from_slice(&0u32.to_le_bytes()); // flags
    p.extend_from_slice(&0u16.to_le_bytes()); // priority
    p.extend_from_slice(&0u16.to_le_bytes()); // language
    p.extend_from_slice(&0u32.to_le_bytes()); // initial frames
    p.extend_from_slice(&scale.to_le_bytes());
    p.extend_from_slice(&rate.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes()); // start
    p.extend_from_slice(&length.to_le_bytes());
    p.extend_from_slice(&suggested_buffer_size.to_le_bytes());
    p.extend_from_slice(&u32::MAX.to_le_bytes()); // quality
    p.extend_from_slice(&0u32.to_le_bytes()); // sample size
    for v in rect {
        p.extend_from_slice(&v.to_le_bytes());
    }
    chunk(STRH, &p)
}

pub fn bitmap_strf(spec: &VideoSpec) -> Vec<u8> {
    let mut p = Vec::with_capacity(40);
    p.extend_from_slice(&40u32.to_le_bytes());
    p.extend_from_slice(&(spec.width as i32).to_le_bytes());
    p.extend_from_slice(&(spec.height as i32).to_le_bytes());
    p.extend_from_slice(&1u16.to_le_bytes()); // planes
    p.extend_from_slice(&spec.bits_per_pixel.to_le_bytes());
    p.extend_from_slice(&spec.compression.to_le_bytes());
    p.extend_from_slice(&(spec.frame_size() as u32).to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes());
    p.extend_from_slice(&0i32.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes());
    p.extend_from_slice(&0u32.to_le_bytes());
    chunk(STRF, &p)
}

pub fn video_strl(spec: &VideoSpec) -> Vec<u8> {
    list(
        STRL,
        &[
            strh(VIDS, spec.scale, spec.rate, spec.length, spec.suggested_buffer_size, spec.rect),
            bitmap_strf(spec),
        ],
    )
}

pub fn audio_strl() -> Vec<u8> {
    // WAVEFORMATEX: PCM, stereo, 44.1kHz, 16-bit, cbSize 0
    let mut wave = Vec::with_capacity(18);
    wave.extend_from_slice(&1u16.to_le_bytes());
    wave.extend_from_slice(&2u16.to_le_bytes());
    wave.extend_from_slice(&44_100u32.to_le_bytes());
    wave.extend_from_slice(&176_400u32.to_le_bytes());
    wave.extend_from_slice(&4u16.to_le_bytes());
    wave.extend_from_slice(&16u16.to_le_bytes());
    wave.extend_from_slice(&0u16.to_le_bytes());
    list(
        STRL,
        &[strh(AUDS, 1, 44_100, 0, 4096, [0; 4]), chunk(STRF, &wave)],
    )
}

/// Payload filled with the frame number so tests can tell frames apart.
pub fn frame_payload(n: u8, size: usize) -> Vec<u8> {
    vec![n; size]
}

/// Video (stream 0) plus optional audio (stream 1) with `frames`
/// interleaved frames, each followed by an audio chunk.
pub fn interleaved_avi(spec: &VideoSpec, frames: u8, with_audio: bool) -> Vec<u8> {
    let streams = if with_audio { 2 } else { 1 };
    let mut strls = vec![avih(spec.length, streams, spec.width, spec.height), video_strl(spec)];
    if with_audio {
        strls.push(audio_strl());
    }

    let mut movi = Vec::new();
    for n in 0..frames {
        movi.push(chunk(FourCC(*b"00db"), &frame_payload(n + 1, spec.frame_size())));
        if with_audio {
            movi.push(chunk(FourCC(*b"01wb"), &[0x55; 7]));
        }
    }

    riff_avi(&[list(HDRL, &strls), list(MOVI, &movi)])
}
