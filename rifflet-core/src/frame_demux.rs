//! Frame demuxing and pacing
//!
//! Walks the 'movi' list one chunk at a time. Chunks that do not belong to
//! the selected video stream (interleaved audio, index chunks, anything
//! unknown) are skipped; the next video chunk is copied into a single
//! reused buffer and lent to the caller until the following call.
//!
//! Pacing is a polling policy: the caller reports elapsed time once per
//! tick and asks whether the next frame is due.

use std::io::{Read, Seek};

use serde::Serialize;

use crate::avi_header::{StreamDescriptor, StreamKind};
use crate::avi_input::AviInfo;
use crate::byte_cursor::ByteCursor;
use crate::error::{AviError, Result};
use crate::riff::{ChunkStack, MOVI};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DemuxState {
    Waiting,
    FrameReady,
    Completed,
    Invalid,
}

/// One delivered frame, borrowing the demuxer's buffer.
///
/// Video payloads are bottom-up 24-bit DIB rows, passed through untouched.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    pub kind: StreamKind,
    pub size: u32,
    pub data: &'a [u8],
}

impl FrameInfo<'_> {
    /// Copy the payload out so it survives the next `next_frame()`.
    pub fn to_owned_frame(&self) -> OwnedFrame {
        OwnedFrame {
            kind: self.kind,
            data: self.data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub kind: StreamKind,
    pub data: Vec<u8>,
}

pub struct FrameDemuxer {
    state: DemuxState,
    video: StreamDescriptor,
    buffer: Vec<u8>,
    /// seconds per frame
    frame_period: f64,
    /// seconds accumulated since the last delivered frame
    frame_time: f64,
    polled: bool,
}

impl FrameDemuxer {
    pub fn new(video: StreamDescriptor, buffer: Vec<u8>, frame_rate: f64) -> Self {
        Self {
            state: DemuxState::Waiting,
            video,
            buffer,
            frame_period: 1.0 / frame_rate,
            frame_time: 0.0,
            polled: false,
        }
    }

    pub fn state(&self) -> DemuxState {
        self.state
    }

    /// Add `elapsed` seconds to the frame timer and report whether a frame
    /// is due. The very first poll always says yes.
    pub fn is_frame_available(&mut self, elapsed: f64) -> bool {
        let first = !self.polled;
        self.polled = true;
        self.frame_time += elapsed;

        let live = matches!(self.state, DemuxState::Waiting | DemuxState::FrameReady);
        let available = first || (live && self.frame_time >= self.frame_period);

        if available && self.state == DemuxState::Waiting {
            self.state = DemuxState::FrameReady;
        }
        available
    }

    /// Deliver the next video frame, or `None` once the stream is done.
    pub fn next_frame<R: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<R>,
        stack: &mut ChunkStack,
        info: &mut AviInfo,
    ) -> Result<Option<FrameInfo<'_>>> {
        match self.state {
            DemuxState::Completed => return Ok(None),
            DemuxState::Invalid => return Err(AviError::InvalidFile),
            DemuxState::Waiting | DemuxState::FrameReady => {}
        }

        self.frame_time = 0.0;

        match self.advance(cursor, stack, info) {
            Ok(Some(size)) => Ok(Some(FrameInfo {
                kind: StreamKind::Video,
                size: size as u32,
                data: &self.buffer[..size],
            })),
            Ok(None) => {
                tracing::debug!("movi exhausted after {} frames", info.current_frame);
                self.complete(info);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Demuxing stopped at {}: {}", cursor.position(), e);
                self.state = DemuxState::Invalid;
                info.invalid_file = true;
                Err(e)
            }
        }
    }

    pub(crate) fn complete(&mut self, info: &mut AviInfo) {
        self.state = DemuxState::Completed;
        info.completed = true;
    }

    /// Find, copy and close the next video chunk. Returns its size, or
    /// None when 'movi' ends first.
    fn advance<R: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<R>,
        stack: &mut ChunkStack,
        info: &mut AviInfo,
    ) -> Result<Option<usize>> {
        let chunk = loop {
            if !stack.is_inside(MOVI) {
                return Ok(None);
            }

            if let Some(chunk) = stack.current_chunk().copied() {
                if self.video.owns_chunk(chunk.fourcc) {
                    break chunk;
                }
                tracing::trace!("discard '{}' ({} bytes)", chunk.fourcc, chunk.size);
                stack.skip_rest_of_chunk(cursor)?;
                stack.close_current_chunk(cursor)?;
                continue;
            }

            stack.enter_next_chunk(cursor)?;
        };

        let size = chunk.size as usize;
        if size > self.buffer.len() {
            return Err(AviError::FrameTooLarge {
                size: chunk.size as u32,
                capacity: self.buffer.len(),
            });
        }

        cursor.read_bytes(&mut self.buffer[..size])?;
        info.current_frame += 1;

        stack.close_current_chunk(cursor)?;
        let movi_done = !stack.is_inside(MOVI);
        // a zero frame count means the header did not say
        let count_done = info.num_frames > 0 && info.current_frame >= info.num_frames;

        if movi_done || count_done {
            self.complete(info);
        } else {
            self.state = DemuxState::Waiting;
        }

        Ok(Some(size))
    }
}
