// AVI INPUT - single-pass uncompressed AVI frame reader
//
// Opens a RIFF/AVI stream, parses the header area once, then hands out
// video frames on demand. Opening fails closed: a file that does not parse
// completely never produces an AviInput.
//
// Not for concurrent use; every advancing call takes &mut self and the
// returned frame borrows the reader's single buffer.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::avi_header::{HeaderParser, MainHeader, StreamDescriptor, StreamKind};
use crate::byte_cursor::ByteCursor;
use crate::config::InputConfig;
use crate::error::{AviError, Result};
use crate::frame_demux::{DemuxState, FrameDemuxer, FrameInfo};
use crate::riff::ChunkStack;

// ============================================================================
// Status
// ============================================================================

/// Caller-visible status of an open file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AviInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub num_frames: u32,
    pub current_frame: u32,
    pub has_video_stream: bool,
    pub has_audio_stream: bool,
    pub ignoring_video: bool,
    pub ignoring_audio: bool,
    pub completed: bool,
    pub invalid_file: bool,
}

impl AviInfo {
    fn invalid() -> Self {
        Self {
            invalid_file: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// Reader
// ============================================================================

pub struct AviInput<R: Read + Seek> {
    cursor: ByteCursor<R>,
    stack: ChunkStack,
    demuxer: FrameDemuxer,
    info: AviInfo,
    main_header: MainHeader,
    video: StreamDescriptor,
    audio: Option<StreamDescriptor>,
}

impl<R: Read + Seek> AviInput<R> {
    /// Parse the header area of `reader` and park on the first frame.
    pub fn open(reader: R, config: &InputConfig) -> Result<Self> {
        let mut cursor = ByteCursor::new(reader)?;
        // RIFF 1.0 sizes are 32-bit
        if cursor.length() > u32::MAX as u64 + 8 {
            return Err(AviError::FileTooLarge(cursor.length()));
        }

        let mut stack = ChunkStack::new(config.max_list_depth, config.max_chunk_hops);
        let headers = HeaderParser::new(config).parse(&mut cursor, &mut stack)?;

        tracing::info!(
            "Opened AVI: {}x{} @ {:.2} fps, {} frames{}",
            headers.info.width,
            headers.info.height,
            headers.info.frame_rate,
            headers.info.num_frames,
            if headers.info.has_audio_stream { " (+audio, discarded)" } else { "" }
        );

        let mut info = headers.info;
        let mut demuxer = FrameDemuxer::new(headers.video.clone(), headers.frame_buffer, info.frame_rate);
        if headers.empty_movi {
            demuxer.complete(&mut info);
        }

        Ok(Self {
            cursor,
            stack,
            demuxer,
            info,
            main_header: headers.main,
            video: headers.video,
            audio: headers.audio,
        })
    }

    /// Like `open` with default limits, but reports failure as `None`.
    pub fn from_reader(reader: R) -> Option<Self> {
        match Self::open(reader, &InputConfig::default()) {
            Ok(input) => Some(input),
            Err(e) if e.is_structural() => {
                tracing::warn!("Malformed AVI stream: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!("Unsupported AVI stream: {}", e);
                None
            }
        }
    }

    /// Status after a parse attempt; `invalid_file` is set on any failure.
    pub fn scan_info(reader: R, config: &InputConfig) -> AviInfo {
        match Self::open(reader, config) {
            Ok(input) => input.info,
            Err(e) => {
                tracing::debug!("AVI scan failed: {}", e);
                AviInfo::invalid()
            }
        }
    }

    pub fn current_info(&self) -> &AviInfo {
        &self.info
    }

    pub fn main_header(&self) -> &MainHeader {
        &self.main_header
    }

    pub fn video_stream(&self) -> &StreamDescriptor {
        &self.video
    }

    pub fn audio_stream(&self) -> Option<&StreamDescriptor> {
        self.audio.as_ref()
    }

    pub fn demux_state(&self) -> DemuxState {
        self.demuxer.state()
    }

    /// Report `real_time_step` seconds of elapsed time; true when the next
    /// frame should be shown.
    pub fn is_frame_available(&mut self, real_time_step: f64) -> bool {
        self.demuxer.is_frame_available(real_time_step)
    }

    /// Next video frame. The payload is only valid until the next call.
    pub fn next_frame(&mut self) -> Result<Option<FrameInfo<'_>>> {
        if self.info.ignoring_video {
            return Ok(None);
        }
        self.demuxer.next_frame(&mut self.cursor, &mut self.stack, &mut self.info)
    }

    /// Stop surfacing a stream. Audio is never surfaced, so ignoring it
    /// only records the request; ignoring video makes `next_frame` return
    /// `None` without reading further.
    pub fn ignore_stream(&mut self, kind: StreamKind) {
        match kind {
            StreamKind::Video => self.info.ignoring_video = true,
            StreamKind::Audio => self.info.ignoring_audio = true,
        }
        tracing::debug!("Ignoring {:?} stream", kind);
    }
}

impl AviInput<BufReader<File>> {
    pub fn open_file(path: impl AsRef<Path>, config: &InputConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::open(BufReader::new(file), config)
    }

    /// Open a file with default limits; `None` if it is missing or invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Self::open_file(path, &InputConfig::default()) {
            Ok(input) => Some(input),
            Err(e) => {
                tracing::warn!("Could not open {:?}: {}", path, e);
                None
            }
        }
    }
}

// ============================================================================
// Probe
// ============================================================================

#[derive(Serialize)]
struct ProbeReport<'a> {
    info: &'a AviInfo,
    main_header: &'a MainHeader,
    video: &'a StreamDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<&'a StreamDescriptor>,
}

/// Header metadata of an AVI file as JSON.
pub fn avi_probe(path: impl AsRef<Path>) -> Result<serde_json::Value> {
    let input = AviInput::open_file(path, &InputConfig::default())?;
    probe_value(&input)
}

pub fn probe_value<R: Read + Seek>(input: &AviInput<R>) -> Result<serde_json::Value> {
    let report = ProbeReport {
        info: input.current_info(),
        main_header: input.main_header(),
        video: input.video_stream(),
        audio: input.audio_stream(),
    };
    Ok(serde_json::to_value(report)?)
}
