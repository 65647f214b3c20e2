// AVI HEADER PARSER
//
// One pass over the front of the file:
//
// RIFF 'AVI '
// ├── LIST 'hdrl'
// │   ├── avih (main header)
// │   └── LIST 'strl' (per stream)
// │       ├── strh (stream header)
// │       └── strf (stream format)
// └── LIST 'movi'   <- cursor is left on the first chunk in here
//
// Only uncompressed 24-bit DIB video is accepted. Audio is recognised so
// its chunks can be told apart, but its format is not parsed.

use std::io::{Read, Seek};

use serde::{Deserialize, Serialize};

use crate::avi_input::AviInfo;
use crate::byte_cursor::ByteCursor;
use crate::config::InputConfig;
use crate::error::{AviError, Result};
use crate::riff::{ChunkStack, Entered, FourCC, AUDS, AVIH, AVI_, HDRL, MOVI, RIFF, STRF, STRH, STRL, VIDS};

// ============================================================================
// Main Header (AVIH)
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MainHeader {
    pub microsec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: u32,
    pub total_frames: u32,
    pub initial_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
    pub reserved: [u32; 4],
}

impl MainHeader {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        Ok(Self {
            microsec_per_frame: cursor.read_u32()?,
            max_bytes_per_sec: cursor.read_u32()?,
            padding_granularity: cursor.read_u32()?,
            flags: cursor.read_u32()?,
            total_frames: cursor.read_u32()?,
            initial_frames: cursor.read_u32()?,
            streams: cursor.read_u32()?,
            suggested_buffer_size: cursor.read_u32()?,
            width: cursor.read_u32()?,
            height: cursor.read_u32()?,
            reserved: [
                cursor.read_u32()?,
                cursor.read_u32()?,
                cursor.read_u32()?,
                cursor.read_u32()?,
            ],
        })
    }

    fn frame_rate(&self) -> Option<f64> {
        (self.microsec_per_frame > 0).then(|| 1_000_000.0 / self.microsec_per_frame as f64)
    }
}

// ============================================================================
// Stream Header (STRH)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameRect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

impl FrameRect {
    /// (width, height), or None for an empty or inverted rectangle.
    fn size(&self) -> Option<(u32, u32)> {
        let w = self.right as i32 - self.left as i32;
        let h = self.bottom as i32 - self.top as i32;
        (w > 0 && h > 0).then_some((w as u32, h as u32))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamHeader {
    pub fcc_type: FourCC,     // vids, auds, ...
    pub fcc_handler: FourCC,
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
    pub frame: FrameRect,
}

impl StreamHeader {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        Ok(Self {
            fcc_type: cursor.read_fourcc()?,
            fcc_handler: cursor.read_fourcc()?,
            flags: cursor.read_u32()?,
            priority: cursor.read_u16()?,
            language: cursor.read_u16()?,
            initial_frames: cursor.read_u32()?,
            scale: cursor.read_u32()?,
            rate: cursor.read_u32()?,
            start: cursor.read_u32()?,
            length: cursor.read_u32()?,
            suggested_buffer_size: cursor.read_u32()?,
            quality: cursor.read_u32()?,
            sample_size: cursor.read_u32()?,
            frame: FrameRect {
                left: cursor.read_i16()?,
                top: cursor.read_i16()?,
                right: cursor.read_i16()?,
                bottom: cursor.read_i16()?,
            },
        })
    }

    fn frame_rate(&self) -> Option<f64> {
        (self.scale > 0 && self.rate > 0).then(|| self.rate as f64 / self.scale as f64)
    }
}

// ============================================================================
// Video Format (BITMAPINFOHEADER)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32, // negative = top-down
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub compression: u32,
    pub image_size: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub colors_used: u32,
    pub colors_important: u32,
}

impl BitmapInfoHeader {
    fn read<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<Self> {
        Ok(Self {
            size: cursor.read_u32()?,
            width: cursor.read_i32()?,
            height: cursor.read_i32()?,
            planes: cursor.read_u16()?,
            bits_per_pixel: cursor.read_u16()?,
            compression: cursor.read_u32()?,
            image_size: cursor.read_u32()?,
            x_pels_per_meter: cursor.read_i32()?,
            y_pels_per_meter: cursor.read_i32()?,
            colors_used: cursor.read_u32()?,
            colors_important: cursor.read_u32()?,
        })
    }

    /// Bytes in one frame: rows padded to 4 bytes.
    fn dib_size(&self) -> usize {
        let stride = (self.width.unsigned_abs() as usize * self.bits_per_pixel as usize).div_ceil(32) * 4;
        stride * self.height.unsigned_abs() as usize
    }
}

// ============================================================================
// Stream descriptors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub frame_count: u32,
    pub bits_per_pixel: u16,
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamDescriptor {
    pub index: u32,
    pub kind: StreamKind,
    pub fourcc: FourCC,
    pub handler: FourCC,
    /// Tag of this stream's data chunks inside 'movi'
    pub chunk_tag: FourCC,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt_chunk_tag: Option<FourCC>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoFormat>,
}

impl StreamDescriptor {
    pub fn owns_chunk(&self, tag: FourCC) -> bool {
        tag == self.chunk_tag || Some(tag) == self.alt_chunk_tag
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Everything learned from the header area.
#[derive(Debug)]
pub struct AviHeaders {
    pub main: MainHeader,
    pub video: StreamDescriptor,
    pub audio: Option<StreamDescriptor>,
    pub info: AviInfo,
    /// Reused frame buffer sized for the video stream
    pub frame_buffer: Vec<u8>,
    /// 'movi' was present but held nothing
    pub empty_movi: bool,
}

pub struct HeaderParser<'a> {
    config: &'a InputConfig,
    info: AviInfo,
    video: Option<StreamDescriptor>,
    audio: Option<StreamDescriptor>,
    frame_buffer: Vec<u8>,
    stream_index: u32,
}

impl<'a> HeaderParser<'a> {
    pub fn new(config: &'a InputConfig) -> Self {
        Self {
            config,
            info: AviInfo::default(),
            video: None,
            audio: None,
            frame_buffer: Vec::new(),
            stream_index: 0,
        }
    }

    /// Parse from the top of the file, leaving the cursor on the first
    /// chunk inside 'movi'.
    pub fn parse<R: Read + Seek>(
        mut self,
        cursor: &mut ByteCursor<R>,
        stack: &mut ChunkStack,
    ) -> Result<AviHeaders> {
        Self::read_riff_header(cursor)?;

        stack.enter_next_chunk(cursor)?;
        if stack.current_list().map(|l| l.fourcc) != Some(HDRL) {
            return Err(AviError::MissingChunk("hdrl"));
        }
        if stack.current_chunk().map(|c| c.fourcc) != Some(AVIH) {
            return Err(AviError::MissingChunk("avih"));
        }

        let main = MainHeader::read(cursor)?;
        tracing::debug!(
            "avih: {}x{}, {} frames, {} streams, {} us/frame",
            main.width,
            main.height,
            main.total_frames,
            main.streams,
            main.microsec_per_frame
        );
        stack.skip_rest_of_chunk(cursor)?;
        stack.close_current_chunk(cursor)?;

        let mut empty_movi = false;
        loop {
            if cursor.remaining() == 0 {
                return Err(AviError::MissingChunk("movi"));
            }
            let entered = stack.enter_next_chunk(cursor)?;
            if stack.is_inside(MOVI) {
                break;
            }
            if entered == Entered::ListClosed {
                if stack.state().last_closed() == Some(MOVI) {
                    empty_movi = true;
                    break;
                }
                continue;
            }

            let in_strl = stack.current_list().map(|l| l.fourcc) == Some(STRL);
            match stack.current_chunk().copied() {
                Some(chunk) if in_strl && chunk.fourcc == STRH => {
                    self.parse_stream(cursor, stack, &main)?;
                }
                Some(chunk) => {
                    tracing::debug!("Skipping '{}' ({} bytes) before movi", chunk.fourcc, chunk.size);
                    stack.skip_rest_of_chunk(cursor)?;
                    stack.close_current_chunk(cursor)?;
                }
                None => {}
            }
        }

        let video = self.video.ok_or(AviError::MissingVideoStream)?;
        if empty_movi {
            tracing::debug!("movi holds no chunks");
        } else {
            tracing::debug!("movi reached at {}, video chunks tagged '{}'", cursor.position(), video.chunk_tag);
        }

        Ok(AviHeaders {
            main,
            video,
            audio: self.audio,
            info: self.info,
            frame_buffer: self.frame_buffer,
            empty_movi,
        })
    }

    fn read_riff_header<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<()> {
        if cursor.length() == 0 {
            return Err(AviError::EmptyStream);
        }
        if cursor.read_fourcc()? != RIFF {
            return Err(AviError::InvalidRiff);
        }
        // size excludes the tag and size fields
        let declared = cursor.read_u32()? as u64 + 8;
        let form = cursor.read_fourcc()?;
        if form != AVI_ {
            return Err(AviError::InvalidForm(form));
        }
        if declared > cursor.length() {
            return Err(AviError::SizeExceedsLength {
                declared,
                length: cursor.length(),
            });
        }
        Ok(())
    }

    /// Cursor is on 'strh' inside a 'strl'. Consumes the whole 'strl'.
    fn parse_stream<R: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<R>,
        stack: &mut ChunkStack,
        main: &MainHeader,
    ) -> Result<()> {
        let index = self.stream_index;
        self.stream_index += 1;
        let strl_depth = stack.state().depth();

        let header = StreamHeader::read(cursor)?;
        stack.skip_rest_of_chunk(cursor)?;
        if stack.close_current_chunk(cursor)? {
            return Err(AviError::MissingChunk("strf"));
        }
        let entered = stack.enter_next_chunk(cursor)?;
        if entered != (Entered::Chunk { via_list: false })
            || stack.current_chunk().map(|c| c.fourcc) != Some(STRF)
        {
            return Err(AviError::MissingChunk("strf"));
        }

        tracing::debug!("Stream {}: type '{}', handler '{}'", index, header.fcc_type, header.fcc_handler);

        match header.fcc_type {
            VIDS if self.video.is_none() => {
                let stream = self.parse_video_format(cursor, index, &header, main)?;
                self.video = Some(stream);
            }
            AUDS if self.audio.is_none() => {
                self.info.has_audio_stream = true;
                self.audio = Some(StreamDescriptor {
                    index,
                    kind: StreamKind::Audio,
                    fourcc: header.fcc_type,
                    handler: header.fcc_handler,
                    chunk_tag: FourCC::stream_chunk(index, *b"wb"),
                    alt_chunk_tag: None,
                    video: None,
                });
            }
            other => {
                tracing::debug!("Ignoring stream {} of type '{}'", index, other);
            }
        }

        // eat strf leftovers and any strd/strn/vprp/JUNK that follow
        stack.skip_rest_of_chunk(cursor)?;
        stack.close_current_chunk(cursor)?;
        while stack.state().depth() >= strl_depth {
            if stack.enter_next_chunk(cursor)? == Entered::ListClosed {
                continue;
            }
            stack.skip_rest_of_chunk(cursor)?;
            stack.close_current_chunk(cursor)?;
        }

        Ok(())
    }

    fn parse_video_format<R: Read + Seek>(
        &mut self,
        cursor: &mut ByteCursor<R>,
        index: u32,
        header: &StreamHeader,
        main: &MainHeader,
    ) -> Result<StreamDescriptor> {
        let bitmap = BitmapInfoHeader::read(cursor)?;
        if bitmap.compression != 0 || bitmap.bits_per_pixel != 24 {
            return Err(AviError::UnsupportedVideo {
                compression: bitmap.compression,
                bits_per_pixel: bitmap.bits_per_pixel,
            });
        }

        let frame_rate = header
            .frame_rate()
            .or_else(|| main.frame_rate())
            .ok_or(AviError::InvalidFrameRate)?;

        let (width, height) = header
            .frame
            .size()
            .unwrap_or((bitmap.width.unsigned_abs(), bitmap.height.unsigned_abs()));

        let wanted = match (header.suggested_buffer_size, bitmap.image_size) {
            (0, 0) => bitmap.dib_size(),
            (0, image) => image as usize,
            (suggested, _) => suggested as usize,
        };
        let buffer_size = wanted.min(self.config.max_frame_buffer);
        if buffer_size < wanted {
            tracing::warn!("Frame buffer capped at {} bytes (stream asks for {})", buffer_size, wanted);
        }
        self.frame_buffer = vec![0u8; buffer_size];

        self.info.has_video_stream = true;
        self.info.width = width;
        self.info.height = height;
        self.info.frame_rate = frame_rate;
        self.info.num_frames = header.length;

        tracing::debug!(
            "Video stream {}: {}x{} @ {:.3} fps, {} frames, {} byte buffer",
            index,
            width,
            height,
            frame_rate,
            header.length,
            buffer_size
        );

        Ok(StreamDescriptor {
            index,
            kind: StreamKind::Video,
            fourcc: header.fcc_type,
            handler: header.fcc_handler,
            chunk_tag: FourCC::stream_chunk(index, *b"db"),
            alt_chunk_tag: self
                .config
                .accept_compressed_chunk_tag
                .then(|| FourCC::stream_chunk(index, *b"dc")),
            video: Some(VideoFormat {
                width,
                height,
                frame_rate,
                frame_count: header.length,
                bits_per_pixel: bitmap.bits_per_pixel,
                buffer_size,
            }),
        })
    }
}
