// RIFF CHUNK WALKER
//
// A RIFF file is a tree of chunks. Every chunk is tag + u32 size + payload,
// padded to an even offset. A LIST chunk carries a 4-byte list type and
// then more chunks. We never hold the tree in memory: the walker keeps the
// open LISTs on a stack and remembers the one data chunk under the cursor.

use std::fmt;
use std::io::{Read, Seek};

use serde::{Serialize, Serializer};

use crate::byte_cursor::ByteCursor;
use crate::error::{AviError, Result};

// ============================================================================
// FourCC
// ============================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Build a stream data chunk tag: stream `index` as two decimal
    /// digits followed by a two-letter suffix ("00db", "01wb", ...).
    pub fn stream_chunk(index: u32, suffix: [u8; 2]) -> Self {
        let index = (index % 100) as u8;
        FourCC([b'0' + index / 10, b'0' + index % 10, suffix[0], suffix[1]])
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC(\"{}\")", self)
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ============================================================================
// Well-known tags
// ============================================================================

pub const RIFF: FourCC = FourCC(*b"RIFF");
pub const AVI_: FourCC = FourCC(*b"AVI ");
pub const LIST: FourCC = FourCC(*b"LIST");
pub const HDRL: FourCC = FourCC(*b"hdrl");
pub const AVIH: FourCC = FourCC(*b"avih");
pub const STRL: FourCC = FourCC(*b"strl");
pub const STRH: FourCC = FourCC(*b"strh");
pub const STRF: FourCC = FourCC(*b"strf");
pub const MOVI: FourCC = FourCC(*b"movi");
pub const REC_: FourCC = FourCC(*b"rec ");
pub const JUNK: FourCC = FourCC(*b"JUNK");

pub const AUDS: FourCC = FourCC(*b"auds");
pub const VIDS: FourCC = FourCC(*b"vids");

// ============================================================================
// Chunk descriptor
// ============================================================================

/// One chunk or LIST being traversed.
///
/// For a LIST, `fourcc` is the list type ("hdrl", "movi", ...), `start`
/// points just past the list type and `size` is what remains of the
/// declared size after it, so `end()` is the boundary the file declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffChunk {
    pub fourcc: FourCC,
    pub size: u64,
    pub start: u64,
}

impl RiffChunk {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }
}

// ============================================================================
// Parser state
// ============================================================================

/// Open LISTs (innermost last) and the data chunk under the cursor.
///
/// All transitions here are pure; `ChunkStack` feeds them positions read
/// from the byte stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserState {
    lists: Vec<RiffChunk>,
    current: Option<RiffChunk>,
    /// outermost LIST popped by the latest `ascend`
    last_closed: Option<FourCC>,
}

impl ParserState {
    pub fn lists(&self) -> &[RiffChunk] {
        &self.lists
    }

    pub fn current_chunk(&self) -> Option<&RiffChunk> {
        self.current.as_ref()
    }

    pub fn current_list(&self) -> Option<&RiffChunk> {
        self.lists.last()
    }

    pub fn last_closed(&self) -> Option<FourCC> {
        self.last_closed
    }

    pub fn depth(&self) -> usize {
        self.lists.len()
    }

    pub fn is_inside(&self, list_type: FourCC) -> bool {
        self.lists.iter().any(|l| l.fourcc == list_type)
    }

    pub fn push_list(&mut self, list: RiffChunk, max_depth: usize) -> Result<()> {
        if self.lists.len() >= max_depth {
            return Err(AviError::ListTooDeep(max_depth));
        }
        self.contain(&list)?;
        self.lists.push(list);
        Ok(())
    }

    pub fn select_chunk(&mut self, chunk: RiffChunk) -> Result<()> {
        self.contain(&chunk)?;
        self.current = Some(chunk);
        Ok(())
    }

    pub fn clear_chunk(&mut self) {
        self.current = None;
    }

    // A child must end inside its parent.
    fn contain(&self, child: &RiffChunk) -> Result<()> {
        if let Some(parent) = self.lists.last() {
            if child.end() > padded(parent.end()) {
                return Err(AviError::Overrun {
                    fourcc: parent.fourcc,
                    position: child.end(),
                    end: parent.end(),
                });
            }
        }
        Ok(())
    }

    /// Pop every LIST whose declared end is exactly `position`.
    ///
    /// Returns whether anything was popped. A position beyond the
    /// innermost end is an overrun and leaves the stack untouched.
    pub fn ascend(&mut self, position: u64) -> Result<bool> {
        let mut closed = false;
        self.last_closed = None;

        while let Some(list) = self.lists.last() {
            let end = list.end();
            if position == end || position == padded(end) {
                tracing::trace!("close LIST '{}' at {}", list.fourcc, position);
                self.last_closed = Some(list.fourcc);
                self.lists.pop();
                closed = true;
            } else if position > end {
                return Err(AviError::Overrun {
                    fourcc: list.fourcc,
                    position,
                    end,
                });
            } else {
                break;
            }
        }

        Ok(closed)
    }
}

fn padded(offset: u64) -> u64 {
    offset + (offset & 1)
}

// ============================================================================
// Chunk stack (state + stream)
// ============================================================================

/// Outcome of one `enter_next_chunk` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entered {
    /// A data chunk is under the cursor. `via_list` is set when at least
    /// one LIST was descended into on the way.
    Chunk { via_list: bool },
    /// A JUNK chunk or an empty LIST ended the enclosing LIST before any
    /// data chunk turned up. Nothing is selected.
    ListClosed,
}

#[derive(Debug)]
pub struct ChunkStack {
    state: ParserState,
    max_depth: usize,
    max_hops: usize,
}

impl ChunkStack {
    pub fn new(max_depth: usize, max_hops: usize) -> Self {
        Self {
            state: ParserState::default(),
            max_depth,
            max_hops,
        }
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn current_chunk(&self) -> Option<&RiffChunk> {
        self.state.current_chunk()
    }

    pub fn current_list(&self) -> Option<&RiffChunk> {
        self.state.current_list()
    }

    pub fn is_inside(&self, list_type: FourCC) -> bool {
        self.state.is_inside(list_type)
    }

    /// Read chunk headers until a data chunk is under the cursor.
    ///
    /// LISTs are pushed and descended into, JUNK is skipped and closed.
    /// Stops early with `Entered::ListClosed` when that closes a LIST, so
    /// callers never walk past the end of the list they are reading.
    /// At most `max_hops` LIST/JUNK headers are crossed per call.
    pub fn enter_next_chunk<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> Result<Entered> {
        let mut hops = 0;
        let mut via_list = false;

        loop {
            let fourcc = cursor.read_fourcc()?;
            let size = cursor.read_u32()? as u64;
            let start = cursor.position();

            if size > cursor.remaining() {
                return Err(AviError::UnexpectedEof { position: start, needed: size });
            }

            if fourcc == LIST || fourcc == JUNK {
                hops += 1;
                if hops > self.max_hops {
                    return Err(AviError::StepBudgetExhausted(start));
                }
            }

            if fourcc == LIST {
                if size < 4 {
                    return Err(AviError::Overrun {
                        fourcc: LIST,
                        position: start + 4,
                        end: start + size,
                    });
                }
                let list_type = cursor.read_fourcc()?;
                let list = RiffChunk {
                    fourcc: list_type,
                    size: size - 4,
                    start: cursor.position(),
                };
                tracing::trace!("enter LIST '{}' ({} bytes) at {}", list_type, size, start);
                self.state.push_list(list, self.max_depth)?;
                via_list = true;
                if list.size == 0 && self.state.ascend(cursor.position())? {
                    return Ok(Entered::ListClosed);
                }
                continue;
            }

            let chunk = RiffChunk { fourcc, size, start };

            if fourcc == JUNK {
                tracing::trace!("skip JUNK ({} bytes) at {}", size, start);
                self.state.select_chunk(chunk)?;
                cursor.skip(size)?;
                if self.close_current_chunk(cursor)? {
                    return Ok(Entered::ListClosed);
                }
                continue;
            }

            tracing::trace!("chunk '{}' ({} bytes) at {}", fourcc, size, start);
            self.state.select_chunk(chunk)?;
            return Ok(Entered::Chunk { via_list });
        }
    }

    /// Apply word padding, then ascend out of every LIST that ends here.
    ///
    /// Returns true if at least one LIST was closed.
    pub fn close_current_chunk<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> Result<bool> {
        // the final pad byte of a file is sometimes missing
        if cursor.position() & 1 == 1 && cursor.remaining() > 0 {
            cursor.skip(1)?;
        }
        self.state.clear_chunk();
        self.state.ascend(cursor.position())
    }

    /// Skip whatever payload of the current chunk has not been read.
    pub fn skip_rest_of_chunk<R: Read + Seek>(&mut self, cursor: &mut ByteCursor<R>) -> Result<()> {
        let Some(chunk) = self.state.current_chunk().copied() else {
            return Ok(());
        };
        let position = cursor.position();
        if position > chunk.end() {
            return Err(AviError::Overrun {
                fourcc: chunk.fourcc,
                position,
                end: chunk.end(),
            });
        }
        cursor.skip(chunk.end() - position)
    }
}
