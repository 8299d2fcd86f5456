//! Delta-frame encoding for set-valued stores.
//!
//! A stored value is a sequence of frames, each `[count i32][element...]`.
//! The first frame is the base set; every later frame is a delta that adds
//! (`count > 0`) or removes (`count < 0`) `|count|` elements. Replaying all
//! frames in order yields the current set.

use std::fmt;
use std::hash::Hash;

use jmake_ir::{MemberRef, ReferencerRecord, Symbol};
use rustc_hash::FxHashSet;

/// Element type of a set-valued store.
pub trait DeltaElement: Copy + Eq + Hash + Ord + fmt::Debug {
    fn encode(&self, out: &mut Vec<u8>);
    fn decode(bytes: &[u8], pos: &mut usize) -> Option<Self>;
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> Option<u32> {
    let chunk = bytes.get(*pos..*pos + 4)?;
    *pos += 4;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

impl DeltaElement for Symbol {
    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.raw().to_le_bytes());
    }

    fn decode(bytes: &[u8], pos: &mut usize) -> Option<Self> {
        read_u32(bytes, pos).map(Symbol::from_raw)
    }
}

const TAG_CLASS: u8 = 0;
const TAG_FIELD: u8 = 1;
const TAG_METHOD: u8 = 2;

impl DeltaElement for ReferencerRecord {
    fn encode(&self, out: &mut Vec<u8>) {
        self.class.encode(out);
        match self.member {
            MemberRef::Class => out.push(TAG_CLASS),
            MemberRef::Field { name } => {
                out.push(TAG_FIELD);
                name.encode(out);
            }
            MemberRef::Method { name, descriptor } => {
                out.push(TAG_METHOD);
                name.encode(out);
                descriptor.encode(out);
            }
        }
    }

    fn decode(bytes: &[u8], pos: &mut usize) -> Option<Self> {
        let class = Symbol::decode(bytes, pos)?;
        let tag = *bytes.get(*pos)?;
        *pos += 1;
        let member = match tag {
            TAG_CLASS => MemberRef::Class,
            TAG_FIELD => MemberRef::Field {
                name: Symbol::decode(bytes, pos)?,
            },
            TAG_METHOD => MemberRef::Method {
                name: Symbol::decode(bytes, pos)?,
                descriptor: Symbol::decode(bytes, pos)?,
            },
            _ => return None,
        };
        Some(ReferencerRecord { class, member })
    }
}

/// A value that does not decode as a frame sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// A frame header or element is cut short or garbled.
    Malformed { offset: usize },
    /// More elements than a frame count can express.
    TooLarge { len: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Malformed { offset } => write!(f, "malformed delta frame at offset {offset}"),
            FrameError::TooLarge { len } => write!(f, "delta frame of {len} elements is too large"),
        }
    }
}

impl std::error::Error for FrameError {}

fn push_frame<T: DeltaElement>(
    out: &mut Vec<u8>,
    negative: bool,
    elements: &FxHashSet<T>,
) -> Result<(), FrameError> {
    let count = i32::try_from(elements.len()).map_err(|_| FrameError::TooLarge {
        len: elements.len(),
    })?;
    let count = if negative { -count } else { count };
    out.extend_from_slice(&count.to_le_bytes());
    // Sorted so equal sets encode identically.
    let mut sorted: Vec<T> = elements.iter().copied().collect();
    sorted.sort_unstable();
    for element in sorted {
        element.encode(out);
    }
    Ok(())
}

/// Encode a full value: a single base frame.
pub fn encode_base<T: DeltaElement>(set: &FxHashSet<T>) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(4 + set.len() * 4);
    push_frame(&mut out, false, set)?;
    Ok(out)
}

/// Encode delta frames to append after an existing value: removals first,
/// then additions. Empty halves are omitted.
pub fn encode_delta<T: DeltaElement>(
    removed: &FxHashSet<T>,
    added: &FxHashSet<T>,
) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::new();
    if !removed.is_empty() {
        push_frame(&mut out, true, removed)?;
    }
    if !added.is_empty() {
        push_frame(&mut out, false, added)?;
    }
    Ok(out)
}

/// Result of replaying a stored value.
#[derive(Debug)]
pub struct Replayed<T> {
    pub set: FxHashSet<T>,
    /// Frames found, base included.
    pub frames: usize,
}

/// Replay every frame of a stored value.
pub fn replay<T: DeltaElement>(bytes: &[u8]) -> Result<Replayed<T>, FrameError> {
    let mut set = FxHashSet::default();
    let mut frames = 0;
    let mut pos = 0;
    while pos < bytes.len() {
        let header = pos;
        let chunk = bytes
            .get(pos..pos + 4)
            .ok_or(FrameError::Malformed { offset: header })?;
        let count = i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        pos += 4;
        for _ in 0..count.unsigned_abs() {
            let element =
                T::decode(bytes, &mut pos).ok_or(FrameError::Malformed { offset: header })?;
            if count < 0 {
                set.remove(&element);
            } else {
                set.insert(element);
            }
        }
        frames += 1;
    }
    Ok(Replayed { set, frames })
}
