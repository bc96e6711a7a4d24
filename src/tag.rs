//! MarFS file tags (FTAG)
//!
//! Every data file carries a tag in its metadata describing where its
//! content lives in the data stream:
//!
//! ```text
//! VER(0.001)STM(<ctag>|<streamid>|f<objfiles>-d<objsize>)POS(F<fileno>-O<objno>-@<offset>-E<eos>)
//!     DAT(N<n>-E<e>-O<o>-S<partsz>-B<bytes>-A<avail>-R<recov>-D<direct>-<state>-<access>)
//! ```
//!
//! A file's content starts `offset` bytes into object `objno` and may spill
//! into following objects. Object `n` of the stream is named
//! `<ctag>|<streamid>.<n>`, and a stream id has the form
//! `<repo>#<namespace path with '/' replaced by '#'>#<sec>.<nsec>`.

use crate::error::{TagError, TagResult};
use regex::Regex;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::LazyLock;

/// Tag format version understood by this crate
pub const TAG_MAJOR_VERSION: u32 = 0;
pub const TAG_MINOR_VERSION: u32 = 1;

/// Extended attribute carrying the tag (after the metadata layer prefix)
pub const TAG_ATTR_NAME: &str = "MARFS-FTAG";

static FTAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^VER\((\d+)\.(\d{3})\)",
        r"STM\(([^|()]+)\|([^|()]+)\|f(\d+)-d(\d+)\)",
        r"POS\(F(\d+)-O(\d+)-@(\d+)-E([01])\)",
        r"DAT\(N(\d+)-E(\d+)-O(\d+)-S(\d+)-B(\d+)-A(\d+)-R(\d+)-D(\d+)-(INIT|SIZED|FIN|COMP)-(NO|RO|WO|RW)\)$",
    ))
    .expect("Invalid FTAG regex")
});

// <ctag>|<repo>#<ns path>#<sec>.<nsec>.<objno>, ns path is greedy up to the last '#'
static OBJECT_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^|]+\|[^#|]+#(.*)#\d+\.\d+\.\d+$").expect("Invalid object ID regex")
});

/// Erasure protection parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection {
    pub n: u32,
    pub e: u32,
    pub o: u32,
    pub partsz: u64,
}

/// Lifecycle state of a file's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataState {
    Init,
    Sized,
    Finalized,
    Complete,
}

/// Access permitted to a file's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataAccess {
    None,
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Decoded file tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTag {
    pub ctag: String,
    pub streamid: String,
    pub objfiles: u64,
    pub objsize: u64,
    pub fileno: u64,
    pub objno: u64,
    pub offset: u64,
    pub end_of_stream: bool,
    pub protection: Protection,
    pub bytes: u64,
    pub availbytes: u64,
    pub recoverybytes: u64,
    pub directbytes: u64,
    pub state: DataState,
    pub access: DataAccess,
}

impl FileTag {
    /// Tag for an empty, complete, read-only file at the start of a stream.
    /// Position and size fields are set with struct update syntax.
    pub fn new(ctag: impl Into<String>, streamid: impl Into<String>, objsize: u64) -> Self {
        Self {
            ctag: ctag.into(),
            streamid: streamid.into(),
            objfiles: 1,
            objsize,
            fileno: 0,
            objno: 0,
            offset: 0,
            end_of_stream: false,
            protection: Protection::default(),
            bytes: 0,
            availbytes: 0,
            recoverybytes: 0,
            directbytes: 0,
            state: DataState::Complete,
            access: DataAccess::ReadOnly,
        }
    }

    /// Parse a tag string
    pub fn parse(raw: &str) -> TagResult<Self> {
        let raw = raw.trim_end_matches('\0');
        let caps = FTAG_REGEX.captures(raw).ok_or_else(|| TagError::Malformed {
            tag: raw.to_string(),
            reason: "does not match the VER/STM/POS/DAT layout".into(),
        })?;

        let num = |i: usize| -> TagResult<u64> {
            caps[i].parse::<u64>().map_err(|e| TagError::Malformed {
                tag: raw.to_string(),
                reason: format!("field {}: {}", i, e),
            })
        };
        let small = |i: usize| -> TagResult<u32> {
            caps[i].parse::<u32>().map_err(|e| TagError::Malformed {
                tag: raw.to_string(),
                reason: format!("field {}: {}", i, e),
            })
        };

        let major = small(1)?;
        let minor = small(2)?;
        if major != TAG_MAJOR_VERSION || minor != TAG_MINOR_VERSION {
            return Err(TagError::UnsupportedVersion { major, minor });
        }

        let state = match &caps[19] {
            "SIZED" => DataState::Sized,
            "FIN" => DataState::Finalized,
            "COMP" => DataState::Complete,
            _ => DataState::Init,
        };
        let access = match &caps[20] {
            "RO" => DataAccess::ReadOnly,
            "WO" => DataAccess::WriteOnly,
            "RW" => DataAccess::ReadWrite,
            _ => DataAccess::None,
        };

        Ok(Self {
            ctag: caps[3].to_string(),
            streamid: caps[4].to_string(),
            objfiles: num(5)?,
            objsize: num(6)?,
            fileno: num(7)?,
            objno: num(8)?,
            offset: num(9)?,
            end_of_stream: &caps[10] == "1",
            protection: Protection {
                n: small(11)?,
                e: small(12)?,
                o: small(13)?,
                partsz: num(14)?,
            },
            bytes: num(15)?,
            availbytes: num(16)?,
            recoverybytes: num(17)?,
            directbytes: num(18)?,
            state,
            access,
        })
    }

    /// Object numbers holding this file's content, first to last.
    ///
    /// An unbounded object size or an empty file occupies only its first
    /// object.
    pub fn chunk_bounds(&self) -> RangeInclusive<u64> {
        if self.objsize == 0 || self.bytes == 0 {
            return self.objno..=self.objno;
        }
        let span = (self.offset.saturating_add(self.bytes) - 1) / self.objsize;
        self.objno..=self.objno.saturating_add(span)
    }

    /// Identifier of object `chunk`, which must lie within [`chunk_bounds`].
    ///
    /// [`chunk_bounds`]: FileTag::chunk_bounds
    pub fn object_id(&self, chunk: u64) -> TagResult<String> {
        let bounds = self.chunk_bounds();
        if !bounds.contains(&chunk) {
            return Err(TagError::ChunkOutOfRange {
                chunk,
                first: *bounds.start(),
                last: *bounds.end(),
            });
        }
        Ok(self.format_object_id(chunk))
    }

    /// Every object of this file, as `(chunk, object id)`
    pub fn object_ids(&self) -> impl Iterator<Item = (u64, String)> + '_ {
        self.chunk_bounds()
            .map(move |chunk| (chunk, self.format_object_id(chunk)))
    }

    fn format_object_id(&self, chunk: u64) -> String {
        format!("{}|{}.{}", self.ctag, self.streamid, chunk)
    }
}

impl FromStr for FileTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FileTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            DataState::Init => "INIT",
            DataState::Sized => "SIZED",
            DataState::Finalized => "FIN",
            DataState::Complete => "COMP",
        };
        let access = match self.access {
            DataAccess::None => "NO",
            DataAccess::ReadOnly => "RO",
            DataAccess::WriteOnly => "WO",
            DataAccess::ReadWrite => "RW",
        };
        write!(
            f,
            "VER({}.{:03})STM({}|{}|f{}-d{})POS(F{}-O{}-@{}-E{})DAT(N{}-E{}-O{}-S{}-B{}-A{}-R{}-D{}-{}-{})",
            TAG_MAJOR_VERSION,
            TAG_MINOR_VERSION,
            self.ctag,
            self.streamid,
            self.objfiles,
            self.objsize,
            self.fileno,
            self.objno,
            self.offset,
            u8::from(self.end_of_stream),
            self.protection.n,
            self.protection.e,
            self.protection.o,
            self.protection.partsz,
            self.bytes,
            self.availbytes,
            self.recoverybytes,
            self.directbytes,
            state,
            access,
        )
    }
}

/// Build a stream id for a namespace
pub fn stream_id(repo: &str, namespace_path: &str, sec: u64, nsec: u64) -> String {
    format!(
        "{}#{}#{}.{}",
        repo,
        namespace_path.replace('/', "#"),
        sec,
        nsec
    )
}

/// Recover the namespace path encoded in an object identifier.
///
/// Returns `None` if the identifier does not follow the stream id layout.
pub fn namespace_path(object_id: &str) -> Option<String> {
    let caps = OBJECT_ID_REGEX.captures(object_id)?;
    let encoded = caps.get(1)?.as_str();
    if encoded.is_empty() {
        return None;
    }
    Some(encoded.replace('#', "/"))
}
