//! Recoverable anomalies found while loading containers, decoding sprites or
//! parsing animation scripts.
//!
//! None of these abort the operation that produced them. They are logged when
//! raised and kept on the result so callers can inspect them.

/// Which binary table a truncated read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Sprites,
    Palettes,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sprites => write!(f, "sprite"),
            Self::Palettes => write!(f, "palette"),
        }
    }
}

/// What kind of record a link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Sprite,
    Palette,
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sprite => write!(f, "sprite"),
            Self::Palette => write!(f, "palette"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Warning {
    #[error("unrecognized container signature ({len} byte header)")]
    InvalidSignature { len: usize },
    #[error("subentry chain truncated at offset {offset} after {read} entries")]
    TruncatedChain { offset: u64, read: usize },
    #[error("{table} table truncated at row {index} of {expected}")]
    TruncatedTable {
        table: Table,
        index: usize,
        expected: usize,
    },
    #[error("{kind} {index} links to missing entry {target}")]
    UnresolvedLink {
        kind: LinkKind,
        index: usize,
        target: usize,
    },
    #[error("{kind} {index} is part of a link cycle")]
    CyclicLink { kind: LinkKind, index: usize },
    #[error("sprite {index} has unknown format code {code}")]
    UnknownCodec { index: usize, code: u8 },
    #[error("line {line}: {reason}")]
    MalformedScriptLine { line: usize, reason: String },
}

impl Warning {
    /// Log the warning and hand it back, so call sites can push it in one go.
    pub(crate) fn logged(self) -> Self {
        log::warn!("{}", self);
        self
    }
}
