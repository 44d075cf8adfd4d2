use crate::reader::{SFF_SIGNATURE, SFF2_MARKER, V2_VERSIONS};

/// Bytes of a file needed to classify it.
pub const DETECT_WINDOW: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    V1,
    V2,
    /// Not recognized. Loading still attempts the v1 layout.
    Unknown,
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1 => write!(f, "v1"),
            Self::V2 => write!(f, "v2"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a container from its leading bytes.
pub fn detect(bytes: &[u8]) -> Version {
    let window = &bytes[..bytes.len().min(DETECT_WINDOW)];

    let v2_version = window
        .get(12..16)
        .is_some_and(|v| V2_VERSIONS.iter().any(|known| known == v));
    if v2_version || contains(window, SFF2_MARKER) {
        return Version::V2;
    }
    // some tools prepend their own bytes
    if contains(window, SFF_SIGNATURE) {
        return Version::V1;
    }
    Version::Unknown
}

fn contains(window: &[u8], needle: &[u8]) -> bool {
    window.windows(needle.len()).any(|w| w == needle)
}
