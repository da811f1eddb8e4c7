use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// Synchronization applied to the shared counter's read-modify-write. Selected once at
/// construction time and immutable for the life of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// no protection, concurrent increments are allowed to lose updates
    None,
    /// mutual exclusion around the increment
    Mutex,
}
impl SyncPolicy {
    #[inline(always)]
    pub fn is_guarded(&self) -> bool {
        matches!(self, Self::Mutex)
    }
}
impl Display for SyncPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Mutex => write!(f, "mutex"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid sync policy: '{0}', expected one of: none, mutex")]
pub struct SyncPolicyParseError(String);

impl FromStr for SyncPolicy {
    type Err = SyncPolicyParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "mutex" => Ok(Self::Mutex),
            _ => Err(SyncPolicyParseError(s.to_owned())),
        }
    }
}
