//! Chain ids and the pool-wide target every endpoint has to agree on.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// The network identifier an upstream reports when asked which chain it serves.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ChainId(s.parse()?))
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        ChainId(id)
    }
}

/// The chain id the pool requires. Either pinned at construction or derived from the first
/// report, and immutable once set.
#[derive(Debug, Default)]
pub struct TargetChainId(OnceLock<ChainId>);

impl TargetChainId {
    pub fn new(pinned: Option<ChainId>) -> Self {
        let cell = OnceLock::new();
        if let Some(chain_id) = pinned {
            let _ = cell.set(chain_id);
        }
        TargetChainId(cell)
    }

    pub fn get(&self) -> Option<ChainId> {
        self.0.get().cloned()
    }

    /// Returns the target to compare `reported` against, fixing it to `reported` if no target
    /// was set yet.
    pub fn expect(&self, reported: ChainId) -> ChainId {
        *self.0.get_or_init(|| reported)
    }
}
