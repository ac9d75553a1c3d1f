use serde::{Deserialize, Serialize};

/// Which members of a replicated store a transaction reads from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadPreference {
    /// Read from the primary member only
    #[default]
    Primary,

    /// Prefer the primary, fall back to a secondary
    PrimaryPreferred,

    /// Read from a secondary member only
    Secondary,

    /// Prefer a secondary, fall back to the primary
    SecondaryPreferred,

    /// Read from the member with the lowest latency
    Nearest,
}

impl std::fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadPreference::Primary => write!(f, "primary"),
            ReadPreference::PrimaryPreferred => write!(f, "primaryPreferred"),
            ReadPreference::Secondary => write!(f, "secondary"),
            ReadPreference::SecondaryPreferred => write!(f, "secondaryPreferred"),
            ReadPreference::Nearest => write!(f, "nearest"),
        }
    }
}

/// How many members must acknowledge a write before it is reported durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteConcern {
    /// A majority of voting members must acknowledge
    #[default]
    Majority,

    /// A fixed number of members must acknowledge
    Nodes(u32),
}

impl std::fmt::Display for WriteConcern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteConcern::Majority => write!(f, "majority"),
            WriteConcern::Nodes(n) => write!(f, "w={}", n),
        }
    }
}

/// Which committed state a transaction is allowed to observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadConcern {
    /// The instance's most recent local state, possibly not yet replicated
    #[default]
    Local,

    /// State acknowledged by a majority of members
    Majority,

    /// Like local, but tolerates reads during failover
    Available,

    /// Majority state confirmed linearizable at read time
    Linearizable,

    /// A single cluster-wide snapshot
    Snapshot,
}

impl std::fmt::Display for ReadConcern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadConcern::Local => write!(f, "local"),
            ReadConcern::Majority => write!(f, "majority"),
            ReadConcern::Available => write!(f, "available"),
            ReadConcern::Linearizable => write!(f, "linearizable"),
            ReadConcern::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// Options applied to every outermost transaction start on a connection.
///
/// The triple is fixed when the connection is configured; nested begins
/// reuse the transaction that is already open, so the options are only
/// consulted when the nesting depth goes from zero to one.
///
/// # Examples
///
/// ```
/// use docdb::{ReadConcern, ReadPreference, TransactionOptions, WriteConcern};
///
/// let options = TransactionOptions::new()
///     .read_preference(ReadPreference::Primary)
///     .write_concern(WriteConcern::Majority)
///     .read_concern(ReadConcern::Local);
///
/// assert_eq!(options, TransactionOptions::default());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    pub read_preference: ReadPreference,
    pub write_concern: WriteConcern,
    pub read_concern: ReadConcern,
}

impl TransactionOptions {
    /// Create options with the default triple: primary reads, majority
    /// write acknowledgement, local read concern.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the read preference
    pub fn read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = read_preference;
        self
    }

    /// Set the write concern
    pub fn write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = write_concern;
        self
    }

    /// Set the read concern
    pub fn read_concern(mut self, read_concern: ReadConcern) -> Self {
        self.read_concern = read_concern;
        self
    }
}
