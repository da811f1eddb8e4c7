pub use crate::core::counter::{ConcurrentCounter, CounterError};
pub use crate::core::policy::{SyncPolicy, SyncPolicyParseError};

// harness
pub use crate::harness::{CancelToken, RunSummary, WorkerError, WorkerReport, WorkerTask};

pub use crate::{asserted_short_name, core::macros::ty_name};

pub use num_format;
