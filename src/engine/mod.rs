//! Upload engine: rate gate, existing-record index, worker pool, per-item
//! pipeline context and result persistence.

pub mod gate;
pub mod index;
pub mod persist;
pub mod pipeline;
pub mod pool;

pub use gate::RateGate;
pub use index::{ExistingIndex, KeyField, fetch_all};
pub use pipeline::{StageContext, Uploader};
pub use pool::{PoolConfig, WorkerPool};
