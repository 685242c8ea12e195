//! Type definitions

pub mod job;
pub mod record;
pub mod summary;
pub mod uplink;

pub use job::*;
pub use record::*;
pub use summary::*;
pub use uplink::*;
