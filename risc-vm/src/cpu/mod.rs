pub mod core;
pub mod execution;
pub mod types;

pub use self::core::CpuState;
pub use execution::Cycle;
pub use types::{Fault, Flag, Flags};
