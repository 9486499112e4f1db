//! Port traits defining external boundaries.
//!
//! Each trait represents a boundary between the engine core and an
//! external system (time, planning oracle, filesystem, subprocesses,
//! operator prompt). Implementations live in `src/adapters/`.

pub mod clock;
pub mod filesystem;
pub mod operator;
pub mod oracle;
pub mod process;

pub use clock::Clock;
pub use filesystem::FileSystem;
pub use operator::{IterationReview, Operator, OperatorSignal};
pub use oracle::{Oracle, OracleError, OracleKind, PlanFuture, PlanRequest, PlanResponse};
pub use process::{ProcessOutput, ProcessRunner};
