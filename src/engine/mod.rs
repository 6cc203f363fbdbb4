mod chunk;
mod classifier;
mod policy;
mod scanner;
mod state;
mod writer;

pub use chunk::{Chunk, StepExecution, StepStatus};
pub use classifier::{Classifier, Decision};
pub use policy::{RetryPolicy, RetryState, SkipPolicy, SkipState};
pub use scanner::{RecoveryScanner, ScanReport};
pub use state::{StateLog, StepState};
pub use writer::{WriteAudit, WriteBoundary};
