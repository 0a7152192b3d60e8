mod completion;
mod task;

pub use completion::{Completion, CompletionRecord, parse_timestamp, resolve_all};
pub use task::{RecurrenceType, Task};
