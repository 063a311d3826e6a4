pub mod event;
pub mod recurrence;
pub mod scheduled_task;
pub mod settings;
pub mod stats;
pub mod wake;

pub use event::{Event, CATEGORY_INTERNAL, CATEGORY_TASK};
pub use recurrence::RecurrencePattern;
pub use scheduled_task::{ScheduledTask, TaskCallback};
pub use stats::{EventStats, TimeSlot};
pub use wake::{WakeComputation, WakePayload, WakeReason, WakeSettings};
