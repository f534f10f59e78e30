// ABOUTME: Stack event polling and activity monitoring.
// ABOUTME: The poller reads event history; the monitor turns it into progress and errors.

mod monitor;
mod poller;
mod progress;

pub use monitor::{ActivityMonitor, MonitorOptions, MonitorReport, stack_event_has_error_message};
pub use poller::{PollerOptions, ResourceError, ResourceEvent, StackEventPoller};
pub use progress::{ProgressMonitor, StackActivity, StackProgress};
