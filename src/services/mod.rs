pub mod dedup;
pub mod email;
pub mod idempotency_key;
pub mod notifier;
pub mod reconciliation;

pub use dedup::{Classification, DuplicateDetector, DuplicateRule};
pub use email::{DisabledTransport, EmailMessage, EmailTransport, NotificationError, ResendTransport};
pub use notifier::NotificationDispatcher;
pub use reconciliation::{ReconciliationPolicy, ReconciliationReport, ReconciliationService};
