//! On-demand content availability.
//!
//! Files are registered with the [record store](golink_cache) and their
//! content is brought into local [storage](golink_storage) either when they
//! are [published](PullCoordinator::publish) or, after it has gone missing,
//! when somebody [asks for it](PullCoordinator::request_pull). Content is
//! always verified by hash before a record becomes `available`, and the
//! [`Reconciler`] cleans up after anything that didn't finish.

mod coordinator;
pub mod email;
pub mod error;
pub mod fetch;
pub mod hash;
pub mod notify;
mod reconcile;

pub use crate::coordinator::{PublishRequest, PullCoordinator, PullTicket};
pub use crate::fetch::{Fetcher, FetcherHandle, OriginFetcher, OriginRef};
pub use crate::notify::{LogNotifier, Notifier, NotifierHandle, Outcome, SendmailNotifier};
pub use crate::reconcile::{Reconciler, Report, TIMED_OUT};
