//! Service layer for the watcher.
//!
//! This module contains the backend-facing logic for:
//! - Catalog page extraction (`CatalogExtractor`)
//! - Catalog fetching (`CatalogCrawler`)
//! - Login, rent and reserve (`LibrarySession`)
//! - Notification dispatch (`Notifier`)

mod catalog;
mod extractor;
mod notifier;
mod session;

pub use catalog::{CatalogCrawler, CatalogSource, PAGE_SIZE_FIELD};
pub use extractor::{CatalogExtractor, magazine_availability};
pub use notifier::{AppriseNotifier, LogNotifier, Notifier, notifier_from_config};
pub use session::{
    ACTION_ERROR_MESSAGE, ActionOutcome, LendingService, LibrarySession, LoginForm,
    check_login_response, has_action_error,
};
