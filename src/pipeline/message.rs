//! Notification text for newly seen items.

use crate::models::{Media, MediaKind};

/// What the watcher did with a new item this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAction {
    None,
    Rented,
    Reserved,
}

/// Availability part of the notification.
pub fn availability_message(media: &Media, action: AutoAction) -> String {
    match action {
        AutoAction::Rented => "auto rented".to_string(),
        AutoAction::Reserved => format!(
            "auto reserved, available at <b>{}</b>",
            media.availability_date
        ),
        AutoAction::None if media.available => "available now".to_string(),
        AutoAction::None => format!("not available until <b>{}</b>", media.availability_date),
    }
}

/// HTML body of the notification. Links point at `base_url`.
pub fn notification_body(media: &Media, base_url: &str, availability: &str) -> String {
    match &media.kind {
        MediaKind::Book(details) => format!(
            r#"[{}] <a href="{}">{} - {}</a> {}"#,
            media.format.as_str().to_uppercase(),
            media.url_on(base_url),
            details.author(),
            media.title,
            availability
        ),
        MediaKind::Magazine => format!(
            r#"[MAGAZINE] <a href="{}">{}</a> {}"#,
            media.url_on(base_url),
            media.title,
            availability
        ),
    }
}
