// src/models/mod.rs

//! Domain models for the watcher.
//!
//! This module contains the catalog entities and the configuration
//! structures used throughout the application.

mod config;
mod media;

// Re-export all public types
pub use config::{
    Config, Credentials, GeneralConfig, HttpConfig, NotificationConfig, RentConfig,
    ReservationConfig,
};
pub use media::{
    Availability, BookDetails, Media, MediaFormat, MediaId, MediaKind, ONLEIHE_BASE_URL,
    id_from_link, media_key,
};
