// src/pipeline/watch.rs

//! Change-detection engine.
//!
//! One [`Watcher`] owns everything a poll cycle needs: the catalog source,
//! the lending session, the notifier and the known-set. A cycle fetches all
//! catalog URLs, diffs the result against the known-set, optionally rents or
//! reserves matching items and sends one notification per new item.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, Media};
use crate::pipeline::filter::KeywordFilter;
use crate::pipeline::known::{KnownSet, Snapshot};
use crate::pipeline::message::{AutoAction, availability_message, notification_body};
use crate::services::{
    CatalogCrawler, CatalogSource, LendingService, LibrarySession, Notifier, notifier_from_config,
};
use crate::utils::http;

/// Per-run settings of the engine.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Catalog URLs keyed by label
    pub urls: BTreeMap<String, String>,
    pub poll_interval: Duration,
    pub max_concurrent: usize,
    pub lend_period_days: u32,
    /// Reserve matching items that are lent out
    pub reservation_enabled: bool,
    pub notify_email: Option<String>,
    /// Forget one random item after priming
    pub test_notification: bool,
    pub notification_title: String,
    /// Platform origin used for links in notifications
    pub base_url: String,
}

impl WatchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            urls: config.urls.clone(),
            poll_interval: config.poll_interval(),
            max_concurrent: config.http.max_concurrent.max(1),
            lend_period_days: config.rent.lend_period_days,
            reservation_enabled: config.reservation.enabled,
            notify_email: config.reservation.notify_email.clone(),
            test_notification: config.notification.test_notification,
            notification_title: config.notification.title.clone(),
            base_url: config.http.base_url.clone(),
        }
    }
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Distinct items in this cycle's snapshot
    pub fetched: usize,
    /// Catalog URLs skipped because of transport failures
    pub failed_urls: usize,
    /// True for the cache-priming cycle
    pub primed: bool,
    pub new_items: usize,
    pub notified: usize,
    pub rented: usize,
    pub reserved: usize,
}

/// Application context for the polling loop.
pub struct Watcher {
    options: WatchOptions,
    filter: KeywordFilter,
    catalog: Arc<dyn CatalogSource>,
    session: Arc<dyn LendingService>,
    notifier: Arc<dyn Notifier>,
    known: KnownSet,
}

impl Watcher {
    pub fn new(
        options: WatchOptions,
        filter: KeywordFilter,
        catalog: Arc<dyn CatalogSource>,
        session: Arc<dyn LendingService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            options,
            filter,
            catalog,
            session,
            notifier,
            known: KnownSet::new(),
        }
    }

    /// Build the production context: one HTTP client with a cookie store
    /// shared by catalog fetches and session actions.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::create_async_client(&config.http)?;
        let catalog = CatalogCrawler::new(client.clone(), &config.http)?;
        let session =
            LibrarySession::new(client, &config.http.base_url, config.credentials.clone())?;
        let filter = match &config.general.auto_rent_keywords_path {
            Some(path) => KeywordFilter::load(path)?,
            None => KeywordFilter::default(),
        };
        log::info!("Auto-rent keywords: {:?}", filter.keywords());

        Ok(Self::new(
            WatchOptions::from_config(config),
            filter,
            Arc::new(catalog),
            Arc::new(session),
            Arc::from(notifier_from_config(&config.notification)),
        ))
    }

    pub fn known(&self) -> &KnownSet {
        &self.known
    }

    /// Fetch every configured catalog into one snapshot.
    ///
    /// Pages are fetched concurrently but merged in configuration order, so
    /// an id listed under several URLs keeps the copy from the first label.
    /// A transport failure only drops that URL's contribution. Any other
    /// failure (malformed page, unexpected dates) aborts the cycle.
    pub async fn collect_snapshot(&self) -> Result<(Snapshot, usize)> {
        let catalog = &self.catalog;
        let mut fetches = stream::iter(self.options.urls.iter())
            .map(|(label, url)| async move { (label, url, catalog.fetch(url).await) })
            .buffered(self.options.max_concurrent.max(1));

        let mut snapshot = Snapshot::new();
        let mut failures = 0;
        while let Some((label, url, result)) = fetches.next().await {
            match result {
                Ok(media) => {
                    log::debug!("{}: {} items", label, media.len());
                    snapshot.extend(media);
                }
                Err(e) if e.is_transport() => {
                    failures += 1;
                    log::warn!("Network error while processing {} ({}): {}", label, url, e);
                }
                Err(e) => {
                    log::error!("Failed to process {} ({}): {}", label, url, e);
                    return Err(e);
                }
            }
        }
        Ok((snapshot, failures))
    }

    /// Run a single poll cycle.
    pub async fn poll_once(&mut self) -> Result<CycleReport> {
        let (current, failed_urls) = self.collect_snapshot().await?;
        let mut report = CycleReport {
            fetched: current.len(),
            failed_urls,
            ..CycleReport::default()
        };

        if !self.known.is_primed() {
            log::info!("First run, populating cache with {} items", current.len());
            for media in current.iter() {
                log::debug!("[CACHE] {} ({})", media.title, media.id());
            }
            self.known.prime(current);
            report.primed = true;

            if self.options.test_notification {
                let removed = self.known.forget_random(&mut rand::thread_rng());
                if let Some(media) = removed {
                    log::info!(
                        "Removed '{}' from known media for notification test",
                        media.title
                    );
                }
            }
            return Ok(report);
        }

        let new_media = self.known.diff(&current);
        report.new_items = new_media.len();

        for media in &new_media {
            let action = self.auto_action(media).await;
            match action {
                AutoAction::Rented => report.rented += 1,
                AutoAction::Reserved => report.reserved += 1,
                AutoAction::None => {}
            }

            let body = notification_body(
                media,
                &self.options.base_url,
                &availability_message(media, action),
            );
            match self
                .notifier
                .notify(&self.options.notification_title, &body)
                .await
            {
                Ok(()) => report.notified += 1,
                Err(e) => log::warn!("Failed to send notification for '{}': {}", media.title, e),
            }
        }

        self.known.absorb(new_media);
        Ok(report)
    }

    /// Rent or reserve `media` when it matches the keyword filter.
    async fn auto_action(&self, media: &Media) -> AutoAction {
        if !self.filter.matches(&media.title) {
            return AutoAction::None;
        }
        log::info!("'{}' matches filter", media.title);

        if media.available {
            log::info!("'{}' is available, trying auto rent", media.title);
            let outcome = self
                .session
                .rent_media(media, self.options.lend_period_days, true)
                .await;
            if outcome.is_success() {
                return AutoAction::Rented;
            }
        } else if self.options.reservation_enabled {
            log::info!("'{}' is lent out, trying auto reserve", media.title);
            let outcome = self
                .session
                .reserve_media(media, self.options.notify_email.as_deref(), true)
                .await;
            if outcome.is_success() {
                return AutoAction::Reserved;
            }
        }
        AutoAction::None
    }

    /// Poll until `shutdown` completes, sleeping between cycles.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let report = self.poll_once().await?;
            if !report.primed {
                log::info!(
                    "Cycle done: {} items, {} new, {} notified, {} rented, {} reserved, {} urls failed",
                    report.fetched,
                    report.new_items,
                    report.notified,
                    report.rented,
                    report.reserved,
                    report.failed_urls
                );
            }

            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping watcher");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }
    }

    /// Poll until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
