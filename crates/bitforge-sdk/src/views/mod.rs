//! View bindings
//!
//! Each screen is a [`View`]: it publishes a [`ViewState`] on a `watch`
//! channel, performs its initial fetch in `load()`, routes every
//! state-changing action through the [`MutationExecutor`](crate::mutation::MutationExecutor),
//! and stops all background work on `unmount()`.
//!
//! Results that arrive after unmount are dropped by the view's
//! [`Publisher`]; in-flight HTTP requests themselves are not cancelled.

use crate::cache::{CacheEvent, EntityCache};
use crate::error::{Result, SdkError};
use crate::schedule::Scheduler;
use async_trait::async_trait;
use bitforge_client::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub mod admin;
pub mod clans;
pub mod explorer;
pub mod feed;
pub mod forums;
pub mod marketplace;
pub mod media;
pub mod profile;
pub mod report;
pub mod subscriptions;
pub mod theme_store;

pub use admin::{AdminDashboardView, AdminPanel, AdminTab};
pub use clans::ClansView;
pub use explorer::{ExplorerView, SearchResults};
pub use feed::FeedView;
pub use forums::{ForumsModel, ForumsView};
pub use marketplace::{MarketListing, MarketplaceView};
pub use media::MediaView;
pub use profile::{ProfileModel, ProfileView};
pub use report::file_report;
pub use subscriptions::{SubscriptionsView, TierListing};
pub use theme_store::{ThemeListing, ThemeStoreView};

/// What a screen currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Empty,
    Ready(T),
    Failed { kind: ErrorKind, message: String },
}

impl<T> ViewState<T> {
    pub fn failed(err: &SdkError) -> Self {
        ViewState::Failed {
            kind: err.kind(),
            message: err.user_message(),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => ViewState::Ready(value),
            Err(e) => ViewState::failed(&e),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ViewState::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ViewState<U> {
        match self {
            ViewState::Loading => ViewState::Loading,
            ViewState::Empty => ViewState::Empty,
            ViewState::Ready(value) => ViewState::Ready(f(value)),
            ViewState::Failed { kind, message } => ViewState::Failed { kind, message },
        }
    }
}

impl<T> ViewState<Vec<T>> {
    /// `Empty` for an empty list
    pub fn from_list(result: Result<Vec<T>>) -> Self {
        match result {
            Ok(items) if items.is_empty() => ViewState::Empty,
            other => ViewState::from_result(other),
        }
    }
}

/// Write side of a view's state channel; silent once the view unmounts
pub struct Publisher<T> {
    view: &'static str,
    tx: Arc<watch::Sender<ViewState<T>>>,
    mounted: Arc<AtomicBool>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            view: self.view,
            tx: self.tx.clone(),
            mounted: self.mounted.clone(),
        }
    }
}

impl<T: Clone> Publisher<T> {
    /// Publish unless unmounted. Returns whether the state was applied.
    pub fn publish(&self, state: ViewState<T>) -> bool {
        if !self.mounted.load(Ordering::Acquire) {
            debug!(view = self.view, "Discarding result for unmounted view");
            return false;
        }
        self.tx.send_replace(state);
        true
    }

    pub fn current(&self) -> ViewState<T> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.tx.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }
}

/// Lifetime of one mounted screen: its mounted flag, timers and listeners
pub struct ViewScope {
    name: &'static str,
    mounted: Arc<AtomicBool>,
    scheduler: Scheduler,
    token: CancellationToken,
}

impl ViewScope {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            mounted: Arc::new(AtomicBool::new(true)),
            scheduler: Scheduler::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// New state channel tied to this scope, starting at `Loading`
    pub fn publisher<T>(&self) -> Publisher<T> {
        let (tx, _) = watch::channel(ViewState::Loading);
        Publisher {
            view: self.name,
            tx: Arc::new(tx),
            mounted: self.mounted.clone(),
        }
    }

    /// Call `on_change` for every cache event `filter` accepts, until unmount.
    ///
    /// A lagged receiver counts as a change.
    pub fn watch_cache<F, G>(&self, cache: &EntityCache, filter: F, mut on_change: G)
    where
        F: Fn(&CacheEvent) -> bool + Send + 'static,
        G: FnMut() + Send + 'static,
    {
        let mut events = cache.subscribe();
        let token = self.token.child_token();
        let view = self.name;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) if filter(&event) => on_change(),
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(view, skipped, "Cache listener lagged");
                            on_change();
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });
    }

    /// Resolves once the view is unmounted
    pub async fn unmounted(&self) {
        self.token.cancelled().await
    }

    /// Stop timers and listeners and ignore any later results. Idempotent.
    pub fn unmount(&self) {
        if self.mounted.swap(false, Ordering::AcqRel) {
            self.scheduler.cancel_all();
            self.token.cancel();
            debug!(view = self.name, "View unmounted");
        }
    }
}

impl Drop for ViewScope {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// A screen bound to remote data
#[async_trait]
pub trait View: Send + Sync {
    type Model: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Receiver for the screen's state
    fn state(&self) -> watch::Receiver<ViewState<Self::Model>>;

    /// Initial fetch. Never leaves the view in `Loading`.
    async fn load(&self) -> ViewState<Self::Model>;

    fn unmount(&self);

    fn is_mounted(&self) -> bool;
}
