//! Watch-retry loop.
//!
//! Drives one [`Scope`] from a [`Source`] through an explicit state machine:
//!
//! - `Listing`: list every object, replace each contribution, drop sources
//!   that disappeared, mark the scope ready and open a watch from the listed
//!   resource version.
//! - `Watching`: apply events until the stream fails or closes.
//! - `Retrying`: wait for the backoff delay, then list again.
//! - `Stopped`: terminal, entered only through the cancellation token.
//!
//! The token is checked at the top of every iteration and interrupts any
//! wait in progress.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dns::Scope;
use crate::error::{Result, WatchError};

use super::backoff::{Backoff, Sleeper, TokioSleeper};
use super::source::{Source, SourceObject, WatchEvent};

type Events<T> = mpsc::Receiver<Result<WatchEvent<T>>>;

enum LoopState<T> {
    Listing,
    Watching(Events<T>),
    Retrying,
    Stopped,
}

/// Keeps a scope converged with a watched source.
pub struct WatchLoop<T: SourceObject> {
    source: Arc<dyn Source<T>>,
    scope: Scope,
    backoff: Box<dyn Backoff>,
    sleeper: Arc<dyn Sleeper>,
}

impl<T: SourceObject> std::fmt::Debug for WatchLoop<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchLoop")
            .field("kind", &self.source.kind())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<T: SourceObject> WatchLoop<T> {
    /// Creates a loop feeding `scope` from `source`.
    pub fn new(source: Arc<dyn Source<T>>, scope: Scope, backoff: Box<dyn Backoff>) -> Self {
        Self {
            source,
            scope,
            backoff,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the sleeper used between retries.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Runs until `cancel` fires and returns the scope.
    pub async fn run(mut self, cancel: CancellationToken) -> Scope {
        let kind = self.source.kind().to_string();
        info!("Watching {kind} for scope {}", self.scope.name());

        let mut state = LoopState::Listing;
        loop {
            if cancel.is_cancelled() {
                state = LoopState::Stopped;
            }
            state = match state {
                LoopState::Stopped => break,
                LoopState::Listing => self.list(&cancel).await,
                LoopState::Watching(events) => self.watch_next(events, &cancel).await,
                LoopState::Retrying => self.retry(&cancel).await,
            };
        }

        info!("Stopped watching {kind} for scope {}", self.scope.name());
        self.scope
    }

    async fn list(&mut self, cancel: &CancellationToken) -> LoopState<T> {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return LoopState::Stopped,
            result = self.resync() => result,
        };
        match result {
            Ok(events) => {
                self.backoff.reset();
                LoopState::Watching(events)
            }
            Err(e) => {
                warn!("Error listing {}: {e}", self.source.kind());
                LoopState::Retrying
            }
        }
    }

    async fn resync(&mut self) -> Result<Events<T>> {
        let list = self.source.list().await?;
        debug!(
            "Listed {} {} at version {}",
            list.items.len(),
            self.source.kind(),
            list.resource_version
        );

        let mut seen = BTreeSet::new();
        for item in &list.items {
            let name = item.source_name();
            self.scope.replace(&name, item.records()).await?;
            seen.insert(name);
        }
        for stale in self.scope.sources() {
            if !seen.contains(&stale) {
                info!("Removing records of {stale}: no longer listed");
                self.scope.replace(&stale, Vec::new()).await?;
            }
        }
        self.scope.mark_ready().await?;

        self.source.watch(&list.resource_version).await
    }

    async fn watch_next(&mut self, mut events: Events<T>, cancel: &CancellationToken) -> LoopState<T> {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => return LoopState::Stopped,
            event = events.recv() => event,
        };
        match event {
            Some(Ok(event)) => match self.apply(event).await {
                Ok(()) => LoopState::Watching(events),
                Err(e) => {
                    warn!("Error applying {} event: {e}", self.source.kind());
                    LoopState::Retrying
                }
            },
            Some(Err(e)) => {
                warn!("Error watching {}: {e}", self.source.kind());
                LoopState::Retrying
            }
            None => {
                let closed = WatchError::Closed {
                    kind: self.source.kind().to_string(),
                };
                warn!("{closed}");
                LoopState::Retrying
            }
        }
    }

    async fn apply(&mut self, event: WatchEvent<T>) -> Result<()> {
        match event {
            WatchEvent::Added(object) | WatchEvent::Modified(object) => {
                let name = object.source_name();
                debug!("{} {name} changed", self.source.kind());
                self.scope.replace(&name, object.records()).await
            }
            WatchEvent::Deleted(object) => {
                let name = object.source_name();
                debug!("{} {name} deleted", self.source.kind());
                self.scope.replace(&name, Vec::new()).await
            }
        }
    }

    async fn retry(&mut self, cancel: &CancellationToken) -> LoopState<T> {
        let delay = self.backoff.next_delay();
        debug!("Retrying {} in {delay:?}", self.source.kind());
        tokio::select! {
            biased;
            () = cancel.cancelled() => LoopState::Stopped,
            () = self.sleeper.sleep(delay) => LoopState::Listing,
        }
    }
}
