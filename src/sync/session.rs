use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::{
    client::{ClientError, SocialApi},
    posts::FeedScope,
    sync::{FeedState, FollowState, PageMode, FEED_LOAD_ERROR, FOLLOW_ERROR, LIKE_ERROR},
};

const PAGE_SIZE: i64 = 20;

#[derive(Debug, Default)]
struct LoadState {
    failed: Option<PageMode>,
    /// Bumped by every refresh; appends started before it are dropped
    generation: u64,
}

/// The stores plus the API they are synchronized with.
///
/// Every action takes `&self`. A store is locked only to begin or settle a
/// change, never across a request, so views can read the optimistic state
/// and start a refetch while a like or follow is still in flight.
/// Failures leave an inline message on the store; the caller decides
/// whether to [`retry`](Session::retry).
pub struct Session<A> {
    api: A,
    feed: Mutex<FeedState>,
    follows: Mutex<FollowState>,
    loads: Mutex<LoadState>,
    page_size: i64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Store methods never leave a half-applied change, so poisoning is ignored
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A: SocialApi> Session<A> {
    pub fn new(api: A, viewer: Option<Uuid>, scope: FeedScope) -> Self {
        Self {
            api,
            feed: Mutex::new(FeedState::new(scope)),
            follows: Mutex::new(FollowState::new(viewer)),
            loads: Mutex::new(LoadState::default()),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// The feed store. Do not hold the guard across an `.await`.
    pub fn feed(&self) -> MutexGuard<'_, FeedState> {
        lock(&self.feed)
    }

    /// The follow store. Do not hold the guard across an `.await`.
    pub fn follows(&self) -> MutexGuard<'_, FollowState> {
        lock(&self.follows)
    }

    /// Reload the first page.
    pub async fn refresh_feed(&self) -> Result<(), ClientError> {
        self.load(PageMode::Replace).await
    }

    /// Fetch the next page, if there is one and no load is running.
    pub async fn load_more(&self) -> Result<(), ClientError> {
        {
            let feed = self.feed();
            if !feed.has_more || feed.loading {
                return Ok(());
            }
        }
        self.load(PageMode::Append).await
    }

    /// Repeat the last failed load. Does nothing when nothing failed.
    pub async fn retry(&self) -> Result<(), ClientError> {
        let failed = lock(&self.loads).failed;
        match failed {
            Some(mode) => self.load(mode).await,
            None => Ok(()),
        }
    }

    async fn load(&self, mode: PageMode) -> Result<(), ClientError> {
        let generation = {
            let mut loads = lock(&self.loads);
            if mode == PageMode::Replace {
                loads.generation += 1;
            }
            loads.generation
        };
        let (scope, offset) = {
            let mut feed = self.feed();
            feed.loading = true;
            let offset = match mode {
                PageMode::Replace => 0,
                PageMode::Append => feed.next_offset,
            };
            (feed.scope, offset)
        };

        let result = self.api.feed_page(scope, offset, self.page_size).await;

        let mut loads = lock(&self.loads);
        if loads.generation != generation {
            // A refresh started meanwhile and owns the feed now
            return Ok(());
        }
        let mut feed = self.feed();
        match result {
            Ok(page) => {
                feed.apply_page(page, mode);
                loads.failed = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(offset, error = %e, "feed page failed");
                feed.loading = false;
                feed.set_error(FEED_LOAD_ERROR);
                loads.failed = Some(mode);
                Err(e)
            }
        }
    }

    /// Toggle the viewer's like. Returns false when the click was ignored.
    pub async fn toggle_like(&self, post_id: Uuid) -> Result<bool, ClientError> {
        let Some(ticket) = self.feed().begin_like(post_id) else {
            return Ok(false);
        };

        match self.api.toggle_like(post_id).await {
            Ok(result) => {
                self.feed().confirm_like(ticket, result);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(%post_id, error = %e, "like failed");
                self.feed().revert_like(ticket, LIKE_ERROR);
                Err(e)
            }
        }
    }

    /// Toggle following `user_id`. Returns false when the click was ignored.
    pub async fn toggle_follow(&self, user_id: Uuid) -> Result<bool, ClientError> {
        let Some(ticket) = self.follows().begin_toggle(user_id) else {
            return Ok(false);
        };

        match self.api.toggle_follow(user_id).await {
            Ok(result) => {
                self.follows().confirm(ticket, result);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "follow failed");
                self.follows().revert(ticket, FOLLOW_ERROR);
                Err(e)
            }
        }
    }
}
