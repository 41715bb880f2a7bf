use std::collections::HashMap;

use uuid::Uuid;

use crate::posts::{FeedScope, LikeActionResponse, PostListResponse, PostResponse};

/// How a fetched page is merged into the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    /// First page after a refresh; drops what was shown before.
    Replace,
    /// Next page for infinite scroll.
    Append,
}

/// Handle for one in-flight like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeTicket {
    pub post_id: Uuid,
    id: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingLike {
    ticket: u64,
    liked_by_me: bool,
    like_count: i64,
}

/// Posts of one feed in display order.
#[derive(Debug, Default)]
pub struct FeedState {
    pub scope: FeedScope,
    order: Vec<Uuid>,
    posts: HashMap<Uuid, PostResponse>,
    pending: HashMap<Uuid, PendingLike>,
    next_ticket: u64,
    /// Offset to request the next page from
    pub next_offset: i64,
    pub has_more: bool,
    pub total: i64,
    pub loading: bool,
    pub error: Option<String>,
}

impl FeedState {
    pub fn new(scope: FeedScope) -> Self {
        Self {
            scope,
            has_more: true,
            ..Default::default()
        }
    }

    pub fn posts(&self) -> impl Iterator<Item = &PostResponse> {
        self.order.iter().filter_map(|id| self.posts.get(id))
    }

    pub fn get(&self, post_id: Uuid) -> Option<&PostResponse> {
        self.posts.get(&post_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_like_pending(&self, post_id: Uuid) -> bool {
        self.pending.contains_key(&post_id)
    }

    /// Merge a page from the server.
    ///
    /// New posts shift offsets between requests, so an appended page can
    /// repeat posts already shown. Those keep their position and take the
    /// fresher data.
    pub fn apply_page(&mut self, page: PostListResponse, mode: PageMode) {
        let fetched = page.posts.len() as i64;

        let mut previous = HashMap::new();
        if mode == PageMode::Replace {
            self.order.clear();
            previous = std::mem::take(&mut self.posts);
            self.next_offset = 0;
        }

        for mut post in page.posts {
            let shown = self.posts.get(&post.id).or_else(|| previous.get(&post.id));
            if let (true, Some(shown)) = (self.pending.contains_key(&post.id), shown) {
                post.liked_by_me = shown.liked_by_me;
                post.like_count = shown.like_count;
            }

            if !self.posts.contains_key(&post.id) {
                self.order.push(post.id);
            }
            self.posts.insert(post.id, post);
        }

        self.next_offset += fetched;
        self.has_more = page.has_more;
        self.total = page.total;
        self.loading = false;
        self.error = None;
    }

    /// Optimistically flip the viewer's like. `None` while a toggle for the
    /// post is already in flight or the post is not in the feed.
    pub fn begin_like(&mut self, post_id: Uuid) -> Option<LikeTicket> {
        if self.pending.contains_key(&post_id) {
            return None;
        }
        let post = self.posts.get_mut(&post_id)?;

        self.next_ticket += 1;
        let ticket = LikeTicket {
            post_id,
            id: self.next_ticket,
        };
        self.pending.insert(
            post_id,
            PendingLike {
                ticket: ticket.id,
                liked_by_me: post.liked_by_me,
                like_count: post.like_count,
            },
        );

        post.liked_by_me = !post.liked_by_me;
        post.like_count = if post.liked_by_me {
            post.like_count + 1
        } else {
            (post.like_count - 1).max(0)
        };

        Some(ticket)
    }

    /// Apply the server's answer. Returns false for a stale ticket.
    pub fn confirm_like(&mut self, ticket: LikeTicket, result: LikeActionResponse) -> bool {
        if self.take_pending(ticket).is_none() {
            return false;
        }
        if let Some(post) = self.posts.get_mut(&ticket.post_id) {
            post.liked_by_me = result.liked;
            post.like_count = result.like_count.max(0);
        }
        true
    }

    /// Restore the values from before the click and show `message`.
    pub fn revert_like(&mut self, ticket: LikeTicket, message: impl Into<String>) -> bool {
        let Some(before) = self.take_pending(ticket) else {
            return false;
        };
        if let Some(post) = self.posts.get_mut(&ticket.post_id) {
            post.liked_by_me = before.liked_by_me;
            post.like_count = before.like_count;
        }
        self.error = Some(message.into());
        true
    }

    fn take_pending(&mut self, ticket: LikeTicket) -> Option<PendingLike> {
        match self.pending.get(&ticket.post_id) {
            Some(p) if p.ticket == ticket.id => self.pending.remove(&ticket.post_id),
            _ => None,
        }
    }

    /// Show a post the viewer just created at the top.
    pub fn prepend(&mut self, post: PostResponse) {
        let id = post.id;
        if self.posts.insert(id, post).is_some() {
            self.order.retain(|p| *p != id);
        } else {
            self.total += 1;
            // The server's offsets moved by one
            self.next_offset += 1;
        }
        self.order.insert(0, id);
    }

    pub fn remove(&mut self, post_id: Uuid) -> Option<PostResponse> {
        let post = self.posts.remove(&post_id)?;
        self.order.retain(|p| *p != post_id);
        self.pending.remove(&post_id);
        self.total = (self.total - 1).max(0);
        self.next_offset = (self.next_offset - 1).max(0);
        Some(post)
    }

    pub fn adjust_comment_count(&mut self, post_id: Uuid, delta: i64) {
        if let Some(post) = self.posts.get_mut(&post_id) {
            post.comment_count = (post.comment_count + delta).max(0);
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
