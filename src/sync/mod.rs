//! Client-side state shared by every view of the app.
//!
//! One store per concern: [`FeedState`] for posts and likes, [`FollowState`]
//! for the viewer's follow graph. A follow made on a profile must show up on
//! suggestion cards and in follower lists without a refetch, so views read
//! from the store instead of keeping their own copies.
//!
//! Optimistic changes are tracked as tickets. A ticket is confirmed with the
//! server's answer or reverted to the values seen before the click. At most
//! one ticket per post or user is in flight; a second click while one is
//! pending is ignored.

mod feed;
mod follows;
mod session;

pub use feed::{FeedState, LikeTicket, PageMode};
pub use follows::{FollowState, FollowTicket};
pub use session::Session;

pub const FEED_LOAD_ERROR: &str = "Failed to load posts";
pub const LIKE_ERROR: &str = "Failed to update like";
pub const FOLLOW_ERROR: &str = "Failed to update follow";
