use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    auth::UserResponse,
    follows::{FollowActionResponse, FollowSuggestionResponse, FollowUserResponse},
    users::UserProfileResponse,
};

/// Handle for one in-flight follow toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowTicket {
    pub user_id: Uuid,
    id: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingFollow {
    ticket: u64,
    was_following: bool,
    followers_count: Option<i64>,
    /// Change this toggle made to the viewer's following count, after clamping
    viewer_delta: i64,
}

/// The viewer's side of the follow graph, as last seen from the server plus
/// any toggles still in flight.
#[derive(Debug, Default)]
pub struct FollowState {
    viewer: Option<Uuid>,
    following: HashMap<Uuid, bool>,
    followers_count: HashMap<Uuid, i64>,
    viewer_following_count: Option<i64>,
    pending: HashMap<Uuid, PendingFollow>,
    next_ticket: u64,
    pub error: Option<String>,
}

impl FollowState {
    pub fn new(viewer: Option<Uuid>) -> Self {
        Self {
            viewer,
            ..Default::default()
        }
    }

    pub fn viewer(&self) -> Option<Uuid> {
        self.viewer
    }

    /// Adopt the signed-in user, e.g. after `GET /api/auth/me`.
    pub fn set_viewer(&mut self, user: &UserResponse) {
        self.viewer = Some(user.id);
        self.viewer_following_count = Some(user.following_count);
        self.followers_count.insert(user.id, user.followers_count);
    }

    pub fn is_following(&self, user_id: Uuid) -> bool {
        self.following.get(&user_id).copied().unwrap_or(false)
    }

    pub fn followers_count(&self, user_id: Uuid) -> Option<i64> {
        self.followers_count.get(&user_id).copied()
    }

    pub fn viewer_following_count(&self) -> Option<i64> {
        self.viewer_following_count
    }

    pub fn is_pending(&self, user_id: Uuid) -> bool {
        self.pending.contains_key(&user_id)
    }

    fn observe_status(&mut self, user_id: Uuid, is_following: bool) {
        if self.pending.contains_key(&user_id) || self.viewer == Some(user_id) {
            return;
        }
        self.following.insert(user_id, is_following);
    }

    /// Record follow status from a followers/following page.
    pub fn observe_users(&mut self, users: &[FollowUserResponse]) {
        for u in users {
            self.observe_status(u.user.id, u.is_following);
        }
    }

    /// Record a profile's status and counters.
    pub fn observe_profile(&mut self, profile: &UserProfileResponse) {
        if self.viewer == Some(profile.id) {
            if self.pending.is_empty() {
                self.viewer_following_count = Some(profile.following_count);
            }
        } else {
            self.observe_status(profile.id, profile.is_following);
        }
        if !self.pending.contains_key(&profile.id) {
            self.followers_count
                .insert(profile.id, profile.followers_count);
        }
    }

    /// Suggestions are made for users the viewer did not follow when the
    /// list was built. A card may be older than a follow made since, so it
    /// only fills in users the store knows nothing about.
    pub fn observe_suggestions(&mut self, cards: &[FollowSuggestionResponse]) {
        for card in cards {
            let id = card.user.id;
            if self.pending.contains_key(&id) || self.viewer == Some(id) {
                continue;
            }
            self.following.entry(id).or_insert(false);
            self.followers_count.entry(id).or_insert(card.followers_count);
        }
    }

    /// Optimistically flip the follow status of `user_id`. `None` for the
    /// viewer's own account, when signed out, or while a toggle is in flight.
    pub fn begin_toggle(&mut self, user_id: Uuid) -> Option<FollowTicket> {
        let viewer = self.viewer?;
        if viewer == user_id || self.pending.contains_key(&user_id) {
            return None;
        }

        let was_following = self.is_following(user_id);
        self.next_ticket += 1;
        let ticket = FollowTicket {
            user_id,
            id: self.next_ticket,
        };
        let followers_before = self.followers_count(user_id);

        let delta = if was_following { -1 } else { 1 };
        self.following.insert(user_id, !was_following);
        if let Some(count) = self.followers_count.get_mut(&user_id) {
            *count = (*count + delta).max(0);
        }
        let mut viewer_delta = 0;
        if let Some(count) = self.viewer_following_count.as_mut() {
            let before = *count;
            *count = (before + delta).max(0);
            viewer_delta = *count - before;
        }

        self.pending.insert(
            user_id,
            PendingFollow {
                ticket: ticket.id,
                was_following,
                followers_count: followers_before,
                viewer_delta,
            },
        );

        Some(ticket)
    }

    /// Apply the server's answer. Returns false for a stale ticket.
    ///
    /// The viewer's following count is taken from the server only when no
    /// other toggle is in flight; otherwise the server may or may not have
    /// seen those yet, and the local count is corrected for this toggle alone.
    pub fn confirm(&mut self, ticket: FollowTicket, result: FollowActionResponse) -> bool {
        let Some(before) = self.take_pending(ticket) else {
            return false;
        };
        let optimistic = !before.was_following;
        self.following.insert(ticket.user_id, result.following);
        self.followers_count
            .insert(ticket.user_id, result.followers_count);

        if self.pending.is_empty() {
            self.viewer_following_count = Some(result.following_count);
        } else if result.following != optimistic {
            // The server kept the old status, so this toggle changed nothing
            if let Some(count) = self.viewer_following_count.as_mut() {
                *count = (*count - before.viewer_delta).max(0);
            }
        }
        true
    }

    /// Restore the state from before the click and show `message`.
    pub fn revert(&mut self, ticket: FollowTicket, message: impl Into<String>) -> bool {
        let Some(before) = self.take_pending(ticket) else {
            return false;
        };
        self.following.insert(ticket.user_id, before.was_following);
        match before.followers_count {
            Some(count) => self.followers_count.insert(ticket.user_id, count),
            None => self.followers_count.remove(&ticket.user_id),
        };
        if let Some(count) = self.viewer_following_count.as_mut() {
            *count = (*count - before.viewer_delta).max(0);
        }
        self.error = Some(message.into());
        true
    }

    fn take_pending(&mut self, ticket: FollowTicket) -> Option<PendingFollow> {
        match self.pending.get(&ticket.user_id) {
            Some(p) if p.ticket == ticket.id => self.pending.remove(&ticket.user_id),
            _ => None,
        }
    }

    /// Suggestion cards still worth showing: not the viewer, not followed.
    /// A card stays while its own toggle is in flight.
    pub fn visible_suggestions<'a>(
        &self,
        cards: &'a [FollowSuggestionResponse],
    ) -> Vec<&'a FollowSuggestionResponse> {
        cards
            .iter()
            .filter(|c| self.viewer != Some(c.user.id))
            .filter(|c| self.is_pending(c.user.id) || !self.is_following(c.user.id))
            .collect()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::fixtures::author;

    fn card(id: Uuid, followers: i64) -> FollowSuggestionResponse {
        FollowSuggestionResponse {
            user: author(id),
            bio: None,
            followers_count: followers,
            mutual_followers_count: 0,
        }
    }

    fn profile(id: Uuid, followers: i64, is_following: bool) -> UserProfileResponse {
        UserProfileResponse {
            id,
            username: "someone".to_string(),
            first_name: None,
            last_name: None,
            bio: None,
            avatar_url: None,
            followers_count: followers,
            following_count: 0,
            posts_count: 0,
            is_following,
            created_at: chrono::Utc::now(),
        }
    }

    fn signed_in(following: i64) -> (FollowState, Uuid) {
        let viewer = Uuid::new_v4();
        let mut state = FollowState::new(Some(viewer));
        state.viewer_following_count = Some(following);
        (state, viewer)
    }

    #[test]
    fn toggle_adjusts_both_counters() {
        let (mut state, _) = signed_in(3);
        let target = Uuid::new_v4();
        state.observe_profile(&profile(target, 10, false));

        let ticket = state.begin_toggle(target).unwrap();
        assert!(state.is_following(target));
        assert_eq!(state.followers_count(target), Some(11));
        assert_eq!(state.viewer_following_count(), Some(4));

        assert!(state.confirm(
            ticket,
            FollowActionResponse {
                following: true,
                followers_count: 12,
                following_count: 4,
            }
        ));
        assert_eq!(state.followers_count(target), Some(12));
        assert!(!state.is_pending(target));
    }

    #[test]
    fn cannot_follow_self_or_double_click() {
        let (mut state, viewer) = signed_in(0);
        assert!(state.begin_toggle(viewer).is_none());

        let target = Uuid::new_v4();
        assert!(state.begin_toggle(target).is_some());
        assert!(state.begin_toggle(target).is_none());

        let mut anonymous = FollowState::new(None);
        assert!(anonymous.begin_toggle(target).is_none());
    }

    #[test]
    fn revert_restores_previous_state() {
        let (mut state, _) = signed_in(5);
        let target = Uuid::new_v4();
        state.observe_profile(&profile(target, 1, true));

        let ticket = state.begin_toggle(target).unwrap();
        assert!(!state.is_following(target));
        assert_eq!(state.followers_count(target), Some(0));
        assert_eq!(state.viewer_following_count(), Some(4));

        assert!(state.revert(ticket, "Failed to update follow"));
        assert!(state.is_following(target));
        assert_eq!(state.followers_count(target), Some(1));
        assert_eq!(state.viewer_following_count(), Some(5));
        assert_eq!(state.error.as_deref(), Some("Failed to update follow"));
        assert!(!state.confirm(
            ticket,
            FollowActionResponse {
                following: false,
                followers_count: 0,
                following_count: 4,
            }
        ));
    }

    #[test]
    fn stale_observations_do_not_clobber_pending_toggle() {
        let (mut state, _) = signed_in(0);
        let target = Uuid::new_v4();
        state.observe_profile(&profile(target, 2, false));
        state.begin_toggle(target).unwrap();

        // A list fetched before the click arrives late
        state.observe_profile(&profile(target, 2, false));
        assert!(state.is_following(target));
        assert_eq!(state.followers_count(target), Some(3));
    }

    #[test]
    fn follow_on_profile_hides_suggestion_card() {
        let (mut state, viewer) = signed_in(0);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let cards = vec![card(a, 4), card(b, 2), card(viewer, 0)];
        state.observe_suggestions(&cards);

        let ticket = state.begin_toggle(a).unwrap();
        assert_eq!(state.visible_suggestions(&cards).len(), 2);

        state.confirm(
            ticket,
            FollowActionResponse {
                following: true,
                followers_count: 5,
                following_count: 1,
            },
        );
        let visible: Vec<Uuid> = state
            .visible_suggestions(&cards)
            .iter()
            .map(|c| c.user.id)
            .collect();
        assert_eq!(visible, vec![b]);
    }

    #[test]
    fn reverting_one_toggle_keeps_the_other() {
        let (mut state, _) = signed_in(3);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let ticket_a = state.begin_toggle(a).unwrap();
        let ticket_b = state.begin_toggle(b).unwrap();
        assert_eq!(state.viewer_following_count(), Some(5));

        assert!(state.revert(ticket_a, "Failed to update follow"));
        assert_eq!(state.viewer_following_count(), Some(4));
        assert!(state.is_following(b));

        assert!(state.revert(ticket_b, "Failed to update follow"));
        assert_eq!(state.viewer_following_count(), Some(3));
    }

    #[test]
    fn confirm_with_other_toggle_pending_keeps_its_delta() {
        let (mut state, _) = signed_in(3);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let ticket_a = state.begin_toggle(a).unwrap();
        let ticket_b = state.begin_toggle(b).unwrap();

        // The server answered A before it saw B
        state.confirm(
            ticket_a,
            FollowActionResponse {
                following: true,
                followers_count: 1,
                following_count: 4,
            },
        );
        assert_eq!(state.viewer_following_count(), Some(5));

        state.revert(ticket_b, "Failed to update follow");
        assert_eq!(state.viewer_following_count(), Some(4));
    }

    #[test]
    fn stale_suggestions_do_not_undo_a_follow() {
        let (mut state, _) = signed_in(0);
        let a = Uuid::new_v4();
        let cards = vec![card(a, 4)];

        let ticket = state.begin_toggle(a).unwrap();
        state.confirm(
            ticket,
            FollowActionResponse {
                following: true,
                followers_count: 5,
                following_count: 1,
            },
        );

        // Fetched before the follow landed
        state.observe_suggestions(&cards);
        assert!(state.is_following(a));
        assert_eq!(state.followers_count(a), Some(5));
        assert!(state.visible_suggestions(&cards).is_empty());
    }

    #[test]
    fn list_pages_record_status() {
        let (mut state, _) = signed_in(0);
        let id = Uuid::new_v4();
        state.observe_users(&[FollowUserResponse {
            user: author(id),
            bio: None,
            is_following: true,
            followed_at: chrono::Utc::now(),
        }]);
        assert!(state.is_following(id));
        assert_eq!(state.followers_count(id), None);
    }
}
