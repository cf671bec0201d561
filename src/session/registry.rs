//! Group and member bookkeeping.
//!
//! # Responsibilities
//! - Generate identities for new sessions and hold their passwords
//! - Admit members into existing groups after a password check
//! - Drop a group together with its password when its last member leaves
//! - Hand out a broadcast capability over a group's current members

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::join_all;
use uuid::Uuid;

use crate::config::IdentityConfig;
use crate::identity::{self, Alphabet};
use crate::observability::metrics;
use crate::session::{MemberLink, SessionError};

/// Opaque per-member identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberHandle(Uuid);

impl MemberHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemberHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "member-{}", self.0)
    }
}

/// Result of a successful create or join.
#[derive(Debug, Clone)]
pub struct Session {
    /// Group key: the leftmost host label of `url`.
    pub key: String,
    pub url: String,
    pub password: String,
    pub handle: MemberHandle,
}

struct Group {
    url: String,
    password: String,
    members: HashMap<MemberHandle, Arc<MemberLink>>,
}

/// Registry of live groups.
///
/// Each operation on a group runs under that entry's shard lock, so create,
/// join and remove on one group are serialized while unrelated groups proceed
/// independently.
pub struct Registry {
    groups: DashMap<String, Group>,
    identity: IdentityConfig,
    delivery_timeout: Duration,
}

impl Registry {
    /// Per-member delivery bound when none is configured.
    pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(identity: IdentityConfig) -> Self {
        Self {
            groups: DashMap::new(),
            identity,
            delivery_timeout: Self::DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    /// Bound each member's share of a broadcast to `timeout`.
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Start a new group with `link` as its only member.
    pub fn create_session(&self, link: Arc<MemberLink>) -> Session {
        loop {
            let key = identity::generate(Alphabet::LowerAlnum, self.identity.subdomain_len);
            let slot = match self.groups.entry(key.clone()) {
                Entry::Vacant(slot) => slot,
                Entry::Occupied(_) => {
                    tracing::warn!(key = %key, "Generated identity collides with a live group, redrawing");
                    continue;
                }
            };

            let url = identity::identity_url(&self.identity.scheme, &self.identity.domain, &key);
            let password = identity::generate(Alphabet::MixedAlnum, self.identity.password_len);
            let handle = MemberHandle::new();

            let mut members = HashMap::new();
            members.insert(handle, link);
            slot.insert(Group {
                url: url.clone(),
                password: password.clone(),
                members,
            });

            tracing::info!(key = %key, member = %handle, "Session created");
            metrics::record_member_added("create");
            metrics::record_group_count(self.groups.len());
            return Session {
                key,
                url,
                password,
                handle,
            };
        }
    }

    /// Add `link` to the group named by `url` if `password` matches.
    ///
    /// Failed joins leave the target group untouched.
    pub fn join_session(
        &self,
        url: &str,
        password: &str,
        link: Arc<MemberLink>,
    ) -> Result<Session, SessionError> {
        let key = identity::url_label(url).ok_or(SessionError::InvalidGroup)?;
        let mut group = self
            .groups
            .get_mut(&key)
            .ok_or(SessionError::InvalidGroup)?;

        if !identity::passwords_match(&group.password, password) {
            tracing::warn!(key = %key, "Rejected group join with wrong password");
            return Err(SessionError::WrongPassword);
        }

        let handle = MemberHandle::new();
        group.members.insert(handle, link);
        let session = Session {
            key: key.clone(),
            url: group.url.clone(),
            password: group.password.clone(),
            handle,
        };
        let members = group.members.len();
        drop(group);

        tracing::info!(key = %key, member = %handle, members, "Member joined group");
        metrics::record_member_added("join");
        Ok(session)
    }

    /// Remove a member; the group and its password go with the last one.
    ///
    /// Returns whether the handle was present. Removing twice is a no-op.
    pub fn remove_member(&self, key: &str, handle: MemberHandle) -> bool {
        let removed = {
            let Entry::Occupied(mut entry) = self.groups.entry(key.to_string()) else {
                return false;
            };

            let removed = entry.get_mut().members.remove(&handle).is_some();
            if entry.get().members.is_empty() {
                entry.remove();
                tracing::info!(key = %key, "Last member left, group dropped");
            }
            removed
        };

        // Shard lock is released here; len() takes every shard.
        if removed {
            metrics::record_group_count(self.groups.len());
        }
        removed
    }

    /// Snapshot of a group's members for delivery.
    pub fn group_handler(&self, key: &str) -> Option<GroupHandler> {
        self.groups.get(key).map(|group| GroupHandler {
            key: key.to_string(),
            timeout: self.delivery_timeout,
            members: group
                .members
                .iter()
                .map(|(handle, link)| (*handle, Arc::clone(link)))
                .collect(),
        })
    }

    /// Deliver `message` to every member of `key`; returns successful sends.
    pub async fn broadcast(&self, key: &str, message: Message) -> usize {
        match self.group_handler(key) {
            Some(handler) => handler.broadcast(message).await,
            None => 0,
        }
    }

    /// Member count of `key`, or `None` when no such group exists.
    pub fn lookup(&self, key: &str) -> Option<usize> {
        self.groups.get(key).map(|group| group.members.len())
    }

    /// Whether a password is held for `key`.
    pub fn has_password(&self, key: &str) -> bool {
        self.groups.contains_key(key)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Broadcast capability over one group's members at a point in time.
///
/// Sends happen after the registry lock is released. A member removed after
/// the snapshot may still be attempted; that attempt simply fails. A member
/// that does not take the frame within the delivery timeout counts as
/// undelivered.
pub struct GroupHandler {
    key: String,
    timeout: Duration,
    members: Vec<(MemberHandle, Arc<MemberLink>)>,
}

impl GroupHandler {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Send `message` to every member concurrently; returns successful sends.
    pub async fn broadcast(&self, message: Message) -> usize {
        let sends = self.members.iter().map(|(handle, link)| {
            let message = message.clone();
            async move {
                match tokio::time::timeout(self.timeout, link.send(message)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::debug!(key = %self.key, member = %handle, error = %e, "Broadcast delivery failed");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(key = %self.key, member = %handle, "Broadcast delivery timed out");
                        false
                    }
                }
            }
        });

        let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
        metrics::record_broadcast(delivered, self.len());
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::link::{channel_link, stalled_link};

    fn registry() -> Registry {
        Registry::new(IdentityConfig::default())
    }

    #[test]
    fn created_session_has_valid_identity() {
        let registry = registry();
        let (link, _rx) = channel_link();
        let session = registry.create_session(link);

        assert_eq!(session.key.len(), 8);
        assert_eq!(session.password.len(), 6);
        assert!(identity::validate_url(&session.url));
        assert_eq!(identity::url_label(&session.url).as_deref(), Some(session.key.as_str()));
        assert_eq!(registry.lookup(&session.key), Some(1));
        assert!(registry.has_password(&session.key));
    }

    #[test]
    fn removing_sole_member_drops_group_and_password() {
        let registry = registry();
        let (link, _rx) = channel_link();
        let session = registry.create_session(link);

        assert!(registry.remove_member(&session.key, session.handle));
        assert_eq!(registry.lookup(&session.key), None);
        assert!(!registry.has_password(&session.key));
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn group_survives_until_last_member_leaves() {
        let registry = registry();
        let (first, _rx1) = channel_link();
        let (second, _rx2) = channel_link();
        let owner = registry.create_session(first);
        let joined = registry
            .join_session(&owner.url, &owner.password, second)
            .unwrap();

        assert_eq!(joined.key, owner.key);
        assert_ne!(joined.handle, owner.handle);
        assert_eq!(registry.lookup(&owner.key), Some(2));

        registry.remove_member(&owner.key, owner.handle);
        assert_eq!(registry.lookup(&owner.key), Some(1));
        assert!(registry.has_password(&owner.key));

        registry.remove_member(&owner.key, joined.handle);
        assert_eq!(registry.lookup(&owner.key), None);
        assert!(!registry.has_password(&owner.key));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = registry();
        let (first, _rx1) = channel_link();
        let (second, _rx2) = channel_link();
        let owner = registry.create_session(first);
        registry.join_session(&owner.url, &owner.password, second).unwrap();

        assert!(registry.remove_member(&owner.key, owner.handle));
        assert!(!registry.remove_member(&owner.key, owner.handle));
        assert_eq!(registry.lookup(&owner.key), Some(1));
        assert!(!registry.remove_member("nosuchgroup", MemberHandle::new()));
    }

    #[test]
    fn failed_joins_leave_group_untouched() {
        let registry = registry();
        let (first, _rx1) = channel_link();
        let owner = registry.create_session(first);

        let (link, _rx) = channel_link();
        let err = registry
            .join_session("http://zzzzzzzz.localhost:8080", &owner.password, link.clone())
            .unwrap_err();
        assert_eq!(err, SessionError::InvalidGroup);

        let err = registry
            .join_session(&owner.url, "not-it", link.clone())
            .unwrap_err();
        assert_eq!(err, SessionError::WrongPassword);

        let err = registry.join_session("garbage", &owner.password, link).unwrap_err();
        assert_eq!(err, SessionError::InvalidGroup);

        assert_eq!(registry.lookup(&owner.key), Some(1));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member() {
        let registry = registry();
        let (first, mut rx1) = channel_link();
        let (second, mut rx2) = channel_link();
        let owner = registry.create_session(first);
        registry.join_session(&owner.url, &owner.password, second).unwrap();

        let delivered = registry
            .broadcast(&owner.key, Message::Binary(vec![7, 7].into()))
            .await;
        assert_eq!(delivered, 2);
        assert!(matches!(rx1.recv().await, Some(Message::Binary(b)) if b[..] == [7, 7]));
        assert!(matches!(rx2.recv().await, Some(Message::Binary(b)) if b[..] == [7, 7]));
    }

    #[tokio::test]
    async fn broadcast_counts_failures_without_removing() {
        let registry = registry();
        let (first, rx1) = channel_link();
        let (second, mut rx2) = channel_link();
        let owner = registry.create_session(first);
        registry.join_session(&owner.url, &owner.password, second).unwrap();
        drop(rx1);

        let delivered = registry
            .broadcast(&owner.key, Message::Binary(vec![1].into()))
            .await;
        assert_eq!(delivered, 1);
        assert!(rx2.recv().await.is_some());
        assert_eq!(registry.lookup(&owner.key), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_member_does_not_hold_up_broadcast() {
        let registry = registry().with_delivery_timeout(Duration::from_secs(5));
        let (healthy, mut rx) = channel_link();
        let owner = registry.create_session(healthy);
        registry
            .join_session(&owner.url, &owner.password, stalled_link())
            .unwrap();

        let started = tokio::time::Instant::now();
        let delivered = registry
            .broadcast(&owner.key, Message::Binary(vec![3].into()))
            .await;

        assert_eq!(delivered, 1);
        assert!(started.elapsed() <= Duration::from_secs(5) + Duration::from_millis(10));
        assert!(matches!(rx.recv().await, Some(Message::Binary(b)) if b[..] == [3]));
        assert_eq!(registry.lookup(&owner.key), Some(2));
    }

    #[tokio::test]
    async fn group_handler_snapshots_members() {
        let registry = registry();
        let (first, _rx1) = channel_link();
        let owner = registry.create_session(first);
        let handler = registry.group_handler(&owner.key).unwrap();

        let (second, _rx2) = channel_link();
        registry.join_session(&owner.url, &owner.password, second).unwrap();

        assert_eq!(handler.len(), 1);
        assert!(!handler.is_empty());
        assert_eq!(registry.lookup(&owner.key), Some(2));
    }

    #[tokio::test]
    async fn broadcast_to_unknown_group_delivers_nothing() {
        let registry = registry();
        assert_eq!(registry.broadcast("missing", Message::Binary(vec![].into())).await, 0);
        assert!(registry.group_handler("missing").is_none());
    }
}
