//! Entity trait for cacheable remote records

use bitforge_client::types::{
    Clan, FeedItem, ForumCategory, MarketplaceItem, Match, MediaItem, OnlineUser, Post, Report,
    SubscriptionTier, Theme, Thread, Tournament, User,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Kind of a cached entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    OnlineUser,
    Clan,
    ForumCategory,
    Thread,
    Post,
    FeedItem,
    Media,
    Theme,
    MarketplaceItem,
    SubscriptionTier,
    Report,
    Tournament,
    Match,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::OnlineUser => "online_user",
            Self::Clan => "clan",
            Self::ForumCategory => "forum_category",
            Self::Thread => "thread",
            Self::Post => "post",
            Self::FeedItem => "feed_item",
            Self::Media => "media",
            Self::Theme => "theme",
            Self::MarketplaceItem => "marketplace_item",
            Self::SubscriptionTier => "subscription_tier",
            Self::Report => "report",
            Self::Tournament => "tournament",
            Self::Match => "match",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A remotely-sourced record that can live in the [`EntityCache`](crate::cache::EntityCache).
///
/// ```rust,ignore
/// impl Entity for Clan {
///     const KIND: EntityKind = EntityKind::Clan;
///     fn entity_id(&self) -> &str { &self.id }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: EntityKind;

    /// Stable id assigned by the backend
    fn entity_id(&self) -> &str;
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn entity_id(&self) -> &str {
                &self.id
            }
        }
    };
}

impl_entity!(User, EntityKind::User);
impl_entity!(OnlineUser, EntityKind::OnlineUser);
impl_entity!(Clan, EntityKind::Clan);
impl_entity!(ForumCategory, EntityKind::ForumCategory);
impl_entity!(Thread, EntityKind::Thread);
impl_entity!(Post, EntityKind::Post);
impl_entity!(FeedItem, EntityKind::FeedItem);
impl_entity!(MediaItem, EntityKind::Media);
impl_entity!(Theme, EntityKind::Theme);
impl_entity!(MarketplaceItem, EntityKind::MarketplaceItem);
impl_entity!(Report, EntityKind::Report);
impl_entity!(Tournament, EntityKind::Tournament);
impl_entity!(Match, EntityKind::Match);

impl Entity for SubscriptionTier {
    const KIND: EntityKind = EntityKind::SubscriptionTier;

    fn entity_id(&self) -> &str {
        self.tier.as_str()
    }
}
