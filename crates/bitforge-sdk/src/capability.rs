//! Role-based capabilities
//!
//! What a session may do is derived in exactly one place, [`capabilities`],
//! from the role flags the backend put on the user record. Views ask for a
//! [`Capability`]; none of them inspects roles or user ids directly.
//! The backend still enforces every rule; this only decides what to offer.

use crate::error::{Result, SdkError};
use crate::session::Session;
use bitforge_client::types::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Something a session may be allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read public content
    Browse,
    EditProfile,
    Follow,
    CreateClan,
    JoinClan,
    PostInForums,
    Vote,
    /// Spend codeBits in the store and marketplace
    Purchase,
    Subscribe,
    LikeMedia,
    FileReports,
    /// Pin, lock and remove other users' content; resolve reports
    ModerateContent,
    ViewAdminDashboard,
    ViewMetrics,
    BanUsers,
    ManageTournaments,
}

impl Capability {
    pub const ALL: [Capability; 16] = [
        Capability::Browse,
        Capability::EditProfile,
        Capability::Follow,
        Capability::CreateClan,
        Capability::JoinClan,
        Capability::PostInForums,
        Capability::Vote,
        Capability::Purchase,
        Capability::Subscribe,
        Capability::LikeMedia,
        Capability::FileReports,
        Capability::ModerateContent,
        Capability::ViewAdminDashboard,
        Capability::ViewMetrics,
        Capability::BanUsers,
        Capability::ManageTournaments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browse => "browse",
            Self::EditProfile => "edit_profile",
            Self::Follow => "follow",
            Self::CreateClan => "create_clan",
            Self::JoinClan => "join_clan",
            Self::PostInForums => "post_in_forums",
            Self::Vote => "vote",
            Self::Purchase => "purchase",
            Self::Subscribe => "subscribe",
            Self::LikeMedia => "like_media",
            Self::FileReports => "file_reports",
            Self::ModerateContent => "moderate_content",
            Self::ViewAdminDashboard => "view_admin_dashboard",
            Self::ViewMetrics => "view_metrics",
            Self::BanUsers => "ban_users",
            Self::ManageTournaments => "manage_tournaments",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const MEMBER: [Capability; 11] = [
    Capability::Browse,
    Capability::EditProfile,
    Capability::Follow,
    Capability::CreateClan,
    Capability::JoinClan,
    Capability::PostInForums,
    Capability::Vote,
    Capability::Purchase,
    Capability::Subscribe,
    Capability::LikeMedia,
    Capability::FileReports,
];

const MODERATOR: [Capability; 2] = [Capability::ModerateContent, Capability::ViewAdminDashboard];

const ORGANIZER: [Capability; 2] = [Capability::ManageTournaments, Capability::ViewAdminDashboard];

/// Set of capabilities held by a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// `Forbidden` unless the capability is held
    pub fn check(&self, capability: Capability) -> Result<()> {
        if self.contains(capability) {
            Ok(())
        } else {
            Err(SdkError::Forbidden(capability))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Capabilities of `session` (`None` = signed out)
pub fn capabilities(session: Option<&Session>) -> CapabilitySet {
    let session = match session {
        Some(s) => s,
        None => return [Capability::Browse].into_iter().collect(),
    };

    if session.is_admin() {
        return Capability::ALL.into_iter().collect();
    }
    if session.is_banned() {
        return [Capability::Browse].into_iter().collect();
    }

    let mut set: BTreeSet<Capability> = MEMBER.into_iter().collect();
    if session.has_role(Role::Moderator) {
        set.extend(MODERATOR);
    }
    if session.has_role(Role::TournamentOrganizer) {
        set.extend(ORGANIZER);
    }
    CapabilitySet(set)
}
