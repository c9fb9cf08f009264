//! The signed-in identity

use bitforge_client::types::{Role, Tier, User};

/// Current authenticated identity.
///
/// A read-only projection over the backend's user record. The bearer token
/// itself lives in the client's token store.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn display_name(&self) -> &str {
        self.user.shown_name()
    }

    /// Virtual currency balance
    pub fn code_bits(&self) -> u64 {
        self.user.code_bits
    }

    pub fn tier(&self) -> Tier {
        self.user.tier
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.user.roles.contains(&role)
    }

    pub fn is_banned(&self) -> bool {
        self.user.is_banned
    }

    pub fn can_afford(&self, price: u64) -> bool {
        self.user.code_bits >= price
    }

    pub fn owns_theme(&self, theme_id: &str) -> bool {
        self.user.owned_themes.iter().any(|t| t == theme_id)
    }

    pub fn active_theme(&self) -> Option<&str> {
        self.user.active_theme.as_deref()
    }

    pub fn owns_item(&self, item_id: &str) -> bool {
        self.user.inventory.iter().any(|i| i == item_id)
    }

    pub fn is_following(&self, user_id: &str) -> bool {
        self.user.following.iter().any(|f| f == user_id)
    }

    pub fn has_blocked(&self, user_id: &str) -> bool {
        self.user.blocked.iter().any(|b| b == user_id)
    }

    pub fn clan_id(&self) -> Option<&str> {
        self.user.clan_id.as_deref()
    }

    pub(crate) fn user_mut(&mut self) -> &mut User {
        &mut self.user
    }
}
