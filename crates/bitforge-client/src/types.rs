//! Wire types for the platform REST API
//!
//! Field names follow the backend's camelCase JSON. Ids are plain strings;
//! older endpoints still emit `_id`, which is accepted as an alias.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the platform API (no trailing slash)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("bitforge/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

// ==================== Users & Auth ====================

/// Subscription tier, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Elite,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Elite => "elite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            "elite" => Some(Tier::Elite),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role flags granted by the backend in addition to `isAdmin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Moderator,
    TournamentOrganizer,
}

/// A platform user as returned by the users and auth endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Virtual currency balance
    #[serde(default)]
    pub code_bits: u64,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub is_banned: bool,
    /// Marketplace item ids owned by this user
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub owned_themes: Vec<String>,
    #[serde(default)]
    pub active_theme: Option<String>,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(default)]
    pub blocked: Vec<String>,
    #[serde(default)]
    pub clan_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Name to show in listings
    pub fn shown_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Response from login and signup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// Partial profile update. Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }
}

/// Entry in the live-user presence list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

// ==================== Social Feed ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Activity type, e.g. "thread_created", "clan_joined"
    #[serde(rename = "type", default)]
    pub activity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Query for `GET /api/social/feed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub limit: u32,
    pub user_id: Option<String>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            user_id: None,
        }
    }
}

// ==================== Clans ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clan {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub tag: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Sort order for the clan directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClanSort {
    #[default]
    Members,
    Newest,
    Name,
}

impl ClanSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClanSort::Members => "members",
            ClanSort::Newest => "newest",
            ClanSort::Name => "name",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "members" => Some(ClanSort::Members),
            "newest" => Some(ClanSort::Newest),
            "name" => Some(ClanSort::Name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateClanInput {
    pub name: String,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ==================== Forums ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumCategory {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thread_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    pub thread_id: String,
    pub author_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    #[serde(alias = "_id")]
    pub id: String,
    pub category_id: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub author_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    /// Net vote score
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub upvoters: Vec<String>,
    #[serde(default)]
    pub downvoters: Vec<String>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub locked: bool,
    /// Only present on the single-thread endpoint
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadInput {
    pub category_id: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateThreadInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePostInput {
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Up => "up",
            VoteDirection::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoteInput {
    pub direction: VoteDirection,
}

// ==================== Store & Marketplace ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    /// Price in codeBits
    pub price: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
    /// Minimum tier required to buy this theme
    #[serde(default)]
    pub required_tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceItem {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Price in codeBits
    pub price: u64,
    /// Cosmetic items may be bought more than once; functional items may not
    #[serde(default)]
    pub stackable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub item_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRequest {
    pub theme_id: String,
}

/// Purchase result: the buyer with the authoritative balance and inventory,
/// plus the purchased item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt<T> {
    pub user: User,
    #[serde(alias = "theme")]
    pub item: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTier {
    pub tier: Tier,
    pub name: String,
    #[serde(default)]
    pub price_cents: u64,
    #[serde(default)]
    pub perks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    /// External payment processor URL
    pub url: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

// ==================== Media ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(alias = "_id")]
    pub id: String,
    pub owner_id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ==================== Moderation ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportTarget {
    User,
    Thread,
    Post,
    Media,
    Clan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub target_kind: ReportTarget,
    pub target_id: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Open,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(alias = "_id")]
    pub id: String,
    pub target_kind: ReportTarget,
    pub target_id: String,
    pub reason: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub reporter_id: Option<String>,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ==================== Admin ====================

/// Platform metrics for the admin dashboard. Never cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub active_users: u64,
    #[serde(default)]
    pub banned_users: u64,
    #[serde(default)]
    pub open_reports: u64,
    #[serde(default)]
    pub total_clans: u64,
    #[serde(default)]
    pub total_threads: u64,
    #[serde(default)]
    pub code_bits_in_circulation: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRequest {
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    #[default]
    Open,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    #[default]
    Scheduled,
    Live,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    #[serde(alias = "_id")]
    pub id: String,
    pub tournament_id: String,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub player_a: Option<String>,
    #[serde(default)]
    pub player_b: Option<String>,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub status: MatchStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub game: Option<String>,
    #[serde(default)]
    pub status: TournamentStatus,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    pub max_participants: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResultInput {
    pub winner_id: String,
}
