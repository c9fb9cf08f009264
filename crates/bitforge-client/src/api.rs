//! Typed endpoint methods
//!
//! One method per backend route. Identity for authorization always comes from
//! the bearer token; no method sends an "acting user id" in its body.

use crate::client::ApiClient;
use crate::error::Result;
use crate::types::*;
use reqwest::Method;

impl ApiClient {
    // ==================== Auth ====================

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse> {
        self.post("/api/auth/login", request).await
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<AuthResponse> {
        self.post("/api/auth/signup", request).await
    }

    /// The user the current token belongs to
    pub async fn me(&self) -> Result<User> {
        self.get("/api/auth/me").await
    }

    // ==================== Users ====================

    pub async fn get_user(&self, id: &str) -> Result<User> {
        self.get(&format!("/api/users/{}", Self::segment(id))).await
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        self.get_query("/api/users/search", &[("q", query.to_string())])
            .await
    }

    pub async fn online_users(&self) -> Result<Vec<OnlineUser>> {
        self.get("/api/users/online").await
    }

    pub async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<User> {
        self.patch(&format!("/api/users/{}", Self::segment(id)), update)
            .await
    }

    /// Follow a user; returns the followed user with updated followers
    pub async fn follow_user(&self, id: &str) -> Result<User> {
        self.request::<User, ()>(
            Method::POST,
            &format!("/api/users/{}/follow", Self::segment(id)),
            None,
        )
        .await
    }

    pub async fn unfollow_user(&self, id: &str) -> Result<User> {
        self.request::<User, ()>(
            Method::POST,
            &format!("/api/users/{}/unfollow", Self::segment(id)),
            None,
        )
        .await
    }

    /// Block a user; returns the current user with the updated block list
    pub async fn block_user(&self, id: &str) -> Result<User> {
        self.request::<User, ()>(
            Method::POST,
            &format!("/api/users/{}/block", Self::segment(id)),
            None,
        )
        .await
    }

    // ==================== Social Feed ====================

    pub async fn feed(&self, query: &FeedQuery) -> Result<Vec<FeedItem>> {
        let mut params = vec![("limit", query.limit.to_string())];
        if let Some(ref user_id) = query.user_id {
            params.push(("userId", user_id.clone()));
        }
        self.get_query("/api/social/feed", &params).await
    }

    // ==================== Clans ====================

    pub async fn list_clans(&self, sort: ClanSort) -> Result<Vec<Clan>> {
        self.get_query("/api/clans", &[("sort", sort.as_str().to_string())])
            .await
    }

    pub async fn get_clan(&self, id: &str) -> Result<Clan> {
        self.get(&format!("/api/clans/{}", Self::segment(id))).await
    }

    pub async fn create_clan(&self, input: &CreateClanInput) -> Result<Clan> {
        self.post("/api/clans/create", input).await
    }

    /// Join a clan; returns the clan with updated members
    pub async fn join_clan(&self, id: &str) -> Result<Clan> {
        self.request::<Clan, ()>(
            Method::POST,
            &format!("/api/clans/{}/join", Self::segment(id)),
            None,
        )
        .await
    }

    // ==================== Forums ====================

    pub async fn forum_categories(&self) -> Result<Vec<ForumCategory>> {
        self.get("/api/forums/categories").await
    }

    pub async fn list_threads(&self, category_id: &str) -> Result<Vec<Thread>> {
        self.get_query(
            "/api/forums/threads",
            &[("categoryId", category_id.to_string())],
        )
        .await
    }

    pub async fn get_thread(&self, id: &str) -> Result<Thread> {
        self.get(&format!("/api/forums/threads/{}", Self::segment(id)))
            .await
    }

    pub async fn create_thread(&self, input: &CreateThreadInput) -> Result<Thread> {
        self.post("/api/forums/threads", input).await
    }

    pub async fn update_thread(&self, id: &str, input: &UpdateThreadInput) -> Result<Thread> {
        self.patch(&format!("/api/forums/threads/{}", Self::segment(id)), input)
            .await
    }

    pub async fn delete_thread(&self, id: &str) -> Result<()> {
        self.delete(&format!("/api/forums/threads/{}", Self::segment(id)))
            .await
    }

    /// Reply to a thread; returns the thread with the new post appended
    pub async fn create_post(&self, thread_id: &str, input: &CreatePostInput) -> Result<Thread> {
        self.post(
            &format!("/api/forums/threads/{}/posts", Self::segment(thread_id)),
            input,
        )
        .await
    }

    pub async fn vote_thread(&self, thread_id: &str, direction: VoteDirection) -> Result<Thread> {
        self.post(
            &format!("/api/forums/threads/{}/vote", Self::segment(thread_id)),
            &VoteInput { direction },
        )
        .await
    }

    // ==================== Subscriptions & Payments ====================

    pub async fn subscription_tiers(&self) -> Result<Vec<SubscriptionTier>> {
        self.get("/api/subscriptions/tiers").await
    }

    /// Start a checkout with the external payment processor
    pub async fn create_checkout(&self, tier: Tier) -> Result<CheckoutSession> {
        self.post("/api/payments/create-checkout", &CheckoutRequest { tier })
            .await
    }

    // ==================== Marketplace & Theme Store ====================

    pub async fn marketplace_items(&self, category: Option<&str>) -> Result<Vec<MarketplaceItem>> {
        match category {
            Some(category) => {
                self.get_query(
                    "/api/marketplace/items",
                    &[("category", category.to_string())],
                )
                .await
            }
            None => self.get("/api/marketplace/items").await,
        }
    }

    pub async fn purchase_item(&self, item_id: &str) -> Result<PurchaseReceipt<MarketplaceItem>> {
        self.post(
            "/api/marketplace/purchase",
            &PurchaseRequest {
                item_id: item_id.to_string(),
            },
        )
        .await
    }

    pub async fn store_themes(&self) -> Result<Vec<Theme>> {
        self.get("/api/store/themes").await
    }

    pub async fn purchase_theme(&self, theme_id: &str) -> Result<PurchaseReceipt<Theme>> {
        self.post(
            "/api/store/themes/purchase",
            &ThemeRequest {
                theme_id: theme_id.to_string(),
            },
        )
        .await
    }

    /// Equip an owned theme; returns the current user
    pub async fn equip_theme(&self, theme_id: &str) -> Result<User> {
        self.post(
            "/api/store/themes/equip",
            &ThemeRequest {
                theme_id: theme_id.to_string(),
            },
        )
        .await
    }

    // ==================== Media ====================

    pub async fn user_media(&self, user_id: &str) -> Result<Vec<MediaItem>> {
        self.get_query("/api/media", &[("userId", user_id.to_string())])
            .await
    }

    pub async fn like_media(&self, id: &str) -> Result<MediaItem> {
        self.request::<MediaItem, ()>(
            Method::POST,
            &format!("/api/media/{}/like", Self::segment(id)),
            None,
        )
        .await
    }

    // ==================== Moderation ====================

    pub async fn file_report(&self, input: &ReportInput) -> Result<Report> {
        self.post("/api/reports", input).await
    }

    // ==================== Admin ====================

    pub async fn admin_users(&self) -> Result<Vec<User>> {
        self.get("/api/admin/users").await
    }

    pub async fn admin_metrics(&self) -> Result<PlatformMetrics> {
        self.get("/api/admin/metrics").await
    }

    pub async fn admin_reports(&self) -> Result<Vec<Report>> {
        self.get("/api/admin/reports").await
    }

    pub async fn ban_user(&self, id: &str, request: &BanRequest) -> Result<User> {
        self.post(
            &format!("/api/admin/users/{}/ban", Self::segment(id)),
            request,
        )
        .await
    }

    pub async fn restore_user(&self, id: &str) -> Result<User> {
        self.request::<User, ()>(
            Method::POST,
            &format!("/api/admin/users/{}/restore", Self::segment(id)),
            None,
        )
        .await
    }

    pub async fn resolve_report(&self, id: &str, status: ReportStatus) -> Result<Report> {
        self.post(
            &format!("/api/admin/reports/{}/resolve", Self::segment(id)),
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    pub async fn tournaments(&self) -> Result<Vec<Tournament>> {
        self.get("/api/tournaments").await
    }

    pub async fn create_tournament(&self, input: &CreateTournamentInput) -> Result<Tournament> {
        self.post("/api/admin/tournaments", input).await
    }

    /// Record a match winner; returns the tournament with the advanced bracket
    pub async fn report_match_result(
        &self,
        tournament_id: &str,
        match_id: &str,
        winner_id: &str,
    ) -> Result<Tournament> {
        self.post(
            &format!(
                "/api/admin/tournaments/{}/matches/{}/result",
                Self::segment(tournament_id),
                Self::segment(match_id)
            ),
            &MatchResultInput {
                winner_id: winner_id.to_string(),
            },
        )
        .await
    }
}
