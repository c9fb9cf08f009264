//! Screen-level behaviour against a mock backend

use bitforge_client::types::{
    Clan, ClanSort, CreateClanInput, MediaItem, ReportInput, ReportTarget, Tier, User, VoteDirection,
};
use bitforge_client::{ApiClient, ClientConfig, FileTokenStore, MemoryTokenStore, TokenStore};
use bitforge_sdk::views::{
    file_report, AdminDashboardView, AdminPanel, AdminTab, ClansView, ExplorerView, FeedView,
    ForumsView, MarketplaceView, MediaView, ProfileView, SubscriptionsView, ThemeStoreView, View,
    ViewState,
};
use bitforge_sdk::{AppContext, ErrorKind, SdkError, SyncConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn fast_sync() -> SyncConfig {
    SyncConfig {
        feed_poll_ms: 100,
        search_debounce_ms: 50,
        presence_poll_ms: 100,
        ..Default::default()
    }
}

fn context(server: &MockServer, tokens: Arc<dyn TokenStore>) -> AppContext {
    let client = ApiClient::new(
        ClientConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            ..Default::default()
        },
        tokens,
    )
    .unwrap();
    AppContext::new(client, fast_sync())
}

/// Context restored from a token, signed in as `me`
async fn signed_in(server: &MockServer, me: Value) -> AppContext {
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(me))
        .mount(server)
        .await;
    let ctx = context(server, Arc::new(MemoryTokenStore::with_token("tok")));
    ctx.session.restore().await.unwrap().unwrap();
    ctx
}

fn requests_to(requests: &[Request], route: &str) -> usize {
    requests.iter().filter(|r| r.url.path() == route).count()
}

#[tokio::test]
async fn test_follow_is_optimistic_then_server_wins() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/users/b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b", "username": "bob", "followers": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/b/follow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "id": "b", "username": "bob", "followers": ["a"], "bio": "confirmed"
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let view = Arc::new(ProfileView::new(ctx.clone(), "b"));
    let loaded = view.load().await;
    assert_eq!(loaded.ready().unwrap().follow_label(), "Link");

    let mut state = view.state();
    let follower = view.clone();
    let pending = tokio::spawn(async move { follower.follow().await });

    // Label flips before the server answers
    tokio::time::timeout(
        Duration::from_millis(250),
        state.wait_for(|s| s.ready().is_some_and(|m| m.follow_label() == "Linked")),
    )
    .await
    .expect("optimistic label")
    .unwrap();
    assert_eq!(ctx.executor.pending_mutations().len(), 1);

    pending.await.unwrap().unwrap();
    let cached: User = ctx.cache.get("b").unwrap();
    assert_eq!(cached.followers, vec!["a"]);
    assert_eq!(cached.bio.as_deref(), Some("confirmed"));
    assert!(ctx.executor.pending_mutations().is_empty());
}

#[tokio::test]
async fn test_double_toggle_follow_dispatches_once() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/users/b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "b", "username": "bob", "followers": []
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/b/follow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "b", "username": "bob", "followers": ["a"]}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/users/b/unfollow"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let view = Arc::new(ProfileView::new(ctx.clone(), "b"));
    view.load().await;

    let first = {
        let view = view.clone();
        tokio::spawn(async move { view.toggle_follow().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Screen already shows "Linked", but the second click must not unfollow
    let second = view.toggle_follow().await.unwrap();
    assert!(second.is_ignored());

    assert!(!first.await.unwrap().unwrap().is_ignored());
    let cached: User = ctx.cache.get("b").unwrap();
    assert_eq!(cached.followers, vec!["a"]);
}

#[tokio::test]
async fn test_distinct_replies_are_both_sent() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("POST"))
        .and(path("/api/forums/threads/t1/posts"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "id": "t1", "categoryId": "general", "title": "gg", "authorId": "u9"
                }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let view = Arc::new(ForumsView::new(ctx));
    let first = {
        let view = view.clone();
        tokio::spawn(async move { view.reply("t1", "first take").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Same text again is a duplicate; different text is new work
    assert!(view.reply("t1", "first take").await.unwrap().is_ignored());
    let second = view.reply("t1", "second thoughts").await.unwrap();
    assert!(!second.is_ignored());
    assert!(!first.await.unwrap().unwrap().is_ignored());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/api/forums/threads/t1/posts"), 2);
}

#[tokio::test]
async fn test_vote_switch_mid_flight_is_sent() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("POST"))
        .and(path("/api/forums/threads/t1/vote"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "id": "t1", "categoryId": "general", "title": "gg", "authorId": "u9"
                }))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let view = Arc::new(ForumsView::new(ctx));
    let up = {
        let view = view.clone();
        tokio::spawn(async move { view.vote("t1", VoteDirection::Up).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let down = view.vote("t1", VoteDirection::Down).await.unwrap();
    assert!(!down.is_ignored());
    up.await.unwrap().unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/api/forums/threads/t1/vote"), 2);
}

#[tokio::test]
async fn test_clan_create_shows_placeholder_then_server_record() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("POST"))
        .and(path("/api/clans/create"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "id": "c7", "name": "Night Owls", "tag": "OWL", "ownerId": "a", "members": ["a"]
                }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/clans"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "c7", "name": "Night Owls", "tag": "OWL", "members": ["a"]}
        ])))
        .mount(&server)
        .await;

    let input = CreateClanInput {
        name: "Night Owls".into(),
        tag: "OWL".into(),
        description: None,
    };
    let view = Arc::new(ClansView::new(ctx.clone()));
    let first = {
        let (view, input) = (view.clone(), input.clone());
        tokio::spawn(async move { view.create(input).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let placeholder: Clan = ctx.cache.get("pending-clan:owl").unwrap();
    assert_eq!(placeholder.members, vec!["a"]);
    // Double submit of the same clan
    assert!(view.create(input).await.unwrap().is_ignored());

    let created = first.await.unwrap().unwrap().committed().unwrap();
    assert_eq!(created.id, "c7");
    assert!(ctx.cache.get::<Clan>("pending-clan:owl").is_none());
    assert_eq!(ctx.cache.get::<Clan>("c7").unwrap().tag, "OWL");
}

#[tokio::test]
async fn test_unaffordable_theme_never_reaches_server() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice", "codeBits": 1000})).await;

    Mock::given(method("GET"))
        .and(path("/api/store/themes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "neon", "name": "Neon", "price": 1200}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/store/themes/purchase"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let view = ThemeStoreView::new(ctx.clone());
    let listing = view.load().await;
    assert!(!listing.ready().unwrap()[0].affordable);

    let err = view.purchase("neon").await.unwrap_err();
    assert!(matches!(
        err,
        SdkError::InsufficientBalance {
            required: 1200,
            available: 1000
        }
    ));
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let me: User = ctx.cache.get("a").unwrap();
    assert_eq!(me.code_bits, 1000);
    assert!(me.owned_themes.is_empty());
}

#[tokio::test]
async fn test_purchase_takes_server_balance() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice", "codeBits": 1000})).await;

    Mock::given(method("GET"))
        .and(path("/api/marketplace/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "boost", "name": "XP Boost", "price": 300, "stackable": false}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/marketplace/purchase"))
        .and(body_json(json!({"itemId": "boost"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"id": "a", "username": "alice", "codeBits": 650, "inventory": ["boost"]},
            "item": {"id": "boost", "name": "XP Boost", "price": 300, "stackable": false}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let view = MarketplaceView::new(ctx.clone());
    view.load().await;
    view.purchase("boost").await.unwrap();

    // Server balance, not the locally computed 700
    let session = ctx.session.current().unwrap();
    assert_eq!(session.code_bits(), 650);
    assert!(session.owns_item("boost"));

    let again = view.purchase("boost").await.unwrap_err();
    assert!(matches!(again, SdkError::AlreadyOwned(_)));
}

#[tokio::test]
async fn test_short_clan_name_is_rejected_locally() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("POST"))
        .and(path("/api/clans/create"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let view = ClansView::new(ctx);
    let err = view
        .create(CreateClanInput {
            name: "ab".into(),
            tag: "AB".into(),
            description: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);
}

#[tokio::test]
async fn test_failed_join_rolls_back() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/clans"))
        .and(query_param("sort", "members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "c1", "name": "Night Owls", "tag": "OWL", "members": ["z"]}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/clans/c1/join"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let view = ClansView::new(ctx.clone());
    assert_eq!(view.sort(), ClanSort::Members);
    view.load().await;

    let err = view.join("c1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerFailure);

    let clan: Clan = ctx.cache.get("c1").unwrap();
    assert_eq!(clan.members, vec!["z"]);
}

#[tokio::test]
async fn test_search_is_debounced() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/users/search"))
        .and(query_param("q", "neo_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "n1", "username": "neo_1"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let view = ExplorerView::new(ctx);
    let mut state = view.state();
    for query in ["ne", "neo", "neo_", "neo_1", " neo_1 "] {
        view.search(query);
    }

    tokio::time::timeout(Duration::from_secs(2), state.wait_for(|s| s.ready().is_some()))
        .await
        .expect("search result")
        .unwrap();
    let results = state.borrow().ready().cloned().unwrap();
    assert_eq!(results.query, "neo_1");
    assert_eq!(results.users.len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/api/users/search"), 1);
}

#[tokio::test]
async fn test_feed_stops_polling_after_unmount() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/social/feed"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "f1", "userId": "a", "type": "clan_joined", "message": "joined OWL"}
        ])))
        .mount(&server)
        .await;

    let view = FeedView::new(ctx, None);
    let first = view.load().await;
    assert_eq!(first.ready().unwrap()[0].activity, "clan_joined");

    view.unmount();
    assert!(!view.is_mounted());
    tokio::time::sleep(Duration::from_millis(350)).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests_to(&requests, "/api/social/feed"), 1);
}

#[tokio::test]
async fn test_feed_polls_while_mounted() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/social/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let view = FeedView::new(ctx, Some("a".into()));
    assert_eq!(view.load().await, ViewState::Empty);
    tokio::time::sleep(Duration::from_millis(350)).await;
    view.unmount();

    let requests = server.received_requests().await.unwrap();
    assert!(requests_to(&requests, "/api/social/feed") >= 3);
}

#[tokio::test]
async fn test_admin_metrics_refetched_on_every_visit() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "root", "username": "root", "isAdmin": true})).await;

    Mock::given(method("GET"))
        .and(path("/api/admin/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalUsers": 42, "openReports": 3
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "username": "alice"}
        ])))
        .mount(&server)
        .await;

    let view = AdminDashboardView::new(ctx);
    match view.load().await {
        ViewState::Ready(AdminPanel::Metrics(m)) => assert_eq!(m.total_users, 42),
        other => panic!("unexpected state {:?}", other),
    }
    assert!(matches!(
        view.switch_tab(AdminTab::Users).await,
        ViewState::Ready(AdminPanel::Users(_))
    ));
    assert!(matches!(
        view.switch_tab(AdminTab::Metrics).await,
        ViewState::Ready(AdminPanel::Metrics(_))
    ));
}

#[tokio::test]
async fn test_admin_dashboard_closed_to_members() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/admin/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let view = AdminDashboardView::new(ctx);
    assert_eq!(view.load().await.error_kind(), Some(ErrorKind::Unauthorized));
}

#[tokio::test]
async fn test_rejected_token_file_is_cleared_on_restore() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "jwt expired"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let tokens = Arc::new(FileTokenStore::open(dir.path()).unwrap());
    tokens.save("stale").unwrap();

    let ctx = context(&server, tokens.clone());
    assert!(ctx.session.restore().await.unwrap().is_none());
    assert!(tokens.load().is_none());

    // Nothing left on disk for the next run
    let reopened = FileTokenStore::open(dir.path()).unwrap();
    assert!(reopened.load().is_none());
}

#[tokio::test]
async fn test_tiers_mark_current_and_upgrades() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice", "tier": "pro"})).await;

    Mock::given(method("GET"))
        .and(path("/api/subscriptions/tiers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"tier": "free", "name": "Free"},
            {"tier": "pro", "name": "Pro", "priceCents": 499},
            {"tier": "elite", "name": "Elite", "priceCents": 999}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/payments/create-checkout"))
        .and(body_json(json!({"tier": "elite"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://pay.example/s/1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let view = SubscriptionsView::new(ctx);
    let listings = view.load().await.ready().unwrap().clone();
    let flags: Vec<_> = listings.iter().map(|l| (l.tier.tier, l.current, l.upgrade)).collect();
    assert_eq!(
        flags,
        vec![
            (Tier::Free, false, false),
            (Tier::Pro, true, false),
            (Tier::Elite, false, true),
        ]
    );

    let err = view.upgrade(Tier::Free).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    let checkout = view.upgrade(Tier::Elite).await.unwrap();
    assert_eq!(checkout.url, "https://pay.example/s/1");
}

#[tokio::test]
async fn test_failed_like_rolls_back() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("GET"))
        .and(path("/api/media"))
        .and(query_param("userId", "b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "m1", "ownerId": "b", "url": "https://cdn.example/m1.png", "likes": ["z"]}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/media/m1/like"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let view = MediaView::new(ctx.clone(), "b");
    assert_eq!(view.load().await.ready().unwrap().len(), 1);

    let err = view.like("m1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServerFailure);
    let item: MediaItem = ctx.cache.get("m1").unwrap();
    assert_eq!(item.likes, vec!["z"]);
}

#[tokio::test]
async fn test_blank_report_is_rejected_locally() {
    let server = MockServer::start().await;
    let ctx = signed_in(&server, json!({"id": "a", "username": "alice"})).await;

    Mock::given(method("POST"))
        .and(path("/api/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r1", "targetKind": "thread", "targetId": "t1", "reason": "spam"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut input = ReportInput {
        target_kind: ReportTarget::Thread,
        target_id: "t1".into(),
        reason: "   ".into(),
        details: None,
    };
    let err = file_report(&ctx, &input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailure);

    input.reason = "spam".into();
    let report = file_report(&ctx, &input).await.unwrap();
    assert_eq!(report.id, "r1");
}
