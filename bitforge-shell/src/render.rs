//! Plain-text rendering of view models

use bitforge_client::types::{
    Clan, FeedItem, ForumCategory, MediaItem, OnlineUser, PlatformMetrics, Report, Thread,
    Tournament, User,
};
use bitforge_sdk::views::{
    MarketListing, ProfileModel, SearchResults, ThemeListing, TierListing,
};
use bitforge_sdk::Session;
use std::fmt::Write;

fn name_of(user: &User) -> &str {
    user.display_name.as_deref().unwrap_or(&user.username)
}

pub fn session(session: &Session) -> String {
    let user = session.user();
    let mut out = format!(
        "{} (@{})  tier: {}  codeBits: {}",
        name_of(user),
        user.username,
        user.tier,
        user.code_bits
    );
    if user.is_admin {
        out.push_str("  [admin]");
    }
    if user.is_banned {
        out.push_str("  [banned]");
    }
    out
}

pub fn user_line(user: &User) -> String {
    format!("{:<24} @{:<20} {}", user.id, user.username, user.tier)
}

pub fn profile(model: &ProfileModel) -> String {
    let user = &model.user;
    let mut out = String::new();
    let _ = writeln!(out, "{} (@{})", name_of(user), user.username);
    if let Some(bio) = &user.bio {
        let _ = writeln!(out, "{}", bio);
    }
    let _ = writeln!(
        out,
        "followers: {}  following: {}  tier: {}",
        user.followers.len(),
        user.following.len(),
        user.tier
    );
    if let Some(clan) = &user.clan_id {
        let _ = writeln!(out, "clan: {}", clan);
    }
    if !model.is_self {
        let _ = write!(out, "[{}]", model.follow_label());
        if model.has_blocked {
            out.push_str(" [blocked]");
        }
    }
    out.trim_end().to_string()
}

pub fn feed_item(item: &FeedItem) -> String {
    let who = item.username.as_deref().unwrap_or(&item.user_id);
    match item.created_at {
        Some(at) => format!("{}  {:<16} {}  {}", at.format("%Y-%m-%d %H:%M"), item.activity, who, item.message),
        None => format!("{:<16} {}  {}", item.activity, who, item.message),
    }
}

pub fn clan(clan: &Clan) -> String {
    format!(
        "{:<24} [{}] {}  ({} members)",
        clan.id,
        clan.tag,
        clan.name,
        clan.members.len()
    )
}

pub fn clan_detail(clan: &Clan) -> String {
    let mut out = self::clan(clan);
    if let Some(description) = &clan.description {
        out.push('\n');
        out.push_str(description);
    }
    out
}

pub fn search(results: &SearchResults) -> String {
    results
        .users
        .iter()
        .map(user_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn online(user: &OnlineUser) -> String {
    format!("{:<24} @{}", user.id, user.username)
}

fn flags(pairs: &[(bool, &str)]) -> String {
    pairs
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, label)| format!("[{}]", label))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn theme(listing: &ThemeListing) -> String {
    let theme = &listing.theme;
    format!(
        "{:<16} {:<20} {:>6} bits  {}",
        theme.id,
        theme.name,
        theme.price,
        flags(&[
            (listing.equipped, "equipped"),
            (listing.owned && !listing.equipped, "owned"),
            (listing.locked, "locked"),
            (!listing.owned && !listing.affordable, "too expensive"),
        ])
    )
}

pub fn market(listing: &MarketListing) -> String {
    let item = &listing.item;
    format!(
        "{:<16} {:<20} {:>6} bits  {:<12} {}",
        item.id,
        item.name,
        item.price,
        item.category.as_deref().unwrap_or("-"),
        flags(&[
            (listing.owned, "owned"),
            (!listing.owned && !listing.affordable, "too expensive"),
        ])
    )
}

pub fn tier(listing: &TierListing) -> String {
    let tier = &listing.tier;
    let marker = if listing.current {
        "current"
    } else if listing.upgrade {
        "available"
    } else {
        ""
    };
    format!(
        "{:<8} {:<16} ${}.{:02}/mo  {:<10} {}",
        tier.tier,
        tier.name,
        tier.price_cents / 100,
        tier.price_cents % 100,
        marker,
        tier.perks.join(", ")
    )
}

pub fn category(category: &ForumCategory) -> String {
    format!("{:<24} {}  ({} threads)", category.id, category.name, category.thread_count)
}

pub fn thread_line(thread: &Thread) -> String {
    let mut out = format!(
        "{:<24} {:>4}  {}  ({} replies)",
        thread.id, thread.score, thread.title, thread.reply_count
    );
    if thread.pinned {
        out.push_str(" [pinned]");
    }
    if thread.locked {
        out.push_str(" [locked]");
    }
    out
}

pub fn thread(thread: &Thread) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", thread_line(thread));
    let _ = writeln!(
        out,
        "by {}\n\n{}",
        thread.author_name.as_deref().unwrap_or(&thread.author_id),
        thread.body
    );
    for post in &thread.posts {
        let _ = writeln!(
            out,
            "\n  {}: {}",
            post.author_name.as_deref().unwrap_or(&post.author_id),
            post.body
        );
    }
    out.trim_end().to_string()
}

pub fn media(item: &MediaItem) -> String {
    format!(
        "{:<24} {}  ({} likes)  {}",
        item.id,
        item.title.as_deref().unwrap_or("untitled"),
        item.likes.len(),
        item.url
    )
}

pub fn metrics(metrics: &PlatformMetrics) -> String {
    [
        ("users", metrics.total_users),
        ("active", metrics.active_users),
        ("banned", metrics.banned_users),
        ("open reports", metrics.open_reports),
        ("clans", metrics.total_clans),
        ("threads", metrics.total_threads),
        ("codeBits in circulation", metrics.code_bits_in_circulation),
    ]
    .iter()
    .map(|(label, value)| format!("{:<24} {}", label, value))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn admin_user(user: &User) -> String {
    let mut out = user_line(user);
    if user.is_banned {
        out.push_str("  [banned]");
    }
    out
}

pub fn report(report: &Report) -> String {
    format!(
        "{:<24} {:?} {:<16} {:?}  {}",
        report.id, report.target_kind, report.target_id, report.status, report.reason
    )
}

pub fn tournament(tournament: &Tournament) -> String {
    format!(
        "{:<24} {}  {:?}  ({} players, {} matches)",
        tournament.id,
        tournament.name,
        tournament.status,
        tournament.participants.len(),
        tournament.matches.len()
    )
}

pub fn lines<T>(items: &[T], render: fn(&T) -> String) -> String {
    items.iter().map(render).collect::<Vec<_>>().join("\n")
}
