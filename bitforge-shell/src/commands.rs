//! Subcommands and their execution
//!
//! Every command runs against an [`AppContext`] whose session has already
//! been restored, and returns the text to print.

use crate::render;
use anyhow::{anyhow, bail, Context};
use bitforge_client::types::{
    BanRequest, ClanSort, CreateClanInput, CreateThreadInput, LoginRequest, ReportInput,
    ReportStatus, ReportTarget, SignupRequest, Tier, VoteDirection,
};
use bitforge_sdk::views::{
    file_report, AdminDashboardView, AdminPanel, AdminTab, ClansView, ExplorerView, FeedView,
    ForumsView, MarketplaceView, MediaView, ProfileView, SubscriptionsView, ThemeStoreView, View,
};
use bitforge_sdk::{AppContext, MutationOutcome, ViewState};
use clap::Subcommand;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BITFORGE_PASSWORD")]
        password: String,
    },

    /// Create an account
    Signup {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BITFORGE_PASSWORD")]
        password: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Activity feed
    Feed {
        /// Only this user's activity
        #[arg(long)]
        user: Option<String>,
        /// Keep printing refreshes until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Clan directory
    Clans {
        /// Sort order (members, newest, name)
        #[arg(long, default_value = "members")]
        sort: String,
    },

    /// Show one clan
    Clan { id: String },

    /// Found a clan
    CreateClan {
        #[arg(long)]
        name: String,
        #[arg(long)]
        tag: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Join a clan
    JoinClan { id: String },

    /// Show a user profile
    Profile { id: String },

    /// Link with a user
    Follow { id: String },

    /// Remove a link
    Unfollow { id: String },

    /// Block a user
    Block { id: String },

    /// Find users by name
    Search { query: String },

    /// Users online now
    Online,

    /// Theme store
    Themes,

    /// Buy a theme with codeBits
    BuyTheme { id: String },

    /// Switch the active theme
    EquipTheme { id: String },

    /// Marketplace items
    Market {
        #[arg(long)]
        category: Option<String>,
    },

    /// Buy a marketplace item with codeBits
    BuyItem { id: String },

    /// Forum categories
    Forums,

    /// Threads in a forum category
    Threads {
        #[arg(long)]
        category: String,
    },

    /// Show a thread with its replies
    Thread { id: String },

    /// Start a thread
    PostThread {
        #[arg(long)]
        category: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },

    /// Reply to a thread
    Reply { thread_id: String, body: String },

    /// Vote on a thread (up, down); repeating a vote clears it
    Vote {
        thread_id: String,
        #[arg(long, default_value = "up")]
        direction: String,
    },

    /// A user's media
    Media { user: String },

    /// Like or unlike a media item
    Like {
        /// Owner of the media item
        #[arg(long)]
        user: String,
        id: String,
    },

    /// Report content to moderators
    Report {
        /// What is reported (user, thread, post, media, clan)
        kind: String,
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        details: Option<String>,
    },

    /// Subscription tiers
    Tiers,

    /// Start a checkout for a higher tier
    Upgrade { tier: String },

    /// Admin dashboard
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Debug, Subcommand)]
pub enum AdminCommands {
    /// Platform metrics
    Metrics,

    /// All users
    Users,

    /// Moderation queue
    Reports,

    /// Tournaments
    Tournaments,

    /// Ban a user
    Ban {
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        days: Option<u32>,
    },

    /// Lift a ban
    Restore { id: String },

    /// Close a report (resolved, dismissed)
    Resolve {
        id: String,
        #[arg(long, default_value = "resolved")]
        status: String,
    },
}

/// Wait until a view leaves `Loading`, then take its model
async fn settled<T: Clone>(mut state: watch::Receiver<ViewState<T>>) -> anyhow::Result<ViewState<T>> {
    let settled = state
        .wait_for(|s| !s.is_loading())
        .await
        .map_err(|_| anyhow!("view closed before loading"))?;
    Ok(settled.clone())
}

/// Rendered text for a settled state; failures become errors
fn show<T>(state: ViewState<T>, empty: &str, render: impl FnOnce(&T) -> String) -> anyhow::Result<String> {
    match state {
        ViewState::Ready(model) => Ok(render(&model)),
        ViewState::Empty => Ok(empty.to_string()),
        ViewState::Loading => Ok("Loading...".to_string()),
        ViewState::Failed { message, .. } => Err(anyhow!(message)),
    }
}

fn outcome<T>(outcome: MutationOutcome<T>, done: &str) -> String {
    if outcome.is_ignored() {
        "Already in progress".to_string()
    } else {
        done.to_string()
    }
}

fn parse_sort(sort: &str) -> anyhow::Result<ClanSort> {
    ClanSort::parse(sort).ok_or_else(|| anyhow!("unknown sort '{}', expected members, newest or name", sort))
}

fn parse_tier(tier: &str) -> anyhow::Result<Tier> {
    Tier::parse(tier).ok_or_else(|| anyhow!("unknown tier '{}', expected free, pro or elite", tier))
}

fn parse_direction(direction: &str) -> anyhow::Result<VoteDirection> {
    match direction.to_lowercase().as_str() {
        "up" => Ok(VoteDirection::Up),
        "down" => Ok(VoteDirection::Down),
        other => bail!("unknown vote direction '{}', expected up or down", other),
    }
}

fn parse_target(kind: &str) -> anyhow::Result<ReportTarget> {
    match kind.to_lowercase().as_str() {
        "user" => Ok(ReportTarget::User),
        "thread" => Ok(ReportTarget::Thread),
        "post" => Ok(ReportTarget::Post),
        "media" => Ok(ReportTarget::Media),
        "clan" => Ok(ReportTarget::Clan),
        other => bail!("unknown report target '{}'", other),
    }
}

fn parse_status(status: &str) -> anyhow::Result<ReportStatus> {
    match status.to_lowercase().as_str() {
        "resolved" => Ok(ReportStatus::Resolved),
        "dismissed" => Ok(ReportStatus::Dismissed),
        other => bail!("unknown report status '{}', expected resolved or dismissed", other),
    }
}

/// Run one command and return what to print
pub async fn execute(ctx: &AppContext, command: Command) -> anyhow::Result<String> {
    match command {
        Command::Login { email, password } => {
            let session = ctx.session.login(&LoginRequest { email, password }).await?;
            Ok(format!("Signed in as {}", render::session(&session)))
        }
        Command::Signup {
            username,
            email,
            password,
        } => {
            let request = SignupRequest {
                username,
                email,
                password,
            };
            let session = ctx.session.signup(&request).await?;
            Ok(format!("Welcome, {}", render::session(&session)))
        }
        Command::Logout => {
            ctx.session.logout()?;
            Ok("Signed out".to_string())
        }
        Command::Whoami => Ok(match ctx.session.current() {
            Some(session) => render::session(&session),
            None => "Not signed in".to_string(),
        }),

        Command::Feed { user, watch } => {
            let view = FeedView::new(ctx.clone(), user);
            let state = view.load().await;
            if !watch {
                return show(state, "No activity yet", |items| render::lines(items, render::feed_item));
            }
            watch_feed(&view).await
        }

        Command::Clans { sort } => {
            let view = ClansView::new(ctx.clone());
            let state = view.set_sort(parse_sort(&sort)?).await;
            show(state, "No clans yet", |clans| render::lines(clans, render::clan))
        }
        Command::Clan { id } => {
            let clan = ClansView::new(ctx.clone()).open(&id).await?;
            Ok(render::clan_detail(&clan))
        }
        Command::CreateClan {
            name,
            tag,
            description,
        } => {
            let input = CreateClanInput {
                name,
                tag,
                description,
            };
            Ok(match ClansView::new(ctx.clone()).create(input).await?.committed() {
                Some(clan) => format!("Created {}", render::clan(&clan)),
                None => "Already in progress".to_string(),
            })
        }
        Command::JoinClan { id } => {
            let view = ClansView::new(ctx.clone());
            Ok(outcome(view.join(&id).await?, "Joined"))
        }

        Command::Profile { id } => {
            let view = ProfileView::new(ctx.clone(), id);
            show(view.load().await, "No such user", render::profile)
        }
        Command::Follow { id } => {
            let view = ProfileView::new(ctx.clone(), id);
            view.load().await;
            Ok(outcome(view.follow().await?, "Linked"))
        }
        Command::Unfollow { id } => {
            let view = ProfileView::new(ctx.clone(), id);
            view.load().await;
            Ok(outcome(view.unfollow().await?, "Unlinked"))
        }
        Command::Block { id } => {
            let view = ProfileView::new(ctx.clone(), id);
            Ok(outcome(view.block().await?, "Blocked"))
        }

        Command::Search { query } => {
            let view = ExplorerView::new(ctx.clone());
            let state = view.state();
            view.search(&query);
            show(settled(state).await?, "No users found", render::search)
        }
        Command::Online => {
            let view = ExplorerView::new(ctx.clone());
            let presence = view.presence();
            view.load().await;
            let state = settled(presence).await;
            view.unmount();
            show(state?, "Nobody online", |users| render::lines(users, render::online))
        }

        Command::Themes => {
            let view = ThemeStoreView::new(ctx.clone());
            show(view.load().await, "No themes", |themes| render::lines(themes, render::theme))
        }
        Command::BuyTheme { id } => {
            let view = ThemeStoreView::new(ctx.clone());
            view.load().await;
            Ok(outcome(view.purchase(&id).await?, "Purchased"))
        }
        Command::EquipTheme { id } => {
            let view = ThemeStoreView::new(ctx.clone());
            Ok(outcome(view.equip(&id).await?, "Equipped"))
        }

        Command::Market { category } => {
            let view = MarketplaceView::new(ctx.clone());
            let state = view.set_category(category).await;
            show(state, "Nothing for sale", |items| render::lines(items, render::market))
        }
        Command::BuyItem { id } => {
            let view = MarketplaceView::new(ctx.clone());
            Ok(outcome(view.purchase(&id).await?, "Purchased"))
        }

        Command::Forums => {
            let view = ForumsView::new(ctx.clone());
            show(view.load().await, "No categories", |model| {
                render::lines(&model.categories, render::category)
            })
        }
        Command::Threads { category } => {
            let view = ForumsView::new(ctx.clone());
            let state = view.select_category(&category).await;
            show(state, "No threads", |model| {
                if model.threads.is_empty() {
                    "No threads".to_string()
                } else {
                    render::lines(&model.threads, render::thread_line)
                }
            })
        }
        Command::Thread { id } => {
            let thread = ForumsView::new(ctx.clone()).open_thread(&id).await?;
            Ok(render::thread(&thread))
        }
        Command::PostThread {
            category,
            title,
            body,
        } => {
            let input = CreateThreadInput {
                category_id: category,
                title,
                body,
            };
            Ok(match ForumsView::new(ctx.clone()).create_thread(input).await?.committed() {
                Some(thread) => format!("Posted {}", render::thread_line(&thread)),
                None => "Already in progress".to_string(),
            })
        }
        Command::Reply { thread_id, body } => {
            let view = ForumsView::new(ctx.clone());
            Ok(outcome(view.reply(&thread_id, &body).await?, "Replied"))
        }
        Command::Vote {
            thread_id,
            direction,
        } => {
            let view = ForumsView::new(ctx.clone());
            let voted = view.vote(&thread_id, parse_direction(&direction)?).await?;
            Ok(match voted {
                MutationOutcome::Committed(thread) => format!("Score {}", thread.score),
                MutationOutcome::Ignored => "Already in progress".to_string(),
            })
        }

        Command::Media { user } => {
            let view = MediaView::new(ctx.clone(), user);
            show(view.load().await, "No media", |items| render::lines(items, render::media))
        }
        Command::Like { user, id } => {
            let view = MediaView::new(ctx.clone(), user);
            view.load().await;
            Ok(outcome(view.like(&id).await?, "Toggled like"))
        }

        Command::Report {
            kind,
            id,
            reason,
            details,
        } => {
            let input = ReportInput {
                target_kind: parse_target(&kind)?,
                target_id: id,
                reason,
                details,
            };
            let report = file_report(ctx, &input).await?;
            Ok(format!("Report {} filed", report.id))
        }

        Command::Tiers => {
            let view = SubscriptionsView::new(ctx.clone());
            show(view.load().await, "No tiers", |tiers| render::lines(tiers, render::tier))
        }
        Command::Upgrade { tier } => {
            let view = SubscriptionsView::new(ctx.clone());
            let checkout = view.upgrade(parse_tier(&tier)?).await?;
            Ok(format!("Complete your upgrade at {}", checkout.url))
        }

        Command::Admin(command) => execute_admin(ctx, command).await,
    }
}

async fn execute_admin(ctx: &AppContext, command: AdminCommands) -> anyhow::Result<String> {
    let view = AdminDashboardView::new(ctx.clone());
    let tab = match command {
        AdminCommands::Metrics => AdminTab::Metrics,
        AdminCommands::Users => AdminTab::Users,
        AdminCommands::Reports => AdminTab::Reports,
        AdminCommands::Tournaments => AdminTab::Tournaments,
        AdminCommands::Ban { id, reason, days } => {
            let request = BanRequest {
                reason,
                duration_days: days,
            };
            return Ok(outcome(view.ban(&id, request).await?, "Banned"));
        }
        AdminCommands::Restore { id } => {
            return Ok(outcome(view.restore(&id).await?, "Restored"));
        }
        AdminCommands::Resolve { id, status } => {
            let status = parse_status(&status)?;
            return Ok(outcome(view.resolve_report(&id, status).await?, "Updated"));
        }
    };

    show(view.switch_tab(tab).await, "Nothing here", |panel| match panel {
        AdminPanel::Metrics(metrics) => render::metrics(metrics),
        AdminPanel::Users(users) => render::lines(users, render::admin_user),
        AdminPanel::Reports(reports) => render::lines(reports, render::report),
        AdminPanel::Tournaments(tournaments) => render::lines(tournaments, render::tournament),
    })
}

/// Print each refresh of the feed until Ctrl-C
async fn watch_feed(view: &FeedView) -> anyhow::Result<String> {
    let mut state = view.state();
    loop {
        let current = state.borrow_and_update().clone();
        match show(current, "No activity yet", |items| render::lines(items, render::feed_item)) {
            Ok(text) => println!("{}\n", text),
            Err(e) => eprintln!("{}", e),
        }

        tokio::select! {
            changed = state.changed() => {
                changed.context("feed closed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping feed watch");
                view.unmount();
                return Ok(String::new());
            }
        }
    }
}
