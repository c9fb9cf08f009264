//! Admin dashboard
//!
//! Every tab is gated by a capability. Metrics are never cached: each visit
//! to the metrics tab goes to the network.

use super::{Publisher, View, ViewScope, ViewState};
use crate::cache::QueryKey;
use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::{Result, SdkError};
use crate::mutation::{Mutation, MutationOutcome};
use async_trait::async_trait;
use bitforge_client::types::{
    BanRequest, CreateTournamentInput, MatchStatus, PlatformMetrics, Report, ReportStatus,
    Tournament, TournamentStatus, User,
};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AdminTab {
    #[default]
    Metrics,
    Users,
    Reports,
    Tournaments,
}

impl AdminTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminTab::Metrics => "metrics",
            AdminTab::Users => "users",
            AdminTab::Reports => "reports",
            AdminTab::Tournaments => "tournaments",
        }
    }

    /// Capability needed to open this tab
    pub fn capability(&self) -> Capability {
        match self {
            AdminTab::Metrics => Capability::ViewMetrics,
            AdminTab::Users => Capability::BanUsers,
            AdminTab::Reports => Capability::ModerateContent,
            AdminTab::Tournaments => Capability::ManageTournaments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminPanel {
    Metrics(PlatformMetrics),
    Users(Vec<User>),
    Reports(Vec<Report>),
    Tournaments(Vec<Tournament>),
}

fn users_key() -> QueryKey {
    QueryKey::new("admin_users")
}

fn reports_key() -> QueryKey {
    QueryKey::new("admin_reports")
}

fn tournaments_key() -> QueryKey {
    QueryKey::new("tournaments")
}

fn panel<T>(items: Result<Vec<T>>, wrap: fn(Vec<T>) -> AdminPanel) -> ViewState<AdminPanel> {
    ViewState::from_list(items).map(wrap)
}

pub struct AdminDashboardView {
    ctx: AppContext,
    tab: Mutex<AdminTab>,
    scope: ViewScope,
    state: Publisher<AdminPanel>,
}

impl AdminDashboardView {
    pub fn new(ctx: AppContext) -> Self {
        let scope = ViewScope::new("admin");
        let state = scope.publisher();
        Self {
            ctx,
            tab: Mutex::new(AdminTab::default()),
            scope,
            state,
        }
    }

    pub fn tab(&self) -> AdminTab {
        self.tab.lock().map(|t| *t).unwrap_or_default()
    }

    pub async fn switch_tab(&self, tab: AdminTab) -> ViewState<AdminPanel> {
        if let Ok(mut current) = self.tab.lock() {
            *current = tab;
        }

        let state = match self.fetch(tab).await {
            Ok(state) => state,
            Err(e) => ViewState::failed(&e),
        };
        self.state.publish(state.clone());
        state
    }

    async fn fetch(&self, tab: AdminTab) -> Result<ViewState<AdminPanel>> {
        self.ctx.require(Capability::ViewAdminDashboard)?;
        self.ctx.capabilities().check(tab.capability())?;

        let client = self.ctx.client.clone();
        let cache = &self.ctx.cache;
        let state = match tab {
            AdminTab::Metrics => {
                let metrics = client.admin_metrics().await?;
                ViewState::Ready(AdminPanel::Metrics(metrics))
            }
            AdminTab::Users => {
                let users = cache
                    .fetch_list(&users_key(), || async move {
                        client.admin_users().await.map_err(SdkError::from)
                    })
                    .await;
                panel(users, AdminPanel::Users)
            }
            AdminTab::Reports => {
                let reports = cache
                    .fetch_list(&reports_key(), || async move {
                        client.admin_reports().await.map_err(SdkError::from)
                    })
                    .await;
                panel(reports, AdminPanel::Reports)
            }
            AdminTab::Tournaments => {
                let tournaments = cache
                    .fetch_list(&tournaments_key(), || async move {
                        client.tournaments().await.map_err(SdkError::from)
                    })
                    .await;
                panel(tournaments, AdminPanel::Tournaments)
            }
        };
        Ok(state)
    }

    async fn reload(&self) {
        self.switch_tab(self.tab()).await;
    }

    pub async fn ban(&self, user_id: &str, request: BanRequest) -> Result<MutationOutcome<User>> {
        self.ctx.require(Capability::BanUsers)?;
        if request.reason.trim().is_empty() {
            return Err(SdkError::validation("reason", "must not be empty"));
        }

        let mutation = Mutation::<User>::new(user_id, "ban")
            .with_patch(|user: &mut User| user.is_banned = true)
            .invalidates(EntityKind::User);

        let client = self.ctx.client.clone();
        let id = user_id.to_string();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.ban_user(&id, &request).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            info!(user_id, "User banned");
            self.reload().await;
        }
        Ok(outcome)
    }

    pub async fn restore(&self, user_id: &str) -> Result<MutationOutcome<User>> {
        self.ctx.require(Capability::BanUsers)?;

        let mutation = Mutation::<User>::new(user_id, "restore")
            .with_patch(|user: &mut User| user.is_banned = false)
            .invalidates(EntityKind::User);

        let client = self.ctx.client.clone();
        let id = user_id.to_string();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.restore_user(&id).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            info!(user_id, "User restored");
            self.reload().await;
        }
        Ok(outcome)
    }

    pub async fn resolve_report(&self, report_id: &str, status: ReportStatus) -> Result<MutationOutcome<Report>> {
        self.ctx.require(Capability::ModerateContent)?;

        let mutation = Mutation::<Report>::new(report_id, "resolve")
            .with_patch(move |report: &mut Report| report.status = status)
            .invalidates(EntityKind::Report);

        let client = self.ctx.client.clone();
        let id = report_id.to_string();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.resolve_report(&id, status).await.map_err(SdkError::from)
            })
            .await?;

        if !outcome.is_ignored() {
            self.reload().await;
        }
        Ok(outcome)
    }

    pub async fn create_tournament(&self, input: CreateTournamentInput) -> Result<MutationOutcome<Tournament>> {
        self.ctx.require(Capability::ManageTournaments)?;
        if input.name.trim().is_empty() {
            return Err(SdkError::validation("name", "must not be empty"));
        }
        if input.max_participants < 2 {
            return Err(SdkError::validation("maxParticipants", "needs at least 2 players"));
        }

        let placeholder = Tournament {
            id: format!("pending-tournament:{}", input.name.trim()),
            name: input.name.trim().to_string(),
            game: input.game.clone(),
            status: TournamentStatus::default(),
            participants: Vec::new(),
            matches: Vec::new(),
        };
        let mutation = Mutation::create("create", placeholder).invalidates(EntityKind::Tournament);

        let client = self.ctx.client.clone();
        let outcome = self
            .ctx
            .executor
            .mutate(mutation, || async move {
                client.create_tournament(&input).await.map_err(SdkError::from)
            })
            .await?;

        if let MutationOutcome::Committed(ref tournament) = outcome {
            info!(tournament_id = %tournament.id, "Tournament created");
            self.reload().await;
        }
        Ok(outcome)
    }

    pub async fn report_match_result(
        &self,
        tournament_id: &str,
        match_id: &str,
        winner_id: &str,
    ) -> Result<MutationOutcome<Tournament>> {
        self.ctx.require(Capability::ManageTournaments)?;

        let (mid, winner) = (match_id.to_string(), winner_id.to_string());
        let mutation = Mutation::<Tournament>::new(tournament_id, format!("result:{}", match_id))
            .with_patch(move |tournament: &mut Tournament| {
                if let Some(m) = tournament.matches.iter_mut().find(|m| m.id == mid) {
                    m.winner_id = Some(winner);
                    m.status = MatchStatus::Finished;
                }
            })
            .invalidates(EntityKind::Match);

        let client = self.ctx.client.clone();
        let (tid, mid, winner) = (
            tournament_id.to_string(),
            match_id.to_string(),
            winner_id.to_string(),
        );
        self.ctx
            .executor
            .mutate(mutation, || async move {
                client
                    .report_match_result(&tid, &mid, &winner)
                    .await
                    .map_err(SdkError::from)
            })
            .await
    }
}

#[async_trait]
impl View for AdminDashboardView {
    type Model = AdminPanel;

    fn name(&self) -> &'static str {
        self.scope.name()
    }

    fn state(&self) -> watch::Receiver<ViewState<AdminPanel>> {
        self.state.subscribe()
    }

    async fn load(&self) -> ViewState<AdminPanel> {
        self.switch_tab(self.tab()).await
    }

    fn unmount(&self) {
        self.scope.unmount();
    }

    fn is_mounted(&self) -> bool {
        self.scope.is_mounted()
    }
}
