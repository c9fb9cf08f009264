//! Moderation reports, filed from any screen

use crate::capability::Capability;
use crate::context::AppContext;
use crate::entity::EntityKind;
use crate::error::Result;
use crate::validation::Validate;
use bitforge_client::types::{Report, ReportInput};
use tracing::info;

/// File a report against a user, thread, post, media item or clan
pub async fn file_report(ctx: &AppContext, input: &ReportInput) -> Result<Report> {
    input.validate()?;
    ctx.require(Capability::FileReports)?;

    let report = ctx.client.file_report(input).await?;
    ctx.cache.put(&report)?;
    ctx.cache.invalidate_lists(EntityKind::Report);
    info!(report_id = %report.id, target_id = %input.target_id, "Report filed");
    Ok(report)
}
