//! Dashboard numbers derived from the execution history.

use offercopilot_shared::{DashboardStats, Result};
use offercopilot_storage::Storage;

/// Tools listed in the "most used" ranking.
pub const TOP_TOOLS: u32 = 5;

/// Executions listed under "recent activity".
pub const RECENT_EXECUTIONS: u32 = 5;

pub async fn dashboard_stats(storage: &Storage) -> Result<DashboardStats> {
    let (total_executions, total_tokens) = storage.execution_totals().await?;
    Ok(DashboardStats {
        total_executions,
        total_tokens,
        top_tools: storage.top_tools(TOP_TOOLS).await?,
        recent_executions: storage.list_executions(RECENT_EXECUTIONS).await?,
    })
}
