//! Handlers that execute planner operations.

use std::io::Write;
use std::sync::atomic::Ordering;

use gameserver_core::Confirmer;
use tracing::warn;

use crate::context::{AppContext, CliResult};
use crate::output::{emit, plan_table};

pub(crate) async fn handle_update(
    ctx: &AppContext,
    id: &str,
    force: bool,
    out: &mut dyn Write,
) -> CliResult<()> {
    let descriptor = ctx.lookup(id)?;
    let flag = ctx.planner.interrupt_flag();
    // Ctrl-C anywhere in the plan aborts it before the record write.
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; the update stops before recording");
            flag.store(true, Ordering::SeqCst);
        }
    });
    let result = ctx.planner.update(descriptor, force).await;
    watcher.abort();
    emit(&result?, ctx.output, out, plan_table)
}

pub(crate) async fn handle_start(ctx: &AppContext, id: &str, out: &mut dyn Write) -> CliResult<()> {
    let descriptor = ctx.lookup(id)?;
    let report = ctx.planner.start(descriptor).await?;
    emit(&report, ctx.output, out, plan_table)
}

pub(crate) async fn handle_stop(ctx: &AppContext, id: &str, out: &mut dyn Write) -> CliResult<()> {
    let descriptor = ctx.lookup(id)?;
    let report = ctx.planner.stop(descriptor).await?;
    emit(&report, ctx.output, out, plan_table)
}

pub(crate) async fn handle_restart(
    ctx: &AppContext,
    id: &str,
    out: &mut dyn Write,
) -> CliResult<()> {
    let descriptor = ctx.lookup(id)?;
    let report = ctx.planner.restart(descriptor).await?;
    emit(&report, ctx.output, out, plan_table)
}

pub(crate) async fn handle_clean(
    ctx: &AppContext,
    id: &str,
    include_user_data: bool,
    confirmer: &mut dyn Confirmer,
    out: &mut dyn Write,
) -> CliResult<()> {
    let descriptor = ctx.lookup(id)?;
    let report = ctx
        .planner
        .clean(descriptor, include_user_data, confirmer)
        .await?;
    emit(&report, ctx.output, out, plan_table)
}
