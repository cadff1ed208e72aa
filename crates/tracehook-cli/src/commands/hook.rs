//! Hook entry points.
//!
//! Both commands are fail-open: whatever goes wrong is logged to stderr and
//! the process still exits successfully so the host's turn is never blocked.

use tokio::io::{AsyncRead, AsyncReadExt};

use tracehook_core::{Event, SessionId};
use tracehook_metrics::{render_digest, MetricsAggregator};
use tracehook_session::{EventRecorder, SessionSelector};

use crate::AppContext;

/// Record an agent spawn from the payload on stdin.
pub async fn record(ctx: &AppContext, session: Option<String>) {
    if !record_from(ctx, session, tokio::io::stdin()).await {
        // The blocking stdin reader cannot be cancelled and would hold
        // the runtime open on shutdown.
        std::process::exit(0);
    }
}

/// Read a payload from `input` and record it within the hook timeout.
///
/// Returns `false` when the timeout cut the run short.
async fn record_from<R>(ctx: &AppContext, session: Option<String>, input: R) -> bool
where
    R: AsyncRead + Unpin,
{
    let timeout = ctx.config.hook.timeout();

    match tokio::time::timeout(timeout, read_and_record(ctx, session, input)).await {
        Ok(Some(event)) => {
            tracing::debug!(session = %event.session_id, "Trace event recorded");
            true
        }
        Ok(None) => true,
        Err(_) => {
            tracing::warn!("Record hook timed out after {}ms", timeout.as_millis());
            false
        }
    }
}

async fn read_and_record<R>(ctx: &AppContext, session: Option<String>, mut input: R) -> Option<Event>
where
    R: AsyncRead + Unpin,
{
    let mut raw = String::new();
    if let Err(e) = input.read_to_string(&mut raw).await {
        tracing::warn!(error = %e, "Failed to read hook payload");
        return None;
    }

    let mut recorder = EventRecorder::from_config(ctx.store(), &ctx.config);
    if let Some(id) = session {
        recorder = recorder.with_session(id);
    }
    recorder.record_silently(&raw).await
}

/// Aggregate the current (or given) session and print the digest.
pub async fn aggregate(ctx: &AppContext, session: Option<String>, quiet: bool) {
    let session = match session.as_deref().map(SessionId::parse).transpose() {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, "Not aggregating");
            return;
        }
    };

    let aggregator = MetricsAggregator::new(
        ctx.store(),
        SessionSelector::from_config(&ctx.config.trace),
    );
    let timeout = ctx.config.hook.timeout();

    let summary = match tokio::time::timeout(timeout, aggregator.aggregate_silently(session.as_ref())).await {
        Ok(summary) => summary,
        Err(_) => {
            tracing::warn!("Aggregation timed out after {}ms", timeout.as_millis());
            None
        }
    };

    if quiet || !ctx.config.display.digest {
        return;
    }
    if let Some(digest) = summary.as_ref().and_then(render_digest) {
        print!("{}", digest);
    }
}
