use std::time::Duration;

use tokio::{
    task::JoinSet,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{clock::Clock, error::DeviceError};

use super::{CaptureContext, CaptureFrame, DeviceLease};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub async fn capture_loop(ctx: CaptureContext, period: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Submissions run beside the ticker so a slow one never delays a tick.
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("capture loop shutting down for session {}", ctx.session_id);
                break;
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    if err.is_panic() {
                        log_error!("recognition task panicked in session {}: {err}", ctx.session_id);
                    }
                }
            }
            _ = ticker.tick() => {
                ctx.metrics.record_tick().await;
                let tick_start = Instant::now();

                let grabbed = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    result = grab_frame(&ctx.lease, ctx.clock.as_ref(), ctx.grab_timeout) => result,
                };

                match grabbed {
                    Ok(frame) => {
                        ctx.metrics.record_grab(true).await;
                        log_debug!(
                            "grabbed {} bytes for session {} in {}ms ({} submissions in flight)",
                            frame.len(),
                            ctx.session_id,
                            tick_start.elapsed().as_millis(),
                            in_flight.len()
                        );

                        let aggregator = ctx.aggregator.clone();
                        let session_id = ctx.session_id.clone();
                        in_flight.spawn(async move {
                            // Outcomes are logged and counted by the aggregator.
                            let _ = aggregator.submit(frame, &session_id).await;
                        });
                    }
                    Err(err) => {
                        ctx.metrics.record_grab(false).await;
                        log_warn!("skipping capture tick for session {}: {err}", ctx.session_id);
                    }
                }
            }
        }
    }

    // Pending submissions belong to a session that is ending.
    in_flight.shutdown().await;
}

pub(crate) async fn grab_frame(
    lease: &DeviceLease,
    clock: &dyn Clock,
    grab_timeout: Duration,
) -> Result<CaptureFrame, DeviceError> {
    let captured_at = clock.now_utc();
    match tokio::time::timeout(grab_timeout, lease.grab()).await {
        Ok(Ok(bytes)) => Ok(CaptureFrame::new(bytes, captured_at)),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DeviceError::Timeout(grab_timeout)),
    }
}
