use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{clock::Clock, error::DeviceError, metrics::MetricsCollector, recognition::Aggregator};

use super::{
    loop_worker::{capture_loop, grab_frame},
    CaptureFrame, DeviceLease,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// A tick every `period` while the session is active; the first tick
    /// fires immediately.
    Automatic { period: Duration },
    /// One capture per explicit [`CaptureTrigger::fire`].
    Manual,
}

/// Everything a capture needs, bound to one session.
#[derive(Clone)]
pub struct CaptureContext {
    pub session_id: String,
    pub lease: Arc<DeviceLease>,
    pub aggregator: Aggregator,
    pub metrics: MetricsCollector,
    pub clock: Arc<dyn Clock>,
    pub grab_timeout: Duration,
}

pub struct CaptureScheduler {
    ctx: CaptureContext,
    handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

/// Single-shot grab detached from the scheduler, so the owner can drop its
/// locks while the device works. Cancelled together with the scheduler.
#[derive(Clone)]
pub struct CaptureTrigger {
    ctx: CaptureContext,
    cancel_token: CancellationToken,
}

impl CaptureTrigger {
    /// Fails with [`DeviceError::Released`] once the scheduler has been
    /// stopped, including while the grab is in flight.
    pub async fn fire(&self) -> Result<CaptureFrame, DeviceError> {
        if self.cancel_token.is_cancelled() {
            return Err(DeviceError::Released);
        }
        self.ctx.metrics.record_tick().await;

        let grabbed = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => Err(DeviceError::Released),
            result = grab_frame(&self.ctx.lease, self.ctx.clock.as_ref(), self.ctx.grab_timeout) => result,
        };
        self.ctx.metrics.record_grab(grabbed.is_ok()).await;
        grabbed
    }
}

impl CaptureScheduler {
    pub fn start(mode: CaptureMode, ctx: CaptureContext) -> Self {
        let cancel_token = CancellationToken::new();

        let handle = match mode {
            CaptureMode::Automatic { period } => {
                info!(
                    "starting automatic capture every {:?} for session {}",
                    period, ctx.session_id
                );
                Some(tokio::spawn(capture_loop(
                    ctx.clone(),
                    period,
                    cancel_token.clone(),
                )))
            }
            CaptureMode::Manual => None,
        };

        Self {
            ctx,
            handle,
            cancel_token,
        }
    }

    pub fn trigger_handle(&self) -> CaptureTrigger {
        CaptureTrigger {
            ctx: self.ctx.clone(),
            cancel_token: self.cancel_token.clone(),
        }
    }

    /// Cancels pending ticks and waits for the loop to exit. Once this
    /// returns no further grab is issued. Idempotent.
    pub async fn stop(&mut self) -> Result<()> {
        self.cancel_token.cancel();

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Synchronous teardown for drop paths: cancels and aborts without
    /// waiting.
    pub fn cancel_now(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        self.cancel_now();
    }
}
