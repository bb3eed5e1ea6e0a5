use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;

use crate::{
    capture::{normalize_to_jpeg, MIN_FRAME_BYTES},
    error::DeviceError,
};

use super::{CaptureDevice, DeviceHandle};

/// Camera exposed as an HTTP endpoint that returns one still image per GET.
/// Only one handle may be outstanding at a time.
pub struct SnapshotCamera {
    client: Client,
    url: String,
    timeout: Duration,
    owner: Mutex<Option<u64>>,
    next_handle: AtomicU64,
}

impl SnapshotCamera {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        // Cameras sit on the local network; never route them through a proxy.
        let client = Client::builder().timeout(timeout).no_proxy().build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            timeout,
            owner: Mutex::new(None),
            next_handle: AtomicU64::new(1),
        })
    }

    fn owner(&self) -> MutexGuard<'_, Option<u64>> {
        match self.owner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn fetch(&self) -> Result<Vec<u8>, DeviceError> {
        let response = self.client.get(&self.url).send().await.map_err(|err| {
            if err.is_timeout() {
                DeviceError::Timeout(self.timeout)
            } else {
                DeviceError::Unavailable(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::NotReady(format!("snapshot endpoint returned {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| DeviceError::NotReady(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl CaptureDevice for SnapshotCamera {
    /// Claims the camera, then checks the endpoint once. A failed check
    /// gives the claim back.
    async fn acquire(&self) -> Result<DeviceHandle, DeviceError> {
        let id = {
            let mut owner = self.owner();
            if owner.is_some() {
                return Err(DeviceError::Busy);
            }
            let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
            *owner = Some(id);
            id
        };

        if let Err(err) = self.fetch().await {
            *self.owner() = None;
            return Err(match err {
                DeviceError::NotReady(reason) => DeviceError::Unavailable(reason),
                other => other,
            });
        }

        info!("camera {} acquired (handle {id})", self.url);
        Ok(DeviceHandle { id })
    }

    async fn grab_frame(&self, handle: &DeviceHandle) -> Result<Vec<u8>, DeviceError> {
        if *self.owner() != Some(handle.id) {
            return Err(DeviceError::Released);
        }

        let raw = self.fetch().await?;
        if raw.len() < MIN_FRAME_BYTES {
            return Err(DeviceError::NotReady(format!(
                "frame of {} bytes is too small",
                raw.len()
            )));
        }

        let jpeg = tokio::task::spawn_blocking(move || normalize_to_jpeg(&raw))
            .await
            .map_err(|err| DeviceError::NotReady(err.to_string()))?
            .map_err(|err| DeviceError::NotReady(format!("{err:#}")))?;
        debug!("grabbed {} byte frame", jpeg.len());
        Ok(jpeg)
    }

    fn release(&self, handle: DeviceHandle) {
        let mut owner = self.owner();
        if *owner == Some(handle.id) {
            *owner = None;
            info!("camera {} released (handle {})", self.url, handle.id);
        }
    }
}
