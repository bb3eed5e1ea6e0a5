use std::sync::{Arc, Mutex, MutexGuard};

use crate::collaborators::{CaptureDevice, DeviceHandle};
use crate::error::DeviceError;

/// An acquired capture device. Released exactly once, either explicitly or
/// on drop; grabs after release fail with [`DeviceError::Released`].
pub struct DeviceLease {
    device: Arc<dyn CaptureDevice>,
    handle: Mutex<Option<DeviceHandle>>,
}

impl DeviceLease {
    pub async fn acquire(device: Arc<dyn CaptureDevice>) -> Result<Self, DeviceError> {
        let handle = device.acquire().await?;
        Ok(Self {
            device,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub async fn grab(&self) -> Result<Vec<u8>, DeviceError> {
        let handle = self.slot().clone().ok_or(DeviceError::Released)?;
        let frame = self.device.grab_frame(&handle).await?;

        // A release that landed while the device was reading voids the frame.
        if self.slot().as_ref() != Some(&handle) {
            return Err(DeviceError::Released);
        }
        Ok(frame)
    }

    /// Returns false when the device had already been released.
    pub fn release(&self) -> bool {
        let taken = self.slot().take();
        match taken {
            Some(handle) => {
                self.device.release(handle);
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<DeviceHandle>> {
        match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.release();
    }
}
