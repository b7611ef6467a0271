use crate::platforms::ScreenCapture;
use crate::HarvestError;
use std::io::Cursor;

/// Primary-monitor capture through xcap.
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapScreen;

impl ScreenCapture for XcapScreen {
    fn grab_screen(&self) -> Result<Vec<u8>, HarvestError> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| HarvestError::CaptureFailed(format!("Failed to get monitors: {e}")))?;
        let mut primary_monitor: Option<xcap::Monitor> = None;
        for monitor in monitors {
            match monitor.is_primary() {
                Ok(true) => {
                    primary_monitor = Some(monitor);
                    break;
                }
                Ok(false) => continue,
                Err(e) => {
                    return Err(HarvestError::CaptureFailed(format!(
                        "Error checking monitor primary status: {e}"
                    )));
                }
            }
        }
        let primary_monitor = primary_monitor.ok_or_else(|| {
            HarvestError::CaptureFailed("Could not find primary monitor".to_string())
        })?;

        let image = primary_monitor
            .capture_image()
            .map_err(|e| HarvestError::CaptureFailed(format!("Failed to capture screen: {e}")))?;

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| HarvestError::CaptureFailed(format!("PNG encoding failed: {e}")))?;
        Ok(png)
    }
}
