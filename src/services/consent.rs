// src/services/consent.rs

//! Cookie consent dialog.

use std::time::Duration;

use crate::browser::Browser;
use crate::error::{AppError, Result};

/// Click the consent button if it shows up within `timeout`.
///
/// Returns whether the dialog was dismissed. A dialog that never appears is
/// not an error.
pub async fn accept_cookies<B: Browser>(browser: &B, locator: &str, timeout: Duration) -> Result<bool> {
    match browser.wait_until_present(locator, timeout).await {
        Ok(button) => {
            browser.click(&button).await?;
            log::info!("Cookie consent accepted");
            Ok(true)
        }
        Err(AppError::PageLoadTimeout { .. }) => {
            log::info!("Cookie consent button did not appear, continuing");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
