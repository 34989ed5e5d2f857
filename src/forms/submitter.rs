//! Human-gated form submission.
//!
//! Opens a visible browser on the form page, pre-fills the known fields,
//! then waits for a human to resolve anything automated filling cannot
//! (CAPTCHAs above all) and confirm through a channel. Only a confirmed
//! `true` triggers the actual submit click.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use crate::forms::FormError;
use crate::probes::browser::find_chrome_executable;

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Explicit browser binary; auto-discovered when unset.
    pub chrome_executable: Option<String>,
    /// How long to wait for the human confirmation before giving up.
    pub confirmation_timeout: Duration,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            confirmation_timeout: Duration::from_secs(600),
        }
    }
}

/// Drives a visible browser through a pre-fill, human-confirm, submit cycle.
pub struct FormSubmitter {
    config: SubmitterConfig,
}

impl FormSubmitter {
    pub fn new(config: SubmitterConfig) -> Self {
        Self { config }
    }

    /// Open `form_url`, fill `values` into matching named fields, then block
    /// on `confirmation`. Returns `Ok(true)` only when the human confirmed
    /// and the submit click went through; timeout, a dropped sender, or an
    /// explicit `false` all yield `Ok(false)` without submitting.
    pub async fn submit(
        &self,
        form_url: &str,
        values: &HashMap<String, String>,
        confirmation: oneshot::Receiver<bool>,
    ) -> Result<bool, FormError> {
        let executable = self
            .config
            .chrome_executable
            .clone()
            .or_else(find_chrome_executable)
            .ok_or_else(|| FormError::Browser("no chromium-family browser found".to_string()))?;

        // The whole point is a human at the keyboard, so the window is
        // always visible.
        let browser_config = BrowserConfig::builder()
            .chrome_executable(executable)
            .with_head()
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .build()
            .map_err(FormError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| FormError::Browser(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    log::debug!("cdp handler event error: {err}");
                }
            }
        });

        let result = self
            .run_session(&browser, form_url, values, confirmation)
            .await;

        if let Err(err) = browser.close().await {
            log::debug!("browser close failed: {err}");
        }
        handler_task.abort();
        result
    }

    async fn run_session(
        &self,
        browser: &Browser,
        form_url: &str,
        values: &HashMap<String, String>,
        confirmation: oneshot::Receiver<bool>,
    ) -> Result<bool, FormError> {
        let page = browser
            .new_page(form_url)
            .await
            .map_err(|err| FormError::Browser(err.to_string()))?;
        sleep(Duration::from_secs(2)).await;

        self.fill_fields(&page, values).await;

        log::info!(
            "form at {form_url} pre-filled, waiting up to {:?} for confirmation",
            self.config.confirmation_timeout
        );

        match timeout(self.config.confirmation_timeout, confirmation).await {
            Ok(Ok(true)) => {
                self.click_submit(&page).await?;
                log::info!("form at {form_url} submitted");
                Ok(true)
            }
            Ok(Ok(false)) => {
                log::info!("submission of {form_url} declined");
                Ok(false)
            }
            Ok(Err(_)) => {
                log::warn!("confirmation channel for {form_url} was dropped, not submitting");
                Ok(false)
            }
            Err(_) => {
                log::warn!("no confirmation for {form_url} within the timeout, not submitting");
                Ok(false)
            }
        }
    }

    /// Fill every value whose named field exists on the page. Fields the
    /// page lacks are skipped so one directory's extra column never aborts
    /// the whole session.
    async fn fill_fields(&self, page: &Page, values: &HashMap<String, String>) {
        for (name, value) in values {
            let selector = format!(r#"[name="{name}"]"#);
            match page.find_element(&selector).await {
                Ok(element) => {
                    if let Err(err) = element.click().await {
                        log::debug!("could not focus field {name}: {err}");
                        continue;
                    }
                    if let Err(err) = element.type_str(value).await {
                        log::debug!("could not fill field {name}: {err}");
                    }
                }
                Err(_) => {
                    log::debug!("form has no field named {name}, skipping");
                }
            }
        }
    }

    async fn click_submit(&self, page: &Page) -> Result<(), FormError> {
        for selector in [
            r#"input[type="submit"]"#,
            r#"button[type="submit"]"#,
            "form button",
        ] {
            if let Ok(element) = page.find_element(selector).await {
                return element
                    .click()
                    .await
                    .map(|_| ())
                    .map_err(|err| FormError::Browser(err.to_string()));
            }
        }
        Err(FormError::Browser(
            "no submit control found on the form page".to_string(),
        ))
    }
}

impl Default for FormSubmitter {
    fn default() -> Self {
        Self::new(SubmitterConfig::default())
    }
}
