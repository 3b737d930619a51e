//! Page driver capability.
//!
//! The scraper core never talks to the browser directly; it goes through
//! [`PageDriver`], which covers the handful of DOM operations the lookup
//! flow needs. [`ChromiumDriver`] is the production implementation over
//! chromiumoxide. Tests substitute a scripted driver.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, info};

use crate::config::ScraperConfig;
use crate::error::ScraperError;

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), ScraperError>;

    /// Wait until the first match of `selector` exists and is enabled.
    async fn wait_clickable(&self, selector: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// Rendered text of every match of `selector`, in document order.
    async fn find_texts(&self, selector: &str) -> Result<Vec<String>, ScraperError>;

    /// Replace the value of the first match of `selector`, clearing any
    /// prior value and firing an input event so reactive UIs notice.
    async fn set_value(&self, selector: &str, text: &str) -> Result<(), ScraperError>;

    /// Click the first match of `selector`.
    async fn click(&self, selector: &str) -> Result<(), ScraperError>;

    /// Dump diagnostic state into the debug log after a stall.
    async fn debug_snapshot(&self, _label: &str) {}
}

/// Chrome DevTools Protocol driver.
pub struct ChromiumDriver {
    // Dropping the browser handle tears the process down.
    _browser: Browser,
    page: Page,
}

impl ChromiumDriver {
    /// Launch a browser and open a blank page.
    pub async fn launch(config: &ScraperConfig) -> Result<Self, ScraperError> {
        info!("Initializing browser for citation scraper...");

        // Unique user data dir so parallel runs do not fight over a profile
        let unique_id = format!(
            "{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        let user_data_dir = std::env::temp_dir().join(format!("citation-scraper-{}", unique_id));

        let chrome_path = std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .unwrap_or_else(|_| "chromium".to_string());

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(&user_data_dir);

        if !config.headless {
            builder = builder.with_head();
        }

        builder = builder
            .no_sandbox()
            .request_timeout(Duration::from_secs(60))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!("Browser event: {:?}", event);
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BrowserInit(e.to_string()))?;

        info!("Browser initialized successfully");
        Ok(Self {
            _browser: browser,
            page,
        })
    }

    /// Selector as a JS string literal.
    fn js_str(s: &str) -> String {
        serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), ScraperError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;

        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        debug!("Navigated to {}", url);
        Ok(())
    }

    async fn wait_clickable(&self, selector: &str, timeout: Duration) -> Result<(), ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({sel});
                return el !== null && !el.disabled;
            }})()
            "#,
            sel = Self::js_str(selector)
        );

        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            let clickable: bool = self
                .page
                .evaluate(script.as_str())
                .await
                .map_err(|e| ScraperError::JavaScript(e.to_string()))?
                .into_value()
                .unwrap_or(false);

            if clickable {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(ScraperError::Timeout(format!(
            "{} not clickable within {:?}",
            selector, timeout
        )))
    }

    async fn find_texts(&self, selector: &str) -> Result<Vec<String>, ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const els = document.querySelectorAll({sel});
                const texts = [];
                for (const el of els) {{
                    texts.push(el.innerText);
                }}
                return JSON.stringify(texts);
            }})()
            "#,
            sel = Self::js_str(selector)
        );

        let json: String = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value()
            .unwrap_or_default();

        serde_json::from_str(&json).map_err(|e| ScraperError::JavaScript(e.to_string()))
    }

    async fn set_value(&self, selector: &str, text: &str) -> Result<(), ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = '';
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            sel = Self::js_str(selector),
            val = Self::js_str(text)
        );

        let found: bool = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value()
            .unwrap_or(false);

        if !found {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScraperError> {
        let script = format!(
            r#"
            (() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.click();
                return true;
            }})()
            "#,
            sel = Self::js_str(selector)
        );

        let found: bool = self
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| ScraperError::JavaScript(e.to_string()))?
            .into_value()
            .unwrap_or(false);

        if !found {
            return Err(ScraperError::ElementNotFound(selector.to_string()));
        }
        Ok(())
    }

    /// Full-page screenshot into the debug log, base64-encoded.
    async fn debug_snapshot(&self, label: &str) {
        if let Ok(shot) = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&shot);
            debug!("{} screenshot: data:image/png;base64,{}", label, encoded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(
            ChromiumDriver::js_str(".v-text-field__slot input"),
            "\".v-text-field__slot input\""
        );
        assert_eq!(ChromiumDriver::js_str("a\"b"), "\"a\\\"b\"");
    }
}
