// # WebDriver Remote UI Session
//
// This crate provides the browser automation adapter for the router DNS
// updater. It speaks the W3C WebDriver HTTP protocol to a
// chromedriver-compatible endpoint; each acquired session is a fresh
// headless Chrome/Chromium process.
//
// ## Architectural Constraints
//
// - One HTTP request per capability call
// - NO retry logic (a cycle is the unit of retry, owned by `CycleScheduler`)
// - Every call is bounded: the driver's implicit-wait and page-load
//   timeouts, plus a client-side request timeout above both
// - Typed values (the router password among them) are never logged
//
// ## Protocol Reference
//
// - W3C WebDriver: https://www.w3.org/TR/webdriver2/
// - New Session: POST `/session`
// - Navigate: POST `/session/:id/url`
// - Find Element: POST `/session/:id/element`
// - Execute Script: POST `/session/:id/execute/sync`
// - Delete Session: DELETE `/session/:id`

pub mod protocol;

use async_trait::async_trait;
use reqwest::Method;
use routerdns_core::session::{ElementHandle, RemoteUiSession, Selector, SessionFactory};
use routerdns_core::{Error, Result};
use serde_json::{Value, json};
use std::time::Duration;

use crate::protocol::Envelope;

/// Default chromedriver endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9515";

/// Browser binary tried first (Chromium ships for ARM boards)
pub const DEFAULT_BROWSER_BINARY: &str = "/usr/bin/chromium-browser";

/// Default bound on locating an element
const DEFAULT_ELEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a page load
const DEFAULT_PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Slack added on top of the driver-side bounds for the HTTP request itself
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(15);

/// Headless, container-friendly Chrome arguments
pub fn default_browser_args() -> Vec<String> {
    [
        "--headless",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--disable-web-security",
        "--disable-extensions",
        "--disable-plugins",
        "--disable-images",
        "--disable-default-apps",
        "--disable-background-timer-throttling",
        "--disable-backgrounding-occluded-windows",
        "--disable-renderer-backgrounding",
        "--disable-features=TranslateUI",
        "--window-size=1920,1080",
        "--memory-pressure-off",
    ]
    .iter()
    .map(|arg| arg.to_string())
    .collect()
}

/// WebDriver adapter settings
#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    /// chromedriver base URL
    pub endpoint: String,

    /// Preferred browser binary; `None` lets the driver pick
    pub browser_binary: Option<String>,

    /// Browser command-line arguments
    pub browser_args: Vec<String>,

    /// How long `find_element` waits for an element to appear
    pub element_timeout: Duration,

    /// How long `open` waits for a page load
    pub page_load_timeout: Duration,
}

impl Default for WebDriverSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            browser_binary: Some(DEFAULT_BROWSER_BINARY.to_string()),
            browser_args: default_browser_args(),
            element_timeout: DEFAULT_ELEMENT_TIMEOUT,
            page_load_timeout: DEFAULT_PAGE_LOAD_TIMEOUT,
        }
    }
}

impl WebDriverSettings {
    /// Set the driver endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set (or clear) the preferred browser binary
    pub fn with_browser_binary(mut self, binary: Option<String>) -> Self {
        self.browser_binary = binary;
        self
    }

    /// Set the element lookup bound
    pub fn with_element_timeout(mut self, timeout: Duration) -> Self {
        self.element_timeout = timeout;
        self
    }

    /// Client-side bound for a single HTTP command
    ///
    /// Longer than any driver-side wait so the driver reports its own
    /// timeout first.
    pub fn request_timeout(&self) -> Duration {
        self.element_timeout.max(self.page_load_timeout) + REQUEST_TIMEOUT_SLACK
    }
}

/// Thin JSON-over-HTTP client for one driver endpoint
#[derive(Debug, Clone)]
struct WireClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WireClient {
    /// Send one command and unwrap the `value` envelope
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        context: &str,
    ) -> Result<Value> {
        let url = format!("{}{}", self.endpoint, path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| protocol::map_transport_error(e, context))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| protocol::map_transport_error(e, context))?;

        if !status.is_success() {
            return Err(protocol::map_error(status.as_u16(), &text, context));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let envelope: Envelope = serde_json::from_str(&text)?;
        Ok(envelope.value)
    }
}

/// Creates one WebDriver session (one browser process) per cycle
pub struct WebDriverSessionFactory {
    settings: WebDriverSettings,
    client: WireClient,
}

impl WebDriverSessionFactory {
    /// Create a factory for the given settings
    pub fn new(settings: WebDriverSettings) -> Result<Self> {
        if !settings.endpoint.starts_with("http://") && !settings.endpoint.starts_with("https://") {
            return Err(Error::config_invalid(format!(
                "WebDriver endpoint must be an http(s) URL. Got: {}",
                settings.endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let client = WireClient {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
        };

        Ok(Self { settings, client })
    }

    /// Settings in use
    pub fn settings(&self) -> &WebDriverSettings {
        &self.settings
    }

    async fn new_session(&self, binary: Option<&str>) -> Result<String> {
        let body = protocol::new_session_body(binary, &self.settings.browser_args);
        let value = self
            .client
            .command(Method::POST, "/session", Some(body), "new session")
            .await?;
        protocol::parse_session_id(value)
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessionFactory {
    async fn acquire(&self) -> Result<Box<dyn RemoteUiSession>> {
        let session_id = match self.settings.browser_binary.as_deref() {
            Some(binary) => match self.new_session(Some(binary)).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::info!(
                        "Browser at {} could not be started ({}), trying driver default...",
                        binary,
                        e
                    );
                    self.new_session(None).await?
                }
            },
            None => self.new_session(None).await?,
        };
        tracing::debug!("WebDriver session {} created", session_id);

        let mut session = WebDriverSession {
            client: self.client.clone(),
            base: format!("/session/{}", session_id),
            session_id,
            closed: false,
        };

        let timeouts =
            protocol::timeouts_body(self.settings.element_timeout, self.settings.page_load_timeout);
        let timeouts_path = format!("{}/timeouts", session.base);
        let applied = session
            .client
            .command(Method::POST, &timeouts_path, Some(timeouts), "set timeouts")
            .await;

        if let Err(e) = applied {
            // Without bounded waits the session is unusable; don't leak the browser
            if let Err(close_err) = session.close().await {
                tracing::warn!("Failed to close half-initialised session: {}", close_err);
            }
            return Err(e);
        }

        Ok(Box::new(session))
    }

    fn engine_name(&self) -> &'static str {
        "webdriver"
    }
}

/// A live WebDriver session
#[derive(Debug)]
pub struct WebDriverSession {
    client: WireClient,
    session_id: String,
    base: String,
    closed: bool,
}

impl WebDriverSession {
    /// Driver-assigned session id
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn element_command(
        &self,
        element: &ElementHandle,
        action: &str,
        body: Value,
    ) -> Result<Value> {
        let path = format!("{}/element/{}/{}", self.base, element.id(), action);
        self.client
            .command(Method::POST, &path, Some(body), action)
            .await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::session(format!(
                "session {} already closed",
                self.session_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteUiSession for WebDriverSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("Navigating to {}", url);
        self.client
            .command(
                Method::POST,
                &format!("{}/url", self.base),
                Some(json!({ "url": url })),
                &format!("open {}", url),
            )
            .await?;
        Ok(())
    }

    async fn find_element(&mut self, selector: &Selector) -> Result<ElementHandle> {
        self.ensure_open()?;
        let value = self
            .client
            .command(
                Method::POST,
                &format!("{}/element", self.base),
                Some(protocol::locator(selector)),
                &selector.to_string(),
            )
            .await?;
        protocol::parse_element(&value)
    }

    async fn set_value(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.ensure_open()?;
        tracing::trace!("Setting value of element {}", element.id());
        self.element_command(element, "clear", json!({})).await?;
        self.element_command(element, "value", json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn invoke(&mut self, element: &ElementHandle) -> Result<()> {
        self.ensure_open()?;
        self.client
            .command(
                Method::POST,
                &format!("{}/execute/sync", self.base),
                Some(json!({
                    "script": protocol::CLICK_SCRIPT,
                    "args": [protocol::element_arg(element)],
                })),
                "click",
            )
            .await?;
        Ok(())
    }

    async fn select_option(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        self.ensure_open()?;
        let option_selector = protocol::option_selector(value);
        let option = self
            .element_command(element, "element", protocol::locator(&option_selector))
            .await?;
        let option = protocol::parse_element(&option)?;
        self.element_command(&option, "click", json!({})).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        // Marked first: a failed DELETE is not retried
        self.closed = true;

        self.client
            .command(Method::DELETE, &self.base, None, "delete session")
            .await?;
        tracing::debug!("WebDriver session {} deleted", self.session_id);
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                "WebDriver session {} dropped without close; browser may linger",
                self.session_id
            );
        }
    }
}
