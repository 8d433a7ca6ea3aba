// # Remote UI Session
//
// Capability interface over a browser automation engine.
//
// The workflow only ever needs to load a URL, find an element, type into
// it, click it, pick a `<select>` option and finally tear the browser
// down. Keeping the surface this narrow means the update logic has no
// knowledge of WebDriver, CDP or any particular engine.
//
// ## Implementations
//
// - WebDriver (chromedriver): `routerdns-webdriver` crate
// - Scripted test doubles: `tests/common`

use async_trait::async_trait;
use std::fmt;

/// How to locate an element on the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// XPath 1.0 expression
    XPath(String),
    /// CSS selector
    Css(String),
}

impl Selector {
    /// XPath selector
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// CSS selector
    pub fn css(expr: impl Into<String>) -> Self {
        Self::Css(expr.into())
    }

    /// The raw expression, without the strategy
    pub fn expression(&self) -> &str {
        match self {
            Self::XPath(expr) | Self::Css(expr) => expr,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::XPath(expr) => write!(f, "xpath={}", expr),
            Self::Css(expr) => write!(f, "css={}", expr),
        }
    }
}

/// Opaque reference to an element located in a live session
///
/// Only meaningful to the session that produced it, and only until the
/// page it was found on is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    /// Wrap an engine-specific element id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Engine-specific element id
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// One live automation session bound to one browser process
///
/// # Ownership
///
/// A session belongs to exactly one update cycle. It is never shared and
/// never reused; the scheduler calls [`close`](RemoteUiSession::close)
/// exactly once when the cycle ends, whatever the outcome.
///
/// # Timeouts
///
/// Implementations must bound every call. A hung remote interaction is
/// reported as an error (usually [`crate::Error::Timeout`]), never as an
/// indefinite wait.
///
/// # No Retries
///
/// Implementations must not retry commands. Re-submitting a form against a
/// stale page is unsafe; the next scheduled cycle is the retry.
#[async_trait]
pub trait RemoteUiSession: Send {
    /// Navigate the browser to `url` and wait for the page to load
    async fn open(&mut self, url: &str) -> Result<(), crate::Error>;

    /// Locate a single element on the current page
    ///
    /// # Returns
    ///
    /// - `Ok(ElementHandle)`: the first matching element
    /// - `Err(Error::ElementNotFound)`: no element matched within the wait bound
    async fn find_element(&mut self, selector: &Selector) -> Result<ElementHandle, crate::Error>;

    /// Replace the value of an input: clear it, then type `text`
    async fn set_value(&mut self, element: &ElementHandle, text: &str) -> Result<(), crate::Error>;

    /// Activate an element (click or submit)
    async fn invoke(&mut self, element: &ElementHandle) -> Result<(), crate::Error>;

    /// Choose the `<option>` whose `value` attribute equals `value`
    async fn select_option(&mut self, element: &ElementHandle, value: &str) -> Result<(), crate::Error>;

    /// Tear the session and its browser process down
    async fn close(&mut self) -> Result<(), crate::Error>;
}

/// Creates a fresh [`RemoteUiSession`] for each cycle
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Launch a new session
    ///
    /// # Returns
    ///
    /// - `Ok(session)`: a live session the caller now owns
    /// - `Err(Error)`: the automation engine could not be started
    async fn acquire(&self) -> Result<Box<dyn RemoteUiSession>, crate::Error>;

    /// Name of the backing engine (for logging)
    fn engine_name(&self) -> &'static str;
}
