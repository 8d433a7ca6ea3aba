//! W3C WebDriver wire helpers
//!
//! Request/response shapes and error mapping for the subset of the
//! protocol the session needs. Everything here is pure so it can be
//! tested without a driver.

use routerdns_core::session::{ElementHandle, Selector};
use routerdns_core::Error;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Key under which W3C drivers return element references
pub const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Script used to activate elements
///
/// A scripted click reaches anchors and buttons the firmware renders under
/// overlays, where a native click is rejected as "element not interactable".
pub const CLICK_SCRIPT: &str = "arguments[0].click();";

/// Envelope every WebDriver response is wrapped in
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub value: Value,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Locator strategy and value for a selector
pub fn locator(selector: &Selector) -> Value {
    let (using, value) = match selector {
        Selector::XPath(expr) => ("xpath", expr.as_str()),
        Selector::Css(expr) => ("css selector", expr.as_str()),
    };
    json!({ "using": using, "value": value })
}

/// Selector for the `<option>` with a given value under a `<select>`
pub fn option_selector(value: &str) -> Selector {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Selector::css(format!("option[value=\"{}\"]", escaped))
}

/// Serialize an element reference for use as a script argument
pub fn element_arg(element: &ElementHandle) -> Value {
    json!({ W3C_ELEMENT_KEY: element.id() })
}

/// New-session request body
pub fn new_session_body(binary: Option<&str>, args: &[String]) -> Value {
    let mut chrome_options = json!({ "args": args });
    if let Some(binary) = binary {
        chrome_options["binary"] = json!(binary);
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": chrome_options,
            }
        }
    })
}

/// Session timeouts request body
pub fn timeouts_body(implicit: Duration, page_load: Duration) -> Value {
    json!({
        "implicit": implicit.as_millis() as u64,
        "pageLoad": page_load.as_millis() as u64,
    })
}

/// Extract the session id from a new-session response value
pub fn parse_session_id(value: Value) -> Result<String, Error> {
    let session: NewSession = serde_json::from_value(value)
        .map_err(|e| Error::session(format!("Malformed new-session response: {}", e)))?;
    Ok(session.session_id)
}

/// Extract an element reference from a find-element response value
pub fn parse_element(value: &Value) -> Result<ElementHandle, Error> {
    value
        .get(W3C_ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(ElementHandle::new)
        .ok_or_else(|| Error::session(format!("Malformed element reference: {}", value)))
}

/// Map a failed command response to an updater error
///
/// `context` describes the command (e.g. the selector) and is prefixed to
/// the driver's message.
pub fn map_error(status: u16, body: &str, context: &str) -> Error {
    let wire = serde_json::from_str::<Envelope>(body)
        .ok()
        .and_then(|envelope| serde_json::from_value::<WireError>(envelope.value).ok());

    let Some(wire) = wire else {
        return Error::http(format!("{}: HTTP {}: {}", context, status, body.trim()));
    };

    let message = first_line(&wire.message);
    match wire.error.as_str() {
        "no such element" | "stale element reference" => {
            Error::element_not_found(format!("{}: {}", context, message))
        }
        "timeout" | "script timeout" => Error::timeout(format!("{}: {}", context, message)),
        other => Error::session(format!("{}: {} ({})", context, other, message)),
    }
}

/// Map a transport failure
pub fn map_transport_error(err: reqwest::Error, context: &str) -> Error {
    if err.is_timeout() {
        Error::timeout(format!("{}: {}", context, err))
    } else {
        Error::http(format!("{}: {}", context, err))
    }
}

// Chrome appends multi-line session info to most messages
fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}
