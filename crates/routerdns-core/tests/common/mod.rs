//! Test doubles and common utilities for the workflow and scheduler contract tests
//!
//! The scripted session records every capability call into a shared log
//! and can be told to fail or panic at a chosen selector or operation, so
//! tests can assert exactly which remote operations a cycle attempted.

#![allow(dead_code)]

use routerdns_core::config::{DnsServers, RouterConfig};
use routerdns_core::error::{Error, Result};
use routerdns_core::session::{ElementHandle, RemoteUiSession, Selector, SessionFactory};
use routerdns_core::{LivenessMarker, SchedulerEvent};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const ROUTER_URL: &str = "http://192.168.29.1";
pub const LOGOUT_URL: &str = "http://192.168.29.1/platform.cgi?page=index.html";

/// Build a router configuration with well-known test values
pub fn test_config(interval: Duration) -> Arc<RouterConfig> {
    let dns = DnsServers {
        ipv4_primary: "1.1.1.1".parse().unwrap(),
        ipv4_secondary: "1.0.0.1".parse().unwrap(),
        ipv6_primary: "2606:4700:4700::1111".parse().unwrap(),
        ipv6_secondary: "2606:4700:4700::1001".parse().unwrap(),
    };

    Arc::new(RouterConfig::new(ROUTER_URL, "admin", "s3cret", dns, interval).unwrap())
}

/// Shared, timestamped record of every call made through the doubles
#[derive(Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .unwrap()
            .push((Instant::now(), entry.into()));
    }

    /// Entries without timestamps, in call order
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Entries with timestamps, in call order
    pub fn timed_entries(&self) -> Vec<(Instant, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// Whether any entry contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|entry| entry.contains(needle))
    }

    /// Number of entries starting with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.starts_with(prefix))
            .count()
    }
}

/// What a scripted session should do wrong, if anything
#[derive(Clone, Default)]
pub struct Script {
    /// `find_element` returns ElementNotFound for this selector
    pub fail_on: Option<Selector>,
    /// `find_element` panics for this selector
    pub panic_on: Option<Selector>,
    /// `set_value` is rejected for the element found by this selector
    pub fail_set_on: Option<Selector>,
    /// `invoke` is rejected for the element found by this selector
    pub fail_invoke_on: Option<Selector>,
    /// `select_option` is rejected on every select
    pub fail_select: bool,
    /// `open` times out for URLs containing this fragment
    pub fail_open: Option<String>,
    /// `close` returns an error (after being counted)
    pub fail_close: bool,
    /// `close` panics (after being counted)
    pub panic_close: bool,
}

impl Script {
    fn targets(target: &Option<Selector>, element: &ElementHandle) -> bool {
        target
            .as_ref()
            .is_some_and(|selector| selector.expression() == element.id())
    }
}

/// A RemoteUiSession that records calls and follows a [`Script`]
pub struct ScriptedSession {
    id: usize,
    script: Script,
    log: CallLog,
    close_count: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl RemoteUiSession for ScriptedSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.log.push(format!("open#{} {}", self.id, url));
        if let Some(fragment) = &self.script.fail_open
            && url.contains(fragment.as_str())
        {
            return Err(Error::timeout(format!("page load timed out: {}", url)));
        }
        Ok(())
    }

    async fn find_element(&mut self, selector: &Selector) -> Result<ElementHandle> {
        self.log.push(format!("find#{} {}", self.id, selector));
        if self.script.panic_on.as_ref() == Some(selector) {
            panic!("scripted panic at {}", selector);
        }
        if self.script.fail_on.as_ref() == Some(selector) {
            return Err(Error::element_not_found(selector.to_string()));
        }
        Ok(ElementHandle::new(selector.expression()))
    }

    async fn set_value(&mut self, element: &ElementHandle, text: &str) -> Result<()> {
        self.log
            .push(format!("set#{} {} = {}", self.id, element.id(), text));
        if Script::targets(&self.script.fail_set_on, element) {
            return Err(Error::session(format!("element not interactable: {}", element.id())));
        }
        Ok(())
    }

    async fn invoke(&mut self, element: &ElementHandle) -> Result<()> {
        self.log.push(format!("invoke#{} {}", self.id, element.id()));
        if Script::targets(&self.script.fail_invoke_on, element) {
            return Err(Error::session(format!("click rejected: {}", element.id())));
        }
        Ok(())
    }

    async fn select_option(&mut self, element: &ElementHandle, value: &str) -> Result<()> {
        self.log
            .push(format!("select#{} {} = {}", self.id, element.id(), value));
        if self.script.fail_select {
            return Err(Error::element_not_found(format!("option[value=\"{}\"]", value)));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.log.push(format!("close#{}", self.id));
        if self.script.panic_close {
            panic!("scripted panic during close");
        }
        if self.script.fail_close {
            return Err(Error::session("browser already gone"));
        }
        Ok(())
    }
}

/// A SessionFactory handing out scripted sessions
///
/// Clones share counters and the call log, so a test can keep one handle
/// while the scheduler owns another.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Script,
    fail_acquire: bool,
    panic_acquire: bool,
    log: CallLog,
    acquire_count: Arc<AtomicUsize>,
    close_count: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(mut self, selector: Selector) -> Self {
        self.script.fail_on = Some(selector);
        self
    }

    pub fn panicking_at(mut self, selector: Selector) -> Self {
        self.script.panic_on = Some(selector);
        self
    }

    pub fn failing_set_at(mut self, selector: Selector) -> Self {
        self.script.fail_set_on = Some(selector);
        self
    }

    pub fn failing_invoke_at(mut self, selector: Selector) -> Self {
        self.script.fail_invoke_on = Some(selector);
        self
    }

    pub fn failing_select(mut self) -> Self {
        self.script.fail_select = true;
        self
    }

    pub fn panicking_close(mut self) -> Self {
        self.script.panic_close = true;
        self
    }

    pub fn panicking_acquire(mut self) -> Self {
        self.panic_acquire = true;
        self
    }

    pub fn failing_open(mut self, fragment: impl Into<String>) -> Self {
        self.script.fail_open = Some(fragment.into());
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.script.fail_close = true;
        self
    }

    pub fn failing_acquire(mut self) -> Self {
        self.fail_acquire = true;
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Number of successful acquisitions
    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }

    /// Number of close() calls across all sessions
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SessionFactory for ScriptedFactory {
    async fn acquire(&self) -> Result<Box<dyn RemoteUiSession>> {
        if self.panic_acquire {
            self.log.push("acquire-panicked");
            panic!("scripted panic during acquire");
        }
        if self.fail_acquire {
            self.log.push("acquire-failed");
            return Err(Error::session("chromedriver not reachable"));
        }

        let id = self.acquire_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.push(format!("acquire#{}", id));

        Ok(Box::new(ScriptedSession {
            id,
            script: self.script.clone(),
            log: self.log.clone(),
            close_count: Arc::clone(&self.close_count),
        }))
    }

    fn engine_name(&self) -> &'static str {
        "scripted"
    }
}

/// A liveness marker that always fails to write
pub struct BrokenLivenessMarker;

#[async_trait::async_trait]
impl LivenessMarker for BrokenLivenessMarker {
    async fn mark(&self, _at: DateTime<Utc>) -> Result<()> {
        Err(Error::liveness("read-only filesystem"))
    }

    async fn last(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

/// A liveness marker that panics on write
pub struct PanickingLivenessMarker;

#[async_trait::async_trait]
impl LivenessMarker for PanickingLivenessMarker {
    async fn mark(&self, _at: DateTime<Utc>) -> Result<()> {
        panic!("scripted panic while marking liveness");
    }

    async fn last(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

/// Wait for the first event matching `pred`, failing the test after `timeout`
pub async fn wait_for_event<F>(
    rx: &mut mpsc::Receiver<SchedulerEvent>,
    timeout: Duration,
    pred: F,
) -> SchedulerEvent
where
    F: Fn(&SchedulerEvent) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed before expected event"),
            }
        }
    })
    .await
    .expect("expected scheduler event within timeout")
}

/// Build a scheduler around a scripted factory
pub fn build_scheduler(
    factory: &ScriptedFactory,
    liveness: Box<dyn LivenessMarker>,
    interval: Duration,
    fault_backoff: Duration,
) -> (
    routerdns_core::CycleScheduler,
    mpsc::Receiver<SchedulerEvent>,
) {
    let workflow = routerdns_core::RouterUpdateWorkflow::new(test_config(interval));
    let config = routerdns_core::SchedulerConfig::new(interval)
        .with_fault_backoff(fault_backoff)
        .with_event_channel_capacity(256);

    routerdns_core::CycleScheduler::new(Box::new(factory.clone()), workflow, liveness, config)
        .expect("scheduler construction succeeds")
}
