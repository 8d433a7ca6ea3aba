//! Router update workflow
//!
//! One cycle drives the router UI through five stages, strictly in order:
//!
//! ```text
//! Authenticate ──► NavigateLan ──► UpdateIpv4 ──► UpdateIpv6 ──► Terminate
//!      │               │               │               │              │
//!  LoginFailed   NavigationFailed  Ipv4UpdateFailed Ipv6UpdateFailed LogoutFailed
//!                                                                  (non-critical)
//! ```
//!
//! Each stage depends on the page the previous one left behind, so the
//! first failing stage aborts the rest of the cycle. A failing
//! `Terminate` is only logged: by then the router has committed both pages.
//!
//! The workflow borrows the session; acquiring and closing it is the
//! scheduler's job.

use crate::config::RouterConfig;
use crate::error::Result;
use crate::firmware::FirmwareSelectors;
use crate::session::{RemoteUiSession, Selector};
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A step of the update sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Load the router and submit credentials
    Authenticate,
    /// Open the LAN IPv4 configuration page
    NavigateLan,
    /// Set and save the IPv4 DNS servers
    UpdateIpv4,
    /// Open the LAN IPv6 page, set and save the IPv6 DNS servers
    UpdateIpv6,
    /// Leave the authenticated area
    Terminate,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 5] = [
        Stage::Authenticate,
        Stage::NavigateLan,
        Stage::UpdateIpv4,
        Stage::UpdateIpv6,
        Stage::Terminate,
    ];

    /// Failure kind reported when this stage fails
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Stage::Authenticate => FailureKind::LoginFailed,
            Stage::NavigateLan => FailureKind::NavigationFailed,
            Stage::UpdateIpv4 => FailureKind::Ipv4UpdateFailed,
            Stage::UpdateIpv6 => FailureKind::Ipv6UpdateFailed,
            Stage::Terminate => FailureKind::LogoutFailed,
        }
    }

    /// Whether a failure here fails the whole cycle
    pub fn is_critical(self) -> bool {
        self != Stage::Terminate
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Authenticate => "authenticate",
            Stage::NavigateLan => "navigate-lan",
            Stage::UpdateIpv4 => "update-ipv4",
            Stage::UpdateIpv6 => "update-ipv6",
            Stage::Terminate => "terminate",
        };
        f.write_str(name)
    }
}

/// Classification of a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The automation engine could not start a session
    SessionAcquisitionFailed,
    /// Credentials could not be submitted
    LoginFailed,
    /// The LAN IPv4 page could not be opened
    NavigationFailed,
    /// IPv4 DNS servers were not saved
    Ipv4UpdateFailed,
    /// IPv6 DNS servers were not saved (IPv4 may already be applied)
    Ipv6UpdateFailed,
    /// Logout failed; only ever logged
    LogoutFailed,
    /// A fault escaped the workflow's own error handling
    UnclassifiedFault,
}

impl FailureKind {
    /// Workflow stage this kind belongs to, if any
    pub fn stage(self) -> Option<Stage> {
        match self {
            FailureKind::LoginFailed => Some(Stage::Authenticate),
            FailureKind::NavigationFailed => Some(Stage::NavigateLan),
            FailureKind::Ipv4UpdateFailed => Some(Stage::UpdateIpv4),
            FailureKind::Ipv6UpdateFailed => Some(Stage::UpdateIpv6),
            FailureKind::LogoutFailed => Some(Stage::Terminate),
            FailureKind::SessionAcquisitionFailed | FailureKind::UnclassifiedFault => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleResult {
    /// Both LAN pages were saved
    Success {
        /// When the last stage finished
        completed_at: DateTime<Utc>,
        /// Set when the best-effort logout failed
        logout_error: Option<String>,
    },
    /// The cycle stopped early
    Failure {
        /// What failed
        kind: FailureKind,
        /// Error detail from the failing operation
        detail: String,
    },
}

impl CycleResult {
    /// Build a failure result
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// Whether the cycle succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure kind, if the cycle failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// The ordered router update sequence
#[derive(Debug, Clone)]
pub struct RouterUpdateWorkflow {
    config: Arc<RouterConfig>,
    selectors: FirmwareSelectors,
}

impl RouterUpdateWorkflow {
    /// Create a workflow for the default (JioFiber) firmware
    pub fn new(config: Arc<RouterConfig>) -> Self {
        Self::with_selectors(config, FirmwareSelectors::default())
    }

    /// Create a workflow with a custom selector table
    pub fn with_selectors(config: Arc<RouterConfig>, selectors: FirmwareSelectors) -> Self {
        Self { config, selectors }
    }

    /// Router configuration this workflow applies
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Selector table in use
    pub fn selectors(&self) -> &FirmwareSelectors {
        &self.selectors
    }

    /// Run all stages against a live session
    ///
    /// Stops at the first critical failure. Never closes the session.
    pub async fn run(&self, session: &mut dyn RemoteUiSession) -> CycleResult {
        let mut logout_error = None;

        for stage in Stage::ALL {
            debug!("Entering stage {}", stage);

            if let Err(e) = self.run_stage(stage, session).await {
                if stage.is_critical() {
                    error!("Stage {} failed: {}", stage, e);
                    return CycleResult::failure(stage.failure_kind(), e.to_string());
                }

                warn!("Failed to log out (DNS settings already saved): {}", e);
                logout_error = Some(e.to_string());
            }
        }

        CycleResult::Success {
            completed_at: Utc::now(),
            logout_error,
        }
    }

    async fn run_stage(&self, stage: Stage, session: &mut dyn RemoteUiSession) -> Result<()> {
        match stage {
            Stage::Authenticate => self.authenticate(session).await,
            Stage::NavigateLan => self.navigate_lan(session).await,
            Stage::UpdateIpv4 => self.update_ipv4(session).await,
            Stage::UpdateIpv6 => self.update_ipv6(session).await,
            Stage::Terminate => self.terminate(session).await,
        }
    }

    async fn authenticate(&self, session: &mut dyn RemoteUiSession) -> Result<()> {
        info!("Logging into router...");
        session.open(self.config.router_url()).await?;

        let username = session.find_element(&self.selectors.username_input).await?;
        let password = session.find_element(&self.selectors.password_input).await?;
        session.set_value(&username, self.config.username()).await?;
        session.set_value(&password, self.config.password()).await?;

        let login = session.find_element(&self.selectors.login_button).await?;
        session.invoke(&login).await?;
        info!("Login successful");
        Ok(())
    }

    async fn navigate_lan(&self, session: &mut dyn RemoteUiSession) -> Result<()> {
        info!("Opening LAN setting page...");
        let link = session.find_element(&self.selectors.lan_ipv4_link).await?;
        session.invoke(&link).await?;
        info!("LAN setting page opened successfully");
        Ok(())
    }

    async fn update_ipv4(&self, session: &mut dyn RemoteUiSession) -> Result<()> {
        info!("Changing IPv4 DNS settings...");
        let dns = self.config.dns();
        self.apply_manual_dns(
            session,
            (&self.selectors.ipv4_primary_input, dns.ipv4_primary),
            (&self.selectors.ipv4_secondary_input, dns.ipv4_secondary),
            &self.selectors.ipv4_save_button,
        )
        .await?;
        info!("IPv4 DNS settings changed successfully");
        Ok(())
    }

    async fn update_ipv6(&self, session: &mut dyn RemoteUiSession) -> Result<()> {
        info!("Changing IPv6 DNS settings...");
        let link = session.find_element(&self.selectors.lan_ipv6_link).await?;
        session.invoke(&link).await?;

        let dns = self.config.dns();
        self.apply_manual_dns(
            session,
            (&self.selectors.ipv6_primary_input, dns.ipv6_primary),
            (&self.selectors.ipv6_secondary_input, dns.ipv6_secondary),
            &self.selectors.ipv6_save_button,
        )
        .await?;
        info!("IPv6 DNS settings changed successfully");
        Ok(())
    }

    async fn terminate(&self, session: &mut dyn RemoteUiSession) -> Result<()> {
        info!("Logging out...");
        let url = self.selectors.logout_url(self.config.router_url());
        session.open(&url).await?;
        info!("Logout successful");
        Ok(())
    }

    /// Switch the current page to manual DNS, fill both servers and save
    async fn apply_manual_dns(
        &self,
        session: &mut dyn RemoteUiSession,
        primary: (&Selector, IpAddr),
        secondary: (&Selector, IpAddr),
        save: &Selector,
    ) -> Result<()> {
        let mode = session.find_element(&self.selectors.dns_mode_select).await?;
        session
            .select_option(&mode, &self.selectors.manual_dns_value)
            .await?;

        let primary_input = session.find_element(primary.0).await?;
        let secondary_input = session.find_element(secondary.0).await?;
        session
            .set_value(&primary_input, &primary.1.to_string())
            .await?;
        session
            .set_value(&secondary_input, &secondary.1.to_string())
            .await?;

        let save_button = session.find_element(save).await?;
        session.invoke(&save_button).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_stage_maps_back_to_itself() {
        for stage in Stage::ALL {
            assert_eq!(stage.failure_kind().stage(), Some(stage));
        }
        assert_eq!(FailureKind::UnclassifiedFault.stage(), None);
        assert_eq!(FailureKind::SessionAcquisitionFailed.stage(), None);
    }

    #[test]
    fn only_terminate_is_non_critical() {
        let non_critical: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(|stage| !stage.is_critical())
            .collect();
        assert_eq!(non_critical, vec![Stage::Terminate]);
    }

    #[test]
    fn failure_result_reports_kind() {
        let result = CycleResult::failure(FailureKind::Ipv4UpdateFailed, "save button missing");

        assert!(!result.is_success());
        assert_eq!(result.failure_kind(), Some(FailureKind::Ipv4UpdateFailed));
        assert_eq!(FailureKind::Ipv4UpdateFailed.to_string(), "Ipv4UpdateFailed");
    }
}
