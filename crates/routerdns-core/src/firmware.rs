//! Router firmware selector table
//!
//! Field identifiers of the management UI. They are a contract with the
//! router firmware, not something the updater can discover, so they are
//! kept together in one table.

use crate::session::Selector;

/// Element selectors and fixed values for one router firmware family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareSelectors {
    /// Login page user name input
    pub username_input: Selector,
    /// Login page password input
    pub password_input: Selector,
    /// Login submit control
    pub login_button: Selector,
    /// Menu anchor opening the LAN IPv4 configuration page
    pub lan_ipv4_link: Selector,
    /// DNS server mode `<select>` (same id on both LAN pages)
    pub dns_mode_select: Selector,
    /// Option value meaning "use manually entered DNS servers"
    pub manual_dns_value: String,
    /// IPv4 primary DNS input
    pub ipv4_primary_input: Selector,
    /// IPv4 secondary DNS input
    pub ipv4_secondary_input: Selector,
    /// IPv4 page save control
    pub ipv4_save_button: Selector,
    /// Link opening the LAN IPv6 configuration page
    pub lan_ipv6_link: Selector,
    /// IPv6 primary DNS input
    pub ipv6_primary_input: Selector,
    /// IPv6 secondary DNS input
    pub ipv6_secondary_input: Selector,
    /// IPv6 page save control
    pub ipv6_save_button: Selector,
    /// Path appended to the router URL to leave the authenticated area
    pub logout_path: String,
}

impl FirmwareSelectors {
    /// JioFiber home gateway firmware
    pub fn jiofiber() -> Self {
        Self {
            username_input: Selector::xpath(r#"//input[@name="users.username"]"#),
            password_input: Selector::xpath(r#"//input[@name="users.password"]"#),
            login_button: Selector::xpath(r#"//button[@class="loginBtn"]"#),
            lan_ipv4_link: Selector::xpath(r#"//a[@id="tf1_network_lanIPv4Config"]"#),
            dns_mode_select: Selector::xpath(r#"//select[@id="tf1_DnsSvrs"]"#),
            manual_dns_value: "3".to_string(),
            ipv4_primary_input: Selector::xpath(r#"//input[@id="tf1_priDnsServer"]"#),
            ipv4_secondary_input: Selector::xpath(r#"//input[@id="tf1_secDnsServer"]"#),
            ipv4_save_button: Selector::xpath(
                r#"//input[@name="button.config.lanIPv4Config.lanIPv4Config.-1"]"#,
            ),
            lan_ipv6_link: Selector::xpath(r#"//a[contains(text(), "LAN IPv6 Configuration")]"#),
            ipv6_primary_input: Selector::xpath(r#"//input[@id="tf1_ipv6_PriDnsServer"]"#),
            ipv6_secondary_input: Selector::xpath(r#"//input[@id="tf1_ipv6_SecDnsServer"]"#),
            ipv6_save_button: Selector::xpath(
                r#"//input[@name="button.ipv6Config.lanIPv6Config.lanIPv6Config"]"#,
            ),
            logout_path: "/platform.cgi?page=index.html".to_string(),
        }
    }

    /// Logout URL for a router base URL
    pub fn logout_url(&self, router_url: &str) -> String {
        format!("{}{}", router_url.trim_end_matches('/'), self.logout_path)
    }
}

impl Default for FirmwareSelectors {
    fn default() -> Self {
        Self::jiofiber()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logout_url_appends_path_once() {
        let selectors = FirmwareSelectors::jiofiber();

        assert_eq!(
            selectors.logout_url("http://192.168.29.1"),
            "http://192.168.29.1/platform.cgi?page=index.html"
        );
        assert_eq!(
            selectors.logout_url("http://192.168.29.1/"),
            "http://192.168.29.1/platform.cgi?page=index.html"
        );
    }

    #[test]
    fn manual_mode_is_option_three() {
        assert_eq!(FirmwareSelectors::default().manual_dns_value, "3");
    }
}
