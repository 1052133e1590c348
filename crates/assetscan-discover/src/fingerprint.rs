//! Coarse OS and service fingerprinting from open ports and banners.
//!
//! This is a best-effort classifier. Port-based inference can be wrong (an
//! RDP gateway in front of a Linux box reads as Windows); results are hints
//! for whoever imports the host, not facts.

use assetscan_core::{Detail, HardwareDetails, ScanOptions, SystemInfo};

pub const WINDOWS: &str = "Windows";
pub const LINUX_UNIX: &str = "Linux/Unix";
pub const WINDOWS_SERVER_HINT: &str = "Windows Server 2008 R2 or later";

const RDP: u16 = 3389;
const SSH: u16 = 22;
const HTTP: u16 = 80;
const HTTPS: u16 = 443;
const SNMP: u16 = 161;
const WINRM: [u16; 2] = [5985, 5986];

/// Distro markers looked for in SSH greetings, first match wins.
const SSH_DISTROS: [&str; 3] = ["Ubuntu", "CentOS", "Red Hat"];

/// Web server markers looked for in HTTP banners, first match wins.
const WEB_SERVERS: [&str; 3] = ["IIS", "Apache", "nginx"];

/// Infer OS, version, and web server.
///
/// RDP beats SSH for the OS family. The HTTP banner is read independently
/// and an IIS marker forces the OS to Windows.
pub fn classify(open_ports: &[u16], ssh_banner: Option<&str>, http_banner: Option<&str>) -> SystemInfo {
    let open = |port: u16| open_ports.contains(&port);
    let mut info = SystemInfo::default();

    if open(RDP) {
        info.os = WINDOWS.to_string();
        if WINRM.iter().any(|&p| open(p)) {
            info.version = Some(WINDOWS_SERVER_HINT.to_string());
        }
    } else if open(SSH) {
        info.os = LINUX_UNIX.to_string();
        if let Some(banner) = ssh_banner {
            info.version = SSH_DISTROS
                .iter()
                .find(|distro| banner.contains(*distro))
                .map(|distro| distro.to_string());
        }
    }

    if open(HTTP) || open(HTTPS) {
        if let Some(banner) = http_banner {
            if let Some(server) = WEB_SERVERS.iter().find(|s| banner.contains(*s)) {
                if *server == "IIS" {
                    info.os = WINDOWS.to_string();
                }
                info.web_server = Some(server.to_string());
            }
        }
    }

    info
}

/// Authenticated channel that would be needed to read hardware facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChannel {
    Snmp,
    Wmi,
    Ssh,
}

impl AccessChannel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Snmp => "SNMP",
            Self::Wmi => "WMI",
            Self::Ssh => "SSH",
        }
    }
}

/// SNMP, then WMI (WinRM ports), then SSH.
pub fn management_channel(open_ports: &[u16]) -> Option<AccessChannel> {
    if open_ports.contains(&SNMP) {
        Some(AccessChannel::Snmp)
    } else if WINRM.iter().any(|p| open_ports.contains(p)) {
        Some(AccessChannel::Wmi)
    } else if open_ports.contains(&SSH) {
        Some(AccessChannel::Ssh)
    } else {
        None
    }
}

/// Placeholder for a fact that needs credentials we do not have.
pub fn credentialed<T>(channel: Option<AccessChannel>) -> Detail<T> {
    match channel {
        Some(channel) => Detail::unavailable(format!(
            "Requires authenticated {} access",
            channel.label()
        )),
        None => Detail::unavailable("No management interface detected"),
    }
}

/// Hardware placeholders for the facts `options` asked for.
pub fn hardware_placeholders(open_ports: &[u16], options: &ScanOptions) -> HardwareDetails {
    let channel = management_channel(open_ports);
    let mut details = HardwareDetails::default();

    if options.scan_for_hardware_details {
        details.manufacturer = Some(credentialed(channel));
        details.model = Some(credentialed(channel));
    }
    if options.scan_for_usb {
        details.usb = Some(credentialed(channel));
    }
    if options.scan_for_serial_numbers {
        details.serial_numbers = Some(credentialed(channel));
    }

    details
}

/// Installed-software placeholder, when asked for.
pub fn software_placeholder(open_ports: &[u16], options: &ScanOptions) -> Option<Detail<Vec<String>>> {
    options
        .scan_for_installed_software
        .then(|| credentialed(management_channel(open_ports)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_ports_is_unknown() {
        let info = classify(&[], None, None);
        assert_eq!(info.os, "Unknown");
        assert_eq!(info.architecture, "Unknown");
        assert!(info.version.is_none());
        assert!(info.web_server.is_none());
    }

    #[test]
    fn rdp_means_windows() {
        let info = classify(&[135, 3389], None, None);
        assert_eq!(info.os, WINDOWS);
        assert!(info.version.is_none());

        let info = classify(&[3389, 5985], None, None);
        assert_eq!(info.version.as_deref(), Some(WINDOWS_SERVER_HINT));
    }

    #[test]
    fn rdp_wins_over_ssh() {
        let info = classify(&[22, 3389], Some("SSH-2.0-OpenSSH_8.9p1 Ubuntu"), None);
        assert_eq!(info.os, WINDOWS);
        assert!(info.version.is_none());
    }

    #[test]
    fn ssh_means_linux_with_distro_refinement() {
        let info = classify(&[22], None, None);
        assert_eq!(info.os, LINUX_UNIX);
        assert!(info.version.is_none());

        let info = classify(&[22], Some("SSH-2.0-OpenSSH_8.9p1 Ubuntu-3ubuntu0.6"), None);
        assert_eq!(info.version.as_deref(), Some("Ubuntu"));

        let info = classify(&[22], Some("SSH-2.0-OpenSSH_7.4 CentOS"), None);
        assert_eq!(info.version.as_deref(), Some("CentOS"));
    }

    #[test]
    fn iis_forces_windows() {
        let info = classify(&[22, 80], None, Some("Microsoft-IIS/10.0, ASP.NET"));
        assert_eq!(info.os, WINDOWS);
        assert_eq!(info.web_server.as_deref(), Some("IIS"));
    }

    #[test]
    fn apache_and_nginx_keep_os() {
        let info = classify(&[22, 443], None, Some("Apache/2.4.57 (Debian)"));
        assert_eq!(info.os, LINUX_UNIX);
        assert_eq!(info.web_server.as_deref(), Some("Apache"));

        let info = classify(&[80], None, Some("nginx/1.24.0"));
        assert_eq!(info.os, "Unknown");
        assert_eq!(info.web_server.as_deref(), Some("nginx"));
    }

    #[test]
    fn http_banner_ignored_without_web_ports() {
        let info = classify(&[22], None, Some("Microsoft-IIS/10.0"));
        assert_eq!(info.os, LINUX_UNIX);
        assert!(info.web_server.is_none());
    }

    #[test]
    fn channel_precedence() {
        assert_eq!(management_channel(&[22, 161, 5985]), Some(AccessChannel::Snmp));
        assert_eq!(management_channel(&[22, 5986]), Some(AccessChannel::Wmi));
        assert_eq!(management_channel(&[22]), Some(AccessChannel::Ssh));
        assert_eq!(management_channel(&[80]), None);
    }

    #[test]
    fn placeholders_follow_options() {
        let options = ScanOptions {
            scan_for_usb: true,
            scan_for_serial_numbers: true,
            ..Default::default()
        };
        let details = hardware_placeholders(&[22], &options);
        assert!(details.manufacturer.is_none());
        assert!(details.model.is_none());
        assert_eq!(
            details.usb,
            Some(Detail::unavailable("Requires authenticated SSH access"))
        );
        assert!(details.serial_numbers.is_some());

        assert!(software_placeholder(&[22], &options).is_none());
        let software = software_placeholder(
            &[3389],
            &ScanOptions {
                scan_for_installed_software: true,
                ..Default::default()
            },
        );
        assert_eq!(
            software,
            Some(Detail::unavailable("No management interface detected"))
        );
    }
}
