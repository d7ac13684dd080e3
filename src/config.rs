// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON configuration for the `--config <path>` CLI option, grounded on
//! `original_source/src/common/ltsm_json_wrapper.cpp` (a JSON config/IPC
//! layer) and spec §6 "Security parameters" / "Persisted state".

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, VncError};

/// Top-level configuration loaded from the file named by `--config`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind the RFB listener to.
    pub listen_addr: IpAddr,
    /// Port to bind the RFB listener to.
    pub listen_port: u16,
    /// Security sub-protocol settings.
    pub security: SecurityConfig,
    /// Framebuffer dimensions to advertise before any resize.
    pub desktop_width: u16,
    /// Framebuffer dimensions to advertise before any resize.
    pub desktop_height: u16,
    /// Idle timeout, in seconds, before a session-idle signal fires.
    /// `0` disables idle tracking.
    pub idle_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: IpAddr::from([0, 0, 0, 0]),
            listen_port: crate::DEFAULT_PORT,
            security: SecurityConfig::default(),
            desktop_width: 1920,
            desktop_height: 1080,
            idle_timeout_secs: 0,
        }
    }
}

/// Which auth sub-protocols are enabled and their prerequisites, mirroring
/// spec §3's "Security parameters" record.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Allow `SECURITY_TYPE_NONE` (no authentication).
    pub allow_none: bool,
    /// Allow `SECURITY_TYPE_VNC_AUTH`, checking against `passwd_file`.
    pub allow_vnc_auth: bool,
    /// Newline-separated list of accepted VNC passwords.
    pub passwd_file: Option<PathBuf>,
    /// Allow `SECURITY_TYPE_VENCRYPT` with an anonymous/self-signed cert.
    pub allow_vencrypt_tls_none: bool,
    /// Allow `SECURITY_TYPE_VENCRYPT` with an operator-supplied X.509 cert.
    pub allow_vencrypt_x509_none: bool,
    /// PEM certificate chain for VeNCrypt TLS sub-types.
    pub tls_cert: Option<PathBuf>,
    /// PEM private key for VeNCrypt TLS sub-types.
    pub tls_key: Option<PathBuf>,
    /// Allow `SECURITY_TYPE_KERBEROS` (requires the `gssapi` feature).
    pub allow_kerberos: bool,
    /// Kerberos service principal name, e.g. `TERMSRV`.
    pub kerberos_service: String,
    /// Path to the Kerberos keytab.
    pub kerberos_keytab: Option<PathBuf>,
    /// Optional `KRB5_TRACE` destination.
    pub kerberos_trace: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allow_none: false,
            allow_vnc_auth: true,
            passwd_file: None,
            allow_vencrypt_tls_none: false,
            allow_vencrypt_x509_none: false,
            tls_cert: None,
            tls_key: None,
            allow_kerberos: false,
            kerberos_service: "TERMSRV".to_string(),
            kerberos_keytab: None,
            kerberos_trace: None,
        }
    }
}

impl Config {
    /// Loads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Err(VncError::InvalidOperation)` if the file cannot be
    /// read or does not parse as valid JSON matching this shape.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| VncError::InvalidOperation(format!("reading config {}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| VncError::InvalidOperation(format!("parsing config {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_fallbacks() {
        let config = Config::default();
        assert_eq!(config.listen_port, crate::DEFAULT_PORT);
        assert!(config.security.allow_vnc_auth);
        assert!(!config.security.allow_none);
    }

    #[test]
    fn loads_a_minimal_config_file_overriding_only_named_fields() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("rustvnc-ltsm-test-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"listen_port": 5901, "security": {"allow_none": true}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.listen_port, 5901);
        assert!(config.security.allow_none);
        assert_eq!(config.desktop_width, 1920, "unspecified fields keep their default");
    }

    #[test]
    fn missing_file_is_a_clean_error() {
        let err = Config::load(Path::new("/nonexistent/rustvnc-ltsm.json")).unwrap_err();
        assert!(matches!(err, VncError::InvalidOperation(_)));
    }
}
