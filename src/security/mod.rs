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

//! Security sub-protocols: VNC challenge/response, VeNCrypt TLS, and the
//! (feature-gated) Kerberos/GSSAPI path. Grounded on
//! `original_source/src/connector/ltsm_connector_proto.cpp`'s security
//! negotiation block and spec §4.H/§3 "Security parameters".

pub mod gssapi;
pub mod vencrypt;
pub mod vnc_auth;

pub use gssapi::{GssapiConfig, GssToken, StepOutcome};
pub use vencrypt::VencryptConfig;
pub use vnc_auth::VncAuth;

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{Result, VncError};

/// Loads a PEM certificate chain and private key from disk and builds a
/// `rustls::ServerConfig` with no client certificate verification,
/// matching the original's anonymous/X.509-without-mutual-auth
/// `TLSNone`/`X509None` sub-types.
///
/// # Errors
///
/// Returns `Err(VncError::Security)` if the files cannot be read or
/// parsed, or if `rustls` rejects the resulting chain/key pair.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<rustls::ServerConfig>> {
    let cert_file = std::fs::File::open(cert_path).map_err(|e| VncError::Security(format!("reading {}: {e}", cert_path.display())))?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| VncError::Security(format!("parsing {}: {e}", cert_path.display())))?;
    if certs.is_empty() {
        return Err(VncError::Security(format!("{} contains no certificates", cert_path.display())));
    }

    let key_file = std::fs::File::open(key_path).map_err(|e| VncError::Security(format!("reading {}: {e}", key_path.display())))?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .map_err(|e| VncError::Security(format!("parsing {}: {e}", key_path.display())))?
        .ok_or_else(|| VncError::Security(format!("{} contains no private key", key_path.display())))?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| VncError::Security(format!("building TLS server config: {e}")))?;
    Ok(Arc::new(config))
}
