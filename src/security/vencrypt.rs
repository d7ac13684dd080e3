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

//! VeNCrypt (RFB security type 19) sub-protocol negotiation: a version
//! exchange, a TLS sub-type advertisement, and a handoff from the raw
//! TCP socket to a `rustls` server session.
//!
//! Entirely new relative to the teacher, which only ever implements
//! [`SECURITY_TYPE_NONE`](crate::protocol::SECURITY_TYPE_NONE) and
//! [`SECURITY_TYPE_VNC_AUTH`](crate::protocol::SECURITY_TYPE_VNC_AUTH).
//! Operates on the raw `TcpStream` rather than `dyn Transport`, because
//! completing the handshake needs ownership of the concrete stream type
//! to build a `tokio_rustls::server::TlsStream`; the caller hands the
//! result to [`TlsTransport`] once this returns.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use crate::error::{Result, VncError};
use crate::transport::TlsTransport;

/// The sub-types this server advertises, in order, and the `rustls`
/// session they all resolve to. `TLSNone` vs `X509None` is purely a
/// matter of which certificate `server_config` was built with — this
/// server doesn't distinguish self-signed from CA-signed at the TLS
/// layer, only in which id it advertises.
#[derive(Clone)]
pub struct VencryptConfig {
    acceptor: TlsAcceptor,
    subtypes: Vec<u32>,
}

impl VencryptConfig {
    /// Builds a config that accepts TLS sessions with `server_config`
    /// and advertises `subtypes` (e.g. `[VENCRYPT_TLS_NONE]` for a
    /// self-signed certificate, or `[VENCRYPT_X509_NONE]` when an
    /// operator-supplied chain was loaded).
    #[must_use]
    pub fn new(server_config: Arc<rustls::ServerConfig>, subtypes: Vec<u32>) -> Self {
        Self { acceptor: TlsAcceptor::from(server_config), subtypes }
    }
}

/// Runs the VeNCrypt negotiation over `stream` and, on success, completes
/// the TLS handshake and returns the resulting transport. For this
/// security type every accepted negotiation ends in a TLS tunnel; there
/// is no plaintext fallback.
///
/// # Errors
///
/// Returns `Err(VncError::Security)` if the client's version is
/// unsupported, it picks a sub-type this server didn't advertise, or the
/// TLS handshake itself fails.
pub async fn negotiate(mut stream: TcpStream, config: &VencryptConfig) -> Result<(TlsTransport, u32)> {
    // Server version: major 0, minor 2 (the highest this server speaks).
    stream.write_all(&[0, 2]).await?;

    let mut client_version = [0u8; 2];
    stream.read_exact(&mut client_version).await?;
    let (major, minor) = (client_version[0], client_version[1]);
    if major != 0 || minor == 0 || minor > 2 {
        stream.write_all(&[0]).await.ok();
        return Err(VncError::Security(format!("unsupported VeNCrypt version {major}.{minor}")));
    }

    // Sub-type advertisement: a u8 count followed by that many ids,
    // `u8` each in 0.1 and `u32` big-endian each in 0.2.
    let count = u8::try_from(config.subtypes.len()).map_err(|_| VncError::Security("too many VeNCrypt sub-types configured".into()))?;
    stream.write_all(&[count]).await?;
    for &subtype in &config.subtypes {
        if minor == 1 {
            let id = u8::try_from(subtype).map_err(|_| VncError::Security(format!("sub-type {subtype} has no 0.1 (u8) representation")))?;
            stream.write_all(&[id]).await?;
        } else {
            stream.write_all(&subtype.to_be_bytes()).await?;
        }
    }

    let chosen = if minor == 1 {
        let mut b = [0u8; 1];
        stream.read_exact(&mut b).await?;
        u32::from(b[0])
    } else {
        let mut b = [0u8; 4];
        stream.read_exact(&mut b).await?;
        u32::from_be_bytes(b)
    };

    if !config.subtypes.contains(&chosen) {
        stream.write_all(&[0]).await.ok();
        return Err(VncError::Security(format!("client chose unadvertised VeNCrypt sub-type {chosen}")));
    }
    stream.write_all(&[1]).await?;

    let tls_stream = config
        .acceptor
        .accept(stream)
        .await
        .map_err(|e| VncError::Security(format!("VeNCrypt TLS handshake failed: {e}")))?;
    Ok((TlsTransport::new(tls_stream), chosen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VENCRYPT_TLS_NONE;
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use tokio::net::TcpListener;

    /// A minimal self-signed cert/key pair good enough to complete a
    /// handshake in tests; real deployments load an operator-supplied
    /// PEM pair (see `security::mod` for the loader).
    fn test_server_config() -> Arc<rustls::ServerConfig> {
        let rcgen::CertifiedKey { cert, signing_key } = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let cert_der = CertificateDer::from(cert.der().to_vec());
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(signing_key.serialize_der()));
        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der], key_der)
            .unwrap();
        Arc::new(config)
    }

    #[tokio::test]
    async fn rejects_an_unsupported_major_version() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = VencryptConfig::new(test_server_config(), vec![VENCRYPT_TLS_NONE]);

        let client = tokio::spawn(async move {
            let mut sock = TcpStream::connect(addr).await.unwrap();
            let mut server_version = [0u8; 2];
            sock.read_exact(&mut server_version).await.unwrap();
            sock.write_all(&[1, 0]).await.unwrap(); // major 1: unsupported
            let mut ack = [0u8; 1];
            sock.read_exact(&mut ack).await.unwrap();
            ack[0]
        });

        let (sock, _) = listener.accept().await.unwrap();
        let result = negotiate(sock, &config).await;
        assert!(result.is_err());
        assert_eq!(client.await.unwrap(), 0);
    }
}
