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

//! CLI front-end wiring a [`VncServer`] to `--config`/`--type`, grounded on
//! `original_source`'s connector entry point and this crate's own
//! `config::Config` shape. `--type auto` peeks the first byte of each
//! accepted connection (`0x03` is an RDP `TPKT` header, `0x52` is SPICE's
//! `'R'ed` magic) to decide which protocol engine to hand the connection
//! to; only the VNC/RFB path is implemented; RDP and SPICE are
//! recognized but rejected with a clear "not implemented" error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use rustvnc_ltsm::{Config, VncError, VncServer};
use tokio::net::{TcpListener, TcpStream};

/// Which wire protocol to expect on accepted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProtocolMode {
    /// Sniff the first byte of each connection and dispatch accordingly.
    Auto,
    /// Assume every connection speaks RFB/VNC (skip the sniff).
    Vnc,
    /// Assume every connection speaks RDP. Recognized but not implemented.
    Rdp,
    /// Assume every connection speaks SPICE. Recognized but not implemented.
    Spice,
}

/// Multi-protocol remote-desktop connector: RFB/VNC server with an LTSM
/// side-channel multiplexer.
#[derive(Debug, Parser)]
#[command(name = "connector", version, about)]
struct Args {
    /// Path to a JSON configuration file (see `config::Config`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which protocol(s) to accept on the listening port.
    #[arg(long, value_enum, default_value_t = ProtocolMode::Auto)]
    r#type: ProtocolMode,

    /// Overrides the configured/default listen port.
    #[arg(long)]
    port: Option<u16>,

    /// Sets a single VNC password, overriding any configured password file.
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                error!("loading config {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };
    let port = args.port.unwrap_or(config.listen_port);

    let server = match VncServer::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            error!("building server from config: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(password) = args.password {
        server.set_password(Some(password)).await;
    }

    let result = match args.r#type {
        ProtocolMode::Vnc => server.listen(port).await,
        ProtocolMode::Auto => serve_sniffed(&server, port).await,
        ProtocolMode::Rdp => not_implemented("RDP"),
        ProtocolMode::Spice => not_implemented("SPICE"),
    };

    if let Err(e) = result {
        error!("server exited: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Fails immediately for a `--type` that names a protocol engine this
/// crate doesn't implement, rather than accepting connections it can
/// never actually serve.
fn not_implemented(protocol: &str) -> rustvnc_ltsm::Result<()> {
    Err(VncError::InvalidOperation(format!("{protocol} is not yet implemented")))
}

/// RDP's `TPKT` framing starts every PDU with version byte `0x03`.
const RDP_SNIFF_BYTE: u8 = 0x03;
/// SPICE's wire header starts with the ASCII magic `"RED"`'s first byte.
const SPICE_SNIFF_BYTE: u8 = 0x52;

/// Accepts connections on `port`, peeks the first byte of each one, and
/// dispatches VNC connections into `server` while logging a clear
/// "not implemented" error for anything that sniffs as RDP or SPICE.
async fn serve_sniffed(server: &VncServer, port: u16) -> rustvnc_ltsm::Result<()> {
    let listen_addr = server.listen_addr();
    let listener = TcpListener::bind((listen_addr, port)).await?;
    info!("listening on {listen_addr}:{port} (auto protocol sniff)");

    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("accept failed: {e}");
                continue;
            }
        };

        match peek_first_byte(&stream).await {
            Ok(RDP_SNIFF_BYTE) => {
                warn!("{addr}: sniffed an RDP connection; RDP is not yet implemented, dropping");
            }
            Ok(SPICE_SNIFF_BYTE) => {
                warn!("{addr}: sniffed a SPICE connection; SPICE is not yet implemented, dropping");
            }
            Ok(_) => server.spawn_accepted(stream, addr).await,
            Err(e) => warn!("{addr}: failed to sniff protocol: {e}"),
        }
    }
}

async fn peek_first_byte(stream: &TcpStream) -> std::io::Result<u8> {
    let mut buf = [0u8; 1];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n > 0 {
            return Ok(buf[0]);
        }
    }
}
