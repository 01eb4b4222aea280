// crates/preservation-storage/tests/common/mod.rs
// ============================================================================
// Module: Common Storage Test Fixtures
// Description: Scripted archival storage server and client builders.
// Purpose: Capture requests sent by the client and answer with fixed replies.
// Dependencies: preservation-storage, reqwest, tiny_http
// ============================================================================

//! ## Overview
//! A `tiny_http` server answers a fixed list of replies in order and forwards
//! every received request to the test through a channel.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc;
use std::thread;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use preservation_storage::ArchivalStorageClient;
use preservation_storage::BasicCredentials;
use preservation_storage::StorageClientConfig;
use reqwest::Url;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Request as received by the scripted server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Running scripted server.
pub struct ScriptedServer {
    pub base_url: String,
    pub requests: mpsc::Receiver<CapturedRequest>,
    pub handle: thread::JoinHandle<()>,
}

impl ScriptedServer {
    /// Waits for the server thread and returns every captured request.
    pub fn finish(self) -> Vec<CapturedRequest> {
        self.handle.join().unwrap();
        self.requests.try_iter().collect()
    }
}

/// Starts a server answering `replies` in order, one per request.
pub fn serve(replies: Vec<(u16, &'static str)>) -> ScriptedServer {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, requests) = mpsc::channel();
    let handle = thread::spawn(move || {
        for (status, body) in replies {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let mut text = String::new();
            request.as_reader().read_to_string(&mut text).unwrap();
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            sender
                .send(CapturedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization,
                    body: text,
                })
                .unwrap();
            request.respond(Response::from_string(body).with_status_code(status)).unwrap();
        }
    });
    ScriptedServer {
        base_url: format!("http://{addr}/archive/"),
        requests,
        handle,
    }
}

pub fn client(base_url: &str) -> ArchivalStorageClient {
    ArchivalStorageClient::new(StorageClientConfig {
        base_url: Url::parse(base_url).unwrap(),
        read: BasicCredentials::new("reader", "read-secret"),
        read_write: BasicCredentials::new("writer", "write-secret"),
        timeout_ms: 5_000,
    })
    .unwrap()
}

pub fn read_auth() -> String {
    format!("Basic {}", STANDARD.encode("reader:read-secret"))
}

pub fn read_write_auth() -> String {
    format!("Basic {}", STANDARD.encode("writer:write-secret"))
}
