// src/protocol/stratum.rs

//! Stratum (CryptoNote flavour) codec
//!
//! Line-delimited JSON-RPC: `login` returns the session id and the first
//! job, the pool pushes further work with `job` notifications, shares go
//! out with `submit`. The codec is I/O-free; it turns inbound bytes into
//! [`PoolMessage`]s and builds the outbound lines.
use crate::miner::job::{MAX_BLOB_LEN, expand_compact_target};
use crate::utils::error::MinerError;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Longest line accepted before the buffer is discarded
const MAX_LINE_LEN: usize = 64 * 1024;

/// Work announced by the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolJob {
    /// Pool job identifier
    pub job_id: String,
    /// Hashing blob
    pub blob: Vec<u8>,
    /// 64-bit target
    pub target: u64,
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolMessage {
    /// Login accepted; a session id is now known
    LoginAccepted,
    /// Login refused
    LoginRejected(String),
    /// New work
    Job(PoolJob),
    /// A submitted share was accepted
    ShareAccepted,
    /// A submitted share was rejected
    ShareRejected(String),
}

/// Raw job object as sent by pools
#[derive(Debug, Deserialize)]
struct RawJob {
    job_id: String,
    blob: String,
    target: String,
}

/// Outstanding request kinds, keyed by JSON-RPC id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Login,
    Submit,
}

/// Per-connection stratum state
pub struct StratumSession {
    user: String,
    password: String,
    agent: String,
    session_id: Option<String>,
    next_id: u64,
    pending: HashMap<u64, Request>,
    buffer: Vec<u8>,
}

impl StratumSession {
    /// Creates a session for the given credentials
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        StratumSession {
            user: user.into(),
            password: password.into(),
            agent: format!("cn_miner-rs/{}", env!("CARGO_PKG_VERSION")),
            session_id: None,
            next_id: 1,
            pending: HashMap::new(),
            buffer: Vec::new(),
        }
    }

    /// Forgets everything tied to the previous connection
    pub fn reset(&mut self) {
        self.session_id = None;
        self.pending.clear();
        self.buffer.clear();
    }

    /// True once the pool accepted the login
    pub fn is_logged_in(&self) -> bool {
        self.session_id.is_some()
    }

    /// Builds the `login` request
    pub fn login_request(&mut self) -> Vec<u8> {
        let id = self.request_id(Request::Login);
        line(json!({
            "id": id,
            "jsonrpc": "2.0",
            "method": "login",
            "params": {
                "login": self.user,
                "pass": self.password,
                "agent": self.agent
            }
        }))
    }

    /// Builds a `submit` request, or `None` before login
    pub fn submit_request(&mut self, job_id: &str, nonce: u32, hash: &[u8; 32]) -> Option<Vec<u8>> {
        let session = self.session_id.clone()?;
        let id = self.request_id(Request::Submit);
        Some(line(json!({
            "id": id,
            "jsonrpc": "2.0",
            "method": "submit",
            "params": {
                "id": session,
                "job_id": job_id,
                "nonce": hex::encode(nonce.to_le_bytes()),
                "result": hex::encode(hash)
            }
        })))
    }

    /// Builds a `keepalived` request, or `None` before login
    pub fn keepalive_request(&mut self) -> Option<Vec<u8>> {
        let session = self.session_id.clone()?;
        let id = self.next_id;
        self.next_id += 1;
        Some(line(json!({
            "id": id,
            "jsonrpc": "2.0",
            "method": "keepalived",
            "params": { "id": session }
        })))
    }

    /// Consumes inbound bytes and returns every complete message
    ///
    /// Malformed lines are logged and skipped.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<PoolMessage> {
        self.buffer.extend_from_slice(bytes);
        let mut messages = Vec::new();

        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(&raw);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match self.handle_line(text) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => {}
                Err(e) => warn!("Ignoring pool message: {}", e),
            }
        }

        if self.buffer.len() > MAX_LINE_LEN {
            warn!("Discarding {} bytes without a line break", self.buffer.len());
            self.buffer.clear();
        }
        messages
    }

    fn request_id(&mut self, kind: Request) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, kind);
        id
    }

    fn handle_line(&mut self, text: &str) -> Result<Option<PoolMessage>, MinerError> {
        let json: Value = serde_json::from_str(text)?;

        if let Some(method) = json.get("method").and_then(|m| m.as_str()) {
            return match method {
                "job" => Ok(Some(PoolMessage::Job(decode_job(&json["params"])?))),
                _ => {
                    debug!("Unhandled pool method: {}", method);
                    Ok(None)
                }
            };
        }

        let id = json.get("id").and_then(|v| v.as_u64());
        let kind = id.and_then(|id| self.pending.remove(&id));
        let error = json
            .get("error")
            .filter(|e| !e.is_null())
            .map(error_message);

        match (kind, error) {
            (Some(Request::Login), Some(reason)) => Ok(Some(PoolMessage::LoginRejected(reason))),
            (Some(Request::Login), None) => {
                let result = &json["result"];
                let session = result["id"]
                    .as_str()
                    .ok_or_else(|| MinerError::ProtocolError("Login result without id".into()))?;
                self.session_id = Some(session.to_string());
                match result.get("job").filter(|j| !j.is_null()) {
                    // The first job travels with the login result
                    Some(job) => {
                        let job = decode_job(job)?;
                        Ok(Some(PoolMessage::Job(job)))
                    }
                    None => Ok(Some(PoolMessage::LoginAccepted)),
                }
            }
            (Some(Request::Submit), Some(reason)) => Ok(Some(PoolMessage::ShareRejected(reason))),
            (Some(Request::Submit), None) => Ok(Some(PoolMessage::ShareAccepted)),
            (None, Some(reason)) => Err(MinerError::ProtocolError(reason)),
            (None, None) => Ok(None),
        }
    }
}

/// Decodes a job object (`job_id`, `blob`, `target`)
///
/// # Errors
/// `ProtocolError` for missing fields or a target of the wrong width,
/// `InputError` for bad hex or an oversized blob.
pub fn decode_job(params: &Value) -> Result<PoolJob, MinerError> {
    let raw = RawJob::deserialize(params)
        .map_err(|e| MinerError::ProtocolError(format!("Malformed job: {}", e)))?;

    let blob = hex::decode(&raw.blob)?;
    if blob.len() > MAX_BLOB_LEN {
        return Err(MinerError::InputError(format!(
            "Job {} blob is {} bytes",
            raw.job_id,
            blob.len()
        )));
    }

    Ok(PoolJob {
        job_id: raw.job_id,
        blob,
        target: decode_target(&raw.target)?,
    })
}

/// Decodes a little-endian hex target: 4 bytes (compact) or 8 bytes
pub fn decode_target(hex_target: &str) -> Result<u64, MinerError> {
    let bytes = hex::decode(hex_target)?;
    match bytes.len() {
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes);
            Ok(expand_compact_target(u32::from_le_bytes(raw)))
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes);
            Ok(u64::from_le_bytes(raw))
        }
        n => Err(MinerError::ProtocolError(format!(
            "Unsupported target width: {} bytes",
            n
        ))),
    }
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn line(value: Value) -> Vec<u8> {
    let mut bytes = value.to_string().into_bytes();
    bytes.push(b'\n');
    bytes
}
