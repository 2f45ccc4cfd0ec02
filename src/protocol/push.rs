//! `git-receive-pack` driver: builds the ref-update command line plus raw
//! packfile body, and parses the `report-status-v2` response
//! (`"ok {ref}"` / `"ng {ref} {reason}"` status lines), plus the
//! capability-probe helpers `can_read`/`can_write`.

use std::io::Read;

use bytes::BytesMut;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::pack::entry::Entry;
use crate::internal::pack::writer::write_pack;

use super::capability::client_push_capabilities;
use super::pktline::{Frame, SideBandFrame, demux_side_band, read_all_frames, write_flush};
use super::transport::Transport;
use super::types::ServiceType;

fn agent_string() -> &'static str {
    concat!("git-smart-core/", env!("CARGO_PKG_VERSION"))
}

/// A single ref update to push: `old_hash` is `Hash::zero()` for a create,
/// `new_hash` is `Hash::zero()` for a delete.
#[derive(Debug, Clone)]
pub struct RefUpdate {
    pub old_hash: Hash,
    pub new_hash: Hash,
    pub ref_name: String,
}

impl RefUpdate {
    fn command_line(&self, capabilities: &str) -> String {
        format!(
            "{} {} {}\0{}\n",
            self.old_hash, self.new_hash, self.ref_name, capabilities
        )
    }
}

/// Builds the full `git-receive-pack` request body: command line, flush,
/// raw (non-pkt-line) packfile bytes, final flush.
fn build_push_body(updates: &[RefUpdate], entries: &[Entry]) -> Result<Vec<u8>, GitError> {
    if updates.is_empty() {
        return Err(GitError::NothingToPush);
    }
    let capabilities: Vec<String> = client_push_capabilities(agent_string())
        .iter()
        .map(|c| c.to_string())
        .collect();
    let capability_line = capabilities.join(" ");

    let mut body = BytesMut::new();
    for (i, update) in updates.iter().enumerate() {
        let line = if i == 0 {
            update.command_line(&capability_line)
        } else {
            format!("{} {} {}\n", update.old_hash, update.new_hash, update.ref_name)
        };
        super::pktline::write_str(&mut body, &line);
    }
    write_flush(&mut body);

    let pack = write_pack(entries)?;
    let mut out = body.to_vec();
    out.extend(pack);
    Ok(out)
}

/// The outcome of a `git-receive-pack` `report-status-v2` response: whether
/// the unpack step itself succeeded, and the per-ref status lines.
#[derive(Debug)]
pub struct PushReport {
    pub unpack_ok: bool,
    pub ref_statuses: Vec<(String, Result<(), String>)>,
}

/// Performs a `git-receive-pack` push: handshake-free (the caller already
/// ran `CanWrite`/ref discovery), sends the command+pack body, and parses
/// the status report.
pub fn push(
    transport: &dyn Transport,
    base_url: &str,
    updates: &[RefUpdate],
    entries: &[Entry],
) -> Result<PushReport, GitError> {
    let body = build_push_body(updates, entries)?;
    let mut response_body = Vec::new();
    transport
        .command(base_url, ServiceType::ReceivePack, body)?
        .read_to_end(&mut response_body)?;
    let frames = read_all_frames(response_body.into())?;
    parse_report_lines(frames)
}

/// Parses `report-status-v2`'s body: one `unpack` line, then one
/// `ok`/`ng` line per ref command, each optionally side-band-wrapped.
fn parse_report_lines(frames: Vec<Frame>) -> Result<PushReport, GitError> {
    let mut text_lines: Vec<String> = Vec::new();
    for frame in frames {
        let payload = match frame {
            Frame::Payload(p) => p,
            Frame::Flush | Frame::Delim | Frame::ResponseEnd => continue,
        };
        let data = match demux_side_band(payload.clone()) {
            Ok(SideBandFrame::PackData(data)) | Ok(SideBandFrame::Progress(data)) => data,
            Ok(SideBandFrame::Error(msg)) => {
                return Err(GitError::FatalFetchError(
                    String::from_utf8_lossy(&msg).into_owned(),
                ));
            }
            Err(_) => payload,
        };
        for line in data.split(|&b| b == b'\n') {
            if line.is_empty() {
                continue;
            }
            text_lines.push(String::from_utf8_lossy(line).into_owned());
        }
    }

    let mut iter = text_lines.into_iter();
    let unpack_line = iter
        .next()
        .ok_or_else(|| GitError::InvalidFetchStatus("empty report-status response".to_string()))?;
    let unpack_ok = if let Some(stripped) = unpack_line.strip_prefix("unpack ") {
        if stripped == "ok" {
            true
        } else {
            return Err(GitError::GitUnpackError(stripped.to_string()));
        }
    } else {
        return Err(GitError::InvalidFetchStatus(format!(
            "expected an `unpack` line, got `{unpack_line}`"
        )));
    };

    let mut ref_statuses = Vec::new();
    for line in iter {
        if let Some(rest) = line.strip_prefix("ok ") {
            ref_statuses.push((rest.to_string(), Ok(())));
        } else if let Some(rest) = line.strip_prefix("ng ") {
            let (ref_name, reason) = rest.split_once(' ').unwrap_or((rest, "unknown error"));
            ref_statuses.push((ref_name.to_string(), Err(reason.to_string())));
        }
    }

    Ok(PushReport {
        unpack_ok,
        ref_statuses,
    })
}

/// `CanRead()`: `true` on HTTP 200 from the upload-pack advertisement
/// endpoint; `false` (no error) on 401/403/404; a transport/5xx error
/// propagates.
pub fn can_read(transport: &dyn Transport, base_url: &str) -> Result<bool, GitError> {
    probe(transport, base_url, ServiceType::UploadPack)
}

/// `CanWrite()`: same probe against the receive-pack endpoint.
pub fn can_write(transport: &dyn Transport, base_url: &str) -> Result<bool, GitError> {
    probe(transport, base_url, ServiceType::ReceivePack)
}

fn probe(transport: &dyn Transport, base_url: &str, service: ServiceType) -> Result<bool, GitError> {
    match transport.discover(base_url, service) {
        Ok(_) => Ok(true),
        Err(e) if e.is_server_error() => match e {
            GitError::ServerUnavailable { .. } => Err(e),
            _ => Ok(false),
        },
        Err(e) => Err(e),
    }
}
