//! HTTP(S) transport for Smart-HTTP v2: `GET .../info/refs
//! ?service=git-upload-pack` for capability discovery, then `POST
//! .../git-upload-pack` / `POST .../git-receive-pack` with the matching
//! Git content-types.
//!
//! This is a client with no async runtime of its own, so requests are made
//! with `ureq`'s blocking client.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;

use crate::config::ClientConfig;
use crate::errors::GitError;

use super::types::ServiceType;

const UPLOAD_PACK_CONTENT_TYPE: &str = "application/x-git-upload-pack-request";
const RECEIVE_PACK_CONTENT_TYPE: &str = "application/x-git-receive-pack-request";

fn result_content_type(service: ServiceType) -> &'static str {
    match service {
        ServiceType::UploadPack => "application/x-git-upload-pack-result",
        ServiceType::ReceivePack => "application/x-git-receive-pack-result",
    }
}

fn request_content_type(service: ServiceType) -> &'static str {
    match service {
        ServiceType::UploadPack => UPLOAD_PACK_CONTENT_TYPE,
        ServiceType::ReceivePack => RECEIVE_PACK_CONTENT_TYPE,
    }
}

/// A transport capable of speaking the two legs of Smart-HTTP: the
/// capability-advertisement `GET` and the command `POST`. Abstracted behind
/// a trait so tests can substitute an in-memory fixture without a live
/// server.
///
/// `Sync` is a supertrait so a `&dyn Transport` can be shared across the
/// scoped worker threads the blob-fetch batcher spins up (see
/// `clone::batch_fetch_blobs`) without requiring callers to wrap it in an
/// `Arc`.
pub trait Transport: Sync {
    /// `GET {base_url}/info/refs?service={service}`. Returns the raw
    /// pkt-line-framed advertisement body.
    fn discover(&self, base_url: &str, service: ServiceType) -> Result<Bytes, GitError>;

    /// `POST {base_url}/{service}` with `body` as the pkt-line-framed
    /// request. Returns a reader over the response body rather than a
    /// materialised buffer, so a large `fetch` packfile never has to be
    /// fully held in memory before the caller starts decoding it.
    fn command(
        &self,
        base_url: &str,
        service: ServiceType,
        body: Vec<u8>,
    ) -> Result<Box<dyn Read>, GitError>;
}

/// The default blocking `ureq`-backed transport.
pub struct HttpTransport {
    agent: ureq::Agent,
    basic_auth: Option<(String, String)>,
    user_agent: String,
    extra_headers: Vec<(String, String)>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_config(&ClientConfig::default())
    }

    /// Builds a transport honouring `config`'s `basic-auth`/`user-agent`/
    /// `http-headers` knobs.
    pub fn with_config(config: &ClientConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(60)))
            .build();
        Self {
            agent: agent_config.into(),
            basic_auth: config
                .basic_auth
                .as_ref()
                .map(|a| (a.user.clone(), a.pass.clone())),
            user_agent: config.user_agent.clone(),
            extra_headers: config.http_headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    fn apply_common_headers<B>(&self, mut request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request = request.header("User-Agent", &self.user_agent);
        request = request.header("Git-Protocol", "version=2");
        if let Some((user, pass)) = &self.basic_auth {
            let credentials = base64_encode(&format!("{user}:{pass}"));
            request = request.header("Authorization", &format!("Basic {credentials}"));
        }
        for (key, value) in &self.extra_headers {
            request = request.header(key, value);
        }
        request
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal RFC 4648 base64 encoder for the `Authorization: Basic` header;
/// avoids pulling in a dedicated base64 crate for one call site.
fn base64_encode(input: &str) -> String {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let bytes = input.as_bytes();
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied();
        let b2 = chunk.get(2).copied();
        out.push(ALPHABET[(b0 >> 2) as usize] as char);
        out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1.unwrap_or(0) >> 4)) as usize] as char);
        if let Some(b1) = b1 {
            out.push(ALPHABET[(((b1 & 0x0f) << 2) | (b2.unwrap_or(0) >> 6)) as usize] as char);
        } else {
            out.push('=');
        }
        if let Some(b2) = b2 {
            out.push(ALPHABET[(b2 & 0x3f) as usize] as char);
        } else {
            out.push('=');
        }
    }
    out
}

fn map_status_error(status: u16, body: String) -> GitError {
    match status {
        401 => GitError::unauthorized(status, body),
        403 => GitError::permission_denied(status, "request", "", body),
        404 => GitError::repository_not_found(status, body),
        500..=599 => GitError::server_unavailable(status, body),
        _ => GitError::GitServerError {
            kind: status.to_string(),
            message: body,
        },
    }
}

fn read_body(mut reader: impl Read) -> Result<Vec<u8>, GitError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

impl Transport for HttpTransport {
    fn discover(&self, base_url: &str, service: ServiceType) -> Result<Bytes, GitError> {
        let url = format!("{base_url}/info/refs?service={service}");
        let request = self.apply_common_headers(self.agent.get(&url).header("Accept", "*/*"));
        let response = request
            .call()
            .map_err(|e| GitError::server_unavailable(0, e.to_string()))?;
        let status = response.status().as_u16();
        let body = read_body(response.into_body().into_reader())?;
        if !(200..300).contains(&status) {
            return Err(map_status_error(status, String::from_utf8_lossy(&body).into_owned()));
        }
        Ok(Bytes::from(body))
    }

    fn command(
        &self,
        base_url: &str,
        service: ServiceType,
        body: Vec<u8>,
    ) -> Result<Box<dyn Read>, GitError> {
        let url = format!("{base_url}/{service}");
        let request = self.apply_common_headers(
            self.agent
                .post(&url)
                .header("Content-Type", request_content_type(service))
                .header("Accept", result_content_type(service)),
        );
        let response = request
            .send(&body)
            .map_err(|e| GitError::server_unavailable(0, e.to_string()))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let error_body = read_body(response.into_body().into_reader())?;
            return Err(map_status_error(
                status,
                String::from_utf8_lossy(&error_body).into_owned(),
            ));
        }
        Ok(Box::new(response.into_body().into_reader()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// An in-memory `Transport` fixture for exercising the fetch/push
    /// planners without a live server.
    pub struct FakeTransport {
        pub discover_response: Bytes,
        pub command_responses: RefCell<Vec<Bytes>>,
    }

    impl Transport for FakeTransport {
        fn discover(&self, _base_url: &str, _service: ServiceType) -> Result<Bytes, GitError> {
            Ok(self.discover_response.clone())
        }

        fn command(
            &self,
            _base_url: &str,
            _service: ServiceType,
            _body: Vec<u8>,
        ) -> Result<Box<dyn Read>, GitError> {
            let body = self
                .command_responses
                .borrow_mut()
                .pop()
                .ok_or_else(|| GitError::CustomError("no fake response queued".to_string()))?;
            Ok(Box::new(std::io::Cursor::new(body.to_vec())))
        }
    }

    #[test]
    fn request_content_types_match_each_service() {
        assert_eq!(
            request_content_type(ServiceType::UploadPack),
            "application/x-git-upload-pack-request"
        );
        assert_eq!(
            request_content_type(ServiceType::ReceivePack),
            "application/x-git-receive-pack-request"
        );
    }

    #[test]
    fn status_codes_map_to_the_matching_error_tier() {
        assert!(matches!(
            map_status_error(401, "no".into()),
            GitError::Unauthorized { .. }
        ));
        assert!(matches!(
            map_status_error(404, "no".into()),
            GitError::RepositoryNotFound { .. }
        ));
        assert!(matches!(
            map_status_error(503, "no".into()),
            GitError::ServerUnavailable { .. }
        ));
    }
}
