//! Protocol v2 `ls-refs` and `fetch` command planner: builds the pkt-line
//! request body for each command, and parses the section-structured
//! response into refs, acknowledgments, and a streaming packfile byte
//! stream fed to `internal::pack::reader`.

use std::io::Read;

use bytes::BytesMut;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::pack::reader::{ParsedPack, read_pack};

use super::capability::client_fetch_capabilities;
use super::pktline::{Frame, PackDataReader, read_all_frames, write_delim, write_flush, write_str};
use super::transport::Transport;
use super::types::ServiceType;

/// One `<hash> <name>` ref entry as returned by `ls-refs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub hash: Hash,
    pub name: String,
    pub symref_target: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LsRefsOptions {
    pub symrefs: bool,
    pub peel: bool,
    pub ref_prefixes: Vec<String>,
}

/// A `filter` argument for a partial-clone `fetch` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    BlobNone,
    TreeDepth(u32),
    BlobLimit(u64),
}

impl Filter {
    fn as_arg(&self) -> String {
        match self {
            Filter::BlobNone => "blob:none".to_string(),
            Filter::TreeDepth(depth) => format!("tree:{depth}"),
            Filter::BlobLimit(limit) => format!("blob:limit={limit}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub wants: Vec<Hash>,
    pub haves: Vec<Hash>,
    pub filter: Option<Filter>,
    pub deepen: Option<u32>,
    pub done: bool,
}

/// The result of a `fetch` command: resolved refs (if `wanted-refs` was
/// present), shallow boundary info, and the parsed pack.
#[derive(Debug)]
pub struct FetchResult {
    pub pack: ParsedPack,
}

fn agent_string() -> &'static str {
    concat!("git-smart-core/", env!("CARGO_PKG_VERSION"))
}

/// Discovers v2 capabilities via `GET info/refs?service=git-upload-pack` and
/// confirms the server speaks protocol version 2.
pub fn discover_v2(transport: &dyn Transport, base_url: &str) -> Result<(), GitError> {
    let body = transport.discover(base_url, ServiceType::UploadPack)?;
    let frames = read_all_frames(body)?;
    let mut saw_version_2 = false;
    for frame in frames {
        if let Frame::Payload(payload) = frame {
            if payload.starts_with(b"version 2") {
                saw_version_2 = true;
            }
        }
    }
    if !saw_version_2 {
        return Err(GitError::InvalidFetchStatus(
            "server did not advertise protocol version 2".to_string(),
        ));
    }
    Ok(())
}

/// Runs `ls-refs` and returns the matching ref list.
pub fn ls_refs(
    transport: &dyn Transport,
    base_url: &str,
    opts: &LsRefsOptions,
) -> Result<Vec<RefEntry>, GitError> {
    let mut body = BytesMut::new();
    write_str(&mut body, "command=ls-refs\n");
    write_delim(&mut body);
    if opts.symrefs {
        write_str(&mut body, "symrefs\n");
    }
    if opts.peel {
        write_str(&mut body, "peel\n");
    }
    for prefix in &opts.ref_prefixes {
        write_str(&mut body, &format!("ref-prefix {prefix}\n"));
    }
    write_flush(&mut body);

    let mut response_body = Vec::new();
    transport
        .command(base_url, ServiceType::UploadPack, body.to_vec())?
        .read_to_end(&mut response_body)?;
    let frames = read_all_frames(response_body.into())?;

    let mut refs = Vec::new();
    for frame in frames {
        let line = match frame {
            Frame::Payload(bytes) => bytes,
            Frame::Flush => continue,
            Frame::Delim | Frame::ResponseEnd => continue,
        };
        let text = std::str::from_utf8(&line)
            .map_err(|e| GitError::PacketParseError {
                line: hex::encode(&line),
                underlying: e.to_string(),
            })?
            .trim_end_matches('\n');
        if let Some(reason) = text.strip_prefix("ERR ") {
            return Err(GitError::FatalFetchError(reason.to_string()));
        }
        let mut parts = text.splitn(2, ' ');
        let hash_str = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();
        let hash = hash_str
            .parse::<Hash>()
            .map_err(GitError::InvalidHashValue)?;
        let (name, symref_target) = match rest.split_once(" symref-target:") {
            Some((name, target)) => (name.to_string(), Some(target.to_string())),
            None => (rest.to_string(), None),
        };
        refs.push(RefEntry {
            hash,
            name,
            symref_target,
        });
    }
    Ok(refs)
}

/// Runs a `fetch` command and returns the resolved, delta-free pack.
pub fn fetch(
    transport: &dyn Transport,
    base_url: &str,
    opts: &FetchOptions,
) -> Result<FetchResult, GitError> {
    let mut body = BytesMut::new();
    write_str(&mut body, "command=fetch\n");
    write_str(&mut body, &format!("agent={}\n", agent_string()));
    write_delim(&mut body);

    for want in &opts.wants {
        write_str(&mut body, &format!("want {want}\n"));
    }
    for have in &opts.haves {
        write_str(&mut body, &format!("have {have}\n"));
    }
    if let Some(filter) = &opts.filter {
        write_str(&mut body, &format!("filter {}\n", filter.as_arg()));
    }
    if let Some(depth) = opts.deepen {
        write_str(&mut body, &format!("deepen {depth}\n"));
    }
    if opts.done || opts.haves.is_empty() {
        write_str(&mut body, "done\n");
    }
    write_str(&mut body, "ofs-delta\n");
    write_flush(&mut body);

    let _capabilities = client_fetch_capabilities(agent_string());
    let response = transport.command(base_url, ServiceType::UploadPack, body.to_vec())?;
    let mut pack_reader = PackDataReader::new(response);

    match read_pack(&mut pack_reader) {
        Ok(pack) => Ok(FetchResult { pack }),
        Err(e) => {
            if !pack_reader.saw_packfile() {
                Err(GitError::InvalidFetchStatus(
                    "fetch response carried no packfile section".to_string(),
                ))
            } else {
                Err(e)
            }
        }
    }
}

/// Fetches a single object by hash, without any filter — used by
/// `GetBlob` and the tree-completeness fallback.
pub fn fetch_one(
    transport: &dyn Transport,
    base_url: &str,
    hash: Hash,
) -> Result<ParsedPack, GitError> {
    let opts = FetchOptions {
        wants: vec![hash],
        done: true,
        ..Default::default()
    };
    Ok(fetch(transport, base_url, &opts)?.pack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::object::types::ObjectType;
    use crate::internal::pack::entry::Entry;
    use crate::internal::pack::writer::write_pack;
    use bytes::Bytes;
    use std::cell::RefCell;

    struct FakeTransport {
        discover_response: Bytes,
        command_response: Bytes,
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
            Ok(Box::new(std::io::Cursor::new(self.command_response.to_vec())))
        }
    }

    fn pkt(s: &str) -> Vec<u8> {
        let mut out = BytesMut::new();
        write_str(&mut out, s);
        out.to_vec()
    }

    #[test]
    fn discovers_protocol_version_2() {
        let mut body = pkt("version 2\n");
        body.extend(b"0000");
        let transport = FakeTransport {
            discover_response: Bytes::from(body),
            command_response: Bytes::new(),
        };
        assert!(discover_v2(&transport, "https://example.test/repo.git").is_ok());
    }

    #[test]
    fn rejects_advertisement_missing_version_2() {
        let mut body = pkt("version 1\n");
        body.extend(b"0000");
        let transport = FakeTransport {
            discover_response: Bytes::from(body),
            command_response: Bytes::new(),
        };
        assert!(discover_v2(&transport, "https://example.test/repo.git").is_err());
    }

    #[test]
    fn parses_ls_refs_entries() {
        let hash = Hash::of(b"ref target");
        let mut response = pkt(&format!("{hash} refs/heads/main\n"));
        response.extend(b"0000");
        let transport = FakeTransport {
            discover_response: Bytes::new(),
            command_response: Bytes::from(response),
        };
        let refs = ls_refs(&transport, "https://example.test/repo.git", &LsRefsOptions::default())
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "refs/heads/main");
        assert_eq!(refs[0].hash, hash);
    }

    #[test]
    fn surfaces_a_fatal_error_line_in_ls_refs() {
        let mut response = pkt("ERR access denied\n");
        response.extend(b"0000");
        let transport = FakeTransport {
            discover_response: Bytes::new(),
            command_response: Bytes::from(response),
        };
        let err = ls_refs(&transport, "https://example.test/repo.git", &LsRefsOptions::default())
            .unwrap_err();
        assert!(matches!(err, GitError::FatalFetchError(_)));
    }

    #[test]
    fn fetch_extracts_a_side_band_wrapped_packfile() {
        let entries = vec![Entry {
            obj_type: ObjectType::Blob,
            data: b"hi".to_vec(),
            hash: Hash::from_type_and_data(ObjectType::Blob, b"hi"),
            chain_len: 0,
        }];
        let packed = write_pack(&entries).unwrap();

        let mut raw = BytesMut::new();
        write_str(&mut raw, "packfile\n");
        let mut channel_payload = vec![1u8];
        channel_payload.extend(packed);
        super::pktline::write_frame(&mut raw, &channel_payload);
        raw.extend_from_slice(&b"0000"[..]);

        let transport = FakeTransport {
            discover_response: Bytes::new(),
            command_response: raw.freeze(),
        };
        let result = fetch(
            &transport,
            "https://example.test/repo.git",
            &FetchOptions {
                wants: vec![Hash::of(b"hi")],
                done: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.pack.entries.len(), 1);
        assert_eq!(result.pack.entries[0].data, b"hi");
    }
}
