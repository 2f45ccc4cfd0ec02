//! Git Smart-HTTP protocol v2, client side: pkt-line framing, capability
//! negotiation, a blocking HTTP transport, and the `ls-refs`/`fetch`/
//! `git-receive-pack` command drivers.

pub mod capability;
pub mod fetch;
pub mod pktline;
pub mod push;
pub mod transport;
pub mod types;

pub use capability::Capability;
pub use fetch::{Filter, LsRefsOptions, RefEntry, FetchOptions, FetchResult};
pub use push::{PushReport, RefUpdate};
pub use transport::{HttpTransport, Transport};
pub use types::ServiceType;
