//! Author/committer identity parsing and serialisation.

use std::fmt::Display;

use bstr::ByteSlice;

use crate::errors::GitError;

/// `{name, email, timestamp-seconds, timezone-offset}`, the shape of a
/// commit's `author`/`committer` line after the leading keyword is stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
    /// Raw `±HHMM` offset string, e.g. `+0000` or `-0700`.
    pub timezone: String,
}

impl Signature {
    pub fn new(name: String, email: String, timestamp: i64, timezone: String) -> Self {
        Signature {
            name,
            email,
            timestamp,
            timezone,
        }
    }

    /// Parses `Name <email> <seconds> ±HHMM` (the bytes after `author `/
    /// `committer ` have already been stripped by the caller).
    pub fn from_data(data: &[u8]) -> Result<Self, GitError> {
        let line = data.trim_end_with(|c| c == '\n');

        let close = line
            .rfind_byte(b'>')
            .ok_or_else(|| GitError::InvalidCommit("signature line has no `>`".to_string()))?;
        let open = line[..close].rfind_byte(b'<').ok_or_else(|| {
            GitError::InvalidCommit("signature line has no matching `<`".to_string())
        })?;

        let name = line[..open].trim().to_str_lossy().trim().to_string();
        let email = line[open + 1..close].to_str_lossy().to_string();

        let rest = line[close + 1..].trim();
        let rest = std::str::from_utf8(rest)
            .map_err(|e| GitError::ConversionError(e.to_string()))?
            .trim();
        let mut parts = rest.split_ascii_whitespace();
        let timestamp: i64 = parts
            .next()
            .ok_or_else(|| GitError::InvalidCommit("signature missing timestamp".to_string()))?
            .parse()
            .map_err(|_| GitError::InvalidCommit("signature timestamp is not an integer".into()))?;
        let timezone = parts
            .next()
            .ok_or_else(|| GitError::InvalidCommit("signature missing timezone offset".into()))?
            .to_string();

        if name.is_empty() || email.is_empty() {
            return Err(GitError::InvalidAuthor(
                "signature must have a non-empty name and email".to_string(),
            ));
        }

        Ok(Signature {
            name,
            email,
            timestamp,
            timezone,
        })
    }

    pub fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(self.to_string().into_bytes())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.timestamp, self.timezone
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_signature() {
        let sig = Signature::from_data(b"Jane Doe <jane@example.com> 1700000000 +0000").unwrap();
        assert_eq!(sig.name, "Jane Doe");
        assert_eq!(sig.email, "jane@example.com");
        assert_eq!(sig.timestamp, 1700000000);
        assert_eq!(sig.timezone, "+0000");
    }

    #[test]
    fn round_trips_through_display() {
        let sig = Signature::new(
            "Jane Doe".into(),
            "jane@example.com".into(),
            1700000000,
            "-0700".into(),
        );
        let rendered = sig.to_string();
        let reparsed = Signature::from_data(rendered.as_bytes()).unwrap();
        assert_eq!(sig, reparsed);
    }

    #[test]
    fn rejects_missing_email() {
        assert!(Signature::from_data(b"Jane Doe 1700000000 +0000").is_err());
    }
}
