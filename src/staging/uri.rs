//! Storage URI handling: `scheme://[user@]host[:port]/path` or a bare
//! absolute path. Authorities go through [`url::Url`]; the path is kept
//! percent-decoded and without query or fragment.

use percent_encoding::percent_decode_str;
use std::fmt;
use thiserror::Error;
use url::{ParseError, Url};

/// WHATWG `file` URLs reject user info and ports, so `file` authorities are
/// parsed under this non-special scheme instead.
const FILE_AUTHORITY_SCHEME: &str = "x-storage-file";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("URI is empty")]
    Empty,
    #[error("Illegal character in URI '{0}'")]
    IllegalCharacter(String),
    #[error("Invalid scheme in URI '{0}'")]
    InvalidScheme(String),
    #[error("Invalid port in URI '{0}'")]
    InvalidPort(String),
    #[error("Malformed URI '{input}': {source}")]
    Malformed { input: String, source: ParseError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUri {
    pub scheme: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: String,
}

impl StorageUri {
    pub fn parse(input: &str) -> Result<Self, UriError> {
        if input.is_empty() {
            return Err(UriError::Empty);
        }
        if input.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(UriError::IllegalCharacter(input.to_string()));
        }

        let Some((scheme, rest)) = input.split_once("://") else {
            return Ok(Self::from_path(input));
        };

        let is_file = scheme.eq_ignore_ascii_case("file");
        let parsed = if is_file {
            Url::parse(&format!("{FILE_AUTHORITY_SCHEME}://{rest}"))
        } else {
            Url::parse(input)
        }
        .map_err(|err| match err {
            ParseError::RelativeUrlWithoutBase => UriError::InvalidScheme(input.to_string()),
            ParseError::InvalidPort => UriError::InvalidPort(input.to_string()),
            source => UriError::Malformed {
                input: input.to_string(),
                source,
            },
        })?;

        let scheme = if is_file {
            "file".to_string()
        } else {
            parsed.scheme().to_string()
        };
        let user = Some(parsed.username())
            .filter(|user| !user.is_empty())
            .map(|user| percent_decode_str(user).decode_utf8_lossy().into_owned());

        Ok(Self {
            scheme: Some(scheme),
            user,
            host: parsed
                .host_str()
                .filter(|host| !host.is_empty())
                .map(str::to_string),
            port: parsed.port(),
            path: percent_decode_str(parsed.path())
                .decode_utf8_lossy()
                .into_owned(),
        })
    }

    pub fn from_path(path: impl Into<String>) -> Self {
        Self {
            scheme: None,
            user: None,
            host: None,
            port: None,
            path: path.into(),
        }
    }

    /// `file://user@host:port/path`
    pub fn file(user: &str, host: &str, port: u16, path: impl Into<String>) -> Self {
        Self {
            scheme: Some("file".to_string()),
            user: Some(user.to_string()),
            host: Some(host.to_string()),
            port: Some(port),
            path: path.into(),
        }
    }

    /// Same scheme and authority, different path
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for StorageUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}://")?;
            if let Some(user) = &self.user {
                write!(f, "{user}@")?;
            }
            if let Some(host) = &self.host {
                f.write_str(host)?;
            }
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        f.write_str(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file_uri() {
        let uri = StorageUri::parse("file://alice@storage.example.org:22/data/exp1/out.txt")
            .unwrap();
        assert_eq!(uri.scheme.as_deref(), Some("file"));
        assert_eq!(uri.user.as_deref(), Some("alice"));
        assert_eq!(uri.host.as_deref(), Some("storage.example.org"));
        assert_eq!(uri.port, Some(22));
        assert_eq!(uri.path, "/data/exp1/out.txt");
        assert_eq!(
            uri.to_string(),
            "file://alice@storage.example.org:22/data/exp1/out.txt"
        );
    }

    #[test]
    fn test_parse_hostless_and_bare_paths() {
        let uri = StorageUri::parse("file:///scratch/run/out.log").unwrap();
        assert_eq!(uri.host, None);
        assert_eq!(uri.path, "/scratch/run/out.log");

        let bare = StorageUri::parse("/scratch/run/out.log").unwrap();
        assert_eq!(bare.scheme, None);
        assert_eq!(bare.to_string(), "/scratch/run/out.log");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(StorageUri::parse(""), Err(UriError::Empty));
        assert!(matches!(
            StorageUri::parse("file://host/with space"),
            Err(UriError::IllegalCharacter(_))
        ));
        assert!(matches!(
            StorageUri::parse("1x://host/path"),
            Err(UriError::InvalidScheme(_))
        ));
        assert!(matches!(
            StorageUri::parse("file://host:abc/path"),
            Err(UriError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_parse_ipv6_authority() {
        let uri = StorageUri::parse("file://user@[::1]/data/in.dat").unwrap();
        assert_eq!(uri.user.as_deref(), Some("user"));
        assert_eq!(uri.host.as_deref(), Some("[::1]"));
        assert_eq!(uri.port, None);
        assert_eq!(uri.path, "/data/in.dat");
        assert_eq!(uri.to_string(), "file://user@[::1]/data/in.dat");

        let with_port = StorageUri::parse("sftp://[2001:db8::7]:2222/home/x").unwrap();
        assert_eq!(with_port.host.as_deref(), Some("[2001:db8::7]"));
        assert_eq!(with_port.port, Some(2222));
    }

    #[test]
    fn test_query_and_fragment_stay_out_of_the_path() {
        let uri = StorageUri::parse("file://h/data/out.txt?v=2#frag").unwrap();
        assert_eq!(uri.host.as_deref(), Some("h"));
        assert_eq!(uri.path, "/data/out.txt");
    }

    #[test]
    fn test_path_is_percent_decoded() {
        let uri = StorageUri::parse("file://h/data/run%201/a%7Bb%7D.txt").unwrap();
        assert_eq!(uri.path, "/data/run 1/a{b}.txt");

        let wildcard = StorageUri::parse("file://bob@h:22/work/*.log").unwrap();
        assert_eq!(wildcard.path, "/work/*.log");
    }

    #[test]
    fn test_with_path_keeps_authority() {
        let uri = StorageUri::file("bob", "h", 22, "/a/*.log");
        assert_eq!(uri.with_path("/a/x.log").to_string(), "file://bob@h:22/a/x.log");
    }
}
