use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    convert::TryFrom,
    fmt,
    path::{Path, PathBuf},
    string::FromUtf8Error,
};
use thiserror::Error as ThisError;
use urlencoding::{decode, encode};

#[derive(Clone, Debug, ThisError)]
pub enum RefError {
    #[error("Does not match as {ref_type}: {input}")]
    BadFormat {
        ref_type: &'static str,
        input: String,
    },
    #[error("Resource with scheme {0} is not a local file")]
    NotAFile(String),
    #[error("File path must be absolute: {0}")]
    RelativePath(String),
    #[error("Failed to decode path, cause: {0}")]
    DecodeError(#[from] FromUtf8Error),
}

/// Identifier of a post, as assigned by the server. Zero marks a post that
/// was never saved.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl PostId {
    pub const NEW: PostId = PostId(0);

    pub fn is_new(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PostId {
    fn from(value: u64) -> Self {
        PostId(value)
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        UserId(value)
    }
}

/// Handle to a resource picked by the user, in `scheme:rest` form
/// (`file:///sdcard/DCIM/cat.jpg`, `content://media/external/images/12`).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceRef {
    scheme: String,
    rest: String,
}

impl ResourceRef {
    pub fn from_string(string: String) -> Result<Self, RefError> {
        let parsed = Self::single_regex()
            .captures(string.as_str())
            .map(|caps| (caps["scheme"].to_ascii_lowercase(), caps["rest"].to_string()));
        match parsed {
            Some((scheme, rest)) => Ok(Self { scheme, rest }),
            None => Err(RefError::BadFormat {
                ref_type: "Resource",
                input: string,
            }),
        }
    }

    // Builds a file: handle, percent-encoding each path segment
    pub fn from_path(path: &Path) -> Result<Self, RefError> {
        let string = path.to_str().ok_or_else(|| RefError::BadFormat {
            ref_type: "Path",
            input: path.to_string_lossy().into_owned(),
        })?;
        if !path.is_absolute() {
            return Err(RefError::RelativePath(string.to_string()));
        }
        let encoded = string
            .split('/')
            .map(|segment| encode(segment).into_owned())
            .collect::<Vec<String>>()
            .join("/");
        Ok(Self {
            scheme: "file".to_string(),
            rest: format!("//{}", encoded),
        })
    }

    pub fn single_regex() -> &'static Regex {
        lazy_static! {
            static ref RE: Regex =
                Regex::new(r"^(?P<scheme>[a-zA-Z][a-zA-Z0-9+.\-]*):(?P<rest>\S+)$").unwrap();
        }
        &*RE
    }

    pub fn is_match(string: &str) -> bool {
        let regex = Self::single_regex();
        regex.is_match(string)
    }

    pub fn scheme(&self) -> &str {
        self.scheme.as_str()
    }

    pub fn is_file(&self) -> bool {
        self.scheme == "file"
    }

    /// Resolves a `file:` handle to a local path. Any other scheme is an
    /// error, as is a remote host.
    pub fn to_file_path(&self) -> Result<PathBuf, RefError> {
        if !self.is_file() {
            return Err(RefError::NotAFile(self.scheme.clone()));
        }

        let path = match self.rest.strip_prefix("//") {
            Some(authority_and_path) => {
                let host_end = authority_and_path
                    .find('/')
                    .unwrap_or(authority_and_path.len());
                let host = &authority_and_path[..host_end];
                if !host.is_empty() && host != "localhost" {
                    return Err(RefError::BadFormat {
                        ref_type: "File",
                        input: self.to_string(),
                    });
                }
                &authority_and_path[host_end..]
            }
            None => self.rest.as_str(),
        };

        if !path.starts_with('/') {
            return Err(RefError::RelativePath(path.to_string()));
        }

        Ok(PathBuf::from(decode(path)?.into_owned()))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.rest)
    }
}

impl TryFrom<String> for ResourceRef {
    type Error = RefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ResourceRef::from_string(value)
    }
}

impl TryFrom<&str> for ResourceRef {
    type Error = RefError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        ResourceRef::from_string(value.to_string())
    }
}

impl From<ResourceRef> for String {
    fn from(value: ResourceRef) -> String {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_resource_ref() {
        assert!(ResourceRef::is_match("file:///sdcard/DCIM/cat.jpg"));
        assert!(ResourceRef::is_match(
            "content://media/external/images/media/12"
        ));
        assert!(!ResourceRef::is_match("/sdcard/DCIM/cat.jpg"));
        assert!(!ResourceRef::is_match("file:///with space.jpg"));
    }

    #[test]
    fn test_parse_scheme_lowercased() {
        let resource = ResourceRef::from_string("FILE:///tmp/a.png".to_string()).unwrap();
        assert_eq!(resource.scheme(), "file");
        assert!(resource.is_file());
    }

    #[test]
    fn test_file_path_decodes() {
        let resource: ResourceRef = "file:///sdcard/My%20Photos/cat%231.jpg".try_into().unwrap();
        assert_eq!(
            resource.to_file_path().unwrap(),
            PathBuf::from("/sdcard/My Photos/cat#1.jpg")
        );
    }

    #[test]
    fn test_file_path_localhost_and_bare() {
        let localhost: ResourceRef = "file://localhost/tmp/a.png".try_into().unwrap();
        assert_eq!(localhost.to_file_path().unwrap(), PathBuf::from("/tmp/a.png"));

        let bare: ResourceRef = "file:/tmp/a.png".try_into().unwrap();
        assert_eq!(bare.to_file_path().unwrap(), PathBuf::from("/tmp/a.png"));
    }

    #[test]
    fn test_file_path_rejects_remote_host() {
        let remote: ResourceRef = "file://example.com/tmp/a.png".try_into().unwrap();
        assert!(matches!(
            remote.to_file_path(),
            Err(RefError::BadFormat { ref_type: "File", .. })
        ));
    }

    #[test]
    fn test_content_scheme_is_not_a_file() {
        let resource: ResourceRef = "content://media/external/images/media/12"
            .try_into()
            .unwrap();
        match resource.to_file_path() {
            Err(RefError::NotAFile(scheme)) => assert_eq!(scheme, "content"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_from_path_encodes_segments() {
        let resource = ResourceRef::from_path(Path::new("/tmp/My Photos/a.png")).unwrap();
        assert_eq!(resource.to_string(), "file:///tmp/My%20Photos/a.png");
        assert_eq!(
            resource.to_file_path().unwrap(),
            PathBuf::from("/tmp/My Photos/a.png")
        );
    }

    #[test]
    fn test_from_relative_path_fails() {
        assert!(matches!(
            ResourceRef::from_path(Path::new("photos/a.png")),
            Err(RefError::RelativePath(_))
        ));
    }

    #[test]
    fn test_deserialize_resource_ref() {
        let resource: ResourceRef = serde_json::from_str("\"file:///tmp/a.png\"").unwrap();
        assert!(resource.is_file());
        assert!(serde_json::from_str::<ResourceRef>("\"not a handle\"").is_err());
        assert_eq!(
            serde_json::to_string(&resource).unwrap(),
            "\"file:///tmp/a.png\""
        );
    }

    #[test]
    fn test_ids_are_transparent() {
        assert_eq!(serde_json::to_string(&PostId(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<UserId>("-3").unwrap(), UserId(-3));
        assert!(PostId::NEW.is_new());
    }
}
