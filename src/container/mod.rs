use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// Separator between the runtime prefix and the id in Kubernetes container IDs.
const RUNTIME_SEPARATOR: &str = "://";

/// A validated, runtime-prefix-free container identifier.
///
/// Both the Kubernetes API (`docker://<id>`) and a process cgroup path
/// (`.../docker-<id>.scope`) reduce to the same `ContainerID`.
///
/// # Examples
///
/// ```
/// # use tracer_discovery::container::ContainerID;
/// let raw_id = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";
/// let container_id = ContainerID::new(raw_id).unwrap();
/// assert_eq!(container_id.as_ref(), raw_id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty or its length exceeds
    /// [`CONTAINER_ID_MAX_LEN`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use tracer_discovery::container::ContainerID;
    /// assert!(ContainerID::new("abcdef012345").is_ok());
    /// assert!(ContainerID::new("").is_err());
    /// ```
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty() || src.len() > CONTAINER_ID_MAX_LEN {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// Parses a Kubernetes container status ID of the form `<runtime>://<id>`.
    ///
    /// The id is the authority part of the URL, i.e. everything after `://` up to the
    /// first `/`, `?` or `#`. It is already canonical and is not normalized further.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingScheme`] if there is no `://`, [`Error::InvalidScheme`] if
    /// the runtime prefix is not a valid URL scheme, and [`Error::InvalidContainerID`] if
    /// the remaining id is empty or too long.
    ///
    /// # Examples
    ///
    /// ```
    /// # use tracer_discovery::container::ContainerID;
    /// let id = ContainerID::from_runtime_url("containerd://abc123").unwrap();
    /// assert_eq!(id.as_str(), "abc123");
    /// assert!(ContainerID::from_runtime_url("abc123").is_err());
    /// ```
    pub fn from_runtime_url(src: &str) -> Result<Self> {
        let (scheme, rest) = src
            .split_once(RUNTIME_SEPARATOR)
            .ok_or_else(|| Error::MissingScheme(src.to_owned()))?;
        if !is_valid_scheme(scheme) {
            return Err(Error::InvalidScheme(src.to_owned()));
        }

        let authority = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        Self::new(authority).map_err(|_| Error::InvalidContainerID(src.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// URL scheme grammar: a letter followed by letters, digits, `+`, `-` or `.`.
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
