// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Handles formats like nginx, nginx:tag, registry/image:tag@digest.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),
}

/// A parsed container image reference.
///
/// Splits `registry/name:tag@digest` into its components. The tag defaults
/// to `latest` when neither a tag nor a digest is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !"/:.-_@".contains(*c))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (rest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon only marks a tag when it appears after the last slash;
        // otherwise it belongs to a registry port.
        let (rest, tag) = match rest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => (before, Some(after.to_string())),
            _ => (rest, None),
        };

        let (registry, name) = split_registry(rest);

        let tag = match (&tag, &digest) {
            (None, None) => Some("latest".to_string()),
            _ => tag,
        };

        Ok(Self {
            registry,
            name,
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Repository path including the registry host, without tag or digest.
    pub fn repository(&self) -> String {
        match &self.registry {
            Some(registry) => format!("{}/{}", registry, self.name),
            None => self.name.clone(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

/// The first path component is a registry host only if it contains a dot
/// or a port, or is exactly "localhost".
fn split_registry(input: &str) -> (Option<String>, String) {
    match input.split_once('/') {
        Some((first, rest))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            (Some(first.to_string()), rest.to_string())
        }
        _ => (None, input.to_string()),
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref registry) = self.registry {
            write!(f, "{}/", registry)?;
        }
        write!(f, "{}", self.name)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_defaults_to_latest() {
        let r = ImageRef::parse("nginx").unwrap();
        assert_eq!(r.name(), "nginx");
        assert_eq!(r.tag(), Some("latest"));
        assert_eq!(r.registry(), None);
        assert_eq!(r.to_string(), "nginx:latest");
    }

    #[test]
    fn registry_with_port_is_not_a_tag() {
        let r = ImageRef::parse("localhost:5000/app").unwrap();
        assert_eq!(r.registry(), Some("localhost:5000"));
        assert_eq!(r.name(), "app");
        assert_eq!(r.repository(), "localhost:5000/app");
        assert_eq!(r.tag(), Some("latest"));
    }

    #[test]
    fn digest_suppresses_default_tag() {
        let r = ImageRef::parse("ghcr.io/acme/app@sha256:deadbeef").unwrap();
        assert_eq!(r.tag(), None);
        assert_eq!(r.digest(), Some("sha256:deadbeef"));
    }

    #[test]
    fn namespaced_name_without_registry() {
        let r = ImageRef::parse("library/nginx:1.25").unwrap();
        assert_eq!(r.registry(), None);
        assert_eq!(r.name(), "library/nginx");
        assert_eq!(r.tag(), Some("1.25"));
    }

    #[test]
    fn rejects_empty_and_invalid_characters() {
        assert!(matches!(
            ImageRef::parse("  "),
            Err(ParseImageRefError::Empty)
        ));
        assert!(matches!(
            ImageRef::parse("nginx latest"),
            Err(ParseImageRefError::InvalidChar(' '))
        ));
    }
}
