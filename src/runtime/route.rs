//! Block page routes: `/{orgShortname}/blocks/{blockSlug}`

use std::fmt;

/// Character every org shortname must start with.
pub const DEFAULT_ORG_SIGIL: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockRoute {
    pub org_shortname: String,
    pub block_slug: String,
}

impl BlockRoute {
    /// Parse a request path. Query strings, fragments and a trailing slash
    /// are ignored. Returns `None` for anything that is not a block route.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let mut segments = path.trim_matches('/').split('/');

        let org_shortname = segments.next().filter(|s| !s.is_empty())?;
        if segments.next() != Some("blocks") {
            return None;
        }
        let block_slug = segments.next().filter(|s| !s.is_empty())?;
        if segments.next().is_some() {
            return None;
        }

        Some(Self {
            org_shortname: org_shortname.to_string(),
            block_slug: block_slug.to_string(),
        })
    }

    /// Route for a `{org}/{slug}` package path.
    pub fn from_package_path(package_path: &str) -> Option<Self> {
        let (org, slug) = package_path.split_once('/')?;
        if org.is_empty() || slug.is_empty() || slug.contains('/') {
            return None;
        }
        Some(Self {
            org_shortname: org.to_string(),
            block_slug: slug.to_string(),
        })
    }

    pub fn has_sigil(&self, sigil: char) -> bool {
        self.org_shortname.starts_with(sigil)
    }

    pub fn package_path(&self) -> String {
        format!("{}/{}", self.org_shortname, self.block_slug)
    }
}

impl fmt::Display for BlockRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/blocks/{}", self.org_shortname, self.block_slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_route() {
        let route = BlockRoute::parse("/@hash/blocks/code").unwrap();
        assert_eq!(route.org_shortname, "@hash");
        assert_eq!(route.block_slug, "code");
        assert_eq!(route.package_path(), "@hash/code");
        assert!(route.has_sigil(DEFAULT_ORG_SIGIL));
        assert_eq!(route.to_string(), "/@hash/blocks/code");
    }

    #[test]
    fn test_parse_ignores_query_and_trailing_slash() {
        let route = BlockRoute::parse("/@hash/blocks/code/?tab=schema").unwrap();
        assert_eq!(route.block_slug, "code");
    }

    #[test]
    fn test_rejects_other_shapes() {
        assert_eq!(BlockRoute::parse("/"), None);
        assert_eq!(BlockRoute::parse("/@hash"), None);
        assert_eq!(BlockRoute::parse("/@hash/docs/code"), None);
        assert_eq!(BlockRoute::parse("/@hash/blocks/"), None);
        assert_eq!(BlockRoute::parse("/@hash/blocks/code/extra"), None);
    }

    #[test]
    fn test_shortname_without_sigil() {
        let route = BlockRoute::parse("/x/blocks/demo").unwrap();
        assert!(!route.has_sigil(DEFAULT_ORG_SIGIL));
    }

    #[test]
    fn test_from_package_path() {
        assert_eq!(
            BlockRoute::from_package_path("@org/demo").map(|r| r.to_string()),
            Some("/@org/blocks/demo".to_string())
        );
        assert_eq!(BlockRoute::from_package_path("nodivider"), None);
    }
}
