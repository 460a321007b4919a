//! Image reference parsing: `[registry-host[:port]/]repo[:tag]`.
//!
//! Shared between the Environment Composer (`DOCKER_IMAGE`/`DOCKER_TAG`)
//! and the Container Controller (registry credential lookup), so the
//! split lives once here rather than being reimplemented per caller.

/// Split an image reference into `(repo, tag)`, defaulting the tag to
/// `latest`. A colon only introduces a tag when it appears after the
/// last `/` -- otherwise it's part of a `host:port` registry prefix.
pub fn split_repo_tag(image: &str) -> (String, String) {
    let last_slash = image.rfind('/');
    let search_from = last_slash.map(|i| i + 1).unwrap_or(0);

    match image[search_from..].rfind(':') {
        Some(rel_colon) => {
            let colon = search_from + rel_colon;
            (image[..colon].to_string(), image[colon + 1..].to_string())
        }
        None => (image.to_string(), "latest".to_string()),
    }
}

/// Extract the registry host from an image reference, if the image
/// names one explicitly (as opposed to defaulting to Docker Hub).
///
/// A prefix before the first `/` is a registry host only if it
/// contains a `.`, a `:`, or is literally `localhost` -- otherwise it's
/// a Docker Hub user/org namespace (e.g. `library/redis`).
pub fn registry_host(image: &str) -> Option<&str> {
    let (first, rest) = image.split_once('/')?;
    if rest.is_empty() {
        return None;
    }
    if first == "localhost" || first.contains('.') || first.contains(':') {
        Some(first)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_repo_defaults_to_latest() {
        assert_eq!(split_repo_tag("redis"), ("redis".to_string(), "latest".to_string()));
    }

    #[test]
    fn repo_with_tag() {
        assert_eq!(
            split_repo_tag("redis:7-alpine"),
            ("redis".to_string(), "7-alpine".to_string())
        );
    }

    #[test]
    fn registry_host_with_port_is_not_mistaken_for_tag() {
        assert_eq!(
            split_repo_tag("registry.example.com:5000/team/app"),
            ("registry.example.com:5000/team/app".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_repo_tag("registry.example.com:5000/team/app:v2"),
            ("registry.example.com:5000/team/app".to_string(), "v2".to_string())
        );
    }

    #[test]
    fn docker_hub_namespace_is_not_a_registry_host() {
        assert_eq!(registry_host("library/redis"), None);
        assert_eq!(registry_host("myorg/app"), None);
    }

    #[test]
    fn explicit_registry_host_is_detected() {
        assert_eq!(registry_host("registry.example.com/team/app"), Some("registry.example.com"));
        assert_eq!(registry_host("localhost:5000/app"), Some("localhost:5000"));
    }
}
