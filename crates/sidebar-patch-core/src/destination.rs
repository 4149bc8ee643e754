use std::fmt;

/// Path segment the host uses for the direct-messages context.
pub const DIRECT_MESSAGES_SEGMENT: &str = "@me";

/// Fewest `/`-separated segments that can name a destination:
/// `["", "channels", "<destination>"]`.
const MIN_DESTINATION_SEGMENTS: usize = 3;
const DESTINATION_SEGMENT_INDEX: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DestinationKey {
    Server(String),
    DirectMessages,
}

impl DestinationKey {
    #[must_use]
    pub fn segment(&self) -> &str {
        match self {
            Self::Server(id) => id,
            Self::DirectMessages => DIRECT_MESSAGES_SEGMENT,
        }
    }

    /// Synthetic request URL used as the key in the persistent cache.
    #[must_use]
    pub fn cache_url(&self) -> String {
        format!("/{}", self.segment())
    }
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Derives the destination for a URL path, ignoring which channel is open.
///
/// Returns `None` outside a server or direct-messages context (landing
/// pages, settings, unknown layouts).
#[must_use]
pub fn resolve(path: &str) -> Option<DestinationKey> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.len() > 1 && segments.last() == Some(&"") {
        segments.pop();
    }
    if segments.len() < MIN_DESTINATION_SEGMENTS {
        return None;
    }

    let segment = segments[DESTINATION_SEGMENT_INDEX];
    if segment == DIRECT_MESSAGES_SEGMENT {
        return Some(DestinationKey::DirectMessages);
    }
    if is_server_id(segment) {
        return Some(DestinationKey::Server(segment.to_string()));
    }
    None
}

fn is_server_id(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_key_ignores_channel_segment() {
        let first = resolve("/channels/123/456");
        let second = resolve("/channels/123/789");
        let bare = resolve("/channels/123");

        assert_eq!(first, Some(DestinationKey::Server("123".to_string())));
        assert_eq!(first, second);
        assert_eq!(first, bare);
    }

    #[test]
    fn direct_messages_share_one_key() {
        assert_eq!(
            resolve("/channels/@me/555"),
            Some(DestinationKey::DirectMessages)
        );
        assert_eq!(resolve("/channels/@me"), Some(DestinationKey::DirectMessages));
    }

    #[test]
    fn trailing_slash_is_ignored() {
        assert_eq!(
            resolve("/channels/123/"),
            Some(DestinationKey::Server("123".to_string()))
        );
        assert_eq!(resolve("/channels/"), None);
    }

    #[test]
    fn paths_outside_a_destination_resolve_to_none() {
        for path in [
            "",
            "/",
            "/login",
            "/channels",
            "/store/skus",
            "/channels/abc/123",
            "/channels/12a3/456",
            "/channels//456",
            "/channels/@you/1",
        ] {
            assert_eq!(resolve(path), None, "path {path:?}");
        }
    }

    #[test]
    fn cache_url_is_rooted_segment() {
        assert_eq!(
            DestinationKey::Server("123".to_string()).cache_url(),
            "/123"
        );
        assert_eq!(DestinationKey::DirectMessages.cache_url(), "/@me");
    }
}
