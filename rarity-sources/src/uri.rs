//! Token URI helpers
//!
//! Token URIs are built from a template with an `{ID}` placeholder. IPFS
//! locations are rewritten to an HTTP gateway.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Placeholder for the token id in URI templates
pub const TOKEN_ID_PLACEHOLDER: &str = "{ID}";

/// Gateway used for IPFS content
pub const IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

const IPFS_SCHEME: &str = "ipfs://";

// CIDv0: base58btc multihash starting with Qm
static CID_V0_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Qm[1-9A-HJ-NP-Za-km-z]{44}").unwrap());

/// Substitute a token id into a URI template
pub fn create_token_uri(token_id: &str, template: &str) -> String {
    template.replacen(TOKEN_ID_PLACEHOLDER, token_id, 1)
}

/// Turn a concrete token URI back into a template.
///
/// The last occurrence of the id is replaced. Returns `None` when the id does
/// not appear in the URI.
pub fn create_base_token_uri(token_id: &str, token_uri: &str) -> Option<String> {
    if token_id.is_empty() {
        return None;
    }
    match token_uri.rfind(token_id) {
        Some(pos) => Some(format!(
            "{}{}{}",
            &token_uri[..pos],
            TOKEN_ID_PLACEHOLDER,
            &token_uri[pos + token_id.len()..]
        )),
        None => {
            debug!("Token id {} not found in {}", token_id, token_uri);
            None
        }
    }
}

/// Rewrite `ipfs://` URIs and bare CIDs to the HTTP gateway
pub fn normalize_uri(uri: &str) -> String {
    if let Some(path) = uri.strip_prefix(IPFS_SCHEME) {
        let path = path.strip_prefix("ipfs/").unwrap_or(path);
        return format!("{}{}", IPFS_GATEWAY, path);
    }
    if CID_V0_REGEX.is_match(uri) {
        return format!("{}{}", IPFS_GATEWAY, uri);
    }
    uri.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "QmYDvPAXtiJg7s8JdRBSLWdgSphQdac8j1YuQNNxcGE1hg";

    #[test]
    fn test_create_token_uri() {
        assert_eq!(
            create_token_uri("42", "https://api.test/token/{ID}.json"),
            "https://api.test/token/42.json"
        );
        assert_eq!(create_token_uri("42", "https://api.test/static"), "https://api.test/static");
    }

    #[test]
    fn test_create_base_token_uri_replaces_last() {
        assert_eq!(
            create_base_token_uri("1", "https://api1.test/token/1"),
            Some("https://api1.test/token/{ID}".to_string())
        );
        assert_eq!(
            create_base_token_uri("7", "https://api.test/token/7.json"),
            Some("https://api.test/token/{ID}.json".to_string())
        );
        assert_eq!(create_base_token_uri("9", "https://api.test/token/1"), None);
    }

    #[test]
    fn test_normalize_uri() {
        assert_eq!(
            normalize_uri(&format!("ipfs://{}/1.json", CID)),
            format!("https://ipfs.io/ipfs/{}/1.json", CID)
        );
        assert_eq!(
            normalize_uri(&format!("ipfs://ipfs/{}", CID)),
            format!("https://ipfs.io/ipfs/{}", CID)
        );
        assert_eq!(normalize_uri(CID), format!("https://ipfs.io/ipfs/{}", CID));
        assert_eq!(normalize_uri("Qmshort"), "Qmshort");
        assert_eq!(normalize_uri("https://img.test/1.png"), "https://img.test/1.png");
    }
}
