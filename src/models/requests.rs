//! Request DTOs for the admin API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;

/// Request body for POST /admin/cache/clear-page
#[derive(Debug, Clone, Deserialize)]
pub struct ClearPageRequest {
    /// Absolute URL or path of the page to clear
    pub url: String,
}

impl ClearPageRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.url.trim().is_empty() {
            return Some("URL cannot be empty".to_string());
        }
        None
    }
}

/// Request body for POST /admin/cache/content-changed
///
/// Sent by the host whenever a piece of content is saved.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentChangedRequest {
    /// Host-side identifier of the changed resource
    pub resource_id: String,
    /// Canonical URL the resource renders at
    pub url: String,
}

impl ContentChangedRequest {
    pub fn validate(&self) -> Option<String> {
        if self.resource_id.trim().is_empty() {
            return Some("Resource id cannot be empty".to_string());
        }
        if self.url.trim().is_empty() {
            return Some("URL cannot be empty".to_string());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_page_request_deserialize() {
        let json = r#"{"url": "https://example.com/about/"}"#;
        let req: ClearPageRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.url, "https://example.com/about/");
        assert!(req.validate().is_none());
    }

    #[test]
    fn test_validate_empty_url() {
        let req = ClearPageRequest {
            url: "  ".to_string(),
        };
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_content_changed_validate() {
        let req: ContentChangedRequest =
            serde_json::from_str(r#"{"resource_id": "post:4", "url": "/post-4/"}"#).unwrap();
        assert!(req.validate().is_none());

        let missing_id = ContentChangedRequest {
            resource_id: "".to_string(),
            url: "/x/".to_string(),
        };
        assert!(missing_id.validate().is_some());
    }
}
