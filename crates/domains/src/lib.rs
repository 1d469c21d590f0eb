//! around/crates/domains/src/lib.rs
//!
//! Domain models, port traits and error types shared by every other crate.

pub mod errors;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;

#[cfg(test)]
mod tests {
    use super::models::*;

    #[test]
    fn post_serializes_with_nested_location() {
        let post = Post {
            id: Post::new_id(),
            user: "alice".to_string(),
            message: "hello".to_string(),
            location: Location::new(37.7, -122.4),
            url: None,
        };
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["location"]["lat"], 37.7);
        assert_eq!(json["location"]["lon"], -122.4);
        assert!(json.get("url").is_none());
    }

    #[test]
    fn post_decodes_without_url() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "user": "bob",
            "message": "hi",
            "location": { "lat": 1.0, "lon": 2.0 }
        }))
        .unwrap();
        assert_eq!(post.url, None);
    }

    #[test]
    fn generated_ids_are_distinct_uuids() {
        let a = Post::new_id();
        let b = Post::new_id();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn raw_cache_key_keeps_textual_form() {
        let a = CacheKey::raw("37.70", "-122.4", Some("10"));
        let b = CacheKey::raw("37.7", "-122.4", Some("10"));
        assert_eq!(a.as_str(), "37.70:-122.4:10");
        assert_ne!(a, b);
    }

    #[test]
    fn raw_cache_key_defaults_range() {
        assert_eq!(CacheKey::raw("1", "2", None).as_str(), "1:2:200");
    }

    #[test]
    fn normalized_cache_key_merges_textual_variants() {
        let a = SearchQuery::new(Location::new("37.70".parse().unwrap(), -122.4), None);
        let b = SearchQuery::new(Location::new("37.7".parse().unwrap(), -122.4), Some(200.0));
        assert_eq!(CacheKey::normalized(&a), CacheKey::normalized(&b));
    }

    #[test]
    fn credential_debug_redacts_password() {
        let cred = Credential::new("alice", "hunter2");
        let printed = format!("{:?}", cred);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }
}
