// Pattern resolution tests against request-shaped URL contexts

use pipeshape::domain::pattern::{resolve_pattern, resolve_pattern_with_data, PatternError, ResolvedPattern};
use pipeshape::domain::url_context::UrlContext;
use serde_json::json;

fn request(url: &str, base: &str) -> UrlContext {
    UrlContext::parse(url, Some(base)).unwrap()
}

#[test]
fn test_positional_elements() {
    assert_eq!(resolve_pattern("a/$>1/b", &UrlContext::new("/xyz/qqq/abc")), "a/qqq/b");
    assert_eq!(resolve_pattern("a/$<1/b", &UrlContext::new("/xyz/qqq/abc/nnn")), "a/abc/b");
    assert_eq!(resolve_pattern("a/$>1/b", &UrlContext::new("/xyz")), "a/b");
}

#[test]
fn test_parsed_request_sections() {
    let url = request("http://host/api/v2/users/42/posts?sort=desc&tag=a&tag=b", "/api/v2");
    assert_eq!(resolve_pattern("$B>1/$>0/$>1", &url), "v2/users/42");
    assert_eq!(resolve_pattern("/store/$>0<0", &url), "/store/users/42/posts");
    assert_eq!(resolve_pattern("list?order=$?(sort)&tags=$?(tag)", &url), "list?order=desc&tags=a,b");
    assert_eq!(resolve_pattern("$P*", &url), "api/v2/users/42/posts?sort=desc&tag=a&tag=b");
}

#[test]
fn test_sub_path_and_name_sections() {
    let url = request("/files/docs/report", "/files")
        .with_sub_path("/tenants/acme")
        .with_name("reports/2024.json");
    assert_eq!(resolve_pattern("/store/$S>1/$N<0", &url), "/store/acme/2024.json");
    assert_eq!(resolve_pattern("/store/$S>0<0/$>0<0", &url), "/store/tenants/acme/docs/report");
    assert_eq!(resolve_pattern("/by-kind/$N>0/$N>5", &url), "/by-kind/reports");
}

#[test]
fn test_request_url_passed_through_once() {
    let url = request("/app/home?x=1", "/app");
    assert_eq!(resolve_pattern("/login?next=$$", &url), "/login?next=%2Fapp%2Fhome%3Fx%3D1");
    assert_eq!(resolve_pattern("/login?next=$$&again=$$", &url), "/login?next=%2Fapp%2Fhome%3Fx%3D1&again=");
}

#[test]
fn test_missing_query_argument_drops_segment() {
    let url = request("/svc/items", "/svc");
    assert_eq!(resolve_pattern("items/$?(page)/all", &url), "items/all");
}

#[test]
fn test_data_cross_product() {
    let url = UrlContext::new("/");
    let data = json!({ "prop": ["n", "m"], "prop2": ["x", "y"] });
    let resolved = resolve_pattern_with_data("a/b/${prop[]}/c/${prop2[]}", &url, &data).unwrap();
    assert_eq!(
        resolved,
        ResolvedPattern::Multiple(vec![
            "a/b/n/c/x".to_string(),
            "a/b/n/c/y".to_string(),
            "a/b/m/c/x".to_string(),
            "a/b/m/c/y".to_string(),
        ])
    );
}

#[test]
fn test_data_and_positional_combined() {
    let url = request("/users/42/profile", "/users");
    let data = json!({ "tenant": { "slug": "acme" } });
    let resolved = resolve_pattern_with_data("/t/${tenant.slug}/u/$>0", &url, &data).unwrap();
    assert_eq!(resolved, ResolvedPattern::Single("/t/acme/u/42".to_string()));
}

#[test]
fn test_empty_enumeration_yields_no_urls() {
    let resolved = resolve_pattern_with_data("a/${prop[]}", &UrlContext::new("/"), &json!({ "prop": [] })).unwrap();
    assert!(resolved.into_vec().is_empty());
}

#[test]
fn test_unusable_data_is_reported() {
    let url = UrlContext::new("/");
    let err = resolve_pattern_with_data("a/${obj}", &url, &json!({ "obj": { "k": 1 } })).unwrap_err();
    assert!(matches!(err, PatternError::Unusable { ref path, .. } if path == "obj"));
    assert!(err.to_string().contains("a/${obj}"));
}
