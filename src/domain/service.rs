// Configured pipeline services and base-path dispatch

use indexmap::IndexMap;

use super::transform::TransformSpec;
use super::url_context::path_elements;

/// What a service does with a matched request
#[derive(Debug, Clone)]
pub enum ServiceKind {
    /// Run the transform over the JSON request body
    Transform(TransformSpec),
    /// Resolve the pattern against the request URL and redirect to it
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct Service {
    pub path: String,
    pub description: String,
    /// Upper-case method names; empty accepts every method
    pub methods: Vec<String>,
    pub kind: ServiceKind,
}

impl Service {
    pub fn new(path: &str, description: &str, kind: ServiceKind) -> Self {
        Self {
            path: normalize_path(path),
            description: description.to_string(),
            methods: Vec::new(),
            kind,
        }
    }

    pub fn with_methods(mut self, methods: Vec<String>) -> Self {
        self.methods = methods.into_iter().map(|m| m.to_uppercase()).collect();
        self
    }

    pub fn allows(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ServiceKind::Transform(_) => "transform",
            ServiceKind::Redirect(_) => "redirect",
        }
    }
}

/// Services keyed by normalized base path, in configuration order
#[derive(Debug, Clone, Default)]
pub struct ServiceMap {
    services: IndexMap<String, Service>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the service previously registered under the same path, if any
    pub fn insert(&mut self, service: Service) -> Option<Service> {
        self.services.insert(service.path.clone(), service)
    }

    /// Service whose base path is the longest whole-segment prefix of `path`
    pub fn find(&self, path: &str) -> Option<&Service> {
        let elements = path_elements(path);
        (0..=elements.len())
            .rev()
            .find_map(|n| self.services.get(&format!("/{}", elements[..n].join("/"))))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// `/a/b`, with empty and duplicate separators collapsed
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path_elements(path).join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(path: &str) -> Service {
        Service::new(path, "test", ServiceKind::Redirect("https://example.com".to_string()))
    }

    fn map(paths: &[&str]) -> ServiceMap {
        let mut map = ServiceMap::new();
        for path in paths {
            map.insert(redirect(path));
        }
        map
    }

    #[test]
    fn test_longest_prefix_wins() {
        let services = map(&["/", "/api", "/api/users"]);
        assert_eq!(services.find("/api/users/42").unwrap().path, "/api/users");
        assert_eq!(services.find("/api/orders").unwrap().path, "/api");
        assert_eq!(services.find("/other").unwrap().path, "/");
    }

    #[test]
    fn test_prefix_matches_whole_segments_only() {
        let services = map(&["/api"]);
        assert!(services.find("/apis").is_none());
        assert!(services.find("/api/").is_some());
    }

    #[test]
    fn test_duplicate_path_reported() {
        let mut services = ServiceMap::new();
        assert!(services.insert(redirect("/a/")).is_none());
        assert!(services.insert(redirect("a")).is_some());
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_method_filter() {
        let service = redirect("/").with_methods(vec!["get".to_string()]);
        assert!(service.allows("GET"));
        assert!(!service.allows("POST"));
        assert!(redirect("/").allows("DELETE"));
    }
}
