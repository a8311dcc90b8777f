use anyhow::{bail, Context, Result};
use axum::http::Method;

use crate::config::service_settings::ServiceSettings;
use crate::domain::service::{Service, ServiceKind, ServiceMap};
use crate::domain::transform::{HelperRegistry, TransformSpec};

pub const DEFAULT_CONFIG_FILE: &str = "services.yml";

impl TryFrom<ServiceSettings> for Service {
    type Error = anyhow::Error;

    fn try_from(value: ServiceSettings) -> Result<Self> {
        let kind = match (value.transform, value.redirect) {
            (Some(transform), None) => {
                let spec = TransformSpec::parse(&transform, HelperRegistry::shared())
                    .with_context(|| format!("Invalid transform for service '{}'", value.path))?;
                ServiceKind::Transform(spec)
            }
            (None, Some(redirect)) => ServiceKind::Redirect(redirect),
            (Some(_), Some(_)) => bail!(
                "Service '{}' declares both a transform and a redirect",
                value.path
            ),
            (None, None) => bail!(
                "Service '{}' must declare a transform or a redirect",
                value.path
            ),
        };

        for method in &value.methods {
            Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid method '{}' for service '{}'", method, value.path))?;
        }

        Ok(Service::new(&value.path, &value.description, kind).with_methods(value.methods))
    }
}

/// Build the service map from YAML text; duplicate base paths are rejected
pub fn parse_services(yml: &str) -> Result<ServiceMap> {
    let settings: Vec<ServiceSettings> =
        serde_yaml::from_str(yml).context("Invalid services configuration")?;

    let mut services = ServiceMap::new();
    for entry in settings {
        let service = Service::try_from(entry)?;
        let path = service.path.clone();
        if services.insert(service).is_some() {
            bail!("Duplicate service path: {}", path);
        }
    }
    Ok(services)
}

pub fn load_services(maybe_yml: Option<&str>) -> Result<ServiceMap> {
    let path = maybe_yml.unwrap_or(DEFAULT_CONFIG_FILE);
    let yml = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read services file '{}'", path))?;
    parse_services(&yml).with_context(|| format!("Failed to load services from '{}'", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_map() {
        let yml = r#"
- path: /shape
  description: Reshape a document
  methods: [post]
  transform:
    total: a + b
- path: /go
  redirect: https://example.com/$1
"#;
        let services = parse_services(yml).unwrap();
        assert_eq!(services.len(), 2);
        let shape = services.find("/shape").unwrap();
        assert_eq!(shape.kind_name(), "transform");
        assert_eq!(shape.methods, vec!["POST"]);
        assert_eq!(services.find("/go/rust").unwrap().kind_name(), "redirect");
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let yml = r#"
- path: /a
  redirect: x
- path: /a/
  redirect: y
"#;
        let err = parse_services(yml).unwrap_err();
        assert!(err.to_string().contains("Duplicate service path: /a"));
    }

    #[test]
    fn test_kind_combinations_rejected() {
        let both = "- path: /a\n  redirect: x\n  transform: a\n";
        assert!(parse_services(both).is_err());
        let neither = "- path: /a\n";
        assert!(parse_services(neither).is_err());
    }

    #[test]
    fn test_bad_transform_expression_rejected() {
        let yml = "- path: /a\n  transform:\n    q: \"(a\"\n";
        let err = parse_services(yml).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid transform for service '/a'"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_services(Some("/nonexistent/services.yml")).is_err());
    }

    #[test]
    fn test_bundled_services_file_loads() {
        let services = load_services(Some(concat!(env!("CARGO_MANIFEST_DIR"), "/services.yml"))).unwrap();
        assert!(!services.is_empty());
    }
}
