// URL context consumed by pattern resolution and transformations

use indexmap::IndexMap;

/// Query arguments: key to ordered values, in first-seen key order
pub type QueryArgs = IndexMap<String, Vec<String>>;

/// Positional and query context for resolving patterns against a request URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlContext {
    /// Path relative to the service base path (the "current path")
    pub path: String,
    pub base_path: Option<String>,
    pub sub_path: Option<String>,
    pub full_url: Option<String>,
    pub query: QueryArgs,
    pub name: Option<String>,
    pub is_directory: bool,
}

impl UrlContext {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }

    pub fn with_full_url(mut self, full_url: impl Into<String>) -> Self {
        self.full_url = Some(full_url.into());
        self
    }

    pub fn with_query(mut self, query: QueryArgs) -> Self {
        self.query = query;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_directory(mut self, is_directory: bool) -> Self {
        self.is_directory = is_directory;
        self
    }

    /// Build a context from an absolute or site-relative URL.
    ///
    /// When the URL path starts with every element of `base_path`, those
    /// elements become the base path and the rest the current path.
    pub fn parse(raw_url: &str, base_path: Option<&str>) -> Result<Self, url::ParseError> {
        let parsed = match url::Url::parse(raw_url) {
            Ok(parsed) => parsed,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                url::Url::parse("http://localhost/")?.join(raw_url)?
            }
            Err(e) => return Err(e),
        };

        let raw_path = parsed.path();
        let is_directory = raw_path.ends_with('/');
        let elements: Vec<String> = path_elements(raw_path)
            .into_iter()
            .map(|el| {
                urlencoding::decode(&el)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| el.clone())
            })
            .collect();

        let base_elements = base_path.map(path_elements).unwrap_or_default();
        let base_count = if base_elements.len() <= elements.len()
            && base_elements.iter().zip(&elements).all(|(b, e)| b == e)
        {
            base_elements.len()
        } else {
            0
        };

        Ok(Self {
            path: format!("/{}", elements[base_count..].join("/")),
            base_path: (base_count > 0).then(|| format!("/{}", elements[..base_count].join("/"))),
            sub_path: None,
            full_url: Some(raw_url.to_string()),
            query: parse_query(parsed.query().unwrap_or("")),
            name: None,
            is_directory,
        })
    }

    /// Query arguments as `key=value&...`, value-less keys omitted
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .flat_map(|(key, values)| {
                values.iter().map(move |value| {
                    if value.is_empty() {
                        key.clone()
                    } else {
                        format!("{}={}", key, urlencoding::encode(value))
                    }
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Split a path into its non-empty `/`-separated elements
pub fn path_elements(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', "%20");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| spaced.clone())
}

/// Repeated keys accumulate; a key without `=value` keeps an empty list
pub fn parse_query(query_string: &str) -> QueryArgs {
    let mut args = QueryArgs::new();
    for part in query_string.split('&').filter(|part| !part.is_empty()) {
        let (key, value) = match part.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (part, None),
        };
        let values = args.entry(decode_component(key)).or_default();
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            values.push(decode_component(value));
        }
    }
    args
}
