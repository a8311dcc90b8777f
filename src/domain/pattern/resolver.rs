// Macro resolution against positional path and query context

use crate::domain::url_context::{path_elements, UrlContext};

/// Marks an empty substitution until the cleanup pass; shares its spelling with the full-URL macro
pub(crate) const SENTINEL: &str = "$$";

/// Resolve positional, name and query macros in `pattern`.
///
/// Never fails: anything that cannot be resolved becomes an empty substitution,
/// and an empty substitution also swallows the `/` in front of it.
pub fn resolve_pattern(pattern: &str, url: &UrlContext) -> String {
    if pattern.is_empty() {
        return String::new();
    }

    let sections = Sections::new(url);
    let trailing = if url.is_directory { "/" } else { "" };
    let full_query = if url.query.is_empty() {
        String::new()
    } else {
        format!("?{}", url.query_string())
    };

    let resolved = pattern
        .replacen("$*", &format!("{}{}{}", url.path, trailing, full_query), 1)
        .replacen(
            "$$",
            &urlencoding::encode(url.full_url.as_deref().unwrap_or("")),
            1,
        )
        .replacen(
            "$P*",
            &format!("{}{}{}", sections.full.join("/"), trailing, full_query),
            1,
        )
        .replacen("$N*", url.name.as_deref().unwrap_or(""), 1);

    let resolved = replace_positional(&resolved, &sections);
    let resolved = replace_query(&resolved, url);

    resolved
        .replace(&format!("/{}", SENTINEL), "")
        .replace(SENTINEL, "")
}

/// Path parts addressable by a positional macro
struct Sections {
    current: Vec<String>,
    base: Vec<String>,
    sub: Vec<String>,
    name: Vec<String>,
    full: Vec<String>,
}

impl Sections {
    fn new(url: &UrlContext) -> Self {
        let parts = |path: Option<&str>| path.map(path_elements).unwrap_or_default();
        let current = path_elements(&url.path);
        let base = parts(url.base_path.as_deref());
        let full = base.iter().chain(current.iter()).cloned().collect();
        Self {
            sub: parts(url.sub_path.as_deref()),
            name: parts(url.name.as_deref()),
            current,
            base,
            full,
        }
    }

    fn get(&self, section: Option<char>) -> &[String] {
        match section {
            Some('B') => &self.base,
            Some('S') => &self.sub,
            Some('N') => &self.name,
            Some('P') => &self.full,
            _ => &self.current,
        }
    }
}

/// `$` + optional section + one or two positions
#[derive(Debug, Clone, PartialEq)]
struct PositionRef {
    section: Option<char>,
    first: i64,
    second: Option<i64>,
}

impl PositionRef {
    fn resolve(&self, sections: &Sections) -> String {
        let parts = sections.get(self.section);
        let len = parts.len() as i64;
        match self.second {
            Some(second) => {
                let end = if second == -1 { None } else { Some(second.saturating_add(1)) };
                slice(parts, self.first, end).join("/")
            }
            None => {
                let index = if self.first >= 0 { self.first } else { len + self.first };
                if (0..len).contains(&index) {
                    parts[index as usize].clone()
                } else {
                    String::new()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fallback {
    Literal(String),
    Position(PositionRef),
}

/// Slice with negative offsets counted from the end, clamped to the bounds
fn slice(parts: &[String], start: i64, end: Option<i64>) -> &[String] {
    let len = parts.len() as i64;
    let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
    let start = clamp(start);
    let end = end.map(clamp).unwrap_or(len);
    if start >= end {
        &[]
    } else {
        &parts[start as usize..end as usize]
    }
}

fn replace_positional(text: &str, sections: &Sections) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];
        match parse_macro(after) {
            Some((reference, fallback, consumed)) => {
                let primary = reference.resolve(sections);
                let substitution = if !primary.is_empty() {
                    primary
                } else {
                    match fallback {
                        None => SENTINEL.to_string(),
                        Some(Fallback::Literal(literal)) => literal,
                        Some(Fallback::Position(alt)) => {
                            let resolved = alt.resolve(sections);
                            if resolved.is_empty() {
                                SENTINEL.to_string()
                            } else {
                                resolved
                            }
                        }
                    }
                };
                out.push_str(&substitution);
                rest = &after[consumed..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parse the text following a `$`; returns the reference, its fallback and bytes consumed
fn parse_macro(text: &str) -> Option<(PositionRef, Option<Fallback>, usize)> {
    let (reference, mut consumed) = parse_reference(text)?;

    let fallback = match text[consumed..].strip_prefix(':') {
        Some(tail) if tail.starts_with('(') => parenthesized(&tail[1..]).map(|literal| {
            consumed += 2 + literal.len() + 1;
            Fallback::Literal(literal.to_string())
        }),
        Some(tail) if tail.starts_with('$') => parse_reference(&tail[1..]).map(|(alt, used)| {
            consumed += 2 + used;
            Fallback::Position(alt)
        }),
        _ => None,
    };

    Some((reference, fallback, consumed))
}

fn parse_reference(text: &str) -> Option<(PositionRef, usize)> {
    let mut consumed = 0;
    let section = text.chars().next().filter(|c| matches!(c, 'B' | 'S' | 'N' | 'P'));
    if section.is_some() {
        consumed += 1;
    }

    let (first, used) = parse_position(&text[consumed..])?;
    consumed += used;

    let second = parse_position(&text[consumed..]).map(|(second, used)| {
        consumed += used;
        second
    });

    Some((
        PositionRef {
            section,
            first,
            second,
        },
        consumed,
    ))
}

/// `>n` counts from the start, `<n` from the end (encoded as `-n-1`)
fn parse_position(text: &str) -> Option<(i64, usize)> {
    let from_end = match text.chars().next()? {
        '>' => false,
        '<' => true,
        _ => return None,
    };
    let digits = text[1..].chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let n = text[1..1 + digits].parse::<i64>().unwrap_or(i64::MAX);
    Some((if from_end { -n - 1 } else { n }, 1 + digits))
}

/// Text up to the first `)` after at least one character
fn parenthesized(body: &str) -> Option<&str> {
    let first_len = body.chars().next().map(char::len_utf8)?;
    body[first_len..]
        .find(')')
        .map(|close| &body[..first_len + close])
}

fn replace_query(text: &str, url: &UrlContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("$?") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        if let Some(tail) = after.strip_prefix('*') {
            out.push_str(&url.query_string());
            rest = tail;
            continue;
        }

        let name = after.strip_prefix('(').and_then(parenthesized);
        match name {
            Some(name) => {
                let joined = url
                    .query
                    .get(name)
                    .map(|values| values.join(","))
                    .unwrap_or_default();
                out.push_str(if joined.is_empty() { SENTINEL } else { &joined });
                rest = &after[name.len() + 2..];
            }
            None => {
                out.push_str("$?");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::url_context::parse_query;

    #[test]
    fn test_single_path_element() {
        let url = UrlContext::new("/xyz/qqq/abc");
        assert_eq!(resolve_pattern("a/$>1/b", &url), "a/qqq/b");
        let url = UrlContext::new("/xyz/qqq/abc/nnn");
        assert_eq!(resolve_pattern("a/$<1/b", &url), "a/abc/b");
    }

    #[test]
    fn test_missing_element_eats_slash() {
        let url = UrlContext::new("/xyz");
        assert_eq!(resolve_pattern("a/$>1/b", &url), "a/b");
    }

    #[test]
    fn test_ranges() {
        let url = UrlContext::new("/xyz/qqq/abc").with_base_path("/lll/mmm/nnn/ppp");
        assert_eq!(resolve_pattern("a/$B<2<1/b", &url), "a/mmm/nnn/b");
        assert_eq!(resolve_pattern("a/$B<2<0/b", &url), "a/mmm/nnn/ppp/b");
        assert_eq!(resolve_pattern("$P>0>1", &url), "lll/mmm");
    }

    #[test]
    fn test_fallbacks() {
        let url = UrlContext::new("/xyz");
        assert_eq!(resolve_pattern("a/$>1:(qqq)/b", &url), "a/qqq/b");
        assert_eq!(resolve_pattern("a/b/$>1:$>0", &url), "a/b/xyz");
        assert_eq!(resolve_pattern("a/b/$>1:$>4", &url), "a/b");
    }

    #[test]
    fn test_query_macros() {
        let url = UrlContext::new("/xyz").with_query(parse_query("p=9&q=1"));
        assert_eq!(resolve_pattern("a/$?(q)/b", &url), "a/1/b");
        assert_eq!(resolve_pattern("a/b?$?*", &url), "a/b?p=9&q=1");
    }

    #[test]
    fn test_empty_query_substitutions() {
        let url = UrlContext::new("/xyz");
        assert_eq!(resolve_pattern("a/b/$?*$?(ab)", &url), "a/b");
    }

    #[test]
    fn test_whole_path_macros() {
        let url = UrlContext::new("/x/y")
            .with_base_path("/svc")
            .with_directory(true)
            .with_query(parse_query("k=v w"))
            .with_name("item.json");
        assert_eq!(resolve_pattern("/root$*", &url), "/root/x/y/?k=v%20w");
        assert_eq!(resolve_pattern("$P*", &url), "svc/x/y/?k=v%20w");
        assert_eq!(resolve_pattern("files/$N*", &url), "files/item.json");
    }

    #[test]
    fn test_full_url_macro() {
        let url = UrlContext::new("/").with_full_url("http://h/a?b=1");
        assert_eq!(resolve_pattern("r?u=$$", &url), "r?u=http%3A%2F%2Fh%2Fa%3Fb%3D1");
    }

    #[test]
    fn test_sub_path_section() {
        let url = UrlContext::new("/x").with_sub_path("/s1/s2/s3");
        assert_eq!(resolve_pattern("$S>0", &url), "s1");
        assert_eq!(resolve_pattern("$S<0", &url), "s3");
        assert_eq!(resolve_pattern("a/$S>1<0", &url), "a/s2/s3");
        assert_eq!(resolve_pattern("a/$S>3/b", &url), "a/b");
    }

    #[test]
    fn test_name_section() {
        let url = UrlContext::new("/x").with_name("a/b");
        assert_eq!(resolve_pattern("$N<0", &url), "b");
        assert_eq!(resolve_pattern("$N>0", &url), "a");
        assert_eq!(resolve_pattern("files/$N>2", &url), "files");
    }

    #[test]
    fn test_full_url_is_used_once() {
        let url = UrlContext::new("/").with_full_url("http://h/a");
        assert_eq!(resolve_pattern("x$$y", &url), "xhttp%3A%2F%2Fh%2Fay");
        assert_eq!(resolve_pattern("x$$y$$z", &url), "xhttp%3A%2F%2Fh%2Fayz");
        assert_eq!(resolve_pattern("x$$y", &UrlContext::new("/")), "xy");
    }

    #[test]
    fn test_every_empty_substitution_is_removed() {
        let url = UrlContext::new("/x");
        assert_eq!(resolve_pattern("a/$>5/b/$>6/c", &url), "a/b/c");
    }

    #[test]
    fn test_plain_text_untouched() {
        let url = UrlContext::new("/a");
        assert_eq!(resolve_pattern("", &url), "");
        assert_eq!(resolve_pattern("cost $5 $x", &url), "cost $5 $x");
    }
}
