//! Source reference resolution.

use indexmap::IndexMap;

/// Join `reference` onto the directory of `base`.
///
/// Absolute URLs (`scheme://...`) and root paths (`/...`) are returned as
/// they are. `.` and `..` segments are collapsed; `..` never climbs above the
/// root or the origin.
pub fn resolve_url(base: Option<&str>, reference: &str) -> String {
    if reference.contains("://") || reference.starts_with('/') {
        return reference.to_string();
    }

    let base = base.unwrap_or("");
    let base = base.split(['?', '#']).next().unwrap_or(base);

    // Keep `scheme://host` out of the path arithmetic.
    let (origin, path) = match base.find("://") {
        Some(scheme_end) => {
            let host_start = scheme_end + 3;
            match base[host_start..].find('/') {
                Some(slash) => base.split_at(host_start + slash),
                None => (base, "/"),
            }
        }
        None => ("", base),
    };

    let directory = match path.rfind('/') {
        Some(slash) => &path[..=slash],
        None => "",
    };
    let rooted = directory.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    let joined = format!("{directory}{reference}");
    let trailing_slash = joined.ends_with('/');
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted && origin.is_empty() {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut url = String::from(origin);
    if rooted || !origin.is_empty() {
        url.push('/');
    }
    url.push_str(&segments.join("/"));
    if trailing_slash && !segments.is_empty() {
        url.push('/');
    }
    url
}

/// Where a component lives and which tags it imported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionContext {
    /// URL of the component being compiled.
    pub url: Option<String>,
    /// Tag name to source reference.
    pub imports: IndexMap<String, String>,
}

impl ResolutionContext {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            imports: IndexMap::new(),
        }
    }

    pub fn with_import(mut self, tag: impl Into<String>, source: impl Into<String>) -> Self {
        self.imports.insert(tag.into().to_ascii_lowercase(), source.into());
        self
    }

    pub fn imports(&self, tag: &str) -> bool {
        self.imports.contains_key(&tag.to_ascii_lowercase())
    }

    /// The source URL for a component tag: an explicit import when there is
    /// one, otherwise `<tag><extension>` next to the current component.
    pub fn resolve_component(&self, tag: &str, extension: &str) -> String {
        let tag = tag.to_ascii_lowercase();
        let reference = match self.imports.get(&tag) {
            Some(source) => source.clone(),
            None => format!("./{tag}{extension}"),
        };
        resolve_url(self.url.as_deref(), &reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_references_join_the_base_directory() {
        assert_eq!(resolve_url(Some("/app/main.html"), "./card.html"), "/app/card.html");
        assert_eq!(resolve_url(Some("/app/views/main.html"), "../card.html"), "/app/card.html");
        assert_eq!(resolve_url(Some("/main.html"), "../../x.html"), "/x.html");
        assert_eq!(resolve_url(None, "card.html"), "card.html");
        assert_eq!(resolve_url(Some("lib/a.html"), "../../b.html"), "../b.html");
    }

    #[test]
    fn origins_are_preserved() {
        assert_eq!(
            resolve_url(Some("https://cdn.test/ui/app.html?v=3"), "parts/nav.html"),
            "https://cdn.test/ui/parts/nav.html"
        );
        assert_eq!(
            resolve_url(Some("https://cdn.test"), "nav.html"),
            "https://cdn.test/nav.html"
        );
    }

    #[test]
    fn absolute_references_pass_through() {
        assert_eq!(resolve_url(Some("/app/main.html"), "/shared/x.html"), "/shared/x.html");
        assert_eq!(
            resolve_url(Some("/app/main.html"), "https://x.test/y.html"),
            "https://x.test/y.html"
        );
    }

    #[test]
    fn component_tags_resolve_by_import_or_convention() {
        let ctx = ResolutionContext::new(Some("/app/main.html".into()))
            .with_import("user-card", "./cards/user.html");
        assert_eq!(ctx.resolve_component("user-card", ".html"), "/app/cards/user.html");
        assert_eq!(ctx.resolve_component("todo-item", ".html"), "/app/todo-item.html");
        assert!(ctx.imports("User-Card"));
    }
}
