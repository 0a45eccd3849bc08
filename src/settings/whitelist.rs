// Hostname list helpers
//
// Whitelists are ordered sets persisted as JSON arrays. These helpers keep
// the set semantics (and URL to hostname extraction) in one place for the
// page, background and popup.

/// Check whether `hostname` is listed
pub fn contains(list: &[String], hostname: &str) -> bool {
    list.iter().any(|site| site == hostname)
}

/// Flip the membership of `hostname`. Returns true when it is now listed.
pub fn toggle(list: &mut Vec<String>, hostname: &str) -> bool {
    if contains(list, hostname) {
        list.retain(|site| site != hostname);
        false
    } else {
        list.push(hostname.to_string());
        true
    }
}

/// Remove `hostname`, preserving the order of the rest.
/// Returns true when something was removed.
pub fn remove(list: &mut Vec<String>, hostname: &str) -> bool {
    let before = list.len();
    list.retain(|site| site != hostname);
    list.len() != before
}

/// Hostname of a page URL; `None` when the URL is malformed or hostless
pub fn host_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_string())
}

/// Drop repeated entries, keeping the first occurrence
pub fn dedup(list: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(list.len());
    for item in list {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut sites = list(&["a.com", "b.com"]);
        assert!(toggle(&mut sites, "example.com"));
        assert_eq!(sites, list(&["a.com", "b.com", "example.com"]));
        assert!(!toggle(&mut sites, "example.com"));
        assert_eq!(sites, list(&["a.com", "b.com"]));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut sites = list(&["a.com", "b.com", "c.com"]);
        assert!(remove(&mut sites, "b.com"));
        assert!(!remove(&mut sites, "b.com"));
        assert_eq!(sites, list(&["a.com", "c.com"]));
    }

    #[test]
    fn test_host_from_url() {
        assert_eq!(
            host_from_url("https://www.example.com/gallery?page=2"),
            Some("www.example.com".to_string())
        );
        assert_eq!(host_from_url("http://localhost:8080/"), Some("localhost".to_string()));
        assert_eq!(host_from_url("about:blank"), None);
        assert_eq!(host_from_url("not a url"), None);
    }

    #[test]
    fn test_dedup_keeps_first() {
        assert_eq!(
            dedup(list(&["b.com", "a.com", "b.com"])),
            list(&["b.com", "a.com"])
        );
    }
}
