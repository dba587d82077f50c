//! Shared utility functions

/// Normalize an identifier or location to forward slashes.
///
/// Every identifier, scan location and plugin location passes through here
/// before it is stored, so `C:\data\a.txt` and `C:/data/a.txt`
/// name the same catalog entry.
///
/// # Examples
///
/// ```
/// use lattice::util::conform;
///
/// assert_eq!(conform(r"C:\dinos\trex.png"), "C:/dinos/trex.png");
/// assert_eq!(conform("https://host/a"), "https://host/a");
/// ```
pub fn conform(item: &str) -> String {
    item.replace('\\', "/")
}

/// Display name of an identifier: its last non-empty `/` segment.
///
/// Identifiers without a separator are their own display name.
pub fn display_name(identifier: &str) -> &str {
    identifier
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(identifier)
}

/// Lowercase and deduplicate tags, keeping first-seen order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
