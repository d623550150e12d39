//! Remote path helpers
//!
//! SFTP paths are always `/`-separated, whatever the local OS, so
//! `std::path` is not usable here.

/// Lexically normalize a slash-separated path
///
/// Collapses repeated slashes, removes `.` elements and resolves `..` against
/// the preceding element. `..` at the root of an absolute path is dropped.
/// An empty result becomes `"."`.
#[must_use]
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for element in path.split('/') {
        match element {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join `name` onto `base` and clean the result
///
/// An absolute `name` replaces `base`. Empty elements are ignored.
#[must_use]
pub fn join(base: &str, name: &str) -> String {
    if name.starts_with('/') || base.is_empty() {
        return clean(name);
    }
    if name.is_empty() {
        return clean(base);
    }
    clean(&format!("{}/{}", base, name))
}

/// Split after the final slash: `("dir/", "file")`
///
/// With no slash the directory part is empty. Concatenating the two parts
/// gives back `path`.
#[must_use]
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}
