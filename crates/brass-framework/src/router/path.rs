/// Joins path segments into one absolute path.
///
/// Repeated slashes collapse into one and a trailing slash is dropped; the
/// empty join is `/`.
pub fn join_paths<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for segment in segments {
        path.push('/');
        path.push_str(segment.as_ref());
    }

    let mut joined = String::with_capacity(path.len() + 1);
    for c in path.chars() {
        if c == '/' && joined.ends_with('/') {
            continue;
        }
        joined.push(c);
    }

    if joined.ends_with('/') {
        joined.pop();
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// `base` followed by a `*` segment, matching everything below it.
pub fn wildcard_path(base: &str) -> String {
    join_paths(&[base, "*"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths(&["users/", "/42//profile/"]), "/users/42/profile");
        assert_eq!(join_paths::<&str>(&[]), "/");
        assert_eq!(join_paths(&["/"]), "/");
        assert_eq!(join_paths(&["", "/"]), "/");
        assert_eq!(join_paths(&["/api", ":id"]), "/api/:id");
    }

    #[test]
    fn test_wildcard_path() {
        assert_eq!(wildcard_path("/users/"), "/users/*");
        assert_eq!(wildcard_path("/"), "/*");
    }
}
