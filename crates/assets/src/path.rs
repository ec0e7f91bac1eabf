//! Slash-separated asset paths as written in configs.

/// Join an optional root directory and a relative path.
pub fn join(root: Option<&str>, path: &str) -> String {
    match root.map(|r| r.trim_end_matches('/')) {
        Some(root) if !root.is_empty() => format!("{root}/{}", path.trim_start_matches('/')),
        _ => path.to_owned(),
    }
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its extension.
pub fn file_stem(path: &str) -> String {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_owned(),
        _ => name.to_owned(),
    }
}

/// Lowercase extension, empty when there is none.
pub fn extension(path: &str) -> String {
    match file_name(path).rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Append `extension` when the file name has none.
pub fn with_default_extension(path: &str, extension: &str) -> String {
    if extension.is_empty() || file_name(path).contains('.') {
        path.to_owned()
    } else {
        format!("{path}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_with_single_separator() {
        assert_eq!(join(Some("textures/"), "a.jpg"), "textures/a.jpg");
        assert_eq!(join(Some("textures"), "/a.jpg"), "textures/a.jpg");
        assert_eq!(join(Some(""), "a.jpg"), "a.jpg");
        assert_eq!(join(None, "a.jpg"), "a.jpg");
    }

    #[test]
    fn stems_and_extensions() {
        assert_eq!(file_stem("a/b/oak.diffuse.jpg"), "oak.diffuse");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(extension("models/Chair.FBX"), "fbx");
        assert_eq!(extension("models.d/chair"), "");
    }

    #[test]
    fn default_extension_only_for_bare_names() {
        assert_eq!(with_default_extension("sky/px", "jpg"), "sky/px.jpg");
        assert_eq!(with_default_extension("sky/px.png", "jpg"), "sky/px.png");
        assert_eq!(with_default_extension("dir.v2/px", "hdr"), "dir.v2/px.hdr");
    }
}
