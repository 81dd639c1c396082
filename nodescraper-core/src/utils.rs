//! Small helpers shared across the registry, hooks, and differ.

use std::path::Path;

/// `PascalCase` / `CamelCase` identifier to `snake_case`, matching the
/// directory-naming convention the filesystem log hook uses for plugin and
/// task class names.
pub fn pascal_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.char_indices() {
        if ch.is_uppercase() {
            if i != 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Finds a filename that does not already exist under `dir` by appending
/// ` (n)` before the extension on collision, matching the source's sidecar
/// file deduplication.
pub fn unique_filename(dir: &Path, filename: &str) -> String {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return filename.to_string();
    }

    let path = Path::new(filename);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(filename);
    let ext = path.extension().and_then(|s| s.to_str());

    let mut n = 1;
    loop {
        let candidate_name = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if !dir.join(&candidate_name).exists() {
            return candidate_name;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_to_snake_converts_boundaries() {
        assert_eq!(pascal_to_snake("KernelPlugin"), "kernel_plugin");
        assert_eq!(pascal_to_snake("CmdlineAnalyzer"), "cmdline_analyzer");
        assert_eq!(pascal_to_snake("RDMAPlugin"), "r_d_m_a_plugin");
        assert_eq!(pascal_to_snake("plain"), "plain");
    }

    #[test]
    fn unique_filename_dedupes_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("log.txt"), b"a").unwrap();
        let name = unique_filename(dir.path(), "log.txt");
        assert_eq!(name, "log (1).txt");

        std::fs::write(dir.path().join("log (1).txt"), b"b").unwrap();
        let name2 = unique_filename(dir.path(), "log.txt");
        assert_eq!(name2, "log (2).txt");
    }

    #[test]
    fn unique_filename_passes_through_when_no_collision() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_filename(dir.path(), "fresh.json"), "fresh.json");
    }
}
