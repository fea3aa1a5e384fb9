//! Checks that `tests/unit` mirrors `src` file for file

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::io;
    use std::path::Path;

    const SRC_DIR: &str = "src";
    const UNIT_DIR: &str = "tests/unit";

    /// Relative paths of every directory and `.rs` file below `dir`
    fn collect_relative_paths(dir: &Path, base: &Path) -> io::Result<BTreeSet<String>> {
        let mut paths = BTreeSet::new();
        if !dir.is_dir() {
            return Ok(paths);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let relative = path
                .strip_prefix(base)
                .map_err(|_strip_error| io::Error::other("failed to strip prefix"))?
                .to_string_lossy()
                .replace('\\', "/");

            if path.is_dir() {
                paths.extend(collect_relative_paths(&path, base)?);
                paths.insert(relative);
            } else if path.extension().and_then(|ext| ext.to_str()) == Some("rs") {
                paths.insert(relative);
            }
        }
        Ok(paths)
    }

    // Crate roots and module files carry no logic of their own
    fn is_wiring_file(relative: &str) -> bool {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        matches!(name, "main.rs" | "lib.rs" | "mod.rs")
    }

    fn tree(dir: &str) -> BTreeSet<String> {
        let path = Path::new(dir);
        collect_relative_paths(path, path)
            .unwrap_or_else(|error| panic!("failed to read {dir}: {error}"))
    }

    #[test]
    fn test_all_src_files_have_unit_tests() {
        let src_paths = tree(SRC_DIR);
        let test_paths = tree(UNIT_DIR);

        let missing: Vec<String> = src_paths
            .iter()
            .filter(|path| !is_wiring_file(path) && !test_paths.contains(*path))
            .map(|path| format!("  - src/{path} -> tests/unit/{path}"))
            .collect();

        assert!(
            missing.is_empty(),
            "The following src files/directories are missing unit test counterparts:\n{}",
            missing.join("\n")
        );
    }

    #[test]
    fn test_all_unit_tests_have_src_counterparts() {
        let src_paths = tree(SRC_DIR);
        let test_paths = tree(UNIT_DIR);

        let orphaned: Vec<String> = test_paths
            .iter()
            .filter(|path| !is_wiring_file(path) && !src_paths.contains(*path))
            .map(|path| format!("  - tests/unit/{path} -> src/{path} (missing)"))
            .collect();

        assert!(
            orphaned.is_empty(),
            "The following unit test files/directories have no corresponding src files:\n{}",
            orphaned.join("\n")
        );
    }

    fn files_without_tests(dir: &Path, found: &mut Vec<String>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                files_without_tests(&path, found)?;
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some("rs") {
                continue;
            }
            let relative = path.to_string_lossy().replace('\\', "/");
            if is_wiring_file(&relative) {
                continue;
            }
            if !fs::read_to_string(&path)?.contains("#[test]") {
                found.push(format!("  - {}", path.display()));
            }
        }
        Ok(())
    }

    #[test]
    fn test_all_test_files_contain_tests() {
        let mut found = Vec::new();
        files_without_tests(Path::new("tests"), &mut found)
            .unwrap_or_else(|error| panic!("failed to scan tests: {error}"));

        assert!(
            found.is_empty(),
            "The following test files don't contain any #[test] functions:\n{}",
            found.join("\n")
        );
    }
}
