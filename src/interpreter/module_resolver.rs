use std::path::{Path, PathBuf};

/// Map a `use "X"` path to a source file, trying in order:
/// the literal path, `<root>/X`, the `package.ez` manifest's `main` entry,
/// `<root>/X.ez`, and `<root>/X/main.ez`.
pub fn resolve(path: &str, lib_root: &Path) -> Result<PathBuf, String> {
    let literal = PathBuf::from(path);
    if literal.is_file() {
        return Ok(literal);
    }

    let in_root = lib_root.join(path);
    if in_root.is_file() {
        return Ok(in_root);
    }

    let manifest = lib_root.join(path).join("package.ez");
    if manifest.is_file() {
        if let Some(main) = manifest_main(&manifest) {
            let main_path = lib_root.join(path).join(main);
            if main_path.is_file() {
                return Ok(main_path);
            }
        }
    }

    let with_ext = lib_root.join(format!("{}.ez", path));
    if with_ext.is_file() {
        return Ok(with_ext);
    }

    let default_main = lib_root.join(path).join("main.ez");
    if default_main.is_file() {
        return Ok(default_main);
    }

    Err(format!("Could not find module '{}'", path))
}

/// `package.ez` is a JSON document; only `main` matters for resolution.
fn manifest_main(manifest: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(manifest).ok()?;
    let json: serde_json::Value = serde_json::from_str(&contents).ok()?;
    Some(
        json.get("main")
            .and_then(|m| m.as_str())
            .unwrap_or("main.ez")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("ez-resolver-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(&root).unwrap();
        root
    }

    #[test]
    fn resolves_literal_file_first() {
        let root = temp_root("literal");
        let file = root.join("script.ez");
        fs::write(&file, "out 1").unwrap();
        let resolved = resolve(file.to_str().unwrap(), &root.join("lib")).unwrap();
        assert_eq!(resolved, file);
    }

    #[test]
    fn resolves_bare_file_in_lib_root() {
        let root = temp_root("bare");
        fs::write(root.join("util"), "out 1").unwrap();
        assert_eq!(resolve("util", &root).unwrap(), root.join("util"));
    }

    #[test]
    fn resolves_via_package_manifest() {
        let root = temp_root("manifest");
        let pkg = root.join("mathlib");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(
            pkg.join("package.ez"),
            r#"{"name": "mathlib", "main": "lib.ez"}"#,
        )
        .unwrap();
        fs::write(pkg.join("lib.ez"), "task double(x) { give x * 2 }").unwrap();
        assert_eq!(resolve("mathlib", &root).unwrap(), pkg.join("lib.ez"));
    }

    #[test]
    fn resolves_with_ez_extension() {
        let root = temp_root("ext");
        fs::write(root.join("strings.ez"), "out 1").unwrap();
        assert_eq!(resolve("strings", &root).unwrap(), root.join("strings.ez"));
    }

    #[test]
    fn falls_back_to_main_ez() {
        let root = temp_root("main");
        let pkg = root.join("web");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("main.ez"), "out 1").unwrap();
        assert_eq!(resolve("web", &root).unwrap(), pkg.join("main.ez"));
    }

    #[test]
    fn missing_module_reports_its_name() {
        let root = temp_root("missing");
        let err = resolve("no-such-module", &root).unwrap_err();
        assert!(err.contains("no-such-module"));
    }
}
