// ABOUTME: Import resolution: flattens a program's import graph into one top-level block

use crate::ast::{Block, Stmt};
use crate::error::ImportError;
use crate::parser::parse_program;
use indexmap::IndexSet;
use std::path::{Path, PathBuf};

fn canned_module_source(name: &str) -> Option<&'static str> {
    Some(match name {
        "math" => MATH_MODULE,
        "arrays" => ARRAYS_MODULE,
        "objects" => OBJECTS_MODULE,
        "json" => JSON_MODULE,
        "http" => HTTP_MODULE,
        _ => return None,
    })
}

const MATH_MODULE: &str = r#"
module math {
    fn abs(x) {
        if (x < 0) { return -x; }
        return x;
    }
    fn min(a, b) {
        if (a < b) { return a; }
        return b;
    }
    fn max(a, b) {
        if (a > b) { return a; }
        return b;
    }
    fn clamp(x, lo, hi) {
        if (x < lo) { return lo; }
        if (x > hi) { return hi; }
        return x;
    }
    fn pow(base, exp) {
        let result = 1;
        let i = 0;
        while (i < exp) {
            result = result * base;
            i = i + 1;
        }
        return result;
    }
    fn sum(arr) {
        let total = 0;
        for (x in arr) {
            total = total + x;
        }
        return total;
    }
}
"#;

const ARRAYS_MODULE: &str = r#"
module arrays {
    fn first(arr) {
        return arr[0];
    }
    fn last(arr) {
        return arr[len(arr) - 1];
    }
    fn sum(arr) {
        let total = 0;
        for (x in arr) {
            total = total + x;
        }
        return total;
    }
    fn enumerate(arr) {
        return [[i, x] for i, x in arr];
    }
}
"#;

const OBJECTS_MODULE: &str = r#"
module objects {
    fn merge(a, b) {
        let result = object_new();
        for (k, v in a) {
            object_set(result, k, v);
        }
        for (k, v in b) {
            object_set(result, k, v);
        }
        return result;
    }
    fn get_or(obj, key, fallback) {
        if (has(obj, key)) {
            return object_get(obj, key);
        }
        return fallback;
    }
}
"#;

const JSON_MODULE: &str = r#"
module json {
    fn parse(s) {
        if (s == "true") { return true; }
        if (s == "false") { return false; }
        if (s == "null") { return null; }
        try {
            return int(s);
        } catch (e) {
            return s;
        }
    }
    fn stringify(x) {
        return str(x);
    }
}
"#;

const HTTP_MODULE: &str = r#"
module http {
    fn get(path) {
        return {ok: true, status: 200, body: read(path), path: path};
    }
    fn text(resp) {
        return object_get(resp, "body");
    }
    fn ok(resp) {
        return object_get(resp, "ok");
    }
}
"#;

/// Parses `entry_path` and recursively inlines every import it reaches,
/// in visitation order, deduping by resolved identity so a module imported
/// from two places (or a dependency cycle) is only flattened once.
pub fn resolve_program(entry_path: &Path) -> Result<Block, ImportError> {
    let src = std::fs::read_to_string(entry_path).map_err(|e| ImportError::Unreadable {
        path: entry_path.display().to_string(),
        message: e.to_string(),
    })?;
    let block = parse_program(&src)?;
    let base_dir = entry_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut visited = IndexSet::new();
    visited.insert(canonical_key(entry_path));
    let mut out = Vec::new();
    flatten(block, &base_dir, &mut visited, &mut out)?;
    Ok(Block { stmts: out })
}

fn canonical_key(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

fn flatten(
    block: Block,
    base_dir: &Path,
    visited: &mut IndexSet<String>,
    out: &mut Vec<Stmt>,
) -> Result<(), ImportError> {
    for stmt in block.stmts {
        match stmt {
            Stmt::Import(path, _) => {
                if let Some(rest) = path.strip_prefix("cy:") {
                    if visited.contains(&path) {
                        continue;
                    }
                    visited.insert(path.clone());
                    let source = canned_module_source(rest)
                        .ok_or_else(|| ImportError::UnknownModule { path: path.clone() })?;
                    let module_block = parse_program(source)?;
                    flatten(module_block, base_dir, visited, out)?;
                } else {
                    let resolved = base_dir.join(&path);
                    let key = canonical_key(&resolved);
                    if visited.contains(&key) {
                        continue;
                    }
                    visited.insert(key);
                    let source =
                        std::fs::read_to_string(&resolved).map_err(|e| ImportError::Unreadable {
                            path: path.clone(),
                            message: e.to_string(),
                        })?;
                    let module_block = parse_program(&source)?;
                    let module_dir = resolved
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| PathBuf::from("."));
                    flatten(module_block, &module_dir, visited, out)?;
                }
            }
            other => out.push(other),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_builtin_module_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"import "cy:nope";"#).unwrap();
        let err = resolve_program(f.path()).unwrap_err();
        assert!(matches!(err, ImportError::UnknownModule { .. }));
    }

    #[test]
    fn cy_math_flattens_to_a_module_decl() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"import "cy:math";"#).unwrap();
        let block = resolve_program(f.path()).unwrap();
        assert!(matches!(block.stmts[0], Stmt::Module { .. }));
    }

    #[test]
    fn duplicate_imports_are_idempotent() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"import "cy:math"; import "cy:math";"#).unwrap();
        let block = resolve_program(f.path()).unwrap();
        assert_eq!(block.stmts.len(), 1);
    }
}
