// Shared build script helpers: render a crate's README.md as its rustdoc.
// Include this in build.rs files with: include!("../build_common.rs");
//
// Required imports in the including file:
//   use std::env;
//   use std::fs;
//   use std::path::Path;

/// Write `README_GENERATED.md` to `OUT_DIR` for `#![doc = include_str!(..)]`.
///
/// Links into the source tree become intra-doc module paths:
/// `src/cache/mod.rs` → `cache`, `src/backend/http.rs` → `backend::http`.
/// Links to the workspace README point at the repository URL from the
/// workspace Cargo.toml.
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");
    println!("cargo:rerun-if-changed=../../Cargo.toml");

    let readme = fs::read_to_string(Path::new(crate_dir).join("README.md")).unwrap_or_default();
    let repo_url = workspace_repository(crate_dir);
    let rendered = rewrite_links(&readme, repo_url.as_deref());

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("README_GENERATED.md"), rendered)
        .expect("write README_GENERATED.md");
}

/// Rewrite every markdown link target `](...)` in `markdown`.
fn rewrite_links(markdown: &str, repo_url: Option<&str>) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;
    while let Some(start) = rest.find("](") {
        let (head, tail) = rest.split_at(start + 2);
        out.push_str(head);
        let Some(end) = tail.find(')') else {
            rest = tail;
            break;
        };
        out.push_str(&rewrite_target(&tail[..end], repo_url));
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

fn rewrite_target(target: &str, repo_url: Option<&str>) -> String {
    if let Some(module) = target
        .strip_prefix("src/")
        .and_then(|path| path.strip_suffix(".rs"))
    {
        let module = module.strip_suffix("/mod").unwrap_or(module);
        return module.replace('/', "::");
    }
    match (target.strip_prefix("../../README.md"), repo_url) {
        (Some(anchor), Some(url)) => format!("{url}{anchor}"),
        _ => target.to_string(),
    }
}

/// `repository = "..."` from the workspace manifest two levels up.
fn workspace_repository(crate_dir: &str) -> Option<String> {
    let manifest = Path::new(crate_dir).parent()?.parent()?.join("Cargo.toml");
    let content = fs::read_to_string(manifest).ok()?;
    content.lines().map(str::trim).find_map(|line| {
        let value = line.strip_prefix("repository")?.trim_start().strip_prefix('=')?;
        Some(value.trim().trim_matches('"').to_string())
    })
}
