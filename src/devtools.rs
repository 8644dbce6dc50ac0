//! Developer tooling behind the `agentflow-dev` binary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use walkdir::WalkDir;

use crate::error::{FlowError, Result};

pub const CODE_FILE: &str = "all_code.md";
pub const DOCS_FILE: &str = "all_docs.md";

/// Paths written by [`generate_ai_files`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFiles {
    pub code: PathBuf,
    pub docs: PathBuf,
    pub code_sources: usize,
    pub doc_sources: usize,
}

/// Files under `dir` (recursively) whose extension is in `extensions`,
/// sorted by path.
fn collect(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| extensions.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

fn concatenate(files: &[PathBuf], output: &Path) -> Result<()> {
    let mut out = fs::File::create(output)?;
    for file in files {
        let absolute = fs::canonicalize(file)?;
        write!(out, "# agentflow Source File: {}\n\n", absolute.display())?;
        out.write_all(fs::read_to_string(file)?.as_bytes())?;
        out.write_all(b"\n\n")?;
    }
    Ok(())
}

/// Concatenate the crate sources under `repo_root/src` and the book under
/// `repo_root/docs` into two markdown files in `output_dir`, for use as
/// model context.
pub fn generate_ai_files(repo_root: &Path, output_dir: &Path) -> Result<GeneratedFiles> {
    let src = repo_root.join("src");
    let docs = repo_root.join("docs");
    fs::create_dir_all(output_dir)?;

    tracing::debug!(src = %src.display(), docs = %docs.display(), "Collecting sources");

    let code_files = collect(&src, &["rs"]);
    let mut doc_files = collect(&docs, &["md"]);
    let book = docs.join("book.toml");
    if book.is_file() {
        doc_files.push(book);
    }

    let generated = GeneratedFiles {
        code: output_dir.join(CODE_FILE),
        docs: output_dir.join(DOCS_FILE),
        code_sources: code_files.len(),
        doc_sources: doc_files.len(),
    };
    concatenate(&code_files, &generated.code)?;
    concatenate(&doc_files, &generated.docs)?;

    tracing::info!(
        "Generated {} and {} in {}",
        CODE_FILE,
        DOCS_FILE,
        output_dir.display()
    );
    Ok(generated)
}

/// Serve the documentation book with `mdbook serve` from `repo_root/docs`.
pub fn serve_docs(repo_root: &Path) -> Result<()> {
    let docs = repo_root.join("docs");
    if !docs.is_dir() {
        return Err(FlowError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Docs directory not found at {}", docs.display()),
        )));
    }

    tracing::info!("Running 'mdbook serve' in {}", docs.display());
    let status = Command::new("mdbook").arg("serve").current_dir(&docs).status()?;
    if !status.success() {
        return Err(anyhow::anyhow!("'mdbook serve' exited with {}", status).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_generate_ai_files_concatenates_sources() {
        let repo = TempDir::new().unwrap();
        write(repo.path(), "src/lib.rs", "pub mod a;");
        write(repo.path(), "src/a/mod.rs", "pub fn a() {}");
        write(repo.path(), "src/notes.txt", "ignored");
        write(repo.path(), "docs/src/intro.md", "# Intro");
        write(repo.path(), "docs/book.toml", "[book]");

        let out = TempDir::new().unwrap();
        let generated = generate_ai_files(repo.path(), out.path()).unwrap();
        assert_eq!(generated.code_sources, 2);
        assert_eq!(generated.doc_sources, 2);

        let code = fs::read_to_string(&generated.code).unwrap();
        assert_eq!(code.matches("# agentflow Source File: ").count(), 2);
        assert!(code.contains("pub fn a() {}"));
        assert!(!code.contains("ignored"));

        let docs = fs::read_to_string(&generated.docs).unwrap();
        assert!(docs.contains("# Intro"));
        assert!(docs.contains("[book]"));
    }

    #[test]
    fn test_missing_docs_produce_empty_file() {
        let repo = TempDir::new().unwrap();
        write(repo.path(), "src/lib.rs", "");

        let out = TempDir::new().unwrap();
        let target = out.path().join("nested");
        let generated = generate_ai_files(repo.path(), &target).unwrap();
        assert_eq!(generated.doc_sources, 0);
        assert_eq!(fs::read_to_string(target.join(DOCS_FILE)).unwrap(), "");
    }

    #[test]
    fn test_serve_docs_requires_docs_dir() {
        let repo = TempDir::new().unwrap();
        let err = serve_docs(repo.path()).unwrap_err();
        assert!(err.to_string().contains("Docs directory not found"));
    }
}
