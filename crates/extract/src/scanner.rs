//! Line-oriented Dockerfile scanner.

use sourcepin_core::classify::is_git_reference;
use sourcepin_core::reference::{Entry, Instruction, RawSourceRef, SourceFile, SourceKind};
use sourcepin_core::{Error, Result};
use std::path::Path;
use tracing::{debug, trace};

/// Extract references from a Dockerfile on disk.
pub fn extract_file(path: &Path) -> Result<SourceFile> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::extract(path, format!("cannot read file: {e}")))?;
    extract_source(path, &text)
}

/// Extract references from build-instruction text.
///
/// `path` is only used for labeling (it may name stdin); nothing is read
/// from disk.
pub fn extract_source(path: &Path, text: &str) -> Result<SourceFile> {
    let mut entries = Vec::new();
    let escape = escape_char(text);

    for logical in logical_lines(text, escape) {
        let LogicalLine { line, text } = logical;
        let mut tokens = text.split_whitespace();
        let Some(instruction) = tokens.next() else {
            continue;
        };
        let args: Vec<&str> = tokens.collect();

        if instruction.eq_ignore_ascii_case("FROM") {
            scan_from(path, line, &args, &mut entries)?;
        } else if instruction.eq_ignore_ascii_case("COPY") {
            scan_copy(path, line, &args, &mut entries);
        } else if instruction.eq_ignore_ascii_case("ADD") {
            scan_add(path, line, &args, &mut entries);
        }
    }

    debug!(
        file = %path.display(),
        entries = entries.len(),
        "extracted build-instruction references"
    );

    Ok(SourceFile {
        path: path.to_path_buf(),
        entries,
    })
}

/// `FROM [--platform=...] <image> [AS <stage>]`
fn scan_from(path: &Path, line: usize, args: &[&str], entries: &mut Vec<Entry>) -> Result<()> {
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));
    let Some(image) = positional.next() else {
        return Err(Error::extract(
            path,
            format!("line {line}: FROM requires an image reference"),
        ));
    };

    entries.push(Entry::Reference(RawSourceRef {
        original: (*image).to_string(),
        kind: SourceKind::Image,
        instruction: Instruction::From,
        checksum: None,
        file: path.to_path_buf(),
        line,
    }));

    // The stage declared here is only visible to later instructions, so it
    // lands in the stream after its own reference.
    if let (Some(keyword), Some(name)) = (positional.next(), positional.next())
        && keyword.eq_ignore_ascii_case("AS")
    {
        trace!(stage = %name, line, "declared build stage");
        entries.push(Entry::Stage((*name).to_string()));
    }

    Ok(())
}

/// `COPY [--from=<ref>] <src>... <dest>`
fn scan_copy(path: &Path, line: usize, args: &[&str], entries: &mut Vec<Entry>) {
    for arg in args {
        if let Some(source) = arg.strip_prefix("--from=") {
            entries.push(Entry::Reference(RawSourceRef {
                original: source.to_string(),
                kind: SourceKind::Image,
                instruction: Instruction::CopyFrom,
                checksum: None,
                file: path.to_path_buf(),
                line,
            }));
        }
    }
}

/// `ADD [--checksum=...] <src>... <dest>`
fn scan_add(path: &Path, line: usize, args: &[&str], entries: &mut Vec<Entry>) {
    let checksum = args
        .iter()
        .find_map(|a| a.strip_prefix("--checksum="))
        .map(String::from);

    let positional: Vec<&str> = args.iter().filter(|a| !a.starts_with("--")).copied().collect();
    if positional.len() < 2 {
        // ADD needs at least one source and a destination; heredoc and
        // malformed forms carry no remote reference for us.
        return;
    }

    // Last positional is the destination.
    for source in &positional[..positional.len() - 1] {
        let kind = if is_git_reference(source) {
            SourceKind::Git
        } else if source.starts_with("http://") || source.starts_with("https://") {
            SourceKind::Http
        } else {
            continue; // local path
        };

        entries.push(Entry::Reference(RawSourceRef {
            original: (*source).to_string(),
            kind,
            instruction: Instruction::Add,
            checksum: checksum.clone(),
            file: path.to_path_buf(),
            line,
        }));
    }
}

struct LogicalLine {
    /// 1-based number of the first physical line.
    line: usize,
    text: String,
}

/// Join continuation lines and drop comments, preserving the first physical
/// line number of each instruction.
fn logical_lines(text: &str, escape: char) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut current: Option<LogicalLine> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();

        // Comment lines are dropped even inside a continuation.
        if trimmed.starts_with('#') {
            continue;
        }

        let (fragment, continued) = match trimmed.strip_suffix(escape) {
            Some(rest) => (rest.trim_end(), true),
            None => (trimmed, false),
        };

        match current.as_mut() {
            Some(acc) => {
                if !fragment.is_empty() {
                    acc.text.push(' ');
                    acc.text.push_str(fragment);
                }
            }
            None => {
                if fragment.is_empty() && !continued {
                    continue;
                }
                current = Some(LogicalLine {
                    line,
                    text: fragment.to_string(),
                });
            }
        }

        if !continued && let Some(done) = current.take() {
            if !done.text.is_empty() {
                out.push(done);
            }
        }
    }

    if let Some(done) = current.take()
        && !done.text.is_empty()
    {
        out.push(done);
    }

    out
}

/// Honor the `# escape=` parser directive; the default escape is backslash.
fn escape_char(text: &str) -> char {
    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(directive) = trimmed.strip_prefix('#') else {
            break; // directives only appear before the first instruction
        };
        let directive = directive.trim();
        if let Some(value) = directive.strip_prefix("escape=")
            && let Some(c) = value.trim().chars().next()
        {
            return c;
        }
    }
    '\\'
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn refs(file: &SourceFile) -> Vec<&RawSourceRef> {
        file.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Reference(r) => Some(r),
                Entry::Stage(_) => None,
            })
            .collect()
    }

    fn stages(file: &SourceFile) -> Vec<&str> {
        file.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Stage(s) => Some(s.as_str()),
                Entry::Reference(_) => None,
            })
            .collect()
    }

    #[test]
    fn multi_stage_from() {
        let text = "FROM golang:1.23 AS builder\nFROM alpine:3.18\nCOPY --from=builder /bin/app /app\n";
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();

        let r = refs(&file);
        assert_eq!(r.len(), 3);
        assert_eq!(r[0].original, "golang:1.23");
        assert_eq!(r[0].kind, SourceKind::Image);
        assert_eq!(r[0].line, 1);
        assert_eq!(r[1].original, "alpine:3.18");
        assert_eq!(r[2].original, "builder");
        assert_eq!(r[2].instruction, Instruction::CopyFrom);

        assert_eq!(stages(&file), vec!["builder"]);
    }

    #[test]
    fn stage_declaration_follows_its_own_reference() {
        let text = "FROM golang:1.23 AS builder\n";
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        assert!(matches!(&file.entries[0], Entry::Reference(r) if r.original == "golang:1.23"));
        assert!(matches!(&file.entries[1], Entry::Stage(s) if s == "builder"));
    }

    #[test]
    fn from_with_platform_flag() {
        let text = "FROM --platform=linux/amd64 node:20 AS deps\n";
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        assert_eq!(refs(&file)[0].original, "node:20");
        assert_eq!(stages(&file), vec!["deps"]);
    }

    #[test]
    fn add_http_and_git_sources() {
        let text = concat!(
            "FROM scratch\n",
            "ADD https://example.com/tool.tar.gz /opt/\n",
            "ADD https://github.com/cli/cli.git#v2.40.0 /src\n",
            "ADD git@github.com:org/repo.git /src2\n",
            "ADD local/file.txt /etc/file.txt\n",
        );
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        let r = refs(&file);
        assert_eq!(r.len(), 4); // scratch + 3 remote sources
        assert_eq!(r[1].kind, SourceKind::Http);
        assert_eq!(r[2].kind, SourceKind::Git);
        assert_eq!(r[2].original, "https://github.com/cli/cli.git#v2.40.0");
        assert_eq!(r[3].kind, SourceKind::Git);
    }

    #[test]
    fn add_checksum_flag_is_captured() {
        let text = "ADD --checksum=sha256:abcd https://example.com/x /x\n";
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        let r = refs(&file);
        assert_eq!(r[0].checksum.as_deref(), Some("sha256:abcd"));
    }

    #[test]
    fn continuations_and_comments() {
        let text = concat!(
            "FROM \\\n",
            "  # tag chosen by the platform team\n",
            "  golang:1.23 \\\n",
            "  AS builder\n",
        );
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        let r = refs(&file);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].original, "golang:1.23");
        assert_eq!(r[0].line, 1);
        assert_eq!(stages(&file), vec!["builder"]);
    }

    #[test]
    fn escape_directive_changes_continuation() {
        let text = "# escape=`\nFROM `\n  alpine:3.18\n";
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        assert_eq!(refs(&file)[0].original, "alpine:3.18");
    }

    #[test]
    fn from_without_image_errors() {
        let err = extract_source(&PathBuf::from("Dockerfile"), "FROM\n").unwrap_err();
        assert!(err.to_string().contains("FROM requires an image reference"));
    }

    #[test]
    fn unrelated_instructions_are_ignored() {
        let text = "RUN curl -L https://example.com/install.sh | sh\nENV X=1\n";
        let file = extract_source(&PathBuf::from("Dockerfile"), text).unwrap();
        assert!(file.entries.is_empty());
    }

    #[test]
    fn extract_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM alpine:3.18\n").unwrap();
        let file = extract_file(&path).unwrap();
        assert_eq!(file.reference_count(), 1);
        assert_eq!(file.path, path);
    }

    #[test]
    fn missing_file_errors() {
        let err = extract_file(Path::new("/nonexistent/Dockerfile")).unwrap_err();
        assert!(err.to_string().contains("cannot read file"));
    }
}
