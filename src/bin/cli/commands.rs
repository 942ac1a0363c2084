//! Command implementations for the CLI tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use zipsession::{ArchiveSession, EntrySource, Error, OpenMode, OpenOptions, StreamId};

use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::file_selector::FileSelector;
use crate::output::{ArchiveSummary, TestReport, create_formatter};
use crate::password::{get_or_confirm_password, get_password};
use crate::progress::CommitProgress;
use crate::{CompressionMethod, EncryptionMethod, OutputFormat};

/// Configuration for the add command.
pub struct AddConfig<'a> {
    pub archive_path: &'a Path,
    pub files: &'a [PathBuf],
    pub method: CompressionMethod,
    pub level: u32,
    pub encryption: EncryptionMethod,
    pub password: Option<String>,
    pub exclude: &'a [String],
    pub recursive: bool,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// List command implementation
pub fn list(archive_path: &Path, technical: bool, format: OutputFormat) -> ExitCode {
    let session = match open_session(archive_path, OpenMode::ReadOnly) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let formatter = create_formatter(format);
    print!("{}", formatter.format_list(&session.entries(), technical));
    session.discard();
    ExitCode::Success
}

/// Cat command implementation
pub fn cat(archive_path: &Path, name: &str, password: Option<String>) -> ExitCode {
    let mut session = match open_session(archive_path, OpenMode::ReadOnly) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let index = match session.locate(name.as_bytes()) {
        Ok(i) => i,
        Err(e) => return report(&e),
    };

    let encrypted = session.stat(index).map(|r| r.is_encrypted()).unwrap_or(false);
    let password = get_password(password, encrypted);
    let stream = match session.open_entry(index, password.as_deref()) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let copied = copy_stream(&mut session, stream, |chunk| {
        out.write_all(chunk).map_err(Error::from)
    });
    let closed = session.close_stream(stream);
    if let Err(e) = copied.and(closed) {
        return report(&e);
    }
    if let Err(e) = out.flush() {
        eprintln!("Error: {}", e);
        return ExitCode::IoError;
    }

    session.discard();
    ExitCode::Success
}

/// Add command implementation
pub fn add(config: &AddConfig<'_>) -> ExitCode {
    let selector = match FileSelector::new(&[], config.exclude) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    let inputs = match collect_inputs(config.files, config.recursive, &selector) {
        Ok(inputs) => inputs,
        Err(code) => return code,
    };
    if inputs.is_empty() {
        eprintln!("Error: Nothing to add");
        return ExitCode::BadArgs;
    }

    let mut session = match open_session(config.archive_path, OpenMode::Create) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let encryption = zipsession::EncryptionMethod::from(config.encryption);
    if encryption.is_encrypted() {
        match get_or_confirm_password(config.password.clone()) {
            Some(pwd) => session.set_default_password(&pwd),
            None => {
                eprintln!("Error: A password is required for encryption");
                return ExitCode::BadArgs;
            }
        }
    }

    let method = zipsession::CompressionMethod::from(config.method);
    for (path, name, is_dir) in &inputs {
        let result = if *is_dir {
            match session.locate(name.as_bytes()) {
                Ok(_) => continue,
                Err(_) => session.add_dir(name.as_bytes()).map(|_| ()),
            }
        } else {
            add_or_replace(&mut session, path, name, method, config.level, encryption)
        };
        if let Err(e) = result {
            eprintln!("Error adding '{}': {}", path.display(), e);
            session.discard();
            return error_to_exit_code(&e);
        }
    }

    commit(session, config.format, config.quiet)
}

fn add_or_replace(
    session: &mut ArchiveSession,
    path: &Path,
    name: &str,
    method: zipsession::CompressionMethod,
    level: u32,
    encryption: zipsession::EncryptionMethod,
) -> zipsession::Result<()> {
    let index = match session.locate(name.as_bytes()) {
        Ok(index) => {
            session.replace(index, EntrySource::file(path))?;
            index
        }
        Err(Error::NotFound(_)) => session.add(name.as_bytes(), EntrySource::file(path), method)?,
        Err(e) => return Err(e),
    };
    session.set_compression(index, method, level)?;
    if encryption.is_encrypted() {
        session.set_encryption(index, encryption, None)?;
    }
    Ok(())
}

/// Walks the inputs into (path, entry name, is directory) triples.
fn collect_inputs(
    files: &[PathBuf],
    recursive: bool,
    selector: &FileSelector,
) -> Result<Vec<(PathBuf, String, bool)>, ExitCode> {
    let mut inputs = Vec::new();
    for file in files {
        if !file.exists() {
            eprintln!("Error: '{}' does not exist", file.display());
            return Err(ExitCode::BadArgs);
        }
        let walker = if recursive {
            WalkDir::new(file)
        } else {
            WalkDir::new(file).max_depth(0)
        };
        for entry in walker.sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Err(ExitCode::IoError);
                }
            };
            let is_dir = entry.file_type().is_dir();
            let mut name = entry_name(entry.path());
            if name.is_empty() || !selector.matches(&name) {
                continue;
            }
            if is_dir {
                name.push('/');
            }
            inputs.push((entry.path().to_path_buf(), name, is_dir));
        }
    }
    Ok(inputs)
}

/// Converts a filesystem path to a relative, slash-separated entry name.
fn entry_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Remove command implementation
pub fn remove(archive_path: &Path, patterns: &[String], format: OutputFormat, quiet: bool) -> ExitCode {
    let selector = match FileSelector::new(patterns, &[]) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    let mut session = match open_session(archive_path, OpenOptions::new()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let doomed: Vec<usize> = session
        .entries()
        .iter()
        .filter(|e| selector.matches_entry(e))
        .map(|e| e.index)
        .collect();
    if doomed.is_empty() {
        eprintln!("No entries match");
        session.discard();
        return ExitCode::Warning;
    }
    for index in doomed {
        if let Err(e) = session.remove(index) {
            session.discard();
            return report(&e);
        }
    }

    commit(session, format, quiet)
}

/// Rename command implementation
pub fn rename(archive_path: &Path, from: &str, to: &str, quiet: bool) -> ExitCode {
    let mut session = match open_session(archive_path, OpenOptions::new()) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let result = session
        .locate(from.as_bytes())
        .and_then(|index| session.rename(index, to.as_bytes()));
    if let Err(e) = result {
        session.discard();
        return report(&e);
    }

    commit(session, OutputFormat::Human, quiet)
}

/// Comment command implementation
pub fn comment(archive_path: &Path, entry: Option<&str>, text: Option<String>, clear: bool) -> ExitCode {
    let mode = if text.is_some() || clear {
        OpenOptions::new()
    } else {
        OpenOptions::from(OpenMode::ReadOnly)
    };
    let mut session = match open_session(archive_path, mode) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let index = match entry.map(|name| session.locate(name.as_bytes())).transpose() {
        Ok(index) => index,
        Err(e) => return report(&e),
    };

    if text.is_none() && !clear {
        let current = match index {
            Some(i) => match session.stat(i) {
                Ok(record) => record.comment.unwrap_or_default(),
                Err(e) => return report(&e),
            },
            None => session.archive_comment().to_vec(),
        };
        println!("{}", String::from_utf8_lossy(&current));
        session.discard();
        return ExitCode::Success;
    }

    let new = text.as_deref().map(str::as_bytes);
    let result = match index {
        Some(i) => session.set_comment(i, new),
        None => session.set_archive_comment(new),
    };
    if let Err(e) = result {
        session.discard();
        return report(&e);
    }

    commit(session, OutputFormat::Human, true)
}

/// Test command implementation
pub fn test(
    archive_path: &Path,
    password: Option<String>,
    include: &[String],
    format: OutputFormat,
    quiet: bool,
) -> ExitCode {
    let formatter = create_formatter(format);
    let selector = match FileSelector::new(include, &[]) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::BadArgs;
        }
    };

    let mut session = match open_session(archive_path, OpenMode::ReadOnly) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let entries: Vec<_> = session
        .entries()
        .into_iter()
        .filter(|e| selector.matches_entry(e))
        .collect();
    if entries.iter().any(|e| e.is_encrypted()) {
        if let Some(pwd) = get_password(password, true) {
            session.set_default_password(&pwd);
        }
    }

    let mut report = TestReport::default();
    for entry in &entries {
        report.entries_tested += 1;
        let result = session.open_entry(entry.index, None).and_then(|stream| {
            let drained = copy_stream(&mut session, stream, |_| Ok(()));
            let closed = session.close_stream(stream);
            drained.and(closed)
        });
        match result {
            Ok(()) => report.entries_passed += 1,
            Err(e) => report
                .failures
                .push((entry.name_lossy().into_owned(), e.to_string())),
        }
    }
    session.discard();

    if !quiet || format == OutputFormat::Json {
        print!("{}", formatter.format_test_result(&report));
    }
    if report.is_ok() {
        ExitCode::Success
    } else {
        ExitCode::BadArchive
    }
}

/// Info command implementation
pub fn info(archive_path: &Path, format: OutputFormat) -> ExitCode {
    let session = match open_session(archive_path, OpenMode::ReadOnly) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let summary = ArchiveSummary::from_records(&session.entries(), session.archive_comment());
    let formatter = create_formatter(format);
    print!("{}", formatter.format_info(&summary));
    session.discard();
    ExitCode::Success
}

fn open_session(path: &Path, options: impl Into<OpenOptions>) -> Result<ArchiveSession, ExitCode> {
    ArchiveSession::open_with(path, options.into()).map_err(|e| {
        eprintln!("Error opening archive: {}", e);
        error_to_exit_code(&e)
    })
}

fn commit(session: ArchiveSession, format: OutputFormat, quiet: bool) -> ExitCode {
    let formatter = create_formatter(format);
    let mut progress = CommitProgress::new(quiet || format == OutputFormat::Json);
    match session.close(Some(&mut progress)) {
        Ok(result) => {
            progress.finish();
            if !quiet || format == OutputFormat::Json {
                print!("{}", formatter.format_commit(&result));
            }
            ExitCode::Success
        }
        Err(e) => {
            progress.abandon("Failed");
            eprintln!("Error: {}", e);
            eprintln!("The archive was left unchanged");
            error_to_exit_code(&e)
        }
    }
}

fn copy_stream(
    session: &mut ArchiveSession,
    stream: StreamId,
    mut sink: impl FnMut(&[u8]) -> zipsession::Result<()>,
) -> zipsession::Result<()> {
    loop {
        let chunk = session.read(stream, 8192)?;
        if chunk.is_empty() {
            return Ok(());
        }
        sink(&chunk)?;
    }
}

fn report(error: &Error) -> ExitCode {
    eprintln!("Error: {}", error);
    error_to_exit_code(error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_is_relative() {
        assert_eq!(entry_name(Path::new("./docs/a.txt")), "docs/a.txt");
        assert_eq!(entry_name(Path::new("/abs/b.txt")), "abs/b.txt");
        assert_eq!(entry_name(Path::new("../up/c")), "up/c");
    }
}
