//! Recipe file import
//!
//! Walks a directory for `*.recipes` text files and stores every recipe they
//! contain in the catalog. File format, one entry per line:
//!
//! ```text
//! # comment
//! @source Minecraft
//! 2 Oak Planks = 4 Sticks
//! 1 Cobblestone + 1 (nc) Pulverizer (Thermal Foundation) = 1 Gravel + 0.1 (p) Sand
//! ```
//!
//! `@source` sets the source for items written without one, until the next
//! `@source` line or the end of the file. A `#` starts a comment at the start
//! of a line, or after text when it stands alone as `# note`; `Crate #2` and
//! `Plank#2` stay item names.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{Recipe, UNKNOWN_SOURCE};
use crate::parser::RecipeParser;

pub const RECIPE_FILE_EXTENSION: &str = "recipes";

/// A recipe line that failed to parse
#[derive(Debug)]
pub struct LineError {
    pub line: usize,
    pub message: String,
}

/// Recipes parsed from one file, plus the lines that could not be parsed
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub recipes: Vec<Recipe>,
    pub errors: Vec<LineError>,
}

/// Find all recipe files below `dir`, sorted by path
pub fn find_recipe_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().is_some_and(|ext| ext == RECIPE_FILE_EXTENSION)
        {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Parse recipe text, continuing past bad lines
pub fn parse_recipe_text(parser: &mut RecipeParser, content: &str) -> ParsedFile {
    let mut parsed = ParsedFile::default();
    parser.set_default_source(UNKNOWN_SOURCE);

    for (index, raw) in content.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(source) = line.strip_prefix("@source") {
            let source = source.trim();
            if source.is_empty() {
                parsed.errors.push(LineError {
                    line: index + 1,
                    message: "@source needs a name".to_string(),
                });
            } else {
                parser.set_default_source(source);
            }
            continue;
        }

        match parser.parse_recipe(line) {
            Ok(recipe) => parsed.recipes.push(recipe),
            Err(e) => parsed.errors.push(LineError {
                line: index + 1,
                message: e.to_string(),
            }),
        }
    }

    parsed
}

/// Cut a comment; a `#` touching a word is part of the text
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    let bytes = line.as_bytes();
    for (i, _) in line.match_indices('#') {
        let spaced_before = i > 0 && bytes[i - 1].is_ascii_whitespace();
        let spaced_after = bytes.get(i + 1).is_none_or(u8::is_ascii_whitespace);
        if spaced_before && spaced_after {
            return &line[..i];
        }
    }
    line
}

/// Parse a single recipe file
pub fn parse_recipe_file(parser: &mut RecipeParser, path: &Path) -> Result<ParsedFile> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_recipe_text(parser, &content))
}

/// Import every recipe file under `dir` into the catalog
pub fn import_to_database(conn: &Connection, dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let mut parser = RecipeParser::new()?;

    info!(dir = %dir.display(), "scanning for recipe files");
    let files = find_recipe_files(dir)?;
    info!(count = files.len(), "found recipe files");

    for path in &files {
        let parsed = parse_recipe_file(&mut parser, path)?;

        for error in &parsed.errors {
            warn!(file = %path.display(), line = error.line, "{}", error.message);
        }

        let tx = conn.unchecked_transaction()?;
        let mut added = 0;
        for recipe in &parsed.recipes {
            match db::insert_recipe(&tx, recipe)? {
                Some(_) => added += 1,
                None => stats.duplicates += 1,
            }
        }
        tx.commit()?;

        info!(
            file = %path.display(),
            recipes = added,
            errors = parsed.errors.len(),
            "imported recipe file"
        );
        stats.files += 1;
        stats.recipes += added;
        stats.errors += parsed.errors.len();
    }

    Ok(stats)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub recipes: usize,
    pub duplicates: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} recipes from {} files. Duplicates: {}, Errors: {}",
            self.recipes, self.files, self.duplicates, self.errors
        )
    }
}
