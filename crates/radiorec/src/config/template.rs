//! Path template engine.
//!
//! Turns program metadata plus the user's directory and filename templates
//! into a relative path below the save directory. Pure: no I/O.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, Utc};
use regex::{Captures, Regex};

use crate::config::loader::parse_utc_offset;
use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::recording::ProgramInfo;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z]+)\$").expect("token regex is valid"));

/// Longest file stem we emit, in bytes. Leaves room for collision suffixes.
const MAX_STEM_BYTES: usize = 180;

pub struct PathTemplateEngine {
    directory_template: String,
    filename_template: String,
    extension: String,
    offset: FixedOffset,
}

impl PathTemplateEngine {
    pub fn new(
        directory_template: impl Into<String>,
        filename_template: impl Into<String>,
        extension: &str,
        offset: FixedOffset,
    ) -> Self {
        Self {
            directory_template: directory_template.into(),
            filename_template: filename_template.into(),
            extension: extension.trim_start_matches('.').to_string(),
            offset,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.templates.directory.clone(),
            config.templates.filename.clone(),
            &config.transcode.file_extension,
            parse_utc_offset(&config.timezone)?,
        ))
    }

    /// File extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolves `directory/filename.ext` relative to the save directory.
    pub fn resolve(&self, program: &ProgramInfo) -> PathBuf {
        let mut path = self.resolve_directory(program);
        path.push(format!("{}.{}", self.resolve_file_stem(program), self.extension));
        path
    }

    /// Resolves only the directory part. An empty path means the save root.
    pub fn resolve_directory(&self, program: &ProgramInfo) -> PathBuf {
        let template = strip_root(&self.directory_template);
        let mut segments: Vec<String> = Vec::new();

        for raw in template.split(['/', '\\']) {
            let substituted = self.substitute(raw, program);
            let segment = replace_illegal(substituted.trim());
            match segment.as_str() {
                "" | "." => continue,
                ".." => {
                    // Climbing above the root means the template escapes it.
                    if segments.pop().is_none() {
                        return PathBuf::new();
                    }
                }
                _ => segments.push(segment),
            }
        }

        segments.iter().collect()
    }

    /// Resolves the file name without extension, falling back to the default
    /// `{yyyyMMddHHmmss}_{Title}` when the template yields an unusable name.
    pub fn resolve_file_stem(&self, program: &ProgramInfo) -> String {
        let substituted = self.substitute(&self.filename_template, program);
        let stem = substituted.trim();
        if is_valid_file_stem(stem) {
            truncate_utf8(stem, MAX_STEM_BYTES).to_string()
        } else {
            self.default_file_stem(program)
        }
    }

    pub fn default_file_stem(&self, program: &ProgramInfo) -> String {
        let timestamp = program.start.format("%Y%m%d%H%M%S").to_string();
        let title = sanitize_value(program.title.trim());
        if title.is_empty() {
            return timestamp;
        }
        let stem = format!("{}_{}", timestamp, title);
        truncate_utf8(&stem, MAX_STEM_BYTES).to_string()
    }

    fn substitute(&self, template: &str, program: &ProgramInfo) -> String {
        TOKEN
            .replace_all(template, |caps: &Captures<'_>| {
                match self.token_value(&caps[1], program) {
                    Some(value) => sanitize_value(&value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn token_value(&self, name: &str, program: &ProgramInfo) -> Option<String> {
        match name {
            "StationId" => return Some(program.station_id.clone()),
            "StationName" => return Some(program.station_name.clone()),
            "Title" => return Some(program.title.clone()),
            _ => {}
        }

        let (instant, field) = match name.split_at(1) {
            ("S", field) => (program.start, field),
            ("E", field) => (program.end, field),
            _ => return None,
        };
        date_token(&instant.with_timezone(&self.offset), field)
    }
}

fn date_token(instant: &DateTime<FixedOffset>, field: &str) -> Option<String> {
    let format = match field {
        "YYYY" => "%Y",
        "YY" => "%y",
        "MM" => "%m",
        "M" => "%-m",
        "DD" => "%d",
        "D" => "%-d",
        "THH" => "%H",
        "TH" => "%-H",
        "TMM" => "%M",
        "TM" => "%-M",
        "TSS" => "%S",
        "TS" => "%-S",
        _ => return None,
    };
    Some(instant.format(format).to_string())
}

/// Full-width stand-in for a character that is not allowed in file names.
fn full_width(c: char) -> Option<char> {
    match c {
        '\\' => Some('＼'),
        '/' => Some('／'),
        ':' => Some('：'),
        '*' => Some('＊'),
        '?' => Some('？'),
        '"' => Some('＂'),
        '<' => Some('＜'),
        '>' => Some('＞'),
        '|' => Some('｜'),
        _ => None,
    }
}

/// Sanitizes a substituted value so it can never introduce a separator,
/// an illegal character, or a `.`/`..` path component.
pub fn sanitize_value(value: &str) -> String {
    let replaced = replace_illegal(value);
    if !replaced.is_empty() && replaced.chars().all(|c| c == '.') {
        return replaced.chars().map(|_| '．').collect();
    }
    replaced
}

fn replace_illegal(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| full_width(c).unwrap_or(c))
        .collect()
}

fn is_valid_file_stem(stem: &str) -> bool {
    !stem.is_empty()
        && !stem.chars().all(|c| c == '.')
        && !stem
            .chars()
            .any(|c| c.is_control() || full_width(c).is_some())
}

/// Drops a drive prefix (`C:`) and leading separators so a rooted template
/// is read relative to the save directory.
fn strip_root(template: &str) -> &str {
    let mut rest = template;
    let bytes = rest.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        rest = &rest[2..];
    }
    rest.trim_start_matches(['/', '\\'])
}

fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
