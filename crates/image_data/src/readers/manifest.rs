use crate::dataloader::ImageDataConfig;
use crate::dataset::{DataSource, Entry, LabelMode, NUM_LABEL_GROUPS};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a manifest file line by line, yielding `(line_number, line)` pairs.
/// Skips blank lines and comment lines (first non-space character is `#`).
///
/// # Example
/// ```ignore
/// let source = ManifestSource::new("train.txt");
/// for line_result in source.stream()? {
///     let (line_number, line) = line_result?;
/// }
/// ```
pub struct ManifestSource {
    path: PathBuf,
}

impl ManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_skipped(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

impl DataSource<(usize, String)> for ManifestSource {
    fn stream(&self) -> Result<Box<dyn Iterator<Item = Result<(usize, String)>> + Send>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open manifest: {}", self.path.display()))?;

        let reader = BufReader::new(file);
        let iter = reader
            .lines()
            .enumerate()
            .filter_map(move |(index, line)| match line {
                Ok(text) if is_skipped(&text) => None,
                Ok(text) => Some(Ok((index + 1, text))),
                Err(e) => Some(Err(e).with_context(|| format!("Error reading line {}", index + 1))),
            });
        Ok(Box::new(iter))
    }
}

/// The parsed manifest: entries in file order plus the label layout they imply.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub entries: Vec<Entry>,
    pub label_mode: LabelMode,
    /// Largest label id on any line (0 for an empty manifest).
    pub max_label_id: usize,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Walks one manifest line the way formatted stream extraction does: a
/// failed integer read poisons the rest of the line.
struct LineCursor<'a> {
    rest: &'a str,
}

impl<'a> LineCursor<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }

    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.rest = &self.rest[c.len_utf8()..];
        }
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        self.rest = self.rest.trim_start_matches(' ');
    }

    /// Next whitespace-delimited token.
    fn read_token(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (token, rest) = trimmed.split_at(end);
        self.rest = rest;
        (!token.is_empty()).then_some(token)
    }

    /// Skips whitespace, then reads an optional `+` and a run of digits.
    /// Returns `None` for anything else, including negative numbers and values
    /// past `i32::MAX`.
    fn read_label(&mut self) -> Option<usize> {
        let trimmed = self.rest.trim_start();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let end = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(unsigned.len());
        if end == 0 {
            return None;
        }
        let value: i32 = unsigned[..end].parse().ok()?;
        let value = usize::try_from(value).ok()?;
        self.rest = &unsigned[end..];
        Some(value)
    }
}

/// Result of parsing a single line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub entry: Entry,
    /// The line used the label list separator (explicitly multi-label).
    pub saw_list_separator: bool,
}

/// Parses manifests of the form
/// `<filename> [<label><sep>]*[<list_sep>[<ignore_label><sep>]*]`.
///
/// The dataset switches to multi-label mode when any line uses the list
/// separator or carries more than one label in total.
#[derive(Debug, Clone, Copy)]
pub struct ManifestParser {
    label_separator: char,
    label_list_separator: char,
}

impl ManifestParser {
    pub fn new(label_separator: char, label_list_separator: char) -> Result<Self, ConfigError> {
        if label_separator == label_list_separator {
            return Err(ConfigError::SameSeparators(label_separator));
        }
        Ok(Self {
            label_separator,
            label_list_separator,
        })
    }

    pub fn from_config(config: &ImageDataConfig) -> Result<Self, ConfigError> {
        Self::new(config.label_separator, config.label_list_separator)
    }

    /// Parses one line. Returns `None` for blank and comment lines.
    pub fn parse_line(&self, line: &str) -> Option<ParsedLine> {
        if is_skipped(line) {
            return None;
        }

        let mut cursor = LineCursor::new(line);
        let filename = cursor.read_token()?.to_string();
        let mut labels: [Vec<usize>; NUM_LABEL_GROUPS] = Default::default();
        let mut saw_list_separator = false;
        let mut poisoned = false;

        for group in labels.iter_mut() {
            if poisoned {
                break;
            }
            cursor.skip_spaces();

            // A leading list separator means this group is empty.
            if cursor.bump_if(self.label_list_separator) {
                saw_list_separator = true;
                continue;
            }

            loop {
                let Some(label) = cursor.read_label() else {
                    poisoned = true;
                    break;
                };
                group.push(label);

                cursor.bump_if(self.label_separator);
                if cursor.bump_if(self.label_list_separator) {
                    saw_list_separator = true;
                    break;
                }
            }
        }

        Some(ParsedLine {
            entry: Entry { filename, labels },
            saw_list_separator,
        })
    }

    /// Parses numbered lines into a [`Manifest`].
    pub fn parse<I>(&self, lines: I) -> Result<Manifest>
    where
        I: IntoIterator<Item = Result<(usize, String)>>,
    {
        let mut entries = Vec::new();
        let mut line_numbers = Vec::new();
        let mut max_label_id = 0;
        let mut is_multi_label = false;

        for line_result in lines {
            let (line_number, line) = line_result?;
            let Some(parsed) = self.parse_line(&line) else {
                continue;
            };

            if let Some(&max) = parsed.entry.labels.iter().flatten().max() {
                max_label_id = max_label_id.max(max);
            }
            if parsed.saw_list_separator || parsed.entry.total_labels() > 1 {
                is_multi_label = true;
            }

            entries.push(parsed.entry);
            line_numbers.push(line_number);
        }

        let label_mode = if is_multi_label {
            let width = max_label_id
                .checked_add(1)
                .context("Label id out of range")?;
            LabelMode::Multi { width }
        } else {
            if let Some((entry, &line)) = entries
                .iter()
                .zip(&line_numbers)
                .find(|(entry, _)| entry.total_labels() == 0)
            {
                return Err(ConfigError::MissingLabel {
                    filename: entry.filename.clone(),
                    line,
                }
                .into());
            }
            LabelMode::Single
        };

        debug!(
            entries = entries.len(),
            max_label_id,
            multi_label = label_mode.is_multi_label(),
            "Parsed manifest"
        );

        Ok(Manifest {
            entries,
            label_mode,
            max_label_id,
        })
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let source = ManifestSource::new(path.as_ref());
        self.parse(source.stream()?)
            .with_context(|| format!("Failed to parse manifest: {}", source.path().display()))
    }

    pub fn parse_str(&self, text: &str) -> Result<Manifest> {
        self.parse(
            text.lines()
                .enumerate()
                .map(|(index, line)| Ok((index + 1, line.to_string()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parser() -> ManifestParser {
        ManifestParser::new(',', ';').unwrap()
    }

    #[test]
    fn test_manifest_streaming_skips_comments_and_blank_lines() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "# header comment")?;
        writeln!(file, "a.jpg 1")?;
        writeln!(file, "")?;
        writeln!(file, "   # indented comment")?;
        writeln!(file, "b.jpg 0")?;

        let source = ManifestSource::new(file.path());
        let lines: Vec<_> = source.stream()?.collect::<Result<_>>()?;
        assert_eq!(
            lines,
            vec![(2, "a.jpg 1".to_string()), (5, "b.jpg 0".to_string())]
        );
        Ok(())
    }

    #[test]
    fn test_single_label_manifest() -> Result<()> {
        let manifest = parser().parse_str("cat.jpg 0\ndog.jpg 1\n# bird.jpg 2\nfox.jpg 4\n")?;

        assert_eq!(manifest.label_mode, LabelMode::Single);
        assert_eq!(manifest.label_mode.width(), 1);
        assert_eq!(manifest.max_label_id, 4);
        assert_eq!(
            manifest.entries,
            vec![
                Entry::new("cat.jpg", vec![0], vec![]),
                Entry::new("dog.jpg", vec![1], vec![]),
                Entry::new("fox.jpg", vec![4], vec![]),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_use_and_ignore_groups() -> Result<()> {
        let manifest = parser().parse_str("a.jpg 3,7;2\nb.jpg 0\n")?;

        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 8 });
        assert_eq!(manifest.entries[0], Entry::new("a.jpg", vec![3, 7], vec![2]));
        assert_eq!(manifest.entries[1], Entry::new("b.jpg", vec![0], vec![]));
        Ok(())
    }

    #[test]
    fn test_leading_list_separator_is_empty_use_group() -> Result<()> {
        let manifest = parser().parse_str("a.jpg ;4,5\nb.jpg 1\n")?;

        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 6 });
        assert_eq!(manifest.entries[0], Entry::new("a.jpg", vec![], vec![4, 5]));
        Ok(())
    }

    #[test]
    fn test_trailing_list_separator_marks_multi_label() -> Result<()> {
        let manifest = parser().parse_str("a.jpg 2;\nb.jpg 1\n")?;

        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 3 });
        assert_eq!(manifest.entries[0], Entry::new("a.jpg", vec![2], vec![]));
        Ok(())
    }

    #[test]
    fn test_two_labels_without_list_separator_mark_multi_label() -> Result<()> {
        let manifest = parser().parse_str("a.jpg 1,5\nb.jpg 2\n")?;

        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 6 });
        assert_eq!(manifest.entries[0], Entry::new("a.jpg", vec![1, 5], vec![]));
        Ok(())
    }

    #[test]
    fn test_whitespace_label_separator() -> Result<()> {
        let parser = ManifestParser::new(' ', '|')?;
        let manifest = parser.parse_str("img/a.png 1 2 | 3\n")?;

        assert_eq!(
            manifest.entries[0],
            Entry::new("img/a.png", vec![1, 2], vec![3])
        );
        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 4 });
        Ok(())
    }

    #[test]
    fn test_malformed_label_stops_line_silently() -> Result<()> {
        let manifest = parser().parse_str("a.jpg 1,x,3;2\nb.jpg 2,-4\n")?;

        assert_eq!(manifest.entries[0], Entry::new("a.jpg", vec![1], vec![]));
        assert_eq!(manifest.entries[1], Entry::new("b.jpg", vec![2], vec![]));
        assert_eq!(manifest.label_mode, LabelMode::Single);
        Ok(())
    }

    #[test]
    fn test_out_of_range_label_stops_line_silently() -> Result<()> {
        let manifest = parser()
            .parse_str("a.jpg 1,18446744073709551615;2\nb.jpg 3,3000000000\nc.jpg 2;5\n")?;

        assert_eq!(manifest.entries[0], Entry::new("a.jpg", vec![1], vec![]));
        assert_eq!(manifest.entries[1], Entry::new("b.jpg", vec![3], vec![]));
        assert_eq!(manifest.entries[2], Entry::new("c.jpg", vec![2], vec![5]));
        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 6 });

        let largest = parser()
            .parse_line("d.jpg 2147483647")
            .map(|parsed| parsed.entry);
        assert_eq!(largest, Some(Entry::new("d.jpg", vec![2147483647], vec![])));
        Ok(())
    }

    #[test]
    fn test_single_label_entry_without_label_is_fatal() {
        let err = parser().parse_str("a.jpg 1\nb.jpg\n").unwrap_err();

        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingLabel {
                filename: "b.jpg".into(),
                line: 2
            })
        );
    }

    #[test]
    fn test_multi_label_entry_without_label_is_allowed() -> Result<()> {
        let manifest = parser().parse_str("a.jpg 1,2\nb.jpg\n")?;

        assert_eq!(manifest.entries[1], Entry::new("b.jpg", vec![], vec![]));
        Ok(())
    }

    #[test]
    fn test_empty_manifest() -> Result<()> {
        let manifest = parser().parse_str("# nothing here\n\n")?;

        assert!(manifest.is_empty());
        assert_eq!(manifest.label_mode, LabelMode::Single);
        Ok(())
    }

    #[test]
    fn test_equal_separators_rejected() {
        assert_eq!(
            ManifestParser::new(';', ';').unwrap_err(),
            ConfigError::SameSeparators(';')
        );
    }

    #[test]
    fn test_parse_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "a.jpg 3,7;2")?;
        writeln!(file, "b.jpg 0")?;

        let manifest = parser().parse_file(file.path())?;
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.label_mode, LabelMode::Multi { width: 8 });

        assert!(parser().parse_file("does/not/exist.txt").is_err());
        Ok(())
    }
}
