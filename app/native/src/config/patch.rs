//! Line-level patching of the config file.
//!
//! Programmatic updates (popup variants, CLI `config set`) rewrite a single
//! `key = "value"` line and leave every other line, comment and blank line
//! exactly as the user wrote it. The patched text is parsed again by the
//! caller before it is written.

use std::cmp::Reverse;

/// Returns `original` with `key` set to the string `value`.
///
/// A dotted key `a.b.c` targets the assignment of `c` in the `[a.b]` table,
/// or an equivalent dotted assignment such as `b.c = ...` under `[a]`:
/// - the existing assignment is rewritten, keeping its key spelling and any
///   trailing comment;
/// - otherwise the line is appended at the end of the `[a.b]` table, or as a
///   dotted key to the table already defining `a.b`;
/// - a missing table is appended to the end of the document.
///
/// A bare key targets a top-level line. It is replaced in place, or inserted
/// before the first table header so it stays at the top level.
///
/// Array-of-tables sections (`[[a.b]]`) bound the other tables but are never
/// patched.
#[must_use]
pub fn patch_value(original: &str, key: &str, value: &str) -> String {
    let target: Vec<&str> = key.split('.').collect();
    let lines: Vec<&str> = original.split('\n').collect();
    let kinds = classify(&lines);
    let sections = sections(&kinds);
    let quoted = quote(value);

    let mut candidates: Vec<&Section> =
        sections.iter().filter(|section| !section.array && section.is_prefix_of(&target)).collect();
    candidates.sort_by_key(|section| Reverse(section.path.len()));

    for section in &candidates {
        let rest = &target[section.path.len()..];
        for index in section.start..section.end {
            if let LineKind::Assign { key, eq } = &kinds[index]
                && same_key(key, rest)
            {
                return replace_line(&lines, index, rewrite_assignment(lines[index], *eq, &quoted));
            }
        }
    }

    let (parent, leaf) = target.split_at(target.len() - 1);
    if let Some(section) = candidates.iter().find(|section| section.path.len() == parent.len()) {
        return append_to_section(&lines, section, format!("{} = {quoted}", leaf[0]));
    }

    // `[a]` holding `b.x = ...` already defines the table `a.b`.
    for section in &candidates {
        let rest = &target[section.path.len()..];
        let parent_rest = &rest[..rest.len() - 1];
        let defines_parent = (section.start..section.end).any(|index| {
            matches!(&kinds[index], LineKind::Assign { key, .. }
                if key.len() > parent_rest.len() && same_key(&key[..parent_rest.len()], parent_rest))
        });
        if defines_parent {
            return append_to_section(&lines, section, format!("{} = {quoted}", rest.join(".")));
        }
    }

    let mut patched = original.trim_end_matches('\n').to_string();
    if !patched.is_empty() {
        patched.push_str("\n\n");
    }
    patched.push_str(&format!("[{}]\n{} = {quoted}\n", parent.join("."), leaf[0]));
    patched
}

/// What a line of the document is, as far as patching cares.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Header { path: Vec<String>, array: bool },
    /// `eq` is the byte offset of the `=`.
    Assign { key: Vec<String>, eq: usize },
    Other,
}

/// The lines owned by the top level or by one header.
#[derive(Debug)]
struct Section {
    path: Vec<String>,
    array: bool,
    start: usize,
    end: usize,
}

impl Section {
    fn is_prefix_of(&self, target: &[&str]) -> bool {
        self.path.len() < target.len() && same_key(&self.path, &target[..self.path.len()])
    }
}

fn same_key(key: &[String], target: &[&str]) -> bool {
    key.len() == target.len() && key.iter().zip(target).all(|(segment, wanted)| segment == wanted)
}

/// Open value state carried from one line to the next.
#[derive(Debug, Default)]
struct ScanState {
    depth: usize,
    open_string: Option<&'static str>,
}

impl ScanState {
    const fn in_value(&self) -> bool { self.depth > 0 || self.open_string.is_some() }
}

/// Classifies every line. Lines continuing a multi-line array, inline table
/// or string are [`LineKind::Other`], whatever they look like.
fn classify(lines: &[&str]) -> Vec<LineKind> {
    let mut state = ScanState::default();
    lines
        .iter()
        .map(|line| {
            if state.in_value() {
                scan_value(line, &mut state);
                return LineKind::Other;
            }
            if let Some((path, array)) = parse_header(line) {
                return LineKind::Header { path, array };
            }
            if let Some((key, eq)) = parse_assignment(line) {
                scan_value(&line[eq + 1..], &mut state);
                return LineKind::Assign { key, eq };
            }
            LineKind::Other
        })
        .collect()
}

fn sections(kinds: &[LineKind]) -> Vec<Section> {
    let mut sections = vec![Section { path: Vec::new(), array: false, start: 0, end: kinds.len() }];
    for (index, kind) in kinds.iter().enumerate() {
        if let LineKind::Header { path, array } = kind {
            if let Some(previous) = sections.last_mut() {
                previous.end = index;
            }
            sections.push(Section { path: path.clone(), array: *array, start: index + 1, end: kinds.len() });
        }
    }
    sections
}

/// `[a.b]` or `[[a.b]]`, with an optional trailing comment.
fn parse_header(line: &str) -> Option<(Vec<String>, bool)> {
    let code = code_part(line).trim();
    if let Some(inner) = code.strip_prefix("[[").and_then(|rest| rest.strip_suffix("]]")) {
        return parse_key(inner).map(|path| (path, true));
    }
    let inner = code.strip_prefix('[')?.strip_suffix(']')?;
    parse_key(inner).map(|path| (path, false))
}

fn parse_assignment(line: &str) -> Option<(Vec<String>, usize)> {
    let code = code_part(line);
    let eq = find_unquoted(code, '=')?;
    parse_key(&code[..eq]).map(|key| (key, eq))
}

/// Splits a possibly dotted, possibly quoted key into its segments.
fn parse_key(text: &str) -> Option<Vec<String>> {
    let mut segments = Vec::new();
    let mut rest = text.trim();
    loop {
        let (segment, after) = match rest.chars().next()? {
            mark @ ('"' | '\'') => {
                let body = &rest[1..];
                let end = find_closing(body, if mark == '"' { "\"" } else { "'" })?;
                (&body[..end - 1], &body[end..])
            }
            _ => {
                let end = rest
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'))
                    .unwrap_or(rest.len());
                if end == 0 {
                    return None;
                }
                rest.split_at(end)
            }
        };
        segments.push(segment.to_string());

        let after = after.trim_start();
        if after.is_empty() {
            return Some(segments);
        }
        rest = after.strip_prefix('.')?.trim_start();
    }
}

/// The line up to its comment.
fn code_part(line: &str) -> &str { find_unquoted(line, '#').map_or(line, |index| &line[..index]) }

/// Byte offset of the first `target` outside single-line strings.
fn find_unquoted(line: &str, target: char) -> Option<usize> {
    let mut open_quote = None;
    let mut escaped = false;
    for (index, ch) in line.char_indices() {
        match open_quote {
            Some(open) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' && open == '"' {
                    escaped = true;
                } else if ch == open {
                    open_quote = None;
                }
            }
            None if ch == target => return Some(index),
            None if ch == '"' || ch == '\'' => open_quote = Some(ch),
            None => {}
        }
    }
    None
}

/// Byte offset just past the closing `delim` in `text`.
fn find_closing(text: &str, delim: &str) -> Option<usize> {
    let escapes = delim.starts_with('"');
    let mut chars = text.char_indices();
    while let Some((index, ch)) = chars.next() {
        if escapes && ch == '\\' {
            chars.next();
        } else if text[index..].starts_with(delim) {
            return Some(index + delim.len());
        }
    }
    None
}

/// Tracks brackets and strings of a value so continuation lines are known.
fn scan_value(text: &str, state: &mut ScanState) {
    let mut rest = text;
    loop {
        if let Some(delim) = state.open_string {
            let Some(end) = find_closing(rest, delim) else { break };
            rest = &rest[end..];
            state.open_string = None;
        }

        let Some((index, ch)) =
            rest.char_indices().find(|(_, ch)| matches!(ch, '"' | '\'' | '#' | '[' | ']' | '{' | '}'))
        else {
            break;
        };
        match ch {
            '#' => break,
            '[' | '{' => state.depth += 1,
            ']' | '}' => state.depth = state.depth.saturating_sub(1),
            _ => {
                let triple = if ch == '"' { "\"\"\"" } else { "'''" };
                if rest[index..].starts_with(triple) {
                    state.open_string = Some(triple);
                    rest = &rest[index + triple.len()..];
                    continue;
                }
                state.open_string = Some(if ch == '"' { "\"" } else { "'" });
            }
        }
        rest = &rest[index + ch.len_utf8()..];
    }

    // Single-line strings never continue.
    if matches!(state.open_string, Some("\"" | "'")) {
        state.open_string = None;
    }
}

fn rewrite_assignment(line: &str, eq: usize, quoted: &str) -> String {
    let key = line[..eq].trim_end();
    let comment = &line[code_part(line).len()..];
    if comment.is_empty() { format!("{key} = {quoted}") } else { format!("{key} = {quoted} {comment}") }
}

fn replace_line(lines: &[&str], index: usize, line: String) -> String {
    let mut patched: Vec<String> = lines.iter().map(|line| (*line).to_string()).collect();
    patched[index] = line;
    patched.join("\n")
}

/// Appends after the last non-blank line of the section so spacing before
/// the next header is preserved. An empty top level gets a blank line before
/// the first header.
fn append_to_section(lines: &[&str], section: &Section, line: String) -> String {
    let mut patched: Vec<String> = lines.iter().map(|line| (*line).to_string()).collect();
    match (section.start..section.end).rev().find(|index| !lines[*index].trim().is_empty()) {
        Some(index) => patched.insert(index + 1, line),
        None if section.path.is_empty() && section.end < lines.len() => {
            patched.insert(0, String::new());
            patched.insert(0, line);
        }
        None => patched.insert(section.start, line),
    }
    patched.join("\n")
}


/// TOML basic string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            ch => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"theme = "system" # system, light, dark

[widgets]
displayed = ["default.time"]

[widgets.default.time]
format = "E d, J:mm"
calendar.show-events = true

[popup.default.time]
view-variant = "box"
"#;

    fn parse(text: &str) -> toml::Table { toml::from_str(text).unwrap() }

    #[test]
    fn replaces_existing_key_in_table() {
        let patched = patch_value(SAMPLE, "popup.default.time.view-variant", "vertical");
        assert!(patched.contains("view-variant = \"vertical\""));
        assert!(!patched.contains("view-variant = \"box\""));
        assert_eq!(parse(&patched)["popup"]["default"]["time"]["view-variant"].as_str(), Some("vertical"));
    }

    #[test]
    fn appends_missing_key_to_end_of_table() {
        let patched = patch_value(SAMPLE, "widgets.default.time.time-zone", "Europe/Paris");
        let parsed = parse(&patched);
        let time = &parsed["widgets"]["default"]["time"];
        assert_eq!(time["time-zone"].as_str(), Some("Europe/Paris"));
        assert_eq!(time["format"].as_str(), Some("E d, J:mm"));
        assert!(parsed["popup"]["default"]["time"].get("time-zone").is_none());
    }

    #[test]
    fn creates_missing_table() {
        let patched = patch_value(SAMPLE, "popup.default.battery.view-variant", "horizontal");
        assert!(patched.ends_with("[popup.default.battery]\nview-variant = \"horizontal\"\n"));
        assert_eq!(
            parse(&patched)["popup"]["default"]["battery"]["view-variant"].as_str(),
            Some("horizontal")
        );
    }

    #[test]
    fn bare_key_is_replaced_in_place() {
        let patched = patch_value(SAMPLE, "theme", "dark");
        assert!(patched.starts_with("theme = \"dark\" # system, light, dark\n"));
        assert_eq!(parse(&patched)["theme"].as_str(), Some("dark"));
    }

    #[test]
    fn missing_bare_key_stays_top_level() {
        let text = "[widgets]\ndisplayed = []\n";
        let patched = patch_value(text, "theme", "dark");
        let parsed = parse(&patched);
        assert_eq!(parsed["theme"].as_str(), Some("dark"));
        assert!(parsed["widgets"].get("theme").is_none());
    }

    #[test]
    fn comments_and_unrelated_lines_are_untouched() {
        let patched = patch_value(SAMPLE, "popup.default.time.view-variant", "settings");
        let before: Vec<&str> = SAMPLE.lines().filter(|l| !l.contains("view-variant")).collect();
        let after: Vec<&str> = patched.lines().filter(|l| !l.contains("view-variant")).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn commented_key_is_not_replaced() {
        let text = "[widgets.default.time]\n# format = \"old\"\n";
        let patched = patch_value(text, "widgets.default.time.format", "HH:mm");
        assert!(patched.contains("# format = \"old\""));
        assert_eq!(parse(&patched)["widgets"]["default"]["time"]["format"].as_str(), Some("HH:mm"));
    }

    #[test]
    fn patching_twice_is_idempotent() {
        let once = patch_value(SAMPLE, "widgets.default.time.time-zone", "UTC");
        let twice = patch_value(&once, "widgets.default.time.time-zone", "UTC");
        assert_eq!(parse(&once), parse(&twice));
        assert_eq!(once, twice);
    }

    #[test]
    fn values_are_escaped() {
        let patched = patch_value("", "title", "say \"hi\" \\o/");
        assert_eq!(parse(&patched)["title"].as_str(), Some("say \"hi\" \\o/"));
    }

    #[test]
    fn empty_document_gets_new_table() {
        let patched = patch_value("", "popup.default.time.view-variant", "box");
        assert_eq!(patched, "[popup.default.time]\nview-variant = \"box\"\n");
    }

    #[test]
    fn commented_header_bounds_the_table_above() {
        let text = "[widgets.default.time]\nformat = \"x\"\n\n[popup.default.time] # variant\nview-variant = \"box\"\n";
        let patched = patch_value(text, "widgets.default.time.view-variant", "vertical");
        let parsed = parse(&patched);
        assert_eq!(parsed["widgets"]["default"]["time"]["view-variant"].as_str(), Some("vertical"));
        assert_eq!(parsed["popup"]["default"]["time"]["view-variant"].as_str(), Some("box"));
    }

    #[test]
    fn commented_header_is_patched_in_place() {
        let text = "[popup.default.time] # c\nview-variant = \"box\"\n";
        let patched = patch_value(text, "popup.default.time.view-variant", "vertical");
        assert_eq!(patched, "[popup.default.time] # c\nview-variant = \"vertical\"\n");
    }

    #[test]
    fn array_of_tables_is_left_alone() {
        let text = "[widgets.default.time]\nformat = \"x\"\n\n[[extra.items]]\nformat = \"keep\"\n";

        let patched = patch_value(text, "widgets.default.time.format", "HH:mm");
        let parsed = parse(&patched);
        assert_eq!(parsed["widgets"]["default"]["time"]["format"].as_str(), Some("HH:mm"));
        assert_eq!(parsed["extra"]["items"][0]["format"].as_str(), Some("keep"));

        let patched = patch_value(text, "widgets.default.time.time-zone", "UTC");
        let parsed = parse(&patched);
        assert_eq!(parsed["widgets"]["default"]["time"]["time-zone"].as_str(), Some("UTC"));
        assert!(parsed["extra"]["items"][0].get("time-zone").is_none());
    }

    #[test]
    fn quoted_key_keeps_its_spelling() {
        let text = "[popup.default.time]\n\"view-variant\" = \"box\" # default\n";
        let patched = patch_value(text, "popup.default.time.view-variant", "horizontal");
        assert_eq!(patched, "[popup.default.time]\n\"view-variant\" = \"horizontal\" # default\n");
    }

    #[test]
    fn dotted_leaf_inside_table_is_replaced() {
        let patched = patch_value(SAMPLE, "widgets.default.time.calendar.show-events", "no");
        assert!(patched.contains("calendar.show-events = \"no\""));
        assert_eq!(parse(&patched)["widgets"]["default"]["time"]["calendar"]["show-events"].as_str(), Some("no"));
    }

    #[test]
    fn dotted_sibling_joins_the_defining_table() {
        let patched = patch_value(SAMPLE, "widgets.default.time.calendar.format", "J:mm");
        assert!(patched.contains("calendar.show-events = true\ncalendar.format = \"J:mm\"\n"));
        let parsed = parse(&patched);
        let calendar = &parsed["widgets"]["default"]["time"]["calendar"];
        assert_eq!(calendar["format"].as_str(), Some("J:mm"));
        assert_eq!(calendar["show-events"].as_bool(), Some(true));
    }

    #[test]
    fn multiline_values_are_not_headers() {
        let text = "displayed = [\n    \"a\",\n    [\"b\"]\n]\n\n[widgets.default.time]\nformat = \"\"\"\n[popup.default.time]\n\"\"\"\n";
        let patched = patch_value(text, "widgets.default.time.time-zone", "UTC");
        assert!(patched.ends_with("\"\"\"\ntime-zone = \"UTC\"\n"));

        let patched = patch_value(text, "theme", "dark");
        assert!(patched.starts_with("displayed = [\n    \"a\",\n    [\"b\"]\n]\ntheme = \"dark\"\n"));
        assert_eq!(parse(&patched)["theme"].as_str(), Some("dark"));
    }

    #[test]
    fn hash_inside_string_is_not_a_comment() {
        let text = "[widgets.default.time]\nformat = \"#1 = x\" # note\n";
        let patched = patch_value(text, "widgets.default.time.format", "HH");
        assert_eq!(patched, "[widgets.default.time]\nformat = \"HH\" # note\n");
    }
}
