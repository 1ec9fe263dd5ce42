// Patch payload parsing with staged repair.
//
// Payloads come from a language model and are often not valid JSON. Tiers
// run in order and each only runs when the previous one failed:
//
// 1. strict:      `serde_json` over the payload as given.
// 2. structural:  normalize line endings, strip wrappers and stray trailing
//    content, drop trailing commas, cut a truncated payload
//    back to its last complete element, then parse strictly.
// 3. manual scan: walk the payload as a flat character stream and pull out
//    every `{start, end, content}` object that can be read.
//
// Valid JSON of the wrong shape (quoted offsets, extra keys, a missing
// content field) still falls through to the later tiers. When nothing can be
// recovered the tier-1 reason is what the caller sees.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{decode_specs, Patch, PatchSpec, SpecError};

pub const DEFAULT_PREVIEW_CHARS: usize = 200;

pub const BASE64_HINT: &str = "re-send the patches with each replacement text in \
`content_base64` (standard base64 of the utf-8 text) instead of `content` to avoid \
JSON escaping problems";

/// Which tier produced the patch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTier {
    Strict,
    Structural,
    ManualScan,
}

impl ParseTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Structural => "structural",
            Self::ManualScan => "manual_scan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPatches {
    pub patches: Vec<Patch>,
    pub tier: ParseTier,
    /// Objects the manual scan found but could not turn into a patch.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchParseError {
    #[error("could not parse patch payload: {reason}")]
    Unparseable { reason: String, head: String, tail: String },
    #[error("patch {index}: invalid content_base64: {reason}")]
    Encoding { index: usize, reason: String },
}

impl PatchParseError {
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Unparseable { .. } => BASE64_HINT,
            Self::Encoding { .. } => {
                "`content_base64` must be standard padded base64 of utf-8 text; \
                 re-encode the replacement text and resubmit"
            }
        }
    }
}

/// Parses raw patch payloads; the only knob is the diagnostic preview size.
#[derive(Debug, Clone, Copy)]
pub struct PatchParser {
    preview_chars: usize,
}

impl Default for PatchParser {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl PatchParser {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    pub fn parse(&self, raw: &str) -> Result<ParsedPatches, PatchParseError> {
        if raw.trim().is_empty() {
            return Err(self.unparseable("payload is empty".to_string(), raw));
        }

        let strict_reason = match parse_strict(raw) {
            Ok(specs) => return self.finish(raw, specs, ParseTier::Strict, 0),
            Err(failure) => failure.into_reason(),
        };

        if let Some(repaired) = repair_structure(raw) {
            if let Ok(specs) = parse_strict(&repaired) {
                return self.finish(raw, specs, ParseTier::Structural, 0);
            }
        }

        let outcome = scan_patch_objects(raw);
        if outcome.specs.is_empty() {
            return Err(self.unparseable(strict_reason, raw));
        }
        self.finish(raw, outcome.specs, ParseTier::ManualScan, outcome.skipped)
    }

    fn finish(
        &self,
        raw: &str,
        specs: Vec<PatchSpec>,
        tier: ParseTier,
        skipped: usize,
    ) -> Result<ParsedPatches, PatchParseError> {
        if specs.is_empty() {
            return Err(self.unparseable("patch list is empty".to_string(), raw));
        }
        let patches = decode_specs(specs).map_err(|error| match error {
            SpecError::Encoding { index, reason } => PatchParseError::Encoding { index, reason },
            content @ SpecError::Content { .. } => self.unparseable(content.to_string(), raw),
        })?;
        Ok(ParsedPatches { patches, tier, skipped })
    }

    fn unparseable(&self, reason: String, raw: &str) -> PatchParseError {
        let (head, tail) = preview(raw, self.preview_chars);
        PatchParseError::Unparseable { reason, head, tail }
    }
}

fn preview(raw: &str, max_chars: usize) -> (String, String) {
    let total = raw.chars().count();
    if total <= max_chars {
        return (raw.to_string(), String::new());
    }
    let head = raw.chars().take(max_chars).collect();
    let tail = raw.chars().skip(total - max_chars).collect();
    (head, tail)
}

// ── Tier 1: strict ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrictFailure {
    /// Not JSON at all.
    Syntax(String),
    /// Valid JSON that is not a usable patch list.
    Schema(String),
}

impl StrictFailure {
    pub fn into_reason(self) -> String {
        match self {
            Self::Syntax(reason) | Self::Schema(reason) => reason,
        }
    }
}

/// Parse a payload that is either `[patch, ...]` or `{"patches": [patch, ...]}`.
pub fn parse_strict(raw: &str) -> Result<Vec<PatchSpec>, StrictFailure> {
    let value: Value =
        serde_json::from_str(raw).map_err(|error| StrictFailure::Syntax(error.to_string()))?;

    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => match map.remove("patches") {
            Some(list) => list,
            None => {
                return Err(StrictFailure::Schema(
                    "expected a JSON array of patches or an object with a `patches` array"
                        .to_string(),
                ))
            }
        },
        other => {
            return Err(StrictFailure::Schema(format!(
                "expected a JSON array of patches, found {}",
                json_kind(&other)
            )))
        }
    };

    let specs = serde_json::from_value::<Vec<PatchSpec>>(list)
        .map_err(|error| StrictFailure::Schema(format!("invalid patch object: {error}")))?;
    for (index, spec) in specs.iter().enumerate() {
        if let Some(problem) = spec.content_problem() {
            return Err(StrictFailure::Schema(format!("patch {index}: {problem}")));
        }
    }
    Ok(specs)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tier 2: structural repair ──────────────────────────────────────

/// Produce a structurally repaired copy of `raw`, or `None` when the payload
/// has no recognizable JSON container or its brackets are mismatched.
pub fn repair_structure(raw: &str) -> Option<String> {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = normalized.trim();
    let begin = trimmed.find(['[', '{'])?;
    let body = &trimmed[begin..];
    let bytes = body.as_bytes();

    let mut out = String::with_capacity(body.len() + 4);
    let mut stack: Vec<u8> = Vec::new();
    // Output length and open containers right after the last element that
    // closed inside an array.
    let mut last_complete: Option<(usize, Vec<u8>)> = None;
    let mut pos = 0usize;
    let mut closed = false;

    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => match string_end(body, pos) {
                Some(end) => {
                    out.push_str(&body[pos..end]);
                    pos = end;
                    continue;
                }
                // Unterminated string: the payload was cut off mid-value.
                None => break,
            },
            open @ (b'[' | b'{') => {
                stack.push(open);
                out.push(open as char);
            }
            close @ (b']' | b'}') => {
                let expected = if close == b']' { b'[' } else { b'{' };
                if stack.pop() != Some(expected) {
                    return None;
                }
                trim_trailing_comma(&mut out);
                out.push(close as char);
                if stack.last() == Some(&b'[') {
                    last_complete = Some((out.len(), stack.clone()));
                }
                if stack.is_empty() {
                    closed = true;
                    break;
                }
            }
            _ => {
                let ch = body[pos..].chars().next()?;
                out.push(ch);
                pos += ch.len_utf8();
                continue;
            }
        }
        pos += 1;
    }

    if !closed {
        let (cut, open) = last_complete?;
        out.truncate(cut);
        stack = open;
        for open in stack.iter().rev() {
            trim_trailing_comma(&mut out);
            out.push(if *open == b'[' { ']' } else { '}' });
        }
    }

    Some(out)
}

/// Byte offset just past the closing quote of the string opening at `start`.
fn string_end(text: &str, start: usize) -> Option<usize> {
    let mut escaped = false;
    for (offset, ch) in text[start + 1..].char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return Some(start + 1 + offset + 1);
        }
    }
    None
}

fn trim_trailing_comma(out: &mut String) {
    let kept = out.trim_end().len();
    if out[..kept].ends_with(',') {
        out.truncate(kept - 1);
    }
}

// ── Tier 3: manual scan ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanOutcome {
    pub specs: Vec<PatchSpec>,
    pub skipped: usize,
}

/// Recover patch objects from a payload that no JSON parser accepts.
///
/// Unescaped control characters inside `content` are kept verbatim. A
/// malformed object is counted in `skipped` and scanning resumes after it.
pub fn scan_patch_objects(raw: &str) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut pos = 0usize;

    while let Some(found) = raw[pos..].find('{') {
        let open = pos + found;
        let mut scanner = ObjectScanner::new(raw, open + 1);
        let step = scanner.scan();
        match step {
            ScanStep::Complete => match scanner.fields.into_spec() {
                Some(spec) => outcome.specs.push(spec),
                None => outcome.skipped += 1,
            },
            ScanStep::Container => {}
            ScanStep::Broken => outcome.skipped += 1,
        }
        pos = scanner.pos.max(open + 1);
    }

    outcome
}

fn number_pattern() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| {
        Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?")
            .expect("number pattern should compile")
    })
}

enum ScanStep {
    Complete,
    /// A wrapper such as `{"patches": [...]}`; scanning resumes inside it.
    Container,
    Broken,
}

#[derive(Debug, Default)]
struct ScannedFields {
    start: Option<usize>,
    end: Option<usize>,
    content: Option<String>,
    content_base64: Option<String>,
    invalid: bool,
}

impl ScannedFields {
    fn is_empty(&self) -> bool {
        self.start.is_none()
            && self.end.is_none()
            && self.content.is_none()
            && self.content_base64.is_none()
    }

    fn into_spec(self) -> Option<PatchSpec> {
        if self.invalid {
            return None;
        }
        let spec = PatchSpec {
            start: self.start?,
            end: self.end?,
            content: self.content,
            content_base64: self.content_base64,
        };
        spec.content_problem().is_none().then_some(spec)
    }
}

struct ObjectScanner<'a> {
    raw: &'a str,
    pos: usize,
    fields: ScannedFields,
}

impl<'a> ObjectScanner<'a> {
    fn new(raw: &'a str, pos: usize) -> Self {
        Self { raw, pos, fields: ScannedFields::default() }
    }

    fn peek(&self) -> Option<u8> {
        self.raw.as_bytes().get(self.pos).copied()
    }

    fn skip_separators(&mut self) {
        while let Some(byte) = self.peek() {
            if byte.is_ascii_whitespace() || byte == b',' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(byte) if byte.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn scan(&mut self) -> ScanStep {
        loop {
            self.skip_separators();
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return ScanStep::Complete;
                }
                Some(b'"') => {}
                _ => return ScanStep::Broken,
            }

            let Some(key) = self.read_string() else {
                return ScanStep::Broken;
            };
            self.skip_whitespace();
            if self.peek() != Some(b':') {
                return ScanStep::Broken;
            }
            self.pos += 1;
            self.skip_whitespace();

            match self.peek() {
                Some(b'"') => {
                    let Some(value) = self.read_string() else {
                        return ScanStep::Broken;
                    };
                    self.assign_text(&key, value);
                }
                Some(b'{' | b'[') => {
                    if key == "patches" || self.fields.is_empty() {
                        return ScanStep::Container;
                    }
                    match string_aware_skip(self.raw, self.pos) {
                        Some(next) => self.pos = next,
                        None => return ScanStep::Broken,
                    }
                }
                Some(byte) if byte == b'-' || byte.is_ascii_digit() => {
                    let Some(found) = number_pattern().find(&self.raw[self.pos..]) else {
                        return ScanStep::Broken;
                    };
                    let literal = found.as_str();
                    self.pos += literal.len();
                    self.assign_number(&key, literal);
                }
                Some(_) => {
                    let rest = &self.raw[self.pos..];
                    let len = rest
                        .find(|c: char| c == ',' || c == '}' || c.is_ascii_whitespace())
                        .unwrap_or(rest.len());
                    self.pos += len;
                    if matches!(key.as_str(), "start" | "end" | "content" | "content_base64") {
                        self.fields.invalid = true;
                    }
                }
                None => return ScanStep::Broken,
            }
        }
    }

    fn assign_text(&mut self, key: &str, value: String) {
        match key {
            "content" => self.fields.content = Some(value),
            "content_base64" => self.fields.content_base64 = Some(value),
            // Quoted offsets such as "start": "12" are accepted.
            "start" | "end" => self.assign_number(key, value.trim()),
            _ => {}
        }
    }

    fn assign_number(&mut self, key: &str, literal: &str) {
        let slot = match key {
            "start" => &mut self.fields.start,
            "end" => &mut self.fields.end,
            "content" | "content_base64" => {
                self.fields.invalid = true;
                return;
            }
            _ => return,
        };
        match literal.parse::<usize>() {
            Ok(value) => *slot = Some(value),
            Err(_) => self.fields.invalid = true,
        }
    }

    /// Read the string opening at `self.pos`, decoding escapes.
    fn read_string(&mut self) -> Option<String> {
        let (value, next) = decode_string(self.raw, self.pos)?;
        self.pos = next;
        Some(value)
    }
}

/// Decode the JSON-ish string whose opening quote is at byte `start`.
///
/// A backslash escapes the next char; an unescaped quote closes the string.
/// Raw control characters are kept. Returns the text and the byte offset
/// just past the closing quote.
fn decode_string(raw: &str, start: usize) -> Option<(String, usize)> {
    let body = &raw[start + 1..];
    let mut out = String::new();
    let mut chars = body.char_indices();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            '"' => return Some((out, start + 1 + offset + 1)),
            '\\' => {
                let (_, escaped) = chars.next()?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{0008}'),
                    'f' => out.push('\u{000C}'),
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'u' => out.push(decode_unicode_escape(body, &mut chars)),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            other => out.push(other),
        }
    }

    None
}

fn decode_unicode_escape(body: &str, chars: &mut std::str::CharIndices<'_>) -> char {
    let Some(high) = read_hex4(body, chars) else {
        return char::REPLACEMENT_CHARACTER;
    };
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER);
    }

    // High surrogate: a `\uXXXX` low surrogate must follow.
    let mut lookahead = chars.clone();
    if let (Some((_, '\\')), Some((_, 'u'))) = (lookahead.next(), lookahead.next()) {
        if let Some(low) = read_hex4(body, &mut lookahead) {
            if (0xDC00..0xE000).contains(&low) {
                *chars = lookahead;
                let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER);
            }
        }
    }
    char::REPLACEMENT_CHARACTER
}

fn read_hex4(body: &str, chars: &mut std::str::CharIndices<'_>) -> Option<u32> {
    let (offset, _) = chars.clone().next()?;
    let digits = body.get(offset..offset + 4)?;
    let value = u32::from_str_radix(digits, 16).ok()?;
    for _ in 0..4 {
        chars.next();
    }
    Some(value)
}

/// Skip a balanced `{...}` or `[...]` starting at `start`, respecting strings.
fn string_aware_skip(raw: &str, start: usize) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'"' => {
                pos = string_end(raw, pos)?;
                continue;
            }
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(pos + 1);
                }
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> PatchParser {
        PatchParser::default()
    }

    // ── tier 1: strict ─────────────────────────────────────────────

    #[test]
    fn strict_parses_array_form() {
        let specs = parse_strict(r#"[{"start":0,"end":5,"content":"HELLO"}]"#).unwrap();
        assert_eq!(specs, vec![PatchSpec::text(0, 5, "HELLO")]);
    }

    #[test]
    fn strict_parses_wrapped_form() {
        let specs =
            parse_strict(r#"{"patches":[{"start":1,"end":1,"content_base64":"eA=="}]}"#).unwrap();
        assert_eq!(specs, vec![PatchSpec::base64(1, 1, "eA==")]);
    }

    #[test]
    fn strict_reports_syntax_failure_for_truncation() {
        let failure = parse_strict(r#"[{"start":0,"end":5,"content":"HELLO"}"#).unwrap_err();
        assert!(matches!(failure, StrictFailure::Syntax(_)));
    }

    #[test]
    fn strict_reports_schema_failure_for_wrong_shape() {
        assert!(matches!(parse_strict(r#""just text""#), Err(StrictFailure::Schema(_))));
        assert!(matches!(parse_strict(r#"{"edits":[]}"#), Err(StrictFailure::Schema(_))));
        assert!(matches!(
            parse_strict(r#"[{"start":-1,"end":2,"content":"x"}]"#),
            Err(StrictFailure::Schema(_))
        ));
        assert!(matches!(
            parse_strict(r#"[{"start":0,"end":2,"text":"x"}]"#),
            Err(StrictFailure::Schema(_))
        ));
        assert_eq!(
            parse_strict(r#"[{"start":0,"end":2,"content":"x"},{"start":3,"end":4}]"#),
            Err(StrictFailure::Schema(
                "patch 1: missing `content` (use \"\" to delete the range)".to_string()
            ))
        );
    }

    #[test]
    fn parse_uses_strict_tier_for_valid_payload() {
        let parsed = parser().parse(r#"[{"start":0,"end":5,"content":"HELLO"}]"#).unwrap();
        assert_eq!(parsed.tier, ParseTier::Strict);
        assert_eq!(parsed.patches, vec![Patch::new(0, 5, "HELLO")]);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn unknown_field_without_content_fails_with_strict_reason() {
        let error = parser().parse(r#"[{"start":0,"end":2,"text":"x"}]"#).unwrap_err();
        match error {
            PatchParseError::Unparseable { reason, .. } => {
                assert!(reason.contains("unknown field `text`"), "reason: {reason}");
            }
            other => panic!("expected unparseable, got {other:?}"),
        }
    }

    #[test]
    fn parse_recovers_quoted_offsets_in_valid_json() {
        let parsed = parser().parse(r#"[{"start":"0","end":"5","content":"HELLO"}]"#).unwrap();
        assert_eq!(parsed.tier, ParseTier::ManualScan);
        assert_eq!(parsed.patches, vec![Patch::new(0, 5, "HELLO")]);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn parse_recovers_extra_field_in_valid_json() {
        let raw = r#"[{"start":0,"end":5,"content":"HELLO","reason":"caps"}]"#;
        let parsed = parser().parse(raw).unwrap();
        assert_eq!(parsed.tier, ParseTier::ManualScan);
        assert_eq!(parsed.patches, vec![Patch::new(0, 5, "HELLO")]);
    }

    #[test]
    fn parse_rejects_patch_without_content() {
        let error = parser().parse(r#"[{"start":0,"end":5}]"#).unwrap_err();
        match error {
            PatchParseError::Unparseable { reason, .. } => {
                assert!(reason.contains("patch 0: missing `content`"), "reason: {reason}");
            }
            other => panic!("expected unparseable, got {other:?}"),
        }
    }

    #[test]
    fn parse_skips_contentless_patch_among_good_ones() {
        let raw = r#"[{"start":0,"end":1},{"start":2,"end":3,"content":""}]"#;
        let parsed = parser().parse(raw).unwrap();
        assert_eq!(parsed.tier, ParseTier::ManualScan);
        assert_eq!(parsed.patches, vec![Patch::new(2, 3, "")]);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn parse_still_rejects_wrong_top_level_shape() {
        for raw in [r#""just text""#, r#"{"edits":[]}"#] {
            let error = parser().parse(raw).unwrap_err();
            match error {
                PatchParseError::Unparseable { reason, .. } => {
                    assert!(reason.starts_with("expected a JSON array"), "reason: {reason}");
                }
                other => panic!("expected unparseable, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_rejects_empty_list() {
        let error = parser().parse("[]").unwrap_err();
        assert!(error.to_string().contains("patch list is empty"));
    }

    // ── tier 2: structural ─────────────────────────────────────────

    #[test]
    fn repair_closes_missing_bracket() {
        let repaired = repair_structure(r#"[{"start":0,"end":5,"content":"HELLO"}"#).unwrap();
        assert_eq!(repaired, r#"[{"start":0,"end":5,"content":"HELLO"}]"#);
    }

    #[test]
    fn repair_cuts_back_to_last_complete_element() {
        let repaired = repair_structure(
            r#"[{"start":0,"end":1,"content":"a"},{"start":4,"end":6,"content":"unfinis"#,
        )
        .unwrap();
        assert_eq!(repaired, r#"[{"start":0,"end":1,"content":"a"}]"#);
    }

    #[test]
    fn repair_drops_stray_trailing_content() {
        let repaired =
            repair_structure("[{\"start\":0,\"end\":0,\"content\":\"x\"}]\nDone! Let me know.")
                .unwrap();
        assert_eq!(repaired, r#"[{"start":0,"end":0,"content":"x"}]"#);
    }

    #[test]
    fn repair_strips_code_fence_and_trailing_commas() {
        let raw = "```json\r\n[\r\n  {\"start\": 2, \"end\": 3, \"content\": \"b\",},\r\n]\r\n```";
        let repaired = repair_structure(raw).unwrap();
        assert_eq!(parse_strict(&repaired).unwrap(), vec![PatchSpec::text(2, 3, "b")]);
    }

    #[test]
    fn repair_keeps_brackets_inside_strings() {
        let repaired =
            repair_structure(r#"{"patches":[{"start":0,"end":0,"content":"]}{["}"#).unwrap();
        assert_eq!(repaired, r#"{"patches":[{"start":0,"end":0,"content":"]}{["}]}"#);
    }

    #[test]
    fn repair_gives_up_without_any_container() {
        assert_eq!(repair_structure("start 0 end 5"), None);
    }

    #[test]
    fn repair_gives_up_on_mismatched_brackets() {
        assert_eq!(repair_structure(r#"[{"start":0]"#), None);
    }

    #[test]
    fn repair_gives_up_when_nothing_completed() {
        assert_eq!(repair_structure(r#"[{"start":0,"end":5,"content":"HEL"#), None);
    }

    #[test]
    fn parse_recovers_missing_bracket_via_structural_tier() {
        let strict = parser().parse(r#"[{"start":0,"end":5,"content":"HELLO"}]"#).unwrap();
        let repaired = parser().parse(r#"[{"start":0,"end":5,"content":"HELLO"}"#).unwrap();
        assert_eq!(repaired.tier, ParseTier::Structural);
        assert_eq!(repaired.patches, strict.patches);
    }

    // ── tier 3: manual scan ────────────────────────────────────────

    #[test]
    fn scan_recovers_raw_newlines_and_tabs() {
        let raw = "[{\"start\":0,\"end\":3,\"content\":\"line one\nline\ttwo\"}]";
        let outcome = scan_patch_objects(raw);
        assert_eq!(outcome.specs, vec![PatchSpec::text(0, 3, "line one\nline\ttwo")]);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn scan_decodes_standard_escapes() {
        let raw = r#"[{"start":0,"end":0,"content":"a\n\t\\\"q\"\/é😀"}"#;
        let outcome = scan_patch_objects(raw);
        assert_eq!(outcome.specs[0].content.as_deref(), Some("a\n\t\\\"q\"/é😀"));
    }

    #[test]
    fn scan_accepts_fields_in_any_order() {
        let raw = r#"[{"content":"x","end":4,"start":2}"#;
        assert_eq!(scan_patch_objects(raw).specs, vec![PatchSpec::text(2, 4, "x")]);
    }

    #[test]
    fn scan_skips_malformed_object_and_keeps_going() {
        let raw = concat!(
            "[{\"start\":0,\"end\" 1,\"content\":\"bad\"},",
            "{\"start\":5,\"end\":6,\"content\":\"good\ttab\"}]"
        );
        let outcome = scan_patch_objects(raw);
        assert_eq!(outcome.specs, vec![PatchSpec::text(5, 6, "good\ttab")]);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn scan_skips_negative_offsets() {
        let raw = concat!(
            "[{\"start\":-2,\"end\":1,\"content\":\"a\nb\"},",
            "{\"start\":1,\"end\":1,\"content\":\"c\nd\"}]"
        );
        let outcome = scan_patch_objects(raw);
        assert_eq!(outcome.specs, vec![PatchSpec::text(1, 1, "c\nd")]);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn scan_descends_into_wrapper_object() {
        let raw = "{\"patches\": [{\"start\":0,\"end\":0,\"content\":\"raw\nnewline\"}]";
        let outcome = scan_patch_objects(raw);
        assert_eq!(outcome.specs, vec![PatchSpec::text(0, 0, "raw\nnewline")]);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn scan_ignores_braces_inside_content() {
        let raw = concat!(
            "[{\"start\":0,\"end\":0,\"content\":\"fn main() {\n}\"},",
            "{\"start\":3,\"end\":3,\"content\":\"}\"}]"
        );
        let outcome = scan_patch_objects(raw);
        assert_eq!(
            outcome.specs,
            vec![PatchSpec::text(0, 0, "fn main() {\n}"), PatchSpec::text(3, 3, "}")]
        );
    }

    #[test]
    fn scan_skips_unterminated_trailing_object() {
        let raw = concat!(
            "[{\"start\":0,\"end\":0,\"content\":\"a\nb\"},",
            "{\"start\":2,\"end\":2,\"content\":\"cut"
        );
        let outcome = scan_patch_objects(raw);
        assert_eq!(outcome.specs.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn scan_accepts_quoted_offsets_and_extra_fields() {
        let raw = "[{\"start\":\"3\",\"end\":\"4\",\"why\":{\"a\":[1]},\"content\":\"z\n\"}";
        assert_eq!(scan_patch_objects(raw).specs, vec![PatchSpec::text(3, 4, "z\n")]);
    }

    #[test]
    fn scan_requires_content_field() {
        let outcome = scan_patch_objects("[{\"start\":0,\"end\":1}");
        assert!(outcome.specs.is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn scan_skips_object_with_both_content_fields() {
        let raw = "[{\"start\":0,\"end\":1,\"content\":\"a\",\"content_base64\":\"YQ==\"}";
        let outcome = scan_patch_objects(raw);
        assert!(outcome.specs.is_empty());
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn parse_uses_manual_scan_for_unescaped_control_characters() {
        let raw = "[{\"start\":0,\"end\":5,\"content\":\"HELLO\n\"}]";
        let parsed = parser().parse(raw).unwrap();
        assert_eq!(parsed.tier, ParseTier::ManualScan);
        assert_eq!(parsed.patches, vec![Patch::new(0, 5, "HELLO\n")]);
    }

    // ── failure diagnostics ────────────────────────────────────────

    #[test]
    fn unrecoverable_payload_carries_previews_and_hint() {
        let raw = format!("garbage {} more garbage", "x".repeat(500));
        let error = PatchParser::new(16).parse(&raw).unwrap_err();
        match &error {
            PatchParseError::Unparseable { reason, head, tail } => {
                assert!(!reason.is_empty());
                assert_eq!(head, "garbage xxxxxxxx");
                assert_eq!(tail, "xxx more garbage");
            }
            other => panic!("expected unparseable, got {other:?}"),
        }
        assert!(error.hint().contains("content_base64"));
    }

    #[test]
    fn short_payload_preview_has_empty_tail() {
        let error = parser().parse("nope").unwrap_err();
        match error {
            PatchParseError::Unparseable { head, tail, .. } => {
                assert_eq!(head, "nope");
                assert!(tail.is_empty());
            }
            other => panic!("expected unparseable, got {other:?}"),
        }
    }

    #[test]
    fn invalid_base64_is_an_encoding_error() {
        let error =
            parser().parse(r#"[{"start":0,"end":0,"content_base64":"@@@"}]"#).unwrap_err();
        assert!(matches!(error, PatchParseError::Encoding { index: 0, .. }));
    }
}
