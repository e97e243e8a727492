//! 结构化输出提取器
//!
//! 语言模型在没有语法约束时输出的 "JSON" 经常不规范：包在 Markdown 代码块里、
//! 前后夹杂说明文字、末尾多逗号、单引号字符串、裸标识符作为键名……
//!
//! 提取顺序（首个成功即返回）：
//! 0. 全文本身就是合法 JSON 时直接返回
//! 1. 代码块（``` 包裹且内部为 `{...}`）
//! 2. 文本中第一个 `{` 到最后一个 `}` 的子串；都没有则使用全文
//! 3. 清理：删除紧挨 `}` / `]` 之前的多余逗号（字符串内部不动）
//! 4. 严格 JSON 解析 → 宽松字面量解析；再对未清理的原始全文重复这两步
//! 5. 全部失败返回 `None`

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;

/// 宽松解析的最大嵌套深度（与 serde_json 默认限制一致）
const MAX_DEPTH: usize = 128;

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(\{.*?\})\s*```").expect("fenced block regex")
    })
}

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("think block regex"))
}

/// 从模型原始输出中提取结构化值
///
/// 永不 panic；无法恢复时返回 `None`，调用方应将其视为输出格式错误。
pub fn extract_structured(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(value);
    }

    let candidate = locate_candidate(raw);
    let sanitized = strip_trailing_separators(candidate);

    parse_structure(&sanitized).or_else(|| parse_structure(raw))
}

/// 删除推理旁路：成对的 `<think>...</think>` 片段
pub fn remove_thinking(text: &str) -> String {
    think_block_re().replace_all(text, "").trim().to_string()
}

/// 严格 JSON 解析，失败后尝试宽松字面量解析
pub fn parse_structure(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .or_else(|| parse_literal(trimmed).ok())
}

fn locate_candidate(raw: &str) -> &str {
    if let Some(body) = fenced_block_re()
        .captures(raw)
        .and_then(|caps| caps.get(1))
    {
        return body.as_str();
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => &raw[start..=end],
        _ => raw,
    }
}

/// 删除紧挨闭合括号前的逗号，忽略字符串字面量内部
fn strip_trailing_separators(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if let Some(q) = quote {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    out
}

/// 宽松字面量解析错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError(pub String);

impl std::fmt::Display for LiteralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "literal parse error: {}", self.0)
    }
}

impl std::error::Error for LiteralError {}

/// 宽松字面量解析
///
/// 在 JSON 之外额外接受：单引号字符串、尾随逗号、裸标识符键名、
/// `True` / `False` / `None`。
pub fn parse_literal(text: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser {
        chars: text.chars().collect(),
        pos: 0,
    };
    let value = parser.parse_value(0)?;
    parser.skip_whitespace();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn error(&self, message: &str) -> LiteralError {
        LiteralError(format!("{} at offset {}", message, self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        self.skip_whitespace();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.error(&format!("expected '{}'", expected))),
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.parse_object(depth),
            Some('[') => self.parse_array(depth),
            Some(q @ ('"' | '\'')) => self.parse_string(q).map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if is_ident_start(c) => {
                let ident = self.parse_identifier();
                match ident.as_str() {
                    "true" | "True" => Ok(Value::Bool(true)),
                    "false" | "False" => Ok(Value::Bool(false)),
                    "null" | "None" => Ok(Value::Null),
                    _ => Err(self.error("unexpected identifier")),
                }
            }
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }

            let key = match self.peek() {
                Some(q @ ('"' | '\'')) => self.parse_string(q)?,
                Some(c) if is_ident_start(c) => self.parse_identifier(),
                Some(c) if c.is_ascii_digit() || c == '-' => match self.parse_number()? {
                    Value::Number(n) => n.to_string(),
                    _ => return Err(self.error("invalid key")),
                },
                _ => return Err(self.error("expected object key")),
            };

            self.expect(':')?;
            let value = self.parse_value(depth + 1)?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_array(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }

            items.push(self.parse_value(depth + 1)?);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut out = String::new();

        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'b' => out.push('\u{0008}'),
                        'f' => out.push('\u{000C}'),
                        '0' => out.push('\0'),
                        'u' => out.push(self.parse_unicode_escape()?),
                        other => out.push(other),
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("invalid unicode escape"))?;
            code = code * 16 + digit;
        }
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_')
        ) {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let raw = raw.strip_prefix('+').unwrap_or(&raw);

        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Value::Number(Number::from(int)));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error("invalid number"))
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_fenced_block() {
        let raw = "Here is the profile:\n```json\n{\"name\": \"Mira\", \"age\": 31}\n```\nEnjoy!";
        assert_eq!(extract_structured(raw), Some(json!({"name": "Mira", "age": 31})));
    }

    #[test]
    fn test_extracts_first_brace_region() {
        let raw = "Sure! {\"title\": \"Night Market\"} hope that helps";
        assert_eq!(extract_structured(raw), Some(json!({"title": "Night Market"})));
    }

    #[test]
    fn test_strips_trailing_commas() {
        let raw = "{\"scenes\": [\"a\", \"b\",], \"title\": \"t\",}";
        assert_eq!(
            extract_structured(raw),
            Some(json!({"scenes": ["a", "b"], "title": "t"}))
        );
    }

    #[test]
    fn test_trailing_comma_inside_string_is_preserved() {
        let value = json!({"note": "x,}", "list": ["a,]"]});
        let raw = serde_json::to_string(&value).unwrap();
        assert_eq!(extract_structured(&raw), Some(value));
    }

    #[test]
    fn test_accepts_literal_syntax() {
        let raw = "{'name': 'Ana', interests: ['hiking', 'jazz',], 'active': True, 'pet': None}";
        assert_eq!(
            extract_structured(raw),
            Some(json!({
                "name": "Ana",
                "interests": ["hiking", "jazz"],
                "active": true,
                "pet": null
            }))
        );
    }

    #[test]
    fn test_falls_back_to_original_text() {
        // 第一个 `{` 到最后一个 `}` 的子串不是合法结构，原文才是
        let raw = r#"[{"a": 1}, {"b": 2}]"#;
        assert_eq!(extract_structured(raw), Some(json!([{"a": 1}, {"b": 2}])));
    }

    #[test]
    fn test_returns_none_for_garbage() {
        assert_eq!(extract_structured(""), None);
        assert_eq!(extract_structured("no structure here"), None);
        assert_eq!(extract_structured("{\"truncated\": [1, 2"), None);
    }

    #[test]
    fn test_never_panics_on_hostile_input() {
        let deep_open = "[".repeat(10_000);
        let deep_object = "{\"a\":".repeat(5_000);
        let inputs = [
            "{",
            "}",
            "}{",
            "```",
            "```json\n{```",
            "'",
            "{'a': '\\",
            "{\"a\": \"\\u12\"}",
            "-",
            "+.e",
            "{1: 2,,}",
            "\u{0}\u{1}\u{FFFD}",
            deep_open.as_str(),
            deep_object.as_str(),
        ];
        for input in inputs {
            let _ = extract_structured(input);
        }

        let bytes: Vec<u8> = (0u8..=255).collect();
        let _ = extract_structured(&String::from_utf8_lossy(&bytes));
    }

    #[test]
    fn test_idempotent_on_valid_values() {
        let values = [
            json!({"name": "Kai", "scene_summaries": ["one", "two"], "n": 3}),
            json!({"nested": {"deep": [1, 2.5, false, null]}}),
            json!([1, 2, 3]),
            json!([{"a": 1}, "x"]),
            json!([{"a": 1}, {"b": [2]}]),
            json!({"quote": "she said \"hi\"", "unicode": "café ✓"}),
            json!({}),
            json!("plain string"),
            json!(42),
        ];
        for value in values {
            let serialized = serde_json::to_string(&value).unwrap();
            assert_eq!(extract_structured(&serialized), Some(value.clone()));
            let pretty = serde_json::to_string_pretty(&value).unwrap();
            assert_eq!(extract_structured(&pretty), Some(value));
        }
    }

    #[test]
    fn test_remove_thinking() {
        let text = "<think>plan the answer\nstep 2</think>  Hello there";
        assert_eq!(remove_thinking(text), "Hello there");

        let text = "a<think>x</think>b<think>y</think>c";
        assert_eq!(remove_thinking(text), "abc");

        // 未闭合的标记保持原样
        assert_eq!(remove_thinking("<think>dangling"), "<think>dangling");
    }

    #[test]
    fn test_parse_literal_rejects_trailing_garbage() {
        assert!(parse_literal("{'a': 1} extra").is_err());
        assert!(parse_literal("nonsense").is_err());
        assert_eq!(parse_literal("-12").unwrap(), json!(-12));
        assert_eq!(parse_literal("1.5e2").unwrap(), json!(150.0));
    }
}
