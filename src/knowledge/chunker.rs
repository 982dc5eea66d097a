//! Text Chunking Module
//!
//! 문서를 문장(또는 문단) 경계에서 분할합니다.
//! 청크는 원문 순서를 유지하며 앞뒤 공백만 제거됩니다.
//! 문장 중간에서 자르지 않으므로 청크를 이어 붙이면
//! 공백을 제외한 원문 내용이 그대로 복원됩니다.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

// ============================================================================
// Separator Policy
// ============================================================================

/// 분할 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeparatorPolicy {
    /// 문장 단위 (기본값)
    #[default]
    Sentence,
    /// 빈 줄로 구분된 문단 단위
    Paragraph,
}

impl SeparatorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeparatorPolicy::Sentence => "sentence",
            SeparatorPolicy::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for SeparatorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeparatorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentence" => Ok(SeparatorPolicy::Sentence),
            "paragraph" => Ok(SeparatorPolicy::Paragraph),
            other => Err(format!(
                "unknown separator policy '{}' (expected 'sentence' or 'paragraph')",
                other
            )),
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 순서대로 청크로 분할
    fn chunk(&self, text: &str) -> Vec<String>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SentenceChunker
// ============================================================================

/// 문장 경계 청커
///
/// 경계 규칙:
/// - `.` `!` `?` 연속(뒤따르는 닫는 따옴표/괄호 포함) 다음에 공백 또는 텍스트 끝
/// - `。` `！` `？`는 뒤에 공백이 없어도 경계
/// - 빈 줄
#[derive(Debug, Default)]
pub struct SentenceChunker;

impl SentenceChunker {
    pub fn new() -> Self {
        Self
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut segments = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let (pos, c) = chars[i];

            if is_terminator(c) {
                // 종결 부호와 닫는 기호를 한 덩어리로 소비
                let mut j = i + 1;
                while j < chars.len() && (is_terminator(chars[j].1) || is_closer(chars[j].1)) {
                    j += 1;
                }

                let at_end = j == chars.len();
                if at_end || chars[j].1.is_whitespace() || is_fullwidth_terminator(c) {
                    let end = if at_end { text.len() } else { chars[j].0 };
                    push_segment(&mut segments, &text[start..end]);
                    start = end;
                }

                i = j;
                continue;
            }

            if c == '\n' {
                // 빈 줄 (사이에 공백만 있는 연속 줄바꿈)
                let mut j = i + 1;
                while j < chars.len() && chars[j].1.is_whitespace() && chars[j].1 != '\n' {
                    j += 1;
                }
                if j < chars.len() && chars[j].1 == '\n' {
                    push_segment(&mut segments, &text[start..pos]);
                    start = pos;
                    i = j + 1;
                    continue;
                }
            }

            i += 1;
        }

        push_segment(&mut segments, &text[start..]);
        segments
    }

    fn name(&self) -> &'static str {
        "SentenceChunker"
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?') || is_fullwidth_terminator(c)
}

fn is_fullwidth_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』')
}

fn push_segment(segments: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        segments.push(trimmed.to_string());
    }
}

// ============================================================================
// ParagraphChunker
// ============================================================================

/// 문단 청커 (빈 줄 기준)
#[derive(Debug)]
pub struct ParagraphChunker {
    blank_line: Regex,
}

impl ParagraphChunker {
    pub fn new() -> Self {
        Self {
            blank_line: Regex::new(r"\n[ \t\r]*\n").expect("Invalid regex"),
        }
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut segments = Vec::new();
        for block in self.blank_line.split(text) {
            push_segment(&mut segments, block);
        }
        segments
    }

    fn name(&self) -> &'static str {
        "ParagraphChunker"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성 (문장 단위)
pub fn default_chunker() -> Box<dyn Chunker> {
    chunker_for(SeparatorPolicy::default())
}

/// 정책에 맞는 청커 생성
pub fn chunker_for(policy: SeparatorPolicy) -> Box<dyn Chunker> {
    match policy {
        SeparatorPolicy::Sentence => Box::new(SentenceChunker::new()),
        SeparatorPolicy::Paragraph => Box::new(ParagraphChunker::new()),
    }
}

// ============================================================================
// Tests
// ============================================================================
