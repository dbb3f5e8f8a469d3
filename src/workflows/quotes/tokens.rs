use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::{self, BufRead};

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

/// Simplified markup token handed to the pricing matrix scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlToken {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
    },
    EndTag {
        name: String,
    },
    Text(String),
}

impl HtmlToken {
    /// True for a start tag carrying an attribute whose value equals `value`.
    pub fn is_start_tag_with_attr_value(&self, value: &str) -> bool {
        match self {
            HtmlToken::StartTag { attrs, .. } => attrs.iter().any(|(_, v)| v == value),
            _ => false,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            HtmlToken::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Collects tokens emitted by the html5ever tokenizer, merging adjacent
/// character runs into a single text token.
#[derive(Debug, Default)]
struct TokenCollector {
    ready: VecDeque<HtmlToken>,
    pending_text: String,
}

impl TokenCollector {
    fn flush_text(&mut self) {
        if !self.pending_text.is_empty() {
            let text = std::mem::take(&mut self.pending_text);
            self.ready.push_back(HtmlToken::Text(text));
        }
    }

    fn push_tag(&mut self, tag: Tag) {
        self.flush_text();
        let name = tag.name.to_string();
        let token = match tag.kind {
            TagKind::StartTag => HtmlToken::StartTag {
                name,
                attrs: tag
                    .attrs
                    .into_iter()
                    .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                    .collect(),
            },
            TagKind::EndTag => HtmlToken::EndTag { name },
        };
        self.ready.push_back(token);
    }
}

impl TokenSink for TokenCollector {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::CharacterTokens(text) => self.pending_text.push_str(&text),
            Token::TagToken(tag) => self.push_tag(tag),
            Token::CommentToken(_) | Token::DoctypeToken(_) | Token::EOFToken => {
                self.flush_text()
            }
            Token::NullCharacterToken | Token::ParseError(_) => {}
        }
        TokenSinkResult::Continue
    }
}

/// Forward-only cursor over the tokens of a markup byte stream.
///
/// Input is pulled from the reader one line at a time and fed to the
/// tokenizer only when the buffered tokens run out, so a document is never
/// held in memory as a tree. Text tokens are only released once the tag that
/// ends them has been seen.
pub struct TokenCursor<R> {
    reader: R,
    tokenizer: Tokenizer<TokenCollector>,
    input: BufferQueue,
    line: Vec<u8>,
    exhausted: bool,
}

impl<R: BufRead> TokenCursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            tokenizer: Tokenizer::new(TokenCollector::default(), TokenizerOpts::default()),
            input: BufferQueue::new(),
            line: Vec::new(),
            exhausted: false,
        }
    }

    fn feed_next_line(&mut self) -> io::Result<()> {
        self.line.clear();
        let read = self.reader.read_until(b'\n', &mut self.line)?;
        if read == 0 {
            self.tokenizer.end();
            self.tokenizer.sink.flush_text();
            self.exhausted = true;
            return Ok(());
        }

        let chunk = match String::from_utf8_lossy(&self.line) {
            Cow::Borrowed(text) => StrTendril::from_slice(text),
            Cow::Owned(text) => StrTendril::from(text),
        };
        self.input.push_back(chunk);
        let _ = self.tokenizer.feed(&mut self.input);
        Ok(())
    }
}

impl<R: BufRead> Iterator for TokenCursor<R> {
    type Item = io::Result<HtmlToken>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(token) = self.tokenizer.sink.ready.pop_front() {
                return Some(Ok(token));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.feed_next_line() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}
