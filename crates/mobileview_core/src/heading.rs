use std::cell::RefCell;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

/// Remove inline markup from a section heading, keeping its text content.
///
/// The heading is run through the HTML tokenizer, so tags and comments are dropped
/// and every named or numeric character reference is decoded the way a browser
/// would. A tag left open at the end of the input is discarded.
pub fn strip_markup(line: &str) -> String {
    if !line.contains('<') && !line.contains('&') {
        return line.to_string();
    }

    let tokenizer = Tokenizer::new(TextSink::default(), TokenizerOpts::default());
    let input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(line));
    let _ = tokenizer.feed(&input);
    tokenizer.end();
    tokenizer.sink.text.take()
}

#[derive(Default)]
struct TextSink {
    text: RefCell<String>,
}

impl TokenSink for TextSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if let Token::CharacterTokens(chars) = token {
            self.text.borrow_mut().push_str(&chars);
        }
        TokenSinkResult::Continue
    }
}
