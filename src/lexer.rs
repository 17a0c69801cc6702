use thiserror::Error;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexerState {
    LineBegin,
    TokenStart,
}

enum StepOutcome<'a> {
    Emit(Token<'a>),
    Continue,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("Indent must be a multiple of two spaces at position {position}")]
    OddIndent { position: usize },
    #[error("Too big change of indent at position {position}")]
    IndentJump { position: usize },
    #[error("Bad two-character operator at position {position}: '!' must be followed by '='")]
    BadTwoCharOperator { position: usize },
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("Invalid integer literal '{literal}' at position {position}")]
    InvalidIntegerLiteral { literal: String, position: usize },
    #[error("Unterminated string literal at position {position}")]
    UnterminatedString { position: usize },
}

pub type LexResult<T> = Result<T, LexError>;

/// Incremental lexer over the source text.
///
/// Indentation is measured only at the start of a logical line, one level per
/// two spaces. Indent/Dedent tokens are virtual: batched dedents are queued in
/// `pending_tokens` and drained one per `next_token` call.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    indent: usize,
    pending_tokens: Vec<Token<'a>>,
    state: LexerState,
    emitted_any: bool,
    at_line_break: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            indent: 0,
            pending_tokens: Vec::new(),
            state: LexerState::LineBegin,
            emitted_any: false,
            at_line_break: false,
        }
    }

    /// Produces the next token. Calling again after `Eof` keeps returning
    /// `Eof`.
    pub fn next_token(&mut self) -> LexResult<Token<'a>> {
        loop {
            if let Some(token) = self.pending_tokens.pop() {
                return Ok(self.record(token));
            }

            match self.step_state()? {
                StepOutcome::Emit(token) => return Ok(self.record(token)),
                StepOutcome::Continue => continue,
            }
        }
    }

    fn record(&mut self, token: Token<'a>) -> Token<'a> {
        self.at_line_break = matches!(token, Token::Newline | Token::Dedent);
        if !matches!(token, Token::Eof) {
            self.emitted_any = true;
        }
        token
    }

    fn step_state(&mut self) -> LexResult<StepOutcome<'a>> {
        match self.state {
            LexerState::LineBegin => {
                let spaces = self.consume_while(|c| c == ' ');
                match self.peek_char() {
                    // Whitespace-only and comment-only lines are blank: no
                    // NEWLINE, no indentation change.
                    Some('\n') => {
                        self.consume_char();
                        Ok(StepOutcome::Continue)
                    }
                    Some('#') => {
                        self.consume_while(|c| c != '\n');
                        self.consume_char();
                        Ok(StepOutcome::Continue)
                    }
                    None => self.handle_eof(),
                    Some(_) => {
                        self.apply_indentation(spaces)?;
                        self.state = LexerState::TokenStart;
                        Ok(StepOutcome::Continue)
                    }
                }
            }
            LexerState::TokenStart => {
                self.consume_while(|c| c == ' ');
                if self.peek_char() == Some('#') {
                    self.consume_while(|c| c != '\n');
                }

                match self.peek_char() {
                    None => self.handle_eof(),
                    Some('\n') => {
                        self.consume_char();
                        self.state = LexerState::LineBegin;
                        Ok(StepOutcome::Emit(Token::Newline))
                    }
                    Some(ch) => Ok(StepOutcome::Emit(self.read_token(ch)?)),
                }
            }
        }
    }

    fn apply_indentation(&mut self, spaces: usize) -> LexResult<()> {
        let position = self.pos;
        if spaces % 2 != 0 {
            return Err(LexError::OddIndent { position });
        }
        let level = spaces / 2;
        if level == self.indent + 1 {
            self.indent = level;
            self.pending_tokens.push(Token::Indent);
        } else if level < self.indent {
            for _ in level..self.indent {
                self.pending_tokens.push(Token::Dedent);
            }
            self.indent = level;
        } else if level != self.indent {
            return Err(LexError::IndentJump { position });
        }
        Ok(())
    }

    fn handle_eof(&mut self) -> LexResult<StepOutcome<'a>> {
        // Close any open blocks before EOF.
        while self.indent > 0 {
            self.indent -= 1;
            self.pending_tokens.push(Token::Dedent);
        }
        if !self.pending_tokens.is_empty() {
            return Ok(StepOutcome::Continue);
        }
        if self.emitted_any && !self.at_line_break {
            return Ok(StepOutcome::Emit(Token::Newline));
        }
        Ok(StepOutcome::Emit(Token::Eof))
    }

    fn read_token(&mut self, ch: char) -> LexResult<Token<'a>> {
        if ch.is_ascii_digit() {
            return self.read_number();
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return Ok(self.read_identifier());
        }
        if matches!(ch, '=' | '!' | '<' | '>') {
            return self.read_comparison_or_char(ch);
        }
        if matches!(ch, '+' | '-' | '*' | '/' | ':' | ',' | '.' | '(' | ')') {
            self.consume_char();
            return Ok(Token::Char(ch));
        }
        if ch == '\'' || ch == '"' {
            return self.read_string(ch);
        }
        Err(LexError::UnexpectedCharacter {
            character: ch,
            position: self.pos,
        })
    }

    fn read_comparison_or_char(&mut self, ch: char) -> LexResult<Token<'a>> {
        let position = self.pos;
        self.consume_char();
        if self.peek_char() == Some('=') {
            self.consume_char();
            let token = match ch {
                '=' => Token::Eq,
                '!' => Token::NotEq,
                '<' => Token::LessOrEq,
                _ => Token::GreaterOrEq,
            };
            return Ok(token);
        }
        if ch == '!' {
            return Err(LexError::BadTwoCharOperator { position });
        }
        Ok(Token::Char(ch))
    }

    fn read_identifier(&mut self) -> Token<'a> {
        let start = self.pos;
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let ident = &self.input[start..self.pos];
        match ident {
            "print" => Token::Print,
            "class" => Token::Class,
            "return" => Token::Return,
            "if" => Token::If,
            "else" => Token::Else,
            "def" => Token::Def,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            _ => Token::Id(ident),
        }
    }

    fn read_number(&mut self) -> LexResult<Token<'a>> {
        let start = self.pos;
        self.consume_while(|c| c.is_ascii_digit());
        let literal = &self.input[start..self.pos];
        let value = literal
            .parse::<i64>()
            .map_err(|_| LexError::InvalidIntegerLiteral {
                literal: literal.to_string(),
                position: start,
            })?;
        Ok(Token::Number(value))
    }

    fn read_string(&mut self, quote: char) -> LexResult<Token<'a>> {
        let start = self.pos;
        self.consume_char();
        let mut value = String::new();
        loop {
            match self.consume_char() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString { position: start });
                }
                Some(ch) if ch == quote => break,
                Some('\\') => {
                    let Some(escaped) = self.consume_char() else {
                        return Err(LexError::UnterminatedString { position: start });
                    };
                    match escaped {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        // An unknown escape drops the backslash and keeps the
                        // character.
                        other => value.push(other),
                    }
                }
                Some(ch) => value.push(ch),
            }
        }
        Ok(Token::String(value))
    }

    fn consume_while<P>(&mut self, keep_predicate: P) -> usize
    where
        P: Fn(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if !keep_predicate(c) {
                break;
            }
            self.consume_char();
        }
        self.pos - start
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}

/// Lexes the whole input into a token vector ending with `Eof`.
pub fn tokenize(input: &str) -> LexResult<Vec<Token<'_>>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let is_eof = matches!(token, Token::Eof);
        tokens.push(token);
        if is_eof {
            break;
        }
    }
    Ok(tokens)
}

/// Cursor over a fully lexed token sequence, as consumed by the parser.
pub struct TokenStream<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(input: &'a str) -> LexResult<Self> {
        Ok(Self {
            tokens: tokenize(input)?,
            pos: 0,
        })
    }

    /// Idempotent peek at the current token.
    pub fn current_token(&self) -> &Token<'a> {
        &self.tokens[self.pos]
    }

    /// Advances and returns the new current token; saturates at `Eof`.
    pub fn next_token(&mut self) -> &Token<'a> {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        self.current_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn lexes_class_with_method_and_call() {
        let input = indoc! {"
            class A:
              def f(self):
                return 1
            print A().f()
        "};
        let tokens = tokenize(input).expect("tokenize should succeed");
        let expected = vec![
            Token::Class,
            Token::Id("A"),
            Token::Char(':'),
            Token::Newline,
            Token::Indent,
            Token::Def,
            Token::Id("f"),
            Token::Char('('),
            Token::Id("self"),
            Token::Char(')'),
            Token::Char(':'),
            Token::Newline,
            Token::Indent,
            Token::Return,
            Token::Number(1),
            Token::Newline,
            Token::Dedent,
            Token::Dedent,
            Token::Print,
            Token::Id("A"),
            Token::Char('('),
            Token::Char(')'),
            Token::Char('.'),
            Token::Id("f"),
            Token::Char('('),
            Token::Char(')'),
            Token::Newline,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn errors_on_odd_indent() {
        let err = tokenize(" x = 1\n").expect_err("expected odd indent failure");
        assert_eq!(err, LexError::OddIndent { position: 1 });
        assert!(err.to_string().contains("multiple of two"));
    }

    #[test]
    fn errors_on_indent_jump() {
        let input = indoc! {"
            if True:
                print 'deep'
        "};
        let err = tokenize(input).expect_err("expected indent jump failure");
        assert!(matches!(err, LexError::IndentJump { .. }));
        assert!(err.to_string().contains("Too big change of indent"));
    }

    #[test]
    fn errors_on_lone_exclamation_mark() {
        let err = tokenize("x = !y\n").expect_err("expected bad operator failure");
        assert!(matches!(err, LexError::BadTwoCharOperator { .. }));
    }

    #[test]
    fn lexes_two_char_comparison_operators() {
        let tokens = tokenize("a == b != c <= d >= e < f > g\n").expect("tokenize");
        let expected = vec![
            Token::Id("a"),
            Token::Eq,
            Token::Id("b"),
            Token::NotEq,
            Token::Id("c"),
            Token::LessOrEq,
            Token::Id("d"),
            Token::GreaterOrEq,
            Token::Id("e"),
            Token::Char('<'),
            Token::Id("f"),
            Token::Char('>'),
            Token::Id("g"),
            Token::Newline,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn blank_and_comment_lines_emit_nothing() {
        let input = indoc! {"
            x = 1
            # a comment-only line
                 # indented comment, still blank
            y = 2

            z = 3
        "};
        let tokens = tokenize(input).expect("tokenize");
        let expected = vec![
            Token::Id("x"),
            Token::Char('='),
            Token::Number(1),
            Token::Newline,
            Token::Id("y"),
            Token::Char('='),
            Token::Number(2),
            Token::Newline,
            Token::Id("z"),
            Token::Char('='),
            Token::Number(3),
            Token::Newline,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn trailing_comment_keeps_the_newline() {
        let tokens = tokenize("x = 1  # trailing\n").expect("tokenize");
        let expected = vec![
            Token::Id("x"),
            Token::Char('='),
            Token::Number(1),
            Token::Newline,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn emits_dedents_when_file_ends_mid_block() {
        let input = "if True:\n  if True:\n    x = 1";
        let tokens = tokenize(input).expect("tokenize");
        let expected = vec![
            Token::If,
            Token::True,
            Token::Char(':'),
            Token::Newline,
            Token::Indent,
            Token::If,
            Token::True,
            Token::Char(':'),
            Token::Newline,
            Token::Indent,
            Token::Id("x"),
            Token::Char('='),
            Token::Number(1),
            Token::Dedent,
            Token::Dedent,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn appends_newline_when_last_line_is_unterminated() {
        let tokens = tokenize("x = 1").expect("tokenize");
        let expected = vec![
            Token::Id("x"),
            Token::Char('='),
            Token::Number(1),
            Token::Newline,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn blank_file_lexes_to_eof_alone() {
        assert_eq!(tokenize("").expect("tokenize"), vec![Token::Eof]);
        assert_eq!(tokenize("\n\n  \n").expect("tokenize"), vec![Token::Eof]);
        assert_eq!(tokenize("# only a comment\n").expect("tokenize"), vec![Token::Eof]);
    }

    #[test]
    fn indents_and_dedents_balance() {
        let input = indoc! {"
            class A:
              def f(self):
                if True:
                  return 1
                return 2
            a = A()
        "};
        let tokens = tokenize(input).expect("tokenize");
        let indents = tokens.iter().filter(|t| matches!(t, Token::Indent)).count();
        let dedents = tokens.iter().filter(|t| matches!(t, Token::Dedent)).count();
        assert_eq!(indents, 3);
        assert_eq!(indents, dedents);
        assert_eq!(tokens.last(), Some(&Token::Eof));
        assert!(matches!(
            tokens[tokens.len() - 2],
            Token::Newline | Token::Dedent
        ));
    }

    #[test]
    fn processes_string_escapes() {
        let tokens = tokenize(r#"s = 'a\tb\n' + "he said \"hi\" \\ \q""#).expect("tokenize");
        let expected = vec![
            Token::Id("s"),
            Token::Char('='),
            Token::String("a\tb\n".to_string()),
            Token::Char('+'),
            Token::String("he said \"hi\" \\ q".to_string()),
            Token::Newline,
            Token::Eof,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn errors_on_unterminated_string() {
        let err = tokenize("s = 'abc\n").expect_err("expected unterminated string");
        assert_eq!(err, LexError::UnterminatedString { position: 4 });
        let err = tokenize("s = 'abc").expect_err("expected unterminated string");
        assert_eq!(err, LexError::UnterminatedString { position: 4 });
    }

    #[test]
    fn errors_on_integer_overflow() {
        let err = tokenize("n = 99999999999999999999\n").expect_err("expected overflow");
        assert!(matches!(err, LexError::InvalidIntegerLiteral { .. }));
    }

    #[test]
    fn cursor_saturates_at_eof() {
        let mut stream = TokenStream::new("x\n").expect("lex");
        assert_eq!(stream.current_token(), &Token::Id("x"));
        assert_eq!(stream.current_token(), &Token::Id("x"));
        assert_eq!(stream.next_token(), &Token::Newline);
        assert_eq!(stream.next_token(), &Token::Eof);
        assert_eq!(stream.next_token(), &Token::Eof);
        assert_eq!(stream.current_token(), &Token::Eof);
    }
}
