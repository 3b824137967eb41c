//! Template lexer.
//!
//! Splits template source into literal text, `${…}` / `$name`
//! placeholders, and `{% … %}` block tags. `{# … #}` comments are dropped
//! here.

/// A lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// Literal text.
    Text(String),
    /// The inside of a `${…}` or a bare `$name`.
    Placeholder(String),
    /// The trimmed inside of a `{% … %}`.
    BlockTag(String),
}

/// Characters allowed in bare `$name` placeholders.
fn is_placeholder_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(ch, '_' | '@' | ':' | '/' | '-' | '[' | ']' | '.')
}

/// Lexes template source. Returns an error message on unterminated
/// `${…}`, `{% … %}`, or `{# … #}`.
pub(crate) fn lex(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    let flush = |text: &mut String, tokens: &mut Vec<Token>| {
        if !text.is_empty() {
            tokens.push(Token::Text(std::mem::take(text)));
        }
    };

    while i < bytes.len() {
        let rest = &source[i..];

        if rest.starts_with("{#") {
            let Some(end) = rest.find("#}") else {
                return Err("unterminated {# comment".to_string());
            };
            flush(&mut text, &mut tokens);
            i += end + 2;
            continue;
        }

        if rest.starts_with("{%") {
            let Some(end) = rest.find("%}") else {
                return Err("unterminated {% block tag".to_string());
            };
            flush(&mut text, &mut tokens);
            tokens.push(Token::BlockTag(rest[2..end].trim().to_string()));
            i += end + 2;
            continue;
        }

        if rest.starts_with("${") {
            let Some(end) = rest.find('}') else {
                return Err("unterminated ${ placeholder".to_string());
            };
            flush(&mut text, &mut tokens);
            let inner = rest[2..end].trim();
            if inner.is_empty() {
                return Err("empty ${} placeholder".to_string());
            }
            tokens.push(Token::Placeholder(inner.to_string()));
            i += end + 1;
            continue;
        }

        if rest.starts_with('$') && rest.len() > 1 {
            let name: String = rest[1..].chars().take_while(|c| is_placeholder_char(*c)).collect();
            if !name.is_empty() {
                flush(&mut text, &mut tokens);
                tokens.push(Token::Placeholder(name.clone()));
                i += 1 + name.len();
                continue;
            }
        }

        let ch = rest.chars().next().expect("non-empty rest");
        text.push(ch);
        i += ch.len_utf8();
    }

    flush(&mut text, &mut tokens);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_single_token() {
        assert_eq!(
            lex("just text\n").unwrap(),
            vec![Token::Text("just text\n".into())]
        );
    }

    #[test]
    fn braced_placeholder() {
        assert_eq!(
            lex("# Title\n${src}\n").unwrap(),
            vec![
                Token::Text("# Title\n".into()),
                Token::Placeholder("src".into()),
                Token::Text("\n".into()),
            ]
        );
    }

    #[test]
    fn bare_placeholder_charset() {
        assert_eq!(
            lex("$src rest").unwrap(),
            vec![
                Token::Placeholder("src".into()),
                Token::Text(" rest".into()),
            ]
        );
        // Addressed identifiers keep @ : [ ] / . -
        assert_eq!(
            lex("$@apps/web:some-name.x").unwrap(),
            vec![Token::Placeholder("@apps/web:some-name.x".into())]
        );
    }

    #[test]
    fn lone_dollar_is_text() {
        assert_eq!(lex("cost: $ 5").unwrap(), vec![Token::Text("cost: $ 5".into())]);
    }

    #[test]
    fn block_tags_trimmed() {
        assert_eq!(
            lex("{% if tag:x %}body{% endif %}").unwrap(),
            vec![
                Token::BlockTag("if tag:x".into()),
                Token::Text("body".into()),
                Token::BlockTag("endif".into()),
            ]
        );
    }

    #[test]
    fn comments_dropped() {
        assert_eq!(
            lex("a{# hidden #}b").unwrap(),
            vec![Token::Text("a".into()), Token::Text("b".into())]
        );
    }

    #[test]
    fn unterminated_forms_error() {
        assert!(lex("${oops").is_err());
        assert!(lex("{% if").is_err());
        assert!(lex("{# never closed").is_err());
    }

    #[test]
    fn include_placeholders() {
        assert_eq!(
            lex("${tpl:inner} ${md@..:docs/x#intro,notitle}").unwrap(),
            vec![
                Token::Placeholder("tpl:inner".into()),
                Token::Text(" ".into()),
                Token::Placeholder("md@..:docs/x#intro,notitle".into()),
            ]
        );
    }
}
