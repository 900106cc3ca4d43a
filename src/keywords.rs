use crate::scanner::token::TokenType;

/// Promote an identifier to its keyword token, if it is one.
/// `error` is an alias for `throw`.
pub fn lookup(word: &str) -> Option<TokenType> {
    match word {
        "out" => Some(TokenType::Out),
        "in" => Some(TokenType::In),
        "when" => Some(TokenType::When),
        "other" => Some(TokenType::Other),
        "repeat" => Some(TokenType::Repeat),
        "to" => Some(TokenType::To),
        "while" => Some(TokenType::While),
        "use" => Some(TokenType::Use),
        "task" => Some(TokenType::Task),
        "give" => Some(TokenType::Give),
        "escape" => Some(TokenType::Escape),
        "skip" => Some(TokenType::Skip),
        "get" => Some(TokenType::Get),
        "and" => Some(TokenType::And),
        "or" => Some(TokenType::Or),
        "not" => Some(TokenType::Not),
        "true" => Some(TokenType::True),
        "false" => Some(TokenType::False),
        "nil" => Some(TokenType::Nil),
        "model" => Some(TokenType::Model),
        "init" => Some(TokenType::Init),
        "self" => Some(TokenType::SelfKw),
        "hidden" => Some(TokenType::Hidden),
        "shown" => Some(TokenType::Shown),
        "extends" => Some(TokenType::Extends),
        "struct" => Some(TokenType::Struct),
        "try" => Some(TokenType::Try),
        "catch" => Some(TokenType::Catch),
        "throw" => Some(TokenType::Throw),
        "error" => Some(TokenType::Throw),
        _ => None,
    }
}
