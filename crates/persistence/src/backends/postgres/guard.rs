//! Statement guard for scoped executors.
//!
//! A scoped operation must not be able to change the variables the gateway
//! set, or end the transaction they live in. Statements that would do either
//! are rejected before they reach the server. Savepoints stay inside the
//! transaction and are allowed.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BackendError, BackendResult};

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/|--[^\n]*").expect("comment pattern is valid"));

/// `set_config(`, bare or double-quoted, with or without a schema prefix.
static SET_CONFIG_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?:\b|")set_config"?\s*\("#).expect("set_config pattern is valid")
});

/// Unicode-escaped identifiers can spell any function name.
static UNICODE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bU&""#).expect("unicode identifier pattern is valid"));

/// Leading keywords that change session state, end the transaction or run
/// dynamic code.
const FORBIDDEN_LEADING: &[&str] = &[
    "SET", "RESET", "BEGIN", "COMMIT", "END", "DISCARD", "ABORT", "DO",
];

/// Checks that `sql` cannot escape the transaction scope.
pub(crate) fn check_statement(sql: &str) -> BackendResult<()> {
    let stripped = COMMENTS.replace_all(sql, " ");

    if SET_CONFIG_CALL.is_match(&stripped) {
        return Err(rejected("set_config() is reserved for the gateway"));
    }
    if UNICODE_IDENTIFIER.is_match(&stripped) {
        return Err(rejected("unicode-escaped identifiers are not allowed"));
    }

    for statement in stripped.split(';') {
        let words: Vec<String> = statement.split_whitespace().take(2).map(keyword).collect();

        let Some(first) = words.first() else {
            continue;
        };
        let second = words.get(1).map(String::as_str);

        if FORBIDDEN_LEADING.contains(&first.as_str()) {
            return Err(rejected(&format!("{} is not allowed in a scoped operation", first)));
        }

        match (first.as_str(), second) {
            ("ROLLBACK", Some("TO")) => {}
            ("ROLLBACK", _) => {
                return Err(rejected("ROLLBACK is not allowed in a scoped operation"));
            }
            ("START", Some("TRANSACTION")) => {
                return Err(rejected("START TRANSACTION is not allowed in a scoped operation"));
            }
            ("PREPARE", Some("TRANSACTION")) => {
                return Err(rejected("PREPARE TRANSACTION is not allowed in a scoped operation"));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Leading keyword of a word, ignoring attached punctuation such as `END$$`.
fn keyword(word: &str) -> String {
    word.chars()
        .take_while(|c| c.is_ascii_alphabetic() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase()
}

fn rejected(reason: &str) -> BackendError {
    BackendError::RejectedStatement {
        reason: reason.to_string(),
    }
}
