//! Application manifest (`application.fam`) parsing.
//!
//! Manifests are Python call expressions, one `App(...)` per application:
//!
//! ```text
//! App(
//!     appid="snake_game",
//!     name="Snake Game",
//!     apptype=FlipperAppType.EXTERNAL,
//!     entry_point="snake_game_app",
//!     stack_size=1 * 1024,
//!     fap_category="Games",
//! )
//! ```
//!
//! Only the subset manifests use is understood: keyword arguments whose
//! values are strings (adjacent literals concatenate), integers with `+` and
//! `*`, dotted identifiers, lists and tuples. Nested calls such as
//! `Lib(...)` are skipped. Other top-level calls are ignored.

use std::path::{Path, PathBuf};

use crate::errors::{UfbtError, UfbtResult};

/// File name of application manifests.
pub const MANIFEST_FILE_NAME: &str = "application.fam";

/// Sources compiled when a manifest does not list any.
const DEFAULT_SOURCES: &str = "*.c*";

/// Kind of application declared by `apptype`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppType {
    /// Standalone application installed as a `.fap`.
    External,
    /// Plugin loaded by another application.
    Plugin,
    /// Any other kind; built into firmware, not by ufbt.
    Other(String),
}

impl AppType {
    fn from_identifier(identifier: &str) -> Self {
        match identifier.rsplit('.').next().unwrap_or(identifier) {
            "EXTERNAL" | "MENUEXTERNAL" => Self::External,
            "PLUGIN" => Self::Plugin,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One `App(...)` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    /// Unique application id.
    pub app_id: String,
    /// Display name.
    pub name: String,
    /// Application kind.
    pub app_type: AppType,
    /// Entry-point symbol.
    pub entry_point: Option<String>,
    /// Source globs, relative to the manifest directory.
    pub sources: Vec<String>,
    /// Menu category.
    pub category: Option<String>,
    /// Preprocessor defines.
    pub cdefines: Vec<String>,
    /// SDK libraries to link.
    pub fap_libs: Vec<String>,
    /// Directory containing the manifest.
    pub manifest_dir: PathBuf,
}

impl AppManifest {
    /// Returns `true` for kinds ufbt builds into a `.fap`.
    #[must_use]
    pub fn is_buildable(&self) -> bool {
        matches!(self.app_type, AppType::External | AppType::Plugin)
    }
}

/// Reads every `App(...)` declaration in `path`.
///
/// # Errors
///
/// Returns [`UfbtError::Configuration`] if the file cannot be parsed or a
/// declaration lacks `appid` or `apptype`, and [`UfbtError::Io`] if it
/// cannot be read.
pub fn load_manifest_file(path: &Path) -> UfbtResult<Vec<AppManifest>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| UfbtError::io(format!("failed to read {}", path.display()), e))?;
    let manifest_dir = path.parent().unwrap_or_else(|| Path::new("."));
    parse_manifests(&content, manifest_dir).map_err(|e| match e {
        ParseError { line, message } => {
            UfbtError::configuration(format!("{}:{line}: {message}", path.display()))
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
    Ident(String),
    List(Vec<Value>),
    Skipped,
}

impl Value {
    fn into_string(self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    fn into_string_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items.into_iter().filter_map(Self::into_string).collect(),
            Self::Str(s) => vec![s],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParseError {
    line: usize,
    message: String,
}

type ParseResult<T> = Result<T, ParseError>;

fn tokenize(source: &str) -> ParseResult<Vec<(Token, usize)>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while chars.peek().is_some_and(|&c| c != '\n') {
                    chars.next();
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == c => break,
                        Some('\\') => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(other) => value.push(other),
                            None => break,
                        },
                        Some('\n') | None => {
                            return Err(ParseError {
                                line,
                                message: "unterminated string".to_string(),
                            });
                        }
                        Some(ch) => value.push(ch),
                    }
                }
                tokens.push((Token::Str(value), line));
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Int(parse_int(&digits, line)?), line));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((Token::Ident(ident), line));
            }
            '(' | ')' | '[' | ']' | ',' | '=' | '+' | '*' | '-' => {
                tokens.push((Token::Punct(c), line));
                chars.next();
            }
            other => {
                return Err(ParseError {
                    line,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(tokens)
}

fn parse_int(digits: &str, line: usize) -> ParseResult<i64> {
    let cleaned = digits.replace('_', "");
    let parsed = if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else {
        cleaned.parse()
    };
    parsed.map_err(|_| ParseError {
        line,
        message: format!("invalid integer '{digits}'"),
    })
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |(_, line)| *line)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(ParseError {
            line: self.line(),
            message: message.into(),
        })
    }

    fn expect(&mut self, punct: char) -> ParseResult<()> {
        match self.next() {
            Some(Token::Punct(c)) if c == punct => Ok(()),
            _ => {
                self.pos -= 1;
                self.error(format!("expected '{punct}'"))
            }
        }
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parses keyword arguments up to and including the closing parenthesis.
    fn call_arguments(&mut self) -> ParseResult<Vec<(String, Value)>> {
        let mut args = Vec::new();
        while !self.eat(')') {
            let keyword = match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
                (Some((Token::Ident(name), _)), Some((Token::Punct('='), _))) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.pos += 2;
                let value = self.expression()?;
                args.push((name, value));
            } else {
                // Positional arguments only appear in nested calls we skip.
                self.expression()?;
            }
            if !self.eat(',') {
                self.expect(')')?;
                break;
            }
        }
        Ok(args)
    }

    fn expression(&mut self) -> ParseResult<Value> {
        let mut value = self.term()?;
        while self.eat('+') {
            let rhs = self.term()?;
            value = match (value, rhs) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.saturating_add(b)),
                (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
                (Value::List(mut a), Value::List(b)) => {
                    a.extend(b);
                    Value::List(a)
                }
                _ => Value::Skipped,
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> ParseResult<Value> {
        let mut value = self.atom()?;
        while self.eat('*') {
            let rhs = self.atom()?;
            value = match (value, rhs) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.saturating_mul(b)),
                _ => Value::Skipped,
            };
        }
        Ok(value)
    }

    fn atom(&mut self) -> ParseResult<Value> {
        match self.next() {
            Some(Token::Str(mut s)) => {
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Value::Str(s))
            }
            Some(Token::Int(i)) => Ok(Value::Int(i)),
            Some(Token::Punct('-')) => match self.atom()? {
                Value::Int(i) => Ok(Value::Int(-i)),
                _ => Ok(Value::Skipped),
            },
            Some(Token::Ident(name)) => {
                if self.eat('(') {
                    self.call_arguments()?;
                    Ok(Value::Skipped)
                } else {
                    Ok(Value::Ident(name))
                }
            }
            Some(Token::Punct(open @ ('[' | '('))) => {
                let close = if open == '[' { ']' } else { ')' };
                let mut items = Vec::new();
                while !self.eat(close) {
                    items.push(self.expression()?);
                    if !self.eat(',') {
                        self.expect(close)?;
                        break;
                    }
                }
                Ok(Value::List(items))
            }
            _ => {
                self.pos -= 1;
                self.error("expected a value")
            }
        }
    }
}

fn parse_manifests(source: &str, manifest_dir: &Path) -> ParseResult<Vec<AppManifest>> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };
    let mut apps = Vec::new();

    while parser.peek().is_some() {
        let line = parser.line();
        let Some(Token::Ident(callee)) = parser.next() else {
            parser.pos -= 1;
            return parser.error("expected a declaration such as App(...)");
        };
        parser.expect('(')?;
        let args = parser.call_arguments()?;
        if callee == "App" {
            apps.push(build_manifest(args, manifest_dir, line)?);
        }
    }

    Ok(apps)
}

fn build_manifest(args: Vec<(String, Value)>, manifest_dir: &Path, line: usize) -> ParseResult<AppManifest> {
    let mut app_id = None;
    let mut name = None;
    let mut app_type = None;
    let mut entry_point = None;
    let mut sources = None;
    let mut category = None;
    let mut cdefines = Vec::new();
    let mut fap_libs = Vec::new();

    for (key, value) in args {
        match key.as_str() {
            "appid" => app_id = value.into_string(),
            "name" => name = value.into_string(),
            "apptype" => {
                if let Value::Ident(identifier) = value {
                    app_type = Some(AppType::from_identifier(&identifier));
                }
            }
            "entry_point" => entry_point = value.into_string(),
            "sources" => sources = Some(value.into_string_list()),
            "fap_category" => category = value.into_string(),
            "cdefines" => cdefines = value.into_string_list(),
            "fap_libs" => fap_libs = value.into_string_list(),
            _ => {}
        }
    }

    let app_id = app_id.ok_or_else(|| ParseError {
        line,
        message: "App() is missing 'appid'".to_string(),
    })?;
    let app_type = app_type.ok_or_else(|| ParseError {
        line,
        message: format!("App '{app_id}' is missing 'apptype'"),
    })?;

    Ok(AppManifest {
        name: name.unwrap_or_else(|| app_id.clone()),
        app_id,
        app_type,
        entry_point,
        sources: sources.unwrap_or_else(|| vec![DEFAULT_SOURCES.to_string()]),
        category,
        cdefines,
        fap_libs,
        manifest_dir: manifest_dir.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    const SNAKE: &str = r#"
# Snake game
App(
    appid="snake_game",
    name="Snake " "Game",
    apptype=FlipperAppType.EXTERNAL,
    entry_point="snake_game_app",
    requires=["gui"],
    stack_size=1 * 1024,
    order=-30,
    fap_category="Games",
    fap_icon="snake_10px.png",
    sources=["*.c", "lib/*.c"],
    cdefines=("SNAKE_HD",),
    fap_libs=["assets"],
    fap_private_libs=[
        Lib(
            name="tiny",
            cflags=["-Wno-error"],
        ),
    ],
)
"#;

    fn parse(source: &str) -> ParseResult<Vec<AppManifest>> {
        parse_manifests(source, Path::new("/apps/snake"))
    }

    #[test]
    fn parses_full_declaration() {
        let apps = parse(SNAKE).unwrap();
        assert_eq!(apps.len(), 1);
        let app = &apps[0];
        assert_eq!(app.app_id, "snake_game");
        assert_eq!(app.name, "Snake Game");
        assert_eq!(app.app_type, AppType::External);
        assert_eq!(app.entry_point.as_deref(), Some("snake_game_app"));
        assert_eq!(app.sources, vec!["*.c", "lib/*.c"]);
        assert_eq!(app.category.as_deref(), Some("Games"));
        assert_eq!(app.cdefines, vec!["SNAKE_HD"]);
        assert_eq!(app.fap_libs, vec!["assets"]);
        assert_eq!(app.manifest_dir, PathBuf::from("/apps/snake"));
        assert!(app.is_buildable());
    }

    #[test]
    fn parses_multiple_declarations_and_classifies() {
        let apps = parse(
            r#"
App(appid="a", apptype=FlipperAppType.PLUGIN, entry_point="a_ep")
App(appid="b", apptype=FlipperAppType.SERVICE)
App(appid="c", apptype=FlipperAppType.MENUEXTERNAL, entry_point="c_ep")
"#,
        )
        .unwrap();

        let types: Vec<_> = apps.iter().map(|a| a.app_type.clone()).collect();
        assert_eq!(
            types,
            vec![
                AppType::Plugin,
                AppType::Other("SERVICE".to_string()),
                AppType::External
            ]
        );
        assert!(!apps[1].is_buildable());
    }

    #[test]
    fn defaults_sources_and_name() {
        let apps = parse(r#"App(appid="x", apptype=FlipperAppType.EXTERNAL)"#).unwrap();
        assert_eq!(apps[0].sources, vec![DEFAULT_SOURCES]);
        assert_eq!(apps[0].name, "x");
    }

    #[test]
    fn ignores_other_calls() {
        let apps = parse(r#"ExtFile(path="x.c") App(appid="y", apptype=FlipperAppType.EXTERNAL)"#).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].app_id, "y");
    }

    #[test]
    fn missing_appid_is_error() {
        let err = parse("App(apptype=FlipperAppType.EXTERNAL)").unwrap_err();
        assert!(err.message.contains("appid"));
    }

    #[test]
    fn missing_apptype_is_error_with_line() {
        let err = parse("\n\nApp(appid=\"z\")").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("apptype"));
    }

    #[test]
    fn unterminated_string_is_error() {
        let err = parse("App(appid=\"oops\n)").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn integer_arithmetic() {
        let mut parser = Parser {
            tokens: tokenize("2 * 1024 + 0x10").unwrap(),
            pos: 0,
        };
        assert_eq!(parser.expression().unwrap(), Value::Int(2064));
    }

    #[test]
    fn load_reports_path_in_configuration_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST_FILE_NAME);
        std::fs::write(&path, "App(appid=\"q\")").unwrap();

        let err = load_manifest_file(&path).unwrap_err();
        assert!(matches!(err, UfbtError::Configuration { .. }));
        assert!(err.to_string().contains(MANIFEST_FILE_NAME));
    }
}
