//! Path queries over parsed XML
//!
//! Evaluates the XPath 1.0 expressions used by metadata field definitions
//! against a `roxmltree` node:
//!
//! - absolute and relative location paths, `//`, `.`, `..`, `*`
//! - `@attr`, `text()`, `node()`, `comment()` and `axis::test` for the child,
//!   descendant, descendant-or-self, self, parent, ancestor, ancestor-or-self,
//!   following-sibling, preceding-sibling and attribute axes
//! - predicates on steps and on parenthesized expressions, positional `[n]`
//! - `=`, `!=`, `<`, `<=`, `>`, `>=`, `and`, `or`, `+`, `-` and unions with `|`
//! - the core string, number, boolean and node-set functions (`concat`,
//!   `normalize-space`, `substring-before`, `count`, `last`, ...)
//!
//! Prefixed names are resolved through the namespace map (lower-cased
//! encoding name → URI). Unprefixed names match on local name only.
//!
//! A query yields strings: the string value of every selected node, or a
//! single value for a scalar result. Empty strings, zero and `false` yield
//! nothing.

use roxmltree::Node;
use std::collections::HashMap;
use thiserror::Error;

/// Query parse or evaluation failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Syntax error in query: {0}")]
    Syntax(String),

    #[error("Unknown namespace prefix: {0}")]
    UnknownPrefix(String),

    #[error("Type error in query: {0}")]
    Type(String),
}

type QueryResult<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DotDot,
    At,
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    ColonColon,
    Name(String),
    Literal(String),
    Number(f64),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(input: &str) -> QueryResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let (token, width) = match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '.' if next == Some('.') => (Token::DotDot, 2),
            '.' if next.is_some_and(|after| after.is_ascii_digit()) => {
                let (number, width) = scan_number(&chars[i..], input)?;
                (Token::Number(number), width)
            }
            '.' => (Token::Dot, 1),
            '@' => (Token::At, 1),
            '*' => (Token::Star, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '|' => (Token::Pipe, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '=' => (Token::Eq, 1),
            '!' if next == Some('=') => (Token::NotEq, 2),
            '<' if next == Some('=') => (Token::LtEq, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::GtEq, 2),
            '>' => (Token::Gt, 1),
            ':' if next == Some(':') => (Token::ColonColon, 2),
            '"' | '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&candidate| candidate == c)
                    .ok_or_else(|| QueryError::Syntax(format!("unterminated literal in {}", input)))?;
                (Token::Literal(chars[i + 1..i + 1 + end].iter().collect()), end + 2)
            }
            c if c.is_ascii_digit() => {
                let (number, width) = scan_number(&chars[i..], input)?;
                (Token::Number(number), width)
            }
            c if is_name_start(c) => {
                let mut end = i + 1;
                while end < chars.len() {
                    let current = chars[end];
                    if is_name_char(current) {
                        end += 1;
                    } else if current == ':'
                        && chars
                            .get(end + 1)
                            .is_some_and(|&after| is_name_start(after) || after == '*')
                    {
                        // prefix separator, not an axis separator
                        end += 1;
                        if chars[end] == '*' {
                            end += 1;
                            break;
                        }
                    } else {
                        break;
                    }
                }
                (Token::Name(chars[i..end].iter().collect()), end - i)
            }
            other => {
                return Err(QueryError::Syntax(format!(
                    "unexpected character '{}' in {}",
                    other, input
                )))
            }
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

/// Digits with at most one decimal point
fn scan_number(chars: &[char], input: &str) -> QueryResult<(f64, usize)> {
    let width = chars
        .iter()
        .position(|c| !c.is_ascii_digit() && *c != '.')
        .unwrap_or(chars.len());
    let digits: String = chars[..width].iter().collect();
    let number = digits
        .parse()
        .map_err(|_| QueryError::Syntax(format!("invalid number {} in {}", digits, input)))?;
    Ok((number, width))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfNode,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "self" => Axis::SelfNode,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "attribute" => Axis::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    /// `None` parts are wildcards
    Name {
        prefix: Option<String>,
        local: Option<String>,
    },
    Text,
    Comment,
    ProcessingInstruction,
    AnyNode,
}

/// Names that open a node type test rather than a function call
fn is_node_type(name: &str) -> bool {
    matches!(name, "text" | "node" | "comment" | "processing-instruction")
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::AnyNode,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Function {
    Last,
    Position,
    Count,
    LocalName,
    Name,
    NamespaceUri,
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "last" => Function::Last,
            "position" => Function::Position,
            "count" => Function::Count,
            "local-name" => Function::LocalName,
            "name" => Function::Name,
            "namespace-uri" => Function::NamespaceUri,
            "string" => Function::String,
            "concat" => Function::Concat,
            "starts-with" => Function::StartsWith,
            "contains" => Function::Contains,
            "substring-before" => Function::SubstringBefore,
            "substring-after" => Function::SubstringAfter,
            "substring" => Function::Substring,
            "string-length" => Function::StringLength,
            "normalize-space" => Function::NormalizeSpace,
            "translate" => Function::Translate,
            "boolean" => Function::Boolean,
            "not" => Function::Not,
            "true" => Function::True,
            "false" => Function::False,
            "number" => Function::Number,
            "sum" => Function::Sum,
            "floor" => Function::Floor,
            "ceiling" => Function::Ceiling,
            "round" => Function::Round,
            _ => return None,
        })
    }

    /// Minimum and maximum argument count
    fn arity(self) -> (usize, Option<usize>) {
        match self {
            Function::Last | Function::Position | Function::True | Function::False => (0, Some(0)),
            Function::LocalName
            | Function::Name
            | Function::NamespaceUri
            | Function::String
            | Function::StringLength
            | Function::NormalizeSpace
            | Function::Number => (0, Some(1)),
            Function::Count
            | Function::Boolean
            | Function::Not
            | Function::Sum
            | Function::Floor
            | Function::Ceiling
            | Function::Round => (1, Some(1)),
            Function::StartsWith
            | Function::Contains
            | Function::SubstringBefore
            | Function::SubstringAfter => (2, Some(2)),
            Function::Substring => (2, Some(3)),
            Function::Translate => (3, Some(3)),
            Function::Concat => (2, None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// Same comparison with the operands swapped
    fn reversed(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
            other => other,
        }
    }

    fn holds_for_numbers(self, left: f64, right: f64) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::NotEq => left != right,
            CompareOp::Lt => left < right,
            CompareOp::LtEq => left <= right,
            CompareOp::Gt => left > right,
            CompareOp::GtEq => left >= right,
        }
    }

    fn holds_for_text(self, left: &str, right: &str) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::NotEq => left != right,
            _ => self.holds_for_numbers(parse_number(left), parse_number(right)),
        }
    }

    fn holds_for_bools(self, left: bool, right: bool) -> bool {
        match self {
            CompareOp::Eq => left == right,
            CompareOp::NotEq => left != right,
            _ => self.holds_for_numbers(f64::from(u8::from(left)), f64::from(u8::from(right))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Path(LocationPath),
    /// Parenthesized or function expression narrowed by predicates and
    /// optionally continued by a relative path
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        path: Option<LocationPath>,
    },
    Union(Vec<Expr>),
    Literal(String),
    Number(f64),
    Function(Function, Vec<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Subtract(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> QueryResult<()> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            other => Err(QueryError::Syntax(format!(
                "expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(name)) if name == keyword)
    }

    fn can_start_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Dot | Token::DotDot | Token::At | Token::Star | Token::Name(_))
        )
    }

    /// Whole query, nothing may follow
    fn parse_query(&mut self) -> QueryResult<Expr> {
        let expr = self.parse_expr()?;
        if let Some(token) = self.peek() {
            return Err(QueryError::Syntax(format!("unexpected token {:?}", token)));
        }
        Ok(expr)
    }

    fn parse_expr(&mut self) -> QueryResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.is_keyword("and") {
            self.advance();
            let right = self.parse_equality()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::LtEq) => CompareOp::LtEq,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::GtEq) => CompareOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    left = Expr::Add(Box::new(left), Box::new(self.parse_unary()?));
                }
                Some(Token::Minus) => {
                    self.advance();
                    left = Expr::Subtract(Box::new(left), Box::new(self.parse_unary()?));
                }
                _ => return Ok(left),
            }
        }
    }

    fn parse_unary(&mut self) -> QueryResult<Expr> {
        if self.peek() == Some(&Token::Minus) {
            self.advance();
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> QueryResult<Expr> {
        let first = self.parse_path_expr()?;
        if self.peek() != Some(&Token::Pipe) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.peek() == Some(&Token::Pipe) {
            self.advance();
            operands.push(self.parse_path_expr()?);
        }
        Ok(Expr::Union(operands))
    }

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_) | Token::Number(_) | Token::LParen) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !is_node_type(name)
            }
            _ => false,
        }
    }

    fn parse_path_expr(&mut self) -> QueryResult<Expr> {
        if !self.starts_filter_expr() {
            return Ok(Expr::Path(self.parse_path()?));
        }

        let primary = self.parse_primary()?;
        let predicates = self.parse_predicates()?;
        let path = match self.peek() {
            Some(Token::Slash | Token::DoubleSlash) => {
                let mut path = LocationPath {
                    absolute: false,
                    steps: Vec::new(),
                };
                self.parse_following_steps(&mut path)?;
                Some(path)
            }
            _ => None,
        };

        if predicates.is_empty() && path.is_none() {
            return Ok(primary);
        }
        Ok(Expr::Filter {
            primary: Box::new(primary),
            predicates,
            path,
        })
    }

    fn parse_primary(&mut self) -> QueryResult<Expr> {
        match self.advance() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Name(name)) => self.parse_function_call(&name),
            other => Err(QueryError::Syntax(format!("expected expression, found {:?}", other))),
        }
    }

    fn parse_function_call(&mut self, name: &str) -> QueryResult<Expr> {
        let function = Function::from_name(name)
            .ok_or_else(|| QueryError::Syntax(format!("unsupported function {}()", name)))?;
        self.expect(Token::LParen)?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_expr()?);
            while self.peek() == Some(&Token::Comma) {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect(Token::RParen)?;

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(QueryError::Syntax(format!(
                "wrong number of arguments for {}(): {}",
                name,
                args.len()
            )));
        }
        Ok(Expr::Function(function, args))
    }

    fn parse_predicates(&mut self) -> QueryResult<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.advance();
            predicates.push(self.parse_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn parse_path(&mut self) -> QueryResult<LocationPath> {
        let mut path = LocationPath {
            absolute: false,
            steps: Vec::new(),
        };

        match self.peek() {
            Some(Token::Slash) => {
                self.advance();
                path.absolute = true;
                if !self.can_start_step() {
                    return Ok(path);
                }
            }
            Some(Token::DoubleSlash) => {
                self.advance();
                path.absolute = true;
                path.steps.push(Step::descendant_or_self());
            }
            _ => {}
        }

        path.steps.push(self.parse_step()?);
        self.parse_following_steps(&mut path)?;
        Ok(path)
    }

    /// `/step` and `//step` continuations
    fn parse_following_steps(&mut self, path: &mut LocationPath) -> QueryResult<()> {
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.advance();
                    path.steps.push(self.parse_step()?);
                }
                Some(Token::DoubleSlash) => {
                    self.advance();
                    path.steps.push(Step::descendant_or_self());
                    path.steps.push(self.parse_step()?);
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_step(&mut self) -> QueryResult<Step> {
        let (axis, test) = match self.peek().cloned() {
            Some(Token::Dot) => {
                self.advance();
                (Axis::SelfNode, NodeTest::AnyNode)
            }
            Some(Token::DotDot) => {
                self.advance();
                (Axis::Parent, NodeTest::AnyNode)
            }
            Some(Token::At) => {
                self.advance();
                (Axis::Attribute, self.parse_node_test()?)
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::ColonColon) => {
                self.advance();
                self.advance();
                let axis = Axis::from_name(&name)
                    .ok_or_else(|| QueryError::Syntax(format!("unsupported axis {}", name)))?;
                (axis, self.parse_node_test()?)
            }
            _ => (Axis::Child, self.parse_node_test()?),
        };

        Ok(Step {
            axis,
            test,
            predicates: self.parse_predicates()?,
        })
    }

    fn parse_node_test(&mut self) -> QueryResult<NodeTest> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Name {
                prefix: None,
                local: None,
            }),
            Some(Token::Name(name)) if self.peek() == Some(&Token::LParen) => {
                self.advance();
                let test = match name.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::AnyNode,
                    "comment" => NodeTest::Comment,
                    "processing-instruction" => {
                        // the target literal is accepted but not checked
                        if matches!(self.peek(), Some(Token::Literal(_))) {
                            self.advance();
                        }
                        NodeTest::ProcessingInstruction
                    }
                    other => {
                        return Err(QueryError::Syntax(format!(
                            "function {}() is not a node test",
                            other
                        )))
                    }
                };
                self.expect(Token::RParen)?;
                Ok(test)
            }
            Some(Token::Name(name)) => {
                let (prefix, local) = match name.split_once(':') {
                    Some((prefix, local)) => (Some(prefix.to_string()), local),
                    None => (None, name.as_str()),
                };
                Ok(NodeTest::Name {
                    prefix,
                    local: (local != "*").then(|| local.to_string()),
                })
            }
            other => Err(QueryError::Syntax(format!("expected node test, found {:?}", other))),
        }
    }
}

/// Selected item: a node or an attribute of an element
#[derive(Debug, Clone, Copy)]
enum Item<'a, 'input: 'a> {
    Node(Node<'a, 'input>),
    Attribute {
        owner: Node<'a, 'input>,
        index: usize,
        value: &'a str,
    },
}

impl<'a, 'input> Item<'a, 'input> {
    fn string_value(&self) -> String {
        match self {
            Item::Attribute { value, .. } => value.to_string(),
            Item::Node(node) if node.is_element() || node.is_root() => node
                .descendants()
                .filter(|descendant| descendant.is_text())
                .filter_map(|descendant| descendant.text())
                .collect(),
            Item::Node(node) => node.text().unwrap_or_default().to_string(),
        }
    }

    /// Element the item belongs to
    fn node(&self) -> Node<'a, 'input> {
        match self {
            Item::Node(node) => *node,
            Item::Attribute { owner, .. } => *owner,
        }
    }

    /// Document order key; attributes follow their element
    fn key(&self) -> (usize, usize) {
        match self {
            Item::Node(node) => (node.id().get_usize(), 0),
            Item::Attribute { owner, index, .. } => (owner.id().get_usize(), index + 1),
        }
    }

    /// Result of `local-name()`, `name()` or `namespace-uri()`
    fn name_part(&self, function: Function) -> String {
        let (local, namespace) = match self {
            Item::Node(node) if node.is_element() => {
                let tag = node.tag_name();
                (tag.name(), tag.namespace())
            }
            Item::Attribute { owner, index, .. } => match owner.attributes().nth(*index) {
                Some(attribute) => (attribute.name(), attribute.namespace()),
                None => return String::new(),
            },
            _ => return String::new(),
        };

        match function {
            Function::LocalName => local.to_string(),
            Function::NamespaceUri => namespace.unwrap_or_default().to_string(),
            _ => match namespace.and_then(|uri| self.node().lookup_prefix(uri)) {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
                _ => local.to_string(),
            },
        }
    }
}

/// Sort into document order and drop duplicates
fn into_document_order<'a, 'input>(mut items: Vec<Item<'a, 'input>>) -> Vec<Item<'a, 'input>> {
    items.sort_by_key(Item::key);
    items.dedup_by_key(|item| item.key());
    items
}

/// Intermediate result of an expression
#[derive(Debug, Clone)]
enum Value<'a, 'input> {
    Nodes(Vec<Item<'a, 'input>>),
    Text(String),
    Number(f64),
    Boolean(bool),
}

impl<'a, 'input> Value<'a, 'input> {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Nodes(_) => "node-set",
            Value::Text(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
        }
    }

    fn into_nodes(self) -> QueryResult<Vec<Item<'a, 'input>>> {
        match self {
            Value::Nodes(items) => Ok(items),
            other => Err(QueryError::Type(format!(
                "expected a node-set, found a {}",
                other.type_name()
            ))),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Value::Nodes(items) => items.first().map(Item::string_value).unwrap_or_default(),
            Value::Text(text) => text.clone(),
            Value::Number(number) => format_number(*number),
            Value::Boolean(value) => value.to_string(),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Number(number) => *number,
            Value::Boolean(value) => f64::from(u8::from(*value)),
            other => parse_number(&other.to_text()),
        }
    }

    fn to_bool(&self) -> bool {
        match self {
            Value::Nodes(items) => !items.is_empty(),
            Value::Text(text) => !text.is_empty(),
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Boolean(value) => *value,
        }
    }
}

/// Number from its string form; anything but an optionally negative
/// decimal is NaN
fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number == f64::INFINITY {
        "Infinity".to_string()
    } else if number == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if number.fract() == 0.0 {
        format!("{:.0}", number)
    } else {
        number.to_string()
    }
}

/// XPath rounding: halves go up
fn round_half_up(number: f64) -> f64 {
    (number + 0.5).floor()
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nodes(left), Value::Nodes(right)) => {
            let right: Vec<String> = right.iter().map(Item::string_value).collect();
            left.iter().any(|item| {
                let value = item.string_value();
                right.iter().any(|other| op.holds_for_text(&value, other))
            })
        }
        (Value::Nodes(items), scalar) => compare_nodes(op, items, scalar),
        (scalar, Value::Nodes(items)) => compare_nodes(op.reversed(), items, scalar),
        (left, right) => compare_scalars(op, left, right),
    }
}

fn compare_nodes(op: CompareOp, items: &[Item], scalar: &Value) -> bool {
    match scalar {
        Value::Boolean(value) => op.holds_for_bools(!items.is_empty(), *value),
        Value::Number(number) => items
            .iter()
            .any(|item| op.holds_for_numbers(parse_number(&item.string_value()), *number)),
        _ => {
            let text = scalar.to_text();
            items
                .iter()
                .any(|item| op.holds_for_text(&item.string_value(), &text))
        }
    }
}

fn compare_scalars(op: CompareOp, left: &Value, right: &Value) -> bool {
    if !matches!(op, CompareOp::Eq | CompareOp::NotEq) {
        return op.holds_for_numbers(left.to_number(), right.to_number());
    }
    match (left, right) {
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
            op.holds_for_bools(left.to_bool(), right.to_bool())
        }
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            op.holds_for_numbers(left.to_number(), right.to_number())
        }
        _ => op.holds_for_text(&left.to_text(), &right.to_text()),
    }
}

/// Compiled path query
#[derive(Debug, Clone, PartialEq)]
pub struct PathQuery {
    expr: Expr,
}

impl PathQuery {
    pub fn parse(expression: &str) -> QueryResult<Self> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(QueryError::Syntax("empty query".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        Ok(Self {
            expr: parser.parse_query()?,
        })
    }

    /// String values of all selected items in document order, or the
    /// scalar result as a single value
    pub fn select_strings(
        &self,
        context: Node,
        namespaces: &HashMap<String, String>,
    ) -> QueryResult<Vec<String>> {
        let evaluator = Evaluator { namespaces };
        let focus = Focus {
            item: Item::Node(context),
            position: 1,
            size: 1,
        };
        Ok(match evaluator.eval(&self.expr, &focus)? {
            Value::Nodes(items) => items.iter().map(Item::string_value).collect(),
            Value::Text(text) if !text.is_empty() => vec![text],
            Value::Number(number) if number != 0.0 && !number.is_nan() => {
                vec![format_number(number)]
            }
            Value::Boolean(true) => vec!["1".to_string()],
            _ => Vec::new(),
        })
    }
}

/// Parse and evaluate in one go
pub fn select_strings(
    expression: &str,
    context: Node,
    namespaces: &HashMap<String, String>,
) -> QueryResult<Vec<String>> {
    PathQuery::parse(expression)?.select_strings(context, namespaces)
}

/// Context item with its position in the current node-set
struct Focus<'a, 'input> {
    item: Item<'a, 'input>,
    position: usize,
    size: usize,
}

struct Evaluator<'n> {
    namespaces: &'n HashMap<String, String>,
}

impl Evaluator<'_> {
    fn resolve_prefix(&self, prefix: &str) -> QueryResult<&str> {
        self.namespaces
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| QueryError::UnknownPrefix(prefix.to_string()))
    }

    fn name_matches(
        &self,
        test: &NodeTest,
        local_name: &str,
        namespace: Option<&str>,
    ) -> QueryResult<bool> {
        match test {
            NodeTest::Name { prefix, local } => {
                let namespace_matches = match prefix {
                    Some(prefix) => namespace == Some(self.resolve_prefix(prefix)?),
                    None => true,
                };
                Ok(namespace_matches && local.as_deref().map_or(true, |local| local == local_name))
            }
            NodeTest::AnyNode => Ok(true),
            NodeTest::Text | NodeTest::Comment | NodeTest::ProcessingInstruction => Ok(false),
        }
    }

    fn node_matches(&self, test: &NodeTest, node: Node) -> QueryResult<bool> {
        match test {
            NodeTest::Text => Ok(node.is_text()),
            NodeTest::Comment => Ok(node.is_comment()),
            NodeTest::ProcessingInstruction => Ok(node.is_pi()),
            NodeTest::AnyNode => Ok(true),
            NodeTest::Name { .. } => {
                if !node.is_element() {
                    return Ok(false);
                }
                let name = node.tag_name();
                self.name_matches(test, name.name(), name.namespace())
            }
        }
    }

    /// Candidates of one step in axis order
    fn select_axis<'a, 'input>(
        &self,
        step: &Step,
        item: Item<'a, 'input>,
    ) -> QueryResult<Vec<Item<'a, 'input>>> {
        let node = match item {
            Item::Node(node) => node,
            Item::Attribute { owner, .. } => return self.select_from_attribute(step, item, owner),
        };

        if step.axis == Axis::Attribute {
            let mut items = Vec::new();
            for (index, attribute) in node.attributes().enumerate() {
                if self.name_matches(&step.test, attribute.name(), attribute.namespace())? {
                    items.push(Item::Attribute {
                        owner: node,
                        index,
                        value: attribute.value(),
                    });
                }
            }
            return Ok(items);
        }

        let candidates: Vec<Node<'a, 'input>> = match step.axis {
            Axis::Child => node.children().collect(),
            Axis::Descendant => node.descendants().skip(1).collect(),
            Axis::DescendantOrSelf => node.descendants().collect(),
            Axis::SelfNode => vec![node],
            Axis::Parent => node.parent().into_iter().collect(),
            Axis::Ancestor => node.ancestors().skip(1).collect(),
            Axis::AncestorOrSelf => node.ancestors().collect(),
            Axis::FollowingSibling => node.next_siblings().skip(1).collect(),
            Axis::PrecedingSibling => node.prev_siblings().skip(1).collect(),
            Axis::Attribute => Vec::new(),
        };

        let mut items = Vec::new();
        for candidate in candidates {
            if self.node_matches(&step.test, candidate)? {
                items.push(Item::Node(candidate));
            }
        }
        Ok(items)
    }

    /// Attributes only have a self, a parent and ancestors
    fn select_from_attribute<'a, 'input>(
        &self,
        step: &Step,
        item: Item<'a, 'input>,
        owner: Node<'a, 'input>,
    ) -> QueryResult<Vec<Item<'a, 'input>>> {
        let keep_self = matches!(step.axis, Axis::SelfNode | Axis::AncestorOrSelf)
            && step.test == NodeTest::AnyNode;
        let ancestors: Vec<Node<'a, 'input>> = match step.axis {
            Axis::Parent => vec![owner],
            Axis::Ancestor | Axis::AncestorOrSelf => owner.ancestors().collect(),
            _ => Vec::new(),
        };

        let mut items = Vec::new();
        if keep_self {
            items.push(item);
        }
        for ancestor in ancestors {
            if self.node_matches(&step.test, ancestor)? {
                items.push(Item::Node(ancestor));
            }
        }
        Ok(items)
    }

    fn eval<'a, 'input>(
        &self,
        expr: &Expr,
        focus: &Focus<'a, 'input>,
    ) -> QueryResult<Value<'a, 'input>> {
        Ok(match expr {
            Expr::Path(path) => Value::Nodes(self.eval_path(path, focus.item)?),
            Expr::Filter {
                primary,
                predicates,
                path,
            } => {
                let mut items = into_document_order(self.eval(primary, focus)?.into_nodes()?);
                for predicate in predicates {
                    items = self.apply_predicate(items, predicate)?;
                }
                match path {
                    Some(path) => Value::Nodes(self.eval_steps(&path.steps, items)?),
                    None => Value::Nodes(items),
                }
            }
            Expr::Union(operands) => {
                let mut items = Vec::new();
                for operand in operands {
                    items.extend(self.eval(operand, focus)?.into_nodes()?);
                }
                Value::Nodes(into_document_order(items))
            }
            Expr::Literal(value) => Value::Text(value.clone()),
            Expr::Number(value) => Value::Number(*value),
            Expr::Function(function, args) => self.call(*function, args, focus)?,
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, focus)?;
                let right = self.eval(right, focus)?;
                Value::Boolean(compare(*op, &left, &right))
            }
            Expr::Add(left, right) => Value::Number(
                self.eval(left, focus)?.to_number() + self.eval(right, focus)?.to_number(),
            ),
            Expr::Subtract(left, right) => Value::Number(
                self.eval(left, focus)?.to_number() - self.eval(right, focus)?.to_number(),
            ),
            Expr::Negate(inner) => Value::Number(-self.eval(inner, focus)?.to_number()),
            Expr::And(left, right) => Value::Boolean(
                self.eval(left, focus)?.to_bool() && self.eval(right, focus)?.to_bool(),
            ),
            Expr::Or(left, right) => Value::Boolean(
                self.eval(left, focus)?.to_bool() || self.eval(right, focus)?.to_bool(),
            ),
        })
    }

    fn eval_path<'a, 'input>(
        &self,
        path: &LocationPath,
        context: Item<'a, 'input>,
    ) -> QueryResult<Vec<Item<'a, 'input>>> {
        let start = if path.absolute {
            Item::Node(context.node().document().root())
        } else {
            context
        };
        self.eval_steps(&path.steps, vec![start])
    }

    fn eval_steps<'a, 'input>(
        &self,
        steps: &[Step],
        mut current: Vec<Item<'a, 'input>>,
    ) -> QueryResult<Vec<Item<'a, 'input>>> {
        for step in steps {
            let mut next = Vec::new();
            for item in &current {
                let mut candidates = self.select_axis(step, *item)?;
                for predicate in &step.predicates {
                    candidates = self.apply_predicate(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            current = into_document_order(next);
        }
        Ok(current)
    }

    /// Keep candidates the predicate holds for; a number selects by position
    fn apply_predicate<'a, 'input>(
        &self,
        candidates: Vec<Item<'a, 'input>>,
        predicate: &Expr,
    ) -> QueryResult<Vec<Item<'a, 'input>>> {
        let size = candidates.len();
        let mut kept = Vec::new();
        for (index, item) in candidates.into_iter().enumerate() {
            let focus = Focus {
                item,
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &focus)? {
                Value::Number(number) => number == focus.position as f64,
                value => value.to_bool(),
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn call<'a, 'input>(
        &self,
        function: Function,
        args: &[Expr],
        focus: &Focus<'a, 'input>,
    ) -> QueryResult<Value<'a, 'input>> {
        let arg = |index: usize| -> QueryResult<Value<'a, 'input>> {
            let expr = args.get(index).ok_or_else(|| {
                QueryError::Syntax(format!("missing argument {} of {:?}", index + 1, function))
            })?;
            self.eval(expr, focus)
        };
        // string arguments default to the context item
        let text = |index: usize| -> QueryResult<String> {
            match args.get(index) {
                Some(expr) => Ok(self.eval(expr, focus)?.to_text()),
                None => Ok(focus.item.string_value()),
            }
        };

        Ok(match function {
            Function::Last => Value::Number(focus.size as f64),
            Function::Position => Value::Number(focus.position as f64),
            Function::Count => Value::Number(arg(0)?.into_nodes()?.len() as f64),
            Function::LocalName | Function::Name | Function::NamespaceUri => {
                let item = match args.first() {
                    Some(_) => into_document_order(arg(0)?.into_nodes()?).into_iter().next(),
                    None => Some(focus.item),
                };
                Value::Text(item.map(|item| item.name_part(function)).unwrap_or_default())
            }
            Function::String => Value::Text(text(0)?),
            Function::Concat => {
                let mut joined = String::new();
                for index in 0..args.len() {
                    joined.push_str(&text(index)?);
                }
                Value::Text(joined)
            }
            Function::StartsWith => Value::Boolean(text(0)?.starts_with(text(1)?.as_str())),
            Function::Contains => Value::Boolean(text(0)?.contains(text(1)?.as_str())),
            Function::SubstringBefore => {
                let (haystack, needle) = (text(0)?, text(1)?);
                Value::Text(
                    haystack
                        .find(needle.as_str())
                        .map(|at| haystack[..at].to_string())
                        .unwrap_or_default(),
                )
            }
            Function::SubstringAfter => {
                let (haystack, needle) = (text(0)?, text(1)?);
                Value::Text(
                    haystack
                        .find(needle.as_str())
                        .map(|at| haystack[at + needle.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            Function::Substring => {
                let value = text(0)?;
                let start = round_half_up(arg(1)?.to_number());
                let end = match args.get(2) {
                    Some(_) => start + round_half_up(arg(2)?.to_number()),
                    None => f64::INFINITY,
                };
                Value::Text(
                    value
                        .chars()
                        .enumerate()
                        .filter(|(index, _)| {
                            let position = (index + 1) as f64;
                            position >= start && position < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            Function::StringLength => Value::Number(text(0)?.chars().count() as f64),
            Function::NormalizeSpace => {
                Value::Text(text(0)?.split_whitespace().collect::<Vec<_>>().join(" "))
            }
            Function::Translate => {
                let (value, from, to) = (text(0)?, text(1)?, text(2)?);
                let from: Vec<char> = from.chars().collect();
                let to: Vec<char> = to.chars().collect();
                Value::Text(
                    value
                        .chars()
                        .filter_map(|c| match from.iter().position(|candidate| *candidate == c) {
                            Some(index) => to.get(index).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            Function::Boolean => Value::Boolean(arg(0)?.to_bool()),
            Function::Not => Value::Boolean(!arg(0)?.to_bool()),
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Number => Value::Number(match args.first() {
                Some(_) => arg(0)?.to_number(),
                None => parse_number(&focus.item.string_value()),
            }),
            Function::Sum => Value::Number(
                arg(0)?
                    .into_nodes()?
                    .iter()
                    .map(|item| parse_number(&item.string_value()))
                    .sum(),
            ),
            Function::Floor => Value::Number(arg(0)?.to_number().floor()),
            Function::Ceiling => Value::Number(arg(0)?.to_number().ceil()),
            Function::Round => Value::Number(round_half_up(arg(0)?.to_number())),
        })
    }
}
