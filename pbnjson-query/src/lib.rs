//! jsonselect-style query language over `pbnjson_core::Value` trees.
//!
//! Grounded on the source's `selectors/jquery_selectors.c` filter functions
//! (`selector_all`, `selector_root`, `selector_type`, `selector_key`, the
//! positional and expression pseudo-classes) and `selectors/expression.c`
//! for `:expr(...)`, re-expressed as a small recursive-descent parser plus a
//! tree walk instead of the source's filter-function-pointer chain.

use std::sync::Arc;

use pbnjson_core::Value;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("query syntax error: {0}")]
    Syntax(String),
    #[error("invalid argument: {0}")]
    InvalidArgs(String),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeSelector {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl TypeSelector {
    fn matches(self, v: &Value) -> bool {
        match self {
            TypeSelector::Object => v.is_object(),
            TypeSelector::Array => v.is_array(),
            TypeSelector::String => v.is_string(),
            TypeSelector::Number => v.is_number(),
            TypeSelector::Boolean => v.is_bool(),
            TypeSelector::Null => v.is_null(),
        }
    }
}

#[derive(Debug, Clone)]
enum Pseudo {
    Root,
    Empty,
    OnlyChild,
    FirstChild,
    LastChild,
    NthChild(i64),
    Contains(String),
    Val(Value),
    Has(Box<SelectorChain>),
    Expr(Expr),
}

/// One compound selector: `type? .key? :pseudo*`.
#[derive(Debug, Clone, Default)]
struct Compound {
    type_selector: Option<TypeSelector>,
    key: Option<String>,
    pseudo: Vec<Pseudo>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.type_selector.is_none() && self.key.is_none() && self.pseudo.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Sibling,
}

/// A sequence of compound selectors joined by combinators, read left to
/// right the way the source's selector chain is walked: `a > b c ~ d`.
#[derive(Debug, Clone)]
struct SelectorChain {
    steps: Vec<(Combinator, Compound)>,
}

/// A compiled query: a comma-separated union of selector chains.
#[derive(Debug, Clone)]
pub struct Query {
    chains: Vec<SelectorChain>,
}

/// One step of evaluation context: the value, its key (if inside an
/// object), its 1-based position among siblings, and the shared list of
/// sibling (key, value) pairs the `~` combinator walks from. Owns its
/// `Value` — cloning one is an `Arc` refcount bump, not a deep copy, so the
/// walk can hand out owned nodes freely instead of borrowing from a tree it
/// would otherwise need to keep alive behind a lifetime. `siblings` is
/// shared (via `Arc`) across every node produced by the same `children_of`
/// call, so `following_siblings_of` can slice it without re-deriving the
/// parent.
#[derive(Clone)]
struct Node {
    value: Value,
    key: Option<String>,
    index: usize,
    siblings: Arc<Vec<(Option<String>, Value)>>,
    is_root: bool,
}

impl Node {
    fn sibling_count(&self) -> usize {
        self.siblings.len()
    }
}

pub fn compile(expr: &str) -> Result<Query> {
    let mut parser = Parser::new(expr);
    let query = parser.parse_query()?;
    parser.expect_end()?;
    Ok(query)
}

impl Query {
    /// Runs the query over `root`, returning every matching value in
    /// document order, de-duplicated across the chains of a union.
    pub fn select(&self, root: &Value) -> Vec<Value> {
        let mut out = Vec::new();
        let top = Node {
            value: root.clone(),
            key: None,
            index: 1,
            siblings: Arc::new(vec![(None, root.clone())]),
            is_root: true,
        };
        for chain in &self.chains {
            walk(chain, 0, &top, &mut out);
        }
        out
    }
}

/// A stateful query handle mirroring the source's `query_create` /
/// `query_init` / `query_next` lifecycle.
pub struct QuerySession {
    query: Query,
    results: std::vec::IntoIter<Value>,
}

impl QuerySession {
    pub fn create(expr: &str) -> Result<QuerySession> {
        Ok(QuerySession {
            query: compile(expr)?,
            results: Vec::new().into_iter(),
        })
    }

    pub fn init(&mut self, value: &Value) {
        self.results = self.query.select(value).into_iter();
    }

    pub fn next(&mut self) -> Option<Value> {
        self.results.next()
    }
}

fn walk(chain: &SelectorChain, step_index: usize, node: &Node, out: &mut Vec<Value>) {
    let Some((combinator, compound)) = chain.steps.get(step_index) else {
        return;
    };

    match combinator {
        Combinator::Child | Combinator::Descendant => {
            for child in children_of(node) {
                if compound_matches(compound, &child) {
                    advance(chain, step_index, &child, out);
                }
                if *combinator == Combinator::Descendant {
                    walk_descendants(chain, step_index, &child, out);
                }
            }
        }
        Combinator::Sibling => {
            for sibling in following_siblings_of(node) {
                if compound_matches(compound, &sibling) {
                    advance(chain, step_index, &sibling, out);
                }
            }
        }
    }
}

/// Once the current step's compound has matched, either emit the value (if
/// this was the chain's last step) or continue walking from the next step.
fn advance(chain: &SelectorChain, step_index: usize, node: &Node, out: &mut Vec<Value>) {
    if step_index + 1 == chain.steps.len() {
        out.push(node.value.clone());
    } else {
        walk(chain, step_index + 1, node, out);
    }
}

/// For a descendant combinator, every descendant (not just direct children)
/// is a candidate match for the current compound.
fn walk_descendants(chain: &SelectorChain, step_index: usize, node: &Node, out: &mut Vec<Value>) {
    let Some((_, compound)) = chain.steps.get(step_index) else {
        return;
    };
    for child in children_of(node) {
        if compound_matches(compound, &child) {
            if step_index + 1 == chain.steps.len() {
                out.push(child.value.clone());
            } else {
                walk(chain, step_index + 1, &child, out);
            }
        }
        walk_descendants(chain, step_index, &child, out);
    }
}

fn children_of(node: &Node) -> Vec<Node> {
    if node.value.is_array() {
        let items = node.value.items();
        let siblings: Arc<Vec<(Option<String>, Value)>> =
            Arc::new(items.iter().map(|v| (None, v.clone())).collect());
        items
            .into_iter()
            .enumerate()
            .map(|(i, v)| Node {
                value: v,
                key: None,
                index: i + 1,
                siblings: siblings.clone(),
                is_root: false,
            })
            .collect()
    } else if node.value.is_object() {
        let entries = node.value.entries();
        let siblings: Arc<Vec<(Option<String>, Value)>> = Arc::new(
            entries
                .iter()
                .map(|(k, v)| (Some(k.to_string()), v.clone()))
                .collect(),
        );
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (k, v))| Node {
                value: v,
                key: Some(k.to_string()),
                index: i + 1,
                siblings: siblings.clone(),
                is_root: false,
            })
            .collect()
    } else {
        Vec::new()
    }
}

/// Nodes sharing `node`'s sibling list that come after it in document order,
/// matching the `~` general-sibling combinator.
fn following_siblings_of(node: &Node) -> Vec<Node> {
    node.siblings
        .iter()
        .enumerate()
        .skip(node.index)
        .map(|(i, (key, value))| Node {
            value: value.clone(),
            key: key.clone(),
            index: i + 1,
            siblings: node.siblings.clone(),
            is_root: false,
        })
        .collect()
}

fn compound_matches(compound: &Compound, node: &Node) -> bool {
    if let Some(t) = compound.type_selector {
        if !t.matches(&node.value) {
            return false;
        }
    }
    if let Some(key) = &compound.key {
        if node.key.as_deref() != Some(key.as_str()) {
            return false;
        }
    }
    compound.pseudo.iter().all(|p| pseudo_matches(p, node))
}

fn pseudo_matches(pseudo: &Pseudo, node: &Node) -> bool {
    match pseudo {
        Pseudo::Root => node.is_root,
        Pseudo::Empty => node.value.size() == 0,
        Pseudo::OnlyChild => node.sibling_count() == 1,
        Pseudo::FirstChild => node.index == 1,
        Pseudo::LastChild => node.index == node.sibling_count(),
        Pseudo::NthChild(n) => {
            let target = if *n < 0 {
                node.sibling_count() as i64 + n + 1
            } else {
                *n
            };
            target == node.index as i64
        }
        Pseudo::Contains(needle) => node.value.as_str().map(|s| s.contains(needle.as_str())).unwrap_or(false),
        Pseudo::Val(expected) => node.value.equal(expected),
        Pseudo::Has(inner) => {
            let mut matches = Vec::new();
            walk_descendants_from_self(inner, node, &mut matches);
            !matches.is_empty()
        }
        Pseudo::Expr(expr) => expr.eval(&node.value).unwrap_or(false),
    }
}

fn walk_descendants_from_self(chain: &SelectorChain, node: &Node, out: &mut Vec<Value>) {
    for child in children_of(node) {
        walk(chain, 0, &child, out);
        if !out.is_empty() {
            return;
        }
    }
}

// ---------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    _source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Parser<'a> {
        Parser {
            chars: source.chars().collect(),
            pos: 0,
            _source: source,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_ws();
        if self.pos != self.chars.len() {
            return Err(Error::Syntax(format!(
                "unexpected trailing input at position {}",
                self.pos
            )));
        }
        Ok(())
    }

    fn parse_query(&mut self) -> Result<Query> {
        let mut chains = vec![self.parse_chain()?];
        loop {
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
                self.skip_ws();
                chains.push(self.parse_chain()?);
            } else {
                break;
            }
        }
        Ok(Query { chains })
    }

    fn parse_chain(&mut self) -> Result<SelectorChain> {
        let mut steps = Vec::new();
        let first = self.parse_compound()?;
        steps.push((Combinator::Descendant, first));
        loop {
            let saved = self.pos;
            self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Some(Combinator::Child)
                }
                Some('~') => {
                    self.bump();
                    self.skip_ws();
                    Some(Combinator::Sibling)
                }
                Some(',') | None => None,
                Some(_) if self.pos != saved => Some(Combinator::Descendant),
                Some(_) => None,
            };
            match combinator {
                Some(c) => {
                    let compound = self.parse_compound()?;
                    if compound.is_empty() {
                        self.pos = saved;
                        break;
                    }
                    steps.push((c, compound));
                }
                None => {
                    self.pos = saved;
                    break;
                }
            }
        }
        Ok(SelectorChain { steps })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if c.is_alphabetic() => {
                let word = self.parse_ident();
                compound.type_selector = Some(match word.as_str() {
                    "object" => TypeSelector::Object,
                    "array" => TypeSelector::Array,
                    "string" => TypeSelector::String,
                    "number" => TypeSelector::Number,
                    "boolean" => TypeSelector::Boolean,
                    "null" => TypeSelector::Null,
                    other => {
                        return Err(Error::Syntax(format!("unknown type selector '{other}'")));
                    }
                });
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    compound.key = Some(self.parse_key()?);
                }
                Some(':') => {
                    self.bump();
                    compound.pseudo.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        Ok(compound)
    }

    fn parse_ident(&mut self) -> String {
        let mut s = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '-') {
            s.push(self.bump().unwrap());
        }
        s
    }

    fn parse_key(&mut self) -> Result<String> {
        if self.peek() == Some('"') {
            self.bump();
            let mut s = String::new();
            loop {
                match self.bump() {
                    Some('"') => break,
                    Some('\\') => {
                        if let Some(c) = self.bump() {
                            s.push(c);
                        }
                    }
                    Some(c) => s.push(c),
                    None => return Err(Error::Syntax("unterminated quoted key".into())),
                }
            }
            Ok(s)
        } else {
            let ident = self.parse_ident();
            if ident.is_empty() {
                return Err(Error::Syntax("expected a key after '.'".into()));
            }
            Ok(ident)
        }
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo> {
        let name = self.parse_ident();
        match name.as_str() {
            "root" => Ok(Pseudo::Root),
            "empty" => Ok(Pseudo::Empty),
            "only-child" => Ok(Pseudo::OnlyChild),
            "first-child" => Ok(Pseudo::FirstChild),
            "last-child" => Ok(Pseudo::LastChild),
            "nth-child" => {
                self.expect('(')?;
                self.skip_ws();
                let n = self.parse_signed_int()?;
                if n == 0 {
                    return Err(Error::InvalidArgs(
                        "nth-child argument must not be zero".into(),
                    ));
                }
                self.skip_ws();
                self.expect(')')?;
                Ok(Pseudo::NthChild(n))
            }
            "contains" => {
                self.expect('(')?;
                self.skip_ws();
                let s = self.parse_string_literal()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Pseudo::Contains(s))
            }
            "val" => {
                self.expect('(')?;
                self.skip_ws();
                let v = self.parse_value_literal()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Pseudo::Val(v))
            }
            "has" => {
                self.expect('(')?;
                self.skip_ws();
                let chain = self.parse_chain()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Pseudo::Has(Box::new(chain)))
            }
            "expr" => {
                self.expect('(')?;
                self.skip_ws();
                let expr = self.parse_expr()?;
                self.skip_ws();
                self.expect(')')?;
                Ok(Pseudo::Expr(expr))
            }
            other => Err(Error::Syntax(format!("unknown pseudo-class '{other}'"))),
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.bump() == Some(c) {
            Ok(())
        } else {
            Err(Error::Syntax(format!("expected '{c}' at position {}", self.pos)))
        }
    }

    fn parse_signed_int(&mut self) -> Result<i64> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push(self.bump().unwrap());
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            s.push(self.bump().unwrap());
        }
        s.parse::<i64>()
            .map_err(|_| Error::Syntax("expected an integer".into()))
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        if self.peek() != Some('"') {
            return Err(Error::Syntax("expected a quoted string".into()));
        }
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    if let Some(c) = self.bump() {
                        s.push(c);
                    }
                }
                Some(c) => s.push(c),
                None => return Err(Error::Syntax("unterminated string literal".into())),
            }
        }
        Ok(s)
    }

    fn parse_value_literal(&mut self) -> Result<Value> {
        match self.peek() {
            Some('"') => Ok(Value::string_copied(&self.parse_string_literal()?)),
            Some(c) if c.is_ascii_digit() || c == '-' => {
                let n = self.parse_number_literal()?;
                Ok(n)
            }
            _ => {
                let word = self.parse_ident();
                match word.as_str() {
                    "true" => Ok(Value::boolean(true)),
                    "false" => Ok(Value::boolean(false)),
                    "null" => Ok(Value::null()),
                    other => Err(Error::Syntax(format!("invalid value literal '{other}'"))),
                }
            }
        }
    }

    fn parse_number_literal(&mut self) -> Result<Value> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push(self.bump().unwrap());
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            s.push(self.bump().unwrap());
        }
        if s.is_empty() || s == "-" {
            return Err(Error::Syntax("expected a number literal".into()));
        }
        Ok(Value::from_raw_number(Arc::<[u8]>::from(s.into_bytes())))
    }

    // -------------------------------------------------------------
    // :expr(...) — a small boolean-expression language over `x`, the
    // currently matched value: comparisons, `&&`, `||`, `!`, parens.
    // -------------------------------------------------------------

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.chars[self.pos..].starts_with(&['|', '|']) {
                self.pos += 2;
                self.skip_ws();
                let right = self.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_ws();
            if self.chars[self.pos..].starts_with(&['&', '&']) {
                self.pos += 2;
                self.skip_ws();
                let right = self.parse_unary()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.peek() == Some('!') {
            self.bump();
            self.skip_ws();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        self.skip_ws();
        if self.peek() == Some('(') {
            self.bump();
            self.skip_ws();
            let inner = self.parse_or()?;
            self.skip_ws();
            self.expect(')')?;
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        self.skip_ws();
        let op = self.parse_comparison_op();
        match op {
            Some(op) => {
                self.skip_ws();
                let right = self.parse_operand()?;
                Ok(Expr::Compare(left, op, right))
            }
            None => Ok(Expr::Truthy(left)),
        }
    }

    fn parse_comparison_op(&mut self) -> Option<CompareOp> {
        let rest: String = self.chars[self.pos..].iter().collect();
        for (token, op) in [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            (">=", CompareOp::Ge),
            ("<=", CompareOp::Le),
            (">", CompareOp::Gt),
            ("<", CompareOp::Lt),
        ] {
            if rest.starts_with(token) {
                self.pos += token.chars().count();
                return Some(op);
            }
        }
        None
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        self.skip_ws();
        if self.peek() == Some('x') && !matches!(self.chars.get(self.pos + 1), Some(c) if c.is_alphanumeric()) {
            self.bump();
            return Ok(Operand::CurrentValue);
        }
        Ok(Operand::Literal(self.parse_value_literal()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone)]
enum Operand {
    CurrentValue,
    Literal(Value),
}

impl Operand {
    fn resolve(&self, current: &Value) -> Value {
        match self {
            Operand::CurrentValue => current.clone(),
            Operand::Literal(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone)]
enum Expr {
    Truthy(Operand),
    Compare(Operand, CompareOp, Operand),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    fn eval(&self, current: &Value) -> Option<bool> {
        match self {
            Expr::Truthy(operand) => Some(is_truthy(&operand.resolve(current))),
            Expr::Compare(left, op, right) => {
                let l = left.resolve(current);
                let r = right.resolve(current);
                let ordering = l.compare(&r);
                Some(match op {
                    CompareOp::Eq => l.equal(&r),
                    CompareOp::Ne => !l.equal(&r),
                    CompareOp::Gt => ordering == std::cmp::Ordering::Greater,
                    CompareOp::Ge => ordering != std::cmp::Ordering::Less,
                    CompareOp::Lt => ordering == std::cmp::Ordering::Less,
                    CompareOp::Le => ordering != std::cmp::Ordering::Greater,
                })
            }
            Expr::And(a, b) => Some(a.eval(current)? && b.eval(current)?),
            Expr::Or(a, b) => Some(a.eval(current)? || b.eval(current)?),
            Expr::Not(a) => Some(!a.eval(current)?),
        }
    }
}

fn is_truthy(v: &Value) -> bool {
    if v.is_null() || v.is_invalid() {
        return false;
    }
    if v.is_bool() {
        return v.as_bool().0;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pbnjson_core::parse;

    #[test]
    fn s6_array_string_query_selects_the_matching_string() {
        let document = parse(
            br#"{"enum":3,"ebool":true,"earray":[6,"brdm"]}"#,
            None,
        )
        .unwrap();
        let query = compile("array string").unwrap();
        let results = query.select(&document);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_str(), Some("brdm"));
    }

    #[test]
    fn key_selector_finds_nested_value() {
        let document = parse(br#"{"a":{"b":42}}"#, None).unwrap();
        let query = compile(".a .b").unwrap();
        let results = query.select(&document);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_i64().0, 42);
    }

    #[test]
    fn nth_child_selects_one_based_position() {
        let document = parse(b"[10,20,30]", None).unwrap();
        let query = compile("number:nth-child(2)").unwrap();
        let results = query.select(&document);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_i64().0, 20);
    }

    #[test]
    fn nth_child_zero_is_a_compile_error() {
        assert!(compile("number:nth-child(0)").is_err());
    }

    #[test]
    fn union_query_collects_matches_from_every_branch() {
        let document = parse(br#"{"a":1,"b":"x"}"#, None).unwrap();
        let query = compile("number, string").unwrap();
        assert_eq!(query.select(&document).len(), 2);
    }

    #[test]
    fn expr_pseudo_class_filters_by_comparison() {
        let document = parse(b"[1,5,10]", None).unwrap();
        let query = compile("number:expr(x > 4)").unwrap();
        let results = query.select(&document);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn sibling_combinator_matches_following_siblings_only() {
        let document = parse(b"[1,2,3,4]", None).unwrap();
        let query = compile("number:nth-child(2) ~ number").unwrap();
        let results = query.select(&document);
        let values: Vec<i64> = results.iter().map(|v| v.as_i64().0).collect();
        assert_eq!(values, vec![3, 4]);
    }
}
