//! Activation expressions for the CPU backend.
//!
//! The GPU path hands the activation text straight to the WGSL compiler. The
//! CPU backend needs to evaluate the same text, so this module parses the
//! subset of WGSL expression syntax that activations use: float literals, the
//! variable `x`, arithmetic, comparisons, logical operators and the
//! common scalar builtins (`abs`, `pow`, `exp`, `clamp`, `select`, ...).
//!
//! ```ignore
//! let expr = Expr::parse("-1.0 / pow(2.0, 0.6 * pow(x, 2.0)) + 1.0")?;
//! let y = expr.eval(0.5);
//! ```

use std::fmt;

/// Parse failure with the byte offset where it happened.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at offset {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ParseError {}

#[derive(Clone, Copy, Debug, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum UnOp {
    Neg,
    Not,
}

/// Scalar builtins accepted in activations.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Func {
    Abs,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Atan,
    Exp,
    Exp2,
    Log,
    Log2,
    Sqrt,
    InverseSqrt,
    Floor,
    Ceil,
    Round,
    Trunc,
    Fract,
    Sign,
    Pow,
    Min,
    Max,
    Step,
    Atan2,
    Clamp,
    Mix,
    Smoothstep,
    Select,
    Cast,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        let f = match name {
            "abs" => (Func::Abs, 1),
            "sin" => (Func::Sin, 1),
            "cos" => (Func::Cos, 1),
            "tan" => (Func::Tan, 1),
            "sinh" => (Func::Sinh, 1),
            "cosh" => (Func::Cosh, 1),
            "tanh" => (Func::Tanh, 1),
            "atan" => (Func::Atan, 1),
            "exp" => (Func::Exp, 1),
            "exp2" => (Func::Exp2, 1),
            "log" => (Func::Log, 1),
            "log2" => (Func::Log2, 1),
            "sqrt" => (Func::Sqrt, 1),
            "inverseSqrt" => (Func::InverseSqrt, 1),
            "floor" => (Func::Floor, 1),
            "ceil" => (Func::Ceil, 1),
            "round" => (Func::Round, 1),
            "trunc" => (Func::Trunc, 1),
            "fract" => (Func::Fract, 1),
            "sign" => (Func::Sign, 1),
            "f32" => (Func::Cast, 1),
            "pow" => (Func::Pow, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            "step" => (Func::Step, 2),
            "atan2" => (Func::Atan2, 2),
            "clamp" => (Func::Clamp, 3),
            "mix" => (Func::Mix, 3),
            "smoothstep" => (Func::Smoothstep, 3),
            "select" => (Func::Select, 3),
            _ => return None,
        };
        Some(f)
    }

    fn call(&self, a: &[f32]) -> f32 {
        match self {
            Func::Abs => a[0].abs(),
            Func::Sin => a[0].sin(),
            Func::Cos => a[0].cos(),
            Func::Tan => a[0].tan(),
            Func::Sinh => a[0].sinh(),
            Func::Cosh => a[0].cosh(),
            Func::Tanh => a[0].tanh(),
            Func::Atan => a[0].atan(),
            Func::Exp => a[0].exp(),
            Func::Exp2 => a[0].exp2(),
            Func::Log => a[0].ln(),
            Func::Log2 => a[0].log2(),
            Func::Sqrt => a[0].sqrt(),
            Func::InverseSqrt => 1.0 / a[0].sqrt(),
            Func::Floor => a[0].floor(),
            Func::Ceil => a[0].ceil(),
            // WGSL rounds half to even.
            Func::Round => {
                let r = a[0].round();
                if (a[0] - a[0].trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
                    r - a[0].signum()
                } else {
                    r
                }
            }
            Func::Trunc => a[0].trunc(),
            Func::Fract => a[0] - a[0].floor(),
            Func::Sign => {
                if a[0] > 0.0 {
                    1.0
                } else if a[0] < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            Func::Cast => a[0],
            Func::Pow => a[0].powf(a[1]),
            Func::Min => a[0].min(a[1]),
            Func::Max => a[0].max(a[1]),
            Func::Step => {
                if a[1] >= a[0] {
                    1.0
                } else {
                    0.0
                }
            }
            Func::Atan2 => a[0].atan2(a[1]),
            Func::Clamp => a[0].max(a[1]).min(a[2]),
            Func::Mix => a[0] + (a[1] - a[0]) * a[2],
            Func::Smoothstep => {
                let t = ((a[2] - a[0]) / (a[1] - a[0])).clamp(0.0, 1.0);
                t * t * (3.0 - 2.0 * t)
            }
            // select(f, t, cond)
            Func::Select => {
                if a[2] != 0.0 {
                    a[1]
                } else {
                    a[0]
                }
            }
        }
    }
}

/// Parsed activation expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr(Node);

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Num(f32),
    X,
    Unary(UnOp, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

fn truth(v: f32) -> f32 {
    if v != 0.0 {
        1.0
    } else {
        0.0
    }
}

impl Expr {
    /// Parse expression text.
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0, end: source.len() };
        let node = parser.or()?;
        match parser.peek() {
            None => Ok(Expr(node)),
            Some((offset, tok)) => Err(ParseError {
                offset,
                message: format!("unexpected {}", tok),
            }),
        }
    }

    /// Evaluate at `x`. Booleans are represented as 1.0 and 0.0.
    pub fn eval(&self, x: f32) -> f32 {
        self.0.eval(x)
    }
}

impl Node {
    fn eval(&self, x: f32) -> f32 {
        match self {
            Node::Num(v) => *v,
            Node::X => x,
            Node::Unary(op, e) => {
                let v = e.eval(x);
                match op {
                    UnOp::Neg => -v,
                    UnOp::Not => 1.0 - truth(v),
                }
            }
            Node::Binary(op, l, r) => {
                let a = l.eval(x);
                // Short-circuit like WGSL.
                match op {
                    BinOp::And if a == 0.0 => return 0.0,
                    BinOp::Or if a != 0.0 => return 1.0,
                    _ => {}
                }
                let b = r.eval(x);
                let cmp = |c: bool| if c { 1.0 } else { 0.0 };
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Rem => a % b,
                    BinOp::Eq => cmp(a == b),
                    BinOp::Ne => cmp(a != b),
                    BinOp::Lt => cmp(a < b),
                    BinOp::Le => cmp(a <= b),
                    BinOp::Gt => cmp(a > b),
                    BinOp::Ge => cmp(a >= b),
                    BinOp::And | BinOp::Or => truth(b),
                }
            }
            Node::Call(f, args) => {
                let mut values = [0.0f32; 3];
                for (slot, arg) in values.iter_mut().zip(args) {
                    *slot = arg.eval(x);
                }
                f.call(&values[..args.len()])
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num(f32),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Num(v) => write!(f, "number {}", v),
            Tok::Ident(s) => write!(f, "identifier `{}`", s),
            Tok::Op(s) => write!(f, "`{}`", s),
            Tok::LParen => write!(f, "`(`"),
            Tok::RParen => write!(f, "`)`"),
            Tok::Comma => write!(f, "`,`"),
        }
    }
}

const OPERATORS: [&str; 15] = [
    "||", "&&", "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "!", "~",
];

fn tokenize(source: &str) -> Result<Vec<(usize, Tok)>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let next_is_digit = bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit());
        if c.is_ascii_digit() || (c == '.' && next_is_digit) {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                i += 1;
                if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                    i += 1;
                }
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text = &source[start..i];
            // WGSL literal suffixes.
            if i < bytes.len() && matches!(bytes[i], b'f' | b'h' | b'i' | b'u') {
                i += 1;
            }
            let value: f32 = text.parse().map_err(|_| ParseError {
                offset: start,
                message: format!("malformed number `{}`", text),
            })?;
            tokens.push((start, Tok::Num(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            tokens.push((start, Tok::Ident(source[start..i].to_string())));
            continue;
        }

        match c {
            '(' => tokens.push((start, Tok::LParen)),
            ')' => tokens.push((start, Tok::RParen)),
            ',' => tokens.push((start, Tok::Comma)),
            _ => {
                let op = OPERATORS
                    .iter()
                    .find(|op| source[i..].starts_with(**op))
                    .ok_or_else(|| ParseError {
                        offset: start,
                        message: format!("unexpected character `{}`", c),
                    })?;
                if *op == "~" {
                    return Err(ParseError {
                        offset: start,
                        message: "bitwise operators are not supported".into(),
                    });
                }
                tokens.push((start, Tok::Op(op)));
                i += op.len();
                continue;
            }
        }
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Tok)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, &Tok)> {
        self.tokens.get(self.pos).map(|(o, t)| (*o, t))
    }

    fn offset(&self) -> usize {
        self.peek().map(|(o, _)| o).unwrap_or(self.end)
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let found = match self.peek() {
            Some((_, Tok::Op(op))) => ops.iter().copied().find(|o| *o == *op),
            _ => None,
        };
        if found.is_some() {
            self.pos += 1;
        }
        found
    }

    fn expect(&mut self, tok: Tok) -> Result<(), ParseError> {
        match self.peek() {
            Some((_, t)) if *t == tok => {
                self.pos += 1;
                Ok(())
            }
            Some((offset, t)) => Err(ParseError {
                offset,
                message: format!("expected {}, found {}", tok, t),
            }),
            None => Err(ParseError {
                offset: self.end,
                message: format!("expected {}, found end of input", tok),
            }),
        }
    }

    fn binary(op: BinOp, l: Node, r: Node) -> Node {
        Node::Binary(op, Box::new(l), Box::new(r))
    }

    fn or(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.and()?;
        while self.eat_op(&["||"]).is_some() {
            lhs = Self::binary(BinOp::Or, lhs, self.and()?);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.comparison()?;
        while self.eat_op(&["&&"]).is_some() {
            lhs = Self::binary(BinOp::And, lhs, self.comparison()?);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Node, ParseError> {
        let lhs = self.additive()?;
        let op = match self.eat_op(&["==", "!=", "<=", ">=", "<", ">"]) {
            Some("==") => BinOp::Eq,
            Some("!=") => BinOp::Ne,
            Some("<=") => BinOp::Le,
            Some(">=") => BinOp::Ge,
            Some("<") => BinOp::Lt,
            Some(">") => BinOp::Gt,
            _ => return Ok(lhs),
        };
        Ok(Self::binary(op, lhs, self.additive()?))
    }

    fn additive(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinOp::Add } else { BinOp::Sub };
            lhs = Self::binary(op, lhs, self.multiplicative()?);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinOp::Mul,
                "/" => BinOp::Div,
                _ => BinOp::Rem,
            };
            lhs = Self::binary(op, lhs, self.unary()?);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, ParseError> {
        match self.eat_op(&["-", "!"]) {
            Some("-") => Ok(Node::Unary(UnOp::Neg, Box::new(self.unary()?))),
            Some(_) => Ok(Node::Unary(UnOp::Not, Box::new(self.unary()?))),
            None => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Node, ParseError> {
        let offset = self.offset();
        let tok = match self.tokens.get(self.pos) {
            Some((_, t)) => t.clone(),
            None => {
                return Err(ParseError {
                    offset,
                    message: "unexpected end of input".into(),
                })
            }
        };
        self.pos += 1;

        match tok {
            Tok::Num(v) => Ok(Node::Num(v)),
            Tok::LParen => {
                let inner = self.or()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::Ident(name) if name == "x" => Ok(Node::X),
            Tok::Ident(name) if name == "true" => Ok(Node::Num(1.0)),
            Tok::Ident(name) if name == "false" => Ok(Node::Num(0.0)),
            Tok::Ident(name) => {
                let (func, arity) = Func::lookup(&name).ok_or_else(|| ParseError {
                    offset,
                    message: format!("unknown identifier `{}`", name),
                })?;
                self.expect(Tok::LParen)?;
                let mut args = Vec::with_capacity(arity);
                if !matches!(self.peek(), Some((_, Tok::RParen))) {
                    args.push(self.or()?);
                    while matches!(self.peek(), Some((_, Tok::Comma))) {
                        self.pos += 1;
                        args.push(self.or()?);
                    }
                }
                self.expect(Tok::RParen)?;
                if args.len() != arity {
                    return Err(ParseError {
                        offset,
                        message: format!(
                            "`{}` takes {} argument(s), got {}",
                            name,
                            arity,
                            args.len()
                        ),
                    });
                }
                Ok(Node::Call(func, args))
            }
            other => Err(ParseError {
                offset,
                message: format!("unexpected {}", other),
            }),
        }
    }
}
