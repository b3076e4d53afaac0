// Formula parser - converts formula strings into AST
// Supports: numbers, cell refs (A1, $A$1), basic math (+, -, *, /), parentheses,
// and SUM(...) over expressions and ranges (A1:A5). Nothing else is accepted:
// formula text comes from untrusted workbooks.

use crate::address::CellAddress;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    CellRef(CellAddress),
    /// Rectangular range, only valid as a SUM argument
    Range {
        start: CellAddress,
        end: CellAddress,
    },
    Sum(Vec<Expr>),
    Neg(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
}

/// Parse a formula string (must start with `=`) into an AST.
pub fn parse(formula: &str) -> Result<Expr, String> {
    let formula = formula.trim();
    if !formula.starts_with('=') {
        return Err("Formula must start with =".to_string());
    }

    let tokens = tokenize(&formula[1..])?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }

    let (expr, pos) = parse_add_sub(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(format!("Unexpected token at position {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    CellRef(CellAddress),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Colon,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '*' => { tokens.push(Token::Star); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ':' => { tokens.push(Token::Colon); chars.next(); }
            ',' | ';' => { tokens.push(Token::Comma); chars.next(); }
            'A'..='Z' | 'a'..='z' | '$' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '$' || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if let Some(addr) = CellAddress::parse(&ident) {
                    tokens.push(Token::CellRef(addr));
                } else if ident.contains('$') {
                    return Err(format!("Invalid cell reference: {}", ident));
                } else {
                    tokens.push(Token::Ident(ident.to_uppercase()));
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        Some(Token::Plus) => parse_unary(tokens, pos + 1),
        Some(Token::Minus) => {
            let (expr, pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Neg(Box::new(expr)), pos))
        }
        _ => parse_primary(tokens, pos),
    }
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("Unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::CellRef(addr) => {
            if let Some(Token::Colon) = tokens.get(pos + 1) {
                return Err(format!("Range starting at {} is only allowed inside SUM", addr));
            }
            Ok((Expr::CellRef(*addr), pos + 1))
        }
        Token::Ident(name) => {
            if name != "SUM" {
                return Err(format!("Unsupported function: {}", name));
            }
            match tokens.get(pos + 1) {
                Some(Token::LParen) => {
                    let (args, new_pos) = parse_sum_args(tokens, pos + 2)?;
                    Ok((Expr::Sum(args), new_pos))
                }
                _ => Err("SUM must be followed by (".to_string()),
            }
        }
        Token::LParen => {
            let (expr, pos) = parse_add_sub(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                Some(_) => Err("Expected closing parenthesis".to_string()),
                None => Err("Missing closing parenthesis".to_string()),
            }
        }
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}

fn parse_sum_args(tokens: &[Token], mut pos: usize) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();

    if let Some(Token::RParen) = tokens.get(pos) {
        return Ok((args, pos + 1));
    }

    loop {
        // A range is a complete argument on its own
        let (arg, new_pos) = match (tokens.get(pos), tokens.get(pos + 1), tokens.get(pos + 2)) {
            (Some(Token::CellRef(start)), Some(Token::Colon), Some(Token::CellRef(end))) => {
                (Expr::Range { start: *start, end: *end }, pos + 3)
            }
            _ => parse_add_sub(tokens, pos)?,
        };
        args.push(arg);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Token::Comma) => pos += 1,
            Some(Token::RParen) => return Ok((args, pos + 1)),
            Some(_) => return Err("Expected , or ) in SUM arguments".to_string()),
            None => return Err("Missing closing parenthesis".to_string()),
        }
    }
}
