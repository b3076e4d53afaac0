//! Evaluation of parsed formulas.
//!
//! Operands are supplied by the caller through a lookup closure, so the
//! evaluator itself never touches a sheet and never recurses into other
//! formulas; the resolver owns that (and its cycle detection).

use crate::address::CellAddress;

use super::parser::{Expr, Op};
use super::refs::expand_range;

/// Evaluate an expression, asking `lookup` for the value of each referenced cell.
pub fn evaluate<F>(expr: &Expr, lookup: &mut F) -> Result<f64, String>
where
    F: FnMut(CellAddress) -> f64,
{
    let value = match expr {
        Expr::Number(n) => *n,
        Expr::CellRef(addr) => lookup(*addr),
        Expr::Range { start, end } => {
            return Err(format!("Range {}:{} used outside SUM", start, end));
        }
        Expr::Sum(args) => {
            let mut total = 0.0;
            for arg in args {
                total += match arg {
                    Expr::Range { start, end } => expand_range(*start, *end)
                        .into_iter()
                        .map(|addr| lookup(addr))
                        .sum(),
                    other => evaluate(other, lookup)?,
                };
            }
            total
        }
        Expr::Neg(inner) => -evaluate(inner, lookup)?,
        Expr::BinaryOp { op, left, right } => {
            let l = evaluate(left, lookup)?;
            let r = evaluate(right, lookup)?;
            match op {
                Op::Add => l + r,
                Op::Sub => l - r,
                Op::Mul => l * r,
                Op::Div => {
                    if r == 0.0 {
                        return Err("Division by zero".to_string());
                    }
                    l / r
                }
            }
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err("Result is not a finite number".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parser::parse;

    fn eval_with(formula: &str, cells: &[(&str, f64)]) -> Result<f64, String> {
        let expr = parse(formula)?;
        let mut lookup = |addr: CellAddress| {
            cells
                .iter()
                .find(|(a, _)| CellAddress::parse(a) == Some(addr))
                .map_or(0.0, |(_, v)| *v)
        };
        evaluate(&expr, &mut lookup)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_with("=2+3*4", &[]), Ok(14.0));
        assert_eq!(eval_with("=(2+3)*4", &[]), Ok(20.0));
        assert_eq!(eval_with("=10/4-1", &[]), Ok(1.5));
        assert_eq!(eval_with("=-5+2", &[]), Ok(-3.0));
        assert_eq!(eval_with("=8-2-1", &[]), Ok(5.0));
    }

    #[test]
    fn test_refs_and_sum() {
        let cells = [("K5", 10.0), ("K6", 1.25), ("K7", 5.5)];
        assert_eq!(eval_with("=K5+K7", &cells), Ok(15.5));
        assert_eq!(eval_with("=SUM(K5:K7)", &cells), Ok(16.75));
        assert_eq!(eval_with("=SUM(K5:K6,K7*2,1)", &cells), Ok(23.25));
        assert_eq!(eval_with("=Z99", &cells), Ok(0.0));
    }

    #[test]
    fn test_division_by_zero_is_error() {
        assert!(eval_with("=1/0", &[]).is_err());
        assert!(eval_with("=K5/K6", &[("K5", 1.0)]).is_err());
    }
}
