//! Numeric integration, numeric differentiation, and symbolic derivatives.

use std::f64::consts::{LN_10, LN_2};

use super::parser::{BinOp, Expr, Func};
use super::MathError;

/// Subintervals for composite Simpson's rule. Bounds the only loop in the
/// evaluator.
pub const SIMPSON_INTERVALS: usize = 1000;

/// Step for the central finite difference.
pub const DIFFERENCE_STEP: f64 = 1e-6;

/// Composite Simpson's rule over `[a, b]` with `n` subintervals (forced even).
///
/// `∫ ≈ h/3 · (f(a) + f(b) + 4·Σ_odd f(xᵢ) + 2·Σ_even f(xᵢ))`, `h = (b - a) / n`.
pub fn simpson<F>(f: F, a: f64, b: f64, n: usize) -> Result<f64, MathError>
where
    F: Fn(f64) -> Result<f64, MathError>,
{
    let n = if n < 2 { 2 } else { n + n % 2 };
    let h = (b - a) / n as f64;

    let mut odd = 0.0;
    let mut even = 0.0;
    for i in 1..n {
        let y = f(a + i as f64 * h)?;
        if i % 2 == 1 {
            odd += y;
        } else {
            even += y;
        }
    }

    Ok(h / 3.0 * (f(a)? + f(b)? + 4.0 * odd + 2.0 * even))
}

/// Central finite difference: `(f(x + h) - f(x - h)) / 2h`.
pub fn central_difference<F>(f: F, x: f64, h: f64) -> Result<f64, MathError>
where
    F: Fn(f64) -> Result<f64, MathError>,
{
    Ok((f(x + h)? - f(x - h)?) / (2.0 * h))
}

/// Symbolic derivative of `expr` with respect to `var`.
///
/// Returns `None` for constructs without a closed-form rule here (`%`, `abs`,
/// rounding functions); callers fall back to [`central_difference`].
pub fn derivative(expr: &Expr, var: &str) -> Option<Expr> {
    let d = match expr {
        Expr::Num(_) => num(0.0),
        Expr::Var(name) => num(if name == var { 1.0 } else { 0.0 }),
        Expr::Neg(inner) => neg(derivative(inner, var)?),
        Expr::Binary(op, u, v) => {
            let (u, v) = (u.as_ref(), v.as_ref());
            match op {
                BinOp::Add => add(derivative(u, var)?, derivative(v, var)?),
                BinOp::Sub => sub(derivative(u, var)?, derivative(v, var)?),
                BinOp::Mul => add(
                    mul(derivative(u, var)?, v.clone()),
                    mul(u.clone(), derivative(v, var)?),
                ),
                BinOp::Div => div(
                    sub(
                        mul(derivative(u, var)?, v.clone()),
                        mul(u.clone(), derivative(v, var)?),
                    ),
                    pow(v.clone(), num(2.0)),
                ),
                BinOp::Rem => return None,
                BinOp::Pow => power_rule(u, v, var)?,
            }
        }
        Expr::Call(func, arg) => {
            let inner = derivative(arg, var)?;
            let u = arg.as_ref().clone();
            let outer = match func {
                Func::Sin => call(Func::Cos, u),
                Func::Cos => neg(call(Func::Sin, u)),
                Func::Tan => div(num(1.0), pow(call(Func::Cos, u), num(2.0))),
                Func::Sinh => call(Func::Cosh, u),
                Func::Cosh => call(Func::Sinh, u),
                Func::Tanh => sub(num(1.0), pow(call(Func::Tanh, u), num(2.0))),
                Func::Ln => div(num(1.0), u),
                Func::Log10 => div(num(1.0), mul(u, num(LN_10))),
                Func::Log2 => div(num(1.0), mul(u, num(LN_2))),
                Func::Sqrt => div(num(1.0), mul(num(2.0), call(Func::Sqrt, u))),
                Func::Exp => call(Func::Exp, u),
                Func::Asin => div(num(1.0), call(Func::Sqrt, sub(num(1.0), pow(u, num(2.0))))),
                Func::Acos => neg(div(
                    num(1.0),
                    call(Func::Sqrt, sub(num(1.0), pow(u, num(2.0)))),
                )),
                Func::Atan => div(num(1.0), add(num(1.0), pow(u, num(2.0)))),
                Func::Abs | Func::Floor | Func::Ceil | Func::Round => return None,
            };
            mul(outer, inner)
        }
    };
    Some(d)
}

fn power_rule(u: &Expr, v: &Expr, var: &str) -> Option<Expr> {
    let du = derivative(u, var)?;
    let dv = derivative(v, var)?;
    let d = if !v.contains_var(var) {
        // d(u^n) = n·u^(n-1)·u'
        mul(
            mul(v.clone(), pow(u.clone(), sub(v.clone(), num(1.0)))),
            du,
        )
    } else if !u.contains_var(var) {
        // d(a^v) = a^v·ln(a)·v'
        mul(
            mul(pow(u.clone(), v.clone()), call(Func::Ln, u.clone())),
            dv,
        )
    } else {
        // d(u^v) = u^v·(v'·ln(u) + v·u'/u)
        mul(
            pow(u.clone(), v.clone()),
            add(
                mul(dv, call(Func::Ln, u.clone())),
                div(mul(v.clone(), du), u.clone()),
            ),
        )
    };
    Some(d)
}

fn num(n: f64) -> Expr {
    Expr::Num(n)
}

fn as_num(e: &Expr) -> Option<f64> {
    match e {
        Expr::Num(n) => Some(*n),
        _ => None,
    }
}

fn call(func: Func, arg: Expr) -> Expr {
    Expr::Call(func, Box::new(arg))
}

fn neg(e: Expr) -> Expr {
    match e {
        Expr::Num(n) => num(-n),
        Expr::Neg(inner) => *inner,
        other => Expr::Neg(Box::new(other)),
    }
}

fn add(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) => num(x + y),
        (Some(x), _) if x == 0.0 => b,
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Binary(BinOp::Add, Box::new(a), Box::new(b)),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) => num(x - y),
        (Some(x), _) if x == 0.0 => neg(b),
        (_, Some(y)) if y == 0.0 => a,
        _ => Expr::Binary(BinOp::Sub, Box::new(a), Box::new(b)),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), Some(y)) => num(x * y),
        (Some(x), _) | (_, Some(x)) if x == 0.0 => num(0.0),
        (Some(x), _) if x == 1.0 => b,
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::Binary(BinOp::Mul, Box::new(a), Box::new(b)),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (as_num(&a), as_num(&b)) {
        (Some(x), _) if x == 0.0 => num(0.0),
        (_, Some(y)) if y == 1.0 => a,
        _ => Expr::Binary(BinOp::Div, Box::new(a), Box::new(b)),
    }
}

fn pow(a: Expr, b: Expr) -> Expr {
    match as_num(&b) {
        Some(y) if y == 1.0 => a,
        Some(y) if y == 0.0 => num(1.0),
        _ => Expr::Binary(BinOp::Pow, Box::new(a), Box::new(b)),
    }
}
