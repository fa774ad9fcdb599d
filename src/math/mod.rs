//! Deterministic math evaluation for free-text questions.
//!
//! Three solvers are tried in order: definite integral, derivative, plain
//! arithmetic. Each returns `None` when the text is not in its shape, so the
//! next one gets a chance; the first successful calculation wins. Nothing in
//! here panics or returns an error to the caller: failures collapse to `None`.

pub mod calculus;
pub mod parser;

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::utils::math::round_to;
use calculus::{central_difference, derivative, simpson, DIFFERENCE_STEP, SIMPSON_INTERVALS};
pub use parser::{Expr, FUNCTION_NAMES};

/// Errors raised while parsing or evaluating an expression. They never leave
/// this module: [`solve`] and [`evaluate_math`] turn them into `None`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MathError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),

    #[error("result is not a finite number")]
    NonFinite,

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Rounding precision for displayed results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Low,
    #[default]
    Medium,
    High,
}

impl Precision {
    /// Decimal places kept when rounding.
    pub fn decimals(self) -> u32 {
        match self {
            Precision::Low => 2,
            Precision::Medium => 4,
            Precision::High => 6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Low => "low",
            Precision::Medium => "medium",
            Precision::High => "high",
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Precision::Low),
            "medium" => Ok(Precision::Medium),
            "high" => Ok(Precision::High),
            other => Err(format!("unknown precision '{}' (expected low, medium or high)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MathMode {
    Arithmetic,
    Integral,
    Derivative,
}

impl MathMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MathMode::Arithmetic => "arithmetic",
            MathMode::Integral => "integral",
            MathMode::Derivative => "derivative",
        }
    }
}

/// How a value was obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    Direct,
    Simpson { intervals: usize },
    Symbolic { derivative: String },
    FiniteDifference { step: f64 },
}

/// A solved math question, attached to calculation envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub mode: MathMode,
    /// The expression as parsed, re-rendered.
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
    /// Rounded value.
    pub value: f64,
    /// Rounded value with trailing zeros trimmed.
    pub formatted: String,
    #[serde(flatten)]
    pub method: Method,
}

impl Calculation {
    /// One-line human rendering, e.g. `∫ x^2 dx from 0 to 1 = 0.3333`.
    pub fn summary(&self) -> String {
        let var = self.variable.as_deref().unwrap_or("x");
        match self.mode {
            MathMode::Arithmetic => format!("{} = {}", self.expression, self.formatted),
            MathMode::Integral => format!(
                "∫ {} d{} from {} to {} = {}",
                self.expression,
                var,
                format_number(self.lower.unwrap_or_default(), 6),
                format_number(self.upper.unwrap_or_default(), 6),
                self.formatted
            ),
            MathMode::Derivative => {
                let at = format_number(self.point.unwrap_or_default(), 6);
                match &self.method {
                    Method::Symbolic { derivative } => format!(
                        "d/d{v} [{}] = {} ; at {v} = {}: {}",
                        self.expression,
                        derivative,
                        at,
                        self.formatted,
                        v = var
                    ),
                    _ => format!(
                        "d/d{v} [{}] at {v} = {} ≈ {}",
                        self.expression,
                        at,
                        self.formatted,
                        v = var
                    ),
                }
            }
        }
    }
}

type Solver = fn(&str, Precision) -> Option<Result<Calculation, MathError>>;

/// Solvers in the order they are tried.
const SOLVERS: &[(&str, Solver)] = &[
    ("integral", solve_integral),
    ("derivative", solve_derivative),
    ("arithmetic", solve_arithmetic),
];

static INTEGRAL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(
        r"(?i)(?:∫|\bintegral\b|\bintegrate\b|\bintegrasi(?:kan)?\b)\s*(?:of\s+|dari\s+)?(.+?)\s+(?:from|dari)\s+(\S+)\s+(?:to|sampai|hingga|ke)\s+([^\s?]+)",
    )
});

static DERIVATIVE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(
        r"(?i)(?:\bderivative\b|\bderive\b|\bdifferentiate\b|\bturunan(?:kan)?\b|\bd/d[a-z]\b)\s*(?:of\s+|dari\s+)?(.+?)\s+(?:at|pada|di|when|saat)\s+(?:[a-z]\s*=\s*)?([^\s?]+)",
    )
});

static LEAD_PHRASE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(
        r"(?i)^\s*(?:what\s+is|what's|whats|calculate|compute|evaluate|solve|how\s+much\s+is|berapa(?:kah)?|hitung(?:lah)?|hasil\s+dari|hasil)\s*(?:the\s+value\s+of\s+|of\s+)?",
    )
});

static TRAILING_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"[\s?=!.]+$"));

static DX_SUFFIX_RE: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)\s*\bd[a-z]\s*$"));

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Failed to compile math pattern: {}", e);
            None
        }
    }
}

/// Whether the text has anything to compute: a digit, an operator, or a known
/// function name.
pub fn looks_mathematical(text: &str) -> bool {
    if text.chars().any(|c| c.is_ascii_digit()) {
        return true;
    }
    if text
        .chars()
        .any(|c| matches!(c, '+' | '*' | '/' | '^' | '%' | '×' | '÷' | '∫' | '−'))
    {
        return true;
    }
    crate::utils::text::tokenize(text)
        .iter()
        .any(|t| FUNCTION_NAMES.contains(&t.as_str()))
}

/// Solve a free-text math question.
pub fn solve(input: &str, precision: Precision) -> Option<Calculation> {
    if !looks_mathematical(input) {
        return None;
    }
    for (name, solver) in SOLVERS {
        match solver(input, precision) {
            Some(Ok(calculation)) => {
                debug!(solver = name, value = calculation.value, "math solved");
                return Some(calculation);
            }
            Some(Err(e)) => debug!(solver = name, error = %e, "math solver failed"),
            None => {}
        }
    }
    None
}

/// Evaluate a free-text math question to a rounded, trimmed string.
///
/// Returns `None` when the text is not mathematical or cannot be evaluated.
pub fn evaluate_math(expression: &str, precision: Precision) -> Option<String> {
    solve(expression, precision).map(|c| c.formatted)
}

/// Round to `decimals` places and trim trailing zeros, so `4.0000` reads `4`.
pub fn format_number(value: f64, decimals: u32) -> String {
    let rounded = round_to(value, decimals);
    let mut s = format!("{:.*}", decimals as usize, rounded);
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn finish(
    mode: MathMode,
    expr: &Expr,
    value: f64,
    precision: Precision,
    method: Method,
) -> Calculation {
    let decimals = precision.decimals();
    Calculation {
        mode,
        expression: expr.to_string(),
        variable: None,
        lower: None,
        upper: None,
        point: None,
        value: round_to(value, decimals),
        formatted: format_number(value, decimals),
        method,
    }
}

/// The single free variable of an expression, `x` when it has none.
fn single_variable(expr: &Expr) -> Result<String, MathError> {
    let vars = expr.variables();
    match vars.len() {
        0 => Ok("x".to_string()),
        1 => Ok(vars.into_iter().next().unwrap_or_else(|| "x".to_string())),
        _ => Err(MathError::Unsupported(format!(
            "expected one variable, found {}",
            vars.into_iter().collect::<Vec<_>>().join(", ")
        ))),
    }
}

fn constant(text: &str) -> Result<f64, MathError> {
    let text = text.trim().trim_end_matches(['.', ',']);
    Expr::parse(text)?.eval(&[])
}

fn solve_integral(input: &str, precision: Precision) -> Option<Result<Calculation, MathError>> {
    let caps = INTEGRAL_RE.as_ref()?.captures(input)?;
    let body = caps.get(1)?.as_str();
    let body = match DX_SUFFIX_RE.as_ref() {
        Some(re) => re.replace(body, "").into_owned(),
        None => body.to_string(),
    };
    let (lower, upper) = (caps.get(2)?.as_str(), caps.get(3)?.as_str());

    Some((|| -> Result<Calculation, MathError> {
        let expr = Expr::parse(&body)?;
        let var = single_variable(&expr)?;
        let a = constant(lower)?;
        let b = constant(upper)?;
        let value = simpson(|x| expr.eval_at(&var, x), a, b, SIMPSON_INTERVALS)?;
        let mut calc = finish(
            MathMode::Integral,
            &expr,
            value,
            precision,
            Method::Simpson {
                intervals: SIMPSON_INTERVALS,
            },
        );
        calc.variable = Some(var);
        calc.lower = Some(a);
        calc.upper = Some(b);
        Ok(calc)
    })())
}

fn solve_derivative(input: &str, precision: Precision) -> Option<Result<Calculation, MathError>> {
    let caps = DERIVATIVE_RE.as_ref()?.captures(input)?;
    let body = caps.get(1)?.as_str();
    let point = caps.get(2)?.as_str();

    Some((|| -> Result<Calculation, MathError> {
        let expr = Expr::parse(body)?;
        let var = single_variable(&expr)?;
        let at = constant(point)?;

        let symbolic = derivative(&expr, &var).and_then(|d| match d.eval_at(&var, at) {
            Ok(value) => Some((d, value)),
            Err(e) => {
                debug!(error = %e, "symbolic derivative failed to evaluate, using finite difference");
                None
            }
        });

        let mut calc = match symbolic {
            Some((d, value)) => finish(
                MathMode::Derivative,
                &expr,
                value,
                precision,
                Method::Symbolic {
                    derivative: d.to_string(),
                },
            ),
            None => {
                let value = central_difference(|x| expr.eval_at(&var, x), at, DIFFERENCE_STEP)?;
                finish(
                    MathMode::Derivative,
                    &expr,
                    value,
                    precision,
                    Method::FiniteDifference {
                        step: DIFFERENCE_STEP,
                    },
                )
            }
        };
        calc.variable = Some(var);
        calc.point = Some(at);
        Ok(calc)
    })())
}

fn solve_arithmetic(input: &str, precision: Precision) -> Option<Result<Calculation, MathError>> {
    let mut text = input.trim().to_string();
    if let Some(re) = LEAD_PHRASE_RE.as_ref() {
        text = re.replace(&text, "").into_owned();
    }
    if let Some(re) = TRAILING_RE.as_ref() {
        text = re.replace(&text, "").into_owned();
    }
    if text.is_empty() {
        return None;
    }

    Some((|| -> Result<Calculation, MathError> {
        let expr = Expr::parse(&text)?;
        if let Some(var) = expr.variables().into_iter().next() {
            return Err(MathError::UndefinedSymbol(var));
        }
        let value = expr.eval(&[])?;
        Ok(finish(MathMode::Arithmetic, &expr, value, precision, Method::Direct))
    })())
}
