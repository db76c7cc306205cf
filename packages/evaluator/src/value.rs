//! Evaluated values and their arithmetic

use crate::error::{EvalError, EvalResult};
use lessrs_parser::ast::{BinaryOp, CompareOp, ListSeparator, Span};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Write;

/// A fully evaluated value: no variables, no pending operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number { value: f64, unit: Option<String> },
    Color(Color),
    /// `quote` is `None` for escaped strings, which print without quotes
    String { value: String, quote: Option<char> },
    Keyword(String),
    List {
        items: Vec<Value>,
        separator: ListSeparator,
    },
    /// Call to a function that is not built in, kept for the browser
    Call { name: String, args: Vec<Value> },
}

impl Value {
    pub fn number(value: f64, unit: Option<&str>) -> Self {
        Value::Number {
            value,
            unit: unit.map(str::to_string),
        }
    }

    pub fn keyword(value: impl Into<String>) -> Self {
        Value::Keyword(value.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number { unit: None, .. } => "number",
            Value::Number { .. } => "dimension",
            Value::Color(_) => "color",
            Value::String { .. } => "string",
            Value::Keyword(_) => "keyword",
            Value::List { .. } => "list",
            Value::Call { .. } => "function call",
        }
    }

    /// Colors, including named color keywords
    pub fn to_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(c.clone()),
            Value::Keyword(k) => Color::from_name(k),
            _ => None,
        }
    }

    /// The keyword `true`, as guards and the `is*` functions use it
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Keyword(k) if k == "true")
    }

    /// Text of a string without its quotes; CSS text for anything else
    pub fn content(&self) -> String {
        match self {
            Value::String { value, .. } => value.clone(),
            other => other.to_css(false),
        }
    }

    pub fn to_css(&self, compress: bool) -> String {
        let mut out = String::new();
        self.write_css(&mut out, compress);
        out
    }

    fn write_css(&self, out: &mut String, compress: bool) {
        match self {
            Value::Number { value, unit } => {
                out.push_str(&format_number(*value));
                if let Some(unit) = unit {
                    out.push_str(unit);
                }
            }
            Value::Color(color) => out.push_str(&color.to_css(compress)),
            Value::String { value, quote } => match quote {
                Some(q) => {
                    let _ = write!(out, "{q}{value}{q}");
                }
                None => out.push_str(value),
            },
            Value::Keyword(k) => out.push_str(k),
            Value::List { items, separator } => {
                let sep = match (separator, compress) {
                    (ListSeparator::Space, _) => " ",
                    (ListSeparator::Comma, false) => ", ",
                    (ListSeparator::Comma, true) => ",",
                };
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(sep);
                    }
                    item.write_css(out, compress);
                }
            }
            Value::Call { name, args } => {
                out.push_str(name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(if compress { "," } else { ", " });
                    }
                    arg.write_css(out, compress);
                }
                out.push(')');
            }
        }
    }
}

/// Guard comparison. Numbers order by value; anything else only compares
/// equal or not.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number { value: a, .. }, Value::Number { value: b, .. }) => a.partial_cmp(b),
        (Value::Color(a), Value::Color(b)) => {
            (a.rgb == b.rgb && a.alpha == b.alpha).then_some(Ordering::Equal)
        }
        (a, b) => (a.content() == b.content()).then_some(Ordering::Equal),
    };

    match (op, ordering) {
        (CompareOp::Lt, Some(Ordering::Less)) | (CompareOp::Gt, Some(Ordering::Greater)) => true,
        (CompareOp::Le, Some(Ordering::Less | Ordering::Equal))
        | (CompareOp::Ge, Some(Ordering::Greater | Ordering::Equal))
        | (CompareOp::Eq, Some(Ordering::Equal)) => true,
        _ => false,
    }
}

/// Integers print without decimals, other numbers with at most 8
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        let int = value as i64;
        return int.to_string();
    }
    let text = format!("{:.8}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

/// RGB channels as floats in [0, 255] plus alpha in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub rgb: [f64; 3],
    pub alpha: f64,
    /// Source text for colors that were never modified
    pub original: Option<String>,
}

/// Hue in degrees, saturation/lightness/alpha in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
    pub a: f64,
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("white", [255, 255, 255]),
    ("maroon", [128, 0, 0]),
    ("red", [255, 0, 0]),
    ("purple", [128, 0, 128]),
    ("fuchsia", [255, 0, 255]),
    ("magenta", [255, 0, 255]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("olive", [128, 128, 0]),
    ("yellow", [255, 255, 0]),
    ("navy", [0, 0, 128]),
    ("blue", [0, 0, 255]),
    ("teal", [0, 128, 128]),
    ("aqua", [0, 255, 255]),
    ("cyan", [0, 255, 255]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gold", [255, 215, 0]),
    ("indigo", [75, 0, 130]),
    ("violet", [238, 130, 238]),
];

impl Color {
    pub fn new(rgb: [f64; 3], alpha: f64) -> Self {
        Self {
            rgb,
            alpha,
            original: None,
        }
    }

    /// Parse `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('#')?;
        let expanded: String = match digits.len() {
            3 | 4 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 | 8 => digits.to_string(),
            _ => return None,
        };
        let mut channels = [0.0; 4];
        channels[3] = 255.0;
        for (i, chunk) in expanded.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).ok()?;
            channels[i] = u8::from_str_radix(pair, 16).ok()? as f64;
        }
        Some(Self {
            rgb: [channels[0], channels[1], channels[2]],
            alpha: channels[3] / 255.0,
            original: Some(text.to_string()),
        })
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower == "transparent" {
            return Some(Self {
                rgb: [0.0; 3],
                alpha: 0.0,
                original: Some(name.to_string()),
            });
        }
        NAMED_COLORS
            .iter()
            .find(|(n, _)| *n == lower)
            .map(|(_, rgb)| Self {
                rgb: rgb.map(f64::from),
                alpha: 1.0,
                original: Some(name.to_string()),
            })
    }

    pub fn from_hsla(h: f64, s: f64, l: f64, a: f64) -> Self {
        let h = (h % 360.0 + 360.0) % 360.0 / 360.0;
        let m2 = if l <= 0.5 { l * (s + 1.0) } else { l + s - l * s };
        let m1 = l * 2.0 - m2;
        let hue = |h: f64| {
            let h = if h < 0.0 {
                h + 1.0
            } else if h > 1.0 {
                h - 1.0
            } else {
                h
            };
            if h * 6.0 < 1.0 {
                m1 + (m2 - m1) * h * 6.0
            } else if h * 2.0 < 1.0 {
                m2
            } else if h * 3.0 < 2.0 {
                m1 + (m2 - m1) * (2.0 / 3.0 - h) * 6.0
            } else {
                m1
            }
        };
        Self::new(
            [
                hue(h + 1.0 / 3.0) * 255.0,
                hue(h) * 255.0,
                hue(h - 1.0 / 3.0) * 255.0,
            ],
            a,
        )
    }

    pub fn to_hsl(&self) -> Hsl {
        let [r, g, b] = self.rgb.map(|c| c / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;

        if d == 0.0 {
            return Hsl {
                h: 0.0,
                s: 0.0,
                l,
                a: self.alpha,
            };
        }

        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };

        Hsl {
            h: h * 60.0,
            s,
            l,
            a: self.alpha,
        }
    }

    pub fn from_hsl(hsl: Hsl) -> Self {
        Self::from_hsla(hsl.h, hsl.s, hsl.l, hsl.a)
    }

    fn channels(&self) -> [u8; 3] {
        self.rgb.map(|c| c.round().clamp(0.0, 255.0) as u8)
    }

    pub fn to_css(&self, compress: bool) -> String {
        if let Some(original) = &self.original {
            if !compress {
                return original.clone();
            }
            if original.starts_with('#') {
                return shorten_hex(&original.to_ascii_lowercase());
            }
            return original.clone();
        }

        let [r, g, b] = self.channels();
        if self.alpha < 1.0 {
            let sep = if compress { "," } else { ", " };
            let alpha = format_number(self.alpha.clamp(0.0, 1.0));
            return format!("rgba({r}{sep}{g}{sep}{b}{sep}{alpha})");
        }

        let hex = format!("#{r:02x}{g:02x}{b:02x}");
        if compress {
            shorten_hex(&hex)
        } else {
            hex
        }
    }

    /// Per-channel operation against another color
    fn operate(&self, op: BinaryOp, other: &Color, span: Span) -> EvalResult<Color> {
        let mut rgb = [0.0; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = apply(op, self.rgb[i], other.rgb[i], span)?.clamp(0.0, 255.0);
        }
        let alpha = self.alpha * (1.0 - other.alpha) + other.alpha;
        Ok(Color::new(rgb, alpha))
    }

    fn operate_scalar(&self, op: BinaryOp, scalar: f64, span: Span) -> EvalResult<Color> {
        let mut rgb = [0.0; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = apply(op, self.rgb[i], scalar, span)?.clamp(0.0, 255.0);
        }
        Ok(Color::new(rgb, self.alpha))
    }
}

/// `#aabbcc` to `#abc` when every channel repeats its digit
fn shorten_hex(hex: &str) -> String {
    let bytes = hex.as_bytes();
    if bytes.len() == 7 && bytes[1] == bytes[2] && bytes[3] == bytes[4] && bytes[5] == bytes[6] {
        let mut short = String::with_capacity(4);
        short.push('#');
        short.push(bytes[1] as char);
        short.push(bytes[3] as char);
        short.push(bytes[5] as char);
        short
    } else {
        hex.to_string()
    }
}

fn apply(op: BinaryOp, left: f64, right: f64, span: Span) -> EvalResult<f64> {
    match op {
        BinaryOp::Add => Ok(left + right),
        BinaryOp::Subtract => Ok(left - right),
        BinaryOp::Multiply => Ok(left * right),
        BinaryOp::Divide => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero { span })
            } else {
                Ok(left / right)
            }
        }
    }
}

fn op_verb(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Subtract => "subtract",
        BinaryOp::Multiply => "multiply",
        BinaryOp::Divide => "divide",
    }
}

/// Apply a binary operator to two evaluated values
pub fn operate(op: BinaryOp, left: &Value, right: &Value, span: Span) -> EvalResult<Value> {
    match (left, right) {
        (
            Value::Number {
                value: a,
                unit: unit_a,
            },
            Value::Number {
                value: b,
                unit: unit_b,
            },
        ) => {
            let unit = match (unit_a, unit_b) {
                (Some(ua), Some(ub)) if ua != ub => {
                    return Err(EvalError::type_mismatch(
                        span,
                        format!(
                            "cannot {} {} and {}: incompatible units",
                            op_verb(op),
                            left.to_css(false),
                            right.to_css(false)
                        ),
                    ))
                }
                (Some(u), _) | (None, Some(u)) => Some(u.clone()),
                (None, None) => None,
            };
            Ok(Value::Number {
                value: apply(op, *a, *b, span)?,
                unit,
            })
        }

        (Value::String { value, quote }, other) if op == BinaryOp::Add => Ok(Value::String {
            value: format!("{}{}", value, other.content()),
            quote: *quote,
        }),
        (other, Value::String { value, quote }) if op == BinaryOp::Add => Ok(Value::String {
            value: format!("{}{}", other.content(), value),
            quote: *quote,
        }),

        (Value::Number { value, .. }, other) => match other.to_color() {
            Some(color) if matches!(op, BinaryOp::Add | BinaryOp::Multiply) => {
                Ok(Value::Color(color.operate_scalar(op, *value, span)?))
            }
            Some(_) => Err(EvalError::type_mismatch(
                span,
                format!(
                    "cannot {} a color from a number ({} {} {})",
                    op_verb(op),
                    left.to_css(false),
                    op.symbol(),
                    right.to_css(false)
                ),
            )),
            None => Err(mismatch(op, left, right, span)),
        },

        (l, r) => match (l.to_color(), r.to_color(), r) {
            (Some(a), Some(b), _) => Ok(Value::Color(a.operate(op, &b, span)?)),
            (Some(a), None, Value::Number { value, .. }) => {
                Ok(Value::Color(a.operate_scalar(op, *value, span)?))
            }
            _ => Err(mismatch(op, l, r, span)),
        },
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value, span: Span) -> EvalError {
    EvalError::type_mismatch(
        span,
        format!(
            "cannot {} {} ({}) and {} ({})",
            op_verb(op),
            left.to_css(false),
            left.type_name(),
            right.to_css(false),
            right.type_name()
        ),
    )
}

/// Unary minus
pub fn negate(value: &Value, span: Span) -> EvalResult<Value> {
    match value {
        Value::Number { value, unit } => Ok(Value::Number {
            value: -value,
            unit: unit.clone(),
        }),
        Value::Keyword(k) => Ok(Value::Keyword(format!("-{}", k))),
        other => Err(EvalError::type_mismatch(
            span,
            format!("cannot negate {} ({})", other.to_css(false), other.type_name()),
        )),
    }
}
