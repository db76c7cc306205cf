//! Built-in color and math functions

use crate::error::{EvalError, EvalResult};
use crate::value::{Color, Hsl, Value};
use lessrs_parser::ast::Span;

/// Call a built-in function. `Ok(None)` for names that are not built in;
/// the caller emits those as plain CSS function calls.
pub fn call_function(name: &str, args: &[Value], span: Span) -> EvalResult<Option<Value>> {
    let lower = name.to_ascii_lowercase();
    let call = Call {
        name: &lower,
        args,
        span,
    };

    let value = match lower.as_str() {
        "rgb" => {
            call.arity(3)?;
            rgba(&call, 1.0)?
        }
        "rgba" => {
            call.arity(4)?;
            let alpha = call.fraction(3)?;
            rgba(&call, alpha)?
        }
        "hsl" => {
            call.arity(3)?;
            hsla(&call, 1.0)?
        }
        "hsla" => {
            call.arity(4)?;
            let alpha = call.fraction(3)?;
            hsla(&call, alpha)?
        }
        "hue" => Value::number(call.hsl(0)?.h.round(), None),
        "saturation" => Value::number((call.hsl(0)?.s * 100.0).round(), Some("%")),
        "lightness" => Value::number((call.hsl(0)?.l * 100.0).round(), Some("%")),
        "alpha" => Value::number(call.color(0)?.alpha, None),
        "red" => Value::number(call.color(0)?.rgb[0].round(), None),
        "green" => Value::number(call.color(0)?.rgb[1].round(), None),
        "blue" => Value::number(call.color(0)?.rgb[2].round(), None),
        "saturate" => adjust_hsl(&call, |hsl, amount| hsl.s = (hsl.s + amount).clamp(0.0, 1.0))?,
        "desaturate" => adjust_hsl(&call, |hsl, amount| hsl.s = (hsl.s - amount).clamp(0.0, 1.0))?,
        "lighten" => adjust_hsl(&call, |hsl, amount| hsl.l = (hsl.l + amount).clamp(0.0, 1.0))?,
        "darken" => adjust_hsl(&call, |hsl, amount| hsl.l = (hsl.l - amount).clamp(0.0, 1.0))?,
        "fadein" => adjust_hsl(&call, |hsl, amount| hsl.a = (hsl.a + amount).clamp(0.0, 1.0))?,
        "fadeout" => adjust_hsl(&call, |hsl, amount| hsl.a = (hsl.a - amount).clamp(0.0, 1.0))?,
        "fade" => adjust_hsl(&call, |hsl, amount| hsl.a = amount.clamp(0.0, 1.0))?,
        "spin" => {
            call.arity(2)?;
            let mut hsl = call.hsl(0)?;
            let (degrees, _) = call.number(1)?;
            let hue = (hsl.h + degrees) % 360.0;
            hsl.h = if hue < 0.0 { hue + 360.0 } else { hue };
            Value::Color(Color::from_hsl(hsl))
        }
        "greyscale" | "grayscale" => {
            call.arity(1)?;
            let mut hsl = call.hsl(0)?;
            hsl.s = 0.0;
            Value::Color(Color::from_hsl(hsl))
        }
        "mix" => mix(&call)?,
        "e" => {
            call.arity(1)?;
            Value::Keyword(args[0].content())
        }
        "%" => format(&call)?,
        "percentage" => {
            call.arity(1)?;
            let (value, _) = call.number(0)?;
            Value::number(value * 100.0, Some("%"))
        }
        "round" => {
            call.arity_range(1, 2)?;
            let (value, unit) = call.number(0)?;
            let places = if args.len() == 2 { call.number(1)?.0 } else { 0.0 };
            let factor = 10f64.powi(places.max(0.0) as i32);
            Value::number((value * factor).round() / factor, unit)
        }
        "ceil" => {
            call.arity(1)?;
            let (value, unit) = call.number(0)?;
            Value::number(value.ceil(), unit)
        }
        "floor" => {
            call.arity(1)?;
            let (value, unit) = call.number(0)?;
            Value::number(value.floor(), unit)
        }
        "unit" => {
            call.arity_range(1, 2)?;
            let (value, _) = call.number(0)?;
            match args.get(1) {
                Some(unit) => {
                    let unit = unit.content();
                    Value::number(value, (!unit.is_empty()).then_some(unit.as_str()))
                }
                None => Value::number(value, None),
            }
        }
        "iscolor" | "isnumber" | "isstring" | "iskeyword" | "isurl" | "ispixel" | "isem"
        | "ispercentage" => {
            call.arity(1)?;
            boolean(is_type(&lower, &args[0]))
        }
        _ => return Ok(None),
    };

    Ok(Some(value))
}

fn boolean(value: bool) -> Value {
    Value::keyword(if value { "true" } else { "false" })
}

/// Type tests used in mixin guards
fn is_type(test: &str, value: &Value) -> bool {
    let unit = |expected: &str| matches!(value, Value::Number { unit: Some(u), .. } if u == expected);
    match test {
        "iscolor" => value.to_color().is_some(),
        "isnumber" => matches!(value, Value::Number { .. }),
        "isstring" => matches!(value, Value::String { .. }),
        "isurl" => matches!(value, Value::Keyword(k) if k.starts_with("url(")),
        "iskeyword" => {
            matches!(value, Value::Keyword(k) if !k.starts_with("url(")) && value.to_color().is_none()
        }
        "ispixel" => unit("px"),
        "isem" => unit("em"),
        "ispercentage" => unit("%"),
        _ => false,
    }
}

struct Call<'a> {
    name: &'a str,
    args: &'a [Value],
    span: Span,
}

impl<'a> Call<'a> {
    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::invalid_args(self.span, self.name, message)
    }

    fn arity(&self, n: usize) -> EvalResult<()> {
        self.arity_range(n, n)
    }

    fn arity_range(&self, min: usize, max: usize) -> EvalResult<()> {
        let got = self.args.len();
        if got < min || got > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(self.error(format!("expected {} argument(s), got {}", expected, got)));
        }
        Ok(())
    }

    fn arg(&self, idx: usize) -> EvalResult<&'a Value> {
        self.args
            .get(idx)
            .ok_or_else(|| self.error(format!("missing argument {}", idx + 1)))
    }

    fn number(&self, idx: usize) -> EvalResult<(f64, Option<&'a str>)> {
        match self.arg(idx)? {
            Value::Number { value, unit } => Ok((*value, unit.as_deref())),
            other => Err(self.error(format!(
                "argument {} must be a number, got {}",
                idx + 1,
                other.type_name()
            ))),
        }
    }

    /// Percentages scale to [0, 1]; plain numbers are taken as they are
    fn fraction(&self, idx: usize) -> EvalResult<f64> {
        let (value, unit) = self.number(idx)?;
        Ok(if unit == Some("%") { value / 100.0 } else { value })
    }

    fn color(&self, idx: usize) -> EvalResult<Color> {
        let value = self.arg(idx)?;
        value.to_color().ok_or_else(|| {
            self.error(format!(
                "argument {} must be a color, got {}",
                idx + 1,
                value.type_name()
            ))
        })
    }

    fn hsl(&self, idx: usize) -> EvalResult<Hsl> {
        Ok(self.color(idx)?.to_hsl())
    }
}

fn rgba(call: &Call, alpha: f64) -> EvalResult<Value> {
    let mut rgb = [0.0; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let (value, unit) = call.number(i)?;
        *channel = if unit == Some("%") {
            value * 255.0 / 100.0
        } else {
            value
        };
    }
    Ok(Value::Color(Color::new(rgb, alpha)))
}

fn hsla(call: &Call, alpha: f64) -> EvalResult<Value> {
    let (h, _) = call.number(0)?;
    let s = call.fraction(1)?;
    let l = call.fraction(2)?;
    Ok(Value::Color(Color::from_hsla(h, s, l, alpha)))
}

/// `name(color, amount)`; the amount is a percentage of the full range
fn adjust_hsl(call: &Call, adjust: impl Fn(&mut Hsl, f64)) -> EvalResult<Value> {
    call.arity(2)?;
    let mut hsl = call.hsl(0)?;
    let (amount, _) = call.number(1)?;
    adjust(&mut hsl, amount / 100.0);
    Ok(Value::Color(Color::from_hsl(hsl)))
}

fn mix(call: &Call) -> EvalResult<Value> {
    call.arity_range(2, 3)?;
    let first = call.color(0)?;
    let second = call.color(1)?;
    let p = if call.args.len() == 3 {
        call.number(2)?.0 / 100.0
    } else {
        0.5
    };

    let w = p * 2.0 - 1.0;
    let a = first.alpha - second.alpha;
    let weighted = if w * a == -1.0 {
        w
    } else {
        (w + a) / (1.0 + w * a)
    };
    let w1 = (weighted + 1.0) / 2.0;
    let w2 = 1.0 - w1;

    let mut rgb = [0.0; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        *channel = first.rgb[i] * w1 + second.rgb[i] * w2;
    }
    let alpha = first.alpha * p + second.alpha * (1.0 - p);
    Ok(Value::Color(Color::new(rgb, alpha)))
}

/// `%("%d and %s", a, b)`: `%s` takes string content, `%d`/`%a` CSS text
fn format(call: &Call) -> EvalResult<Value> {
    call.arity_range(1, usize::MAX)?;
    let (template, quote) = match call.arg(0)? {
        Value::String { value, quote } => (value.clone(), *quote),
        other => (other.content(), Some('"')),
    };

    let mut out = String::with_capacity(template.len());
    let mut args = call.args[1..].iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some(spec @ ('s' | 'S' | 'd' | 'D' | 'a' | 'A')) => {
                chars.next();
                match args.next() {
                    Some(arg) if spec.eq_ignore_ascii_case(&'s') => out.push_str(&arg.content()),
                    Some(arg) => out.push_str(&arg.to_css(false)),
                    None => {
                        out.push('%');
                        out.push(spec);
                    }
                }
            }
            _ => out.push('%'),
        }
    }

    Ok(Value::String {
        value: out,
        quote: quote.or(Some('"')),
    })
}
