use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::tokenizer::{tokenize, SpannedToken, Token};

/// At-rules whose name must never be read as a variable definition
const AT_RULE_NAMES: &[&str] = &[
    "media",
    "import",
    "charset",
    "namespace",
    "supports",
    "container",
    "document",
    "layer",
    "font-face",
    "keyframes",
    "page",
    "viewport",
    "counter-style",
    "font-feature-values",
    "property",
];

fn is_at_rule_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    AT_RULE_NAMES.contains(&lower.as_str())
        || (lower.starts_with('-') && at_rule_kind(&lower) != AtRuleKind::Opaque)
}

/// Deepest nesting of blocks and parentheses the parser accepts
pub const MAX_NESTING_DEPTH: usize = 64;

fn is_hex_color(text: &str) -> bool {
    let digits = &text[1..];
    matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
}

/// `a/b` or `a/b/c` over plain numbers, keywords and variables
fn is_literal_ratio(expr: &Expression) -> bool {
    let is_literal = |e: &Expression| {
        matches!(
            e,
            Expression::Number { .. } | Expression::Keyword { .. } | Expression::Variable { .. }
        )
    };
    match expr {
        Expression::Binary {
            op: BinaryOp::Divide,
            left,
            right,
            ..
        } => (is_literal(left) || is_literal_ratio(left)) && is_literal(right),
        _ => false,
    }
}

fn into_slash(expr: Expression) -> Expression {
    match expr {
        Expression::Binary {
            op: BinaryOp::Divide,
            left,
            right,
            span,
        } => Expression::Slash {
            left: Box::new(into_slash(*left)),
            right,
            span,
        },
        other => other,
    }
}

/// Recursive-descent parser for LESS
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<SpannedToken<'src>>,
    pos: usize,
    /// Nesting of `(` inside the value being parsed; a literal `a/b` stays a
    /// separator only at depth 0
    paren_depth: usize,
    /// Open blocks and parentheses, bounded by [`MAX_NESTING_DEPTH`]
    depth: usize,
}

impl<'src> Parser<'src> {
    /// Tokenize `source`. Fails on the first lex error.
    pub fn new(source: &'src str) -> ParseResult<Self> {
        let tokens = tokenize(source)
            .map(|result| {
                result.map(|t| match t.token {
                    // Silent comments behave like whitespace from here on
                    Token::LineComment(_) => SpannedToken {
                        token: Token::Whitespace,
                        span: t.span,
                    },
                    _ => t,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source,
            tokens,
            pos: 0,
            paren_depth: 0,
            depth: 0,
        })
    }

    /// Parse a complete stylesheet
    pub fn parse_stylesheet(&mut self) -> ParseResult<Stylesheet> {
        let rules = self.parse_body(true)?;
        Ok(Stylesheet {
            rules,
            span: Span::new(0, self.source.len()),
        })
    }

    /// Body items up to a closing `}` (left unconsumed), or to the end of
    /// input at the root
    fn parse_body(&mut self, root: bool) -> ParseResult<Vec<StyleNode>> {
        let mut rules = Vec::new();

        loop {
            self.skip_ws();
            match self.peek() {
                Token::Eof => {
                    if root {
                        break;
                    }
                    return Err(self.error_here("'}'"));
                }
                Token::RBrace => {
                    if root {
                        return Err(ParseError::unexpected_token(
                            self.peek_span(),
                            "rule or declaration",
                            "'}'",
                        ));
                    }
                    break;
                }
                Token::Semi => {
                    self.advance();
                }
                Token::Comment(text) => {
                    let span = self.advance().span;
                    rules.push(StyleNode::Comment(Comment {
                        text: text.to_string(),
                        span,
                    }));
                }
                _ => rules.push(self.parse_item(root)?),
            }
        }

        Ok(rules)
    }

    fn parse_block(&mut self) -> ParseResult<Vec<StyleNode>> {
        self.enter()?;
        self.expect(Token::LBrace, "'{'")?;
        let rules = self.parse_body(false)?;
        self.expect(Token::RBrace, "'}'")?;
        self.leave();
        Ok(rules)
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(ParseError::invalid_syntax(
                self.peek_span(),
                format!("nesting exceeds {} levels", MAX_NESTING_DEPTH),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse_item(&mut self, root: bool) -> ParseResult<StyleNode> {
        match self.peek() {
            Token::AtKeyword(name) => {
                let next = self.token_at(self.next_significant(self.pos + 1));
                if !is_at_rule_name(&name[1..]) && next == Token::Colon {
                    Ok(StyleNode::VariableDef(self.parse_variable_def()?))
                } else {
                    Ok(StyleNode::AtRule(self.parse_at_rule()?))
                }
            }
            Token::Dot | Token::Hash(_) => {
                if self.is_mixin_definition() {
                    return Ok(StyleNode::MixinDef(self.parse_mixin_def()?));
                }
                match self.scan_statement_end() {
                    Token::LBrace => Ok(StyleNode::Ruleset(self.parse_ruleset()?)),
                    _ => Ok(StyleNode::MixinCall(self.parse_mixin_call()?)),
                }
            }
            Token::Ident(name) if name.starts_with("--") && !root => {
                Ok(StyleNode::Declaration(self.parse_declaration()?))
            }
            _ => match self.scan_statement_end() {
                Token::LBrace => Ok(StyleNode::Ruleset(self.parse_ruleset()?)),
                _ if root => Err(ParseError::invalid_syntax(
                    self.peek_span(),
                    "declarations must be inside a ruleset",
                )),
                _ => Ok(StyleNode::Declaration(self.parse_declaration()?)),
            },
        }
    }

    // ---------------------------------------------------------------------
    // Rulesets and selectors
    // ---------------------------------------------------------------------

    fn parse_ruleset(&mut self) -> ParseResult<Ruleset> {
        let start = self.peek_span().start;
        let selectors = self.parse_selector_list()?;
        let rules = self.parse_block()?;

        Ok(Ruleset {
            selectors,
            rules,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_selector_list(&mut self) -> ParseResult<Vec<Selector>> {
        let mut selectors = Vec::new();
        loop {
            self.skip_trivia();
            selectors.push(self.parse_selector()?);
            self.skip_trivia();
            if !self.eat(Token::Comma) {
                break;
            }
        }
        Ok(selectors)
    }

    fn parse_selector(&mut self) -> ParseResult<Selector> {
        let start = self.peek_span().start;
        let mut elements = Vec::new();
        let mut combinator = Combinator::None;
        let mut current = String::new();
        let mut pending_ws = false;

        loop {
            match self.peek() {
                Token::Whitespace | Token::Comment(_) => {
                    self.advance();
                    pending_ws = true;
                }
                Token::Gt | Token::Plus | Token::Tilde => {
                    let token = self.advance().token;
                    if !current.is_empty() {
                        elements.push(SelectorElement::new(
                            combinator,
                            std::mem::take(&mut current),
                        ));
                    }
                    combinator = match token {
                        Token::Gt => Combinator::Child,
                        Token::Plus => Combinator::Adjacent,
                        _ => Combinator::Sibling,
                    };
                    pending_ws = false;
                }
                Token::Comma
                | Token::LBrace
                | Token::RBrace
                | Token::Semi
                | Token::RParen
                | Token::Eof => break,
                token => {
                    if pending_ws && !current.is_empty() {
                        if token == Token::Ident("when") {
                            return Err(ParseError::invalid_syntax(
                                self.peek_span(),
                                "guards are only supported on mixin definitions",
                            ));
                        }
                        elements.push(SelectorElement::new(
                            combinator,
                            std::mem::take(&mut current),
                        ));
                        combinator = Combinator::Descendant;
                    }
                    pending_ws = false;

                    let piece_start = self.peek_span().start;
                    self.parse_selector_piece()?;
                    current.push_str(self.slice(piece_start, self.prev_end()));
                }
            }
        }

        if !current.is_empty() {
            elements.push(SelectorElement::new(combinator, current));
        }
        if elements.is_empty() {
            return Err(self.error_here("selector"));
        }

        let end = self.prev_end().max(start);
        Ok(Selector {
            elements,
            span: Span::new(start, end),
        })
    }

    /// Consume one piece of a compound selector
    fn parse_selector_piece(&mut self) -> ParseResult<()> {
        match self.peek() {
            Token::LBracket => self.consume_balanced(Token::LBracket, Token::RBracket, "']'"),
            Token::LParen => self.consume_balanced(Token::LParen, Token::RParen, "')'"),
            Token::Colon => {
                self.advance();
                self.eat(Token::Colon);
                match self.peek() {
                    Token::Ident(_) | Token::Interpolation(_) => {
                        self.advance();
                    }
                    _ => return Err(self.error_here("pseudo-class name")),
                }
                if self.check(Token::LParen) {
                    self.consume_balanced(Token::LParen, Token::RParen, "')'")?;
                }
                Ok(())
            }
            Token::Ident(_)
            | Token::Dot
            | Token::Hash(_)
            | Token::Star
            | Token::Amp
            | Token::Interpolation(_)
            | Token::Number(_)
            | Token::Percent
            | Token::Minus
            | Token::Pipe => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error_here("selector")),
        }
    }

    // ---------------------------------------------------------------------
    // Declarations and variables
    // ---------------------------------------------------------------------

    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        let start = self.peek_span().start;

        while !matches!(
            self.peek(),
            Token::Colon | Token::Semi | Token::RBrace | Token::LBrace | Token::Eof
        ) {
            self.advance();
        }
        let property = self.slice(start, self.peek_span().start).trim().to_string();
        if property.is_empty() {
            return Err(self.error_here("property name"));
        }
        self.expect(Token::Colon, "':'")?;

        if property.starts_with("--") {
            let value = self.parse_raw_value()?;
            self.end_statement()?;
            return Ok(Declaration {
                property,
                value,
                important: false,
                span: Span::new(start, self.prev_end()),
            });
        }

        self.skip_trivia();
        if self.at_value_end() {
            return Err(self.error_here("value"));
        }
        let value = self.parse_value_list()?;
        self.skip_trivia();
        let important = self.eat(Token::Important);
        let end = self.prev_end();
        self.skip_trivia();
        self.end_statement()?;

        Ok(Declaration {
            property,
            value,
            important,
            span: Span::new(start, end),
        })
    }

    /// Custom property values are kept verbatim
    fn parse_raw_value(&mut self) -> ParseResult<Expression> {
        let start = self.peek_span().start;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::RBrace if depth > 0 => depth -= 1,
                Token::Semi | Token::RBrace if depth == 0 => break,
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }
        let end = self.peek_span().start;
        Ok(Expression::Keyword {
            value: self.slice(start, end).trim().to_string(),
            span: Span::new(start, end),
        })
    }

    fn parse_variable_def(&mut self) -> ParseResult<VariableDef> {
        let token = self.advance();
        let name = match token.token {
            Token::AtKeyword(name) => name[1..].to_string(),
            _ => return Err(ParseError::unexpected_token(token.span, "variable", token.token.to_string())),
        };
        self.skip_trivia();
        self.expect(Token::Colon, "':'")?;
        self.skip_trivia();
        if self.at_value_end() {
            return Err(self.error_here("value"));
        }
        let value = self.parse_value_list()?;
        let end = self.prev_end();
        self.skip_trivia();
        self.end_statement()?;

        Ok(VariableDef {
            name,
            value,
            span: Span::new(token.span.start, end),
        })
    }

    // ---------------------------------------------------------------------
    // Mixins
    // ---------------------------------------------------------------------

    /// `.name(` ... `)` followed by a block or a guard
    fn is_mixin_definition(&self) -> bool {
        let open = match (self.token_at(self.pos), self.token_at(self.pos + 1)) {
            (Token::Dot, Token::Ident(_)) => self.pos + 2,
            (Token::Hash(_), _) => self.pos + 1,
            _ => return false,
        };
        if self.token_at(open) != Token::LParen {
            return false;
        }

        let Some(close) = self.matching_close(open) else {
            return false;
        };
        matches!(
            self.token_at(self.next_significant(close + 1)),
            Token::LBrace | Token::Ident("when")
        )
    }

    fn parse_mixin_def(&mut self) -> ParseResult<MixinDef> {
        let start = self.peek_span().start;
        let name = self.parse_mixin_name()?;

        self.expect(Token::LParen, "'('")?;
        let params = self.parse_mixin_params()?;
        self.expect(Token::RParen, "')'")?;
        self.skip_trivia();
        let guard = if self.check(Token::Ident("when")) {
            let guard = self.parse_guard()?;
            self.skip_trivia();
            Some(guard)
        } else {
            None
        };
        let rules = self.parse_block()?;

        Ok(MixinDef {
            name,
            params,
            guard,
            rules,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// `when` followed by `,`-separated alternatives of `and`-joined conditions
    fn parse_guard(&mut self) -> ParseResult<Guard> {
        let start = self.advance().span.start;
        let mut alternatives = Vec::new();

        loop {
            let mut conditions = vec![self.parse_condition()?];
            loop {
                let save = self.pos;
                self.skip_trivia();
                if self.eat(Token::Ident("and")) {
                    conditions.push(self.parse_condition()?);
                } else {
                    self.pos = save;
                    break;
                }
            }
            alternatives.push(conditions);

            self.skip_trivia();
            if !self.eat(Token::Comma) {
                break;
            }
        }

        Ok(Guard {
            alternatives,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// `[not] (left [op right])`
    fn parse_condition(&mut self) -> ParseResult<Condition> {
        self.skip_trivia();
        let start = self.peek_span().start;
        let negated = self.eat(Token::Ident("not"));
        self.skip_trivia();
        self.expect(Token::LParen, "'('")?;
        self.paren_depth += 1;
        self.skip_trivia();
        let left = self.parse_additive()?;
        self.skip_trivia();

        let op = match (self.peek(), self.token_at(self.pos + 1)) {
            (Token::Gt, Token::Eq) => Some((CompareOp::Ge, 2)),
            (Token::Gt, _) => Some((CompareOp::Gt, 1)),
            (Token::Eq, Token::Lt) | (Token::Lt, Token::Eq) => Some((CompareOp::Le, 2)),
            (Token::Lt, _) => Some((CompareOp::Lt, 1)),
            (Token::Eq, _) => Some((CompareOp::Eq, 1)),
            _ => None,
        };
        let comparison = match op {
            Some((op, width)) => {
                for _ in 0..width {
                    self.advance();
                }
                self.skip_trivia();
                Some((op, self.parse_additive()?))
            }
            None => None,
        };

        self.skip_trivia();
        self.expect(Token::RParen, "')'")?;
        self.paren_depth -= 1;

        Ok(Condition {
            negated,
            left,
            comparison,
            span: Span::new(start, self.prev_end()),
        })
    }

    fn parse_mixin_name(&mut self) -> ParseResult<String> {
        match self.peek() {
            Token::Dot => {
                self.advance();
                match self.peek() {
                    Token::Ident(name) => {
                        self.advance();
                        Ok(format!(".{}", name))
                    }
                    _ => Err(self.error_here("mixin name")),
                }
            }
            Token::Hash(name) => {
                self.advance();
                Ok(name.to_string())
            }
            _ => Err(self.error_here("mixin name")),
        }
    }

    fn parse_mixin_params(&mut self) -> ParseResult<Vec<MixinParam>> {
        let semicolons = self.has_top_level_semicolon();
        let separator = if semicolons { Token::Semi } else { Token::Comma };
        let mut params = Vec::new();

        self.paren_depth += 1;
        self.skip_trivia();
        while !self.check(Token::RParen) {
            let param = match self.peek() {
                Token::Ellipsis => {
                    self.advance();
                    MixinParam::Variadic { name: None }
                }
                Token::AtKeyword(name) => {
                    self.advance();
                    let name = name[1..].to_string();
                    if self.eat(Token::Ellipsis) {
                        MixinParam::Variadic { name: Some(name) }
                    } else {
                        self.skip_trivia();
                        let default = if self.eat(Token::Colon) {
                            self.skip_trivia();
                            Some(self.parse_argument_value(semicolons)?)
                        } else {
                            None
                        };
                        MixinParam::Named { name, default }
                    }
                }
                _ => MixinParam::Pattern(self.parse_argument_value(semicolons)?),
            };
            params.push(param);

            self.skip_trivia();
            if !self.eat(separator) {
                break;
            }
            self.skip_trivia();
        }
        self.paren_depth -= 1;

        Ok(params)
    }

    fn parse_mixin_call(&mut self) -> ParseResult<MixinCall> {
        let start = self.peek_span().start;
        let mut path = vec![self.parse_mixin_name()?];

        loop {
            let save = self.pos;
            self.skip_trivia();
            if self.eat(Token::Gt) {
                self.skip_trivia();
            }
            if matches!(self.peek(), Token::Dot | Token::Hash(_)) {
                path.push(self.parse_mixin_name()?);
            } else {
                self.pos = save;
                break;
            }
        }

        self.skip_trivia();
        let args = if self.eat(Token::LParen) {
            let args = self.parse_mixin_args()?;
            self.expect(Token::RParen, "')'")?;
            args
        } else {
            Vec::new()
        };

        self.skip_trivia();
        let important = self.eat(Token::Important);
        let end = self.prev_end();
        self.skip_trivia();
        self.end_statement()?;

        Ok(MixinCall {
            path,
            args,
            important,
            span: Span::new(start, end),
        })
    }

    fn parse_mixin_args(&mut self) -> ParseResult<Vec<MixinArg>> {
        let semicolons = self.has_top_level_semicolon();
        let separator = if semicolons { Token::Semi } else { Token::Comma };
        let mut args = Vec::new();

        self.paren_depth += 1;
        self.skip_trivia();
        while !self.check(Token::RParen) {
            let name = match self.peek() {
                Token::AtKeyword(name)
                    if self.token_at(self.next_significant(self.pos + 1)) == Token::Colon =>
                {
                    self.advance();
                    self.skip_trivia();
                    self.advance();
                    self.skip_trivia();
                    Some(name[1..].to_string())
                }
                _ => None,
            };
            let value = self.parse_argument_value(semicolons)?;
            args.push(MixinArg { name, value });

            self.skip_trivia();
            if !self.eat(separator) {
                break;
            }
            self.skip_trivia();
        }
        self.paren_depth -= 1;

        Ok(args)
    }

    /// With `;` separators an argument may itself be a comma list
    fn parse_argument_value(&mut self, semicolons: bool) -> ParseResult<Expression> {
        if semicolons {
            self.parse_value_list()
        } else {
            self.parse_space_list()
        }
    }

    /// Whether the parenthesized list starting at the current token uses `;`
    fn has_top_level_semicolon(&self) -> bool {
        let mut depth = 0usize;
        for t in &self.tokens[self.pos..] {
            match t.token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::Semi if depth == 0 => return true,
                _ => {}
            }
        }
        false
    }

    // ---------------------------------------------------------------------
    // At-rules
    // ---------------------------------------------------------------------

    fn parse_at_rule(&mut self) -> ParseResult<AtRule> {
        let token = self.advance();
        let name = match token.token {
            Token::AtKeyword(name) => name[1..].to_string(),
            _ => return Err(ParseError::unexpected_token(token.span, "at-rule", token.token.to_string())),
        };

        let prelude_start = self.peek_span().start;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::LBrace | Token::Semi | Token::RBrace if depth == 0 => break,
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }
        let prelude = self
            .slice(prelude_start, self.peek_span().start)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let body = match self.peek() {
            Token::LBrace if at_rule_kind(&name) == AtRuleKind::Opaque => {
                let open = self.advance().span;
                let mut depth = 1usize;
                loop {
                    match self.peek() {
                        Token::LBrace => depth += 1,
                        Token::RBrace => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        Token::Eof => return Err(self.error_here("'}'")),
                        _ => {}
                    }
                    self.advance();
                }
                let raw = self.slice(open.end, self.peek_span().start).trim().to_string();
                self.advance();
                AtRuleBody::Raw(raw)
            }
            Token::LBrace => AtRuleBody::Rules(self.parse_block()?),
            Token::Semi => {
                self.advance();
                AtRuleBody::Statement
            }
            _ => AtRuleBody::Statement,
        };

        Ok(AtRule {
            name,
            prelude,
            body,
            span: Span::new(token.span.start, self.prev_end()),
        })
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    fn parse_value_list(&mut self) -> ParseResult<Expression> {
        let first = self.parse_space_list()?;
        let mut items = vec![first];

        loop {
            let save = self.pos;
            self.skip_trivia();
            if !self.eat(Token::Comma) {
                self.pos = save;
                break;
            }
            self.skip_trivia();
            items.push(self.parse_space_list()?);
        }

        Ok(Self::list(items, ListSeparator::Comma))
    }

    fn parse_space_list(&mut self) -> ParseResult<Expression> {
        let first = self.parse_additive()?;
        let mut items = vec![first];

        loop {
            let save = self.pos;
            self.skip_trivia();
            if self.at_value_end() {
                self.pos = save;
                break;
            }
            items.push(self.parse_additive()?);
        }

        Ok(Self::list(items, ListSeparator::Space))
    }

    fn list(mut items: Vec<Expression>, separator: ListSeparator) -> Expression {
        if items.len() == 1 {
            return items.remove(0);
        }
        let span = items[0].span().to(items[items.len() - 1].span());
        Expression::List {
            items,
            separator,
            span,
        }
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;
        let mut combined = false;

        loop {
            let save = self.pos;
            let ws_before = self.skip_trivia();
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => {
                    let ws_after = self.token_at(self.pos + 1).is_trivia();
                    if ws_before && !ws_after {
                        // `0 -5px` is a list of two values
                        self.pos = save;
                        break;
                    }
                    BinaryOp::Subtract
                }
                _ => {
                    self.pos = save;
                    break;
                }
            };
            self.advance();
            self.skip_trivia();
            let right = self.parse_multiplicative()?;
            let span = left.span().to(right.span());
            left = Expression::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
            combined = true;
        }

        // `font: 12px/1.5`, `font: 14px/@line-height`, `grid-area: 1 / 3`
        // stay as written when nothing else is computed around them
        if !combined && self.paren_depth == 0 && is_literal_ratio(&left) {
            left = into_slash(left);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let save = self.pos;
            self.skip_trivia();
            match self.peek() {
                Token::Star => {
                    self.advance();
                    self.skip_trivia();
                    let right = self.parse_unary()?;
                    let span = left.span().to(right.span());
                    left = Expression::Binary {
                        op: BinaryOp::Multiply,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    };
                }
                Token::Slash => {
                    self.advance();
                    self.skip_trivia();
                    let right = self.parse_unary()?;
                    let span = left.span().to(right.span());
                    left = Expression::Binary {
                        op: BinaryOp::Divide,
                        left: Box::new(left),
                        right: Box::new(right),
                        span,
                    };
                }
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if !self.check(Token::Minus) {
            return self.parse_primary();
        }

        let start = self.advance().span.start;
        if let Token::Number(text) = self.peek() {
            let token = self.advance();
            let (value, unit) = self.split_number(text, token.span)?;
            return Ok(Expression::Number {
                value: -value,
                unit,
                span: Span::new(start, token.span.end),
            });
        }

        self.skip_trivia();
        let operand = self.parse_primary()?;
        let span = Span::new(start, operand.span().end);
        Ok(Expression::Negate {
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let span = self.peek_span();

        match self.peek() {
            Token::LParen => {
                self.enter()?;
                self.advance();
                self.paren_depth += 1;
                self.skip_trivia();
                let inner = self.parse_value_list()?;
                self.skip_trivia();
                self.expect(Token::RParen, "')'")?;
                self.paren_depth -= 1;
                self.leave();
                Ok(Expression::Paren {
                    inner: Box::new(inner),
                    span: Span::new(span.start, self.prev_end()),
                })
            }
            Token::Number(text) => {
                self.advance();
                let (value, unit) = self.split_number(text, span)?;
                Ok(Expression::Number { value, unit, span })
            }
            Token::Hash(text) => {
                self.advance();
                if is_hex_color(text) {
                    Ok(Expression::Color {
                        hex: text.to_string(),
                        span,
                    })
                } else {
                    Ok(Expression::Keyword {
                        value: text.to_string(),
                        span,
                    })
                }
            }
            Token::String(text) => {
                self.advance();
                Ok(Self::string(text, false, span))
            }
            Token::Tilde => {
                self.advance();
                match self.peek() {
                    Token::String(text) => {
                        let end = self.advance().span.end;
                        Ok(Self::string(text, true, Span::new(span.start, end)))
                    }
                    _ => Err(self.error_here("string after '~'")),
                }
            }
            Token::Url(text) => {
                self.advance();
                Ok(Expression::Url {
                    value: text.to_string(),
                    span,
                })
            }
            Token::AtKeyword(name) => {
                self.advance();
                Ok(Expression::Variable {
                    name: name[1..].to_string(),
                    span,
                })
            }
            Token::VariableVariable(name) => {
                self.advance();
                Ok(Expression::VariableVariable {
                    name: name[2..].to_string(),
                    span,
                })
            }
            Token::Ident(name) => {
                self.advance();
                if name.eq_ignore_ascii_case("alpha") && self.at_alpha_filter() {
                    return self.parse_alpha(span.start);
                }
                if name.eq_ignore_ascii_case("u") && self.check(Token::Plus) {
                    return Ok(self.parse_unicode_range(span.start));
                }
                if self.check(Token::LParen) {
                    self.parse_call(name, span.start)
                } else {
                    Ok(Expression::Keyword {
                        value: name.to_string(),
                        span,
                    })
                }
            }
            Token::Percent if self.token_at(self.pos + 1) == Token::LParen => {
                self.advance();
                self.parse_call("%", span.start)
            }
            _ => Err(self.error_here("value")),
        }
    }

    fn parse_call(&mut self, name: &str, start: usize) -> ParseResult<Expression> {
        self.enter()?;
        self.expect(Token::LParen, "'('")?;
        self.paren_depth += 1;

        let mut args = Vec::new();
        self.skip_trivia();
        if !self.check(Token::RParen) {
            loop {
                self.skip_trivia();
                args.push(self.parse_space_list()?);
                self.skip_trivia();
                if !self.eat(Token::Comma) {
                    break;
                }
            }
        }
        self.skip_trivia();
        self.expect(Token::RParen, "')'")?;
        self.paren_depth -= 1;
        self.leave();

        Ok(Expression::Call {
            name: name.to_string(),
            args,
            span: Span::new(start, self.prev_end()),
        })
    }

    /// After `alpha`: `(opacity=`
    fn at_alpha_filter(&self) -> bool {
        if !self.check(Token::LParen) {
            return false;
        }
        let name = self.next_significant(self.pos + 1);
        matches!(self.token_at(name), Token::Ident(n) if n.eq_ignore_ascii_case("opacity"))
            && self.token_at(self.next_significant(name + 1)) == Token::Eq
    }

    /// `alpha(opacity=50)`, the old IE filter syntax
    fn parse_alpha(&mut self, start: usize) -> ParseResult<Expression> {
        self.expect(Token::LParen, "'('")?;
        self.skip_trivia();
        self.advance();
        self.skip_trivia();
        self.expect(Token::Eq, "'='")?;
        self.skip_trivia();
        let value = match self.peek() {
            Token::Number(_) | Token::AtKeyword(_) => self.parse_primary()?,
            _ => return Err(self.error_here("opacity value")),
        };
        self.skip_trivia();
        self.expect(Token::RParen, "')'")?;

        Ok(Expression::Alpha {
            value: Box::new(value),
            span: Span::new(start, self.prev_end()),
        })
    }

    /// `U+0025-00FF`, `u+4??`, kept as written
    fn parse_unicode_range(&mut self, start: usize) -> Expression {
        while matches!(
            self.peek(),
            Token::Plus | Token::Minus | Token::Number(_) | Token::Ident(_) | Token::Question
        ) {
            self.advance();
        }
        let end = self.prev_end();
        Expression::Keyword {
            value: self.slice(start, end).to_string(),
            span: Span::new(start, end),
        }
    }

    fn string(text: &str, escaped: bool, span: Span) -> Expression {
        let quote = text.chars().next().unwrap_or('"');
        Expression::String {
            value: text[1..text.len() - 1].to_string(),
            quote,
            escaped,
            span,
        }
    }

    fn split_number(&self, text: &str, span: Span) -> ParseResult<(f64, Option<String>)> {
        let idx = text
            .find(|c: char| c.is_ascii_alphabetic() || c == '%')
            .unwrap_or(text.len());
        let value = text[..idx]
            .parse::<f64>()
            .map_err(|_| ParseError::invalid_syntax(span, format!("invalid number '{}'", text)))?;
        let unit = (idx < text.len()).then(|| text[idx..].to_string());
        Ok((value, unit))
    }

    fn at_value_end(&self) -> bool {
        matches!(
            self.peek(),
            Token::Semi
                | Token::RBrace
                | Token::LBrace
                | Token::Comma
                | Token::RParen
                | Token::Important
                | Token::Bang
                | Token::Eof
        )
    }

    // ---------------------------------------------------------------------
    // Token helpers
    // ---------------------------------------------------------------------

    fn token_at(&self, idx: usize) -> Token<'src> {
        self.tokens.get(idx).map(|t| t.token).unwrap_or(Token::Eof)
    }

    fn peek(&self) -> Token<'src> {
        self.token_at(self.pos)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| Span::new(self.source.len(), self.source.len()))
    }

    fn advance(&mut self) -> SpannedToken<'src> {
        let token = SpannedToken {
            token: self.peek(),
            span: self.peek_span(),
        };
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    /// End of the last consumed token
    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn check(&self, token: Token) -> bool {
        std::mem::discriminant(&self.peek()) == std::mem::discriminant(&token)
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &str) -> ParseResult<Span> {
        if self.check(token) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(expected))
        }
    }

    fn end_statement(&mut self) -> ParseResult<()> {
        match self.peek() {
            Token::Semi => {
                self.advance();
                Ok(())
            }
            Token::RBrace | Token::Eof => Ok(()),
            _ => Err(self.error_here("';'")),
        }
    }

    fn error_here(&self, expected: &str) -> ParseError {
        match self.peek() {
            Token::Eof => ParseError::unexpected_eof(self.peek_span(), expected),
            token => ParseError::unexpected_token(self.peek_span(), expected, token.to_string()),
        }
    }

    fn skip_ws(&mut self) {
        while self.peek() == Token::Whitespace {
            self.advance();
        }
    }

    /// Skip whitespace and comments; returns whether anything was skipped
    fn skip_trivia(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_trivia() {
            self.advance();
        }
        self.pos > start
    }

    fn next_significant(&self, from: usize) -> usize {
        let mut idx = from;
        while self.token_at(idx).is_trivia() {
            idx += 1;
        }
        idx
    }

    /// Index of the token closing the bracket opened at `open`
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (idx, t) in self.tokens.iter().enumerate().skip(open) {
            match t.token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                Token::LBrace | Token::RBrace | Token::Eof => return None,
                _ => {}
            }
        }
        None
    }

    /// First `{`, `;` or `}` outside brackets, looking ahead from the current
    /// token
    fn scan_statement_end(&self) -> Token<'src> {
        let mut depth = 0usize;
        for t in &self.tokens[self.pos..] {
            match t.token {
                Token::LParen | Token::LBracket => depth += 1,
                Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
                Token::LBrace | Token::Semi | Token::RBrace if depth == 0 => return t.token,
                Token::Eof => return Token::Eof,
                _ => {}
            }
        }
        Token::Eof
    }

    fn consume_balanced(&mut self, open: Token, close: Token, expected: &str) -> ParseResult<()> {
        let mut depth = 0usize;
        loop {
            if self.check(open) {
                depth += 1;
            } else if self.check(close) {
                depth -= 1;
                if depth == 0 {
                    self.advance();
                    return Ok(());
                }
            } else if matches!(self.peek(), Token::Eof | Token::LBrace | Token::RBrace) {
                return Err(self.error_here(expected));
            }
            self.advance();
        }
    }

    fn slice(&self, start: usize, end: usize) -> &'src str {
        self.source.get(start..end.max(start)).unwrap_or("")
    }
}

/// Parse a LESS source string into a stylesheet
pub fn parse(source: &str) -> ParseResult<Stylesheet> {
    Parser::new(source)?.parse_stylesheet()
}
