pub mod error;
pub mod evaluator;
pub mod functions;
pub mod resolver;
pub mod scope;
pub mod value;

#[cfg(test)]
mod tests_expressions;

#[cfg(test)]
mod tests_mixins;

#[cfg(test)]
mod tests_resolver;

pub use error::{EvalError, EvalResult};
pub use evaluator::{
    evaluate, Block, BodyItem, EvaluatedAtRule, EvaluatedAtRuleBody, EvaluatedDeclaration,
    EvaluatedNode, EvaluatedRuleset, EvaluatedStylesheet, Evaluator, MAX_MIXIN_DEPTH,
};
pub use resolver::{
    combine_selectors, resolve, CssAtRule, CssAtRuleBody, CssNode, CssRule, ResolvedStylesheet,
};
pub use scope::Scope;
pub use value::{Color, Value};
