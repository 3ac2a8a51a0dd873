//! Compiled predicates and the facts they are evaluated against.

use shared_types::{Identity, Region, RiskClassification, Tier, Transaction};
use std::fmt;

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
        }
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, CmpOp::Eq | CmpOp::Ne)
    }

    pub fn apply<T: Ord>(&self, lhs: T, rhs: T) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
        }
    }
}

/// A typed `field op literal` comparison.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    Amount(CmpOp, u64),
    Score(CmpOp, u64),
    Classification(CmpOp, RiskClassification),
    Tier(CmpOp, Tier),
    /// Only `==` / `!=`
    Region(CmpOp, Region),
    /// Only `==` / `!=`
    Verified(CmpOp, bool),
}

/// Boolean expression tree produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Predicate {
    Const(bool),
    Compare(Comparison),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    /// Evaluate with short-circuiting `&&` / `||`.
    pub fn eval(&self, facts: &Facts) -> bool {
        match self {
            Predicate::Const(value) => *value,
            Predicate::Compare(cmp) => facts.compare(cmp),
            Predicate::Not(inner) => !inner.eval(facts),
            Predicate::And(lhs, rhs) => lhs.eval(facts) && rhs.eval(facts),
            Predicate::Or(lhs, rhs) => lhs.eval(facts) || rhs.eval(facts),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(value) => write!(f, "{value}"),
            Predicate::Compare(cmp) => match cmp {
                Comparison::Amount(op, v) => write!(f, "amount {} {v}", op.as_str()),
                Comparison::Score(op, v) => write!(f, "score {} {v}", op.as_str()),
                Comparison::Classification(op, v) => {
                    write!(f, "classification {} {v}", op.as_str())
                }
                Comparison::Tier(op, v) => write!(f, "tier {} {v}", op.as_str()),
                Comparison::Region(op, v) => write!(f, "region {} \"{v}\"", op.as_str()),
                Comparison::Verified(op, v) => write!(f, "verified {} {v}", op.as_str()),
            },
            Predicate::Not(inner) => write!(f, "!({inner})"),
            Predicate::And(lhs, rhs) => write!(f, "({lhs} && {rhs})"),
            Predicate::Or(lhs, rhs) => write!(f, "({lhs} || {rhs})"),
        }
    }
}

/// The values a rule can observe for one evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Facts {
    pub amount: u64,
    pub score: u8,
    pub classification: RiskClassification,
    pub tier: Tier,
    pub region: Region,
    pub verified: bool,
}

impl Facts {
    pub fn new(identity: &Identity, transaction: &Transaction, score: u8) -> Self {
        Self {
            amount: transaction.amount,
            score,
            classification: RiskClassification::from_score(score),
            tier: identity.tier,
            region: transaction.region.clone(),
            verified: identity.verified,
        }
    }

    fn compare(&self, cmp: &Comparison) -> bool {
        match cmp {
            Comparison::Amount(op, v) => op.apply(self.amount, *v),
            Comparison::Score(op, v) => op.apply(u64::from(self.score), *v),
            Comparison::Classification(op, v) => op.apply(self.classification, *v),
            Comparison::Tier(op, v) => op.apply(self.tier, *v),
            Comparison::Region(op, v) => op.apply(&self.region, v),
            Comparison::Verified(op, v) => op.apply(self.verified, *v),
        }
    }
}
