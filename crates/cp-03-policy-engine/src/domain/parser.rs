//! Recursive-descent parser for the rule language.
//!
//! ```text
//! expr       := or
//! or         := and (("||" | "or") and)*
//! and        := unary (("&&" | "and") unary)*
//! unary      := ("!" | "not") unary | "(" expr ")" | "true" | "false" | comparison
//! comparison := field op literal | "verified"
//! field      := amount | score | classification | tier | region | verified
//! op         := == != > >= < <=
//! ```
//!
//! Type checking happens during parsing: a rule that parses is a rule that
//! can be evaluated against any [`Facts`](super::predicate::Facts).

use super::lexer::{tokenize, Token};
use super::predicate::{CmpOp, Comparison, Predicate};
use shared_types::{Region, RiskClassification, Tier};

/// Nesting limit for `!` and parentheses.
const MAX_DEPTH: usize = 64;

/// Compile a rule into a predicate. Errors are human-readable reasons.
pub fn parse_rule(input: &str) -> Result<Predicate, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("rule is empty".into());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let predicate = parser.parse_or()?;
    match parser.peek() {
        None => Ok(predicate),
        Some(token) => Err(format!("unexpected {} after complete expression", token.describe())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Predicate, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Predicate, String> {
        let mut lhs = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Predicate, String> {
        match self.next() {
            Some(Token::Not) => {
                let inner = self.nested(Self::parse_unary)?;
                Ok(Predicate::Not(Box::new(inner)))
            }
            Some(Token::LParen) => {
                let inner = self.nested(Self::parse_or)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(format!("expected ')' but found {}", token.describe())),
                    None => Err("unbalanced parentheses: missing ')'".into()),
                }
            }
            Some(Token::True) => Ok(Predicate::Const(true)),
            Some(Token::False) => Ok(Predicate::Const(false)),
            Some(Token::Ident(field)) => self.parse_comparison(&field),
            Some(token) => Err(format!("unexpected {}", token.describe())),
            None => Err("unexpected end of rule".into()),
        }
    }

    fn nested(
        &mut self,
        f: fn(&mut Self) -> Result<Predicate, String>,
    ) -> Result<Predicate, String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(format!("rule nested deeper than {MAX_DEPTH} levels"));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_comparison(&mut self, field: &str) -> Result<Predicate, String> {
        let field = field.to_ascii_lowercase();
        if !matches!(
            field.as_str(),
            "amount" | "score" | "classification" | "tier" | "region" | "verified"
        ) {
            return Err(format!("unknown field '{field}'"));
        }

        // A bare `verified` reads as `verified == true`.
        if field == "verified" && !matches!(self.peek(), Some(Token::Cmp(_))) {
            return Ok(Predicate::Compare(Comparison::Verified(CmpOp::Eq, true)));
        }

        let op = match self.next() {
            Some(Token::Cmp(op)) => op,
            Some(token) => {
                return Err(format!(
                    "expected comparison operator after '{field}' but found {}",
                    token.describe()
                ))
            }
            None => return Err(format!("expected comparison operator after '{field}'")),
        };
        let literal = self
            .next()
            .ok_or_else(|| format!("expected value after '{field} {}'", op.as_str()))?;

        let comparison = match field.as_str() {
            "amount" => Comparison::Amount(op, expect_int(&field, literal)?),
            "score" => Comparison::Score(op, expect_int(&field, literal)?),
            "classification" => {
                let name = expect_word(&field, literal)?;
                Comparison::Classification(op, name.parse::<RiskClassification>()?)
            }
            "tier" => {
                let name = expect_word(&field, literal)?;
                Comparison::Tier(op, name.parse::<Tier>()?)
            }
            "region" => {
                require_equality(&field, op)?;
                let name = expect_word(&field, literal)?;
                let region = Region::new(&name);
                if region.is_empty() {
                    return Err("region literal must not be empty".into());
                }
                Comparison::Region(op, region)
            }
            _ => {
                require_equality(&field, op)?;
                let value = match literal {
                    Token::True => true,
                    Token::False => false,
                    other => {
                        return Err(format!(
                            "'verified' compares against true/false, found {}",
                            other.describe()
                        ))
                    }
                };
                Comparison::Verified(op, value)
            }
        };

        Ok(Predicate::Compare(comparison))
    }
}

fn expect_int(field: &str, token: Token) -> Result<u64, String> {
    match token {
        Token::Int(value) => Ok(value),
        other => Err(format!(
            "'{field}' compares against an integer, found {}",
            other.describe()
        )),
    }
}

fn expect_word(field: &str, token: Token) -> Result<String, String> {
    match token {
        Token::Ident(word) | Token::Str(word) => Ok(word),
        other => Err(format!(
            "'{field}' compares against a name, found {}",
            other.describe()
        )),
    }
}

fn require_equality(field: &str, op: CmpOp) -> Result<(), String> {
    if op.is_equality() {
        Ok(())
    } else {
        Err(format!("operator '{}' not supported for '{field}'", op.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::predicate::Facts;

    fn facts() -> Facts {
        Facts {
            amount: 250_000,
            score: 92,
            classification: RiskClassification::Critical,
            tier: Tier::Verified,
            region: Region::new("nairobi"),
            verified: true,
        }
    }

    fn eval(rule: &str) -> bool {
        parse_rule(rule).unwrap().eval(&facts())
    }

    #[test]
    fn test_comparisons() {
        assert!(eval("amount > 100000"));
        assert!(eval("score >= 90"));
        assert!(eval("classification == critical"));
        assert!(eval("classification > high"));
        assert!(!eval("classification > critical"));
        assert!(eval("classification >= high"));
        assert!(eval("tier >= verified"));
        assert!(eval("tier < premium"));
        assert!(eval("region == nairobi"));
        assert!(eval("region != \"mombasa\""));
        assert!(eval("verified == true"));
    }

    #[test]
    fn test_precedence_and_over_or() {
        // false && false || true
        assert!(eval("amount < 10 && score < 10 || tier == verified"));
        // false && (false || true)
        assert!(!eval("amount < 10 && (score < 10 || tier == verified)"));
    }

    #[test]
    fn test_negation_and_keywords() {
        assert!(eval("not verified == false"));
        assert!(eval("!(amount < 10) and true"));
        assert!(!eval("false or NOT true"));
    }

    #[test]
    fn test_bare_verified_flag() {
        assert!(eval("verified"));
        assert!(!eval("!verified"));
        assert!(!eval("amount > 1000 && not verified"));
        assert!(eval("(verified) || false"));
        let unverified = Facts { verified: false, ..facts() };
        assert!(parse_rule("amount > 1000000 && !verified")
            .unwrap()
            .eval(&Facts { amount: 2_000_000, ..unverified }));
        assert!(parse_rule("verified true").is_err());
    }

    #[test]
    fn test_type_errors() {
        assert!(parse_rule("amount > high").is_err());
        assert!(parse_rule("tier == gold").is_err());
        assert!(parse_rule("region > nairobi").is_err());
        assert!(parse_rule("verified >= true").is_err());
        assert!(parse_rule("verified == 1").is_err());
        assert!(parse_rule("balance > 5").is_err());
        assert!(parse_rule("amount").is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse_rule("").unwrap_err(), "rule is empty");
        assert!(parse_rule("(amount > 5").unwrap_err().contains("missing ')'"));
        assert!(parse_rule("amount > 5)").is_err());
        assert!(parse_rule("amount >").is_err());
        assert!(parse_rule("amount 5").is_err());
        assert!(parse_rule("&& amount > 5").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}true{}", "(".repeat(100), ")".repeat(100));
        assert!(parse_rule(&deep).unwrap_err().contains("nested deeper"));
    }

    proptest::proptest! {
        #[test]
        fn prop_arbitrary_input_never_panics(input in ".{0,64}") {
            let _ = parse_rule(&input);
        }

        #[test]
        fn prop_amount_threshold_matches_numeric_compare(limit in 0u64..1_000_000, amount in 0u64..1_000_000) {
            let rule = parse_rule(&format!("amount > {limit}")).unwrap();
            let facts = Facts { amount, ..facts() };
            proptest::prop_assert_eq!(rule.eval(&facts), amount > limit);
        }
    }
}
