//! Intent classification (spec.md §4.9 step 1): a rule-based, weighted-regex
//! classifier producing a probability distribution over
//! `{symbol, flow, concept, code, balanced}`, budgeted at ≤10ms.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    Symbol,
    Flow,
    Concept,
    Code,
    Balanced,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Symbol => "symbol",
            Intent::Flow => "flow",
            Intent::Concept => "concept",
            Intent::Code => "code",
            Intent::Balanced => "balanced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDistribution {
    pub symbol: f64,
    pub flow: f64,
    pub concept: f64,
    pub code: f64,
    pub balanced: f64,
}

impl IntentDistribution {
    pub fn dominant(&self) -> Intent {
        let pairs = [
            (Intent::Symbol, self.symbol),
            (Intent::Flow, self.flow),
            (Intent::Concept, self.concept),
            (Intent::Code, self.code),
            (Intent::Balanced, self.balanced),
        ];
        pairs
            .into_iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(intent, _)| intent)
            .unwrap_or(Intent::Balanced)
    }

    pub fn probability_of(&self, intent: Intent) -> f64 {
        match intent {
            Intent::Symbol => self.symbol,
            Intent::Flow => self.flow,
            Intent::Concept => self.concept,
            Intent::Code => self.code,
            Intent::Balanced => self.balanced,
        }
    }

    fn normalize(mut self) -> Self {
        let total = self.symbol + self.flow + self.concept + self.code + self.balanced;
        if total > 0.0 {
            self.symbol /= total;
            self.flow /= total;
            self.concept /= total;
            self.code /= total;
            self.balanced /= total;
        } else {
            self.balanced = 1.0;
        }
        self
    }
}

struct Patterns {
    symbol: Vec<Regex>,
    flow: Vec<Regex>,
    code: Vec<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        symbol: vec![
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)+$").unwrap(),
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap(),
            Regex::new(r"\b[a-z]+[A-Z][A-Za-z0-9]*\b").unwrap(),
            Regex::new(r"\b[a-z][a-z0-9]*(_[a-z0-9]+)+\b").unwrap(),
            Regex::new(r"(?i)\b(class|function|enum|interface|type|def|find)\b").unwrap(),
        ],
        flow: vec![
            Regex::new(r"(?i)\bwho calls\b").unwrap(),
            Regex::new(r"(?i)\bcalled by\b").unwrap(),
            Regex::new(r"(?i)\bfrom\s+\w+\s+to\s+\w+\b").unwrap(),
            Regex::new(r"(?i)\bpipeline\b").unwrap(),
            Regex::new(r"(?i)\bdepends on\b").unwrap(),
            Regex::new(r"(?i)\bused by\b").unwrap(),
            Regex::new(r"(?i)\berror flow\b").unwrap(),
        ],
        code: vec![
            Regex::new(r"(?i)\bhow is\b.*\bimplemented\b").unwrap(),
            Regex::new(r"(?i)\b\w+ing\b").unwrap(),
        ],
    })
}

/// Rule-based weighted-regex intent classifier (spec.md §4.9: "a pluggable
/// ML or LLM backend is an allowed variant" — this is the default).
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(&self, query: &str) -> IntentDistribution {
        let p = patterns();
        let mut dist = IntentDistribution { symbol: 0.0, flow: 0.0, concept: 0.0, code: 0.0, balanced: 0.1 };

        let symbol_hits = p.symbol.iter().filter(|r| r.is_match(query)).count();
        dist.symbol += symbol_hits as f64 * 0.35;

        let flow_hits = p.flow.iter().filter(|r| r.is_match(query)).count();
        dist.flow += flow_hits as f64 * 0.5;

        let code_hits = p.code.iter().filter(|r| r.is_match(query)).count();
        dist.code += code_hits as f64 * 0.3;

        let word_count = query.split_whitespace().count();
        if word_count >= 6 && symbol_hits == 0 && flow_hits == 0 {
            dist.concept += 0.5;
        }

        if symbol_hits == 0 && flow_hits == 0 && code_hits == 0 && dist.concept == 0.0 {
            dist.balanced += 0.6;
        }

        dist.normalize()
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_symbol_query_is_symbol_dominant() {
        let dist = IntentClassifier.classify("UserService.authenticate");
        assert_eq!(dist.dominant(), Intent::Symbol);
        assert!(dist.symbol >= 0.3);
    }

    #[test]
    fn who_calls_query_is_flow_dominant() {
        let dist = IntentClassifier.classify("who calls authenticate");
        assert_eq!(dist.dominant(), Intent::Flow);
        assert!(dist.flow > 0.2);
    }

    #[test]
    fn long_free_text_query_is_concept() {
        let dist = IntentClassifier.classify("what is the overall approach to handling retries across services");
        assert_eq!(dist.dominant(), Intent::Concept);
    }
}
