//! Weighted Reciprocal Rank Fusion (spec.md §4.9 steps 5-8): rank-based,
//! scale-invariant fusion across heterogeneous strategies, with consensus
//! boosting, intent-driven non-linear weight adjustment, and a
//! query-expansion boost.

use std::collections::HashMap;

use crate::storage::{IndexSource, SearchHit};

use super::expansion::QueryExpansion;
use super::intent::{Intent, IntentDistribution};

#[derive(Debug, Clone, Copy)]
pub struct WeightProfile {
    pub vector: f64,
    pub lexical: f64,
    pub symbol: f64,
    pub graph: f64,
}

impl WeightProfile {
    fn scale(self, f: f64) -> Self {
        Self { vector: self.vector * f, lexical: self.lexical * f, symbol: self.symbol * f, graph: self.graph * f }
    }

    fn add(self, other: Self) -> Self {
        Self {
            vector: self.vector + other.vector,
            lexical: self.lexical + other.lexical,
            symbol: self.symbol + other.symbol,
            graph: self.graph + other.graph,
        }
    }

    fn renormalize(mut self) -> Self {
        let total = self.vector + self.lexical + self.symbol + self.graph;
        if total > 0.0 {
            self.vector /= total;
            self.lexical /= total;
            self.symbol /= total;
            self.graph /= total;
        }
        self
    }

    fn weight_for(self, source: IndexSource) -> f64 {
        match source {
            IndexSource::Vector => self.vector,
            IndexSource::Lexical => self.lexical,
            IndexSource::Symbol | IndexSource::Fuzzy => self.symbol,
            IndexSource::Graph => self.graph,
            IndexSource::Domain => self.lexical,
        }
    }
}

/// Baseline weight profiles (spec.md §4.9's table).
fn profile_for(intent: Intent) -> WeightProfile {
    match intent {
        Intent::Symbol => WeightProfile { vector: 0.20, lexical: 0.10, symbol: 0.40, graph: 0.30 },
        Intent::Flow => WeightProfile { vector: 0.20, lexical: 0.10, symbol: 0.20, graph: 0.50 },
        Intent::Concept => WeightProfile { vector: 0.40, lexical: 0.20, symbol: 0.10, graph: 0.30 },
        Intent::Code => WeightProfile { vector: 0.30, lexical: 0.30, symbol: 0.20, graph: 0.20 },
        Intent::Balanced => WeightProfile { vector: 0.25, lexical: 0.25, symbol: 0.25, graph: 0.25 },
    }
}

/// Blends per-intent profiles by the distribution's probabilities (spec.md
/// §4.9: "the active weight profile is `Σ_i P(intent_i) · profile_i`"),
/// then applies the non-linear dominant-intent boost.
pub fn active_weight_profile(dist: &IntentDistribution) -> WeightProfile {
    let blended = [Intent::Symbol, Intent::Flow, Intent::Concept, Intent::Code, Intent::Balanced]
        .into_iter()
        .fold(WeightProfile { vector: 0.0, lexical: 0.0, symbol: 0.0, graph: 0.0 }, |acc, intent| {
            acc.add(profile_for(intent).scale(dist.probability_of(intent)))
        });

    let dominant = dist.dominant();
    let boosted = match dominant {
        Intent::Flow if dist.flow > 0.20 => WeightProfile { graph: blended.graph * 1.3, ..blended },
        Intent::Symbol if dist.symbol > 0.30 => WeightProfile { symbol: blended.symbol * 1.2, ..blended },
        _ => blended,
    };
    boosted.renormalize()
}

/// Strategy-specific smoothing constant (spec.md §4.9: "70 for
/// vector/lexical, 50 for symbol/graph").
fn k_for(source: IndexSource) -> f64 {
    match source {
        IndexSource::Vector | IndexSource::Lexical | IndexSource::Domain => 70.0,
        IndexSource::Symbol | IndexSource::Fuzzy | IndexSource::Graph => 50.0,
    }
}

fn consensus_boost(m: usize) -> f64 {
    match m {
        0 | 1 => 1.0,
        2 => 1.13,
        3 => 1.22,
        _ => 1.30,
    }
}

/// Pulls a chunk's symbol/fqn terms out of its `SearchHit.metadata` (spec.md
/// §4.9 step 8's boost fires on a symbol occurring in the chunk's symbol id,
/// not the opaque content-hash chunk id the adapters assign).
fn symbol_terms(metadata: &serde_json::Value) -> Vec<String> {
    ["fqn", "name", "identifier"]
        .iter()
        .filter_map(|key| metadata.get(key).and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}

#[derive(Debug, Clone)]
pub struct FusedHit {
    pub chunk_id: String,
    pub score: f64,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub sources: Vec<IndexSource>,
}

/// Strategy results joined in an intent-stable order (spec.md §5: "vector →
/// lexical → symbol → graph") before fusion, for deterministic tie-breaking.
pub fn fuse(
    strategy_results: &[(IndexSource, Vec<SearchHit>)],
    profile: WeightProfile,
    expansion: &QueryExpansion,
) -> Vec<FusedHit> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    let mut sources: HashMap<String, Vec<IndexSource>> = HashMap::new();
    let mut meta: HashMap<String, (String, u32, u32, Vec<String>)> = HashMap::new();

    let ordered = [IndexSource::Vector, IndexSource::Lexical, IndexSource::Symbol, IndexSource::Graph, IndexSource::Fuzzy, IndexSource::Domain];
    for source in ordered {
        let Some((_, hits)) = strategy_results.iter().find(|(s, _)| *s == source) else { continue };
        let w = profile.weight_for(source);
        if w <= 0.0 {
            continue;
        }
        let k = k_for(source);
        for (rank, hit) in hits.iter().enumerate() {
            *scores.entry(hit.chunk_id.clone()).or_insert(0.0) += w / (k + rank as f64);
            sources.entry(hit.chunk_id.clone()).or_default().push(source);
            meta.entry(hit.chunk_id.clone())
                .or_insert_with(|| (hit.file_path.clone(), hit.start_line, hit.end_line, symbol_terms(&hit.metadata)));
        }
    }

    let mut fused: Vec<FusedHit> = scores
        .into_iter()
        .map(|(chunk_id, mut score)| {
            let m = sources.get(&chunk_id).map(|v| v.len()).unwrap_or(1);
            score *= consensus_boost(m);

            let expansion_hit = expansion.symbols.iter().any(|s| {
                meta.get(&chunk_id).map(|(_, _, _, terms)| terms.iter().any(|t| t.contains(s.as_str()))).unwrap_or(false)
            }) || expansion.paths.iter().any(|p| meta.get(&chunk_id).map(|(fp, _, _, _)| fp.contains(p.as_str())).unwrap_or(false))
                || expansion.modules.iter().any(|m| meta.get(&chunk_id).map(|(fp, _, _, _)| fp.contains(m.as_str())).unwrap_or(false));
            if expansion_hit {
                score *= 1.1;
            }

            let (file_path, start_line, end_line, _) = meta.get(&chunk_id).cloned().unwrap_or_default();
            FusedHit {
                chunk_id,
                score,
                file_path,
                start_line,
                end_line,
                sources: sources.remove(&chunk_id).unwrap_or_default(),
            }
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(chunk_id: &str, source: IndexSource) -> SearchHit {
        SearchHit {
            chunk_id: chunk_id.into(),
            source,
            score: 1.0,
            file_path: "a.rs".into(),
            start_line: 0,
            end_line: 1,
            metadata: serde_json::Value::Null,
        }
    }

    fn hit_with_fqn(chunk_id: &str, source: IndexSource, fqn: &str) -> SearchHit {
        SearchHit { metadata: serde_json::json!({ "fqn": fqn }), ..hit(chunk_id, source) }
    }

    #[test]
    fn adding_a_strategy_strictly_increases_score() {
        let dist = IntentDistribution { symbol: 0.2, flow: 0.2, concept: 0.2, code: 0.2, balanced: 0.2 };
        let profile = active_weight_profile(&dist);
        let expansion = QueryExpansion::default();

        let without = fuse(&[(IndexSource::Lexical, vec![hit("c1", IndexSource::Lexical)])], profile, &expansion);
        let with = fuse(
            &[
                (IndexSource::Lexical, vec![hit("c1", IndexSource::Lexical)]),
                (IndexSource::Vector, vec![hit("c1", IndexSource::Vector)]),
            ],
            profile,
            &expansion,
        );
        let before = without.iter().find(|h| h.chunk_id == "c1").unwrap().score;
        let after = with.iter().find(|h| h.chunk_id == "c1").unwrap().score;
        assert!(after > before);
    }

    #[test]
    fn consensus_boost_matches_documented_ratio() {
        let dist = IntentDistribution { symbol: 0.25, flow: 0.25, concept: 0.25, code: 0.25, balanced: 0.0 };
        let profile = active_weight_profile(&dist);
        let expansion = QueryExpansion::default();
        let double = fuse(
            &[
                (IndexSource::Lexical, vec![hit("c1", IndexSource::Lexical)]),
                (IndexSource::Vector, vec![hit("c1", IndexSource::Vector)]),
            ],
            profile,
            &expansion,
        );
        let raw_unboosted = profile.weight_for(IndexSource::Lexical) / 70.0 + profile.weight_for(IndexSource::Vector) / 70.0;
        let expected = raw_unboosted * consensus_boost(2);
        assert!((double[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn expansion_boost_matches_on_symbol_fqn_not_chunk_id() {
        let dist = IntentDistribution { symbol: 0.2, flow: 0.2, concept: 0.2, code: 0.2, balanced: 0.2 };
        let profile = active_weight_profile(&dist);
        let mut expansion = QueryExpansion::default();
        expansion.symbols.push("UserService".to_string());

        // The chunk id carries no trace of the symbol name, so a match can
        // only come from the hit's metadata fqn.
        let hits = vec![hit_with_fqn("blob-9f1c", IndexSource::Symbol, "auth::UserService::login")];
        let boosted = fuse(&[(IndexSource::Symbol, hits)], profile, &expansion);

        let unboosted = fuse(&[(IndexSource::Symbol, vec![hit("blob-9f1c", IndexSource::Symbol)])], profile, &QueryExpansion::default());

        assert!(boosted[0].score > unboosted[0].score);
    }

    #[test]
    fn flow_dominant_boosts_graph_weight() {
        let dist = IntentDistribution { symbol: 0.05, flow: 0.8, concept: 0.05, code: 0.05, balanced: 0.05 };
        let boosted = active_weight_profile(&dist);
        let linear_graph_share = profile_for(Intent::Flow).graph;
        assert!(boosted.graph > linear_graph_share * 0.9);
    }
}
