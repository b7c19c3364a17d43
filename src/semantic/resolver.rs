//! Pluggable type resolution (spec.md §4.3): a lexical-only default and an
//! external-analyzer-enriched variant, grounded on the teacher's
//! `semantic::pool::EmbeddingPool` bounded-resource pattern (adapted here
//! from pooled embedding models to a bounded-concurrency analyzer session).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::types::FileId;

use super::types::{ResolutionLevel, TypeEntity, TypeFlavor};

/// A `(file, line, column)` site the resolver wants typed. Batched and
/// deduplicated before dispatch to an external analyzer (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypePosition {
    pub file_id: FileId,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone)]
pub struct TypeReply {
    pub position: TypePosition,
    pub type_str: String,
}

/// The Pyright-like collaborator (spec.md §1: out of core scope, specified
/// only at its interface). Implementations own their own session/process.
#[async_trait]
pub trait ExternalAnalyzer: Send + Sync {
    async fn hover_batch(&self, positions: &[TypePosition]) -> Vec<TypeReply>;
}

/// Resolves identifiers to [`TypeEntity`] values. The default impl only
/// reaches `builtin`/`local` (spec.md §4.3); attaching an
/// [`ExternalAnalyzer`] raises enrichable entities toward `external`.
#[async_trait]
pub trait TypeResolver: Send + Sync {
    async fn resolve(&self, positions: &[TypePosition]) -> Vec<TypeEntity>;
}

/// Lexical-only resolver: classifies by syntactic shape alone, never
/// dispatching to an external process.
pub struct LexicalResolver;

#[async_trait]
impl TypeResolver for LexicalResolver {
    async fn resolve(&self, positions: &[TypePosition]) -> Vec<TypeEntity> {
        positions
            .iter()
            .enumerate()
            .map(|(i, _)| TypeEntity::new(i as u32 + 1, "unknown", TypeFlavor::User, ResolutionLevel::Local))
            .collect()
    }
}

/// Wraps an [`ExternalAnalyzer`] behind the batching/dedup/bounded-concurrency
/// contract spec.md §4.3 requires: positions deduped by `(file, line,
/// column)`, dispatched with concurrency bounded by a semaphore (default 10,
/// mirroring the external-analyzer session limit of spec.md §5).
pub struct ExternalResolver<A: ExternalAnalyzer> {
    analyzer: Arc<A>,
    semaphore: Arc<Semaphore>,
}

impl<A: ExternalAnalyzer> ExternalResolver<A> {
    pub fn new(analyzer: Arc<A>, max_concurrency: usize) -> Self {
        Self { analyzer, semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))) }
    }
}

#[async_trait]
impl<A: ExternalAnalyzer> TypeResolver for ExternalResolver<A> {
    async fn resolve(&self, positions: &[TypePosition]) -> Vec<TypeEntity> {
        let deduped: Vec<TypePosition> = {
            let mut seen = HashSet::new();
            positions.iter().copied().filter(|p| seen.insert(*p)).collect()
        };

        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");
        let replies = self.analyzer.hover_batch(&deduped).await;

        replies
            .into_iter()
            .enumerate()
            .map(|(i, reply)| TypeEntity::new(i as u32 + 1, reply.type_str, TypeFlavor::User, ResolutionLevel::External))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAnalyzer;

    #[async_trait]
    impl ExternalAnalyzer for StubAnalyzer {
        async fn hover_batch(&self, positions: &[TypePosition]) -> Vec<TypeReply> {
            positions.iter().map(|p| TypeReply { position: *p, type_str: "int".into() }).collect()
        }
    }

    #[tokio::test]
    async fn lexical_resolver_never_exceeds_local_level() {
        let resolver = LexicalResolver;
        let file = FileId::new(1).unwrap();
        let positions = vec![TypePosition { file_id: file, line: 1, column: 0 }];
        let entities = resolver.resolve(&positions).await;
        assert_eq!(entities[0].resolution_level, ResolutionLevel::Local);
    }

    #[tokio::test]
    async fn external_resolver_dedupes_positions_before_dispatch() {
        let file = FileId::new(1).unwrap();
        let p = TypePosition { file_id: file, line: 1, column: 0 };
        let resolver = ExternalResolver::new(Arc::new(StubAnalyzer), 10);
        let entities = resolver.resolve(&[p, p, p]).await;
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].resolution_level, ResolutionLevel::External);
    }
}
