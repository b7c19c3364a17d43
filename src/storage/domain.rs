//! Domain adapter (spec.md §4.7): full-text index over documentation
//! content, tagged by doc-type, grounded on the teacher's `documents`
//! module (`DocumentStore` over a Tantivy full-text schema).

use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Schema, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::error::StoreError;
use crate::types::SnapshotId;

use super::{HealthStatus, IndexAdapter, IndexDocument, IndexSource, SearchHit};

const WRITER_HEAP_BYTES: usize = 30_000_000;

fn scope_key(repo_id: &str, snapshot_id: SnapshotId) -> String {
    format!("{repo_id}:{snapshot_id}")
}

struct Fields {
    chunk_id: tantivy::schema::Field,
    scope: tantivy::schema::Field,
    file_path: tantivy::schema::Field,
    start_line: tantivy::schema::Field,
    end_line: tantivy::schema::Field,
    doc_type: tantivy::schema::Field,
    content: tantivy::schema::Field,
}

pub struct DomainAdapter {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: Fields,
}

impl DomainAdapter {
    pub fn open_in_dir(path: &PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::ConnectionRefused {
            adapter: "domain",
            detail: e.to_string(),
        })?;
        let mut builder = Schema::builder();
        let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
        let scope = builder.add_text_field("scope", STRING | STORED);
        let file_path = builder.add_text_field("file_path", STRING | STORED);
        let start_line = builder.add_u64_field("start_line", STORED);
        let end_line = builder.add_u64_field("end_line", STORED);
        let doc_type = builder.add_text_field("doc_type", STRING | STORED);
        let content = builder.add_text_field("content", TEXT | STORED);
        let schema = builder.build();

        let index = Index::open_or_create(
            tantivy::directory::MmapDirectory::open(path).map_err(|e| StoreError::Tantivy {
                operation: "open_directory",
                source: e.into(),
            })?,
            schema,
        )
        .map_err(|e| StoreError::Tantivy { operation: "open_or_create", source: e })?;

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| StoreError::Tantivy { operation: "open_writer", source: e })?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| StoreError::Tantivy { operation: "build_reader", source: e })?;

        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            fields: Fields { chunk_id, scope, file_path, start_line, end_line, doc_type, content },
        })
    }
}

#[async_trait]
impl IndexAdapter for DomainAdapter {
    fn name(&self) -> &'static str {
        "domain"
    }

    async fn upsert(&self, repo_id: &str, snapshot_id: SnapshotId, docs: &[IndexDocument]) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let mut writer = self.writer.lock();
        for d in docs {
            writer.delete_term(Term::from_field_text(self.fields.chunk_id, &d.chunk_id));
            writer.add_document(doc!(
                self.fields.chunk_id => d.chunk_id.as_str(),
                self.fields.scope => scope.as_str(),
                self.fields.file_path => d.file_path.as_str(),
                self.fields.start_line => d.start_line as u64,
                self.fields.end_line => d.end_line as u64,
                self.fields.doc_type => d.doc_type.clone().unwrap_or_default(),
                self.fields.content => d.text.as_str(),
            )).map_err(|e| StoreError::Tantivy { operation: "add_document", source: e })?;
        }
        writer.commit().map_err(|e| StoreError::Tantivy { operation: "commit", source: e })?;
        Ok(())
    }

    async fn delete(&self, repo_id: &str, snapshot_id: SnapshotId) -> Result<(), StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let mut writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.fields.scope, &scope));
        writer.commit().map_err(|e| StoreError::Tantivy { operation: "commit", source: e })?;
        Ok(())
    }

    async fn copy_forward(
        &self,
        repo_id: &str,
        from_snapshot: SnapshotId,
        to_snapshot: SnapshotId,
        file_paths: &[String],
    ) -> Result<(), StoreError> {
        if file_paths.is_empty() {
            return Ok(());
        }
        let from_scope = scope_key(repo_id, from_snapshot);
        let to_scope = scope_key(repo_id, to_snapshot);

        let file_clause = BooleanQuery::new(
            file_paths
                .iter()
                .map(|p| {
                    let term = Term::from_field_text(self.fields.file_path, p);
                    let query: Box<dyn tantivy::query::Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, query)
                })
                .collect(),
        );
        let scope_term = Term::from_field_text(self.fields.scope, &from_scope);
        let scope_clause: Box<dyn tantivy::query::Query> =
            Box::new(TermQuery::new(scope_term, IndexRecordOption::Basic));
        let query = BooleanQuery::new(vec![
            (Occur::Must, scope_clause),
            (Occur::Must, Box::new(file_clause)),
        ]);

        let searcher = self.reader.searcher();
        let top = searcher
            .search(&query, &TopDocs::with_limit(usize::MAX))
            .map_err(|e| StoreError::Tantivy { operation: "search", source: e })?;

        let mut writer = self.writer.lock();
        for (_, address) in top {
            let retrieved: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| StoreError::Tantivy { operation: "fetch_doc", source: e })?;
            let chunk_id = retrieved.get_first(self.fields.chunk_id).and_then(|v| v.as_str()).unwrap_or_default();
            let file_path = retrieved.get_first(self.fields.file_path).and_then(|v| v.as_str()).unwrap_or_default();
            let start_line = retrieved.get_first(self.fields.start_line).and_then(|v| v.as_u64()).unwrap_or(0);
            let end_line = retrieved.get_first(self.fields.end_line).and_then(|v| v.as_u64()).unwrap_or(0);
            let doc_type = retrieved.get_first(self.fields.doc_type).and_then(|v| v.as_str()).unwrap_or_default();
            let content = retrieved.get_first(self.fields.content).and_then(|v| v.as_str()).unwrap_or_default();
            writer
                .add_document(doc!(
                    self.fields.chunk_id => chunk_id,
                    self.fields.scope => to_scope.as_str(),
                    self.fields.file_path => file_path,
                    self.fields.start_line => start_line,
                    self.fields.end_line => end_line,
                    self.fields.doc_type => doc_type,
                    self.fields.content => content,
                ))
                .map_err(|e| StoreError::Tantivy { operation: "add_document", source: e })?;
        }
        writer.commit().map_err(|e| StoreError::Tantivy { operation: "commit", source: e })?;
        Ok(())
    }

    async fn search(
        &self,
        repo_id: &str,
        snapshot_id: SnapshotId,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let scope = scope_key(repo_id, snapshot_id);
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.fields.content]);
        let parsed = parser
            .parse_query(query)
            .map_err(|e| StoreError::Tantivy { operation: "parse_query", source: e.into() })?;
        let top = searcher
            .search(&parsed, &TopDocs::with_limit(k.max(1) * 4))
            .map_err(|e| StoreError::Tantivy { operation: "search", source: e })?;

        let mut hits = Vec::new();
        for (score, address) in top {
            let retrieved: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| StoreError::Tantivy { operation: "fetch_doc", source: e })?;
            let doc_scope = retrieved.get_first(self.fields.scope).and_then(|v| v.as_str()).unwrap_or_default();
            if doc_scope != scope {
                continue;
            }
            let chunk_id = retrieved.get_first(self.fields.chunk_id).and_then(|v| v.as_str()).unwrap_or_default();
            let file_path = retrieved.get_first(self.fields.file_path).and_then(|v| v.as_str()).unwrap_or_default();
            let start_line = retrieved.get_first(self.fields.start_line).and_then(|v| v.as_u64()).unwrap_or(0);
            let end_line = retrieved.get_first(self.fields.end_line).and_then(|v| v.as_u64()).unwrap_or(0);
            let doc_type = retrieved.get_first(self.fields.doc_type).and_then(|v| v.as_str()).unwrap_or_default();
            hits.push(SearchHit {
                chunk_id: chunk_id.to_string(),
                source: IndexSource::Domain,
                score: score as f64,
                file_path: file_path.to_string(),
                start_line: start_line as u32,
                end_line: end_line as u32,
                metadata: serde_json::json!({ "doc_type": doc_type }),
            });
            if hits.len() >= k {
                break;
            }
        }
        Ok(hits)
    }

    async fn health_check(&self) -> HealthStatus {
        match self.index.load_metas() {
            Ok(_) => HealthStatus { ok: true, detail: None },
            Err(e) => HealthStatus { ok: false, detail: Some(e.to_string()) },
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
