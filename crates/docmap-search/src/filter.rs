//! Structured filters over logical fields.
//!
//! - [`Filter::Term`] matches the whole value under any indexing policy.
//! - [`Filter::Text`] tokenizes the text like analyzed fields and requires
//!   every token.
//! - `And`/`Or`/`Not` combine filters. An empty `And` matches everything;
//!   an empty `Or` matches nothing.

use tantivy::query::{AllQuery, BooleanQuery, EmptyQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::tokenizer::TokenStream;
use tantivy::Index;

use crate::error::SearchError;
use crate::schema::{logical_term, CollectionSchema, ANALYZED_TOKENIZER};

/// Document selection criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every document
    All,
    /// Exact value of a logical field
    Term { field: String, value: String },
    /// All tokens of `text` appear in an analyzed logical field
    Text { field: String, text: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn text(field: impl Into<String>, text: impl Into<String>) -> Self {
        Filter::Text {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    /// Translate into an engine query.
    pub(crate) fn to_query(
        &self,
        schema: &CollectionSchema,
        index: &Index,
    ) -> Result<Box<dyn Query>, SearchError> {
        let query: Box<dyn Query> = match self {
            Filter::All => Box::new(AllQuery),
            Filter::Term { field, value } => {
                let clauses = schema
                    .indexed_fields()
                    .into_iter()
                    .map(|engine_field| {
                        let term = logical_term(engine_field, field, value);
                        let query: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                        (Occur::Should, query)
                    })
                    .collect();
                Box::new(BooleanQuery::new(clauses))
            }
            Filter::Text { field, text } => text_query(schema, index, field, text)?,
            Filter::And(filters) if filters.is_empty() => Box::new(AllQuery),
            Filter::And(filters) => combine(filters, Occur::Must, schema, index)?,
            Filter::Or(filters) if filters.is_empty() => Box::new(EmptyQuery),
            Filter::Or(filters) => combine(filters, Occur::Should, schema, index)?,
            Filter::Not(inner) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, Box::new(AllQuery) as Box<dyn Query>),
                (Occur::MustNot, inner.to_query(schema, index)?),
            ])),
        };
        Ok(query)
    }
}

fn combine(
    filters: &[Filter],
    occur: Occur,
    schema: &CollectionSchema,
    index: &Index,
) -> Result<Box<dyn Query>, SearchError> {
    let clauses = filters
        .iter()
        .map(|f| Ok((occur, f.to_query(schema, index)?)))
        .collect::<Result<Vec<_>, SearchError>>()?;
    Ok(Box::new(BooleanQuery::new(clauses)))
}

fn text_query(
    schema: &CollectionSchema,
    index: &Index,
    field: &str,
    text: &str,
) -> Result<Box<dyn Query>, SearchError> {
    let mut analyzer = index.tokenizers().get(ANALYZED_TOKENIZER).ok_or_else(|| {
        SearchError::SchemaMismatch(format!("tokenizer {ANALYZED_TOKENIZER} not registered"))
    })?;

    let mut tokens = Vec::new();
    let mut stream = analyzer.token_stream(text);
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    if tokens.is_empty() {
        return Ok(Box::new(EmptyQuery));
    }

    let per_field = schema
        .analyzed_fields()
        .into_iter()
        .map(|engine_field| {
            let all_tokens: Vec<(Occur, Box<dyn Query>)> = tokens
                .iter()
                .map(|token| {
                    let term = logical_term(engine_field, field, token);
                    let query: Box<dyn Query> =
                        Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                    (Occur::Must, query)
                })
                .collect();
            let query: Box<dyn Query> = Box::new(BooleanQuery::new(all_tokens));
            (Occur::Should, query)
        })
        .collect();
    Ok(Box::new(BooleanQuery::new(per_field)))
}
