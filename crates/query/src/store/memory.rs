//! In-memory document store.
//!
//! Holds collections of JSON documents and evaluates the subset of the
//! aggregation language the translator produces. Operators outside that
//! subset fail with an execution error instead of being ignored.

use crate::executor::{DocumentStore, Record};
use crate::pipeline::{json_type_name, CastOp, StructuredQuery};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sewana_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// Document collections kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: HashMap<String, Vec<Record>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: impl Into<String>, documents: Vec<Record>) -> Self {
        self.collections.insert(name.into(), documents);
        self
    }

    /// Load one collection from a JSON array of documents.
    pub fn from_json_str(collection: &str, json: &str) -> AppResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(items) = value else {
            return Err(AppError::Config(format!(
                "Seed data for '{}' must be a JSON array of documents",
                collection
            )));
        };

        let mut documents = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            match item {
                Value::Object(doc) => documents.push(doc),
                other => {
                    return Err(AppError::Config(format!(
                        "Seed document {} for '{}' is a {}, expected an object",
                        index,
                        collection,
                        json_type_name(&other)
                    )))
                }
            }
        }

        Ok(Self::new().with_collection(collection, documents))
    }

    pub fn from_json_file(collection: &str, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read seed data {:?}: {}", path, e))
        })?;
        let store = Self::from_json_str(collection, &contents)?;
        tracing::info!(
            collection,
            documents = store.count(collection),
            "Loaded structured store from {:?}",
            path
        );
        Ok(store)
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn aggregate(&self, collection: &str, query: &StructuredQuery) -> AppResult<Vec<Record>> {
        let Some(documents) = self.collections.get(collection) else {
            tracing::debug!(collection, "Unknown collection, returning no documents");
            return Ok(Vec::new());
        };
        run_pipeline(documents.clone(), query).map_err(AppError::Execution)
    }
}

/// Evaluate every stage of `query` over `documents` in order.
pub fn run_pipeline(mut documents: Vec<Record>, query: &StructuredQuery) -> Result<Vec<Record>, String> {
    for (index, stage) in query.stages().iter().enumerate() {
        let (Some(operator), Some(operand)) = (stage.operator(), stage.operand()) else {
            return Err(format!("stage {} must contain exactly one operator", index));
        };

        documents = match operator {
            "$match" => {
                let filter = expect_object(operand, "$match")?;
                let mut kept = Vec::with_capacity(documents.len());
                for doc in documents {
                    if matches_filter(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$project" => {
                let shape = expect_object(operand, "$project")?;
                documents
                    .iter()
                    .map(|doc| project(doc, shape))
                    .collect::<Result<_, _>>()?
            }
            "$addFields" | "$set" => {
                let shape = expect_object(operand, operator)?;
                documents
                    .into_iter()
                    .map(|doc| add_fields(doc, shape))
                    .collect::<Result<_, _>>()?
            }
            "$sort" => sort(documents, expect_object(operand, "$sort")?)?,
            "$limit" => {
                let limit = operand
                    .as_u64()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| format!("$limit must be a positive integer, got {}", operand))?;
                documents.truncate(limit as usize);
                documents
            }
            "$skip" => {
                let skip = operand
                    .as_u64()
                    .ok_or_else(|| format!("$skip must be a non-negative integer, got {}", operand))?;
                documents.into_iter().skip(skip as usize).collect()
            }
            other => return Err(format!("unsupported stage operator {}", other)),
        };
    }
    Ok(documents)
}

fn expect_object<'a>(value: &'a Value, operator: &str) -> Result<&'a Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| format!("{} expects an object, got a {}", operator, json_type_name(value)))
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

// ---- path helpers ----

/// All values reachable at `path`, descending into arrays of documents.
fn lookup<'a>(doc: &'a Record, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*head) {
            resolve(value, rest, &mut out);
        }
    }
    out
}

fn resolve<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(*head) {
                resolve(child, rest, out);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                if let Some(child) = items.get(index) {
                    resolve(child, rest, out);
                }
            } else {
                for item in items.iter().filter(|item| item.is_object()) {
                    resolve(item, segments, out);
                }
            }
        }
        _ => {}
    }
}

/// Value at a dotted path through nested objects only.
fn get_path<'a>(doc: &'a Record, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn set_path(doc: &mut Record, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

fn remove_path(doc: &mut Record, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = doc.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

// ---- $match ----

fn matches_filter(doc: &Record, filter: &Map<String, Value>) -> Result<bool, String> {
    for (key, condition) in filter {
        let satisfied = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clause_list(condition, "$and")? {
                    if !matches_filter(doc, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" | "$nor" => {
                let mut any = false;
                for clause in clause_list(condition, key)? {
                    if matches_filter(doc, clause)? {
                        any = true;
                        break;
                    }
                }
                if key == "$or" {
                    any
                } else {
                    !any
                }
            }
            other if other.starts_with('$') => {
                return Err(format!("unsupported query operator {}", other))
            }
            path => field_matches(&lookup(doc, path), condition)?,
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clause_list<'a>(value: &'a Value, operator: &str) -> Result<Vec<&'a Map<String, Value>>, String> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| format!("{} expects a non-empty array", operator))?;
    items
        .iter()
        .map(|item| expect_object(item, operator))
        .collect()
}

fn field_matches(candidates: &[&Value], condition: &Value) -> Result<bool, String> {
    match condition {
        Value::Object(ops) if is_operator_object(ops) => apply_operators(ops, candidates),
        target => Ok(equals_any(candidates, target)),
    }
}

fn apply_operators(ops: &Map<String, Value>, candidates: &[&Value]) -> Result<bool, String> {
    for (operator, operand) in ops {
        if !apply_operator(operator, operand, candidates)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply_operator(operator: &str, operand: &Value, candidates: &[&Value]) -> Result<bool, String> {
    match operator {
        "$eq" => Ok(equals_any(candidates, operand)),
        "$ne" => Ok(!equals_any(candidates, operand)),
        "$gt" => Ok(compares(candidates, operand, |o| o == Ordering::Greater)),
        "$gte" => Ok(compares(candidates, operand, |o| o != Ordering::Less)),
        "$lt" => Ok(compares(candidates, operand, |o| o == Ordering::Less)),
        "$lte" => Ok(compares(candidates, operand, |o| o != Ordering::Greater)),
        "$in" | "$nin" => {
            let options = operand
                .as_array()
                .ok_or_else(|| format!("{} expects an array", operator))?;
            let found = options.iter().any(|option| equals_any(candidates, option));
            Ok(if operator == "$in" { found } else { !found })
        }
        "$exists" => Ok(!candidates.is_empty() == truthy(operand)),
        "$size" => {
            let size = operand
                .as_u64()
                .ok_or_else(|| "$size expects a non-negative integer".to_string())?;
            Ok(candidates
                .iter()
                .any(|c| c.as_array().is_some_and(|items| items.len() as u64 == size)))
        }
        "$elemMatch" => {
            let shape = expect_object(operand, "$elemMatch")?;
            for candidate in candidates {
                if let Value::Array(items) = candidate {
                    for item in items {
                        if element_matches(item, shape)? {
                            return Ok(true);
                        }
                    }
                }
            }
            Ok(false)
        }
        "$not" => {
            let ops = expect_object(operand, "$not")?;
            Ok(!apply_operators(ops, candidates)?)
        }
        other => Err(format!("unsupported query operator {}", other)),
    }
}

fn element_matches(item: &Value, shape: &Map<String, Value>) -> Result<bool, String> {
    if is_operator_object(shape) {
        return apply_operators(shape, &[item]);
    }
    match item {
        Value::Object(doc) => matches_filter(doc, shape),
        _ => Ok(false),
    }
}

/// Equality against each candidate and, for arrays, each element.
fn equals_any(candidates: &[&Value], target: &Value) -> bool {
    if candidates.is_empty() {
        return target.is_null();
    }
    candidates.iter().any(|candidate| {
        values_equal(candidate, target)
            || candidate
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(item, target)))
    })
}

fn compares(candidates: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates.iter().any(|candidate| {
        let direct = compare(candidate, operand).is_some_and(&accept);
        direct
            || candidate.as_array().is_some_and(|items| {
                items
                    .iter()
                    .any(|item| compare(item, operand).is_some_and(&accept))
            })
    })
}

/// Ordering between values of the same type; `None` across types.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| values_equal(l, r)))
        }
        _ => a == b,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

// ---- $project / $addFields ----

fn projection_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => Some(n.as_f64() != Some(0.0)),
        _ => None,
    }
}

fn project(doc: &Record, shape: &Map<String, Value>) -> Result<Record, String> {
    let mut included = Vec::new();
    let mut excluded = Vec::new();
    let mut computed = Vec::new();
    let mut keep_id = true;

    for (path, value) in shape {
        match projection_flag(value) {
            Some(true) => included.push(path.as_str()),
            Some(false) if path == "_id" => keep_id = false,
            Some(false) => excluded.push(path.as_str()),
            None => computed.push((path.as_str(), value)),
        }
    }

    if !excluded.is_empty() && (!included.is_empty() || !computed.is_empty()) {
        return Err("$project cannot mix inclusion and exclusion".to_string());
    }

    if included.is_empty() && computed.is_empty() {
        let mut out = doc.clone();
        for path in excluded {
            remove_path(&mut out, path);
        }
        if !keep_id {
            out.remove("_id");
        }
        return Ok(out);
    }

    let mut out = Record::new();
    if keep_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }
    for path in included {
        if let Some(value) = get_path(doc, path) {
            set_path(&mut out, path, value.clone());
        }
    }
    for (path, expression) in computed {
        if let Some(value) = evaluate(doc, expression)? {
            set_path(&mut out, path, value);
        }
    }
    Ok(out)
}

fn add_fields(mut doc: Record, shape: &Map<String, Value>) -> Result<Record, String> {
    for (path, expression) in shape {
        if let Some(value) = evaluate(&doc, expression)? {
            set_path(&mut doc, path, value);
        }
    }
    Ok(doc)
}

/// Evaluate an expression. `None` means the referenced field is missing.
fn evaluate(doc: &Record, expression: &Value) -> Result<Option<Value>, String> {
    match expression {
        Value::String(reference) if reference.starts_with('$') => {
            Ok(field_reference(doc, &reference[1..]))
        }
        Value::Object(map) if map.len() == 1 && map.keys().all(|k| k.starts_with('$')) => {
            let Some((operator, argument)) = map.iter().next() else {
                return Ok(None);
            };
            if operator == "$literal" {
                return Ok(Some(argument.clone()));
            }
            let cast = CastOp::parse(operator)
                .ok_or_else(|| format!("unsupported expression operator {}", operator))?;
            let input = evaluate(doc, argument)?.unwrap_or(Value::Null);
            cast.apply(&input).map(Some)
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, nested) in map {
                if key.starts_with('$') {
                    return Err(format!("unsupported expression operator {}", key));
                }
                if let Some(value) = evaluate(doc, nested)? {
                    out.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(out)))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate(doc, item)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(out)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn field_reference(doc: &Record, path: &str) -> Option<Value> {
    if let Some(value) = get_path(doc, path) {
        return Some(value.clone());
    }
    let found = lookup(doc, path);
    if found.is_empty() {
        None
    } else {
        Some(Value::Array(found.into_iter().cloned().collect()))
    }
}

// ---- $sort ----

fn sort(mut documents: Vec<Record>, shape: &Map<String, Value>) -> Result<Vec<Record>, String> {
    if shape.is_empty() {
        return Err("$sort needs at least one field".to_string());
    }
    let keys = shape
        .iter()
        .map(|(path, direction)| match direction.as_i64() {
            Some(1) => Ok((path.as_str(), true)),
            Some(-1) => Ok((path.as_str(), false)),
            _ => Err(format!("$sort direction for {} must be 1 or -1", path)),
        })
        .collect::<Result<Vec<_>, _>>()?;

    documents.sort_by(|a, b| {
        for (path, ascending) in &keys {
            let ordering = sort_order(get_path(a, path), get_path(b, path));
            let ordering = if *ascending { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(documents)
}

fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare(x, y).unwrap_or_else(|| type_rank(x).cmp(&type_rank(y))),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SEED: &str = include_str!("../../../../data/doctors.json");

    fn store() -> InMemoryStore {
        InMemoryStore::from_json_str("doctors", SEED).unwrap()
    }

    fn query(value: Value) -> StructuredQuery {
        StructuredQuery::from_value(value).unwrap()
    }

    async fn names(pipeline: Value) -> Vec<String> {
        store()
            .aggregate("doctors", &query(pipeline))
            .await
            .unwrap()
            .iter()
            .filter_map(|doc| doc.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_match_equality_and_projection() {
        let records = store()
            .aggregate(
                "doctors",
                &query(json!([
                    {"$match": {"specialization": "Cardiologist"}},
                    {"$project": {"name": 1, "hospital": 1, "contact": 1}}
                ])),
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["_id", "name", "hospital", "contact"]);
    }

    #[tokio::test]
    async fn test_elem_match_monday_evening() {
        let found = names(json!([{
            "$match": {"availability": {"$elemMatch": {
                "day": "Monday", "time_slots": {"$in": ["Evening"]}
            }}}
        }]))
        .await;
        assert_eq!(found, vec!["Dr. Nimal Perera"]);
    }

    #[tokio::test]
    async fn test_cast_then_compare() {
        let strict = names(json!([
            {"$addFields": {"fee_num": {"$toInt": "$consultation_fee"}}},
            {"$match": {"languages": "Tamil", "fee_num": {"$lt": 2000}}}
        ]))
        .await;
        assert!(strict.is_empty());

        let inclusive = names(json!([
            {"$addFields": {"fee_num": {"$toInt": "$consultation_fee"}}},
            {"$match": {"languages": "Tamil", "fee_num": {"$lte": 2000}}}
        ]))
        .await;
        assert_eq!(inclusive, vec!["Dr. Saman Jayawardena"]);
    }

    #[tokio::test]
    async fn test_uncast_string_does_not_compare_with_number() {
        let found = names(json!([{"$match": {"consultation_fee": {"$lt": 3000}}}])).await;
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_sort_and_limit() {
        let found = names(json!([
            {"$addFields": {"rating": {"$toDouble": "$ratings"}}},
            {"$sort": {"rating": -1}},
            {"$limit": 2}
        ]))
        .await;
        assert_eq!(found, vec!["Dr. Priya Fernando", "Dr. Nimal Perera"]);
    }

    #[tokio::test]
    async fn test_dotted_paths_and_or() {
        let found = names(json!([{"$match": {"$or": [
            {"contact.email": "priya@example.com"},
            {"qualifications": {"$in": ["MD Dermatology"]}}
        ]}}]))
        .await;
        assert_eq!(found, vec!["Dr. Saman Jayawardena", "Dr. Priya Fernando"]);
    }

    #[tokio::test]
    async fn test_exclusion_projection() {
        let records = store()
            .aggregate(
                "doctors",
                &query(json!([{"$project": {"_id": 0, "contact": 0, "availability": 0}}])),
            )
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| !r.contains_key("_id") && !r.contains_key("contact")));
    }

    #[tokio::test]
    async fn test_unknown_operator_is_execution_error() {
        let result = store()
            .aggregate("doctors", &query(json!([{"$match": {"name": {"$regex": "^Dr"}}}])))
            .await;
        assert!(matches!(result, Err(AppError::Execution(_))));

        let result = store()
            .aggregate("doctors", &query(json!([{"$lookup": {"from": "wards"}}])))
            .await;
        assert!(matches!(result, Err(AppError::Execution(_))));
    }

    #[tokio::test]
    async fn test_failed_cast_is_execution_error() {
        let result = store()
            .aggregate("doctors", &query(json!([{"$addFields": {"n": {"$toInt": "$name"}}}])))
            .await;
        assert!(matches!(result, Err(AppError::Execution(msg)) if msg.contains("to int")));
    }

    #[tokio::test]
    async fn test_multi_operator_stage_rejected() {
        let result = store()
            .aggregate("doctors", &query(json!([{"$match": {}, "$limit": 1}])))
            .await;
        assert!(matches!(result, Err(AppError::Execution(_))));
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let records = store()
            .aggregate("nurses", &query(json!([{"$match": {}}])))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_seed_must_be_array_of_objects() {
        assert!(InMemoryStore::from_json_str("doctors", r#"{"name": "x"}"#).is_err());
        assert!(InMemoryStore::from_json_str("doctors", r#"[1, 2]"#).is_err());
        assert_eq!(store().count("doctors"), 3);
    }
}
