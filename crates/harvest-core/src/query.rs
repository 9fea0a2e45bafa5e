//! Query model for the remote document store.
//!
//! A [`Query`] names a collection (root or subcollection) and carries
//! equality, range, `array-contains` and `in` predicates plus ordering and a
//! limit. Queries are plain data: they serialise to JSON for the HTTP remote
//! and can be evaluated locally with [`Query::apply`] by the in-memory and
//! SQLite stores.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Error, Result,
  document::{Document, parse_timestamp},
};

/// Upper bound on the number of values an `in` predicate may carry. The
/// backing store rejects larger lists, so callers chunk id sets to this size.
pub const MAX_IN_VALUES: usize = 30;

/// Pseudo field path addressing the document id.
pub const DOCUMENT_ID: &str = "__name__";

// ─── Collection paths ────────────────────────────────────────────────────────

/// Slash-separated collection path: `crops`, or `sessions/{id}/registers` for
/// a subcollection owned by one parent document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CollectionPath {
  segments: Vec<String>,
}

impl CollectionPath {
  pub fn root(name: impl Into<String>) -> Self {
    Self { segments: vec![name.into()] }
  }

  /// The subcollection `name` under document `parent_id` of `self`.
  pub fn child(&self, parent_id: impl Into<String>, name: impl Into<String>) -> Self {
    let mut segments = self.segments.clone();
    segments.push(parent_id.into());
    segments.push(name.into());
    Self { segments }
  }

  /// Last segment, e.g. `registers`.
  pub fn name(&self) -> &str {
    self.segments.last().map(String::as_str).unwrap_or_default()
  }

  /// The owning document's collection and id, for subcollections.
  pub fn parent(&self) -> Option<(CollectionPath, &str)> {
    let n = self.segments.len();
    if n < 3 {
      return None;
    }
    let parent = Self { segments: self.segments[..n - 2].to_vec() };
    Some((parent, self.segments[n - 2].as_str()))
  }

  pub fn is_subcollection(&self) -> bool { self.segments.len() > 1 }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.segments.join("/"))
  }
}

impl From<CollectionPath> for String {
  fn from(path: CollectionPath) -> Self { path.to_string() }
}

impl TryFrom<String> for CollectionPath {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { raw.parse() }
}

impl std::str::FromStr for CollectionPath {
  type Err = Error;

  fn from_str(raw: &str) -> Result<Self> {
    let segments: Vec<String> = raw.split('/').map(str::to_owned).collect();
    if segments.len() % 2 == 0 || segments.iter().any(String::is_empty) {
      return Err(Error::InvalidPath(raw.to_owned()));
    }
    Ok(Self { segments })
  }
}

// ─── Predicates ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Op {
  #[serde(rename = "==")]
  #[strum(serialize = "==")]
  Eq,
  #[serde(rename = ">")]
  #[strum(serialize = ">")]
  Gt,
  #[serde(rename = ">=")]
  #[strum(serialize = ">=")]
  Gte,
  #[serde(rename = "<")]
  #[strum(serialize = "<")]
  Lt,
  #[serde(rename = "<=")]
  #[strum(serialize = "<=")]
  Lte,
  #[serde(rename = "array-contains")]
  #[strum(serialize = "array-contains")]
  ArrayContains,
  #[serde(rename = "in")]
  #[strum(serialize = "in")]
  In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
  pub field: String,
  pub op:    Op,
  pub value: Value,
}

impl Filter {
  /// Whether `doc` satisfies this predicate. A missing field never matches.
  pub fn matches(&self, doc: &Document) -> bool {
    let Some(actual) = doc.field(&self.field) else {
      return false;
    };
    let actual = actual.as_ref();
    match self.op {
      Op::Eq => values_equal(actual, &self.value),
      Op::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
      Op::Gte => matches!(
        compare(actual, &self.value),
        Some(Ordering::Greater | Ordering::Equal)
      ),
      Op::Lt => compare(actual, &self.value) == Some(Ordering::Less),
      Op::Lte => matches!(
        compare(actual, &self.value),
        Some(Ordering::Less | Ordering::Equal)
      ),
      Op::ArrayContains => actual
        .as_array()
        .is_some_and(|items| items.iter().any(|v| values_equal(v, &self.value))),
      Op::In => self
        .value
        .as_array()
        .is_some_and(|candidates| candidates.iter().any(|v| values_equal(actual, v))),
    }
  }
}

impl fmt::Display for Filter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {} {}", self.field, self.op, self.value)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
  pub field:     String,
  #[serde(default)]
  pub direction: Direction,
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
  pub collection: CollectionPath,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub filters:    Vec<Filter>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub order_by:   Vec<OrderBy>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub limit:      Option<usize>,
}

impl Query {
  pub fn new(collection: CollectionPath) -> Self {
    Self { collection, filters: vec![], order_by: vec![], limit: None }
  }

  pub fn filter(mut self, field: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
    self.filters.push(Filter { field: field.into(), op, value: value.into() });
    self
  }

  pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.filter(field, Op::Eq, value)
  }

  pub fn where_gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.filter(field, Op::Gt, value)
  }

  pub fn where_gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.filter(field, Op::Gte, value)
  }

  pub fn array_contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.filter(field, Op::ArrayContains, value)
  }

  /// Add an `in` predicate. Fails if `values` is empty or exceeds
  /// [`MAX_IN_VALUES`].
  pub fn where_in<I, V>(self, field: impl Into<String>, values: I) -> Result<Self>
  where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
  {
    let field = field.into();
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    check_in_values(&field, values.len())?;
    Ok(self.filter(field, Op::In, Value::Array(values)))
  }

  pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
    self.order_by.push(OrderBy { field: field.into(), direction });
    self
  }

  pub fn limit(mut self, limit: usize) -> Self {
    self.limit = Some(limit);
    self
  }

  /// Whether any predicate constrains `field`.
  pub fn has_filter(&self, field: &str) -> bool {
    self.filters.iter().any(|f| f.field == field)
  }

  /// The value of the first `field == value` predicate, if any.
  pub fn eq_value(&self, field: &str) -> Option<&Value> {
    self
      .filters
      .iter()
      .find(|f| f.field == field && f.op == Op::Eq)
      .map(|f| &f.value)
  }

  /// The values of the `in` predicate on `field`, if any.
  pub fn in_values(&self, field: &str) -> Option<&[Value]> {
    self
      .filters
      .iter()
      .find(|f| f.field == field && f.op == Op::In)
      .and_then(|f| f.value.as_array())
      .map(Vec::as_slice)
  }

  /// Re-check the constraints the backing store enforces. Queries built
  /// through [`Query::where_in`] always pass; deserialised ones may not.
  pub fn validate(&self) -> Result<()> {
    for f in self.filters.iter().filter(|f| f.op == Op::In) {
      let len = f.value.as_array().map_or(0, Vec::len);
      check_in_values(&f.field, len)?;
    }
    Ok(())
  }

  pub fn matches(&self, doc: &Document) -> bool {
    doc.collection == self.collection && self.filters.iter().all(|f| f.matches(doc))
  }

  /// Evaluate the query over `docs`: filter, order, then limit.
  ///
  /// Documents missing an `order_by` field are excluded, as the remote store
  /// does. Without an explicit order, results are sorted by document id.
  pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
    let mut out: Vec<Document> = docs
      .into_iter()
      .filter(|d| self.matches(d))
      .filter(|d| self.order_by.iter().all(|o| d.field(&o.field).is_some()))
      .collect();

    out.sort_by(|a, b| {
      for o in &self.order_by {
        let (Some(x), Some(y)) = (a.field(&o.field), b.field(&o.field)) else {
          continue;
        };
        let ord = compare(&x, &y).unwrap_or(Ordering::Equal);
        let ord = match o.direction {
          Direction::Asc => ord,
          Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
          return ord;
        }
      }
      a.id.cmp(&b.id)
    });

    if let Some(limit) = self.limit {
      out.truncate(limit);
    }
    out
  }
}

impl fmt::Display for Query {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.collection)?;
    for filter in &self.filters {
      write!(f, " where {filter}")?;
    }
    for o in &self.order_by {
      write!(f, " order by {} {:?}", o.field, o.direction)?;
    }
    if let Some(limit) = self.limit {
      write!(f, " limit {limit}")?;
    }
    Ok(())
  }
}

fn check_in_values(field: &str, len: usize) -> Result<()> {
  if len == 0 {
    return Err(Error::EmptyInFilter(field.to_owned()));
  }
  if len > MAX_IN_VALUES {
    return Err(Error::InFilterTooLarge {
      field: field.to_owned(),
      len,
      max: MAX_IN_VALUES,
    });
  }
  Ok(())
}

// ─── Value comparison ────────────────────────────────────────────────────────

fn values_equal(a: &Value, b: &Value) -> bool {
  match (a, b) {
    (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
    _ => a == b || compare(a, b) == Some(Ordering::Equal),
  }
}

/// Order two values: RFC 3339 strings as instants, numbers numerically, other
/// strings lexically. Anything else is unordered.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
  match (a, b) {
    (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
      (Some(x), Some(y)) => Some(x.cmp(&y)),
      _ => Some(x.cmp(y)),
    },
    (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(id: &str, data: Value) -> Document {
    Document::new(CollectionPath::root("sessions"), id, data).unwrap()
  }

  #[test]
  fn collection_paths_parse_and_expose_parents() {
    let sub: CollectionPath = "sessions/s1/registers".parse().unwrap();
    assert_eq!(sub.name(), "registers");
    let (parent, id) = sub.parent().unwrap();
    assert_eq!(parent, CollectionPath::root("sessions"));
    assert_eq!(id, "s1");
    assert_eq!(CollectionPath::root("sessions").child("s1", "registers"), sub);

    assert!("sessions/s1".parse::<CollectionPath>().is_err());
    assert!("sessions//registers".parse::<CollectionPath>().is_err());
  }

  #[test]
  fn where_in_enforces_store_limits() {
    let q = Query::new(CollectionPath::root("plots"));
    let ids: Vec<String> = (0..31).map(|i| format!("f{i}")).collect();

    assert!(matches!(
      q.clone().where_in("field.id", ids.clone()),
      Err(Error::InFilterTooLarge { len: 31, max: 30, .. })
    ));
    assert!(matches!(
      q.clone().where_in("field.id", Vec::<String>::new()),
      Err(Error::EmptyInFilter(_))
    ));
    assert!(q.where_in("field.id", ids[..30].to_vec()).is_ok());
  }

  #[test]
  fn timestamps_compare_as_instants() {
    let d = doc("s1", json!({ "updated_at": "2026-03-01T12:00:00+02:00" }));
    // 10:00Z is exactly the same instant.
    let eq = Query::new(CollectionPath::root("sessions"))
      .where_gte("updated_at", "2026-03-01T10:00:00Z");
    let gt = Query::new(CollectionPath::root("sessions"))
      .where_gt("updated_at", "2026-03-01T10:00:00Z");
    assert!(eq.matches(&d));
    assert!(!gt.matches(&d));
  }

  #[test]
  fn array_contains_and_empty_array_equality() {
    let assigned = doc("a", json!({ "responsible_uids": ["u1", "u2"] }));
    let open = doc("b", json!({ "responsible_uids": [] }));
    let base = Query::new(CollectionPath::root("sessions"));

    let contains = base.clone().array_contains("responsible_uids", "u2");
    assert!(contains.matches(&assigned));
    assert!(!contains.matches(&open));

    let unassigned = base.where_eq("responsible_uids", json!([]));
    assert!(unassigned.matches(&open));
    assert!(!unassigned.matches(&assigned));
  }

  #[test]
  fn apply_orders_filters_and_limits() {
    let docs = vec![
      doc("a", json!({ "status": "finished", "date": "2026-01-01T00:00:00Z" })),
      doc("b", json!({ "status": "pending", "date": "2026-01-03T00:00:00Z" })),
      doc("c", json!({ "status": "pending", "date": "2026-01-02T00:00:00Z" })),
      doc("d", json!({ "status": "pending" })),
    ];
    let q = Query::new(CollectionPath::root("sessions"))
      .where_in("status", ["pending", "in-progress"])
      .unwrap()
      .order_by("date", Direction::Desc)
      .limit(5);

    let ids: Vec<String> = q.apply(docs).into_iter().map(|d| d.id).collect();
    assert_eq!(ids, ["b", "c"]);
  }

  #[test]
  fn query_json_shape_is_stable() {
    let q = Query::new(CollectionPath::root("campaigns"))
      .where_eq("active", true)
      .limit(1);
    let v = serde_json::to_value(&q).unwrap();
    assert_eq!(
      v,
      json!({
        "collection": "campaigns",
        "filters": [{ "field": "active", "op": "==", "value": true }],
        "limit": 1,
      })
    );
    let back: Query = serde_json::from_value(v).unwrap();
    assert_eq!(back, q);
  }
}
