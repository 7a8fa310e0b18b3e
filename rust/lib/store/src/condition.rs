//! Condition compiler shared by every list/search endpoint.
//!
//! A list request carries `(field, operator, value)` conditions plus a page
//! window. Conditions compile to one AND'ed matcher set; the total is counted
//! on that set before the window is applied.

use std::fmt;
use std::str::FromStr;

use kubedeck_core::Page;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::Store;
use crate::error::QueryError;
use crate::matcher::Matcher;
use crate::record::Record;
use crate::tx::Transaction;

/// Field name that turns a condition into a multi-field quick search.
pub const QUICK: &str = "quick";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "ne")]
    Ne,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "not like", alias = "not-like", alias = "not_like")]
    NotLike,
    #[serde(rename = "quick")]
    Quick,
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            "like" => Ok(Operator::Like),
            "not like" | "not-like" | "not_like" => Ok(Operator::NotLike),
            "quick" => Ok(Operator::Quick),
            other => Err(QueryError::Filter(format!("unknown operator '{}'", other))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Like => "like",
            Operator::NotLike => "not like",
            Operator::Quick => "quick",
        };
        f.write_str(s)
    }
}

/// One client-supplied filter term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn quick(value: impl Into<String>) -> Self {
        Self::new(QUICK, Operator::Quick, value)
    }

    fn is_quick(&self) -> bool {
        self.field == QUICK || self.operator == Operator::Quick
    }
}

/// Page window. `page_size == 0` returns the whole filtered set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWindow {
    #[serde(default = "default_page_num")]
    pub page_num: usize,
    #[serde(default)]
    pub page_size: usize,
}

fn default_page_num() -> usize {
    1
}

impl QueryWindow {
    pub fn new(page_num: usize, page_size: usize) -> Self {
        Self {
            page_num,
            page_size,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(1, 0)
    }
}

impl Default for QueryWindow {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Storage type of a searchable field, used to coerce `eq`/`ne` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Integer,
    Text,
}

/// Trait implemented by records reachable through list/search endpoints.
pub trait Searchable: Record {
    /// Fields OR'ed together by a quick search.
    const QUICK_FIELDS: &'static [&'static str];

    /// Field the results are ordered by, descending.
    const ORDER_FIELD: &'static str = "created_at";

    /// Declared type of a stored field. `None` falls back to inferring the
    /// type from the value itself.
    fn field_kind(_field: &str) -> Option<FieldKind> {
        None
    }
}

/// Convert a client field name (camelCase or PascalCase) to the storage
/// convention (snake_case). Dotted paths are converted per segment.
pub fn normalize_field(name: &str) -> String {
    name.split('.')
        .map(snake_case)
        .collect::<Vec<_>>()
        .join(".")
}

fn snake_case(segment: &str) -> String {
    let chars: Vec<char> = segment.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = if i > 0 { Some(chars[i - 1]) } else { None };
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None | Some('_') => false,
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                Some(_) => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Infer a value's type from its text: `true`/`false` are booleans,
/// all-digit strings are integers, everything else stays a string.
pub fn parse_value_type(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::from(n);
        }
    }
    Value::String(raw.to_string())
}

fn coerce(field: &str, raw: &str, kind: Option<FieldKind>) -> Result<Value, QueryError> {
    match kind {
        None => Ok(parse_value_type(raw)),
        Some(FieldKind::Text) => Ok(Value::String(raw.to_string())),
        Some(FieldKind::Bool) => match parse_value_type(raw.trim()) {
            v @ Value::Bool(_) => Ok(v),
            _ => Err(QueryError::Filter(format!(
                "field '{}' expects a boolean, got '{}'",
                field, raw
            ))),
        },
        Some(FieldKind::Integer) => match parse_value_type(raw.trim()) {
            v @ Value::Number(_) => Ok(v),
            _ => Err(QueryError::Filter(format!(
                "field '{}' expects an integer, got '{}'",
                field, raw
            ))),
        },
    }
}

fn quick_matcher<T: Searchable>(value: &str) -> Result<Matcher, QueryError> {
    if T::QUICK_FIELDS.is_empty() {
        return Err(QueryError::Filter(format!(
            "quick search is not supported for {}",
            T::BUCKET
        )));
    }
    Ok(Matcher::or(
        T::QUICK_FIELDS
            .iter()
            .map(|f| Matcher::like(*f, value.to_string()))
            .collect(),
    ))
}

/// Normalized storage name of a client field; empty path segments are rejected.
fn checked_field(raw: &str) -> Result<String, QueryError> {
    let field = normalize_field(raw);
    if field.is_empty() || field.split('.').any(str::is_empty) {
        return Err(QueryError::Filter(format!("invalid field name '{}'", raw)));
    }
    Ok(field)
}

/// Compile conditions into the AND'ed matcher set for `T`.
pub fn compile<T: Searchable>(conditions: &[Condition]) -> Result<Vec<Matcher>, QueryError> {
    let mut matchers = Vec::with_capacity(conditions.len());

    for cond in conditions {
        let operator = if cond.is_quick() {
            Operator::Quick
        } else {
            cond.operator
        };

        let matcher = match operator {
            Operator::Quick => quick_matcher::<T>(&cond.value)?,
            Operator::Eq => {
                let field = checked_field(&cond.field)?;
                let value = coerce(&field, &cond.value, T::field_kind(&field))?;
                Matcher::eq(field, value)
            }
            Operator::Ne => {
                let field = checked_field(&cond.field)?;
                let value = coerce(&field, &cond.value, T::field_kind(&field))?;
                Matcher::not(Matcher::eq(field, value))
            }
            Operator::Like => Matcher::like(checked_field(&cond.field)?, cond.value.clone()),
            Operator::NotLike => {
                Matcher::not(Matcher::like(checked_field(&cond.field)?, cond.value.clone()))
            }
        };
        matchers.push(matcher);
    }

    Ok(matchers)
}

/// Run a filtered, windowed search inside an existing transaction.
pub fn search<T: Searchable>(
    tx: &Transaction<'_>,
    conditions: &[Condition],
    window: QueryWindow,
) -> Result<Page<T>, QueryError> {
    if window.page_size > 0 && window.page_num == 0 {
        return Err(QueryError::Filter("page number starts at 1".into()));
    }

    let matchers = compile::<T>(conditions)?;
    let mut query = tx.select(matchers).order_by(T::ORDER_FIELD).reverse();
    if window.page_size > 0 {
        // An out-of-range page saturates to an empty window; total is still counted.
        let skip = (window.page_num - 1).saturating_mul(window.page_size);
        query = query.limit(window.page_size).skip(skip);
    }
    let (total, items) = query.page::<T>()?;

    Ok(Page { items, total })
}

impl Store {
    /// Run a filtered, windowed search in its own read transaction.
    pub fn search<T: Searchable>(
        &self,
        conditions: &[Condition],
        window: QueryWindow,
    ) -> Result<Page<T>, QueryError> {
        let tx = self.begin(false)?;
        search(&tx, conditions, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Repo {
        id: String,
        name: String,
        detail: String,
        auth: bool,
        port: i64,
        version: String,
        created_at: String,
    }

    impl Record for Repo {
        const BUCKET: &'static str = "repos";

        fn key_value(&self) -> String {
            self.id.clone()
        }
    }

    impl Searchable for Repo {
        const QUICK_FIELDS: &'static [&'static str] = &["name", "detail"];

        fn field_kind(field: &str) -> Option<FieldKind> {
            match field {
                "auth" => Some(FieldKind::Bool),
                "port" => Some(FieldKind::Integer),
                "version" => Some(FieldKind::Text),
                _ => None,
            }
        }
    }

    /// 25 repos; exactly 3 mention "prod" in name or detail.
    fn seeded() -> (tempfile::NamedTempFile, Store) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let store = Store::open(tmp.path()).unwrap();
        let mut tx = store.begin(true).unwrap();
        for i in 0..25 {
            let (name, detail) = match i {
                3 => ("prod-east".to_string(), "mirror".to_string()),
                11 => ("cache".to_string(), "PRODUCTION pull-through".to_string()),
                20 => ("Prod-west".to_string(), String::new()),
                _ => (format!("repo-{:02}", i), format!("team {}", i % 4)),
            };
            tx.save(&mut Repo {
                id: format!("id-{:02}", i),
                name,
                detail,
                auth: i % 2 == 0,
                port: 5000 + (i % 3),
                version: if i % 5 == 0 { "2".into() } else { "1".into() },
                created_at: format!("2024-01-01T00:00:{:02}.000000Z", i),
            })
            .unwrap();
        }
        tx.commit().unwrap();
        (tmp, store)
    }

    fn ids(page: &Page<Repo>) -> Vec<String> {
        page.items.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn test_quick_search_example() {
        let (_tmp, store) = seeded();
        let page: Page<Repo> = store
            .search(&[Condition::quick("prod")], QueryWindow::new(1, 10))
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 3);
        // created_at descending
        assert_eq!(ids(&page), vec!["id-20", "id-11", "id-03"]);
    }

    #[test]
    fn test_quick_operator_alone_is_quick() {
        let (_tmp, store) = seeded();
        let cond = Condition::new("name", Operator::Quick, "prod");
        let page: Page<Repo> = store.search(&[cond], QueryWindow::default()).unwrap();
        assert_eq!(page.total, 3);
        // the sentinel field is quick whatever the operator says
        for op in [Operator::Eq, Operator::Ne, Operator::Like, Operator::NotLike] {
            let cond = Condition::new(QUICK, op, "prod");
            let page: Page<Repo> = store.search(&[cond], QueryWindow::default()).unwrap();
            assert_eq!(page.total, 3, "{}", op);
        }
    }

    #[test]
    fn test_eq_ne_conjunction_is_order_independent() {
        let (_tmp, store) = seeded();
        let conds = vec![
            Condition::new("auth", Operator::Eq, "true"),
            Condition::new("port", Operator::Ne, "5001"),
            Condition::new("version", Operator::Eq, "1"),
        ];

        let tx = store.begin(false).unwrap();
        let all: Vec<Repo> = tx.all().unwrap();
        let mut expected: Vec<String> = all
            .iter()
            .filter(|r| r.auth && r.port != 5001 && r.version == "1")
            .map(|r| r.id.clone())
            .collect();
        expected.sort();

        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let permuted: Vec<Condition> = order.iter().map(|&i| conds[i].clone()).collect();
            let page: Page<Repo> = search(&tx, &permuted, QueryWindow::unbounded()).unwrap();
            let mut got = ids(&page);
            got.sort();
            assert_eq!(got, expected, "order {:?}", order);
        }
    }

    #[test]
    fn test_total_is_window_independent() {
        let (_tmp, store) = seeded();
        let conds = vec![Condition::new("auth", Operator::Eq, "false")];

        let unbounded: Page<Repo> = store.search(&conds, QueryWindow::unbounded()).unwrap();
        assert_eq!(unbounded.items.len(), unbounded.total);
        assert_eq!(unbounded.total, 12);

        for size in [1, 5, 7, 12, 30] {
            for num in [1, 2, 3] {
                let page: Page<Repo> = store.search(&conds, QueryWindow::new(num, size)).unwrap();
                assert_eq!(page.total, unbounded.total, "page {} size {}", num, size);
                assert!(page.items.len() <= size);
            }
        }
    }

    #[test]
    fn test_pages_concatenate_to_unbounded_result() {
        let (_tmp, store) = seeded();
        let conds = vec![Condition::new("name", Operator::NotLike, "prod")];

        let unbounded: Page<Repo> = store.search(&conds, QueryWindow::unbounded()).unwrap();
        assert_eq!(unbounded.total, 23);

        let mut concatenated = Vec::new();
        let mut num = 1;
        loop {
            let page: Page<Repo> = store.search(&conds, QueryWindow::new(num, 4)).unwrap();
            if page.items.is_empty() {
                break;
            }
            concatenated.extend(ids(&page));
            num += 1;
        }
        assert_eq!(concatenated, ids(&unbounded));
    }

    #[test]
    fn test_like_and_not_like() {
        let (_tmp, store) = seeded();
        let like: Page<Repo> = store
            .search(
                &[Condition::new("detail", Operator::Like, "TEAM 1")],
                QueryWindow::unbounded(),
            )
            .unwrap();
        assert!(like.total > 0);
        assert!(like.items.iter().all(|r| r.detail == "team 1"));

        let not_like: Page<Repo> = store
            .search(
                &[Condition::new("detail", Operator::NotLike, "team")],
                QueryWindow::unbounded(),
            )
            .unwrap();
        assert_eq!(not_like.total, 3);
    }

    #[test]
    fn test_field_names_are_normalized() {
        let (_tmp, store) = seeded();
        let page: Page<Repo> = store
            .search(
                &[Condition::new("CreatedAt", Operator::Like, "00:00:07")],
                QueryWindow::unbounded(),
            )
            .unwrap();
        assert_eq!(ids(&page), vec!["id-07"]);
    }

    #[test]
    fn test_uncoercible_value_is_filter_error() {
        let (_tmp, store) = seeded();
        let err = store
            .search::<Repo>(
                &[Condition::new("auth", Operator::Eq, "yes")],
                QueryWindow::unbounded(),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::Filter(_)));

        let err = store
            .search::<Repo>(
                &[Condition::new("port", Operator::Ne, "50x")],
                QueryWindow::unbounded(),
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::Filter(_)));
    }

    #[test]
    fn test_text_field_keeps_digit_strings() {
        let (_tmp, store) = seeded();
        let page: Page<Repo> = store
            .search(
                &[Condition::new("version", Operator::Eq, "2")],
                QueryWindow::unbounded(),
            )
            .unwrap();
        assert_eq!(page.total, 5);
    }

    #[test]
    fn test_page_zero_is_rejected() {
        let (_tmp, store) = seeded();
        let err = store
            .search::<Repo>(&[], QueryWindow::new(0, 10))
            .unwrap_err();
        assert!(matches!(err, QueryError::Filter(_)));
    }

    #[test]
    fn test_page_past_end_is_empty_with_true_total() {
        let (_tmp, store) = seeded();
        let page: Page<Repo> = store.search(&[], QueryWindow::new(10, 10)).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 25);
    }

    #[test]
    fn test_total_matches_items_despite_concurrent_commit() {
        let (_tmp, store) = seeded();
        let reader = store.begin(false).unwrap();

        let mut tx = store.begin(true).unwrap();
        tx.save(&mut Repo {
            id: "id-99".into(),
            name: "prod-late".into(),
            detail: String::new(),
            auth: true,
            port: 5000,
            version: "1".into(),
            created_at: "2024-01-01T00:01:00.000000Z".into(),
        })
        .unwrap();
        tx.commit().unwrap();

        let page: Page<Repo> = search(&reader, &[], QueryWindow::unbounded()).unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 25);
        let quick: Page<Repo> =
            search(&reader, &[Condition::quick("prod")], QueryWindow::unbounded()).unwrap();
        assert_eq!(quick.total, quick.items.len());
        assert_eq!(quick.total, 3);
        drop(reader);

        let page: Page<Repo> = store.search(&[], QueryWindow::unbounded()).unwrap();
        assert_eq!(page.total, 26);
        assert_eq!(page.items.len(), 26);
    }

    #[test]
    fn test_huge_page_number_is_empty_with_true_total() {
        let (_tmp, store) = seeded();
        for window in [
            QueryWindow::new(usize::MAX, 10),
            QueryWindow::new(usize::MAX / 2, 3),
            QueryWindow::new(2, usize::MAX),
        ] {
            let page: Page<Repo> = store.search(&[], window).unwrap();
            assert!(page.items.is_empty(), "{:?}", window);
            assert_eq!(page.total, 25);
        }

        let page: Page<Repo> = store
            .search(&[Condition::quick("prod")], QueryWindow::new(usize::MAX, 1))
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 3);
    }

    #[test]
    fn test_normalize_field() {
        assert_eq!(normalize_field("createAt"), "create_at");
        assert_eq!(normalize_field("NickName"), "nick_name");
        assert_eq!(normalize_field("name"), "name");
        assert_eq!(normalize_field("UUID"), "uuid");
        assert_eq!(normalize_field("imageRepoID"), "image_repo_id");
        assert_eq!(normalize_field("user_name"), "user_name");
        assert_eq!(normalize_field("credential.userName"), "credential.user_name");
    }

    #[test]
    fn test_parse_value_type() {
        assert_eq!(parse_value_type("true"), Value::Bool(true));
        assert_eq!(parse_value_type("false"), Value::Bool(false));
        assert_eq!(parse_value_type("42"), Value::from(42));
        assert_eq!(parse_value_type("-7"), Value::from(-7));
        assert_eq!(parse_value_type("4.2"), Value::from("4.2"));
        assert_eq!(parse_value_type("True"), Value::from("True"));
        assert_eq!(parse_value_type(""), Value::from(""));
        assert_eq!(
            parse_value_type("99999999999999999999"),
            Value::from("99999999999999999999")
        );
    }

    #[test]
    fn test_operator_parsing() {
        assert_eq!("eq".parse::<Operator>().unwrap(), Operator::Eq);
        assert_eq!("not like".parse::<Operator>().unwrap(), Operator::NotLike);
        assert_eq!("not-like".parse::<Operator>().unwrap(), Operator::NotLike);
        assert!(matches!(
            "gt".parse::<Operator>().unwrap_err(),
            QueryError::Filter(_)
        ));

        let cond: Condition =
            serde_json::from_str(r#"{"field":"name","operator":"not like","value":"x"}"#).unwrap();
        assert_eq!(cond.operator, Operator::NotLike);
        assert!(serde_json::from_str::<Condition>(
            r#"{"field":"name","operator":"between","value":"x"}"#
        )
        .is_err());
    }
}
