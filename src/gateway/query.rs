use std::cmp::Ordering;

use serde_json::Value;

use super::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    /// Case-insensitive pattern match, `*` standing for any run of characters.
    Ilike,
}

impl Op {
    fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Neq => "neq",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::In => "in",
            Op::Ilike => "ilike",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

impl Filter {
    /// PostgREST operator expression, e.g. `eq.42` or `in.(a,b)`.
    pub fn expr(&self) -> String {
        match (&self.op, &self.value) {
            (Op::In, Value::Array(items)) => {
                let items: Vec<String> = items.iter().map(text).collect();
                format!("in.({})", items.join(","))
            }
            (op, value) => format!("{}.{}", op.as_str(), text(value)),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.column) else {
            return false;
        };

        match self.op {
            Op::Eq => !actual.is_null() && text(actual) == text(&self.value),
            Op::Neq => text(actual) != text(&self.value),
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
            Op::In => match &self.value {
                Value::Array(items) => items.iter().any(|item| text(item) == text(actual)),
                other => text(other) == text(actual),
            },
            Op::Ilike => !actual.is_null() && like(&text(actual), &text(&self.value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A table read (or the row predicate of an update/delete).
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    /// Rows must match at least one of these, sent as PostgREST `or=(...)`.
    pub either: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_owned(),
            columns: "*".to_owned(),
            filters: Vec::new(),
            either: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_owned();
        self
    }

    fn filter(mut self, column: &str, op: Op, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.to_owned(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Eq, value)
    }

    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Neq, value)
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Gt, value)
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Gte, value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Lt, value)
    }

    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Op::Lte, value)
    }

    pub fn any_of<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.filter(column, Op::In, Value::Array(values))
    }

    pub fn ilike(self, column: &str, pattern: &str) -> Self {
        self.filter(column, Op::Ilike, pattern)
    }

    /// Case-insensitive substring search over `columns`. A blank term adds nothing.
    pub fn search(mut self, columns: &[&str], term: &str) -> Self {
        // characters that would break the `or=(...)` list or the pattern
        let term: String = term
            .trim()
            .chars()
            .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')'))
            .collect();
        if term.is_empty() {
            return self;
        }
        self.either.extend(columns.iter().map(|column| Filter {
            column: (*column).to_owned(),
            op: Op::Ilike,
            value: Value::String(format!("*{term}*")),
        }));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_owned(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in PostgREST grammar.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_owned(), self.columns.clone())];
        params.extend(
            self.filters
                .iter()
                .map(|filter| (filter.column.clone(), filter.expr())),
        );
        if !self.either.is_empty() {
            let any: Vec<String> = self
                .either
                .iter()
                .map(|filter| format!("{}.{}", filter.column, filter.expr()))
                .collect();
            params.push(("or".to_owned(), format!("({})", any.join(","))));
        }
        if let Some(Order { column, ascending }) = &self.order {
            let direction = if *ascending { "asc" } else { "desc" };
            params.push(("order".to_owned(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }
        params
    }

    /// Stable identity of the read, used as a cache key.
    pub fn key(&self) -> String {
        let params: Vec<String> = self
            .params()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        format!("{}?{}", self.table, params.join("&"))
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| filter.matches(row))
            && (self.either.is_empty() || self.either.iter().any(|filter| filter.matches(row)))
    }

    /// Evaluates the query against rows held in memory.
    pub fn apply<'a>(&self, rows: impl IntoIterator<Item = &'a Row>) -> Vec<Row> {
        let mut out: Vec<Row> = rows
            .into_iter()
            .filter(|row| self.matches(row))
            .cloned()
            .collect();

        if let Some(Order { column, ascending }) = &self.order {
            out.sort_by(|a, b| {
                let ordering = match (a.get(column), b.get(column)) {
                    (Some(x), Some(y)) if !x.is_null() && !y.is_null() => {
                        compare(x, y).unwrap_or(Ordering::Equal)
                    }
                    // nulls last in either direction
                    (Some(x), _) if !x.is_null() => return Ordering::Less,
                    (_, Some(y)) if !y.is_null() => return Ordering::Greater,
                    _ => Ordering::Equal,
                };
                if *ascending { ordering } else { ordering.reverse() }
            });
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `ilike` semantics: the whole text must match, `*` matches any run of characters.
fn like(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return text == pattern;
    };

    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Number(x), Value::String(y)) => x.as_f64()?.partial_cmp(&y.parse::<f64>().ok()?),
        (Value::String(x), Value::Number(y)) => x.parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        // ISO dates and timestamps order lexicographically
        _ => Some(text(a).cmp(&text(b))),
    }
}
