use crate::{
    builder::{
        AggregateFn, AggregateSelect, BoolOp, Correlation, JoinKind, OrderDirection, Page,
        QueryBuilder, Storage, SubqueryFn,
    },
    error::Error,
    relation::AttachOp,
    session::StorageSession,
    value::Value,
};
use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

///
/// Record
///
/// One row: named fields plus named relation row sets.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Record {
    pub fields: BTreeMap<String, Value>,
    pub relations: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new(fields: &[(&str, Value)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            relations: BTreeMap::new(),
        }
    }

    pub fn with_relation(mut self, name: &str, rows: Vec<Self>) -> Self {
        self.relations.insert(name.to_string(), rows);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn from_attributes(attributes: &Value) -> Self {
        let fields = attributes
            .as_entries()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default();

        Self {
            fields,
            relations: BTreeMap::new(),
        }
    }
}

///
/// Pred
///
/// One accumulated predicate. Relation predicates are evaluated
/// eagerly into a row-index set because their callback only lives for
/// the duration of the builder call.
///

#[derive(Clone, Debug)]
enum Pred {
    Cmp {
        column: String,
        operator: String,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    Date {
        column: String,
        operator: String,
        value: Value,
    },
    Rows(BTreeSet<usize>),
    Group(Vec<(BoolOp, Pred)>),
}

#[derive(Clone, Debug)]
struct ComputedAggregate {
    function: AggregateFn,
    column: String,
    alias: String,
    universe: Vec<usize>,
}

///
/// MemoryBuilder
///

#[derive(Clone, Debug)]
pub(crate) struct MemoryBuilder {
    rows: Rc<Vec<Record>>,
    store: Option<Rc<RefCell<Vec<Record>>>>,
    preds: Vec<(BoolOp, Pred)>,
    order: Vec<(String, OrderDirection)>,
    group: Vec<String>,
    selects: Vec<String>,
    eager: Vec<String>,
    aggregates: Vec<ComputedAggregate>,
    relation_aggregates: Vec<(String, AggregateFn, String)>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    journal: Rc<RefCell<Vec<String>>>,
    fail_on: Rc<Vec<String>>,
}

impl MemoryBuilder {
    pub fn over(rows: Vec<Record>) -> Self {
        Self {
            rows: Rc::new(rows),
            store: None,
            preds: Vec::new(),
            order: Vec::new(),
            group: Vec::new(),
            selects: Vec::new(),
            eager: Vec::new(),
            aggregates: Vec::new(),
            relation_aggregates: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            journal: Rc::new(RefCell::new(Vec::new())),
            fail_on: Rc::new(Vec::new()),
        }
    }

    fn backed(store: Rc<RefCell<Vec<Record>>>, journal: Rc<RefCell<Vec<String>>>) -> Self {
        let rows = store.borrow().clone();
        Self {
            store: Some(store),
            journal,
            ..Self::over(rows)
        }
    }

    /// Make every call to `method` fail with an opaque builder error.
    pub fn failing_on(mut self, method: &str) -> Self {
        self.fail_on = Rc::new(vec![method.to_string()]);
        self
    }

    /// Journal of shaping calls, in application order.
    pub fn call_log(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    /// True when no shaping call has touched this builder.
    pub fn is_unshaped(&self) -> bool {
        self.preds.is_empty()
            && self.order.is_empty()
            && self.group.is_empty()
            && self.selects.is_empty()
            && self.eager.is_empty()
            && self.aggregates.is_empty()
            && self.relation_aggregates.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && !self.distinct
    }

    fn record_call(&self, call: String) {
        self.journal.borrow_mut().push(call);
    }

    fn check_failure(&self, method: &str) -> Result<(), Error> {
        if self.fail_on.iter().any(|m| m == method) {
            return Err(Error::builder(format!("injected failure in {method}")));
        }
        Ok(())
    }

    /// A sub-scope builder over the given rows, sharing the journal.
    fn scope(&self, rows: Vec<Record>) -> Self {
        Self {
            journal: Rc::clone(&self.journal),
            fail_on: Rc::clone(&self.fail_on),
            ..Self::over(rows)
        }
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    fn matching_indices(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&i| eval_chain(&self.preds, &self.rows, i))
            .collect()
    }

    fn shaped_rows(&self) -> Vec<Record> {
        let indices = self.matching_indices();
        let mut rows: Vec<Record> = indices.iter().map(|&i| self.rows[i].clone()).collect();

        // Computed aggregate columns observe the filtered set.
        for agg in &self.aggregates {
            let universe: Vec<&Record> = agg.universe.iter().map(|&i| &self.rows[i]).collect();
            for row in &mut rows {
                let anchor = row.field(&agg.column).cloned().unwrap_or(Value::Null);
                let group: Vec<&Record> = universe
                    .iter()
                    .filter(|other| {
                        other
                            .field(&agg.column)
                            .is_some_and(|v| loose_eq(v, &anchor))
                    })
                    .copied()
                    .collect();

                row.fields
                    .insert(agg.alias.clone(), aggregate_over(agg.function, &group, &agg.column));
            }
        }

        for (relation, function, column) in &self.relation_aggregates {
            for row in &mut rows {
                let related: Vec<&Record> = row
                    .relations
                    .get(relation)
                    .map(|rows| rows.iter().collect())
                    .unwrap_or_default();
                let alias = format!("{}_{relation}", function.label());
                let value = aggregate_over(*function, &related, column);
                row.fields.insert(alias, value);
            }
        }

        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                for (column, direction) in &self.order {
                    let left = a.field(column).cloned().unwrap_or(Value::Null);
                    let right = b.field(column).cloned().unwrap_or(Value::Null);
                    let ord = left.total_cmp(&right);
                    let ord = match direction {
                        OrderDirection::Asc => ord,
                        OrderDirection::Desc => ord.reverse(),
                    };
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            });
        }

        if self.distinct {
            let mut seen: Vec<Record> = Vec::new();
            rows.retain(|row| {
                if seen.contains(row) {
                    false
                } else {
                    seen.push(row.clone());
                    true
                }
            });
        }

        if let Some(offset) = self.offset {
            let offset = usize::try_from(offset).unwrap_or(usize::MAX);
            rows = rows.into_iter().skip(offset).collect();
        }
        if let Some(limit) = self.limit {
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            rows.truncate(limit);
        }

        if !self.selects.is_empty() {
            for row in &mut rows {
                let kept: BTreeMap<String, Value> = row
                    .fields
                    .iter()
                    .filter(|(name, _)| {
                        self.selects.contains(*name)
                            || self.aggregates.iter().any(|a| &a.alias == *name)
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                row.fields = kept;
            }
        }

        // Bare gets keep every relation for inspection; an explicit
        // eager list narrows them.
        if !self.eager.is_empty() {
            for row in &mut rows {
                row.relations.retain(|name, _| self.eager.contains(name));
            }
        }

        rows
    }
}

impl QueryBuilder for MemoryBuilder {
    fn where_clause(
        mut self,
        column: &str,
        operator: &str,
        value: Value,
        boolean: BoolOp,
    ) -> Result<Self, Error> {
        self.check_failure("where")?;
        self.record_call(format!("where({column},{operator},{boolean})"));
        self.preds.push((
            boolean,
            Pred::Cmp {
                column: column.to_string(),
                operator: operator.to_string(),
                value,
            },
        ));
        Ok(self)
    }

    fn where_group(mut self, callback: SubqueryFn<'_, Self>, boolean: BoolOp) -> Result<Self, Error> {
        self.check_failure("whereGroup")?;
        self.record_call(format!("whereGroup({boolean})"));

        let scope = self.scope(self.rows.as_ref().clone());
        let applied = callback(scope)?;
        self.preds.push((boolean, Pred::Group(applied.preds)));
        Ok(self)
    }

    fn where_in(
        mut self,
        column: &str,
        values: Vec<Value>,
        negated: bool,
        boolean: BoolOp,
    ) -> Result<Self, Error> {
        self.check_failure("whereIn")?;
        self.record_call(format!("whereIn({column},{negated})"));
        self.preds.push((
            boolean,
            Pred::In {
                column: column.to_string(),
                values,
                negated,
            },
        ));
        Ok(self)
    }

    fn where_between(
        mut self,
        column: &str,
        low: Value,
        high: Value,
        boolean: BoolOp,
    ) -> Result<Self, Error> {
        self.check_failure("whereBetween")?;
        self.record_call(format!("whereBetween({column})"));
        self.preds.push((
            boolean,
            Pred::Between {
                column: column.to_string(),
                low,
                high,
            },
        ));
        Ok(self)
    }

    fn where_null(mut self, column: &str, negated: bool, boolean: BoolOp) -> Result<Self, Error> {
        self.check_failure("whereNull")?;
        self.record_call(format!("whereNull({column},{negated})"));
        self.preds.push((
            boolean,
            Pred::Null {
                column: column.to_string(),
                negated,
            },
        ));
        Ok(self)
    }

    fn where_date(
        mut self,
        column: &str,
        operator: &str,
        value: Value,
        boolean: BoolOp,
    ) -> Result<Self, Error> {
        self.check_failure("whereDate")?;
        self.record_call(format!("whereDate({column},{operator})"));
        self.preds.push((
            boolean,
            Pred::Date {
                column: column.to_string(),
                operator: operator.to_string(),
                value,
            },
        ));
        Ok(self)
    }

    fn where_relation(
        mut self,
        relation: &str,
        operator: &str,
        count: u64,
        boolean: BoolOp,
        callback: Option<SubqueryFn<'_, Self>>,
    ) -> Result<Self, Error> {
        self.check_failure("whereRelation")?;
        self.record_call(format!("whereRelation({relation},{operator},{count},{boolean})"));

        let mut matched = BTreeSet::new();
        for (index, row) in self.rows.iter().enumerate() {
            let related = row.relations.get(relation).cloned().unwrap_or_default();
            let scope = self.scope(related);
            let scope = match &callback {
                Some(callback) => callback(scope)?,
                None => scope,
            };
            let related_count = scope.matching_indices().len() as u64;

            if count_satisfies(related_count, operator, count) {
                matched.insert(index);
            }
        }

        self.preds.push((boolean, Pred::Rows(matched)));
        Ok(self)
    }

    fn order_by(mut self, column: &str, direction: OrderDirection) -> Result<Self, Error> {
        self.check_failure("orderBy")?;
        self.record_call(format!("orderBy({column},{direction})"));
        self.order.push((column.to_string(), direction));
        Ok(self)
    }

    fn group_by(mut self, columns: Vec<String>) -> Result<Self, Error> {
        self.check_failure("groupBy")?;
        self.record_call(format!("groupBy({})", columns.join(",")));
        self.group.extend(columns);
        Ok(self)
    }

    fn join(
        mut self,
        kind: JoinKind,
        table: Option<&str>,
        left: &str,
        operator: &str,
        right: &str,
    ) -> Result<Self, Error> {
        self.check_failure("join")?;
        self.record_call(format!(
            "join({kind},{},{left},{operator},{right})",
            table.unwrap_or("-")
        ));
        // Row sets are pre-joined in fixtures; the call itself is the
        // observable effect.
        Ok(self)
    }

    fn limit(mut self, count: u64) -> Result<Self, Error> {
        self.check_failure("limit")?;
        self.record_call(format!("limit({count})"));
        self.limit = Some(count);
        Ok(self)
    }

    fn skip(mut self, count: u64) -> Result<Self, Error> {
        self.check_failure("skip")?;
        self.record_call(format!("skip({count})"));
        self.offset = Some(count);
        Ok(self)
    }

    fn take(mut self, count: u64) -> Result<Self, Error> {
        self.check_failure("take")?;
        self.record_call(format!("take({count})"));
        self.limit = Some(count);
        Ok(self)
    }

    fn distinct(mut self) -> Result<Self, Error> {
        self.check_failure("distinct")?;
        self.record_call("distinct()".to_string());
        self.distinct = true;
        Ok(self)
    }

    fn select(mut self, columns: Vec<String>) -> Result<Self, Error> {
        self.check_failure("select")?;
        self.record_call(format!("select({})", columns.join(",")));
        self.selects.extend(columns);
        Ok(self)
    }

    fn with_related(mut self, relations: Vec<String>) -> Result<Self, Error> {
        self.check_failure("withRelated")?;
        self.record_call(format!("withRelated({})", relations.join(",")));
        self.eager.extend(relations);
        Ok(self)
    }

    fn with_aggregate(
        mut self,
        relation: &str,
        function: AggregateFn,
        column: &str,
    ) -> Result<Self, Error> {
        self.check_failure("withAggregate")?;
        self.record_call(format!("withAggregate({relation},{function},{column})"));
        self.relation_aggregates
            .push((relation.to_string(), function, column.to_string()));
        Ok(self)
    }

    fn add_select_aggregate(
        mut self,
        select: &AggregateSelect,
        callback: Option<SubqueryFn<'_, Self>>,
    ) -> Result<Self, Error> {
        self.check_failure("addSelectAggregate")?;
        self.record_call(format!(
            "addSelectAggregate({},{},{})",
            select.function, select.column, select.alias
        ));

        // Clone of the current query shape (or the bare table for
        // self-joins), refined by the callback, becomes the
        // correlation universe.
        let base = match select.correlation {
            Correlation::Filtered => self.clone(),
            Correlation::SelfJoin => self.scope(self.rows.as_ref().clone()),
        };
        let base = match &callback {
            Some(callback) => callback(base)?,
            None => base,
        };

        self.aggregates.push(ComputedAggregate {
            function: select.function,
            column: select.column.clone(),
            alias: select.alias.clone(),
            universe: base.matching_indices(),
        });
        Ok(self)
    }
}

impl Storage for MemoryBuilder {
    type Row = Record;

    fn get(self) -> Result<Vec<Record>, Error> {
        self.check_failure("get")?;
        Ok(self.shaped_rows())
    }

    fn first(self) -> Result<Option<Record>, Error> {
        self.check_failure("first")?;
        Ok(self.shaped_rows().into_iter().next())
    }

    fn paginate(self, page: u64, per_page: u64) -> Result<Page<Record>, Error> {
        self.check_failure("paginate")?;
        let rows = self.shaped_rows();
        let total = rows.len() as u64;
        let start = usize::try_from(page.saturating_sub(1) * per_page).unwrap_or(usize::MAX);
        let per = usize::try_from(per_page).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(start).take(per).collect();

        Ok(Page {
            rows,
            page,
            per_page,
            total,
        })
    }

    fn create(self, attributes: &Value) -> Result<Record, Error> {
        self.check_failure("create")?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::builder("builder has no backing store"))?;

        let record = Record::from_attributes(attributes);
        store.borrow_mut().push(record.clone());
        Ok(record)
    }

    fn update(self, attributes: &Value) -> Result<u64, Error> {
        self.check_failure("update")?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::builder("builder has no backing store"))?;

        let indices = self.matching_indices();
        let mut rows = store.borrow_mut();
        for &index in &indices {
            if let (Some(row), Some(entries)) = (rows.get_mut(index), attributes.as_entries()) {
                for (key, value) in entries {
                    row.fields.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(indices.len() as u64)
    }

    fn delete(self) -> Result<u64, Error> {
        self.check_failure("delete")?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::builder("builder has no backing store"))?;

        let indices: BTreeSet<usize> = self.matching_indices().into_iter().collect();
        let mut rows = store.borrow_mut();
        let before = rows.len();
        let mut index = 0;
        rows.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });

        Ok((before - rows.len()) as u64)
    }

    fn update_or_create(self, matching: &Value, attributes: &Value) -> Result<Record, Error> {
        self.check_failure("updateOrCreate")?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::builder("builder has no backing store"))?;

        let matches = |row: &Record| {
            matching.as_entries().is_some_and(|entries| {
                entries
                    .iter()
                    .all(|(key, value)| row.field(key).is_some_and(|v| loose_eq(v, value)))
            })
        };

        let mut rows = store.borrow_mut();
        if let Some(row) = rows.iter_mut().find(|row| matches(row)) {
            if let Some(entries) = attributes.as_entries() {
                for (key, value) in entries {
                    row.fields.insert(key.clone(), value.clone());
                }
            }
            return Ok(row.clone());
        }

        let mut record = Record::from_attributes(matching);
        if let Some(entries) = attributes.as_entries() {
            for (key, value) in entries {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        rows.push(record.clone());
        Ok(record)
    }
}

///
/// MemoryStore
///
/// Storage session over a shared row set with snapshot-based
/// transaction semantics: rollback restores the rows captured at
/// `begin`.
///

pub(crate) struct MemoryStore {
    rows: Rc<RefCell<Vec<Record>>>,
    snapshot: RefCell<Option<Vec<Record>>>,
    journal: Rc<RefCell<Vec<String>>>,
}

impl MemoryStore {
    pub fn seeded(rows: Vec<Record>) -> Self {
        Self {
            rows: Rc::new(RefCell::new(rows)),
            snapshot: RefCell::new(None),
            journal: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn rows(&self) -> Vec<Record> {
        self.rows.borrow().clone()
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }

    fn log(&self, entry: &str) {
        self.journal.borrow_mut().push(entry.to_string());
    }
}

impl StorageSession for MemoryStore {
    type Builder = MemoryBuilder;

    fn builder(&self) -> MemoryBuilder {
        MemoryBuilder::backed(Rc::clone(&self.rows), Rc::clone(&self.journal))
    }

    fn begin(&self) -> Result<(), Error> {
        self.log("begin");
        *self.snapshot.borrow_mut() = Some(self.rows.borrow().clone());
        Ok(())
    }

    fn commit(&self) -> Result<(), Error> {
        self.log("commit");
        *self.snapshot.borrow_mut() = None;
        Ok(())
    }

    fn rollback(&self) -> Result<(), Error> {
        self.log("rollback");
        if let Some(snapshot) = self.snapshot.borrow_mut().take() {
            *self.rows.borrow_mut() = snapshot;
        }
        Ok(())
    }

    fn attach(&self, primary: &Record, op: &AttachOp) -> Result<(), Error> {
        let id = primary
            .field("id")
            .cloned()
            .ok_or_else(|| Error::builder("primary row has no id"))?;

        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|row| row.field("id").is_some_and(|v| loose_eq(v, &id)))
            .ok_or_else(|| Error::builder("primary row not found"))?;

        let mut record = Record::from_attributes(&op.attributes);
        if let Some(pivot) = &op.pivot {
            record
                .fields
                .insert("pivot".to_string(), pivot.clone());
        }

        attach_at(row, &op.path, record);
        Ok(())
    }
}

/// Walk the relation path, attaching under the first row of each
/// intermediate relation.
fn attach_at(row: &mut Record, path: &[String], record: Record) {
    match path {
        [] => {}
        [leaf] => row.relations.entry(leaf.clone()).or_default().push(record),
        [head, rest @ ..] => {
            let related = row.relations.entry(head.clone()).or_default();
            if related.is_empty() {
                related.push(Record::default());
            }
            attach_at(&mut related[0], rest, record);
        }
    }
}

// ------------------------------------------------------------------
// Predicate evaluation
// ------------------------------------------------------------------

/// SQL-style left fold: `a AND b OR c` groups as `(a AND b) OR c`.
fn eval_chain(preds: &[(BoolOp, Pred)], rows: &[Record], index: usize) -> bool {
    let mut result: Option<bool> = None;
    for (boolean, pred) in preds {
        let matched = eval_pred(pred, rows, index);
        result = Some(match (result, boolean) {
            (None, _) => matched,
            (Some(acc), BoolOp::And) => acc && matched,
            (Some(acc), BoolOp::Or) => acc || matched,
        });
    }
    result.unwrap_or(true)
}

fn eval_pred(pred: &Pred, rows: &[Record], index: usize) -> bool {
    let row = &rows[index];
    match pred {
        Pred::Cmp {
            column,
            operator,
            value,
        } => row
            .field(column)
            .is_some_and(|field| compare(field, operator, value)),
        Pred::In {
            column,
            values,
            negated,
        } => {
            let contained = row
                .field(column)
                .is_some_and(|field| values.iter().any(|v| loose_eq(field, v)));
            contained != *negated
        }
        Pred::Between { column, low, high } => row.field(column).is_some_and(|field| {
            compare(field, ">=", low) && compare(field, "<=", high)
        }),
        Pred::Null { column, negated } => {
            let is_null = row.field(column).is_none_or(Value::is_null);
            is_null != *negated
        }
        Pred::Date {
            column,
            operator,
            value,
        } => {
            let (Some(field), Some(target)) = (
                row.field(column).and_then(Value::as_date),
                value.as_date(),
            ) else {
                return false;
            };
            let ord = field.cmp(&target);
            ordering_satisfies(ord, operator)
        }
        Pred::Rows(indices) => indices.contains(&index),
        Pred::Group(inner) => eval_chain(inner, rows, index),
    }
}

fn compare(field: &Value, operator: &str, value: &Value) -> bool {
    if operator.eq_ignore_ascii_case("like") {
        return like_match(field, value);
    }

    let ord = loose_cmp(field, value);
    ordering_satisfies(ord, operator)
}

fn ordering_satisfies(ord: std::cmp::Ordering, operator: &str) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match operator {
        "=" | "==" => ord == Equal,
        "!=" | "<>" => ord != Equal,
        "<" => ord == Less,
        "<=" => ord != Greater,
        ">" => ord == Greater,
        ">=" => ord != Less,
        _ => false,
    }
}

/// Comparison with numeric-text coercion: `"30"` equals `30`.
fn loose_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    let numeric = |v: &Value| -> Option<f64> {
        match v {
            Value::Int(n) => Some(*n as f64),
            Value::Uint(n) => Some(*n as f64),
            Value::Float(n) => Some(n.get()),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    };

    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.total_cmp(b),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    loose_cmp(a, b) == std::cmp::Ordering::Equal
}

/// Case-insensitive SQL LIKE with `%` wildcards at either end.
fn like_match(field: &Value, pattern: &Value) -> bool {
    let (Some(field), Some(pattern)) = (field.as_text(), pattern.as_text()) else {
        return false;
    };
    let field = field.to_lowercase();
    let pattern = pattern.to_lowercase();

    match (pattern.strip_prefix('%'), pattern.strip_suffix('%')) {
        (Some(rest), Some(_)) => {
            let needle = rest.strip_suffix('%').unwrap_or(rest);
            field.contains(needle)
        }
        (Some(rest), None) => field.ends_with(rest),
        (None, Some(rest)) => field.starts_with(rest),
        (None, None) => field == pattern,
    }
}

fn count_satisfies(actual: u64, operator: &str, expected: u64) -> bool {
    match operator {
        "=" | "==" => actual == expected,
        "!=" | "<>" => actual != expected,
        "<" => actual < expected,
        "<=" => actual <= expected,
        ">" => actual > expected,
        ">=" => actual >= expected,
        _ => false,
    }
}

fn aggregate_over(function: AggregateFn, group: &[&Record], column: &str) -> Value {
    let values: Vec<&Value> = group
        .iter()
        .filter_map(|row| row.field(column))
        .filter(|v| !v.is_null())
        .collect();

    match function.base() {
        AggregateFn::Count => Value::Uint(values.len() as u64),
        AggregateFn::Sum => Value::float(values.iter().map(|v| numeric(v)).sum()),
        AggregateFn::Avg => {
            if values.is_empty() {
                Value::Null
            } else {
                let sum: f64 = values.iter().map(|v| numeric(v)).sum();
                Value::float(sum / values.len() as f64)
            }
        }
        AggregateFn::Min => values
            .iter()
            .min_by(|a, b| loose_cmp(a, b))
            .map_or(Value::Null, |v| (*v).clone()),
        AggregateFn::Max => values
            .iter()
            .max_by(|a, b| loose_cmp(a, b))
            .map_or(Value::Null, |v| (*v).clone()),
        AggregateFn::AddCount | AggregateFn::AddSum => {
            unreachable!("base() folds the add variants away")
        }
    }
}

/// Numeric view for summation; non-numeric values contribute nothing.
fn numeric(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Uint(n) => *n as f64,
        Value::Float(n) => n.get(),
        Value::Text(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
