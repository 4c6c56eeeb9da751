//! Bidirectional mapping between native [`Value`]s and wire
//! [`AttributeValue`]s.
//!
//! A [`Mapper`] is built once per shape node and is immutable afterwards.
//! Containers hold the mappers of their item/value shapes, records hold one
//! mapper per member, so a read or write is a single structural recursion
//! that threads a [`ValuePath`] for error reporting.
//!
//! Reading collects every constraint violation before failing; a wire value
//! with the wrong tag fails immediately with a [`MapperError::TypeMismatch`].

mod cache;
mod path;
mod validation;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use dynashape_model::{AttributeValue, Shape, ShapeKind, Value};

pub use cache::MapperCache;
pub use path::ValuePath;

use crate::attribute_shape::{SetTag, set_tag};
use crate::error::{MapperError, SchemaError, Violation, Violations};
use validation::Check;

/// Read/write function pair for one shape.
#[derive(Debug)]
pub struct Mapper {
    shape: Arc<Shape>,
    kind: MapperKind,
    checks: Vec<Check>,
    validate: bool,
}

#[derive(Debug)]
enum MapperKind {
    String,
    Number,
    Boolean,
    Binary,
    Timestamp,
    Nothing,
    Any,
    Enum(Vec<String>),
    Literal(AttributeValue),
    List(Arc<Mapper>),
    /// `tag: None` stores the set as `{L}`.
    Set {
        item: Arc<Mapper>,
        tag: Option<SetTag>,
    },
    Map(Arc<Mapper>),
    Record {
        name: String,
        fields: Vec<Field>,
    },
    Union(Vec<Arc<Mapper>>),
}

#[derive(Debug)]
struct Field {
    name: String,
    mapper: Arc<Mapper>,
    optional: bool,
}

impl Mapper {
    /// Build a mapper for `shape` with the default configuration and a
    /// throwaway cache. Prefer [`MapperCache::mapper_for`] for repeated use.
    pub fn of(shape: &Arc<Shape>) -> Result<Arc<Self>, SchemaError> {
        MapperCache::default().mapper_for(shape)
    }

    pub(crate) fn build(
        shape: &Arc<Shape>,
        cache: &MapperCache,
        path: &mut ValuePath,
    ) -> Result<Self, SchemaError> {
        let checks = validation::compile(shape.constraints(), path)?;
        let kind = match shape.kind() {
            ShapeKind::String => MapperKind::String,
            ShapeKind::Number => MapperKind::Number,
            ShapeKind::Boolean => MapperKind::Boolean,
            ShapeKind::Binary => MapperKind::Binary,
            ShapeKind::Timestamp => MapperKind::Timestamp,
            ShapeKind::Nothing => MapperKind::Nothing,
            ShapeKind::Any => MapperKind::Any,
            ShapeKind::Enum(values) => MapperKind::Enum(values.clone()),
            ShapeKind::Literal(value) => {
                let wire = write_dynamic(value, path).map_err(|e| SchemaError::UnsupportedShape {
                    path: path.to_string(),
                    kind: "literal",
                    reason: e.to_string(),
                })?;
                MapperKind::Literal(wire)
            }
            ShapeKind::List(item) => MapperKind::List(nested(cache, item, path, None)?),
            ShapeKind::Set(item) => {
                let tag = if cache.config().set_as_list {
                    None
                } else {
                    Some(set_tag(item).ok_or_else(|| SchemaError::UnsupportedShape {
                        path: path.to_string(),
                        kind: "set",
                        reason: format!(
                            "set items must be string, number or binary, got {}",
                            item.kind().name()
                        ),
                    })?)
                };
                MapperKind::Set {
                    item: nested(cache, item, path, None)?,
                    tag,
                }
            }
            ShapeKind::Map(value) => MapperKind::Map(nested(cache, value, path, Some("*"))?),
            ShapeKind::Record(record) => {
                let mut seen = HashSet::new();
                let mut fields = Vec::with_capacity(record.members.len());
                for member in &record.members {
                    if !seen.insert(member.name.as_str()) {
                        return Err(SchemaError::DuplicateMember {
                            record: record.name.clone(),
                            member: member.name.clone(),
                        });
                    }
                    fields.push(Field {
                        name: member.name.clone(),
                        mapper: nested(cache, &member.shape, path, Some(&member.name))?,
                        optional: member.shape.is_optional(),
                    });
                }
                MapperKind::Record {
                    name: record.name.clone(),
                    fields,
                }
            }
            ShapeKind::Union(members) => {
                if members.is_empty() {
                    return Err(SchemaError::UnsupportedShape {
                        path: path.to_string(),
                        kind: "union",
                        reason: "a union needs at least one member".to_owned(),
                    });
                }
                MapperKind::Union(
                    members
                        .iter()
                        .map(|m| cache.resolve(m, path))
                        .collect::<Result<_, _>>()?,
                )
            }
            ShapeKind::Function | ShapeKind::Never => {
                return Err(SchemaError::UnsupportedShape {
                    path: path.to_string(),
                    kind: shape.kind().name(),
                    reason: "not a data type".to_owned(),
                });
            }
        };
        Ok(Self {
            shape: Arc::clone(shape),
            kind,
            checks,
            validate: cache.config().validate_on_read,
        })
    }

    fn plain(shape: Shape, kind: MapperKind) -> Arc<Self> {
        Arc::new(Self {
            shape: Arc::new(shape),
            kind,
            checks: Vec::new(),
            validate: true,
        })
    }

    /// Mapper for derived numbers such as `size(...)` results.
    pub(crate) fn number() -> Arc<Self> {
        Self::plain(Shape::number(), MapperKind::Number)
    }

    /// Mapper for plain string operands such as `attribute_type` tags.
    pub(crate) fn string() -> Arc<Self> {
        Self::plain(Shape::string(), MapperKind::String)
    }

    /// The shape this mapper was built for.
    #[must_use]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    /// Item mapper of a list or set.
    #[must_use]
    pub fn item(&self) -> Option<&Arc<Mapper>> {
        match &self.kind {
            MapperKind::List(item) | MapperKind::Set { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Value mapper of a map.
    #[must_use]
    pub fn value(&self) -> Option<&Arc<Mapper>> {
        match &self.kind {
            MapperKind::Map(value) => Some(value),
            _ => None,
        }
    }

    /// Mapper of a record member.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Arc<Mapper>> {
        match &self.kind {
            MapperKind::Record { fields, .. } => {
                fields.iter().find(|f| f.name == name).map(|f| &f.mapper)
            }
            _ => None,
        }
    }

    /// Member mappers of a union, in declaration order.
    #[must_use]
    pub fn variants(&self) -> &[Arc<Mapper>] {
        match &self.kind {
            MapperKind::Union(members) => members,
            _ => &[],
        }
    }

    /// The wire tag(s) this mapper reads, e.g. `S` or `N | NULL`.
    #[must_use]
    pub fn expected(&self) -> String {
        let tag = match &self.kind {
            MapperKind::String | MapperKind::Timestamp | MapperKind::Enum(_) => "S",
            MapperKind::Number => "N",
            MapperKind::Boolean => "BOOL",
            MapperKind::Binary => "B",
            MapperKind::Nothing => "NULL",
            MapperKind::Any => "any",
            MapperKind::Literal(wire) => wire.type_descriptor(),
            MapperKind::List(_) | MapperKind::Set { tag: None, .. } => "L",
            MapperKind::Set {
                tag: Some(SetTag::Ss),
                ..
            } => "SS",
            MapperKind::Set {
                tag: Some(SetTag::Ns),
                ..
            } => "NS",
            MapperKind::Set {
                tag: Some(SetTag::Bs),
                ..
            } => "BS",
            MapperKind::Map(_) | MapperKind::Record { .. } => "M",
            MapperKind::Union(members) => {
                return members
                    .iter()
                    .map(|m| m.expected())
                    .collect::<Vec<_>>()
                    .join(" | ");
            }
        };
        tag.to_owned()
    }

    fn expected_native(&self) -> String {
        match &self.kind {
            MapperKind::Record { name, .. } => format!("record {name}"),
            MapperKind::Union(members) => members
                .iter()
                .map(|m| m.expected_native())
                .collect::<Vec<_>>()
                .join(" | "),
            _ => self.shape.kind().name().to_owned(),
        }
    }

    /// Decode a wire value.
    pub fn read(&self, wire: &AttributeValue) -> Result<Value, MapperError> {
        let mut path = ValuePath::root();
        let mut violations = Vec::new();
        let value = self.read_at(wire, &mut path, &mut violations)?;
        finish(value, violations)
    }

    /// Decode a top-level item (the `Item` map of a get/query response).
    pub fn read_item(&self, item: &HashMap<String, AttributeValue>) -> Result<Value, MapperError> {
        let mut path = ValuePath::root();
        let MapperKind::Record { fields, .. } = &self.kind else {
            return Err(mismatch(&path, self.expected(), "item"));
        };
        let mut violations = Vec::new();
        let value = Value::Map(read_fields(fields, item, &mut path, &mut violations)?);
        self.check(&value, &path, &mut violations);
        finish(value, violations)
    }

    /// Encode a native value.
    pub fn write(&self, value: &Value) -> Result<AttributeValue, MapperError> {
        self.write_at(value, &mut ValuePath::root())
    }

    /// Encode a record as a top-level item.
    pub fn write_item(
        &self,
        value: &Value,
    ) -> Result<HashMap<String, AttributeValue>, MapperError> {
        let mut path = ValuePath::root();
        let (MapperKind::Record { fields, .. }, Value::Map(entries)) = (&self.kind, value) else {
            return Err(mismatch(&path, self.expected_native(), value.kind()));
        };
        write_fields(fields, entries, &mut path)
    }

    fn read_at(
        &self,
        wire: &AttributeValue,
        path: &mut ValuePath,
        violations: &mut Vec<Violation>,
    ) -> Result<Value, MapperError> {
        let value = match (&self.kind, wire) {
            (MapperKind::String, AttributeValue::S(s)) => Value::String(s.clone()),
            (MapperKind::Number, AttributeValue::N(n)) => Value::Number(parse_number(n, path)?),
            (MapperKind::Boolean, AttributeValue::Bool(b)) => Value::Bool(*b),
            (MapperKind::Binary, AttributeValue::B(b)) => Value::Binary(b.clone()),
            (MapperKind::Timestamp, AttributeValue::S(s)) => {
                Value::Timestamp(parse_timestamp(s, path)?)
            }
            (MapperKind::Nothing, AttributeValue::Null(_)) => Value::Null,
            (MapperKind::Any, wire) => read_dynamic(wire, path)?,
            (MapperKind::Enum(values), AttributeValue::S(s)) => {
                if self.validate && !values.iter().any(|v| v == s) {
                    violations.push(Violation {
                        path: path.to_string(),
                        message: format!("{s:?} is not one of {values:?}"),
                    });
                }
                Value::String(s.clone())
            }
            (MapperKind::Literal(expected), wire) => {
                if self.validate && wire != expected {
                    violations.push(Violation {
                        path: path.to_string(),
                        message: format!("expected literal {expected}, found {wire}"),
                    });
                }
                read_dynamic(wire, path)?
            }
            (MapperKind::List(item), AttributeValue::L(items)) => {
                Value::List(read_list(item, items, path, violations)?)
            }
            (
                MapperKind::Set {
                    item,
                    tag: Some(SetTag::Ss),
                },
                AttributeValue::Ss(items),
            ) => {
                let wires: Vec<_> = distinct(items).into_iter().map(AttributeValue::S).collect();
                Value::Set(read_set(item, &wires, path, violations)?)
            }
            (
                MapperKind::Set {
                    item,
                    tag: Some(SetTag::Ns),
                },
                AttributeValue::Ns(items),
            ) => {
                let wires: Vec<_> = distinct(items).into_iter().map(AttributeValue::N).collect();
                Value::Set(read_set(item, &wires, path, violations)?)
            }
            (
                MapperKind::Set {
                    item,
                    tag: Some(SetTag::Bs),
                },
                AttributeValue::Bs(items),
            ) => {
                let wires: Vec<_> = distinct(items).into_iter().map(AttributeValue::B).collect();
                Value::Set(read_set(item, &wires, path, violations)?)
            }
            (MapperKind::Set { item, tag: None }, AttributeValue::L(items)) => {
                Value::Set(read_set(item, &distinct(items), path, violations)?)
            }
            (MapperKind::Map(value), AttributeValue::M(entries)) => {
                let mut out = BTreeMap::new();
                for (key, wire) in entries {
                    path.push_key(key);
                    let read = value.read_at(wire, path, violations);
                    path.pop();
                    out.insert(key.clone(), read?);
                }
                Value::Map(out)
            }
            (MapperKind::Record { fields, .. }, AttributeValue::M(entries)) => {
                Value::Map(read_fields(fields, entries, path, violations)?)
            }
            (MapperKind::Union(members), wire) => {
                let here = path.to_string();
                let mut nested_error = None;
                let mut found = None;
                let mut fallback = None;
                for member in members {
                    let mut scratch = Vec::new();
                    match member.read_at(wire, path, &mut scratch) {
                        Ok(value) if member.admits(wire) => {
                            violations.append(&mut scratch);
                            found = Some(value);
                            break;
                        }
                        Ok(value) => {
                            fallback.get_or_insert((value, scratch));
                        }
                        Err(MapperError::TypeMismatch { path: at, .. }) if at == here => {}
                        Err(e @ MapperError::TypeMismatch { .. }) => {
                            nested_error.get_or_insert(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                match (found, fallback) {
                    (Some(value), _) => value,
                    (None, Some((value, mut scratch))) => {
                        violations.append(&mut scratch);
                        value
                    }
                    (None, None) => {
                        return Err(nested_error.unwrap_or_else(|| {
                            mismatch(path, self.expected(), wire.type_descriptor())
                        }));
                    }
                }
            }
            (_, wire) => return Err(mismatch(path, self.expected(), wire.type_descriptor())),
        };
        self.check(&value, path, violations);
        Ok(value)
    }

    /// Whether a union should settle on this member for `wire`. Literal and
    /// enum members only claim the values they name.
    fn admits(&self, wire: &AttributeValue) -> bool {
        match (&self.kind, wire) {
            (MapperKind::Literal(expected), wire) => wire == expected,
            (MapperKind::Enum(values), AttributeValue::S(s)) => values.iter().any(|v| v == s),
            (MapperKind::Union(members), wire) => members.iter().any(|m| m.admits(wire)),
            _ => true,
        }
    }

    fn check(&self, value: &Value, path: &ValuePath, violations: &mut Vec<Violation>) {
        if !self.validate {
            return;
        }
        violations.extend(
            self.checks
                .iter()
                .filter_map(|c| c.violation(value))
                .map(|message| Violation {
                    path: path.to_string(),
                    message,
                }),
        );
    }

    fn write_at(&self, value: &Value, path: &mut ValuePath) -> Result<AttributeValue, MapperError> {
        let wire = match (&self.kind, value) {
            (MapperKind::String | MapperKind::Enum(_), Value::String(s)) => {
                AttributeValue::S(s.clone())
            }
            (MapperKind::Number, Value::Number(n)) => AttributeValue::N(format_number(*n, path)?),
            (MapperKind::Boolean, Value::Bool(b)) => AttributeValue::Bool(*b),
            (MapperKind::Binary, Value::Binary(b)) => AttributeValue::B(b.clone()),
            (MapperKind::Timestamp, Value::Timestamp(t)) => AttributeValue::S(format_timestamp(t)),
            (MapperKind::Nothing, Value::Null) => AttributeValue::null(),
            (MapperKind::Any, value) => write_dynamic(value, path)?,
            (MapperKind::Literal(expected), value) => {
                let wire = write_dynamic(value, path)?;
                if wire != *expected {
                    return Err(mismatch(path, expected.to_string(), wire.to_string()));
                }
                wire
            }
            (MapperKind::List(item), Value::List(items)) => {
                AttributeValue::L(write_list(item, items, path)?)
            }
            (MapperKind::Set { item, tag }, Value::Set(items)) => {
                write_set(item, *tag, items, path)?
            }
            (MapperKind::Map(mapper), Value::Map(entries)) => {
                let mut out = HashMap::with_capacity(entries.len());
                for (key, v) in entries {
                    path.push_key(key);
                    let wire = mapper.write_at(v, path);
                    path.pop();
                    out.insert(key.clone(), wire?);
                }
                AttributeValue::M(out)
            }
            (MapperKind::Record { fields, .. }, Value::Map(entries)) => {
                AttributeValue::M(write_fields(fields, entries, path)?)
            }
            (MapperKind::Union(members), value) => {
                let here = path.to_string();
                let mut nested_error = None;
                for member in members {
                    match member.write_at(value, path) {
                        Ok(wire) => return Ok(wire),
                        Err(MapperError::TypeMismatch { path: at, .. }) if at == here => {}
                        Err(e @ MapperError::TypeMismatch { .. }) => {
                            nested_error.get_or_insert(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                return Err(nested_error
                    .unwrap_or_else(|| mismatch(path, self.expected_native(), value.kind())));
            }
            (_, value) => return Err(mismatch(path, self.expected_native(), value.kind())),
        };
        Ok(wire)
    }
}

fn nested(
    cache: &MapperCache,
    shape: &Arc<Shape>,
    path: &mut ValuePath,
    key: Option<&str>,
) -> Result<Arc<Mapper>, SchemaError> {
    match key {
        Some(key) => path.push_key(key),
        None => path.push_index(0),
    }
    let mapper = cache.resolve(shape, path);
    path.pop();
    mapper
}

fn finish(value: Value, violations: Vec<Violation>) -> Result<Value, MapperError> {
    if violations.is_empty() {
        Ok(value)
    } else {
        Err(MapperError::Validation(Violations(violations)))
    }
}

fn mismatch(
    path: &ValuePath,
    expected: impl Into<String>,
    found: impl Into<String>,
) -> MapperError {
    MapperError::TypeMismatch {
        path: path.to_string(),
        expected: expected.into(),
        found: found.into(),
    }
}

/// Wire items with exact duplicates dropped, first occurrence wins.
fn distinct<T: Eq + Hash + Clone>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().filter(|i| seen.insert(*i)).cloned().collect()
}

fn read_list(
    item: &Mapper,
    items: &[AttributeValue],
    path: &mut ValuePath,
    violations: &mut Vec<Violation>,
) -> Result<Vec<Value>, MapperError> {
    let mut out = Vec::with_capacity(items.len());
    for (i, wire) in items.iter().enumerate() {
        path.push_index(i);
        let value = item.read_at(wire, path, violations);
        path.pop();
        out.push(value?);
    }
    Ok(out)
}

/// Like [`read_list`] but also collapses members that decode to the same
/// native value (`"1"` and `"1.0"` in an `NS`).
fn read_set(
    item: &Mapper,
    items: &[AttributeValue],
    path: &mut ValuePath,
    violations: &mut Vec<Violation>,
) -> Result<Vec<Value>, MapperError> {
    let mut members: Vec<Value> = Vec::with_capacity(items.len());
    for value in read_list(item, items, path, violations)? {
        if !members.contains(&value) {
            members.push(value);
        }
    }
    Ok(members)
}

fn read_fields(
    fields: &[Field],
    entries: &HashMap<String, AttributeValue>,
    path: &mut ValuePath,
    violations: &mut Vec<Violation>,
) -> Result<BTreeMap<String, Value>, MapperError> {
    let mut out = BTreeMap::new();
    for field in fields {
        path.push_key(&field.name);
        let value = match entries.get(&field.name) {
            Some(wire) => field.mapper.read_at(wire, path, violations).map(Some),
            None if field.optional => Ok(None),
            None => Err(mismatch(path, field.mapper.expected(), "nothing")),
        };
        path.pop();
        if let Some(value) = value? {
            out.insert(field.name.clone(), value);
        }
    }
    Ok(out)
}

fn write_list(
    item: &Mapper,
    items: &[Value],
    path: &mut ValuePath,
) -> Result<Vec<AttributeValue>, MapperError> {
    let mut out = Vec::with_capacity(items.len());
    for (i, value) in items.iter().enumerate() {
        path.push_index(i);
        let wire = item.write_at(value, path);
        path.pop();
        out.push(wire?);
    }
    Ok(out)
}

fn write_set(
    item: &Mapper,
    tag: Option<SetTag>,
    items: &[Value],
    path: &mut ValuePath,
) -> Result<AttributeValue, MapperError> {
    let wires = distinct(&write_list(item, items, path)?);
    Ok(match tag {
        None => AttributeValue::L(wires),
        Some(SetTag::Ss) => AttributeValue::Ss(unwrap_members(wires, path, "S", |w| match w {
            AttributeValue::S(s) => Ok(s),
            other => Err(other),
        })?),
        Some(SetTag::Ns) => AttributeValue::Ns(unwrap_members(wires, path, "N", |w| match w {
            AttributeValue::N(n) => Ok(n),
            other => Err(other),
        })?),
        Some(SetTag::Bs) => AttributeValue::Bs(unwrap_members(wires, path, "B", |w| match w {
            AttributeValue::B(b) => Ok(b),
            other => Err(other),
        })?),
    })
}

fn unwrap_members<T>(
    wires: Vec<AttributeValue>,
    path: &mut ValuePath,
    tag: &str,
    extract: impl Fn(AttributeValue) -> Result<T, AttributeValue>,
) -> Result<Vec<T>, MapperError> {
    let mut out = Vec::with_capacity(wires.len());
    for (i, wire) in wires.into_iter().enumerate() {
        match extract(wire) {
            Ok(member) => out.push(member),
            Err(other) => {
                path.push_index(i);
                let err = mismatch(path, tag, other.type_descriptor());
                path.pop();
                return Err(err);
            }
        }
    }
    Ok(out)
}

fn write_fields(
    fields: &[Field],
    entries: &BTreeMap<String, Value>,
    path: &mut ValuePath,
) -> Result<HashMap<String, AttributeValue>, MapperError> {
    let mut out = HashMap::with_capacity(fields.len());
    for field in fields {
        path.push_key(&field.name);
        let wire = match entries.get(&field.name) {
            Some(value) => field.mapper.write_at(value, path).map(Some),
            None if field.optional => Ok(None),
            None => Err(mismatch(path, field.mapper.expected_native(), "nothing")),
        };
        path.pop();
        if let Some(wire) = wire? {
            out.insert(field.name.clone(), wire);
        }
    }
    Ok(out)
}

fn parse_number(text: &str, path: &ValuePath) -> Result<f64, MapperError> {
    match text.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(mismatch(path, "decimal number", format!("{text:?}"))),
    }
}

fn format_number(n: f64, path: &ValuePath) -> Result<String, MapperError> {
    if n.is_finite() {
        Ok(n.to_string())
    } else {
        Err(mismatch(path, "finite number", n.to_string()))
    }
}

/// Drop sub-millisecond precision.
pub(crate) fn truncate_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_nanosecond(t.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(t)
}

fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(text: &str, path: &ValuePath) -> Result<DateTime<Utc>, MapperError> {
    let parsed = DateTime::parse_from_rfc3339(text)
        .map_err(|_| mismatch(path, "ISO-8601 timestamp", format!("{text:?}")))?;
    Ok(truncate_millis(parsed.with_timezone(&Utc)))
}

fn read_dynamic(wire: &AttributeValue, path: &mut ValuePath) -> Result<Value, MapperError> {
    Ok(match wire {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => Value::Number(parse_number(n, path)?),
        AttributeValue::B(b) => Value::Binary(b.clone()),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Ss(items) => {
            Value::Set(distinct(items).into_iter().map(Value::String).collect())
        }
        AttributeValue::Ns(items) => {
            let mut members = Vec::with_capacity(items.len());
            for n in distinct(items) {
                let member = Value::Number(parse_number(&n, path)?);
                if !members.contains(&member) {
                    members.push(member);
                }
            }
            Value::Set(members)
        }
        AttributeValue::Bs(items) => {
            Value::Set(distinct(items).into_iter().map(Value::Binary).collect())
        }
        AttributeValue::L(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push_index(i);
                let value = read_dynamic(item, path);
                path.pop();
                out.push(value?);
            }
            Value::List(out)
        }
        AttributeValue::M(entries) => {
            let mut out = BTreeMap::new();
            for (key, item) in entries {
                path.push_key(key);
                let value = read_dynamic(item, path);
                path.pop();
                out.insert(key.clone(), value?);
            }
            Value::Map(out)
        }
    })
}

/// Encode without a shape: the native variant picks the envelope. Sets use
/// the typed envelope when every member agrees, `{L}` otherwise.
fn write_dynamic(value: &Value, path: &mut ValuePath) -> Result<AttributeValue, MapperError> {
    Ok(match value {
        Value::Null => AttributeValue::null(),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(format_number(*n, path)?),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Binary(b) => AttributeValue::B(b.clone()),
        Value::Timestamp(t) => AttributeValue::S(format_timestamp(t)),
        Value::List(items) => AttributeValue::L(write_dynamic_items(items, path)?),
        Value::Map(entries) => {
            let mut out = HashMap::with_capacity(entries.len());
            for (key, item) in entries {
                path.push_key(key);
                let wire = write_dynamic(item, path);
                path.pop();
                out.insert(key.clone(), wire?);
            }
            AttributeValue::M(out)
        }
        Value::Set(items) => {
            let wires = distinct(&write_dynamic_items(items, path)?);
            if let Some(strings) = wires
                .iter()
                .map(|w| w.as_s().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
            {
                AttributeValue::Ss(strings)
            } else if let Some(numbers) = wires
                .iter()
                .map(|w| w.as_n().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
            {
                AttributeValue::Ns(numbers)
            } else if let Some(binaries) = wires
                .iter()
                .map(|w| w.as_b().cloned())
                .collect::<Option<Vec<_>>>()
            {
                AttributeValue::Bs(binaries)
            } else {
                AttributeValue::L(wires)
            }
        }
    })
}

fn write_dynamic_items(
    items: &[Value],
    path: &mut ValuePath,
) -> Result<Vec<AttributeValue>, MapperError> {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        path.push_index(i);
        let wire = write_dynamic(item, path);
        path.pop();
        out.push(wire?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::TimeZone;
    use dynashape_model::Constraint;

    use super::*;
    use crate::config::MapperConfig;

    fn mapper(shape: Shape) -> Arc<Mapper> {
        Mapper::of(&Arc::new(shape)).unwrap()
    }

    fn item_shape() -> Shape {
        Shape::record("Item")
            .member("id", Shape::string())
            .member("count", Shape::number())
            .optional("note", Shape::string())
            .member("tags", Shape::set(Shape::string()))
            .member("scores", Shape::map(Shape::number()))
            .member(
                "nested",
                Shape::record("Nested")
                    .member("a", Shape::string())
                    .member("when", Shape::timestamp()),
            )
            .build()
    }

    #[test]
    fn test_should_round_trip_nested_record() {
        let m = mapper(item_shape());
        let when = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let value = Value::map([
            ("id", Value::from("a")),
            ("count", Value::from(1.5)),
            ("tags", Value::set(["x", "y"])),
            ("scores", Value::map([("p", 1), ("q", 2)])),
            (
                "nested",
                Value::map([("a", Value::from("b")), ("when", Value::from(when))]),
            ),
        ]);
        let wire = m.write(&value).unwrap();
        let fields = wire.as_m().unwrap();
        assert_eq!(fields["count"], AttributeValue::N("1.5".to_owned()));
        assert_eq!(
            fields["tags"],
            AttributeValue::Ss(vec!["x".to_owned(), "y".to_owned()])
        );
        assert!(!fields.contains_key("note"));
        assert_eq!(
            fields["nested"].as_m().unwrap()["when"],
            AttributeValue::S("2020-01-02T03:04:05.000Z".to_owned())
        );
        assert_eq!(m.read(&wire).unwrap(), value);
    }

    #[test]
    fn test_should_map_empty_record_to_empty_map() {
        let m = mapper(Shape::record("Empty").build());
        let wire = m.write(&Value::map(Vec::<(String, Value)>::new())).unwrap();
        assert_eq!(wire, AttributeValue::empty_map());
        assert_eq!(m.read(&wire).unwrap(), Value::Map(BTreeMap::new()));
    }

    #[test]
    fn test_should_deduplicate_binary_set_on_read() {
        let m = mapper(Shape::set(Shape::binary()));
        let wire = AttributeValue::Bs(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"ab")]);
        let value = m.read(&wire).unwrap();
        assert_eq!(value.as_set().unwrap().len(), 1);
    }

    #[test]
    fn test_should_deduplicate_equal_numbers_on_read() {
        let m = mapper(Shape::set(Shape::number()));
        let wire = AttributeValue::Ns(vec!["1".to_owned(), "1.0".to_owned(), "2".to_owned()]);
        assert_eq!(m.read(&wire).unwrap(), Value::set([1, 2]));
    }

    #[test]
    fn test_should_deduplicate_set_members_on_write() {
        let m = mapper(Shape::set(Shape::string()));
        let wire = m.write(&Value::set(["b", "a", "b"])).unwrap();
        assert_eq!(wire, AttributeValue::Ss(vec!["b".to_owned(), "a".to_owned()]));
    }

    #[test]
    fn test_should_deduplicate_untyped_set_members_on_write() {
        let m = mapper(Shape::any());
        let wire = m.write(&Value::set([1, 2, 1])).unwrap();
        assert_eq!(wire, AttributeValue::Ns(vec!["1".to_owned(), "2".to_owned()]));
    }

    #[test]
    fn test_should_write_sets_as_lists_when_configured() {
        let cache = MapperCache::new(MapperConfig::default().with_set_as_list());
        let m = cache
            .mapper_for(&Arc::new(Shape::set(Shape::number())))
            .unwrap();
        let wire = m.write(&Value::set([1, 2])).unwrap();
        assert_eq!(
            wire,
            AttributeValue::L(vec![
                AttributeValue::N("1".to_owned()),
                AttributeValue::N("2".to_owned())
            ])
        );
        assert_eq!(m.read(&wire).unwrap(), Value::set([1, 2]));
    }

    #[test]
    fn test_should_report_validation_path_inside_list() {
        let shape = Shape::record("R")
            .member(
                "fieldName",
                Shape::list(Shape::string().with(Constraint::MaxLength(3))),
            )
            .build();
        let m = mapper(shape);
        let wire = AttributeValue::M(HashMap::from([(
            "fieldName".to_owned(),
            AttributeValue::L(vec![
                AttributeValue::S("toolong".to_owned()),
                AttributeValue::S("ok".to_owned()),
                AttributeValue::S("also too long".to_owned()),
            ]),
        )]));
        let err = m.read(&wire).unwrap_err();
        let violations = err.violations().unwrap();
        assert_eq!(violations.len(), 2);
        assert!(err.to_string().contains("$['fieldName'][0]"), "{err}");
        assert!(err.to_string().contains("$['fieldName'][2]"), "{err}");
    }

    #[test]
    fn test_should_skip_validation_when_disabled() {
        let cache = MapperCache::new(MapperConfig {
            validate_on_read: false,
            ..MapperConfig::default()
        });
        let m = cache
            .mapper_for(&Arc::new(Shape::string().with(Constraint::MaxLength(1))))
            .unwrap();
        assert!(m.read(&AttributeValue::S("long".to_owned())).is_ok());
    }

    #[test]
    fn test_should_skip_enum_and_literal_checks_when_validation_disabled() {
        let cache = MapperCache::new(MapperConfig {
            validate_on_read: false,
            ..MapperConfig::default()
        });
        let colour = cache
            .mapper_for(&Arc::new(Shape::enumeration(["red"])))
            .unwrap();
        assert_eq!(
            colour.read(&AttributeValue::S("blue".to_owned())).unwrap(),
            Value::from("blue")
        );
        let version = cache.mapper_for(&Arc::new(Shape::literal("v1"))).unwrap();
        assert!(version.read(&AttributeValue::S("v2".to_owned())).is_ok());
    }

    #[test]
    fn test_should_name_path_and_tags_on_type_mismatch() {
        let m = mapper(item_shape());
        let wire = AttributeValue::M(HashMap::from([
            ("id".to_owned(), AttributeValue::N("1".to_owned())),
            ("count".to_owned(), AttributeValue::N("1".to_owned())),
        ]));
        let err = m.read(&wire).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch at $['id']: expected S, found N"
        );
    }

    #[test]
    fn test_should_reject_missing_required_member() {
        let m = mapper(Shape::record("R").member("id", Shape::string()).build());
        let err = m.read(&AttributeValue::empty_map()).unwrap_err();
        assert!(matches!(err, MapperError::TypeMismatch { ref path, .. } if path == "$['id']"));
    }

    #[test]
    fn test_should_read_null_for_optional_member() {
        let m = mapper(Shape::record("R").optional("n", Shape::number()).build());
        let value = Value::map([("n", Value::Null)]);
        let wire = m.write(&value).unwrap();
        assert_eq!(wire.as_m().unwrap()["n"], AttributeValue::null());
        assert_eq!(m.read(&wire).unwrap(), value);
    }

    #[test]
    fn test_should_surface_nested_error_through_optional() {
        let inner = Shape::record("Inner").member("a", Shape::string());
        let m = mapper(Shape::record("R").optional("inner", inner).build());
        let wire = AttributeValue::M(HashMap::from([(
            "inner".to_owned(),
            AttributeValue::M(HashMap::from([(
                "a".to_owned(),
                AttributeValue::Bool(true),
            )])),
        )]));
        let err = m.read(&wire).unwrap_err();
        assert!(err.to_string().contains("$['inner']['a']"), "{err}");
    }

    #[test]
    fn test_should_flag_value_outside_enum() {
        let m = mapper(Shape::enumeration(["red", "green"]));
        assert!(m.read(&AttributeValue::S("red".to_owned())).is_ok());
        let err = m.read(&AttributeValue::S("blue".to_owned())).unwrap_err();
        assert!(err.violations().is_some());
    }

    #[test]
    fn test_should_round_trip_union_of_literals() {
        let m = mapper(Shape::union([Shape::literal("a"), Shape::literal("b")]));
        for tag in ["a", "b"] {
            let wire = m.write(&Value::from(tag)).unwrap();
            assert_eq!(wire, AttributeValue::S(tag.to_owned()));
            assert_eq!(m.read(&wire).unwrap(), Value::from(tag));
        }
        let err = m.read(&AttributeValue::S("c".to_owned())).unwrap_err();
        assert!(err.violations().is_some(), "{err}");
    }

    #[test]
    fn test_should_pick_matching_enum_member_of_union() {
        let m = mapper(Shape::union([
            Shape::enumeration(["red", "green"]),
            Shape::enumeration(["circle", "square"]),
        ]));
        let wire = AttributeValue::S("square".to_owned());
        assert_eq!(m.read(&wire).unwrap(), Value::from("square"));
    }

    #[test]
    fn test_should_reject_other_literal_on_write() {
        let m = mapper(Shape::literal("v1"));
        assert_eq!(
            m.write(&Value::from("v1")).unwrap(),
            AttributeValue::S("v1".to_owned())
        );
        assert!(m.write(&Value::from("v2")).is_err());
    }

    #[test]
    fn test_should_reject_non_finite_numbers() {
        let m = mapper(Shape::number());
        assert!(m.write(&Value::Number(f64::NAN)).is_err());
        assert!(m.read(&AttributeValue::N("inf".to_owned())).is_err());
        assert!(m.read(&AttributeValue::N("12x".to_owned())).is_err());
    }

    #[test]
    fn test_should_truncate_timestamps_to_millis() {
        let m = mapper(Shape::timestamp());
        let value = m
            .read(&AttributeValue::S("2020-01-02T03:04:05.678912+01:00".to_owned()))
            .unwrap();
        let Value::Timestamp(t) = value else {
            panic!("expected timestamp");
        };
        assert_eq!(
            format_timestamp(&t),
            "2020-01-02T02:04:05.678Z"
        );
    }

    #[test]
    fn test_should_map_any_by_variant() {
        let m = mapper(Shape::any());
        let value = Value::map([
            ("s", Value::from("x")),
            ("tags", Value::set(["a", "b"])),
            ("mixed", Value::set([Value::from("a"), Value::from(1)])),
        ]);
        let wire = m.write(&value).unwrap();
        let fields = wire.as_m().unwrap();
        assert_eq!(fields["tags"].type_descriptor(), "SS");
        assert_eq!(fields["mixed"].type_descriptor(), "L");
        let back = m.read(&wire).unwrap();
        assert_eq!(back.as_map().unwrap()["tags"], Value::set(["a", "b"]));
    }

    #[test]
    fn test_should_try_union_members_in_order() {
        let m = mapper(Shape::union([Shape::number(), Shape::string()]));
        assert_eq!(
            m.write(&Value::from("x")).unwrap(),
            AttributeValue::S("x".to_owned())
        );
        assert_eq!(m.expected(), "N | S");
        let err = m.read(&AttributeValue::Bool(true)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type mismatch at $: expected N | S, found BOOL"
        );
    }

    #[test]
    fn test_should_reject_duplicate_members() {
        let shape = Shape::record("R")
            .member("a", Shape::string())
            .member("a", Shape::number())
            .build();
        let err = Mapper::of(&Arc::new(shape)).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateMember { .. }));
    }

    #[test]
    fn test_should_reject_function_member() {
        let shape = Shape::record("R").member("f", Shape::function()).build();
        let err = Mapper::of(&Arc::new(shape)).unwrap_err();
        assert!(err.to_string().contains("$['f']"), "{err}");
    }

    #[test]
    fn test_should_read_and_write_items() {
        let m = mapper(item_shape());
        let item = HashMap::from([
            ("id".to_owned(), AttributeValue::S("a".to_owned())),
            ("count".to_owned(), AttributeValue::N("2".to_owned())),
            ("tags".to_owned(), AttributeValue::Ss(vec!["t".to_owned()])),
            ("scores".to_owned(), AttributeValue::empty_map()),
            (
                "nested".to_owned(),
                AttributeValue::M(HashMap::from([
                    ("a".to_owned(), AttributeValue::S("b".to_owned())),
                    (
                        "when".to_owned(),
                        AttributeValue::S("2020-01-02T03:04:05.000Z".to_owned()),
                    ),
                ])),
            ),
        ]);
        let value = m.read_item(&item).unwrap();
        assert_eq!(m.write_item(&value).unwrap(), item);
    }
}
