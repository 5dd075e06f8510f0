//! Canonical protobuf encodings of the schema and query types.
//!
//! The message structs below are hand-written [`prost`] types mirroring
//! the `Query.*` namespace of the agent wire protocol; tags are part of
//! the wire contract and must not be renumbered. Decoding is validating:
//! every `TryFrom` conversion back into the native types re-runs the
//! construction invariants, so a hostile peer cannot smuggle an invalid
//! data model, instance or constraint past the API boundary.

use prost::{Message, Oneof};

use crate::query::{self, QueryError, QueryModel};
use crate::schema::{self, SchemaError};

/// Error raised while converting a wire message into its native type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A required message field was absent.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// A oneof carried no arm.
    #[error("oneof `{0}` is not set")]
    EmptyOneof(&'static str),

    /// An enumeration field held an out-of-range value.
    #[error("unknown enum value {value} for `{field}`")]
    UnknownEnum {
        /// The field name.
        field: &'static str,
        /// The raw wire value.
        value: i32,
    },

    /// The decoded payload violates a schema construction invariant.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The decoded payload violates a query construction invariant.
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Geographic coordinates.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct Location {
    /// Longitude in degrees.
    #[prost(double, tag = "1")]
    pub lon: f64,
    /// Latitude in degrees.
    #[prost(double, tag = "2")]
    pub lat: f64,
}

/// A typed attribute value.
#[derive(Clone, PartialEq, Message)]
pub struct Value {
    /// The value, tagged by kind.
    #[prost(oneof = "value::Kind", tags = "1, 2, 3, 4, 5")]
    pub value: Option<value::Kind>,
}

/// Nested types of [`Value`].
pub mod value {
    use super::{Location, Oneof};

    /// The five value kinds.
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Kind {
        /// UTF-8 string.
        #[prost(string, tag = "1")]
        S(String),
        /// 64-bit float.
        #[prost(double, tag = "2")]
        D(f64),
        /// Boolean.
        #[prost(bool, tag = "3")]
        B(bool),
        /// 64-bit signed integer.
        #[prost(int64, tag = "4")]
        I(i64),
        /// Geographic coordinates.
        #[prost(message, tag = "5")]
        L(Location),
    }
}

/// A named, typed attribute declaration.
#[derive(Clone, PartialEq, Message)]
pub struct Attribute {
    /// Attribute name, unique within its data model.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Declared type, a [`attribute::Type`] value.
    #[prost(enumeration = "attribute::Type", tag = "2")]
    pub r#type: i32,
    /// Whether every instance must carry this attribute.
    #[prost(bool, tag = "3")]
    pub required: bool,
    /// Optional human-readable description.
    #[prost(string, optional, tag = "4")]
    pub description: Option<String>,
}

/// Nested types of [`Attribute`].
pub mod attribute {
    /// Attribute type discriminant.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        /// 64-bit float.
        Double = 0,
        /// 64-bit signed integer.
        Int = 1,
        /// Boolean.
        Bool = 2,
        /// UTF-8 string.
        String = 3,
        /// Geographic coordinates.
        Location = 4,
    }
}

/// A named collection of attributes.
#[derive(Clone, PartialEq, Message)]
pub struct DataModel {
    /// Model name.
    #[prost(string, tag = "1")]
    pub name: String,
    /// Declared attributes, in declaration order.
    #[prost(message, repeated, tag = "2")]
    pub attributes: Vec<Attribute>,
    /// Optional human-readable description.
    #[prost(string, optional, tag = "3")]
    pub description: Option<String>,
}

/// One attribute assignment of an instance.
#[derive(Clone, PartialEq, Message)]
pub struct KeyValue {
    /// Attribute name.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Assigned value.
    #[prost(message, optional, tag = "2")]
    pub value: Option<Value>,
}

/// A concrete instance of a data model.
#[derive(Clone, PartialEq, Message)]
pub struct Instance {
    /// The data model the instance inhabits.
    #[prost(message, optional, tag = "1")]
    pub model: Option<DataModel>,
    /// Attribute assignments.
    #[prost(message, repeated, tag = "2")]
    pub values: Vec<KeyValue>,
}

/// A pair of strings, used by string ranges.
#[derive(Clone, PartialEq, Message)]
pub struct StringPair {
    /// Lower bound.
    #[prost(string, tag = "1")]
    pub first: String,
    /// Upper bound.
    #[prost(string, tag = "2")]
    pub second: String,
}

/// A pair of integers, used by integer ranges.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct IntPair {
    /// Lower bound.
    #[prost(int64, tag = "1")]
    pub first: i64,
    /// Upper bound.
    #[prost(int64, tag = "2")]
    pub second: i64,
}

/// A pair of floats, used by float ranges.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct DoublePair {
    /// Lower bound.
    #[prost(double, tag = "1")]
    pub first: f64,
    /// Upper bound.
    #[prost(double, tag = "2")]
    pub second: f64,
}

/// A pair of locations spanning a box.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct LocationPair {
    /// One corner.
    #[prost(message, optional, tag = "1")]
    pub first: Option<Location>,
    /// The opposite corner.
    #[prost(message, optional, tag = "2")]
    pub second: Option<Location>,
}

/// An inclusive interval constraint.
#[derive(Clone, PartialEq, Message)]
pub struct Range {
    /// The typed bounds.
    #[prost(oneof = "range::Pair", tags = "1, 2, 3, 4")]
    pub pair: Option<range::Pair>,
}

/// Nested types of [`Range`].
pub mod range {
    use super::{DoublePair, IntPair, LocationPair, Oneof, StringPair};

    /// The typed range bounds.
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Pair {
        /// Lexicographic string interval.
        #[prost(message, tag = "1")]
        S(StringPair),
        /// Integer interval.
        #[prost(message, tag = "2")]
        I(IntPair),
        /// Float interval.
        #[prost(message, tag = "3")]
        D(DoublePair),
        /// Axis-aligned location box.
        #[prost(message, tag = "4")]
        L(LocationPair),
    }
}

/// A great-circle proximity constraint.
#[derive(Clone, Copy, PartialEq, Message)]
pub struct Distance {
    /// Center of the disc.
    #[prost(message, optional, tag = "1")]
    pub center: Option<Location>,
    /// Radius in kilometres.
    #[prost(double, tag = "2")]
    pub distance: f64,
}

/// A comparison constraint.
#[derive(Clone, PartialEq, Message)]
pub struct Relation {
    /// Comparison operator, a [`relation::Operator`] value.
    #[prost(enumeration = "relation::Operator", tag = "1")]
    pub op: i32,
    /// The fixed operand.
    #[prost(message, optional, tag = "2")]
    pub val: Option<Value>,
}

/// Nested types of [`Relation`].
pub mod relation {
    /// Comparison operator discriminant.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Operator {
        /// Equal.
        Eq = 0,
        /// Less than.
        Lt = 1,
        /// Greater than.
        Gt = 2,
        /// Less than or equal.
        LtEq = 3,
        /// Greater than or equal.
        GtEq = 4,
        /// Not equal.
        NotEq = 5,
    }
}

/// A membership constraint.
#[derive(Clone, PartialEq, Message)]
pub struct Set {
    /// Membership operator, a [`set::Operator`] value.
    #[prost(enumeration = "set::Operator", tag = "1")]
    pub op: i32,
    /// The typed member list.
    #[prost(message, optional, tag = "2")]
    pub vals: Option<set::Values>,
}

/// Nested types of [`Set`].
pub mod set {
    use super::{Message, Oneof};

    /// Membership operator discriminant.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Operator {
        /// Candidate must be a member.
        In = 0,
        /// Candidate must not be a member.
        NotIn = 1,
    }

    /// The typed member list of a set constraint.
    #[derive(Clone, PartialEq, Message)]
    pub struct Values {
        /// The members, tagged by kind.
        #[prost(oneof = "values::Kind", tags = "1, 2, 3, 4")]
        pub values: Option<values::Kind>,
    }

    /// Nested types of [`Values`].
    pub mod values {
        use super::{Message, Oneof};

        /// String members.
        #[derive(Clone, PartialEq, Message)]
        pub struct Strings {
            /// The members.
            #[prost(string, repeated, tag = "1")]
            pub vals: Vec<String>,
        }

        /// Integer members.
        #[derive(Clone, PartialEq, Message)]
        pub struct Ints {
            /// The members.
            #[prost(int64, repeated, tag = "1")]
            pub vals: Vec<i64>,
        }

        /// Float members.
        #[derive(Clone, PartialEq, Message)]
        pub struct Doubles {
            /// The members.
            #[prost(double, repeated, tag = "1")]
            pub vals: Vec<f64>,
        }

        /// Boolean members.
        #[derive(Clone, PartialEq, Message)]
        pub struct Bools {
            /// The members.
            #[prost(bool, repeated, tag = "1")]
            pub vals: Vec<bool>,
        }

        /// The member list kinds.
        #[derive(Clone, PartialEq, Oneof)]
        pub enum Kind {
            /// String members.
            #[prost(message, tag = "1")]
            S(Strings),
            /// Integer members.
            #[prost(message, tag = "2")]
            I(Ints),
            /// Float members.
            #[prost(message, tag = "3")]
            D(Doubles),
            /// Boolean members.
            #[prost(message, tag = "4")]
            B(Bools),
        }
    }
}

/// A recursive constraint expression.
#[derive(Clone, PartialEq, Message)]
pub struct ConstraintExpr {
    /// The expression, tagged by arm.
    #[prost(oneof = "constraint_expr::Expression", tags = "1, 2, 3, 4")]
    pub expression: Option<constraint_expr::Expression>,
}

/// Nested types of [`ConstraintExpr`].
pub mod constraint_expr {
    use super::{ConstraintExpr, Message, Oneof};

    /// A disjunction of expressions.
    #[derive(Clone, PartialEq, Message)]
    pub struct Or {
        /// The children; at least two.
        #[prost(message, repeated, tag = "1")]
        pub expr: Vec<ConstraintExpr>,
    }

    /// A conjunction of expressions.
    #[derive(Clone, PartialEq, Message)]
    pub struct And {
        /// The children; at least two.
        #[prost(message, repeated, tag = "1")]
        pub expr: Vec<ConstraintExpr>,
    }

    /// A negated expression.
    #[derive(Clone, PartialEq, Message)]
    pub struct Not {
        /// The negated child.
        #[prost(message, optional, boxed, tag = "1")]
        pub expr: Option<Box<ConstraintExpr>>,
    }

    /// A leaf constraint on a named attribute.
    #[derive(Clone, PartialEq, Message)]
    pub struct Constraint {
        /// The targeted attribute name.
        #[prost(string, tag = "1")]
        pub attribute_name: String,
        /// The leaf constraint kind. `Distance` has its own arm.
        #[prost(oneof = "constraint::Leaf", tags = "2, 3, 4, 5")]
        pub constraint: Option<constraint::Leaf>,
    }

    /// Nested types of [`Constraint`].
    pub mod constraint {
        use super::Oneof;

        /// The four leaf constraint kinds.
        #[derive(Clone, PartialEq, Oneof)]
        pub enum Leaf {
            /// Membership in a value list.
            #[prost(message, tag = "2")]
            Set(super::super::Set),
            /// Interval membership.
            #[prost(message, tag = "3")]
            Range(super::super::Range),
            /// Comparison against a fixed operand.
            #[prost(message, tag = "4")]
            Relation(super::super::Relation),
            /// Great-circle proximity.
            #[prost(message, tag = "5")]
            Distance(super::super::Distance),
        }
    }

    /// The expression arms.
    #[derive(Clone, PartialEq, Oneof)]
    pub enum Expression {
        /// Disjunction.
        #[prost(message, tag = "1")]
        Or(Or),
        /// Conjunction.
        #[prost(message, tag = "2")]
        And(And),
        /// Negation.
        #[prost(message, tag = "3")]
        Not(Not),
        /// Leaf constraint.
        #[prost(message, tag = "4")]
        Constraint(Constraint),
    }
}

/// A query: top-level constraints plus an optional data model.
#[derive(Clone, PartialEq, Message)]
pub struct Query {
    /// The top-level constraints; interpreted as a conjunction.
    #[prost(message, repeated, tag = "1")]
    pub constraints: Vec<ConstraintExpr>,
    /// The data model the query is typed by, if any.
    #[prost(message, optional, tag = "2")]
    pub model: Option<DataModel>,
}

// ---------------------------------------------------------------------------
// Native -> wire
// ---------------------------------------------------------------------------

impl From<schema::Location> for Location {
    fn from(l: schema::Location) -> Self {
        Self { lon: l.lon, lat: l.lat }
    }
}

impl From<&schema::Value> for Value {
    fn from(v: &schema::Value) -> Self {
        let kind = match v {
            schema::Value::Int(i) => value::Kind::I(*i),
            schema::Value::Double(d) => value::Kind::D(*d),
            schema::Value::Str(s) => value::Kind::S(s.clone()),
            schema::Value::Bool(b) => value::Kind::B(*b),
            schema::Value::Location(l) => value::Kind::L((*l).into()),
        };
        Self { value: Some(kind) }
    }
}

impl From<schema::AttributeType> for attribute::Type {
    fn from(ty: schema::AttributeType) -> Self {
        match ty {
            schema::AttributeType::Double => Self::Double,
            schema::AttributeType::Int => Self::Int,
            schema::AttributeType::Bool => Self::Bool,
            schema::AttributeType::Str => Self::String,
            schema::AttributeType::Location => Self::Location,
        }
    }
}

impl From<&schema::Attribute> for Attribute {
    fn from(a: &schema::Attribute) -> Self {
        Self {
            name: a.name().to_owned(),
            r#type: attribute::Type::from(a.attribute_type()) as i32,
            required: a.required(),
            description: a.description().map(str::to_owned),
        }
    }
}

impl From<&schema::DataModel> for DataModel {
    fn from(m: &schema::DataModel) -> Self {
        Self {
            name: m.name().to_owned(),
            attributes: m.attributes().iter().map(Attribute::from).collect(),
            description: m.description().map(str::to_owned),
        }
    }
}

impl From<&schema::Instance> for Instance {
    fn from(i: &schema::Instance) -> Self {
        Self {
            model: Some(i.model().into()),
            values: i
                .values()
                .iter()
                .map(|(key, value)| KeyValue {
                    key: key.clone(),
                    value: Some(value.into()),
                })
                .collect(),
        }
    }
}

impl From<&query::Range> for Range {
    fn from(r: &query::Range) -> Self {
        let pair = match r {
            query::Range::Int(lo, hi) => range::Pair::I(IntPair { first: *lo, second: *hi }),
            query::Range::Double(lo, hi) => {
                range::Pair::D(DoublePair { first: *lo, second: *hi })
            },
            query::Range::Str(lo, hi) => range::Pair::S(StringPair {
                first: lo.clone(),
                second: hi.clone(),
            }),
            query::Range::Location(a, b) => range::Pair::L(LocationPair {
                first: Some((*a).into()),
                second: Some((*b).into()),
            }),
        };
        Self { pair: Some(pair) }
    }
}

impl From<query::RelationOp> for relation::Operator {
    fn from(op: query::RelationOp) -> Self {
        match op {
            query::RelationOp::Eq => Self::Eq,
            query::RelationOp::Lt => Self::Lt,
            query::RelationOp::Gt => Self::Gt,
            query::RelationOp::LtEq => Self::LtEq,
            query::RelationOp::GtEq => Self::GtEq,
            query::RelationOp::NotEq => Self::NotEq,
        }
    }
}

impl From<&query::Relation> for Relation {
    fn from(r: &query::Relation) -> Self {
        Self {
            op: relation::Operator::from(r.op()) as i32,
            val: Some(r.operand().into()),
        }
    }
}

impl From<&query::Set> for Set {
    fn from(s: &query::Set) -> Self {
        let kind = match s.values() {
            query::SetValues::Int(vals) => set::values::Kind::I(set::values::Ints {
                vals: vals.clone(),
            }),
            query::SetValues::Double(vals) => set::values::Kind::D(set::values::Doubles {
                vals: vals.clone(),
            }),
            query::SetValues::Str(vals) => set::values::Kind::S(set::values::Strings {
                vals: vals.clone(),
            }),
            query::SetValues::Bool(vals) => set::values::Kind::B(set::values::Bools {
                vals: vals.clone(),
            }),
        };
        let op = match s.op() {
            query::SetOp::In => set::Operator::In,
            query::SetOp::NotIn => set::Operator::NotIn,
        };
        Self {
            op: op as i32,
            vals: Some(set::Values { values: Some(kind) }),
        }
    }
}

impl From<&query::Distance> for Distance {
    fn from(d: &query::Distance) -> Self {
        Self {
            center: Some((*d.center()).into()),
            distance: d.radius_km(),
        }
    }
}

impl From<&query::Constraint> for constraint_expr::Constraint {
    fn from(c: &query::Constraint) -> Self {
        let leaf = match c.leaf() {
            query::LeafConstraint::Range(r) => constraint_expr::constraint::Leaf::Range(r.into()),
            query::LeafConstraint::Relation(r) => {
                constraint_expr::constraint::Leaf::Relation(r.into())
            },
            query::LeafConstraint::Set(s) => constraint_expr::constraint::Leaf::Set(s.into()),
            query::LeafConstraint::Distance(d) => {
                constraint_expr::constraint::Leaf::Distance(d.into())
            },
        };
        Self {
            attribute_name: c.attribute_name().to_owned(),
            constraint: Some(leaf),
        }
    }
}

impl From<&query::ConstraintExpr> for ConstraintExpr {
    fn from(e: &query::ConstraintExpr) -> Self {
        let expression = match e {
            query::ConstraintExpr::And(children) => {
                constraint_expr::Expression::And(constraint_expr::And {
                    expr: children.iter().map(Self::from).collect(),
                })
            },
            query::ConstraintExpr::Or(children) => {
                constraint_expr::Expression::Or(constraint_expr::Or {
                    expr: children.iter().map(Self::from).collect(),
                })
            },
            query::ConstraintExpr::Not(child) => {
                constraint_expr::Expression::Not(constraint_expr::Not {
                    expr: Some(Box::new(Self::from(child.as_ref()))),
                })
            },
            query::ConstraintExpr::Constraint(c) => constraint_expr::Expression::Constraint(c.into()),
        };
        Self {
            expression: Some(expression),
        }
    }
}

impl From<&QueryModel> for Query {
    fn from(q: &QueryModel) -> Self {
        Self {
            constraints: q.constraints().iter().map(ConstraintExpr::from).collect(),
            model: q.model().map(DataModel::from),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire -> native, validating
// ---------------------------------------------------------------------------

impl From<Location> for schema::Location {
    fn from(l: Location) -> Self {
        Self::new(l.lon, l.lat)
    }
}

impl TryFrom<Value> for schema::Value {
    type Error = WireError;

    fn try_from(v: Value) -> Result<Self, WireError> {
        match v.value.ok_or(WireError::EmptyOneof("Value.value"))? {
            value::Kind::S(s) => Ok(Self::Str(s)),
            value::Kind::D(d) => Ok(Self::Double(d)),
            value::Kind::B(b) => Ok(Self::Bool(b)),
            value::Kind::I(i) => Ok(Self::Int(i)),
            value::Kind::L(l) => Ok(Self::Location(l.into())),
        }
    }
}

impl From<attribute::Type> for schema::AttributeType {
    fn from(ty: attribute::Type) -> Self {
        match ty {
            attribute::Type::Double => Self::Double,
            attribute::Type::Int => Self::Int,
            attribute::Type::Bool => Self::Bool,
            attribute::Type::String => Self::Str,
            attribute::Type::Location => Self::Location,
        }
    }
}

impl TryFrom<Attribute> for schema::Attribute {
    type Error = WireError;

    fn try_from(a: Attribute) -> Result<Self, WireError> {
        let ty = attribute::Type::try_from(a.r#type).map_err(|_| WireError::UnknownEnum {
            field: "Attribute.type",
            value: a.r#type,
        })?;
        let mut attribute = Self::new(a.name, ty.into(), a.required);
        if let Some(description) = a.description {
            attribute = attribute.with_description(description);
        }
        Ok(attribute)
    }
}

impl TryFrom<DataModel> for schema::DataModel {
    type Error = WireError;

    fn try_from(m: DataModel) -> Result<Self, WireError> {
        let attributes = m
            .attributes
            .into_iter()
            .map(schema::Attribute::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let mut model = Self::new(m.name, attributes)?;
        if let Some(description) = m.description {
            model = model.with_description(description);
        }
        Ok(model)
    }
}

impl TryFrom<Instance> for schema::Instance {
    type Error = WireError;

    fn try_from(i: Instance) -> Result<Self, WireError> {
        let model = i
            .model
            .ok_or(WireError::MissingField("Instance.model"))?
            .try_into()?;
        let values = i
            .values
            .into_iter()
            .map(|kv| {
                let value = kv
                    .value
                    .ok_or(WireError::MissingField("KeyValue.value"))?
                    .try_into()?;
                Ok::<_, WireError>((kv.key, value))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(model, values)?)
    }
}

impl TryFrom<Range> for query::Range {
    type Error = WireError;

    fn try_from(r: Range) -> Result<Self, WireError> {
        match r.pair.ok_or(WireError::EmptyOneof("Range.pair"))? {
            range::Pair::S(p) => Ok(Self::Str(p.first, p.second)),
            range::Pair::I(p) => Ok(Self::Int(p.first, p.second)),
            range::Pair::D(p) => Ok(Self::Double(p.first, p.second)),
            range::Pair::L(p) => Ok(Self::Location(
                p.first
                    .ok_or(WireError::MissingField("LocationPair.first"))?
                    .into(),
                p.second
                    .ok_or(WireError::MissingField("LocationPair.second"))?
                    .into(),
            )),
        }
    }
}

impl From<relation::Operator> for query::RelationOp {
    fn from(op: relation::Operator) -> Self {
        match op {
            relation::Operator::Eq => Self::Eq,
            relation::Operator::Lt => Self::Lt,
            relation::Operator::Gt => Self::Gt,
            relation::Operator::LtEq => Self::LtEq,
            relation::Operator::GtEq => Self::GtEq,
            relation::Operator::NotEq => Self::NotEq,
        }
    }
}

impl TryFrom<Relation> for query::Relation {
    type Error = WireError;

    fn try_from(r: Relation) -> Result<Self, WireError> {
        let op = relation::Operator::try_from(r.op).map_err(|_| WireError::UnknownEnum {
            field: "Relation.op",
            value: r.op,
        })?;
        let operand: schema::Value = r
            .val
            .ok_or(WireError::MissingField("Relation.val"))?
            .try_into()?;
        Ok(Self::new(op.into(), operand))
    }
}

impl TryFrom<Set> for query::Set {
    type Error = WireError;

    fn try_from(s: Set) -> Result<Self, WireError> {
        let op = set::Operator::try_from(s.op).map_err(|_| WireError::UnknownEnum {
            field: "Set.op",
            value: s.op,
        })?;
        let op = match op {
            set::Operator::In => query::SetOp::In,
            set::Operator::NotIn => query::SetOp::NotIn,
        };
        let values = match s
            .vals
            .ok_or(WireError::MissingField("Set.vals"))?
            .values
            .ok_or(WireError::EmptyOneof("Set.Values.values"))?
        {
            set::values::Kind::S(v) => query::SetValues::Str(v.vals),
            set::values::Kind::I(v) => query::SetValues::Int(v.vals),
            set::values::Kind::D(v) => query::SetValues::Double(v.vals),
            set::values::Kind::B(v) => query::SetValues::Bool(v.vals),
        };
        Ok(Self::new(op, values))
    }
}

impl TryFrom<Distance> for query::Distance {
    type Error = WireError;

    fn try_from(d: Distance) -> Result<Self, WireError> {
        Ok(Self::new(
            d.center
                .ok_or(WireError::MissingField("Distance.center"))?
                .into(),
            d.distance,
        ))
    }
}

impl TryFrom<constraint_expr::Constraint> for query::Constraint {
    type Error = WireError;

    fn try_from(c: constraint_expr::Constraint) -> Result<Self, WireError> {
        let leaf = match c
            .constraint
            .ok_or(WireError::EmptyOneof("Constraint.constraint"))?
        {
            constraint_expr::constraint::Leaf::Set(s) => {
                query::LeafConstraint::Set(s.try_into()?)
            },
            constraint_expr::constraint::Leaf::Range(r) => {
                query::LeafConstraint::Range(r.try_into()?)
            },
            constraint_expr::constraint::Leaf::Relation(r) => {
                query::LeafConstraint::Relation(r.try_into()?)
            },
            constraint_expr::constraint::Leaf::Distance(d) => {
                query::LeafConstraint::Distance(d.try_into()?)
            },
        };
        Ok(Self::new(c.attribute_name, leaf))
    }
}

impl TryFrom<ConstraintExpr> for query::ConstraintExpr {
    type Error = WireError;

    fn try_from(e: ConstraintExpr) -> Result<Self, WireError> {
        match e
            .expression
            .ok_or(WireError::EmptyOneof("ConstraintExpr.expression"))?
        {
            constraint_expr::Expression::And(and) => {
                let children = and
                    .expr
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::and(children)?)
            },
            constraint_expr::Expression::Or(or) => {
                let children = or
                    .expr
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::or(children)?)
            },
            constraint_expr::Expression::Not(not) => {
                let child = *not.expr.ok_or(WireError::MissingField("Not.expr"))?;
                Ok(Self::Not(Box::new(child.try_into()?)))
            },
            constraint_expr::Expression::Constraint(c) => Ok(Self::Constraint(c.try_into()?)),
        }
    }
}

impl TryFrom<Query> for QueryModel {
    type Error = WireError;

    fn try_from(q: Query) -> Result<Self, WireError> {
        let constraints = q
            .constraints
            .into_iter()
            .map(query::ConstraintExpr::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        match q.model {
            Some(model) => Ok(Self::with_model(constraints, model.try_into()?)?),
            None => Ok(Self::new(constraints)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Constraint, RelationOp, SetOp, SetValues};
    use crate::schema::AttributeType;

    fn person() -> schema::DataModel {
        schema::DataModel::new(
            "person",
            vec![
                schema::Attribute::new("firstName", AttributeType::Str, true)
                    .with_description("The first name."),
                schema::Attribute::new("lastName", AttributeType::Str, true),
                schema::Attribute::new("age", AttributeType::Int, false),
            ],
        )
        .unwrap()
    }

    fn reencode<M: Message + Default>(msg: &M) -> M {
        M::decode(msg.encode_to_vec().as_slice()).unwrap()
    }

    #[test]
    fn test_data_model_round_trip() {
        let native = person();
        let wire = reencode(&DataModel::from(&native));
        let back = schema::DataModel::try_from(wire).unwrap();
        assert_eq!(back, native);
        assert_eq!(back.attributes(), native.attributes());
    }

    #[test]
    fn test_instance_round_trip() {
        let native = schema::Instance::new(
            person(),
            [
                ("firstName".to_owned(), schema::Value::from("Alan")),
                ("lastName".to_owned(), schema::Value::from("Turing")),
                ("age".to_owned(), schema::Value::Int(41)),
            ],
        )
        .unwrap();
        let wire = reencode(&Instance::from(&native));
        let back = schema::Instance::try_from(wire).unwrap();
        assert_eq!(back, native);
    }

    #[test]
    fn test_instance_decode_validates() {
        // A wire instance whose value type contradicts its own model must
        // not survive decoding.
        let mut wire = Instance::from(
            &schema::Instance::new(
                person(),
                [
                    ("firstName".to_owned(), schema::Value::from("Alan")),
                    ("lastName".to_owned(), schema::Value::from("Turing")),
                ],
            )
            .unwrap(),
        );
        wire.values[0].value = Some(Value {
            value: Some(value::Kind::I(3)),
        });
        let err = schema::Instance::try_from(wire).unwrap_err();
        assert!(matches!(err, WireError::Schema(SchemaError::TypeMismatch { .. })));
    }

    #[test]
    fn test_constraint_expr_round_trip() {
        let native = query::ConstraintExpr::and(vec![
            Constraint::new("firstName", query::Range::Str("A".into(), "C".into())).into(),
            !query::ConstraintExpr::from(Constraint::new(
                "age",
                query::Relation::new(RelationOp::GtEq, 18_i64),
            )),
        ])
        .unwrap();
        let wire = reencode(&ConstraintExpr::from(&native));
        assert_eq!(query::ConstraintExpr::try_from(wire).unwrap(), native);
    }

    #[test]
    fn test_distance_has_its_own_arm() {
        let native: query::ConstraintExpr = Constraint::new(
            "position",
            query::Distance::new(schema::Location::new(0.0, 51.0), 10.0),
        )
        .into();
        let wire = ConstraintExpr::from(&native);
        let Some(constraint_expr::Expression::Constraint(c)) = &wire.expression else {
            panic!("expected a leaf constraint");
        };
        assert!(matches!(
            c.constraint,
            Some(constraint_expr::constraint::Leaf::Distance(_))
        ));
        assert_eq!(query::ConstraintExpr::try_from(reencode(&wire)).unwrap(), native);
    }

    #[test]
    fn test_query_round_trip_keeps_validity() {
        let native = QueryModel::with_model(
            vec![Constraint::new(
                "firstName",
                query::Set::new(
                    SetOp::In,
                    SetValues::Str(vec!["Alan".into(), "Chris".into()]),
                ),
            )
            .into()],
            person(),
        )
        .unwrap();
        let back = QueryModel::try_from(reencode(&Query::from(&native))).unwrap();
        assert_eq!(back, native);
        assert!(back.is_valid());
        assert!(back.check_value(&schema::Value::from("Alan")));
        assert!(!back.check_value(&schema::Value::from("Mark")));
    }

    #[test]
    fn test_undersized_and_rejected_on_decode() {
        let wire = ConstraintExpr {
            expression: Some(constraint_expr::Expression::And(constraint_expr::And {
                expr: vec![ConstraintExpr::from(&query::ConstraintExpr::from(
                    Constraint::new("x", query::Range::Int(0, 1)),
                ))],
            })),
        };
        let err = query::ConstraintExpr::try_from(wire).unwrap_err();
        assert_eq!(err, WireError::Query(QueryError::TooFewOperands { given: 1 }));
    }

    #[test]
    fn test_empty_value_oneof_rejected() {
        let err = schema::Value::try_from(Value { value: None }).unwrap_err();
        assert_eq!(err, WireError::EmptyOneof("Value.value"));
    }
}
