//! The constraint-expression language and query models.
//!
//! A query is a conjunction of [`ConstraintExpr`]s, each a recursive tree
//! of `And` / `Or` / `Not` over leaf [`Constraint`]s. Every expression
//! supports three walks sharing the same structural recursion:
//!
//! - [`ConstraintExpr::is_valid`]: does the expression make sense against
//!   a [`DataModel`]? (type-only, no values involved)
//! - [`ConstraintExpr::check_value`]: evaluate against a single raw
//!   [`Value`].
//! - [`ConstraintExpr::check`]: evaluate against an [`Instance`], looking
//!   the target attribute up by name.
//!
//! Leaf checks never fail: a constraint applied to a value of the wrong
//! runtime type evaluates to `false` rather than erroring, which is what
//! lets [`QueryModel::check_value`] run over bare primitive values.

use crate::schema::{AttributeType, DataModel, Instance, Location, Value};

/// Error raised when a constraint expression or query violates a
/// construction invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// `And` and `Or` need at least two operands.
    #[error("composite constraint needs at least 2 operands, got {given}")]
    TooFewOperands {
        /// Number of operands supplied.
        given: usize,
    },

    /// A query model must carry at least one constraint.
    #[error("query carries no constraints")]
    NoConstraints,

    /// A constraint is not valid against the query's data model.
    #[error("constraint #{index} is not valid against data model `{model}`")]
    InvalidConstraint {
        /// Position of the offending constraint in the query.
        index: usize,
        /// Name of the data model it was validated against.
        model: String,
    },
}

/// An inclusive interval, typed by the attribute kind it applies to.
///
/// For [`Range::Location`] the two corners span an axis-aligned box;
/// corners are normalized per axis at evaluation time, so the corners may
/// be given in any order.
#[derive(Debug, Clone, PartialEq)]
pub enum Range {
    /// `[lo, hi]` over integers.
    Int(i64, i64),
    /// `[lo, hi]` over floats.
    Double(f64, f64),
    /// `[lo, hi]` in lexicographic string order.
    Str(String, String),
    /// An axis-aligned box spanned by two corners.
    Location(Location, Location),
}

impl Range {
    /// Whether this range can constrain an attribute of type `ty`.
    #[must_use]
    pub fn is_valid_for(&self, ty: AttributeType) -> bool {
        match self {
            Self::Int(..) => ty == AttributeType::Int,
            Self::Double(..) => ty == AttributeType::Double,
            Self::Str(..) => ty == AttributeType::Str,
            Self::Location(..) => ty == AttributeType::Location,
        }
    }

    /// Whether `value` lies inside the range. Wrong runtime type: `false`.
    #[must_use]
    pub fn check(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int(lo, hi), Value::Int(i)) => i >= lo && i <= hi,
            (Self::Double(lo, hi), Value::Double(d)) => d >= lo && d <= hi,
            (Self::Str(lo, hi), Value::Str(s)) => s >= lo && s <= hi,
            (Self::Location(a, b), Value::Location(l)) => {
                let (lat_min, lat_max) = min_max(a.lat, b.lat);
                let (lon_min, lon_max) = min_max(a.lon, b.lon);
                l.lat >= lat_min && l.lat <= lat_max && l.lon >= lon_min && l.lon <= lon_max
            },
            _ => false,
        }
    }
}

fn min_max(a: f64, b: f64) -> (f64, f64) {
    if a < b { (a, b) } else { (b, a) }
}

/// Comparison operator of a [`Relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOp {
    /// Equal.
    Eq,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Less than or equal.
    LtEq,
    /// Greater than or equal.
    GtEq,
    /// Not equal.
    NotEq,
}

impl RelationOp {
    const fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::NotEq)
    }
}

/// A comparison of the candidate value against a fixed operand.
///
/// `Bool` and `Location` have no defined order; only `Eq` / `NotEq` are
/// admissible (and evaluated) for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    op: RelationOp,
    operand: Value,
}

impl Relation {
    /// Creates a relation comparing candidates against `operand`.
    pub fn new(op: RelationOp, operand: impl Into<Value>) -> Self {
        Self {
            op,
            operand: operand.into(),
        }
    }

    /// The comparison operator.
    #[must_use]
    pub const fn op(&self) -> RelationOp {
        self.op
    }

    /// The fixed operand.
    #[must_use]
    pub const fn operand(&self) -> &Value {
        &self.operand
    }

    /// Whether this relation can constrain an attribute of type `ty`.
    #[must_use]
    pub fn is_valid_for(&self, ty: AttributeType) -> bool {
        if self.operand.attribute_type() != ty {
            return false;
        }
        match ty {
            AttributeType::Bool | AttributeType::Location => self.op.is_equality(),
            AttributeType::Int | AttributeType::Double | AttributeType::Str => true,
        }
    }

    /// Whether `value` satisfies `value <op> operand`. Wrong runtime type:
    /// `false`.
    #[must_use]
    pub fn check(&self, value: &Value) -> bool {
        match (value, &self.operand) {
            (Value::Int(v), Value::Int(operand)) => Self::compare(self.op, v, operand),
            (Value::Double(v), Value::Double(operand)) => {
                Self::compare_partial(self.op, v, operand)
            },
            (Value::Str(v), Value::Str(operand)) => Self::compare(self.op, v, operand),
            (Value::Bool(v), Value::Bool(operand)) => match self.op {
                RelationOp::Eq => v == operand,
                RelationOp::NotEq => v != operand,
                _ => false,
            },
            (Value::Location(v), Value::Location(operand)) => match self.op {
                RelationOp::Eq => v == operand,
                RelationOp::NotEq => v != operand,
                _ => false,
            },
            _ => false,
        }
    }

    fn compare<T: Ord + ?Sized>(op: RelationOp, value: &T, operand: &T) -> bool {
        match op {
            RelationOp::Eq => value == operand,
            RelationOp::NotEq => value != operand,
            RelationOp::Lt => value < operand,
            RelationOp::LtEq => value <= operand,
            RelationOp::Gt => value > operand,
            RelationOp::GtEq => value >= operand,
        }
    }

    fn compare_partial(op: RelationOp, value: &f64, operand: &f64) -> bool {
        match op {
            RelationOp::Eq => value == operand,
            RelationOp::NotEq => value != operand,
            RelationOp::Lt => value < operand,
            RelationOp::LtEq => value <= operand,
            RelationOp::Gt => value > operand,
            RelationOp::GtEq => value >= operand,
        }
    }
}

/// Membership operator of a [`Set`] constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    /// The candidate must be one of the listed values.
    In,
    /// The candidate must not be one of the listed values.
    NotIn,
}

/// The typed value list of a [`Set`] constraint.
///
/// `Location` has no set form; use [`Range::Location`] or [`Distance`]
/// instead.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValues {
    /// Integer members.
    Int(Vec<i64>),
    /// Float members.
    Double(Vec<f64>),
    /// String members.
    Str(Vec<String>),
    /// Boolean members.
    Bool(Vec<bool>),
}

impl SetValues {
    const fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Int(_) => AttributeType::Int,
            Self::Double(_) => AttributeType::Double,
            Self::Str(_) => AttributeType::Str,
            Self::Bool(_) => AttributeType::Bool,
        }
    }

    fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int(vals), Value::Int(v)) => vals.contains(v),
            (Self::Double(vals), Value::Double(v)) => vals.contains(v),
            (Self::Str(vals), Value::Str(v)) => vals.contains(v),
            (Self::Bool(vals), Value::Bool(v)) => vals.contains(v),
            _ => false,
        }
    }
}

/// A membership test against a fixed, typed value list.
#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    op: SetOp,
    values: SetValues,
}

impl Set {
    /// Creates a set constraint.
    #[must_use]
    pub const fn new(op: SetOp, values: SetValues) -> Self {
        Self { op, values }
    }

    /// The membership operator.
    #[must_use]
    pub const fn op(&self) -> SetOp {
        self.op
    }

    /// The value list.
    #[must_use]
    pub const fn values(&self) -> &SetValues {
        &self.values
    }

    /// Whether this set can constrain an attribute of type `ty`.
    #[must_use]
    pub fn is_valid_for(&self, ty: AttributeType) -> bool {
        self.values.attribute_type() == ty
    }

    /// Membership test; `NotIn` is its negation. A candidate of the wrong
    /// runtime type is never a member.
    #[must_use]
    pub fn check(&self, value: &Value) -> bool {
        let member = self.values.contains(value);
        match self.op {
            SetOp::In => member,
            SetOp::NotIn => !member,
        }
    }
}

/// A great-circle radius around a center point.
#[derive(Debug, Clone, PartialEq)]
pub struct Distance {
    center: Location,
    radius_km: f64,
}

impl Distance {
    /// Creates a distance constraint with radius in kilometres.
    #[must_use]
    pub const fn new(center: Location, radius_km: f64) -> Self {
        Self { center, radius_km }
    }

    /// The center of the disc.
    #[must_use]
    pub const fn center(&self) -> &Location {
        &self.center
    }

    /// The radius in kilometres.
    #[must_use]
    pub const fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Whether this constraint can apply to an attribute of type `ty`.
    #[must_use]
    pub fn is_valid_for(&self, ty: AttributeType) -> bool {
        ty == AttributeType::Location
    }

    /// Whether `value` lies within `radius_km` of the center. Anything but
    /// a location: `false`.
    #[must_use]
    pub fn check(&self, value: &Value) -> bool {
        match value {
            Value::Location(l) => self.center.distance_km(l) <= self.radius_km,
            _ => false,
        }
    }
}

/// One of the four leaf constraint kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafConstraint {
    /// Interval membership.
    Range(Range),
    /// Comparison against a fixed operand.
    Relation(Relation),
    /// Membership in a fixed value list.
    Set(Set),
    /// Great-circle proximity.
    Distance(Distance),
}

impl LeafConstraint {
    fn is_valid_for(&self, ty: AttributeType) -> bool {
        match self {
            Self::Range(r) => r.is_valid_for(ty),
            Self::Relation(r) => r.is_valid_for(ty),
            Self::Set(s) => s.is_valid_for(ty),
            Self::Distance(d) => d.is_valid_for(ty),
        }
    }

    fn check(&self, value: &Value) -> bool {
        match self {
            Self::Range(r) => r.check(value),
            Self::Relation(r) => r.check(value),
            Self::Set(s) => s.check(value),
            Self::Distance(d) => d.check(value),
        }
    }
}

impl From<Range> for LeafConstraint {
    fn from(r: Range) -> Self {
        Self::Range(r)
    }
}

impl From<Relation> for LeafConstraint {
    fn from(r: Relation) -> Self {
        Self::Relation(r)
    }
}

impl From<Set> for LeafConstraint {
    fn from(s: Set) -> Self {
        Self::Set(s)
    }
}

impl From<Distance> for LeafConstraint {
    fn from(d: Distance) -> Self {
        Self::Distance(d)
    }
}

/// A leaf constraint targeted at a named attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    attribute_name: String,
    leaf: LeafConstraint,
}

impl Constraint {
    /// Creates a constraint on the attribute named `attribute_name`.
    pub fn new(attribute_name: impl Into<String>, leaf: impl Into<LeafConstraint>) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            leaf: leaf.into(),
        }
    }

    /// The targeted attribute name.
    #[must_use]
    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    /// The leaf constraint.
    #[must_use]
    pub const fn leaf(&self) -> &LeafConstraint {
        &self.leaf
    }

    /// Whether the targeted attribute exists in `model` and the leaf is
    /// admissible for its declared type.
    #[must_use]
    pub fn is_valid(&self, model: &DataModel) -> bool {
        model
            .attribute(&self.attribute_name)
            .is_some_and(|a| self.leaf.is_valid_for(a.attribute_type()))
    }

    /// Evaluates the leaf against a raw value.
    #[must_use]
    pub fn check_value(&self, value: &Value) -> bool {
        self.leaf.check(value)
    }

    /// Evaluates the leaf against the named attribute of `instance`.
    ///
    /// An instance that does not carry the attribute fails the constraint;
    /// match-time lookups never error.
    #[must_use]
    pub fn check(&self, instance: &Instance) -> bool {
        instance
            .value(&self.attribute_name)
            .is_some_and(|v| self.leaf.check(v))
    }
}

/// A recursive constraint expression.
///
/// Composite arms hold their children inline (`Vec` for `And` / `Or`, a
/// box for `Not`); all three walks are natural structural recursion.
/// Use [`ConstraintExpr::and`] / [`ConstraintExpr::or`] to build
/// composites; both reject fewer than two children.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintExpr {
    /// Every child must hold.
    And(Vec<ConstraintExpr>),
    /// At least one child must hold.
    Or(Vec<ConstraintExpr>),
    /// The child must not hold.
    Not(Box<ConstraintExpr>),
    /// A leaf constraint.
    Constraint(Constraint),
}

impl ConstraintExpr {
    /// Builds a conjunction.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TooFewOperands`] for fewer than two children.
    pub fn and(children: Vec<Self>) -> Result<Self, QueryError> {
        if children.len() < 2 {
            return Err(QueryError::TooFewOperands {
                given: children.len(),
            });
        }
        Ok(Self::And(children))
    }

    /// Builds a disjunction.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::TooFewOperands`] for fewer than two children.
    pub fn or(children: Vec<Self>) -> Result<Self, QueryError> {
        if children.len() < 2 {
            return Err(QueryError::TooFewOperands {
                given: children.len(),
            });
        }
        Ok(Self::Or(children))
    }

    /// Whether the expression makes sense against `model`: every leaf
    /// targets a declared attribute with an admissible constraint kind,
    /// and every composite has enough children.
    #[must_use]
    pub fn is_valid(&self, model: &DataModel) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => {
                children.len() >= 2 && children.iter().all(|c| c.is_valid(model))
            },
            Self::Not(child) => child.is_valid(model),
            Self::Constraint(c) => c.is_valid(model),
        }
    }

    /// Evaluates the expression over a single raw value.
    #[must_use]
    pub fn check_value(&self, value: &Value) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.check_value(value)),
            Self::Or(children) => children.iter().any(|c| c.check_value(value)),
            Self::Not(child) => !child.check_value(value),
            Self::Constraint(c) => c.check_value(value),
        }
    }

    /// Evaluates the expression over an instance.
    #[must_use]
    pub fn check(&self, instance: &Instance) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.check(instance)),
            Self::Or(children) => children.iter().any(|c| c.check(instance)),
            Self::Not(child) => !child.check(instance),
            Self::Constraint(c) => c.check(instance),
        }
    }
}

impl From<Constraint> for ConstraintExpr {
    fn from(c: Constraint) -> Self {
        Self::Constraint(c)
    }
}

impl std::ops::BitAnd for ConstraintExpr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::And(vec![self, rhs])
    }
}

impl std::ops::BitOr for ConstraintExpr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::Or(vec![self, rhs])
    }
}

impl std::ops::Not for ConstraintExpr {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// A query: the conjunction of its top-level constraints, optionally typed
/// by a data model.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryModel {
    constraints: Vec<ConstraintExpr>,
    model: Option<DataModel>,
}

impl QueryModel {
    /// Creates an untyped query.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoConstraints`] for an empty constraint list.
    pub fn new(constraints: Vec<ConstraintExpr>) -> Result<Self, QueryError> {
        if constraints.is_empty() {
            return Err(QueryError::NoConstraints);
        }
        Ok(Self {
            constraints,
            model: None,
        })
    }

    /// Creates a query typed by `model`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoConstraints`] for an empty constraint list,
    /// or [`QueryError::InvalidConstraint`] if any constraint is not valid
    /// against `model`.
    pub fn with_model(
        constraints: Vec<ConstraintExpr>,
        model: DataModel,
    ) -> Result<Self, QueryError> {
        let mut query = Self::new(constraints)?;
        if let Some(index) = query
            .constraints
            .iter()
            .position(|c| !c.is_valid(&model))
        {
            return Err(QueryError::InvalidConstraint {
                index,
                model: model.name().to_owned(),
            });
        }
        query.model = Some(model);
        Ok(query)
    }

    /// The top-level constraints.
    #[must_use]
    pub fn constraints(&self) -> &[ConstraintExpr] {
        &self.constraints
    }

    /// The data model this query is typed by, if any.
    #[must_use]
    pub const fn model(&self) -> Option<&DataModel> {
        self.model.as_ref()
    }

    /// Whether the query holds at least one constraint and, when typed,
    /// every constraint is valid against its model.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.constraints.is_empty() {
            return false;
        }
        match &self.model {
            Some(model) => self.constraints.iter().all(|c| c.is_valid(model)),
            None => true,
        }
    }

    /// Evaluates the query against an instance.
    ///
    /// A typed query rejects instances of a differently-named model before
    /// looking at any constraint.
    #[must_use]
    pub fn check(&self, instance: &Instance) -> bool {
        if let Some(model) = &self.model {
            if model.name() != instance.model().name() {
                return false;
            }
        }
        self.constraints.iter().all(|c| c.check(instance))
    }

    /// Evaluates the query against a single raw value.
    #[must_use]
    pub fn check_value(&self, value: &Value) -> bool {
        self.constraints.iter().all(|c| c.check_value(value))
    }
}
