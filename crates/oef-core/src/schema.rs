//! Typed values, attributes, data models and instances.
//!
//! A [`DataModel`] declares the attributes a population of services shares;
//! an [`Instance`] is one concrete assignment of [`Value`]s to those
//! attributes. Everything a query can touch is validated here, at
//! construction time, so the query engine never has to re-check shape.
//!
//! # Invariants
//!
//! - Attribute names are unique within a [`DataModel`].
//! - An [`Instance`] carries a value of the declared type for every
//!   attribute it names, names no attribute absent from its model, and
//!   covers every `required` attribute.
//! - Two [`DataModel`]s compare equal iff their names are equal. This is
//!   intentionally loose; see [`DataModel`] for the rationale.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// Mean Earth radius in kilometres, as used by the great-circle distance.
pub const EARTH_RADIUS_KM: f64 = 6372.8;

/// Geographic coordinates, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl Location {
    /// Creates a location from longitude and latitude, in degrees.
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Great-circle (haversine) distance to `other`, in kilometres.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }
}

/// The closed set of types an attribute can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    Str,
    /// Boolean.
    Bool,
    /// Geographic coordinates.
    Location,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Str => "string",
            Self::Bool => "bool",
            Self::Location => "location",
        };
        f.write_str(name)
    }
}

/// A concrete attribute value.
///
/// The five-way sum is closed on purpose: every dispatch over it is an
/// exhaustive `match`, so adding a kind is a compile-visible event
/// everywhere values are serialized, hashed or checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float. Compared with `==`; instances holding `NaN` will never
    /// compare equal to anything, themselves included.
    Double(f64),
    /// UTF-8 string.
    Str(String),
    /// Boolean.
    Bool(bool),
    /// Geographic coordinates.
    Location(Location),
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Int(i) => i.hash(state),
            Self::Double(d) => d.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Location(l) => {
                l.lon.to_bits().hash(state);
                l.lat.to_bits().hash(state);
            },
        }
    }
}

impl Value {
    /// Returns the [`AttributeType`] this value inhabits.
    #[must_use]
    pub const fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Int(_) => AttributeType::Int,
            Self::Double(_) => AttributeType::Double,
            Self::Str(_) => AttributeType::Str,
            Self::Bool(_) => AttributeType::Bool,
            Self::Location(_) => AttributeType::Location,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Location> for Value {
    fn from(l: Location) -> Self {
        Self::Location(l)
    }
}

/// Error raised when a data model or instance violates a construction
/// invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two attributes of a data model share a name.
    #[error("duplicate attribute name `{name}` in data model")]
    DuplicateAttribute {
        /// The offending attribute name.
        name: String,
    },

    /// An instance names an attribute its data model does not declare.
    #[error("attribute `{name}` does not exist in the data model")]
    UnknownAttribute {
        /// The unknown attribute name.
        name: String,
    },

    /// An instance value does not match the declared attribute type.
    #[error("attribute `{name}` expects a {expected} value")]
    TypeMismatch {
        /// The attribute name.
        name: String,
        /// The type the data model declares for it.
        expected: AttributeType,
    },

    /// A required attribute of the data model is absent from the instance.
    #[error("required attribute `{name}` is missing")]
    MissingRequired {
        /// The missing attribute name.
        name: String,
    },

    /// An instance carries more values than its data model has attributes.
    #[error("instance has {given} values but the data model declares only {declared} attributes")]
    TooManyValues {
        /// Number of values supplied.
        given: usize,
        /// Number of attributes declared by the model.
        declared: usize,
    },
}

/// A named, typed slot in a [`DataModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    attribute_type: AttributeType,
    required: bool,
    description: Option<String>,
}

impl Attribute {
    /// Creates an attribute without a description.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType, required: bool) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            required,
            description: None,
        }
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    #[must_use]
    pub const fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Whether every instance of the model must carry this attribute.
    #[must_use]
    pub const fn required(&self) -> bool {
        self.required
    }

    /// The description, if one was attached.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A named, ordered collection of [`Attribute`]s.
///
/// Equality is by name only. Models are identified across the wire by
/// their name; a query typed with a model named `weather_data` is meant to
/// match every advertised `weather_data` instance, not only those whose
/// attribute list is byte-identical.
#[derive(Debug, Clone)]
pub struct DataModel {
    name: String,
    attributes: Vec<Attribute>,
    description: Option<String>,
}

impl PartialEq for DataModel {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for DataModel {}

impl DataModel {
    /// Creates a data model.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateAttribute`] if two attributes share
    /// a name.
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>) -> Result<Self, SchemaError> {
        let mut seen = std::collections::HashSet::with_capacity(attributes.len());
        for attribute in &attributes {
            if !seen.insert(attribute.name()) {
                return Err(SchemaError::DuplicateAttribute {
                    name: attribute.name().to_owned(),
                });
            }
        }
        Ok(Self {
            name: name.into(),
            attributes,
            description: None,
        })
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared attributes, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The description, if one was attached.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }
}

/// A concrete assignment of values to the attributes of a [`DataModel`].
///
/// Values are kept in a sorted map so that hashing is independent of
/// insertion order: two instances built from the same content hash equal.
///
/// Equality is one-sided on values: `a == b` holds when the model names
/// match and every value of `a` is present, equal, in `b`. Two instances
/// with disjoint extra keys can therefore compare equal in both
/// directions while not being identical. Callers that need strict
/// identity must constrain their models so that every attribute is
/// required.
#[derive(Debug, Clone)]
pub struct Instance {
    model: DataModel,
    values: BTreeMap<String, Value>,
}

impl Instance {
    /// Creates an instance of `model` from `(name, value)` pairs.
    ///
    /// # Errors
    ///
    /// - [`SchemaError::TooManyValues`] if more values are supplied than
    ///   the model declares attributes.
    /// - [`SchemaError::UnknownAttribute`] if a value names an attribute
    ///   absent from the model.
    /// - [`SchemaError::TypeMismatch`] if a value's type differs from the
    ///   declared attribute type.
    /// - [`SchemaError::MissingRequired`] if a required attribute has no
    ///   value.
    pub fn new(
        model: DataModel,
        values: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Self, SchemaError> {
        let values: BTreeMap<String, Value> = values.into_iter().collect();
        if values.len() > model.attributes().len() {
            return Err(SchemaError::TooManyValues {
                given: values.len(),
                declared: model.attributes().len(),
            });
        }
        for (name, value) in &values {
            let attribute = model
                .attribute(name)
                .ok_or_else(|| SchemaError::UnknownAttribute { name: name.clone() })?;
            if attribute.attribute_type() != value.attribute_type() {
                return Err(SchemaError::TypeMismatch {
                    name: name.clone(),
                    expected: attribute.attribute_type(),
                });
            }
        }
        for attribute in model.attributes() {
            if attribute.required() && !values.contains_key(attribute.name()) {
                return Err(SchemaError::MissingRequired {
                    name: attribute.name().to_owned(),
                });
            }
        }
        Ok(Self { model, values })
    }

    /// The data model this instance inhabits.
    #[must_use]
    pub fn model(&self) -> &DataModel {
        &self.model
    }

    /// The attribute values, sorted by attribute name.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Looks up the value of an attribute.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name()
            && self
                .values
                .iter()
                .all(|(name, value)| other.values.get(name) == Some(value))
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.model.name().hash(state);
        for (name, value) in &self.values {
            name.hash(state);
            value.hash(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> DataModel {
        DataModel::new(
            "person",
            vec![
                Attribute::new("firstName", AttributeType::Str, true)
                    .with_description("The first name."),
                Attribute::new("lastName", AttributeType::Str, true),
                Attribute::new("age", AttributeType::Int, false)
                    .with_description("The age of the person."),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_haversine_close_points() {
        let a = Location::new(0.1225, 52.208_06);
        let b = Location::new(0.122, 52.2);
        assert!(a.distance_km(&b) < 1.0);
    }

    #[test]
    fn test_haversine_cambridge_to_london() {
        let cambridge = Location::new(0.1225, 52.208_06);
        let london = Location::new(-0.125_74, 51.508_53);
        let d = cambridge.distance_km(&london);
        assert!((d - 79.6).abs() < 0.1, "expected ~79.6 km, got {d}");
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = Location::new(0.1225, 52.208_06);
        let b = Location::new(-0.125_74, 51.508_53);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let err = DataModel::new(
            "dup",
            vec![
                Attribute::new("x", AttributeType::Int, true),
                Attribute::new("x", AttributeType::Str, false),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateAttribute {
                name: "x".to_owned()
            }
        );
    }

    #[test]
    fn test_data_model_equality_is_by_name() {
        let a = DataModel::new("m", vec![Attribute::new("x", AttributeType::Int, true)]).unwrap();
        let b = DataModel::new("m", vec![Attribute::new("y", AttributeType::Str, false)]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_instance_construction() {
        let inst = Instance::new(
            person(),
            [
                ("firstName".to_owned(), Value::from("Alan")),
                ("lastName".to_owned(), Value::from("Turing")),
                ("age".to_owned(), Value::Int(41)),
            ],
        )
        .unwrap();
        assert_eq!(inst.value("firstName"), Some(&Value::from("Alan")));
        assert_eq!(inst.value("middleName"), None);
    }

    #[test]
    fn test_instance_missing_required() {
        let err = Instance::new(person(), [("firstName".to_owned(), Value::from("Alan"))])
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingRequired {
                name: "lastName".to_owned()
            }
        );
    }

    #[test]
    fn test_instance_unknown_attribute() {
        let err = Instance::new(
            person(),
            [
                ("firstName".to_owned(), Value::from("Alan")),
                ("lastName".to_owned(), Value::from("Turing")),
                ("shoeSize".to_owned(), Value::Int(9)),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownAttribute {
                name: "shoeSize".to_owned()
            }
        );
    }

    #[test]
    fn test_instance_type_mismatch() {
        let err = Instance::new(
            person(),
            [
                ("firstName".to_owned(), Value::from("Alan")),
                ("lastName".to_owned(), Value::Int(3)),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                name: "lastName".to_owned(),
                expected: AttributeType::Str,
            }
        );
    }

    #[test]
    fn test_instance_too_many_values() {
        let tiny = DataModel::new("tiny", vec![Attribute::new("x", AttributeType::Int, false)])
            .unwrap();
        let err = Instance::new(
            tiny,
            [
                ("x".to_owned(), Value::Int(1)),
                ("y".to_owned(), Value::Int(2)),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::TooManyValues {
                given: 2,
                declared: 1
            }
        );
    }

    #[test]
    fn test_instance_hash_ignores_insertion_order() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |inst: &Instance| {
            let mut hasher = DefaultHasher::new();
            inst.hash(&mut hasher);
            hasher.finish()
        };

        let a = Instance::new(
            person(),
            [
                ("firstName".to_owned(), Value::from("Alan")),
                ("lastName".to_owned(), Value::from("Turing")),
            ],
        )
        .unwrap();
        let b = Instance::new(
            person(),
            [
                ("lastName".to_owned(), Value::from("Turing")),
                ("firstName".to_owned(), Value::from("Alan")),
            ],
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_instance_equality_requires_agreement_on_shared_keys() {
        let a = Instance::new(
            person(),
            [
                ("firstName".to_owned(), Value::from("Alan")),
                ("lastName".to_owned(), Value::from("Turing")),
            ],
        )
        .unwrap();
        let b = Instance::new(
            person(),
            [
                ("firstName".to_owned(), Value::from("Alonzo")),
                ("lastName".to_owned(), Value::from("Church")),
            ],
        )
        .unwrap();
        assert_ne!(a, b);
    }
}
