//! The searchable directory of advertised services.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::debug;

use crate::query::QueryModel;
use crate::schema::Instance;

/// Inverted map from advertised service [`Instance`] to the identities of
/// the agents advertising it.
///
/// Every operation is linearizable under the one directory-wide mutex,
/// which is held only for the body of the call and never across I/O.
#[derive(Debug, Default)]
pub struct ServiceDirectory {
    services: Mutex<HashMap<Instance, HashSet<String>>>,
}

impl ServiceDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `agent` advertises `instance`.
    ///
    /// Returns `true` iff the advertisement is new, i.e. the identity set
    /// under `instance` grew.
    pub fn register(&self, instance: Instance, agent: &str) -> bool {
        let mut services = self.services.lock().unwrap();
        services
            .entry(instance)
            .or_default()
            .insert(agent.to_owned())
    }

    /// Withdraws `agent`'s advertisement of `instance`, dropping the entry
    /// once nobody advertises it.
    ///
    /// Returns `true` iff the advertisement existed.
    pub fn unregister(&self, instance: &Instance, agent: &str) -> bool {
        let mut services = self.services.lock().unwrap();
        let Some(agents) = services.get_mut(instance) else {
            return false;
        };
        let removed = agents.remove(agent);
        if agents.is_empty() {
            services.remove(instance);
        }
        removed
    }

    /// Withdraws every advertisement of `agent`, dropping entries that end
    /// up with no advertiser.
    pub fn unregister_all(&self, agent: &str) {
        let mut services = self.services.lock().unwrap();
        services.retain(|_, agents| {
            agents.remove(agent);
            !agents.is_empty()
        });
        debug!(agent, "swept agent from service directory");
    }

    /// Identities of every agent advertising an instance that satisfies
    /// `query`, deduplicated, in no particular order.
    #[must_use]
    pub fn query(&self, query: &QueryModel) -> Vec<String> {
        let services = self.services.lock().unwrap();
        let mut result = HashSet::new();
        for (instance, agents) in services.iter() {
            if query.check(instance) {
                result.extend(agents.iter().cloned());
            }
        }
        result.into_iter().collect()
    }

    /// Number of distinct advertised instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.lock().unwrap().len()
    }

    /// Whether no service is advertised.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Constraint, ConstraintExpr, Relation, RelationOp};
    use crate::schema::{Attribute, AttributeType, DataModel, Value};

    const WEATHER_ATTRIBUTES: [&str; 4] = ["wind_speed", "temperature", "air_pressure", "humidity"];

    fn weather() -> DataModel {
        DataModel::new(
            "weather_data",
            WEATHER_ATTRIBUTES
                .iter()
                .map(|name| Attribute::new(*name, AttributeType::Bool, true))
                .collect(),
        )
        .unwrap()
        .with_description("All possible weather data.")
    }

    /// Agent `i + 1` reports everything except the `i`-th attribute.
    fn station(i: usize) -> Instance {
        Instance::new(
            weather(),
            WEATHER_ATTRIBUTES
                .iter()
                .enumerate()
                .map(|(j, name)| ((*name).to_owned(), Value::Bool(i != j))),
        )
        .unwrap()
    }

    fn reports(attribute: &str) -> ConstraintExpr {
        Constraint::new(attribute, Relation::new(RelationOp::Eq, true)).into()
    }

    fn meteo_directory() -> ServiceDirectory {
        let directory = ServiceDirectory::new();
        for i in 0..WEATHER_ATTRIBUTES.len() {
            assert!(directory.register(station(i), &format!("Agent{}", i + 1)));
            assert_eq!(directory.len(), i + 1);
        }
        directory
    }

    #[test]
    fn test_meteo_query_narrowing() {
        let directory = meteo_directory();
        let query = |attributes: &[&str]| {
            let constraints = attributes.iter().map(|a| reports(a)).collect();
            directory.query(&QueryModel::with_model(constraints, weather()).unwrap())
        };

        assert_eq!(query(&["temperature"]).len(), 3);
        assert_eq!(query(&["temperature", "wind_speed"]).len(), 2);
        assert_eq!(query(&["temperature", "wind_speed", "air_pressure"]).len(), 1);
        assert!(query(&WEATHER_ATTRIBUTES).is_empty());
    }

    #[test]
    fn test_register_is_idempotent() {
        let directory = ServiceDirectory::new();
        assert!(directory.register(station(0), "Agent1"));
        assert!(!directory.register(station(0), "Agent1"));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_directory_duality() {
        let directory = ServiceDirectory::new();
        directory.register(station(1), "Agent2");

        let matching = QueryModel::new(vec![reports("air_pressure")]).unwrap();
        assert!(directory.query(&matching).contains(&"Agent2".to_owned()));

        assert!(directory.unregister(&station(1), "Agent2"));
        assert!(directory.query(&matching).is_empty());
        assert!(directory.is_empty());
    }

    #[test]
    fn test_unregister_unknown_instance() {
        let directory = ServiceDirectory::new();
        assert!(!directory.unregister(&station(0), "Agent1"));
        directory.register(station(0), "Agent1");
        assert!(!directory.unregister(&station(0), "Agent2"));
    }

    #[test]
    fn test_unregister_all_drops_emptied_entries() {
        let directory = meteo_directory();
        directory.register(station(0), "Agent2");

        directory.unregister_all("Agent1");
        // Agent1's exclusive entry is gone; the shared one survives.
        assert_eq!(directory.len(), 3);
        directory.unregister_all("Agent2");
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_query_deduplicates_across_instances() {
        let directory = ServiceDirectory::new();
        directory.register(station(0), "Agent9");
        directory.register(station(1), "Agent9");
        let query = QueryModel::new(vec![reports("humidity")]).unwrap();
        assert_eq!(directory.query(&query), vec!["Agent9".to_owned()]);
    }
}
