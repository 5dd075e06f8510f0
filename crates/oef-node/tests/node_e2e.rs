//! End-to-end tests over real TCP connections.

mod common;

use std::thread::sleep;
use std::time::Duration;

use common::{start_node, TestAgent};
use oef_core::query::{Constraint, QueryModel, Relation, RelationOp};
use oef_core::schema::{Attribute, AttributeType, DataModel, Instance, Value};
use oef_node::protocol::messages::server_message::error::Operation;
use oef_node::protocol::messages::{
    agent_message, envelope, fipa, phrase, server_message, AgentDescription, AgentMessage,
    Envelope, Fipa, Id, Nothing, Phrase, ServerMessage,
};

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

fn reports(attribute: &str) -> Constraint {
    Constraint::new(attribute, Relation::new(RelationOp::Eq, true))
}

fn weather_query(attributes: &[&str]) -> QueryModel {
    let constraints = attributes.iter().map(|a| reports(a).into()).collect();
    QueryModel::with_model(constraints, weather()).unwrap()
}

#[test]
fn test_session_uniqueness() {
    let (_server, addr) = start_node();

    let c1 = TestAgent::establish(addr, "k").expect("first connection must be admitted");

    // A second connection under the same key is turned away at the ID
    // step with a failure phrase, then closed.
    let mut c2 = TestAgent::connect(addr);
    c2.send(&Id {
        public_key: "k".to_owned(),
    });
    let rejection: Phrase = c2.recv().unwrap();
    assert!(matches!(
        rejection.payload,
        Some(phrase::Payload::Failure(Nothing {}))
    ));
    assert!(c2.recv::<Phrase>().is_err(), "rejected socket must close");

    // Once the first connection goes away the key becomes usable again;
    // the sweep races the reconnect, so poll.
    drop(c1);
    let mut admitted = false;
    for _ in 0..50 {
        if TestAgent::establish(addr, "k").is_some() {
            admitted = true;
            break;
        }
        sleep(Duration::from_millis(100));
    }
    assert!(admitted, "key must be admissible after disconnect");
}

#[test]
fn test_meteo_service_search() {
    let (_server, addr) = start_node();

    // Each station registers its readings, then searches for itself: the
    // in-order guarantee of a single connection makes the reply a barrier
    // proving the registration is applied.
    let mut stations = Vec::new();
    for i in 0..WEATHER_ATTRIBUTES.len() {
        let name = format!("Agent{}", i + 1);
        let mut agent = TestAgent::establish(addr, &name).unwrap();
        agent.register_service(&station(i));
        let only_me = QueryModel::with_model(
            vec![Constraint::new(
                WEATHER_ATTRIBUTES[i],
                Relation::new(RelationOp::Eq, false),
            )
            .into()],
            weather(),
        )
        .unwrap();
        assert_eq!(agent.search_services(1, &only_me), vec![name.clone()]);
        stations.push(agent);
    }

    let mut observer = TestAgent::establish(addr, "observer").unwrap();
    let count = |observer: &mut TestAgent, id, attributes: &[&str]| {
        observer.search_services(id, &weather_query(attributes)).len()
    };
    assert_eq!(count(&mut observer, 2, &["temperature"]), 3);
    assert_eq!(count(&mut observer, 3, &["temperature", "wind_speed"]), 2);
    assert_eq!(
        count(&mut observer, 4, &["temperature", "wind_speed", "air_pressure"]),
        1
    );
    assert_eq!(count(&mut observer, 5, &WEATHER_ATTRIBUTES), 0);
}

#[test]
fn test_description_search_and_unregister() {
    let (_server, addr) = start_node();

    let mut described = TestAgent::establish(addr, "station-1").unwrap();
    let mut silent = TestAgent::establish(addr, "station-2").unwrap();

    described.register_description(&station(0));
    let query = weather_query(&["temperature"]);
    assert_eq!(described.search_agents(1, &query), vec!["station-1".to_owned()]);

    // An agent without a description is never found.
    assert_eq!(silent.search_agents(2, &query), vec!["station-1".to_owned()]);

    described.send(&Envelope {
        payload: Some(envelope::Payload::UnregisterDescription(Nothing {})),
    });
    assert!(described.search_agents(3, &query).is_empty());
}

#[test]
fn test_message_forwarding_rewrites_origin() {
    let (_server, addr) = start_node();

    let mut alice = TestAgent::establish(addr, "alice").unwrap();
    let mut bob = TestAgent::establish(addr, "bob").unwrap();

    alice.send(&Envelope {
        payload: Some(envelope::Payload::SendMessage(AgentMessage {
            dialogue_id: 7,
            destination: "bob".to_owned(),
            payload: Some(agent_message::Payload::Content(b"hello bob".to_vec())),
        })),
    });

    let delivered: ServerMessage = bob.recv().unwrap();
    let Some(server_message::Payload::Content(content)) = delivered.payload else {
        panic!("expected a forwarded message");
    };
    assert_eq!(content.dialogue_id, 7);
    assert_eq!(content.origin, "alice");
    assert_eq!(
        content.payload,
        Some(server_message::content::Payload::Content(
            b"hello bob".to_vec()
        ))
    );
}

#[test]
fn test_fipa_cfp_is_relayed_verbatim() {
    let (_server, addr) = start_node();

    let mut buyer = TestAgent::establish(addr, "buyer").unwrap();
    let mut seller = TestAgent::establish(addr, "seller").unwrap();

    let cfp = Fipa {
        msg_id: 1,
        target: 0,
        msg: Some(fipa::Msg::Cfp(fipa::Cfp {
            payload: Some(fipa::cfp::Payload::Content(b"price?".to_vec())),
        })),
    };
    buyer.send(&Envelope {
        payload: Some(envelope::Payload::SendMessage(AgentMessage {
            dialogue_id: 3,
            destination: "seller".to_owned(),
            payload: Some(agent_message::Payload::Fipa(cfp.clone())),
        })),
    });

    let delivered: ServerMessage = seller.recv().unwrap();
    let Some(server_message::Payload::Content(content)) = delivered.payload else {
        panic!("expected a forwarded message");
    };
    assert_eq!(content.origin, "buyer");
    assert_eq!(
        content.payload,
        Some(server_message::content::Payload::Fipa(cfp))
    );
}

#[test]
fn test_message_to_absent_destination_is_dropped() {
    let (_server, addr) = start_node();

    let mut alice = TestAgent::establish(addr, "alice").unwrap();
    alice.send(&Envelope {
        payload: Some(envelope::Payload::SendMessage(AgentMessage {
            dialogue_id: 1,
            destination: "ghost".to_owned(),
            payload: Some(agent_message::Payload::Content(b"anyone?".to_vec())),
        })),
    });

    // The drop is silent and the session stays up: the next frame alice
    // receives is her search reply, not an error.
    assert!(alice.search_services(9, &weather_query(&["temperature"])).is_empty());
}

#[test]
fn test_unregister_unknown_service_reports_error() {
    let (_server, addr) = start_node();

    let mut agent = TestAgent::establish(addr, "agent").unwrap();
    agent.send(&Envelope {
        payload: Some(envelope::Payload::UnregisterService(AgentDescription {
            description: Some((&station(0)).into()),
        })),
    });

    let reply: ServerMessage = agent.recv().unwrap();
    let Some(server_message::Payload::Error(error)) = reply.payload else {
        panic!("expected an error frame");
    };
    assert_eq!(error.operation, Operation::UnregisterService as i32);
    assert_eq!(error.dialogue_id, None);
}

#[test]
fn test_invalid_description_reports_error() {
    let (_server, addr) = start_node();

    let mut agent = TestAgent::establish(addr, "agent").unwrap();
    // A description whose value type contradicts its own model.
    let mut broken = oef_core::wire::Instance::from(&station(0));
    broken.values[0].value = Some(oef_core::wire::Value {
        value: Some(oef_core::wire::value::Kind::I(3)),
    });
    agent.send(&Envelope {
        payload: Some(envelope::Payload::RegisterDescription(AgentDescription {
            description: Some(broken),
        })),
    });

    let reply: ServerMessage = agent.recv().unwrap();
    let Some(server_message::Payload::Error(error)) = reply.payload else {
        panic!("expected an error frame");
    };
    assert_eq!(error.operation, Operation::RegisterDescription as i32);
}

#[test]
fn test_duplicate_service_registration_reports_error() {
    let (_server, addr) = start_node();

    let mut agent = TestAgent::establish(addr, "agent").unwrap();
    agent.register_service(&station(0));
    agent.register_service(&station(0));

    let reply: ServerMessage = agent.recv().unwrap();
    let Some(server_message::Payload::Error(error)) = reply.payload else {
        panic!("expected an error frame");
    };
    assert_eq!(error.operation, Operation::RegisterService as i32);
}
