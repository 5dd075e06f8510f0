//! A blocking test agent speaking the real wire protocol.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use oef_core::query::QueryModel;
use oef_core::schema::Instance;
use oef_core::wire;
use oef_node::protocol::messages::{
    envelope, phrase, server_message, AgentDescription, AgentSearch, Answer, Connected, Envelope,
    Id, Phrase, ServerMessage,
};
use oef_node::{NodeConfig, Server};
use prost::Message;

/// Read timeout generous enough for CI, short enough to fail fast.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts a node on an ephemeral port and returns it with its client
/// address.
pub fn start_node() -> (Server, SocketAddr) {
    let config = NodeConfig {
        port: 0,
        threads: 2,
        ..NodeConfig::default()
    };
    let mut server = Server::new(&config).expect("failed to start node");
    server.run();
    let addr = SocketAddr::from(([127, 0, 0, 1], server.local_addr().port()));
    (server, addr)
}

/// A connected test agent with blocking frame I/O.
pub struct TestAgent {
    stream: TcpStream,
}

impl TestAgent {
    /// Opens a raw connection without handshaking.
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("failed to connect");
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("failed to set read timeout");
        Self { stream }
    }

    /// Connects and runs the full handshake; `None` if the node rejects.
    pub fn establish(addr: SocketAddr, public_key: &str) -> Option<Self> {
        let mut agent = Self::connect(addr);
        agent.send(&Id {
            public_key: public_key.to_owned(),
        });
        let phrase: Phrase = agent.recv().ok()?;
        let phrase::Payload::Phrase(challenge) = phrase.payload? else {
            return None;
        };
        agent.send(&Answer { answer: challenge });
        let connected: Connected = agent.recv().ok()?;
        connected.status.then_some(agent)
    }

    /// Writes one length-prefixed frame.
    pub fn send<M: Message>(&mut self, msg: &M) {
        let payload = msg.encode_to_vec();
        let len = u32::try_from(payload.len()).expect("frame too large");
        self.stream
            .write_all(&len.to_be_bytes())
            .and_then(|()| self.stream.write_all(&payload))
            .expect("failed to write frame");
    }

    /// Reads one length-prefixed frame.
    pub fn recv<M: Message + Default>(&mut self) -> std::io::Result<M> {
        let mut header = [0_u8; 4];
        self.stream.read_exact(&mut header)?;
        let len = u32::from_be_bytes(header) as usize;
        let mut payload = vec![0_u8; len];
        self.stream.read_exact(&mut payload)?;
        Ok(M::decode(payload.as_slice()).expect("undecodable frame"))
    }

    /// Sends a `register_service` envelope. No reply on success.
    pub fn register_service(&mut self, instance: &Instance) {
        self.send(&Envelope {
            payload: Some(envelope::Payload::RegisterService(AgentDescription {
                description: Some(instance.into()),
            })),
        });
    }

    /// Sends a `register_description` envelope. No reply on success.
    pub fn register_description(&mut self, instance: &Instance) {
        self.send(&Envelope {
            payload: Some(envelope::Payload::RegisterDescription(AgentDescription {
                description: Some(instance.into()),
            })),
        });
    }

    /// Runs a service search and returns the matching identities.
    pub fn search_services(&mut self, search_id: u32, query: &QueryModel) -> Vec<String> {
        self.send(&Envelope {
            payload: Some(envelope::Payload::SearchServices(AgentSearch {
                search_id,
                query: Some(wire::Query::from(query)),
            })),
        });
        self.expect_agents(search_id)
    }

    /// Runs an agent search and returns the matching identities.
    pub fn search_agents(&mut self, search_id: u32, query: &QueryModel) -> Vec<String> {
        self.send(&Envelope {
            payload: Some(envelope::Payload::SearchAgents(AgentSearch {
                search_id,
                query: Some(wire::Query::from(query)),
            })),
        });
        self.expect_agents(search_id)
    }

    fn expect_agents(&mut self, search_id: u32) -> Vec<String> {
        let reply: ServerMessage = self.recv().expect("no search reply");
        match reply.payload {
            Some(server_message::Payload::Agents(agents)) => {
                assert_eq!(agents.search_id, search_id, "reply for the wrong search");
                agents.agents
            },
            other => panic!("expected an agents reply, got {other:?}"),
        }
    }
}
