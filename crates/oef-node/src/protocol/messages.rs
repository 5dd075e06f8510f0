//! Hand-written prost messages of the agent protocol.
//!
//! Client → server: [`Id`], [`Answer`], then [`Envelope`] once the session
//! is established. Server → client: [`Phrase`], [`Connected`], then
//! [`ServerMessage`]. Tags are part of the wire contract and must not be
//! renumbered.
//!
//! FIPA negotiation payloads ([`Fipa`] and its sub-messages) are carried
//! through the node verbatim; the node never interprets them beyond
//! routing.

use oef_core::wire;

/// An empty message, used for payload-less oneof arms.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Nothing {}

/// Handshake step 1: the connecting agent declares its public key.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Id {
    /// The agent's public identity.
    #[prost(string, tag = "1")]
    pub public_key: String,
}

/// Handshake step 3: the agent's response to the challenge phrase.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Answer {
    /// The response string.
    #[prost(string, tag = "1")]
    pub answer: String,
}

/// Handshake step 2: the node's challenge, or a rejection.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Phrase {
    /// Challenge or rejection.
    #[prost(oneof = "phrase::Payload", tags = "1, 2")]
    pub payload: Option<phrase::Payload>,
}

/// Nested types of [`Phrase`].
pub mod phrase {
    /// Challenge or rejection.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// The challenge phrase the agent must answer.
        #[prost(string, tag = "1")]
        Phrase(String),
        /// The identity is already connected; the connection will close.
        #[prost(message, tag = "2")]
        Failure(super::Nothing),
    }
}

impl Phrase {
    /// A challenge carrying `phrase`.
    pub fn challenge(phrase: impl Into<String>) -> Self {
        Self {
            payload: Some(phrase::Payload::Phrase(phrase.into())),
        }
    }

    /// A rejection.
    #[must_use]
    pub fn failure() -> Self {
        Self {
            payload: Some(phrase::Payload::Failure(Nothing {})),
        }
    }
}

/// Handshake step 4: the admission verdict.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Connected {
    /// `true` iff the agent was admitted.
    #[prost(bool, tag = "1")]
    pub status: bool,
}

/// A service or description advertisement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentDescription {
    /// The advertised instance.
    #[prost(message, optional, tag = "1")]
    pub description: Option<wire::Instance>,
}

/// A directory search request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentSearch {
    /// Correlates the reply with this request.
    #[prost(uint32, tag = "1")]
    pub search_id: u32,
    /// The query to run.
    #[prost(message, optional, tag = "2")]
    pub query: Option<wire::Query>,
}

/// A point-to-point message for another agent.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AgentMessage {
    /// The dialogue this message belongs to.
    #[prost(uint32, tag = "1")]
    pub dialogue_id: u32,
    /// Public key of the addressed agent.
    #[prost(string, tag = "2")]
    pub destination: String,
    /// Free-form bytes or a FIPA negotiation message.
    #[prost(oneof = "agent_message::Payload", tags = "3, 4")]
    pub payload: Option<agent_message::Payload>,
}

/// Nested types of [`AgentMessage`].
pub mod agent_message {
    /// The message body.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// Free-form content.
        #[prost(bytes, tag = "3")]
        Content(Vec<u8>),
        /// A FIPA negotiation message.
        #[prost(message, tag = "4")]
        Fipa(super::Fipa),
    }
}

/// A FIPA negotiation message: cfp, propose, accept or decline.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fipa {
    /// Position of this message within the dialogue.
    #[prost(uint32, tag = "1")]
    pub msg_id: u32,
    /// `msg_id` of the message this one responds to.
    #[prost(uint32, tag = "2")]
    pub target: u32,
    /// The negotiation act.
    #[prost(oneof = "fipa::Msg", tags = "3, 4, 5, 6")]
    pub msg: Option<fipa::Msg>,
}

/// Nested types of [`Fipa`].
pub mod fipa {
    use super::wire;

    /// A call for proposals.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Cfp {
        /// What is being called for.
        #[prost(oneof = "cfp::Payload", tags = "1, 2, 3")]
        pub payload: Option<cfp::Payload>,
    }

    /// Nested types of [`Cfp`].
    pub mod cfp {
        use super::wire;

        /// The subject of the call.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Payload {
            /// An open call.
            #[prost(message, tag = "1")]
            Nothing(super::super::Nothing),
            /// A query the proposals should satisfy.
            #[prost(message, tag = "2")]
            Query(wire::Query),
            /// Opaque content.
            #[prost(bytes, tag = "3")]
            Content(Vec<u8>),
        }
    }

    /// Instances offered in response to a cfp.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Proposals {
        /// The offered instances.
        #[prost(message, repeated, tag = "1")]
        pub objects: Vec<wire::Instance>,
    }

    /// A proposal.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Propose {
        /// The offer.
        #[prost(oneof = "propose::Payload", tags = "1, 2")]
        pub payload: Option<propose::Payload>,
    }

    /// Nested types of [`Propose`].
    pub mod propose {
        /// The offer body.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Payload {
            /// Typed proposals.
            #[prost(message, tag = "1")]
            Proposals(super::Proposals),
            /// Opaque content.
            #[prost(bytes, tag = "2")]
            Content(Vec<u8>),
        }
    }

    /// Acceptance of a proposal.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Accept {}

    /// Rejection of a proposal.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Decline {}

    /// The negotiation acts.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        /// Call for proposals.
        #[prost(message, tag = "3")]
        Cfp(Cfp),
        /// Proposal.
        #[prost(message, tag = "4")]
        Propose(Propose),
        /// Acceptance.
        #[prost(message, tag = "5")]
        Accept(Accept),
        /// Rejection.
        #[prost(message, tag = "6")]
        Decline(Decline),
    }
}

/// The outer client → server message of an established session.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    /// The request, tagged by operation.
    #[prost(oneof = "envelope::Payload", tags = "1, 2, 3, 4, 5, 6, 7")]
    pub payload: Option<envelope::Payload>,
}

/// Nested types of [`Envelope`].
pub mod envelope {
    /// The eight request kinds.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// Forward a message to another agent.
        #[prost(message, tag = "1")]
        SendMessage(super::AgentMessage),
        /// Advertise a service.
        #[prost(message, tag = "2")]
        RegisterService(super::AgentDescription),
        /// Withdraw a service advertisement.
        #[prost(message, tag = "3")]
        UnregisterService(super::AgentDescription),
        /// Publish the agent's own description.
        #[prost(message, tag = "4")]
        RegisterDescription(super::AgentDescription),
        /// Clear the agent's own description.
        #[prost(message, tag = "5")]
        UnregisterDescription(super::Nothing),
        /// Search agent descriptions.
        #[prost(message, tag = "6")]
        SearchAgents(super::AgentSearch),
        /// Search advertised services.
        #[prost(message, tag = "7")]
        SearchServices(super::AgentSearch),
    }
}

/// The outer server → client message of an established session.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerMessage {
    /// The notification, tagged by kind.
    #[prost(oneof = "server_message::Payload", tags = "1, 2, 3")]
    pub payload: Option<server_message::Payload>,
}

/// Nested types of [`ServerMessage`].
pub mod server_message {
    /// A message forwarded from another agent.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Content {
        /// The dialogue the message belongs to.
        #[prost(uint32, tag = "1")]
        pub dialogue_id: u32,
        /// Public key of the sending agent.
        #[prost(string, tag = "2")]
        pub origin: String,
        /// The forwarded body.
        #[prost(oneof = "content::Payload", tags = "3, 4")]
        pub payload: Option<content::Payload>,
    }

    /// Nested types of [`Content`].
    pub mod content {
        /// The forwarded body.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Payload {
            /// Free-form content.
            #[prost(bytes, tag = "3")]
            Content(Vec<u8>),
            /// A FIPA negotiation message.
            #[prost(message, tag = "4")]
            Fipa(super::super::Fipa),
        }
    }

    /// A search reply.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Agents {
        /// Echo of the request's `search_id`.
        #[prost(uint32, tag = "1")]
        pub search_id: u32,
        /// Identities of the matching agents.
        #[prost(string, repeated, tag = "2")]
        pub agents: Vec<String>,
    }

    /// A failed operation report.
    #[derive(Clone, Copy, PartialEq, ::prost::Message)]
    pub struct Error {
        /// The failed operation, an [`error::Operation`] value.
        #[prost(enumeration = "error::Operation", tag = "1")]
        pub operation: i32,
        /// The dialogue the failure relates to, for message forwarding.
        #[prost(uint32, optional, tag = "2")]
        pub dialogue_id: Option<u32>,
    }

    /// Nested types of [`Error`].
    pub mod error {
        /// The operations an error frame can report on.
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration,
        )]
        #[repr(i32)]
        pub enum Operation {
            /// A service registration was rejected.
            RegisterService = 0,
            /// A service withdrawal was rejected.
            UnregisterService = 1,
            /// A description registration was rejected.
            RegisterDescription = 2,
            /// A message forward failed at the destination socket.
            SendMessage = 3,
        }
    }

    /// The notification kinds.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Payload {
        /// A forwarded agent message.
        #[prost(message, tag = "1")]
        Content(Content),
        /// A search reply.
        #[prost(message, tag = "2")]
        Agents(Agents),
        /// A failed operation report.
        #[prost(message, tag = "3")]
        Error(Error),
    }
}

impl ServerMessage {
    /// A search reply.
    #[must_use]
    pub fn agents(search_id: u32, agents: Vec<String>) -> Self {
        Self {
            payload: Some(server_message::Payload::Agents(server_message::Agents {
                search_id,
                agents,
            })),
        }
    }

    /// A failed operation report.
    #[must_use]
    pub fn error(operation: server_message::error::Operation, dialogue_id: Option<u32>) -> Self {
        Self {
            payload: Some(server_message::Payload::Error(server_message::Error {
                operation: operation as i32,
                dialogue_id,
            })),
        }
    }

    /// A forwarded message, rewriting the originator.
    #[must_use]
    pub fn forwarded(
        dialogue_id: u32,
        origin: impl Into<String>,
        payload: Option<agent_message::Payload>,
    ) -> Self {
        let payload = payload.map(|p| match p {
            agent_message::Payload::Content(bytes) => {
                server_message::content::Payload::Content(bytes)
            },
            agent_message::Payload::Fipa(fipa) => server_message::content::Payload::Fipa(fipa),
        });
        Self {
            payload: Some(server_message::Payload::Content(server_message::Content {
                dialogue_id,
                origin: origin.into(),
                payload,
            })),
        }
    }
}
