//! Per-connection session state machine.
//!
//! A connection moves through four states, driven by frame arrivals and
//! I/O errors:
//!
//! ```text
//!   AwaitingId ──> AwaitingHandshakeReply ──> Established ──> Closed
//! ```
//!
//! [`run_connection`] owns the whole lifecycle: it performs the handshake
//! (admission-controlled on the agent's public key), installs the session
//! in the [`AgentDirectory`], then runs the read-dispatch loop until the
//! peer disconnects or the transport fails, at which point the session is
//! swept from both directories.
//!
//! Frames from one connection are handled strictly in order: the next
//! read is only issued after the current handler returns. Writes to one
//! socket are serialized through the session's writer lock, and every
//! write carries a deadline. Directory mutexes are never held across a
//! socket write.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use oef_core::query::QueryModel;
use oef_core::schema::Instance;
use oef_core::ServiceDirectory;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, error, info, warn};

use crate::directory::AgentDirectory;
use crate::protocol::messages::server_message::error::Operation;
use crate::protocol::messages::{
    agent_message, envelope, AgentDescription, AgentMessage, AgentSearch, Answer, Connected,
    Envelope, Id, Phrase, ServerMessage,
};
use crate::protocol::{decode, encode, frame_codec, ProtocolError};

/// Deadline for forwarding a message to its destination socket.
pub const FORWARD_WRITE_DEADLINE: Duration = Duration::from_secs(5);

/// Deadline for replying on the originating socket.
pub const REPLY_WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// The handshake challenge.
///
/// This is a stub: the phrase is fixed and the answer is not verified
/// against the declared public key. A production deployment would plug a
/// real challenge-response in here.
pub const HANDSHAKE_PHRASE: &str = "RandomlyGeneratedString";

type Reader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;
type Writer = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;

/// An established agent connection.
///
/// The session owns the write half of its socket; the read half stays
/// with the connection task. Handlers on any worker thread may write
/// concurrently; writes are serialized by the async lock on the writer,
/// so frames leave the socket whole and in enqueue order.
#[derive(Debug)]
pub struct AgentSession {
    public_key: String,
    description: Mutex<Option<Instance>>,
    writer: tokio::sync::Mutex<Writer>,
}

impl AgentSession {
    pub(crate) fn new(public_key: String, writer: Writer) -> Self {
        Self {
            public_key,
            description: Mutex::new(None),
            writer: tokio::sync::Mutex::new(writer),
        }
    }

    /// The agent's public identity.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.public_key
    }

    /// A clone of the currently registered description, if any.
    #[must_use]
    pub fn description(&self) -> Option<Instance> {
        self.description.lock().unwrap().clone()
    }

    /// Whether the registered description satisfies `query`.
    ///
    /// An agent that has not registered a description never matches.
    #[must_use]
    pub fn matches(&self, query: &QueryModel) -> bool {
        self.description
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|description| query.check(description))
    }

    pub(crate) fn set_description(&self, description: Instance) {
        *self.description.lock().unwrap() = Some(description);
    }

    pub(crate) fn clear_description(&self) {
        *self.description.lock().unwrap() = None;
    }

    /// Writes `msg` to the agent's socket, bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::WriteTimeout`] if the deadline elapses, or
    /// [`ProtocolError::Io`] on transport failure. Either is terminal for
    /// the session; its read loop will observe the dead socket and sweep
    /// it from the directories.
    pub async fn send<M: prost::Message>(
        &self,
        msg: &M,
        deadline: Duration,
    ) -> Result<(), ProtocolError> {
        let frame = encode(msg);
        let mut writer = self.writer.lock().await;
        match tokio::time::timeout(deadline, writer.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ProtocolError::Io(e)),
            Err(_) => Err(ProtocolError::WriteTimeout(deadline)),
        }
    }
}

/// Drives a fresh connection through handshake and, on success, the
/// established request loop. Returns when the connection is closed.
pub async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    agents: Arc<AgentDirectory>,
    services: Arc<ServiceDirectory>,
    max_frame_bytes: usize,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, frame_codec(max_frame_bytes));
    let writer = FramedWrite::new(write_half, frame_codec(max_frame_bytes));

    match perform_handshake(&mut reader, writer, &agents).await {
        Ok(Some(session)) => {
            info!(agent = session.id(), %peer, "agent connected");
            serve(&mut reader, &session, &agents, &services).await;
            agents.remove(session.id());
            services.unregister_all(session.id());
            info!(agent = session.id(), "agent session closed");
        },
        Ok(None) => debug!(%peer, "handshake rejected"),
        Err(e) => debug!(%peer, error = %e, "handshake failed"),
    }
}

/// Runs the server side of the admission handshake.
///
/// Returns the installed session on success, `None` on a clean rejection
/// (duplicate identity, undecodable `ID` or `Answer`), and an error on
/// transport failure.
async fn perform_handshake(
    reader: &mut Reader,
    mut writer: Writer,
    agents: &Arc<AgentDirectory>,
) -> Result<Option<Arc<AgentSession>>, ProtocolError> {
    // AwaitingId: the first frame must identify the agent.
    let Some(frame) = reader.next().await.transpose()? else {
        return Ok(None);
    };
    let id = match decode::<Id>(&frame) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "first frame is not an ID message");
            write_frame(&mut writer, &Phrase::failure(), REPLY_WRITE_DEADLINE).await?;
            return Ok(None);
        },
    };
    if agents.contains(&id.public_key) {
        info!(agent = %id.public_key, "identity already connected, rejecting");
        write_frame(&mut writer, &Phrase::failure(), REPLY_WRITE_DEADLINE).await?;
        return Ok(None);
    }

    // AwaitingHandshakeReply: challenge the agent and read its answer.
    write_frame(
        &mut writer,
        &Phrase::challenge(HANDSHAKE_PHRASE),
        REPLY_WRITE_DEADLINE,
    )
    .await?;
    let answered = match reader.next().await {
        Some(Ok(frame)) => decode::<Answer>(&frame).is_ok(),
        Some(Err(_)) | None => false,
    };
    if !answered {
        warn!(agent = %id.public_key, "no valid handshake answer");
        let _ = write_frame(&mut writer, &Connected { status: false }, REPLY_WRITE_DEADLINE).await;
        return Ok(None);
    }
    // The answer is not checked against the public key; see
    // [`HANDSHAKE_PHRASE`].

    let session = Arc::new(AgentSession::new(id.public_key.clone(), writer));
    if !agents.add(&id.public_key, Arc::clone(&session)) {
        // A second connection with the same key finished its handshake
        // first.
        info!(agent = %id.public_key, "identity raced in during handshake, rejecting");
        let _ = session
            .send(&Connected { status: false }, REPLY_WRITE_DEADLINE)
            .await;
        return Ok(None);
    }
    if let Err(e) = session
        .send(&Connected { status: true }, REPLY_WRITE_DEADLINE)
        .await
    {
        agents.remove(&id.public_key);
        return Err(e);
    }
    Ok(Some(session))
}

/// Established: reads envelopes and dispatches them until the peer goes
/// away. The next read is only issued once the current handler returns.
async fn serve(
    reader: &mut Reader,
    session: &Arc<AgentSession>,
    agents: &Arc<AgentDirectory>,
    services: &Arc<ServiceDirectory>,
) {
    loop {
        match reader.next().await {
            Some(Ok(frame)) => match decode::<Envelope>(&frame) {
                Ok(request) => dispatch(session, agents, services, request).await,
                // A single bad frame does not cost the agent its session.
                Err(e) => error!(agent = session.id(), error = %e, "undecodable envelope"),
            },
            Some(Err(e)) => {
                info!(agent = session.id(), error = %e, "read failed");
                return;
            },
            None => {
                debug!(agent = session.id(), "peer disconnected");
                return;
            },
        }
    }
}

/// Routes one envelope to its handler.
async fn dispatch(
    session: &Arc<AgentSession>,
    agents: &Arc<AgentDirectory>,
    services: &Arc<ServiceDirectory>,
    request: Envelope,
) {
    let Some(payload) = request.payload else {
        error!(agent = session.id(), "envelope payload is not set");
        return;
    };
    match payload {
        envelope::Payload::SendMessage(message) => {
            handle_send_message(session, agents, message).await;
        },
        envelope::Payload::RegisterService(description) => {
            handle_register_service(session, services, description).await;
        },
        envelope::Payload::UnregisterService(description) => {
            handle_unregister_service(session, services, description).await;
        },
        envelope::Payload::RegisterDescription(description) => {
            handle_register_description(session, description).await;
        },
        envelope::Payload::UnregisterDescription(_) => {
            debug!(agent = session.id(), "clearing description");
            session.clear_description();
        },
        envelope::Payload::SearchAgents(search) => {
            let reply = |query: &QueryModel| agents.search(query);
            handle_search(session, search, reply).await;
        },
        envelope::Payload::SearchServices(search) => {
            let reply = |query: &QueryModel| services.query(query);
            handle_search(session, search, reply).await;
        },
    }
}

async fn handle_register_description(session: &Arc<AgentSession>, description: AgentDescription) {
    match decode_instance(description) {
        Ok(instance) => {
            debug!(agent = session.id(), model = instance.model().name(), "registering description");
            session.set_description(instance);
        },
        Err(e) => {
            warn!(agent = session.id(), error = %e, "rejecting description");
            reply_error(session, Operation::RegisterDescription, None).await;
        },
    }
}

async fn handle_register_service(
    session: &Arc<AgentSession>,
    services: &Arc<ServiceDirectory>,
    description: AgentDescription,
) {
    let registered = match decode_instance(description) {
        Ok(instance) => {
            debug!(agent = session.id(), model = instance.model().name(), "registering service");
            services.register(instance, session.id())
        },
        Err(e) => {
            warn!(agent = session.id(), error = %e, "rejecting service registration");
            false
        },
    };
    if !registered {
        reply_error(session, Operation::RegisterService, None).await;
    }
}

async fn handle_unregister_service(
    session: &Arc<AgentSession>,
    services: &Arc<ServiceDirectory>,
    description: AgentDescription,
) {
    let unregistered = match decode_instance(description) {
        Ok(instance) => {
            debug!(agent = session.id(), model = instance.model().name(), "unregistering service");
            services.unregister(&instance, session.id())
        },
        Err(e) => {
            warn!(agent = session.id(), error = %e, "rejecting service withdrawal");
            false
        },
    };
    if !unregistered {
        reply_error(session, Operation::UnregisterService, None).await;
    }
}

async fn handle_search<F>(session: &Arc<AgentSession>, search: AgentSearch, run: F)
where
    F: FnOnce(&QueryModel) -> Vec<String>,
{
    let query = match search
        .query
        .ok_or(ProtocolError::Decode(prost::DecodeError::new(
            "search carries no query",
        )))
        .and_then(|q| QueryModel::try_from(q).map_err(into_decode_error))
    {
        Ok(query) => query,
        Err(e) => {
            // Malformed queries are protocol noise, not session-fatal.
            error!(agent = session.id(), error = %e, "undecodable search query");
            return;
        },
    };
    let found = run(&query);
    debug!(
        agent = session.id(),
        search_id = search.search_id,
        matches = found.len(),
        "search complete"
    );
    let reply = ServerMessage::agents(search.search_id, found);
    if let Err(e) = session.send(&reply, REPLY_WRITE_DEADLINE).await {
        warn!(agent = session.id(), error = %e, "failed to deliver search reply");
    }
}

async fn handle_send_message(
    session: &Arc<AgentSession>,
    agents: &Arc<AgentDirectory>,
    message: AgentMessage,
) {
    let AgentMessage {
        dialogue_id,
        destination,
        payload,
    } = message;
    // The handle is cloned out of the directory so the lock is released
    // before any write.
    let Some(target) = agents.get(&destination) else {
        // Best effort: an absent destination is dropped silently.
        debug!(
            agent = session.id(),
            destination, dialogue_id, "destination not connected, dropping message"
        );
        return;
    };
    let forwarded = ServerMessage::forwarded(dialogue_id, session.id(), payload);
    if let Err(e) = target.send(&forwarded, FORWARD_WRITE_DEADLINE).await {
        warn!(
            agent = session.id(),
            destination, dialogue_id, error = %e, "message forward failed"
        );
        reply_error(session, Operation::SendMessage, Some(dialogue_id)).await;
    }
}

async fn reply_error(session: &Arc<AgentSession>, operation: Operation, dialogue_id: Option<u32>) {
    let reply = ServerMessage::error(operation, dialogue_id);
    if let Err(e) = session.send(&reply, REPLY_WRITE_DEADLINE).await {
        warn!(agent = session.id(), error = %e, "failed to deliver error frame");
    }
}

fn decode_instance(description: AgentDescription) -> Result<Instance, ProtocolError> {
    description
        .description
        .ok_or(ProtocolError::Decode(prost::DecodeError::new(
            "description carries no instance",
        )))
        .and_then(|instance| Instance::try_from(instance).map_err(into_decode_error))
}

fn into_decode_error(e: oef_core::WireError) -> ProtocolError {
    ProtocolError::Decode(prost::DecodeError::new(e.to_string()))
}

/// Writes one frame on a not-yet-established connection.
async fn write_frame<M: prost::Message>(
    writer: &mut Writer,
    msg: &M,
    deadline: Duration,
) -> Result<(), ProtocolError> {
    match tokio::time::timeout(deadline, writer.send(encode(msg))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ProtocolError::Io(e)),
        Err(_) => Err(ProtocolError::WriteTimeout(deadline)),
    }
}
