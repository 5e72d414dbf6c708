//! The session client.
//!
//! [`InworldClient`] is an actor: one task owns the token, the outgoing queue,
//! the live session registry, the audio tracker and the connection status. It
//! reacts to a fixed pump tick, to commands from any number of
//! [`ClientHandle`]s, to the results of the network calls it spawned and to
//! events from the socket. Nothing else touches that state.

use crate::{
    audio_utils,
    auth::{HttpTokenSource, TokenSource},
    backoff::Backoff,
    config::ClientConfig,
    conversation::{AudioSessionTracker, TargetChange},
    dispatch::{self, Inbound, Route},
    error::ClientError,
    events::ClientEvents,
    queue::{OutgoingPacket, OutgoingQueue},
    registry::LiveSessionRegistry,
    rest::{self, HttpSessionApi, SessionApi},
    transport::{
        ConnectRequest, Connector, Outbound, TransportEvent, TransportEvents, WsConnector,
    },
};
use inworld_realtime_types::{
    CharacterData, Continuation, ControlAction, Feedback, FeedbackData, InworldError, Packet,
    Target, Token,
    packet::{SessionConfiguration, SessionControlEvent},
};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

/// Connection lifecycle of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    #[default]
    Idle,
    /// Fetching a session token.
    Initializing,
    /// Holding a valid token, no connection yet.
    Initialized,
    /// Socket opening or waiting for the scene to load.
    Connecting,
    Connected,
    Error,
    LostConnect,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// External services the client depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub token_source: Arc<dyn TokenSource>,
    pub connector: Arc<dyn Connector>,
    pub session_api: Arc<dyn SessionApi>,
}

impl Collaborators {
    /// Production collaborators: Inworld REST endpoints and a tungstenite socket.
    pub fn from_config(config: &ClientConfig) -> Self {
        let http = reqwest::Client::new();
        Self {
            token_source: Arc::new(HttpTokenSource::new(http.clone(), config)),
            connector: Arc::new(WsConnector::new(config.close_grace)),
            session_api: Arc::new(HttpSessionApi::new(http, config.server.clone())),
        }
    }
}

enum Command {
    Send {
        packet: Packet,
        target: Target,
    },
    Cancel {
        target: Target,
        interaction_id: String,
        utterance_ids: Vec<String>,
    },
    StartAudio(Target),
    StopAudio,
    SendAudio(String),
    UpdateConversation {
        id: String,
        participants: Vec<String>,
    },
    LoadScene(String),
    UnloadScene,
    Reconnect,
    Disconnect,
    InitWithCustomToken(String, oneshot::Sender<bool>),
    FetchHistory,
    SessionHistory(oneshot::Sender<String>),
    SendFeedback(Feedback),
    LiveSession(oneshot::Sender<Vec<CharacterData>>),
    Shutdown,
}

/// Results of network calls spawned by the client.
enum TaskResult {
    TokenFetched(Result<Token, ClientError>),
    Connected {
        generation: u64,
        result: Result<Box<dyn Outbound>, ClientError>,
    },
    HistoryFetched(Result<String, ClientError>),
    FeedbackSent {
        interaction_id: String,
        result: Result<FeedbackData, ClientError>,
    },
}

enum Event {
    Command(Command),
    Task(TaskResult),
    Transport(u64, TransportEvent),
}

struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    tasks: mpsc::UnboundedReceiver<TaskResult>,
    transport: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
}

impl Inbox {
    async fn next(&mut self) -> Option<Event> {
        tokio::select! {
            biased;
            Some(command) = self.commands.recv() => Some(Event::Command(command)),
            Some(result) = self.tasks.recv() => Some(Event::Task(result)),
            Some((generation, event)) = self.transport.recv() => Some(Event::Transport(generation, event)),
            else => None,
        }
    }
}

pub struct InworldClient {
    config: ClientConfig,
    collaborators: Collaborators,
    events: Arc<ClientEvents>,
    status: ConnectionStatus,
    status_tx: watch::Sender<ConnectionStatus>,
    token: Option<Token>,
    transport: Option<Box<dyn Outbound>>,
    /// Bumped for every connection attempt; events from older ones are ignored.
    generation: u64,
    queue: OutgoingQueue,
    registry: LiveSessionRegistry,
    audio: AudioSessionTracker,
    backoff: Backoff,
    session_history: String,
    /// Feedback already stored on the server, by interaction id.
    feedbacks: HashMap<String, FeedbackData>,
    last_error: Option<InworldError>,
    command_tx: mpsc::UnboundedSender<Command>,
    task_tx: mpsc::UnboundedSender<TaskResult>,
    transport_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    inbox: Option<Inbox>,
}

impl InworldClient {
    pub fn new(config: ClientConfig, collaborators: Collaborators) -> Self {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (task_tx, tasks) = mpsc::unbounded_channel();
        let (transport_tx, transport) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            queue: OutgoingQueue::new(config.max_sent_history),
            backoff: Backoff::new(config.reconnect_base, config.reconnect_max),
            config,
            collaborators,
            events: Arc::new(ClientEvents::default()),
            status: ConnectionStatus::Idle,
            status_tx,
            token: None,
            transport: None,
            generation: 0,
            registry: LiveSessionRegistry::new(),
            audio: AudioSessionTracker::new(),
            session_history: String::new(),
            feedbacks: HashMap::new(),
            last_error: None,
            command_tx,
            task_tx,
            transport_tx,
            inbox: Some(Inbox {
                commands,
                tasks,
                transport,
            }),
        }
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            commands: self.command_tx.clone(),
            status: self.status_tx.subscribe(),
            events: Arc::clone(&self.events),
        }
    }

    /// Runs the client on its own task.
    pub fn spawn(self) -> (ClientHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run());
        (handle, task)
    }

    /// The actor loop. Returns after [`ClientHandle::shutdown`].
    pub async fn run(mut self) {
        let Some(mut inbox) = self.inbox.take() else {
            error!("Client inbox already taken");
            return;
        };
        let pump_interval = self.config.pump_interval;
        let mut ticker = interval(pump_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(scene = %self.config.scene, "Inworld client started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(pump_interval),
                event = inbox.next() => match event {
                    Some(event) => {
                        if !self.handle_event(event) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.close_transport();
        info!("Inworld client stopped");
    }

    /// Waits for and processes a single event, without the pump.
    pub async fn step(&mut self) -> bool {
        let Some(mut inbox) = self.inbox.take() else {
            return false;
        };
        let event = inbox.next().await;
        self.inbox = Some(inbox);
        match event {
            Some(event) => self.handle_event(event),
            None => false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn registry(&self) -> &LiveSessionRegistry {
        &self.registry
    }

    pub fn last_error(&self) -> Option<&InworldError> {
        self.last_error.as_ref()
    }

    pub fn is_token_valid(&self) -> bool {
        self.token.as_ref().is_some_and(Token::is_valid)
    }

    fn handle_event(&mut self, event: Event) -> bool {
        match event {
            Event::Command(command) => return self.handle_command(command),
            Event::Task(result) => self.handle_task(result),
            Event::Transport(generation, event) => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "Ignoring stale transport event");
                } else {
                    self.handle_transport(event);
                }
            }
        }
        true
    }

    /// One pump step: count the backoff down, then let queued packets drive
    /// sending or recovery.
    pub fn tick(&mut self, elapsed: Duration) {
        if matches!(
            self.status,
            ConnectionStatus::Error | ConnectionStatus::LostConnect
        ) && self.backoff.tick(elapsed)
        {
            info!(status = %self.status, "Reconnect backoff elapsed");
            self.set_status(ConnectionStatus::Idle);
        }

        if !self.queue.has_pending() {
            return;
        }
        match self.status {
            ConnectionStatus::Connected => self.flush(),
            ConnectionStatus::Idle => self.get_access_token(),
            ConnectionStatus::Initialized => self.start_session(),
            _ => {}
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        info!(from = %self.status, to = %status, "Connection status changed");
        self.status = status;
        self.status_tx.send_replace(status);
        self.events.status_changed.emit(&status);
    }

    fn set_error(&mut self, error: InworldError) {
        if !error.is_valid() {
            return;
        }
        error!(code = error.code, error_type = ?error.error_type(), "{}", error.message);
        if error.invalidates_token() {
            self.token = None;
        }
        self.last_error = Some(error.clone());
        self.events.error_received.emit(&error);
        if error.is_terminal() {
            self.fail(ConnectionStatus::Error);
        }
    }

    fn client_error(&mut self, err: impl Into<InworldError>) {
        self.set_error(err.into());
    }

    /// Enters a failed state and arms the reconnect backoff.
    fn fail(&mut self, status: ConnectionStatus) {
        let wait = self.backoff.fail();
        warn!(%status, wait_ms = wait.as_millis() as u64, "Connection failed, backing off");
        self.set_status(status);
    }

    pub fn get_access_token(&mut self) {
        self.set_status(ConnectionStatus::Initializing);

        if let Some(custom) = self.config.custom_token.clone() {
            match Token::from_json(&custom) {
                Ok(token) if token.is_valid() => self.accept_token(token),
                _ => self.client_error(ClientError::InvalidToken),
            }
            return;
        }
        if self.config.api_key.is_none() {
            self.client_error(ClientError::MissingCredential("Please fill API Key!"));
            return;
        }
        if self.config.api_secret.is_none() {
            self.client_error(ClientError::MissingCredential("Please fill API Secret!"));
            return;
        }

        let source = Arc::clone(&self.collaborators.token_source);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = source.fetch_token().await;
            let _ = tx.send(TaskResult::TokenFetched(result));
        });
    }

    fn accept_token(&mut self, token: Token) {
        info!(session_id = %token.session_id, "Token accepted");
        self.token = Some(token);
        self.set_status(ConnectionStatus::Initialized);
    }

    pub fn start_session(&mut self) {
        if self.status == ConnectionStatus::Connected {
            return;
        }
        let Some(token) = self.token.clone().filter(Token::is_valid) else {
            info!("Token missing or expired, fetching a new one");
            self.token = None;
            self.get_access_token();
            return;
        };

        self.close_transport();
        self.generation += 1;
        self.set_status(ConnectionStatus::Connecting);

        let request = ConnectRequest {
            url: self.config.server.session_url(&token.session_id),
            authorization: token.authorization(),
        };
        let events = TransportEvents::new(self.generation, self.transport_tx.clone());
        let generation = self.generation;
        let connector = Arc::clone(&self.collaborators.connector);
        let tx = self.task_tx.clone();
        debug!(url = %request.url, generation, "Opening session");
        tokio::spawn(async move {
            let result = connector.connect(request, events).await;
            let _ = tx.send(TaskResult::Connected { generation, result });
        });
    }

    /// The single recovery entry point.
    pub fn reconnect(&mut self) {
        if self.is_token_valid() {
            self.start_session();
        } else {
            self.get_access_token();
        }
    }

    pub fn disconnect(&mut self) {
        self.close_transport();
        self.generation += 1;
        self.mark_offline();
        let dropped = self.queue.pending_len();
        if dropped > 0 {
            debug!(dropped, "Discarding packets queued before disconnect");
            self.queue.clear_pending();
        }
        self.set_status(ConnectionStatus::Idle);
    }

    fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }

    fn mark_offline(&mut self) {
        self.registry.unload_scene();
        self.audio.reset();
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Send { packet, target } => self.enqueue(packet, target),
            Command::Cancel {
                target,
                interaction_id,
                utterance_ids,
            } => {
                let packet = Packet::cancel_responses(interaction_id, utterance_ids);
                self.send_immediate(OutgoingPacket::new(packet, target));
            }
            Command::StartAudio(target) => self.start_audio(target),
            Command::StopAudio => self.stop_audio(),
            Command::SendAudio(chunk) => match self.audio.current().cloned() {
                Some(target) => self.enqueue(Packet::audio(chunk), target),
                None => warn!("Audio chunk without an addressed target dropped"),
            },
            Command::UpdateConversation { id, participants } => {
                self.update_conversation(id, participants)
            }
            Command::LoadScene(scene) => self.load_scene(scene),
            Command::UnloadScene => self.registry.unload_scene(),
            Command::Reconnect => self.reconnect(),
            Command::Disconnect => self.disconnect(),
            Command::InitWithCustomToken(json, reply) => {
                let _ = reply.send(self.init_with_custom_token(&json));
            }
            Command::FetchHistory => self.fetch_history(),
            Command::SessionHistory(reply) => {
                let _ = reply.send(self.session_history.clone());
            }
            Command::SendFeedback(feedback) => self.send_feedback(feedback),
            Command::LiveSession(reply) => {
                let _ = reply.send(self.registry.snapshot());
            }
            Command::Shutdown => return false,
        }
        true
    }

    pub fn enqueue(&mut self, packet: Packet, target: Target) {
        if target.is_empty() {
            warn!(kind = ?packet.kind(), "Packet without a target dropped");
            return;
        }
        self.queue.enqueue(OutgoingPacket::new(packet, target));
    }

    pub fn init_with_custom_token(&mut self, json: &str) -> bool {
        match Token::from_json(json) {
            Ok(token) if token.is_valid() => {
                self.accept_token(token);
                true
            }
            _ => {
                self.client_error(ClientError::InvalidToken);
                false
            }
        }
    }

    fn start_audio(&mut self, target: Target) {
        if self.audio.is_started_for(&target) {
            return;
        }
        match self.audio.update_live_info(target.clone()) {
            TargetChange::Empty => {
                warn!("Cannot start audio without a target");
                return;
            }
            TargetChange::Unchanged => {}
            TargetChange::Switched { stale } => self.on_target_switched(stale),
        }
        let packet = Packet::control(ControlAction::AudioSessionStart);
        let packet_id = packet.packet_id.packet_id.clone();
        self.enqueue(packet, target);
        self.audio.start_audio_session(packet_id);
    }

    fn stop_audio(&mut self) {
        if !self.audio.is_started() {
            return;
        }
        let Some(target) = self.audio.current().cloned() else {
            return;
        };
        let opened_by = self.audio.stop_audio_session();
        debug!(?opened_by, "Closing audio session");
        self.enqueue(Packet::control(ControlAction::AudioSessionEnd), target);
    }

    fn update_conversation(&mut self, id: String, participants: Vec<String>) {
        match self.audio.update_multi_targets(id, participants) {
            TargetChange::Switched { stale } => self.on_target_switched(stale),
            TargetChange::Unchanged => debug!("Conversation participants unchanged"),
            TargetChange::Empty => warn!("Conversation without participants ignored"),
        }
    }

    /// Closes audio on the previous target and announces a new conversation.
    fn on_target_switched(&mut self, stale: Option<Target>) {
        if let Some(stale) = stale {
            self.enqueue(Packet::control(ControlAction::AudioSessionEnd), stale);
        }
        if let Some(target @ Target::Conversation { .. }) = self.audio.current().cloned() {
            self.enqueue(Packet::conversation_update(), target);
        }
    }

    fn load_scene(&mut self, scene: String) {
        self.config.scene = scene;
        if self.status == ConnectionStatus::Connected {
            let packet = Packet::load_scene(self.config.scene.clone());
            if let Err(e) = self.transmit(&packet) {
                self.client_error(e);
            }
        }
    }

    fn fetch_history(&mut self) {
        let Some(token) = self.token.clone().filter(Token::is_valid) else {
            warn!("Cannot fetch history without a valid token");
            return;
        };
        let session_full_name = self.config.session_full_name(&token.session_id);
        if session_full_name.is_empty() {
            warn!(scene = %self.config.scene, "Scene is not a full name, history unavailable");
            return;
        }
        let api = Arc::clone(&self.collaborators.session_api);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = api.fetch_history(session_full_name, token).await;
            let _ = tx.send(TaskResult::HistoryFetched(result));
        });
    }

    fn send_feedback(&mut self, feedback: Feedback) {
        if feedback.interaction_id.is_empty() {
            self.client_error(ClientError::Other("No interaction ID for feedback".to_string()));
            return;
        }
        let Some(token) = self.token.clone().filter(Token::is_valid) else {
            warn!("Cannot send feedback without a valid token");
            return;
        };
        let session_full_name = self.config.session_full_name(&token.session_id);
        let callback_ref = rest::callback_reference(
            &session_full_name,
            &feedback.interaction_id,
            &feedback.correlation_id,
        );
        let update = self.feedbacks.contains_key(&feedback.interaction_id);
        let interaction_id = feedback.interaction_id.clone();
        let api = Arc::clone(&self.collaborators.session_api);
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = api.send_feedback(callback_ref, token, feedback, update).await;
            let _ = tx.send(TaskResult::FeedbackSent {
                interaction_id,
                result,
            });
        });
    }

    fn handle_task(&mut self, result: TaskResult) {
        match result {
            TaskResult::TokenFetched(Ok(token)) if token.is_valid() => self.accept_token(token),
            TaskResult::TokenFetched(Ok(_)) => self.client_error(ClientError::InvalidToken),
            TaskResult::TokenFetched(Err(e)) => self.client_error(e),
            TaskResult::Connected { generation, result } => self.on_connected(generation, result),
            TaskResult::HistoryFetched(Ok(state)) => {
                info!(bytes = state.len(), "Session history fetched");
                self.session_history = state;
            }
            TaskResult::HistoryFetched(Err(e)) => self.client_error(e),
            TaskResult::FeedbackSent {
                interaction_id,
                result: Ok(data),
            } => {
                info!(%interaction_id, name = %data.name, "Feedback stored");
                self.feedbacks.insert(interaction_id, data);
            }
            TaskResult::FeedbackSent { result: Err(e), .. } => self.client_error(e),
        }
    }

    fn on_connected(&mut self, generation: u64, result: Result<Box<dyn Outbound>, ClientError>) {
        if generation != self.generation {
            debug!(generation, "Discarding connection from an abandoned attempt");
            if let Ok(mut transport) = result {
                transport.close();
            }
            return;
        }
        match result {
            Ok(transport) => {
                self.transport = Some(transport);
                if let Err(e) = self.send_handshake() {
                    self.client_error(e);
                }
            }
            Err(e) => {
                self.client_error(e);
                self.fail(ConnectionStatus::LostConnect);
            }
        }
    }

    /// Session configuration sent straight after the socket opens. The
    /// session counts as connected once the scene load is confirmed.
    fn send_handshake(&mut self) -> Result<(), ClientError> {
        let session_id = self
            .token
            .as_ref()
            .map(|t| t.session_id.clone())
            .unwrap_or_default();
        let game_session_id = format!(
            "{}:{}:{}",
            self.config.user.name,
            session_id,
            self.session_guid()
        );
        info!(%game_session_id, capabilities = %self.config.capabilities, "Sending session configuration");

        let mut packets = vec![
            Packet::session_control(SessionControlEvent {
                capabilities_configuration: Some(self.config.capabilities),
                ..Default::default()
            }),
            Packet::session_control(SessionControlEvent {
                session_configuration: Some(SessionConfiguration { game_session_id }),
                ..Default::default()
            }),
            Packet::session_control(SessionControlEvent {
                client_configuration: Some(self.config.client_info.clone()),
                ..Default::default()
            }),
            Packet::session_control(SessionControlEvent {
                user_configuration: Some(self.config.user.clone()),
                ..Default::default()
            }),
        ];
        if let Some(continuation) = self.continuation() {
            packets.push(Packet::session_control(SessionControlEvent {
                continuation: Some(continuation),
                ..Default::default()
            }));
        }
        packets.push(Packet::load_scene(self.config.scene.clone()));

        for packet in &packets {
            self.transmit(packet)?;
        }
        Ok(())
    }

    /// Explicit continuation first, then history fetched at runtime.
    fn continuation(&self) -> Option<Continuation> {
        if self.config.continuation.is_valid() {
            Some(self.config.continuation.clone())
        } else if !self.session_history.is_empty() {
            Some(Continuation::saved_state(self.session_history.clone()))
        } else {
            None
        }
    }

    fn session_guid(&self) -> String {
        [
            self.config.continuation.externally_saved_state.as_str(),
            self.session_history.as_str(),
        ]
        .into_iter()
        .find_map(|state| state.get(..8))
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()[..8].to_string())
    }

    fn transmit(&self, packet: &Packet) -> Result<(), ClientError> {
        let transport = self.transport.as_ref().ok_or(ClientError::TransportClosed)?;
        transport.send(serde_json::to_string(packet)?)
    }

    /// Sends every pending packet in order while a transport is available.
    fn flush(&mut self) {
        while let Some(outgoing) = self.queue.pop_pending() {
            if self.transport.is_none() {
                self.queue.requeue_front(outgoing);
                return;
            }
            let target = outgoing.target.clone();
            let packet = match outgoing.finalize(&self.registry) {
                Ok(packet) => packet,
                Err(rejected) => {
                    warn!(target = ?rejected.target, "Target not in live session, packet dropped");
                    continue;
                }
            };
            if let Err(e) = self.transmit(&packet) {
                self.queue.requeue_front(OutgoingPacket::new(packet, target));
                self.on_send_failed(e);
                return;
            }
            self.events.packet_sent.emit(&packet);
            self.queue.record_sent(packet);
        }
    }

    /// Bypasses the queue. Dropped unless connected.
    fn send_immediate(&mut self, outgoing: OutgoingPacket) {
        if self.status != ConnectionStatus::Connected {
            debug!(kind = ?outgoing.packet.kind(), "Not connected, immediate packet dropped");
            return;
        }
        let packet = match outgoing.finalize(&self.registry) {
            Ok(packet) => packet,
            Err(rejected) => {
                warn!(target = ?rejected.target, "Target not in live session, packet dropped");
                return;
            }
        };
        match self.transmit(&packet) {
            Ok(()) => {
                self.events.packet_sent.emit(&packet);
                self.queue.record_sent(packet);
            }
            Err(e) => self.on_send_failed(e),
        }
    }

    /// A refused frame on a closed transport means the connection is gone.
    fn on_send_failed(&mut self, err: ClientError) {
        let closed = matches!(err, ClientError::TransportClosed);
        self.client_error(err);
        if closed {
            self.lose_connection();
        }
    }

    /// Abandons the current connection and arms the reconnect backoff.
    fn lose_connection(&mut self) {
        self.close_transport();
        self.generation += 1;
        self.mark_offline();
        self.fail(ConnectionStatus::LostConnect);
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.handle_frame(&text),
            TransportEvent::Closed {
                clean,
                code,
                reason,
            } => {
                info!(clean, ?code, %reason, "Session closed");
                if clean {
                    self.close_transport();
                    self.generation += 1;
                    self.mark_offline();
                    self.set_status(ConnectionStatus::Idle);
                } else {
                    self.lose_connection();
                }
            }
            TransportEvent::Error(message) => self.client_error(ClientError::Other(message)),
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let packet = match dispatch::parse_frame(text) {
            Ok(Inbound::Packet(packet)) => packet,
            Ok(Inbound::Error(error)) if dispatch::is_inactivity(&error) => {
                info!(message = %error.message, "Session closed for inactivity");
                self.lose_connection();
                return;
            }
            Ok(Inbound::Error(error)) => {
                self.set_error(error);
                return;
            }
            Err(e) => {
                self.client_error(e);
                return;
            }
        };

        match dispatch::route(packet) {
            Route::SessionLoaded(agents) => {
                self.registry.register(agents);
                info!(characters = self.registry.len(), "Scene loaded");
                self.backoff.reset();
                self.set_status(ConnectionStatus::Connected);
            }
            Route::InteractionEnd(interaction_id) => {
                let removed = self.queue.complete_interaction(&interaction_id);
                debug!(%interaction_id, removed, "Interaction finished");
            }
            Route::Warning(message) => warn!(%message, "Server warning"),
            Route::Forward(packet) => {
                let global = dispatch::is_global(&packet);
                let received = dispatch::attribute(packet, &self.registry);
                if global {
                    self.events.global_packet_received.emit(&received);
                }
                self.events.packet_received.emit(&received);
            }
        }
    }
}

/// Cloneable front end of a running [`InworldClient`].
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    events: Arc<ClientEvents>,
}

impl ClientHandle {
    fn command(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::ClientClosed)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.command(make(tx))?;
        rx.await.map_err(|_| ClientError::ClientClosed)
    }

    pub fn events(&self) -> &Arc<ClientEvents> {
        &self.events
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub async fn wait_for_status(&self, status: ConnectionStatus) -> Result<(), ClientError> {
        let mut rx = self.status.clone();
        rx.wait_for(|s| *s == status)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::ClientClosed)
    }

    /// Queues a packet for `target`.
    pub fn send(&self, packet: Packet, target: Target) -> Result<(), ClientError> {
        self.command(Command::Send { packet, target })
    }

    pub fn send_text(&self, target: Target, text: impl Into<String>) -> Result<(), ClientError> {
        let text = text.into();
        if text.is_empty() {
            return Ok(());
        }
        self.send(Packet::text(text), target)
    }

    /// Sends a trigger. An empty target addresses the world.
    pub fn send_trigger<I, K, V>(
        &self,
        target: Target,
        name: impl Into<String>,
        parameters: I,
    ) -> Result<(), ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let target = if target.is_empty() { Target::World } else { target };
        self.send(Packet::trigger(name, parameters), target)
    }

    /// Cancels the responses of an interaction. Only sent while connected.
    pub fn send_cancel(
        &self,
        target: Target,
        interaction_id: impl Into<String>,
        utterance_ids: Vec<String>,
    ) -> Result<(), ClientError> {
        self.command(Command::Cancel {
            target,
            interaction_id: interaction_id.into(),
            utterance_ids,
        })
    }

    pub fn start_audio(&self, target: Target) -> Result<(), ClientError> {
        self.command(Command::StartAudio(target))
    }

    pub fn stop_audio(&self) -> Result<(), ClientError> {
        self.command(Command::StopAudio)
    }

    /// Sends a base64 PCM16 chunk to the current audio target.
    pub fn send_audio(&self, base64_chunk: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::SendAudio(base64_chunk.into()))
    }

    pub fn send_audio_pcm16(&self, samples: &[i16]) -> Result<(), ClientError> {
        self.send_audio(audio_utils::encode_pcm16(samples))
    }

    /// Sends float samples in [-1.0, 1.0], as captured from a microphone.
    pub fn send_audio_f32(&self, samples: &[f32]) -> Result<(), ClientError> {
        self.send_audio(audio_utils::encode_f32(samples))
    }

    pub fn update_conversation(
        &self,
        conversation_id: impl Into<String>,
        participants: Vec<String>,
    ) -> Result<(), ClientError> {
        self.command(Command::UpdateConversation {
            id: conversation_id.into(),
            participants,
        })
    }

    pub fn load_scene(&self, scene: impl Into<String>) -> Result<(), ClientError> {
        self.command(Command::LoadScene(scene.into()))
    }

    pub fn unload_scene(&self) -> Result<(), ClientError> {
        self.command(Command::UnloadScene)
    }

    pub fn reconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Reconnect)
    }

    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.command(Command::Disconnect)
    }

    pub async fn init_with_custom_token(&self, json: impl Into<String>) -> Result<bool, ClientError> {
        let json = json.into();
        self.request(|reply| Command::InitWithCustomToken(json, reply))
            .await
    }

    /// Fetches the saved state of the current session; it is replayed on the next connect.
    pub fn fetch_history(&self) -> Result<(), ClientError> {
        self.command(Command::FetchHistory)
    }

    pub async fn session_history(&self) -> Result<String, ClientError> {
        self.request(Command::SessionHistory).await
    }

    pub fn send_feedback(&self, feedback: Feedback) -> Result<(), ClientError> {
        self.command(Command::SendFeedback(feedback))
    }

    /// Characters of the current session.
    pub async fn live_session(&self) -> Result<Vec<CharacterData>, ClientError> {
        self.request(Command::LiveSession).await
    }

    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.command(Command::Shutdown)
    }
}
