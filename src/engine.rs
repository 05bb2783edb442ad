//! Composition root and session loop.
//!
//! One task owns everything that mutates: the connection manager, the module
//! manager and (through it) the hook table. It alternates between three
//! waits: connecting, reading the current session, and the reconnect
//! backoff. Control requests are served during all three.

use crate::config::Config;
use crate::control::{ControlHandle, ControlReceiver, ControlRequest};
use crate::error::Outcome;
use crate::hooks::{ErrorReporter, Hook, HookRegistry, Matcher, MetricsReporter, NickHandle, events};
use crate::modules::{ModuleCatalog, ModuleEnv, ModuleManager, ServiceDirectory};
use crate::network::{
    BurstBucket, ConnectionManager, DrainStop, OutputQueue, PRIORITY_URGENT, drain,
};
use crate::telemetry::spans;
use bytes::Bytes;
use futures_util::StreamExt;
use relaybot_proto::{Command, Event, LineCodec, parse_bytes};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{Instrument, debug, info, warn};

/// Owner tag for hooks the engine installs itself.
pub const CORE_OWNER: &str = "core";

/// Upper bound on stopping the output drain, final line included.
const DRAIN_STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct Kill {
    message: String,
    forever: bool,
}

enum SessionEnd {
    Dropped,
    Killed(String),
}

/// Everything the control surface can reach.
struct Core {
    hooks: Arc<HookRegistry>,
    modules: ModuleManager,
}

impl Core {
    /// Serve a lifecycle request; hand a kill back to the caller.
    fn handle(&mut self, request: ControlRequest) -> Option<Kill> {
        match request {
            ControlRequest::Lifecycle { op, name, reply } => {
                let outcome = Outcome::from(self.modules.apply(op, &name));
                // The caller may have given up waiting.
                let _ = reply.send(outcome);
                None
            }
            ControlRequest::Kill { message, forever } => Some(Kill { message, forever }),
        }
    }

    fn handle_line(&self, raw: &Bytes) {
        crate::metrics::record_line_received();
        let Some(event) = parse_bytes(raw) else {
            crate::metrics::record_line_dropped("unparseable");
            return;
        };

        self.hooks
            .dispatch(&Event::new(events::RECV).with_trailing(String::from_utf8_lossy(raw)));

        if !events::is_recognized(&event.command) {
            debug!(command = %event.command, "Dropping unrecognized command");
            crate::metrics::record_line_dropped("unrecognized");
            return;
        }
        self.hooks.dispatch(&event);
    }
}

/// The protocol engine.
pub struct Engine {
    config: Config,
    queue: Arc<OutputQueue>,
    nick: NickHandle,
    connection: ConnectionManager,
    control: ControlHandle,
    control_rx: ControlReceiver,
    core: Core,
    alive: bool,
}

impl Engine {
    /// Engine with the bundled modules available.
    pub fn new(config: Config) -> Self {
        Self::with_catalog(config, Arc::new(ModuleCatalog::with_builtins()))
    }

    pub fn with_catalog(config: Config, catalog: Arc<ModuleCatalog>) -> Self {
        Self::with_reporter(config, catalog, Arc::new(MetricsReporter))
    }

    /// Full constructor; `reporter` receives every hook failure.
    pub fn with_reporter(
        config: Config,
        catalog: Arc<ModuleCatalog>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let nick = NickHandle::new(config.identity.nick.clone());
        let queue = Arc::new(OutputQueue::new());
        let hooks = Arc::new(HookRegistry::new(
            Matcher::new(config.modules.command_prefix.clone(), nick.clone()),
            reporter,
        ));
        let connection = ConnectionManager::from_config(&config);
        let (control, control_rx) = ControlHandle::channel(connection.subscribe());

        let env = ModuleEnv {
            outbox: queue.clone(),
            control: control.clone(),
            nick: nick.clone(),
            data_root: config.modules.data_root.clone(),
        };
        let modules = ModuleManager::new(
            catalog,
            hooks.clone(),
            Arc::new(ServiceDirectory::new()),
            env,
        );

        let engine = Self {
            config,
            queue,
            nick,
            connection,
            control,
            control_rx,
            core: Core { hooks, modules },
            alive: true,
        };
        engine.register_core_hooks();
        engine
    }

    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn outbox(&self) -> &Arc<OutputQueue> {
        &self.queue
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.core.hooks
    }

    pub fn modules(&self) -> &ModuleManager {
        &self.core.modules
    }

    pub fn nick(&self) -> String {
        self.nick.get()
    }

    fn register_core_hooks(&self) {
        let hooks = &self.core.hooks;

        let queue = self.queue.clone();
        let nick = self.nick.clone();
        let identity = self.config.identity.clone();
        hooks.add_hook(
            CORE_OWNER,
            Hook::on(&[events::CONNECT], move |_| {
                nick.set(identity.nick.clone());
                if let Some(password) = &identity.password {
                    queue.pass(password, Some(PRIORITY_URGENT));
                }
                queue.nick(&identity.nick, Some(PRIORITY_URGENT));
                queue.user(identity.username(), &identity.realname, Some(PRIORITY_URGENT));
                Ok(())
            }),
        );

        let queue = self.queue.clone();
        hooks.add_hook(
            CORE_OWNER,
            Hook::on(&["PING"], move |event| {
                let token = event
                    .trailing
                    .as_deref()
                    .or_else(|| event.arg(0))
                    .unwrap_or_default();
                queue.pong(token, Some(PRIORITY_URGENT));
                Ok(())
            }),
        );

        let queue = self.queue.clone();
        let nick = self.nick.clone();
        hooks.add_hook(
            CORE_OWNER,
            Hook::on(&["433"], move |event| {
                let taken = event.arg(1).map(str::to_string).unwrap_or_else(|| nick.get());
                let next = format!("{}_", taken);
                info!(taken = %taken, next = %next, "Nickname in use, retrying");
                nick.set(next.clone());
                queue.nick(&next, Some(PRIORITY_URGENT));
                Ok(())
            }),
        );

        let nick = self.nick.clone();
        hooks.add_hook(
            CORE_OWNER,
            Hook::on(&["001"], move |event| {
                if let Some(confirmed) = event.arg(0) {
                    nick.set(confirmed);
                }
                Ok(())
            }),
        );

        let nick = self.nick.clone();
        hooks.add_hook(
            CORE_OWNER,
            Hook::on(&["NICK"], move |event| {
                if event.nick() == Some(nick.get().as_str()) {
                    if let Some(new) = event.trailing.as_deref().or_else(|| event.arg(0)) {
                        nick.set(new);
                    }
                }
                Ok(())
            }),
        );
    }

    fn autoload(&mut self) {
        for name in self.config.modules.autoload.clone() {
            if let Err(e) = self.core.modules.apply(crate::control::LifecycleOp::Load, &name) {
                warn!(module = %name, error = %e, "Autoload failed");
            }
        }
    }

    fn limiter(&self) -> Option<BurstBucket> {
        let rate = &self.config.rate_limit;
        rate.enabled
            .then(|| BurstBucket::new(rate.capacity, rate.period()))
    }

    /// Run until killed with `forever`.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.autoload();
        info!(modules = ?self.core.modules.enabled(), "Engine started");

        while self.alive {
            let Some((stream, endpoint)) = self.connect().await? else {
                break;
            };
            let span = spans::session(&endpoint, self.connection.attempts());
            let end = self.session(stream).instrument(span).await;

            self.connection.mark_disconnected();
            if let SessionEnd::Killed(message) = end {
                info!(%message, "Session closed on request");
            }
            if self.alive {
                self.backoff().await;
            }
        }

        self.core.modules.unload_all(&self.config.modules.autoload);
        info!("Engine stopped");
        Ok(())
    }

    /// Connect while still serving control requests.
    async fn connect(&mut self) -> anyhow::Result<Option<(tokio::net::TcpStream, String)>> {
        let connected = {
            let connect = self.connection.connect();
            tokio::pin!(connect);
            loop {
                tokio::select! {
                    result = &mut connect => break Some(result),
                    Some(request) = self.control_rx.recv() => {
                        if let Some(kill) = self.core.handle(request) {
                            if kill.forever {
                                self.alive = false;
                                break None;
                            }
                            debug!("Kill while connecting ignored");
                        }
                    }
                }
            }
        };
        match connected {
            Some(result) => Ok(Some(result?)),
            None => {
                self.connection.mark_disconnected();
                Ok(None)
            }
        }
    }

    async fn backoff(&mut self) {
        let delay = self.config.connection.reconnect_backoff();
        info!(delay_secs = delay.as_secs(), "Reconnecting after backoff");
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return,
                Some(request) = self.control_rx.recv() => {
                    if let Some(kill) = self.core.handle(request) {
                        if kill.forever {
                            self.alive = false;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn session(&mut self, stream: tokio::net::TcpStream) -> SessionEnd {
        let max_len = self.config.connection.max_line_len;
        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, LineCodec::with_max_len(max_len));
        let writer = FramedWrite::new(write_half, LineCodec::with_max_len(max_len));

        // Polled from this task so `_SEND` hooks never run alongside the
        // read side's dispatch.
        let (stop_tx, stop_rx) = oneshot::channel();
        let drainer = drain(
            self.queue.clone(),
            self.core.hooks.clone(),
            self.limiter(),
            writer,
            stop_rx,
        );
        tokio::pin!(drainer);
        let mut drained = false;

        self.core.hooks.dispatch(&Event::new(events::CONNECT));

        let end = loop {
            tokio::select! {
                frame = reader.next() => match frame {
                    Some(Ok(raw)) => self.core.handle_line(&raw),
                    Some(Err(e)) if e.is_recoverable() => {
                        warn!(error = %e, "Skipping undecodable input");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Read failed");
                        break SessionEnd::Dropped;
                    }
                    None => {
                        info!("Server closed the connection");
                        break SessionEnd::Dropped;
                    }
                },
                Some(request) = self.control_rx.recv() => {
                    if let Some(kill) = self.core.handle(request) {
                        if kill.forever {
                            self.alive = false;
                        }
                        break SessionEnd::Killed(kill.message);
                    }
                }
                _ = &mut drainer, if !drained => {
                    drained = true;
                    warn!("Output drain ended early");
                    break SessionEnd::Dropped;
                }
            }
        };

        let stop = match &end {
            SessionEnd::Killed(message) => {
                DrainStop::Final(Command::Quit(Some(message.clone())).to_string())
            }
            SessionEnd::Dropped => {
                self.core.hooks.dispatch(&Event::new(events::DISCONNECT));
                DrainStop::Close
            }
        };
        let _ = stop_tx.send(stop);
        if !drained
            && tokio::time::timeout(DRAIN_STOP_TIMEOUT, &mut drainer)
                .await
                .is_err()
        {
            // Dropping the future releases the write half.
            warn!("Timed out stopping output drain");
        }
        if let SessionEnd::Killed(_) = end {
            self.core.hooks.dispatch(&Event::new(events::DISCONNECT));
        }
        end
    }
}
