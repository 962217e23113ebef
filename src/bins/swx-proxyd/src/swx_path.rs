//! SWx Diameter path towards the HSS
//!
//! [`DiameterSender`] is the only thing the proxy needs from the wire: send
//! a request, answers come back through the [`InboundDispatcher`].
//! [`SwxConnection`] implements it over TCP:
//! - dials the HSS lazily and runs CER/CEA
//! - a receive task answers DWR/DPR and dispatches SWx answers
//! - a watchdog task sends DWR every Tc and drops the link after
//!   [`MAX_MISSED_DWA`] unanswered DWRs
//!
//! Connecting and the CER/CEA exchange are bounded by a timeout. When a link
//! goes down the requests written on it are aborted and the next send
//! reconnects.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use swx_diameter::{
    build_dpa, build_dpr, build_dwa, build_dwr, capabilities_exchange, classify, DiameterConfig,
    DiameterMessage, DiameterReader, DiameterTransport, DiameterWriter, DisconnectCause,
    IdentifierGenerator, PeerEvent,
};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::{SwxError, SwxResult};
use crate::swx_handler::InboundDispatcher;
use crate::tracker::UNBOUND_LINK;

/// Unanswered DWRs tolerated before the link is declared dead
pub const MAX_MISSED_DWA: u32 = 3;

/// Outbound half of the SWx interface
#[async_trait]
pub trait DiameterSender: Send + Sync {
    /// Send one request. The answer is delivered through the dispatcher.
    async fn send(&self, msg: &DiameterMessage) -> SwxResult<()>;
}

/// Send with up to `retries` additional attempts
pub async fn send_with_retries(
    sender: &dyn DiameterSender,
    msg: &DiameterMessage,
    retries: u32,
) -> SwxResult<()> {
    let mut attempt = 0;
    loop {
        match sender.send(msg).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < retries => {
                attempt += 1;
                log::warn!(
                    "Send of cmd {} failed ({}), retry {}/{}",
                    msg.header.command_code,
                    e,
                    attempt,
                    retries
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// State shared by the tasks of one connected link
struct LinkShared {
    id: u64,
    writer: Mutex<DiameterWriter>,
    alive: AtomicBool,
    missed_dwa: AtomicU32,
    closed: Notify,
}

impl LinkShared {
    fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.closed.notify_one();
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

struct Link {
    shared: Arc<LinkShared>,
    tasks: Vec<JoinHandle<()>>,
}

/// TCP connection to the HSS
pub struct SwxConnection {
    config: DiameterConfig,
    connect_timeout: Duration,
    ids: Arc<IdentifierGenerator>,
    dispatcher: Arc<InboundDispatcher>,
    link: Mutex<Option<Link>>,
    /// Serializes dials; `link` is only locked briefly
    dialing: Mutex<()>,
    next_link_id: AtomicU64,
}

impl SwxConnection {
    /// `connect_timeout` bounds the TCP connect and the CER/CEA exchange
    pub fn new(
        config: DiameterConfig,
        dispatcher: Arc<InboundDispatcher>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            config,
            connect_timeout,
            ids: Arc::new(IdentifierGenerator::new()),
            dispatcher,
            link: Mutex::new(None),
            dialing: Mutex::new(()),
            next_link_id: AtomicU64::new(UNBOUND_LINK + 1),
        }
    }

    /// Whether a link is currently up
    pub async fn is_connected(&self) -> bool {
        self.live_link().await.is_some()
    }

    async fn live_link(&self) -> Option<Arc<LinkShared>> {
        self.link
            .lock()
            .await
            .as_ref()
            .filter(|l| l.shared.is_alive())
            .map(|l| l.shared.clone())
    }

    async fn dial(&self) -> SwxResult<(DiameterReader, DiameterWriter)> {
        log::info!("Connecting to HSS at {}", self.config.hss_addr);
        let mut transport = DiameterTransport::connect(&self.config.hss_addr).await?;
        capabilities_exchange(&mut transport, &self.config, &self.ids).await?;
        Ok(transport.into_split())
    }

    async fn connected_link(&self) -> SwxResult<Arc<LinkShared>> {
        if let Some(shared) = self.live_link().await {
            return Ok(shared);
        }

        let _dialing = self.dialing.lock().await;
        // Someone else may have connected while we queued
        if let Some(shared) = self.live_link().await {
            return Ok(shared);
        }

        let (reader, writer) = tokio::time::timeout(self.connect_timeout, self.dial())
            .await
            .map_err(|_| {
                SwxError::Send(format!(
                    "no capabilities exchange with {} within {:?}",
                    self.config.hss_addr, self.connect_timeout
                ))
            })??;

        let shared = Arc::new(LinkShared {
            id: self.next_link_id.fetch_add(1, Ordering::SeqCst),
            writer: Mutex::new(writer),
            alive: AtomicBool::new(true),
            missed_dwa: AtomicU32::new(0),
            closed: Notify::new(),
        });

        let tasks = vec![
            tokio::spawn(run_receiver(
                reader,
                shared.clone(),
                self.config.clone(),
                self.dispatcher.clone(),
            )),
            tokio::spawn(run_watchdog(
                shared.clone(),
                self.config.clone(),
                self.ids.clone(),
                Duration::from_secs(self.config.watchdog_interval_sec.max(1)),
            )),
        ];

        // The tasks of a replaced link are left to finish their own cleanup
        *self.link.lock().await = Some(Link {
            shared: shared.clone(),
            tasks,
        });
        Ok(shared)
    }

    /// Send DPR and tear the link down
    pub async fn close(&self) {
        let Some(link) = self.link.lock().await.take() else {
            return;
        };
        if link.shared.is_alive() {
            let dpr = build_dpr(&self.config, &self.ids, DisconnectCause::Rebooting);
            let mut writer = link.shared.writer.lock().await;
            if let Err(e) = writer.send(&dpr).await {
                log::debug!("DPR send failed: {}", e);
            }
            let _ = writer.shutdown().await;
        }
        link.shared.close();
        for task in link.tasks {
            task.abort();
        }
        let aborted = self.dispatcher.tracker().abort_all();
        if aborted > 0 {
            log::warn!("Aborted {} pending SWx requests on close", aborted);
        }
        log::info!("SWx connection to {} closed", self.config.hss_addr);
    }
}

#[async_trait]
impl DiameterSender for SwxConnection {
    async fn send(&self, msg: &DiameterMessage) -> SwxResult<()> {
        let link = self
            .connected_link()
            .await
            .map_err(|e| SwxError::Send(format!("HSS {} unreachable: {}", self.config.hss_addr, e)))?;

        let mut msg = msg.clone();
        self.ids.stamp(&mut msg);

        let tracker = self.dispatcher.tracker();
        let session_id = msg.session_id().map(str::to_string);
        if let Some(sid) = &session_id {
            tracker.bind_link(sid, link.id);
        }

        let result = link.writer.lock().await.send(&msg).await;
        if let Err(e) = result {
            log::error!("Write to HSS failed: {}", e);
            // Not on the wire, so not lost with this link
            if let Some(sid) = &session_id {
                tracker.bind_link(sid, UNBOUND_LINK);
            }
            link.close();
            return Err(SwxError::Send(e.to_string()));
        }
        Ok(())
    }
}

async fn run_receiver(
    mut reader: DiameterReader,
    link: Arc<LinkShared>,
    config: DiameterConfig,
    dispatcher: Arc<InboundDispatcher>,
) {
    let peer = reader.peer_addr();
    loop {
        let received = tokio::select! {
            r = reader.recv_frame() => r,
            _ = link.closed.notified() => break,
        };

        // Framing errors end the link; a frame that fails to decode does not
        let mut frame = match received {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("SWx link to {} lost: {}", peer, e);
                break;
            }
        };
        let msg = match DiameterMessage::decode(&mut frame) {
            Ok(msg) => msg,
            Err(e) => {
                dispatcher.drop_undecodable(&e);
                continue;
            }
        };

        match classify(msg) {
            PeerEvent::WatchdogRequest(dwr) => {
                let dwa = build_dwa(&dwr, &config);
                if let Err(e) = link.writer.lock().await.send(&dwa).await {
                    log::warn!("DWA send to {} failed: {}", peer, e);
                    break;
                }
            }
            PeerEvent::WatchdogAck => {
                link.missed_dwa.store(0, Ordering::SeqCst);
                dispatcher.stats().inc_rx_dwa();
            }
            PeerEvent::DisconnectRequest(dpr) => {
                log::info!("DPR received from {}", peer);
                let dpa = build_dpa(&dpr, &config);
                let _ = link.writer.lock().await.send(&dpa).await;
                break;
            }
            PeerEvent::Message(msg) => {
                dispatcher.dispatch(&msg);
            }
        }
    }

    link.close();
    let aborted = dispatcher.tracker().abort_link(link.id);
    if aborted > 0 {
        log::warn!("Aborted {} pending SWx requests after link loss", aborted);
    }
}

async fn run_watchdog(
    link: Arc<LinkShared>,
    config: DiameterConfig,
    ids: Arc<IdentifierGenerator>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !link.is_alive() {
            break;
        }

        let missed = link.missed_dwa.fetch_add(1, Ordering::SeqCst);
        if missed >= MAX_MISSED_DWA {
            log::error!("No DWA for {} watchdog intervals, dropping SWx link", missed);
            link.close();
            break;
        }

        let dwr = build_dwr(&config, &ids);
        if let Err(e) = link.writer.lock().await.send(&dwr).await {
            log::warn!("DWR send failed: {}", e);
            link.close();
            break;
        }
        log::trace!("DWR sent (missed={})", missed);
    }
}
