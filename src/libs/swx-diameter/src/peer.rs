//! Diameter peer handling per RFC 6733 Section 5
//!
//! Client-side pieces of the peer state machine used by the SWx connection:
//! - Capabilities Exchange (CER/CEA) as initiator
//! - Device Watchdog (DWR/DWA) in both directions
//! - Disconnect Peer (DPR/DPA) answered when the HSS closes the link
//!
//! After the handshake the transport is split; [`classify`] sorts every
//! received message into a [`PeerEvent`] so the receive loop can answer
//! base-protocol requests and forward application answers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;

use crate::avp::{Avp, AvpData};
use crate::common::avp_code;
use crate::config::DiameterConfig;
use crate::error::{DiameterError, DiameterResult, ResultCode};
use crate::message::{base_cmd, DiameterMessage, BASE_APPLICATION_ID};
use crate::swx::SWX_APPLICATION_ID;
use crate::transport::DiameterTransport;
use crate::OGS_3GPP_VENDOR_ID;

/// Disconnect cause values for DPR (RFC 6733 Section 5.4.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DisconnectCause {
    Rebooting = 0,
    Busy = 1,
    DoNotWantToTalkToYou = 2,
}

/// Classification of a message received on an open connection
#[derive(Debug)]
pub enum PeerEvent {
    /// DWR from the remote peer; must be answered with DWA
    WatchdogRequest(DiameterMessage),
    /// DWA for one of our DWRs
    WatchdogAck,
    /// DPR from the remote peer; must be answered with DPA, then close
    DisconnectRequest(DiameterMessage),
    /// Application-level message
    Message(DiameterMessage),
}

/// Classify a message received after the capabilities exchange
pub fn classify(msg: DiameterMessage) -> PeerEvent {
    match (msg.header.command_code, msg.header.is_request()) {
        (base_cmd::DEVICE_WATCHDOG, true) => PeerEvent::WatchdogRequest(msg),
        (base_cmd::DEVICE_WATCHDOG, false) => PeerEvent::WatchdogAck,
        (base_cmd::DISCONNECT_PEER, true) => PeerEvent::DisconnectRequest(msg),
        _ => PeerEvent::Message(msg),
    }
}

/// Hop-by-Hop and End-to-End identifier source shared by all senders
#[derive(Debug)]
pub struct IdentifierGenerator {
    hop_by_hop_seq: AtomicU32,
    end_to_end_seq: AtomicU32,
}

impl IdentifierGenerator {
    /// Create a generator seeded per RFC 6733 Section 3
    /// (End-to-End high 12 bits from the clock)
    pub fn new() -> Self {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default();
        let e2e_seed = ((now.as_secs() as u32) & 0xFFF) << 20;
        Self {
            hop_by_hop_seq: AtomicU32::new(now.subsec_nanos().wrapping_mul(2654435761)),
            end_to_end_seq: AtomicU32::new(e2e_seed | (now.subsec_nanos() & 0xFFFFF)),
        }
    }

    /// Stamp fresh identifiers onto an outgoing request
    pub fn stamp(&self, msg: &mut DiameterMessage) {
        msg.header.hop_by_hop_id = self.hop_by_hop_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        msg.header.end_to_end_id = self.end_to_end_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn add_origin(msg: &mut DiameterMessage, config: &DiameterConfig) {
    msg.add_avp(Avp::mandatory(
        avp_code::ORIGIN_HOST,
        AvpData::DiameterIdentity(config.origin_host.clone()),
    ));
    msg.add_avp(Avp::mandatory(
        avp_code::ORIGIN_REALM,
        AvpData::DiameterIdentity(config.origin_realm.clone()),
    ));
}

fn add_success(msg: &mut DiameterMessage) {
    msg.add_avp(Avp::mandatory(
        avp_code::RESULT_CODE,
        AvpData::Unsigned32(ResultCode::Success as u32),
    ));
}

/// Build Capabilities-Exchange-Request advertising the SWx application
pub fn build_cer(
    config: &DiameterConfig,
    ids: &IdentifierGenerator,
    host_ip: std::net::IpAddr,
) -> DiameterMessage {
    let mut cer = DiameterMessage::new_request(base_cmd::CAPABILITIES_EXCHANGE, BASE_APPLICATION_ID);
    // CER is not proxiable
    cer.header.flags &= !crate::message::cmd_flags::PROXIABLE;
    ids.stamp(&mut cer);

    add_origin(&mut cer, config);
    cer.add_avp(Avp::mandatory(avp_code::HOST_IP_ADDRESS, AvpData::Address(host_ip)));
    cer.add_avp(Avp::mandatory(avp_code::VENDOR_ID, AvpData::Unsigned32(0)));
    cer.add_avp(Avp::new(
        avp_code::PRODUCT_NAME,
        0,
        None,
        AvpData::Utf8String(config.product_name.clone()),
    ));
    cer.add_avp(Avp::mandatory(
        avp_code::ORIGIN_STATE_ID,
        AvpData::Unsigned32(origin_state_id()),
    ));
    cer.add_avp(Avp::mandatory(
        avp_code::SUPPORTED_VENDOR_ID,
        AvpData::Unsigned32(OGS_3GPP_VENDOR_ID),
    ));
    cer.add_avp(Avp::mandatory(
        avp_code::VENDOR_SPECIFIC_APPLICATION_ID,
        AvpData::Grouped(vec![
            Avp::mandatory(avp_code::VENDOR_ID, AvpData::Unsigned32(OGS_3GPP_VENDOR_ID)),
            Avp::mandatory(
                avp_code::AUTH_APPLICATION_ID,
                AvpData::Unsigned32(SWX_APPLICATION_ID),
            ),
        ]),
    ));
    cer
}

/// Validate a CEA and return the remote (Origin-Host, Origin-Realm)
pub fn handle_cea(cea: &DiameterMessage) -> DiameterResult<(String, String)> {
    if cea.header.command_code != base_cmd::CAPABILITIES_EXCHANGE || cea.header.is_request() {
        return Err(DiameterError::Protocol(format!(
            "expected CEA, got command {} (request={})",
            cea.header.command_code,
            cea.header.is_request()
        )));
    }

    let result_code = cea
        .result_code()
        .ok_or_else(|| DiameterError::MissingAvp("Result-Code".into()))?;
    if !ResultCode::from_code(result_code).is_some_and(|rc| rc.is_success()) {
        return Err(DiameterError::Protocol(format!(
            "CEA returned non-success result code: {result_code}"
        )));
    }

    let origin_host = cea
        .origin_host()
        .ok_or_else(|| DiameterError::MissingAvp("Origin-Host".into()))?
        .to_string();
    let origin_realm = cea
        .origin_realm()
        .ok_or_else(|| DiameterError::MissingAvp("Origin-Realm".into()))?
        .to_string();
    Ok((origin_host, origin_realm))
}

/// Run the CER/CEA exchange as initiator on a fresh transport.
///
/// Returns the remote (Origin-Host, Origin-Realm) once the peer is Open.
pub async fn capabilities_exchange(
    transport: &mut DiameterTransport,
    config: &DiameterConfig,
    ids: &IdentifierGenerator,
) -> DiameterResult<(String, String)> {
    let cer = build_cer(config, ids, transport.local_addr().ip());
    transport.send(&cer).await?;
    log::debug!("CER sent to {}", transport.peer_addr());

    let cea = transport.recv().await?;
    let remote = handle_cea(&cea)?;
    log::info!(
        "Diameter peer open: host={}, realm={} ({})",
        remote.0,
        remote.1,
        transport.peer_addr()
    );
    Ok(remote)
}

/// Build a DWR (Device-Watchdog-Request)
pub fn build_dwr(config: &DiameterConfig, ids: &IdentifierGenerator) -> DiameterMessage {
    let mut dwr = DiameterMessage::new_request(base_cmd::DEVICE_WATCHDOG, BASE_APPLICATION_ID);
    dwr.header.flags &= !crate::message::cmd_flags::PROXIABLE;
    ids.stamp(&mut dwr);
    add_origin(&mut dwr, config);
    dwr.add_avp(Avp::mandatory(
        avp_code::ORIGIN_STATE_ID,
        AvpData::Unsigned32(origin_state_id()),
    ));
    dwr
}

/// Build the DWA answering a received DWR
pub fn build_dwa(dwr: &DiameterMessage, config: &DiameterConfig) -> DiameterMessage {
    let mut dwa = DiameterMessage::new_answer(dwr);
    add_success(&mut dwa);
    add_origin(&mut dwa, config);
    dwa.add_avp(Avp::mandatory(
        avp_code::ORIGIN_STATE_ID,
        AvpData::Unsigned32(origin_state_id()),
    ));
    dwa
}

/// Build the DPA answering a received DPR
pub fn build_dpa(dpr: &DiameterMessage, config: &DiameterConfig) -> DiameterMessage {
    let mut dpa = DiameterMessage::new_answer(dpr);
    add_success(&mut dpa);
    add_origin(&mut dpa, config);
    dpa
}

/// Build a DPR (Disconnect-Peer-Request)
pub fn build_dpr(
    config: &DiameterConfig,
    ids: &IdentifierGenerator,
    cause: DisconnectCause,
) -> DiameterMessage {
    let mut dpr = DiameterMessage::new_request(base_cmd::DISCONNECT_PEER, BASE_APPLICATION_ID);
    dpr.header.flags &= !crate::message::cmd_flags::PROXIABLE;
    ids.stamp(&mut dpr);
    add_origin(&mut dpr, config);
    dpr.add_avp(Avp::mandatory(
        avp_code::DISCONNECT_CAUSE,
        AvpData::Enumerated(cause as i32),
    ));
    dpr
}

/// Generate an Origin-State-Id (seconds since epoch at first use)
fn origin_state_id() -> u32 {
    static ORIGIN_STATE: std::sync::OnceLock<u32> = std::sync::OnceLock::new();
    *ORIGIN_STATE.get_or_init(|| {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DiameterListener;

    fn test_config(host: &str) -> DiameterConfig {
        DiameterConfig {
            origin_host: host.to_string(),
            origin_realm: "epc.mnc001.mcc001.3gppnetwork.org".to_string(),
            ..Default::default()
        }
    }

    fn cea_for(cer: &DiameterMessage, config: &DiameterConfig, result: u32) -> DiameterMessage {
        let mut cea = DiameterMessage::new_answer(cer);
        cea.add_avp(Avp::mandatory(avp_code::RESULT_CODE, AvpData::Unsigned32(result)));
        add_origin(&mut cea, config);
        cea
    }

    #[tokio::test]
    async fn test_cer_cea_exchange() {
        let addr: std::net::SocketAddr = ([127, 0, 0, 1], 0).into();
        let listener = DiameterListener::bind(addr).await.unwrap();
        let listen_addr = listener.local_addr().unwrap();

        let hss_cfg = test_config("hss.epc.mnc001.mcc001.3gppnetwork.org");
        let handle = tokio::spawn(async move {
            let mut server = listener.accept().await.unwrap();
            let cer = server.recv().await.unwrap();
            assert_eq!(cer.header.command_code, base_cmd::CAPABILITIES_EXCHANGE);
            assert_eq!(cer.origin_host(), Some("aaa.epc.mnc001.mcc001.3gppnetwork.org"));
            assert!(cer.find_avp(avp_code::VENDOR_SPECIFIC_APPLICATION_ID).is_some());
            server.send(&cea_for(&cer, &hss_cfg, 2001)).await.unwrap();
        });

        let aaa_cfg = test_config("aaa.epc.mnc001.mcc001.3gppnetwork.org");
        let ids = IdentifierGenerator::new();
        let mut client = DiameterTransport::connect(&listen_addr.to_string()).await.unwrap();
        let (host, realm) = capabilities_exchange(&mut client, &aaa_cfg, &ids).await.unwrap();
        assert_eq!(host, "hss.epc.mnc001.mcc001.3gppnetwork.org");
        assert_eq!(realm, "epc.mnc001.mcc001.3gppnetwork.org");

        handle.await.unwrap();
    }

    #[test]
    fn test_cea_failure_rejected() {
        let cfg = test_config("hss.example.com");
        let ids = IdentifierGenerator::new();
        let cer = build_cer(&cfg, &ids, std::net::IpAddr::from([127, 0, 0, 1]));
        let cea = cea_for(&cer, &cfg, 5010);
        assert!(matches!(handle_cea(&cea), Err(DiameterError::Protocol(_))));
    }

    #[test]
    fn test_classify() {
        let cfg = test_config("aaa.example.com");
        let ids = IdentifierGenerator::new();
        let dwr = build_dwr(&cfg, &ids);
        let dwa = build_dwa(&dwr, &cfg);

        assert!(matches!(classify(dwr.clone()), PeerEvent::WatchdogRequest(_)));
        assert!(matches!(classify(dwa), PeerEvent::WatchdogAck));

        let dpr = build_dpr(&cfg, &ids, DisconnectCause::Rebooting);
        assert!(matches!(classify(dpr), PeerEvent::DisconnectRequest(_)));

        let maa = DiameterMessage::new_answer(&DiameterMessage::new_request(303, SWX_APPLICATION_ID));
        assert!(matches!(classify(maa), PeerEvent::Message(_)));
    }

    #[test]
    fn test_identifiers_are_unique() {
        let ids = IdentifierGenerator::new();
        let mut a = DiameterMessage::new_request(303, SWX_APPLICATION_ID);
        let mut b = DiameterMessage::new_request(303, SWX_APPLICATION_ID);
        ids.stamp(&mut a);
        ids.stamp(&mut b);
        assert_ne!(a.header.hop_by_hop_id, b.header.hop_by_hop_id);
        assert_ne!(a.header.end_to_end_id, b.header.end_to_end_id);
    }

    #[test]
    fn test_dwa_echoes_identifiers() {
        let cfg = test_config("aaa.example.com");
        let ids = IdentifierGenerator::new();
        let dwr = build_dwr(&cfg, &ids);
        let dwa = build_dwa(&dwr, &cfg);
        assert!(dwa.header.is_answer());
        assert_eq!(dwa.header.hop_by_hop_id, dwr.header.hop_by_hop_id);
        assert_eq!(dwa.result_code(), Some(2001));
    }
}
