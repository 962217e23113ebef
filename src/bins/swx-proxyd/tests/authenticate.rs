//! Authenticate flow against an in-process HSS
//!
//! The fake HSS sits behind `DiameterSender`: every request is passed
//! through the wire codec, answered, and the answer is fed back through the
//! proxy's `InboundDispatcher` exactly like the receive task does.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use swx_diameter::swx::{
    add_auth_data_items, add_experimental_result, add_non_3gpp_user_data, add_result_code,
    auth_scheme, avp, cmd, create_answer, Non3GppUserData, SipAuthDataItem,
};
use swx_diameter::{cmd_flags, DiameterConfig, DiameterMessage, SubscriptionId, OGS_3GPP_VENDOR_ID};
use swx_proxyd::{
    AuthProxy, AuthenticationRequest, DiameterSender, InboundDispatcher, StatusCode, SwxError,
    SwxProxyConfig, SwxProxyContext, SwxResult,
};

const IMSI: &str = "001010000000001";

#[derive(Debug, Clone, Default)]
struct HssBehavior {
    /// Experimental-Result-Code on the MAA instead of success
    maa_experimental: Option<u32>,
    /// Answer the MAR with the 'E' bit set
    maa_error_bit: bool,
    /// Result-Code of the SAA (default 2001)
    saa_result: Option<u32>,
    user_data: Option<Non3GppUserData>,
    /// Never answer
    silent: bool,
    /// Drop every pending request instead of answering
    drop_link: bool,
    /// Answer from a separate task after this delay
    delay: Option<Duration>,
}

struct FakeHss {
    dispatcher: Arc<InboundDispatcher>,
    config: DiameterConfig,
    behavior: Mutex<HssBehavior>,
    sent: Mutex<Vec<DiameterMessage>>,
    send_failures: AtomicUsize,
}

impl FakeHss {
    fn sent(&self) -> Vec<DiameterMessage> {
        self.sent.lock().unwrap().clone()
    }

    fn sent_commands(&self) -> Vec<u32> {
        self.sent().iter().map(|m| m.header.command_code).collect()
    }

    fn answer(&self, request: &DiameterMessage, behavior: &HssBehavior) -> DiameterMessage {
        let mut answer = create_answer(request, &self.config);
        match request.header.command_code {
            cmd::MULTIMEDIA_AUTH => {
                if behavior.maa_error_bit {
                    answer.header.flags |= cmd_flags::ERROR;
                    add_result_code(&mut answer, 3008);
                    return answer;
                }
                match behavior.maa_experimental {
                    Some(code) => add_experimental_result(&mut answer, code),
                    None => {
                        add_result_code(&mut answer, 2001);
                        let count = request
                            .find_vendor_avp(avp::SIP_NUMBER_AUTH_ITEMS, OGS_3GPP_VENDOR_ID)
                            .and_then(|a| a.as_u32())
                            .unwrap_or(1);
                        add_auth_data_items(&mut answer, &vectors(request.user_name().unwrap_or(""), count));
                    }
                }
            }
            cmd::SERVER_ASSIGNMENT => {
                add_result_code(&mut answer, behavior.saa_result.unwrap_or(2001));
                if let Some(data) = &behavior.user_data {
                    add_non_3gpp_user_data(&mut answer, data);
                }
            }
            other => panic!("unexpected command {other}"),
        }
        answer
    }
}

/// Vectors tagged with the last IMSI digit so answers can be told apart
fn vectors(user_name: &str, count: u32) -> Vec<SipAuthDataItem> {
    let tag = user_name.bytes().last().unwrap_or(0);
    (0..count)
        .map(|i| SipAuthDataItem {
            scheme: auth_scheme::EAP_AKA.to_string(),
            authenticate: Bytes::from(vec![tag; 32]),
            authorization: Bytes::from(vec![i as u8; 8]),
            confidentiality_key: Bytes::from(vec![0xcc; 16]),
            integrity_key: Bytes::from(vec![0x1c; 16]),
        })
        .collect()
}

fn through_wire(msg: &DiameterMessage) -> DiameterMessage {
    let mut bytes = msg.encode().freeze();
    DiameterMessage::decode(&mut bytes).unwrap()
}

#[async_trait]
impl DiameterSender for FakeHss {
    async fn send(&self, msg: &DiameterMessage) -> SwxResult<()> {
        if self.send_failures.load(Ordering::SeqCst) > 0 {
            self.send_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(SwxError::Send("connection refused".into()));
        }

        let request = through_wire(msg);
        self.sent.lock().unwrap().push(request.clone());

        let behavior = self.behavior.lock().unwrap().clone();
        if behavior.silent {
            return Ok(());
        }
        if behavior.drop_link {
            self.dispatcher.tracker().abort_all();
            return Ok(());
        }

        let answer = through_wire(&self.answer(&request, &behavior));
        match behavior.delay {
            Some(delay) => {
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    dispatcher.dispatch(&answer);
                });
            }
            None => {
                self.dispatcher.dispatch(&answer);
            }
        }
        Ok(())
    }
}

fn setup(config: SwxProxyConfig, behavior: HssBehavior) -> (AuthProxy, Arc<FakeHss>) {
    let mut hss = None;
    let ctx = SwxProxyContext::new(config, |dispatcher| {
        let fake = Arc::new(FakeHss {
            dispatcher,
            config: DiameterConfig {
                origin_host: "hss.localdomain".to_string(),
                ..Default::default()
            },
            behavior: Mutex::new(behavior),
            sent: Mutex::new(Vec::new()),
            send_failures: AtomicUsize::new(0),
        });
        hss = Some(fake.clone());
        fake as Arc<dyn DiameterSender>
    });
    (AuthProxy::new(ctx), hss.unwrap())
}

fn num_auth_items(msg: &DiameterMessage) -> Option<u32> {
    msg.find_vendor_avp(avp::SIP_NUMBER_AUTH_ITEMS, OGS_3GPP_VENDOR_ID)
        .and_then(|a| a.as_u32())
}

fn e164_user_data(access: Option<u32>) -> Non3GppUserData {
    Non3GppUserData {
        subscription_id: Some(SubscriptionId::new_e164("15551234567")),
        non_3gpp_ip_access: access,
    }
}

#[tokio::test]
async fn test_vector_count_escalated_and_cached() {
    let (proxy, hss) = setup(SwxProxyConfig::default(), HssBehavior::default());

    let answer = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 2))
        .await
        .unwrap();

    let sent = hss.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(num_auth_items(&sent[0]), Some(5));
    assert_eq!(answer.user_name, IMSI);
    assert_eq!(answer.sip_auth_vectors.len(), 5);
    assert!(answer.user_profile.is_none());

    let ctx = proxy.context();
    let cached = ctx.cache.as_ref().unwrap().get(IMSI).unwrap();
    assert_eq!(cached, answer);
    assert!(ctx.tracker.is_empty());
    assert_eq!(ctx.stats.snapshot().tx_mar, 1);
    assert_eq!(ctx.stats.result_code_count(2001), 1);
}

#[tokio::test]
async fn test_second_call_served_from_cache() {
    let (proxy, hss) = setup(SwxProxyConfig::default(), HssBehavior::default());

    let first = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 2))
        .await
        .unwrap();
    let second = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(hss.sent().len(), 1);
    let stats = proxy.context().stats.snapshot();
    assert_eq!(stats.cache_hit, 1);
    assert_eq!(stats.cache_miss, 1);
}

#[tokio::test]
async fn test_no_escalation_without_cache() {
    let mut config = SwxProxyConfig::default();
    config.cache.enabled = false;
    let (proxy, hss) = setup(config, HssBehavior::default());

    let answer = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 2))
        .await
        .unwrap();
    assert_eq!(num_auth_items(&hss.sent()[0]), Some(2));
    assert_eq!(answer.sip_auth_vectors.len(), 2);

    proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 2))
        .await
        .unwrap();
    assert_eq!(hss.sent().len(), 2);
}

#[tokio::test]
async fn test_timeout_leaves_no_pending_entry() {
    let mut config = SwxProxyConfig::default();
    config.timeout_ms = 50;
    let (proxy, hss) = setup(
        config,
        HssBehavior {
            silent: true,
            ..Default::default()
        },
    );

    let rejection = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap_err();

    assert_eq!(rejection.status(), StatusCode::DeadlineExceeded);
    assert!(rejection.answer.is_none());
    assert_eq!(hss.sent().len(), 1);
    let ctx = proxy.context();
    assert!(ctx.tracker.is_empty());
    assert_eq!(ctx.stats.snapshot().timeouts, 1);
    assert!(ctx.cache.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_requests_send_nothing() {
    let (proxy, hss) = setup(SwxProxyConfig::default(), HssBehavior::default());

    for request in [
        AuthenticationRequest::new("0010100000000012", 1),
        AuthenticationRequest::new("", 1),
        AuthenticationRequest::new(IMSI, 0),
    ] {
        let rejection = proxy.authenticate(&request).await.unwrap_err();
        assert_eq!(rejection.status(), StatusCode::InvalidArgument);
    }

    let mut request = AuthenticationRequest::new(IMSI, 1);
    request.authentication_scheme = "EAP_TLS".to_string();
    let rejection = proxy.authenticate(&request).await.unwrap_err();
    assert_eq!(rejection.status(), StatusCode::InvalidArgument);

    assert!(hss.sent().is_empty());
    assert!(proxy.context().tracker.is_empty());
}

#[tokio::test]
async fn test_experimental_failure_returns_no_vectors() {
    let (proxy, hss) = setup(
        SwxProxyConfig::default(),
        HssBehavior {
            maa_experimental: Some(5001),
            ..Default::default()
        },
    );

    let mut request = AuthenticationRequest::new(IMSI, 1);
    request.retrieve_user_profile = true;
    let rejection = proxy.authenticate(&request).await.unwrap_err();

    assert_eq!(rejection.status(), StatusCode::PermissionDenied);
    assert!(rejection.answer.is_none());
    assert!(rejection.to_string().contains("5001"));
    // No SAR after a failed MAA, and nothing cached
    assert_eq!(hss.sent_commands(), vec![cmd::MULTIMEDIA_AUTH]);
    assert!(proxy.context().cache.as_ref().unwrap().is_empty());
    assert_eq!(proxy.context().stats.experimental_code_count(5001), 1);
}

#[tokio::test]
async fn test_error_answer_is_internal() {
    let (proxy, _hss) = setup(
        SwxProxyConfig::default(),
        HssBehavior {
            maa_error_bit: true,
            ..Default::default()
        },
    );

    let rejection = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap_err();
    assert_eq!(rejection.status(), StatusCode::Internal);
    assert_eq!(proxy.context().stats.result_code_count(3008), 1);
}

#[tokio::test]
async fn test_link_loss_aborts_request() {
    let (proxy, _hss) = setup(
        SwxProxyConfig::default(),
        HssBehavior {
            drop_link: true,
            ..Default::default()
        },
    );

    let rejection = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap_err();
    assert_eq!(rejection.status(), StatusCode::Aborted);
    assert_eq!(proxy.context().stats.snapshot().aborted, 1);
}

#[tokio::test]
async fn test_unauthorized_returns_partial_answer() {
    let mut config = SwxProxyConfig::default();
    config.verify_authorization = true;
    let (proxy, hss) = setup(
        config,
        HssBehavior {
            user_data: Some(e164_user_data(Some(1))),
            ..Default::default()
        },
    );

    let rejection = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap_err();

    assert_eq!(rejection.status(), StatusCode::PermissionDenied);
    let partial = rejection.answer.unwrap();
    assert_eq!(partial.sip_auth_vectors.len(), 5);
    assert!(partial.user_profile.is_none());
    assert_eq!(
        hss.sent_commands(),
        vec![cmd::MULTIMEDIA_AUTH, cmd::SERVER_ASSIGNMENT]
    );
    let ctx = proxy.context();
    assert_eq!(ctx.stats.snapshot().unauthorized, 1);
    assert!(ctx.cache.as_ref().unwrap().is_empty());
}

#[tokio::test]
async fn test_authorized_user_gets_profile() {
    let mut config = SwxProxyConfig::default();
    config.verify_authorization = true;
    let (proxy, hss) = setup(
        config,
        HssBehavior {
            user_data: Some(e164_user_data(Some(0))),
            ..Default::default()
        },
    );

    let answer = proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap();
    assert_eq!(answer.user_profile.unwrap().msisdn, "15551234567");

    let sent = hss.sent();
    let sar = &sent[1];
    assert_eq!(sar.user_name(), Some(IMSI));
    assert_ne!(sar.session_id(), sent[0].session_id());
}

#[tokio::test]
async fn test_profile_required_bypasses_profileless_entry() {
    let (proxy, hss) = setup(
        SwxProxyConfig::default(),
        HssBehavior {
            user_data: Some(e164_user_data(None)),
            ..Default::default()
        },
    );

    proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap();
    assert_eq!(hss.sent_commands(), vec![cmd::MULTIMEDIA_AUTH]);

    let mut request = AuthenticationRequest::new(IMSI, 1);
    request.retrieve_user_profile = true;
    let answer = proxy.authenticate(&request).await.unwrap();
    assert_eq!(answer.user_profile.as_ref().unwrap().msisdn, "15551234567");
    assert_eq!(
        hss.sent_commands(),
        vec![cmd::MULTIMEDIA_AUTH, cmd::MULTIMEDIA_AUTH, cmd::SERVER_ASSIGNMENT]
    );

    // Now the entry has a profile and serves both kinds of request
    let cached = proxy.authenticate(&request).await.unwrap();
    assert_eq!(cached, answer);
    assert_eq!(hss.sent().len(), 3);
}

#[tokio::test]
async fn test_sar_failure_keeps_vectors() {
    let (proxy, _hss) = setup(
        SwxProxyConfig::default(),
        HssBehavior {
            saa_result: Some(5012),
            ..Default::default()
        },
    );

    let mut request = AuthenticationRequest::new(IMSI, 1);
    request.retrieve_user_profile = true;
    let answer = proxy.authenticate(&request).await.unwrap();
    assert_eq!(answer.sip_auth_vectors.len(), 5);
    assert!(answer.user_profile.is_none());
}

#[tokio::test]
async fn test_non_e164_subscription_has_no_profile() {
    let (proxy, _hss) = setup(
        SwxProxyConfig::default(),
        HssBehavior {
            user_data: Some(Non3GppUserData {
                subscription_id: Some(SubscriptionId::new_imsi(IMSI)),
                non_3gpp_ip_access: Some(0),
            }),
            ..Default::default()
        },
    );

    let mut request = AuthenticationRequest::new(IMSI, 1);
    request.retrieve_user_profile = true;
    let answer = proxy.authenticate(&request).await.unwrap();
    assert!(answer.user_profile.is_none());
}

#[tokio::test]
async fn test_resync_bypasses_cache() {
    let (proxy, hss) = setup(SwxProxyConfig::default(), HssBehavior::default());
    proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .unwrap();

    let mut request = AuthenticationRequest::new(IMSI, 1);
    request.resync_info = Bytes::from(vec![0x5a; 30]);
    let answer = proxy.authenticate(&request).await.unwrap();

    let sent = hss.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(num_auth_items(&sent[1]), Some(1));
    assert_eq!(answer.sip_auth_vectors.len(), 1);
    // The resync answer replaces the cached entry
    let cached = proxy.context().cache.as_ref().unwrap().get(IMSI).unwrap();
    assert_eq!(cached.sip_auth_vectors.len(), 1);
    assert_eq!(proxy.context().stats.snapshot().cache_hit, 0);
}

#[tokio::test]
async fn test_send_retries() {
    let (proxy, hss) = setup(SwxProxyConfig::default(), HssBehavior::default());

    hss.send_failures.store(1, Ordering::SeqCst);
    assert!(proxy
        .authenticate(&AuthenticationRequest::new(IMSI, 1))
        .await
        .is_ok());

    hss.send_failures.store(5, Ordering::SeqCst);
    let rejection = proxy
        .authenticate(&AuthenticationRequest::new("001010000000002", 1))
        .await
        .unwrap_err();
    assert_eq!(rejection.status(), StatusCode::Internal);

    let ctx = proxy.context();
    assert_eq!(ctx.stats.snapshot().tx_mar_error, 1);
    assert!(ctx.tracker.is_empty());
}

#[tokio::test]
async fn test_concurrent_calls_are_isolated() {
    let mut config = SwxProxyConfig::default();
    config.cache.enabled = false;
    let (proxy, _hss) = setup(
        config,
        HssBehavior {
            delay: Some(Duration::from_millis(20)),
            ..Default::default()
        },
    );

    let mut handles = Vec::new();
    for i in 1..=9u8 {
        let proxy = proxy.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("00101000000000{i}");
            let request = AuthenticationRequest::new(&user, u32::from(i));
            (user, i, proxy.authenticate(&request).await)
        }));
    }

    for handle in handles {
        let (user, i, result) = handle.await.unwrap();
        let answer = result.unwrap();
        assert_eq!(answer.user_name, user);
        assert_eq!(answer.sip_auth_vectors.len(), usize::from(i));
        let tag = user.bytes().last().unwrap();
        assert!(answer
            .sip_auth_vectors
            .iter()
            .all(|v| v.rand_autn == Bytes::from(vec![tag; 32])));
    }
    assert!(proxy.context().tracker.is_empty());
}
