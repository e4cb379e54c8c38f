use std::{sync::Arc, time::Duration};
use nabac::config::NabacConfig;
use nabac::encoding::types;
use nabac::error::AbacError;
use nabac::ndn::{Data, Forwarder, Name};
use nabac::roles::{AttributeAuthority, Consumer, DataOwner, Producer, Stage, TokenIssuer};
use nabac::security::{Certificate, KeyChain, KeyParams, TrustConfig};
use nabac::utils::policy::{AttributeSet, Policy};

const POLICY: &str = "attr1 attr2 1of2 attr3 2of2";

fn name(uri: &str) -> Name {
    Name::from_uri(uri).unwrap()
}

/// The CK name a content Data points at.
fn content_key_name(data: &Data) -> Name {
    let mut reader = data.content_block().reader().unwrap();
    reader.expect(types::CONTENT).unwrap();
    Name::wire_decode(&reader.expect(types::NAME).unwrap()).unwrap()
}

fn trust(anchors: &[&Certificate]) -> TrustConfig {
    let mut trust = TrustConfig::new();
    for anchor in anchors {
        trust.add_anchor((*anchor).clone());
    }
    trust
}

struct Network {
    forwarder: Forwarder,
    keychain: KeyChain,
    config: NabacConfig,
    aa_certificate: Certificate,
    issuer_certificate: Certificate,
    producer_certificate: Certificate,
    aa: AttributeAuthority,
    issuer: TokenIssuer,
    producer: Producer,
    owner: DataOwner,
}

impl Network {
    fn new(config: NabacConfig) -> Network {
        let forwarder = Forwarder::new();
        let keychain = KeyChain::new();
        let aa_certificate = keychain.create_identity(&name("/aa"), KeyParams::Ed25519).unwrap();
        let issuer_certificate = keychain.create_identity(&name("/issuer"), KeyParams::Ed25519).unwrap();
        let producer_certificate = keychain.create_identity(&name("/producer"), KeyParams::Ed25519).unwrap();
        let owner_certificate = keychain
            .create_identity(&name("/owner"), KeyParams::Rsa { bits: 1024 })
            .unwrap();

        let aa = AttributeAuthority::new(
            name("/aa"),
            forwarder.add_face(),
            keychain.clone(),
            trust(&[&owner_certificate]),
        )
        .unwrap();
        aa.add_token_issuer(issuer_certificate.clone());
        let issuer = TokenIssuer::new(
            name("/issuer"),
            forwarder.add_face(),
            keychain.clone(),
            trust(&[&owner_certificate]),
        );
        let producer = Producer::new(
            name("/producer"),
            forwarder.add_face(),
            keychain.clone(),
            trust(&[&aa_certificate]),
            &config,
        )
        .unwrap();
        producer.add_data_owner(owner_certificate);
        let owner = DataOwner::new(
            name("/owner"),
            forwarder.add_face(),
            keychain.clone(),
            trust(&[&aa_certificate, &issuer_certificate, &producer_certificate]),
            config.transport.clone(),
        );
        Network {
            forwarder,
            keychain,
            config,
            aa_certificate,
            issuer_certificate,
            producer_certificate,
            aa,
            issuer,
            producer,
            owner,
        }
    }

    /// Enrolls a consumer holding `attributes`.
    fn consumer(&self, identity: &str, attributes: &[&str]) -> Consumer {
        let identity = name(identity);
        let certificate = self
            .keychain
            .create_identity(&identity, KeyParams::Rsa { bits: 1024 })
            .unwrap();
        self.aa.add_trust_anchor(certificate.clone());
        self.issuer.add_trust_anchor(certificate);
        self.issuer
            .grant(identity.clone(), attributes.iter().copied().collect());
        Consumer::new(
            identity,
            self.forwarder.add_face(),
            self.keychain.clone(),
            trust(&[&self.aa_certificate, &self.issuer_certificate, &self.producer_certificate]),
            name("/aa"),
            name("/issuer"),
            self.config.transport.clone(),
        )
    }

    async fn publish(&self, prefix: &str, policy: &str, payload: &[u8]) {
        if !self.producer.has_public_params() {
            self.producer.fetch_public_params(&name("/aa")).await.unwrap();
        }
        self.owner
            .command_producer_policy(&name("/producer"), &name(prefix), policy)
            .await
            .unwrap();
        self.producer.serve(&name(prefix), payload.to_vec());
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn end_to_end_scenario() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, b"HELLO").await;
    let c1 = network.consumer("/consumer1", &["attr1", "attr3"]);
    let c2 = network.consumer("/consumer2", &["attr1"]);

    let content = name("/producer/dataName");
    assert_eq!(c1.consume(&content).await.unwrap(), b"HELLO");

    let denied = c2.consume(&content).await.unwrap_err();
    assert_eq!(denied.stage, Stage::Decrypt);
    assert!(matches!(denied.source, AbacError::Entitlement(_)));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn content_key_is_reused_until_the_policy_changes() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, &[]).await;
    let c1 = network.consumer("/consumer1", &["attr2", "attr3"]);
    let content = name("/producer/dataName/segment/0");
    assert!(c1.consume(&content).await.unwrap().is_empty());
    assert!(c1.consume(&content).await.unwrap().is_empty());

    let first = network.producer.produce(&name("/dataName"), b"x").unwrap();
    let second = network.producer.produce(&name("/dataName/other"), b"x").unwrap();
    // fresh IV, same key
    assert_ne!(first.content, second.content);
    assert_eq!(content_key_name(&first), content_key_name(&second));

    network.producer.reassign_policy(name("/dataName"), Policy::parse("attr1").unwrap());
    let rotated = network.producer.produce(&name("/dataName"), b"x").unwrap();
    assert_ne!(content_key_name(&rotated), content_key_name(&first));
    let denied = c1.consume(&content).await.unwrap_err();
    assert_eq!(denied.stage, Stage::Decrypt);
    assert!(matches!(denied.source, AbacError::Entitlement(_)));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn only_the_data_owner_assigns_policies() {
    let network = Network::new(NabacConfig::default());
    // the authority is a producer trust anchor but not a data owner
    let authority_as_owner = DataOwner::new(
        name("/aa"),
        network.forwarder.add_face(),
        network.keychain.clone(),
        trust(&[&network.producer_certificate]),
        network.config.transport.clone(),
    );
    let refused = authority_as_owner
        .command_producer_policy(&name("/producer"), &name("/dataName"), "attr1")
        .await;
    assert!(matches!(refused, Err(AbacError::Trust(_))));
    assert_eq!(network.producer.policy_for(&name("/dataName")), None);

    network
        .owner
        .command_producer_policy(&name("/producer"), &name("/dataName"), POLICY)
        .await
        .unwrap();
    assert_eq!(network.producer.policy_for(&name("/dataName")).unwrap().as_str(), POLICY);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn second_assignment_is_rejected_with_exists() {
    let network = Network::new(NabacConfig::default());
    let producer = name("/producer");
    let prefix = name("/dataName");
    network
        .owner
        .command_producer_policy(&producer, &prefix, POLICY)
        .await
        .unwrap();
    for policy in [POLICY, "attr3"] {
        assert_eq!(
            network.owner.command_producer_policy(&producer, &prefix, policy).await,
            Err(AbacError::Conflict("exists".into()))
        );
    }
    assert_eq!(network.producer.policy_for(&prefix).unwrap().as_str(), POLICY);
    assert!(matches!(
        network.owner.command_producer_policy(&producer, &name("/other"), "attr1 3of2").await,
        Err(AbacError::Parse(_))
    ));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn empty_grant_never_yields_a_key() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, b"HELLO").await;
    let nobody = network.consumer("/consumer3", &[]);
    let denied = nobody.consume(&name("/producer/dataName")).await.unwrap_err();
    assert_eq!(denied.stage, Stage::DecryptionKey);
    assert!(matches!(denied.source, AbacError::Entitlement(_)));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn unknown_identity_is_not_enrolled() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, b"HELLO").await;
    let identity = name("/consumer4");
    let certificate = network
        .keychain
        .create_identity(&identity, KeyParams::Rsa { bits: 1024 })
        .unwrap();
    network.issuer.add_trust_anchor(certificate.clone());
    network.aa.add_trust_anchor(certificate);
    let unlisted = Consumer::new(
        identity,
        network.forwarder.add_face(),
        network.keychain.clone(),
        trust(&[&network.aa_certificate, &network.issuer_certificate, &network.producer_certificate]),
        name("/aa"),
        name("/issuer"),
        network.config.transport.clone(),
    );

    let denied = unlisted.consume(&name("/producer/dataName")).await.unwrap_err();
    assert_eq!(denied.stage, Stage::AttributeToken);
    match denied.source {
        AbacError::Entitlement(reason) => assert!(reason.contains("not enrolled")),
        other => panic!("unexpected {:?}", other),
    }
}

#[test_log::test(tokio::test(start_paused = true))]
async fn grant_changes_are_picked_up() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, b"HELLO").await;
    let c1 = network.consumer("/consumer1", &["attr1"]);
    let content = name("/producer/dataName");
    assert_eq!(c1.consume(&content).await.unwrap_err().stage, Stage::Decrypt);

    // grants replace, they do not merge
    network.issuer.grant(name("/consumer1"), AttributeSet::from_iter(["attr2", "attr3"]));
    assert_eq!(c1.consume(&content).await.unwrap(), b"HELLO");
    network.issuer.grant(name("/consumer1"), AttributeSet::from_iter(["attr3"]));
    assert_eq!(c1.consume(&content).await.unwrap_err().stage, Stage::Decrypt);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn one_timeout_is_absorbed_by_the_retry_bound() {
    let network = Network::new(NabacConfig::default());
    network.forwarder.inject_loss(name("/aa/PUBLIC_PARAMS"), 1);
    network.producer.fetch_public_params(&name("/aa")).await.unwrap();
    assert!(network.producer.has_public_params());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn exceeding_the_retry_bound_is_terminal() {
    let config = NabacConfig::from_toml_str("[transport]\nrepeat_attempts = 2\ninterest_lifetime_ms = 500\n").unwrap();
    let network = Network::new(config);
    network.forwarder.inject_loss(name("/aa/PUBLIC_PARAMS"), 2);
    let start = tokio::time::Instant::now();
    let result = network.producer.fetch_public_params(&name("/aa")).await;
    assert!(matches!(result, Err(AbacError::Transport(_))));
    assert!(!network.producer.has_public_params());
    assert!(start.elapsed() >= Duration::from_millis(1000));

    // the loss budget is spent, the next attempt goes through
    network.producer.fetch_public_params(&name("/aa")).await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn content_timeouts_surface_as_the_content_stage() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, b"HELLO").await;
    let c1 = network.consumer("/consumer1", &["attr1", "attr3"]);
    network.forwarder.inject_loss(name("/producer/dataName"), 3);
    let failed = c1.consume(&name("/producer/dataName")).await.unwrap_err();
    assert_eq!(failed.stage, Stage::Content);
    assert!(failed.source.is_retryable());
}

#[test_log::test(tokio::test(start_paused = true))]
async fn missing_policy_is_a_signed_state_rejection() {
    let network = Network::new(NabacConfig::default());
    network.producer.fetch_public_params(&name("/aa")).await.unwrap();
    network.producer.serve(&name("/unassigned"), b"HELLO".to_vec());
    let c1 = network.consumer("/consumer1", &["attr1", "attr3"]);
    let failed = c1.consume(&name("/producer/unassigned")).await.unwrap_err();
    assert_eq!(failed.stage, Stage::Content);
    assert!(matches!(failed.source, AbacError::State(_)));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn untrusted_producer_is_refused() {
    let network = Network::new(NabacConfig::default());
    network.publish("/dataName", POLICY, b"HELLO").await;
    let c1 = network.consumer("/consumer1", &["attr1", "attr3"]);
    let fake = name("/producer/dataName/fake");
    network.keychain.create_identity(&fake, KeyParams::Ed25519).unwrap();
    let impostor = Producer::new(
        fake,
        network.forwarder.add_face(),
        network.keychain.clone(),
        trust(&[&network.aa_certificate]),
        &NabacConfig::default(),
    )
    .unwrap();
    impostor.fetch_public_params(&name("/aa")).await.unwrap();
    impostor.reassign_policy(Name::new(), Policy::parse("attr1").unwrap());
    impostor.serve(&Name::new(), b"EVIL".to_vec());

    let refused = c1.consume(&name("/producer/dataName/fake")).await.unwrap_err();
    assert_eq!(refused.stage, Stage::Content);
    assert!(matches!(refused.source, AbacError::Trust(_)));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn shutdown_releases_the_authority() {
    let network = Network::new(NabacConfig::default());
    let c1 = network.consumer("/consumer1", &["attr1"]);
    network.aa.shutdown();
    let failed = c1.consume(&name("/producer/dataName")).await.unwrap_err();
    assert_eq!(failed.stage, Stage::PublicParams);
    assert!(matches!(failed.source, AbacError::Transport(_)));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn owner_commands_can_require_an_attribute_signature() {
    let config = NabacConfig::from_toml_str("[producer]\nowner_policy = \"data-owner admin 1of2\"\n").unwrap();
    let network = Network::new(config);
    network.issuer.grant(name("/owner"), AttributeSet::from_iter(["data-owner"]));
    network.producer.fetch_public_params(&name("/aa")).await.unwrap();
    let producer = name("/producer");

    // unsigned command
    assert!(matches!(
        network.owner.command_producer_policy(&producer, &name("/dataName"), POLICY).await,
        Err(AbacError::Trust(_))
    ));

    network
        .owner
        .obtain_signing_key(&name("/issuer"), &name("/aa"), "data-owner admin 1of2")
        .await
        .unwrap();
    network
        .owner
        .command_producer_policy(&producer, &name("/dataName"), POLICY)
        .await
        .unwrap();
    assert_eq!(network.producer.policy_for(&name("/dataName")).unwrap().as_str(), POLICY);

    network.producer.serve(&name("/dataName"), b"HELLO".to_vec());
    let c1 = network.consumer("/consumer1", &["attr2", "attr3"]);
    assert_eq!(c1.consume(&name("/producer/dataName")).await.unwrap(), b"HELLO");
}

#[test_log::test(tokio::test(start_paused = true))]
async fn owners_without_the_owner_attributes_get_no_signing_key() {
    let network = Network::new(NabacConfig::default());
    network.issuer.grant(name("/owner"), AttributeSet::from_iter(["guest"]));
    assert!(matches!(
        network.owner.obtain_signing_key(&name("/issuer"), &name("/aa"), "data-owner").await,
        Err(AbacError::Entitlement(_))
    ));
}

#[test]
fn roles_hold_their_registrations() {
    let network = Network::new(NabacConfig::default());
    // PUBLIC_PARAMS, DKEY, TOKEN, SET_POLICY, CK
    assert_eq!(network.forwarder.route_count(), 5);
    network.issuer.shutdown();
    network.producer.shutdown();
    assert_eq!(network.forwarder.route_count(), 2);
}

#[test]
fn roles_can_be_shared_across_tasks() {
    fn check<T: Send + Sync>() {}
    check::<Arc<AttributeAuthority>>();
    check::<Arc<Producer>>();
    check::<Arc<Consumer>>();
}
