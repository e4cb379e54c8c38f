//! a nabac console application.
//!
extern crate nabac;
extern crate deflate;
extern crate inflate;

extern crate rustc_hex as hex;

#[macro_use]
extern crate clap;

use hex::{FromHex, ToHex};
use clap::{App, Arg, ArgMatches, SubCommand};
use nabac::{
    config::NabacConfig,
    content::{protect, unprotect, ProtectedContent},
    encoding::tlv::Block,
    engine::{AttributeEngine, BswEngine, MasterKey, PrivateKey, PublicParams},
    error::AbacError,
    ndn::{Forwarder, Name},
    roles::{AttributeAuthority, Consumer, DataOwner, Producer, TokenIssuer},
    security::{Certificate, KeyChain, KeyParams, TrustConfig},
    utils::policy::{AttributeSet, Policy, PolicyNode},
};
use std::{
    fs,
    process,
    path::Path
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// File extensions
const CT_EXTENSION: &str = "ct";
const KEY_EXTENSION: &str = "key";
const DOT: &str = ".";

// Object names
const ATTRIBUTES: &str = "a";
const POLICY: &str = "p";
const FILE: &str = "f";
const CONFIG: &str = "config";

// Default file names
const MSK_FILE: &str = "msk";
const PK_FILE: &str = "pk";
const SK_FILE: &str = "sk";

// Key file header and footer
const SK_BEGIN: &str = "-----BEGIN SK-----\n";
const SK_END: &str = "\n-----END SK-----";
const MSK_BEGIN: &str = "-----BEGIN MSK-----\n";
const MSK_END: &str = "\n-----END MSK-----";
const PK_BEGIN: &str = "-----BEGIN PK-----\n";
const PK_END: &str = "\n-----END PK-----";
const CT_BEGIN: &str = "-----BEGIN CT-----\n";
const CT_END: &str = "\n-----END CT-----";

// Application commands
const CMD_SETUP: &str = "setup";
const CMD_KEYGEN: &str = "keygen";
const CMD_ENCRYPT: &str = "encrypt";
const CMD_DECRYPT: &str = "decrypt";
const CMD_CHECK: &str = "check";
const CMD_SIMULATE: &str = "simulate";

// Identities of the simulated network
const AA: &str = "/aa";
const ISSUER: &str = "/issuer";
const PRODUCER: &str = "/producer";
const OWNER: &str = "/owner";
const CONSUMER: &str = "/consumer";
const PREFIX: &str = "/demo";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // Default file names
    let _msk_default = [MSK_FILE, DOT, KEY_EXTENSION].concat();
    let _pk_default = [PK_FILE, DOT, KEY_EXTENSION].concat();
    let _sk_default = [SK_FILE, DOT, KEY_EXTENSION].concat();

    let _app = App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand(
            // Setup
            SubCommand::with_name(CMD_SETUP)
                .about("runs the authority setup, creates the msk and pk.")
                .arg(
                    Arg::with_name(MSK_FILE)
                        .long(MSK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_msk_default)
                        .help("master secret key file."),
                )
                .arg(
                    Arg::with_name(PK_FILE)
                        .long(PK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_pk_default)
                        .help("public key file."),
                ),
        )
        .subcommand(
            // Keygen
            SubCommand::with_name(CMD_KEYGEN)
                .about("creates a user key sk bound to a set of attributes.")
                .arg(
                    Arg::with_name(PK_FILE)
                        .long(PK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_pk_default)
                        .help("public key file."),
                )
                .arg(
                    Arg::with_name(MSK_FILE)
                        .long(MSK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_msk_default)
                        .help("master secret key file."),
                )
                .arg(
                    Arg::with_name(SK_FILE)
                        .long(SK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_sk_default)
                        .help("user key file."),
                )
                .arg(
                    Arg::with_name(ATTRIBUTES)
                        .required(true)
                        .takes_value(true)
                        .multiple(true)
                        .last(true)
                        .help("attributes to use."),
                ),
        )
        .subcommand(
            // Encrypt
            SubCommand::with_name(CMD_ENCRYPT)
                .about("encrypts a file under a policy using the pk.")
                .arg(
                    Arg::with_name(PK_FILE)
                        .long(PK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_pk_default)
                        .help("public key file."),
                )
                .arg(
                    Arg::with_name(POLICY)
                        .required(true)
                        .takes_value(true)
                        .help("postorder policy, e.g. \"attr1 attr2 1of2\"."),
                )
                .arg(
                    Arg::with_name(FILE)
                        .required(true)
                        .takes_value(true)
                        .help("the file to encrypt."),
                ),
        )
        .subcommand(
            // Decrypt
            SubCommand::with_name(CMD_DECRYPT)
                .about("decrypts a file using a user key.")
                .arg(
                    Arg::with_name(SK_FILE)
                        .long(SK_FILE)
                        .required(false)
                        .takes_value(true)
                        .default_value(&_sk_default)
                        .help("user key file."),
                )
                .arg(
                    Arg::with_name(FILE)
                        .required(true)
                        .takes_value(true)
                        .help("the .ct file to decrypt."),
                ),
        )
        .subcommand(
            // Check
            SubCommand::with_name(CMD_CHECK)
                .about("checks whether a set of attributes satisfies a policy.")
                .arg(
                    Arg::with_name(POLICY)
                        .required(true)
                        .takes_value(true)
                        .help("postorder policy."),
                )
                .arg(
                    Arg::with_name(ATTRIBUTES)
                        .required(false)
                        .takes_value(true)
                        .multiple(true)
                        .last(true)
                        .help("attributes to check."),
                ),
        )
        .subcommand(
            // Simulate
            SubCommand::with_name(CMD_SIMULATE)
                .about("publishes a message under a policy on an in-memory network and consumes it.")
                .arg(
                    Arg::with_name(CONFIG)
                        .long(CONFIG)
                        .required(false)
                        .takes_value(true)
                        .help("toml configuration file."),
                )
                .arg(
                    Arg::with_name(POLICY)
                        .required(true)
                        .takes_value(true)
                        .help("postorder policy of the published content."),
                )
                .arg(
                    Arg::with_name(ATTRIBUTES)
                        .required(false)
                        .takes_value(true)
                        .multiple(true)
                        .last(true)
                        .help("attributes granted to the consumer."),
                ),
        )
        .get_matches();

    if let Err(e) = run(_app) {
        println!("Application Error: {}", e);
        process::exit(1);
    }
}

fn run(argument_matches: ArgMatches) -> Result<(), AbacError> {
    match argument_matches.subcommand() {
        (CMD_SETUP, Some(arguments)) => run_setup(arguments),
        (CMD_KEYGEN, Some(arguments)) => run_keygen(arguments),
        (CMD_ENCRYPT, Some(arguments)) => run_encrypt(arguments),
        (CMD_DECRYPT, Some(arguments)) => run_decrypt(arguments),
        (CMD_CHECK, Some(arguments)) => run_check(arguments),
        (CMD_SIMULATE, Some(arguments)) => run_simulate(arguments),
        _ => {
            println!("{}", argument_matches.usage());
            Ok(())
        }
    }
}

fn value<'a>(arguments: &'a ArgMatches, name: &str) -> Result<&'a str, AbacError> {
    arguments
        .value_of(name)
        .ok_or_else(|| AbacError::Config(format!("argument {} missing", name)))
}

fn attributes(arguments: &ArgMatches) -> AttributeSet {
    arguments
        .values_of(ATTRIBUTES)
        .map(|values| values.collect())
        .unwrap_or_default()
}

fn run_setup(arguments: &ArgMatches) -> Result<(), AbacError> {
    let (pk, msk) = BswEngine::new().setup()?;
    write_armored(value(arguments, MSK_FILE)?, msk.as_bytes(), MSK_BEGIN, MSK_END)?;
    write_armored(value(arguments, PK_FILE)?, pk.as_bytes(), PK_BEGIN, PK_END)
}

fn run_keygen(arguments: &ArgMatches) -> Result<(), AbacError> {
    let pk = PublicParams::from_bytes(read_armored(value(arguments, PK_FILE)?)?);
    let msk = MasterKey::from_bytes(read_armored(value(arguments, MSK_FILE)?)?);
    let sk = BswEngine::new().keygen(&pk, &msk, &attributes(arguments))?;
    write_armored(value(arguments, SK_FILE)?, sk.as_bytes(), SK_BEGIN, SK_END)
}

fn run_encrypt(arguments: &ArgMatches) -> Result<(), AbacError> {
    let pk = PublicParams::from_bytes(read_armored(value(arguments, PK_FILE)?)?);
    let policy = Policy::parse(value(arguments, POLICY)?)?;
    let file = value(arguments, FILE)?;
    let plaintext = fs::read(file)?;
    let protected = protect(&BswEngine::new(), &pk, &policy, &plaintext)?;
    let ct_file = [file, DOT, CT_EXTENSION].concat();
    write_armored(&ct_file, &protected.wire_encode().encode(), CT_BEGIN, CT_END)
}

fn run_decrypt(arguments: &ArgMatches) -> Result<(), AbacError> {
    let sk = PrivateKey::from_bytes(read_armored(value(arguments, SK_FILE)?)?);
    let file = value(arguments, FILE)?;
    let protected = ProtectedContent::wire_decode(&Block::decode(&read_armored(file)?)?)?;
    let plaintext = unprotect(&BswEngine::new(), &protected, &sk)?;
    let suffix = [DOT, CT_EXTENSION].concat();
    let out_file = file.strip_suffix(suffix.as_str()).unwrap_or(file);
    fs::write(out_file, plaintext)?;
    println!("successfully wrote to {}", out_file);
    Ok(())
}

fn run_check(arguments: &ArgMatches) -> Result<(), AbacError> {
    let policy = Policy::parse(value(arguments, POLICY)?)?;
    let attributes = attributes(arguments);
    let satisfied = policy.is_satisfied(&attributes);
    info!(%policy, %attributes, satisfied, "checked policy");
    if satisfied {
        println!("{} satisfies {}", attributes, policy);
    } else {
        println!("{} does not satisfy {}", attributes, policy);
    }
    Ok(())
}

fn run_simulate(arguments: &ArgMatches) -> Result<(), AbacError> {
    let config = match arguments.value_of(CONFIG) {
        Some(file) => NabacConfig::load(file)?,
        None => NabacConfig::default(),
    };
    let policy = value(arguments, POLICY)?.to_string();
    let attributes = attributes(arguments);
    info!(%policy, %attributes, "starting simulation");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    runtime.block_on(simulate(config, policy, attributes))
}

fn name(uri: &str) -> Result<Name, AbacError> {
    Name::from_uri(uri)
}

fn trust(anchors: &[&Certificate]) -> TrustConfig {
    let mut trust = TrustConfig::new();
    for anchor in anchors {
        trust.add_anchor((*anchor).clone());
    }
    trust
}

/// Every attribute named in the policy.
fn leaves(node: &PolicyNode, into: &mut AttributeSet) {
    match node {
        PolicyNode::Leaf { attribute, .. } => {
            into.insert(attribute.as_str());
        }
        PolicyNode::Threshold { children, .. } => {
            for child in children {
                leaves(child, into);
            }
        }
    }
}

async fn simulate(config: NabacConfig, policy: String, attributes: AttributeSet) -> Result<(), AbacError> {
    let forwarder = Forwarder::new();
    let keychain = KeyChain::new();
    let aa_certificate = keychain.create_identity(&name(AA)?, KeyParams::Ed25519)?;
    let issuer_certificate = keychain.create_identity(&name(ISSUER)?, KeyParams::Ed25519)?;
    let producer_certificate = keychain.create_identity(&name(PRODUCER)?, KeyParams::Ed25519)?;
    let owner_certificate = keychain.create_identity(&name(OWNER)?, KeyParams::Rsa { bits: 2048 })?;
    let consumer_certificate = keychain.create_identity(&name(CONSUMER)?, KeyParams::Rsa { bits: 2048 })?;

    let aa = AttributeAuthority::new(
        name(AA)?,
        forwarder.add_face(),
        keychain.clone(),
        trust(&[&owner_certificate, &consumer_certificate]),
    )?;
    aa.add_token_issuer(issuer_certificate.clone());
    let issuer = TokenIssuer::with_config(
        name(ISSUER)?,
        forwarder.add_face(),
        keychain.clone(),
        trust(&[&owner_certificate, &consumer_certificate]),
        &config,
    );
    let producer = Producer::new(
        name(PRODUCER)?,
        forwarder.add_face(),
        keychain.clone(),
        trust(&[&aa_certificate]),
        &config,
    )?;
    producer.add_data_owner(owner_certificate);
    let owner = DataOwner::new(
        name(OWNER)?,
        forwarder.add_face(),
        keychain.clone(),
        trust(&[&aa_certificate, &issuer_certificate, &producer_certificate]),
        config.transport.clone(),
    );

    info!("roles ready");
    producer.fetch_public_params(&name(AA)?).await?;
    if let Some(owner_policy) = config.owner_policy()? {
        let mut owner_attributes = AttributeSet::new();
        leaves(owner_policy.root(), &mut owner_attributes);
        issuer.grant(name(OWNER)?, owner_attributes);
        owner
            .obtain_signing_key(&name(ISSUER)?, &name(AA)?, owner_policy.as_str())
            .await?;
        info!(%owner_policy, "owner holds a signing key");
    }
    owner
        .command_producer_policy(&name(PRODUCER)?, &name(PREFIX)?, &policy)
        .await?;
    info!(prefix = PREFIX, %policy, "policy assigned");
    producer.serve(&name(PREFIX)?, b"HELLO".to_vec());

    issuer.grant(name(CONSUMER)?, attributes);
    let consumer = Consumer::new(
        name(CONSUMER)?,
        forwarder.add_face(),
        keychain,
        trust(&[&aa_certificate, &issuer_certificate, &producer_certificate]),
        name(AA)?,
        name(ISSUER)?,
        config.transport,
    );
    let content = name(PRODUCER)?.join(&name(PREFIX)?);
    match consumer.consume(&content).await {
        Ok(payload) => println!("{} consumed {}: {}", CONSUMER, content, String::from_utf8_lossy(&payload)),
        Err(e) => println!("{} denied {}: {}", CONSUMER, content, e),
    }
    Ok(())
}

fn write_armored(file_name: &str, input: &[u8], head: &str, tail: &str) -> Result<(), AbacError> {
    use deflate::deflate_bytes;
    let armored = [
        head.to_string(),
        deflate_bytes(input).to_hex::<String>(),
        tail.to_string()
    ].concat();
    fs::write(Path::new(file_name), armored)?;
    println!("successfully wrote to {}", file_name);
    Ok(())
}

fn read_armored(file_name: &str) -> Result<Vec<u8>, AbacError> {
    use inflate::inflate_bytes;
    let raw = fs::read_to_string(Path::new(file_name))?;
    let middle = raw
        .lines()
        .nth(1)
        .ok_or_else(|| AbacError::Encoding(format!("{}: not an armored file", file_name)))?;
    let bytes: Vec<u8> = middle
        .from_hex()
        .map_err(|e| AbacError::Encoding(format!("from_hex: {}", e)))?;
    inflate_bytes(&bytes).map_err(|e| AbacError::Encoding(format!("inflate_bytes: {}", e)))
}
