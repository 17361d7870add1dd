//! snmp-listen: print every variable binding received by a dispatcher.
//!
//! Accepts SNMPv1/v2c messages with the configured community and SNMPv3
//! messages for one USM user. Defaults listen on 127.0.0.1:161 with user
//! `security` (SHA-512 / AES-256).

use clap::Parser;
use snmp_dispatch::Dispatcher;
use snmp_dispatch::handler::{Response, responder_fn};
use snmp_dispatch::util::hex;
use snmp_dispatch::v3::{AuthProtocol, PrivProtocol, UsmUser};
use std::process::ExitCode;
use std::time::Duration;

/// Listen for SNMP requests and notifications and print their varbinds.
#[derive(Debug, Parser)]
#[command(name = "snmp-listen", version, about)]
struct Args {
    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:161")]
    bind: String,

    /// Community accepted for SNMPv1/v2c.
    #[arg(short, long, default_value = "security")]
    community: String,

    /// USM security name.
    #[arg(short = 'u', long, default_value = "security")]
    security_name: String,

    /// Authentication protocol (MD5, SHA, SHA-224, SHA-256, SHA-384, SHA-512).
    #[arg(short = 'a', long, default_value = "SHA-512")]
    auth_protocol: AuthProtocol,

    /// Authentication passphrase.
    #[arg(short = 'A', long, default_value = "password12#$")]
    auth_password: String,

    /// Privacy protocol (DES, AES, AES-192, AES-256).
    #[arg(short = 'x', long, default_value = "AES-256")]
    priv_protocol: PrivProtocol,

    /// Privacy passphrase.
    #[arg(short = 'X', long, default_value = "password12#$%")]
    priv_password: String,

    /// Local snmpEngineBoots.
    #[arg(long, default_value_t = 0)]
    boots: u32,

    /// Timeout for outgoing requests, in milliseconds.
    #[arg(short, long, default_value_t = 2000)]
    timeout: u64,

    /// Retries for outgoing requests.
    #[arg(short, long, default_value_t = 3)]
    retries: u32,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let default = if verbose { "snmp_dispatch=debug" } else { "snmp_dispatch=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed; keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let user = UsmUser::builder(args.security_name.clone())
        .auth(args.auth_protocol, &args.auth_password)
        .privacy(args.priv_protocol, &args.priv_password)
        .build();

    let built = Dispatcher::builder()
        .bind(args.bind.clone())
        .community(args.community.as_bytes())
        .user(user)
        .engine_boots(args.boots)
        .timeout(Duration::from_millis(args.timeout))
        .retries(args.retries)
        .responder(responder_fn(|event| async move {
            for vb in &event.varbinds {
                println!("{} = {}", vb.oid, vb.value);
            }
            Response::None
        }))
        .build()
        .await;

    let dispatcher = match built {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: could not listen on {}: {}", args.bind, e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        snmp.local_addr = %dispatcher.local_addr(),
        snmp.engine_id = %hex::encode(dispatcher.local_engine_id()),
        "listening"
    );

    let stopper = dispatcher.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.shutdown();
        }
    });

    match dispatcher.run().await {
        Ok(()) => {
            let counters = dispatcher.counters();
            tracing::info!(
                snmp.in_pkts = counters.snmp_in_pkts,
                snmp.asn_parse_errs = counters.snmp_in_asn_parse_errs,
                "stopped"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
