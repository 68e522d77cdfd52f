use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fiduciary_ledger::commitment::{CommitmentDraft, CommitmentRegistry, SignerMark};
use fiduciary_ledger::config::AppConfig;
use fiduciary_ledger::crypto::{compute_hash, Keyring, SignatureManager};
use fiduciary_ledger::ledger::{Actor, EventAction, EventDraft, LedgerService, LedgerStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fiduciary_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = Command::new("fiduciary-ledger")
        .version("0.1.0")
        .about("Tamper-evident audit ledger for fiduciary administration")
        .subcommand(
            Command::new("init")
                .about("Initialize (or wipe and reinitialize) the ledger")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Wipe existing chain state before initializing"),
                ),
        )
        .subcommand(
            Command::new("append")
                .about("Submit an event to the append queue")
                .arg(Arg::new("actor").long("actor").value_name("ACTOR").default_value("USER"))
                .arg(Arg::new("action").long("action").value_name("ACTION").required(true))
                .arg(Arg::new("details").long("details").value_name("TEXT").required(true))
                .arg(Arg::new("rationale").long("rationale").value_name("TEXT"))
                .arg(
                    Arg::new("sign")
                        .long("sign")
                        .action(ArgAction::SetTrue)
                        .help("Attach a signature over the event content digest"),
                ),
        )
        .subcommand(Command::new("verify").about("Verify the full chain"))
        .subcommand(Command::new("head").about("Print the current chain head hash"))
        .subcommand(Command::new("status").about("Print ledger status"))
        .subcommand(
            Command::new("identity")
                .about("Show (or rotate) the local signing identity")
                .arg(
                    Arg::new("rotate")
                        .long("rotate")
                        .action(ArgAction::SetTrue)
                        .help("Generate a fresh keypair, replacing the stored one"),
                ),
        )
        .subcommand(Command::new("anchor").about("Record the current head as an external anchor"))
        .subcommand(
            Command::new("commit")
                .about("Finalize a commitment object")
                .arg(Arg::new("details").long("details").value_name("TEXT").required(true))
                .arg(
                    Arg::new("authority")
                        .long("authority")
                        .value_name("LEVEL")
                        .default_value("SOLE_SIGNER"),
                )
                .arg(Arg::new("reference").long("reference").value_name("ID"))
                .arg(
                    Arg::new("marks")
                        .long("marks")
                        .value_name("PATH")
                        .help("JSON file holding the recorded signer marks"),
                ),
        )
        .get_matches();

    let config = AppConfig::load()?;
    let store = LedgerStore::open(&config.data_dir)?;

    match matches.subcommand() {
        Some(("init", sub)) => {
            let service = if sub.get_flag("force") {
                LedgerService::reinitialize(store).await?
            } else {
                LedgerService::open(store).await?
            };
            service.idle().await;
            println!("Ledger initialized, head {}", service.head().await);
        }
        Some(("append", sub)) => {
            let actor: Actor = sub
                .get_one::<String>("actor")
                .unwrap()
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let action: EventAction = sub
                .get_one::<String>("action")
                .unwrap()
                .parse()
                .map_err(|e: String| anyhow!(e))?;
            let details = sub.get_one::<String>("details").unwrap().clone();

            let mut draft = EventDraft::new(actor, action, details);
            if let Some(rationale) = sub.get_one::<String>("rationale") {
                draft.rationale = rationale.clone();
            }

            if sub.get_flag("sign") {
                let identity = Keyring::new().load_or_create(&store, false)?;
                let content_digest = compute_hash(&json!({
                    "actor": draft.actor,
                    "action": draft.action,
                    "details": draft.details,
                    "rationale": draft.rationale,
                }))?;
                draft.signature =
                    SignatureManager::new().sign_digest(&identity.secret_key, &content_digest)?;
                info!("Signed event as {}", identity.fingerprint());
            }

            let service = LedgerService::open(store).await?;
            service.submit(draft).await?;
            service.idle().await;
            println!("Event accepted, head {}", service.head().await);
        }
        Some(("verify", _)) => {
            let service = LedgerService::open(store).await?;
            let report = service.verify().await?;
            println!("{}", report.summary());
            if !report.valid {
                println!("Recovery: run `fiduciary-ledger init --force` to wipe and reinitialize");
                std::process::exit(1);
            }
        }
        Some(("head", _)) => {
            let service = LedgerService::open(store).await?;
            println!("{}", service.head().await);
        }
        Some(("status", _)) => {
            let service = LedgerService::open(store).await?;
            let status = service.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some(("identity", sub)) => {
            let identity = Keyring::new().load_or_create(&store, sub.get_flag("rotate"))?;
            if sub.get_flag("rotate") {
                let service = LedgerService::open(store).await?;
                service
                    .submit(EventDraft::new(
                        Actor::System,
                        EventAction::KeyRotation,
                        "Signing identity rotated",
                    ))
                    .await?;
                service.idle().await;
            }
            println!("Fingerprint: {}", identity.fingerprint());
            println!("Created: {}", identity.created_at);
        }
        Some(("anchor", _)) => {
            let service = LedgerService::open(store).await?;
            service.record_anchor().await?;
            service.idle().await;
            println!("Anchor recorded, head {}", service.head().await);
        }
        Some(("commit", sub)) => {
            let details = sub.get_one::<String>("details").unwrap().clone();
            let authority = sub
                .get_one::<String>("authority")
                .unwrap()
                .to_uppercase()
                .replace('-', "_");
            let authority = serde_json::from_value(json!(authority))
                .map_err(|e| anyhow!("Unknown authority level: {}", e))?;

            let mut draft = CommitmentDraft::new(details, authority);
            if let Some(reference) = sub.get_one::<String>("reference") {
                draft.reference_id = Some(reference.clone());
            }

            let marks: Vec<SignerMark> = match sub.get_one::<String>("marks") {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => Vec::new(),
            };

            let mut registry = CommitmentRegistry::open(store.clone(), config.governance)?;
            let object = registry.finalize(draft, marks)?;
            println!("Commitment {} finalized, hash {}", object.id, object.hash);

            // Record the finalization in the ledger.
            let service = LedgerService::open(store).await?;
            let mut event = EventDraft::new(
                Actor::User,
                EventAction::Ratification,
                format!("Commitment {} finalized", object.id),
            );
            event.metadata.linked_object_id = Some(object.id.clone());
            event.metadata.output_hash = Some(object.hash.clone());
            service.submit(event).await?;
            service.idle().await;
        }
        _ => {
            println!("No subcommand given; try --help");
        }
    }

    Ok(())
}
