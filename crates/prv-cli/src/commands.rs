use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use prv_client::{
    BatchItem, Certificate, ClientConfig, ClientError, CreatorStats, Lookup, ProvenanceClient,
    RefreshOutcome, RegistryEntry, RegistrySnapshot,
};
use prv_crypto::SigningKey;
use prv_ledger::{InMemoryLedger, LedgerConfig, RegistryValidator, TransactionId, TransactionReceipt};
use prv_types::{CreatorId, Fingerprint};

use crate::cli::*;
use crate::store;

/// Everything the commands share: where the ledger lives, how to talk to it
/// and how to print.
struct Session {
    ledger_path: PathBuf,
    config: ClientConfig,
    format: OutputFormat,
}

impl Session {
    fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            program: self.config.program,
            ..LedgerConfig::default()
        }
    }

    fn open(&self) -> anyhow::Result<Arc<InMemoryLedger>> {
        store::open_ledger(&self.ledger_path, self.ledger_config())
    }

    /// Open for a command that commits; the ledger stays locked until the
    /// returned handle is dropped.
    fn open_for_update(&self) -> anyhow::Result<store::LockedLedger> {
        store::open_ledger_for_update(&self.ledger_path, self.ledger_config())
    }

    fn client(&self, ledger: &Arc<InMemoryLedger>) -> ProvenanceClient {
        ProvenanceClient::local(Arc::clone(ledger), self.config.clone())
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    let session = Session {
        ledger_path: cli.ledger,
        config,
        format: cli.format,
    };

    match cli.command {
        Command::Keygen(args) => cmd_keygen(&session, args),
        Command::Init(args) => cmd_init(&session, args),
        Command::Register(args) => cmd_register(&session, args).await,
        Command::Batch(args) => cmd_batch(&session, args).await,
        Command::Verify(args) => cmd_verify(&session, args).await,
        Command::Registry(args) => cmd_registry(&session, args).await,
        Command::Stats(args) => cmd_stats(&session, args).await,
        Command::Certificate(args) => cmd_certificate(&session, args).await,
        Command::CheckCertificate(args) => cmd_check_certificate(&session, args).await,
        Command::Fsck(_) => cmd_fsck(&session),
    }
}

/// Attach the end-user message to a client failure.
fn rejected(error: ClientError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}

fn prompt_fingerprint(arg: &PromptArg) -> anyhow::Result<Fingerprint> {
    match (&arg.prompt, &arg.prompt_hash) {
        (Some(text), _) => Ok(Fingerprint::of_text(text)),
        (None, Some(hex)) => Fingerprint::from_hex(hex).context("invalid prompt hash"),
        (None, None) => bail!("a prompt or a prompt hash is required"),
    }
}

fn parse_creator(hex: &str) -> anyhow::Result<CreatorId> {
    CreatorId::from_hex(hex).context("invalid creator key")
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Hex-encoded view of a registry entry for JSON output.
#[derive(Serialize)]
struct EntryView {
    address: String,
    prompt_hash: String,
    output_hash: String,
    creator: String,
    timestamp: i64,
}

impl From<&RegistryEntry> for EntryView {
    fn from(entry: &RegistryEntry) -> Self {
        let r = &entry.registration;
        Self {
            address: entry.address.to_hex(),
            prompt_hash: r.prompt_hash.to_hex(),
            output_hash: r.output_hash.to_hex(),
            creator: r.creator.to_hex(),
            timestamp: r.timestamp,
        }
    }
}

#[derive(Serialize)]
struct ReceiptView {
    transaction_id: String,
    slot: u64,
    block_time: i64,
    creator: String,
    registrations: Vec<String>,
}

impl From<&TransactionReceipt> for ReceiptView {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_id: receipt.id.to_hex(),
            slot: receipt.slot,
            block_time: receipt.block_time,
            creator: receipt.creator.to_hex(),
            registrations: receipt.registrations.iter().map(|a| a.to_hex()).collect(),
        }
    }
}

#[derive(Serialize)]
struct StatsView {
    creator: String,
    count: usize,
    first_registration: i64,
    latest_registration: i64,
    activity: String,
}

impl From<&CreatorStats> for StatsView {
    fn from(stats: &CreatorStats) -> Self {
        Self {
            creator: stats.creator.to_hex(),
            count: stats.count,
            first_registration: stats.first_registration,
            latest_registration: stats.latest_registration,
            activity: stats.activity.to_string(),
        }
    }
}

fn print_entry(entry: &RegistryEntry) {
    let r = &entry.registration;
    println!("{} {}", "●".cyan(), entry.address.short_hex().yellow());
    println!("  Creator: {}", r.creator.abbreviated());
    println!("  Prompt:  {}", r.prompt_hash);
    println!("  Output:  {}", r.output_hash);
    println!("  Time:    {}", format_time(r.timestamp).dimmed());
}

fn print_receipt(session: &Session, receipt: &TransactionReceipt, what: &str) -> anyhow::Result<()> {
    if session.json() {
        return print_json(&ReceiptView::from(receipt));
    }
    println!("{} {}", "✓".green().bold(), what);
    println!("  Transaction: {}", receipt.id.to_hex().yellow());
    println!("  Slot: {}  Time: {}", receipt.slot, format_time(receipt.block_time));
    for address in &receipt.registrations {
        println!("  Registration: {}", address.to_hex().cyan());
    }
    Ok(())
}

fn cmd_keygen(session: &Session, args: KeygenArgs) -> anyhow::Result<()> {
    let key = SigningKey::generate();
    store::write_key(&key, &args.out, args.force)?;
    let creator = key.creator_id().to_hex();
    if session.json() {
        return print_json(&serde_json::json!({
            "creator": creator,
            "keyFile": args.out.display().to_string(),
        }));
    }
    println!("{} Generated signing key in {}", "✓".green().bold(), args.out.display());
    println!("  Creator: {}", creator.cyan());
    Ok(())
}

fn cmd_init(session: &Session, args: InitArgs) -> anyhow::Result<()> {
    store::create_ledger(&session.ledger_path, session.ledger_config(), args.force)?;
    if !session.json() {
        println!(
            "{} Initialized empty ledger in {}",
            "✓".green().bold(),
            session.ledger_path.display()
        );
        println!("  Program: {}", session.config.program.to_hex().cyan());
    }
    Ok(())
}

async fn cmd_register(session: &Session, args: RegisterArgs) -> anyhow::Result<()> {
    let key = store::read_key(&args.key)?;
    let prompt_hash = prompt_fingerprint(&args.prompt)?;
    let output_hash = match (&args.output, &args.output_hash) {
        (Some(text), _) => Fingerprint::of_text(text),
        (None, Some(hex)) => Fingerprint::from_hex(hex).context("invalid output hash")?,
        (None, None) => bail!("an output or an output hash is required"),
    };

    let locked = session.open_for_update()?;
    let client = session.client(&locked.ledger).with_signer(Arc::new(key));
    let receipt = client
        .register(prompt_hash, output_hash)
        .await
        .map_err(rejected)?;
    locked.save()?;
    print_receipt(session, &receipt, "Prompt registered")
}

#[derive(Deserialize)]
struct BatchLine {
    prompt: String,
    output: String,
}

async fn cmd_batch(session: &Session, args: BatchArgs) -> anyhow::Result<()> {
    let key = store::read_key(&args.key)?;
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let lines: Vec<BatchLine> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of prompt/output pairs", args.file.display()))?;
    let items: Vec<BatchItem> = lines
        .into_iter()
        .map(|l| BatchItem::text(l.prompt, l.output))
        .collect();

    let locked = session.open_for_update()?;
    let client = session.client(&locked.ledger).with_signer(Arc::new(key));
    let receipt = client.register_batch(&items).await.map_err(rejected)?;
    locked.save()?;
    print_receipt(session, &receipt, &format!("{} prompts registered", items.len()))
}

async fn cmd_verify(session: &Session, args: VerifyArgs) -> anyhow::Result<()> {
    let prompt_hash = prompt_fingerprint(&args.prompt)?;
    let ledger = session.open()?;
    let client = session.client(&ledger);

    let lookup = match &args.creator {
        Some(hex) => {
            let creator = parse_creator(hex)?;
            client
                .verify_direct(&creator, &prompt_hash)
                .await
                .map(|entry| vec![entry])
        }
        None => client.verify_by_fingerprint(&prompt_hash).await,
    };

    match lookup {
        Lookup::Found(entries) => {
            if session.json() {
                let views: Vec<EntryView> = entries.iter().map(EntryView::from).collect();
                return print_json(&views);
            }
            println!(
                "{} {} registration(s) of {}",
                "✓".green().bold(),
                entries.len(),
                prompt_hash.short_hex().yellow()
            );
            entries.iter().for_each(print_entry);
            Ok(())
        }
        Lookup::NotFound => {
            if session.json() {
                return print_json(&Vec::<EntryView>::new());
            }
            println!("{} Prompt {} is not registered", "✗".red().bold(), prompt_hash.short_hex());
            Ok(())
        }
        Lookup::Error(e) => Err(rejected(e)),
    }
}

async fn load_registry(session: &Session) -> anyhow::Result<Arc<RegistrySnapshot>> {
    let ledger = session.open()?;
    let reader = session.client(&ledger).reader();
    match reader.refresh(true).await {
        RefreshOutcome::Completed { .. } => Ok(reader.snapshot()),
        RefreshOutcome::Failed(e) => Err(rejected(e)),
        RefreshOutcome::Skipped(reason) => bail!("registry refresh skipped: {reason:?}"),
    }
}

async fn cmd_registry(session: &Session, args: RegistryArgs) -> anyhow::Result<()> {
    let snapshot = load_registry(session).await?;
    let creator = args.creator.as_deref().map(parse_creator).transpose()?;
    let entries: Vec<&RegistryEntry> = snapshot
        .entries
        .iter()
        .filter(|e| creator.map_or(true, |c| e.registration.creator == c))
        .take(args.limit.unwrap_or(usize::MAX))
        .collect();

    if session.json() {
        let views: Vec<EntryView> = entries.into_iter().map(EntryView::from).collect();
        return print_json(&views);
    }
    if entries.is_empty() {
        println!("No registrations.");
        return Ok(());
    }
    println!("{} of {} registration(s)", entries.len(), snapshot.len());
    entries.into_iter().for_each(print_entry);
    Ok(())
}

async fn cmd_stats(session: &Session, args: StatsArgs) -> anyhow::Result<()> {
    let snapshot = load_registry(session).await?;
    let stats: Vec<&CreatorStats> = match args.creator.as_deref() {
        Some(hex) => {
            let creator = parse_creator(hex)?;
            snapshot.creator_stats(&creator).into_iter().collect()
        }
        None => snapshot.stats.iter().collect(),
    };

    if session.json() {
        let views: Vec<StatsView> = stats.into_iter().map(StatsView::from).collect();
        return print_json(&views);
    }
    if stats.is_empty() {
        println!("No creators.");
        return Ok(());
    }
    for s in stats {
        println!(
            "{}  {} registration(s)  {}",
            s.creator.abbreviated().cyan(),
            s.count.to_string().bold(),
            s.activity.label().green()
        );
        println!(
            "  First: {}  Latest: {}",
            format_time(s.first_registration),
            format_time(s.latest_registration)
        );
    }
    Ok(())
}

async fn cmd_certificate(session: &Session, args: CertificateArgs) -> anyhow::Result<()> {
    let prompt_hash = prompt_fingerprint(&args.prompt)?;
    let creator = parse_creator(&args.creator)?;
    let tx = TransactionId::from_hex(&args.tx).context("invalid transaction id")?;

    let ledger = session.open()?;
    let client = session.client(&ledger);
    let entry = match client.verify_direct(&creator, &prompt_hash).await {
        Lookup::Found(entry) => entry,
        Lookup::NotFound => bail!("{} has not registered this prompt", creator.abbreviated()),
        Lookup::Error(e) => return Err(rejected(e)),
    };
    let certificate = client
        .issue_certificate(&entry, &tx, chrono::Utc::now().timestamp_millis())
        .await
        .map_err(rejected)?;

    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(certificate.file_name()));
    fs::write(&path, certificate.to_json()?)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if session.json() {
        return print_json(&certificate);
    }
    println!("{} Certificate {} written to {}", "✓".green().bold(), certificate.certificate_id.yellow(), path.display());
    Ok(())
}

async fn cmd_check_certificate(session: &Session, args: CheckCertificateArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let certificate = Certificate::from_json(&text)
        .with_context(|| format!("{} is not a certificate", args.path.display()))?;
    let mut issues = certificate.validate(chrono::Utc::now().timestamp()).issues;

    if args.online && issues.is_empty() {
        issues.extend(check_against_ledger(session, &certificate).await?);
    }

    if session.json() {
        print_json(&serde_json::json!({
            "certificateId": certificate.certificate_id,
            "valid": issues.is_empty(),
            "issues": issues,
        }))?;
    } else if issues.is_empty() {
        println!("{} Certificate {} is valid", "✓".green().bold(), certificate.certificate_id.yellow());
        println!("  Registered: {}", format_time(certificate.timestamp));
    } else {
        println!("{} Certificate has {} issue(s)", "✗".red().bold(), issues.len());
        for issue in &issues {
            println!("  - {issue}");
        }
    }

    if !issues.is_empty() {
        bail!("certificate {} failed validation", args.path.display());
    }
    Ok(())
}

/// Issues found when comparing a structurally valid certificate with the
/// registration on the ledger.
async fn check_against_ledger(session: &Session, certificate: &Certificate) -> anyhow::Result<Vec<String>> {
    let creator = parse_creator(&certificate.creator)?;
    let prompt_hash = Fingerprint::from_hex(&certificate.prompt_hash).context("invalid prompt hash")?;
    let ledger = session.open()?;
    let client = session.client(&ledger);

    let mut issues = Vec::new();
    match client.verify_direct(&creator, &prompt_hash).await {
        Lookup::Found(entry) => {
            let r = &entry.registration;
            if r.output_hash.to_hex() != certificate.output_hash {
                issues.push("Output hash does not match the registration".to_string());
            }
            if r.timestamp != certificate.timestamp {
                issues.push("Timestamp does not match the registration".to_string());
            }
        }
        Lookup::NotFound => issues.push("Registration not found on the ledger".to_string()),
        Lookup::Error(e) => return Err(rejected(e)),
    }
    if certificate.program_id != session.config.program.to_hex() {
        issues.push("Certificate was issued for a different program".to_string());
    }
    Ok(issues)
}

fn cmd_fsck(session: &Session) -> anyhow::Result<()> {
    let ledger = session.open()?;
    let report = RegistryValidator::new(session.config.program).validate(ledger.as_ref())?;

    if session.json() {
        let violations: Vec<_> = report
            .violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "address": v.address.to_hex(),
                    "kind": format!("{:?}", v.kind),
                    "description": v.description,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "registrations": report.registration_count,
            "indexes": report.index_count,
            "violations": violations,
        }))?;
    } else {
        println!(
            "Checked {} registration(s) across {} prompt index(es)",
            report.registration_count, report.index_count
        );
        for v in &report.violations {
            println!("  {} {:?} at {}: {}", "✗".red(), v.kind, v.address.short_hex(), v.description);
        }
        if report.is_valid() {
            println!("{} No issues.", "✓".green().bold());
        }
    }

    if !report.is_valid() {
        bail!("{} integrity violation(s) found", report.violations.len());
    }
    Ok(())
}
