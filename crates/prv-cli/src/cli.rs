use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "prv",
    about = "Prompt Provenance Registry: register and verify AI prompts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Ledger snapshot file.
    #[arg(long, global = true, default_value = "prv-ledger.json")]
    pub ledger: PathBuf,

    /// Client configuration (TOML).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a creator signing key
    Keygen(KeygenArgs),
    /// Create an empty ledger
    Init(InitArgs),
    /// Register one prompt and its output
    Register(RegisterArgs),
    /// Register 2 to 10 prompts in one atomic transaction
    Batch(BatchArgs),
    /// Look up the registrations of a prompt
    Verify(VerifyArgs),
    /// List every registration, newest first
    Registry(RegistryArgs),
    /// Per-creator registration statistics
    Stats(StatsArgs),
    /// Issue a provenance certificate for a registration
    Certificate(CertificateArgs),
    /// Check a provenance certificate
    CheckCertificate(CheckCertificateArgs),
    /// Cross-check every registration against the prompt indexes
    Fsck(FsckArgs),
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Where to write the hex-encoded secret key.
    #[arg(long, default_value = "prv-key.hex")]
    pub out: PathBuf,
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing ledger.
    #[arg(long)]
    pub force: bool,
}

/// A prompt given either as text or as a hex fingerprint.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct PromptArg {
    #[arg(long)]
    pub prompt: Option<String>,
    #[arg(long)]
    pub prompt_hash: Option<String>,
}

#[derive(Args)]
pub struct RegisterArgs {
    #[arg(short, long, default_value = "prv-key.hex")]
    pub key: PathBuf,
    #[command(flatten)]
    pub prompt: PromptArg,
    #[arg(long, required_unless_present = "output_hash")]
    pub output: Option<String>,
    #[arg(long, conflicts_with = "output")]
    pub output_hash: Option<String>,
}

#[derive(Args)]
pub struct BatchArgs {
    #[arg(short, long, default_value = "prv-key.hex")]
    pub key: PathBuf,
    /// JSON array of `{"prompt": ..., "output": ...}` objects.
    pub file: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub prompt: PromptArg,
    /// Only this creator's registration (hex public key).
    #[arg(long)]
    pub creator: Option<String>,
}

#[derive(Args)]
pub struct RegistryArgs {
    /// Only this creator's registrations (hex public key).
    #[arg(long)]
    pub creator: Option<String>,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct StatsArgs {
    #[arg(long)]
    pub creator: Option<String>,
}

#[derive(Args)]
pub struct CertificateArgs {
    #[command(flatten)]
    pub prompt: PromptArg,
    /// Creator of the registration (hex public key).
    #[arg(long)]
    pub creator: String,
    /// Transaction that created the registration.
    #[arg(long)]
    pub tx: String,
    /// Output file; defaults to a name derived from the certificate id.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckCertificateArgs {
    pub path: PathBuf,
    /// Also check the certificate against the ledger.
    #[arg(long)]
    pub online: bool,
}

#[derive(Args)]
pub struct FsckArgs {}
