//! repofetch - download verified artifacts from hosted git repositories
//!
//! Usage:
//!   repofetch dpb587/gget                          Every asset of the latest release
//!   repofetch dpb587/gget@v0.5.0 '*linux*'         Matching assets of a tag
//!   repofetch dpb587/gget --type blob 'bin/gget=README.md'
//!   repofetch dpb587/gget --export json --no-download

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use indicatif::HumanBytes;
use repofetch::checksum::VerificationProfile;
use repofetch::core::config::Config;
use repofetch::core::progress::{BarProgress, StatusLines};
use repofetch::core::{logging, output};
use repofetch::export::{ExportData, ExportFormat};
use repofetch::service::github::GitHubClient;
use repofetch::service::{
    LookupRequest, NamePattern, Ref, RepositoryClient, ResourceType, Resolver, Snapshot, Stability,
};
use repofetch::transfer::{
    build_transfer, plan_transfers, Batch, NoProgress, PlanOptions, PlannedResource, ProgressSink,
    TransferOptions, TransferRequest,
};
use semver::VersionReq;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "repofetch")]
#[command(about = "Download verified artifacts from hosted git repositories")]
#[command(version)]
struct Cli {
    /// Repository reference
    #[arg(value_name = "[SERVER/]OWNER/REPOSITORY[@REF]")]
    reference: String,

    /// Resources to download (default: every resource)
    #[arg(value_name = "[LOCAL-PATH=]RESOURCE-GLOB")]
    resources: Vec<TransferRequest>,

    /// Acceptable release stability when resolving the latest release
    #[arg(long, value_name = "STABILITY")]
    ref_stability: Vec<Stability>,

    /// Semver constraint the resolved release tag must satisfy
    #[arg(long, value_name = "CONSTRAINT")]
    ref_version: Vec<VersionReq>,

    /// Resource type to match
    #[arg(long = "type", value_name = "TYPE", default_value = "asset")]
    resource_type: ResourceType,

    /// Exclude resources whose names match
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<NamePattern>,

    /// Allow resource globs that match nothing
    #[arg(long, value_name = "GLOB", num_args = 0..=1, default_missing_value = "*")]
    ignore_missing: Vec<NamePattern>,

    /// Mark matching downloads executable
    #[arg(long, value_name = "GLOB", num_args = 0..=1, default_missing_value = "*")]
    executable: Vec<NamePattern>,

    /// Print matched resource names instead of downloading
    #[arg(long)]
    list: bool,

    /// Directory to download into
    #[arg(long, value_name = "DIR")]
    cd: Option<PathBuf>,

    /// Print a report of the resolved ref and resources
    #[arg(long, value_name = "FORMAT")]
    export: Option<ExportFormat>,

    /// Resolve but do not download
    #[arg(long)]
    no_download: bool,

    /// Print one status line per download instead of progress bars
    #[arg(long)]
    no_progress: bool,

    /// Maximum concurrent downloads
    #[arg(long, value_name = "N", env = "REPOFETCH_PARALLEL")]
    parallel: Option<usize>,

    /// Write resources without an explicit path to stdout
    #[arg(long)]
    stdout: bool,

    /// Checksum verification: auto, required, all, none, ALGO or ALGO-min
    /// (alone, means required)
    #[arg(
        long,
        value_name = "METHOD",
        default_value = "auto",
        num_args = 0..=1,
        default_missing_value = "required"
    )]
    verify_checksum: Vec<String>,

    /// Stop starting downloads after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Less output
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// More diagnostic logging
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn verbosity(&self) -> i8 {
        (self.verbose.min(8) as i8) - (self.quiet.min(8) as i8)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbosity());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("loading configuration")?;
    let reference = Ref::parse(&cli.reference)?;
    let profile = VerificationProfile::parse(&cli.verify_checksum).context("parsing --verify-checksum")?;

    if cli.quiet == 0 {
        output::action(&format!("Resolving {}", reference));
    }
    if profile.is_disabled() {
        output::warning("checksum verification is disabled");
    }

    let client = GitHubClient::new(config.api_base(&reference.server), config.timeout)
        .with_token(config.token(&reference.server))
        .with_user_agent(&config.user_agent);
    let client: Arc<dyn RepositoryClient> = Arc::new(client);
    let service = client.service_kind();

    let request = LookupRequest::new(reference)
        .with_versions(cli.ref_version.clone())
        .with_stability(cli.ref_stability.clone());
    let snapshot = Resolver::new(Arc::clone(&client))
        .resolve(&request)
        .context("resolving ref")?;

    let plan_options = PlanOptions {
        resource_type: cli.resource_type,
        exclude: cli.exclude.clone(),
        ignore_missing: cli.ignore_missing.clone(),
        stdout: cli.stdout,
        cd: cli.cd.clone(),
    };
    let planned = plan_transfers(&snapshot, &cli.resources, &plan_options)?;

    if cli.quiet == 0 {
        output::info(&found_summary(&planned, snapshot.canonical_ref()));
    }
    if cli.verbose > 0 {
        for item in &planned {
            output::detail(&format!("{} -> {}", item.resource.name(), item.destination));
        }
    }

    if cli.list {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for item in &planned {
            writeln!(out, "{}", item.resource.name())?;
        }
        return Ok(());
    }

    if let Some(format) = cli.export {
        ExportData::collect(&snapshot, service, planned.iter().map(|p| &p.resource), &profile)
            .write(format, std::io::stdout().lock())
            .context("exporting")?;
    }

    if cli.no_download {
        return Ok(());
    }

    let transfer_options = TransferOptions {
        executable: cli.executable.clone(),
        verification: profile,
    };
    let transfers = planned
        .into_iter()
        .map(|item| build_transfer(item, &transfer_options))
        .collect::<Result<Vec<_>, _>>()?;

    let progress: Arc<dyn ProgressSink> = if cli.quiet > 0 {
        Arc::new(NoProgress)
    } else if cli.no_progress || !std::io::stderr().is_terminal() {
        Arc::new(StatusLines)
    } else {
        Arc::new(BarProgress::new())
    };

    let report = Batch::new(transfers, cli.parallel.unwrap_or(config.parallel))
        .fail_fast(cli.fail_fast)
        .run(progress)?;

    if cli.quiet == 0 {
        let count = report.outcomes.len();
        output::success(&format!("Downloaded {} file{}", count, if count == 1 { "" } else { "s" }));
    }

    Ok(())
}

/// "Found 2 files (14.2 MiB) from github.com/owner/repo@v1.0.0"
fn found_summary(planned: &[PlannedResource], reference: &Ref) -> String {
    let count = planned.len();
    let plural = if count == 1 { "" } else { "s" };

    let total: Option<u64> = planned
        .iter()
        .map(|item| item.resource.size().filter(|size| *size > 0))
        .sum();
    let size = match total {
        Some(total) => format!(" ({})", HumanBytes(total)),
        None => String::new(),
    };

    format!("Found {} file{}{} from {}", count, plural, size, reference)
}
