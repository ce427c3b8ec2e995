use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meddic_core::commands::{default_root, ensure_initialized};
use meddic_core::export::{Document, Layout, export_file_name, write_csv};
use meddic_core::scoring::{fiche_summary, priority_breakdown};
use meddic_core::services::{
    Backups, CorrelationStrength, ListFilter, PipelineOverview, Statistics,
    commercial_performance, completion_qualification_correlation, daily_creations,
    executive_summary, field_completion, top_companies, urgent_actions, weakest_fields,
};
use meddic_core::{
    CoreConfig, Fiche, FicheForm, FicheId, FicheStore, MeddicField, Status, completion_score,
    priority_level, recommendations,
};

const URGENT_ACTION_LIMIT: usize = 10;
const TOP_COMPANIES: usize = 10;
const WEAKEST_FIELDS: usize = 3;

#[derive(Parser)]
#[command(name = "meddic-admin", about = "Manage MEDDIC qualification records")]
struct Cli {
    /// Workspace directory (defaults to $MEDDIC_ROOT or .meddic)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Create the workspace layout and default config
    Init,
    /// Create a new fiche
    Add(FicheArgs),
    /// Change the given fields of an existing fiche
    Edit {
        id: FicheId,
        #[command(flatten)]
        fields: FicheArgs,
    },
    /// Print one fiche with its score and advice
    Show { id: FicheId },
    /// List fiches, most recently updated first
    List {
        #[arg(long)]
        search: Option<String>,
        /// Status label or slug, e.g. "Waiting" or closed-won
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        commercial: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete a fiche (its audit history is kept)
    Delete { id: FicheId },
    /// Pipeline statistics as a Markdown summary
    Stats,
    /// Highest-priority fiches with what to do next
    Recommend {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Audit trail of one fiche, or the latest activity overall
    History {
        id: Option<FicheId>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Export every fiche to CSV
    ExportCsv {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render one fiche as a paginated text document
    ExportDoc {
        id: FicheId,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Snapshot the database into the backup directory
    Backup {
        /// Also remove backups older than the retention window
        #[arg(long)]
        prune: bool,
    },
}

#[derive(Args)]
struct FicheArgs {
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    company: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    meeting_date: Option<String>,
    #[arg(long)]
    commercial: Option<String>,
    #[arg(long)]
    metrics: Option<String>,
    #[arg(long)]
    economic_buyer: Option<String>,
    #[arg(long)]
    decision_criteria: Option<String>,
    #[arg(long)]
    decision_process: Option<String>,
    #[arg(long)]
    identify_pain: Option<String>,
    #[arg(long)]
    champion: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl FicheArgs {
    /// Overwrite only the fields that were passed.
    fn apply(self, form: &mut FicheForm) {
        if let Some(v) = self.client {
            form.client_name = v;
        }
        if let Some(v) = self.company {
            form.company = v;
        }
        if self.meeting_date.is_some() {
            form.meeting_date = self.meeting_date;
        }
        if self.commercial.is_some() {
            form.commercial = self.commercial;
        }
        if self.status.is_some() {
            form.status = self.status;
        }
        if self.notes.is_some() {
            form.notes = self.notes;
        }
        let fields = [
            (MeddicField::Metrics, self.metrics),
            (MeddicField::EconomicBuyer, self.economic_buyer),
            (MeddicField::DecisionCriteria, self.decision_criteria),
            (MeddicField::DecisionProcess, self.decision_process),
            (MeddicField::IdentifyPain, self.identify_pain),
            (MeddicField::Champion, self.champion),
        ];
        for (field, value) in fields {
            if value.is_some() {
                *form.field_mut(field) = value;
            }
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let root = cli.root.unwrap_or_else(default_root);
    let report = ensure_initialized(&root)
        .with_context(|| format!("initialize workspace at {}", root.display()))?;

    tracing::debug!(root = %report.root.display(), created = report.created.len(), "workspace ready");

    if let Cmd::Init = cli.cmd {
        println!("workspace: {}", report.root.display());
        for p in &report.created {
            println!("  created {p}");
        }
        for p in &report.existed {
            println!("  exists  {p}");
        }
        return Ok(());
    }

    let cfg = report.config;
    let mut store = FicheStore::from_config(&cfg)
        .with_context(|| format!("open {}", cfg.database.path.display()))?;

    match cli.cmd {
        Cmd::Init => Ok(()),
        Cmd::Add(fields) => {
            let mut form = FicheForm::default();
            fields.apply(&mut form);
            let fiche = store.save(&form)?;
            println!("created fiche {} ({}, priority {})", fiche.id, fiche.company, fiche.priority);
            Ok(())
        }
        Cmd::Edit { id, fields } => {
            let mut form = FicheForm::from(&store.get(id)?);
            fields.apply(&mut form);
            let fiche = store.save(&form)?;
            println!("updated fiche {} (priority {})", fiche.id, fiche.priority);
            Ok(())
        }
        Cmd::Show { id } => show(&store, id),
        Cmd::List {
            search,
            status,
            company,
            commercial,
            json,
        } => {
            let filter = ListFilter {
                status: status.as_deref().map(str::parse::<Status>).transpose()?,
                company,
                commercial,
                search,
            };
            list(&store, &filter, json)
        }
        Cmd::Delete { id } => {
            if store.delete(id)? {
                println!("deleted fiche {id}");
            } else {
                println!("no fiche with id {id}");
            }
            Ok(())
        }
        Cmd::Stats => stats(&store),
        Cmd::Recommend { top } => recommend(&store, top),
        Cmd::History { id, limit } => history(&store, id, limit),
        Cmd::ExportCsv { out } => export_csv(&cfg, &store, out),
        Cmd::ExportDoc { id, out } => export_doc(&cfg, &store, id, out),
        Cmd::Backup { prune } => backup(&cfg, &store, prune),
    }
}

fn show(store: &FicheStore, id: FicheId) -> Result<()> {
    let fiche = store.get(id)?;
    let now = Utc::now();
    let score = priority_breakdown(&fiche, now);
    print!("{}", fiche_summary(&fiche));
    println!(
        "Priority: {} now ({} when saved), tiers {}/{}/{}",
        score.level(),
        fiche.priority,
        score.completion_tier,
        score.status_tier,
        score.recency_tier
    );
    for advice in recommendations(&fiche) {
        println!("  - {advice}");
    }
    Ok(())
}

fn list(store: &FicheStore, filter: &ListFilter, json: bool) -> Result<()> {
    let listed = store.list(filter, true)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }
    for l in &listed {
        println!(
            "{:>5}  {:<24}  {:<20}  {:<13}  {:<6}  {:>5.1}%  {}",
            l.fiche.id,
            l.fiche.company,
            l.fiche.client_name,
            l.fiche.status,
            l.fiche.priority,
            l.completion_score.unwrap_or_default(),
            l.formatted_date.as_deref().unwrap_or("-"),
        );
    }
    println!("{} fiche(s)", listed.len());
    Ok(())
}

fn stats(store: &FicheStore) -> Result<()> {
    let fiches = store.fiches()?;
    print!("{}", executive_summary(Statistics::compute(&fiches).as_ref()));
    if fiches.is_empty() {
        return Ok(());
    }

    println!("\n## Field completion");
    for fc in field_completion(&fiches) {
        println!("- {}: {:.0}%", fc.field, fc.rate);
    }
    let weakest: Vec<String> = weakest_fields(&fiches, WEAKEST_FIELDS)
        .iter()
        .map(|fc| format!("{} ({:.0}%)", fc.field, fc.rate))
        .collect();
    println!("Weakest: {}", weakest.join(", "));

    let by_commercial = commercial_performance(&fiches);
    if !by_commercial.is_empty() {
        println!("\n## Commercials");
        for p in &by_commercial {
            println!(
                "- {}: {} fiche(s), {:.1}% avg completion, {} qualified ({:.1}%){}",
                p.commercial,
                p.fiche_count,
                p.avg_completion,
                p.qualified_count,
                p.qualification_rate,
                if p.needs_coaching { ", coaching recommended" } else { "" }
            );
        }
    }

    println!("\n## Top companies");
    for (company, count) in top_companies(&fiches, TOP_COMPANIES) {
        println!("- {company}: {count}");
    }

    println!("\n## Created per day");
    for (day, count) in daily_creations(&fiches) {
        println!("- {}: {count}", day.format("%d/%m/%Y"));
    }

    if let Some(r) = completion_qualification_correlation(&fiches) {
        let strength = match CorrelationStrength::of(r) {
            CorrelationStrength::Strong => "strong",
            CorrelationStrength::Moderate => "moderate",
            CorrelationStrength::Weak => "weak",
        };
        println!("\nCompletion/qualification correlation: {r:.2} ({strength})");
    }
    Ok(())
}

fn recommend(store: &FicheStore, top: usize) -> Result<()> {
    let now = Utc::now();
    let fiches = store.fiches()?;
    let overview = PipelineOverview::compute(&fiches, now);
    println!(
        "to complete: {}  high priority: {}  waiting: {}  ready to qualify: {}",
        overview.to_complete, overview.high_priority, overview.waiting, overview.ready_to_qualify
    );

    let urgent = urgent_actions(&fiches, URGENT_ACTION_LIMIT);
    if !urgent.is_empty() {
        println!("\nUrgent actions:");
        for (i, action) in urgent.iter().enumerate() {
            println!(
                "{:>3}. [{:?}] #{} {}: {} (commercial: {})",
                i + 1,
                action.urgency(),
                action.fiche_id,
                action.company,
                action.message(),
                action.commercial.as_deref().unwrap_or("N/A")
            );
        }
    }

    let mut ranked: Vec<&Fiche> = fiches.iter().collect();
    ranked.sort_by(|a, b| {
        priority_level(*b, now)
            .cmp(&priority_level(*a, now))
            .then(completion_score(*a).total_cmp(&completion_score(*b)))
    });
    for fiche in ranked.into_iter().take(top) {
        println!(
            "\n#{} {} ({}) - {} priority, {:.0}% complete",
            fiche.id,
            fiche.company,
            fiche.client_name,
            priority_level(fiche, now),
            completion_score(fiche)
        );
        for advice in recommendations(fiche) {
            println!("  - {advice}");
        }
    }
    Ok(())
}

fn history(store: &FicheStore, id: Option<FicheId>, limit: usize) -> Result<()> {
    let entries = match id {
        Some(id) => store.history(id)?,
        None => store.recent_activity(limit)?,
    };
    for e in &entries {
        let detail = e
            .change
            .as_ref()
            .map(|c| match (&c.old_value, &c.new_value) {
                (None, None) => format!(" [{}]", c.field),
                (old, new) => format!(
                    " [{}: {:?} -> {:?}]",
                    c.field,
                    old.as_deref().unwrap_or_default(),
                    new.as_deref().unwrap_or_default()
                ),
            })
            .unwrap_or_default();
        println!(
            "{}  fiche {:<5} {}{}",
            e.timestamp.format("%Y-%m-%d %H:%M:%S"),
            e.fiche_id,
            e.action,
            detail
        );
    }
    if !store.audit_enabled() {
        println!("(audit logging is disabled in config.toml)");
    }
    Ok(())
}

fn export_csv(cfg: &CoreConfig, store: &FicheStore, out: Option<PathBuf>) -> Result<()> {
    anyhow::ensure!(cfg.export.csv_enabled, "CSV export is disabled in config.toml");
    let path = out.unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now())));
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let rows = write_csv(&store.fiches()?, BufWriter::new(file))?;
    println!("wrote {rows} fiche(s) to {}", path.display());
    Ok(())
}

fn export_doc(
    cfg: &CoreConfig,
    store: &FicheStore,
    id: FicheId,
    out: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(
        cfg.export.document_enabled,
        "document export is disabled in config.toml"
    );
    let fiche = store.get(id)?;
    let doc = Document::layout(&fiche, Layout::from(&cfg.export));
    let path = out.unwrap_or_else(|| default_doc_path(&fiche));
    std::fs::write(&path, doc.render()).with_context(|| format!("write {}", path.display()))?;
    println!("wrote {} page(s) to {}", doc.page_count(), path.display());
    Ok(())
}

/// `meddic_<company>_<YYYYMMDD>.txt`, company reduced to file-safe characters.
fn default_doc_path(fiche: &Fiche) -> PathBuf {
    let company: String = fiche
        .company
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    PathBuf::from(format!(
        "meddic_{company}_{}.txt",
        Utc::now().format("%Y%m%d")
    ))
}

fn backup(cfg: &CoreConfig, store: &FicheStore, prune: bool) -> Result<()> {
    let backups = Backups::from_config(&cfg.backup)?;
    let report = backups.create(store, Utc::now())?;
    println!(
        "backup {} ({} bytes, blake3 {})",
        report.path.display(),
        report.bytes,
        report.digest
    );
    if prune {
        for path in backups.prune(Utc::now())? {
            println!("removed {}", display_name(&path));
        }
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
