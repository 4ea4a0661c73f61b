use crate::infra::{parse_amount, parse_date, DemoGateway, RehearsalGateway};
use chrono::{Local, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tenant_verification::config::AppConfig;
use tenant_verification::error::AppError;
use tenant_verification::workflows::verification::{
    DraftPersistence, DraftStore, DraftUpdate, FileDraftStore, HttpSubmissionGateway,
    InMemoryDraftStore, Navigation, SubmissionGateway, SubmitOutcome, TenancyProof,
    WizardController, WizardSessions, WizardSnapshot, WizardStep,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Tenant's full name for step one.
    #[arg(long, default_value = "Jane Doe")]
    pub(crate) tenant_name: String,
    /// Property address for step one.
    #[arg(long, default_value = "1 Main Street")]
    pub(crate) address: String,
    /// Agent/landlord name for step two.
    #[arg(long, default_value = "Acme Lettings")]
    pub(crate) landlord: String,
    /// Move-in date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) move_in: Option<NaiveDate>,
    /// Monthly rent, e.g. 1250.00
    #[arg(long, value_parser = parse_amount)]
    pub(crate) monthly_rent: Option<Decimal>,
    /// PDF, JPG or PNG to attach as tenancy proof.
    #[arg(long)]
    pub(crate) proof: Option<PathBuf>,
    /// Keep drafts as JSON files in this directory instead of memory.
    #[arg(long)]
    pub(crate) draft_dir: Option<PathBuf>,
    /// Have the rehearsal gateway refuse the first claim to show the retry path.
    #[arg(long)]
    pub(crate) fail_first: bool,
    /// Submit to the configured claim endpoint instead of the rehearsal gateway.
    #[arg(long)]
    pub(crate) live: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = match &args.draft_dir {
        Some(dir) => DraftStore::File(FileDraftStore::open(dir)?),
        None => DraftStore::Memory(InMemoryDraftStore::default()),
    };
    let gateway = if args.live {
        let config = AppConfig::load()?;
        let gateway = HttpSubmissionGateway::new(&config.gateway)?;
        println!("Submitting to {}", gateway.endpoint());
        DemoGateway::Live(gateway)
    } else if args.fail_first {
        DemoGateway::Rehearsal(RehearsalGateway::failing_first())
    } else {
        DemoGateway::Rehearsal(RehearsalGateway::default())
    };

    println!("Tenant verification demo ({} drafts)", store.label());
    let sessions = WizardSessions::new(Arc::new(store), Arc::new(gateway));
    walk_through(&sessions, args).await
}

async fn walk_through<P, G>(
    sessions: &WizardSessions<P, G>,
    args: DemoArgs,
) -> Result<(), AppError>
where
    P: DraftPersistence + 'static,
    G: SubmissionGateway + 'static,
{
    let DemoArgs {
        tenant_name,
        address,
        landlord,
        move_in,
        monthly_rent,
        proof,
        ..
    } = args;

    let wizard = sessions.open(None);
    let session_id = wizard.session_id().clone();
    render_snapshot(&wizard.snapshot());

    edit(&wizard, DraftUpdate::default().tenant_full_name(tenant_name));
    report_navigation("Next without an address", wizard.next());
    edit(&wizard, DraftUpdate::default().property_address(address));
    report_navigation("Next", wizard.next());

    edit(&wizard, DraftUpdate::default().agent_landlord_name(landlord));
    report_navigation("Back", wizard.back());
    report_navigation("Next", wizard.next());

    println!("\nSimulating a reload of session {session_id}");
    sessions.detach(&session_id);
    let wizard = sessions.open(Some(session_id));
    render_snapshot(&wizard.snapshot());
    while wizard.current_step() != WizardStep::TERMINAL {
        if let Navigation::Stayed(step) = wizard.next() {
            println!("Resumed draft does not pass the {step} step; stopping");
            return Ok(());
        }
    }

    let mut tenancy = DraftUpdate::default()
        .move_in_date(move_in.unwrap_or_else(|| Local::now().date_naive()));
    if let Some(rent) = monthly_rent {
        tenancy = tenancy.monthly_rent(rent);
    }
    if let Some(path) = proof {
        let bytes = std::fs::read(&path)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match TenancyProof::new(file_name, bytes) {
            Ok(proof) => tenancy = tenancy.tenancy_proof(proof),
            Err(err) => println!("Skipping tenancy proof: {err}"),
        }
    }
    edit(&wizard, tenancy);
    render_snapshot(&wizard.snapshot());

    for attempt in 1..=2 {
        match sessions.submit(&wizard).await {
            SubmitOutcome::Completed => {
                println!("\nAttempt {attempt}: claim accepted; draft discarded");
                return Ok(());
            }
            SubmitOutcome::Failed { error } => {
                println!("\nAttempt {attempt}: claim refused ({error}); draft kept for retry");
                wizard.dismiss_notice();
            }
            SubmitOutcome::Rejected(rejection) => {
                println!("\nAttempt {attempt}: not submitted ({rejection})");
                return Ok(());
            }
            SubmitOutcome::Detached => return Ok(()),
        }
    }

    println!("Giving up after two attempts; the draft stays saved for later");
    Ok(())
}

fn edit<P, G>(wizard: &Arc<WizardController<P, G>>, update: DraftUpdate)
where
    P: DraftPersistence,
    G: SubmissionGateway,
{
    if let Err(err) = wizard.update_form_data(update) {
        println!("Edit refused: {err}");
    }
}

fn report_navigation(action: &str, navigation: Navigation) {
    match navigation {
        Navigation::Moved { from, to } => println!("{action}: {from} -> {to}"),
        Navigation::Stayed(step) => println!("{action}: stayed on {step}"),
        Navigation::Abandon => println!("{action}: leaving the wizard"),
    }
}

fn render_snapshot(snapshot: &WizardSnapshot) {
    println!(
        "\nStep {} of {} ({}) | can advance: {}",
        snapshot.current_step, snapshot.total_steps, snapshot.step, snapshot.can_advance
    );
    let draft = &snapshot.draft;
    if !draft.tenant_full_name.is_empty() {
        println!("- tenant: {}", draft.tenant_full_name);
    }
    if let Some(address) = &draft.property_address {
        println!("- property: {address}");
    }
    if let Some(landlord) = &draft.agent_landlord_name {
        println!("- agent/landlord: {landlord}");
    }
    if let Some(date) = draft.move_in_date {
        println!("- move in: {}", date.format("%Y-%m-%d"));
    }
    if let Some(rent) = draft.monthly_rent {
        println!("- monthly rent: {rent}");
    }
    if let Some(proof) = &snapshot.tenancy_proof {
        println!(
            "- proof: {} ({}, {} bytes)",
            proof.file_name, proof.content_type, proof.size
        );
    }
}
