use crate::infra::SimulatedChannel;
use clap::Args;
use hiring_desk::error::AppError;
use hiring_desk::workflows::publication::{
    ChannelErrorKind, ChannelKind, ChannelOutcome, ChannelRegistry, FanOutExecutor,
    InMemoryPostingRepository, InMemoryRunStore, JobPosting, JobPostingId,
    LogNotificationChannel, PostingStatus, PublicationError, PublicationService, PublishReport,
    PublishResponse,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Per-channel timeout in milliseconds for the simulated fan-out
    #[arg(long, default_value_t = 200)]
    pub(crate) timeout_ms: u64,
    /// Maximum number of channels contacted at once
    #[arg(long, default_value_t = 4)]
    pub(crate) max_in_flight: usize,
    /// Print the raw JSON response bodies instead of the summary view
    #[arg(long)]
    pub(crate) json: bool,
}

type DemoService = PublicationService<InMemoryPostingRepository, InMemoryRunStore>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let timeout = Duration::from_millis(args.timeout_ms.max(1));
    let service = demo_service(timeout, args.max_in_flight)?;

    println!("Job posting publication demo");
    println!(
        "Channels: {} (timeout {} ms, {} in flight)",
        service.registry().names().join(", "),
        timeout.as_millis(),
        args.max_in_flight.max(1)
    );

    let incomplete = JobPostingId("jp-demo-draft".to_string());
    let complete = JobPostingId("jp-demo-042".to_string());

    println!("\n1. Publishing an incomplete draft ({incomplete})");
    report_error(service.publish(&incomplete).await);

    println!("\n2. Publishing a complete draft ({complete})");
    let response = service.publish(&complete).await?.response();
    render_response(&response, args.json)?;

    println!("\n3. Publishing {complete} again");
    report_error(service.publish(&complete).await);

    println!("\n4. Retrying failed channels for {complete}");
    match service.retry_failed(&complete).await {
        Ok(report) => render_response(&report.response(), args.json)?,
        Err(err) => println!("   retry refused: {err}"),
    }

    let runs = service.runs(&complete).await?;
    println!("\nAudit trail for {complete}: {} run(s)", runs.len());
    for run in &runs {
        println!(
            "  - {} {} at {}: {}/{} channels succeeded",
            run.run_id,
            run.trigger.as_str(),
            run.attempted_at.format("%H:%M:%S%.3f"),
            run.summary.succeeded,
            run.summary.total
        );
    }

    Ok(())
}

fn demo_service(timeout: Duration, max_in_flight: usize) -> Result<DemoService, AppError> {
    let quick = Duration::from_millis(15);
    let registry = ChannelRegistry::new()
        .with(Arc::new(SimulatedChannel::new(
            "careers-site",
            ChannelKind::ContentSystem,
            quick,
        )))?
        .with(Arc::new(SimulatedChannel::new(
            "indeed",
            ChannelKind::JobBoard,
            timeout * 10,
        )))?
        .with(Arc::new(SimulatedChannel::new(
            "stackoverflow-jobs",
            ChannelKind::JobBoard,
            quick,
        )))?
        .with(Arc::new(
            SimulatedChannel::new("linkedin", ChannelKind::SocialMedia, quick)
                .failing(1, ChannelErrorKind::Unavailable),
        ))?
        .with(Arc::new(LogNotificationChannel::new("hiring-team")))?;

    let postings = InMemoryPostingRepository::with_postings(demo_postings());

    Ok(PublicationService::new(
        Arc::new(postings),
        Arc::new(InMemoryRunStore::default()),
        Arc::new(registry),
        FanOutExecutor::new(timeout, max_in_flight),
    ))
}

fn demo_postings() -> Vec<JobPosting> {
    let complete = JobPosting {
        id: JobPostingId("jp-demo-042".to_string()),
        code: "ENG-042".to_string(),
        title: Some("Payroll Systems Engineer".to_string()),
        description: Some(
            "Own the payroll export pipeline and the integrations that feed it.".to_string(),
        ),
        required_skills: vec![
            "Rust".to_string(),
            "PostgreSQL".to_string(),
            "Payroll compliance".to_string(),
        ],
        preferred_skills: vec!["Kafka".to_string()],
        qualifications: vec!["5+ years building backend services".to_string()],
        salary_min: Some(95_000),
        salary_max: Some(125_000),
        application_deadline: Some(chrono::Utc::now() + chrono::Duration::days(30)),
        is_published: false,
        status: PostingStatus::Draft,
        published_at: None,
    };

    let incomplete = JobPosting {
        id: JobPostingId("jp-demo-draft".to_string()),
        code: "OPS-007".to_string(),
        title: Some("Site Reliability Engineer".to_string()),
        description: None,
        required_skills: Vec::new(),
        salary_min: Some(140_000),
        salary_max: Some(110_000),
        ..complete.clone()
    };

    vec![complete, incomplete]
}

fn report_error(result: Result<PublishReport, PublicationError>) {
    match result {
        Ok(report) => println!("   unexpectedly published with run {}", report.run.run_id),
        Err(PublicationError::Validation { missing_fields }) => {
            println!("   refused: missing or invalid {}", missing_fields.join(", "));
        }
        Err(PublicationError::AlreadyPublished {
            status,
            published_at,
        }) => {
            let when = published_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            println!("   refused: already {} since {when}", status.label());
        }
        Err(err) => println!("   refused: {err}"),
    }
}

fn render_response(response: &PublishResponse, as_json: bool) -> Result<(), AppError> {
    if as_json {
        let body = serde_json::to_string_pretty(response).map_err(std::io::Error::from)?;
        println!("{body}");
        return Ok(());
    }

    println!(
        "   {} '{}' is {} (run {}, {})",
        response.job_code,
        response.job_title,
        response.status.label(),
        response.run_id,
        response.trigger.as_str()
    );
    let results = &response.channel_results;
    if let Some(outcome) = &results.content_system {
        render_outcome("content system", outcome);
    }
    for outcome in &results.job_boards {
        render_outcome("job board", outcome);
    }
    for outcome in &results.social_media {
        render_outcome("social media", outcome);
    }
    for outcome in &results.notifications {
        render_outcome("notification", outcome);
    }
    println!(
        "   summary: {} total, {} succeeded, {} failed",
        response.summary.total, response.summary.succeeded, response.summary.failed
    );
    Ok(())
}

fn render_outcome(category: &str, outcome: &ChannelOutcome) {
    if outcome.success {
        println!(
            "   [ok]   {category:<14} {:<20} {:>5} ms  {}",
            outcome.channel,
            outcome.duration_ms,
            outcome.external_reference.as_deref().unwrap_or("-")
        );
    } else {
        println!(
            "   [fail] {category:<14} {:<20} {:>5} ms  {} ({})",
            outcome.channel,
            outcome.duration_ms,
            outcome.error.as_deref().unwrap_or("unknown error"),
            outcome
                .error_kind
                .map(ChannelErrorKind::as_str)
                .unwrap_or("unclassified")
        );
    }
}
