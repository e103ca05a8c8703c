//! Runs one offline dry-run cycle against synthetic data and prints the report.

use std::sync::Arc;
use std::time::Duration;

use thread_scout::clock::{Clock, SystemClock};
use thread_scout::compose::TemplateComposer;
use thread_scout::history::HistoryStore;
use thread_scout::source::connect;
use thread_scout::{
    BusinessContext, CancelSignal, CycleSummary, NotifierMux, Pipeline, PostingScheduler,
    ScoutConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut config = ScoutConfig::default();
    config.posting.dry_run = true;
    // Wall clock: do not wait out the posting interval inside the demo.
    config.posting.pace_batch = false;
    let context = BusinessContext::load_default().unwrap_or_else(|_| BusinessContext {
        product_summary: "TaskPilot".into(),
        industry: "small business productivity".into(),
        keywords: vec!["task tracking".into(), "project management".into()],
        pain_points: vec!["missed deadlines".into()],
        recommended_groups: vec![],
        key_benefits: vec!["keeps every task and deadline in one place".into()],
    });

    let connection = connect(None, Duration::from_secs(1)).await;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(PostingScheduler::new(
        &config.posting,
        HistoryStore::in_memory(),
        connection.connector(),
        Arc::clone(&clock),
    ));
    let pipeline = Pipeline::new(config, connection, scheduler, Arc::new(TemplateComposer), clock);

    let report = pipeline.run_cycle(&context, &CancelSignal::new()).await;
    let summary = CycleSummary::from_report(&report);
    println!("{}\n{}", summary.title(), summary.body());
    println!("balanced: {}", report.is_balanced());

    NotifierMux::from_env().notify(&summary).await;
    Ok(())
}
