use crate::infra::{in_memory_app, parse_month, parse_timestamp, seed_demo_data};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use hostess_roster::config::RosterConfig;
use hostess_roster::error::AppError;
use hostess_roster::workflows::shifts::domain::{NotificationKind, UserId, YearMonth};
use hostess_roster::workflows::shifts::notifications::{Resolution, Response};
use hostess_roster::workflows::shifts::roster::export_file_name;
use hostess_roster::workflows::shifts::{
    Clock, FixedClock, Session, ShiftServiceError, ValidationError,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Wall-clock time for the walkthrough (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Print the month roster CSV at the end of the walkthrough.
    #[arg(long)]
    pub(crate) show_csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Calendar year of the roster
    #[arg(long)]
    pub(crate) year: i32,
    /// Month of the roster (1-12)
    #[arg(long, value_parser = parse_month)]
    pub(crate) month: u32,
    /// Write the CSV here instead of standard output
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

pub(crate) async fn run_roster_export(args: ExportArgs) -> Result<(), AppError> {
    let ExportArgs { year, month, out } = args;
    let period = YearMonth::new(year, month)
        .ok_or_else(|| ShiftServiceError::from(ValidationError::InvalidPeriod { year, month }))?;

    let clock = Arc::new(FixedClock::new(period.start() - Duration::days(7)));
    let (app, store) = in_memory_app(clock, RosterConfig::default());
    let cast = seed_demo_data(&app, &store, period).await?;

    for group in app.directory().groups().await? {
        app.releases()
            .schedule(&cast.admin, period, group.id, period.start() - Duration::days(14))
            .await?;
    }

    let applications = app.applications();
    let jobs = app.jobs().list(period).await?;
    for (index, summary) in jobs.iter().enumerate() {
        for member in cast.staff.iter().skip(index % 2).step_by(2) {
            applications.apply(member, summary.job.id).await?;
        }
    }

    let bytes = app.roster().export_csv(&cast.admin, period).await?;
    match out {
        Some(path) => {
            std::fs::write(&path, &bytes)?;
            println!(
                "Roster for {}-{:02} written to {} ({} bytes, suggested name {})",
                year,
                month,
                path.display(),
                bytes.len(),
                export_file_name(period)
            );
        }
        None => print!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { now, show_csv } = args;
    let now = now.unwrap_or_else(Utc::now);
    let period = YearMonth::of(now).next();

    let clock = Arc::new(FixedClock::new(period.start() - Duration::days(10)));
    let (app, store) = in_memory_app(clock.clone(), RosterConfig::default());
    let cast = seed_demo_data(&app, &store, period).await?;
    let admin = &cast.admin;
    let [anna, bella, csilla, dora] = match cast.staff.as_slice() {
        [a, b, c, d] => [a, b, c, d],
        _ => unreachable!("seed creates four hostesses"),
    };

    println!("Hostess roster demo for {}-{:02}", period.year, period.month);

    let board = app.board().month(anna, period).await?;
    println!(
        "\n1. Release gate: {} sees {} jobs ({:?})",
        anna.full_name,
        board.jobs.len(),
        board.release
    );
    let groups = app.directory().groups().await?;
    for group in &groups {
        app.releases()
            .schedule(admin, period, group.id, clock.now() - Duration::hours(1))
            .await?;
    }
    let board = app.board().month(anna, period).await?;
    println!(
        "   After the admin releases the month: {} jobs visible",
        board.jobs.len()
    );

    let gala = &board.jobs[0].summary.job;
    let fair = &board.jobs[board.jobs.len() - 1].summary.job;
    let applications = app.applications();

    println!("\n2. Applications for {}", gala.title);
    for member in [anna, bella] {
        let application = applications.apply(member, gala.id).await?;
        println!("   {} applied -> {}", member.full_name, application.status.label());
    }
    let invited = applications.invite(admin, gala.id, csilla.user_id).await?;
    println!("   {} invited -> {}", csilla.full_name, invited.status.label());
    let inbox = app.inbox().list(csilla).await?;
    if let Some(notification) = inbox
        .iter()
        .find(|notification| notification.kind == NotificationKind::Invite)
    {
        println!("   {} received: {}", csilla.full_name, notification.message);
        match app
            .inbox()
            .resolve_invite(csilla, notification.id, Response::Accept)
            .await?
        {
            Resolution::Accepted { application } => {
                println!("   Invitation accepted -> {}", application.status.label())
            }
            other => println!("   Invitation outcome: {other:?}"),
        }
    }
    let summary = app.jobs().get(admin, gala.id).await?;
    println!(
        "   Slots {}/{} | full: {}",
        summary.metrics.slots_taken, summary.metrics.slots_total, summary.metrics.is_full
    );
    match applications.apply(dora, gala.id).await {
        Ok(_) => println!("   {} also got a spot", dora.full_name),
        Err(err) => println!("   {} was turned away: {}", dora.full_name, err),
    }

    println!("\n3. Giveaway with plenty of notice");
    let receipt = applications.request_giveaway(bella, gala.id).await?;
    println!("   {} offered the shift -> {:?}", bella.full_name, receipt.kind);
    let queue = applications.giveaway_queue(gala.id).await?;
    println!("   Claim queue length: {}", queue.len());
    let spot = applications.claim_giveaway(dora, gala.id).await?;
    println!(
        "   {} claimed the spot vacated by {}",
        dora.full_name,
        name_of(&cast.staff, spot.vacated.user_id)
    );
    match applications.claim_giveaway(bella, gala.id).await {
        Ok(_) => println!("   unexpected second claim"),
        Err(err) => println!("   A second claim fails: {err}"),
    }

    println!("\n4. Emergency giveaway close to the shift");
    applications.apply(anna, fair.id).await?;
    clock.set(fair.starts_at - Duration::hours(20));
    let receipt = applications.request_giveaway(anna, fair.id).await?;
    println!(
        "   {} asked 20 hours ahead -> {:?}",
        anna.full_name, receipt.kind
    );
    let alerts = app.inbox().list(admin).await?;
    for alert in alerts
        .into_iter()
        .filter(|alert| alert.kind == NotificationKind::EmergencyGiveaway)
    {
        println!("   Admin inbox: {}", alert.message);
        let resolution = app
            .inbox()
            .resolve_emergency(admin, alert.id, Response::Accept)
            .await?;
        if let Resolution::Accepted { application } = resolution {
            println!(
                "   Approved; claimable now: {}",
                application.is_claimable()
            );
        }
    }
    let spot = applications.claim_giveaway(bella, fair.id).await?;
    println!(
        "   {} took over from {}",
        name_of(&cast.staff, spot.application.user_id),
        name_of(&cast.staff, spot.vacated.user_id)
    );

    println!("\n5. Quiz");
    let quiz = app.quiz();
    let mut attempt = quiz.start().await?;
    let picks: Vec<_> = attempt
        .questions()
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let pick = if index == 0 {
                (question.correct_answer_index + 1) % question.answers.len()
            } else {
                question.correct_answer_index
            };
            (question.id, pick)
        })
        .collect();
    for (id, pick) in picks {
        attempt.answer(id, pick);
    }
    let result = quiz.submit(csilla, attempt).await?;
    println!(
        "   {} scored {}/{} (new record: {})",
        csilla.full_name, result.score, result.total, result.new_record
    );

    println!("\n6. Month overview");
    clock.set(period.next().start());
    for member in &cast.staff {
        let overview = app.overview().staff(member, member.user_id, Some(period)).await?;
        println!(
            "   {:<12} {} jobs | {:.1} h | {} earned",
            member.full_name, overview.jobs_completed, overview.hours_worked, overview.earnings
        );
    }
    let stats = app.overview().admin(admin).await?;
    println!(
        "   Dashboard: {} staff, {} upcoming jobs, {} pending giveaways",
        stats.staff_count, stats.upcoming_jobs, stats.pending_giveaways
    );

    let matrix = app.roster().matrix(admin, period).await?;
    println!("\n7. Roster ({} slot rows)", matrix.slot_rows());
    for row in &matrix.rows {
        println!("   {}", row.join(" | "));
    }
    if show_csv {
        let bytes = app.roster().export_csv(admin, period).await?;
        println!("\n{}", String::from_utf8_lossy(&bytes));
    }

    Ok(())
}

fn name_of(staff: &[Session], user_id: UserId) -> String {
    staff
        .iter()
        .find(|member| member.user_id == user_id)
        .map(|member| member.full_name.clone())
        .unwrap_or_else(|| user_id.to_string())
}
