// ABOUTME: Entry point for the Wavedash terminal dashboard
// Sets up terminal, event loop, and coordinates all components

use anyhow::Result;
use clap::{Arg, Command};
use crossbeam_channel::{bounded, Receiver, Sender};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use wavedash::{
    app::{
        config::AppConfig,
        state::{AppEvent, AppState},
    },
    data::collector::spawn_collector,
    ui::dashboard::Dashboard,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = parse_args();

    if config.debug {
        tracing_subscriber::fmt()
            .with_env_filter("wavedash=debug")
            .init();
    }

    let state = Arc::new(AppState::new(config.clone()));

    if !atty::is(atty::Stream::Stdout) || config.json_output {
        return run_status_check(state);
    }

    let mut terminal = setup_terminal()?;

    let (event_tx, event_rx) = bounded::<AppEvent>(100);

    let collector_handle = match spawn_collector(state.clone(), event_tx.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Warning: could not start data collector: {}", e);
            None
        }
    };

    spawn_input_handler(event_tx.clone());

    let mut dashboard = Dashboard::new(state.clone());

    let result = run_event_loop(&mut terminal, &mut dashboard, event_rx).await;

    restore_terminal(&mut terminal)?;

    // Ask the collector to flush pending history writes, then wait briefly.
    if let Some((handle, shutdown_tx)) = collector_handle {
        let _ = shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    result
}

fn parse_args() -> AppConfig {
    let matches = Command::new("wavedash")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Wavedash Team")
        .about("Live terminal dashboard for multi-agent dev sessions")
        .arg(
            Arg::new("refresh-rate")
                .short('r')
                .long("refresh-rate")
                .value_name("SECONDS")
                .help("Refresh rate in seconds"),
        )
        .arg(
            Arg::new("dev-root")
                .long("dev-root")
                .value_name("DIR")
                .help("Root of the dev workspace"),
        )
        .arg(
            Arg::new("project-path")
                .long("project-path")
                .value_name("DIR")
                .help("Project directory for artifact-based phase inference"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print a one-shot JSON status report and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = AppConfig::load();

    if let Some(rate) = matches.get_one::<String>("refresh-rate") {
        if let Ok(parsed) = rate.parse() {
            config.refresh_rate = parsed;
        }
    }

    if let Some(root) = matches.get_one::<String>("dev-root") {
        config.dev_root = root.into();
    }

    if let Some(path) = matches.get_one::<String>("project-path") {
        config.project_path = Some(path.into());
    }

    config.json_output = matches.get_flag("json");
    config.debug = matches.get_flag("debug");

    config
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_handler(tx: Sender<AppEvent>) {
    std::thread::spawn(move || loop {
        if let Ok(true) = event::poll(Duration::from_millis(100)) {
            if let Ok(Event::Key(key)) = event::read() {
                let _ = tx.send(AppEvent::Input(key));
            }
        }
    });
}

async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    dashboard: &mut Dashboard,
    event_rx: Receiver<AppEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| dashboard.render(f))?;

        if let Ok(event) = event_rx.recv_timeout(Duration::from_millis(50)) {
            match event {
                AppEvent::Input(key) => {
                    if !dashboard.handle_key(key.code) {
                        break;
                    }
                }
                AppEvent::Refreshed => {
                    // Snapshots already swapped by the collector.
                }
                AppEvent::Resize(_, _) => {
                    // Layout is recomputed on every draw.
                }
                AppEvent::Quit => break,
                _ => {}
            }
        }
    }

    Ok(())
}

/// One-shot status report for pipes and scripts. Polls every tracker once
/// and prints either plain text or JSON.
fn run_status_check(state: Arc<AppState>) -> Result<()> {
    use chrono::Utc;
    use wavedash::data::history::HistoryTracker;
    use wavedash::data::session::SessionTracker;
    use wavedash::data::status::StatusTracker;
    use wavedash::data::token::TokenTracker;
    use wavedash::utils::timefmt::format_tokens;

    let config = &state.config;
    let now = Utc::now();

    let mut status = StatusTracker::new(config.active_agents_path());
    status.poll(now);
    let agents = status.agents();
    let meta = status.meta().clone();

    let mut token = TokenTracker::new();
    token.reload(config.usage_path());
    token.set_time_window(meta.project_started_at, meta.project_ended_at);
    let summary = token.summary();

    let session = SessionTracker::new(config.todos_dir(), config.transcripts_dir()).poll(now);
    let history = HistoryTracker::load(config.work_history_path());

    if config.json_output {
        let report = serde_json::json!({
            "project": meta.project,
            "currentPhase": meta.current_phase,
            "agents": agents.iter().map(|a| serde_json::json!({
                "name": a.name,
                "model": a.model,
                "task": a.current_task,
                "status": format!("{:?}", a.status).to_lowercase(),
                "phase": a.phase,
            })).collect::<Vec<_>>(),
            "tokens": {
                "input": summary.total_input,
                "output": summary.total_output,
                "total": summary.total_tokens,
                "cost": summary.cost_estimate,
            },
            "session": {
                "active": session.active,
                "task": session.current_task,
                "done": session.completed_count,
                "total": session.total_count,
            },
            "historyEntries": history.all_history(usize::MAX).len(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Wavedash status");
    println!("===============");
    match &meta.project {
        Some(project) => println!("project: {}", project),
        None => println!("project: (none)"),
    }
    println!();

    if agents.is_empty() {
        println!("no active agents");
    } else {
        for agent in &agents {
            println!(
                "  {:<16} {:<10} {:?}  {}",
                agent.name,
                wavedash::utils::cost::short_model(&agent.model),
                agent.status,
                agent.current_task
            );
        }
    }
    println!();

    println!(
        "tokens: in {} / out {} / total {} (${:.2})",
        format_tokens(summary.total_input),
        format_tokens(summary.total_output),
        format_tokens(summary.total_tokens),
        summary.cost_estimate
    );
    println!(
        "session: {} ({}/{} done)",
        if session.active { "active" } else { "idle" },
        session.completed_count,
        session.total_count
    );

    Ok(())
}
