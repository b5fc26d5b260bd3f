mod config;
mod speech;

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::fmt::time::ChronoLocal;

use flowprep_core::api::{BackendClient, InterviewApi};
use flowprep_core::poller::{CancelToken, Poller};
use flowprep_core::session::{InterviewSession, SessionPhase};
use flowprep_native_utils::audio::format_duration;
use flowprep_native_utils::capture::CpalCaptureSource;
use flowprep_native_utils::recorder::{Recorder, RecorderStatus};
use flowprep_realtime::{Transport, TransportConfig};
use flowprep_types::feedback::{RecordingFeedback, SessionFeedback};
use flowprep_types::session::{InterviewType, SessionConfig};
use flowprep_types::{ClientMessage, ConnectionStatus, Role, TranscriptEntry};

use crate::config::{Config, KEEPALIVE_INTERVAL_SECS};

#[derive(Parser)]
#[command(name = "flowprep", about = "Interview practice from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a live mock interview session
    Roleplay {
        /// Company to tailor questions to
        #[arg(long)]
        company: Option<String>,
        /// Role being interviewed for
        #[arg(long)]
        role: Option<String>,
        /// Interview style: behavioral, technical, or mixed
        #[arg(long, default_value = "behavioral")]
        interview_type: String,
        /// Number of interviewer turns
        #[arg(long)]
        turns: Option<u32>,
    },
    /// Record a single practice answer and get delivery feedback
    Practice {
        /// Question the answer responds to, if any
        #[arg(long)]
        question_id: Option<String>,
        /// Attempt number for this question
        #[arg(long, default_value_t = 1)]
        attempt: u32,
    },
    /// List past interview sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();
    let api = BackendClient::new(&config.api_url, config.api_token.clone());

    match args.command {
        Command::Roleplay {
            company,
            role,
            interview_type,
            turns,
        } => {
            let interview_type = parse_interview_type(&interview_type)?;
            let mut builder = SessionConfig::builder().with_interview_type(interview_type);
            if let Some(company) = &company {
                builder = builder.with_company(company);
            }
            if let Some(role) = &role {
                builder = builder.with_role(role);
            }
            if let Some(turns) = turns {
                builder = builder.with_max_turns(turns);
            }
            run_roleplay(&config, &api, builder.build()).await
        }
        Command::Practice {
            question_id,
            attempt,
        } => run_practice(&api, question_id, attempt).await,
        Command::Sessions => run_sessions(&api).await,
    }
}

fn parse_interview_type(raw: &str) -> Result<InterviewType> {
    match raw.to_lowercase().as_str() {
        "behavioral" => Ok(InterviewType::Behavioral),
        "technical" => Ok(InterviewType::Technical),
        "mixed" => Ok(InterviewType::Mixed),
        other => bail!("unknown interview type '{other}', expected behavioral, technical or mixed"),
    }
}

async fn run_roleplay(config: &Config, api: &BackendClient, session_config: SessionConfig) -> Result<()> {
    let mut session = InterviewSession::new(session_config);
    let session_id = session.start(api).await?;
    tracing::info!("Session created: {}", session_id);

    let transport_config = TransportConfig::builder()
        .with_ws_base_url(&config.ws_url)
        .with_bearer_token(config.api_token.expose_secret())
        .build();
    let mut transport = Transport::new(64, transport_config);

    // Subscribe before connecting; the first question arrives as soon as
    // the socket opens.
    let mut events = transport.events();
    let mut status_changes = transport.status_changes();
    transport.connect(&session_id).await?;
    if transport.status() != ConnectionStatus::Connected {
        bail!("could not reach the interview server");
    }
    session.mark_connected();

    let mut playback = speech::open();

    println!("Interview started. Type your answer and press Enter; /end finishes the session.");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let keepalive_interval = Duration::from_secs(KEEPALIVE_INTERVAL_SECS);
    let mut keepalive =
        tokio::time::interval_at(tokio::time::Instant::now() + keepalive_interval, keepalive_interval);

    loop {
        // Biased so that a final frame already sitting in the event channel
        // is rendered before the status arm reports the connection gone.
        tokio::select! {
            biased;
            event = events.recv() => {
                match event {
                    Ok(message) => {
                        let before = session.transcript().len();
                        let over = session.apply(message, &mut playback);
                        render_new_entries(&session, before);
                        if over {
                            println!("The interviewer has ended the session.");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!("event dispatch lagged, {missed} messages missed");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        println!("Connection to the interview server was lost.");
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(line) if line.trim() == "/end" => break,
                    Some(line) => {
                        if !session.submit_answer(&line, &mut transport).await {
                            println!("(answer not sent: not connected or empty)");
                        }
                    }
                }
            }
            _ = keepalive.tick() => {
                transport.send(ClientMessage::ping()).await;
            }
            // A connection that dies without a session_end frame never
            // delivers another event; the status watch is what ends the
            // session loop and gets the feedback fetched.
            changed = status_changes.changed() => {
                if changed.is_err()
                    || *status_changes.borrow_and_update() == ConnectionStatus::Ended
                {
                    println!("Connection to the interview server was lost.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    println!("Wrapping up, fetching your feedback...");
    let feedback = session.finish(api, &mut transport).await?;
    debug_assert_eq!(session.phase(), SessionPhase::Complete);
    match feedback {
        Some(feedback) => render_session_feedback(&feedback),
        None => println!("Could not load feedback for this session."),
    }
    Ok(())
}

fn render_new_entries(session: &InterviewSession, from: usize) {
    for entry in &session.transcript()[from..] {
        render_entry(entry, session.current_turn(), session.max_turns());
    }
}

fn render_entry(entry: &TranscriptEntry, current_turn: u32, max_turns: u32) {
    match entry.role {
        Role::Interviewer => {
            println!();
            println!("Interviewer ({current_turn}/{max_turns}): {}", entry.content);
        }
        Role::Candidate => {}
        Role::System => println!("! {}", entry.content),
    }
}

fn render_session_feedback(feedback: &SessionFeedback) {
    println!();
    println!("=== Session feedback ===");
    if let Some(score) = feedback.overall_score {
        println!("Overall score: {score:.0}/100");
    }
    if !feedback.summary.is_empty() {
        println!("{}", feedback.summary);
    }
    if !feedback.top_wins.is_empty() {
        println!();
        println!("What went well:");
        for win in &feedback.top_wins {
            println!("  + {} ({})", win.point, win.example);
        }
    }
    if !feedback.top_improvements.is_empty() {
        println!();
        println!("What to work on:");
        for improvement in &feedback.top_improvements {
            println!("  - {} ({})", improvement.point, improvement.suggestion);
        }
    }
    if !feedback.delivery_notes.is_empty() {
        println!();
        println!("Delivery: {}", feedback.delivery_notes);
    }
    println!();
    println!(
        "{} turns over {}. {}",
        feedback.total_turns,
        format_duration(feedback.duration_seconds as u64),
        if feedback.interview_ready {
            "You look interview-ready."
        } else {
            "Keep practicing."
        }
    );
}

async fn run_practice(
    api: &BackendClient,
    question_id: Option<String>,
    attempt: u32,
) -> Result<()> {
    let mut recorder = Recorder::new(CpalCaptureSource::new(None));
    recorder.start();
    if let Some(error) = recorder.error() {
        bail!("could not start recording: {error}");
    }

    println!("Recording... press Enter to stop.");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let _ = lines.next_line().await?;

    recorder.stop();
    if recorder.status() != RecorderStatus::Stopped {
        bail!("recording did not produce an artifact");
    }
    println!(
        "Recorded {} of audio.",
        format_duration(recorder.duration_seconds())
    );
    let artifact = recorder
        .take_artifact()
        .context("recording stopped without any captured audio")?;

    println!("Uploading...");
    let upload = api
        .upload_recording(artifact.wav, question_id, attempt)
        .await
        .context("failed to upload the recording")?;
    api.request_analysis(&upload.recording_id)
        .await
        .context("failed to request analysis")?;

    println!("Analyzing your answer, this can take a minute...");
    print!("Waiting");
    std::io::stdout().flush().ok();
    let recording_id = upload.recording_id.clone();
    let outcome = Poller::default()
        .poll(CancelToken::never(), || {
            let recording_id = recording_id.clone();
            async move {
                print!(".");
                std::io::stdout().flush().ok();
                match api.recording_feedback(&recording_id).await? {
                    Some(feedback) if feedback.is_scored() => Ok(Some(feedback)),
                    _ => Ok(None),
                }
            }
        })
        .await;
    println!();

    match outcome.ready() {
        Some(feedback) => render_recording_feedback(&feedback),
        None => println!(
            "Analysis is taking longer than expected. Check again later with recording id {}.",
            upload.recording_id
        ),
    }
    Ok(())
}

fn render_recording_feedback(feedback: &RecordingFeedback) {
    println!();
    println!("=== Delivery feedback ===");
    if let Some(score) = feedback.readiness_score {
        println!("Readiness score: {score:.0}/100");
    }
    println!(
        "{} words at {:.0} wpm, {} filler words, {} long pauses",
        feedback.total_word_count,
        feedback.words_per_minute,
        feedback.filler_word_count,
        feedback.pause_count
    );
    if let Some(star) = feedback.star_score {
        println!("STAR structure: {star:.0}/100");
    }
    if let Some(confidence) = feedback.confidence_score {
        println!("Confidence: {confidence:.0}/100");
    }
    if !feedback.coaching_tips.is_empty() {
        println!();
        println!("Coaching tips:");
        for tip in &feedback.coaching_tips {
            println!("  - {tip}");
        }
    }
}

async fn run_sessions(api: &BackendClient) -> Result<()> {
    let sessions = api.list_sessions().await.context("failed to list sessions")?;
    if sessions.is_empty() {
        println!("No sessions yet.");
        return Ok(());
    }
    for session in sessions {
        let score = session
            .overall_score
            .map(|s| format!("{s:.0}/100"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<12} {:<10} {:<10} score {}",
            session.started_at,
            session.company.as_deref().unwrap_or("generic"),
            session.interview_type.as_deref().unwrap_or("-"),
            session.status,
            score
        );
    }
    Ok(())
}
