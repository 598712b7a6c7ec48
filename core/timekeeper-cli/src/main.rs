//! tk: operator and track-sensor client for the timekeeper daemon.
//!
//! Every subcommand is one request to the daemon. Event subcommands print the
//! snapshot the daemon returns after the event has run to completion.
//!
//! ## Subcommands
//!
//! - `toggle`, `end`, `capture`, `auto-capture`, `dnf`, `resume`, `off-track`: race events
//! - `select`: stage the next racer while the track is ready
//! - `snapshot`: print the current race state without changing it
//! - `health`: check that the daemon is up

mod daemon_client;
mod logging;

use clap::{Parser, Subcommand, ValueEnum};
use daemon_client::ClientError;
use timekeeper_protocol::{EventSource, EventType, Racer, Snapshot};

#[derive(Parser)]
#[command(name = "tk")]
#[command(about = "Race timekeeper client")]
#[command(version)]
struct Cli {
    /// Print compact single-line JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start, pause, or resume the race
    Toggle {
        #[arg(long, value_enum, default_value_t = Source::Operator)]
        source: Source,
    },

    /// End the race, or reset the track once it is over
    End,

    /// Capture the current lap
    Capture,

    /// Lap line trigger: starts the race when ready, captures a lap when running
    AutoCapture {
        #[arg(long, value_enum, default_value_t = Source::Sensor)]
        source: Source,
    },

    /// Mark the current lap as did-not-finish and capture it
    Dnf,

    /// Reopen a finished race in the paused state
    Resume,

    /// Count an off-track reset against the current lap
    OffTrack {
        #[arg(long, value_enum, default_value_t = Source::Sensor)]
        source: Source,
    },

    /// Stage the racer for the next race
    Select {
        /// Stable racer identifier
        #[arg(long)]
        id: String,

        /// Name shown on the overlay
        #[arg(long)]
        name: String,
    },

    /// Print the current race snapshot
    Snapshot,

    /// Check daemon health
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Operator,
    Sensor,
}

impl From<Source> for EventSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Operator => EventSource::Operator,
            Source::Sensor => EventSource::Sensor,
        }
    }
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match action_for(cli.command) {
        Action::Health => daemon_client::get_health(),
        Action::Snapshot => daemon_client::get_snapshot().and_then(to_json),
        Action::Event(event_type, source, racer) => {
            daemon_client::send_event(event_type, source, racer).and_then(to_json)
        }
    };

    match result {
        Ok(value) => print_json(&value, cli.compact),
        Err(err) => {
            tracing::error!(error = %err, "tk request failed");
            eprintln!("tk: {}", err);
            std::process::exit(1);
        }
    }
}

#[derive(Debug, PartialEq)]
enum Action {
    Event(EventType, EventSource, Option<Racer>),
    Snapshot,
    Health,
}

fn action_for(command: Commands) -> Action {
    let operator = EventSource::Operator;
    match command {
        Commands::Toggle { source } => Action::Event(EventType::Toggle, source.into(), None),
        Commands::End => Action::Event(EventType::End, operator, None),
        Commands::Capture => Action::Event(EventType::Capture, operator, None),
        Commands::AutoCapture { source } => {
            Action::Event(EventType::AutoCapture, source.into(), None)
        }
        Commands::Dnf => Action::Event(EventType::DidNotFinish, operator, None),
        Commands::Resume => Action::Event(EventType::Resume, operator, None),
        Commands::OffTrack { source } => Action::Event(EventType::OffTrack, source.into(), None),
        Commands::Select { id, name } => Action::Event(
            EventType::SelectRacer,
            operator,
            Some(Racer {
                id,
                display_name: name,
            }),
        ),
        Commands::Snapshot => Action::Snapshot,
        Commands::Health => Action::Health,
    }
}

fn to_json(snapshot: Snapshot) -> Result<serde_json::Value, ClientError> {
    serde_json::to_value(snapshot)
        .map_err(|err| ClientError::Malformed(format!("Failed to encode snapshot: {}", err)))
}

fn print_json(value: &serde_json::Value, compact: bool) {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(err) => {
            eprintln!("tk: failed to render output: {}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn auto_capture_defaults_to_sensor_source() {
        let cli = Cli::try_parse_from(["tk", "auto-capture"]).expect("parse");
        assert_eq!(
            action_for(cli.command),
            Action::Event(EventType::AutoCapture, EventSource::Sensor, None)
        );
    }

    #[test]
    fn select_builds_racer() {
        let cli = Cli::try_parse_from(["tk", "select", "--id", "r-7", "--name", "Seven"])
            .expect("parse");
        assert_eq!(
            action_for(cli.command),
            Action::Event(
                EventType::SelectRacer,
                EventSource::Operator,
                Some(Racer {
                    id: "r-7".to_string(),
                    display_name: "Seven".to_string(),
                })
            )
        );
    }

    #[test]
    fn dnf_maps_to_did_not_finish() {
        let cli = Cli::try_parse_from(["tk", "dnf"]).expect("parse");
        assert_eq!(
            action_for(cli.command),
            Action::Event(EventType::DidNotFinish, EventSource::Operator, None)
        );

        let cli = Cli::try_parse_from(["tk", "snapshot", "--compact"]).expect("parse");
        assert!(cli.compact);
        assert_eq!(action_for(cli.command), Action::Snapshot);
    }
}
