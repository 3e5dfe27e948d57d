use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::sensing::SimulatedPresence;
use crate::timer::{commands::HELP, OperatorCommand, Phase, SessionController, TimerSnapshot};

/// One status line for the terminal.
pub fn render(snapshot: &TimerSnapshot) -> String {
    let phase = match snapshot.clock.phase {
        Phase::Work => "work ",
        Phase::Break => "break",
    };
    let status = if snapshot.clock.running {
        "running"
    } else if snapshot.presence_enabled && snapshot.clock.phase == Phase::Work {
        "waiting for you"
    } else {
        "paused"
    };
    format!(
        "[{color:>7}] {display:>6} {phase} {status:<15} work {work} ({work_pct:>3.0}%) / break {brk} ({break_pct:>3.0}%)",
        color = snapshot.color_hint,
        display = snapshot.display,
        work = snapshot.counters.work_intervals_completed,
        work_pct = snapshot.work_progress * 100.0,
        brk = snapshot.counters.break_intervals_completed,
        break_pct = snapshot.break_progress * 100.0,
    )
}

/// Prints snapshots as they change and feeds stdin lines to the controller
/// until the operator quits or stdin closes.
pub async fn run_console(
    controller: SessionController,
    sensor: Option<Arc<SimulatedPresence>>,
) -> Result<()> {
    let mut snapshots = controller.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{HELP}");
    println!("{}", render(&snapshots.borrow_and_update()));

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = render(&snapshots.borrow_and_update());
                println!("{line}");
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read operator input")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match line.parse::<OperatorCommand>() {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{err}");
                        continue;
                    }
                };

                match command {
                    OperatorCommand::Quit => break,
                    OperatorCommand::Help => println!("{HELP}"),
                    OperatorCommand::SimulatePresence(present) => match &sensor {
                        Some(sensor) => sensor.set_present(present),
                        None => println!("presence sensing is off (--no-camera)"),
                    },
                    command => {
                        command.apply(&controller)?;
                    }
                }
            }
        }
    }

    controller.shutdown().await
}
