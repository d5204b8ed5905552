//! Terminal visualizer.
//!
//! Keeps the latest state per entity and prints either one line per
//! delivered state (verbose mode) or a redrawn summary table for batch
//! deliveries.

use fusion_core::error::FusionError;
use fusion_core::interfaces::OutputConsumer;
use fusion_core::types::{EntityId, FusedEntityState, Position, Velocity};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Mutex;

const HEADER_RULE: &str =
    "═══════════════════════════════════════════════════════════════════════════";
const ROW_RULE: &str =
    "───────────────────────────────────────────────────────────────────────────";

pub struct CliVisualizer {
    use_colors: bool,
    verbose: bool,
    latest: Mutex<HashMap<EntityId, FusedEntityState>>,
}

impl CliVisualizer {
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            verbose: false,
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Print one line per delivered state instead of only tracking it.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Number of entities currently on display.
    pub fn entity_count(&self) -> usize {
        self.latest.lock().expect("display lock poisoned").len()
    }

    fn display_header(&self) {
        let title = "          REAL-TIME MULTI-SENSOR TRACKER";
        if self.use_colors {
            println!("\n{HEADER_RULE}\n\x1b[1m{title}\x1b[0m\n{HEADER_RULE}\n");
        } else {
            println!("\n{HEADER_RULE}\n{title}\n{HEADER_RULE}\n");
        }
    }

    fn display_state(state: &FusedEntityState) {
        println!(
            "[Entity {:>4}] {:<10} | Pos: {} | Vel: {} | Conf: {:>5.1}% | Meas: {:>4}",
            state.entity_id,
            state.entity_kind.to_string(),
            format_position(&state.position),
            format_velocity(&state.velocity),
            state.confidence * 100.0,
            state.measurement_count,
        );
    }

    fn display_summary(&self, states: &[FusedEntityState]) {
        // ANSI clear + home, then redraw
        print!("\x1b[2J\x1b[1;1H");
        self.display_header();

        println!("Active Entities: {}", states.len());
        println!("{ROW_RULE}");
        println!(
            "{:<6}{:<12}{:<30}{:<30}{:<10}{:<8}",
            "ID", "Type", "Position (x,y,z)", "Velocity (vx,vy,vz)", "Conf%", "Meas"
        );
        println!("{ROW_RULE}");
        for state in states {
            println!(
                "{:<6}{:<12}{:<30}{:<30}{:<10.1}{:<8}",
                state.entity_id.to_string(),
                state.entity_kind.to_string(),
                format_position(&state.position),
                format_velocity(&state.velocity),
                state.confidence * 100.0,
                state.measurement_count,
            );
        }
        println!("{HEADER_RULE}");
        let _ = io::stdout().flush();
    }
}

fn format_position(position: &Position) -> String {
    format!(
        "({:>7.1}, {:>7.1}, {:>7.1})",
        position.x, position.y, position.z
    )
}

fn format_velocity(velocity: &Velocity) -> String {
    format!(
        "({:>6.2}, {:>6.2}, {:>6.2})",
        velocity.x, velocity.y, velocity.z
    )
}

impl OutputConsumer for CliVisualizer {
    fn start(&self) -> Result<(), FusionError> {
        self.display_header();
        Ok(())
    }

    fn stop(&self) {}

    fn publish_state(&self, state: &FusedEntityState) {
        let mut latest = self.latest.lock().expect("display lock poisoned");
        latest.insert(state.entity_id, state.clone());
        if self.verbose {
            Self::display_state(state);
        }
    }

    fn publish_states(&self, states: &[FusedEntityState]) {
        let mut latest = self.latest.lock().expect("display lock poisoned");
        for state in states {
            latest.insert(state.entity_id, state.clone());
        }
        drop(latest);
        self.display_summary(states);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
