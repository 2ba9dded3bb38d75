use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, anyhow};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use setu_core::bridge::{HistoryBridge, MemoryHistory};
use setu_core::config::NavConfig;
use setu_core::layer::OverlayLayer;
use setu_core::stack::ScreenNav;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "setu-sim",
    about = "Replays overlay navigation scenarios against the in-memory history bridge"
)]
struct Args {
    #[arg(long, default_value = "crates/setu-sim/scenarios/basic_flow.json")]
    scenario: Vec<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    #[serde(default = "default_context")]
    context: String,
    steps: Vec<Step>,
}

fn default_context() -> String {
    "home".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Open { overlay: String },
    Close,
    Back,
    Switch { context: String },
    ExpectStack { tokens: Vec<String> },
    ExpectClosed { overlays: Vec<String> },
    ExpectMarkers { count: usize },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let config = NavConfig::load(args.config.as_deref())?;
    let scenarios = load_scenarios(&args.scenario)?;
    if scenarios.is_empty() {
        return Err(anyhow!("no scenarios loaded"));
    }

    let mut failed = 0_usize;
    let total = scenarios.len();

    for scenario in scenarios {
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
        let violations = run_scenario(&scenario, &config);

        println!("Scenario: {}", scenario.name);
        if violations.is_empty() {
            println!("  ok ({} steps)", scenario.steps.len());
        } else {
            failed += 1;
            for violation in &violations {
                println!("  violation: {violation}");
            }
        }
    }

    println!(
        "\n{} of {} scenarios passed ({})",
        total - failed,
        total,
        Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
    );

    if failed > 0 {
        return Err(anyhow!("{failed} of {total} scenarios failed"));
    }
    Ok(())
}

struct SimScreen {
    history: Rc<MemoryHistory>,
    nav: Rc<RefCell<ScreenNav>>,
    layers: Rc<RefCell<BTreeMap<String, OverlayLayer>>>,
    closed: Rc<RefCell<Vec<String>>>,
}

impl SimScreen {
    fn new(context: &str, config: &NavConfig) -> Self {
        Self {
            history: MemoryHistory::new(config),
            nav: Rc::new(RefCell::new(ScreenNav::new(context, config))),
            layers: Rc::new(RefCell::new(BTreeMap::new())),
            closed: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn open(&self, token: &str) -> Result<(), String> {
        if self.layers.borrow().contains_key(token) {
            return Err(format!("overlay {token} is already open"));
        }

        self.nav.borrow_mut().push(token);

        let nav = self.nav.clone();
        let layers = self.layers.clone();
        let closed = self.closed.clone();
        let own = token.to_string();
        let layer = OverlayLayer::with_close(
            self.history.clone(),
            Rc::new(move || {
                nav.borrow_mut().pop();
                closed.borrow_mut().push(own.clone());
                layers.borrow_mut().remove(&own);
            }),
        );
        layer.sync(true);
        self.layers.borrow_mut().insert(token.to_string(), layer);
        Ok(())
    }

    fn close_top(&self) -> Result<(), String> {
        let Some(token) = self.nav.borrow_mut().pop() else {
            return Err("close requested with no overlay open".to_string());
        };
        if let Some(layer) = self.layers.borrow_mut().remove(&token) {
            layer.sync(false);
        }
        self.closed.borrow_mut().push(token);
        Ok(())
    }

    fn back(&self) {
        self.history.go_back();
    }

    fn switch_context(&self, context: &str) {
        let layers = self.layers.clone();
        let closed = self.closed.clone();
        self.nav.borrow_mut().switch_context(context, |token| {
            if let Some(layer) = layers.borrow_mut().remove(token) {
                layer.sync(false);
            }
            closed.borrow_mut().push(token.to_string());
        });
    }

    fn tokens(&self) -> Vec<String> {
        self.nav.borrow().stack().tokens().to_vec()
    }

    fn closed_log(&self) -> Vec<String> {
        self.closed.borrow().clone()
    }

    fn check_parity(&self) -> Option<String> {
        let markers = self.history.active_marker_count();
        let overlays = self.layers.borrow().len();
        if markers != overlays {
            return Some(format!(
                "marker/overlay parity broken: {markers} pending markers vs {overlays} open overlays"
            ));
        }
        None
    }
}

fn run_scenario(scenario: &Scenario, config: &NavConfig) -> Vec<String> {
    let screen = SimScreen::new(&scenario.context, config);
    let mut violations = Vec::new();

    for (idx, step) in scenario.steps.iter().enumerate() {
        debug!(index = idx + 1, ?step, "applying step");
        let result = match step {
            Step::Open { overlay } => screen.open(overlay),
            Step::Close => screen.close_top(),
            Step::Back => {
                screen.back();
                Ok(())
            }
            Step::Switch { context } => {
                screen.switch_context(context);
                Ok(())
            }
            Step::ExpectStack { tokens } => {
                let actual = screen.tokens();
                if &actual == tokens {
                    Ok(())
                } else {
                    Err(format!("expected stack {tokens:?}, found {actual:?}"))
                }
            }
            Step::ExpectClosed { overlays } => {
                let actual = screen.closed_log();
                if &actual == overlays {
                    Ok(())
                } else {
                    Err(format!("expected closed log {overlays:?}, found {actual:?}"))
                }
            }
            Step::ExpectMarkers { count } => {
                let actual = screen.history.active_marker_count();
                if actual == *count {
                    Ok(())
                } else {
                    Err(format!("expected {count} pending markers, found {actual}"))
                }
            }
        };

        if let Err(violation) = result {
            warn!(step = idx + 1, violation = %violation, "step violated expectations");
            violations.push(format!("step {}: {violation}", idx + 1));
        }

        if let Some(violation) = screen.check_parity() {
            violations.push(format!("after step {}: {violation}", idx + 1));
        }
    }

    violations
}

fn load_scenarios(paths: &[PathBuf]) -> anyhow::Result<Vec<Scenario>> {
    let mut out = Vec::new();

    for path in paths {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        out.push(scenario);
    }

    Ok(out)
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))
        .map_err(|e| anyhow!("invalid log level: {e}"))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    Ok(())
}
