use crate::core::io::document::SimulationDocument;
use crate::engine::config::{ConfigError, RunConfig};
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::simulation::{SaveOptions, Simulation};
use crate::engine::systems::halt::Halt;
use crate::engine::transaction::replexer_swap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplicaConfig {
    /// Simulation time each replica runs between exchange attempts, in file units.
    pub interval: f64,
    pub rounds: usize,
    /// Seeds the exchange decisions and, offset by the replica index, each replica.
    pub seed: u64,
}

/// Exchange attempts between two neighbouring rungs of the temperature ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeStatistics {
    pub low: f64,
    pub high: f64,
    pub attempts: u64,
    pub accepted: u64,
}

impl ExchangeStatistics {
    pub fn acceptance_ratio(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicaResult {
    /// Temperature the replica finished at, in file units.
    pub temperature: f64,
    pub document: SimulationDocument,
    pub output: toml::Table,
    pub events: u64,
}

#[derive(Debug, Clone)]
pub struct ReplicaOutcome {
    pub replicas: Vec<ReplicaResult>,
    /// One entry per adjacent pair, ordered from the coldest rung up.
    pub exchanges: Vec<ExchangeStatistics>,
}

/// Metropolis acceptance for swapping the temperatures of two replicas with internal energies
/// `u_i` and `u_j`.
fn acceptance(t_i: f64, u_i: f64, t_j: f64, u_j: f64) -> f64 {
    let exponent = (t_i.recip() - t_j.recip()) * (u_i - u_j);
    exponent.exp().min(1.0)
}

fn pair_mut<T>(items: &mut [T], i: usize, j: usize) -> (&mut T, &mut T) {
    if i < j {
        let (head, tail) = items.split_at_mut(j);
        (&mut head[i], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(i);
        (&mut tail[0], &mut head[j])
    }
}

fn temperature(sim: &Simulation) -> Result<f64, EngineError> {
    sim.state().ensemble.temperature().ok_or_else(|| {
        EngineError::ReplicaExchange(format!(
            "replica samples a {} ensemble; exchanges need a thermostat",
            sim.state().ensemble.name()
        ))
    })
}

/// Replica indices ordered from the coldest to the hottest.
fn ladder(replicas: &[Simulation]) -> Result<Vec<usize>, EngineError> {
    let temperatures = replicas
        .iter()
        .map(temperature)
        .collect::<Result<Vec<_>, _>>()?;
    let mut order: Vec<usize> = (0..replicas.len()).collect();
    order.sort_by(|&a, &b| temperatures[a].total_cmp(&temperatures[b]));
    Ok(order)
}

/// Runs one replica until its halt fires. Returns the events run and whether the halt was
/// reached before the event budget ran out.
fn advance(sim: &mut Simulation, budget: u64) -> Result<(u64, bool), EngineError> {
    let start = sim.state().event_count;
    sim.extend_budget(budget);
    let limit = sim.state().end_event_count;
    while sim.run_simulation_step()? {}
    let count = sim.state().event_count;
    Ok((count - start, count < limit))
}

/// Parallel tempering. Every replica runs for `interval` simulation time, then neighbouring
/// rungs of the temperature ladder attempt to swap, alternating between even and odd pairs
/// each round. The event budget of `config` caps each replica per round.
#[instrument(skip_all, name = "replica_exchange_workflow")]
pub fn run(
    documents: &[SimulationDocument],
    config: &RunConfig,
    replica: &ReplicaConfig,
    reporter: &ProgressReporter,
) -> Result<ReplicaOutcome, EngineError> {
    // === Phase 1: Load replicas ===
    reporter.report(Progress::PhaseStart {
        name: "Initialisation",
    });
    if documents.len() < 2 {
        return Err(ConfigError::InvalidValue {
            field: "replicas".to_string(),
            message: format!("need at least two replicas, got {}", documents.len()),
        }
        .into());
    }
    if !(replica.interval > 0.0 && replica.interval.is_finite()) {
        return Err(ConfigError::InvalidValue {
            field: "interval".to_string(),
            message: format!("must be positive and finite, got {}", replica.interval),
        }
        .into());
    }
    let mut replicas = Vec::with_capacity(documents.len());
    for (index, document) in documents.iter().enumerate() {
        let mut sim = Simulation::from_document(document, config)?;
        sim.reseed(replica.seed.wrapping_add(index as u64 + 1));
        let halt = replica.interval * sim.state().units.time;
        sim.add_system(Box::new(Halt::new("ReplicaHalt", halt)))?;
        sim.initialise()?;
        replicas.push(sim);
    }
    let order = ladder(&replicas)?;
    let mut exchanges = Vec::with_capacity(order.len() - 1);
    for rung in order.windows(2) {
        let low = temperature(&replicas[rung[0]])?;
        let high = temperature(&replicas[rung[1]])?;
        if low == high {
            return Err(ConfigError::InvalidValue {
                field: "replicas".to_string(),
                message: format!("two replicas share the temperature {low}"),
            }
            .into());
        }
        let energy = replicas[rung[0]].state().units.energy();
        exchanges.push(ExchangeStatistics {
            low: low / energy,
            high: high / energy,
            attempts: 0,
            accepted: 0,
        });
    }
    info!(replicas = replicas.len(), rounds = replica.rounds, "Replicas initialised.");
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Exchange rounds ===
    reporter.report(Progress::TaskStart {
        total_steps: replica.rounds as u64,
    });
    let mut rng = ChaCha8Rng::seed_from_u64(replica.seed);
    let mut events = vec![0u64; replicas.len()];
    for round in 0..replica.rounds {
        for (index, sim) in replicas.iter_mut().enumerate() {
            if round > 0 {
                sim.rearm_halt(replica.interval)?;
            }
            let (run, halted) = advance(sim, config.end_event_count)?;
            events[index] += run;
            if !halted {
                warn!(replica = index, round, "Event budget ran out before the exchange interval.");
            }
        }

        let order = ladder(&replicas)?;
        for rung in (round % 2..order.len().saturating_sub(1)).step_by(2) {
            let (i, j) = (order[rung], order[rung + 1]);
            let (t_i, t_j) = (temperature(&replicas[i])?, temperature(&replicas[j])?);
            let (u_i, u_j) = (replicas[i].internal_energy(), replicas[j].internal_energy());
            let probability = acceptance(t_i, u_i, t_j, u_j);
            exchanges[rung].attempts += 1;
            if rng.r#gen::<f64>() < probability {
                let (a, b) = pair_mut(&mut replicas, i, j);
                replexer_swap(a, b)?;
                exchanges[rung].accepted += 1;
            } else {
                debug!(rung, probability, "Replica exchange rejected.");
            }
        }
        reporter.report(Progress::TaskAdvance { steps: 1 });
    }
    reporter.report(Progress::TaskFinish);

    // === Phase 3: Output ===
    reporter.report(Progress::PhaseStart { name: "Output" });
    let mut results = Vec::with_capacity(replicas.len());
    for (sim, events) in replicas.iter_mut().zip(events) {
        sim.finalise()?;
        results.push(ReplicaResult {
            temperature: temperature(sim)? / sim.state().units.energy(),
            document: sim.to_document(SaveOptions {
                apply_boundary: true,
                round: false,
            }),
            output: sim.output_data(),
            events,
        });
    }
    reporter.report(Progress::PhaseFinish);

    for stats in &exchanges {
        info!(
            low = stats.low,
            high = stats.high,
            attempts = stats.attempts,
            ratio = stats.acceptance_ratio(),
            "Exchange statistics."
        );
    }
    Ok(ReplicaOutcome {
        replicas: results,
        exchanges,
    })
}
