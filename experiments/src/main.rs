use std::env;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use three_chess::params::{ParamsFile, EvalParams};
use three_chess::{
    Agent, Board, BoardView, CombinedParams, DeepeningAgent, FixedPlyAgent, GreedyAgent, Logger,
    RandomAgent,
};

const LOG_LEVEL: u8 = 1;

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        None => run_one_game(),
        Some("tournament") => run_tournament(),
        Some("genetic") => run_genetic_algorithm(),
        Some(_) => eprintln!("Unknown arguments {:?}", &args[1..]),
    }
}

#[derive(Clone, Copy, Default, Debug)]
struct AgentStats {
    wins: u32,
    losses: u32,
    draws: u32,
}

impl AgentStats {
    fn score(&self) -> i64 {
        self.wins as i64 - self.losses as i64
    }
}

/// Plays one game between three agents seated as Blue, Green and Red.
/// Returns the seat indices of the winner and loser, or None on a draw.
/// Running out of clock or failing to produce a legal move loses.
fn play_game(
    agents: &mut [Box<dyn Agent>],
    time_limit_ms: u64,
    max_turns: u32,
    display: bool,
) -> Option<(usize, usize)> {
    let mut board = Board::initial(time_limit_ms);

    while board.game_over().is_none() && board.move_count() < max_turns {
        let turn = board.turn();
        let seat = turn.to_index();

        let start = Instant::now();
        let decision = agents[seat].play_move(&board);
        if time_limit_ms > 0 {
            board.deduct_time(turn, start.elapsed().as_millis() as u64);
            if board.out_of_time(turn) {
                board.declare_result(turn.next(), turn);
                break;
            }
        }

        let applied = decision.and_then(|(from, to)| board.apply(from, to).map(|_| (from, to)));
        match applied {
            Ok((from, to)) => {
                if display {
                    println!("{} [{}] played {} {}", turn, agents[seat].name(), from, to);
                    println!("{}", board);
                }
            }
            Err(_) => {
                board.declare_result(turn.next(), turn);
                break;
            }
        }
    }

    board
        .game_over()
        .map(|(winner, loser)| (winner.to_index(), loser.to_index()))
}

/// The standard roster: both baselines and every deepening strategy.
fn standard_roster() -> Vec<Box<dyn Agent>> {
    vec![
        Box::new(RandomAgent::new()) as Box<dyn Agent>,
        Box::new(GreedyAgent::new()),
        Box::new(DeepeningAgent::maximax()),
        Box::new(DeepeningAgent::quiescence()),
        Box::new(DeepeningAgent::restricted_quiescence()),
        Box::new(DeepeningAgent::principal_variation()),
        Box::new(DeepeningAgent::minimax()),
    ]
}

/// Spreads `num_games` random three-seat pairings from the roster across
/// worker threads and returns per-roster-slot statistics.
fn run_concurrent_matches(
    make_roster: Arc<dyn Fn() -> Vec<Box<dyn Agent>> + Send + Sync>,
    num_games: u32,
    time_limit_ms: u64,
    max_turns: u32,
    threads: u32,
) -> Vec<AgentStats> {
    let roster_len = make_roster().len();
    assert!(roster_len >= 3, "need at least three agents");
    let tallies = Arc::new(Mutex::new(vec![AgentStats::default(); roster_len]));

    let mut handles = Vec::new();
    for thread_index in 0..threads {
        let make_roster = Arc::clone(&make_roster);
        let tallies = Arc::clone(&tallies);
        let games = num_games / threads + u32::from(thread_index < num_games % threads);

        handles.push(thread::spawn(move || {
            let mut logger = Logger::new(LOG_LEVEL);
            let mut rng = StdRng::from_entropy();
            let roster = make_roster();

            for _ in 0..games {
                // Seat three distinct roster members.
                let mut slots: Vec<usize> = (0..roster.len()).collect();
                slots.shuffle(&mut rng);
                slots.truncate(3);
                let mut seated: Vec<Box<dyn Agent>> =
                    slots.iter().map(|&slot| roster[slot].clone_agent()).collect();

                logger.time_start(2, "single match time");
                let result = play_game(&mut seated, time_limit_ms, max_turns, false);
                logger.time_end(2, "single match time");

                let mut tallies = tallies.lock().unwrap();
                match result {
                    Some((winner_seat, loser_seat)) => {
                        tallies[slots[winner_seat]].wins += 1;
                        tallies[slots[loser_seat]].losses += 1;
                        let third_seat = 3 - winner_seat - loser_seat;
                        tallies[slots[third_seat]].draws += 1;
                    }
                    None => {
                        for &slot in &slots {
                            tallies[slot].draws += 1;
                        }
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    Arc::try_unwrap(tallies)
        .expect("all workers joined")
        .into_inner()
        .unwrap()
}

fn run_one_game() {
    let mut rng = StdRng::from_entropy();
    let roster = standard_roster();
    let mut slots: Vec<usize> = (0..roster.len()).collect();
    slots.shuffle(&mut rng);
    slots.truncate(3);
    let mut seated: Vec<Box<dyn Agent>> =
        slots.iter().map(|&slot| roster[slot].clone_agent()).collect();
    for (seat, agent) in seated.iter().enumerate() {
        println!("{} plays {}", three_chess::Color::from_index(seat), agent.name());
    }

    match play_game(&mut seated, 10_000, 500, true) {
        Some((winner, loser)) => println!(
            "{} wins, {} loses",
            seated[winner].name(),
            seated[loser].name()
        ),
        None => println!("drawn"),
    }
}

fn run_tournament() {
    let num_games = 100;
    let threads = thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(4);
    let stats = run_concurrent_matches(
        Arc::new(standard_roster),
        num_games,
        10_000,
        500,
        threads,
    );

    let names: Vec<String> = standard_roster()
        .iter()
        .map(|agent| agent.name().to_string())
        .collect();
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by_key(|&index| -stats[index].score());

    println!("\nTournament results over {} games:", num_games);
    for index in order {
        let s = &stats[index];
        println!(
            "  {:<24} score {:>4}  ({} wins, {} losses, {} draws)",
            names[index],
            s.score(),
            s.wins,
            s.losses,
            s.draws
        );
    }
}

const POPULATION_SIZE: usize = 20;
const GAMES_PER_AGENT: u32 = 10;
const KEEP_RATIO: f64 = 0.2;
const MUTATE_RATIO: f64 = 0.8;
const TUNING_PLY: usize = 3;
const CYCLES: u32 = 50;

struct Individual {
    file: ParamsFile,
    consecutive_keeps: u32,
}

impl Individual {
    fn from_params(file: ParamsFile) -> Individual {
        Individual {
            file,
            consecutive_keeps: 0,
        }
    }

    fn random(rng: &mut impl Rng) -> Individual {
        Individual::from_params(ParamsFile {
            start: EvalParams::random(rng),
            end: EvalParams::random(rng),
        })
    }

    fn mutate(one: &ParamsFile, two: &ParamsFile, rng: &mut impl Rng) -> Individual {
        Individual::from_params(ParamsFile {
            start: EvalParams::mutate(&one.start, &two.start, rng),
            end: EvalParams::mutate(&one.end, &two.end, rng),
        })
    }
}

/// Evolves evaluation parameters by playing the population against
/// itself: rank by tournament score, keep the best, cross the middle
/// band with the keepers, and refill the tail randomly.
fn run_genetic_algorithm() {
    let mut rng = StdRng::from_entropy();
    let keep = (POPULATION_SIZE as f64 * KEEP_RATIO) as usize;
    let mutate = (POPULATION_SIZE as f64 * MUTATE_RATIO) as usize;

    let default_file = CombinedParams::default_tuned().to_file();
    let mut population: Vec<Individual> = (0..POPULATION_SIZE)
        .map(|index| {
            if index < keep {
                Individual::from_params(default_file.clone())
            } else if index < mutate {
                let random = Individual::random(&mut rng);
                Individual::mutate(&default_file, &random.file, &mut rng)
            } else {
                Individual::random(&mut rng)
            }
        })
        .collect();

    let threads = thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(4);

    for cycle in 1..=CYCLES {
        let files: Vec<ParamsFile> = population.iter().map(|ind| ind.file.clone()).collect();
        let make_roster: Arc<dyn Fn() -> Vec<Box<dyn Agent>> + Send + Sync> = {
            let files = files.clone();
            Arc::new(move || {
                files
                    .iter()
                    .enumerate()
                    .map(|(index, file)| {
                        let params = CombinedParams::from_file(file.clone())
                            .expect("population parameters stay in range");
                        Box::new(FixedPlyAgent::new(
                            format!("tuning-{}", index),
                            TUNING_PLY,
                            params,
                        )) as Box<dyn Agent>
                    })
                    .collect()
            })
        };

        let num_games = GAMES_PER_AGENT * POPULATION_SIZE as u32;
        let stats = run_concurrent_matches(make_roster, num_games, 300_000, 4 * 99, threads);

        let mut order: Vec<usize> = (0..POPULATION_SIZE).collect();
        order.sort_by_key(|&index| -stats[index].score());

        let mut next: Vec<Individual> = Vec::with_capacity(POPULATION_SIZE);
        for (rank, &index) in order.iter().enumerate() {
            if rank < keep {
                let mut kept = Individual::from_params(population[index].file.clone());
                kept.consecutive_keeps = population[index].consecutive_keeps + 1;
                next.push(kept);
            } else if rank < mutate {
                let keeper = &population[order[rng.gen_range(0..keep)]];
                next.push(Individual::mutate(
                    &population[index].file,
                    &keeper.file,
                    &mut rng,
                ));
            } else {
                next.push(Individual::random(&mut rng));
            }
        }
        population = next;

        let best = population
            .iter()
            .max_by_key(|ind| ind.consecutive_keeps)
            .expect("population is non-empty");
        println!(
            "\nCycle {}: best agent kept {} times\n\tstart: {:?}\n\tend: {:?}",
            cycle, best.consecutive_keeps, best.file.start, best.file.end
        );
    }

    let best = population
        .iter()
        .max_by_key(|ind| ind.consecutive_keeps)
        .expect("population is non-empty");
    let json = serde_json::to_string_pretty(&best.file).expect("parameters serialize");
    std::fs::write("best-params.json", json).expect("write best-params.json");
    println!("Wrote the strongest parameters to best-params.json");
}
