use std::io::Write;

use clap::{Parser, ValueEnum};
use three_chess::{
    Agent, Board, BoardView, Color, DeepeningAgent, EngineError, Position,
};

const INSTRUCTIONS: &str = "\
    Please enter your move as two squares separated by a space:\n    \
      <from> <to>\n      \
      A square is a segment letter (B, G or R), a file letter (a-h),\n      \
      and a rank number (1-4). Rank 1 is the segment's back rank and\n      \
      rank 4 touches the centre of the board.\n  \
      Example: \"Be2 Be4\" pushes Blue's e-pawn two squares.\n\
";

/// Arguments to the engine
#[derive(Parser, Debug)]
#[command(
    name = "Three Chess - Engine",
    about = "Play three-player chess against the engine on the console."
)]
struct Cli {
    /// The color the human plays; the engine plays the other two
    #[arg(short = 'c', long, default_value = "blue")]
    human_color: ArgColor,
    /// The engine strategy
    #[arg(short, long, default_value = "maximax")]
    strategy: ArgStrategy,
    /// The clock for each side in milliseconds (0 for untimed)
    #[arg(short, long, default_value = "0")]
    timeout: u64,
    /// The per-turn thinking time in seconds for untimed games
    #[arg(long, default_value = "4")]
    think_seconds: u64,
    /// Whether to prevent the game board and prompts from being printed
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Copy, Clone, Debug)]
enum ArgColor {
    Blue,
    Green,
    Red,
}

impl ArgColor {
    fn to_color(self) -> Color {
        match self {
            ArgColor::Blue => Color::Blue,
            ArgColor::Green => Color::Green,
            ArgColor::Red => Color::Red,
        }
    }
}

#[derive(ValueEnum, Copy, Clone, Debug)]
enum ArgStrategy {
    Maximax,
    Minimax,
    Quiescence,
    Rq,
    Pvs,
}

impl ArgStrategy {
    fn build(self, think_seconds: u64) -> DeepeningAgent {
        use three_chess::agent::StrategyKind::*;
        let kind = match self {
            ArgStrategy::Maximax => Maximax,
            ArgStrategy::Minimax => Minimax,
            ArgStrategy::Quiescence => Quiescence,
            ArgStrategy::Rq => RestrictedQuiescence,
            ArgStrategy::Pvs => PrincipalVariation,
        };
        DeepeningAgent::with_time_limit(
            kind,
            three_chess::CombinedParams::default_tuned(),
            think_seconds,
        )
    }
}

fn parse_square(text: &str) -> Result<Position, EngineError> {
    let invalid = || EngineError::ImpossiblePosition {
        detail: format!("cannot parse square {:?}", text),
    };
    let mut chars = text.chars();
    let color = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('B') => Color::Blue,
        Some('G') => Color::Green,
        Some('R') => Color::Red,
        _ => return Err(invalid()),
    };
    let col = match chars.next() {
        Some(file @ 'a'..='h') => file as usize - 'a' as usize,
        _ => return Err(invalid()),
    };
    let row = match chars.next().and_then(|c| c.to_digit(10)) {
        Some(rank @ 1..=4) => rank as usize - 1,
        _ => return Err(invalid()),
    };
    if chars.next().is_some() {
        return Err(invalid());
    }
    Position::new(color, row, col).ok_or_else(invalid)
}

fn read_human_move(board: &Board, quiet: bool) -> (Position, Position) {
    loop {
        if !quiet {
            print!("Enter your move: ");
            std::io::stdout().flush().unwrap();
        }
        let mut input = String::new();
        std::io::stdin().read_line(&mut input).unwrap();
        let parts: Vec<&str> = input.trim().split(' ').filter(|p| !p.is_empty()).collect();
        let squares = if parts.len() == 2 {
            parse_square(parts[0]).and_then(|from| parse_square(parts[1]).map(|to| (from, to)))
        } else {
            Err(EngineError::ImpossiblePosition {
                detail: "expected two squares".into(),
            })
        };
        let Ok((from, to)) = squares else {
            println!("Invalid input.");
            println!("{}", INSTRUCTIONS);
            continue;
        };
        if !board.is_legal_move(from, to) {
            println!("Illegal move.");
            println!("{}", INSTRUCTIONS);
            continue;
        }
        return (from, to);
    }
}

fn main() {
    let cli = Cli::parse();
    let human = cli.human_color.to_color();

    let mut engines: Vec<(Color, DeepeningAgent)> = three_chess::ALL_COLORS
        .iter()
        .filter(|&&color| color != human)
        .map(|&color| (color, cli.strategy.build(cli.think_seconds)))
        .collect();

    let mut board = Board::initial(cli.timeout);

    while board.game_over().is_none() {
        let turn = board.turn();
        let (from, to) = if turn == human {
            if !cli.quiet {
                println!("{}", board);
            }
            read_human_move(&board, cli.quiet)
        } else {
            let agent = engines
                .iter_mut()
                .find(|(color, _)| *color == turn)
                .map(|(_, agent)| agent)
                .expect("an engine plays every non-human color");
            match agent.play_move(&board) {
                Ok(endpoints) => endpoints,
                Err(error) => {
                    eprintln!("engine failed to move: {}", error);
                    return;
                }
            }
        };

        if let Err(error) = board.apply(from, to) {
            eprintln!("move rejected: {}", error);
            return;
        }
        if turn != human {
            println!("{} played: {} {}", turn, from, to);
        }
    }

    println!("{}", board);
    if let Some((winner, loser)) = board.game_over() {
        println!("{} wins, {} loses", winner, loser);
    }
}
