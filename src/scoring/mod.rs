//! Scoring of synthesised puzzles against their reference: fixed feature
//! encoders for worlds, goals and constraints, a weighted mean-squared
//! distance, and quartile-based selection for human consumption.

use crate::domain::grid::{self, Side};
use crate::domain::{
    program_distance, CodeConstraints, Goal, ItemName, MarkerColour, ObjectiveKind, Puzzle,
    PuzzleRecord, ReferenceTask, World,
};
use ndarray::Array1;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use strum::IntoEnumIterator;

const ITEM_NAME_FEATURES: [ItemName; 6] = [
    ItemName::Strawberry,
    ItemName::Lemon,
    ItemName::Circle,
    ItemName::Rectangle,
    ItemName::Triangle,
    ItemName::Cross,
];

fn bit(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn mse(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let diff = a - b;
    diff.mapv(|x| x * x).mean().unwrap_or(0.0)
}

/// Dense per-tile features on a `padding x padding` canvas plus the
/// turtle's one-hot heading and position. The visual axis of the score.
pub fn world_visual_vector(world: &World, padding: usize) -> Array1<f64> {
    use crate::domain::ItemColour;
    let colours: Vec<ItemColour> = ItemColour::iter().collect();
    let marker_colours: Vec<MarkerColour> = MarkerColour::iter().collect();
    let channels = 6 + ITEM_NAME_FEATURES.len() + colours.len() + 4 + marker_colours.len() * 4;

    let mut features = vec![0.0; channels * padding * padding];
    for y in 0..world.rows.min(padding) {
        for x in 0..world.cols.min(padding) {
            let i = grid::yx2i(y, x, world.cols);
            let cell = grid::yx2i(y, x, padding) * channels;
            let tile = world.tile(i);
            let mut channel = cell;

            if tile.exist {
                for side in [Side::Top, Side::Right, Side::Bottom, Side::Left] {
                    features[channel] = bit(tile.walls.get(side));
                    channel += 1;
                }
                features[channel] = bit(tile.allowed);
                features[channel + 1] = bit(tile.exist);
            } else {
                channel += 4;
            }
            channel = cell + 6;

            if let Some(item) = world.item(i) {
                for name in ITEM_NAME_FEATURES {
                    features[channel] = bit(item.name == name);
                    channel += 1;
                }
                for colour in &colours {
                    features[channel] = bit(item.colour == *colour);
                    channel += 1;
                }
                for count in 1..=4u8 {
                    features[channel] = bit(item.count == count);
                    channel += 1;
                }
            } else {
                channel += ITEM_NAME_FEATURES.len() + colours.len() + 4;
            }

            let marker = world.marker(i);
            for colour in &marker_colours {
                for side in [Side::Top, Side::Right, Side::Bottom, Side::Left] {
                    features[channel] = bit(marker.get(side) == Some(*colour));
                    channel += 1;
                }
            }
        }
    }

    // turtle heading and position
    let mut turtle = vec![0.0; 4 + padding * padding];
    turtle[world.turtle.dir.index()] = 1.0;
    let position = grid::yx2i(world.turtle.y as usize, world.turtle.x as usize, world.cols);
    if position < padding * padding {
        turtle[4 + position] = 1.0;
    }
    features.extend(turtle);
    Array1::from(features)
}

/// Normalised conceptual statistics: shape, colour, fruit and marker
/// variety, counting, wall and forbidden-area density.
pub fn world_stats_vector(world: &World) -> Array1<f64> {
    let stats = world.stats();
    let tiles = (world.rows * world.cols) as f64;
    Array1::from(vec![
        stats.shapes_used.len() as f64 / 4.0,
        stats.colours_used.len() as f64 / 9.0,
        stats.item_classes_used.len() as f64 / 3.0,
        bit(stats.use_count),
        stats.pen_colours_used.len() as f64 / 9.0,
        stats.n_walls as f64 / (tiles * 4.0),
        stats.n_forbidden as f64 / tiles,
    ])
}

pub fn goal_vector(goal: &Goal) -> Array1<f64> {
    let mut features = vec![0.0; 7];
    for objective in &goal.objectives {
        let index = match objective.kind {
            ObjectiveKind::Find => 0,
            ObjectiveKind::Forbid => 1,
            ObjectiveKind::FindOnly => 2,
            ObjectiveKind::Sum => 3,
            ObjectiveKind::Concat => 4,
            ObjectiveKind::CollectAll => 5,
            ObjectiveKind::Draw => 6,
        };
        features[index] += 1.0;
    }
    Array1::from(features)
}

pub fn constraint_vector(constraints: &CodeConstraints) -> Array1<f64> {
    Array1::from(vec![
        constraints.exactly.len() as f64 / 3.0,
        constraints.at_most.len() as f64 / 3.0,
        constraints.start_by.len() as f64 / 3.0,
    ])
}

/// Walls between two allowed, existing tiles; preferred low.
pub fn standalone_wall_count(world: &World) -> usize {
    let mut count = 0;
    for i in 0..world.rows * world.cols {
        for side in Side::ALL {
            if !world.tile(i).walls.get(side) {
                continue;
            }
            if let Some(j) = grid::neighbour(i, world.rows, world.cols, side) {
                if world.tile(i).allowed && world.tile(j).allowed {
                    count += 1;
                }
            }
        }
    }
    count
}

/// The core score: visually distant but conceptually close puzzles rank
/// high; standalone walls discount the result.
pub fn puzzle_score(reference: &Puzzle, candidate: &Puzzle) -> f64 {
    let padding = reference
        .world
        .rows
        .max(reference.world.cols)
        .max(candidate.world.rows)
        .max(candidate.world.cols);
    let visual = mse(
        &world_visual_vector(&reference.world, padding),
        &world_visual_vector(&candidate.world, padding),
    );
    let concept = mse(
        &world_stats_vector(&reference.world),
        &world_stats_vector(&candidate.world),
    );
    let goal = mse(&goal_vector(&reference.goal), &goal_vector(&candidate.goal));
    let constraints = mse(
        &constraint_vector(&reference.constraints),
        &constraint_vector(&candidate.constraints),
    );
    let walls = standalone_wall_count(&candidate.world) as f64;
    (visual - (concept + goal + constraints)) * (100.0 - walls) / 100.0
}

/// The full ranking score of an output record, code distance included.
pub fn record_score(reference: &ReferenceTask, record: &PuzzleRecord) -> f64 {
    let reference_puzzle = Puzzle::new(
        reference.world.clone(),
        reference.goal.clone(),
        reference.constraints.clone(),
    );
    let task_score = puzzle_score(&reference_puzzle, &record.puzzle);
    let code_distance = program_distance(&reference.program, &record.program) as f64;
    let max_blocks = reference
        .program
        .total_blocks()
        .max(record.program.total_blocks())
        .max(1) as f64;
    task_score + 0.1 * code_distance / max_blocks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum Selection {
    TopK,
    Sample,
}

/// Rank records, bucket them into score quartiles (1 low to 4 high) and
/// pick `n` from the requested bucket.
pub fn select_records(
    reference: &ReferenceTask,
    records: Vec<PuzzleRecord>,
    quartile: u8,
    selection: Selection,
    n: usize,
    rng: &mut StdRng,
) -> Vec<(f64, PuzzleRecord)> {
    let mut scored: Vec<(f64, PuzzleRecord)> = records
        .into_iter()
        .map(|record| (record_score(reference, &record), record))
        .collect();
    scored.sort_by_key(|(score, _)| std::cmp::Reverse(OrderedFloat(*score)));
    if scored.is_empty() {
        return vec![];
    }

    let mut scores: Vec<f64> = scored.iter().map(|(score, _)| *score).collect();
    scores.sort_by_key(|score| OrderedFloat(*score));
    let percentile = |p: f64| -> f64 {
        let rank = p * (scores.len() - 1) as f64;
        let low = rank.floor() as usize;
        let high = rank.ceil() as usize;
        let fraction = rank - low as f64;
        scores[low] * (1.0 - fraction) + scores[high] * fraction
    };
    let (lower, upper) = match quartile {
        1 => (f64::NEG_INFINITY, percentile(0.25)),
        2 => (percentile(0.25), percentile(0.5)),
        3 => (percentile(0.5), percentile(0.75)),
        _ => (percentile(0.75), f64::INFINITY),
    };

    let mut bucket: Vec<(f64, PuzzleRecord)> = scored
        .into_iter()
        .filter(|(score, _)| *score >= lower && *score <= upper)
        .collect();
    match selection {
        Selection::TopK => bucket.truncate(n),
        Selection::Sample => {
            bucket.shuffle(rng);
            bucket.truncate(n);
        }
    }
    bucket
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConstraintKey, Item, ItemColour};
    use crate::test_utils::{find_red_strawberry_goal, open_world, open_world_3x3};
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    fn puzzle_with_item(at: usize) -> Puzzle {
        let mut world = open_world_3x3();
        world.items[at] = Some(Item::new(ItemName::Strawberry, ItemColour::Red, 1));
        let mut constraints = CodeConstraints::default();
        constraints.exactly.insert(ConstraintKey::Fd, 2);
        Puzzle::new(world, find_red_strawberry_goal(), constraints)
    }

    #[test]
    fn identical_puzzles_score_zero() {
        let puzzle = puzzle_with_item(5);
        assert_approx_eq!(puzzle_score(&puzzle, &puzzle), 0.0);
    }

    #[test]
    fn moved_items_increase_the_visual_distance() {
        let reference = puzzle_with_item(5);
        let moved = puzzle_with_item(2);
        assert!(puzzle_score(&reference, &moved) > 0.0);
    }

    #[test]
    fn standalone_walls_are_counted_per_face() {
        let mut world = open_world(3, 3, 0, 0, crate::domain::Direction::East);
        world.tiles[4].walls.set(Side::Right, true);
        world.tiles[5].walls.set(Side::Left, true);
        // one wall, mirrored on two faces
        assert_eq!(standalone_wall_count(&world), 2);
    }

    #[test]
    fn walls_next_to_forbidden_tiles_are_not_standalone() {
        let mut world = open_world(3, 3, 0, 0, crate::domain::Direction::East);
        world.tiles[4].walls.set(Side::Right, true);
        world.tiles[5].walls.set(Side::Left, true);
        world.tiles[5].allowed = false;
        assert_eq!(standalone_wall_count(&world), 0);
    }

    #[test]
    fn top_quartile_selection_returns_the_best() {
        let dir = tempfile::tempdir().unwrap();
        crate::test_utils::write_reference_assets(dir.path());
        let reference = crate::domain::ReferenceAssets::load(dir.path())
            .unwrap()
            .reference_task("1")
            .unwrap();

        let program = reference.program.clone();
        let records: Vec<PuzzleRecord> = [5usize, 2, 8]
            .iter()
            .map(|at| PuzzleRecord {
                puzzle: puzzle_with_item(*at),
                program: program.clone(),
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(0);
        let picked = select_records(&reference, records, 4, Selection::TopK, 2, &mut rng);
        assert!(picked.len() <= 2);
        assert!(!picked.is_empty());
        for window in picked.windows(2) {
            assert!(window[0].0 >= window[1].0);
        }
    }
}
