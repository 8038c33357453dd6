//! Round Pairing
//!
//! Builds one round of tournament pairings by reducing the pairing problem to a
//! maximum weight perfect matching: every pair of players gets an edge scored by
//! the caller's weight function, an odd field is completed with a zero-weight
//! bye vertex reachable from the current bye candidates, and the matched edges
//! are turned into board assignments with a six-level color decision.
//!

use super::graph::{UndirectedSimpleGraph, WeightedGraph, WeightedView};
use super::solver::get_graph_matching;
use super::util::*;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

/// what the pairing generator needs to know about a player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    /// byes received so far
    #[serde(default)]
    pub byes: u32,
    /// games played as white minus games played as black
    #[serde(default)]
    pub color_diff: i32,
    /// colors of all games played, most recent last
    #[serde(default)]
    pub color_history: Vec<Color>,
    /// colors of games already played on the current day
    #[serde(default)]
    pub todays_colors: Vec<Color>,
}

impl PlayerRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            byes: 0,
            color_diff: 0,
            color_history: vec![],
            todays_colors: vec![],
        }
    }
}

/// one board of a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Matchup {
    Game { white: String, black: String },
    Bye { player: String },
}

/// color preference in [-3, 3]; positive pulls towards white
pub fn color_priority(player: &PlayerRecord) -> i32 {
    // a game already played today forces the other color outright
    if let Some(&color) = player.todays_colors.last() {
        return forced_against(color);
    }
    let history = &player.color_history;
    let streak = history
        .iter()
        .rev()
        .take_while(|&&color| Some(color) == history.last().copied())
        .count();
    if streak >= 2 {
        return forced_against(*history.last().unwrap());
    }
    if player.color_diff.abs() >= 2 {
        return -3 * player.color_diff.signum();
    }
    if player.color_diff.abs() == 1 {
        return -2 * player.color_diff.signum();
    }
    if streak == 1 {
        return forced_against(*history.last().unwrap()) / 3;
    }
    0
}

fn forced_against(color: Color) -> i32 {
    match color {
        Color::White => -3,
        Color::Black => 3,
    }
}

/// which of two paired players plays white
fn decide_colors(a: &PlayerRecord, b: &PlayerRecord, rng: &mut impl Rng) -> (Color, Color) {
    let priority_a = color_priority(a);
    let priority_b = color_priority(b);
    let a_white = if priority_a == priority_b {
        rng.gen_bool(0.5)
    } else if priority_a.abs() == priority_b.abs() {
        // opposite signs of equal strength: the positive one plays white
        priority_a > 0
    } else if priority_a.abs() > priority_b.abs() {
        priority_a > 0
    } else {
        priority_b < 0
    };
    if a_white {
        (Color::White, Color::Black)
    } else {
        (Color::Black, Color::White)
    }
}

/// players eligible for the bye, by the historical rule: fewer byes than the
/// current maximum, or none at all; everyone qualifies when nobody does
fn bye_candidates(players: &[PlayerRecord]) -> Vec<usize> {
    let max_byes = players.iter().map(|player| player.byes).max().unwrap_or(0);
    let candidates: Vec<usize> = players
        .iter()
        .enumerate()
        .filter(|(_, player)| player.byes < max_byes || player.byes == 0)
        .map(|(index, _)| index)
        .collect();
    if candidates.is_empty() {
        (0..players.len()).collect()
    } else {
        candidates
    }
}

/// build one round of pairings; the weight function scores how desirable a
/// pairing is and the matching maximizes the total score
pub fn pairings<W>(
    players: &[PlayerRecord],
    weight: W,
    rng: &mut impl Rng,
) -> Result<Vec<Matchup>, MatchingError>
where
    W: Fn(&PlayerRecord, &PlayerRecord) -> Weight,
{
    if players.is_empty() {
        return Ok(vec![]);
    }
    let bye = players.len(); // vertex index of the bye, present for odd fields
    let mut graph = UndirectedSimpleGraph::new();
    for index in 0..players.len() {
        graph.add_vertex(index);
    }
    let mut view = WeightedView::new(graph);
    for a in 0..players.len() {
        for b in a + 1..players.len() {
            let edge = view.inner_mut().add_edge(&a, &b)?;
            view.set_weight(edge, weight(&players[a], &players[b]));
        }
    }
    if players.len() % 2 != 0 {
        view.inner_mut().add_vertex(bye);
        for candidate in bye_candidates(players) {
            let edge = view.inner_mut().add_edge(&candidate, &bye)?;
            view.set_weight(edge, 0.);
        }
    }
    let matching = get_graph_matching(&view, ObjectiveSense::Maximize, &BlossomOptions::default())?;
    debug!("paired {} players with total score {}", players.len(), matching.weight);
    let mut games = vec![];
    let mut byes = vec![];
    for &(a, b) in matching.pairs.iter() {
        if a == bye || b == bye {
            byes.push(if a == bye { b } else { a });
            continue;
        }
        games.push(if a < b { (a, b) } else { (b, a) });
    }
    games.sort_unstable();
    let mut round = vec![];
    for (a, b) in games {
        let (color_a, _) = decide_colors(&players[a], &players[b], rng);
        let (white, black) = match color_a {
            Color::White => (a, b),
            Color::Black => (b, a),
        };
        round.push(Matchup::Game {
            white: players[white].id.clone(),
            black: players[black].id.clone(),
        });
    }
    for player in byes {
        round.push(Matchup::Bye {
            player: players[player].id.clone(),
        });
    }
    Ok(round)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;

    fn rng() -> Xoshiro256StarStar {
        Xoshiro256StarStar::seed_from_u64(7)
    }

    fn named(count: usize) -> Vec<PlayerRecord> {
        (0..count).map(|index| PlayerRecord::new(format!("p{index}"))).collect()
    }

    #[test]
    fn pairing_round_sizes() {
        // cargo test pairing_round_sizes -- --nocapture
        let flat = |_: &PlayerRecord, _: &PlayerRecord| 1.;
        assert_eq!(pairings(&named(0), flat, &mut rng()).unwrap(), vec![]);
        let round = pairings(&named(1), flat, &mut rng()).unwrap();
        assert_eq!(round, vec![Matchup::Bye { player: "p0".into() }]);
        let round = pairings(&named(3), flat, &mut rng()).unwrap();
        assert_eq!(round.len(), 2);
        assert_eq!(round.iter().filter(|m| matches!(m, Matchup::Bye { .. })).count(), 1);
        let round = pairings(&named(4), flat, &mut rng()).unwrap();
        assert_eq!(round.len(), 2);
        assert!(round.iter().all(|m| matches!(m, Matchup::Game { .. })));
    }

    #[test]
    fn pairing_prefers_heavy_edges() {
        let players = named(4);
        // pairing (p0, p3) and (p1, p2) dominates every alternative
        let weight = |a: &PlayerRecord, b: &PlayerRecord| match (a.id.as_str(), b.id.as_str()) {
            ("p0", "p3") | ("p3", "p0") => 10.,
            ("p1", "p2") | ("p2", "p1") => 10.,
            _ => 1.,
        };
        let round = pairings(&players, weight, &mut rng()).unwrap();
        for matchup in round {
            let Matchup::Game { white, black } = matchup else {
                panic!("no bye expected");
            };
            let pair = (white.as_str().min(black.as_str()).to_string(), white.as_str().max(black.as_str()).to_string());
            assert!(pair == ("p0".into(), "p3".into()) || pair == ("p1".into(), "p2".into()));
        }
    }

    #[test]
    fn bye_goes_to_fewest_byes() {
        let mut players = named(3);
        players[0].byes = 1;
        players[1].byes = 1;
        // p2 is the only player below the maximum
        let round = pairings(&players, |_, _| 1., &mut rng()).unwrap();
        assert!(round.contains(&Matchup::Bye { player: "p2".into() }));
    }

    #[test]
    fn bye_rule_all_equal_makes_everyone_eligible() {
        let mut players = named(3);
        for player in players.iter_mut() {
            player.byes = 2;
        }
        assert_eq!(bye_candidates(&players), vec![0, 1, 2]);
        let round = pairings(&players, |_, _| 1., &mut rng()).unwrap();
        assert_eq!(round.iter().filter(|m| matches!(m, Matchup::Bye { .. })).count(), 1);
    }

    #[test]
    fn color_priority_levels() {
        let mut player = PlayerRecord::new("p");
        assert_eq!(color_priority(&player), 0);
        player.color_history = vec![Color::White];
        assert_eq!(color_priority(&player), -1);
        player.color_history = vec![Color::Black, Color::White, Color::White];
        assert_eq!(color_priority(&player), -3);
        player.color_history = vec![Color::White, Color::Black];
        player.color_diff = -1;
        assert_eq!(color_priority(&player), 2);
        player.color_diff = -2;
        assert_eq!(color_priority(&player), 3);
        // a game today overrides everything else
        player.todays_colors = vec![Color::Black];
        assert_eq!(color_priority(&player), 3);
        player.todays_colors = vec![Color::White];
        assert_eq!(color_priority(&player), -3);
    }

    #[test]
    fn forced_colors_resolve_pairings() {
        let mut a = PlayerRecord::new("a");
        let mut b = PlayerRecord::new("b");
        // a must play black, b leans white: opposite signs, positive is white
        a.color_history = vec![Color::White, Color::White];
        b.color_history = vec![Color::Black];
        let (color_a, color_b) = decide_colors(&a, &b, &mut rng());
        assert_eq!(color_a, Color::Black);
        assert_eq!(color_b, Color::White);
        // the stronger preference wins on equal signs
        let mut c = PlayerRecord::new("c");
        c.color_diff = 1; // leans black with strength 2
        let mut d = PlayerRecord::new("d");
        d.color_history = vec![Color::Black]; // leans white with strength 1
        let (color_c, _) = decide_colors(&c, &d, &mut rng());
        assert_eq!(color_c, Color::Black);
    }
}
