// ============================================================================
// rules.rs — Life GPU
// Catalog of life-like automaton rules as birth/survive neighbour masks.
// ============================================================================

/// Number of Moore neighbours a cell can have.
pub const MAX_NEIGHBORS: u32 = 8;

/// One life-like automaton. Bit `k` of `birth` means an inactive cell with
/// exactly `k` active neighbours becomes active; bit `k` of `survive` means an
/// active cell with `k` active neighbours stays active.
#[derive(Debug, PartialEq, Eq)]
pub struct AutomatonRule {
    pub id: u32,
    pub name: &'static str,
    pub descriptor: &'static str,
    pub birth: u32,
    pub survive: u32,
}

impl AutomatonRule {
    pub fn births_with(&self, neighbors: u32) -> bool {
        neighbors <= MAX_NEIGHBORS && (self.birth >> neighbors) & 1 == 1
    }

    pub fn survives_with(&self, neighbors: u32) -> bool {
        neighbors <= MAX_NEIGHBORS && (self.survive >> neighbors) & 1 == 1
    }

    /// State of a cell after one generation.
    pub fn next_state(&self, alive: bool, neighbors: u32) -> bool {
        if alive {
            self.survives_with(neighbors)
        } else {
            self.births_with(neighbors)
        }
    }
}

const fn mask(counts: &[u32]) -> u32 {
    let mut bits = 0u32;
    let mut i = 0;
    while i < counts.len() {
        bits |= 1 << counts[i];
        i += 1;
    }
    bits
}

const fn rule(
    id: u32,
    name: &'static str,
    descriptor: &'static str,
    birth: &[u32],
    survive: &[u32],
) -> AutomatonRule {
    AutomatonRule {
        id,
        name,
        descriptor,
        birth: mask(birth),
        survive: mask(survive),
    }
}

// Amoeba, Long Life, Seeds, Walled Cities, Gnarl and Replicator turn a random
// soup into white noise; Diamoeba and 34 fill the whole board. Left out.
pub static RULES: [AutomatonRule; 11] = [
    rule(1, "Game of Life", "B3/S23", &[3], &[2, 3]),
    rule(2, "High Life", "B36/S23", &[3, 6], &[2, 3]),
    rule(3, "Assimilation", "B345/S4567", &[3, 4, 5], &[4, 5, 6, 7]),
    rule(4, "Day and Night", "B3678/S34678", &[3, 6, 7, 8], &[3, 4, 6, 7, 8]),
    rule(6, "Move", "B368/S245", &[3, 6, 8], &[2, 4, 5]),
    rule(7, "Pseudo Life", "B357/S238", &[3, 5, 7], &[2, 3, 8]),
    rule(11, "Stains", "B3678/S235678", &[3, 6, 7, 8], &[2, 3, 5, 6, 7, 8]),
    rule(13, "Maze", "B3/S12345", &[3], &[1, 2, 3, 4, 5]),
    rule(14, "Coagulations", "B378/S235678", &[3, 7, 8], &[2, 3, 5, 6, 7, 8]),
    rule(18, "Mystery", "B3458/S05678", &[3, 4, 5, 8], &[0, 5, 6, 7, 8]),
    rule(19, "Anneal", "B4678/S35678", &[4, 6, 7, 8], &[3, 5, 6, 7, 8]),
];

/// Classic Conway rule, selected at startup.
pub static DEFAULT_RULE: &AutomatonRule = &RULES[0];

pub fn rule_by_index(index: usize) -> Option<&'static AutomatonRule> {
    RULES.get(index)
}

/// Position of a rule in the catalog (UI order).
pub fn index_of(rule: &AutomatonRule) -> Option<usize> {
    RULES.iter().position(|r| r.id == rule.id)
}

/// Case-insensitive lookup by display name or by descriptor ("B36/S23").
pub fn find_rule(name: &str) -> Option<&'static AutomatonRule> {
    let name = name.trim();
    RULES
        .iter()
        .find(|r| r.name.eq_ignore_ascii_case(name) || r.descriptor.eq_ignore_ascii_case(name))
}
