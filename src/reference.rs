// ============================================================================
// reference.rs — Life GPU
// CPU model of the automaton: same neighbourhood, same rule masks, same
// initial-state hash as the shaders. Used to verify GPU generations.
// ============================================================================

use crate::config::InitialMode;
use crate::rules::AutomatonRule;

/// Manages a grid on the CPU side, one byte per cell (0 or 1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuGrid {
    size: u32,
    cells: Vec<u8>,
}

impl CpuGrid {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            cells: vec![0; (size * size) as usize],
        }
    }

    /// Build from R8 texels; anything above mid-grey is Active, as the
    /// simulation shader reads it.
    pub fn from_texels(size: u32, texels: &[u8]) -> Self {
        debug_assert_eq!(texels.len(), (size * size) as usize);
        Self {
            size,
            cells: texels.iter().map(|&t| u8::from(t > 127)).collect(),
        }
    }

    /// R8 texels: 255 for Active, 0 for Inactive.
    pub fn to_texels(&self) -> Vec<u8> {
        self.cells.iter().map(|&c| c * 255).collect()
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    fn index(&self, x: i32, y: i32) -> usize {
        let s = self.size as i32;
        let wx = x.rem_euclid(s);
        let wy = y.rem_euclid(s);
        (wy * s + wx) as usize
    }

    /// Set a single cell (coordinates wrap).
    pub fn set(&mut self, x: i32, y: i32, alive: bool) {
        let i = self.index(x, y);
        self.cells[i] = u8::from(alive);
    }

    /// Get cell state (coordinates wrap).
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.cells[self.index(x, y)] == 1
    }

    pub fn population(&self) -> u64 {
        self.cells.iter().map(|&c| c as u64).sum()
    }

    pub fn neighbors(&self, x: i32, y: i32) -> u32 {
        let mut n = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) != (0, 0) && self.get(x + dx, y + dy) {
                    n += 1;
                }
            }
        }
        n
    }

    /// One generation on the torus.
    pub fn step(&self, rule: &AutomatonRule) -> CpuGrid {
        let mut next = CpuGrid::new(self.size);
        let s = self.size as i32;
        for y in 0..s {
            for x in 0..s {
                let alive = rule.next_state(self.get(x, y), self.neighbors(x, y));
                next.set(x, y, alive);
            }
        }
        next
    }

    /// First generation as the initial-state shader produces it.
    pub fn seeded(size: u32, mode: InitialMode, seed: u32) -> CpuGrid {
        let mut grid = CpuGrid::new(size);
        if mode == InitialMode::Empty {
            return grid;
        }
        let salt = pcg_hash(seed);
        for y in 0..size {
            for x in 0..size {
                let h = pcg_hash((x + y * size) ^ salt);
                let alive = match mode {
                    InitialMode::UniformRandom => h < 0x8000_0000,
                    InitialMode::RadialRandom => {
                        let u = (x as f32 + 0.5) / size as f32 - 0.5;
                        let v = (y as f32 + 0.5) / size as f32 - 0.5;
                        unit_float(h) < radial_density((u * u + v * v).sqrt())
                    }
                    InitialMode::Empty => false,
                };
                grid.set(x as i32, y as i32, alive);
            }
        }
        grid
    }
}

/// PCG-style integer hash, bit-identical to `pcg_hash` in `life_init.wgsl`.
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Top 24 bits of a hash as a float in [0, 1).
fn unit_float(h: u32) -> f32 {
    (h >> 8) as f32 / 16_777_216.0
}

/// Chance of a cell starting Active at distance `r` from the grid centre
/// (uv units): one half inside r = 0.1, fading to zero at r = 0.45.
pub fn radial_density(r: f32) -> f32 {
    0.5 * (1.0 - smoothstep(0.1, 0.45, r))
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
