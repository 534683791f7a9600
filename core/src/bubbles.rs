//! Reward-game entities: procedurally spawned bubbles that rise and pop.
//! The host drives the 800ms spawn cadence and the per-frame advance.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SPAWN_INTERVAL_MS: u64 = 800;
pub const POP_POINTS: u32 = 10;

const MIN_SIZE: f32 = 40.0;
const MAX_SIZE: f32 = 80.0;
const MIN_SPEED: f32 = 1.0;
const MAX_SPEED: f32 = 3.0;
/// Bubbles despawn once they rise this far past the top edge.
const TOP_MARGIN: f32 = 100.0;

pub const PALETTE: [[u8; 3]; 6] = [
    [0xEF, 0x44, 0x44],
    [0x3B, 0x82, 0xF6],
    [0x10, 0xB9, 0x81],
    [0xF5, 0x9E, 0x0B],
    [0x8B, 0x5C, 0xF6],
    [0xEC, 0x48, 0x99],
];

#[derive(Debug, Clone, PartialEq)]
pub struct Bubble {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: [u8; 3],
    pub speed: f32,
}

/// Live bubble set for one reward session. Ids are never reused.
pub struct BubbleField {
    width: f32,
    height: f32,
    bubbles: Vec<Bubble>,
    next_id: u64,
    score: u32,
    rng: StdRng,
}

impl BubbleField {
    pub fn new(width: f32, height: f32) -> Self {
        Self::with_rng(width, height, StdRng::from_entropy())
    }

    pub fn with_rng(width: f32, height: f32, rng: StdRng) -> Self {
        Self {
            width,
            height,
            bubbles: Vec::new(),
            next_id: 0,
            score: 0,
            rng,
        }
    }

    pub fn set_bounds(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    /// Spawns one bubble just below the bottom edge.
    pub fn spawn(&mut self) -> u64 {
        let size = self.rng.gen_range(MIN_SIZE..MAX_SIZE);
        let x = self.rng.gen_range(0.0..(self.width - size).max(1.0));
        let speed = self.rng.gen_range(MIN_SPEED..MAX_SPEED);
        let color = PALETTE[self.rng.gen_range(0..PALETTE.len())];
        let id = self.next_id;
        self.next_id += 1;
        self.bubbles.push(Bubble {
            id,
            x,
            y: self.height + size,
            size,
            color,
            speed,
        });
        id
    }

    /// One animation frame: every bubble rises by its speed; anything past
    /// the top margin is dropped.
    pub fn advance(&mut self) {
        for bubble in &mut self.bubbles {
            bubble.y -= bubble.speed;
        }
        self.bubbles.retain(|b| b.y > -TOP_MARGIN);
    }

    /// Player pop. Removal is immediate, so a second pop of the same id
    /// returns false and awards nothing.
    pub fn pop(&mut self, id: u64) -> bool {
        let before = self.bubbles.len();
        self.bubbles.retain(|b| b.id != id);
        if self.bubbles.len() < before {
            self.score += POP_POINTS;
            true
        } else {
            false
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }
}
