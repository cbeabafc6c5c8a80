//! Arena: the bundled single-screen shooter driven by the stream clock

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::combat::{CombatSystem, Projectile, Target, WeaponStats};
use super::physics::{Aabb, MoveStats, PhysicsSystem};
use super::render::{RenderBuffer, Rgb};
use super::{InputSource, Observables, SimError, Simulation, SimulationFactory};
use crate::input::LogicalAction;

const MAX_HEALTH: f32 = 100.0;
const PLAYER_W: f32 = 48.0;
const PLAYER_H: f32 = 64.0;
const MAX_TARGETS: usize = 6;
const SPAWN_INTERVAL: f32 = 1.5;
/// Grace period after taking contact damage
const INVULNERABLE_SECS: f32 = 1.0;

const BACKGROUND: Rgb = [249, 131, 103];
const PLAYER_COLOR: Rgb = [30, 60, 200];
const TARGET_COLOR: Rgb = [70, 40, 120];
const PROJECTILE_COLOR: Rgb = [255, 240, 120];
const HEALTH_BAR_BG: Rgb = [40, 20, 20];
const HEALTH_BAR_FG: Rgb = [220, 30, 30];

#[derive(Debug, Clone)]
struct Player {
    body: Aabb,
    vel_x: f32,
    vel_y: f32,
    health: f32,
    weapon_cooldown: f32,
    /// -1 facing left, 1 facing right
    facing: f32,
    invulnerable: f32,
}

impl Player {
    fn spawn(width: f32, height: f32) -> Self {
        Self {
            body: Aabb {
                x: (width - PLAYER_W) / 2.0,
                y: (height - PLAYER_H) / 2.0,
                w: PLAYER_W,
                h: PLAYER_H,
            },
            vel_x: 0.0,
            vel_y: 0.0,
            health: MAX_HEALTH,
            weapon_cooldown: 0.0,
            facing: 1.0,
            invulnerable: 0.0,
        }
    }
}

/// Builds [`Arena`] instances sized to the stream
#[derive(Debug, Clone)]
pub struct ArenaFactory {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
}

impl SimulationFactory for ArenaFactory {
    fn name(&self) -> &'static str {
        "arena"
    }

    fn create(&self, input: Arc<dyn InputSource>) -> Result<Box<dyn Simulation>, SimError> {
        if self.width < PLAYER_W as u32 || self.height < PLAYER_H as u32 {
            return Err(SimError::Init(format!(
                "playfield {}x{} is smaller than the player",
                self.width, self.height
            )));
        }
        Ok(Box::new(Arena::new(
            input,
            self.width as f32,
            self.height as f32,
            self.seed,
        )))
    }
}

pub struct Arena {
    input: Arc<dyn InputSource>,
    width: f32,
    height: f32,
    player: Player,
    projectiles: Vec<Projectile>,
    targets: Vec<Target>,
    score: u32,
    spawn_timer: f32,
    move_stats: MoveStats,
    weapon: WeaponStats,
    rng: ChaCha8Rng,
}

impl Arena {
    pub fn new(input: Arc<dyn InputSource>, width: f32, height: f32, seed: u64) -> Self {
        Self {
            input,
            width,
            height,
            player: Player::spawn(width, height),
            projectiles: Vec::new(),
            targets: Vec::new(),
            score: 0,
            spawn_timer: SPAWN_INTERVAL,
            move_stats: MoveStats::default(),
            weapon: WeaponStats::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn spawn_target(&mut self) {
        let radius = self.rng.gen_range(14.0..26.0_f32);
        let max_x = (self.width - radius).max(radius + 1.0);
        let x = self.rng.gen_range(radius..max_x);
        let speed = self.rng.gen_range(60.0..160.0_f32);
        let angle = self.rng.gen_range(0.3..std::f32::consts::PI - 0.3);

        self.targets.push(Target {
            x,
            y: radius,
            vel_x: angle.cos() * speed,
            vel_y: angle.sin() * speed,
            radius,
            health: 20.0,
            contact_damage: 15.0,
            points: 100,
        });
    }

    fn game_over(&mut self) {
        debug!(score = self.score, "Arena player died, resetting");
        self.player = Player::spawn(self.width, self.height);
        self.projectiles.clear();
        self.targets.clear();
        self.score = 0;
        self.spawn_timer = SPAWN_INTERVAL;
    }
}

impl Simulation for Arena {
    fn step(&mut self, dt: f32) -> Result<(), SimError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::Step(format!("invalid delta time {dt}")));
        }

        let input = self.input.pressed();
        let (ax, ay) = PhysicsSystem::input_axes(input);

        let player = &mut self.player;
        player.vel_x = PhysicsSystem::update_axis(player.vel_x, ax, &self.move_stats, dt);
        player.vel_y = PhysicsSystem::update_axis(player.vel_y, ay, &self.move_stats, dt);
        if ax != 0.0 {
            player.facing = ax;
        }
        player.body.x += player.vel_x * dt;
        player.body.y += player.vel_y * dt;
        player.weapon_cooldown = CombatSystem::update_cooldown(player.weapon_cooldown, dt);
        player.invulnerable = (player.invulnerable - dt).max(0.0);

        if input.contains(LogicalAction::Fire) && CombatSystem::can_fire(player.weapon_cooldown) {
            let (cx, cy) = player.body.center();
            self.projectiles
                .push(Projectile::new(cx, cy, player.facing, &self.weapon));
            player.weapon_cooldown = self.weapon.cooldown;
        }

        self.projectiles.retain_mut(|p| p.update(dt));

        let (width, height) = (self.width, self.height);
        for target in &mut self.targets {
            target.update(dt, width, height);
        }

        self.spawn_timer -= dt;
        if self.spawn_timer <= 0.0 {
            if self.targets.len() < MAX_TARGETS {
                self.spawn_target();
            }
            self.spawn_timer = SPAWN_INTERVAL;
        }

        Ok(())
    }

    fn resolve_collisions(&mut self) -> Result<(), SimError> {
        let (hit_x, hit_y) =
            PhysicsSystem::clamp_to_bounds(&mut self.player.body, self.width, self.height);
        if hit_x {
            self.player.vel_x = 0.0;
        }
        if hit_y {
            self.player.vel_y = 0.0;
        }

        // Projectiles vs targets: each projectile hits at most one target
        let targets = &mut self.targets;
        self.projectiles.retain(|p| {
            let hit = targets.iter_mut().find(|t| {
                t.health > 0.0 && PhysicsSystem::circles_overlap(p.x, p.y, p.radius, t.x, t.y, t.radius)
            });
            match hit {
                Some(target) => {
                    target.health = CombatSystem::apply_damage(target.health, p.damage).0;
                    false
                }
                None => true,
            }
        });

        let mut points = 0;
        self.targets.retain(|t| {
            if t.health <= 0.0 {
                points += t.points;
                false
            } else {
                true
            }
        });
        self.score += points;

        // Targets vs player
        if self.player.invulnerable <= 0.0 {
            let body = self.player.body;
            let contact = self
                .targets
                .iter()
                .find(|t| PhysicsSystem::circle_hits_box(t.x, t.y, t.radius, &body))
                .map(|t| t.contact_damage);

            if let Some(damage) = contact {
                let (health, dead) = CombatSystem::apply_damage(self.player.health, damage);
                self.player.health = health;
                self.player.invulnerable = INVULNERABLE_SECS;
                if dead {
                    self.game_over();
                }
            }
        }

        Ok(())
    }

    fn render(&mut self, target: &mut RenderBuffer) -> Result<(), SimError> {
        target.fill(BACKGROUND);

        for t in &self.targets {
            let d = (t.radius * 2.0) as u32;
            target.fill_rect((t.x - t.radius) as i32, (t.y - t.radius) as i32, d, d, TARGET_COLOR)?;
        }

        for p in &self.projectiles {
            let d = (p.radius * 2.0).max(1.0) as u32;
            target.fill_rect((p.x - p.radius) as i32, (p.y - p.radius) as i32, d * 2, d, PROJECTILE_COLOR)?;
        }

        // Blink while invulnerable
        let visible = self.player.invulnerable <= 0.0
            || (self.player.invulnerable * 10.0) as u32 % 2 == 0;
        if visible {
            let b = self.player.body;
            target.fill_rect(b.x as i32, b.y as i32, b.w as u32, b.h as u32, PLAYER_COLOR)?;
        }

        let bar = (200.0 * self.player.health / MAX_HEALTH) as u32;
        target.fill_rect(16, 16, 200, 12, HEALTH_BAR_BG)?;
        target.fill_rect(16, 16, bar, 12, HEALTH_BAR_FG)?;

        Ok(())
    }

    fn observe(&self) -> Observables {
        Observables {
            health: self.player.health,
            score: self.score,
            position: Some((self.player.body.x, self.player.body.y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ActionSet;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FixedInput(Mutex<ActionSet>);

    impl FixedInput {
        fn set(&self, actions: &[LogicalAction]) {
            *self.0.lock() = actions.iter().copied().collect();
        }
    }

    impl InputSource for FixedInput {
        fn pressed(&self) -> ActionSet {
            *self.0.lock()
        }
    }

    fn tick(arena: &mut Arena) {
        arena.step(1.0 / 30.0).unwrap();
        arena.resolve_collisions().unwrap();
    }

    #[test]
    fn moves_right_while_held_and_stops_after_release() {
        let input = Arc::new(FixedInput::default());
        let mut arena = Arena::new(input.clone(), 1280.0, 720.0, 7);
        let start = arena.observe().position.unwrap().0;

        input.set(&[LogicalAction::MoveRight]);
        for _ in 0..10 {
            tick(&mut arena);
        }
        let moved = arena.observe().position.unwrap().0;
        assert!(moved > start);

        input.set(&[]);
        for _ in 0..30 {
            tick(&mut arena);
        }
        let settled = arena.observe().position.unwrap().0;
        tick(&mut arena);
        assert_eq!(arena.observe().position.unwrap().0, settled);
    }

    #[test]
    fn player_stays_inside_playfield() {
        let input = Arc::new(FixedInput::default());
        let mut arena = Arena::new(input.clone(), 200.0, 200.0, 1);

        input.set(&[LogicalAction::MoveLeft, LogicalAction::MoveUp]);
        for _ in 0..120 {
            tick(&mut arena);
        }
        let (x, y) = arena.observe().position.unwrap();
        assert_eq!((x, y), (0.0, 0.0));
    }

    #[test]
    fn firing_respects_cooldown() {
        let input = Arc::new(FixedInput::default());
        let mut arena = Arena::new(input.clone(), 1280.0, 720.0, 1);

        input.set(&[LogicalAction::Fire]);
        tick(&mut arena);
        tick(&mut arena);
        assert_eq!(arena.projectiles.len(), 1);
    }

    #[test]
    fn shooting_a_target_scores() {
        let input = Arc::new(FixedInput::default());
        let mut arena = Arena::new(input.clone(), 1280.0, 720.0, 1);
        let (cx, cy) = arena.player.body.center();
        arena.targets.push(Target {
            x: cx + 120.0,
            y: cy,
            vel_x: 0.0,
            vel_y: 0.0,
            radius: 20.0,
            health: 10.0,
            contact_damage: 0.0,
            points: 100,
        });

        input.set(&[LogicalAction::Fire]);
        for _ in 0..10 {
            tick(&mut arena);
        }
        assert_eq!(arena.observe().score, 100);
        assert!(arena.targets.is_empty());
    }

    #[test]
    fn rejects_nan_delta() {
        let mut arena = Arena::new(Arc::new(FixedInput::default()), 640.0, 480.0, 1);
        assert!(matches!(arena.step(f32::NAN), Err(SimError::Step(_))));
    }

    #[test]
    fn render_paints_background_and_player() {
        let mut arena = Arena::new(Arc::new(FixedInput::default()), 640.0, 480.0, 1);
        let mut buf = RenderBuffer::new(640, 480);
        arena.render(&mut buf).unwrap();

        assert_eq!(buf.pixel(639, 479), Some(BACKGROUND));
        assert_eq!(buf.pixel(320, 240), Some(PLAYER_COLOR));
    }

    #[test]
    fn factory_rejects_tiny_playfield() {
        let factory = ArenaFactory { width: 10, height: 10, seed: 0 };
        assert!(factory.create(Arc::new(FixedInput::default())).is_err());
    }
}
