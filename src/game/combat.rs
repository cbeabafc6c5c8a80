//! Projectiles, targets and damage

/// Player weapon stats
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Projectile speed
    pub projectile_speed: f32,
    /// Cooldown between shots (seconds)
    pub cooldown: f32,
    /// Projectile lifetime (seconds)
    pub projectile_lifetime: f32,
    /// Projectile hitbox radius
    pub projectile_radius: f32,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self {
            damage: 10.0,
            projectile_speed: 900.0,
            cooldown: 0.2,
            projectile_lifetime: 1.5,
            projectile_radius: 4.0,
        }
    }
}

/// Active projectile
#[derive(Debug, Clone)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub damage: f32,
    pub radius: f32,
    pub lifetime_remaining: f32,
}

impl Projectile {
    /// Fire horizontally in `facing` (-1 left, 1 right)
    pub fn new(x: f32, y: f32, facing: f32, stats: &WeaponStats) -> Self {
        Self {
            x,
            y,
            vel_x: facing.signum() * stats.projectile_speed,
            vel_y: 0.0,
            damage: stats.damage,
            radius: stats.projectile_radius,
            lifetime_remaining: stats.projectile_lifetime,
        }
    }

    /// Update projectile position, returns false if expired
    pub fn update(&mut self, dt: f32) -> bool {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;
        self.lifetime_remaining -= dt;
        self.lifetime_remaining > 0.0
    }
}

/// Drifting target the player shoots for score
#[derive(Debug, Clone)]
pub struct Target {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    pub health: f32,
    /// Damage dealt to the player on contact
    pub contact_damage: f32,
    /// Score awarded when destroyed
    pub points: u32,
}

impl Target {
    pub fn update(&mut self, dt: f32, width: f32, height: f32) {
        self.x += self.vel_x * dt;
        self.y += self.vel_y * dt;

        // Bounce off the playfield edges
        if self.x < self.radius || self.x > width - self.radius {
            self.vel_x = -self.vel_x;
            self.x = self.x.clamp(self.radius, (width - self.radius).max(self.radius));
        }
        if self.y < self.radius || self.y > height - self.radius {
            self.vel_y = -self.vel_y;
            self.y = self.y.clamp(self.radius, (height - self.radius).max(self.radius));
        }
    }
}

pub struct CombatSystem;

impl CombatSystem {
    pub fn can_fire(weapon_cooldown: f32) -> bool {
        weapon_cooldown <= 0.0
    }

    pub fn update_cooldown(cooldown: f32, dt: f32) -> f32 {
        (cooldown - dt).max(0.0)
    }

    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}
