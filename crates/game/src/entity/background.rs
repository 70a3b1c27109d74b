use glam::Vec2;

use crate::replication::{
    Field, ValueError, WireValue, expect_f32, expect_int, expect_text, expect_vec2,
};

/// How a background layer tiles across the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Repeat {
    #[default]
    None,
    Both,
    X,
    Y,
}

impl Repeat {
    pub fn name(self) -> &'static str {
        match self {
            Repeat::None => "none",
            Repeat::Both => "both",
            Repeat::X => "x",
            Repeat::Y => "y",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [Repeat::None, Repeat::Both, Repeat::X, Repeat::Y]
            .into_iter()
            .find(|r| r.name() == name)
    }
}

fn write_repeat(slot: &mut Repeat, value: &WireValue) -> Result<(), ValueError> {
    let name = expect_text(value)?;
    *slot = Repeat::from_name(name).ok_or_else(|| ValueError::UnknownVariant(name.to_string()))?;
    Ok(())
}

/// Procedurally generated star layer; `seed` fully determines its stars.
#[derive(Debug, Clone, PartialEq)]
pub struct Starfield {
    pub position: Vec2,
    pub size: Vec2,
    /// 0 is the gameplay plane, 1 is infinitely far away.
    pub depth: f32,
    pub density: f32,
    pub repeat: Repeat,
    pub starfield_type: String,
    pub rotation: f32,
    pub seed: u32,
}

impl Default for Starfield {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::new(1920.0, 1080.0),
            depth: 1.0,
            density: 1.0,
            repeat: Repeat::None,
            starfield_type: "default".to_string(),
            rotation: 0.0,
            seed: 0,
        }
    }
}

impl Starfield {
    pub fn read(&self, field: Field) -> Option<WireValue> {
        let value = match field {
            Field::Position => WireValue::vec2(self.position),
            Field::Size => WireValue::vec2(self.size),
            Field::Depth => WireValue::Float(self.depth),
            Field::Density => WireValue::Float(self.density),
            Field::Repeat => WireValue::Text(self.repeat.name().to_string()),
            Field::StarfieldType => WireValue::Text(self.starfield_type.clone()),
            Field::Rotation => WireValue::Float(self.rotation),
            Field::Seed => WireValue::Int(i64::from(self.seed)),
            _ => return None,
        };
        Some(value)
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Position => self.position = expect_vec2(value)?,
            Field::Size => self.size = expect_vec2(value)?,
            Field::Depth => self.depth = expect_f32(value)?,
            Field::Density => self.density = expect_f32(value)?,
            Field::Repeat => write_repeat(&mut self.repeat, value)?,
            Field::StarfieldType => self.starfield_type = expect_text(value)?.to_string(),
            Field::Rotation => self.rotation = expect_f32(value)?,
            Field::Seed => {
                let seed = expect_int(value)?;
                self.seed = u32::try_from(seed)
                    .map_err(|_| ValueError::UnknownVariant(seed.to_string()))?;
            }
            _ => return Err(ValueError::NotCarried(field)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Planet {
    pub position: Vec2,
    pub size: Vec2,
    pub depth: f32,
    pub planet_type: String,
}

impl Default for Planet {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            size: Vec2::splat(100.0),
            depth: 1.0,
            planet_type: "planet1".to_string(),
        }
    }
}

impl Planet {
    pub fn read(&self, field: Field) -> Option<WireValue> {
        let value = match field {
            Field::Position => WireValue::vec2(self.position),
            Field::Size => WireValue::vec2(self.size),
            Field::Depth => WireValue::Float(self.depth),
            Field::PlanetType => WireValue::Text(self.planet_type.clone()),
            _ => return None,
        };
        Some(value)
    }

    pub fn write(&mut self, field: Field, value: &WireValue) -> Result<(), ValueError> {
        match field {
            Field::Position => self.position = expect_vec2(value)?,
            Field::Size => self.size = expect_vec2(value)?,
            Field::Depth => self.depth = expect_f32(value)?,
            Field::PlanetType => self.planet_type = expect_text(value)?.to_string(),
            _ => return Err(ValueError::NotCarried(field)),
        }
        Ok(())
    }
}
