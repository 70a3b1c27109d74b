use crate::entity::EntityKind;

use super::wire::WireValue;

/// Every replicated field of every entity kind. Entities map each variant to
/// their in-memory state in their `Replicated` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Position,
    Velocity,
    Rotation,
    Radius,
    Mass,
    Elasticity,
    MinSpeed,
    MaxSpeed,
    CanCollide,
    Name,
    Size,
    Owner,
    Color,
    ShipType,
    Special,
    Thrust,
    Rotate,
    Firing,
    Destroying,
    BulletSpeed,
    MaxThrust,
    MaxRotate,
    FireMode,
    ExplosionType,
    Timespan,
    Depth,
    Density,
    Repeat,
    StarfieldType,
    Seed,
    PlanetType,
}

impl Field {
    pub fn default_wire_name(self) -> &'static str {
        match self {
            Field::Position => "position",
            Field::Velocity => "velocity",
            Field::Rotation => "rotation",
            Field::Radius => "radius",
            Field::Mass => "mass",
            Field::Elasticity => "elasticity",
            Field::MinSpeed => "minSpeed",
            Field::MaxSpeed => "maxSpeed",
            Field::CanCollide => "canCollide",
            Field::Name => "name",
            Field::Size => "size",
            Field::Owner => "owner",
            Field::Color => "color",
            Field::ShipType => "shipType",
            Field::Special => "special",
            Field::Thrust => "thrust",
            Field::Rotate => "rotate",
            Field::Firing => "firing",
            Field::Destroying => "destroying",
            Field::BulletSpeed => "bulletSpeed",
            Field::MaxThrust => "maxThrust",
            Field::MaxRotate => "maxRotate",
            Field::FireMode => "fireMode",
            Field::ExplosionType => "explosionType",
            Field::Timespan => "timespan",
            Field::Depth => "depth",
            Field::Density => "density",
            Field::Repeat => "repeat",
            Field::StarfieldType => "starfieldType",
            Field::Seed => "seed",
            Field::PlanetType => "planetType",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Equality {
    Exact,
    /// Floats and vector components within the tolerance compare equal.
    Within(f32),
}

impl Equality {
    pub fn equal(self, a: &WireValue, b: &WireValue) -> bool {
        match (self, a, b) {
            (Equality::Within(eps), WireValue::Float(x), WireValue::Float(y)) => {
                (x - y).abs() <= eps
            }
            (Equality::Within(eps), WireValue::Vec2(x), WireValue::Vec2(y)) => {
                (x[0] - y[0]).abs() <= eps && (x[1] - y[1]).abs() <= eps
            }
            (Equality::Within(eps), WireValue::Special(x), WireValue::Special(y)) => {
                let (mut x, mut y) = (x.clone(), y.clone());
                let close = (x.status - y.status).abs() <= eps;
                x.status = 0.0;
                y.status = 0.0;
                close && x == y
            }
            _ => a == b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Property {
    pub field: Field,
    pub wire_name: &'static str,
    /// Optional properties are omitted from deltas while unchanged. Mandatory
    /// ones are sent with every object.
    pub optional: bool,
    pub equality: Equality,
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyOptions {
    pub wire_name: Option<&'static str>,
    pub optional: bool,
    pub equality: Equality,
}

impl Default for PropertyOptions {
    fn default() -> Self {
        Self {
            wire_name: None,
            optional: true,
            equality: Equality::Exact,
        }
    }
}

impl PropertyOptions {
    pub fn mandatory() -> Self {
        Self {
            optional: false,
            ..Default::default()
        }
    }

    pub fn within(eps: f32) -> Self {
        Self {
            equality: Equality::Within(eps),
            ..Default::default()
        }
    }
}

/// The ordered property list of one entity kind. Built once and shared by
/// every instance of that kind.
#[derive(Debug)]
pub struct Layout {
    kind: EntityKind,
    properties: Vec<Property>,
}

impl Layout {
    pub fn builder(kind: EntityKind) -> LayoutBuilder {
        LayoutBuilder {
            kind,
            properties: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn by_wire_name(&self, name: &str) -> Option<(usize, &Property)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.wire_name == name)
    }

    pub fn position_of(&self, field: Field) -> Option<usize> {
        self.properties.iter().position(|p| p.field == field)
    }

    pub fn is_optional(&self, name: &str) -> bool {
        self.by_wire_name(name).is_some_and(|(_, p)| p.optional)
    }
}

pub struct LayoutBuilder {
    kind: EntityKind,
    properties: Vec<Property>,
}

impl LayoutBuilder {
    pub fn register(self, field: Field) -> Self {
        self.register_with(field, PropertyOptions::default())
    }

    pub fn register_with(mut self, field: Field, options: PropertyOptions) -> Self {
        let wire_name = options.wire_name.unwrap_or(field.default_wire_name());
        debug_assert!(
            self.properties
                .iter()
                .all(|p| p.field != field && p.wire_name != wire_name),
            "{} registered twice on {:?}",
            wire_name,
            self.kind
        );
        self.properties.push(Property {
            field,
            wire_name,
            optional: options.optional,
            equality: options.equality,
        });
        self
    }

    /// Appends the properties every body-carrying entity replicates.
    pub fn body(self) -> Self {
        self.register(Field::Position)
            .register(Field::Velocity)
            .register(Field::Rotation)
            .register(Field::Radius)
            .register(Field::Mass)
            .register(Field::Elasticity)
            .register(Field::MinSpeed)
            .register(Field::MaxSpeed)
    }

    /// Body properties plus the collision switch.
    pub fn collidable(self) -> Self {
        self.body().register(Field::CanCollide)
    }

    pub fn build(self) -> Layout {
        Layout {
            kind: self.kind,
            properties: self.properties,
        }
    }
}

/// Last-sent values of a single entity's optional properties, indexed by
/// layout position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shadow {
    values: Vec<Option<WireValue>>,
}

impl Shadow {
    pub fn get(&self, index: usize) -> Option<&WireValue> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn set(&mut self, index: usize, value: Option<WireValue>) {
        if self.values.len() <= index {
            self.values.resize(index + 1, None);
        }
        self.values[index] = value;
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_registration_order() {
        let layout = Layout::builder(EntityKind::Asteroid)
            .collidable()
            .register(Field::Color)
            .build();
        assert_eq!(layout.properties()[0].field, Field::Position);
        assert_eq!(layout.properties().last().unwrap().field, Field::Color);
        assert_eq!(layout.position_of(Field::CanCollide), Some(8));
    }

    #[test]
    fn custom_wire_name_and_mandatory() {
        let layout = Layout::builder(EntityKind::Bullet)
            .register_with(
                Field::Owner,
                PropertyOptions {
                    wire_name: Some("ownerId"),
                    ..PropertyOptions::mandatory()
                },
            )
            .build();
        let (_, prop) = layout.by_wire_name("ownerId").unwrap();
        assert!(!prop.optional);
        assert!(layout.by_wire_name("owner").is_none());
    }

    #[test]
    fn tolerance_equality() {
        let eq = Equality::Within(0.01);
        assert!(eq.equal(&WireValue::Float(1.0), &WireValue::Float(1.005)));
        assert!(!eq.equal(&WireValue::Float(1.0), &WireValue::Float(1.1)));
        assert!(!Equality::Exact.equal(&WireValue::Float(1.0), &WireValue::Float(1.005)));
    }

    #[test]
    fn shadow_grows_on_demand() {
        let mut shadow = Shadow::default();
        assert!(shadow.is_empty());
        shadow.set(3, Some(WireValue::Bool(true)));
        assert_eq!(shadow.get(3), Some(&WireValue::Bool(true)));
        assert_eq!(shadow.get(1), None);
    }
}
