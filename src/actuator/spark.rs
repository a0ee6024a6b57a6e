// SparkMax-style binding (brushless motor, integrated encoder)
//
// The integrated encoder always exists, so closed-loop velocity and position
// are always available. Native units already match the contract: rotations
// and RPM.

use super::{
    clamp_fraction, ActuatorPort, BusLink, Capabilities, Demand, PortConfig, PortId, Reading,
    SharedBus,
};

pub struct SparkMaxPort {
    id: PortId,
    link: BusLink,
    profiled: bool,
}

impl SparkMaxPort {
    pub fn new(bus: SharedBus, config: &PortConfig) -> Self {
        Self {
            id: config.id,
            link: BusLink::open(bus, config),
            profiled: config.profile.is_some(),
        }
    }
}

impl ActuatorPort for SparkMaxPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_position_sensor: true,
            has_velocity_closed_loop: true,
        }
    }

    fn set_open_loop(&mut self, fraction: f64) {
        self.link.send(Demand::PercentOutput(clamp_fraction(fraction)));
    }

    fn set_closed_loop_velocity(&mut self, target: f64) {
        self.link.send(Demand::Velocity(target));
    }

    fn set_position_target(&mut self, target: f64) {
        let demand = if self.profiled {
            Demand::MotionProfile(target)
        } else {
            Demand::Position(target)
        };
        self.link.send(demand);
    }

    fn position(&self) -> Reading {
        self.link
            .feedback()
            .map_or(Reading::UNAVAILABLE, |fb| Reading::measured(fb.position))
    }

    fn velocity(&self) -> Reading {
        self.link
            .feedback()
            .map_or(Reading::UNAVAILABLE, |fb| Reading::measured(fb.velocity))
    }

    fn reset_position_to(&mut self, position: f64) {
        self.link.set_sensor_position(position);
    }

    fn stop(&mut self) {
        self.link.send(Demand::Neutral);
    }
}
