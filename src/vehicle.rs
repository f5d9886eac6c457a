use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct VehicleProfile {
    pub class: String,
    pub width_m: f64,
    pub min_turning_radius_m: f64,
    /// Extra clearance required on each side of the vehicle
    pub lateral_buffer_m: f64,
}

impl VehicleProfile {
    /// Half the width of the region swept by the vehicle, including its buffer
    pub fn envelope_half_width(&self) -> f64 {
        self.width_m / 2.0 + self.lateral_buffer_m
    }
}

/// Looks up vehicle dimensions by class name
pub trait VehicleRegistry {
    fn profile(&self, class: &str) -> Option<VehicleProfile>;
}

#[derive(Clone, Debug, Default)]
pub struct VehicleProfiles {
    profiles: BTreeMap<String, VehicleProfile>,
}

impl VehicleProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, profile: VehicleProfile) {
        self.profiles.insert(profile.class.clone(), profile);
    }
}

impl FromIterator<VehicleProfile> for VehicleProfiles {
    fn from_iter<I: IntoIterator<Item = VehicleProfile>>(iter: I) -> Self {
        let mut profiles = Self::new();
        for p in iter {
            profiles.insert(p);
        }
        profiles
    }
}

impl VehicleRegistry for VehicleProfiles {
    fn profile(&self, class: &str) -> Option<VehicleProfile> {
        self.profiles.get(class).cloned()
    }
}
