//! Demo devices: public sample data viewable without logging in.

use connect_types::DemoDevice;

use crate::platform::Location;

/// Route name of the showcase drive (`dongle|timestamp`).
pub const DEMO_ROUTE: &str = "164080f7933651c4|2024-03-03--06-46-42";

#[derive(Debug, Clone, Default)]
pub struct DemoCatalog {
    devices: Vec<DemoDevice>,
}

impl DemoCatalog {
    #[must_use]
    pub fn new(devices: Vec<DemoDevice>) -> Self {
        Self { devices }
    }

    #[must_use]
    pub fn devices(&self) -> &[DemoDevice] {
        &self.devices
    }

    #[must_use]
    pub fn is_demo_device(&self, dongle_id: &str) -> bool {
        self.devices.iter().any(|device| device.dongle_id == dongle_id)
    }

    #[must_use]
    pub fn is_demo_route(route: &str) -> bool {
        route == DEMO_ROUTE
    }

    /// True when the location's first path segment names a demo device.
    #[must_use]
    pub fn is_demo(&self, location: &Location) -> bool {
        location
            .first_segment()
            .is_some_and(|segment| self.is_demo_device(segment))
    }
}
