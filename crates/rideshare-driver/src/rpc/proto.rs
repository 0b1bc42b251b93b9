//! Wire messages of `rideshare.driver.DriverService`.

use serde::Serialize;

use crate::domain::registry;

/// `RegisterDriver` method path.
pub const REGISTER_DRIVER_PATH: &str = "/rideshare.driver.DriverService/RegisterDriver";
/// `UnregisterDriver` method path.
pub const UNREGISTER_DRIVER_PATH: &str = "/rideshare.driver.DriverService/UnregisterDriver";

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Driver {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub car_plate: String,
    #[prost(string, tag = "4")]
    pub package_slug: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RegisterDriverRequest {
    #[prost(message, optional, tag = "1")]
    pub driver: Option<Driver>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct RegisterDriverResponse {
    #[prost(message, optional, tag = "1")]
    pub driver: Option<Driver>,
    /// Drivers online after the call.
    #[prost(uint32, tag = "2")]
    pub online: u32,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct UnregisterDriverRequest {
    #[prost(string, tag = "1")]
    pub driver_id: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct UnregisterDriverResponse {
    #[prost(message, optional, tag = "1")]
    pub driver: Option<Driver>,
    #[prost(uint32, tag = "2")]
    pub online: u32,
}

impl From<Driver> for registry::Driver {
    fn from(d: Driver) -> Self {
        Self {
            id: d.id,
            name: d.name,
            car_plate: d.car_plate,
            package_slug: d.package_slug,
        }
    }
}

impl From<registry::Driver> for Driver {
    fn from(d: registry::Driver) -> Self {
        Self {
            id: d.id,
            name: d.name,
            car_plate: d.car_plate,
            package_slug: d.package_slug,
        }
    }
}
